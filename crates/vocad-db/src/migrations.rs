use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS models (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            name          TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            scad_code     TEXT,
            glb_file_url  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_models_user
            ON models(user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
