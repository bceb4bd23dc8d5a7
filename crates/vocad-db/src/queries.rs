use crate::Database;
use crate::models::ModelRow;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Models --

    /// Create a model row. `scad_code` and `glb_file_url` are each set by
    /// exactly one creation path (text pipeline vs image-to-3D), so either
    /// may be absent.
    pub fn insert_model(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        scad_code: Option<&str>,
        glb_file_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO models (id, user_id, name, scad_code, glb_file_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, name, scad_code, glb_file_url],
            )?;
            Ok(())
        })
    }

    /// Single-row fetch scoped by both id and owner. Absence is a normal
    /// `None`, never an error — cross-user ids must not resolve.
    pub fn get_model(&self, id: &str, user_id: &str) -> Result<Option<ModelRow>> {
        self.with_conn(|conn| query_model(conn, id, user_id))
    }

    /// Overwrite `scad_code` and `name` (iterate path), scoped by id and
    /// owner. Returns whether a row matched.
    pub fn update_model_code(
        &self,
        id: &str,
        user_id: &str,
        scad_code: &str,
        name: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE models SET scad_code = ?1, name = ?2 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![scad_code, name, id, user_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_model(conn: &Connection, id: &str, user_id: &str) -> Result<Option<ModelRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, name, created_at, scad_code, glb_file_url
             FROM models WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
            |row| {
                Ok(ModelRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                    scad_code: row.get(4)?,
                    glb_file_url: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_fetch_scoped_by_owner() {
        let db = Database::open_in_memory().unwrap();
        db.insert_model("m1", "u1", "a mug", Some("cube(1);"), None)
            .unwrap();

        let row = db.get_model("m1", "u1").unwrap().unwrap();
        assert_eq!(row.name, "a mug");
        assert_eq!(row.scad_code.as_deref(), Some("cube(1);"));
        assert!(row.glb_file_url.is_none());

        // Same id under a different owner must not resolve
        assert!(db.get_model("m1", "u2").unwrap().is_none());
    }

    #[test]
    fn update_overwrites_code_and_name() {
        let db = Database::open_in_memory().unwrap();
        db.insert_model("m1", "u1", "a mug", Some("cube(1);"), None)
            .unwrap();

        let matched = db
            .update_model_code("m1", "u1", "cube(2);", "make the handle thicker")
            .unwrap();
        assert!(matched);

        let row = db.get_model("m1", "u1").unwrap().unwrap();
        assert_eq!(row.scad_code.as_deref(), Some("cube(2);"));
        assert_eq!(row.name, "make the handle thicker");
    }

    #[test]
    fn update_misses_for_wrong_owner() {
        let db = Database::open_in_memory().unwrap();
        db.insert_model("m1", "u1", "a mug", Some("cube(1);"), None)
            .unwrap();

        let matched = db.update_model_code("m1", "u2", "cube(2);", "x").unwrap();
        assert!(!matched);

        let row = db.get_model("m1", "u1").unwrap().unwrap();
        assert_eq!(row.scad_code.as_deref(), Some("cube(1);"));
    }

    #[test]
    fn glb_url_path_stores_without_code() {
        let db = Database::open_in_memory().unwrap();
        db.insert_model("m2", "u1", "a statue", None, Some("https://example.com/m.glb"))
            .unwrap();

        let row = db.get_model("m2", "u1").unwrap().unwrap();
        assert!(row.scad_code.is_none());
        assert_eq!(row.glb_file_url.as_deref(), Some("https://example.com/m.glb"));
    }
}
