/// Database row types — these map directly to SQLite rows.
/// Distinct from vocad-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct ModelRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
    pub scad_code: Option<String>,
    pub glb_file_url: Option<String>,
}
