use crate::store::SqliteStore;
use rusqlite::Connection;
use std::path::Path;

/// Opens (creating if needed) the workspace database. All collections live
/// in one documents table keyed by (collection, id); the fields column holds
/// the JSON blob the document-store contract exposes.
pub fn open_store(workspace: &Path) -> anyhow::Result<SqliteStore> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attendance.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields TEXT NOT NULL,
            PRIMARY KEY(collection, id)
        )",
        [],
    )?;

    Ok(SqliteStore::new(conn))
}
