//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Slug-Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl run key
CREATE TABLE IF NOT EXISTS runs (
    run_key TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Every work item of a run, positioned within its status sequence
CREATE TABLE IF NOT EXISTS work_items (
    run_key TEXT NOT NULL REFERENCES runs(run_key),
    item_id TEXT NOT NULL,
    status TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (run_key, item_id)
);

CREATE INDEX IF NOT EXISTS idx_work_items_order ON work_items(run_key, status, position);

-- Normalized records
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL UNIQUE,
    document TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
