use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if table creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Settings table - credentials and the polling watermark, keyed by name
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Databases created before updated_at existed
    let column_exists: Result<i32, rusqlite::Error> = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('settings') WHERE name='updated_at'",
        [],
        |row| row.get(0),
    );

    if column_exists.unwrap_or(0) == 0 {
        conn.execute(
            "ALTER TABLE settings ADD COLUMN updated_at TEXT NOT NULL DEFAULT ''",
            [],
        )?;
        log::info!("Added updated_at column to settings table");
    }

    Ok(())
}
