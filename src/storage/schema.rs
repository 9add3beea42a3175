//! SQLite schema and connection bootstrap.
//!
//! Tables are created if absent on every open; there is no migration
//! history. Children reference their course by `term_crn` and carry an
//! autoincrement id so reads come back in insertion order.

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Delay unit between open attempts; attempt `i` waits `i` units.
const OPEN_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound for a single retry delay.
const OPEN_RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

/// How long SQLite waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    term_crn TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    subject_code TEXT NOT NULL,
    course_number TEXT NOT NULL,
    section_number TEXT NOT NULL,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS instructors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term_crn TEXT NOT NULL,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    email TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_instructors_term_crn ON instructors(term_crn);

CREATE TABLE IF NOT EXISTS meetings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    term_crn TEXT NOT NULL,
    days TEXT NOT NULL,
    building TEXT NOT NULL,
    room TEXT NOT NULL,
    time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_meetings_term_crn ON meetings(term_crn);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    password TEXT NOT NULL,
    privilege INTEGER NOT NULL DEFAULT 0,
    classes TEXT NOT NULL DEFAULT ''
);
"#;

/// Apply connection pragmas.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode answers with a row, so it cannot go through execute_batch
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch(
        r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        "#,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

/// Create all tables and indexes that do not exist yet.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

/// Open the database file, retrying up to `attempts` times.
///
/// Attempt `i` (zero-based) sleeps `100ms * i`, capped at 2s, before
/// trying again. The returned connection has pragmas and schema applied.
pub fn open_with_retry<P: AsRef<Path>>(path: P, attempts: u32) -> Result<Connection> {
    let path = path.as_ref();
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        match open_file(path) {
            Ok(conn) => {
                tracing::debug!(path = %path.display(), attempt, "Database opened");
                return Ok(conn);
            }
            Err(e) if attempt + 1 < attempts => {
                attempt += 1;
                let delay = (OPEN_RETRY_BASE_DELAY * attempt).min(OPEN_RETRY_MAX_DELAY);
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Failed to open database, retrying"
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Open a private in-memory database with the schema applied.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    initialize_schema(&conn)?;
    Ok(conn)
}

fn open_file(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    apply_pragmas(&conn)?;
    initialize_schema(&conn)?;
    Ok(conn)
}
