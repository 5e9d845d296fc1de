//! SQL schema for the timetravel SQLite substrate.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 1000;

-- One row per record version. Rows are never deleted; the only UPDATE ever
-- issued sets end_dt on a row whose end_dt is still NULL.
CREATE TABLE IF NOT EXISTS records (
    id        INTEGER NOT NULL CHECK (id > 0),
    version   INTEGER NOT NULL CHECK (version > 0),
    start_dt  TEXT    NOT NULL,   -- YYYYMMDDhhmmss, UTC
    end_dt    TEXT,               -- NULL while the version is current
    data      TEXT    NOT NULL DEFAULT '{}',
    PRIMARY KEY (id, version),
    CHECK (json_valid(data) AND json_type(data) = 'object')
) STRICT;

PRAGMA user_version = 1;
";
