//! Embedded relational cache.
//!
//! One table per mirrored entity, keyed by the backend's opaque id.
//! The cache is a read-side projection only: rows are written by upserts
//! that follow successful backend fetches or mutations, and the engine
//! never treats a row as truth without a corresponding write path that
//! refreshes it.

mod query;
mod upsert;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt cache row: {0}")]
    Corrupt(String),
    #[error("cache i/o: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CacheResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run `f` with the connection; the mutex serialises all cache access.
    pub(crate) fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> CacheResult<T>,
    ) -> CacheResult<T> {
        let conn = self.conn.lock().map_err(|_| {
            CacheError::Corrupt("cache connection mutex poisoned".to_string())
        })?;
        f(&conn)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS teams (
    id          TEXT PRIMARY KEY,
    key         TEXT NOT NULL,
    name        TEXT NOT NULL,
    icon        TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    email        TEXT NOT NULL,
    display_name TEXT NOT NULL,
    active       INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS states (
    id         TEXT PRIMARY KEY,
    team_id    TEXT NOT NULL,
    name       TEXT NOT NULL,
    state_type TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS states_team ON states(team_id);

CREATE TABLE IF NOT EXISTS labels (
    id          TEXT PRIMARY KEY,
    team_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    color       TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS labels_team ON labels(team_id);

CREATE TABLE IF NOT EXISTS issues (
    id           TEXT PRIMARY KEY,
    identifier   TEXT NOT NULL UNIQUE,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    priority     INTEGER NOT NULL,
    due_date     TEXT,
    estimate     INTEGER,
    team_id      TEXT NOT NULL,
    state_id     TEXT NOT NULL,
    assignee_id  TEXT,
    creator_id   TEXT,
    project_id   TEXT,
    milestone_id TEXT,
    cycle_id     TEXT,
    parent_id    TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS issues_team ON issues(team_id);
CREATE INDEX IF NOT EXISTS issues_assignee ON issues(assignee_id);
CREATE INDEX IF NOT EXISTS issues_project ON issues(project_id);
CREATE INDEX IF NOT EXISTS issues_parent ON issues(parent_id);

CREATE TABLE IF NOT EXISTS issue_labels (
    issue_id TEXT NOT NULL,
    label_id TEXT NOT NULL,
    PRIMARY KEY (issue_id, label_id)
);

CREATE TABLE IF NOT EXISTS projects (
    id          TEXT PRIMARY KEY,
    team_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL,
    description TEXT NOT NULL,
    state       TEXT NOT NULL,
    start_date  TEXT,
    target_date TEXT,
    lead_id     TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS projects_team ON projects(team_id);

CREATE TABLE IF NOT EXISTS cycles (
    id                      TEXT PRIMARY KEY,
    team_id                 TEXT NOT NULL,
    number                  INTEGER NOT NULL,
    name                    TEXT,
    starts_at               TEXT NOT NULL,
    ends_at                 TEXT NOT NULL,
    issue_count_history     TEXT NOT NULL,
    completed_count_history TEXT NOT NULL,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS cycles_team ON cycles(team_id);

CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY,
    issue_id   TEXT NOT NULL,
    body       TEXT NOT NULL,
    author_id  TEXT,
    edited_at  TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS comments_issue ON comments(issue_id);

CREATE TABLE IF NOT EXISTS documents (
    id         TEXT PRIMARY KEY,
    team_id    TEXT,
    issue_id   TEXT,
    project_id TEXT,
    title      TEXT NOT NULL,
    slug       TEXT,
    content    TEXT NOT NULL,
    icon       TEXT,
    color      TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS milestones (
    id          TEXT PRIMARY KEY,
    project_id  TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL,
    target_date TEXT,
    sort_order  REAL NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS milestones_project ON milestones(project_id);

CREATE TABLE IF NOT EXISTS updates (
    id            TEXT PRIMARY KEY,
    project_id    TEXT,
    initiative_id TEXT,
    body          TEXT NOT NULL,
    health        TEXT NOT NULL,
    author_id     TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS initiatives (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL,
    status      TEXT NOT NULL,
    color       TEXT,
    icon        TEXT,
    target_date TEXT,
    owner_id    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS initiative_projects (
    initiative_id TEXT NOT NULL,
    project_id    TEXT NOT NULL,
    PRIMARY KEY (initiative_id, project_id)
);

CREATE TABLE IF NOT EXISTS attachments (
    id          TEXT PRIMARY KEY,
    issue_id    TEXT NOT NULL,
    title       TEXT NOT NULL,
    url         TEXT NOT NULL,
    subtitle    TEXT,
    source_type TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS attachments_issue ON attachments(issue_id);

CREATE TABLE IF NOT EXISTS files (
    id         TEXT PRIMARY KEY,
    issue_id   TEXT NOT NULL,
    filename   TEXT NOT NULL,
    url        TEXT NOT NULL,
    size       INTEGER NOT NULL,
    cache_path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS files_issue ON files(issue_id);

CREATE TABLE IF NOT EXISTS relations (
    id               TEXT PRIMARY KEY,
    issue_id         TEXT NOT NULL,
    related_issue_id TEXT NOT NULL,
    relation_type    TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS relations_issue ON relations(issue_id);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_applies_twice() {
        let cache = Cache::open_in_memory().unwrap();
        cache.with(|conn| Ok(conn.execute_batch(SCHEMA)?)).unwrap();
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/cache.db");
        Cache::open(&path).unwrap();
        assert!(path.exists());
    }
}
