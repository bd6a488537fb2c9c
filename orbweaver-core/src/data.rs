use crate::error::{Result, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub visited: bool,
    pub depth: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub source: String,
    pub target: String,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub user: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: i64,
    pub user: String,
    pub geojson: Option<String>,
    pub location: Option<String>,
}

/// Upstream exports mark absent geo fields with the literal strings "nan",
/// "None" or "NULL" (or leave them empty). Those must land as SQL NULL,
/// never as text.
pub fn normalize_sentinel(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed == "None"
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Database {
    pub fn drop(path: &Path) {
        fs::remove_file(path).unwrap();
    }
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Optimize for concurrent writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Crawled and observed accounts. Insertion order doubles as the
            -- breadth-first frontier order, so rowid is load-bearing.
            CREATE TABLE IF NOT EXISTS users (
    name TEXT PRIMARY KEY,
    visited BOOLEAN NOT NULL DEFAULT 0,
    depth INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_users_visited ON users(visited);
CREATE INDEX IF NOT EXISTS idx_users_depth ON users(depth);

-- Directed mention edges, weighted by mention count
CREATE TABLE IF NOT EXISTS connections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_1_name TEXT NOT NULL,
    user_2_name TEXT NOT NULL,
    weight INTEGER NOT NULL DEFAULT 1,

    FOREIGN KEY(user_1_name) REFERENCES users(name) ON DELETE CASCADE,
    FOREIGN KEY(user_2_name) REFERENCES users(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_connections_source ON connections(user_1_name);
CREATE INDEX IF NOT EXISTS idx_connections_pair ON connections(user_1_name, user_2_name);

-- Raw message texts per account
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_name TEXT NOT NULL,
    text TEXT NOT NULL,

    FOREIGN KEY(user_name) REFERENCES users(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_name);

-- Geo observations; either column may be NULL but rows are kept
-- whenever at least one side is present
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_name TEXT NOT NULL,
    geojson TEXT,
    location TEXT,

    FOREIGN KEY(user_name) REFERENCES users(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_locations_user ON locations(user_name);
            ",
        )?;
        Ok(())
    }

    // User operations

    /// Inserts a user at the given depth. A user already present keeps its
    /// original depth and visited flag; returns whether a row was inserted.
    pub fn upsert_user(&self, name: &str, depth: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO users (name, visited, depth) VALUES (?1, 0, ?2)",
            params![name, depth],
        )?;
        Ok(inserted > 0)
    }

    pub fn user_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM users WHERE name = ?1")?;
        let found = stmt.query_row(params![name], |_| Ok(())).optional()?;
        Ok(found.is_some())
    }

    pub fn get_user(&self, name: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, visited, depth FROM users WHERE name = ?1")?;

        let user = stmt
            .query_row(params![name], |row| {
                Ok(User {
                    name: row.get(0)?,
                    visited: row.get(1)?,
                    depth: row.get(2)?,
                })
            })
            .optional()?;
        Ok(user)
    }

    /// Unknown users are reported as unvisited.
    pub fn is_visited(&self, name: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT visited FROM users WHERE name = ?1")?;
        let visited = stmt
            .query_row(params![name], |row| row.get(0))
            .optional()?;
        Ok(visited.unwrap_or(false))
    }

    pub fn mark_visited(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET visited = 1 WHERE name = ?1",
            params![name],
        )?;
        Ok(())
    }

    /// Oldest unvisited user in insertion order, if any.
    pub fn next_unvisited(&self) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, visited, depth FROM users WHERE visited = 0 ORDER BY rowid LIMIT 1",
        )?;

        let user = stmt
            .query_row([], |row| {
                Ok(User {
                    name: row.get(0)?,
                    visited: row.get(1)?,
                    depth: row.get(2)?,
                })
            })
            .optional()?;
        Ok(user)
    }

    /// All users recorded at the given depth, in insertion order.
    pub fn users_at_depth(&self, depth: i64) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, visited, depth FROM users WHERE depth = ?1 ORDER BY rowid",
        )?;

        let users = stmt
            .query_map(params![depth], |row| {
                Ok(User {
                    name: row.get(0)?,
                    visited: row.get(1)?,
                    depth: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    // Edge operations

    /// Appends a connection row. Both endpoints must already exist as users.
    pub fn add_edge(&self, source: &str, target: &str, weight: i64) -> Result<i64> {
        self.ensure_user(source)?;
        self.ensure_user(target)?;

        self.conn.execute(
            "INSERT INTO connections (user_1_name, user_2_name, weight) VALUES (?1, ?2, ?3)",
            params![source, target, weight],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Adds weight to the first existing row for this ordered pair, or
    /// inserts a fresh row if none exists.
    pub fn upsert_edge(&self, source: &str, target: &str, weight: i64) -> Result<i64> {
        self.ensure_user(source)?;
        self.ensure_user(target)?;

        let existing = self
            .conn
            .prepare(
                "SELECT id FROM connections WHERE user_1_name = ?1 AND user_2_name = ?2 ORDER BY id LIMIT 1",
            )?
            .query_row(params![source, target], |row| row.get::<_, i64>(0))
            .optional()?;

        match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE connections SET weight = weight + ?1 WHERE id = ?2",
                    params![weight, id],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO connections (user_1_name, user_2_name, weight) VALUES (?1, ?2, ?3)",
                    params![source, target, weight],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    pub fn get_edge(&self, source: &str, target: &str) -> Result<Option<Edge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_1_name, user_2_name, weight FROM connections
             WHERE user_1_name = ?1 AND user_2_name = ?2 ORDER BY id LIMIT 1",
        )?;

        let edge = stmt
            .query_row(params![source, target], |row| {
                Ok(Edge {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    target: row.get(2)?,
                    weight: row.get(3)?,
                })
            })
            .optional()?;
        Ok(edge)
    }

    pub fn edges(&self) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_1_name, user_2_name, weight FROM connections ORDER BY id",
        )?;

        let edges = stmt
            .query_map([], |row| {
                Ok(Edge {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    target: row.get(2)?,
                    weight: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Heaviest connections first; ties resolve to the oldest row.
    pub fn top_edges(&self, limit: usize) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_1_name, user_2_name, weight FROM connections
             ORDER BY weight DESC, id ASC LIMIT ?1",
        )?;

        let edges = stmt
            .query_map(params![limit as i64], |row| {
                Ok(Edge {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    target: row.get(2)?,
                    weight: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    // Message operations

    pub fn add_message(&self, user: &str, text: &str) -> Result<i64> {
        self.ensure_user(user)?;

        self.conn.execute(
            "INSERT INTO messages (user_name, text) VALUES (?1, ?2)",
            params![user, text],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn messages(&self) -> Result<Vec<Message>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_name, text FROM messages ORDER BY id")?;

        let messages = stmt
            .query_map([], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    user: row.get(1)?,
                    text: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    pub fn messages_for_user(&self, user: &str) -> Result<Vec<Message>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_name, text FROM messages WHERE user_name = ?1 ORDER BY id")?;

        let messages = stmt
            .query_map(params![user], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    user: row.get(1)?,
                    text: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    // Location operations

    pub fn add_location(
        &self,
        user: &str,
        geojson: Option<&str>,
        location: Option<&str>,
    ) -> Result<i64> {
        self.ensure_user(user)?;

        self.conn.execute(
            "INSERT INTO locations (user_name, geojson, location) VALUES (?1, ?2, ?3)",
            params![user, geojson, location],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn locations_for_user(&self, user: &str) -> Result<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_name, geojson, location FROM locations WHERE user_name = ?1 ORDER BY id",
        )?;

        let locations = stmt
            .query_map(params![user], |row| {
                Ok(LocationRecord {
                    id: row.get(0)?,
                    user: row.get(1)?,
                    geojson: row.get(2)?,
                    location: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(locations)
    }

    // Aggregates

    pub fn count_users(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_visited(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE visited = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_edges(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM connections", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_messages(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_locations(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn max_depth(&self) -> Result<i64> {
        let depth = self.conn.query_row(
            "SELECT COALESCE(MAX(depth), 0) FROM users",
            [],
            |row| row.get(0),
        )?;
        Ok(depth)
    }

    /// User counts per depth, shallowest first.
    pub fn depth_histogram(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM users GROUP BY depth ORDER BY depth")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_user(&self, name: &str) -> Result<()> {
        if !self.user_exists(name)? {
            return Err(StoreError::DanglingReference {
                user: name.to_string(),
            });
        }
        Ok(())
    }
}
