use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, warn};

use crate::error::AppError;

pub const HASH_COST: u32 = 10;

#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

/// Registered users and their bcrypt hashes, kept in SQLite.
pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn register(&self, username: &str, password: &str) -> Result<User, AppError> {
        let password_hash = bcrypt::hash(password, HASH_COST)?;

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        // The primary key decides uniqueness, so two racing registrations can't both succeed.
        let inserted = conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                debug!("Registration refused, {username} already exists");
                return Err(AppError::DuplicateUsername);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(User {
            username: username.to_string(),
            password_hash,
        })
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let user = conn
            .query_row(
                "SELECT username, password_hash FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(User {
                        username: row.get(0)?,
                        password_hash: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    pub fn verify_password(&self, user: &User, password: &str) -> bool {
        bcrypt::verify(password, &user.password_hash).unwrap_or_else(|e| {
            warn!("Stored hash for {} is unusable: {e}", user.username);
            false
        })
    }
}
