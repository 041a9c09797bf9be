//! SQLite persistence for namesync-daemon.
//!
//! The daemon stands in for the game server's user table: one `accounts` row
//! per account, with a unique name and an argon2 PHC password hash.

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::path::PathBuf;

pub struct Db {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    NameTaken,
}

impl Db {
    pub fn new(path: PathBuf) -> Result<Self, String> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn insert_account(&self, name: &str, password_hash: &str) -> Result<InsertOutcome, String> {
        self.with_connection(|conn| {
            let result = conn.execute(
                "INSERT INTO accounts (name, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![name, password_hash, Utc::now().to_rfc3339()],
            );
            match result {
                Ok(_) => Ok(InsertOutcome::Created(conn.last_insert_rowid())),
                Err(err) if is_constraint_violation(&err) => Ok(InsertOutcome::NameTaken),
                Err(err) => Err(format!("Failed to insert account: {}", err)),
            }
        })
    }

    pub fn get_account_by_name(&self, name: &str) -> Result<Option<AccountRow>, String> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, name, password_hash, created_at FROM accounts WHERE name = ?1",
                params![name],
                map_account_row,
            )
            .optional()
            .map_err(|err| format!("Failed to query account by name: {}", err))
        })
    }

    pub fn get_account_by_id(&self, id: i64) -> Result<Option<AccountRow>, String> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, name, password_hash, created_at FROM accounts WHERE id = ?1",
                params![id],
                map_account_row,
            )
            .optional()
            .map_err(|err| format!("Failed to query account by id: {}", err))
        })
    }

    /// Returns the number of rows changed (0 when the id does not exist).
    pub fn rename_account(&self, id: i64, new_name: &str) -> Result<usize, String> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE accounts SET name = ?1 WHERE id = ?2",
                params![new_name, id],
            )
            .map_err(|err| format!("Failed to rename account: {}", err))
        })
    }

    pub fn count_accounts(&self) -> Result<i64, String> {
        self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
                .map_err(|err| format!("Failed to count accounts: {}", err))
        })
    }

    fn init_schema(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS accounts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                 );
                 COMMIT;",
            )
            .map_err(|err| format!("Failed to initialize schema: {}", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create daemon data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

fn map_account_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        name: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}
