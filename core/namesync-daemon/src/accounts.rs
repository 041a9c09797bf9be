//! Credential store and account table backed by [`Db`], with argon2 hashes.

use argon2::Argon2;
use namesync_core::{AccountId, AccountTable, CredentialStore, Identity, StoreError};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::Arc;

use crate::db::{AccountRow, Db, InsertOutcome};

pub enum RegisterOutcome {
    Created(Identity),
    NameTaken,
}

pub struct SqliteAccounts {
    db: Arc<Db>,
}

impl SqliteAccounts {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Create an account, storing only a salted argon2 hash of `password`.
    pub fn register(&self, name: &str, password: &str) -> Result<RegisterOutcome, String> {
        let password_hash = hash_password(password)?;
        match self.db.insert_account(name, &password_hash)? {
            InsertOutcome::Created(id) => Ok(RegisterOutcome::Created(Identity::new(
                id,
                name,
                password_hash,
            ))),
            InsertOutcome::NameTaken => Ok(RegisterOutcome::NameTaken),
        }
    }

    pub fn identity_by_id(&self, id: AccountId) -> Result<Option<Identity>, StoreError> {
        self.db
            .get_account_by_id(id)
            .map(|row| row.map(identity_from_row))
            .map_err(StoreError::Query)
    }

    pub fn count(&self) -> Result<i64, String> {
        self.db.count_accounts()
    }
}

impl CredentialStore for SqliteAccounts {
    fn get_account_by_name(&self, name: &str) -> Result<Option<Identity>, StoreError> {
        self.db
            .get_account_by_name(name)
            .map(|row| row.map(identity_from_row))
            .map_err(StoreError::Query)
    }

    fn verify_password(&self, plain: &str, stored_hash: &str) -> Result<bool, StoreError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|err| StoreError::MalformedHash(err.to_string()))?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

impl AccountTable for SqliteAccounts {
    fn rename_account(&self, id: AccountId, new_name: &str) -> Result<(), StoreError> {
        match self.db.rename_account(id, new_name) {
            Ok(0) => Err(StoreError::AccountNotFound(id)),
            Ok(_) => Ok(()),
            Err(err) => Err(StoreError::Query(err)),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut password_hash::rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| format!("Failed to hash password: {}", err))
}

fn identity_from_row(row: AccountRow) -> Identity {
    Identity::new(row.id, row.name, row.password_hash)
}
