use std::sync::Arc;
use tracing::debug;

use crate::error::RenameError;
use crate::host::{AccountTable, CredentialStore};
use crate::types::AccountId;

/// Renames an account after making sure no other account owns the new name.
///
/// The collision check and the write are two calls against the store; the
/// table's own uniqueness constraint is the backstop if another writer slips
/// in between.
pub struct AccountRenamer {
    credentials: Arc<dyn CredentialStore>,
    accounts: Arc<dyn AccountTable>,
}

impl AccountRenamer {
    pub fn new(credentials: Arc<dyn CredentialStore>, accounts: Arc<dyn AccountTable>) -> Self {
        Self {
            credentials,
            accounts,
        }
    }

    pub fn rename(&self, account_id: AccountId, new_name: &str) -> Result<(), RenameError> {
        match self.credentials.get_account_by_name(new_name) {
            Ok(Some(existing)) if existing.account_id != account_id => {
                return Err(RenameError::NameTaken {
                    name: new_name.to_string(),
                    owner: existing.account_id,
                });
            }
            Ok(Some(_)) => {
                debug!(account_id, new_name = %new_name, "Account already carries the new name");
            }
            Ok(None) => {}
            Err(err) => return Err(RenameError::Persistence(err)),
        }

        self.accounts
            .rename_account(account_id, new_name)
            .map_err(RenameError::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryAccounts;

    fn renamer(accounts: &Arc<MemoryAccounts>) -> AccountRenamer {
        AccountRenamer::new(accounts.clone(), accounts.clone())
    }

    #[test]
    fn renames_when_name_is_free() {
        let accounts = Arc::new(MemoryAccounts::new());
        accounts.insert(1, "Alice", "pw");

        renamer(&accounts).rename(1, "Alice99").expect("rename");
        assert_eq!(accounts.name_of(1).as_deref(), Some("Alice99"));
    }

    #[test]
    fn rejects_name_owned_by_other_account() {
        let accounts = Arc::new(MemoryAccounts::new());
        accounts.insert(1, "Alice", "pw");
        accounts.insert(2, "Alice99", "pw");

        let err = renamer(&accounts).rename(1, "Alice99").expect_err("collision");
        assert!(matches!(err, RenameError::NameTaken { owner: 2, .. }));
        assert_eq!(accounts.name_of(1).as_deref(), Some("Alice"));
    }

    #[test]
    fn same_account_same_name_is_not_a_collision() {
        let accounts = Arc::new(MemoryAccounts::new());
        accounts.insert(1, "Alice", "pw");

        renamer(&accounts).rename(1, "Alice").expect("no-op rename");
        assert_eq!(accounts.name_of(1).as_deref(), Some("Alice"));
    }

    #[test]
    fn storage_failure_is_persistence_error() {
        let accounts = Arc::new(MemoryAccounts::new());
        accounts.insert(1, "Alice", "pw");
        accounts.fail_renames(true);

        let err = renamer(&accounts).rename(1, "Alice99").expect_err("write fails");
        assert!(matches!(err, RenameError::Persistence(_)));
        assert_eq!(accounts.name_of(1).as_deref(), Some("Alice"));
    }
}
