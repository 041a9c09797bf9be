use std::sync::Arc;
use tracing::{debug, warn};

use crate::host::CredentialStore;

/// Checks a candidate password against the stored credential of an account.
///
/// Every failure mode (unknown account, wrong password, backend error) comes
/// back as `false` so callers cannot tell them apart; backend errors are logged.
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn verify(&self, account_name: &str, password: &str) -> bool {
        let identity = match self.store.get_account_by_name(account_name) {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!(account_name = %account_name, "Password check for unknown account");
                return false;
            }
            Err(err) => {
                warn!(error = %err, account_name = %account_name, "Account lookup failed during password check");
                return false;
            }
        };

        match self.store.verify_password(password, &identity.password_hash) {
            Ok(matches) => matches,
            Err(err) => {
                warn!(
                    error = %err,
                    account_id = identity.account_id,
                    "Password verification failed"
                );
                false
            }
        }
    }
}
