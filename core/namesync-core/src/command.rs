//! The `confirmname <password>` command.
//!
//! Preconditions are checked in a fixed order and the first failure is the
//! only message the user sees. The whole check → verify → rename → clear
//! sequence runs under the shared gate, so a reminder sweep or a second
//! confirm for the same key cannot interleave with it.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::error::RenameError;
use crate::host::Session;
use crate::messages;
use crate::renamer::AccountRenamer;
use crate::tracker::ReconciliationTracker;
use crate::verifier::CredentialVerifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    PermissionDenied,
    NotLoggedIn,
    NoPendingChange,
    Usage,
    InvalidPassword,
    NameTaken,
    PersistenceFailed,
    Renamed { from: String, to: String },
}

pub struct ConfirmNameCommand {
    tracker: Arc<ReconciliationTracker>,
    verifier: CredentialVerifier,
    renamer: AccountRenamer,
    gate: Arc<Mutex<()>>,
    name: String,
    permission: String,
}

impl ConfirmNameCommand {
    pub fn new(
        tracker: Arc<ReconciliationTracker>,
        verifier: CredentialVerifier,
        renamer: AccountRenamer,
        gate: Arc<Mutex<()>>,
        name: impl Into<String>,
        permission: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            verifier,
            renamer,
            gate,
            name: name.into(),
            permission: permission.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the command for `session`. `args` are wiped before returning.
    pub fn execute(&self, session: &dyn Session, mut args: Vec<String>) -> ConfirmOutcome {
        let outcome = self.run(session, &mut args);
        args.zeroize();
        outcome
    }

    fn run(&self, session: &dyn Session, args: &mut Vec<String>) -> ConfirmOutcome {
        if !session.has_permission(&self.permission) {
            session.send_error(messages::NO_PERMISSION);
            return ConfirmOutcome::PermissionDenied;
        }

        // Identity is read under the gate: a confirm that just finished may
        // have renamed this account.
        let _serial = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        let identity = match session.identity() {
            Some(identity) => identity,
            None => {
                session.send_error(messages::NOT_LOGGED_IN);
                return ConfirmOutcome::NotLoggedIn;
            }
        };

        let display_name = session.display_name();
        if !self.tracker.is_pending(display_name) {
            session.send_error(messages::NO_PENDING_CHANGE);
            return ConfirmOutcome::NoPendingChange;
        }

        if args.len() != 1 {
            session.send_error(&messages::usage(&self.name));
            return ConfirmOutcome::Usage;
        }
        let password = Zeroizing::new(args.swap_remove(0));

        if !self.verifier.verify(&identity.account_name, &password) {
            info!(
                account_id = identity.account_id,
                display_name = %display_name,
                "Name change confirmation rejected: invalid password"
            );
            session.send_error(messages::INVALID_PASSWORD);
            return ConfirmOutcome::InvalidPassword;
        }

        match self.renamer.rename(identity.account_id, display_name) {
            Ok(()) => {
                self.tracker.clear(display_name);
                info!(
                    account_id = identity.account_id,
                    from = %identity.account_name,
                    to = %display_name,
                    "Account renamed"
                );
                session.send_success(&messages::renamed(&identity.account_name, display_name));
                ConfirmOutcome::Renamed {
                    from: identity.account_name,
                    to: display_name.to_string(),
                }
            }
            Err(err @ RenameError::NameTaken { .. }) => {
                warn!(
                    account_id = identity.account_id,
                    display_name = %display_name,
                    "Name change blocked: name belongs to another account"
                );
                session.send_error(&err.to_string());
                ConfirmOutcome::NameTaken
            }
            Err(err @ RenameError::Persistence(_)) => {
                error!(
                    error = %err,
                    account_id = identity.account_id,
                    display_name = %display_name,
                    "Account update error"
                );
                session.send_error(&err.to_string());
                ConfirmOutcome::PersistenceFailed
            }
        }
    }
}
