//! In-memory registry of connected sessions.
//!
//! Sessions are created by `session_start` requests and removed by
//! `session_end`. Notices sent to a session are queued in its outbox until the
//! client drains them.

use namesync_core::{AccountId, Identity, Notice, Session, SessionHost, Tone};
use namesync_protocol::{Message, MessageTone};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::accounts::SqliteAccounts;

struct SessionEntry {
    display_name: String,
    account_id: Option<AccountId>,
    permissions: Option<Vec<String>>,
    started_seq: u64,
    outbox: VecDeque<Message>,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, SessionEntry>,
    next_seq: u64,
}

#[derive(Clone)]
pub struct SessionRegistry {
    state: Arc<Mutex<RegistryState>>,
    accounts: Arc<SqliteAccounts>,
    max_outbox: usize,
}

impl SessionRegistry {
    pub fn new(accounts: Arc<SqliteAccounts>, max_outbox: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            accounts,
            max_outbox: max_outbox.max(1),
        }
    }

    /// Register (or replace) a session and return a handle to it.
    pub fn connect(
        &self,
        session_id: &str,
        display_name: &str,
        account_id: Option<AccountId>,
        permissions: Option<Vec<String>>,
    ) -> LiveSession {
        let mut state = self.lock();
        state.next_seq += 1;
        let started_seq = state.next_seq;
        let previous = state.sessions.insert(
            session_id.to_string(),
            SessionEntry {
                display_name: display_name.to_string(),
                account_id,
                permissions: permissions.clone(),
                started_seq,
                outbox: VecDeque::new(),
            },
        );
        if previous.is_some() {
            debug!(session_id = %session_id, "Session replaced by new session_start");
        }
        drop(state);

        self.handle(session_id, display_name, account_id, permissions)
    }

    pub fn disconnect(&self, session_id: &str) -> Option<Vec<Message>> {
        self.lock()
            .sessions
            .remove(session_id)
            .map(|entry| entry.outbox.into_iter().collect())
    }

    pub fn get(&self, session_id: &str) -> Option<LiveSession> {
        let state = self.lock();
        let entry = state.sessions.get(session_id)?;
        Some(self.handle(
            session_id,
            &entry.display_name,
            entry.account_id,
            entry.permissions.clone(),
        ))
    }

    pub fn drain(&self, session_id: &str) -> Option<Vec<Message>> {
        self.lock()
            .sessions
            .get_mut(session_id)
            .map(|entry| entry.outbox.drain(..).collect())
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    fn push(&self, session_id: &str, message: Message) {
        let mut state = self.lock();
        let entry = match state.sessions.get_mut(session_id) {
            Some(entry) => entry,
            None => {
                debug!(session_id = %session_id, "Dropping notice for disconnected session");
                return;
            }
        };
        if entry.outbox.len() >= self.max_outbox {
            entry.outbox.pop_front();
            warn!(session_id = %session_id, "Session outbox full; dropped oldest message");
        }
        entry.outbox.push_back(message);
    }

    fn handle(
        &self,
        session_id: &str,
        display_name: &str,
        account_id: Option<AccountId>,
        permissions: Option<Vec<String>>,
    ) -> LiveSession {
        LiveSession {
            session_id: session_id.to_string(),
            display_name: display_name.to_string(),
            account_id,
            permissions,
            registry: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionHost for SessionRegistry {
    /// The most recently started session using `name`.
    fn find_session_by_display_name(&self, name: &str) -> Option<Arc<dyn Session>> {
        let state = self.lock();
        let (session_id, entry) = state
            .sessions
            .iter()
            .filter(|(_, entry)| entry.display_name == name)
            .max_by_key(|(_, entry)| entry.started_seq)?;
        let handle = self.handle(
            session_id,
            &entry.display_name,
            entry.account_id,
            entry.permissions.clone(),
        );
        Some(Arc::new(handle))
    }
}

/// A handle to one registered session. Identity is re-read from the account
/// table on every call so a rename is visible immediately.
pub struct LiveSession {
    session_id: String,
    display_name: String,
    account_id: Option<AccountId>,
    permissions: Option<Vec<String>>,
    registry: SessionRegistry,
}

impl Session for LiveSession {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn identity(&self) -> Option<Identity> {
        let account_id = self.account_id?;
        match self.registry.accounts.identity_by_id(account_id) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(
                    error = %err,
                    session_id = %self.session_id,
                    account_id,
                    "Failed to resolve session identity"
                );
                None
            }
        }
    }

    fn has_permission(&self, permission: &str) -> bool {
        match &self.permissions {
            None => true,
            Some(granted) => granted
                .iter()
                .any(|candidate| candidate == permission || candidate == "*"),
        }
    }

    fn send(&self, notice: Notice) {
        self.registry.push(&self.session_id, to_message(notice));
    }
}

fn to_message(notice: Notice) -> Message {
    let tone = match notice.tone {
        Tone::Info => MessageTone::Info,
        Tone::Error => MessageTone::Error,
        Tone::Success => MessageTone::Success,
    };
    Message {
        tone,
        text: notice.text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::RegisterOutcome;
    use crate::db::Db;

    fn registry() -> (tempfile::TempDir, SessionRegistry, Arc<SqliteAccounts>) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Db::new(temp_dir.path().join("accounts.db")).expect("db init");
        let accounts = Arc::new(SqliteAccounts::new(Arc::new(db)));
        (temp_dir, SessionRegistry::new(accounts.clone(), 4), accounts)
    }

    #[test]
    fn newest_session_wins_name_lookup() {
        let (_dir, registry, _) = registry();
        registry.connect("s-1", "Alice99", None, None);
        registry.connect("s-2", "Alice99", None, None);

        let found = registry
            .find_session_by_display_name("Alice99")
            .expect("session");
        found.send_info("hello");

        assert!(registry.drain("s-1").expect("s-1").is_empty());
        assert_eq!(registry.drain("s-2").expect("s-2").len(), 1);
    }

    #[test]
    fn identity_reflects_account_table() {
        let (_dir, registry, accounts) = registry();
        let identity = match accounts.register("Alice", "pw").expect("register") {
            RegisterOutcome::Created(identity) => identity,
            RegisterOutcome::NameTaken => panic!("fresh db"),
        };
        let session = registry.connect("s-1", "Alice99", Some(identity.account_id), None);
        assert_eq!(session.identity().expect("logged in").account_name, "Alice");

        namesync_core::AccountTable::rename_account(accounts.as_ref(), identity.account_id, "Alice99")
            .expect("rename");
        assert_eq!(session.identity().expect("logged in").account_name, "Alice99");
    }

    #[test]
    fn outbox_is_bounded() {
        let (_dir, registry, _) = registry();
        let session = registry.connect("s-1", "Alice", None, None);
        for i in 0..6 {
            session.send_info(&format!("m{}", i));
        }
        let messages = registry.drain("s-1").expect("session");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].text, "m2");
    }

    #[test]
    fn permissions_default_to_granted() {
        let (_dir, registry, _) = registry();
        let open = registry.connect("s-1", "A", None, None);
        let limited = registry.connect("s-2", "B", None, Some(vec!["chat".to_string()]));
        let wildcard = registry.connect("s-3", "C", None, Some(vec!["*".to_string()]));

        assert!(open.has_permission("updateaccountname.confirm"));
        assert!(!limited.has_permission("updateaccountname.confirm"));
        assert!(wildcard.has_permission("updateaccountname.confirm"));
    }

    #[test]
    fn notices_after_disconnect_are_dropped() {
        let (_dir, registry, _) = registry();
        let session = registry.connect("s-1", "Alice", None, None);
        assert_eq!(registry.disconnect("s-1"), Some(vec![]));
        session.send_error("late");
        assert!(registry.drain("s-1").is_none());
        assert_eq!(registry.len(), 0);
    }
}
