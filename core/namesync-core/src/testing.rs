//! In-memory collaborators for tests and for hosts that want a dry run.
//!
//! Enabled for this crate's own tests and behind the `test-helpers` feature.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::host::{
    AccountTable, CredentialStore, Hook, HookRegistry, Session, SessionHost, SubscriptionId,
};
use crate::types::{AccountId, Identity, Notice};

const PLAIN_HASH_PREFIX: &str = "plain$";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A session that records every notice it is sent.
pub struct FakeSession {
    display_name: String,
    identity: Mutex<Option<Identity>>,
    permitted: AtomicBool,
    notices: Mutex<Vec<Notice>>,
}

impl FakeSession {
    pub fn logged_in(display_name: &str, identity: Identity) -> Arc<Self> {
        Arc::new(Self {
            display_name: display_name.to_string(),
            identity: Mutex::new(Some(identity)),
            permitted: AtomicBool::new(true),
            notices: Mutex::new(Vec::new()),
        })
    }

    pub fn anonymous(display_name: &str) -> Arc<Self> {
        Arc::new(Self {
            display_name: display_name.to_string(),
            identity: Mutex::new(None),
            permitted: AtomicBool::new(true),
            notices: Mutex::new(Vec::new()),
        })
    }

    /// Rebind the session, as a host does after the account is renamed.
    pub fn set_identity(&self, identity: Identity) {
        *lock(&self.identity) = Some(identity);
    }

    pub fn log_out(&self) {
        *lock(&self.identity) = None;
    }

    pub fn deny_permissions(&self) {
        self.permitted.store(false, Ordering::SeqCst);
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *lock(&self.notices))
    }
}

impl Session for FakeSession {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn identity(&self) -> Option<Identity> {
        lock(&self.identity).clone()
    }

    fn has_permission(&self, _permission: &str) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    fn send(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

/// Session host and hook registry in one. Hooks are invoked synchronously by
/// the `fire_*` / `run_command` helpers.
#[derive(Default)]
pub struct FakeHost {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    hooks: Mutex<BTreeMap<SubscriptionId, Hook>>,
    next_id: AtomicU64,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` discoverable. The newest session wins a name lookup.
    pub fn connect(&self, session: Arc<FakeSession>) {
        lock(&self.sessions).push(session);
    }

    pub fn disconnect(&self, display_name: &str) {
        lock(&self.sessions).retain(|session| session.display_name != display_name);
    }

    pub fn hook_count(&self) -> usize {
        lock(&self.hooks).len()
    }

    pub fn has_command(&self, name: &str) -> bool {
        lock(&self.hooks)
            .values()
            .any(|hook| matches!(hook, Hook::Command { name: n, .. } if n == name))
    }

    /// Connect `session` and fire the session-start hooks for it.
    pub fn login(&self, session: Arc<FakeSession>) {
        self.connect(session.clone());
        for hook in self.hooks_snapshot() {
            if let Hook::SessionStart(handler) = hook {
                handler(session.as_ref());
            }
        }
    }

    pub fn fire_tick(&self) {
        for hook in self.hooks_snapshot() {
            if let Hook::Tick(handler) = hook {
                handler();
            }
        }
    }

    /// Returns `false` when no command with that name is registered.
    pub fn run_command(&self, session: &FakeSession, name: &str, args: &[&str]) -> bool {
        let handler = self.hooks_snapshot().into_iter().find_map(|hook| match hook {
            Hook::Command { name: n, handler } if n == name => Some(handler),
            _ => None,
        });
        match handler {
            Some(handler) => {
                handler(session, args.iter().map(|arg| arg.to_string()).collect());
                true
            }
            None => false,
        }
    }

    fn hooks_snapshot(&self) -> Vec<Hook> {
        lock(&self.hooks).values().cloned().collect()
    }
}

impl SessionHost for FakeHost {
    fn find_session_by_display_name(&self, name: &str) -> Option<Arc<dyn Session>> {
        lock(&self.sessions)
            .iter()
            .rev()
            .find(|session| session.display_name == name)
            .map(|session| session.clone() as Arc<dyn Session>)
    }
}

impl HookRegistry for FakeHost {
    fn subscribe(&self, hook: Hook) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.hooks).insert(id, hook);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.hooks).remove(&id);
    }
}

/// Account table with plaintext-tagged "hashes" and switchable failures.
#[derive(Default)]
pub struct MemoryAccounts {
    accounts: Mutex<HashMap<AccountId, Identity>>,
    fail_lookups: AtomicBool,
    fail_verification: AtomicBool,
    fail_renames: AtomicBool,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: AccountId, name: &str, password: &str) {
        lock(&self.accounts).insert(
            id,
            Identity::new(id, name, format!("{}{}", PLAIN_HASH_PREFIX, password)),
        );
    }

    pub fn identity(&self, id: AccountId) -> Option<Identity> {
        lock(&self.accounts).get(&id).cloned()
    }

    pub fn name_of(&self, id: AccountId) -> Option<String> {
        self.identity(id).map(|identity| identity.account_name)
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_verification(&self, fail: bool) {
        self.fail_verification.store(fail, Ordering::SeqCst);
    }

    pub fn fail_renames(&self, fail: bool) {
        self.fail_renames.store(fail, Ordering::SeqCst);
    }
}

impl CredentialStore for MemoryAccounts {
    fn get_account_by_name(&self, name: &str) -> Result<Option<Identity>, StoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Query("lookup disabled".to_string()));
        }
        Ok(lock(&self.accounts)
            .values()
            .find(|identity| identity.account_name == name)
            .cloned())
    }

    fn verify_password(&self, plain: &str, stored_hash: &str) -> Result<bool, StoreError> {
        if self.fail_verification.load(Ordering::SeqCst) {
            return Err(StoreError::Query("verification disabled".to_string()));
        }
        match stored_hash.strip_prefix(PLAIN_HASH_PREFIX) {
            Some(expected) => Ok(expected == plain),
            None => Err(StoreError::MalformedHash(stored_hash.to_string())),
        }
    }
}

impl AccountTable for MemoryAccounts {
    fn rename_account(&self, id: AccountId, new_name: &str) -> Result<(), StoreError> {
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err(StoreError::Query("writes disabled".to_string()));
        }
        let mut accounts = lock(&self.accounts);
        if accounts
            .values()
            .any(|identity| identity.account_name == new_name && identity.account_id != id)
        {
            return Err(StoreError::Query(format!(
                "UNIQUE constraint failed: accounts.name ({})",
                new_name
            )));
        }
        match accounts.get_mut(&id) {
            Some(identity) => {
                identity.account_name = new_name.to_string();
                Ok(())
            }
            None => Err(StoreError::AccountNotFound(id)),
        }
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
