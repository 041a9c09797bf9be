//! Pending reconciliation tracking.
//!
//! One entry per key, where the key is the display name the mismatch was
//! detected under. Entries live until a successful confirm clears them; there
//! is no expiry. Because the key is a display name and not an account id, an
//! account that reconnects under yet another name gets a second entry and the
//! first one can never be matched by a session again. Callers can spot that
//! with [`ReconciliationTracker::keys_for_account`].
//!
//! # Reminder timing
//!
//! The first [`reminder_due`](ReconciliationTracker::reminder_due) check after
//! an entry is opened only arms the timer: it records `now` and reports "not
//! due", so the user is not reminded right after the detection notice. Every
//! later check compares the elapsed time with the interval.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReconciliation {
    pub key: String,
    pub account_id: AccountId,
    pub opened_at: DateTime<Utc>,
    pub last_reminder_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ReconciliationTracker {
    entries: Mutex<HashMap<String, PendingReconciliation>>,
}

impl ReconciliationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending entry for `key` unless one exists.
    ///
    /// Returns `true` when a new entry was created.
    pub fn open(&self, key: &str, account_id: AccountId, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(
            key.to_string(),
            PendingReconciliation {
                key: key.to_string(),
                account_id,
                opened_at: now,
                last_reminder_at: None,
            },
        );
        true
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Whether a reminder should be sent for `key` at `now`.
    ///
    /// Arms the timer (and returns `false`) on the first call after `open`.
    /// A clock that went backwards never makes a reminder due.
    pub fn reminder_due(&self, key: &str, now: DateTime<Utc>, interval: Duration) -> bool {
        let mut entries = self.lock();
        let entry = match entries.get_mut(key) {
            Some(entry) => entry,
            None => return false,
        };

        match entry.last_reminder_at {
            None => {
                entry.last_reminder_at = Some(now);
                false
            }
            Some(last) => now.signed_duration_since(last) >= interval,
        }
    }

    pub fn touch(&self, key: &str, now: DateTime<Utc>) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.last_reminder_at = Some(now);
        }
    }

    /// Remove the entry for `key`. Returns `true` if one was present.
    pub fn clear(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Copy of the current keys, sorted so sweeps are deterministic.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys opened on behalf of `account_id`, sorted.
    pub fn keys_for_account(&self, account_id: AccountId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .values()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn snapshot(&self) -> Vec<PendingReconciliation> {
        let mut entries: Vec<PendingReconciliation> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Every critical section is a single map operation, so a poisoned map is
    // still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingReconciliation>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
