//! Hook registry for the daemon.
//!
//! Handlers are cloned out of the lock before they run, so a handler may
//! subscribe or unsubscribe without deadlocking.

use namesync_core::{Hook, HookRegistry, Session, SubscriptionId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Default)]
pub struct HookDispatcher {
    hooks: Mutex<BTreeMap<SubscriptionId, Hook>>,
    next_id: AtomicU64,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .values()
            .filter_map(|hook| match hook {
                Hook::Command { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn dispatch_session_start(&self, session: &dyn Session) {
        for hook in self.snapshot() {
            if let Hook::SessionStart(handler) = hook {
                handler(session);
            }
        }
    }

    pub fn dispatch_tick(&self) {
        for hook in self.snapshot() {
            if let Hook::Tick(handler) = hook {
                handler();
            }
        }
    }

    /// Run the command registered under `name`. Matching ignores case and a
    /// leading `/`. Returns false when no command matched.
    pub fn dispatch_command(&self, session: &dyn Session, name: &str, args: Vec<String>) -> bool {
        let wanted = name.trim_start_matches('/');
        let handler = self.snapshot().into_iter().find_map(|hook| match hook {
            Hook::Command { name, handler } if name.eq_ignore_ascii_case(wanted) => Some(handler),
            _ => None,
        });
        match handler {
            Some(handler) => {
                handler(session, args);
                true
            }
            None => {
                debug!(command = %wanted, "No handler registered for command");
                false
            }
        }
    }

    fn snapshot(&self) -> Vec<Hook> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubscriptionId, Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HookRegistry for HookDispatcher {
    fn subscribe(&self, hook: Hook) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        debug!(id = id.0, kind = hook.kind(), "Hook subscribed");
        self.lock().insert(id, hook);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(hook) = self.lock().remove(&id) {
            debug!(id = id.0, kind = hook.kind(), "Hook unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use namesync_core::testing::FakeSession;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn commands_match_case_insensitively_with_slash() {
        let dispatcher = HookDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        dispatcher.subscribe(Hook::Command {
            name: "confirmname".to_string(),
            handler: Arc::new(move |_session: &dyn Session, args: Vec<String>| {
                assert_eq!(args, vec!["pw".to_string()]);
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        });

        let session = FakeSession::anonymous("Alice");
        assert!(dispatcher.dispatch_command(session.as_ref(), "/ConfirmName", vec!["pw".into()]));
        assert!(!dispatcher.dispatch_command(session.as_ref(), "help", vec![]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_hooks_do_not_fire() {
        let dispatcher = HookDispatcher::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let seen = ticks.clone();
        let id = dispatcher.subscribe(Hook::Tick(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        })));

        dispatcher.dispatch_tick();
        dispatcher.unsubscribe(id);
        dispatcher.dispatch_tick();

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.len(), 0);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let dispatcher = HookDispatcher::new();
        let a = dispatcher.subscribe(Hook::Tick(Arc::new(|| {})));
        let b = dispatcher.subscribe(Hook::Tick(Arc::new(|| {})));
        assert_ne!(a, b);
        assert!(dispatcher.commands().is_empty());
    }
}
