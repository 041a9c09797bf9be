//! Interfaces the core consumes from its host.
//!
//! The host owns connections, authentication and persistence. The core only
//! sees them through these traits and never caches what they return beyond a
//! single operation.

use std::sync::Arc;

use crate::error::StoreError;
use crate::types::{AccountId, Identity, Notice};

/// A live connection as presented by the host.
pub trait Session: Send + Sync {
    /// Name presented for this session (player/character name).
    fn display_name(&self) -> &str;

    /// Account this session is logged in as, or `None` when unauthenticated.
    fn identity(&self) -> Option<Identity>;

    /// Whether the session may run a command guarded by `permission`.
    fn has_permission(&self, _permission: &str) -> bool {
        true
    }

    /// Deliver a notice to the user behind this session.
    fn send(&self, notice: Notice);

    fn send_info(&self, text: &str) {
        self.send(Notice::info(text));
    }

    fn send_error(&self, text: &str) {
        self.send(Notice::error(text));
    }

    fn send_success(&self, text: &str) {
        self.send(Notice::success(text));
    }
}

/// Lookup of live sessions.
pub trait SessionHost: Send + Sync {
    /// The session currently connected under `name`, if any.
    fn find_session_by_display_name(&self, name: &str) -> Option<Arc<dyn Session>>;
}

/// Read side of the account store plus password verification.
///
/// Hash scheme specifics stay behind this trait.
pub trait CredentialStore: Send + Sync {
    fn get_account_by_name(&self, name: &str) -> Result<Option<Identity>, StoreError>;

    fn verify_password(&self, plain: &str, stored_hash: &str) -> Result<bool, StoreError>;
}

/// Write side of the persisted account table.
pub trait AccountTable: Send + Sync {
    fn rename_account(&self, id: AccountId, new_name: &str) -> Result<(), StoreError>;
}

pub type SessionStartHandler = Arc<dyn Fn(&dyn Session) + Send + Sync>;
pub type TickHandler = Arc<dyn Fn() + Send + Sync>;
/// Receives the invoking session and the positional arguments, which it owns
/// (and may wipe) from then on.
pub type CommandHandler = Arc<dyn Fn(&dyn Session, Vec<String>) + Send + Sync>;

/// A callback the core asks the host to invoke.
#[derive(Clone)]
pub enum Hook {
    /// Fired after a session has logged in.
    SessionStart(SessionStartHandler),
    /// Fired on a regular cadence (e.g. once per server frame).
    Tick(TickHandler),
    /// A user-invocable chat command.
    Command {
        name: String,
        handler: CommandHandler,
    },
}

impl Hook {
    pub fn kind(&self) -> &'static str {
        match self {
            Hook::SessionStart(_) => "session_start",
            Hook::Tick(_) => "tick",
            Hook::Command { .. } => "command",
        }
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hook::Command { name, .. } => f.debug_struct("Command").field("name", name).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Where hooks are registered. Every `subscribe` is paired with exactly one
/// `unsubscribe` by [`Registration`](crate::plugin::Registration).
pub trait HookRegistry: Send + Sync {
    fn subscribe(&self, hook: Hook) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}
