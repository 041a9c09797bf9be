//! # namesync-core
//!
//! Account name reconciliation for multiplayer session hosts.
//!
//! When a session starts under a display name that differs from the name of
//! the account it is bound to, the core opens a pending reconciliation keyed
//! by that display name, tells the user, and keeps reminding them until they
//! run the confirm command with their password. A successful confirm renames
//! the account to the display name.
//!
//! ## Design Principles
//!
//! - **Host-agnostic**: sessions, credentials and the account table are traits
//!   in [`host`]; the host decides how they are backed.
//! - **Synchronous**: no async runtime. Backend calls run on the caller's thread.
//! - **Thread-safe**: the tracker and the confirm flow are serialized internally,
//!   so hosts may dispatch hooks from any thread.
//! - **Never fails the host**: every failure becomes a message to the session
//!   plus a `tracing` entry.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use namesync_core::{Collaborators, NameSync, NameSyncConfig};
//!
//! let namesync = NameSync::new(NameSyncConfig::default(), collaborators)?;
//! let registration = namesync.initialize(registry);
//! // ... host runs, dispatching hooks ...
//! registration.shutdown();
//! ```

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod messages;
pub mod plugin;
pub mod renamer;
pub mod tracker;
pub mod types;
pub mod verifier;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use command::{ConfirmNameCommand, ConfirmOutcome};
pub use config::{load_config, CommandConfig, NameSyncConfig, ReminderConfig};
pub use error::{ConfigError, RenameError, StoreError};
pub use events::{SessionEvents, StartOutcome, SweepReport};
pub use host::{
    AccountTable, CommandHandler, CredentialStore, Hook, HookRegistry, Session,
    SessionHost, SessionStartHandler, SubscriptionId, TickHandler,
};
pub use plugin::{Collaborators, NameSync, Registration};
pub use renamer::AccountRenamer;
pub use tracker::{PendingReconciliation, ReconciliationTracker};
pub use types::{AccountId, Identity, Notice, Tone};
pub use verifier::CredentialVerifier;
