//! Wiring: builds the components from their collaborators and registers the
//! hooks with the host.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::command::ConfirmNameCommand;
use crate::config::NameSyncConfig;
use crate::error::ConfigError;
use crate::events::SessionEvents;
use crate::host::{
    AccountTable, CredentialStore, Hook, HookRegistry, Session, SessionHost, SubscriptionId,
};
use crate::renamer::AccountRenamer;
use crate::tracker::ReconciliationTracker;
use crate::verifier::CredentialVerifier;

/// Everything the core needs from the host.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionHost>,
    pub credentials: Arc<dyn CredentialStore>,
    pub accounts: Arc<dyn AccountTable>,
    pub clock: Arc<dyn Clock>,
}

pub struct NameSync {
    tracker: Arc<ReconciliationTracker>,
    events: Arc<SessionEvents>,
    command: Arc<ConfirmNameCommand>,
}

impl NameSync {
    pub fn new(config: NameSyncConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;

        let tracker = Arc::new(ReconciliationTracker::new());
        let gate = Arc::new(Mutex::new(()));
        let events = Arc::new(SessionEvents::new(
            tracker.clone(),
            collaborators.sessions,
            collaborators.clock,
            gate.clone(),
            config.reminder.interval(),
            config.command.name.clone(),
        ));
        let command = Arc::new(ConfirmNameCommand::new(
            tracker.clone(),
            CredentialVerifier::new(collaborators.credentials.clone()),
            AccountRenamer::new(collaborators.credentials, collaborators.accounts),
            gate,
            config.command.name,
            config.command.permission,
        ));

        Ok(Self {
            tracker,
            events,
            command,
        })
    }

    pub fn tracker(&self) -> &Arc<ReconciliationTracker> {
        &self.tracker
    }

    pub fn events(&self) -> &Arc<SessionEvents> {
        &self.events
    }

    pub fn command(&self) -> &Arc<ConfirmNameCommand> {
        &self.command
    }

    /// Subscribe the session-start, tick and command hooks.
    ///
    /// They stay registered until the returned [`Registration`] is shut down
    /// or dropped.
    pub fn initialize(&self, registry: Arc<dyn HookRegistry>) -> Registration {
        let events = self.events.clone();
        let on_start = Hook::SessionStart(Arc::new(move |session: &dyn Session| {
            events.on_session_start(session);
        }));

        let events = self.events.clone();
        let on_tick = Hook::Tick(Arc::new(move || {
            events.on_tick();
        }));

        let command = self.command.clone();
        let on_command = Hook::Command {
            name: self.command.name().to_string(),
            handler: Arc::new(move |session: &dyn Session, args: Vec<String>| {
                command.execute(session, args);
            }),
        };

        let ids = [on_start, on_tick, on_command]
            .into_iter()
            .map(|hook| registry.subscribe(hook))
            .collect::<Vec<_>>();
        info!(
            hooks = ids.len(),
            command = %self.command.name(),
            "Name sync hooks registered"
        );

        Registration { registry, ids }
    }
}

/// Holds the hook subscriptions made by [`NameSync::initialize`] and releases
/// them exactly once.
#[must_use = "dropping the registration unsubscribes every hook"]
pub struct Registration {
    registry: Arc<dyn HookRegistry>,
    ids: Vec<SubscriptionId>,
}

impl Registration {
    pub fn subscriptions(&self) -> &[SubscriptionId] {
        &self.ids
    }

    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        for id in self.ids.drain(..) {
            self.registry.unsubscribe(id);
        }
        debug!("Name sync hooks released");
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}
