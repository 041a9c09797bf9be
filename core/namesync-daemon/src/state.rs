//! Daemon state shared across connection threads and the tick thread.

use chrono::{DateTime, Utc};
use namesync_core::{
    Clock, Collaborators, ConfigError, CredentialStore, NameSync, Registration, Session,
};
use namesync_protocol::{
    AccountCreated, CommandParams, ErrorInfo, Message, PendingEntry, RegisterAccountParams,
    SessionParams, SessionReply, SessionStartParams,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accounts::{RegisterOutcome, SqliteAccounts};
use crate::config::DaemonConfig;
use crate::db::Db;
use crate::hooks::HookDispatcher;
use crate::sessions::SessionRegistry;

const UNKNOWN_COMMAND: &str = "Invalid command entered. Type /help for a list of valid commands.";

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub started_at: DateTime<Utc>,
    pub accounts: i64,
    pub sessions: usize,
    pub pending: usize,
    pub hooks: usize,
    pub commands: Vec<String>,
    pub tick_interval_ms: u64,
    pub reminder_interval_secs: u64,
}

pub struct SharedState {
    accounts: Arc<SqliteAccounts>,
    sessions: SessionRegistry,
    hooks: Arc<HookDispatcher>,
    namesync: NameSync,
    config: DaemonConfig,
    started_at: DateTime<Utc>,
    _registration: Registration,
}

impl SharedState {
    pub fn new(db: Db, config: DaemonConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let accounts = Arc::new(SqliteAccounts::new(Arc::new(db)));
        let sessions = SessionRegistry::new(accounts.clone(), config.daemon.max_outbox);
        let hooks = Arc::new(HookDispatcher::new());
        let started_at = clock.now();

        let namesync = NameSync::new(
            config.namesync.clone(),
            Collaborators {
                sessions: Arc::new(sessions.clone()),
                credentials: accounts.clone(),
                accounts: accounts.clone(),
                clock,
            },
        )?;
        let registration = namesync.initialize(hooks.clone());

        Ok(Self {
            accounts,
            sessions,
            hooks,
            namesync,
            config,
            started_at,
            _registration: registration,
        })
    }

    pub fn tick(&self) {
        self.hooks.dispatch_tick();
    }

    pub fn health(&self) -> HealthSnapshot {
        let accounts = self.accounts.count().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to count accounts for health snapshot");
            -1
        });
        HealthSnapshot {
            started_at: self.started_at,
            accounts,
            sessions: self.sessions.len(),
            pending: self.namesync.tracker().len(),
            hooks: self.hooks.len(),
            commands: self.hooks.commands(),
            tick_interval_ms: self.config.daemon.tick_interval_ms,
            reminder_interval_secs: self.config.namesync.reminder.interval_secs,
        }
    }

    pub fn register_account(
        &self,
        params: RegisterAccountParams,
    ) -> Result<AccountCreated, ErrorInfo> {
        match self.accounts.register(&params.name, &params.password) {
            Ok(RegisterOutcome::Created(identity)) => {
                info!(
                    account_id = identity.account_id,
                    name = %identity.account_name,
                    "Account registered"
                );
                Ok(AccountCreated {
                    account_id: identity.account_id,
                    name: identity.account_name,
                })
            }
            Ok(RegisterOutcome::NameTaken) => Err(ErrorInfo::new(
                "name_taken",
                format!("an account named {} already exists", params.name),
            )),
            Err(err) => Err(ErrorInfo::new("account_error", err)),
        }
    }

    /// Connect a session and fire the session-start hooks for it.
    pub fn session_start(&self, params: SessionStartParams) -> Result<SessionReply, ErrorInfo> {
        let account_id = match &params.account_name {
            None => None,
            Some(name) => match self.accounts.get_account_by_name(name) {
                Ok(Some(identity)) => Some(identity.account_id),
                Ok(None) => {
                    return Err(ErrorInfo::new(
                        "unknown_account",
                        format!("no account named {}", name),
                    ))
                }
                Err(err) => return Err(ErrorInfo::new("account_error", err.to_string())),
            },
        };

        let session = self.sessions.connect(
            &params.session_id,
            &params.display_name,
            account_id,
            params.permissions,
        );
        info!(
            session_id = %params.session_id,
            display_name = %params.display_name,
            account_id = ?account_id,
            "Session started"
        );
        self.hooks.dispatch_session_start(&session);

        self.reply(&params.session_id, true)
    }

    pub fn session_end(&self, params: SessionParams) -> Result<SessionReply, ErrorInfo> {
        let messages = self
            .sessions
            .disconnect(&params.session_id)
            .ok_or_else(|| unknown_session(&params.session_id))?;
        info!(session_id = %params.session_id, "Session ended");
        Ok(SessionReply {
            session_id: params.session_id,
            handled: true,
            messages,
        })
    }

    pub fn command(&self, params: CommandParams) -> Result<SessionReply, ErrorInfo> {
        let session = self
            .sessions
            .get(&params.session_id)
            .ok_or_else(|| unknown_session(&params.session_id))?;
        // Arguments may carry a password; only the name is logged.
        debug!(
            session_id = %params.session_id,
            command = %params.name,
            args = params.args.len(),
            "Command received"
        );

        let handled = self
            .hooks
            .dispatch_command(&session, &params.name, params.args);
        if !handled {
            session.send_error(UNKNOWN_COMMAND);
        }

        self.reply(&params.session_id, handled)
    }

    pub fn drain_messages(&self, params: SessionParams) -> Result<SessionReply, ErrorInfo> {
        self.reply(&params.session_id, true)
    }

    pub fn pending(&self) -> Vec<PendingEntry> {
        self.namesync
            .tracker()
            .snapshot()
            .into_iter()
            .map(|entry| PendingEntry {
                key: entry.key,
                account_id: entry.account_id,
                opened_at: entry.opened_at,
                last_reminder_at: entry.last_reminder_at,
            })
            .collect()
    }

    fn reply(&self, session_id: &str, handled: bool) -> Result<SessionReply, ErrorInfo> {
        let messages: Vec<Message> = self
            .sessions
            .drain(session_id)
            .ok_or_else(|| unknown_session(session_id))?;
        Ok(SessionReply {
            session_id: session_id.to_string(),
            handled,
            messages,
        })
    }
}

fn unknown_session(session_id: &str) -> ErrorInfo {
    ErrorInfo::new("unknown_session", format!("no session {}", session_id))
}
