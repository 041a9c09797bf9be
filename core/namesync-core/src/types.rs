//! Shared DTOs passed between the core and its host.

use serde::{Deserialize, Serialize};

/// Stable account identifier, as assigned by the account table.
pub type AccountId = i64;

/// An account record as seen through the credential store.
///
/// `password_hash` is opaque to the core and only ever handed back to
/// [`CredentialStore::verify_password`](crate::host::CredentialStore::verify_password).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub account_id: AccountId,
    pub account_name: String,
    #[serde(skip)]
    pub password_hash: String,
}

impl Identity {
    pub fn new(
        account_id: AccountId,
        account_name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            account_name: account_name.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// How a host should present a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Info,
    Error,
    Success,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Info => write!(f, "info"),
            Tone::Error => write!(f, "error"),
            Tone::Success => write!(f, "success"),
        }
    }
}

/// A single line of feedback addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub tone: Tone,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Error,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Success,
            text: text.into(),
        }
    }
}
