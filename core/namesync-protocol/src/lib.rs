//! IPC protocol types and validation for namesync-daemon.
//!
//! Shared by the daemon and `namesync-ctl` so both sides agree on the schema.
//! One JSON request per line, one JSON response per line. The daemon remains
//! the authority on validation.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;
pub const MAX_NAME_CHARS: usize = 64;
pub const MAX_ARGS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    RegisterAccount,
    SessionStart,
    SessionEnd,
    Command,
    DrainMessages,
    GetPending,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Params
// ─────────────────────────────────────────────────────────────────────────────

pub trait Params: DeserializeOwned {
    fn validate(&self) -> Result<(), ErrorInfo>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterAccountParams {
    pub name: String,
    pub password: String,
}

impl Params for RegisterAccountParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_name(&self.name, "name")?;
        if self.password.is_empty() {
            return Err(ErrorInfo::new("missing_field", "password is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionStartParams {
    pub session_id: String,
    pub display_name: String,
    /// Account the session has authenticated as; absent for guests.
    #[serde(default)]
    pub account_name: Option<String>,
    /// Explicit permission set. `None` grants everything.
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl Params for SessionStartParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_session_id(&self.session_id)?;
        require_name(&self.display_name, "display_name")?;
        if let Some(account_name) = &self.account_name {
            require_name(account_name, "account_name")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionParams {
    pub session_id: String,
}

impl Params for SessionParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_session_id(&self.session_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandParams {
    pub session_id: String,
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Params for CommandParams {
    fn validate(&self) -> Result<(), ErrorInfo> {
        require_session_id(&self.session_id)?;
        let name = self.name.trim_start_matches('/');
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ErrorInfo::new("invalid_command", "command name is invalid"));
        }
        if self.args.len() > MAX_ARGS {
            return Err(ErrorInfo::new(
                "invalid_command",
                format!("at most {} arguments are accepted", MAX_ARGS),
            ));
        }
        Ok(())
    }
}

pub fn parse_params<P: Params>(params: Option<Value>) -> Result<P, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new("invalid_params", "params are required"))?;
    let parsed: P = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new("invalid_params", format!("params are invalid: {}", err))
    })?;
    parsed.validate()?;
    Ok(parsed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Replies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTone {
    Info,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub tone: MessageTone,
    pub text: String,
}

/// Messages queued for a session, returned by every session-scoped method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReply {
    pub session_id: String,
    #[serde(default)]
    pub handled: bool,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub account_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub key: String,
    pub account_id: i64,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub last_reminder_at: Option<DateTime<Utc>>,
}

fn require_session_id(value: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new("missing_field", "session_id is required"));
    }
    if value.len() > 128 {
        return Err(ErrorInfo::new(
            "invalid_session_id",
            "session_id must be 128 characters or fewer",
        ));
    }
    Ok(())
}

fn require_name(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if value.chars().count() > MAX_NAME_CHARS {
        return Err(ErrorInfo::new(
            "invalid_name",
            format!("{} must be {} characters or fewer", field, MAX_NAME_CHARS),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(ErrorInfo::new(
            "invalid_name",
            format!("{} must not contain control characters", field),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_session_start_with_defaults() {
        let params: SessionStartParams = parse_params(Some(json!({
            "session_id": "s-1",
            "display_name": "Alice99",
            "account_name": "Alice"
        })))
        .expect("valid params");
        assert_eq!(params.account_name.as_deref(), Some("Alice"));
        assert!(params.permissions.is_none());
    }

    #[test]
    fn rejects_missing_params() {
        let err = parse_params::<SessionParams>(None).expect_err("params required");
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = parse_params::<SessionParams>(Some(json!({
            "session_id": "s-1",
            "extra": true
        })))
        .expect_err("unknown field");
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_blank_display_name() {
        let err = parse_params::<SessionStartParams>(Some(json!({
            "session_id": "s-1",
            "display_name": "   "
        })))
        .expect_err("blank name");
        assert_eq!(err.code, "missing_field");
    }

    #[test]
    fn rejects_control_characters_in_names() {
        let err = parse_params::<RegisterAccountParams>(Some(json!({
            "name": "Al\nice",
            "password": "pw"
        })))
        .expect_err("control char");
        assert_eq!(err.code, "invalid_name");
    }

    #[test]
    fn command_accepts_leading_slash_and_limits_args() {
        let params: CommandParams = parse_params(Some(json!({
            "session_id": "s-1",
            "name": "/confirmname",
            "args": ["pw"]
        })))
        .expect("valid command");
        assert_eq!(params.args, vec!["pw".to_string()]);

        let args: Vec<String> = (0..=MAX_ARGS).map(|i| i.to_string()).collect();
        let err = parse_params::<CommandParams>(Some(json!({
            "session_id": "s-1",
            "name": "confirmname",
            "args": args
        })))
        .expect_err("too many args");
        assert_eq!(err.code, "invalid_command");
    }

    #[test]
    fn method_names_are_snake_case() {
        let request: Request = serde_json::from_value(json!({
            "protocol_version": PROTOCOL_VERSION,
            "method": "drain_messages",
            "params": {"session_id": "s-1"}
        }))
        .expect("request");
        assert_eq!(request.method, Method::DrainMessages);
    }
}
