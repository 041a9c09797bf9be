//! Runtime configuration.
//!
//! Loaded from `~/.namesync/namesync.toml`. A missing file yields defaults;
//! a present but invalid file is an error so typos are not silently ignored.
//! Hosts may embed these sections in a larger file (see the daemon config).

use chrono::Duration;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_COMMAND_NAME: &str = "confirmname";
pub const DEFAULT_COMMAND_PERMISSION: &str = "updateaccountname.confirm";
const MAX_REMINDER_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;
const CONFIG_DIR: &str = ".namesync";
const CONFIG_FILE: &str = "namesync.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NameSyncConfig {
    pub reminder: ReminderConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReminderConfig {
    pub interval_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
        }
    }
}

impl ReminderConfig {
    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_secs.min(MAX_REMINDER_INTERVAL_SECS) as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandConfig {
    pub name: String,
    pub permission: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMMAND_NAME.to_string(),
            permission: DEFAULT_COMMAND_PERMISSION.to_string(),
        }
    }
}

impl NameSyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reminder.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "reminder.interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.reminder.interval_secs > MAX_REMINDER_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                field: "reminder.interval_secs",
                reason: format!("must be at most {}", MAX_REMINDER_INTERVAL_SECS),
            });
        }
        let name = self.command.name.as_str();
        if name.is_empty() || name.starts_with('/') || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "command.name",
                reason: format!("'{}' is not a valid command name", name),
            });
        }
        if self.command.permission.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "command.permission",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load and validate a config file. `None` means the default location.
pub fn load_config(path: Option<PathBuf>) -> Result<NameSyncConfig, ConfigError> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(NameSyncConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    let config = toml::from_str::<NameSyncConfig>(&content).map_err(|err| ConfigError::Parse {
        path: config_path.clone(),
        details: err.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(Some(temp_dir.path().join("missing.toml"))).expect("load");
        assert_eq!(config, NameSyncConfig::default());
        assert_eq!(config.reminder.interval(), Duration::seconds(600));
        assert_eq!(config.command.name, "confirmname");
    }

    #[test]
    fn parses_partial_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("namesync.toml");
        fs_err::write(
            &path,
            r#"
[reminder]
interval_secs = 30
"#,
        )
        .expect("write config");

        let config = load_config(Some(path)).expect("load");
        assert_eq!(config.reminder.interval_secs, 30);
        assert_eq!(config.command.permission, DEFAULT_COMMAND_PERMISSION);
    }

    #[test]
    fn rejects_zero_interval() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("namesync.toml");
        fs_err::write(&path, "[reminder]\ninterval_secs = 0\n").expect("write config");

        let err = load_config(Some(path)).expect_err("zero interval must fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "reminder.interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn rejects_command_name_with_slash() {
        let mut config = NameSyncConfig::default();
        config.command.name = "/confirmname".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_section_key_is_a_parse_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("namesync.toml");
        fs_err::write(&path, "[reminder]\ninterval = 5\n").expect("write config");

        let err = load_config(Some(path)).expect_err("typo must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
