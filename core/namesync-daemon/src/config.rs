//! Daemon configuration: the core `[reminder]`/`[command]` sections plus a
//! `[daemon]` section for the host loop.

use namesync_core::{ConfigError, NameSyncConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_OUTBOX: usize = 256;
const MIN_TICK_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub namesync: NameSyncConfig,
    pub daemon: DaemonSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSection {
    pub tick_interval_ms: u64,
    pub max_outbox: usize,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_outbox: DEFAULT_MAX_OUTBOX,
        }
    }
}

impl DaemonSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.namesync.validate()?;
        if self.daemon.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                field: "daemon.tick_interval_ms",
                reason: format!("must be at least {}", MIN_TICK_INTERVAL_MS),
            });
        }
        if self.daemon.max_outbox == 0 {
            return Err(ConfigError::Invalid {
                field: "daemon.max_outbox",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

pub fn load_daemon_config(config_path: PathBuf) -> Result<DaemonConfig, ConfigError> {
    if !config_path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    let config = toml::from_str::<DaemonConfig>(&content).map_err(|err| ConfigError::Parse {
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
        let config = load_daemon_config(temp_dir.path().join("missing.toml")).expect("load");
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.daemon.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parses_all_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("namesync.toml");
        fs_err::write(
            &path,
            r#"
[reminder]
interval_secs = 30

[command]
name = "syncname"

[daemon]
tick_interval_ms = 250
"#,
        )
        .expect("write config");

        let config = load_daemon_config(path).expect("load");
        assert_eq!(config.namesync.reminder.interval_secs, 30);
        assert_eq!(config.namesync.command.name, "syncname");
        assert_eq!(
            config.namesync.command.permission,
            "updateaccountname.confirm"
        );
        assert_eq!(config.daemon.tick_interval_ms, 250);
        assert_eq!(config.daemon.max_outbox, 256);
    }

    #[test]
    fn rejects_unknown_daemon_keys() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("namesync.toml");
        fs_err::write(&path, "[daemon]\ntick_ms = 5\n").expect("write config");

        let err = load_daemon_config(path).expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_tiny_tick_interval() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("namesync.toml");
        fs_err::write(&path, "[daemon]\ntick_interval_ms = 1\n").expect("write config");

        let err = load_daemon_config(path).expect_err("too fast");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "daemon.tick_interval_ms",
                ..
            }
        ));
    }
}
