//! Layered supervisor configuration

use alerting::AlertsConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    pub database: DatabaseConfig,
    pub supervisor: LoopConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
    /// Create missing tables on startup
    pub init_schema: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    /// Pause between cycles in seconds
    pub interval_secs: u64,
    /// Run a single cycle and exit
    #[serde(default)]
    pub once: bool,
}

impl LoopConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            once: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from the `config` directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        Self::load_with_env(config_dir.as_ref(), environment())
    }

    fn load_with_env(config_dir: &Path, env: Environment) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // Start with default values
            .set_default("database.url", "sqlite://supervisor.db?mode=rwc")?
            .set_default("database.max_connections", 1)?
            .set_default("database.init_schema", true)?
            .set_default("supervisor.interval_secs", 5)?
            .set_default("supervisor.once", false)?
            .set_default("alerts.alertd_path", "instance/alert.d")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SUPERVISOR_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Environment variables win: SUPERVISOR_DATABASE__URL, SUPERVISOR_LOGGING__JSON, ...
            .add_source(env);

        builder.build()?.try_deserialize()
    }
}

/// `SUPERVISOR_` prefix, `__` between nested keys
fn environment() -> Environment {
    Environment::with_prefix("SUPERVISOR")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;
    use std::fs;

    #[test]
    fn test_defaults_without_files() {
        let dir = std::env::temp_dir().join("supervisor-config-defaults");
        let config = SupervisorConfig::load_from(&dir).unwrap();

        assert_eq!(config.supervisor.interval(), Duration::from_secs(5));
        assert!(!config.supervisor.once);
        assert_eq!(config.database.max_connections, 1);
        assert!(config.alerts.subscribers.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "supervisor-config-file-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            r#"
            [supervisor]
            interval_secs = 30

            [alerts]
            alertd_path = "/etc/supervisor/alert.d"

            [[alerts.subscribers]]
            name = "ops"
            plugin = "email.sh"
            args = ["ops@example.com"]
            "#,
        )
        .unwrap();

        let config = SupervisorConfig::load_from(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.supervisor.interval_secs, 30);
        assert_eq!(config.alerts.subscribers.len(), 1);
        assert_eq!(config.alerts.subscribers[0].name, "ops");
        assert_eq!(
            config.alerts.alertd_path,
            std::path::PathBuf::from("/etc/supervisor/alert.d")
        );
    }

    #[test]
    fn test_environment_overrides_files() {
        let dir = std::env::temp_dir().join(format!(
            "supervisor-config-env-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            "[database]\nurl = \"sqlite://from-file.db\"\n",
        )
        .unwrap();

        let vars: Map<String, String> = [
            ("SUPERVISOR_DATABASE__URL", "sqlite://from-env.db"),
            ("SUPERVISOR_SUPERVISOR__INTERVAL_SECS", "9"),
            ("SUPERVISOR_LOGGING__JSON", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config =
            SupervisorConfig::load_with_env(&dir, environment().source(Some(vars))).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.database.url, "sqlite://from-env.db");
        assert_eq!(config.supervisor.interval_secs, 9);
        assert!(config.logging.json);
    }
}
