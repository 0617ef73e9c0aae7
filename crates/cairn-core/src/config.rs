use crate::platform;
use crate::scanner::WalkOptions;
use config::{Config, ConfigBuilder, ConfigError, Environment, File as ConfigFile};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = ".cairn.db";
pub const DEFAULT_COUNT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub machine_id: String,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// How long to wait for the pre-walk file count; 0 disables counting.
    pub count_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            machine_id: platform::default_machine_id(),
            ignore_patterns: Vec::new(),
            count_timeout_secs: DEFAULT_COUNT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            ignore_patterns: self.ignore_patterns.clone(),
        }
    }

    pub fn count_timeout(&self) -> Option<Duration> {
        match self.count_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Load configuration from `./cairn.{toml,yaml,json}`, then
/// `~/.cairn/config.*`, then `CAIRN_*` environment variables, over defaults.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let mut builder = defaults()?.add_source(ConfigFile::with_name("cairn").required(false));
    if let Some(user_config) = user_config_path() {
        builder = builder.add_source(
            ConfigFile::with_name(&user_config.to_string_lossy()).required(false),
        );
    }
    finish(builder)
}

/// `~/.cairn/config`, without extension; `None` when no home directory is known.
fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cairn").join("config"))
}

/// Load configuration from an explicit file (plus environment overrides).
pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = defaults()?.add_source(ConfigFile::from(path).required(true));
    finish(builder)
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let fallback = AppConfig::default();
    Config::builder()
        .set_default("database_path", DEFAULT_DATABASE_PATH)?
        .set_default("machine_id", fallback.machine_id)?
        .set_default("ignore_patterns", Vec::<String>::new())?
        .set_default("count_timeout_secs", DEFAULT_COUNT_TIMEOUT_SECS)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = builder
        .add_source(
            Environment::with_prefix("CAIRN")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?
        .try_deserialize()?;

    if config.database_path.is_relative() {
        if let Ok(cwd) = env::current_dir() {
            config.database_path = cwd.join(&config.database_path);
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cairn.toml");
        fs::write(
            &path,
            "database_path = \"/var/lib/cairn/catalog.db\"\n\
             machine_id = \"workstation\"\n\
             ignore_patterns = [\"*.tmp\", \"*/target\"]\n\
             count_timeout_secs = 5\n",
        )
        .unwrap();

        let config = load_configuration_from(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/cairn/catalog.db"));
        assert_eq!(config.machine_id, "workstation");
        assert_eq!(config.ignore_patterns, vec!["*.tmp", "*/target"]);
        assert_eq!(config.count_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cairn.toml");
        fs::write(&path, "count_timeout_secs = 0\n").unwrap();

        let config = load_configuration_from(&path).unwrap();
        assert!(config.database_path.is_absolute());
        assert!(config.database_path.ends_with(DEFAULT_DATABASE_PATH));
        assert!(!config.machine_id.is_empty());
        assert!(config.ignore_patterns.is_empty());
        assert_eq!(config.count_timeout(), None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_configuration_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_user_config_lives_under_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let path = user_config_path().unwrap();
        assert!(path.starts_with(&home));
        assert!(path.ends_with(".cairn/config"));
    }
}
