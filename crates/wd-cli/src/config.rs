//! Runtime configuration for the `wd` binary.
//!
//! Only process-level knobs live here: where the database is and how often
//! `wd watch` ticks the engine. Work, break, and reminder durations are user
//! settings stored in the database and changed with `wd settings`.
//!
//! Layers, later ones winning:
//! 1. built-in defaults
//! 2. `<config dir>/workday/config.toml`
//! 3. the file given with `--config`
//! 4. `WD_DATABASE_PATH` and `WD_TICK_INTERVAL_MS`

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Floor for the watch tick, so a zero in a config file cannot spin the CPU.
pub const MIN_TICK_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding sessions, segments, and settings.
    pub database_path: PathBuf,
    /// Milliseconds between engine ticks in `wd watch`.
    ///
    /// Timing is measured against the wall clock, so this only bounds how
    /// late a notification can be printed.
    pub tick_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("workday.db"),
            tick_interval_ms: 500,
        }
    }
}

impl Config {
    /// Loads the layered configuration, with `config_path` from `--config`.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("WD_")).extract()
    }

    /// Delay between watch ticks, never below [`MIN_TICK_INTERVAL_MS`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(MIN_TICK_INTERVAL_MS))
    }
}

/// Returns the platform-specific config directory for wd.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("workday"))
}

/// Returns the platform-specific data directory for wd.
///
/// On Linux: `~/.local/share/workday`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("workday"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_dirs_data_path_ends_with_workday() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "workday");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        assert!(config.database_path.ends_with("workday/workday.db"));
        assert_eq!(config.tick_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_layers_apply_in_order() {
        Jail::expect_with(|jail| {
            let home = jail.directory().to_path_buf();
            jail.set_env("HOME", home.display());
            jail.set_env("XDG_CONFIG_HOME", home.join("config").display());
            let user_dir = dirs_config_path().unwrap();
            std::fs::create_dir_all(&user_dir).unwrap();
            std::fs::write(
                user_dir.join("config.toml"),
                "database_path = \"/from/user.db\"\ntick_interval_ms = 1000\n",
            )
            .unwrap();
            jail.create_file("custom.toml", "tick_interval_ms = 250\n")?;

            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.database_path, PathBuf::from("/from/user.db"));
            assert_eq!(config.tick_interval_ms, 250);

            jail.set_env("WD_DATABASE_PATH", "/from/env.db");
            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.database_path, PathBuf::from("/from/env.db"));
            Ok(())
        });
    }

    #[test]
    fn test_zero_tick_interval_is_clamped() {
        let config = Config {
            tick_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(
            config.tick_interval(),
            Duration::from_millis(MIN_TICK_INTERVAL_MS)
        );
    }
}
