//! Launcher constants and runtime configuration.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LauncherError;

/// command used when nothing better can be inferred from the archive
pub const DEFAULT_COMMAND: &str = "dir";

/// preference key holding the most recently used startup command
pub const STARTUP_COMMAND_KEY: &str = "dos-startup-command";

/// how many log lines the session keeps, newest first
pub const LOG_CAPACITY: usize = 120;

/// second reconcile after the big view opens or closes, to absorb layout thrash
pub const OVERLAY_SETTLE_DELAY: Duration = Duration::from_millis(60);

/// ~60Hz front end refresh
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// external DOSBox binary driven by the process engine
pub const DEFAULT_ENGINE_BINARY: &str = "dosbox";

/// optional JSON config file
pub const CONFIG_PATH_VAR: &str = "RETRO_DECK_CONFIG";
pub const ENGINE_VAR: &str = "RETRO_DECK_ENGINE";
pub const PREFS_VAR: &str = "RETRO_DECK_PREFS";
pub const LOG_VAR: &str = "RETRO_DECK_LOG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// engine binary, looked up on PATH unless it contains a separator
    pub engine_binary: String,
    /// where the startup command preference lives; in-memory when unset
    pub prefs_path: Option<PathBuf>,
    /// diagnostics go here; tracing stays off when unset
    pub log_file: Option<PathBuf>,
    pub settle_delay_ms: u64,
    pub frame_interval_ms: u64,
    pub log_capacity: usize,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            engine_binary: DEFAULT_ENGINE_BINARY.to_string(),
            prefs_path: None,
            log_file: None,
            settle_delay_ms: OVERLAY_SETTLE_DELAY.as_millis() as u64,
            frame_interval_ms: FRAME_INTERVAL.as_millis() as u64,
            log_capacity: LOG_CAPACITY,
        }
    }
}

impl LauncherConfig {
    /// file named by `RETRO_DECK_CONFIG` (if any), then env overrides
    pub fn load() -> Result<Self, LauncherError> {
        let mut config = match env_string_opt(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, LauncherError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn apply_env(&mut self) {
        if let Some(engine) = env_string_opt(ENGINE_VAR) {
            self.engine_binary = engine;
        }
        if let Some(prefs) = env_string_opt(PREFS_VAR) {
            self.prefs_path = Some(PathBuf::from(prefs));
        }
        if let Some(log) = env_string_opt(LOG_VAR) {
            self.log_file = Some(PathBuf::from(log));
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = LauncherConfig::default();
        assert_eq!(c.engine_binary, "dosbox");
        assert_eq!(c.settle_delay(), Duration::from_millis(60));
        assert_eq!(c.log_capacity, 120);
        assert!(c.prefs_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<(), LauncherError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("deck.json");
        let mut f = fs::File::create(&path)?;
        f.write_all(br#"{ "engine_binary": "/opt/dosbox-x", "settle_delay_ms": 100 }"#)?;

        let c = LauncherConfig::from_file(&path)?;
        assert_eq!(c.engine_binary, "/opt/dosbox-x");
        assert_eq!(c.settle_delay_ms, 100);
        assert_eq!(c.frame_interval_ms, 16);
        Ok(())
    }

    #[test]
    fn test_bad_file_is_a_config_error() -> Result<(), LauncherError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("deck.json");
        fs::write(&path, "not json")?;
        assert!(matches!(
            LauncherConfig::from_file(&path),
            Err(LauncherError::Config(_))
        ));
        assert!(matches!(
            LauncherConfig::from_file(&dir.path().join("missing.json")),
            Err(LauncherError::Io(_))
        ));
        Ok(())
    }
}
