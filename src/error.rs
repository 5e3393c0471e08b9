use std::io;
use thiserror::Error;

/// everything that can go wrong inside a launcher session. none of these are
/// fatal to the application; the session controller turns each one into an
/// `error` log line before handing it back
#[derive(Debug, Error)]
pub enum LauncherError {
    /// the user picked something that isn't a zip archive
    #[error("unsupported archive \"{name}\": only .zip files are supported")]
    UnsupportedFormat { name: String },

    /// the archive bytes couldn't be read as a zip
    #[error("could not decode archive: {0}")]
    Decode(String),

    /// start was requested before anything was loaded
    #[error("no archive loaded")]
    NoArchive,

    /// engine missing or display surface not mounted yet; worth retrying
    #[error("emulator unavailable: {0}")]
    EngineUnavailable(String),

    /// boot, mount or command execution failed inside the engine
    #[error("{0}")]
    EngineRuntime(String),

    /// fullscreen was refused by the host
    #[error("fullscreen not available: {0}")]
    Fullscreen(String),

    /// the config file isn't valid JSON for `LauncherConfig`
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<zip::result::ZipError> for LauncherError {
    fn from(err: zip::result::ZipError) -> Self {
        LauncherError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_errors_become_decode_errors() {
        let err: LauncherError = zip::result::ZipError::InvalidArchive("bad magic").into();
        assert!(matches!(err, LauncherError::Decode(_)));
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_runtime_error_shows_underlying_message() {
        let err = LauncherError::EngineRuntime("mount failed".to_string());
        assert_eq!(err.to_string(), "mount failed");
    }
}
