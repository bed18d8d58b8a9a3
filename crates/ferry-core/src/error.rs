use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {field} {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid version {version:?}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: &'static str },
}

impl Error {
    /// Whether this error was raised by a required-field check.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
