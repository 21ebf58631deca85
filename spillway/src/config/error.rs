//! Configuration error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid INI.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A key holds a value that cannot be interpreted.
    #[error("invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// The settings are individually valid but unusable together.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The config file could not be written.
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration could not be rendered as INI text.
    #[error("failed to render config: {0}")]
    Render(#[source] io::Error),

    /// No home directory to derive the default config path from.
    #[error("could not determine home directory")]
    NoHomeDir,
}

impl ConfigError {
    pub(crate) fn invalid_value(section: &str, key: &str, value: &str) -> Self {
        Self::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
