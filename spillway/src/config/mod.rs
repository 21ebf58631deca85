//! Configuration loading.
//!
//! [`PipelineConfig`](crate::pipeline::PipelineConfig) holds what one run
//! needs. [`ConfigFile`] adds fault and logging settings and maps the whole
//! thing to and from an INI file at `~/.spillway/config.ini`.

mod error;
mod file;

pub use error::ConfigError;
pub use file::{
    default_config_path, ConfigFile, FaultMode, FaultSettings, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
};
