//! INI configuration file.
//!
//! ```ini
//! [pipeline]
//! items = 100
//! production_delay_ms = 10
//! forward_policy = block
//!
//! [queues]
//! primary_capacity = 10
//! error_capacity = 10
//!
//! [retry]
//! max_attempts = 3
//! delay_ms = 0
//! backoff = fixed
//!
//! [faults]
//! mode = random
//! seed = 42
//! producer_rate = 0.0
//! consumer_rate = 0.1
//! escalator_rate = 0.2
//!
//! [logging]
//! level = info
//! file = /var/log/spillway.log
//! ```
//!
//! Every key is optional. A queue capacity of 0 means unbounded.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ini::{Ini, Properties};

use super::ConfigError;
use crate::fault::{FaultInjector, FaultRates, NeverFail, RandomFaults};
use crate::logging::LoggingConfig;
use crate::pipeline::{ForwardPolicy, PipelineConfig};
use crate::queue::QueueCapacity;
use crate::retry::RetryPolicy;

/// Directory under the home directory holding the config file.
pub const CONFIG_DIR_NAME: &str = ".spillway";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Returns `~/.spillway/config.ini`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

// =============================================================================
// Fault settings
// =============================================================================

/// Which fault injector a configured run uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaultMode {
    /// Nothing fails.
    None,
    /// Each stage fails at its configured rate.
    #[default]
    Random,
}

impl FaultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for FaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown fault mode '{}'", other)),
        }
    }
}

/// The `[faults]` section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaultSettings {
    pub mode: FaultMode,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
    pub rates: FaultRates,
}

impl FaultSettings {
    /// Builds the injector these settings describe.
    pub fn injector(&self) -> Arc<dyn FaultInjector> {
        match self.mode {
            FaultMode::None => Arc::new(NeverFail),
            FaultMode::Random => Arc::new(RandomFaults::with_seed(self.rates, self.seed)),
        }
    }
}

// =============================================================================
// Config file
// =============================================================================

/// Everything a `spillway` run can be configured with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigFile {
    pub pipeline: PipelineConfig,
    pub faults: FaultSettings,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Loads `path` if given, else the default path if it exists, else
    /// returns defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Ok(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parses INI text. Missing sections and keys keep their defaults.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("pipeline")) {
            let pipeline = &mut config.pipeline;
            if let Some(items) = parse_key::<u64>(section, "pipeline", "items")? {
                pipeline.item_count = items;
            }
            if let Some(ms) = parse_key::<u64>(section, "pipeline", "production_delay_ms")? {
                pipeline.production_delay = Duration::from_millis(ms);
            }
            if let Some(policy) = parse_key::<ForwardPolicy>(section, "pipeline", "forward_policy")? {
                pipeline.forward_policy = policy;
            }
        }

        if let Some(section) = ini.section(Some("queues")) {
            if let Some(size) = parse_key::<usize>(section, "queues", "primary_capacity")? {
                config.pipeline.primary_capacity = QueueCapacity::from_size(size);
            }
            if let Some(size) = parse_key::<usize>(section, "queues", "error_capacity")? {
                config.pipeline.error_capacity = QueueCapacity::from_size(size);
            }
        }

        if let Some(section) = ini.section(Some("retry")) {
            config.pipeline.retry = parse_retry(section)?;
        }

        if let Some(section) = ini.section(Some("faults")) {
            let faults = &mut config.faults;
            if let Some(mode) = parse_key::<FaultMode>(section, "faults", "mode")? {
                faults.mode = mode;
            }
            faults.seed = parse_key::<u64>(section, "faults", "seed")?;
            if let Some(rate) = parse_rate(section, "producer_rate")? {
                faults.rates.producer = rate;
            }
            if let Some(rate) = parse_rate(section, "consumer_rate")? {
                faults.rates.consumer = rate;
            }
            if let Some(rate) = parse_rate(section, "escalator_rate")? {
                faults.rates.escalator = rate;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = value(section, "level") {
                config.logging.level = level.to_string();
            }
            config.logging.file = value(section, "file").map(PathBuf::from);
        }

        config.pipeline.validate()?;
        Ok(config)
    }

    /// Renders the configuration as INI text that [`parse`](Self::parse)
    /// reads back unchanged.
    pub fn to_ini_string(&self) -> Result<String, ConfigError> {
        let pipeline = &self.pipeline;
        let mut ini = Ini::new();

        ini.with_section(Some("pipeline"))
            .set("items", pipeline.item_count.to_string())
            .set(
                "production_delay_ms",
                pipeline.production_delay.as_millis().to_string(),
            )
            .set("forward_policy", pipeline.forward_policy.as_str());

        ini.with_section(Some("queues"))
            .set("primary_capacity", pipeline.primary_capacity.as_size().to_string())
            .set("error_capacity", pipeline.error_capacity.as_size().to_string());

        let delay = match &pipeline.retry {
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::ExponentialBackoff { initial_delay, .. } => *initial_delay,
        };
        ini.with_section(Some("retry"))
            .set("max_attempts", pipeline.retry.max_attempts().to_string())
            .set("delay_ms", delay.as_millis().to_string())
            .set("backoff", pipeline.retry.kind());

        ini.with_section(Some("faults"))
            .set("mode", self.faults.mode.as_str())
            .set("producer_rate", self.faults.rates.producer.to_string())
            .set("consumer_rate", self.faults.rates.consumer.to_string())
            .set("escalator_rate", self.faults.rates.escalator.to_string());
        if let Some(seed) = self.faults.seed {
            ini.set_to(Some("faults"), "seed".to_string(), seed.to_string());
        }

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str());
        if let Some(file) = &self.logging.file {
            ini.set_to(Some("logging"), "file".to_string(), file.display().to_string());
        }

        let mut buf = Vec::new();
        ini.write_to(&mut buf).map_err(ConfigError::Render)?;
        String::from_utf8(buf)
            .map_err(|e| ConfigError::Render(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let text = self.to_ini_string()?;
        fs::write(path, text).map_err(write_err)
    }
}

fn value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section
        .get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_key<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match value(section, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid_value(section_name, key, raw)),
        None => Ok(None),
    }
}

fn parse_rate(section: &Properties, key: &str) -> Result<Option<f64>, ConfigError> {
    match parse_key::<f64>(section, "faults", key)? {
        Some(rate) if (0.0..=1.0).contains(&rate) => Ok(Some(rate)),
        Some(rate) => Err(ConfigError::invalid_value("faults", key, &rate.to_string())),
        None => Ok(None),
    }
}

fn parse_retry(section: &Properties) -> Result<RetryPolicy, ConfigError> {
    let defaults = RetryPolicy::default();
    let max_attempts =
        parse_key::<u32>(section, "retry", "max_attempts")?.unwrap_or(defaults.max_attempts());
    let delay_ms = parse_key::<u64>(section, "retry", "delay_ms")?;

    match value(section, "backoff").unwrap_or("fixed") {
        "fixed" => Ok(RetryPolicy::fixed(
            max_attempts,
            Duration::from_millis(delay_ms.unwrap_or(0)),
        )),
        "exponential" => {
            let mut policy = RetryPolicy::exponential(max_attempts);
            if let (RetryPolicy::ExponentialBackoff { initial_delay, .. }, Some(ms)) =
                (&mut policy, delay_ms)
            {
                *initial_delay = Duration::from_millis(ms);
            }
            Ok(policy)
        }
        other => Err(ConfigError::invalid_value("retry", "backoff", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, Stage};
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.faults.mode, FaultMode::Random);
        assert_eq!(config.faults.rates, FaultRates::default());
    }

    #[test]
    fn test_parse_full_file() {
        let config = ConfigFile::parse(
            "[pipeline]\n\
             items = 5\n\
             production_delay_ms = 0\n\
             forward_policy = best_effort\n\
             [queues]\n\
             primary_capacity = 2\n\
             error_capacity = 0\n\
             [retry]\n\
             max_attempts = 4\n\
             delay_ms = 25\n\
             [faults]\n\
             mode = none\n\
             seed = 7\n\
             consumer_rate = 0.5\n\
             [logging]\n\
             level = debug\n\
             file = /tmp/spillway.log\n",
        )
        .unwrap();

        let pipeline = &config.pipeline;
        assert_eq!(pipeline.item_count, 5);
        assert_eq!(pipeline.production_delay, Duration::ZERO);
        assert_eq!(pipeline.forward_policy, ForwardPolicy::BestEffort);
        assert_eq!(pipeline.primary_capacity, QueueCapacity::Bounded(2));
        assert_eq!(pipeline.error_capacity, QueueCapacity::Unbounded);
        assert_eq!(
            pipeline.retry,
            RetryPolicy::fixed(4, Duration::from_millis(25))
        );
        assert_eq!(config.faults.mode, FaultMode::None);
        assert_eq!(config.faults.seed, Some(7));
        assert_eq!(config.faults.rates.consumer, 0.5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/spillway.log")));
    }

    #[test]
    fn test_exponential_backoff() {
        let config = ConfigFile::parse("[retry]\nbackoff = exponential\ndelay_ms = 50\n").unwrap();
        let retry = &config.pipeline.retry;
        assert_eq!(retry.kind(), "exponential");
        assert_eq!(retry.delay_for_attempt(1), Some(Duration::from_millis(50)));
        assert_eq!(retry.delay_for_attempt(2), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_invalid_values() {
        let err = ConfigFile::parse("[queues]\nprimary_capacity = ten\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref section, ref key, .. }
                if section == "queues" && key == "primary_capacity"
        ));

        assert!(ConfigFile::parse("[retry]\nbackoff = linear\n").is_err());
        assert!(ConfigFile::parse("[faults]\nconsumer_rate = 1.5\n").is_err());
        assert!(ConfigFile::parse("[faults]\nmode = chaos\n").is_err());
        assert!(ConfigFile::parse("[retry]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn test_ini_string_reads_back() {
        let mut config = ConfigFile::default();
        config.pipeline = PipelineConfig::new(42)
            .with_capacity(QueueCapacity::Unbounded)
            .with_retry(RetryPolicy::fixed(5, Duration::from_millis(3)));
        config.faults.seed = Some(9);
        config.logging.file = Some(PathBuf::from("spillway.log"));

        let text = config.to_ini_string().unwrap();
        assert!(text.contains("[pipeline]"));
        assert_eq!(ConfigFile::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");
        let config = ConfigFile {
            pipeline: PipelineConfig::new(7),
            ..Default::default()
        };

        config.save(&path).unwrap();
        let loaded = ConfigFile::load(&path).unwrap();

        assert_eq!(loaded.pipeline.item_count, 7);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ConfigFile::load(&temp.path().join("missing.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_fault_settings_injector() {
        let settings = FaultSettings {
            mode: FaultMode::None,
            ..Default::default()
        };
        let injector = settings.injector();
        assert!(injector.check(Stage::Consumer, Item::new(0), 0).is_ok());

        let settings = FaultSettings {
            mode: FaultMode::Random,
            seed: Some(1),
            rates: FaultRates {
                producer: 0.0,
                consumer: 1.0,
                escalator: 0.0,
            },
        };
        let injector = settings.injector();
        assert!(injector.check(Stage::Consumer, Item::new(0), 0).is_err());
        assert!(injector.check(Stage::Producer, Item::new(0), 0).is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with(".spillway/config.ini"));
        }
    }
}
