//! Config command - show or initialize the configuration file.

use std::path::{Path, PathBuf};

use spillway::config::{default_config_path, ConfigFile};

use crate::error::CliError;

/// Arguments for the config command.
#[derive(Debug, Default)]
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
    pub print: bool,
    pub init: bool,
}

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    if args.init {
        return init(&path);
    }

    let config = if path.exists() {
        ConfigFile::load(&path)?
    } else {
        ConfigFile::default()
    };

    if args.print {
        print!("{}", config.to_ini_string()?);
        return Ok(());
    }

    println!("Configuration file: {}", path.display());
    if !path.exists() {
        println!("  (not found, using defaults; run 'spillway config --init' to create it)");
    }
    println!();
    println!("  Items:            {}", config.pipeline.item_count);
    println!("  Primary queue:    {}", config.pipeline.primary_capacity);
    println!("  Error queue:      {}", config.pipeline.error_capacity);
    println!("  Retry:            {}", config.pipeline.retry);
    println!("  Forward policy:   {}", config.pipeline.forward_policy);
    println!(
        "  Production delay: {}ms",
        config.pipeline.production_delay.as_millis()
    );
    println!("  Faults:           {}", config.faults.mode);
    println!("  Log level:        {}", config.logging.level);
    Ok(())
}

/// Write a default config file unless one already exists.
fn init(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        return Err(CliError::Config(format!(
            "{} already exists; remove it first to regenerate defaults",
            path.display()
        )));
    }
    ConfigFile::default().save(path)?;
    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize Spillway settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        init(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[pipeline]\nitems = 3\n").unwrap();

        assert!(matches!(init(&path), Err(CliError::Config(_))));
        assert_eq!(ConfigFile::load(&path).unwrap().pipeline.item_count, 3);
    }

    #[test]
    fn test_show_with_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[pipeline]\nitems = 3\n").unwrap();

        run(ConfigArgs {
            config: Some(path),
            print: true,
            init: false,
        })
        .unwrap();
    }
}
