//! Configuration commands

use std::path::Path;

use anyhow::Result;
use tally_core::{config::default_config_path, QueryConfig};

pub fn cmd_config_show(config: &QueryConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Report which file the configuration is loaded from
pub fn cmd_config_path(config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) if path.exists() => println!("Using {}", path.display()),
        Some(path) => anyhow::bail!("Config file {} does not exist", path.display()),
        None => match default_config_path() {
            Some(path) if path.exists() => println!("Using {}", path.display()),
            Some(path) => {
                println!("Using built-in defaults");
                println!("Override by creating {}", path.display());
            }
            None => println!("Using built-in defaults (no data directory available)"),
        },
    }
    Ok(())
}
