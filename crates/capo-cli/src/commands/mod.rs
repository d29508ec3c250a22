//! CLI commands

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use capo_common::config::{ClientConfig, OsEnv};

use crate::Result;

pub mod addresses;
pub mod rules;
pub mod zones;

/// Load client config from `path`, or from the environment when unset
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading client config");
            ClientConfig::from_yaml_file(path)?
        }
        None => ClientConfig::from_env(&OsEnv)?,
    };
    Ok(config)
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
