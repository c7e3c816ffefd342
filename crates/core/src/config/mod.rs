//! Configuration file loader for `robot-kit.toml`.
//!
//! The companion server needs very little configuration: the port to bind,
//! where the automation bundles live, and optionally which Python
//! interpreter to use. All of it can come from CLI flags; the TOML file is
//! a convenience so a checkout can pin its settings.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Port the original companion server listened on.
pub const DEFAULT_PORT: u16 = 3001;

/// Settings read from `robot-kit.toml`. Every field is optional; CLI flags
/// take precedence over the file, the file over the defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Port for the local HTTP facade.
    pub port: Option<u16>,

    /// Directory containing `stf_automation/` and `stj_automation/`.
    pub bundles_root: Option<PathBuf>,

    /// Python interpreter override.
    pub python: Option<PathBuf>,
}

/// Loads the configuration file at `path`.
///
/// A missing file yields the default (empty) configuration rather than an
/// error; an unreadable or syntactically invalid file is an error.
pub fn load_config(path: &Path) -> ConfigResult<ServerConfig> {
    if !path.exists() {
        return Ok(ServerConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config: ServerConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(config)
}
