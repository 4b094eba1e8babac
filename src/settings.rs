//! Tracker settings
//!
//! Uses `figment` for layered configuration: defaults -> TOML file -> environment.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::experiment::DEFAULT_DATABASE_URL;
use crate::{Error, Result};

/// Settings file picked up from the working directory when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "tracker.toml";

/// Prefix of the environment variables that override settings
/// (`TRACKER_DATABASE_URL`, `TRACKER_ARTIFACTS_DIR`, `TRACKER_BIND`).
pub const ENV_PREFIX: &str = "TRACKER_";

/// Where the tracker keeps its data and where the dashboard listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Store connection string, e.g. `sqlite:///experiments.db`.
    pub database_url: String,
    /// Root directory holding one subdirectory per experiment.
    pub artifacts_dir: PathBuf,
    /// Dashboard listen address.
    pub bind: SocketAddr,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            artifacts_dir: PathBuf::from("./artifacts"),
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
        }
    }
}

impl TrackerSettings {
    /// Load settings from layered sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables prefixed with `TRACKER_`
    /// 2. The settings file (`file`, or `tracker.toml` if present)
    /// 3. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if an explicit file is missing or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match file {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                let default_file = Path::new(DEFAULT_SETTINGS_FILE);
                if default_file.exists() {
                    figment = figment.merge(Toml::file(default_file));
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }
}
