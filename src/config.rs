/// Startup configuration

use crate::error::{D88Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file name
pub const CONFIG_FILE: &str = "d88fdc.toml";

/// Controller startup configuration
///
/// ```toml
/// disk0 = "disks/system.d88"
/// disk1 = "disks/work.d88"
/// trace_ports = true
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FdcConfig {
    /// Image mounted in drive 0 at startup
    pub disk0: Option<PathBuf>,
    /// Image mounted in drive 1 at startup
    pub disk1: Option<PathBuf>,
    /// Image mounted in drive 2 at startup
    pub disk2: Option<PathBuf>,
    /// Image mounted in drive 3 at startup
    pub disk3: Option<PathBuf>,
    /// Log every port access at trace level
    pub trace_ports: bool,
}

impl FdcConfig {
    /// Parse a configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| D88Error::Config(e.to_string()))
    }

    /// Load the default configuration file, or defaults if it doesn't exist
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults silently. Unreadable or malformed
    /// files are logged and also fall back to the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return FdcConfig::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(D88Error::from)
            .and_then(|content| Self::parse(&content));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default configuration");
                FdcConfig::default()
            }
        }
    }

    /// Startup images indexed by drive
    pub fn disks(&self) -> [Option<&Path>; 4] {
        [
            self.disk0.as_deref(),
            self.disk1.as_deref(),
            self.disk2.as_deref(),
            self.disk3.as_deref(),
        ]
    }
}
