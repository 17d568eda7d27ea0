//! Configuration module for DAT
//!
//! This module holds the naming conventions DAT relies on inside the host's
//! versioned graph store:
//! - Package identifiers of the host's basic modules
//! - Tag names for the variables root and for each variable version
//! - Port names used to designate a variable's output
//! - Logging filter used by the `dat` binary
//!
//! # Config Location
//!
//! The configuration file is looked up in the platform-appropriate location:
//! - **Linux**: `~/.config/dev.dat.dat-rs/dat.toml`
//! - **macOS**: `~/Library/Application Support/dev.dat.dat-rs/dat.toml`
//! - **Windows**: `%APPDATA%\dev.dat.dat-rs\dat.toml`
//!
//! # Example
//!
//! ```toml
//! default_variable_name = "data"
//!
//! [tags]
//! variables_root = "dat-vars"
//! variable_prefix = "dat-var-"
//! ```

use crate::error::{DatError, Result};
use crate::types::TypeDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.dat.dat-rs";

/// Config filename
pub const CONFIG_FILE: &str = "dat.toml";

/// Package identifier of the host's basic modules
pub const DEFAULT_BASIC_PACKAGE: &str = "org.vistrails.vistrails.basic";

/// Package identifier of the host's calculator module
pub const DEFAULT_PYTHONCALC_PACKAGE: &str = "org.vistrails.vistrails.pythoncalc";

/// Default name proposed for loaded variables
pub const DEFAULT_VARIABLE_NAME: &str = "data";

// ==================== Config Directory ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Host package identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package providing String, Float, InputPort, OutputPort, ...
    pub basic: String,
    /// Package providing the PythonCalc module used by arithmetic built-ins
    pub pythoncalc: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            basic: DEFAULT_BASIC_PACKAGE.to_string(),
            pythoncalc: DEFAULT_PYTHONCALC_PACKAGE.to_string(),
        }
    }
}

/// Tag naming conventions in the version store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Tag of the shared parent version of every variable
    pub variables_root: String,
    /// Prefix of each variable's tag; the variable name follows
    pub variable_prefix: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            variables_root: "dat-vars".to_string(),
            variable_prefix: "dat-var-".to_string(),
        }
    }
}

/// Port naming conventions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// `name` of the OutputPort module in the variables root
    pub output_name: String,
    /// Input port of OutputPort modules
    pub internal_pipe: String,
    /// Port of literal modules holding and producing their value
    pub value: String,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            output_name: "value".to_string(),
            internal_pipe: "InternalPipe".to_string(),
            value: "value".to_string(),
        }
    }
}

/// Logging options for the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,dat_rs=debug".to_string(),
        }
    }
}

// ==================== DAT Config ====================

/// Complete DAT configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatConfig {
    pub packages: PackageConfig,
    pub tags: TagConfig,
    pub ports: PortConfig,
    pub logging: LoggingConfig,
    /// Name proposed for a loaded variable when the loader has no better idea
    pub default_variable_name: String,
}

impl Default for DatConfig {
    fn default() -> Self {
        Self {
            packages: PackageConfig::default(),
            tags: TagConfig::default(),
            ports: PortConfig::default(),
            logging: LoggingConfig::default(),
            default_variable_name: DEFAULT_VARIABLE_NAME.to_string(),
        }
    }
}

impl DatConfig {
    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DatError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            DatError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load the configuration from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DatError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DatError::Config(format!("Failed to write config: {}", e)))
    }

    /// Descriptor of a module from the basic package
    pub fn basic(&self, name: &str) -> TypeDescriptor {
        TypeDescriptor::new(&self.packages.basic, name)
    }

    /// Tag of the version holding the named variable
    pub fn variable_tag(&self, name: &str) -> String {
        format!("{}{}", self.tags.variable_prefix, name)
    }

    /// Variable name encoded in a tag, if the tag follows the variable convention
    pub fn variable_name_from_tag<'a>(&self, tag: &'a str) -> Option<&'a str> {
        tag.strip_prefix(self.tags.variable_prefix.as_str())
            .filter(|name| !name.is_empty())
    }
}
