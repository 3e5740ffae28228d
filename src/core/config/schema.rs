//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Locations
//!
//! The same schema is used for both scopes:
//! 1. Global: `$RELOADKIT_CONFIG`, `$XDG_CONFIG_HOME/reloadkit/config.toml`
//!    or `~/.reloadkit/config.toml`
//! 2. Projects directory: `<projects_dir>/reloadkit.toml`
//!
//! # Validation
//!
//! Layout names become directory names inside every project, so they must
//! be single path components, and the default and side binary locations
//! must differ or the swap protocol would delete its own output.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default source directory name.
pub const DEFAULT_SOURCE_DIR: &str = "src";
/// Default binary directory name.
pub const DEFAULT_BIN_DIR: &str = "bin";
/// Default side binary directory name.
pub const DEFAULT_SIDE_BIN_DIR: &str = "bin_new";
/// Default suffix marking a project directory as ignored.
pub const DEFAULT_IGNORE_SUFFIX: &str = ".disabled";
/// Default marker file marking a project directory as ignored.
pub const DEFAULT_IGNORE_MARKER: &str = ".ignored";

/// A configuration file.
///
/// # Example
///
/// ```toml
/// [layout]
/// source_dir = "src"
/// bin_dir = "bin"
/// side_bin_dir = "bin_new"
///
/// [discovery]
/// ignore_suffix = ".disabled"
/// ignore_marker = ".ignored"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory layout inside each project
    pub layout: Option<LayoutConfig>,

    /// Project discovery rules
    pub discovery: Option<DiscoveryConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(layout) = &self.layout {
            layout.validate()?;
        }
        if let Some(discovery) = &self.discovery {
            discovery.validate()?;
        }
        Ok(())
    }
}

/// Directory layout inside a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Source directory name (default: "src")
    pub source_dir: Option<String>,

    /// Default binary directory name (default: "bin")
    pub bin_dir: Option<String>,

    /// Side binary directory name used during recompilation (default: "bin_new")
    pub side_bin_dir: Option<String>,
}

impl LayoutConfig {
    /// Source directory name with default applied.
    pub fn source_dir(&self) -> &str {
        self.source_dir.as_deref().unwrap_or(DEFAULT_SOURCE_DIR)
    }

    /// Binary directory name with default applied.
    pub fn bin_dir(&self) -> &str {
        self.bin_dir.as_deref().unwrap_or(DEFAULT_BIN_DIR)
    }

    /// Side binary directory name with default applied.
    pub fn side_bin_dir(&self) -> &str {
        self.side_bin_dir.as_deref().unwrap_or(DEFAULT_SIDE_BIN_DIR)
    }

    /// Overlay `other` on top of `self` (set fields in `other` win).
    pub fn merged(&self, other: &LayoutConfig) -> LayoutConfig {
        LayoutConfig {
            source_dir: other.source_dir.clone().or_else(|| self.source_dir.clone()),
            bin_dir: other.bin_dir.clone().or_else(|| self.bin_dir.clone()),
            side_bin_dir: other
                .side_bin_dir
                .clone()
                .or_else(|| self.side_bin_dir.clone()),
        }
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a name is not a single path
    /// component or the two binary locations collide.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_component("layout.source_dir", self.source_dir())?;
        validate_component("layout.bin_dir", self.bin_dir())?;
        validate_component("layout.side_bin_dir", self.side_bin_dir())?;

        if self.bin_dir() == self.side_bin_dir() {
            return Err(ConfigError::InvalidValue(format!(
                "layout.bin_dir and layout.side_bin_dir must differ (both '{}')",
                self.bin_dir()
            )));
        }
        Ok(())
    }
}

/// Rules for discovering project directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Directory name suffix that hides a project (default: ".disabled")
    pub ignore_suffix: Option<String>,

    /// Marker file that hides a project (default: ".ignored")
    pub ignore_marker: Option<String>,
}

impl DiscoveryConfig {
    /// Ignore suffix with default applied.
    pub fn ignore_suffix(&self) -> &str {
        self.ignore_suffix.as_deref().unwrap_or(DEFAULT_IGNORE_SUFFIX)
    }

    /// Ignore marker with default applied.
    pub fn ignore_marker(&self) -> &str {
        self.ignore_marker.as_deref().unwrap_or(DEFAULT_IGNORE_MARKER)
    }

    /// Overlay `other` on top of `self` (set fields in `other` win).
    pub fn merged(&self, other: &DiscoveryConfig) -> DiscoveryConfig {
        DiscoveryConfig {
            ignore_suffix: other
                .ignore_suffix
                .clone()
                .or_else(|| self.ignore_suffix.clone()),
            ignore_marker: other
                .ignore_marker
                .clone()
                .or_else(|| self.ignore_marker.clone()),
        }
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the suffix is empty or the
    /// marker is not a single path component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ignore_suffix().is_empty() {
            return Err(ConfigError::InvalidValue(
                "discovery.ignore_suffix cannot be empty".into(),
            ));
        }
        validate_component("discovery.ignore_marker", self.ignore_marker())
    }
}

fn validate_component(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be a directory name, got '{value}'"
        )));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(ConfigError::InvalidValue(format!(
            "{key} cannot contain path separators, got '{value}'"
        )));
    }
    Ok(())
}
