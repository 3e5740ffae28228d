//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! There are two configuration scopes:
//! - **Global**: User-level settings
//! - **Projects**: Settings stored next to the managed projects
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Projects-directory config file
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$RELOADKIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/reloadkit/config.toml`
//! 3. `~/.reloadkit/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use reloadkit::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/srv/projects"))).unwrap();
//! println!("binaries live in '{}'", config.layout().bin_dir());
//! ```

pub mod schema;

pub use schema::{DiscoveryConfig, FileConfig, LayoutConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::paths;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence automatically: the projects-directory file
/// overrides the global file, which overrides the defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: FileConfig,
    /// Projects-directory configuration (if present)
    pub projects: Option<FileConfig>,
    global_path: Option<PathBuf>,
    projects_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `projects_dir` is provided, also loads `<projects_dir>/reloadkit.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(projects_dir: Option<&Path>) -> Result<Config, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), projects_dir)
    }

    /// Load configuration from an explicit global file.
    ///
    /// A `None` or missing global file means defaults.
    pub fn load_from(
        global_path: Option<&Path>,
        projects_dir: Option<&Path>,
    ) -> Result<Config, ConfigError> {
        let (global, global_path) = match global_path {
            Some(path) if path.exists() => (Self::read_file(path)?, Some(path.to_path_buf())),
            _ => (FileConfig::default(), None),
        };

        let (projects, projects_path) = match projects_dir {
            Some(dir) => {
                let path = paths::projects_config_path(dir);
                if path.exists() {
                    (Some(Self::read_file(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        let config = Config {
            global,
            projects,
            global_path,
            projects_path,
        };

        config.global.validate()?;
        if let Some(ref p) = config.projects {
            p.validate()?;
        }
        // Each file can be valid on its own and still collide once merged.
        config.layout().validate()?;
        config.discovery().validate()?;

        Ok(config)
    }

    /// Locate the global config file, if any.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $RELOADKIT_CONFIG
        if let Ok(path) = std::env::var("RELOADKIT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/reloadkit/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("reloadkit/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.reloadkit/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".reloadkit/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.reloadkit/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".reloadkit/config.toml"))
    }

    /// Write the projects-directory config atomically.
    ///
    /// Uses atomic write (write to temp file, then rename) to prevent
    /// corruption.
    pub fn write_projects(projects_dir: &Path, config: &FileConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths::projects_config_path(projects_dir);
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    fn write_config_atomic(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Get the effective project layout.
    pub fn layout(&self) -> LayoutConfig {
        let global = self.global.layout.clone().unwrap_or_default();
        match self.projects.as_ref().and_then(|p| p.layout.as_ref()) {
            Some(local) => global.merged(local),
            None => global,
        }
    }

    /// Get the effective discovery rules.
    pub fn discovery(&self) -> DiscoveryConfig {
        let global = self.global.discovery.clone().unwrap_or_default();
        match self.projects.as_ref().and_then(|p| p.discovery.as_ref()) {
            Some(local) => global.merged(local),
            None => global,
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded projects-directory config file.
    pub fn projects_config_loaded_from(&self) -> Option<&Path> {
        self.projects_path.as_deref()
    }
}
