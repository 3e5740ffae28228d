//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ProjectName`] - Validated project name (map key and graph node identity)
//! - [`RegistryId`] - Identity of the registry a project belongs to
//! - [`LifecycleState`] - Durable per-project state
//!
//! # Validation
//!
//! These types enforce validity at construction time. A project name is also
//! a directory name, so anything that could escape the projects directory is
//! rejected up front.
//!
//! # Examples
//!
//! ```
//! use reloadkit::core::types::ProjectName;
//!
//! let name = ProjectName::new("economy").unwrap();
//! assert_eq!(name.as_str(), "economy");
//!
//! assert!(ProjectName::new("../escape").is_err());
//! assert!(ProjectName::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid project name: {0}")]
    InvalidProjectName(String),
}

/// A validated project name.
///
/// Project names must be usable as a single directory name:
/// - Cannot be empty
/// - Cannot be `.` or `..`
/// - Cannot contain `/` or `\`
/// - Cannot contain ASCII control characters
///
/// Names are ordered lexicographically, which is what every deterministic
/// listing in the crate (error messages, traversal tie-breaks) relies on.
///
/// # Example
///
/// ```
/// use reloadkit::core::types::ProjectName;
///
/// let name = ProjectName::new("chat-bridge").unwrap();
/// assert_eq!(name.to_string(), "chat-bridge");
///
/// assert!(ProjectName::new("..").is_err());
/// assert!(ProjectName::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    /// Create a new validated project name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidProjectName` if the name cannot be used as
    /// a directory name inside the projects directory.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidProjectName(
                "project name cannot be empty".into(),
            ));
        }

        if name == "." || name == ".." {
            return Err(TypeError::InvalidProjectName(format!(
                "project name cannot be '{name}'"
            )));
        }

        for c in ['/', '\\'] {
            if name.contains(c) {
                return Err(TypeError::InvalidProjectName(format!(
                    "project name cannot contain '{c}'"
                )));
            }
        }

        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidProjectName(
                "project name cannot contain control characters".into(),
            ));
        }

        Ok(())
    }

    /// Get the project name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProjectName> for String {
    fn from(name: ProjectName) -> Self {
        name.0
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ProjectName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a project registry.
///
/// Every project records the registry it was created for, and every
/// resolved project dependency records the registry it was resolved
/// against. Comparing the two is how cross-registry references are caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(Uuid);

impl RegistryId {
    /// Generate a new unique registry id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegistryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable lifecycle state of a project.
///
/// Batch-local error membership is never stored here; it lives in the
/// batch call that computed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No instance is running.
    Unloaded,
    /// An instance is running.
    Loaded,
}

impl LifecycleState {
    /// Check if this is the loaded state.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LifecycleState::Loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod project_name {
        use super::*;

        #[test]
        fn valid_names() {
            assert!(ProjectName::new("economy").is_ok());
            assert!(ProjectName::new("chat-bridge").is_ok());
            assert!(ProjectName::new("v2.core").is_ok());
            assert!(ProjectName::new("under_score").is_ok());
            assert!(ProjectName::new(".hidden").is_ok());
        }

        #[test]
        fn empty_rejected() {
            assert!(matches!(
                ProjectName::new(""),
                Err(TypeError::InvalidProjectName(_))
            ));
        }

        #[test]
        fn dot_names_rejected() {
            assert!(ProjectName::new(".").is_err());
            assert!(ProjectName::new("..").is_err());
        }

        #[test]
        fn separators_rejected() {
            assert!(ProjectName::new("a/b").is_err());
            assert!(ProjectName::new("a\\b").is_err());
            assert!(ProjectName::new("../up").is_err());
        }

        #[test]
        fn control_chars_rejected() {
            assert!(ProjectName::new("tab\there").is_err());
            assert!(ProjectName::new("nul\0").is_err());
        }

        #[test]
        fn ordering_is_lexicographic() {
            let a = ProjectName::new("alpha").unwrap();
            let b = ProjectName::new("beta").unwrap();
            assert!(a < b);
        }

        #[test]
        fn serde_as_plain_string() {
            let name = ProjectName::new("economy").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"economy\"");

            let bad: Result<ProjectName, _> = serde_json::from_str("\"a/b\"");
            assert!(bad.is_err());
        }

        #[test]
        fn error_message_names_the_rule() {
            let err = ProjectName::new("a/b").unwrap_err();
            assert!(err.to_string().contains("invalid project name"));
            assert!(err.to_string().contains("'/'"));
        }
    }

    mod registry_id {
        use super::*;

        #[test]
        fn ids_are_unique() {
            assert_ne!(RegistryId::new(), RegistryId::new());
        }

        #[test]
        fn copies_compare_equal() {
            let id = RegistryId::new();
            let copy = id;
            assert_eq!(id, copy);
        }
    }

    #[test]
    fn lifecycle_state_is_loaded() {
        assert!(LifecycleState::Loaded.is_loaded());
        assert!(!LifecycleState::Unloaded.is_loaded());
    }
}
