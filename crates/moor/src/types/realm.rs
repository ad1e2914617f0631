//! AM realm path type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A validated AM realm path.
///
/// Realms are AM's tenant boundary. A realm path is always fully
/// qualified from the root (`/`), so that identically named sub-realms
/// under different parents cannot be confused.
///
/// # Example
///
/// ```
/// use moor::Realm;
///
/// let realm = Realm::new("/edge/factory").unwrap();
/// assert_eq!(realm.as_str(), "/edge/factory");
/// assert!(Realm::root().is_root());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Realm(String);

impl Realm {
    /// The root realm, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Create a new realm from a path, validating the format.
    ///
    /// The path must start with `/`; a trailing slash is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, not absolute, or contains
    /// empty or non-alphanumeric segments.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s == "/" {
            return Ok(Self(s));
        }

        let Some(rest) = s.strip_prefix('/') else {
            return Err(InvalidInputError::Realm {
                value: s,
                reason: "must start with '/'".to_string(),
            }
            .into());
        };

        let trimmed = rest.strip_suffix('/').unwrap_or(rest);
        if trimmed.is_empty() {
            return Err(InvalidInputError::Realm {
                value: s.clone(),
                reason: "path segments must be non-empty".to_string(),
            }
            .into());
        }

        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(InvalidInputError::Realm {
                    value: s.clone(),
                    reason: "path segments must be non-empty".to_string(),
                }
                .into());
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(InvalidInputError::Realm {
                    reason: format!("segment '{}' contains invalid characters", segment),
                    value: s.clone(),
                }
                .into());
            }
        }

        Ok(Self(format!("/{}", trimmed)))
    }

    /// Returns the fully qualified realm path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the root realm.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Realm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Realm {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Realm> for String {
    fn from(realm: Realm) -> Self {
        realm.0
    }
}

impl AsRef<str> for Realm {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
