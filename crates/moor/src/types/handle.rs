//! Opaque session handle type.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// Length of a session handle in characters.
///
/// 22 alphanumeric characters give ~130 bits of entropy, enough that
/// handles are unguessable for the lifetime of a cache entry.
pub const HANDLE_LEN: usize = 22;

/// An opaque, device-visible session handle.
///
/// Handles are minted by a gateway and stand in for the real session
/// identifier issued by AM, which never crosses the device boundary.
/// A handle is a fixed-length random token with no internal structure;
/// devices return it verbatim on subsequent rounds and session-bound
/// requests.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Mint a fresh random handle.
    pub fn mint() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(HANDLE_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Create a handle from an existing token, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the token has the wrong length or contains
    /// non-alphanumeric characters.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        if s.len() != HANDLE_LEN {
            return Err(InvalidInputError::Handle {
                reason: format!("expected {} characters, got {}", HANDLE_LEN, s.len()),
            }
            .into());
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidInputError::Handle {
                reason: "must be alphanumeric".to_string(),
            }
            .into());
        }
        Ok(Self(s))
    }

    /// Returns the handle token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The handle gates access to a cached session, so it stays out of logs.
impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionHandle").field(&"[REDACTED]").finish()
    }
}

impl FromStr for SessionHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionHandle {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SessionHandle> for String {
    fn from(handle: SessionHandle) -> Self {
        handle.0
    }
}

impl AsRef<str> for SessionHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_handles_are_fixed_length() {
        let handle = SessionHandle::mint();
        assert_eq!(handle.as_str().len(), HANDLE_LEN);
        assert!(handle.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn minted_handles_are_unique() {
        let a = SessionHandle::mint();
        let b = SessionHandle::mint();
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_string() {
        let handle = SessionHandle::mint();
        let parsed = SessionHandle::new(handle.as_str()).unwrap();
        assert_eq!(handle, parsed);
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(SessionHandle::new("short").is_err());
    }

    #[test]
    fn non_alphanumeric_rejected() {
        assert!(SessionHandle::new("abcdefghij-lmnopqrstuv").is_err());
    }

    #[test]
    fn debug_hides_token() {
        let handle = SessionHandle::mint();
        let debug = format!("{:?}", handle);
        assert!(!debug.contains(handle.as_str()));
        assert!(debug.contains("[REDACTED]"));
    }
}
