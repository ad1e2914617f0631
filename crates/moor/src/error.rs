//! Error types for the moor library.
//!
//! This module provides a unified error type with explicit variants for
//! configuration, transport, authentication, session-bound request and
//! signing errors.

use std::fmt;
use thiserror::Error;

/// The unified error type for moor operations.
///
/// This error type covers all possible failure modes in the library,
/// with explicit variants to allow callers to handle specific cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Client setup errors (unreachable server, failed capability discovery).
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (tree rejection, unresolvable callbacks).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Session-bound request errors (scope rejection, invalid session).
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Proof-of-possession signing errors.
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// A gateway lookup found no live session for the presented handle.
    #[error("session not found")]
    SessionNotFound,

    /// Input validation errors (invalid URL, realm or handle format).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

/// Client configuration errors.
///
/// These are fatal to the calling operation and are not retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The server could not be reached during capability discovery.
    #[error("server unreachable: {message}")]
    Unreachable { message: String },

    /// Capability discovery returned an unexpected shape.
    #[error("unexpected server info: {message}")]
    UnexpectedServerInfo { message: String },

    /// A session-bound operation was attempted before `initialise`.
    #[error("client not initialised")]
    NotInitialised,
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error, including unexpected 5xx responses.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The tree rejected the exchange (wrong credential, unknown tree,
    /// rejected claim). Terminal for the current exchange.
    #[error("rejected: {0}")]
    Rejected(Rejection),

    /// A session-bound call was made before authentication completed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The tree demanded a credential this identity cannot produce.
    #[error("cannot resolve {kind} callback")]
    UnresolvableCallback { kind: String },

    /// The tree completed without returning a session reference.
    #[error("exchange ended without a session reference")]
    Incomplete,
}

/// Errors from session-bound requests (access tokens, attributes, logout).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested scopes exceed what the session or client is
    /// authorized for. The server does not narrow the request.
    #[error("requested scopes rejected: {0}")]
    ScopeRejected(Rejection),

    /// The session is unknown to or expired at the server.
    #[error("session invalid")]
    Invalid,

    /// Any other rejection of a session-bound request.
    #[error("request rejected: {0}")]
    Unexpected(Rejection),
}

/// Signing errors raised while producing proof-of-possession tokens.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The configured key material could not be parsed.
    #[error("invalid signing key: {message}")]
    InvalidKey { message: String },

    /// Token encoding failed.
    #[error("token encoding failed: {message}")]
    Encoding { message: String },
}

impl From<jsonwebtoken::errors::Error> for SigningError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SigningError::Encoding {
            message: err.to_string(),
        }
    }
}

/// A rejection response from the server.
#[derive(Debug)]
pub struct Rejection {
    /// HTTP status code.
    pub status: u16,
    /// Server error code (if present).
    pub code: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl Rejection {
    /// Create a new rejection.
    pub fn new(status: u16, code: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            code,
            message,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref code) = self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid AM base URL.
    #[error("invalid AM URL '{value}': {reason}")]
    AmUrl { value: String, reason: String },

    /// Invalid realm path.
    #[error("invalid realm '{value}': {reason}")]
    Realm { value: String, reason: String },

    /// Invalid session handle format.
    #[error("invalid session handle: {reason}")]
    Handle { reason: String },
}
