//! AM wire messages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::callbacks::Callback;
use crate::types::SessionHandle;

/// One round of an authentication-tree exchange.
///
/// The same struct serves both directions: it is POSTed to AM with any
/// callback answers, and it carries AM's reply back. The identifier
/// fields are asymmetric by design — AM populates them, while a gateway
/// must strip them before the exchange reaches a device, substituting
/// the opaque [`SessionHandle`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthExchange {
    /// Round-correlation token issued by AM while the tree is in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,

    /// Terminal session token issued by AM when the tree completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,

    /// Credential-collection requests still to be answered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callbacks: Vec<Callback>,

    /// Gateway-minted opaque handle. Device-facing only; a gateway takes
    /// it before the exchange goes upstream and restores it on the way
    /// back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<SessionHandle>,
}

/// Where a multi-round exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStep {
    /// Nothing submitted yet.
    Initial,
    /// AM returned callbacks that still need answers.
    InProgress,
    /// AM issued a terminal session token.
    Complete,
}

impl AuthExchange {
    /// An empty exchange, starting a fresh walk of the tree.
    pub fn start() -> Self {
        Self::default()
    }

    /// Returns the current step of the exchange.
    pub fn step(&self) -> ExchangeStep {
        if self.token_id.is_some() {
            ExchangeStep::Complete
        } else if self.auth_id.is_some() || !self.callbacks.is_empty() {
            ExchangeStep::InProgress
        } else {
            ExchangeStep::Initial
        }
    }

    /// Returns whether AM has issued a terminal session token.
    pub fn is_terminal(&self) -> bool {
        self.step() == ExchangeStep::Complete
    }

    /// Returns the real session identifier, if AM has issued one.
    ///
    /// A terminal token takes precedence over an in-progress round token.
    pub fn session_id(&self) -> Option<&str> {
        self.token_id.as_deref().or(self.auth_id.as_deref())
    }

    /// Takes the real session identifier out of the exchange, clearing
    /// every identifier field.
    ///
    /// After this call the exchange is safe to hand to a device.
    pub fn take_session_id(&mut self) -> Option<String> {
        let token_id = self.token_id.take();
        let auth_id = self.auth_id.take();
        token_id.or(auth_id)
    }
}

// Identifiers are session-granting secrets; keep them out of Debug output.
impl fmt::Debug for AuthExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthExchange")
            .field("auth_id", &self.auth_id.as_ref().map(|_| "[REDACTED]"))
            .field("token_id", &self.token_id.as_ref().map(|_| "[REDACTED]"))
            .field("callbacks", &self.callbacks.len())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Server capability information discovered at initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Name of the header carrying a session token on session-bound calls.
    pub cookie_name: String,
}

/// AM error response format.
#[derive(Debug, Deserialize)]
pub(crate) struct AmErrorResponse {
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_exchange_is_initial() {
        assert_eq!(AuthExchange::start().step(), ExchangeStep::Initial);
    }

    #[test]
    fn callbacks_mean_in_progress() {
        let exchange = AuthExchange {
            auth_id: Some("A-1".to_string()),
            callbacks: vec![Callback::password("Password")],
            ..Default::default()
        };
        assert_eq!(exchange.step(), ExchangeStep::InProgress);
        assert_eq!(exchange.session_id(), Some("A-1"));
    }

    #[test]
    fn token_means_complete() {
        let exchange = AuthExchange {
            token_id: Some("S-1".to_string()),
            ..Default::default()
        };
        assert!(exchange.is_terminal());
        assert_eq!(exchange.session_id(), Some("S-1"));
    }

    #[test]
    fn take_session_id_clears_all_identifiers() {
        let mut exchange = AuthExchange {
            auth_id: Some("A-1".to_string()),
            token_id: Some("S-1".to_string()),
            ..Default::default()
        };
        assert_eq!(exchange.take_session_id(), Some("S-1".to_string()));
        assert!(exchange.auth_id.is_none());
        assert!(exchange.token_id.is_none());
        assert_eq!(exchange.take_session_id(), None);
    }

    #[test]
    fn empty_exchange_serializes_to_empty_object() {
        let json = serde_json::to_value(AuthExchange::start()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn debug_hides_identifiers() {
        let exchange = AuthExchange {
            auth_id: Some("A-1".to_string()),
            token_id: Some("S-1".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", exchange);
        assert!(!debug.contains("A-1"));
        assert!(!debug.contains("S-1"));
    }
}
