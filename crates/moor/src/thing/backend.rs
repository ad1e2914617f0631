//! The backend seam between a thing session and AM.

use async_trait::async_trait;
use serde_json::Value;

use crate::am::AuthExchange;
use crate::error::Error;

/// Operations a thing session needs from whatever stands between it and
/// AM.
///
/// Implemented by [`AmClient`](crate::AmClient) for direct access and by
/// [`Gateway`](crate::Gateway) for proxied access. The `session_ref`
/// passed to session-bound operations is whatever reference the backend
/// issued for the authenticated session: AM's real token when direct, an
/// opaque [`SessionHandle`](crate::SessionHandle) token when routed
/// through a gateway. Callers treat it as opaque either way.
#[async_trait]
pub trait ThingBackend: Send + Sync {
    /// Prepare the backend for use (capability discovery).
    async fn initialise(&self) -> Result<(), Error>;

    /// Submit one round of an authentication-tree exchange.
    ///
    /// The `tree` argument is advisory: a gateway routes every exchange
    /// through its own configured tree.
    async fn authenticate(&self, tree: &str, exchange: AuthExchange) -> Result<AuthExchange, Error>;

    /// Request an access token for an authenticated session.
    async fn access_token(&self, session_ref: &str, scopes: &[String]) -> Result<Value, Error>;

    /// Request identity attributes for an authenticated session.
    async fn attributes(&self, session_ref: &str, names: &[String]) -> Result<Value, Error>;

    /// Invalidate an authenticated session.
    async fn logout(&self, session_ref: &str) -> Result<(), Error>;
}
