//! The device-facing gateway.
//!
//! The gateway is the boundary that keeps AM's real session identifiers
//! on the AM side: devices only ever see opaque handles, and every
//! exchange that crosses back to a device is sanitized before it leaves.

mod cache;

pub use cache::SessionCache;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Duration;
use tracing::{debug, instrument};

use crate::am::AuthExchange;
use crate::error::Error;
use crate::thing::ThingBackend;
use crate::types::SessionHandle;

/// Default lifetime of a cached session mapping.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval between cache sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// An edge gateway multiplexing many things onto one AM client.
///
/// The gateway exposes the device-facing operation set — authenticate,
/// access token, attributes, logout — and substitutes opaque
/// [`SessionHandle`]s for AM's real session identifiers at the boundary.
/// The real identifier for each device session lives only in the
/// gateway's [`SessionCache`], keyed by the handle the device holds.
///
/// `Gateway` itself implements [`ThingBackend`], so a
/// [`ThingSession`](crate::ThingSession) can be driven through a gateway
/// exactly as it would be driven against an
/// [`AmClient`](crate::AmClient) directly.
///
/// # Panics
///
/// Construction must happen within a Tokio runtime; the session cache
/// spawns its sweep task eagerly.
pub struct Gateway {
    client: Arc<dyn ThingBackend>,
    cache: SessionCache,
    tree: String,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("tree", &self.tree)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Gateway {
    /// Create a gateway over a shared AM client, with default cache
    /// timing.
    ///
    /// All exchanges routed through the gateway use `tree`.
    pub fn new(client: Arc<dyn ThingBackend>, tree: impl Into<String>) -> Self {
        Self::with_cache_timing(client, tree, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a gateway with explicit cache TTL and sweep interval.
    pub fn with_cache_timing(
        client: Arc<dyn ThingBackend>,
        tree: impl Into<String>,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            client,
            cache: SessionCache::new(ttl, sweep_interval),
            tree: tree.into(),
        }
    }

    /// Returns the tree every routed exchange walks.
    pub fn tree(&self) -> &str {
        &self.tree
    }

    /// Prepare the underlying AM client for use.
    pub async fn initialise(&self) -> Result<(), Error> {
        self.client.initialise().await
    }

    /// Proxy one round of a device's authentication exchange.
    ///
    /// Any handle presented by the device is resolved to the real
    /// identifier it maps to and kept out of the upstream request. When
    /// AM's reply carries an identifier, it is cached under the device's
    /// existing handle — or a freshly minted one — and stripped from the
    /// reply. The reply a device receives never contains a real
    /// identifier, whatever AM returned.
    #[instrument(skip(self, exchange))]
    pub async fn authenticate(&self, mut exchange: AuthExchange) -> Result<AuthExchange, Error> {
        debug!("Proxying authentication round");

        let presented = exchange.handle.take();
        if let Some(handle) = &presented {
            if let Some(real) = self.cache.get(handle) {
                exchange.auth_id = Some(real);
            }
        }

        let mut reply = self.client.authenticate(&self.tree, exchange).await?;

        match reply.take_session_id() {
            Some(real) => {
                let handle = presented.unwrap_or_else(SessionHandle::mint);
                self.cache.put(handle.clone(), real);
                reply.handle = Some(handle);
            }
            None => {
                // Nothing to re-key; hand any presented handle back so the
                // device keeps its correlation token.
                reply.handle = presented;
            }
        }

        Ok(reply)
    }

    /// Request an access token for the session a handle maps to.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SessionNotFound`] when the handle has no live
    /// cache entry; the device must re-authenticate.
    #[instrument(skip(self, handle, scopes))]
    pub async fn access_token(
        &self,
        handle: &SessionHandle,
        scopes: &[String],
    ) -> Result<Value, Error> {
        let session_id = self.cache.get(handle).ok_or(Error::SessionNotFound)?;
        let reply = self.client.access_token(&session_id, scopes).await?;
        // A successful use re-arms the mapping.
        self.cache.refresh(handle);
        Ok(reply)
    }

    /// Request attributes for the session a handle maps to.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::SessionNotFound`] when the handle has no live
    /// cache entry.
    #[instrument(skip(self, handle, names))]
    pub async fn attributes(
        &self,
        handle: &SessionHandle,
        names: &[String],
    ) -> Result<Value, Error> {
        let session_id = self.cache.get(handle).ok_or(Error::SessionNotFound)?;
        let reply = self.client.attributes(&session_id, names).await?;
        self.cache.refresh(handle);
        Ok(reply)
    }

    /// Invalidate the session a handle maps to, at AM and in the cache.
    #[instrument(skip(self, handle))]
    pub async fn logout(&self, handle: &SessionHandle) -> Result<(), Error> {
        let session_id = self.cache.get(handle).ok_or(Error::SessionNotFound)?;
        self.client.logout(&session_id).await?;
        self.cache.remove(handle);
        Ok(())
    }

    fn parse_handle(session_ref: &str) -> Result<SessionHandle, Error> {
        // A reference that cannot be a handle cannot be in the cache.
        SessionHandle::new(session_ref).map_err(|_| Error::SessionNotFound)
    }
}

#[async_trait]
impl ThingBackend for Gateway {
    async fn initialise(&self) -> Result<(), Error> {
        Gateway::initialise(self).await
    }

    /// Routed exchanges always walk the gateway's configured tree; the
    /// caller's tree is ignored.
    async fn authenticate(
        &self,
        _tree: &str,
        exchange: AuthExchange,
    ) -> Result<AuthExchange, Error> {
        Gateway::authenticate(self, exchange).await
    }

    async fn access_token(&self, session_ref: &str, scopes: &[String]) -> Result<Value, Error> {
        let handle = Self::parse_handle(session_ref)?;
        Gateway::access_token(self, &handle, scopes).await
    }

    async fn attributes(&self, session_ref: &str, names: &[String]) -> Result<Value, Error> {
        let handle = Self::parse_handle(session_ref)?;
        Gateway::attributes(self, &handle, names).await
    }

    async fn logout(&self, session_ref: &str) -> Result<(), Error> {
        let handle = Self::parse_handle(session_ref)?;
        Gateway::logout(self, &handle).await
    }
}
