//! The per-thing session state machine.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::am::{AuthExchange, Callback, CallbackKind};
use crate::error::{AuthError, Error};

use super::backend::ThingBackend;
use super::identity::ThingIdentity;
use super::pop;

/// A session representing one thing's relationship with AM.
///
/// The session owns the thing's identity and drives it through
/// authentication: each round's callbacks are resolved locally (name,
/// secret, or a signed proof-of-possession over the server challenge)
/// and re-submitted until the tree completes. Once authenticated, the
/// session can request access tokens and attributes, and log out.
///
/// The session talks to AM through a [`ThingBackend`] — either an
/// [`AmClient`](crate::AmClient) directly or a
/// [`Gateway`](crate::Gateway); the session never needs to know which.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use moor::{AmClient, AmUrl, Realm, ThingIdentity, ThingSession};
///
/// # async fn example() -> Result<(), moor::Error> {
/// let base = AmUrl::new("https://am.example.com/openam")?;
/// let client = Arc::new(AmClient::new(base, Realm::root()));
/// client.initialise().await?;
///
/// let identity = ThingIdentity::new("sensor-17", Realm::root()).with_secret("5tr0ng-s3cr3t");
/// let session = ThingSession::new(identity, client, "PasswordThings");
/// session.authenticate().await?;
/// let token = session.access_token(&["publish".to_string()]).await?;
/// # Ok(())
/// # }
/// ```
pub struct ThingSession {
    identity: ThingIdentity,
    backend: Arc<dyn ThingBackend>,
    tree: String,
    state: RwLock<SessionState>,
}

enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated { session_ref: String },
}

impl ThingSession {
    /// Create a new session for an identity, routed through a backend.
    pub fn new(
        identity: ThingIdentity,
        backend: Arc<dyn ThingBackend>,
        tree: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            backend,
            tree: tree.into(),
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    /// Returns the identity this session represents.
    pub fn identity(&self) -> &ThingIdentity {
        &self.identity
    }

    /// Returns true once authentication has completed.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            *self.state.read().unwrap(),
            SessionState::Authenticated { .. }
        )
    }

    /// Walk the authentication tree to completion.
    ///
    /// Returns the session reference under which the authenticated
    /// session is now addressable: the opaque handle when routed through
    /// a gateway, AM's own token when direct. A rejected round is
    /// terminal; the session returns to its unauthenticated state and the
    /// device must start over.
    #[instrument(skip(self), fields(thing = %self.identity.name(), tree = %self.tree))]
    pub async fn authenticate(&self) -> Result<String, Error> {
        info!("Authenticating thing");
        *self.state.write().unwrap() = SessionState::Authenticating;

        let mut exchange = AuthExchange::start();
        loop {
            let mut reply = match self.backend.authenticate(&self.tree, exchange).await {
                Ok(reply) => reply,
                Err(e) => {
                    *self.state.write().unwrap() = SessionState::Unauthenticated;
                    return Err(e);
                }
            };

            if reply.callbacks.is_empty() {
                // Terminal round. Through a gateway the reference is the
                // opaque handle; direct to AM it is the session token.
                let session_ref = reply
                    .handle
                    .take()
                    .map(String::from)
                    .or_else(|| reply.take_session_id())
                    .ok_or_else(|| {
                        *self.state.write().unwrap() = SessionState::Unauthenticated;
                        Error::from(AuthError::Incomplete)
                    })?;

                debug!("Thing authenticated");
                *self.state.write().unwrap() = SessionState::Authenticated {
                    session_ref: session_ref.clone(),
                };
                return Ok(session_ref);
            }

            debug!(
                callbacks = reply.callbacks.len(),
                "Resolving tree callbacks"
            );
            for callback in reply.callbacks.iter_mut() {
                if let Err(e) = self.resolve(callback) {
                    *self.state.write().unwrap() = SessionState::Unauthenticated;
                    return Err(e);
                }
            }
            exchange = reply;
        }
    }

    /// Request an access token constrained to the given scopes.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::NotAuthenticated`] unless
    /// [`authenticate`](Self::authenticate) has completed.
    #[instrument(skip(self), fields(thing = %self.identity.name()))]
    pub async fn access_token(&self, scopes: &[String]) -> Result<Value, Error> {
        let session_ref = self.session_ref()?;
        self.backend.access_token(&session_ref, scopes).await
    }

    /// Request identity attributes, optionally filtered by name.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::NotAuthenticated`] unless
    /// [`authenticate`](Self::authenticate) has completed.
    #[instrument(skip(self), fields(thing = %self.identity.name()))]
    pub async fn attributes(&self, names: &[String]) -> Result<Value, Error> {
        let session_ref = self.session_ref()?;
        self.backend.attributes(&session_ref, names).await
    }

    /// Invalidate the authenticated session.
    #[instrument(skip(self), fields(thing = %self.identity.name()))]
    pub async fn logout(&self) -> Result<(), Error> {
        let session_ref = self.session_ref()?;
        self.backend.logout(&session_ref).await?;
        *self.state.write().unwrap() = SessionState::Unauthenticated;
        Ok(())
    }

    /// Answer one callback from the thing's own credentials.
    fn resolve(&self, callback: &mut Callback) -> Result<(), Error> {
        let filled = match callback.classify() {
            CallbackKind::Name => callback.fill(self.identity.name()),
            CallbackKind::Password => {
                let secret = self.identity.secret().ok_or_else(|| {
                    AuthError::UnresolvableCallback {
                        kind: callback.kind.clone(),
                    }
                })?;
                callback.fill(secret)
            }
            CallbackKind::PopChallenge { challenge } => {
                let key = self
                    .identity
                    .key()
                    .ok_or_else(|| AuthError::UnresolvableCallback {
                        kind: callback.kind.clone(),
                    })?;
                let token = pop::sign_challenge(&self.identity, key, &challenge)?;
                callback.fill(token)
            }
            CallbackKind::Unknown => false,
        };

        if filled {
            Ok(())
        } else {
            Err(AuthError::UnresolvableCallback {
                kind: callback.kind.clone(),
            }
            .into())
        }
    }

    fn session_ref(&self) -> Result<String, Error> {
        match &*self.state.read().unwrap() {
            SessionState::Authenticated { session_ref } => Ok(session_ref.clone()),
            _ => Err(AuthError::NotAuthenticated.into()),
        }
    }
}

// Custom Debug impl that hides the session reference
impl std::fmt::Debug for ThingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingSession")
            .field("identity", &self.identity)
            .field("tree", &self.tree)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
