//! AM REST client.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, trace};

use crate::error::{AuthError, ConfigurationError, Error, Rejection, SessionError, TransportError};
use crate::thing::ThingBackend;
use crate::types::{AmUrl, Realm};

use super::messages::{AmErrorResponse, AuthExchange, ServerInfo};

/// Default deadline applied to every AM request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT_API_VERSION: &str = "Accept-API-Version";
const SERVER_INFO_API_VERSION: &str = "resource=1.1";
const AUTHENTICATE_API_VERSION: &str = "protocol=1.0,resource=2.1";
const THINGS_API_VERSION: &str = "protocol=2.0,resource=1.0";
const SESSIONS_API_VERSION: &str = "resource=4.0";

/// Connection-level state discovered from the server at initialisation.
///
/// This is distinct from any per-thing session identifier: it describes
/// how to talk to AM, not who is talking.
#[derive(Debug, Clone)]
pub struct AmSession {
    /// Name of the header that carries a session token.
    pub cookie_name: String,
}

/// HTTP client for AM's authentication-tree and session-bound endpoints.
///
/// One client is shared by every thing session routed to the same AM
/// instance. The client holds no per-thing state; session identifiers are
/// passed in per call and the only mutable state is the [`AmSession`]
/// discovered by [`AmClient::initialise`], which may be refreshed at any
/// time without disturbing in-flight exchanges.
#[derive(Debug)]
pub struct AmClient {
    http: reqwest::Client,
    base: AmUrl,
    realm: Realm,
    session: RwLock<Option<AmSession>>,
}

impl AmClient {
    /// Create a new client for the given AM instance and realm.
    pub fn new(base: AmUrl, realm: Realm) -> Self {
        Self::with_timeout(base, realm, DEFAULT_TIMEOUT)
    }

    /// Create a new client with an explicit per-request deadline.
    pub fn with_timeout(base: AmUrl, realm: Realm, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("moor/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base,
            realm,
            session: RwLock::new(None),
        }
    }

    /// Returns the AM base URL this client is configured for.
    pub fn base(&self) -> &AmUrl {
        &self.base
    }

    /// Returns the realm this client operates in.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Returns true once capability discovery has succeeded.
    pub fn is_initialised(&self) -> bool {
        self.session.read().unwrap().is_some()
    }

    /// Discover server capabilities needed for subsequent calls.
    ///
    /// Must be called before any session-bound operation. Safe to call
    /// again at any time; a refreshed [`AmSession`] does not invalidate
    /// identifiers held by in-flight exchanges.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the server is unreachable or the
    /// discovery response has an unexpected shape.
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn initialise(&self) -> Result<(), Error> {
        info!("Discovering AM server capabilities");

        let url = self.base.json_url("serverinfo/*");
        let response = self
            .http
            .get(&url)
            .header(ACCEPT_API_VERSION, SERVER_INFO_API_VERSION)
            .send()
            .await
            .map_err(|e| ConfigurationError::Unreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigurationError::UnexpectedServerInfo {
                message: format!("HTTP {}", status),
            }
            .into());
        }

        let info: ServerInfo =
            response
                .json()
                .await
                .map_err(|e| ConfigurationError::UnexpectedServerInfo {
                    message: e.to_string(),
                })?;

        if info.cookie_name.is_empty() {
            return Err(ConfigurationError::UnexpectedServerInfo {
                message: "empty cookie name".to_string(),
            }
            .into());
        }

        debug!(cookie_name = %info.cookie_name, "Server capabilities discovered");
        *self.session.write().unwrap() = Some(AmSession {
            cookie_name: info.cookie_name,
        });
        Ok(())
    }

    /// Submit one round of an authentication-tree exchange.
    ///
    /// Returns the next exchange state: either further callbacks to
    /// resolve and re-submit, or a terminal state carrying the session
    /// token.
    ///
    /// # Errors
    ///
    /// A 4xx response is an [`AuthError::Rejected`], terminal for this
    /// exchange. Network failures surface as transport errors; neither is
    /// retried here because tree state is round-specific.
    #[instrument(skip(self, exchange), fields(base = %self.base, tree))]
    pub async fn authenticate(
        &self,
        tree: &str,
        mut exchange: AuthExchange,
    ) -> Result<AuthExchange, Error> {
        debug!(step = ?exchange.step(), "Submitting authentication round");

        // The opaque handle is gateway-local state and never goes upstream.
        exchange.handle = None;

        let url = self.base.json_url("authenticate");
        let response = self
            .http
            .post(&url)
            .query(&[
                ("realm", self.realm.as_str()),
                ("authIndexType", "service"),
                ("authIndexValue", tree),
            ])
            .header(ACCEPT_API_VERSION, AUTHENTICATE_API_VERSION)
            .json(&exchange)
            .send()
            .await?;

        let status = response.status();
        trace!(status = %status, "Authentication response");

        if status.is_success() {
            let reply: AuthExchange = response.json().await?;
            debug!(step = ?reply.step(), "Authentication round accepted");
            Ok(reply)
        } else if status.is_client_error() {
            Err(AuthError::Rejected(Self::rejection(response).await).into())
        } else {
            Err(TransportError::Http {
                message: format!("HTTP {}", status),
            }
            .into())
        }
    }

    /// Request an access token bound to an authenticated session.
    ///
    /// # Errors
    ///
    /// [`SessionError::ScopeRejected`] when the requested scopes exceed
    /// what the session or client is authorized for; the server never
    /// narrows the request. [`SessionError::Invalid`] when the session is
    /// unknown or expired.
    #[instrument(skip(self, session_id), fields(base = %self.base))]
    pub async fn access_token(&self, session_id: &str, scopes: &[String]) -> Result<Value, Error> {
        debug!(?scopes, "Requesting access token");

        let session = self.am_session()?;
        let url = self.base.json_url("things/*");

        #[derive(Serialize)]
        struct AccessTokenRequest<'a> {
            // Omitted entirely when no scopes are requested; the server
            // then applies the client's default scopes.
            #[serde(skip_serializing_if = "Option::is_none")]
            scope: Option<&'a [String]>,
        }

        let body = AccessTokenRequest {
            scope: (!scopes.is_empty()).then_some(scopes),
        };

        let response = self
            .http
            .post(&url)
            .query(&[
                ("realm", self.realm.as_str()),
                ("_action", "get_access_token"),
            ])
            .header(ACCEPT_API_VERSION, THINGS_API_VERSION)
            .header(session.cookie_name.as_str(), session_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::session_op_error(response).await)
        }
    }

    /// Request identity attributes bound to an authenticated session.
    ///
    /// An empty `names` filter returns all readable attributes; named
    /// filters are best-effort, with unknown names omitted by the server
    /// rather than rejected.
    #[instrument(skip(self, session_id), fields(base = %self.base))]
    pub async fn attributes(&self, session_id: &str, names: &[String]) -> Result<Value, Error> {
        debug!(?names, "Requesting attributes");

        let session = self.am_session()?;
        let url = self.base.json_url("things/*");

        let mut request = self
            .http
            .get(&url)
            .query(&[("realm", self.realm.as_str())])
            .header(ACCEPT_API_VERSION, THINGS_API_VERSION)
            .header(session.cookie_name.as_str(), session_id);
        if !names.is_empty() {
            request = request.query(&[("_fields", names.join(","))]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::session_op_error(response).await)
        }
    }

    /// Invalidate a session at the server.
    #[instrument(skip(self, session_id), fields(base = %self.base))]
    pub async fn logout(&self, session_id: &str) -> Result<(), Error> {
        debug!("Logging out session");

        let session = self.am_session()?;
        let url = self.base.json_url("sessions/");

        let response = self
            .http
            .post(&url)
            .query(&[("_action", "logout")])
            .header(ACCEPT_API_VERSION, SESSIONS_API_VERSION)
            .header(session.cookie_name.as_str(), session_id)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::session_op_error(response).await)
        }
    }

    fn am_session(&self) -> Result<AmSession, Error> {
        self.session
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| ConfigurationError::NotInitialised.into())
    }

    /// Map a non-success response from a session-bound endpoint.
    async fn session_op_error(response: reqwest::Response) -> Error {
        let status = response.status();
        match status.as_u16() {
            401 => SessionError::Invalid.into(),
            400 | 403 => SessionError::ScopeRejected(Self::rejection(response).await).into(),
            402..=499 => SessionError::Unexpected(Self::rejection(response).await).into(),
            _ => TransportError::Http {
                message: format!("HTTP {}", status),
            }
            .into(),
        }
    }

    /// Parse a rejection response body.
    async fn rejection(response: reqwest::Response) -> Rejection {
        let status = response.status().as_u16();

        match response.json::<AmErrorResponse>().await {
            Ok(body) => Rejection::new(status, body.reason, body.message),
            Err(_) => Rejection::new(status, None, None),
        }
    }
}

#[async_trait]
impl ThingBackend for AmClient {
    async fn initialise(&self) -> Result<(), Error> {
        AmClient::initialise(self).await
    }

    async fn authenticate(&self, tree: &str, exchange: AuthExchange) -> Result<AuthExchange, Error> {
        AmClient::authenticate(self, tree, exchange).await
    }

    async fn access_token(&self, session_ref: &str, scopes: &[String]) -> Result<Value, Error> {
        AmClient::access_token(self, session_ref, scopes).await
    }

    async fn attributes(&self, session_ref: &str, names: &[String]) -> Result<Value, Error> {
        AmClient::attributes(self, session_ref, names).await
    }

    async fn logout(&self, session_ref: &str) -> Result<(), Error> {
        AmClient::logout(self, session_ref).await
    }
}
