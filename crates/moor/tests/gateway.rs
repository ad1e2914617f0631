//! Gateway boundary tests.
//!
//! The gateway's contract — real identifiers never reach a device, the
//! opaque handle never reaches AM — is exercised against a scripted
//! backend, plus end-to-end against a wiremock AM server.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use moor::error::{AuthError, Rejection};
use moor::{
    AmClient, AmUrl, AuthExchange, Callback, Error, Gateway, Realm, SessionHandle, ThingBackend,
    ThingIdentity, ThingSession,
};

type AuthenticateFn = Box<dyn Fn(&AuthExchange) -> Result<AuthExchange, Error> + Send + Sync>;
type SessionOpFn = Box<dyn Fn(&str) -> Result<Value, Error> + Send + Sync>;

/// A scripted backend standing in for the AM client.
#[derive(Default)]
struct ScriptedBackend {
    authenticate_fn: Option<AuthenticateFn>,
    access_token_fn: Option<SessionOpFn>,
}

#[async_trait]
impl ThingBackend for ScriptedBackend {
    async fn initialise(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn authenticate(
        &self,
        _tree: &str,
        exchange: AuthExchange,
    ) -> Result<AuthExchange, Error> {
        match &self.authenticate_fn {
            Some(f) => f(&exchange),
            None => Ok(AuthExchange {
                token_id: Some("S-scripted".to_string()),
                ..Default::default()
            }),
        }
    }

    async fn access_token(&self, session_ref: &str, _scopes: &[String]) -> Result<Value, Error> {
        match &self.access_token_fn {
            Some(f) => f(session_ref),
            None => Ok(json!({})),
        }
    }

    async fn attributes(&self, session_ref: &str, _names: &[String]) -> Result<Value, Error> {
        match &self.access_token_fn {
            Some(f) => f(session_ref),
            None => Ok(json!({})),
        }
    }

    async fn logout(&self, _session_ref: &str) -> Result<(), Error> {
        Ok(())
    }
}

fn gateway_over(backend: ScriptedBackend) -> Gateway {
    Gateway::new(Arc::new(backend), "EdgeThings")
}

// ============================================================================
// Boundary Tests (scripted backend)
// ============================================================================

// The opaque handle is gateway-local and must never go upstream.
#[tokio::test]
async fn test_handle_is_not_sent_upstream() {
    let backend = ScriptedBackend {
        authenticate_fn: Some(Box::new(|exchange| {
            if exchange.handle.is_some() {
                return Err(AuthError::Rejected(Rejection::new(400, None, None)).into());
            }
            Ok(AuthExchange {
                auth_id: Some("A-1".to_string()),
                ..Default::default()
            })
        })),
        ..Default::default()
    };
    let gateway = gateway_over(backend);

    let reply = gateway.authenticate(AuthExchange::start()).await.unwrap();
    // Resubmitting the device-held reply must still keep the handle local.
    gateway.authenticate(reply).await.unwrap();
}

// Whatever AM returns, the device-bound reply carries no real identifier.
#[tokio::test]
async fn test_identifiers_are_not_returned_to_device() {
    let backend = ScriptedBackend {
        authenticate_fn: Some(Box::new(|_| {
            Ok(AuthExchange {
                auth_id: Some("A-1".to_string()),
                token_id: Some("S-1".to_string()),
                ..Default::default()
            })
        })),
        ..Default::default()
    };
    let gateway = gateway_over(backend);

    let reply = gateway.authenticate(AuthExchange::start()).await.unwrap();
    assert!(reply.auth_id.is_none());
    assert!(reply.token_id.is_none());
    assert!(reply.handle.is_some());
}

// The cached identifier is what session-bound delegation resolves to.
#[tokio::test]
async fn test_identifier_is_cached_under_the_handle() {
    let backend = ScriptedBackend {
        authenticate_fn: Some(Box::new(|_| {
            Ok(AuthExchange {
                token_id: Some("S-1".to_string()),
                ..Default::default()
            })
        })),
        access_token_fn: Some(Box::new(|session_ref| {
            assert_eq!(session_ref, "S-1");
            Ok(json!({"access_token": "AT-1"}))
        })),
    };
    let gateway = gateway_over(backend);

    let reply = gateway.authenticate(AuthExchange::start()).await.unwrap();
    let handle = reply.handle.unwrap();

    let token = gateway.access_token(&handle, &[]).await.unwrap();
    assert_eq!(token["access_token"], "AT-1");
}

// Resuming with a still-valid handle keeps the handle stable.
#[tokio::test]
async fn test_resume_does_not_mint_a_new_handle() {
    let gateway = gateway_over(ScriptedBackend::default());

    let first = gateway.authenticate(AuthExchange::start()).await.unwrap();
    let issued = first.handle.clone().unwrap();

    let second = gateway.authenticate(first).await.unwrap();
    assert_eq!(second.handle.unwrap(), issued);
}

// A presented handle is resolved back into the real round token upstream.
#[tokio::test]
async fn test_resume_restores_the_real_identifier() {
    let backend = ScriptedBackend {
        authenticate_fn: Some(Box::new(|exchange| {
            match exchange.auth_id.as_deref() {
                // Round 1: fresh exchange opens the round.
                None => Ok(AuthExchange {
                    auth_id: Some("A-1".to_string()),
                    callbacks: vec![Callback::password("Password")],
                    ..Default::default()
                }),
                // Round 2: the gateway must have restored the token.
                Some("A-1") => Ok(AuthExchange {
                    token_id: Some("S-1".to_string()),
                    ..Default::default()
                }),
                Some(other) => panic!("unexpected round token {other}"),
            }
        })),
        ..Default::default()
    };
    let gateway = gateway_over(backend);

    let mut round1 = gateway.authenticate(AuthExchange::start()).await.unwrap();
    assert_eq!(round1.callbacks.len(), 1);
    round1.callbacks[0].fill("5tr0ng-s3cr3t");

    let round2 = gateway.authenticate(round1).await.unwrap();
    assert!(round2.callbacks.is_empty());
    assert!(round2.token_id.is_none());
}

// A rejected exchange leaves no trace in the cache.
#[tokio::test]
async fn test_rejection_adds_no_cache_entry() {
    let backend = ScriptedBackend {
        authenticate_fn: Some(Box::new(|_| {
            Err(AuthError::Rejected(Rejection::new(
                401,
                Some("Unauthorized".to_string()),
                Some("custom claim rejected".to_string()),
            ))
            .into())
        })),
        ..Default::default()
    };
    let gateway = gateway_over(backend);

    let result = gateway.authenticate(AuthExchange::start()).await;
    assert!(matches!(result, Err(Error::Auth(AuthError::Rejected(_)))));

    // No session exists for any handle a device might try.
    let result = gateway.access_token(&SessionHandle::mint(), &[]).await;
    assert!(matches!(result, Err(Error::SessionNotFound)));
}

#[tokio::test]
async fn test_unknown_handle_is_session_not_found() {
    let gateway = gateway_over(ScriptedBackend::default());

    let result = gateway.attributes(&SessionHandle::mint(), &[]).await;
    assert!(matches!(result, Err(Error::SessionNotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_expired_handle_is_session_not_found() {
    let gateway = Gateway::with_cache_timing(
        Arc::new(ScriptedBackend::default()),
        "EdgeThings",
        Duration::from_secs(5),
        Duration::from_secs(10),
    );

    let reply = gateway.authenticate(AuthExchange::start()).await.unwrap();
    let handle = reply.handle.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    let result = gateway.access_token(&handle, &[]).await;
    assert!(matches!(result, Err(Error::SessionNotFound)));
}

#[tokio::test(start_paused = true)]
async fn test_successful_use_rearms_the_mapping() {
    let gateway = Gateway::with_cache_timing(
        Arc::new(ScriptedBackend::default()),
        "EdgeThings",
        Duration::from_secs(5),
        Duration::from_secs(10),
    );

    let reply = gateway.authenticate(AuthExchange::start()).await.unwrap();
    let handle = reply.handle.unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;
    gateway.access_token(&handle, &[]).await.unwrap();

    // Past the original deadline, inside the re-armed one.
    tokio::time::advance(Duration::from_secs(4)).await;
    gateway.access_token(&handle, &[]).await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;
    let result = gateway.access_token(&handle, &[]).await;
    assert!(matches!(result, Err(Error::SessionNotFound)));
}

#[tokio::test]
async fn test_logout_removes_the_mapping() {
    let gateway = gateway_over(ScriptedBackend::default());

    let reply = gateway.authenticate(AuthExchange::start()).await.unwrap();
    let handle = reply.handle.unwrap();

    gateway.logout(&handle).await.unwrap();
    let result = gateway.logout(&handle).await;
    assert!(matches!(result, Err(Error::SessionNotFound)));
}

// ============================================================================
// End-to-End Tests (wiremock AM)
// ============================================================================

const COOKIE_NAME: &str = "iPlanetDirectoryPro";

async fn mock_am(server: &MockServer) -> Arc<AmClient> {
    Mock::given(method("GET"))
        .and(path("/json/serverinfo/*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cookieName": COOKIE_NAME
        })))
        .mount(server)
        .await;

    let base = AmUrl::new(format!("http://127.0.0.1:{}", server.address().port())).unwrap();
    Arc::new(AmClient::new(base, Realm::root()))
}

/// The full proxy scenario: a device walks a password tree through the
/// gateway, never sees the session token, and spends its handle on an
/// access token.
#[tokio::test]
async fn test_device_exchange_end_to_end() {
    let server = MockServer::start().await;
    let client = mock_am(&server).await;

    Mock::given(method("POST"))
        .and(path("/json/authenticate"))
        .and(query_param("authIndexValue", "EdgeThings"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authId": "A-1",
            "callbacks": [{
                "type": "PasswordCallback",
                "output": [{"name": "prompt", "value": "Password"}],
                "input": [{"name": "IDToken1", "value": ""}]
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/json/authenticate"))
        .and(body_partial_json(json!({"authId": "A-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokenId": "S-1"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/json/things/*"))
        .and(query_param("_action", "get_access_token"))
        .and(header(COOKIE_NAME, "S-1"))
        .and(body_json(json!({"scope": ["read"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "AT-1",
            "scope": "read",
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::new(client, "EdgeThings");
    gateway.initialise().await.unwrap();

    // Round 1: the device opens the exchange.
    let mut round1 = gateway.authenticate(AuthExchange::start()).await.unwrap();
    let serialized = serde_json::to_string(&round1).unwrap();
    assert!(!serialized.contains("A-1"));
    let handle = round1.handle.clone().unwrap();
    assert_eq!(round1.callbacks.len(), 1);

    // Round 2: the device answers and resubmits under its handle.
    round1.callbacks[0].fill("5tr0ng-s3cr3t");
    let round2 = gateway.authenticate(round1).await.unwrap();
    let serialized = serde_json::to_string(&round2).unwrap();
    assert!(!serialized.contains("S-1"));
    assert!(!serialized.contains("A-1"));
    assert_eq!(round2.handle.as_ref(), Some(&handle));

    // The handle resolves to the real token internally.
    let token = gateway
        .access_token(&handle, &["read".to_string()])
        .await
        .unwrap();
    assert_eq!(token["access_token"], "AT-1");

    // AM never saw the handle.
    let requests = server.received_requests().await.unwrap();
    for request in requests
        .iter()
        .filter(|r| r.url.path() == "/json/authenticate")
    {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert!(body.get("handle").is_none());
        assert!(!String::from_utf8_lossy(&request.body).contains(handle.as_str()));
    }
}

/// A thing session is oblivious to being routed through a gateway: it
/// authenticates, holds only the opaque handle, and spends it normally.
#[tokio::test]
async fn test_thing_session_through_gateway() {
    let server = MockServer::start().await;
    let client = mock_am(&server).await;

    Mock::given(method("POST"))
        .and(path("/json/authenticate"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authId": "A-1",
            "callbacks": [{
                "type": "NameCallback",
                "output": [{"name": "prompt", "value": "User Name"}],
                "input": [{"name": "IDToken1", "value": ""}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/json/authenticate"))
        .and(body_partial_json(json!({"authId": "A-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokenId": "S-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/things/*"))
        .and(header(COOKIE_NAME, "S-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "sensor-17",
            "thingType": "device"
        })))
        .mount(&server)
        .await;

    let gateway = Arc::new(Gateway::new(client, "EdgeThings"));
    gateway.initialise().await.unwrap();

    let identity = ThingIdentity::new("sensor-17", Realm::root());
    // The tree named here is advisory; the gateway routes its own.
    let session = ThingSession::new(identity, gateway, "Ignored");

    let session_ref = session.authenticate().await.unwrap();
    assert_ne!(session_ref, "S-1");

    let attrs = session.attributes(&[]).await.unwrap();
    assert_eq!(attrs["thingType"], "device");
}
