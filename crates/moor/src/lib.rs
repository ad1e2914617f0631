//! moor - an edge gateway for things authenticating to Access Management.
//!
//! This library lets resource-constrained devices ("things") authenticate
//! to a central AM service without driving AM's multi-round
//! authentication-tree protocol themselves, and without ever observing
//! AM's real session identifiers. A [`Gateway`] multiplexes many device
//! sessions onto one [`AmClient`] and hands devices opaque
//! [`SessionHandle`]s in place of the identifiers it caches on their
//! behalf.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use moor::{AmClient, AmUrl, Realm, SigningAlg, SigningKey, ThingIdentity, ThingSession};
//!
//! # async fn example() -> Result<(), moor::Error> {
//! let base = AmUrl::new("https://am.example.com/openam")?;
//! let client = Arc::new(AmClient::new(base, Realm::new("/edge")?));
//! client.initialise().await?;
//!
//! let pem = std::fs::read("thing.key.pem").expect("key file");
//! let key = SigningKey::from_pem(SigningAlg::Es256, "pop.cnf", &pem)?;
//! let identity = ThingIdentity::new("sensor-17", Realm::new("/edge")?).with_key(key);
//!
//! let session = ThingSession::new(identity, client, "RegisteredThings");
//! session.authenticate().await?;
//! let token = session.access_token(&["publish".to_string()]).await?;
//! println!("{}", token);
//! # Ok(())
//! # }
//! ```

pub mod am;
pub mod error;
pub mod gateway;
pub mod thing;
pub mod types;

// Re-export primary types at crate root for convenience
pub use am::{AmClient, AuthExchange, Callback, CallbackKind, ExchangeStep};
pub use error::Error;
pub use gateway::{Gateway, SessionCache};
pub use thing::{SigningAlg, SigningKey, ThingBackend, ThingIdentity, ThingSession};
pub use types::{AmUrl, Realm, SessionHandle};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
