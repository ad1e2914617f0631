//! AM protocol support: wire messages, callbacks and the REST client.

mod callbacks;
mod client;
mod messages;

pub use callbacks::{Callback, CallbackEntry, CallbackKind, POP_CHALLENGE_ID};
pub use client::{AmClient, AmSession, DEFAULT_TIMEOUT};
pub use messages::{AuthExchange, ExchangeStep, ServerInfo};
