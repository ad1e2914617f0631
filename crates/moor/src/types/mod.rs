//! Validated value types used throughout the library.

mod am_url;
mod handle;
mod realm;

pub use am_url::AmUrl;
pub use handle::SessionHandle;
pub use realm::Realm;
