//! OAuth2 authorization persistence: the in-memory authorization graph, the
//! flat record it is persisted as, and the stores layered on the key-value
//! backend.

pub mod authorization;
pub mod record;
pub mod store;

pub use authorization::{AccessToken, AccessTokenType, Authorization, IssuedToken, TokenKind};
pub use store::{AuthorizationStore, ConsentRecord, ConsentStore};
