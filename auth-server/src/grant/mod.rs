//! The custom grant pipeline: form conversion, DPoP proof verification,
//! and token issuance.

pub mod convert;
pub mod dpop;
pub mod issuer;
pub mod request;

pub use convert::{convert, TokenRequest, DPOP_HEADER};
pub use issuer::{IssuedGrant, TokenIssuer};
