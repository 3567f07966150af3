//! Bearer token verification against an external identity authority

pub mod error;
pub mod identity;
pub mod jwks;
pub mod jwt;
pub mod key_cache;
pub mod verifier;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::AuthError;
pub use identity::Identity;
pub use jwks::{HttpKeySource, KeySource};
pub use key_cache::SigningKeyCache;
pub use verifier::{IdentityVerifier, VerifierConfig};
