//! Authentication and authorization errors

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header missing or invalid")]
    MissingCredentials,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid token signature: {0}")]
    SignatureInvalid(String),

    /// The signing key set could not be retrieved. Never cached.
    #[error("Signing keys unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token issuer")]
    IssuerMismatch,

    #[error("Invalid audience")]
    AudienceMismatch { expected: String },

    #[error("Missing required user identifiers")]
    MissingClaims,

    #[error("Insufficient permissions")]
    InsufficientScope {
        required: Vec<String>,
        provided: Vec<String>,
    },
}

impl AuthError {
    /// Machine-readable tag carried in error bodies and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_header",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::SignatureInvalid(_) | AuthError::UpstreamUnavailable(_) => {
                "signature_invalid"
            }
            AuthError::Expired => "expired",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch { .. } => "audience_mismatch",
            AuthError::MissingClaims => "missing_claims",
            AuthError::InsufficientScope { .. } => "insufficient_scope",
        }
    }

    /// True for a valid identity lacking permissions (403); everything else is a 401.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, AuthError::InsufficientScope { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::Expired,
            ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
            ErrorKind::InvalidSignature => {
                AuthError::SignatureInvalid("signature does not match signing key".to_string())
            }
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::MalformedToken(format!("missing required claim '{claim}'"))
            }
            _ => AuthError::MalformedToken(err.to_string()),
        }
    }
}
