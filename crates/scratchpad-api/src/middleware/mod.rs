//! Gateway middleware

pub mod auth;
pub mod session;

pub use auth::require_identity;
pub use session::{bind_session, session_id_from_headers};
