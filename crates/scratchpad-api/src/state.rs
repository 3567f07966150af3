use std::sync::Arc;
use std::time::Instant;

use scratchpad_core::services::SessionStore;
use scratchpad_security::IdentityVerifier;

use crate::handlers::well_known::ResourceMetadata;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<IdentityVerifier>,
    pub sessions: Arc<SessionStore>,
    pub resource_metadata: Arc<ResourceMetadata>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        verifier: Arc<IdentityVerifier>,
        sessions: Arc<SessionStore>,
        resource_metadata: ResourceMetadata,
    ) -> Self {
        Self {
            verifier,
            sessions,
            resource_metadata: Arc::new(resource_metadata),
            started_at: Instant::now(),
        }
    }
}
