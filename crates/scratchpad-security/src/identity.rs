use std::collections::BTreeSet;

/// Verified caller derived from a bearer token. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject_id: String,
    object_id: String,
    display_name: Option<String>,
    granted_scopes: BTreeSet<String>,
}

impl Identity {
    pub fn new(
        subject_id: impl Into<String>,
        object_id: impl Into<String>,
        display_name: Option<String>,
        granted_scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            object_id: object_id.into(),
            display_name,
            granted_scopes: granted_scopes.into_iter().collect(),
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Stable per-user key, used as the session owner.
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Scopes both presented by the token and accepted by this service.
    pub fn granted_scopes(&self) -> &BTreeSet<String> {
        &self.granted_scopes
    }
}
