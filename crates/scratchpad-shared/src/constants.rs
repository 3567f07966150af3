//! Application-wide constants

pub const SERVICE_NAME: &str = "mcp-scratchpad";
pub const DEFAULT_AUTHORITY_BASE_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_JWKS_CACHE_MAX_ENTRIES: u64 = 5;
pub const DEFAULT_JWKS_CACHE_MAX_AGE_SECS: u64 = 600;
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECS: u64 = 10;

/// Primary session header; `X-Session-Id` is accepted as an alias.
pub const SESSION_HEADER: &str = "mcp-session-id";
pub const SESSION_HEADER_ALIAS: &str = "x-session-id";
