//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_UNKNOWN_EXPIRY_SECS: u64 = 300;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
/// upper bound for the safety margin and the unknown-expiry window
pub const MAX_CACHE_WINDOW_SECS: u64 = 86_400;

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: &str = "8080";

// Instance metadata service
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
pub const IMDS_API_VERSION: &str = "2018-02-01";

// Inbound request headers carrying the end user
pub const HEADER_USER_LOGIN: &str = "x-user-login";
pub const HEADER_ID_TOKEN: &str = "x-id-token";
pub const HEADER_TENANT_ID: &str = "x-tenant-id";
