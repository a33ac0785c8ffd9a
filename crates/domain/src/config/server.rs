use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_8000")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Shown by the root endpoint.
    #[serde(default = "d_app_name")]
    pub app_name: String,
    /// Prefix for every API route (`/chat`, `/usage`, `/health`, ...).
    #[serde(default = "d_api_prefix")]
    pub api_prefix: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Environment variable holding the trusted-caller bearer secret.
    /// Callers presenting `Authorization: Bearer <secret>` bypass all usage
    /// limits. When the variable is unset every caller is anonymous and any
    /// presented credential is rejected.
    #[serde(default = "d_admin_token_env")]
    pub admin_token_env: String,
    /// Use the first `X-Forwarded-For` entry as the caller origin. Only
    /// enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    /// Per-IP token-bucket rate limiting configuration.
    /// When `None` (the default), the transport-level limiter is disabled;
    /// the anonymous query quota still applies.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "127.0.0.1".into(),
            app_name: d_app_name(),
            api_prefix: d_api_prefix(),
            cors: CorsConfig::default(),
            admin_token_env: d_admin_token_env(),
            trust_forwarded_for: false,
            rate_limit: None,
        }
    }
}

/// Per-IP token-bucket rate limiting configuration.
///
/// `requests_per_second` controls the replenishment rate, while `burst_size`
/// sets the maximum number of requests a single IP can send in a quick burst
/// before being throttled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    /// Entries ending in `:*` match any port on that host.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8000() -> u16 {
    8000
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_app_name() -> String {
    "Courtside Analytics API".into()
}
fn d_api_prefix() -> String {
    "/api/v1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:*".into(),
        "http://127.0.0.1:*".into(),
    ]
}
fn d_admin_token_env() -> String {
    "CS_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
