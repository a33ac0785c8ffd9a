use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Anthropic Messages API settings shared by every agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. When unset the server
    /// still starts, but `/chat` answers 503.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_4096")]
    pub max_output_tokens: u32,
    /// HTTP timeout for one Messages API request.
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
    /// Wall-clock limit for one router agent invocation.
    #[serde(default = "d_45")]
    pub router_timeout_secs: u64,
    /// Wall-clock limit for one query or chart agent invocation.
    #[serde(default = "d_30")]
    pub specialist_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            max_output_tokens: 4096,
            request_timeout_secs: 120,
            router_timeout_secs: 45,
            specialist_timeout_secs: 30,
        }
    }
}

fn d_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn d_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn d_4096() -> u32 {
    4096
}
fn d_120() -> u64 {
    120
}
fn d_45() -> u64 {
    45
}
fn d_30() -> u64 {
    30
}
