pub mod anthropic;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use anthropic::AnthropicProvider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider, TokenUsage};
