pub mod conversations;
pub mod gate;
pub mod identity;
pub mod ip_quota;

pub use conversations::ConversationGovernor;
pub use gate::{GateError, GateRequest, RequestGate};
pub use identity::{AuthenticationError, Identity, IdentityClassifier, Tier};
pub use ip_quota::{IpQuotaTracker, QuotaExceeded, QuotaPermit, QuotaUsage};
