use std::sync::Arc;

use cs_domain::config::Config;
use cs_domain::database::DatabaseHandle;
use cs_domain::pipeline::AgentPipeline;

use crate::runtime::{ConversationGovernor, IdentityClassifier, IpQuotaTracker, RequestGate};

/// Shared application state passed to all API handlers.
///
/// The usage stores are explicit objects owned here and handed to the gate,
/// so tests can build isolated instances.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<RequestGate>,
    pub quota: Arc<IpQuotaTracker>,
    pub conversations: Arc<ConversationGovernor>,
    /// `None` when no LLM credentials are configured; `/chat` answers 503.
    pub pipeline: Option<Arc<dyn AgentPipeline>>,
    pub database: Arc<dyn DatabaseHandle>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        identity: IdentityClassifier,
        pipeline: Option<Arc<dyn AgentPipeline>>,
        database: Arc<dyn DatabaseHandle>,
    ) -> Self {
        let quota = Arc::new(IpQuotaTracker::new(config.limits.demo));
        let conversations = Arc::new(ConversationGovernor::new(config.limits.conversation));
        let gate = Arc::new(RequestGate::new(identity, quota.clone(), conversations.clone()));
        Self {
            config,
            gate,
            quota,
            conversations,
            pipeline,
            database,
        }
    }
}
