//! Request gate: the fixed admission sequence in front of the agent pipeline.
//!
//! 1. Classify the caller. A bad credential stops here.
//! 2. Anonymous callers reserve a slot in their windowed quota.
//! 3. Anonymous callers get their conversation tracker, which must be under
//!    every ceiling. Trusted callers skip tracking entirely.
//! 4. Run the pipeline with the tracker (or none).
//! 5. Success commits the quota slot. Failure releases it; conversation
//!    usage already recorded by the pipeline stays spent.

use std::sync::Arc;

use cs_domain::chat::ChatMessage;
use cs_domain::database::DatabaseHandle;
use cs_domain::error::Error;
use cs_domain::pipeline::{AgentPipeline, PipelineOutput};
use cs_domain::usage::ConversationLimitExceeded;

use super::conversations::ConversationGovernor;
use super::identity::{AuthenticationError, Identity, IdentityClassifier};
use super::ip_quota::{IpQuotaTracker, QuotaExceeded};

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Unauthorized(#[from] AuthenticationError),

    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),

    #[error(transparent)]
    ConversationLimit(#[from] ConversationLimitExceeded),

    #[error("{0}")]
    Pipeline(Error),
}

impl From<Error> for GateError {
    fn from(e: Error) -> Self {
        match e {
            Error::ConversationLimit(limit) => GateError::ConversationLimit(limit),
            other => GateError::Pipeline(other),
        }
    }
}

/// One chat request as seen by the gate.
pub struct GateRequest<'a> {
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    pub origin: &'a str,
    pub conversation_id: &'a str,
    pub question: &'a str,
    pub history: &'a [ChatMessage],
}

pub struct RequestGate {
    identity: IdentityClassifier,
    quota: Arc<IpQuotaTracker>,
    conversations: Arc<ConversationGovernor>,
}

impl RequestGate {
    pub fn new(
        identity: IdentityClassifier,
        quota: Arc<IpQuotaTracker>,
        conversations: Arc<ConversationGovernor>,
    ) -> Self {
        Self {
            identity,
            quota,
            conversations,
        }
    }

    pub fn identify(&self, authorization: Option<&str>, origin: &str) -> Result<Identity, GateError> {
        Ok(self.identity.classify(authorization, origin)?)
    }

    pub fn quota(&self) -> &Arc<IpQuotaTracker> {
        &self.quota
    }

    pub fn conversations(&self) -> &Arc<ConversationGovernor> {
        &self.conversations
    }

    pub async fn handle(
        &self,
        req: GateRequest<'_>,
        pipeline: &dyn AgentPipeline,
        database: Arc<dyn DatabaseHandle>,
    ) -> Result<PipelineOutput, GateError> {
        let identity = self.identify(req.authorization, req.origin)?;

        if identity.is_trusted() {
            tracing::debug!(conversation_id = req.conversation_id, "trusted caller, limits bypassed");
            return Ok(pipeline.run(req.question, database, req.history, None).await?);
        }

        let permit = self.quota.admit(&identity.origin)?;

        let tracker = self.conversations.get_or_create(req.conversation_id);
        if let Err(limit) = tracker.check() {
            tracing::info!(
                conversation_id = req.conversation_id,
                kind = %limit.kind,
                used = limit.used,
                limit = limit.limit,
                "conversation limit reached"
            );
            return Err(limit.into());
        }

        match pipeline
            .run(req.question, database, req.history, Some(tracker))
            .await
        {
            Ok(output) => {
                permit.commit();
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = req.conversation_id,
                    origin = %identity.origin,
                    error = %e,
                    "pipeline failed; quota slot released"
                );
                Err(e.into())
            }
        }
    }
}
