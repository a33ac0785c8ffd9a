//! Bounded tool loop shared by all agent roles.
//!
//! One call to [`run_agent`] is one *agent invocation*: it checks the
//! conversation ceilings once up front, then alternates LLM requests and
//! tool dispatch until the model answers without tool calls. Every request's
//! usage goes into the conversation tracker as soon as the response arrives,
//! so a later failure still leaves the spend accounted for.

use std::sync::Arc;

use tracing::Instrument;

use cs_domain::config::{AgentBudgets, LlmConfig};
use cs_domain::error::{Error, Result};
use cs_domain::tool::Message;
use cs_domain::usage::{ConversationTracker, UsageSample};
use cs_providers::{ChatRequest, LlmProvider};

use crate::budget::BudgetMeter;
use crate::role::AgentRole;
use crate::tools::Toolbox;

/// Everything an agent invocation needs besides its prompt and tools.
#[derive(Clone)]
pub struct AgentContext {
    pub provider: Arc<dyn LlmProvider>,
    pub budgets: AgentBudgets,
    pub llm: LlmConfig,
    pub tracker: Option<Arc<ConversationTracker>>,
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    /// Usage of this invocation alone.
    pub usage: UsageSample,
}

pub async fn run_agent(
    ctx: &AgentContext,
    role: AgentRole,
    prompt: Vec<Message>,
    toolbox: &dyn Toolbox,
) -> Result<AgentReply> {
    if let Some(tracker) = &ctx.tracker {
        tracker.check()?;
    }

    let limit = role.timeout(&ctx.llm);
    let span = tracing::info_span!("agent.run", agent = %role);
    match tokio::time::timeout(limit, tool_loop(ctx, role, prompt, toolbox))
        .instrument(span)
        .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(agent = %role, timeout_secs = limit.as_secs(), "agent timed out");
            Err(Error::Timeout(format!(
                "{role} agent did not finish within {}s",
                limit.as_secs()
            )))
        }
    }
}

async fn tool_loop(
    ctx: &AgentContext,
    role: AgentRole,
    prompt: Vec<Message>,
    toolbox: &dyn Toolbox,
) -> Result<AgentReply> {
    let mut meter = BudgetMeter::new(role, role.budget(&ctx.budgets));
    let tools = toolbox.definitions();

    let mut messages = Vec::with_capacity(prompt.len() + 1);
    messages.push(Message::system(role.system_prompt()));
    messages.extend(prompt);

    loop {
        meter.begin_request()?;

        let llm_span = tracing::info_span!(
            "llm.call",
            agent = %role,
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
        );
        let req = ChatRequest {
            messages: messages.clone(),
            tools: tools.clone(),
            temperature: role.temperature(),
            max_tokens: Some(ctx.llm.max_output_tokens),
        };
        let response = ctx.provider.chat(req).instrument(llm_span.clone()).await?;

        let usage = response.usage.unwrap_or_default();
        llm_span.record("input_tokens", usage.input_tokens);
        llm_span.record("output_tokens", usage.output_tokens);

        let sample = meter.finish_request(usage.total(), response.tool_calls.len() as u64);
        if let Some(tracker) = &ctx.tracker {
            tracker.record(sample);
        }
        meter.check_tokens()?;

        if response.tool_calls.is_empty() {
            let total = meter.total();
            tracing::debug!(
                agent = %role,
                requests = total.requests,
                tokens = total.tokens,
                tool_calls = total.tool_calls,
                "agent finished"
            );
            return Ok(AgentReply {
                text: response.content,
                usage: total,
            });
        }

        // ── Tool dispatch ──────────────────────────────────────────
        messages.push(Message::assistant_tool_calls(
            &response.content,
            &response.tool_calls,
        ));

        let mut outcomes = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let tool_span = tracing::info_span!("tool.call", agent = %role, tool = %call.tool_name);
            let outcome = toolbox.call(call).instrument(tool_span).await?;
            if outcome.is_error {
                tracing::debug!(agent = %role, tool = %call.tool_name, "tool returned an error");
            }
            outcomes.push(outcome);
        }
        messages.push(Message::tool_results(outcomes));
    }
}
