//! The router/query/chart agent team behind `/chat`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use cs_domain::chat::ChatMessage;
use cs_domain::config::{AgentBudgets, LlmConfig};
use cs_domain::database::{DatabaseHandle, Row};
use cs_domain::error::{Error, Result};
use cs_domain::pipeline::{AgentPipeline, PipelineOutput};
use cs_domain::tool::{Message, ToolCall, ToolDefinition, ToolOutcome};
use cs_domain::usage::ConversationTracker;
use cs_providers::LlmProvider;

use crate::role::AgentRole;
use crate::runner::{run_agent, AgentContext};
use crate::tools::chart::{build_chart, build_multi_series_chart, Chart, ChartArgs, MultiSeriesArgs};
use crate::tools::sql::{execute_sql_query, outcome_json, QueryResult};
use crate::tools::{error_outcome, json_outcome, Toolbox};

/// Rows shown to a model in one tool result or prompt.
const MAX_ROWS_IN_CONTEXT: usize = 200;

/// Runs the router agent, which delegates to the specialists via tools.
pub struct AgentTeam {
    provider: Arc<dyn LlmProvider>,
    budgets: AgentBudgets,
    llm: LlmConfig,
}

impl AgentTeam {
    pub fn new(provider: Arc<dyn LlmProvider>, budgets: AgentBudgets, llm: LlmConfig) -> Self {
        Self {
            provider,
            budgets,
            llm,
        }
    }
}

#[async_trait::async_trait]
impl AgentPipeline for AgentTeam {
    async fn run(
        &self,
        question: &str,
        database: Arc<dyn DatabaseHandle>,
        history: &[ChatMessage],
        tracker: Option<Arc<ConversationTracker>>,
    ) -> Result<PipelineOutput> {
        let ctx = AgentContext {
            provider: self.provider.clone(),
            budgets: self.budgets,
            llm: self.llm.clone(),
            tracker,
        };
        let tools = RouterTools::new(ctx.clone(), database);

        let mut prompt: Vec<Message> = history.iter().map(ChatMessage::to_message).collect();
        prompt.push(Message::user(question));

        let reply = run_agent(&ctx, AgentRole::Router, prompt, &tools).await?;
        Ok(PipelineOutput {
            message: reply.text,
            metadata: tools.into_metadata(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct QueryAgentArgs {
    question: String,
}

#[derive(Deserialize)]
struct ChartAgentArgs {
    user_question: String,
}

struct RouterTools {
    ctx: AgentContext,
    database: Arc<dyn DatabaseHandle>,
    last_query: Mutex<Option<QueryResult>>,
    metadata: Mutex<Map<String, Value>>,
}

impl RouterTools {
    fn new(ctx: AgentContext, database: Arc<dyn DatabaseHandle>) -> Self {
        Self {
            ctx,
            database,
            last_query: Mutex::new(None),
            metadata: Mutex::new(Map::new()),
        }
    }

    fn into_metadata(self) -> Map<String, Value> {
        self.metadata.into_inner()
    }

    async fn call_query_agent(&self, call: &ToolCall, args: QueryAgentArgs) -> Result<ToolOutcome> {
        let tools = QueryTools::new(self.database.clone());
        let reply = match run_agent(
            &self.ctx,
            AgentRole::Query,
            vec![Message::user(args.question)],
            &tools,
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => return specialist_failure(call, "Query", e),
        };

        let last = tools.last_success.lock().take();
        let mut body = json!({ "status": "success", "message": reply.text });
        if let Some(result) = last {
            {
                let mut meta = self.metadata.lock();
                meta.insert("sql_query".into(), json!(result.sql_query));
                meta.insert("row_count".into(), json!(result.rows_returned));
            }
            let preview = result.preview(MAX_ROWS_IN_CONTEXT);
            body["sql_query"] = json!(preview.sql_query);
            body["row_count"] = json!(preview.rows_returned);
            body["results"] = json!(preview.results);
            *self.last_query.lock() = Some(result);
        }
        Ok(json_outcome(call, &body, false))
    }

    async fn call_chart_agent(&self, call: &ToolCall, args: ChartAgentArgs) -> Result<ToolOutcome> {
        let Some(query) = self.last_query.lock().clone() else {
            return Ok(error_outcome(
                call,
                "No query results yet. Call call_query_agent first.",
            ));
        };

        let rows_json = serde_json::to_string(&query.preview(MAX_ROWS_IN_CONTEXT).results)?;
        let prompt = format!(
            "User question: {}\n\nSQL query executed:\n{}\n\nQuery results ({} rows):\n{}\n\n\
             Based on the question, the query structure and the data, create an appropriate chart.",
            args.user_question, query.sql_query, query.rows_returned, rows_json
        );

        let tools = ChartTools::new(query.results);
        let reply = match run_agent(&self.ctx, AgentRole::Chart, vec![Message::user(prompt)], &tools).await
        {
            Ok(reply) => reply,
            Err(e) => return specialist_failure(call, "Chart", e),
        };

        let Some(chart) = tools.chart.lock().take() else {
            return Ok(error_outcome(call, "Chart agent finished without producing a chart."));
        };
        {
            let mut meta = self.metadata.lock();
            meta.insert("chart_spec".into(), chart.spec.clone());
            meta.insert("chart_type".into(), json!(chart.chart_type));
        }
        let body = json!({
            "status": "success",
            "message": reply.text,
            "chart_type": chart.chart_type,
        });
        Ok(json_outcome(call, &body, false))
    }
}

/// Specialist errors go back to the router as a tool result, except
/// conversation ceilings which end the whole pipeline.
fn specialist_failure(call: &ToolCall, agent: &str, error: Error) -> Result<ToolOutcome> {
    if let Error::ConversationLimit(_) = error {
        return Err(error);
    }
    tracing::warn!(agent, error = %error, "specialist agent failed");
    Ok(error_outcome(call, format!("{agent} agent error: {error}")))
}

#[async_trait::async_trait]
impl Toolbox for RouterTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "call_query_agent",
                "Ask the SQL specialist a data question about games, teams, standings or statistics. \
                 Returns its answer, the SQL it ran and the result rows.",
                json!({
                    "type": "object",
                    "properties": {
                        "question": { "type": "string", "description": "A self-contained data question" }
                    },
                    "required": ["question"]
                }),
            ),
            ToolDefinition::new(
                "call_chart_agent",
                "Ask the chart specialist to visualize the most recent query results. \
                 Call call_query_agent first.",
                json!({
                    "type": "object",
                    "properties": {
                        "user_question": { "type": "string", "description": "The user's original request" }
                    },
                    "required": ["user_question"]
                }),
            ),
        ]
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolOutcome> {
        match call.tool_name.as_str() {
            "call_query_agent" => match parse_args(call) {
                Ok(args) => self.call_query_agent(call, args).await,
                Err(outcome) => Ok(outcome),
            },
            "call_chart_agent" => match parse_args(call) {
                Ok(args) => self.call_chart_agent(call, args).await,
                Err(outcome) => Ok(outcome),
            },
            other => Ok(error_outcome(call, format!("unknown tool: {other}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct ExecuteQueryArgs {
    sql: String,
}

struct QueryTools {
    database: Arc<dyn DatabaseHandle>,
    last_success: Mutex<Option<QueryResult>>,
}

impl QueryTools {
    fn new(database: Arc<dyn DatabaseHandle>) -> Self {
        Self {
            database,
            last_success: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl Toolbox for QueryTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "get_schema",
                "List every table with its columns and types.",
                json!({ "type": "object", "properties": {} }),
            ),
            ToolDefinition::new(
                "execute_query",
                "Run one read-only SELECT statement and return the rows.",
                json!({
                    "type": "object",
                    "properties": {
                        "sql": { "type": "string", "description": "A single SELECT statement" }
                    },
                    "required": ["sql"]
                }),
            ),
        ]
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolOutcome> {
        match call.tool_name.as_str() {
            "get_schema" => match self.database.schema_info().await {
                Ok(schema) => Ok(json_outcome(call, &json!(schema), false)),
                Err(e) => Ok(error_outcome(call, format!("schema lookup failed: {e}"))),
            },
            "execute_query" => {
                let args: ExecuteQueryArgs = match parse_args(call) {
                    Ok(args) => args,
                    Err(outcome) => return Ok(outcome),
                };
                let outcome = execute_sql_query(&args.sql, self.database.as_ref()).await;
                let shown = match &outcome {
                    Ok(result) => Ok(result.preview(MAX_ROWS_IN_CONTEXT)),
                    Err(e) => Err(e.clone()),
                };
                let is_error = outcome.is_err();
                if let Ok(result) = outcome {
                    *self.last_success.lock() = Some(result);
                }
                Ok(json_outcome(call, &outcome_json(&shown), is_error))
            }
            other => Ok(error_outcome(call, format!("unknown tool: {other}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chart tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ChartTools {
    rows: Vec<Row>,
    chart: Mutex<Option<Chart>>,
}

impl ChartTools {
    fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            chart: Mutex::new(None),
        }
    }

    fn finish(&self, call: &ToolCall, built: std::result::Result<Chart, String>) -> ToolOutcome {
        match built {
            Ok(chart) => {
                let outcome = json_outcome(call, &chart.to_tool_result(), false);
                *self.chart.lock() = Some(chart);
                outcome
            }
            Err(message) => error_outcome(call, format!("Chart generation failed: {message}")),
        }
    }
}

#[async_trait::async_trait]
impl Toolbox for ChartTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let chart_type = json!({
            "type": "string",
            "enum": ["bar", "line", "scatter", "pie"],
        });
        vec![
            ToolDefinition::new(
                "create_chart",
                "Create a single-series Plotly chart from the query results.",
                json!({
                    "type": "object",
                    "properties": {
                        "chart_type": chart_type,
                        "x_column": { "type": "string" },
                        "y_column": { "type": "string" },
                        "title": { "type": "string" },
                        "x_label": { "type": "string" },
                        "y_label": { "type": "string" }
                    },
                    "required": ["chart_type", "x_column", "y_column"]
                }),
            ),
            ToolDefinition::new(
                "create_multi_series_chart",
                "Create a Plotly chart with one series per y column, sharing the x axis.",
                json!({
                    "type": "object",
                    "properties": {
                        "chart_type": chart_type,
                        "x_column": { "type": "string" },
                        "y_columns": { "type": "array", "items": { "type": "string" } },
                        "title": { "type": "string" },
                        "x_label": { "type": "string" }
                    },
                    "required": ["chart_type", "x_column", "y_columns"]
                }),
            ),
        ]
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolOutcome> {
        let outcome = match call.tool_name.as_str() {
            "create_chart" => match parse_args::<ChartArgs>(call) {
                Ok(args) => self.finish(call, build_chart(&args, &self.rows)),
                Err(outcome) => outcome,
            },
            "create_multi_series_chart" => match parse_args::<MultiSeriesArgs>(call) {
                Ok(args) => self.finish(call, build_multi_series_chart(&args, &self.rows)),
                Err(outcome) => outcome,
            },
            other => error_outcome(call, format!("unknown tool: {other}")),
        };
        Ok(outcome)
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(call: &ToolCall) -> std::result::Result<T, ToolOutcome> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| error_outcome(call, format!("invalid arguments for {}: {e}", call.tool_name)))
}
