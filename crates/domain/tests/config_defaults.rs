use cs_domain::config::{Budget, Config};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn default_conversation_ceilings() {
    let config = Config::default();
    assert_eq!(config.limits.conversation.max_requests, 10);
    assert_eq!(config.limits.conversation.max_tokens, 150_000);
    assert_eq!(config.limits.conversation.max_tool_calls, 15);
}

#[test]
fn default_agent_budgets() {
    let config = Config::default();
    assert_eq!(config.limits.agents.router, Budget::new(6, 50_000));
    assert_eq!(config.limits.agents.query, Budget::new(6, 20_000));
    assert_eq!(config.limits.agents.chart, Budget::new(4, 30_000));
}

#[test]
fn default_demo_quota() {
    let config = Config::default();
    assert_eq!(config.limits.demo.queries_per_window, 6);
    assert_eq!(config.limits.demo.window_secs, 3600);
    assert_eq!(config.limits.demo.tokens_per_query, 20_000);
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080
api_prefix = "/api/v2"

[llm]
model = "claude-haiku"

[database]
path = "/var/lib/courtside/nba.db"

[limits.conversation]
max_requests = 20

[limits.demo]
queries_per_window = 3

[observability]
service_name = "courtside-prod"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.api_prefix, "/api/v2");
    assert_eq!(config.llm.model, "claude-haiku");
    assert_eq!(config.database.path.to_str(), Some("/var/lib/courtside/nba.db"));
    assert_eq!(config.limits.conversation.max_requests, 20);
    assert_eq!(config.limits.conversation.max_tokens, 150_000);
    assert_eq!(config.limits.demo.queries_per_window, 3);
    assert_eq!(config.observability.service_name, "courtside-prod");
    assert!(config.validate().is_empty());
}
