use cs_domain::config::{Config, ConfigSeverity};

/// Print every validation issue. Returns `false` when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }

    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    println!(
        "\n{errors} error(s), {} warning(s) in {config_path}",
        issues.len() - errors
    );
    errors == 0
}

/// Resolved config (defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_and_render() {
        let config = Config::default();
        assert!(validate(&config, "config.toml"));
        let rendered = show(&config).unwrap();
        assert!(rendered.contains("[limits.conversation]"));
        assert!(rendered.contains("max_tokens = 150000"));
    }

    #[test]
    fn zero_port_fails_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(!validate(&config, "config.toml"));
    }
}
