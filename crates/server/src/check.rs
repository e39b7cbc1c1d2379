use cortex_relay_core::config::AppConfig;
use secrecy::ExposeSecret;

/// Effective configuration with every secret redacted, for `--check`.
pub fn summary(config: &AppConfig) -> String {
    let snowflake = &config.snowflake;
    let mut lines = vec!["configuration is valid:".to_string()];

    let app_token = redact_token(config.slack.app_token.expose_secret());
    let bot_token = redact_token(config.slack.bot_token.expose_secret());
    lines.push(render_line("slack.app_token", &app_token));
    lines.push(render_line("slack.bot_token", &bot_token));
    lines.push(render_line("slack.command", &config.slack.command));
    lines.push(render_line("agent.endpoint_host", config.agent.endpoint_host()));
    lines.push(render_line("agent.api_key", "<redacted>"));
    lines.push(render_line("agent.timeout_secs", &config.agent.timeout_secs.to_string()));
    lines.push(render_line(
        "snowflake.enrichment_enabled",
        &snowflake.enrichment_enabled.to_string(),
    ));
    lines.push(render_line("snowflake.account", optional(&snowflake.account)));
    lines.push(render_line("snowflake.user", optional(&snowflake.user)));
    lines.push(render_line(
        "snowflake.password",
        if snowflake.password.is_some() { "<redacted>" } else { "<unset>" },
    ));
    lines.push(render_line("snowflake.warehouse", optional(&snowflake.warehouse)));
    lines.push(render_line("snowflake.database", optional(&snowflake.database)));
    lines.push(render_line("snowflake.schema", optional(&snowflake.schema)));
    lines.push(render_line("server.bind_address", &config.server.bind_address));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
    ));
    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format)));

    lines.join("\n")
}

fn optional(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<unset>")
}

fn render_line(key: &str, value: &str) -> String {
    format!("- {key} = {value}")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
