use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aktly_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: &str, env_key: &str| {
        lines.push(render_line(
            key,
            value,
            field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    };

    push("database.url", &config.database.url, "AKTLY_DATABASE_URL");
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "AKTLY_DATABASE_MAX_CONNECTIONS",
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "AKTLY_DATABASE_TIMEOUT_SECS",
    );

    let bot_token = redact_bot_token(config.telegram.bot_token.expose_secret());
    push("telegram.bot_token", &bot_token, "AKTLY_TELEGRAM_BOT_TOKEN");
    push("telegram.api_base_url", &config.telegram.api_base_url, "AKTLY_TELEGRAM_API_BASE_URL");
    push(
        "telegram.poll_timeout_secs",
        &config.telegram.poll_timeout_secs.to_string(),
        "AKTLY_TELEGRAM_POLL_TIMEOUT_SECS",
    );

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    push("llm.api_key", llm_api_key, "AKTLY_LLM_API_KEY");
    push("llm.base_url", &config.llm.base_url, "AKTLY_LLM_BASE_URL");
    push("llm.model", &config.llm.model, "AKTLY_LLM_MODEL");

    push(
        "docgen.typst_bin",
        config.docgen.typst_bin.as_deref().unwrap_or("<discovered on PATH>"),
        "AKTLY_DOCGEN_TYPST_BIN",
    );
    push("docgen.template_dir", &config.docgen.template_dir, "AKTLY_DOCGEN_TEMPLATE_DIR");
    push("docgen.output_dir", &config.docgen.output_dir, "AKTLY_DOCGEN_OUTPUT_DIR");

    push("server.bind_address", &config.server.bind_address, "AKTLY_SERVER_BIND_ADDRESS");
    push(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        "AKTLY_SERVER_HEALTH_CHECK_PORT",
    );

    push("logging.level", &config.logging.level, "AKTLY_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "AKTLY_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("aktly.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/aktly.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the numeric bot id visible, hides the secret part.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::redact_bot_token;

    #[test]
    fn bot_token_redaction_keeps_only_the_bot_id() {
        assert_eq!(redact_bot_token("123456789:AAHsecret"), "123456789:***");
        assert_eq!(redact_bot_token(""), "<empty>");
        assert_eq!(redact_bot_token("no-colon-here"), "<redacted>");
    }
}
