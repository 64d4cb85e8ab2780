use std::env;
use std::sync::{Mutex, OnceLock};

use aktly_cli::commands::{migrate, smoke};
use serde_json::Value;

const VALID_BOT_TOKEN: &str = "123456789:AAHsampleSecretPartLongEnough";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[
            ("AKTLY_TELEGRAM_BOT_TOKEN", VALID_BOT_TOKEN),
            ("AKTLY_LLM_API_KEY", "sk-test-key"),
            ("AKTLY_DATABASE_URL", "sqlite::memory:"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn smoke_returns_success_report_with_valid_env() {
    with_env(
        &[
            ("AKTLY_TELEGRAM_BOT_TOKEN", VALID_BOT_TOKEN),
            ("AKTLY_LLM_API_KEY", "sk-test-key"),
            ("AKTLY_DATABASE_URL", "sqlite::memory:"),
        ],
        || {
            let result = smoke::run();
            assert_eq!(result.exit_code, 0, "expected successful smoke report");

            let payload = parse_payload(last_line(&result.output));
            assert_eq!(payload["command"], "smoke");
            assert_eq!(payload["status"], "pass");
        },
    );
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "AKTLY_DATABASE_URL",
        "AKTLY_DATABASE_MAX_CONNECTIONS",
        "AKTLY_DATABASE_TIMEOUT_SECS",
        "AKTLY_TELEGRAM_BOT_TOKEN",
        "AKTLY_TELEGRAM_API_BASE_URL",
        "AKTLY_TELEGRAM_POLL_TIMEOUT_SECS",
        "AKTLY_LLM_API_KEY",
        "AKTLY_LLM_BASE_URL",
        "AKTLY_LLM_MODEL",
        "AKTLY_LLM_TIMEOUT_SECS",
        "AKTLY_LLM_MAX_RETRIES",
        "AKTLY_DOCGEN_TYPST_BIN",
        "AKTLY_DOCGEN_TEMPLATE_DIR",
        "AKTLY_DOCGEN_OUTPUT_DIR",
        "AKTLY_SERVER_BIND_ADDRESS",
        "AKTLY_SERVER_HEALTH_CHECK_PORT",
        "AKTLY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "AKTLY_LOGGING_LEVEL",
        "AKTLY_LOGGING_FORMAT",
        "AKTLY_LOG_LEVEL",
        "AKTLY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
