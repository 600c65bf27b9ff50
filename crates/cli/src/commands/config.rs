use std::env;
use std::fs;
use std::path::Path;

use partbot_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG_INVALID};

struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
}

const fn field(key_path: &'static str, env_keys: &'static [&'static str]) -> ConfigField {
    ConfigField { key_path, env_keys }
}

pub fn run() -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => CommandResult::plain(render(&config)),
        Err(error) => CommandResult::failure(
            "config",
            "config_validation",
            error.to_string(),
            EXIT_CONFIG_INVALID,
        ),
    }
}

pub fn render(config: &AppConfig) -> String {
    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |entry: &ConfigField| {
        field_source(entry, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let rows = [
        (
            field("line.channel_secret", &["PARTBOT_LINE_CHANNEL_SECRET", "LINE_CHANNEL_SECRET"]),
            redact_secret(config.line.channel_secret.expose_secret()),
        ),
        (
            field(
                "line.channel_access_token",
                &["PARTBOT_LINE_CHANNEL_ACCESS_TOKEN", "LINE_CHANNEL_ACCESS_TOKEN"],
            ),
            redact_secret(config.line.channel_access_token.expose_secret()),
        ),
        (
            field("line.api_base_url", &["PARTBOT_LINE_API_BASE_URL"]),
            config.line.api_base_url.clone(),
        ),
        (
            field(
                "sheets.service_account_json",
                &["PARTBOT_SHEETS_SERVICE_ACCOUNT_JSON", "GOOGLE_SERVICE_ACCOUNT_JSON"],
            ),
            describe_service_account(config.sheets.service_account_json.expose_secret()),
        ),
        (
            field("sheets.spreadsheet_id", &["PARTBOT_SHEETS_SPREADSHEET_ID", "GOOGLE_SHEET_ID"]),
            config.sheets.spreadsheet_id.clone(),
        ),
        (field("sheets.range", &["PARTBOT_SHEETS_RANGE"]), config.sheets.range.clone()),
        (
            field("sheets.timeout_secs", &["PARTBOT_SHEETS_TIMEOUT_SECS"]),
            config.sheets.timeout_secs.to_string(),
        ),
        (
            field("sheets.api_base_url", &["PARTBOT_SHEETS_API_BASE_URL"]),
            config.sheets.api_base_url.clone(),
        ),
        (
            field("server.bind_address", &["PARTBOT_SERVER_BIND_ADDRESS"]),
            config.server.bind_address.clone(),
        ),
        (field("server.port", &["PARTBOT_SERVER_PORT", "PORT"]), config.server.port.to_string()),
        (
            field("logging.level", &["PARTBOT_LOGGING_LEVEL", "PARTBOT_LOG_LEVEL"]),
            config.logging.level.clone(),
        ),
        (
            field("logging.format", &["PARTBOT_LOGGING_FORMAT", "PARTBOT_LOG_FORMAT"]),
            format!("{:?}", config.logging.format),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (entry, value) in &rows {
        lines.push(render_line(entry.key_path, value, source(entry)));
    }
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &ConfigField,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let from_env = field.env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
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

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

/// Shows which service account is configured without exposing the key.
fn describe_service_account(raw_json: &str) -> String {
    let client_email = serde_json::from_str::<serde_json::Value>(raw_json).ok().and_then(|value| {
        value.get("client_email").and_then(|email| email.as_str()).map(str::to_owned)
    });

    match client_email {
        Some(email) => format!("<redacted> (client_email: {email})"),
        None => redact_secret(raw_json),
    }
}
