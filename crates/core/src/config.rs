use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "partbot.toml";
pub const NESTED_CONFIG_FILE: &str = "config/partbot.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub line: LineConfig,
    pub sheets: SheetsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LineConfig {
    pub channel_secret: SecretString,
    pub channel_access_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub service_account_json: SecretString,
    pub spreadsheet_id: String,
    pub range: String,
    pub timeout_secs: u64,
    pub api_base_url: String,
}

impl SheetsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub line_channel_secret: Option<String>,
    pub line_channel_access_token: Option<String>,
    pub line_api_base_url: Option<String>,
    pub sheets_service_account_json: Option<String>,
    pub sheets_spreadsheet_id: Option<String>,
    pub sheets_range: Option<String>,
    pub sheets_api_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            line: LineConfig {
                channel_secret: String::new().into(),
                channel_access_token: String::new().into(),
                api_base_url: "https://api.line.me".to_string(),
            },
            sheets: SheetsConfig {
                service_account_json: String::new().into(),
                spreadsheet_id: String::new(),
                range: "工作表1!A:C".to_string(),
                timeout_secs: 10,
                api_base_url: "https://sheets.googleapis.com".to_string(),
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 5000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(line) = patch.line {
            if let Some(channel_secret) = line.channel_secret {
                self.line.channel_secret = secret_value(channel_secret);
            }
            if let Some(channel_access_token) = line.channel_access_token {
                self.line.channel_access_token = secret_value(channel_access_token);
            }
            if let Some(api_base_url) = line.api_base_url {
                self.line.api_base_url = api_base_url;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(service_account_json) = sheets.service_account_json {
                self.sheets.service_account_json = secret_value(service_account_json);
            }
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = spreadsheet_id;
            }
            if let Some(range) = sheets.range {
                self.sheets.range = range;
            }
            if let Some(timeout_secs) = sheets.timeout_secs {
                self.sheets.timeout_secs = timeout_secs;
            }
            if let Some(api_base_url) = sheets.api_base_url {
                self.sheets.api_base_url = api_base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) =
            read_env("PARTBOT_LINE_CHANNEL_SECRET").or_else(|| read_env("LINE_CHANNEL_SECRET"))
        {
            self.line.channel_secret = secret_value(value);
        }
        if let Some(value) = read_env("PARTBOT_LINE_CHANNEL_ACCESS_TOKEN")
            .or_else(|| read_env("LINE_CHANNEL_ACCESS_TOKEN"))
        {
            self.line.channel_access_token = secret_value(value);
        }
        if let Some(value) = read_env("PARTBOT_LINE_API_BASE_URL") {
            self.line.api_base_url = value;
        }

        if let Some(value) = read_env("PARTBOT_SHEETS_SERVICE_ACCOUNT_JSON")
            .or_else(|| read_env("GOOGLE_SERVICE_ACCOUNT_JSON"))
        {
            self.sheets.service_account_json = secret_value(value);
        }
        if let Some(value) =
            read_env("PARTBOT_SHEETS_SPREADSHEET_ID").or_else(|| read_env("GOOGLE_SHEET_ID"))
        {
            self.sheets.spreadsheet_id = value;
        }
        if let Some(value) = read_env("PARTBOT_SHEETS_RANGE") {
            self.sheets.range = value;
        }
        if let Some(value) = read_env("PARTBOT_SHEETS_TIMEOUT_SECS") {
            self.sheets.timeout_secs = parse_u64("PARTBOT_SHEETS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PARTBOT_SHEETS_API_BASE_URL") {
            self.sheets.api_base_url = value;
        }

        if let Some(value) = read_env("PARTBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PARTBOT_SERVER_PORT") {
            self.server.port = parse_u16("PARTBOT_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }

        let log_level =
            read_env("PARTBOT_LOGGING_LEVEL").or_else(|| read_env("PARTBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARTBOT_LOGGING_FORMAT").or_else(|| read_env("PARTBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(channel_secret) = overrides.line_channel_secret {
            self.line.channel_secret = secret_value(channel_secret);
        }
        if let Some(channel_access_token) = overrides.line_channel_access_token {
            self.line.channel_access_token = secret_value(channel_access_token);
        }
        if let Some(api_base_url) = overrides.line_api_base_url {
            self.line.api_base_url = api_base_url;
        }
        if let Some(service_account_json) = overrides.sheets_service_account_json {
            self.sheets.service_account_json = secret_value(service_account_json);
        }
        if let Some(spreadsheet_id) = overrides.sheets_spreadsheet_id {
            self.sheets.spreadsheet_id = spreadsheet_id;
        }
        if let Some(range) = overrides.sheets_range {
            self.sheets.range = range;
        }
        if let Some(api_base_url) = overrides.sheets_api_base_url {
            self.sheets.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_line(&self.line)?;
        validate_sheets(&self.sheets)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Returns the config file that `AppConfig::load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_line(line: &LineConfig) -> Result<(), ConfigError> {
    if line.channel_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.channel_secret is required. Set LINE_CHANNEL_SECRET (LINE Developers console > Messaging API channel > Basic settings)".to_string(),
        ));
    }
    if line.channel_access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.channel_access_token is required. Set LINE_CHANNEL_ACCESS_TOKEN (LINE Developers console > Messaging API > Channel access token)".to_string(),
        ));
    }
    validate_base_url("line.api_base_url", &line.api_base_url)
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    let raw_key = sheets.service_account_json.expose_secret();
    if raw_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.service_account_json is required. Set GOOGLE_SERVICE_ACCOUNT_JSON to the service account key JSON".to_string(),
        ));
    }
    let is_object = serde_json::from_str::<serde_json::Value>(raw_key)
        .map(|value| value.is_object())
        .unwrap_or(false);
    if !is_object {
        return Err(ConfigError::Validation(
            "sheets.service_account_json must be a JSON object (the downloaded service account key)"
                .to_string(),
        ));
    }

    if sheets.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id is required. Set GOOGLE_SHEET_ID to the id segment of the sheet URL"
                .to_string(),
        ));
    }
    if sheets.range.trim().is_empty() {
        return Err(ConfigError::Validation("sheets.range must not be empty".to_string()));
    }
    if sheets.timeout_secs == 0 || sheets.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "sheets.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    validate_base_url("sheets.api_base_url", &sheets.api_base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_base_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    line: Option<LinePatch>,
    sheets: Option<SheetsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LinePatch {
    channel_secret: Option<String>,
    channel_access_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    service_account_json: Option<String>,
    spreadsheet_id: Option<String>,
    range: Option<String>,
    timeout_secs: Option<u64>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    const KEY_JSON: &str = r#"{"client_email":"bot@example.iam.gserviceaccount.com"}"#;

    const MANAGED_VARS: &[&str] = &[
        "LINE_CHANNEL_SECRET",
        "LINE_CHANNEL_ACCESS_TOKEN",
        "GOOGLE_SERVICE_ACCOUNT_JSON",
        "GOOGLE_SHEET_ID",
        "PORT",
        "PARTBOT_LINE_CHANNEL_SECRET",
        "PARTBOT_SHEETS_SPREADSHEET_ID",
        "PARTBOT_SERVER_PORT",
        "PARTBOT_LOG_LEVEL",
        "PARTBOT_LOG_FORMAT",
        "TEST_PARTBOT_SECRET",
    ];

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("LINE_CHANNEL_SECRET", "secret-from-env");
        env::set_var("LINE_CHANNEL_ACCESS_TOKEN", "token-from-env");
        env::set_var("GOOGLE_SERVICE_ACCOUNT_JSON", KEY_JSON);
        env::set_var("GOOGLE_SHEET_ID", "sheet-from-env");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn deployment_env_names_populate_required_fields() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::set_var("PORT", "8088");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.line.channel_secret.expose_secret() == "secret-from-env",
                "channel secret should come from LINE_CHANNEL_SECRET",
            )?;
            ensure(
                config.sheets.spreadsheet_id == "sheet-from-env",
                "spreadsheet id should come from GOOGLE_SHEET_ID",
            )?;
            ensure(config.server.port == 8088, "PORT should set the listening port")?;
            ensure(config.sheets.range == "工作表1!A:C", "default range should be A:C")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn prefixed_env_names_win_over_deployment_aliases() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::set_var("PARTBOT_LINE_CHANNEL_SECRET", "prefixed-secret");
        env::set_var("PORT", "8088");
        env::set_var("PARTBOT_SERVER_PORT", "9099");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.line.channel_secret.expose_secret() == "prefixed-secret",
                "prefixed secret should win",
            )?;
            ensure(config.server.port == 9099, "prefixed port should win over PORT")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_PARTBOT_SECRET", "interpolated-secret");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("partbot.toml");
            fs::write(
                &path,
                r#"
[line]
channel_secret = "${TEST_PARTBOT_SECRET}"
channel_access_token = "file-token"

[sheets]
service_account_json = '{"client_email":"bot@example.iam.gserviceaccount.com"}'
spreadsheet_id = "sheet-from-file"
range = "Inventory!A:C"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.line.channel_secret.expose_secret() == "interpolated-secret",
                "channel secret should be interpolated from environment",
            )?;
            ensure(config.sheets.range == "Inventory!A:C", "range should come from file")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::set_var("PARTBOT_SHEETS_SPREADSHEET_ID", "sheet-from-prefixed-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("partbot.toml");
            fs::write(
                &path,
                r#"
[sheets]
spreadsheet_id = "sheet-from-file"
timeout_secs = 20

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sheets.spreadsheet_id == "sheet-from-prefixed-env",
                "env spreadsheet id should win over file",
            )?;
            ensure(config.sheets.timeout_secs == 20, "file timeout should win over default")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            Ok(())
        })();

        clear_vars();
        result
    }

    #[test]
    fn missing_channel_secret_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::remove_var("LINE_CHANNEL_SECRET");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("line.channel_secret")
            );
            ensure(has_message, "validation failure should mention line.channel_secret")
        })();

        clear_vars();
        result
    }

    #[test]
    fn service_account_json_must_be_an_object() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::set_var("GOOGLE_SERVICE_ACCOUNT_JSON", "not-json");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected validation failure".to_string())?;
            ensure(
                error.to_string().contains("sheets.service_account_json"),
                "validation failure should mention sheets.service_account_json",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn invalid_port_is_reported_as_env_override_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::set_var("PORT", "eighty");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected env override failure".to_string())?;
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PORT"),
                "error should name the PORT variable",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        set_required_vars();
        env::set_var("PARTBOT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("secret-from-env"), "debug output should not contain secret")?;
            ensure(!debug.contains("token-from-env"), "debug output should not contain token")?;
            ensure(!debug.contains("client_email"), "debug output should not contain key json")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env alias",
            )?;
            Ok(())
        })();

        clear_vars();
        result
    }
}
