use std::sync::Arc;

use partbot_core::config::{AppConfig, ConfigError};
use partbot_core::LookupResolver;
use partbot_line::events::default_dispatcher;
use partbot_line::reply::LineReplyClient;
use partbot_sheets::SetupError;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::webhook::WebhookState;

pub struct Application {
    pub config: AppConfig,
    pub resolver: LookupResolver,
    pub webhook: WebhookState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("sheets client setup failed: {0}")]
    Sheets(#[from] SetupError),
    #[error("reply http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let sheets = partbot_sheets::connect(&config.sheets)?;
    let resolver = LookupResolver::new(
        Arc::new(sheets),
        config.sheets.range.clone(),
        config.sheets.fetch_timeout(),
    );
    info!(
        event_name = "system.bootstrap.sheets_ready",
        correlation_id = "bootstrap",
        range = %config.sheets.range,
        timeout_secs = config.sheets.timeout_secs,
        "inventory source configured"
    );

    let reply_http = Client::builder()
        .timeout(config.sheets.fetch_timeout())
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let replies = LineReplyClient::new(
        reply_http,
        config.line.api_base_url.clone(),
        config.line.channel_access_token.clone(),
    );
    let dispatcher = default_dispatcher(resolver.clone(), Arc::new(replies));
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        "line event dispatcher configured"
    );

    let webhook = WebhookState::new(config.line.channel_secret.clone(), dispatcher);

    Ok(Application { config, resolver, webhook })
}
