//! Google Sheets inventory source.
//!
//! - **Auth** (`auth`) - service-account JWT exchange for read-only bearer tokens
//! - **Client** (`client`) - `spreadsheets.values.get` reader implementing `TableFetcher`

pub mod auth;
pub mod client;

use std::sync::Arc;

use partbot_core::config::SheetsConfig;
use reqwest::Client;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

pub use auth::{AccessTokenProvider, AuthError, ServiceAccountKey, ServiceAccountTokenProvider};
pub use client::SheetsClient;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Builds a Sheets reader from validated config. Every request is bounded by
/// `sheets.timeout_secs`, token exchange included.
pub fn connect(config: &SheetsConfig) -> Result<SheetsClient, SetupError> {
    let http =
        Client::builder().timeout(config.fetch_timeout()).build().map_err(SetupError::HttpClient)?;

    let key = ServiceAccountKey::from_json(config.service_account_json.expose_secret())?;
    let tokens = ServiceAccountTokenProvider::new(key, http.clone())?;
    info!(
        event_name = "sheets.client.ready",
        client_email = %tokens.client_email(),
        spreadsheet_id = %config.spreadsheet_id,
        "sheets client configured"
    );

    Ok(SheetsClient::new(
        http,
        config.api_base_url.clone(),
        config.spreadsheet_id.clone(),
        Arc::new(tokens),
    ))
}
