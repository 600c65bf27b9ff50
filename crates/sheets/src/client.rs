use std::sync::Arc;

use async_trait::async_trait;
use partbot_core::{FetchError, RawRows, TableFetcher};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::{AccessTokenProvider, AuthError};

const MAX_ERROR_DETAIL_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Read-only client for `spreadsheets.values.get`.
pub struct SheetsClient {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl SheetsClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self { http, base_url: base_url.into(), spreadsheet_id: spreadsheet_id.into(), tokens }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }
}

#[async_trait]
impl TableFetcher for SheetsClient {
    async fn fetch_raw_rows(&self, range: &str) -> Result<RawRows, FetchError> {
        let token = self.tokens.access_token().await.map_err(auth_error)?;

        let response = self
            .http
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| FetchError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, range, &body));
        }

        let payload: ValueRange =
            response.json().await.map_err(|error| FetchError::Decode(error.to_string()))?;
        debug!(
            event_name = "sheets.values.fetched",
            range = %range,
            row_count = payload.values.len(),
            "spreadsheet values fetched"
        );

        Ok(payload.values.into_iter().map(|row| row.into_iter().map(cell_text).collect()).collect())
    }
}

fn auth_error(error: AuthError) -> FetchError {
    match error {
        AuthError::Transport(message) => FetchError::Transport(message),
        other => FetchError::Unauthorized(other.to_string()),
    }
}

fn status_error(status: StatusCode, range: &str, body: &str) -> FetchError {
    let detail = error_detail(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized(detail),
        StatusCode::NOT_FOUND => FetchError::RangeNotFound(range.to_owned()),
        StatusCode::BAD_REQUEST if detail.contains("Unable to parse range") => {
            FetchError::RangeNotFound(range.to_owned())
        }
        other => FetchError::Status { status: other.as_u16(), detail },
    }
}

/// Pulls `error.message` out of a Google API error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.pointer("/error/message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned());
    message.chars().take(MAX_ERROR_DETAIL_CHARS).collect()
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
