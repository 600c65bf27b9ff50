use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::inventory::{InventoryRecord, InventoryTable, TableFetcher};

pub const EMPTY_QUERY_PROMPT: &str = "請輸入零件號碼。";
pub const LOOKUP_UNAVAILABLE: &str = "目前無法查詢庫存，請稍後再試。";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupOutcome {
    EmptyQuery,
    Found(InventoryRecord),
    NotFound { query: String },
    Unavailable,
}

impl LookupOutcome {
    /// Renders the chat reply. Every outcome yields a non-empty message.
    pub fn render(&self) -> String {
        match self {
            Self::EmptyQuery => EMPTY_QUERY_PROMPT.to_owned(),
            Self::Unavailable => LOOKUP_UNAVAILABLE.to_owned(),
            Self::NotFound { query } => format!("查無此零件號碼：{query}"),
            Self::Found(record) => {
                let mut lines =
                    vec![format!("零件號碼：{}", record.key), format!("中文品名：{}", record.name)];
                if !record.stock.is_empty() {
                    lines.push(format!("Stock：{}", record.stock));
                }
                lines.join("\n")
            }
        }
    }

    /// Exact-match lookup of an already trimmed, non-empty query.
    pub fn from_table(table: &InventoryTable, query: &str) -> Self {
        match table.get(query) {
            Some(record) => Self::Found(record.clone()),
            None => Self::NotFound { query: query.to_owned() },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "empty_query",
            Self::Found(_) => "found",
            Self::NotFound { .. } => "not_found",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Resolves part codes against a table rebuilt from the remote source on every call.
#[derive(Clone)]
pub struct LookupResolver {
    fetcher: Arc<dyn TableFetcher>,
    range: String,
    fetch_timeout: Duration,
}

impl LookupResolver {
    pub fn new(
        fetcher: Arc<dyn TableFetcher>,
        range: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Self {
        Self { fetcher, range: range.into(), fetch_timeout }
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    pub async fn resolve(&self, raw_query: &str) -> String {
        self.lookup(raw_query).await.render()
    }

    pub async fn lookup(&self, raw_query: &str) -> LookupOutcome {
        let query = raw_query.trim();
        if query.is_empty() {
            return LookupOutcome::EmptyQuery;
        }

        let table = match self.load_table().await {
            Ok(table) => table,
            Err(error) => {
                warn!(
                    event_name = "lookup.fetch_failed",
                    range = %self.range,
                    error_kind = error.kind(),
                    transient = error.is_transient(),
                    error = %error,
                    "inventory fetch failed; replying with unavailable notice"
                );
                return LookupOutcome::Unavailable;
            }
        };

        let outcome = LookupOutcome::from_table(&table, query);
        info!(
            event_name = "lookup.resolved",
            outcome = outcome.label(),
            table_size = table.len(),
            "part code lookup resolved"
        );
        outcome
    }

    /// Fetches and builds a fresh table, bounded by the configured timeout.
    pub async fn load_table(&self) -> Result<InventoryTable, FetchError> {
        let rows =
            tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_raw_rows(&self.range))
                .await
                .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;
        debug!(event_name = "lookup.rows_fetched", row_count = rows.len(), "inventory rows fetched");
        Ok(InventoryTable::build(&rows))
    }
}
