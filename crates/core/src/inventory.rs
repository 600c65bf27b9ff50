//! Inventory rows pulled from the spreadsheet and the table built from them.
//!
//! Column layout: A = part code, B = name, C = stock. Row 1 is the header.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// Raw spreadsheet rows, outer order = sheet order, inner order = column order.
pub type RawRows = Vec<Vec<String>>;

const KEY_COLUMN: usize = 0;
const NAME_COLUMN: usize = 1;
const STOCK_COLUMN: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub key: String,
    pub name: String,
    /// Kept as text: sheets carry annotations like "3 (on order)".
    pub stock: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventoryTable {
    records: HashMap<String, InventoryRecord>,
}

impl InventoryTable {
    /// Builds a table from raw rows, skipping the header and any row without a key.
    pub fn build(rows: &[Vec<String>]) -> Self {
        let mut table = Self::default();
        if rows.len() < 2 {
            return table;
        }

        for row in &rows[1..] {
            if row.is_empty() {
                continue;
            }

            let key = cell(row, KEY_COLUMN);
            if key.is_empty() {
                continue;
            }

            let record = InventoryRecord {
                key: key.to_owned(),
                name: cell(row, NAME_COLUMN).to_owned(),
                stock: cell(row, STOCK_COLUMN).to_owned(),
            };
            table.insert(record);
        }

        table
    }

    pub fn insert(&mut self, record: InventoryRecord) {
        self.records.insert(record.key.clone(), record);
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, key: &str) -> Option<&InventoryRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn cell(row: &[String], column: usize) -> &str {
    row.get(column).map(|value| value.trim()).unwrap_or("")
}

/// Reads raw rows for a range from the remote inventory source.
#[async_trait]
pub trait TableFetcher: Send + Sync {
    async fn fetch_raw_rows(&self, range: &str) -> Result<RawRows, FetchError>;
}
