pub mod config;
pub mod errors;
pub mod inventory;
pub mod lookup;

pub use errors::FetchError;
pub use inventory::{InventoryRecord, InventoryTable, RawRows, TableFetcher};
pub use lookup::{LookupOutcome, LookupResolver};
