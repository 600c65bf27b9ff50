use std::sync::Arc;

use partbot_core::config::{AppConfig, LoadOptions};
use partbot_core::{LookupOutcome, LookupResolver};

use super::{
    CommandResult, EXIT_CONFIG_INVALID, EXIT_RUNTIME, EXIT_SHEETS_SETUP, EXIT_SHEET_FETCH,
};

pub fn run(code: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "lookup",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            );
        }
    };
    run_with_config(&config, code)
}

/// Unlike the chat path, fetch failures surface their cause here.
pub fn run_with_config(config: &AppConfig, code: &str) -> CommandResult {
    let query = code.trim();
    if query.is_empty() {
        return CommandResult::success("lookup", LookupOutcome::EmptyQuery.render());
    }

    let client = match partbot_sheets::connect(&config.sheets) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "lookup",
                "sheets_setup",
                error.to_string(),
                EXIT_SHEETS_SETUP,
            );
        }
    };
    let resolver = LookupResolver::new(
        Arc::new(client),
        config.sheets.range.clone(),
        config.sheets.fetch_timeout(),
    );

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "lookup",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    match runtime.block_on(resolver.load_table()) {
        Ok(table) => {
            CommandResult::success("lookup", LookupOutcome::from_table(&table, query).render())
        }
        Err(error) => CommandResult::failure(
            "lookup",
            error.kind(),
            error.to_string(),
            EXIT_SHEET_FETCH,
        ),
    }
}
