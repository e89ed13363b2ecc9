//! Loads hotel records into the search index.
//!
//! Usage: `hotel-agent-load <hotels.json> [batch size]`
//!
//! The file must hold a JSON array of records. When `TEMPLATE_ID` is set,
//! the bundled search template is stored under that id first.

#[macro_use]
extern crate tracing;

use std::env;
use std::process::ExitCode;

use hotel_agent::config::SearchConfig;
use hotel_agent::ingest::normalize_record;
use hotel_agent::services::elasticsearch::SEARCH_TEMPLATE;
use hotel_agent::services::{BulkReport, ElasticsearchClient};
use owo_colors::OwoColorize;
use serde_json::Value;
use tokio::fs;

const DEFAULT_BATCH_SIZE: usize = 500;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: hotel-agent-load <hotels.json> [batch size]");
        return ExitCode::FAILURE;
    };
    let batch_size = match args.next().map(|arg| arg.parse::<usize>()) {
        None => DEFAULT_BATCH_SIZE,
        Some(Ok(size)) if size > 0 => size,
        Some(_) => {
            eprintln!("batch size must be a positive number");
            return ExitCode::FAILURE;
        }
    };

    let config = match SearchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let client = ElasticsearchClient::new(&config);

    if let Some(template_id) = client.template_id() {
        if let Err(err) = client.put_search_template(template_id, SEARCH_TEMPLATE).await {
            eprintln!("failed to store search template {template_id}: {err}");
            return ExitCode::FAILURE;
        }
        println!("Stored search template {}", template_id.bright_white());
    }

    let records = match read_records(&path).await {
        Ok(records) => records,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    println!("Loading {} records into {}...", records.len(), client.index());

    let mut total = BulkReport::default();
    for (idx, batch) in records.chunks(batch_size).enumerate() {
        match client.bulk_index(batch).await {
            Ok(report) => {
                debug!("batch {idx}: {report:?}");
                total.indexed += report.indexed;
                total.failed += report.failed;
            }
            Err(err) => {
                error!("batch {idx} failed: {err}");
                total.failed += batch.len();
            }
        }
    }

    println!(
        "{} indexed, {} failed",
        total.indexed.bright_green(),
        total.failed.bright_red()
    );
    if total.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn read_records(path: &str) -> Result<Vec<Value>, String> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|err| format!("failed to read {path}: {err}"))?;
    match serde_json::from_str(&text) {
        Ok(Value::Array(records)) => {
            Ok(records.into_iter().map(normalize_record).collect())
        }
        Ok(_) => Err(format!("{path} must contain a JSON array of records")),
        Err(err) => Err(format!("failed to parse {path}: {err}")),
    }
}
