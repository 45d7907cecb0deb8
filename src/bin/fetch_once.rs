//! One-shot fetch: print the survey summary and optionally export a CSV.
//!
//! Usage: fetch_once [config.yaml] [export.csv]

use anyhow::{Context, Result};
use reqwest::Client;
use sheetpulse::{
    config::Config,
    export,
    fetch::{ResponseFetcher, SheetsFetcher, TokenFile},
    report,
};
use std::{env, time::Duration};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "sheetpulse.yaml".to_string());
    let config = Config::from_yaml_file(&config_path)?;

    let client = Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .context("building http client")?;
    let mut fetcher = SheetsFetcher::new(
        client,
        &config.spreadsheet_id,
        &config.worksheet,
        config.charts.multi_select.clone(),
        TokenFile::new(&config.token_file),
    )?;

    let table = fetcher.fetch().await?;
    println!("{}", report::survey_summary(&table));

    if let Some(csv_path) = env::args().nth(2) {
        export::write_csv(&table, &csv_path)?;
        info!(path = %csv_path, rows = table.len(), "exported responses");
    }

    Ok(())
}
