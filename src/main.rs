use anyhow::{Context, Result};
use reqwest::Client;
use sheetpulse::{
    chart::DashboardVisualizer,
    config::Config,
    fetch::{SheetsFetcher, TokenFile},
    refresh::{Outcome, RefreshLoop},
};
use std::{env, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "sheetpulse.yaml".to_string());
    let config = Config::from_yaml_file(&config_path)?;
    info!(
        spreadsheet = %config.spreadsheet_id,
        worksheet = %config.worksheet,
        interval_s = config.interval_seconds,
        duration_m = config.duration_minutes,
        "configured"
    );

    // ─── 3) wire fetcher + visualizer ────────────────────────────────
    let client = Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .context("building http client")?;
    let fetcher = SheetsFetcher::new(
        client,
        &config.spreadsheet_id,
        &config.worksheet,
        config.charts.multi_select.clone(),
        TokenFile::new(&config.token_file),
    )?;
    let visualizer = DashboardVisualizer::new(config.charts.clone(), &config.out_dir);
    let (refresh_loop, handle) = RefreshLoop::new(config.refresh_config(), fetcher, visualizer)?;

    // ─── 4) ctrl-c requests a stop at the next tick boundary ─────────
    let stopper = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c; stopping at the next tick boundary");
            handle.request_stop();
        }
    });

    // ─── 5) run the refresh loop ─────────────────────────────────────
    let summary = refresh_loop.run().await;
    stopper.abort();

    info!(
        ticks = summary.ticks,
        renders = summary.renders,
        anomalies = summary.anomalies,
        rows = summary.row_count,
        "run finished"
    );
    match summary.outcome {
        Outcome::Completed => {
            info!("duration elapsed; dashboard is final");
            Ok(())
        }
        Outcome::Stopped => {
            info!("stopped before the deadline");
            Ok(())
        }
        Outcome::Failed(err) => {
            error!(error = %err, "refresh loop failed");
            Err(err.into())
        }
    }
}
