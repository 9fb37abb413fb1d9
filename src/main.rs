use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use volley::{Batch, BatchConfig, ReqwestHttpClient, report};

/// Inline JSON overriding the default batch configuration, e.g.
/// `{"batch_size": 20, "per_fetch_timeout_ms": 2000}`.
const CONFIG_ENV: &str = "VOLLEY_CONFIG";

fn load_config() -> anyhow::Result<BatchConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(raw) => serde_json::from_str(&raw).with_context(|| format!("Invalid {CONFIG_ENV}")),
        Err(_) => Ok(BatchConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    volley::metrics::describe();

    let config = load_config()?;
    tracing::info!(
        batch_size = config.batch_size,
        timeout_ms = config.per_fetch_timeout_ms,
        url_template = config.url_template.as_str(),
        "Starting batch"
    );

    let root = CancellationToken::new();
    let on_ctrl_c = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling batch");
            on_ctrl_c.cancel();
        }
    });

    // Connection setup never outlives the fetch deadline
    let client = reqwest::Client::builder()
        .connect_timeout(config.per_fetch_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let batch = Batch::new(Arc::new(ReqwestHttpClient::with_client(client)), config);
    let (successes, failures) = batch.run(&root).split();

    let stats = report::print_outcomes(successes, failures, &mut std::io::stdout()).await?;
    tracing::info!(
        successes = stats.successes,
        failures = stats.failures,
        "Batch finished"
    );

    Ok(())
}
