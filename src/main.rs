use anyhow::Context;
use news_digest::digest::SOURCE_ONLINE_ARTICLE;
use news_digest::metrics::METRICS;
use news_digest::{logging, Config, DigestService};
use tokio::io::AsyncReadExt;

/// Reads article text from stdin and prints its digest as JSON.
/// The first non-flag argument, if any, is recorded as the source label.
/// With `--metrics`, the Prometheus exposition is written to stderr afterwards.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    logging::init(&config.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let print_metrics = args.iter().any(|a| a == "--metrics");
    let source = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| SOURCE_ONLINE_ARTICLE.to_string());

    let service = DigestService::from_config(&config)
        .await
        .context("failed to start digest service")?;

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("failed to read article text from stdin")?;

    let result = service.digest(&text, &source).await;
    if print_metrics {
        eprint!("{}", METRICS.export_prometheus());
    }

    let digest = result?;
    println!("{}", serde_json::to_string_pretty(&digest)?);

    Ok(())
}
