use anyhow::Context;
use clap::Parser;

use fanout_dispatcher::config::Config;
use fanout_dispatcher::orchestrator::{Orchestrator, RunMode};

/// Fan-out dispatcher: concurrently delivers records to rate-limited sinks.
#[derive(Parser, Debug)]
#[command(name = "fanout-dispatcher")]
struct Cli {
    /// Process a fixed number of records and stop, instead of streaming
    /// until the input is idle. Defaults to 3 when no value is given.
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "3")]
    test_mode: Option<u64>,

    /// Optional TOML config file, layered on top of the environment.
    #[arg(long, value_name = "PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        tracing::error!("{:#}", err);
        for cause in err.chain().skip(1) {
            tracing::error!("caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let mode = match cli.test_mode {
        Some(count) => RunMode::BoundedTest { count },
        None => RunMode::Streaming,
    };

    let orchestrator = Orchestrator::new(config)
        .await
        .context("failed to initialize the dispatcher")?;

    let summary = orchestrator.run(mode).await;
    tracing::info!(
        processed = summary.processed,
        dlq_failures = summary.dlq_failures,
        success = ?summary.success,
        fail = ?summary.fail,
        "dispatcher drained cleanly"
    );

    Ok(())
}
