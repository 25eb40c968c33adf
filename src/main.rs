use anyhow::{Context, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt};

use trading_engine::backtest::{BacktestRunner, load_history};
use trading_engine::core::{ConfigSource, RunMode};
use trading_engine::feeds::{JsonLinesFeed, MarketDataBus};
use trading_engine::live::LiveSession;
use trading_engine::{Config, TradingEngine};

const USAGE: &str = "usage: trading-engine [--config PATH] <backtest FILE | live>";

struct Args {
    config: PathBuf,
    mode: Option<RunMode>,
    history: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: PathBuf::from("config.toml"),
        mode: None,
        history: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" | "-c" => args.config = it.next().context(USAGE)?.into(),
            "backtest" => {
                args.mode = Some(RunMode::Backtest);
                args.history = Some(it.next().context(USAGE)?.into());
            }
            "live" => args.mode = Some(RunMode::Live),
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unexpected argument {:?}\n{}", other, USAGE),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(run());
    // stdin reads sit on the blocking pool and never return on their own
    runtime.shutdown_background();
    result
}

async fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    let (config, source) = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // 1. Logger: RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},trading_engine=debug", config.app.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info,trading_engine=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    match &source {
        ConfigSource::File(_) => tracing::info!("Loaded config from {}", source),
        ConfigSource::Defaults => {
            tracing::warn!("No config at {}, using {}", args.config.display(), source)
        }
    }

    let mode = args.mode.unwrap_or(config.app.mode);
    tracing::info!("Trading core starting in {:?} mode", mode);

    let snapshot = match mode {
        RunMode::Backtest => {
            let path = args.history.context(USAGE)?;
            let history = load_history(&path).with_context(|| format!("loading {}", path.display()))?;

            let runner = BacktestRunner::from_config(&config);
            let report = runner.run(history);
            tracing::info!(
                "Replayed {} ticks: {} accepted, {} rejected",
                report.ticks,
                report.accepted(),
                report.rejected()
            );
            runner.engine().snapshot()
        }
        RunMode::Live => {
            let engine = Arc::new(TradingEngine::from_config(&config));
            let bus = MarketDataBus::from_config(&config.feed);
            let session = LiveSession::spawn(Arc::clone(&engine), bus.subscribe());

            let stdin = JsonLinesFeed::new("stdin", BufReader::new(tokio::io::stdin()));
            let publisher = bus.clone();
            let forwarder = tokio::spawn(async move { publisher.forward(stdin).await });

            let stats = session
                .until(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
            bus.close();
            forwarder.abort();
            if let Ok(forwarded) = forwarder.await {
                tracing::info!("Stdin forwarder stats: {:?}", forwarded);
            }
            tracing::info!("Live session stats: {:?}", stats);
            engine.snapshot()
        }
    };

    println!("{}", snapshot.to_json_pretty()?);
    Ok(())
}
