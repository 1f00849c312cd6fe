//! chainwatch - hot-wallet whale transfer monitor
//!
//! Follows new blocks over a WebSocket JSON-RPC endpoint and alerts when
//! a single address moves more than a configured amount of a token through
//! one contract within a short window.

mod config;

use chainwatch_alerts::Notifier;
use chainwatch_engine::HotWalletMonitor;
use chainwatch_feeds::WsRpcClient;
use clap::Parser;
use config::AppConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// chainwatch CLI
#[derive(Parser, Debug)]
#[command(name = "chainwatch")]
#[command(about = "Hot-wallet whale transfer monitor for EVM chains", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// WebSocket RPC endpoint (overrides WS_URL and the config file)
    #[arg(short, long)]
    ws_url: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long)]
    log_level: Option<String>,

    /// Minutes between two alerts for the same contract
    #[arg(long)]
    cooldown_minutes: Option<u64>,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn load_config(path: &str) -> Result<AppConfig, config::ConfigError> {
    if Path::new(path).exists() {
        AppConfig::load(path)
    } else {
        Ok(AppConfig::default())
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = load_config(&args.config);
    let level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().and_then(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level);

    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("🐋 chainwatch starting...");
    if !Path::new(&args.config).exists() {
        warn!("Config file {} not found, using defaults", args.config);
    }

    if let Some(url) = args.ws_url.clone().or_else(|| std::env::var("WS_URL").ok()) {
        config.rpc.ws_url = url;
    }
    if config.rpc.ws_url.is_empty() {
        error!("No WebSocket endpoint: pass --ws-url, set WS_URL, or set rpc.ws_url in {}", args.config);
        std::process::exit(1);
    }
    if let Some(minutes) = args.cooldown_minutes {
        config.monitor.alert_cooldown_minutes = minutes;
    }

    let monitor_config = match config.monitor_config() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Endpoint: {}", config.rpc.ws_url);
    for (token, threshold) in monitor_config.tokens.iter() {
        info!("  {} threshold={}", token, threshold);
    }

    let notifier = Arc::new(Notifier::from_config(&config.alerts.clone().with_env()));
    let source = Arc::new(WsRpcClient::new(config.rpc.clone()));
    let monitor = Arc::new(HotWalletMonitor::new(source, notifier, monitor_config));

    let mut handle = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.start().await }
    });

    tokio::select! {
        result = &mut handle => {
            match result {
                Ok(Ok(())) => info!("Monitor exited"),
                Ok(Err(e)) => {
                    error!("Monitor failed: {}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Monitor task panicked: {}", e);
                    std::process::exit(1);
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            warn!("Shutdown signal received");
            monitor.stop().await;
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("Monitor did not finish its block in time");
            }
        }
    }

    info!("👋 chainwatch stopped");
}
