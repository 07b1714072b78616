//! Beanstalk Bot
//!
//! Runs the peg, seasons, pool and beanstalk monitors and delivers their
//! notifications to Discord, Telegram or stdout.
//!
//! Usage:
//!   cargo run --bin bean-bot -- --transport discord
//!   cargo run --bin bean-bot -- --dry-run            (simulated chain data)
//!
//! Environment (.env supported): DEPLOYMENT, RPC_URL, BEAN_SUBGRAPH_URL,
//! BEANSTALK_SUBGRAPH_URL, DISCORD_WEBHOOK_*, TELEGRAM_BOT_TOKEN,
//! TELEGRAM_CHAT_ID_*, CHANNELS_FILE, LOG_FORMAT, RUST_LOG
//!
//! Created: 2026-10-18

use anyhow::{Context, Result};
use bean_bots::config::{load_config, TransportKind};
use bean_bots::delivery::{DiscordTransport, Dispatcher, StdoutTransport, TelegramTransport, Transport};
use bean_bots::monitor::{BeanstalkMonitor, Monitor, MonitorOptions, PegCrossMonitor, PoolMonitor, SeasonMonitor};
use bean_bots::sink::{NotificationSink, QueuedSink};
use bean_bots::sources::{
    ChainDataSource, EthChainClient, EventSource, GraphDataSource, SimulatedChainSource, SubgraphClient,
};
use clap::Parser;
use futures::future::join_all;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// How often monitor health is logged
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(600);

/// Beanstalk Bot - peg, seasons, pool and silo notifications
#[derive(Parser)]
#[command(name = "bean-bot")]
struct Args {
    /// Chat service to deliver notifications through
    #[arg(short, long, env = "BOT_TRANSPORT", value_enum, default_value = "stdout")]
    transport: TransportKind,

    /// Feed the pool and beanstalk monitors with simulated chain data
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (LOG_FORMAT=json for structured output)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();

    info!("===========================================");
    info!("   Beanstalk Bot");
    info!("   Transport: {:?}{}", args.transport, if args.dry_run { " (dry run)" } else { "" });
    info!("===========================================");

    let config = load_config()?;
    let prod = config.is_production();
    info!(
        "Configured as a {} instance.",
        if prod { "production" } else { "staging" }
    );

    // Delivery
    let sink = QueuedSink::new();
    let transport: Arc<dyn Transport> = match args.transport {
        TransportKind::Discord => Arc::new(DiscordTransport::new()),
        TransportKind::Telegram => {
            let token = config
                .telegram_bot_token
                .clone()
                .context("TELEGRAM_BOT_TOKEN not set")?;
            Arc::new(TelegramTransport::new(token))
        }
        TransportKind::Stdout => Arc::new(StdoutTransport),
    };
    let dispatcher = Dispatcher::new(sink.clone(), transport, config.channel_map(args.transport)?);
    let dispatch_stop = Arc::new(AtomicBool::new(false));
    let dispatch_task = tokio::spawn(dispatcher.run(Arc::clone(&dispatch_stop)));

    // Data sources
    let graph: Arc<dyn GraphDataSource> = Arc::new(SubgraphClient::new(
        config.bean_subgraph_url.clone(),
        config.beanstalk_subgraph_url.clone(),
    )?);
    let (pool_chain, beanstalk_chain): (Arc<dyn ChainDataSource>, Arc<dyn ChainDataSource>) = if args.dry_run {
        (
            Arc::new(SimulatedChainSource::new(EventSource::Pool)),
            Arc::new(SimulatedChainSource::new(EventSource::Beanstalk)),
        )
    } else {
        let rpc_url = config.rpc_url()?;
        (
            Arc::new(EthChainClient::connect(rpc_url, EventSource::Pool)?),
            Arc::new(EthChainClient::connect(rpc_url, EventSource::Beanstalk)?),
        )
    };

    // Monitors
    let options = MonitorOptions {
        prod,
        dry_run: args.dry_run,
    };
    let publisher: Arc<dyn NotificationSink> = Arc::new(sink.clone());
    let mut monitors: Vec<Monitor> = vec![
        PegCrossMonitor::new(Arc::clone(&graph), Arc::clone(&publisher)).into_monitor(options),
        SeasonMonitor::new(Arc::clone(&graph), Arc::clone(&publisher)).into_monitor(options),
        PoolMonitor::new(pool_chain, Arc::clone(&publisher)).into_monitor(options),
        BeanstalkMonitor::new(beanstalk_chain, Arc::clone(&graph), Arc::clone(&publisher)).into_monitor(options),
    ];
    for monitor in &mut monitors {
        monitor.start()?;
    }

    // Wait for SIGINT/SIGTERM, logging monitor health meanwhile
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    let signals_handle = signals.handle();
    let mut health = tokio::time::interval(HEALTH_LOG_INTERVAL);
    health.tick().await;
    loop {
        tokio::select! {
            signal = signals.next() => {
                match signal {
                    Some(sig) => info!("Received signal {} - shutting down", sig),
                    None => warn!("Signal stream closed - shutting down"),
                }
                break;
            }
            _ = health.tick() => {
                for monitor in &monitors {
                    info!(
                        "Monitor {}: running={} failures={}",
                        monitor.name(),
                        monitor.is_running(),
                        monitor.failures()
                    );
                }
            }
        }
    }
    signals_handle.close();

    join_all(monitors.iter_mut().map(|m| m.stop())).await;

    // Deliver the stop notices before exiting
    dispatch_stop.store(true, Ordering::SeqCst);
    dispatch_task.await.context("Dispatcher task failed")?;

    info!("Beanstalk Bot stopped");
    Ok(())
}
