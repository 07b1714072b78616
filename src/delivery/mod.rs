//! Notification delivery
//!
//! The `Dispatcher` drains the shared `QueuedSink` every 100ms and hands each
//! notification to a chat `Transport`. Failed sends are logged and dropped;
//! the monitors never wait on a chat service.
//!
//! Transports:
//!     discord.rs   - one webhook per channel
//!     telegram.rs  - Bot API sendMessage to a single chat
//!     StdoutTransport (here) - local runs and dry runs
//!
//! Created: 2026-10-18

pub mod discord;
pub mod telegram;

pub use discord::DiscordTransport;
pub use telegram::TelegramTransport;

use crate::error::MonitorError;
use crate::sink::{Notification, QueuedSink};
use crate::types::Channel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// How often queued notifications are flushed
pub const DISPATCH_INTERVAL: Duration = Duration::from_millis(100);

/// A chat service notifications can be sent through
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Send `text` to `destination` (webhook URL, chat id, ...)
    async fn send(&self, destination: &str, text: &str) -> Result<(), MonitorError>;
}

/// Prints notifications instead of sending them
#[derive(Debug, Default)]
pub struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), MonitorError> {
        println!("[{}]\n{}\n", destination, text);
        Ok(())
    }
}

/// Destination of every notification channel
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelMap {
    pub peg: String,
    pub seasons: String,
    pub pool: String,
    pub beanstalk: String,
}

/// Layout of the optional channels file
#[derive(Debug, Deserialize)]
struct ChannelsFile {
    production: Option<ChannelMap>,
    staging: Option<ChannelMap>,
}

impl ChannelMap {
    /// Staging instances post everything to one test destination
    pub fn single(destination: impl Into<String>) -> Self {
        let destination = destination.into();
        Self {
            peg: destination.clone(),
            seasons: destination.clone(),
            pool: destination.clone(),
            beanstalk: destination,
        }
    }

    pub fn destination(&self, channel: Channel) -> &str {
        match channel {
            Channel::Peg => &self.peg,
            Channel::Seasons => &self.seasons,
            Channel::Pool => &self.pool,
            Channel::Beanstalk => &self.beanstalk,
        }
    }

    /// Load the `[production]` or `[staging]` table from a TOML file
    pub fn load<P: AsRef<Path>>(path: P, prod: bool) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read channels file: {}", path.as_ref().display()))?;
        Self::from_toml(&content, prod)
    }

    pub fn from_toml(content: &str, prod: bool) -> Result<Self> {
        let file: ChannelsFile = toml::from_str(content).context("Failed to parse channels file")?;
        let (table, map) = if prod {
            ("production", file.production)
        } else {
            ("staging", file.staging)
        };
        map.ok_or_else(|| MonitorError::config_err(format!("channels file has no [{}] table", table)).into())
    }
}

/// Drains the sink into a transport
pub struct Dispatcher {
    sink: QueuedSink,
    transport: Arc<dyn Transport>,
    channels: ChannelMap,
}

impl Dispatcher {
    pub fn new(sink: QueuedSink, transport: Arc<dyn Transport>, channels: ChannelMap) -> Self {
        info!(
            "Dispatching via {} (peg → {}, seasons → {}, pool → {}, beanstalk → {})",
            transport.name(),
            redact(&channels.peg),
            redact(&channels.seasons),
            redact(&channels.pool),
            redact(&channels.beanstalk)
        );
        Self {
            sink,
            transport,
            channels,
        }
    }

    /// Send everything queued so far. Returns the number delivered.
    pub async fn flush(&self) -> usize {
        let mut delivered = 0;
        for Notification { channel, text } in self.sink.drain() {
            let destination = self.channels.destination(channel);
            match self.transport.send(destination, &text).await {
                Ok(()) => {
                    delivered += 1;
                    info!("Message sent through {} channel:\n{}\n", channel, text);
                }
                Err(e) => error!("Failed to deliver {} message via {}: {}", channel, self.transport.name(), e),
            }
        }
        delivered
    }

    /// Flush every `DISPATCH_INTERVAL` until `stop` is set, then flush once more
    pub async fn run(self, stop: Arc<AtomicBool>) {
        let mut interval = tokio::time::interval(DISPATCH_INTERVAL);
        let mut total = 0usize;
        while !stop.load(Ordering::SeqCst) {
            interval.tick().await;
            total += self.flush().await;
        }
        total += self.flush().await;
        debug!("Dispatcher stopped after {} messages", total);
    }
}

/// Keep webhook secrets and tokens out of the logs
fn redact(destination: &str) -> String {
    if destination.starts_with("http") {
        match destination.rsplit_once('/') {
            Some((prefix, _)) => format!("{}/…", prefix),
            None => "…".to_string(),
        }
    } else {
        destination.to_string()
    }
}
