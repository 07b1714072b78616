//! Configuration management
//! Load settings from .env file and the process environment

use crate::delivery::telegram::{TELEGRAM_CHAT_ID_PRODUCTION, TELEGRAM_CHAT_ID_STAGING};
use crate::delivery::ChannelMap;
use crate::error::MonitorError;
use crate::sources::graph::{DEFAULT_BEANSTALK_SUBGRAPH_URL, DEFAULT_BEAN_SUBGRAPH_URL};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Where notifications are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportKind {
    Discord,
    Telegram,
    Stdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Production,
    Staging,
}

impl Deployment {
    fn parse(value: &str) -> Result<Self, MonitorError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Deployment::Production),
            "staging" | "" => Ok(Deployment::Staging),
            other => Err(MonitorError::config_err(format!("unknown DEPLOYMENT '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub deployment: Deployment,
    /// Optional when every chain source is simulated
    pub rpc_url: Option<String>,
    pub bean_subgraph_url: String,
    pub beanstalk_subgraph_url: String,
    pub channels_file: Option<PathBuf>,
    pub discord_webhooks: DiscordWebhooks,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id_production: String,
    pub telegram_chat_id_staging: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscordWebhooks {
    pub peg: Option<String>,
    pub seasons: Option<String>,
    pub pool: Option<String>,
    pub beanstalk: Option<String>,
    pub test: Option<String>,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(value: &Option<String>, name: &str) -> Result<String, MonitorError> {
    value
        .clone()
        .ok_or_else(|| MonitorError::config_err(format!("{} not set", name)))
}

pub fn load_config() -> Result<BotConfig> {
    dotenv::dotenv().ok();

    let deployment = Deployment::parse(&optional_var("DEPLOYMENT").unwrap_or_default())
        .context("Invalid DEPLOYMENT")?;

    Ok(BotConfig {
        deployment,
        rpc_url: optional_var("RPC_URL"),
        bean_subgraph_url: optional_var("BEAN_SUBGRAPH_URL")
            .unwrap_or_else(|| DEFAULT_BEAN_SUBGRAPH_URL.to_string()),
        beanstalk_subgraph_url: optional_var("BEANSTALK_SUBGRAPH_URL")
            .unwrap_or_else(|| DEFAULT_BEANSTALK_SUBGRAPH_URL.to_string()),
        channels_file: optional_var("CHANNELS_FILE").map(PathBuf::from),
        discord_webhooks: DiscordWebhooks {
            peg: optional_var("DISCORD_WEBHOOK_PEG"),
            seasons: optional_var("DISCORD_WEBHOOK_SEASONS"),
            pool: optional_var("DISCORD_WEBHOOK_POOL"),
            beanstalk: optional_var("DISCORD_WEBHOOK_BEANSTALK"),
            test: optional_var("DISCORD_WEBHOOK_TEST"),
        },
        telegram_bot_token: optional_var("TELEGRAM_BOT_TOKEN"),
        telegram_chat_id_production: optional_var("TELEGRAM_CHAT_ID_PRODUCTION")
            .unwrap_or_else(|| TELEGRAM_CHAT_ID_PRODUCTION.to_string()),
        telegram_chat_id_staging: optional_var("TELEGRAM_CHAT_ID_STAGING")
            .unwrap_or_else(|| TELEGRAM_CHAT_ID_STAGING.to_string()),
    })
}

impl BotConfig {
    pub fn is_production(&self) -> bool {
        self.deployment == Deployment::Production
    }

    pub fn rpc_url(&self) -> Result<&str> {
        Ok(self
            .rpc_url
            .as_deref()
            .ok_or_else(|| MonitorError::config_err("RPC_URL not set"))?)
    }

    /// Destinations for `transport`. A channels file takes precedence over
    /// environment variables.
    pub fn channel_map(&self, transport: TransportKind) -> Result<ChannelMap> {
        if let Some(path) = &self.channels_file {
            return ChannelMap::load(path, self.is_production());
        }

        let prod = self.is_production();
        let map = match transport {
            TransportKind::Stdout => ChannelMap {
                peg: "peg".into(),
                seasons: "seasons".into(),
                pool: "pool".into(),
                beanstalk: "beanstalk".into(),
            },
            TransportKind::Telegram if prod => ChannelMap::single(&self.telegram_chat_id_production),
            TransportKind::Telegram => ChannelMap::single(&self.telegram_chat_id_staging),
            TransportKind::Discord if prod => {
                let hooks = &self.discord_webhooks;
                ChannelMap {
                    peg: required(&hooks.peg, "DISCORD_WEBHOOK_PEG")?,
                    seasons: required(&hooks.seasons, "DISCORD_WEBHOOK_SEASONS")?,
                    pool: required(&hooks.pool, "DISCORD_WEBHOOK_POOL")?,
                    beanstalk: required(&hooks.beanstalk, "DISCORD_WEBHOOK_BEANSTALK")?,
                }
            }
            TransportKind::Discord => {
                ChannelMap::single(required(&self.discord_webhooks.test, "DISCORD_WEBHOOK_TEST")?)
            }
        };
        Ok(map)
    }
}
