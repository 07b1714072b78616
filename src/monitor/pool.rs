//! ETH:BEAN pool monitor
//!
//! Reports swaps and liquidity changes on the Uniswap V2 pair. Silo
//! conversions also touch the pool; those are left to the Beanstalk monitor.

use super::{publish_action, unix_now, Monitor, MonitorOptions, PollBody, PollContext};
use crate::classifier::{classify_pool_group, PricingContext};
use crate::sink::NotificationSink;
use crate::sources::{ChainDataSource, TxLogs};
use crate::types::{Channel, MonitorState, TransactionEventGroup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const POOL_CHECK_PERIOD: Duration = Duration::from_secs(10);

pub struct PoolMonitor {
    chain: Arc<dyn ChainDataSource>,
    sink: Arc<dyn NotificationSink>,
    last_check_time: u64,
    /// Fetched transactions not yet published, finished before the next fetch
    pending: TxLogs,
}

impl PoolMonitor {
    pub fn new(chain: Arc<dyn ChainDataSource>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            chain,
            sink,
            last_check_time: unix_now(),
            pending: TxLogs::new(),
        }
    }

    pub fn into_monitor(self, options: MonitorOptions) -> Monitor {
        let sink = Arc::clone(&self.sink);
        Monitor::new("pool", Channel::Pool, POOL_CHECK_PERIOD, Box::new(self), sink, options)
    }
}

#[async_trait]
impl PollBody for PoolMonitor {
    async fn poll(&mut self, _ctx: &PollContext) -> Result<()> {
        if self.pending.is_empty() {
            let check_time = unix_now();
            self.pending = self
                .chain
                .get_new_event_logs(self.last_check_time)
                .await
                .context("Failed to get new pool logs")?;
            self.last_check_time = check_time;
        } else {
            info!("Resuming pool batch with {} unreported txns", self.pending.len());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        let (eth_price, bean_price) = self
            .chain
            .current_prices()
            .await
            .context("Failed to get current prices")?;
        let pricing = PricingContext {
            eth_price,
            bean_price,
            ..Default::default()
        };
        debug!("Pool batch of {} txns (ETH ${:.2}, BEAN ${:.4})", self.pending.len(), eth_price, bean_price);

        // A transaction leaves `pending` only once it has been published
        while let Some(tx_hash) = self.pending.first().map(|(hash, _)| *hash) {
            let selector = self
                .chain
                .get_transaction_call_prefix(tx_hash)
                .await
                .with_context(|| format!("Failed to get method of {}", tx_hash))?;
            let (_, events) = self.pending.remove(0);
            let group = TransactionEventGroup::new(tx_hash, selector, events);
            for action in classify_pool_group(&group, &pricing) {
                publish_action(self.sink.as_ref(), Channel::Pool, action);
            }
        }
        Ok(())
    }

    fn cursor(&self) -> Option<MonitorState> {
        Some(MonitorState::LastCheckTime {
            timestamp: self.last_check_time,
        })
    }
}
