//! Beanstalk monitor
//!
//! Reports silo deposits, withdrawals, claims and conversions, and field
//! sows. LP amounts are valued through the pool ratios reported by the
//! beanstalk subgraph; Sow text includes the current weather.

use super::{publish_action, unix_now, Monitor, MonitorOptions, PollBody, PollContext};
use crate::classifier::{classify_beanstalk_group, PricingContext};
use crate::sink::NotificationSink;
use crate::sources::{ChainDataSource, GraphDataSource, TxLogs};
use crate::types::{Channel, MonitorState, TransactionEventGroup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BEANSTALK_CHECK_PERIOD: Duration = Duration::from_secs(10);

pub struct BeanstalkMonitor {
    chain: Arc<dyn ChainDataSource>,
    graph: Arc<dyn GraphDataSource>,
    sink: Arc<dyn NotificationSink>,
    last_check_time: u64,
    /// Fetched transactions not yet published, finished before the next fetch
    pending: TxLogs,
}

impl BeanstalkMonitor {
    pub fn new(
        chain: Arc<dyn ChainDataSource>,
        graph: Arc<dyn GraphDataSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            chain,
            graph,
            sink,
            last_check_time: unix_now(),
            pending: TxLogs::new(),
        }
    }

    pub fn into_monitor(self, options: MonitorOptions) -> Monitor {
        let sink = Arc::clone(&self.sink);
        Monitor::new(
            "beanstalk",
            Channel::Beanstalk,
            BEANSTALK_CHECK_PERIOD,
            Box::new(self),
            sink,
            options,
        )
    }

    /// Prices, pool reserves and weather for one batch.
    ///
    /// Missing subgraph data only disables LP valuation and the weather line.
    async fn pricing_context(&self) -> Result<PricingContext> {
        let (eth_price, bean_price) = self
            .chain
            .current_prices()
            .await
            .context("Failed to get current prices")?;
        let (reserves, weather) = match self.graph.current_season_stats().await {
            Ok(stats) => (Some(stats.reserves()), Some(stats.weather)),
            Err(e) => {
                warn!("Season stats unavailable, LP values will be skipped: {:#}", e);
                (None, None)
            }
        };
        Ok(PricingContext {
            eth_price,
            bean_price,
            reserves,
            weather,
        })
    }
}

#[async_trait]
impl PollBody for BeanstalkMonitor {
    async fn poll(&mut self, _ctx: &PollContext) -> Result<()> {
        if self.pending.is_empty() {
            let check_time = unix_now();
            self.pending = self
                .chain
                .get_new_event_logs(self.last_check_time)
                .await
                .context("Failed to get new Beanstalk logs")?;
            self.last_check_time = check_time;
        } else {
            info!("Resuming Beanstalk batch with {} unreported txns", self.pending.len());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        let pricing = self.pricing_context().await?;
        debug!("Beanstalk batch of {} txns", self.pending.len());

        while let Some(tx_hash) = self.pending.first().map(|(hash, _)| *hash) {
            let selector = self
                .chain
                .get_transaction_call_prefix(tx_hash)
                .await
                .with_context(|| format!("Failed to get method of {}", tx_hash))?;
            let (_, events) = self.pending.remove(0);
            let group = TransactionEventGroup::new(tx_hash, selector, events);
            for action in classify_beanstalk_group(group, &pricing) {
                publish_action(self.sink.as_ref(), Channel::Beanstalk, action);
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
