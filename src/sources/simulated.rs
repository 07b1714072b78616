//! Simulated chain data for `--dry-run`
//!
//! Produces one deterministic fake transaction per poll so the whole
//! classify → publish → deliver path can be exercised without an RPC node.

use super::{ChainDataSource, EventSource, TxLogs};
use crate::types::{EventKind, MethodSelector, RawEvent};
use alloy::primitives::{TxHash, B256};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

const SIMULATED_ETH_PRICE: f64 = 3_200.0;
const SIMULATED_BEAN_PRICE: f64 = 1.02;

pub struct SimulatedChainSource {
    source: EventSource,
    sequence: AtomicU64,
}

impl SimulatedChainSource {
    pub fn new(source: EventSource) -> Self {
        Self {
            source,
            sequence: AtomicU64::new(0),
        }
    }

    fn event_for(&self, n: u64) -> EventKind {
        // Sizes walk through the fish/shark/whale tiers
        let beans = 500.0 * (1 + n % 7).pow(3) as f64;
        let eth = beans * SIMULATED_BEAN_PRICE / SIMULATED_ETH_PRICE;
        match (self.source, n % 4) {
            (EventSource::Pool, 0) => EventKind::Swap { eth_in: eth, eth_out: 0.0, bean_in: 0.0, bean_out: beans },
            (EventSource::Pool, 1) => EventKind::Swap { eth_in: 0.0, eth_out: eth, bean_in: beans, bean_out: 0.0 },
            (EventSource::Pool, 2) => EventKind::Mint { eth, beans },
            (EventSource::Pool, _) => EventKind::Burn { eth, beans },
            (EventSource::Beanstalk, 0) => EventKind::BeanDeposit { beans },
            (EventSource::Beanstalk, 1) => EventKind::Sow { beans, pods: beans * 3.5 },
            (EventSource::Beanstalk, 2) => EventKind::BeanWithdraw { beans },
            (EventSource::Beanstalk, _) => EventKind::BeanClaim { beans },
        }
    }
}

#[async_trait]
impl ChainDataSource for SimulatedChainSource {
    async fn get_new_event_logs(&self, since_timestamp: u64) -> Result<TxLogs> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let tx_hash = B256::left_padding_from(&(n + 1).to_be_bytes());
        let event = RawEvent {
            kind: self.event_for(n),
            tx_hash,
            log_index: 0,
            timestamp: Some(since_timestamp),
        };
        Ok(vec![(tx_hash, vec![event])])
    }

    async fn get_transaction_call_prefix(&self, _tx_hash: TxHash) -> Result<Option<MethodSelector>> {
        Ok(None)
    }

    async fn current_prices(&self) -> Result<(f64, f64)> {
        Ok((SIMULATED_ETH_PRICE, SIMULATED_BEAN_PRICE))
    }
}
