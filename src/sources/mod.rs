//! Data sources the monitors poll
//!
//! Monitors only depend on the two traits below. Concrete clients:
//! - chain.rs      - alloy JSON-RPC client for pool and Beanstalk logs
//! - graph.rs      - GraphQL client for the bean and beanstalk subgraphs
//! - simulated.rs  - deterministic fake pool activity for dry runs
//!
//! Created: 2026-10-18

pub mod chain;
pub mod graph;
pub mod simulated;

pub use chain::{EthChainClient, EventSource};
pub use graph::SubgraphClient;
pub use simulated::SimulatedChainSource;

use crate::types::{CrossRecord, MethodSelector, PoolReserves, RawEvent, SeasonStats};
use alloy::primitives::TxHash;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Logs of new transactions in chain order. Each vector is in log order.
pub type TxLogs = Vec<(TxHash, Vec<RawEvent>)>;

/// Group events by transaction. Transactions keep the position of their
/// first event; events within a transaction are sorted by log index.
pub fn group_by_transaction(events: impl IntoIterator<Item = RawEvent>) -> TxLogs {
    let mut grouped = TxLogs::new();
    let mut positions: HashMap<TxHash, usize> = HashMap::new();
    for event in events {
        match positions.get(&event.tx_hash) {
            Some(&i) => grouped[i].1.push(event),
            None => {
                positions.insert(event.tx_hash, grouped.len());
                grouped.push((event.tx_hash, vec![event]));
            }
        }
    }
    for (_, events) in grouped.iter_mut() {
        events.sort_by_key(|e| e.log_index);
    }
    grouped
}

/// Blockchain access needed by the transaction monitors
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Logs emitted since the last call (or since `since_timestamp` on the first)
    async fn get_new_event_logs(&self, since_timestamp: u64) -> Result<TxLogs>;

    /// Method selector of the transaction, `None` when it carries no call data
    async fn get_transaction_call_prefix(&self, tx_hash: TxHash) -> Result<Option<MethodSelector>>;

    /// Current USD prices as `(eth_price, bean_price)`
    async fn current_prices(&self) -> Result<(f64, f64)>;
}

/// Subgraph access needed by the peg and season monitors
#[async_trait]
pub trait GraphDataSource: Send + Sync {
    /// Most recent peg cross
    async fn latest_cross(&self) -> Result<CrossRecord>;

    /// The `count` crosses following `id`, oldest first
    async fn crosses_since(&self, id: u64, count: u64) -> Result<Vec<CrossRecord>>;

    async fn current_season_stats(&self) -> Result<SeasonStats>;

    async fn previous_season_stats(&self) -> Result<SeasonStats>;

    /// `(current, previous)` season stats from a single query
    async fn seasons_stats(&self) -> Result<(SeasonStats, SeasonStats)> {
        let current = self.current_season_stats().await?;
        let previous = self.previous_season_stats().await?;
        Ok((current, previous))
    }

    async fn pool_reserves(&self) -> Result<PoolReserves> {
        Ok(self.current_season_stats().await?.reserves())
    }
}
