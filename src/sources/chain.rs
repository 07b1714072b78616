//! Ethereum JSON-RPC client
//!
//! One `EthChainClient` watches one contract (the ETH:BEAN pair or the
//! Beanstalk diamond). Each call to `get_new_event_logs` scans the blocks
//! mined since the previous call, decodes the logs with the `sol!`
//! definitions and groups them by transaction.
//!
//! Created: 2026-10-18

use super::{group_by_transaction, ChainDataSource, TxLogs};
use crate::contracts::{IBeanstalk, IUniswapV2Pair};
use crate::error::MonitorError;
use crate::types::{EventKind, MethodSelector, RawEvent};
use alloy::consensus::Transaction as _;
use alloy::primitives::{address, Address, TxHash, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// ETH:BEAN Uniswap V2 pair (token0 = WETH, token1 = BEAN)
pub const ETH_BEAN_PAIR: Address = address!("87898263b6c5babe34b4ec53f22d98430b91e371");

/// ETH:USDC Uniswap V2 pair (token0 = USDC, token1 = WETH)
pub const ETH_USDC_PAIR: Address = address!("b4e16d0168e52d35cacd2c6185b44281ec28c9dc");

/// Beanstalk diamond
pub const BEANSTALK: Address = address!("c1e088fc1323b20bcbee9bd1b9fc9546db5624c5");

const ETH_DECIMALS: u32 = 18;
const LP_DECIMALS: u32 = 18;
const BEAN_DECIMALS: u32 = 6;
const USDC_DECIMALS: u32 = 6;

/// Used to turn a timestamp watermark into a starting block
const AVERAGE_BLOCK_TIME_SECS: u64 = 12;

/// Upper bound on blocks requested by a single eth_getLogs call
const MAX_BLOCK_RANGE: u64 = 2_000;

/// Contract whose logs a client follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Pool,
    Beanstalk,
}

impl EventSource {
    pub fn address(self) -> Address {
        match self {
            EventSource::Pool => ETH_BEAN_PAIR,
            EventSource::Beanstalk => BEANSTALK,
        }
    }

    /// topic0 of every event worth fetching
    fn signatures(self) -> Vec<B256> {
        match self {
            EventSource::Pool => vec![
                IUniswapV2Pair::Mint::SIGNATURE_HASH,
                IUniswapV2Pair::Burn::SIGNATURE_HASH,
                IUniswapV2Pair::Swap::SIGNATURE_HASH,
            ],
            EventSource::Beanstalk => vec![
                IBeanstalk::BeanDeposit::SIGNATURE_HASH,
                IBeanstalk::BeanRemove::SIGNATURE_HASH,
                IBeanstalk::BeanWithdraw::SIGNATURE_HASH,
                IBeanstalk::BeanClaim::SIGNATURE_HASH,
                IBeanstalk::LPDeposit::SIGNATURE_HASH,
                IBeanstalk::LPRemove::SIGNATURE_HASH,
                IBeanstalk::LPWithdraw::SIGNATURE_HASH,
                IBeanstalk::LPClaim::SIGNATURE_HASH,
                IBeanstalk::Sow::SIGNATURE_HASH,
            ],
        }
    }
}

/// Convert a raw token amount into whole-token units
pub fn scale_amount(amount: U256, decimals: u32) -> f64 {
    let raw = match u128::try_from(amount) {
        Ok(v) => v as f64,
        Err(_) => amount.to_string().parse::<f64>().unwrap_or(f64::MAX),
    };
    raw / 10f64.powi(decimals as i32)
}

fn eth(amount: U256) -> f64 {
    scale_amount(amount, ETH_DECIMALS)
}

fn beans(amount: U256) -> f64 {
    scale_amount(amount, BEAN_DECIMALS)
}

fn lp(amount: U256) -> f64 {
    scale_amount(amount, LP_DECIMALS)
}

/// Decode a log into an `EventKind`. Unknown or malformed logs become `Other`.
pub fn decode_event_kind(source: EventSource, log: &Log) -> EventKind {
    let Some(topic0) = log.topic0().copied() else {
        return EventKind::Other { name: "anonymous".to_string() };
    };

    let decoded = match source {
        EventSource::Pool => decode_pool_log(topic0, log),
        EventSource::Beanstalk => decode_beanstalk_log(topic0, log),
    };
    match decoded {
        Ok(Some(kind)) => kind,
        Ok(None) => EventKind::Other { name: format!("{}", topic0) },
        Err(e) => {
            warn!("Failed to decode log {} from {:?}: {}", topic0, source, e);
            EventKind::Other { name: format!("{}", topic0) }
        }
    }
}

fn decode_pool_log(topic0: B256, log: &Log) -> alloy::sol_types::Result<Option<EventKind>> {
    let kind = if topic0 == IUniswapV2Pair::Mint::SIGNATURE_HASH {
        let e = log.log_decode::<IUniswapV2Pair::Mint>()?.inner.data;
        EventKind::Mint { eth: eth(e.amount0), beans: beans(e.amount1) }
    } else if topic0 == IUniswapV2Pair::Burn::SIGNATURE_HASH {
        let e = log.log_decode::<IUniswapV2Pair::Burn>()?.inner.data;
        EventKind::Burn { eth: eth(e.amount0), beans: beans(e.amount1) }
    } else if topic0 == IUniswapV2Pair::Swap::SIGNATURE_HASH {
        let e = log.log_decode::<IUniswapV2Pair::Swap>()?.inner.data;
        EventKind::Swap {
            eth_in: eth(e.amount0In),
            eth_out: eth(e.amount0Out),
            bean_in: beans(e.amount1In),
            bean_out: beans(e.amount1Out),
        }
    } else {
        return Ok(None);
    };
    Ok(Some(kind))
}

fn decode_beanstalk_log(topic0: B256, log: &Log) -> alloy::sol_types::Result<Option<EventKind>> {
    use IBeanstalk::*;

    let kind = match topic0 {
        t if t == BeanDeposit::SIGNATURE_HASH => {
            EventKind::BeanDeposit { beans: beans(log.log_decode::<BeanDeposit>()?.inner.data.beans) }
        }
        t if t == BeanRemove::SIGNATURE_HASH => {
            EventKind::BeanRemove { beans: beans(log.log_decode::<BeanRemove>()?.inner.data.beans) }
        }
        t if t == BeanWithdraw::SIGNATURE_HASH => {
            EventKind::BeanWithdraw { beans: beans(log.log_decode::<BeanWithdraw>()?.inner.data.beans) }
        }
        t if t == BeanClaim::SIGNATURE_HASH => {
            EventKind::BeanClaim { beans: beans(log.log_decode::<BeanClaim>()?.inner.data.beans) }
        }
        t if t == LPDeposit::SIGNATURE_HASH => {
            EventKind::LpDeposit { lp: lp(log.log_decode::<LPDeposit>()?.inner.data.lp) }
        }
        t if t == LPRemove::SIGNATURE_HASH => {
            EventKind::LpRemove { lp: lp(log.log_decode::<LPRemove>()?.inner.data.lp) }
        }
        t if t == LPWithdraw::SIGNATURE_HASH => {
            EventKind::LpWithdraw { lp: lp(log.log_decode::<LPWithdraw>()?.inner.data.lp) }
        }
        t if t == LPClaim::SIGNATURE_HASH => {
            EventKind::LpClaim { lp: lp(log.log_decode::<LPClaim>()?.inner.data.lp) }
        }
        t if t == Sow::SIGNATURE_HASH => {
            let e = log.log_decode::<Sow>()?.inner.data;
            // Pods share the Bean decimals
            EventKind::Sow { beans: beans(e.beans), pods: beans(e.pods) }
        }
        _ => return Ok(None),
    };
    Ok(Some(kind))
}

/// Group decoded logs by transaction in (block, log index) order
pub fn group_logs(source: EventSource, logs: &[Log]) -> TxLogs {
    let mut ordered: Vec<&Log> = logs.iter().collect();
    ordered.sort_by_key(|log| (log.block_number, log.log_index));

    group_by_transaction(ordered.into_iter().filter_map(|log| {
        let Some(tx_hash) = log.transaction_hash else {
            debug!("Skipping pending log without a transaction hash");
            return None;
        };
        Some(RawEvent {
            kind: decode_event_kind(source, log),
            tx_hash,
            log_index: log.log_index.unwrap_or_default(),
            timestamp: log.block_timestamp,
        })
    }))
}

/// alloy-backed chain source for one contract
pub struct EthChainClient {
    provider: DynProvider,
    source: EventSource,
    /// Last block whose logs were already returned
    last_block: Mutex<Option<u64>>,
}

impl EthChainClient {
    pub fn connect(rpc_url: &str, source: EventSource) -> Result<Self> {
        let url = rpc_url.parse().context("Invalid RPC URL")?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        info!("{:?} event client following {}", source, source.address());
        Ok(Self {
            provider,
            source,
            last_block: Mutex::new(None),
        })
    }

    async fn pair_reserves(&self, pair: Address) -> Result<(u128, u128)> {
        let contract = IUniswapV2Pair::new(pair, self.provider.clone());
        let reserves = contract
            .getReserves()
            .call()
            .await
            .with_context(|| format!("Failed to get reserves of {}", pair))?;
        Ok((reserves.reserve0.to::<u128>(), reserves.reserve1.to::<u128>()))
    }
}

#[async_trait]
impl ChainDataSource for EthChainClient {
    async fn get_new_event_logs(&self, since_timestamp: u64) -> Result<TxLogs> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .context("Failed to get block number")?;

        let mut last_block = self.last_block.lock().await;
        let from_block = match *last_block {
            Some(last) => last + 1,
            None => {
                let now = chrono::Utc::now().timestamp().max(0) as u64;
                let behind = now.saturating_sub(since_timestamp) / AVERAGE_BLOCK_TIME_SECS;
                latest.saturating_sub(behind.min(MAX_BLOCK_RANGE))
            }
        };
        if from_block > latest {
            return Ok(TxLogs::new());
        }
        let to_block = latest.min(from_block + MAX_BLOCK_RANGE - 1);

        let filter = Filter::new()
            .address(self.source.address())
            .event_signature(self.source.signatures())
            .from_block(from_block)
            .to_block(to_block);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| MonitorError::source_err(e.to_string()))
            .with_context(|| format!("Failed to get logs for blocks {}-{}", from_block, to_block))?;
        *last_block = Some(to_block);

        debug!(
            "{:?}: {} logs in blocks {}-{}",
            self.source,
            logs.len(),
            from_block,
            to_block
        );
        Ok(group_logs(self.source, &logs))
    }

    async fn get_transaction_call_prefix(&self, tx_hash: TxHash) -> Result<Option<MethodSelector>> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .with_context(|| format!("Failed to get transaction {}", tx_hash))?
            .ok_or_else(|| MonitorError::source_err(format!("transaction {} not found", tx_hash)))?;
        Ok(MethodSelector::from_calldata(tx.input()))
    }

    async fn current_prices(&self) -> Result<(f64, f64)> {
        let (usdc, weth) = self.pair_reserves(ETH_USDC_PAIR).await?;
        let eth_price = scale_amount(U256::from(usdc), USDC_DECIMALS) / eth(U256::from(weth));

        let (pool_weth, pool_beans) = self.pair_reserves(ETH_BEAN_PAIR).await?;
        let bean_price = eth(U256::from(pool_weth)) / beans(U256::from(pool_beans)) * eth_price;

        if !(eth_price.is_finite() && bean_price.is_finite()) {
            return Err(MonitorError::source_err("pool reserves are empty").into());
        }
        Ok((eth_price, bean_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData};

    fn rpc_log(topics: Vec<B256>, data: Vec<u8>, tx: u8, index: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: ETH_BEAN_PAIR,
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            transaction_hash: Some(TxHash::with_last_byte(tx)),
            log_index: Some(index),
            ..Default::default()
        }
    }

    fn words(values: &[U256]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes::<32>()).collect()
    }

    #[test]
    fn test_scale_amount() {
        assert_eq!(scale_amount(U256::from(1_500_000u64), 6), 1.5);
        assert_eq!(scale_amount(U256::from(10u64).pow(U256::from(18)), 18), 1.0);
        assert!(scale_amount(U256::MAX, 18) > 1e50);
    }

    #[test]
    fn test_decode_swap() {
        let sender = B256::left_padding_from(&[1]);
        let to = B256::left_padding_from(&[2]);
        let data = words(&[
            U256::from(2u64) * U256::from(10u64).pow(U256::from(18)),
            U256::ZERO,
            U256::ZERO,
            U256::from(8_000_000_000u64),
        ]);
        let log = rpc_log(vec![IUniswapV2Pair::Swap::SIGNATURE_HASH, sender, to], data, 1, 3);
        assert_eq!(
            decode_event_kind(EventSource::Pool, &log),
            EventKind::Swap { eth_in: 2.0, eth_out: 0.0, bean_in: 0.0, bean_out: 8_000.0 }
        );
    }

    #[test]
    fn test_unknown_topic_is_other() {
        let log = rpc_log(vec![B256::repeat_byte(0xab)], vec![], 1, 0);
        assert!(matches!(
            decode_event_kind(EventSource::Beanstalk, &log),
            EventKind::Other { .. }
        ));
    }

    #[test]
    fn test_group_logs_by_transaction() {
        let account = B256::left_padding_from(&[9]);
        let deposit = |season: u64, amount: u64| words(&[U256::from(season), U256::from(amount)]);
        let logs = vec![
            rpc_log(vec![IBeanstalk::BeanDeposit::SIGNATURE_HASH, account], deposit(1, 5_000_000), 1, 7),
            rpc_log(vec![IBeanstalk::BeanDeposit::SIGNATURE_HASH, account], deposit(1, 1_000_000), 2, 2),
            rpc_log(vec![IBeanstalk::BeanDeposit::SIGNATURE_HASH, account], deposit(1, 3_000_000), 1, 4),
        ];
        let grouped = group_logs(EventSource::Beanstalk, &logs);
        assert_eq!(grouped.len(), 2);

        let (hash, first) = &grouped[1];
        assert_eq!(*hash, TxHash::with_last_byte(1));
        assert_eq!(first.iter().map(|e| e.log_index).collect::<Vec<_>>(), vec![4, 7]);
        assert_eq!(first[0].kind, EventKind::BeanDeposit { beans: 3.0 });
    }

    #[test]
    fn test_group_logs_follows_blocks_not_hashes() {
        let mint = words(&[U256::from(10u64).pow(U256::from(18)), U256::from(4_000_000_000u64)]);
        let sender = B256::left_padding_from(&[1]);
        let mut late = rpc_log(vec![IUniswapV2Pair::Burn::SIGNATURE_HASH, sender, sender], mint.clone(), 0x01, 9);
        late.block_number = Some(101);
        let mut early = rpc_log(vec![IUniswapV2Pair::Mint::SIGNATURE_HASH, sender], mint, 0xff, 1);
        early.block_number = Some(100);

        let grouped = group_logs(EventSource::Pool, &[late, early]);
        let hashes: Vec<_> = grouped.iter().map(|(hash, _)| *hash).collect();
        assert_eq!(hashes, vec![TxHash::with_last_byte(0xff), TxHash::with_last_byte(0x01)]);
        assert!(matches!(grouped[0].1[0].kind, EventKind::Mint { .. }));
    }
}
