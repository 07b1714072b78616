//! Core data structures shared by monitors, sources and the classifier
//!
//! Amounts carried by `RawEvent` are already scaled to whole-token units
//! (ETH and LP: 18 decimals, BEAN: 6 decimals).
//!
//! Created: 2026-10-18

use alloy::primitives::TxHash;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Destination a notification is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Peg,
    Seasons,
    Pool,
    Beanstalk,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Peg, Channel::Seasons, Channel::Pool, Channel::Beanstalk];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Channel::Peg => write!(f, "peg"),
            Channel::Seasons => write!(f, "seasons"),
            Channel::Pool => write!(f, "pool"),
            Channel::Beanstalk => write!(f, "beanstalk"),
        }
    }
}

/// Direction of a peg cross
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PegCrossType {
    CrossAbove,
    CrossBelow,
}

impl PegCrossType {
    pub fn from_above(above: bool) -> Self {
        if above {
            PegCrossType::CrossAbove
        } else {
            PegCrossType::CrossBelow
        }
    }
}

/// A single peg cross as recorded by the bean subgraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossRecord {
    pub id: u64,
    pub timestamp: u64,
    pub above: bool,
}

/// Liquidity held by the ETH:BEAN pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolReserves {
    pub total_lp: f64,
    pub pooled_eth: f64,
    pub pooled_beans: f64,
}

/// Season statistics as reported by the beanstalk subgraph
///
/// The subgraph encodes every BigInt/BigDecimal as a string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStats {
    #[serde(deserialize_with = "de_u64")]
    pub id: u64,
    #[serde(deserialize_with = "de_u64")]
    pub timestamp: u64,
    #[serde(deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(deserialize_with = "de_f64")]
    pub weather: f64,
    #[serde(deserialize_with = "de_f64")]
    pub new_farmable_beans: f64,
    #[serde(deserialize_with = "de_f64")]
    pub new_harvestable_pods: f64,
    #[serde(deserialize_with = "de_f64")]
    pub new_deposited_beans: f64,
    #[serde(deserialize_with = "de_f64")]
    pub new_withdrawn_beans: f64,
    #[serde(rename = "newDepositedLP", deserialize_with = "de_f64")]
    pub new_deposited_lp: f64,
    #[serde(rename = "newWithdrawnLP", deserialize_with = "de_f64")]
    pub new_withdrawn_lp: f64,
    #[serde(deserialize_with = "de_f64")]
    pub new_pods: f64,
    #[serde(deserialize_with = "de_f64")]
    pub pooled_eth: f64,
    #[serde(deserialize_with = "de_f64")]
    pub pooled_beans: f64,
    #[serde(deserialize_with = "de_f64")]
    pub lp: f64,
}

impl SeasonStats {
    /// Pool reserves captured alongside this season
    pub fn reserves(&self) -> PoolReserves {
        PoolReserves {
            total_lp: self.lp,
            pooled_eth: self.pooled_eth,
            pooled_beans: self.pooled_beans,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

fn number_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Text(s) => s,
    })
}

pub(crate) fn de_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let text = number_text(deserializer)?;
    text.trim().parse::<f64>().map_err(serde::de::Error::custom)
}

pub(crate) fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let text = number_text(deserializer)?;
    text.trim().parse::<u64>().map_err(serde::de::Error::custom)
}

/// 4-byte function selector taken from transaction call data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSelector(pub [u8; 4]);

impl MethodSelector {
    /// Selector of the given call data, `None` for plain transfers
    pub fn from_calldata(input: &[u8]) -> Option<Self> {
        let selector: [u8; 4] = input.get(..4)?.try_into().ok()?;
        Some(Self(selector))
    }

    pub fn matches_any(&self, selectors: &[[u8; 4]]) -> bool {
        selectors.iter().any(|s| *s == self.0)
    }
}

impl fmt::Display for MethodSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "0x{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Kind of an on-chain event together with its decoded amounts
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    // ETH:BEAN pair (token0 = WETH, token1 = BEAN)
    Mint { eth: f64, beans: f64 },
    Burn { eth: f64, beans: f64 },
    Swap { eth_in: f64, eth_out: f64, bean_in: f64, bean_out: f64 },
    // Beanstalk silo
    BeanDeposit { beans: f64 },
    BeanWithdraw { beans: f64 },
    BeanClaim { beans: f64 },
    BeanRemove { beans: f64 },
    LpDeposit { lp: f64 },
    LpWithdraw { lp: f64 },
    LpClaim { lp: f64 },
    LpRemove { lp: f64 },
    // Beanstalk field
    Sow { beans: f64, pods: f64 },
    /// Anything the decoder does not know how to interpret
    Other { name: String },
}

impl EventKind {
    pub fn name(&self) -> &str {
        match self {
            EventKind::Mint { .. } => "Mint",
            EventKind::Burn { .. } => "Burn",
            EventKind::Swap { .. } => "Swap",
            EventKind::BeanDeposit { .. } => "BeanDeposit",
            EventKind::BeanWithdraw { .. } => "BeanWithdraw",
            EventKind::BeanClaim { .. } => "BeanClaim",
            EventKind::BeanRemove { .. } => "BeanRemove",
            EventKind::LpDeposit { .. } => "LPDeposit",
            EventKind::LpWithdraw { .. } => "LPWithdraw",
            EventKind::LpClaim { .. } => "LPClaim",
            EventKind::LpRemove { .. } => "LPRemove",
            EventKind::Sow { .. } => "Sow",
            EventKind::Other { name } => name,
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, EventKind::Swap { .. })
    }
}

/// A decoded event log
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub tx_hash: TxHash,
    /// Position of the log within its block
    pub log_index: u64,
    pub timestamp: Option<u64>,
}

/// Every log emitted by one transaction, plus the method it invoked
#[derive(Debug, Clone)]
pub struct TransactionEventGroup {
    pub tx_hash: TxHash,
    pub selector: Option<MethodSelector>,
    events: Vec<RawEvent>,
}

impl TransactionEventGroup {
    /// Build a group, ordering events by log index
    pub fn new(tx_hash: TxHash, selector: Option<MethodSelector>, mut events: Vec<RawEvent>) -> Self {
        events.sort_by_key(|e| e.log_index);
        Self {
            tx_hash,
            selector,
            events,
        }
    }

    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove all events matching `pred`, returning them in log order
    pub fn take_where<F: Fn(&RawEvent) -> bool>(&mut self, pred: F) -> Vec<RawEvent> {
        let (taken, kept): (Vec<RawEvent>, Vec<RawEvent>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| pred(e));
        self.events = kept;
        taken
    }

    /// Put an event back into the group at its log position
    pub fn reattach(&mut self, event: RawEvent) {
        let pos = self
            .events
            .partition_point(|e| e.log_index <= event.log_index);
        self.events.insert(pos, event);
    }

    pub fn selector_matches(&self, selectors: &[[u8; 4]]) -> bool {
        self.selector
            .map(|s| s.matches_any(selectors))
            .unwrap_or(false)
    }
}

/// Asset a silo action is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Beans,
    Lp,
}

/// Economic meaning assigned to a notification
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    PegCross(PegCrossType),
    SeasonSummary { season: u64 },
    LiquidityAdd,
    LiquidityRemove,
    Swap { buy: bool },
    Deposit(Asset),
    Withdraw(Asset),
    Claim(Asset),
    Sow,
    SiloConversion { from: Asset, to: Asset },
}

/// A classified action and the notification text rendered for it
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedAction {
    pub kind: ActionKind,
    pub text: String,
}

impl ClassifiedAction {
    pub fn new(kind: ActionKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Per-monitor cursor used to detect "new since last check"
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorState {
    LastCross { timestamp: u64, id: u64 },
    LastSeasonId { id: u64 },
    LastCheckTime { timestamp: u64 },
}
