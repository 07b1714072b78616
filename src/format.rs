//! Formatting helpers for notification text
//!
//! Pure functions only: number rendering, dollar-value emoji tiers,
//! LP → underlying conversion and swap pricing.
//!
//! Created: 2026-10-18

use crate::error::MonitorError;
use crate::sources::GraphDataSource;
use crate::types::PoolReserves;
use alloy::primitives::TxHash;
use anyhow::{Context, Result};

/// Line that renders empty but survives whitespace trimming by chat services
pub const BLANK_LINE: &str = "_ _";

/// Block explorer used for transaction links
pub const EXPLORER_TX_URL: &str = "https://etherscan.io/tx/";

const FISH: &str = "🐟";
const SHARK: &str = "🦈";
const WHALE: &str = "🐳";

/// Render a number with fixed precision and thousands separators.
///
/// `round_num(1234567.891, 2)` → `"1,234,567.89"`
pub fn round_num(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, value);
    let (sign, digits) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (digits, None),
    };

    let mut out = String::with_capacity(formatted.len() + int_part.len() / 3);
    out.push_str(sign);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 && ch.is_ascii_digit() {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Round a non-negative integer to a multiple of `unit`, ties to even
fn round_half_even(value: i64, unit: i64) -> i64 {
    let quotient = value / unit;
    let remainder = value % unit;
    let rounded = match (2 * remainder).cmp(&unit) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    };
    rounded * unit
}

/// Emoji symbol, symbol count and rounded value for a dollar amount.
/// `None` for negative or non-finite values.
fn emoji_tier(value: f64) -> Option<(&'static str, usize, i64)> {
    if !value.is_finite() {
        return None;
    }
    let value = value.trunc() as i64;
    if value < 0 {
        return None;
    }

    let value = round_half_even(value, 1_000);
    if value < 10_000 {
        return Some((FISH, ((value / 1_000) as usize).max(1), value));
    }
    let value = round_half_even(value, 10_000);
    if value < 100_000 {
        return Some((SHARK, (value / 10_000) as usize, value));
    }
    let value = round_half_even(value, 100_000);
    Some((WHALE, (value / 100_000) as usize, value))
}

/// Convert a dollar value into a saturating row of emojis.
///
/// Thousands are fish, ten-thousands sharks, hundred-thousands whales.
/// Rounding happens before each tier comparison so output is deterministic.
pub fn value_to_emojis(value: f64) -> String {
    match emoji_tier(value) {
        Some((symbol, count, _)) => symbol.repeat(count),
        None => String::new(),
    }
}

/// Amount of ETH and Beans equivalent to `lp` tokens at current pool ratios.
///
/// Returns `(eth, beans)`.
pub fn lp_eq_values(lp: f64, reserves: Option<&PoolReserves>) -> Result<(f64, f64), MonitorError> {
    let reserves = reserves.ok_or_else(|| {
        MonitorError::config_err("must provide pool reserves (total_lp, pooled_eth, pooled_beans)")
    })?;
    if !(reserves.total_lp > 0.0) {
        return Err(MonitorError::config_err(format!(
            "total LP supply must be positive (got {})",
            reserves.total_lp
        )));
    }

    let eth_pool_ratio = reserves.pooled_eth / reserves.total_lp;
    let bean_pool_ratio = reserves.pooled_beans / reserves.total_lp;
    Ok((lp * eth_pool_ratio, lp * bean_pool_ratio))
}

/// Same as [`lp_eq_values`], pulling the latest reserves from the subgraph
pub async fn lp_eq_values_from_source<G>(lp: f64, graph: &G) -> Result<(f64, f64)>
where
    G: GraphDataSource + ?Sized,
{
    let reserves = graph
        .pool_reserves()
        .await
        .context("Failed to fetch pool reserves")?;
    Ok(lp_eq_values(lp, Some(&reserves))?)
}

/// Average USD price paid per Bean in a swap
pub fn avg_swap_price(eth_amount: f64, bean_amount: f64, eth_price: f64) -> f64 {
    if bean_amount == 0.0 {
        return 0.0;
    }
    eth_amount * eth_price / bean_amount
}

/// Explorer link wrapped in `<>` so Discord does not render a preview
pub fn tx_link(tx_hash: &TxHash) -> String {
    format!("<{}{}>", EXPLORER_TX_URL, alloy::hex::encode_prefixed(tx_hash))
}

/// Append the explorer link and trailing blank line to a notification body
pub fn finish_notification(mut body: String, tx_hash: &TxHash) -> String {
    body.push('\n');
    body.push_str(&tx_link(tx_hash));
    body.push('\n');
    body.push_str(BLANK_LINE);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_num() {
        assert_eq!(round_num(1234567.891, 2), "1,234,567.89");
        assert_eq!(round_num(999.999, 2), "1,000.00");
        assert_eq!(round_num(0.5, 0), "0");
        assert_eq!(round_num(-1234.5, 1), "-1,234.5");
        assert_eq!(round_num(12.0, 4), "12.0000");
        assert_eq!(round_num(123456.0, 0), "123,456");
    }

    #[test]
    fn test_value_to_emojis_tiers() {
        assert_eq!(value_to_emojis(-5.0), "");
        assert_eq!(value_to_emojis(0.0), "🐟");
        assert_eq!(value_to_emojis(499.0), "🐟");
        assert_eq!(value_to_emojis(2_600.0), "🐟🐟🐟");
        assert_eq!(value_to_emojis(9_499.0), "🐟".repeat(9));
        // 9,500 rounds half-to-even up to 10,000 before the tier check
        assert_eq!(value_to_emojis(9_500.0), "🦈");
        assert_eq!(value_to_emojis(2_500.0), "🐟🐟");
        assert_eq!(value_to_emojis(15_000.0), "🦈🦈");
        assert_eq!(value_to_emojis(25_000.0), "🦈🦈");
        assert_eq!(value_to_emojis(95_000.0), "🐳");
        assert_eq!(value_to_emojis(1_260_000.0), "🐳".repeat(13));
        assert_eq!(value_to_emojis(f64::NAN), "");
    }

    #[test]
    fn test_value_to_emojis_monotonic() {
        let mut last = 0i64;
        let mut value = 0.0;
        while value < 2_000_000.0 {
            let (_, _, rounded) = emoji_tier(value).unwrap();
            assert!(rounded >= last, "tier dropped at {}", value);
            last = rounded;
            value += 137.0;
        }
    }

    #[test]
    fn test_value_to_emojis_idempotent() {
        for value in [0.0, 999.0, 9_499.0, 9_500.0, 10_500.0, 14_999.0, 95_000.0, 149_999.0, 250_000.0] {
            let (_, _, rounded) = emoji_tier(value).unwrap();
            assert_eq!(value_to_emojis(rounded as f64), value_to_emojis(value));
        }
    }

    #[test]
    fn test_lp_eq_values_proportional() {
        let reserves = PoolReserves {
            total_lp: 0.25,
            pooled_eth: 120.0,
            pooled_beans: 480_000.0,
        };
        let (eth_1, beans_1) = lp_eq_values(0.01, Some(&reserves)).unwrap();
        let (eth_2, beans_2) = lp_eq_values(0.02, Some(&reserves)).unwrap();
        assert!((eth_1 / eth_2 - 0.5).abs() < 1e-12);
        assert!((beans_1 / beans_2 - 0.5).abs() < 1e-12);
        assert!((eth_1 - 4.8).abs() < 1e-9);
        assert!((beans_1 - 19_200.0).abs() < 1e-6);
    }

    #[test]
    fn test_lp_eq_values_requires_reserves() {
        assert!(matches!(
            lp_eq_values(1.0, None),
            Err(MonitorError::Configuration(_))
        ));
        let empty = PoolReserves {
            total_lp: 0.0,
            pooled_eth: 1.0,
            pooled_beans: 1.0,
        };
        assert!(lp_eq_values(1.0, Some(&empty)).is_err());
    }

    #[test]
    fn test_finish_notification() {
        let text = finish_notification("hello".to_string(), &TxHash::ZERO);
        assert!(text.starts_with("hello\n<https://etherscan.io/tx/0x0000"));
        assert!(text.ends_with(">\n_ _"));
    }

    #[tokio::test]
    async fn test_lp_eq_values_from_source() {
        use crate::monitor::peg::tests::FakeGraph;
        use crate::types::SeasonStats;

        let graph = FakeGraph::default();
        let current = SeasonStats {
            lp: 2.0,
            pooled_eth: 10.0,
            pooled_beans: 40_000.0,
            ..Default::default()
        };
        *graph.seasons.lock().unwrap() = Some((current, SeasonStats::default()));
        assert_eq!(lp_eq_values_from_source(1.0, &graph).await.unwrap(), (5.0, 20_000.0));
        assert!(lp_eq_values_from_source(1.0, &FakeGraph::default()).await.is_err());
    }

    #[test]
    fn test_avg_swap_price() {
        assert_eq!(avg_swap_price(1.0, 4000.0, 4000.0), 1.0);
        assert_eq!(avg_swap_price(1.0, 0.0, 4000.0), 0.0);
    }
}
