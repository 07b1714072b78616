//! Event Classifier
//!
//! Turns decoded logs into notification-worthy actions and renders their text.
//!
//! Rules:
//! - Pool: Mint/Burn → liquidity add/remove, Swap → buy/sell
//! - Beanstalk: Bean/LP deposit, withdraw, claim; Sow
//! - Silo conversions are compiled from a whole transaction into one action
//! - BeanRemove/LPRemove only balance a following deposit and are never shown alone
//!
//! Prices are supplied once per batch through `PricingContext` so every event in a
//! batch is valued consistently.
//!
//! Created: 2026-10-18

use crate::contracts::{BEAN_DEPOSIT_SELECTORS, SILO_CONVERSION_SELECTORS};
use crate::format::{avg_swap_price, finish_notification, lp_eq_values, round_num, value_to_emojis};
use crate::types::{
    ActionKind, Asset, ClassifiedAction, EventKind, RawEvent, TransactionEventGroup,
};
use tracing::{error, info, warn};

/// Market data used to value every event of one polling batch
#[derive(Debug, Clone, Default)]
pub struct PricingContext {
    pub eth_price: f64,
    pub bean_price: f64,
    /// Needed for any LP valuation
    pub reserves: Option<crate::types::PoolReserves>,
    /// Current weather (percent), used for the Sow pods-per-bean ratio
    pub weather: Option<f64>,
}

impl PricingContext {
    fn lp_underlying(&self, lp: f64) -> Option<(f64, f64)> {
        match lp_eq_values(lp, self.reserves.as_ref()) {
            Ok(values) => Some(values),
            Err(e) => {
                warn!("Cannot value {} LP: {}", lp, e);
                None
            }
        }
    }
}

/// Render a single ETH:BEAN pool log. `None` means suppress.
pub fn pool_event_action(event: &RawEvent, ctx: &PricingContext) -> Option<ClassifiedAction> {
    let (kind, body) = match &event.kind {
        EventKind::Mint { eth, beans } | EventKind::Burn { eth, beans } => {
            let (kind, label) = if matches!(event.kind, EventKind::Mint { .. }) {
                (ActionKind::LiquidityAdd, "📥 LP added")
            } else {
                (ActionKind::LiquidityRemove, "📤 LP removed")
            };
            // LP add/remove always takes equal value of both assets
            let lp_value = beans * ctx.bean_price * 2.0;
            let body = format!(
                "{} - {} Beans and {} ETH (${})\n{}",
                label,
                round_num(*beans, 2),
                round_num(*eth, 4),
                round_num(lp_value, 2),
                value_to_emojis(lp_value)
            );
            (kind, body)
        }
        EventKind::Swap {
            eth_in,
            eth_out,
            bean_in,
            bean_out,
        } => {
            let (buy, line, swap_price, swap_value) = if *eth_in > 0.0 {
                let price = avg_swap_price(*eth_in, *bean_out, ctx.eth_price);
                let line = format!(
                    "📗 {} Beans bought for {} ETH",
                    round_num(*bean_out, 2),
                    round_num(*eth_in, 4)
                );
                (true, line, price, price * bean_out)
            } else if *bean_in > 0.0 {
                let price = avg_swap_price(*eth_out, *bean_in, ctx.eth_price);
                let line = format!(
                    "📕 {} Beans sold for {} ETH",
                    round_num(*bean_in, 2),
                    round_num(*eth_out, 4)
                );
                (false, line, price, price * bean_in)
            } else {
                error!("Unexpected Swap args detected in {:?}", event.tx_hash);
                return None;
            };
            let body = format!(
                "{} @ ${} (${})  -  Latest block price is ${}\n{}",
                line,
                round_num(swap_price, 4),
                round_num(swap_value, 2),
                round_num(ctx.bean_price, 4),
                value_to_emojis(swap_value)
            );
            (ActionKind::Swap { buy }, body)
        }
        other => {
            warn!("Unexpected {} log from the pool contract. Ignoring.", other.name());
            return None;
        }
    };
    Some(ClassifiedAction::new(kind, finish_notification(body, &event.tx_hash)))
}

/// Render a single Beanstalk log. `None` means suppress.
pub fn beanstalk_event_action(event: &RawEvent, ctx: &PricingContext) -> Option<ClassifiedAction> {
    let (kind, body) = match &event.kind {
        // Uninteresting clutter on their own
        EventKind::BeanRemove { .. } | EventKind::LpRemove { .. } => return None,

        EventKind::LpDeposit { lp } | EventKind::LpWithdraw { lp } | EventKind::LpClaim { lp } => {
            let (kind, label) = match event.kind {
                EventKind::LpDeposit { .. } => (ActionKind::Deposit(Asset::Lp), "📥 LP deposited"),
                EventKind::LpWithdraw { .. } => (ActionKind::Withdraw(Asset::Lp), "📭 LP withdrawn"),
                _ => (ActionKind::Claim(Asset::Lp), "🛍 LP claimed"),
            };
            let (lp_eth, lp_beans) = ctx.lp_underlying(*lp)?;
            let lp_value = lp_eth * ctx.eth_price + lp_beans * ctx.bean_price;
            let body = format!(
                "{} - {} Beans and {} ETH (${})\n{}",
                label,
                round_num(lp_beans, 2),
                round_num(lp_eth, 4),
                round_num(lp_value, 2),
                value_to_emojis(lp_value)
            );
            (kind, body)
        }

        EventKind::BeanDeposit { beans }
        | EventKind::BeanWithdraw { beans }
        | EventKind::BeanClaim { beans } => {
            let (kind, label) = match event.kind {
                EventKind::BeanDeposit { .. } => (ActionKind::Deposit(Asset::Beans), "📥 Beans deposited"),
                EventKind::BeanWithdraw { .. } => (ActionKind::Withdraw(Asset::Beans), "📭 Beans withdrawn"),
                _ => (ActionKind::Claim(Asset::Beans), "🛍 Beans claimed"),
            };
            let beans_value = beans * ctx.bean_price;
            let body = format!(
                "{} - {} Beans (${})\n{}",
                label,
                round_num(*beans, 2),
                round_num(beans_value, 2),
                value_to_emojis(beans_value)
            );
            (kind, body)
        }

        EventKind::Sow { beans, pods } => {
            let beans_value = beans * ctx.bean_price;
            let mut body = format!(
                "🚜 {} Beans sown for {} Pods (${})",
                round_num(*beans, 2),
                round_num(*pods, 2),
                round_num(beans_value, 2)
            );
            if let Some(weather) = ctx.weather {
                body.push_str(&format!(
                    "\n🌤 {}% weather - {} Pods per Bean",
                    round_num(weather, 0),
                    round_num(1.0 + weather / 100.0, 2)
                ));
            }
            body.push('\n');
            body.push_str(&value_to_emojis(beans_value));
            (ActionKind::Sow, body)
        }

        other => {
            warn!(
                "Unexpected {} log from the Beanstalk contract ({:?}). Ignoring.",
                other.name(),
                event.tx_hash
            );
            return None;
        }
    };
    Some(ClassifiedAction::new(kind, finish_notification(body, &event.tx_hash)))
}

/// Compile every log of a silo conversion transaction into one action.
///
/// Expects one remove log (BeanRemove or LPRemove) and one deposit log
/// (BeanDeposit or LPDeposit). Returns `None` if either side is missing.
pub fn silo_conversion_action(events: &[RawEvent], ctx: &PricingContext) -> Option<ClassifiedAction> {
    let first = events.first()?;

    let mut beans_converted = None;
    let mut lp_converted = None;
    let mut beans_deposited = None;
    let mut lp_deposited = None;
    for event in events {
        match event.kind {
            EventKind::BeanRemove { beans } => beans_converted = Some(beans),
            EventKind::LpRemove { lp } => lp_converted = Some(lp),
            EventKind::BeanDeposit { beans } => beans_deposited = Some(beans),
            EventKind::LpDeposit { lp } => lp_deposited = Some(lp),
            _ => {}
        }
    }

    let (kind, body, value) = match (beans_converted, lp_converted, beans_deposited, lp_deposited) {
        // Beans → LP
        (Some(beans), _, _, Some(lp)) => {
            let (lp_eth, lp_beans) = ctx.lp_underlying(lp)?;
            let value = lp_beans * 2.0 * ctx.bean_price;
            let body = format!(
                "🔃 {} siloed Beans converted to {} ETH & {} Beans of LP (${})",
                round_num(beans, 2),
                round_num(lp_eth, 4),
                round_num(lp_beans, 2),
                round_num(value, 2)
            );
            (ActionKind::SiloConversion { from: Asset::Beans, to: Asset::Lp }, body, value)
        }
        // LP → Beans
        (_, Some(lp), Some(beans), _) => {
            let (lp_eth, lp_beans) = ctx.lp_underlying(lp)?;
            let value = beans * ctx.bean_price;
            let body = format!(
                "🔄 {} ETH and {} Beans of siloed LP converted to {} siloed Beans (${})",
                round_num(lp_eth, 4),
                round_num(lp_beans, 2),
                round_num(beans, 2),
                round_num(value, 2)
            );
            (ActionKind::SiloConversion { from: Asset::Lp, to: Asset::Beans }, body, value)
        }
        _ => {
            warn!(
                "Incomplete silo conversion in {:?} ({} logs). Ignoring.",
                first.tx_hash,
                events.len()
            );
            return None;
        }
    };

    let body = format!("{}\n{}", body, value_to_emojis(value));
    Some(ClassifiedAction::new(kind, finish_notification(body, &first.tx_hash)))
}

/// Strip every BeanDeposit log from the group, keeping back the last one.
///
/// Embedded deposits are produced by internal contract mechanics; only the
/// highest-positioned one reflects what the user did.
pub fn prune_embedded_deposits(group: &mut TransactionEventGroup) -> Option<RawEvent> {
    group
        .take_where(|e| matches!(e.kind, EventKind::BeanDeposit { .. }))
        .into_iter()
        .max_by_key(|e| e.log_index)
}

/// Classify all pool logs of one transaction.
///
/// Silo conversions are skipped here; the Beanstalk monitor reports them.
pub fn classify_pool_group(group: &TransactionEventGroup, ctx: &PricingContext) -> Vec<ClassifiedAction> {
    if group.selector_matches(SILO_CONVERSION_SELECTORS) {
        return Vec::new();
    }

    // Each txn of interest should only include one ETH:BEAN swap
    if group.events().iter().filter(|e| e.kind.is_swap()).count() > 1 {
        warn!(
            "Multiple swaps of interest seen in a single txn ({:?}, {} logs)",
            group.tx_hash,
            group.len()
        );
    }

    group
        .events()
        .iter()
        .filter_map(|event| pool_event_action(event, ctx))
        .collect()
}

/// Classify all Beanstalk logs of one transaction.
pub fn classify_beanstalk_group(mut group: TransactionEventGroup, ctx: &PricingContext) -> Vec<ClassifiedAction> {
    let last_bean_deposit = prune_embedded_deposits(&mut group);

    if group.selector_matches(SILO_CONVERSION_SELECTORS) {
        info!("Silo conversion txn seen ({:?})", group.tx_hash);
        if let Some(deposit) = last_bean_deposit {
            group.reattach(deposit);
        }
        return silo_conversion_action(group.events(), ctx).into_iter().collect();
    }

    if group.selector_matches(BEAN_DEPOSIT_SELECTORS) {
        info!("Bean deposit txn seen ({:?})", group.tx_hash);
        if let Some(deposit) = last_bean_deposit {
            group.reattach(deposit);
        }
    }

    group
        .events()
        .iter()
        .filter_map(|event| beanstalk_event_action(event, ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MethodSelector, PoolReserves};
    use alloy::primitives::TxHash;

    fn ctx() -> PricingContext {
        PricingContext {
            eth_price: 4000.0,
            bean_price: 1.0,
            reserves: Some(PoolReserves {
                total_lp: 1.0,
                pooled_eth: 100.0,
                pooled_beans: 400_000.0,
            }),
            weather: Some(25.0),
        }
    }

    fn event(kind: EventKind, log_index: u64) -> RawEvent {
        RawEvent {
            kind,
            tx_hash: TxHash::repeat_byte(0xab),
            log_index,
            timestamp: Some(1_637_000_000),
        }
    }

    fn group(selector: Option<[u8; 4]>, events: Vec<RawEvent>) -> TransactionEventGroup {
        TransactionEventGroup::new(TxHash::repeat_byte(0xab), selector.map(MethodSelector), events)
    }

    #[test]
    fn test_swap_buy() {
        let swap = event(
            EventKind::Swap { eth_in: 1.0, eth_out: 0.0, bean_in: 0.0, bean_out: 3_900.0 },
            4,
        );
        let action = pool_event_action(&swap, &ctx()).unwrap();
        assert_eq!(action.kind, ActionKind::Swap { buy: true });
        assert!(action.text.starts_with("📗 3,900.00 Beans bought for 1.0000 ETH @ $1.0256 ($4,000.00)"));
        assert!(action.text.contains("Latest block price is $1.0000"));
        assert!(action.text.contains("\n🐟🐟🐟🐟\n"));
        assert!(action.text.ends_with("\n_ _"));
    }

    #[test]
    fn test_swap_without_amounts_is_suppressed() {
        let swap = event(
            EventKind::Swap { eth_in: 0.0, eth_out: 1.0, bean_in: 0.0, bean_out: 1.0 },
            4,
        );
        assert!(pool_event_action(&swap, &ctx()).is_none());
    }

    #[test]
    fn test_mint_values_both_sides() {
        let mint = event(EventKind::Mint { eth: 5.0, beans: 20_000.0 }, 1);
        let action = pool_event_action(&mint, &ctx()).unwrap();
        assert_eq!(action.kind, ActionKind::LiquidityAdd);
        assert!(action.text.starts_with("📥 LP added - 20,000.00 Beans and 5.0000 ETH ($40,000.00)\n🦈🦈🦈🦈"));
    }

    #[test]
    fn test_remove_logs_are_suppressed() {
        assert!(beanstalk_event_action(&event(EventKind::BeanRemove { beans: 5.0 }, 1), &ctx()).is_none());
        assert!(beanstalk_event_action(&event(EventKind::LpRemove { lp: 5.0 }, 1), &ctx()).is_none());
        let unknown = event(EventKind::Other { name: "Incentivization".into() }, 1);
        assert!(beanstalk_event_action(&unknown, &ctx()).is_none());
    }

    #[test]
    fn test_lp_deposit_needs_reserves() {
        let deposit = event(EventKind::LpDeposit { lp: 0.01 }, 1);
        let action = beanstalk_event_action(&deposit, &ctx()).unwrap();
        assert_eq!(action.kind, ActionKind::Deposit(Asset::Lp));
        assert!(action.text.starts_with("📥 LP deposited - 4,000.00 Beans and 1.0000 ETH ($8,000.00)"));

        let no_reserves = PricingContext { reserves: None, ..ctx() };
        assert!(beanstalk_event_action(&deposit, &no_reserves).is_none());
    }

    #[test]
    fn test_sow_reports_pods_per_bean() {
        let sow = event(EventKind::Sow { beans: 100.0, pods: 125.0 }, 1);
        let action = beanstalk_event_action(&sow, &ctx()).unwrap();
        assert_eq!(action.kind, ActionKind::Sow);
        assert!(action.text.starts_with("🚜 100.00 Beans sown for 125.00 Pods ($100.00)"));
        assert!(action.text.contains("1.25 Pods per Bean"));
    }

    #[test]
    fn test_prune_keeps_highest_deposit() {
        let mut g = group(
            None,
            vec![
                event(EventKind::BeanDeposit { beans: 1.0 }, 3),
                event(EventKind::BeanDeposit { beans: 2.0 }, 9),
                event(EventKind::Sow { beans: 1.0, pods: 1.0 }, 5),
                event(EventKind::BeanDeposit { beans: 3.0 }, 6),
            ],
        );
        let kept = prune_embedded_deposits(&mut g).unwrap();
        assert_eq!(kept.log_index, 9);
        assert_eq!(g.len(), 1);
        assert!(g.events().iter().all(|e| !matches!(e.kind, EventKind::BeanDeposit { .. })));
    }

    #[test]
    fn test_conversion_yields_single_action() {
        let g = group(
            Some(SILO_CONVERSION_SELECTORS[1]),
            vec![
                event(EventKind::BeanDeposit { beans: 10.0 }, 1),
                event(EventKind::LpRemove { lp: 0.001 }, 2),
                event(EventKind::BeanDeposit { beans: 400.0 }, 3),
            ],
        );
        let actions = classify_beanstalk_group(g, &ctx());
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].kind,
            ActionKind::SiloConversion { from: Asset::Lp, to: Asset::Beans }
        );
        assert!(actions[0]
            .text
            .starts_with("🔄 0.1000 ETH and 400.00 Beans of siloed LP converted to 400.00 siloed Beans ($400.00)"));
    }

    #[test]
    fn test_bean_deposit_txn_reports_last_deposit_only() {
        let g = group(
            Some(BEAN_DEPOSIT_SELECTORS[0]),
            vec![
                event(EventKind::BeanDeposit { beans: 10.0 }, 1),
                event(EventKind::BeanDeposit { beans: 500.0 }, 2),
            ],
        );
        let actions = classify_beanstalk_group(g, &ctx());
        assert_eq!(actions.len(), 1);
        assert!(actions[0].text.starts_with("📥 Beans deposited - 500.00 Beans ($500.00)"));
    }

    #[test]
    fn test_other_txn_drops_embedded_deposits() {
        let g = group(
            Some([0x12, 0x34, 0x56, 0x78]),
            vec![
                event(EventKind::BeanDeposit { beans: 10.0 }, 1),
                event(EventKind::Sow { beans: 50.0, pods: 60.0 }, 2),
            ],
        );
        let actions = classify_beanstalk_group(g, &ctx());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Sow);
    }

    #[test]
    fn test_pool_skips_silo_conversions() {
        let g = group(
            Some(SILO_CONVERSION_SELECTORS[0]),
            vec![event(EventKind::Mint { eth: 1.0, beans: 4000.0 }, 1)],
        );
        assert!(classify_pool_group(&g, &ctx()).is_empty());

        let g = group(None, vec![event(EventKind::Mint { eth: 1.0, beans: 4000.0 }, 1)]);
        assert_eq!(classify_pool_group(&g, &ctx()).len(), 1);
    }
}
