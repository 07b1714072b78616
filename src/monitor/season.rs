//! Season (sunrise) monitor
//!
//! Seasons are assumed to start on every hour boundary counted from the Unix
//! epoch. The monitor blindly waits for the next boundary, then polls the
//! beanstalk subgraph until the new season shows up and publishes a summary
//! of the season that just ended.
//!
//! Local time and subgraph time are not synchronized; the 30 minute freshness
//! window absorbs ordinary clock drift.

use super::{publish_action, unix_now, Monitor, MonitorOptions, PollBody, PollContext};
use crate::error::MonitorError;
use crate::format::{lp_eq_values, round_num, BLANK_LINE};
use crate::sink::NotificationSink;
use crate::sources::GraphDataSource;
use crate::types::{ActionKind, Channel, ClassifiedAction, MonitorState, SeasonStats};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Subgraph polling period while waiting for a sunrise to land
pub const SEASON_CHECK_PERIOD: Duration = Duration::from_secs(10);

pub const SEASON_DURATION_SECS: u64 = 3600;

/// A season older than this is not the one we are waiting for
const MAX_SUNRISE_AGE_SECS: u64 = SEASON_DURATION_SECS / 2;

const WAIT_LOG_EVERY: u64 = 60;

/// Seconds from `now` to the next season boundary (a full season when `now` is on one)
pub fn seconds_until_next_boundary(now: u64) -> u64 {
    SEASON_DURATION_SECS - now % SEASON_DURATION_SECS
}

/// Whether `current` is a season we have not reported yet and that started recently
pub fn is_new_season(current: &SeasonStats, last_processed_id: Option<u64>, now: u64) -> bool {
    last_processed_id != Some(current.id) && current.timestamp + MAX_SUNRISE_AGE_SECS > now
}

/// Summary of season `last`, using pool ratios and headline numbers of `current`
pub fn season_summary_string(last: &SeasonStats, current: &SeasonStats) -> Result<String, MonitorError> {
    let reserves = current.reserves();
    let new_minted_beans = current.new_farmable_beans + current.new_harvestable_pods;
    let (deposited_eth_lp, deposited_bean_lp) = lp_eq_values(last.new_deposited_lp, Some(&reserves))?;
    let (withdrawn_eth_lp, withdrawn_bean_lp) = lp_eq_values(last.new_withdrawn_lp, Some(&reserves))?;
    let beans_sown = last.new_pods / (1.0 + last.weather / 100.0);

    let mut lines = vec![
        format!("⏱ Season {} is complete!", last.id),
        format!("💵 The TWAP last season was ${}", round_num(current.price, 3)),
        format!("🌤 The weather is {}%", current.weather),
        String::new(),
    ];
    if new_minted_beans != 0.0 {
        lines.push(format!("🌱 {} Beans were minted", round_num(new_minted_beans, 2)));
        lines.push(format!("👩‍🌾 {} Beans are newly farmable", round_num(current.new_farmable_beans, 2)));
        lines.push(format!("👨‍🌾 {} Pods are newly harvestable", round_num(current.new_harvestable_pods, 2)));
    } else {
        lines.push("🌱 No new Beans were minted.".to_string());
    }
    lines.push(String::new());
    lines.push(format!("📥 {} Beans deposited", round_num(last.new_deposited_beans, 2)));
    lines.push(format!(
        "📥 {} Beans and {} ETH of LP deposited",
        round_num(deposited_bean_lp, 2),
        round_num(deposited_eth_lp, 2)
    ));
    lines.push(format!("📤 {} Beans withdrawn", round_num(last.new_withdrawn_beans, 2)));
    lines.push(format!(
        "📤 {} Beans and {} ETH of LP withdrawn",
        round_num(withdrawn_bean_lp, 2),
        round_num(withdrawn_eth_lp, 2)
    ));
    lines.push(format!("🚜 {} Beans sown", round_num(beans_sown, 2)));
    lines.push(format!("🌾 {} Pods minted", round_num(last.new_pods, 2)));
    lines.push(BLANK_LINE.to_string());
    Ok(lines.join("\n"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    PollingForBoundary,
}

pub struct SeasonMonitor {
    graph: Arc<dyn GraphDataSource>,
    sink: Arc<dyn NotificationSink>,
    /// Most recent season reported. Not initialized at start.
    current_season_id: Option<u64>,
    /// Survives a failed poll so a graph hiccup after the boundary
    /// does not skip the whole season
    phase: Phase,
}

impl SeasonMonitor {
    pub fn new(graph: Arc<dyn GraphDataSource>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            graph,
            sink,
            current_season_id: None,
            phase: Phase::Waiting,
        }
    }

    pub fn into_monitor(self, options: MonitorOptions) -> Monitor {
        let sink = Arc::clone(&self.sink);
        Monitor::new("seasons", Channel::Seasons, SEASON_CHECK_PERIOD, Box::new(self), sink, options)
    }

    /// Sleep until the next expected sunrise. `false` if stopped first.
    async fn wait_until_expected_sunrise(&self, ctx: &PollContext) -> bool {
        let start = unix_now();
        let ready_at = start + seconds_until_next_boundary(start);
        let mut loop_count = 0u64;
        while ctx.is_active() {
            let now = unix_now();
            if now >= ready_at {
                return true;
            }
            if loop_count % WAIT_LOG_EVERY == 0 {
                info!(
                    "Blindly waiting {} more minutes until expected sunrise",
                    (ready_at - now) / 60
                );
            }
            loop_count += 1;
            ctx.sleep(Duration::from_secs(1)).await;
        }
        false
    }

    /// Poll until a fresh season appears. Returns `(current, previous)`,
    /// or `None` if stopped first.
    async fn block_and_get_seasons_stats(
        &mut self,
        ctx: &PollContext,
    ) -> Result<Option<(SeasonStats, SeasonStats)>> {
        while ctx.is_active() {
            let (current, previous) = self
                .graph
                .seasons_stats()
                .await
                .context("Failed to fetch season stats")?;
            if is_new_season(&current, self.current_season_id, unix_now()) {
                info!("New season detected with id {}", current.id);
                self.current_season_id = Some(current.id);
                return Ok(Some((current, previous)));
            }
            ctx.sleep(SEASON_CHECK_PERIOD).await;
        }
        Ok(None)
    }
}

#[async_trait]
impl PollBody for SeasonMonitor {
    async fn poll(&mut self, ctx: &PollContext) -> Result<()> {
        if self.phase == Phase::Waiting {
            if !self.wait_until_expected_sunrise(ctx).await {
                return Ok(());
            }
            self.phase = Phase::PollingForBoundary;
        }

        let last_reported = self.current_season_id;
        let Some((current, previous)) = self.block_and_get_seasons_stats(ctx).await? else {
            return Ok(());
        };

        // Keep polling for this season until its summary can be built
        let text = match season_summary_string(&previous, &current) {
            Ok(text) => text,
            Err(e) => {
                self.current_season_id = last_reported;
                return Err(anyhow::Error::new(e).context(format!("Cannot summarize season {}", previous.id)));
            }
        };
        self.phase = Phase::Waiting;

        let action = ClassifiedAction::new(ActionKind::SeasonSummary { season: previous.id }, text);
        publish_action(self.sink.as_ref(), Channel::Seasons, action);
        Ok(())
    }

    fn cursor(&self) -> Option<MonitorState> {
        self.current_season_id.map(|id| MonitorState::LastSeasonId { id })
    }
}
