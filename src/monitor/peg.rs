//! Peg cross monitor
//!
//! Watches the bean subgraph for BEAN price crosses over $1. Assumes the
//! polling period is shorter than the minimum interval between two crosses
//! with distinct ids.

use super::{publish_action, Monitor, MonitorOptions, PollBody, PollContext};
use crate::sink::NotificationSink;
use crate::sources::GraphDataSource;
use crate::types::{ActionKind, Channel, ClassifiedAction, CrossRecord, MonitorState, PegCrossType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const PEG_CHECK_PERIOD: Duration = Duration::from_secs(10);

pub fn peg_cross_string(cross: PegCrossType) -> &'static str {
    match cross {
        PegCrossType::CrossAbove => "🟩↗ BEAN crossed above peg!",
        PegCrossType::CrossBelow => "🟥↘ BEAN crossed below peg!",
    }
}

pub struct PegCrossMonitor {
    graph: Arc<dyn GraphDataSource>,
    sink: Arc<dyn NotificationSink>,
    /// Initialized lazily from the first fetch; never reset
    last_known_cross: Option<CrossRecord>,
}

impl PegCrossMonitor {
    pub fn new(graph: Arc<dyn GraphDataSource>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            graph,
            sink,
            last_known_cross: None,
        }
    }

    pub fn into_monitor(self, options: MonitorOptions) -> Monitor {
        let sink = Arc::clone(&self.sink);
        Monitor::new("peg", Channel::Peg, PEG_CHECK_PERIOD, Box::new(self), sink, options)
    }

    /// Crosses that happened since the previous check, oldest first.
    ///
    /// The first call only records the latest cross and reports nothing.
    pub async fn check_for_peg_crosses(&mut self) -> Result<Vec<PegCrossType>> {
        let latest = self
            .graph
            .latest_cross()
            .await
            .context("Failed to fetch latest peg cross")?;

        let (known_id, known_timestamp) = match &self.last_known_cross {
            Some(known) => (known.id, known.timestamp),
            None => {
                info!("Initial peg cross state: id {} (above: {})", latest.id, latest.above);
                self.last_known_cross = Some(latest);
                return Ok(Vec::new());
            }
        };
        if latest.timestamp <= known_timestamp {
            return Ok(Vec::new());
        }

        let new_crosses = latest.id.saturating_sub(known_id);
        let crosses = if new_crosses > 1 {
            self.graph
                .crosses_since(known_id, new_crosses)
                .await
                .with_context(|| format!("Failed to fetch {} peg crosses", new_crosses))?
        } else {
            vec![latest.clone()]
        };
        debug!("{} new peg cross(es) up to id {}", crosses.len(), latest.id);
        self.last_known_cross = Some(latest);

        Ok(crosses
            .iter()
            .map(|c| PegCrossType::from_above(c.above))
            .collect())
    }
}

#[async_trait]
impl PollBody for PegCrossMonitor {
    async fn poll(&mut self, _ctx: &PollContext) -> Result<()> {
        for cross in self.check_for_peg_crosses().await? {
            let action = ClassifiedAction::new(ActionKind::PegCross(cross), peg_cross_string(cross).to_string());
            publish_action(self.sink.as_ref(), Channel::Peg, action);
        }
        Ok(())
    }

    fn cursor(&self) -> Option<MonitorState> {
        self.last_known_cross.as_ref().map(|c| MonitorState::LastCross {
            timestamp: c.timestamp,
            id: c.id,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sink::QueuedSink;
    use crate::types::SeasonStats;
    use std::sync::Mutex;

    /// In-memory bean subgraph
    #[derive(Default)]
    pub(crate) struct FakeGraph {
        pub crosses: Mutex<Vec<CrossRecord>>,
        pub crosses_requests: Mutex<Vec<(u64, u64)>>,
        pub seasons: Mutex<Option<(SeasonStats, SeasonStats)>>,
    }

    impl FakeGraph {
        pub fn push_cross(&self, id: u64, timestamp: u64, above: bool) {
            self.crosses.lock().unwrap().push(CrossRecord { id, timestamp, above });
        }
    }

    #[async_trait]
    impl GraphDataSource for FakeGraph {
        async fn latest_cross(&self) -> Result<CrossRecord> {
            self.crosses
                .lock()
                .unwrap()
                .last()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no crosses"))
        }

        async fn crosses_since(&self, id: u64, count: u64) -> Result<Vec<CrossRecord>> {
            self.crosses_requests.lock().unwrap().push((id, count));
            Ok(self
                .crosses
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.id > id)
                .take(count as usize)
                .cloned()
                .collect())
        }

        async fn current_season_stats(&self) -> Result<SeasonStats> {
            Ok(self.seasons_stats().await?.0)
        }

        async fn previous_season_stats(&self) -> Result<SeasonStats> {
            Ok(self.seasons_stats().await?.1)
        }

        async fn seasons_stats(&self) -> Result<(SeasonStats, SeasonStats)> {
            self.seasons
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no seasons"))
        }
    }

    fn detector() -> (Arc<FakeGraph>, PegCrossMonitor, QueuedSink) {
        let graph = Arc::new(FakeGraph::default());
        let sink = QueuedSink::new();
        let monitor = PegCrossMonitor::new(graph.clone(), Arc::new(sink.clone()));
        (graph, monitor, sink)
    }

    #[tokio::test]
    async fn test_first_fetch_emits_nothing() {
        let (graph, mut monitor, _) = detector();
        graph.push_cross(10, 1000, true);
        assert!(monitor.check_for_peg_crosses().await.unwrap().is_empty());
        assert_eq!(
            monitor.cursor(),
            Some(MonitorState::LastCross { timestamp: 1000, id: 10 })
        );
    }

    #[tokio::test]
    async fn test_single_and_repeated_cross() {
        let (graph, mut monitor, _) = detector();
        graph.push_cross(10, 1000, true);
        monitor.check_for_peg_crosses().await.unwrap();

        // Same record again: nothing new
        assert!(monitor.check_for_peg_crosses().await.unwrap().is_empty());

        graph.push_cross(11, 1100, false);
        assert_eq!(
            monitor.check_for_peg_crosses().await.unwrap(),
            vec![PegCrossType::CrossBelow]
        );
        assert!(graph.crosses_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_crosses_in_order() {
        let (graph, mut monitor, _) = detector();
        graph.push_cross(10, 1000, true);
        monitor.check_for_peg_crosses().await.unwrap();

        graph.push_cross(11, 1010, false);
        graph.push_cross(12, 1020, true);
        graph.push_cross(13, 1030, false);
        assert_eq!(
            monitor.check_for_peg_crosses().await.unwrap(),
            vec![
                PegCrossType::CrossBelow,
                PegCrossType::CrossAbove,
                PegCrossType::CrossBelow
            ]
        );
        assert_eq!(*graph.crosses_requests.lock().unwrap(), vec![(10, 3)]);
        assert_eq!(
            monitor.cursor(),
            Some(MonitorState::LastCross { timestamp: 1030, id: 13 })
        );
    }

    #[tokio::test]
    async fn test_poll_publishes_to_peg_channel() {
        let (graph, mut monitor, sink) = detector();
        let ctx = PollContext::active_for_test();
        graph.push_cross(1, 100, false);
        monitor.poll(&ctx).await.unwrap();
        graph.push_cross(2, 200, true);
        monitor.poll(&ctx).await.unwrap();

        let published = sink.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].channel, Channel::Peg);
        assert_eq!(published[0].text, "🟩↗ BEAN crossed above peg!");
    }

    #[test]
    fn test_graph_failure_propagates() {
        let (_, mut monitor, _) = detector();
        let result = tokio_test::block_on(monitor.check_for_peg_crosses());
        assert!(format!("{:#}", result.unwrap_err()).contains("no crosses"));
    }
}
