//! Supervised Monitors
//!
//! A `Monitor` owns one background tokio task that repeatedly runs a pluggable
//! `PollBody`. Many of the RPC and subgraph calls can fail arbitrarily, so any
//! error (or panic) from the body is logged and the body is run again after a
//! fixed reset delay. A monitor only stops when asked to.
//!
//! Monitors:
//!     peg.rs        - BEAN price crossing the peg (bean subgraph)
//!     season.rs     - season summary at each sunrise (beanstalk subgraph)
//!     pool.rs       - ETH:BEAN Uniswap V2 pool swaps and liquidity
//!     beanstalk.rs  - silo deposits/withdrawals/claims/conversions and sows
//!
//! Cancellation is cooperative: bodies sleep through `PollContext`, which wakes
//! at least once per second to check the stop flag.
//!
//! Created: 2026-10-18

pub mod beanstalk;
pub mod peg;
pub mod pool;
pub mod season;

pub use beanstalk::BeanstalkMonitor;
pub use peg::PegCrossMonitor;
pub use pool::PoolMonitor;
pub use season::SeasonMonitor;

use crate::sink::NotificationSink;
use crate::types::{Channel, ClassifiedAction, MonitorState};
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Time to wait before restarting a monitor body after an unhandled error
pub const MONITOR_RESET_DELAY: Duration = Duration::from_secs(5);

/// Longest single sleep; bounds how long `stop()` can go unnoticed
const SLEEP_STEP: Duration = Duration::from_secs(1);

/// Handle given to a body so it can wait without ignoring stop requests
#[derive(Debug, Clone)]
pub struct PollContext {
    active: Arc<AtomicBool>,
}

impl PollContext {
    fn new(active: Arc<AtomicBool>) -> Self {
        Self { active }
    }

    #[cfg(test)]
    pub(crate) fn active_for_test() -> Self {
        Self::new(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in steps of at most one second.
    /// Returns `false` if the monitor was stopped before the time elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_active() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(SLEEP_STEP)).await;
        }
    }
}

/// One polling pass of a monitor
#[async_trait]
pub trait PollBody: Send {
    async fn poll(&mut self, ctx: &PollContext) -> Result<()>;

    /// Position the body has advanced to, for diagnostics
    fn cursor(&self) -> Option<MonitorState> {
        None
    }
}

/// Deployment flags shared by all monitors
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorOptions {
    /// Production instances do not announce start-up in their channel
    pub prod: bool,
    /// Fed by simulated data
    pub dry_run: bool,
}

/// A named, supervised background poller
pub struct Monitor {
    name: String,
    channel: Channel,
    period: Duration,
    reset_delay: Duration,
    options: MonitorOptions,
    sink: Arc<dyn NotificationSink>,
    body: Option<Box<dyn PollBody>>,
    active: Arc<AtomicBool>,
    failures: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(
        name: impl Into<String>,
        channel: Channel,
        period: Duration,
        body: Box<dyn PollBody>,
        sink: Arc<dyn NotificationSink>,
        options: MonitorOptions,
    ) -> Self {
        Self {
            name: name.into(),
            channel,
            period,
            reset_delay: MONITOR_RESET_DELAY,
            options,
            sink,
            body: Some(body),
            active: Arc::new(AtomicBool::new(false)),
            failures: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Override the delay between a failed poll and the next attempt
    pub fn with_reset_delay(mut self, reset_delay: Duration) -> Self {
        self.reset_delay = reset_delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of failed polls since start
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Whether the background task is still alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Spawn the background task. A monitor can only be started once.
    pub fn start(&mut self) -> Result<()> {
        let body = self
            .body
            .take()
            .ok_or_else(|| anyhow::anyhow!("{} monitor was already started", self.name))?;

        info!("Starting {} monitoring task...", self.name);
        if self.options.dry_run {
            self.announce(format!("{} monitoring started (with simulated data).", self.name));
        } else if !self.options.prod {
            self.announce(format!("{} monitoring started.", self.name));
        }

        self.active.store(true, Ordering::SeqCst);
        let ctx = PollContext::new(Arc::clone(&self.active));
        self.handle = Some(tokio::spawn(run_supervised(
            self.name.clone(),
            body,
            ctx,
            self.period,
            self.reset_delay,
            Arc::clone(&self.failures),
        )));
        Ok(())
    }

    /// Ask the task to finish and wait up to three periods for it.
    ///
    /// Best-effort: an in-flight RPC call is not cancelled, and a task that
    /// overruns the wait is detached rather than aborted.
    pub async fn stop(&mut self) {
        info!("Stopping {} monitoring task...", self.name);
        self.active.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            match tokio::time::timeout(self.period * 3, handle).await {
                Ok(Ok(())) => info!("{} monitoring task stopped", self.name),
                Ok(Err(e)) => error!("{} monitoring task ended abnormally: {}", self.name, e),
                Err(_) => warn!(
                    "{} monitoring task did not stop within {:?}; detaching",
                    self.name,
                    self.period * 3
                ),
            }
        }
        self.announce(format!("{} monitoring stopped.", self.name));
    }

    fn announce(&self, text: String) {
        self.sink.publish(self.channel, text);
    }
}

pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Hand a classified action to the sink
pub(crate) fn publish_action(sink: &dyn NotificationSink, channel: Channel, action: ClassifiedAction) {
    info!("Publishing {:?} to {}", action.kind, channel);
    sink.publish(channel, action.text);
}

/// Run `body` until stopped, isolating every failure
async fn run_supervised(
    name: String,
    mut body: Box<dyn PollBody>,
    ctx: PollContext,
    period: Duration,
    reset_delay: Duration,
    failures: Arc<AtomicU64>,
) {
    while ctx.is_active() {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(body.poll(&ctx)).catch_unwind().await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        match failure {
            None => {
                debug!("{} poll done in {:?}, cursor {:?}", name, started.elapsed(), body.cursor());
                ctx.sleep(period.saturating_sub(started.elapsed())).await;
            }
            Some(reason) => {
                let count = failures.fetch_add(1, Ordering::SeqCst) + 1;
                error!(
                    "Unhandled error in the {} monitor (failure #{}): {}. Restarting monitor in {:?}",
                    name, count, reason, reset_delay
                );
                ctx.sleep(reset_delay).await;
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::QueuedSink;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FlakyBody {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
        polled_at: Arc<Mutex<Vec<Instant>>>,
    }

    impl FlakyBody {
        fn new(calls: Arc<AtomicUsize>, fail_first: usize) -> Self {
            Self {
                calls,
                fail_first,
                polled_at: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl PollBody for FlakyBody {
        async fn poll(&mut self, _ctx: &PollContext) -> Result<()> {
            self.polled_at.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                anyhow::bail!("simulated RPC failure #{}", call);
            }
            Ok(())
        }
    }

    struct PanickingBody;

    #[async_trait]
    impl PollBody for PanickingBody {
        async fn poll(&mut self, _ctx: &PollContext) -> Result<()> {
            panic!("malformed event");
        }
    }

    fn monitor(body: Box<dyn PollBody>, sink: &QueuedSink, options: MonitorOptions) -> Monitor {
        Monitor::new(
            "test",
            Channel::Pool,
            Duration::from_millis(10),
            body,
            Arc::new(sink.clone()),
            options,
        )
        .with_reset_delay(Duration::from_millis(20))
    }

    async fn wait_for(calls: &AtomicUsize, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < n {
            assert!(Instant::now() < deadline, "timed out waiting for {} polls", n);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_kill_monitor() {
        let sink = QueuedSink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let body = FlakyBody::new(Arc::clone(&calls), 3);
        let polled_at = Arc::clone(&body.polled_at);
        let mut monitor = monitor(Box::new(body), &sink, MonitorOptions::default());
        monitor.start().unwrap();

        wait_for(&calls, 5).await;
        assert!(monitor.is_running());
        assert_eq!(monitor.failures(), 3);

        monitor.stop().await;
        assert!(!monitor.is_running());

        // Each of the three failures is followed by the full reset delay
        let polled_at = polled_at.lock().unwrap().clone();
        for pair in polled_at.windows(2).take(3) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(20),
                "retried after {:?}",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test]
    async fn test_panics_are_isolated() {
        let sink = QueuedSink::new();
        let mut monitor = monitor(Box::new(PanickingBody), &sink, MonitorOptions::default());
        monitor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(monitor.is_running());
        assert!(monitor.failures() >= 2);
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_start_and_stop_notices() {
        let sink = QueuedSink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let body = FlakyBody::new(calls, 0);
        let mut staging = monitor(Box::new(body), &sink, MonitorOptions::default());
        staging.start().unwrap();
        staging.stop().await;

        let texts: Vec<_> = sink.drain().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["test monitoring started.", "test monitoring stopped."]);
    }

    #[tokio::test]
    async fn test_production_skips_start_notice() {
        let sink = QueuedSink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let body = FlakyBody::new(calls, 0);
        let options = MonitorOptions { prod: true, dry_run: false };
        let mut prod = monitor(Box::new(body), &sink, options);
        prod.start().unwrap();
        prod.stop().await;

        let texts: Vec<_> = sink.drain().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["test monitoring stopped."]);
    }

    #[tokio::test]
    async fn test_dry_run_notice_and_double_start() {
        let sink = QueuedSink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let body = FlakyBody::new(calls, 0);
        let options = MonitorOptions { prod: false, dry_run: true };
        let mut dry = monitor(Box::new(body), &sink, options);
        dry.start().unwrap();
        assert!(dry.start().is_err());
        dry.stop().await;

        let first = sink.drain().remove(0);
        assert_eq!(first.text, "test monitoring started (with simulated data).");
        assert_eq!(first.channel, Channel::Pool);
    }

    #[tokio::test]
    async fn test_context_sleep_stops_early() {
        let active = Arc::new(AtomicBool::new(true));
        let ctx = PollContext::new(Arc::clone(&active));
        let flag = Arc::clone(&active);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(false, Ordering::SeqCst);
        });
        let started = Instant::now();
        assert!(!ctx.sleep(Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
