//! Beanstalk Bot Library
//!
//! Monitors the Beanstalk protocol (peg crosses, seasons, the ETH:BEAN pool
//! and silo/field activity) and turns what it sees into chat notifications.
//!
//! Created: 2026-10-18

pub mod classifier;
pub mod config;
pub mod contracts;
pub mod delivery;
pub mod error;
pub mod format;
pub mod monitor;
pub mod sink;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, BotConfig, TransportKind};
pub use error::MonitorError;
pub use monitor::{Monitor, MonitorOptions, PollBody, PollContext};
pub use sink::{Notification, NotificationSink, QueuedSink};
pub use types::{Channel, ClassifiedAction, PegCrossType, RawEvent, SeasonStats};
