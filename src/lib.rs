//! SWEEPD - GC Sweep Coordinator
//!
//! Standalone coordinator that periodically derives a monotonically
//! advancing safe point from the cluster's timestamp oracle and dispatches
//! at most one GC sweep at a time, throttled to a configured run interval.

pub mod cluster;
pub mod config;
pub mod lifecycle;
pub mod metrics;
pub mod protocol;
pub mod scheduler;
pub mod timestamp;

pub use cluster::{ClusterError, OracleClient, StorageClient};
pub use config::{Config, ConfigError, ExecMode, MIN_LIFE_TIME};
pub use lifecycle::Lifecycle;
pub use metrics::Metrics;
pub use scheduler::{is_due, GcExecutor, GcScheduler, TimestampOracle, TICK_INTERVAL};
pub use timestamp::{SafePoint, Timestamp};
