//! TSO Timestamps
//!
//! Cluster timestamps in timestamp-oracle layout: physical milliseconds in
//! the high bits, an 18-bit logical counter in the low bits.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Bits reserved for the logical counter.
pub const LOGICAL_BITS: u32 = 18;

const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// A logical cluster timestamp issued by the timestamp oracle.
///
/// Opaque outside this module; ordering follows the raw value, so physical
/// time dominates and the logical counter breaks same-millisecond ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Reconstruct a timestamp from its raw wire representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Compose a timestamp from physical milliseconds and a logical counter.
    pub fn compose(physical_ms: u64, logical: u64) -> Self {
        Self((physical_ms << LOGICAL_BITS) | (logical & LOGICAL_MASK))
    }

    /// Raw wire representation.
    pub fn into_raw(self) -> u64 {
        self.0
    }

    /// Physical component, milliseconds since the Unix epoch.
    pub fn physical_millis(self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    /// Logical counter component.
    pub fn logical(self) -> u64 {
        self.0 & LOGICAL_MASK
    }

    /// Wall-clock rendering of the physical component, for log lines.
    pub fn physical_utc(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.physical_millis() as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.physical_utc() {
            Some(t) => write!(f, "{} ({})", self.0, t.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Timestamp below which all stored versions are eligible for deletion.
///
/// Only ever derived from a fresh oracle timestamp; never supplied directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SafePoint(Timestamp);

impl SafePoint {
    /// Derive a safe point from a fresh oracle timestamp and the configured
    /// retention window.
    ///
    /// The logical counter is zeroed, coarsening the safe point to 1ms
    /// granularity. `life_time` is assumed already validated against the
    /// configured floor.
    pub fn compute(now: Timestamp, life_time: Duration) -> Self {
        let physical = now
            .physical_millis()
            .saturating_sub(life_time.as_millis() as u64);
        Self(Timestamp::compose(physical, 0))
    }

    /// The safe point as a cluster timestamp.
    pub fn timestamp(self) -> Timestamp {
        self.0
    }

    /// Raw wire representation.
    pub fn into_raw(self) -> u64 {
        self.0.into_raw()
    }
}

impl fmt::Display for SafePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
