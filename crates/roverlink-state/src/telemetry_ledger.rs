//! [`TelemetryLedger`] – bounded, append-only telemetry history.
//!
//! The ledger is a strict FIFO: once it holds [`capacity`][TelemetryLedger::capacity]
//! records, every append evicts exactly the single oldest record.
//!
//! # Query order
//!
//! [`TelemetryLedger::query`] truncates to the most recent `limit` records of
//! the whole fleet *before* filtering by robot id.  A robot's older records
//! therefore drop out of a filtered query as soon as other robots report,
//! even when fewer than `limit` of its records are returned.  Callers wanting
//! per-robot history need filter-then-truncate, which this ledger does not
//! offer.

use std::collections::VecDeque;

use roverlink_types::TelemetryRecord;
use tracing::trace;

/// Number of records kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded FIFO of [`TelemetryRecord`]s.
#[derive(Debug)]
pub struct TelemetryLedger {
    records: VecDeque<TelemetryRecord>,
    capacity: usize,
}

impl TelemetryLedger {
    /// Create an empty ledger holding at most [`DEFAULT_CAPACITY`] records.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty ledger holding at most `capacity` records.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append `record`, evicting the oldest record if the ledger overflows.
    pub fn append(&mut self, record: TelemetryRecord) {
        self.records.push_back(record);
        if self.records.len() > self.capacity
            && let Some(evicted) = self.records.pop_front()
        {
            trace!(robot_id = %evicted.robot_id, "evicted oldest telemetry record");
        }
    }

    /// Return the most recent `limit` records (oldest first), then keep only
    /// those from `robot_id` when one is given.
    pub fn query(&self, limit: usize, robot_id: Option<&str>) -> Vec<TelemetryRecord> {
        let start = self.records.len().saturating_sub(limit);
        self.records
            .iter()
            .skip(start)
            .filter(|r| robot_id.is_none_or(|id| r.robot_id == id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TelemetryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roverlink_types::SensorSnapshot;

    fn record(robot_id: &str, distance: f64) -> TelemetryRecord {
        TelemetryRecord::new(
            robot_id,
            SensorSnapshot {
                distance,
                ..SensorSnapshot::default()
            },
        )
    }

    #[test]
    fn default_capacity_is_one_thousand() {
        assert_eq!(TelemetryLedger::new().capacity(), 1000);
        assert_eq!(DEFAULT_CAPACITY, 1000);
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest_first() {
        let mut ledger = TelemetryLedger::new();
        for i in 0..1000 {
            ledger.append(record("mbot_001", i as f64));
            assert!(ledger.len() <= 1000);
        }
        assert_eq!(ledger.len(), 1000);
        assert_eq!(ledger.query(1000, None)[0].snapshot.distance, 0.0);

        // The 1001st record pushes out exactly the first one.
        ledger.append(record("mbot_001", 1000.0));
        assert_eq!(ledger.len(), 1000);
        let all = ledger.query(1000, None);
        assert_eq!(all[0].snapshot.distance, 1.0);
        assert_eq!(all[999].snapshot.distance, 1000.0);

        for i in 1001..1500 {
            ledger.append(record("mbot_001", i as f64));
        }
        assert_eq!(ledger.len(), 1000);
        assert_eq!(ledger.query(1000, None)[0].snapshot.distance, 500.0);
    }

    #[test]
    fn small_capacity_evicts_one_at_a_time() {
        let mut ledger = TelemetryLedger::with_capacity(3);
        for i in 0..5 {
            ledger.append(record("r", i as f64));
        }
        let distances: Vec<f64> = ledger
            .query(10, None)
            .iter()
            .map(|r| r.snapshot.distance)
            .collect();
        assert_eq!(distances, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn query_returns_tail_in_chronological_order() {
        let mut ledger = TelemetryLedger::new();
        for i in 0..10 {
            ledger.append(record("r", i as f64));
        }
        let tail: Vec<f64> = ledger
            .query(3, None)
            .iter()
            .map(|r| r.snapshot.distance)
            .collect();
        assert_eq!(tail, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn query_truncates_before_filtering() {
        let mut ledger = TelemetryLedger::new();
        // Robot X reports three times, then Y floods the tail.
        for i in 0..3 {
            ledger.append(record("X", i as f64));
        }
        for i in 0..4 {
            ledger.append(record("Y", i as f64));
        }
        ledger.append(record("X", 99.0));

        let filtered = ledger.query(5, Some("X"));
        assert_eq!(filtered.len(), 1, "older X records lie outside the tail-5 window");
        assert_eq!(filtered[0].snapshot.distance, 99.0);
    }

    #[test]
    fn query_limit_larger_than_ledger_returns_everything() {
        let mut ledger = TelemetryLedger::new();
        ledger.append(record("a", 1.0));
        ledger.append(record("b", 2.0));
        assert_eq!(ledger.query(50, None).len(), 2);
        assert_eq!(ledger.query(50, Some("b")).len(), 1);
    }

    #[test]
    fn query_limit_zero_returns_nothing() {
        let mut ledger = TelemetryLedger::new();
        ledger.append(record("a", 1.0));
        assert!(ledger.query(0, None).is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut ledger = TelemetryLedger::with_capacity(0);
        ledger.append(record("a", 1.0));
        ledger.append(record("a", 2.0));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.capacity(), 1);
    }
}
