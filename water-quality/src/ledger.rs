//! Bounded per-pool history of evaluated readings.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::evaluated::EvaluatedReading;
use crate::parameter::Parameter;

/// Default number of entries retained per pool.
pub const DEFAULT_HISTORY_CAP: usize = 1000;

// ------------------------------------------------------------------ //
//  Stats                                                              //
// ------------------------------------------------------------------ //

/// First and last retained timestamps (RFC 3339), empty strings when the
/// ledger is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_entries: usize,
    pub date_range: DateRange,
    pub averages: BTreeMap<Parameter, f64>,
}

// ------------------------------------------------------------------ //
//  Ledger                                                             //
// ------------------------------------------------------------------ //

/// Newest-first history keyed by pool id.
///
/// Entries are kept ordered by timestamp (newest first) so the retention
/// cap always evicts the oldest reading, even if readings arrive out of
/// order.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    cap: usize,
    pools: HashMap<String, VecDeque<EvaluatedReading>>,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cap of zero is treated as one.
    pub fn with_cap(cap: usize) -> Self {
        Self { cap: cap.max(1), pools: HashMap::new() }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn append(&mut self, pool_id: &str, entry: EvaluatedReading) {
        let entries = self.pools.entry(pool_id.to_string()).or_default();
        // In-order arrivals land at the front; equal timestamps go ahead of
        // their peers.
        let at = entries.partition_point(|e| e.timestamp > entry.timestamp);
        entries.insert(at, entry);
        entries.truncate(self.cap);
    }

    /// Newest-first entries, at most `limit` of them when given.
    pub fn query(&self, pool_id: &str, limit: Option<usize>) -> Vec<EvaluatedReading> {
        let Some(entries) = self.pools.get(pool_id) else {
            return Vec::new();
        };
        let take = limit.unwrap_or(entries.len());
        entries.iter().take(take).cloned().collect()
    }

    pub fn latest(&self, pool_id: &str) -> Option<&EvaluatedReading> {
        self.pools.get(pool_id).and_then(|e| e.front())
    }

    pub fn len(&self, pool_id: &str) -> usize {
        self.pools.get(pool_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, pool_id: &str) -> bool {
        self.len(pool_id) == 0
    }

    /// Aggregate over every retained entry for the pool.
    pub fn stats(&self, pool_id: &str) -> HistoryStats {
        let Some(entries) = self.pools.get(pool_id).filter(|e| !e.is_empty()) else {
            return HistoryStats::default();
        };

        let mut by_time: Vec<_> = entries.iter().map(|e| e.timestamp).collect();
        by_time.sort();
        let fmt = |t: &chrono::DateTime<chrono::Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let date_range = DateRange {
            start: by_time.first().map(fmt).unwrap_or_default(),
            end: by_time.last().map(fmt).unwrap_or_default(),
        };

        let n = entries.len() as f64;
        let averages = Parameter::ALL
            .into_iter()
            .map(|p| (p, entries.iter().map(|e| e.value(p)).sum::<f64>() / n))
            .collect();

        HistoryStats { total_entries: entries.len(), date_range, averages }
    }

    pub fn clear(&mut self, pool_id: &str) {
        self.pools.remove(pool_id);
    }

    pub fn pool_ids(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
