use blockq_core::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHistoryEntry {
    pub query: String,
    pub executed_at: DateTime<Utc>,
    pub succeeded: bool,
    pub row_count: usize,
    pub duration_ms: u64,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl QueryHistoryEntry {
    pub fn success(query: impl Into<String>, row_count: usize, duration: Duration, cache_hit: bool) -> Self {
        Self {
            query: query.into(),
            executed_at: Utc::now(),
            succeeded: true,
            row_count,
            duration_ms: duration.as_millis() as u64,
            cache_hit,
            error_kind: None,
        }
    }

    pub fn failure(query: impl Into<String>, kind: ErrorKind, duration: Duration) -> Self {
        Self {
            query: query.into(),
            executed_at: Utc::now(),
            succeeded: false,
            row_count: 0,
            duration_ms: duration.as_millis() as u64,
            cache_hit: false,
            error_kind: Some(kind),
        }
    }
}

/// Bounded, append-only log of one owner's queries. Once full, each append
/// drops the oldest entry.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    entries: VecDeque<QueryHistoryEntry>,
    capacity: usize,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends in completion order. `executed_at` is clamped so it never
    /// goes backwards, even if the wall clock does.
    pub fn push(&mut self, mut entry: QueryHistoryEntry) {
        if let Some(last) = self.entries.back() {
            if entry.executed_at < last.executed_at {
                entry.executed_at = last.executed_at;
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Most recent first.
    pub fn recent(&self) -> Vec<QueryHistoryEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(query: &str) -> QueryHistoryEntry {
        QueryHistoryEntry::success(query, 1, Duration::from_millis(3), false)
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut history = QueryHistory::new(3);
        for q in ["q1", "q2", "q3", "q4", "q5"] {
            history.push(entry(q));
        }

        let queries: Vec<_> = history.recent().into_iter().map(|e| e.query).collect();
        assert_eq!(queries, vec!["q5", "q4", "q3"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_executed_at_is_monotonic() {
        let mut history = QueryHistory::new(10);
        let later = entry("later");
        let mut earlier = entry("earlier");
        earlier.executed_at = later.executed_at - chrono::Duration::seconds(5);

        history.push(later.clone());
        history.push(earlier);

        let recent = history.recent();
        assert_eq!(recent[0].query, "earlier");
        assert_eq!(recent[0].executed_at, later.executed_at);
    }

    #[test]
    fn test_failure_entry() {
        let e = QueryHistoryEntry::failure("SELECT", ErrorKind::Syntax, Duration::ZERO);
        assert!(!e.succeeded);
        assert_eq!(e.error_kind, Some(ErrorKind::Syntax));

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["errorKind"], "syntax_error");
        assert_eq!(json["durationMs"], 0);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history = QueryHistory::new(0);
        history.push(entry("a"));
        history.push(entry("b"));
        assert_eq!(history.len(), 1);
    }
}
