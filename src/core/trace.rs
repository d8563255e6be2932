//! Execution trace for a behavior tree.
//!
//! The tree records one event per lifecycle transition. The log is bounded;
//! once full, the oldest events are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::TraceConfig;
use crate::core::status::Outcome;
use crate::core::task::TaskId;

/// Individual lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    /// Tree tick in which the event happened (0 before the first step).
    pub tick: u64,
    /// Task the event belongs to.
    pub task: TaskId,
    /// Task name at the time of the event.
    pub name: String,
    /// What happened.
    pub event_type: EventType,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl TraceEvent {
    /// Create a new trace event.
    pub fn new(tick: u64, task: TaskId, name: impl Into<String>, event_type: EventType) -> Self {
        Self {
            tick,
            task,
            name: name.into(),
            event_type,
            timestamp: Utc::now(),
        }
    }
}

/// Event type enum for trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new activation began.
    Started,
    /// Task reported it is still running.
    Running,
    /// Task reported success.
    Succeeded,
    /// Task reported failure.
    Failed,
    /// Task was cancelled from outside.
    Cancelled,
    /// Task was reset to fresh.
    Reset,
}

impl From<Outcome> for EventType {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Running => EventType::Running,
            Outcome::Success => EventType::Succeeded,
            Outcome::Failure => EventType::Failed,
        }
    }
}

/// Bounded in-memory trace log.
#[derive(Debug, Clone)]
pub struct TraceLog {
    enabled: bool,
    capacity: usize,
    events: VecDeque<TraceEvent>,
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::from_config(&TraceConfig::default())
    }
}

impl TraceLog {
    /// Create a trace log from configuration.
    pub fn from_config(config: &TraceConfig) -> Self {
        Self {
            enabled: config.enabled,
            capacity: config.capacity,
            events: VecDeque::new(),
        }
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            capacity: 0,
            events: VecDeque::new(),
        }
    }

    /// Whether events are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an event, dropping the oldest one when at capacity.
    pub fn record(&mut self, tick: u64, task: TaskId, name: &str, event_type: EventType) {
        if !self.enabled || self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events
            .push_back(TraceEvent::new(tick, task, name, event_type));
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    /// Number of recorded events of `event_type` for `task`.
    pub fn count(&self, task: TaskId, event_type: EventType) -> usize {
        self.events
            .iter()
            .filter(|e| e.task == task && e.event_type == event_type)
            .count()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events are retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all retained events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Copy the retained events into a vector.
    pub fn to_vec(&self) -> Vec<TraceEvent> {
        self.events.iter().cloned().collect()
    }

    /// An empty log with the same settings.
    pub(crate) fn empty_like(&self) -> Self {
        Self {
            enabled: self.enabled,
            capacity: self.capacity,
            events: VecDeque::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with_capacity(capacity: usize) -> TraceLog {
        TraceLog::from_config(&TraceConfig {
            enabled: true,
            capacity,
        })
    }

    #[test]
    fn test_record_and_count() {
        let mut log = log_with_capacity(16);
        let task = TaskId::new(0);

        log.record(1, task, "leaf", EventType::Started);
        log.record(1, task, "leaf", EventType::Succeeded);
        log.record(2, task, "leaf", EventType::Started);

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(task, EventType::Started), 2);
        assert_eq!(log.count(task, EventType::Succeeded), 1);
        assert_eq!(log.count(TaskId::new(1), EventType::Started), 0);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = log_with_capacity(2);
        let task = TaskId::new(0);

        log.record(1, task, "leaf", EventType::Started);
        log.record(2, task, "leaf", EventType::Running);
        log.record(3, task, "leaf", EventType::Succeeded);

        let ticks: Vec<u64> = log.events().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![2, 3]);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let mut log = TraceLog::disabled();
        log.record(1, TaskId::new(0), "leaf", EventType::Started);
        assert!(log.is_empty());
        assert!(!log.is_enabled());
    }

    #[test]
    fn test_event_type_from_outcome() {
        assert_eq!(EventType::from(Outcome::Success), EventType::Succeeded);
        assert_eq!(EventType::from(Outcome::Failure), EventType::Failed);
        assert_eq!(EventType::from(Outcome::Running), EventType::Running);
    }

    #[test]
    fn test_trace_event_serialization() {
        let event = TraceEvent::new(4, TaskId::new(2), "repeat", EventType::Started);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"started\""));
        assert!(json.contains("\"task\":2"));

        let parsed: TraceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_clear() {
        let mut log = log_with_capacity(4);
        log.record(1, TaskId::new(0), "leaf", EventType::Started);
        log.clear();
        assert!(log.is_empty());
    }
}
