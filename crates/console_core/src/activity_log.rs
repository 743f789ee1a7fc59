//! Bounded operator-facing activity log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Oldest entries are evicted once the log holds this many.
pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub direction: LogDirection,
    pub text: String,
}

/// FIFO buffer of the most recent console activity, capped at [`LOG_CAPACITY`].
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }

    /// Stamps the current instant and appends, evicting the oldest entry when
    /// the buffer is full. Returns the appended entry for fan-out.
    pub fn append(&mut self, direction: LogDirection, text: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Utc::now(),
            direction,
            text: text.into(),
        };
        self.entries.push_back(entry.clone());
        if self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
        entry
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_arrival_order() {
        let mut log = ActivityLog::new();
        log.append(LogDirection::Sent, "first");
        log.append(LogDirection::Received, "second");
        let texts: Vec<&str> = log.iter().map(|entry| entry.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn overflow_evicts_strictly_oldest() {
        let mut log = ActivityLog::new();
        for n in 1..=55 {
            log.append(LogDirection::Sent, format!("entry {n}"));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        let texts: Vec<String> = log.iter().map(|entry| entry.text.clone()).collect();
        assert_eq!(texts.first().map(String::as_str), Some("entry 6"));
        assert_eq!(texts.last().map(String::as_str), Some("entry 55"));
        for (offset, text) in texts.iter().enumerate() {
            assert_eq!(text, &format!("entry {}", offset + 6));
        }
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut log = ActivityLog::new();
        log.append(LogDirection::Sent, "something");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.iter().count(), 0);
    }
}
