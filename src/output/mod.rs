//! Operator-facing progress output
//!
//! Crawl and refresh activity is the only failure-observability surface the
//! system exposes, so every progress line lands in a bounded ring buffer the
//! dashboard layer can stream, and is mirrored to the tracing subscriber.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Entries retained by the ring buffer
pub const LOG_CAPACITY: usize = 1000;

/// Bounded ring buffer of timestamped progress lines
pub struct LogBuffer {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a timestamped line, evicting the oldest entry when full
    pub fn push(&self, line: &str) {
        tracing::info!("{}", line);

        let stamped = format!("[{}] {}", Utc::now().to_rfc3339(), line);
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(stamped);
    }

    /// Copies the current buffer contents, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(LOG_CAPACITY)
    }
}
