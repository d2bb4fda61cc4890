// Activity log state
//
// The LogBook wraps the user-facing log sequence with thread-safe access using
// Arc<RwLock<T>> and broadcasts every appended event to subscribers (the front end).

use crate::models::{LogEvent, Severity};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Maximum number of retained log events.
pub const MAX_LOGS: usize = 1000;

/// Number of oldest events evicted in one pass when [`MAX_LOGS`] is exceeded.
pub const TRIM_COUNT: usize = 200;

/// Bounded, append-only sequence of log events.
///
/// Overflow evicts a whole block of the oldest entries at once so that the
/// amortized cost of an append stays constant.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    events: VecDeque<LogEvent>,
    max_len: usize,
    trim_count: usize,
    evicted: usize,
}

impl LogBuffer {
    pub fn new(max_len: usize, trim_count: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_len + 1),
            max_len,
            trim_count: trim_count.clamp(1, max_len.max(1)),
            evicted: 0,
        }
    }

    /// Append an event, returning how many old events were evicted.
    pub fn push(&mut self, event: LogEvent) -> usize {
        self.events.push_back(event);
        if self.events.len() <= self.max_len {
            return 0;
        }

        let count = self.trim_count.min(self.events.len());
        self.events.drain(..count);
        self.evicted += count;
        count
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total number of events evicted since creation.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(MAX_LOGS, TRIM_COUNT)
    }
}

/// Shared activity log with event emission.
///
/// This is the log sink every engine component writes to:
/// - [`push()`](Self::push) appends, mirrors into `tracing`, and broadcasts
/// - [`snapshot()`](Self::snapshot) copies the retained events
/// - [`subscribe()`](Self::subscribe) streams future events to a front end
///
/// Cloning is cheap; clones share the same buffer and channel.
#[derive(Clone)]
pub struct LogBook {
    buffer: Arc<RwLock<LogBuffer>>,
    event_tx: broadcast::Sender<LogEvent>,
}

impl LogBook {
    /// Create a LogBook with the default capacity and a broadcast buffer of 256 events
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOGS, TRIM_COUNT)
    }

    pub fn with_capacity(max_len: usize, trim_count: usize) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            buffer: Arc::new(RwLock::new(LogBuffer::new(max_len, trim_count))),
            event_tx,
        }
    }

    /// Append an event.
    pub fn push(&self, event: LogEvent) {
        mirror_to_tracing(&event);

        let evicted = {
            let mut buffer = self.buffer.write().unwrap_or_else(PoisonError::into_inner);
            buffer.push(event.clone())
        };

        if evicted > 0 {
            tracing::debug!("Evicted {} old log events", evicted);
        }

        // Ignore send errors - it's OK if no one is listening
        let _ = self.event_tx.send(event);
    }

    pub fn extend(&self, events: impl IntoIterator<Item = LogEvent>) {
        for event in events {
            self.push(event);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogEvent::info(message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(LogEvent::success(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(LogEvent::warning(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogEvent::error(message));
    }

    /// Copy of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.read(|buffer| buffer.iter().cloned().collect())
    }

    /// Execute a function with read access to the buffer
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&LogBuffer) -> R,
    {
        let buffer = self.buffer.read().unwrap_or_else(PoisonError::into_inner);
        f(&buffer)
    }

    pub fn len(&self) -> usize {
        self.read(LogBuffer::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(LogBuffer::is_empty)
    }

    /// Drop all retained events ("日志已清空").
    pub fn clear(&self) {
        self.buffer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Subscribe to events appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for LogBook {
    fn default() -> Self {
        Self::new()
    }
}

fn mirror_to_tracing(event: &LogEvent) {
    match event.severity {
        Severity::Error => tracing::error!(target: "upx_tools::activity", "{}", event.message),
        Severity::Warning => tracing::warn!(target: "upx_tools::activity", "{}", event.message),
        Severity::Hint => tracing::debug!(target: "upx_tools::activity", "{}", event.message),
        Severity::Info | Severity::Success => {
            tracing::info!(target: "upx_tools::activity", "{}", event.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_under_capacity_keeps_everything() {
        let mut buffer = LogBuffer::new(10, 3);
        for i in 0..10 {
            assert_eq!(buffer.push(LogEvent::info(format!("line {}", i))), 0);
        }
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.evicted(), 0);
    }

    #[test]
    fn test_overflow_evicts_one_block() {
        let mut buffer = LogBuffer::new(10, 3);
        for i in 0..10 {
            buffer.push(LogEvent::info(format!("line {}", i)));
        }

        let evicted = buffer.push(LogEvent::info("line 10"));
        assert_eq!(evicted, 3);
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.iter().next().unwrap().message, "line 3");
        assert_eq!(buffer.iter().last().unwrap().message, "line 10");
    }

    #[test]
    fn test_default_capacity_never_drops_below_floor() {
        let mut buffer = LogBuffer::default();
        for i in 0..=MAX_LOGS {
            buffer.push(LogEvent::info(format!("{}", i)));
        }
        assert_eq!(buffer.len(), MAX_LOGS + 1 - TRIM_COUNT);
        assert!(buffer.len() >= MAX_LOGS - TRIM_COUNT);

        // The next overflow only happens after the buffer refills
        for i in 0..(TRIM_COUNT - 1) {
            assert_eq!(buffer.push(LogEvent::info(format!("more {}", i))), 0);
        }
        assert_eq!(buffer.len(), MAX_LOGS);
    }

    #[test]
    fn test_log_book_broadcasts() {
        let book = LogBook::new();
        let mut rx = book.subscribe();

        book.success("done");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.message, "done");
        assert_eq!(event.severity, Severity::Success);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_log_book_clones_share_buffer() {
        let book = LogBook::new();
        let other = book.clone();

        other.warning("careful");
        assert_eq!(book.snapshot()[0].message, "careful");

        book.clear();
        assert!(other.is_empty());
    }
}
