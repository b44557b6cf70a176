//! Audit Log Sink
//!
//! Every decision, parse result, retry and trade outcome is written through
//! this trait so a negotiation can be reconstructed after the game.

use std::sync::Mutex;

/// Line-oriented audit log
pub trait LogSink: Send + Sync {
    /// Buffer a line
    fn add(&self, line: String);

    /// Make buffered lines durable
    fn flush(&self) {}

    /// Final write for the owning game
    fn save(&self) {
        self.flush();
    }
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn add(&self, _line: String) {}
}

/// Keeps lines in memory (for development/testing)
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// True if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn add(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.add("first".into());
        sink.add("second".into());
        sink.save();
        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert!(sink.contains("sec"));
    }
}
