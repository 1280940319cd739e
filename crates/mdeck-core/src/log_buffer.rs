//! Bounded buffer of log lines for the console view

use std::collections::VecDeque;

use crate::types::LogEvent;

/// Default number of retained log lines
pub const DEFAULT_BUFFER_LINES: usize = 500;

/// Rolling log history (FIFO, bounded)
///
/// Appending past `capacity` evicts the oldest lines first. Callers use the
/// returned eviction count to rebase line indices held elsewhere (search).
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogEvent>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LINES)
    }
}

impl LogBuffer {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, returning how many lines were evicted from the front.
    pub fn push(&mut self, event: LogEvent) -> usize {
        self.lines.push_back(event);
        let mut evicted = 0;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&LogEvent> {
        self.lines.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.lines.iter()
    }

    /// Line texts in buffer order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|event| event.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn line(text: String) -> LogEvent {
        LogEvent::output(Platform::IOS, text)
    }

    #[test]
    fn test_append_beyond_capacity_evicts_oldest() {
        let mut buffer = LogBuffer::default();
        let mut evicted = 0;
        for i in 0..=500 {
            evicted += buffer.push(line(format!("line {}", i)));
        }

        assert_eq!(buffer.len(), 500);
        assert_eq!(evicted, 1);
        assert_eq!(buffer.get(0).map(|e| e.text.as_str()), Some("line 1"));
        assert_eq!(buffer.get(499).map(|e| e.text.as_str()), Some("line 500"));
    }

    #[test]
    fn test_push_under_capacity_evicts_nothing() {
        let mut buffer = LogBuffer::new(3);
        assert_eq!(buffer.push(line("a".into())), 0);
        assert_eq!(buffer.push(line("b".into())), 0);
        assert_eq!(buffer.texts().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_capacity_keeps_latest_line() {
        let mut buffer = LogBuffer::new(0);
        buffer.push(line("first".into()));
        buffer.push(line("second".into()));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.texts().collect::<Vec<_>>(), vec!["second"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = LogBuffer::new(3);
        buffer.push(line("a".into()));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
