//! Outbound message queue
//!
//! The autonomous loop, timers, and proactive subsystems never speak
//! directly. They push here, and the front-end drains on idle ticks so
//! queued thoughts come out when the user isn't mid-sentence.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Cap per priority band. Beyond this the oldest message is dropped;
/// a backlog of stale proactive chatter is worse than losing some.
const MAX_PER_PRIORITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub text: String,
    pub priority: MessagePriority,
    /// Unix timestamp seconds.
    pub enqueued_at: i64,
}

#[derive(Default)]
struct Inner {
    high: VecDeque<QueuedMessage>,
    medium: VecDeque<QueuedMessage>,
    low: VecDeque<QueuedMessage>,
}

impl Inner {
    fn band_mut(&mut self, p: MessagePriority) -> &mut VecDeque<QueuedMessage> {
        match p {
            MessagePriority::High => &mut self.high,
            MessagePriority::Medium => &mut self.medium,
            MessagePriority::Low => &mut self.low,
        }
    }
}

/// FIFO within priority; pop order is high, then medium, then low.
#[derive(Default)]
pub struct MessageQueue {
    inner: Mutex<Inner>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: impl Into<String>, priority: MessagePriority) {
        let msg = QueuedMessage {
            text: text.into(),
            priority,
            enqueued_at: chrono::Utc::now().timestamp(),
        };
        let mut inner = self.inner.lock().unwrap();
        let band = inner.band_mut(priority);
        if band.len() >= MAX_PER_PRIORITY {
            band.pop_front();
            tracing::warn!("message queue full at {:?}, dropping oldest", priority);
        }
        band.push_back(msg);
    }

    /// Pop the next message, highest priority band first.
    pub fn pop(&self) -> Option<QueuedMessage> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .high
            .pop_front()
            .or_else(|| inner.medium.pop_front())
            .or_else(|| inner.low.pop_front())
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.high.len() + inner.medium.len() + inner.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain up to `max` messages in priority order.
    pub fn drain(&self, max: usize) -> Vec<QueuedMessage> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.pop() {
                Some(m) => out.push(m),
                None => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let q = MessageQueue::new();
        q.push("low one", MessagePriority::Low);
        q.push("high one", MessagePriority::High);
        q.push("medium one", MessagePriority::Medium);
        q.push("high two", MessagePriority::High);

        assert_eq!(q.pop().unwrap().text, "high one");
        assert_eq!(q.pop().unwrap().text, "high two");
        assert_eq!(q.pop().unwrap().text, "medium one");
        assert_eq!(q.pop().unwrap().text, "low one");
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_fifo_within_priority() {
        let q = MessageQueue::new();
        for i in 0..5 {
            q.push(format!("msg {}", i), MessagePriority::Medium);
        }
        for i in 0..5 {
            assert_eq!(q.pop().unwrap().text, format!("msg {}", i));
        }
    }

    #[test]
    fn test_drain_respects_max() {
        let q = MessageQueue::new();
        for i in 0..10 {
            q.push(format!("m{}", i), MessagePriority::Low);
        }
        let drained = q.drain(3);
        assert_eq!(drained.len(), 3);
        assert_eq!(q.len(), 7);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let q = MessageQueue::new();
        for i in 0..(MAX_PER_PRIORITY + 5) {
            q.push(format!("m{}", i), MessagePriority::Low);
        }
        assert_eq!(q.len(), MAX_PER_PRIORITY);
        // The first five were dropped
        assert_eq!(q.pop().unwrap().text, "m5");
    }
}
