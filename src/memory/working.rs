//! Tier 1 — Working Memory: a fixed-capacity ring of recent messages.
//!
//! Grounded in `cortex-memory::working::WorkingMemorySystem`'s `DashMap` +
//! `parking_lot::RwLock` concurrency shape, adapted from byte/priority-score
//! eviction to the spec's simpler fixed-count FIFO ring (oldest evicted
//! first, no priority weighting) matching
//! `original_source/runtime/memory/systems/ProductionMemorySystem.py`'s
//! `WorkingMemory` (a `collections.deque(maxlen=...)`).

use std::collections::VecDeque;

use parking_lot::RwLock;

use super::message::Message;

/// Bounded, FIFO-eviction message buffer. All reads are snapshot copies
/// taken under the lock; appends are O(1) amortized.
pub struct WorkingMemory {
    capacity: usize,
    messages: RwLock<VecDeque<Message>>,
}

impl WorkingMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a message, evicting the oldest if at capacity.
    pub fn add(&self, message: Message) {
        let mut messages = self.messages.write();
        if messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// A snapshot copy of all currently held messages, oldest first.
    pub fn get_messages(&self) -> Vec<Message> {
        self.messages.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    /// Replace the entire buffer (used by consolidation's atomic swap).
    /// Truncates to the most recent `capacity` messages if `new_messages`
    /// exceeds it.
    pub fn replace_all(&self, new_messages: Vec<Message>) {
        let mut messages = self.messages.write();
        messages.clear();
        let start = new_messages.len().saturating_sub(self.capacity);
        messages.extend(new_messages.into_iter().skip(start));
    }

    pub fn stats(&self) -> WorkingStats {
        let messages = self.messages.read();
        WorkingStats {
            size: messages.len(),
            capacity: self.capacity,
            utilization: messages.len() as f64 / self.capacity as f64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkingStats {
    pub size: usize,
    pub capacity: usize,
    pub utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::message::Role;

    #[test]
    fn append_is_fifo_up_to_capacity() {
        let memory = WorkingMemory::new(2);
        memory.add(Message::new(Role::User, "one"));
        memory.add(Message::new(Role::User, "two"));
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn capacity_plus_one_evicts_oldest_not_newest() {
        let memory = WorkingMemory::new(2);
        memory.add(Message::new(Role::User, "one"));
        memory.add(Message::new(Role::User, "two"));
        memory.add(Message::new(Role::User, "three"));

        let messages = memory.get_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "two");
        assert_eq!(messages[1].content, "three");
    }

    #[test]
    fn replace_all_truncates_to_capacity() {
        let memory = WorkingMemory::new(2);
        let messages = vec![
            Message::new(Role::User, "one"),
            Message::new(Role::User, "two"),
            Message::new(Role::User, "three"),
        ];
        memory.replace_all(messages);
        let got = memory.get_messages();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].content, "two");
        assert_eq!(got[1].content, "three");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let memory = WorkingMemory::new(5);
        memory.add(Message::new(Role::User, "one"));
        memory.clear();
        assert!(memory.is_empty());
    }
}
