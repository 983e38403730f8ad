//! Delivery queue between the decoder and the consumer

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::Instruction;

/// What to do when a bounded queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the new instruction; everything already queued is kept
    #[default]
    DropNewest,
    /// Evict the oldest queued instruction to make room
    DropOldest,
}

/// FIFO of decoded instructions awaiting the consumer
///
/// Lock-protected so the decoder may run on a different thread from the
/// consumer.
#[derive(Debug)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<Instruction>>,
    capacity: Option<usize>,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl DeliveryQueue {
    /// Queue with no capacity limit
    pub fn unbounded() -> Self {
        Self::new(None, OverflowPolicy::default())
    }

    /// Queue holding at most `capacity` instructions (`None` or 0 = unbounded)
    pub fn new(capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        let capacity = capacity.filter(|&c| c > 0);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.unwrap_or(16).min(1024))),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instruction>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue; returns false if the instruction itself was dropped
    pub fn push(&self, instruction: Instruction) -> bool {
        let mut items = self.lock();
        if let Some(cap) = self.capacity {
            if items.len() >= cap {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                match self.policy {
                    OverflowPolicy::DropNewest => {
                        tracing::warn!(
                            "delivery queue full ({}), dropping {} ({} dropped so far)",
                            cap,
                            instruction,
                            total
                        );
                        return false;
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = items.pop_front() {
                            tracing::warn!(
                                "delivery queue full ({}), evicting {} ({} dropped so far)",
                                cap,
                                evicted,
                                total
                            );
                        }
                    }
                }
            }
        }
        items.push_back(instruction);
        true
    }

    /// Dequeue the oldest instruction without blocking
    pub fn pop(&self) -> Option<Instruction> {
        self.lock().pop_front()
    }

    /// Dequeue everything, oldest first
    pub fn drain(&self) -> Vec<Instruction> {
        self.lock().drain(..).collect()
    }

    /// Queued instructions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every queued instruction (not counted as overflow)
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Capacity limit, if bounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Instructions lost to overflow since creation
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(s: &str) -> Instruction {
        Instruction::from_bytes(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_fifo() {
        let q = DeliveryQueue::unbounded();
        q.push(ins("J1"));
        q.push(ins("W9"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(ins("J1")));
        assert_eq!(q.pop(), Some(ins("W9")));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_drop_newest_keeps_queued() {
        let q = DeliveryQueue::new(Some(2), OverflowPolicy::DropNewest);
        assert!(q.push(ins("A1")));
        assert!(q.push(ins("A2")));
        assert!(!q.push(ins("A3")));
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.drain(), vec![ins("A1"), ins("A2")]);
    }

    #[test]
    fn test_drop_oldest_evicts_front() {
        let q = DeliveryQueue::new(Some(2), OverflowPolicy::DropOldest);
        q.push(ins("A1"));
        q.push(ins("A2"));
        assert!(q.push(ins("A3")));
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.drain(), vec![ins("A2"), ins("A3")]);
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let q = DeliveryQueue::new(Some(0), OverflowPolicy::DropNewest);
        assert_eq!(q.capacity(), None);
        for _ in 0..1000 {
            assert!(q.push(ins("U0")));
        }
        assert_eq!(q.len(), 1000);
    }

    #[test]
    fn test_policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&OverflowPolicy::DropOldest).unwrap(),
            "\"drop_oldest\""
        );
    }
}
