//! Instruction Decoding
//!
//! Frames the raw byte stream into two-byte [`Instruction`]s and queues them
//! for the consumer.
//!
//! Framing is positional: every two consecutive bytes form one instruction.
//! When a pass ends on an odd byte, that byte is withheld and becomes the
//! first half of the next instruction on a later pass, so a partial read
//! never shifts the pairing. With `stale_after` set, a withheld byte is
//! discarded when its partner was received more than that long after it,
//! which resynchronises the stream after a byte was lost on the wire. Ages
//! are measured between arrival times, so a slow consumer never triggers it.

mod instruction;
mod queue;

pub use instruction::Instruction;
pub use queue::{DeliveryQueue, OverflowPolicy};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::link::ByteSource;

/// Default delivery queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Decoder and delivery queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Maximum queued instructions (`None` = unbounded)
    pub queue_capacity: Option<usize>,
    /// Behaviour when the queue is full
    pub overflow: OverflowPolicy,
    /// Discard a withheld odd byte older than this many milliseconds
    pub stale_after_ms: Option<u64>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            overflow: OverflowPolicy::DropNewest,
            stale_after_ms: None,
        }
    }
}

/// Turns buffered bytes into queued instructions, once per consumer tick
#[derive(Debug)]
pub struct InstructionDecoder {
    queue: Arc<DeliveryQueue>,
    pending: Option<(u8, Instant)>,
    stale_after: Option<Duration>,
    resyncs: u64,
}

impl Default for InstructionDecoder {
    fn default() -> Self {
        Self::new(&DecoderSettings::default())
    }
}

impl InstructionDecoder {
    /// Create a decoder with an empty queue and no withheld byte
    pub fn new(settings: &DecoderSettings) -> Self {
        Self {
            queue: Arc::new(DeliveryQueue::new(
                settings.queue_capacity,
                settings.overflow,
            )),
            pending: None,
            stale_after: settings.stale_after_ms.map(Duration::from_millis),
            resyncs: 0,
        }
    }

    /// Pair every available byte into instructions and enqueue them.
    ///
    /// Returns how many instructions were enqueued. Never blocks.
    pub fn poll_and_decode<S: ByteSource + ?Sized>(&mut self, source: &S) -> usize {
        let mut enqueued = 0;

        loop {
            let (first, first_at) = match self.pending.take() {
                Some(pending) => pending,
                None => match source.take_next_stamped() {
                    Some(stamped) => stamped,
                    None => break,
                },
            };

            let Some((second, second_at)) = source.take_next_stamped() else {
                tracing::trace!("withholding odd byte {:#04x} until its partner arrives", first);
                self.pending = Some((first, first_at));
                break;
            };

            if self.is_stale(first_at, second_at) {
                self.resyncs += 1;
                tracing::warn!(
                    "discarding stale byte {:?} to resynchronise framing",
                    first as char
                );
                self.pending = Some((second, second_at));
                continue;
            }

            let instruction = Instruction::new(first, second);
            tracing::debug!("instruction {}", instruction);
            if self.queue.push(instruction) {
                enqueued += 1;
            }
        }

        enqueued
    }

    /// Whether `first` arrived too long before its partner
    fn is_stale(&self, first_at: Instant, second_at: Instant) -> bool {
        self.stale_after
            .map(|limit| second_at.saturating_duration_since(first_at) > limit)
            .unwrap_or(false)
    }

    /// Pop the oldest undelivered instruction without blocking
    pub fn next_instruction(&self) -> Option<Instruction> {
        self.queue.pop()
    }

    /// Shared handle to the delivery queue, for a consumer on another thread
    pub fn queue(&self) -> Arc<DeliveryQueue> {
        Arc::clone(&self.queue)
    }

    /// Instructions waiting to be delivered
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The withheld odd byte, if any
    pub fn pending_byte(&self) -> Option<u8> {
        self.pending.map(|(b, _)| b)
    }

    /// Withheld bytes discarded as stale
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Instructions lost to queue overflow
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }

    /// Forget the withheld byte; queued instructions are kept
    pub fn discard_pending(&mut self) {
        if let Some((b, _)) = self.pending.take() {
            tracing::debug!("discarding withheld byte {:#04x}", b);
        }
    }

    /// Forget the withheld byte and every undelivered instruction
    pub fn reset(&mut self) {
        self.pending = None;
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ByteBuffer;
    use std::thread;

    fn drain(decoder: &InstructionDecoder) -> Vec<String> {
        std::iter::from_fn(|| decoder.next_instruction())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_even_input_pairs_in_order() {
        let buf = ByteBuffer::new();
        buf.extend(b"J1W9U0");
        let mut decoder = InstructionDecoder::default();
        assert_eq!(decoder.poll_and_decode(&buf), 3);
        assert_eq!(drain(&decoder), vec!["J1", "W9", "U0"]);
        assert_eq!(decoder.pending_byte(), None);
    }

    #[test]
    fn test_odd_byte_waits_for_partner() {
        let buf = ByteBuffer::new();
        let mut decoder = InstructionDecoder::default();

        buf.extend(b"J1W");
        assert_eq!(decoder.poll_and_decode(&buf), 1);
        assert_eq!(decoder.pending_byte(), Some(b'W'));
        assert_eq!(drain(&decoder), vec!["J1"]);

        assert_eq!(decoder.poll_and_decode(&buf), 0);
        assert_eq!(decoder.pending_byte(), Some(b'W'));

        buf.extend(b"9D");
        assert_eq!(decoder.poll_and_decode(&buf), 1);
        assert_eq!(drain(&decoder), vec!["W9"]);
        assert_eq!(decoder.pending_byte(), Some(b'D'));
    }

    #[test]
    fn test_empty_queue_returns_none() {
        let decoder = InstructionDecoder::default();
        assert_eq!(decoder.next_instruction(), None);
    }

    #[test]
    fn test_stale_byte_is_discarded() {
        let buf = ByteBuffer::new();
        let mut decoder = InstructionDecoder::new(&DecoderSettings {
            stale_after_ms: Some(1),
            ..DecoderSettings::default()
        });

        buf.extend(b"x");
        decoder.poll_and_decode(&buf);
        assert_eq!(decoder.pending_byte(), Some(b'x'));

        thread::sleep(Duration::from_millis(20));
        buf.extend(b"J1");
        assert_eq!(decoder.poll_and_decode(&buf), 1);
        assert_eq!(decoder.resync_count(), 1);
        assert_eq!(decoder.pending_byte(), None);
        assert_eq!(drain(&decoder), vec!["J1"]);
    }

    #[test]
    fn test_stale_discard_realigns_following_pairs() {
        let buf = ByteBuffer::new();
        let mut decoder = InstructionDecoder::new(&DecoderSettings {
            stale_after_ms: Some(1),
            ..DecoderSettings::default()
        });

        buf.extend(b"x");
        decoder.poll_and_decode(&buf);
        thread::sleep(Duration::from_millis(20));
        // Without the discard this would frame as "xJ", "1W" with '9' left over
        buf.extend(b"J1W9");
        assert_eq!(decoder.poll_and_decode(&buf), 2);
        assert_eq!(drain(&decoder), vec!["J1", "W9"]);
        assert_eq!(decoder.pending_byte(), None);
    }

    #[test]
    fn test_slow_consumer_does_not_discard() {
        let buf = ByteBuffer::new();
        let mut decoder = InstructionDecoder::new(&DecoderSettings {
            stale_after_ms: Some(20),
            ..DecoderSettings::default()
        });

        buf.extend(b"J");
        decoder.poll_and_decode(&buf);
        buf.extend(b"1W9");
        // Consumer stalls well past the limit after the partner was received
        thread::sleep(Duration::from_millis(40));

        assert_eq!(decoder.poll_and_decode(&buf), 2);
        assert_eq!(decoder.resync_count(), 0);
        assert_eq!(drain(&decoder), vec!["J1", "W9"]);
        assert_eq!(decoder.pending_byte(), None);
    }

    #[test]
    fn test_staleness_uses_arrival_times() {
        let buf = ByteBuffer::new();
        let mut decoder = InstructionDecoder::new(&DecoderSettings {
            stale_after_ms: Some(20),
            ..DecoderSettings::default()
        });

        let start = Instant::now();
        buf.extend_at(b"x", start);
        buf.extend_at(b"J1", start + Duration::from_millis(25));
        buf.extend_at(b"W9", start + Duration::from_millis(30));

        assert_eq!(decoder.poll_and_decode(&buf), 2);
        assert_eq!(decoder.resync_count(), 1);
        assert_eq!(drain(&decoder), vec!["J1", "W9"]);
    }

    #[test]
    fn test_reset() {
        let buf = ByteBuffer::new();
        buf.extend(b"J1W");
        let mut decoder = InstructionDecoder::default();
        decoder.poll_and_decode(&buf);
        decoder.reset();
        assert_eq!(decoder.pending_byte(), None);
        assert_eq!(decoder.queued(), 0);
    }

    #[test]
    fn test_bounded_queue_counts_drops() {
        let buf = ByteBuffer::new();
        buf.extend(b"A1A2A3A4");
        let mut decoder = InstructionDecoder::new(&DecoderSettings {
            queue_capacity: Some(3),
            overflow: OverflowPolicy::DropNewest,
            stale_after_ms: None,
        });
        assert_eq!(decoder.poll_and_decode(&buf), 3);
        assert_eq!(decoder.dropped_count(), 1);
        assert_eq!(drain(&decoder), vec!["A1", "A2", "A3"]);
    }
}
