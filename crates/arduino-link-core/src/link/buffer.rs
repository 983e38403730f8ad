//! Byte buffer shared between the listener thread and the decoder

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Anything the decoder can pull raw bytes from
pub trait ByteSource {
    /// Pop the oldest buffered byte without blocking
    fn take_next_byte(&self) -> Option<u8>;

    /// Pop the oldest buffered byte together with the time it was received.
    ///
    /// Sources that do not track arrival report the time of the call.
    fn take_next_stamped(&self) -> Option<(u8, Instant)> {
        self.take_next_byte().map(|b| (b, Instant::now()))
    }

    /// Number of bytes currently buffered. Advisory: a concurrent producer
    /// may change it as soon as this returns.
    fn bytes_available(&self) -> usize;
}

#[derive(Debug, Default)]
struct BufferState {
    bytes: VecDeque<u8>,
    /// Arrival time and remaining length of each appended chunk, oldest first
    arrivals: VecDeque<(Instant, usize)>,
    sealed: bool,
}

impl BufferState {
    fn pop(&mut self) -> Option<(u8, Instant)> {
        let byte = self.bytes.pop_front()?;
        let (at, remaining) = self.arrivals.front_mut()?;
        let at = *at;
        *remaining -= 1;
        if *remaining == 0 {
            self.arrivals.pop_front();
        }
        Some((byte, at))
    }
}

/// FIFO byte queue with one producer (the listener) and one consumer (the decoder)
///
/// Every appended chunk is stamped with the time it arrived. Once sealed,
/// appends are refused. Sealing and appending take the same lock, so no
/// byte can land after `seal` returns.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    state: Mutex<BufferState>,
}

impl ByteBuffer {
    /// Create an empty, unsealed buffer
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // A panic while holding the lock cannot leave a VecDeque half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append bytes in order, stamped with the current time.
    /// Returns false (and appends nothing) if sealed.
    pub fn extend(&self, data: &[u8]) -> bool {
        self.extend_at(data, Instant::now())
    }

    /// Append bytes in order, stamped with `received_at`
    pub fn extend_at(&self, data: &[u8], received_at: Instant) -> bool {
        let mut state = self.lock();
        if state.sealed {
            return false;
        }
        if data.is_empty() {
            return true;
        }
        state.bytes.extend(data.iter().copied());
        state.arrivals.push_back((received_at, data.len()));
        true
    }

    /// Refuse all further appends
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    /// Accept appends again
    pub fn unseal(&self) {
        self.lock().sealed = false;
    }

    /// Drop every buffered byte
    pub fn clear(&self) {
        let mut state = self.lock();
        state.bytes.clear();
        state.arrivals.clear();
    }
}

impl ByteSource for ByteBuffer {
    fn take_next_byte(&self) -> Option<u8> {
        self.lock().pop().map(|(b, _)| b)
    }

    fn take_next_stamped(&self) -> Option<(u8, Instant)> {
        self.lock().pop()
    }

    fn bytes_available(&self) -> usize {
        self.lock().bytes.len()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for std::sync::Arc<T> {
    fn take_next_byte(&self) -> Option<u8> {
        (**self).take_next_byte()
    }

    fn take_next_stamped(&self) -> Option<(u8, Instant)> {
        (**self).take_next_stamped()
    }

    fn bytes_available(&self) -> usize {
        (**self).bytes_available()
    }
}
