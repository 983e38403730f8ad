//! Demo Mode - Simulated board for testing without hardware
//!
//! Emits random instruction tokens at a fixed pace and can be opened like
//! any other port (`demo://` or `demo://<seed>`).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::thread;
use std::time::{Duration, Instant};

use crate::decoder::Instruction;
use crate::link::{Channel, DEFAULT_READ_TIMEOUT_MS};

/// Opcodes the simulated board sends
const DEMO_OPCODES: &[u8] = b"JWUD12";

/// Default time between simulated instructions
pub const DEFAULT_DEMO_INTERVAL_MS: u64 = 500;

/// Simulated board that emits one random instruction per interval
pub struct DemoEmitter {
    /// Random number generator
    rng: StdRng,
    /// Time between instructions
    interval: Duration,
    /// Upper bound on a single read
    timeout: Duration,
    /// When the next instruction is due
    next_emit_at: Instant,
    /// Bytes generated but not yet read
    outgoing: VecDeque<u8>,
    /// Instructions generated so far
    emitted: u64,
}

impl Default for DemoEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoEmitter {
    /// Create an emitter with a random seed
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create an emitter whose token sequence is reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        let interval = Duration::from_millis(DEFAULT_DEMO_INTERVAL_MS);
        Self {
            rng,
            interval,
            timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            next_emit_at: Instant::now() + interval,
            outgoing: VecDeque::new(),
            emitted: 0,
        }
    }

    /// Set the time between instructions
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.next_emit_at = Instant::now() + interval;
        self
    }

    /// Generate the next instruction immediately
    pub fn next_instruction(&mut self) -> Instruction {
        let opcode = DEMO_OPCODES[self.rng.gen_range(0..DEMO_OPCODES.len())];
        let operand = self.rng.gen_range(b'0'..=b'9');
        self.emitted += 1;
        Instruction::new(opcode, operand)
    }

    /// Number of instructions generated so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Read for DemoEmitter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outgoing.is_empty() {
            let now = Instant::now();
            if now < self.next_emit_at {
                let wait = self.next_emit_at - now;
                if wait > self.timeout {
                    thread::sleep(self.timeout);
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no demo data yet"));
                }
                thread::sleep(wait);
            }

            let instruction = self.next_instruction();
            self.outgoing.extend(instruction.bytes());
            // Don't burst to catch up after a long pause
            self.next_emit_at = (self.next_emit_at + self.interval).max(Instant::now());
        }

        let n = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Channel for DemoEmitter {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.outgoing.clear();
        Ok(())
    }
}
