//! Serial Link
//!
//! Opens the connection to the external board, runs the background
//! listener and buffers received bytes for the decoder.

mod buffer;
mod error;
pub mod opener;
mod retry;
pub mod serial;
mod serial_link;
mod settings;
pub mod stream;

pub use buffer::{ByteBuffer, ByteSource};
pub use error::LinkError;
pub use opener::{PortOpener, SystemPortOpener};
pub use retry::{Backoff, RetryPolicy, MAX_BACKOFF_MULTIPLIER};
pub use serial::{find_arduino_ports, list_ports, PortInfo};
pub use serial_link::{LinkState, SerialLink};
pub use settings::{DataBits, EventMask, Parity, PortSettings, StopBits};
pub use stream::{Channel, SerialChannel, TcpChannel};

/// Default baud rate for the board sketch
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default upper bound on one blocking listener read, in milliseconds.
/// Teardown waits at most about this long for the listener to exit.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;

/// Largest accepted read timeout, which also bounds how long `close_port` blocks
pub const MAX_READ_TIMEOUT_MS: u64 = 1000;

/// Largest chunk the listener reads in one call
pub const READ_CHUNK_SIZE: usize = 256;

/// Consecutive failed or empty reads after which the listener gives up
pub const LISTENER_FAILURE_THRESHOLD: u32 = 16;
