//! Serial link lifecycle
//!
//! Owns the device channel and the background listener that moves bytes
//! from the device into the shared [`ByteBuffer`].

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::buffer::{ByteBuffer, ByteSource};
use super::opener::{PortOpener, SystemPortOpener};
use super::retry::{Backoff, RetryPolicy};
use super::stream::{is_timeout, Channel};
use super::{LinkError, PortSettings, LISTENER_FAILURE_THRESHOLD, READ_CHUNK_SIZE};

/// Externally visible link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No device handle held
    Closed,
    /// Device open and configured, no listener running
    Open,
    /// Listener thread running
    Listening,
}

struct Listener {
    handle: JoinHandle<Box<dyn Channel>>,
    stop: Arc<AtomicBool>,
}

enum PortState {
    Closed,
    Open(Box<dyn Channel>),
    // The listener owns the channel while it runs and returns it on join
    Listening(Listener),
}

/// A serial connection to the external board
pub struct SerialLink {
    opener: Box<dyn PortOpener>,
    port_name: Option<String>,
    settings: PortSettings,
    state: PortState,
    buffer: Arc<ByteBuffer>,
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink {
    /// Create a closed link using the system opener
    pub fn new() -> Self {
        Self::with_opener(Box::new(SystemPortOpener))
    }

    /// Create a closed link that opens ports through `opener`
    pub fn with_opener(opener: Box<dyn PortOpener>) -> Self {
        Self {
            opener,
            port_name: None,
            settings: PortSettings::default(),
            state: PortState::Closed,
            buffer: Arc::new(ByteBuffer::new()),
        }
    }

    /// Open and configure `port_name`, logging the outcome.
    ///
    /// Returns false on any failure and leaves the link closed; calling it
    /// again simply retries. If a port is already open it is closed first.
    pub fn init_port(&mut self, port_name: &str, settings: &PortSettings) -> bool {
        match self.try_init_port(port_name, settings) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("initPort failed for {}: {}", port_name, e);
                false
            }
        }
    }

    /// Open and configure `port_name`, returning the typed error on failure
    pub fn try_init_port(&mut self, port_name: &str, settings: &PortSettings) -> Result<(), LinkError> {
        if !matches!(self.state, PortState::Closed) {
            tracing::info!(
                "Reopening link: closing {} before opening {}",
                self.port_name.as_deref().unwrap_or("<unknown>"),
                port_name
            );
            self.close_port();
        }

        let channel = self.opener.open(port_name, settings)?;

        self.buffer.clear();
        self.port_name = Some(port_name.to_string());
        self.settings = settings.clone();
        self.state = PortState::Open(channel);
        tracing::info!("initPort success: {}", port_name);
        Ok(())
    }

    /// Open with exponential backoff between attempts (blocking)
    pub fn init_port_with_retry(
        &mut self,
        port_name: &str,
        settings: &PortSettings,
        policy: &RetryPolicy,
    ) -> bool {
        match self.try_init_port_with_retry(port_name, settings, policy) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("initPort failed for {}: {}", port_name, e);
                false
            }
        }
    }

    /// Open with exponential backoff between attempts (blocking), returning
    /// the last error. Invalid settings are not retried.
    pub fn try_init_port_with_retry(
        &mut self,
        port_name: &str,
        settings: &PortSettings,
        policy: &RetryPolicy,
    ) -> Result<(), LinkError> {
        let mut backoff = Backoff::new(policy.clone());
        loop {
            match self.try_init_port(port_name, settings) {
                Ok(()) => return Ok(()),
                Err(e @ LinkError::InvalidSetting(_)) => return Err(e),
                Err(e) => match backoff.record_failure() {
                    Some(delay) => {
                        tracing::debug!(
                            "initPort attempt {} on {} failed ({}), retrying in {:?}",
                            backoff.failures(),
                            port_name,
                            e,
                            delay
                        );
                        thread::sleep(delay);
                    }
                    None => {
                        tracing::debug!("last initPort error on {}: {}", port_name, e);
                        return Err(LinkError::RetriesExhausted {
                            port: port_name.to_string(),
                            attempts: backoff.failures(),
                        });
                    }
                },
            }
        }
    }

    /// Start the background listener, logging the outcome.
    ///
    /// Returns false if the port is not open or a listener is already running.
    pub fn open_listen_thread(&mut self) -> bool {
        match self.try_open_listen_thread() {
            Ok(()) => {
                tracing::info!("OpenListenThread success");
                true
            }
            Err(e) => {
                tracing::warn!("OpenListenThread failed: {}", e);
                false
            }
        }
    }

    /// Start the background listener, returning the typed error on failure
    pub fn try_open_listen_thread(&mut self) -> Result<(), LinkError> {
        self.reap_dead_listener();

        let port_name = self.port_name.clone().unwrap_or_default();
        let channel = match std::mem::replace(&mut self.state, PortState::Closed) {
            PortState::Closed => return Err(LinkError::NotOpen),
            PortState::Listening(listener) => {
                self.state = PortState::Listening(listener);
                return Err(LinkError::AlreadyListening(port_name));
            }
            PortState::Open(channel) => channel,
        };

        let stop = Arc::new(AtomicBool::new(false));
        let buffer = Arc::clone(&self.buffer);
        buffer.unseal();

        let thread_stop = Arc::clone(&stop);
        let thread_port = port_name.clone();
        let spawned = thread::Builder::new()
            .name(format!("arduino-link:{}", port_name))
            .spawn(move || listen(channel, buffer, thread_stop, thread_port));

        match spawned {
            Ok(handle) => {
                self.state = PortState::Listening(Listener { handle, stop });
                Ok(())
            }
            Err(e) => {
                // The channel went down with the closure; the port has to be reopened
                self.buffer.seal();
                Err(LinkError::ThreadSpawn(e.to_string()))
            }
        }
    }

    /// Stop the listener (bounded by the read timeout), then release the device
    pub fn close_port(&mut self) {
        match std::mem::replace(&mut self.state, PortState::Closed) {
            PortState::Closed => {}
            PortState::Open(channel) => {
                drop(channel);
                tracing::info!("Closed {}", self.port_name.as_deref().unwrap_or("<unknown>"));
            }
            PortState::Listening(listener) => {
                // Seal first: once this returns the listener cannot append
                self.buffer.seal();
                listener.stop.store(true, Ordering::Release);
                match listener.handle.join() {
                    Ok(channel) => drop(channel),
                    Err(_) => tracing::warn!("listener thread panicked"),
                }
                tracing::info!(
                    "Stopped listener and closed {}",
                    self.port_name.as_deref().unwrap_or("<unknown>")
                );
            }
        }
    }

    /// Current state. A listener that exited on its own reports `Closed`.
    pub fn state(&self) -> LinkState {
        match &self.state {
            PortState::Closed => LinkState::Closed,
            PortState::Open(_) => LinkState::Open,
            PortState::Listening(l) if l.handle.is_finished() => LinkState::Closed,
            PortState::Listening(_) => LinkState::Listening,
        }
    }

    /// Whether the device is open (listening or not)
    pub fn is_open(&self) -> bool {
        self.state() != LinkState::Closed
    }

    /// Whether a live listener thread is running
    pub fn is_listening(&self) -> bool {
        self.state() == LinkState::Listening
    }

    /// Name of the most recently opened port
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Settings the port was opened with
    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    /// Shared handle to the raw byte buffer
    pub fn buffer(&self) -> Arc<ByteBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Pop the oldest received byte without blocking
    pub fn take_next_byte(&self) -> Option<u8> {
        self.buffer.take_next_byte()
    }

    /// Bytes received but not yet taken (advisory)
    pub fn bytes_available(&self) -> usize {
        self.buffer.bytes_available()
    }

    /// Join a listener that exited by itself (device lost) and mark the link closed
    fn reap_dead_listener(&mut self) {
        let finished = matches!(&self.state, PortState::Listening(l) if l.handle.is_finished());
        if finished {
            if let PortState::Listening(listener) = std::mem::replace(&mut self.state, PortState::Closed) {
                if listener.handle.join().is_err() {
                    tracing::warn!("listener thread panicked");
                }
            }
            self.buffer.seal();
            tracing::warn!(
                "Listener on {} exited; port must be reopened",
                self.port_name.as_deref().unwrap_or("<unknown>")
            );
        }
    }
}

impl ByteSource for SerialLink {
    fn take_next_byte(&self) -> Option<u8> {
        SerialLink::take_next_byte(self)
    }

    fn take_next_stamped(&self) -> Option<(u8, Instant)> {
        self.buffer.take_next_stamped()
    }

    fn bytes_available(&self) -> usize {
        SerialLink::bytes_available(self)
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close_port();
    }
}

/// Listener body: block in bounded reads and append every chunk in order
fn listen(
    mut channel: Box<dyn Channel>,
    buffer: Arc<ByteBuffer>,
    stop: Arc<AtomicBool>,
    port_name: String,
) -> Box<dyn Channel> {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut failures = 0u32;

    tracing::debug!("listener started on {}", port_name);
    while !stop.load(Ordering::Acquire) {
        match channel.read(&mut chunk) {
            Ok(0) => {
                // Zero-length reads repeat forever once the peer hangs up
                failures += 1;
                if failures >= LISTENER_FAILURE_THRESHOLD {
                    tracing::warn!("{}: device stopped responding, listener exiting", port_name);
                    break;
                }
            }
            Ok(n) => {
                failures = 0;
                if !buffer.extend(&chunk[..n]) {
                    break;
                }
                tracing::trace!("{}: received {} bytes", port_name, n);
            }
            Err(e) if is_timeout(&e) => failures = 0,
            Err(e) => {
                failures += 1;
                tracing::debug!("{}: read error {}", port_name, e);
                if failures >= LISTENER_FAILURE_THRESHOLD {
                    tracing::warn!("{}: read failing ({}), listener exiting", port_name, e);
                    break;
                }
            }
        }
    }
    tracing::debug!("listener stopped on {}", port_name);
    channel
}
