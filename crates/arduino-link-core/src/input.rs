//! Arduino input
//!
//! The consumer-facing side of the link: start it once, then call
//! [`ArduinoInput::poll_once`] once per game tick.

use std::time::Instant;

use crate::config::LinkConfig;
use crate::decoder::{Instruction, InstructionDecoder};
use crate::link::{find_arduino_ports, Backoff, PortOpener, SerialLink, SystemPortOpener};

/// Serial link and decoder wired together for a polling game loop
pub struct ArduinoInput {
    config: LinkConfig,
    link: SerialLink,
    decoder: InstructionDecoder,
    /// Schedule for reconnects attempted from the poll loop
    reconnect: Backoff,
    next_reconnect_at: Option<Instant>,
    /// Between `start_input` and `stop`
    active: bool,
}

impl ArduinoInput {
    /// Create an input bound to the system serial driver. Nothing is opened yet.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_opener(config, Box::new(SystemPortOpener))
    }

    /// Create an input whose link opens ports through `opener`
    pub fn with_opener(config: LinkConfig, opener: Box<dyn PortOpener>) -> Self {
        let decoder = InstructionDecoder::new(&config.decoder);
        let reconnect = Backoff::new(config.reconnect.clone());
        Self {
            link: SerialLink::with_opener(opener),
            decoder,
            reconnect,
            next_reconnect_at: None,
            active: false,
            config,
        }
    }

    /// Open the port (with the configured retry policy) and start listening.
    ///
    /// Returns false if either step fails. With `auto_reconnect` set, later
    /// [`poll_once`](Self::poll_once) calls keep trying in the background.
    pub fn start_input(&mut self) -> bool {
        self.active = true;

        let Some(port) = self.resolve_port() else {
            tracing::warn!("No port configured and no Arduino-class board detected");
            self.schedule_reconnect();
            return false;
        };

        if !self
            .link
            .init_port_with_retry(&port, &self.config.settings, &self.config.retry)
        {
            self.schedule_reconnect();
            return false;
        }

        self.decoder.discard_pending();
        if !self.link.open_listen_thread() {
            self.link.close_port();
            self.schedule_reconnect();
            return false;
        }

        self.reconnect.reset();
        self.next_reconnect_at = None;
        true
    }

    /// Decode whatever arrived since the last tick and return the oldest
    /// undelivered instruction, if any. Never blocks.
    pub fn poll_once(&mut self) -> Option<Instruction> {
        if !self.active {
            return None;
        }
        self.decoder.poll_and_decode(&self.link);
        self.maintain_link();
        self.decoder.next_instruction()
    }

    /// Decode and return every undelivered instruction, oldest first
    pub fn drain(&mut self) -> Vec<Instruction> {
        if !self.active {
            return Vec::new();
        }
        self.decoder.poll_and_decode(&self.link);
        self.maintain_link();
        self.decoder.queue().drain()
    }

    /// Stop the listener and close the port. No decoding happens afterwards.
    pub fn stop(&mut self) {
        if self.active {
            tracing::info!("Stopping Arduino input");
        }
        self.active = false;
        self.link.close_port();
        self.decoder.reset();
        self.next_reconnect_at = None;
    }

    /// Whether the listener is running
    pub fn is_connected(&self) -> bool {
        self.link.is_listening()
    }

    /// The underlying link
    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    /// The underlying decoder
    pub fn decoder(&self) -> &InstructionDecoder {
        &self.decoder
    }

    /// Active configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn resolve_port(&self) -> Option<String> {
        if let Some(port) = &self.config.port {
            return Some(port.clone());
        }
        let detected = find_arduino_ports().into_iter().next()?;
        tracing::info!("Auto-detected board on {}", detected.name);
        Some(detected.name)
    }

    /// Reopen a lost link when the backoff schedule allows (single attempt, non-blocking)
    fn maintain_link(&mut self) {
        if self.link.is_listening() || !self.config.auto_reconnect || self.reconnect.is_exhausted() {
            return;
        }

        match self.next_reconnect_at {
            Some(at) if Instant::now() < at => return,
            Some(_) => {}
            None => {
                // First tick after the link dropped: wait a full delay before retrying
                tracing::warn!("Serial link lost");
                self.schedule_reconnect();
                return;
            }
        }

        let reopened = match self.resolve_port() {
            Some(port) => {
                self.link.init_port(&port, &self.config.settings) && self.link.open_listen_thread()
            }
            None => false,
        };

        if reopened {
            tracing::info!("Serial link re-established");
            self.decoder.discard_pending();
            self.reconnect.reset();
            self.next_reconnect_at = None;
        } else {
            self.link.close_port();
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.config.auto_reconnect {
            return;
        }
        match self.reconnect.record_failure() {
            Some(delay) => {
                tracing::debug!("next reconnect attempt in {:?}", delay);
                self.next_reconnect_at = Some(Instant::now() + delay);
            }
            None => {
                tracing::warn!(
                    "Giving up on reconnecting after {} attempts",
                    self.reconnect.failures()
                );
                self.next_reconnect_at = None;
            }
        }
    }
}

impl Drop for ArduinoInput {
    fn drop(&mut self) {
        self.stop();
    }
}
