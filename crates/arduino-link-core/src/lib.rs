//! # ArduinoLink Core Library
//!
//! Reads instruction tokens from an Arduino-class board over a serial link
//! and hands them to a polling game loop.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial port discovery, open/configure and a background listener thread
//! - Positional two-byte framing into instruction tokens
//! - A bounded delivery queue polled once per tick
//! - Opcode interpretation for the character controller
//! - A simulated board for running without hardware
//!
//! ## Data flow
//!
//! ```text
//! board -> OS driver -> listener thread -> ByteBuffer
//!       -> InstructionDecoder (per tick) -> DeliveryQueue -> poll_once()
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use arduino_link_core::prelude::*;
//!
//! let mut input = ArduinoInput::new(LinkConfig::for_port("/dev/ttyACM0"));
//! input.start_input();
//!
//! let mut interpreter = CommandInterpreter::new();
//! loop {
//!     let command = input.poll_once().map(Command::from_instruction);
//!     for action in interpreter.tick(command) {
//!         println!("{:?}", action);
//!     }
//!     # break;
//! }
//! ```

pub mod commands;
pub mod config;
pub mod decoder;
pub mod demo;
pub mod input;
pub mod link;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{Action, Command, CommandInterpreter};
    pub use crate::config::LinkConfig;
    pub use crate::decoder::{Instruction, InstructionDecoder, OverflowPolicy};
    pub use crate::input::ArduinoInput;
    pub use crate::link::{ByteSource, LinkError, PortSettings, RetryPolicy, SerialLink};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
