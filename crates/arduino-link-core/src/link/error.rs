//! Link errors

use thiserror::Error;

/// Errors that can occur while opening or listening on a serial link
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Invalid port setting: {0}")]
    InvalidSetting(String),

    #[error("Port is not open")]
    NotOpen,

    #[error("Listener thread already running on {0}")]
    AlreadyListening(String),

    #[error("Failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("Gave up opening {port} after {attempts} attempts")]
    RetriesExhausted { port: String, attempts: u32 },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for LinkError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => LinkError::PortNotFound(e.to_string()),
            serialport::ErrorKind::InvalidInput => LinkError::InvalidSetting(e.to_string()),
            _ => LinkError::SerialError(e.to_string()),
        }
    }
}
