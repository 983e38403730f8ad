//! Channel selection by port name
//!
//! Port names are plain device paths (`/dev/ttyACM0`, `COM3`) except for two
//! schemes: `tcp://host:port` for a serial-to-network bridge and
//! `demo://[seed]` for the built-in simulated board.

use std::net::{TcpStream, ToSocketAddrs};

use super::serial::{configure_port, open_port};
use super::stream::{Channel, SerialChannel, TcpChannel};
use super::{LinkError, PortSettings};
use crate::demo::DemoEmitter;

/// Prefix selecting a TCP bridge
pub const TCP_SCHEME: &str = "tcp://";

/// Prefix selecting the simulated board
pub const DEMO_SCHEME: &str = "demo://";

/// Opens the channel behind a port name
pub trait PortOpener: Send {
    /// Open and configure `name`; the returned channel is ready to read
    fn open(&self, name: &str, settings: &PortSettings) -> Result<Box<dyn Channel>, LinkError>;
}

/// Default opener backed by the OS serial driver, TCP sockets and the demo board
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, name: &str, settings: &PortSettings) -> Result<Box<dyn Channel>, LinkError> {
        settings.validate()?;

        let mut channel = if let Some(addr) = name.strip_prefix(TCP_SCHEME) {
            open_tcp(addr, settings)?
        } else if let Some(seed) = name.strip_prefix(DEMO_SCHEME) {
            open_demo(name, seed, settings)?
        } else {
            let mut port = open_port(name, settings)?;
            configure_port(port.as_mut(), settings)?;
            Box::new(SerialChannel::new(port))
        };

        // Anything received before the listener starts is from a previous session
        channel.clear_input_buffer()?;
        Ok(channel)
    }
}

fn open_demo(name: &str, seed: &str, settings: &PortSettings) -> Result<Box<dyn Channel>, LinkError> {
    let mut emitter = if seed.is_empty() {
        DemoEmitter::new()
    } else {
        let seed = seed.parse::<u64>().map_err(|_| {
            LinkError::InvalidSetting(format!("demo seed must be a number, got '{}'", seed))
        })?;
        DemoEmitter::with_seed(seed)
    };
    emitter.set_timeout(settings.read_timeout())?;
    tracing::info!("Opened simulated board {}", name);
    Ok(Box::new(emitter))
}

fn open_tcp(addr: &str, settings: &PortSettings) -> Result<Box<dyn Channel>, LinkError> {
    let target = addr
        .to_socket_addrs()
        .map_err(|e| LinkError::PortNotFound(format!("{}{}: {}", TCP_SCHEME, addr, e)))?
        .next()
        .ok_or_else(|| LinkError::PortNotFound(format!("{}{}", TCP_SCHEME, addr)))?;

    let connect_timeout = settings.read_timeout().max(std::time::Duration::from_secs(1));
    let stream = TcpStream::connect_timeout(&target, connect_timeout)?;
    stream.set_nodelay(true)?;

    let mut channel = TcpChannel::new(stream);
    channel.set_timeout(settings.read_timeout())?;
    tracing::info!("Connected to serial bridge at {}", target);
    Ok(Box::new(channel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_missing_device_is_an_error() {
        let result = SystemPortOpener.open("/dev/no-such-arduino", &PortSettings::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_settings_rejected_before_open() {
        let settings = PortSettings {
            baud_rate: 0,
            ..PortSettings::default()
        };
        let result = SystemPortOpener.open("demo://1", &settings);
        assert!(matches!(result, Err(LinkError::InvalidSetting(_))));
    }

    #[test]
    fn test_demo_scheme() {
        assert!(SystemPortOpener
            .open("demo://7", &PortSettings::default())
            .is_ok());
        assert!(SystemPortOpener
            .open("demo://", &PortSettings::default())
            .is_ok());
        assert!(matches!(
            SystemPortOpener.open("demo://seven", &PortSettings::default()),
            Err(LinkError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_tcp_scheme() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let name = format!("{}{}", TCP_SCHEME, listener.local_addr().unwrap());
        assert!(SystemPortOpener.open(&name, &PortSettings::default()).is_ok());
    }

    #[test]
    fn test_tcp_refused() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let name = format!("{}{}", TCP_SCHEME, addr);
        assert!(SystemPortOpener.open(&name, &PortSettings::default()).is_err());
    }
}
