//! Port settings
//!
//! Line parameters for the serial link (baud rate, parity, data bits,
//! stop bits) and the set of device events the listener waits on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use super::{LinkError, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, MAX_READ_TIMEOUT_MS};

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl Parity {
    /// Parse a single-letter parity code ('N', 'O', 'E')
    ///
    /// Mark and space parity ('M', 'S') are not supported by the serial
    /// backend and are rejected.
    pub fn from_code(code: char) -> Result<Self, LinkError> {
        match code.to_ascii_uppercase() {
            'N' => Ok(Parity::None),
            'O' => Ok(Parity::Odd),
            'E' => Ok(Parity::Even),
            other => Err(LinkError::InvalidSetting(format!(
                "unsupported parity code '{}'",
                other
            ))),
        }
    }

    /// Single-letter code for this parity
    pub fn code(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataBits {
    /// 5 bits
    Five,
    /// 6 bits
    Six,
    /// 7 bits
    Seven,
    /// 8 bits
    #[default]
    Eight,
}

impl DataBits {
    /// Build from a bit count (5 to 8)
    pub fn from_bits(bits: u8) -> Result<Self, LinkError> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            n => Err(LinkError::InvalidSetting(format!(
                "data bits must be 5-8, got {}",
                n
            ))),
        }
    }

    /// Bit count
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(d: DataBits) -> Self {
        match d {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopBits {
    /// 1 stop bit
    #[default]
    One,
    /// 2 stop bits
    Two,
}

impl StopBits {
    /// Build from a bit count (1 or 2)
    pub fn from_bits(bits: u8) -> Result<Self, LinkError> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            n => Err(LinkError::InvalidSetting(format!(
                "stop bits must be 1 or 2, got {}",
                n
            ))),
        }
    }

    /// Bit count
    pub fn bits(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(s: StopBits) -> Self {
        match s {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Set of device events the listener is woken by
///
/// Bit values follow the classic communications event mask layout so
/// masks copied from device documentation keep their meaning.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMask(u32);

impl EventMask {
    /// A character was received
    pub const RX_CHAR: EventMask = EventMask(0x0001);
    /// The event character was received
    pub const RX_FLAG: EventMask = EventMask(0x0002);
    /// The last character in the output buffer was sent
    pub const TX_EMPTY: EventMask = EventMask(0x0004);
    /// CTS changed state
    pub const CTS: EventMask = EventMask(0x0008);
    /// DSR changed state
    pub const DSR: EventMask = EventMask(0x0010);
    /// Carrier detect changed state
    pub const RLSD: EventMask = EventMask(0x0020);
    /// A break was detected
    pub const BREAK: EventMask = EventMask(0x0040);
    /// A line status error occurred
    pub const ERR: EventMask = EventMask(0x0080);
    /// A ring indicator was detected
    pub const RING: EventMask = EventMask(0x0100);

    const ALL_BITS: u32 = 0x01FF;

    /// Empty mask
    pub const fn empty() -> Self {
        EventMask(0)
    }

    /// Build from raw bits; unknown bits are rejected
    pub fn from_bits(bits: u32) -> Result<Self, LinkError> {
        if bits & !Self::ALL_BITS != 0 {
            return Err(LinkError::InvalidSetting(format!(
                "unknown event mask bits {:#06x}",
                bits & !Self::ALL_BITS
            )));
        }
        Ok(EventMask(bits))
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for EventMask {
    fn default() -> Self {
        EventMask::RX_CHAR
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EventMask, &str); 9] = [
            (EventMask::RX_CHAR, "RX_CHAR"),
            (EventMask::RX_FLAG, "RX_FLAG"),
            (EventMask::TX_EMPTY, "TX_EMPTY"),
            (EventMask::CTS, "CTS"),
            (EventMask::DSR, "DSR"),
            (EventMask::RLSD, "RLSD"),
            (EventMask::BREAK, "BREAK"),
            (EventMask::ERR, "ERR"),
            (EventMask::RING, "RING"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "EventMask({})", set.join(" | "))
    }
}

/// Full line configuration for a serial link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Parity mode
    pub parity: Parity,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Events that wake the listener
    pub event_mask: EventMask,
    /// Upper bound on a single blocking read in the listener, in milliseconds.
    /// Also bounds how long teardown waits for the listener to notice a stop.
    pub read_timeout_ms: u64,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            event_mask: EventMask::RX_CHAR,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl PortSettings {
    /// Build settings from the raw values a device sketch usually documents:
    /// baud, parity letter, data bits, stop bits and event mask.
    pub fn from_raw(
        baud_rate: u32,
        parity: char,
        data_bits: u8,
        stop_bits: u8,
        event_mask: u32,
    ) -> Result<Self, LinkError> {
        let settings = Self {
            baud_rate,
            parity: Parity::from_code(parity)?,
            data_bits: DataBits::from_bits(data_bits)?,
            stop_bits: StopBits::from_bits(stop_bits)?,
            event_mask: EventMask::from_bits(event_mask)?,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings describe a usable link
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.baud_rate == 0 {
            return Err(LinkError::InvalidSetting("baud rate must be non-zero".into()));
        }
        if !self.event_mask.contains(EventMask::RX_CHAR) {
            return Err(LinkError::InvalidSetting(format!(
                "event mask {:?} does not include RX_CHAR; the listener would never wake",
                self.event_mask
            )));
        }
        if self.read_timeout_ms == 0 || self.read_timeout_ms > MAX_READ_TIMEOUT_MS {
            return Err(LinkError::InvalidSetting(format!(
                "read timeout must be between 1 and {} ms, got {}",
                MAX_READ_TIMEOUT_MS, self.read_timeout_ms
            )));
        }
        Ok(())
    }

    /// Listener read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
