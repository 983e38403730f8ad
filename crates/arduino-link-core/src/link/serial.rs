//! Serial port handling
//!
//! Port discovery and low-level open/configure helpers for the device link.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;

use super::{LinkError, PortSettings};

/// USB vendor IDs of Arduino boards and the USB-serial bridges clones ship with
const ARDUINO_VIDS: &[u16] = &[
    0x2341, // Arduino SA
    0x2A03, // Arduino SRL
    0x1A86, // QinHeng CH340/CH341
    0x0403, // FTDI
    0x10C4, // Silicon Labs CP210x
];

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Whether this port looks like an Arduino-class board
    ///
    /// Uses the USB vendor ID when known, otherwise falls back to the
    /// manufacturer string.
    pub fn is_arduino(&self) -> bool {
        if let Some(vid) = self.vid {
            return ARDUINO_VIDS.contains(&vid);
        }
        self.manufacturer
            .as_deref()
            .map(|m| m.to_ascii_lowercase().contains("arduino"))
            .unwrap_or(false)
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
            ),
            _ => (None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
        }
    }
}

/// Sort key placing ttyACM* first, then ttyUSB* (both numerically), then the rest by name.
/// Arduino Uno/Mega boards enumerate as ttyACM, clones behind CH340/FTDI as ttyUSB.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("COM") {
        if let Ok(num) = rest.parse::<usize>() {
            return (2, num, basename.to_string());
        }
    }
    (3, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(found) => {
            for info in found {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::debug!("serial port enumeration failed: {}", e),
    }

    // Linux-only: udev-less containers often miss ports the API would report
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// List ports that look like Arduino-class boards, best candidate first
pub fn find_arduino_ports() -> Vec<PortInfo> {
    list_ports().into_iter().filter(PortInfo::is_arduino).collect()
}

/// Open a serial port with the given line settings
pub fn open_port(name: &str, settings: &PortSettings) -> Result<Box<dyn SerialPort>, LinkError> {
    settings.validate()?;

    let port = serialport::new(name, settings.baud_rate)
        .parity(settings.parity.into())
        .data_bits(settings.data_bits.into())
        .stop_bits(settings.stop_bits.into())
        .flow_control(serialport::FlowControl::None)
        .timeout(settings.read_timeout())
        .open()?;

    tracing::info!(
        "Opened serial port {} at {} baud ({}{}{})",
        name,
        settings.baud_rate,
        settings.data_bits.bits(),
        settings.parity.code(),
        settings.stop_bits.bits()
    );
    Ok(port)
}

/// Configure an already-open port for the device link
pub fn configure_port(port: &mut dyn SerialPort, settings: &PortSettings) -> Result<(), LinkError> {
    port.set_baud_rate(settings.baud_rate)?;
    port.set_data_bits(settings.data_bits.into())?;
    port.set_parity(settings.parity.into())?;
    port.set_stop_bits(settings.stop_bits.into())?;
    port.set_flow_control(serialport::FlowControl::None)?;
    port.set_timeout(settings.read_timeout())?;

    // Keep DTR asserted; boards with auto-reset would reboot on every toggle
    if let Err(e) = port.write_data_terminal_ready(true) {
        tracing::debug!("configure_port: failed to set DTR high: {} (continuing)", e);
    }

    Ok(())
}
