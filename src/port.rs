//! Serial port discovery

use std::fmt;
use std::path::Path;

use log::debug;
use serialport::{SerialPortInfo, SerialPortType};

use crate::Error;

/// A snapshot of a serial device as reported by the operating system.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct PortDescriptor {
    /// The path or name used to open the device, e.g. `/dev/ttyACM0` or `COM3`
    pub device: String,
    /// The short name of the device
    pub name: Option<String>,
    /// Human readable description, usually the USB product string
    pub description: Option<String>,
    /// The USB manufacturer string
    pub manufacturer: Option<String>,
}

impl PortDescriptor {
    /// Creates a descriptor with only the device path set.
    pub fn new<S: Into<String>>(device: S) -> PortDescriptor {
        let device = device.into();
        let name = Path::new(&device)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        PortDescriptor {
            device,
            name,
            ..Default::default()
        }
    }

    /// Returns the text that a match substring is compared against, lowercased.
    pub fn search_text(&self) -> String {
        let fields = [
            Some(self.device.as_str()),
            self.name.as_deref(),
            self.description.as_deref(),
            self.manufacturer.as_deref(),
        ];

        fields
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<&str>>()
            .join(" ")
            .to_lowercase()
    }

    /// Returns a one-line listing of every field, used when presenting choices.
    pub fn details(&self) -> String {
        format!(
            "device={} name={} description={} manufacturer={}",
            self.device,
            self.name.as_deref().unwrap_or("n/a"),
            self.description.as_deref().unwrap_or("n/a"),
            self.manufacturer.as_deref().unwrap_or("n/a"),
        )
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.device,
            self.description.as_deref().unwrap_or("n/a")
        )
    }
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> PortDescriptor {
        let mut descriptor = PortDescriptor::new(info.port_name);

        // Only USB ports carry descriptive strings
        if let SerialPortType::UsbPort(usb) = info.port_type {
            descriptor.description = usb.product;
            descriptor.manufacturer = usb.manufacturer;
        }

        descriptor
    }
}

/// Lists the serial ports currently visible on the system.
pub trait PortEnumerator {
    fn available_ports(&self) -> Result<Vec<PortDescriptor>, Error>;
}

/// Returns the ports whose search text contains `substring`, ignoring case.
///
/// The order of `ports` is preserved. An empty `substring` matches every port.
pub fn discover_candidates(ports: &[PortDescriptor], substring: &str) -> Vec<PortDescriptor> {
    let needle = substring.to_lowercase();

    let candidates: Vec<PortDescriptor> = ports
        .iter()
        .filter(|port| port.search_text().contains(&needle))
        .cloned()
        .collect();

    debug!(
        "{} of {} ports matched {:?}",
        candidates.len(),
        ports.len(),
        substring
    );

    candidates
}
