use std::fmt;

use serialport::{SerialPortInfo, SerialPortType, UsbPortInfo};

use crate::errors::DeviceError;

/// A USB serial port that a debug board might be attached to.
///
/// # Members
///
/// * `port_name` - The name to open the port with
/// * `vid` - USB vendor id
/// * `pid` - USB product id
/// * `product` - The product string reported by the adapter, if any
/// * `manufacturer` - The manufacturer string reported by the adapter, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePort {
    pub port_name: String,
    pub vid: u16,
    pub pid: u16,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
}

impl CandidatePort {
    fn from_usb(port_name: String, info: UsbPortInfo) -> Self {
        Self {
            port_name,
            vid: info.vid,
            pid: info.pid,
            product: info.product,
            manufacturer: info.manufacturer,
        }
    }
}

impl fmt::Display for CandidatePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:04x}:{:04x}]", self.port_name, self.vid, self.pid)?;
        if let Some(product) = &self.product {
            write!(f, " {product}")?;
        }
        if let Some(manufacturer) = &self.manufacturer {
            write!(f, " ({manufacturer})")?;
        }
        Ok(())
    }
}

/// Finds every USB serial port on this computer.
///
/// The debug board shows up as a plain USB to UART adapter, so every USB
/// port is a candidate. Other port types are skipped.
pub fn discover_ports() -> Result<Vec<CandidatePort>, DeviceError> {
    // Get all available serial ports
    let ports = serialport::available_ports()?;

    Ok(usb_candidates(ports))
}

fn usb_candidates(ports: Vec<SerialPortInfo>) -> Vec<CandidatePort> {
    let mut candidates: Vec<CandidatePort> = ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(info) => Some(CandidatePort::from_usb(port.port_name, info)),
            _ => None, // Skip the port if it is not USB
        })
        .collect();

    // Keep the listing stable between runs
    candidates.sort_by(|a, b| a.port_name.cmp(&b.port_name));

    tracing::debug!("Found {} candidate port(s)", candidates.len());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(name: &str, product: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x10c4,
                pid: 0xea60,
                serial_number: None,
                manufacturer: Some("Silicon Labs".to_string()),
                product: product.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_only_usb_ports() {
        let ports = vec![
            usb("/dev/ttyUSB1", None),
            SerialPortInfo {
                port_name: "/dev/ttyS0".to_string(),
                port_type: SerialPortType::Unknown,
            },
            usb("/dev/ttyUSB0", Some("CP2102")),
        ];

        let candidates = usb_candidates(ports);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].port_name, "/dev/ttyUSB0");
        assert_eq!(
            candidates[0].to_string(),
            "/dev/ttyUSB0 [10c4:ea60] CP2102 (Silicon Labs)"
        );
        assert_eq!(candidates[1].to_string(), "/dev/ttyUSB1 [10c4:ea60] (Silicon Labs)");
    }
}
