/// Host port surface of the disk sub-processor's I/O space

use super::Fdc;
use std::fmt;
use tracing::trace;

/// I/O ports decoded by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Drive mode and precompensation control (write)
    DriveMode,
    /// VFO window control (write)
    Vfo,
    /// Motor control or precompensation (write), terminal count (read)
    MotorTerminalCount,
    /// Main status register (read)
    MainStatus,
    /// Data register (read/write)
    Data,
}

impl Port {
    /// Decode a port address
    pub fn from_address(address: u8) -> Option<Self> {
        match address {
            0xF4 => Some(Port::DriveMode),
            0xF7 => Some(Port::Vfo),
            0xF8 => Some(Port::MotorTerminalCount),
            0xFA => Some(Port::MainStatus),
            0xFB => Some(Port::Data),
            _ => None,
        }
    }

    /// Port address
    pub fn address(&self) -> u8 {
        match self {
            Port::DriveMode => 0xF4,
            Port::Vfo => 0xF7,
            Port::MotorTerminalCount => 0xF8,
            Port::MainStatus => 0xFA,
            Port::Data => 0xFB,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.address())
    }
}

/// Value returned when reading a port the controller doesn't drive
pub const OPEN_BUS: u8 = 0xFF;

impl Fdc {
    /// Read from a port in the controller's I/O space
    pub fn read_port(&mut self, address: u8) -> u8 {
        let value = match Port::from_address(address) {
            Some(Port::MotorTerminalCount) => self.terminal_count(),
            Some(Port::MainStatus) => self.read_status(),
            Some(Port::Data) => self.read_data(),
            _ => OPEN_BUS,
        };
        if self.trace_ports {
            trace!(port = address, value, "port read");
        }
        value
    }

    /// Write to a port in the controller's I/O space
    pub fn write_port(&mut self, address: u8, value: u8) {
        if self.trace_ports {
            trace!(port = address, value, "port write");
        }
        match Port::from_address(address) {
            Some(Port::DriveMode) => self.write_drive_mode(value),
            Some(Port::Vfo) => self.write_vfo(value),
            Some(Port::MotorTerminalCount) => self.write_motor_control(value),
            Some(Port::Data) => self.write_data(value),
            Some(Port::MainStatus) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveSet;
    use crate::fdc::MainStatus;

    #[test]
    fn test_port_addresses() {
        for address in [0xF4, 0xF7, 0xF8, 0xFA, 0xFB] {
            let port = Port::from_address(address).unwrap();
            assert_eq!(port.address(), address);
        }
        assert!(Port::from_address(0xF9).is_none());
        assert_eq!(Port::Data.to_string(), "0xFB");
    }

    #[test]
    fn test_port_dispatch() {
        let mut fdc = Fdc::new(DriveSet::new());
        fdc.set_trace_ports(true);

        assert_eq!(fdc.read_port(0xFA), MainStatus::RQM);
        assert_eq!(fdc.read_port(0xF5), OPEN_BUS);

        // Sense Device Status through the data port
        fdc.write_port(0xFB, 0x04);
        fdc.write_port(0xFB, 0x00);
        assert_eq!(
            fdc.read_port(0xFA),
            MainStatus::RQM | MainStatus::DIO | MainStatus::CB
        );
        assert_eq!(fdc.read_port(0xFB), 0x08);
        assert_eq!(fdc.read_port(0xFA), MainStatus::RQM);

        fdc.write_port(0xF8, 0x11);
        assert!(fdc.drives().unit(0).motor);
    }
}
