/// Command opcode table

use std::fmt;

/// Commands the controller decodes from the first command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read a whole track
    ReadDiagnostic,
    /// Set step rate and head timings
    Specify,
    /// Report ST3 for a drive
    SenseDeviceStatus,
    /// Write one sector
    WriteData,
    /// Read sectors
    ReadData,
    /// Move the head to cylinder 0
    Recalibrate,
    /// Report the outcome of the last seek
    SenseInterruptStatus,
    /// Write one sector with a deleted data mark (not supported)
    WriteDeletedData,
    /// Report the next ID passing under the head
    ReadId,
    /// Read sectors with a deleted data mark (not supported)
    ReadDeletedData,
    /// Format a track
    WriteId,
    /// Move the head to a cylinder
    Seek,
}

/// How a command moves data once its parameters are in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPhase {
    /// Completes without an execution phase
    None,
    /// Host reads from the data register
    Read,
    /// Host writes to the data register
    Write,
    /// Rejected as an invalid command
    Invalid,
}

/// Static description of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Command this entry describes
    pub command: Command,
    /// Opcode in the low five bits of the first byte
    pub opcode: u8,
    /// Total command bytes, opcode included
    pub length: usize,
    /// Data phase behavior
    pub phase: DataPhase,
}

const fn entry(command: Command, opcode: u8, length: usize, phase: DataPhase) -> CommandDescriptor {
    CommandDescriptor {
        command,
        opcode,
        length,
        phase,
    }
}

/// Every opcode the controller recognizes
pub const COMMAND_TABLE: [CommandDescriptor; 12] = [
    entry(Command::ReadDiagnostic, 0x02, 9, DataPhase::Read),
    entry(Command::Specify, 0x03, 3, DataPhase::None),
    entry(Command::SenseDeviceStatus, 0x04, 2, DataPhase::None),
    entry(Command::WriteData, 0x05, 9, DataPhase::Write),
    entry(Command::ReadData, 0x06, 9, DataPhase::Read),
    entry(Command::Recalibrate, 0x07, 2, DataPhase::None),
    entry(Command::SenseInterruptStatus, 0x08, 1, DataPhase::None),
    entry(Command::WriteDeletedData, 0x09, 9, DataPhase::Invalid),
    entry(Command::ReadId, 0x0A, 2, DataPhase::Read),
    entry(Command::ReadDeletedData, 0x0C, 9, DataPhase::Invalid),
    entry(Command::WriteId, 0x0D, 6, DataPhase::Write),
    entry(Command::Seek, 0x0F, 3, DataPhase::None),
];

/// Mask selecting the opcode from the first command byte
pub const OPCODE_MASK: u8 = 0x1F;

/// Multi-track flag in the first command byte
pub const FLAG_MT: u8 = 0x80;
/// MFM flag in the first command byte
pub const FLAG_MF: u8 = 0x40;
/// Skip flag in the first command byte
pub const FLAG_SK: u8 = 0x20;

impl CommandDescriptor {
    /// Look up the descriptor for the first byte of a command
    pub fn lookup(first_byte: u8) -> Option<&'static CommandDescriptor> {
        let opcode = first_byte & OPCODE_MASK;
        COMMAND_TABLE.iter().find(|d| d.opcode == opcode)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::ReadDiagnostic => "Read Diagnostic",
            Command::Specify => "Specify",
            Command::SenseDeviceStatus => "Sense Device Status",
            Command::WriteData => "Write Data",
            Command::ReadData => "Read Data",
            Command::Recalibrate => "Recalibrate",
            Command::SenseInterruptStatus => "Sense Interrupt Status",
            Command::WriteDeletedData => "Write Deleted Data",
            Command::ReadId => "Read ID",
            Command::ReadDeletedData => "Read Deleted Data",
            Command::WriteId => "Write ID",
            Command::Seek => "Seek",
        };
        write!(f, "{}", name)
    }
}
