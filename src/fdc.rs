/// Floppy Disk Controller (FDC) status register definitions
///
/// Bit positions follow the NEC uPD765 used by the PC-80S31 disk unit.

use std::fmt;

/// Collect the names of the set flags, or "OK" when none are set
fn flag_list(f: &mut fmt::Formatter<'_>, value: u8, flags: &[(u8, &str)]) -> fmt::Result {
    let names: Vec<&str> = flags
        .iter()
        .filter(|(mask, _)| value & mask != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        write!(f, "OK")
    } else {
        write!(f, "{}", names.join("|"))
    }
}

/// FDC Status Register 0 (ST0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdcStatus0(pub u8);

impl FdcStatus0 {
    /// Interrupt code mask - Bits 7-6
    pub const IC_MASK: u8 = 0xC0;

    /// Normal termination
    pub const NT: u8 = 0x00;

    /// Abnormal termination (AT)
    pub const AT: u8 = 0x40;

    /// Invalid command (IC)
    pub const IC: u8 = 0x80;

    /// Abnormal termination because the ready line changed (AI)
    pub const AI: u8 = 0xC0;

    /// Seek End (SE) - Bit 5
    pub const SE: u8 = 0x20;

    /// Equipment Check (EC) - Bit 4
    pub const EC: u8 = 0x10;

    /// Not Ready (NR) - Bit 3
    pub const NR: u8 = 0x08;

    /// Head Address (HD) - Bit 2
    pub const HD: u8 = 0x04;

    /// Unit Select mask (US1, US0) - Bits 1-0
    pub const US_MASK: u8 = 0x03;

    /// Build ST0 carrying only the head and unit of the addressed drive
    #[inline]
    pub fn for_unit(head: u8, unit: u8) -> Self {
        FdcStatus0(((head & 0x01) << 2) | (unit & Self::US_MASK))
    }

    /// Interrupt code (bits 7-6, shifted down)
    #[inline]
    pub fn interrupt_code(&self) -> u8 {
        (self.0 & Self::IC_MASK) >> 6
    }

    /// Check if the command terminated abnormally
    #[inline]
    pub fn abnormal_termination(&self) -> bool {
        (self.0 & Self::IC_MASK) == Self::AT
    }

    /// Check if the command was rejected as invalid
    #[inline]
    pub fn invalid_command(&self) -> bool {
        (self.0 & Self::IC_MASK) == Self::IC
    }

    /// Check if seek end bit is set
    #[inline]
    pub fn seek_end(&self) -> bool {
        (self.0 & Self::SE) != 0
    }

    /// Check if not ready bit is set
    #[inline]
    pub fn not_ready(&self) -> bool {
        (self.0 & Self::NR) != 0
    }

    /// Head address
    #[inline]
    pub fn head(&self) -> u8 {
        (self.0 & Self::HD) >> 2
    }

    /// Unit select
    #[inline]
    pub fn unit(&self) -> u8 {
        self.0 & Self::US_MASK
    }
}

impl fmt::Display for FdcStatus0 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self.0 & Self::IC_MASK {
            Self::NT => "NT",
            Self::AT => "AT",
            Self::IC => "IC",
            _ => "AI",
        };
        write!(f, "{} US{} HD{}", code, self.unit(), self.head())?;
        if self.seek_end() {
            write!(f, " SE")?;
        }
        if (self.0 & Self::EC) != 0 {
            write!(f, " EC")?;
        }
        if self.not_ready() {
            write!(f, " NR")?;
        }
        Ok(())
    }
}

/// FDC Status Register 1 (ST1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdcStatus1(pub u8);

impl FdcStatus1 {
    /// End of Cylinder (EN) - Bit 7
    /// Set when the FDC tries to access a sector beyond the final sector of a track
    pub const EN: u8 = 0x80;

    /// Data Error (DE) - Bit 5
    pub const DE: u8 = 0x20;

    /// Overrun (OR) - Bit 4
    pub const OR: u8 = 0x10;

    /// No Data (ND) - Bit 2
    /// Set if the FDC cannot find the specified sector
    pub const ND: u8 = 0x04;

    /// Not Writable (NW) - Bit 1
    /// Set during a Write command if the disk is write-protected
    pub const NW: u8 = 0x02;

    /// Missing Address Mark (MA) - Bit 0
    pub const MA: u8 = 0x01;

    /// Check if end of cylinder bit is set
    #[inline]
    pub fn end_of_cylinder(&self) -> bool {
        (self.0 & Self::EN) != 0
    }

    /// Check if no data bit is set
    #[inline]
    pub fn no_data(&self) -> bool {
        (self.0 & Self::ND) != 0
    }

    /// Check if not writable bit is set
    #[inline]
    pub fn not_writable(&self) -> bool {
        (self.0 & Self::NW) != 0
    }

    /// Check if missing address mark bit is set
    #[inline]
    pub fn missing_address_mark(&self) -> bool {
        (self.0 & Self::MA) != 0
    }

    /// Check if any error flag is set
    #[inline]
    pub fn has_error(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for FdcStatus1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        flag_list(
            f,
            self.0,
            &[
                (Self::EN, "EN"),
                (Self::DE, "DE"),
                (Self::OR, "OR"),
                (Self::ND, "ND"),
                (Self::NW, "NW"),
                (Self::MA, "MA"),
            ],
        )
    }
}

/// FDC Status Register 2 (ST2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdcStatus2(pub u8);

impl FdcStatus2 {
    /// Control Mark (CM) - Bit 6
    pub const CM: u8 = 0x40;

    /// Data Error in Data Field (DD) - Bit 5
    pub const DD: u8 = 0x20;

    /// Wrong Cylinder (WC) - Bit 4
    pub const WC: u8 = 0x10;

    /// Scan Equal Hit (SH) - Bit 3
    pub const SH: u8 = 0x08;

    /// Scan Not Satisfied (SN) - Bit 2
    pub const SN: u8 = 0x04;

    /// Bad Cylinder (BC) - Bit 1
    pub const BC: u8 = 0x02;

    /// Missing Address Mark in Data Field (MD) - Bit 0
    pub const MD: u8 = 0x01;

    /// Check if missing data mark bit is set
    #[inline]
    pub fn missing_data_mark(&self) -> bool {
        (self.0 & Self::MD) != 0
    }

    /// Check if any error flag is set (excluding the control mark)
    #[inline]
    pub fn has_error(&self) -> bool {
        (self.0 & !Self::CM) != 0
    }
}

impl fmt::Display for FdcStatus2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        flag_list(
            f,
            self.0,
            &[
                (Self::CM, "CM"),
                (Self::DD, "DD"),
                (Self::WC, "WC"),
                (Self::SH, "SH"),
                (Self::SN, "SN"),
                (Self::BC, "BC"),
                (Self::MD, "MD"),
            ],
        )
    }
}

/// FDC Status Register 3 (ST3), returned by Sense Device Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FdcStatus3(pub u8);

impl FdcStatus3 {
    /// Fault (FT) - Bit 7
    pub const FT: u8 = 0x80;

    /// Write Protected (WP) - Bit 6
    pub const WP: u8 = 0x40;

    /// Ready (RY) - Bit 5
    pub const RY: u8 = 0x20;

    /// Track 0 (T0) - Bit 4
    pub const T0: u8 = 0x10;

    /// Two Side (TS) - Bit 3
    pub const TS: u8 = 0x08;

    /// Check if the drive reports write protection
    #[inline]
    pub fn write_protected(&self) -> bool {
        (self.0 & Self::WP) != 0
    }

    /// Check if the drive is ready
    #[inline]
    pub fn ready(&self) -> bool {
        (self.0 & Self::RY) != 0
    }

    /// Check if the head is over track 0
    #[inline]
    pub fn track_zero(&self) -> bool {
        (self.0 & Self::T0) != 0
    }

    /// Check if the drive is double sided
    #[inline]
    pub fn two_sided(&self) -> bool {
        (self.0 & Self::TS) != 0
    }
}

impl fmt::Display for FdcStatus3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        flag_list(
            f,
            self.0,
            &[
                (Self::FT, "FT"),
                (Self::WP, "WP"),
                (Self::RY, "RY"),
                (Self::T0, "T0"),
                (Self::TS, "TS"),
            ],
        )
    }
}

/// Main Status Register (MSR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainStatus(pub u8);

impl MainStatus {
    /// Drive 0-3 busy seeking - Bits 0-3
    pub const DRIVE_BUSY_MASK: u8 = 0x0F;

    /// FDC Busy (CB) - Bit 4
    pub const CB: u8 = 0x10;

    /// Execution mode, non-DMA transfer in progress (EXM) - Bit 5
    pub const EXM: u8 = 0x20;

    /// Data Input/Output (DIO) - Bit 6, set when the FDC has data for the host
    pub const DIO: u8 = 0x40;

    /// Request for Master (RQM) - Bit 7
    pub const RQM: u8 = 0x80;

    /// Idle, ready to accept a command byte
    pub const IDLE: MainStatus = MainStatus(Self::RQM);

    /// Check if the data register is ready for the host
    #[inline]
    pub fn request_for_master(&self) -> bool {
        (self.0 & Self::RQM) != 0
    }

    /// Check if the FDC has data for the host to read
    #[inline]
    pub fn data_to_host(&self) -> bool {
        (self.0 & Self::DIO) != 0
    }

    /// Check if an execution-phase transfer is in progress
    #[inline]
    pub fn execution(&self) -> bool {
        (self.0 & Self::EXM) != 0
    }

    /// Check if a command is in progress
    #[inline]
    pub fn busy(&self) -> bool {
        (self.0 & Self::CB) != 0
    }
}

impl Default for MainStatus {
    fn default() -> Self {
        Self::IDLE
    }
}

impl fmt::Display for MainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} ", self.0)?;
        flag_list(
            f,
            self.0,
            &[
                (Self::RQM, "RQM"),
                (Self::DIO, "DIO"),
                (Self::EXM, "EXM"),
                (Self::CB, "CB"),
                (Self::DRIVE_BUSY_MASK, "DB"),
            ],
        )
    }
}
