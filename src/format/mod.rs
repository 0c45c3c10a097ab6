/// D88 format constants and header encoding

/// Format constants
pub mod constants;
/// Disk header encoding
pub mod header;

pub use constants::*;
pub use header::D88Header;

use std::fmt;
use std::path::Path;

/// Media kind recorded in the D88 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskKind {
    /// 2D: double sided, double density, 40ish cylinders
    TwoD,
    /// 2DD: double sided, double density, 80 cylinders
    TwoDD,
    /// 2HD: double sided, high density
    TwoHD,
    /// Anything else
    Unknown(u8),
}

impl DiskKind {
    /// Number of addressable tracks for this kind, if supported
    pub fn max_tracks(&self) -> Option<usize> {
        match self {
            DiskKind::TwoD => Some(MAX_TRACKS_2D),
            _ => None,
        }
    }
}

impl From<u8> for DiskKind {
    fn from(value: u8) -> Self {
        match value {
            0x00 => DiskKind::TwoD,
            0x10 => DiskKind::TwoDD,
            0x20 => DiskKind::TwoHD,
            other => DiskKind::Unknown(other),
        }
    }
}

impl From<DiskKind> for u8 {
    fn from(kind: DiskKind) -> Self {
        match kind {
            DiskKind::TwoD => 0x00,
            DiskKind::TwoDD => 0x10,
            DiskKind::TwoHD => 0x20,
            DiskKind::Unknown(other) => other,
        }
    }
}

impl fmt::Display for DiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskKind::TwoD => write!(f, "2D"),
            DiskKind::TwoDD => write!(f, "2DD"),
            DiskKind::TwoHD => write!(f, "2HD"),
            DiskKind::Unknown(v) => write!(f, "Unknown (0x{:02X})", v),
        }
    }
}

/// Check if a file is a D88 image based on extension
pub fn is_d88_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(D88_EXTENSION))
        .unwrap_or(false)
}
