/// Sector record structures

use crate::format::constants::{size_code_to_bytes, SECTOR_HEADER_SIZE};
use std::fmt;

/// Sector ID (CHRN) - addressing information for a sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorId {
    /// C - Cylinder number
    pub cylinder: u8,
    /// H - Head number
    pub head: u8,
    /// R - Record (sector) number
    pub record: u8,
    /// N - Length code (0=128, 1=256, 2=512, 3=1024, ...)
    pub size_code: u8,
}

impl SectorId {
    /// Create a new sector ID
    pub fn new(cylinder: u8, head: u8, record: u8, size_code: u8) -> Self {
        Self {
            cylinder,
            head,
            record,
            size_code,
        }
    }

    /// Build an ID from its four on-disk bytes
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    /// The four bytes as they appear on disk and in result phases
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.cylinder, self.head, self.record, self.size_code]
    }

    /// Get the advertised sector size in bytes based on the length code
    pub fn size_bytes(&self) -> usize {
        size_code_to_bytes(self.size_code)
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C={:02X} H={:02X} R={:02X} N={:02X}",
            self.cylinder, self.head, self.record, self.size_code
        )
    }
}

/// Header preceding every sector payload inside a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorHeader {
    /// Sector addressing information (CHRN)
    pub id: SectorId,
    /// Number of sectors in the track this record belongs to
    pub sectors_in_track: u16,
    /// Density flag (0x00 double, 0x40 single)
    pub density: u8,
    /// Deleted-data address mark flag
    pub deleted: u8,
    /// Status recorded by the imaging tool
    pub status: u8,
    /// Payload bytes following the header
    pub data_size: u16,
}

impl SectorHeader {
    /// Decode a sector header, returning `None` if fewer than 16 bytes remain
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SECTOR_HEADER_SIZE {
            return None;
        }
        Some(Self {
            id: SectorId::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            sectors_in_track: u16::from_le_bytes([bytes[4], bytes[5]]),
            density: bytes[6],
            deleted: bytes[7],
            status: bytes[8],
            data_size: u16::from_le_bytes([bytes[14], bytes[15]]),
        })
    }

    /// Encode the header; reserved bytes are written as zero
    pub fn encode(&self) -> [u8; SECTOR_HEADER_SIZE] {
        let mut bytes = [0u8; SECTOR_HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.id.to_bytes());
        bytes[4..6].copy_from_slice(&self.sectors_in_track.to_le_bytes());
        bytes[6] = self.density;
        bytes[7] = self.deleted;
        bytes[8] = self.status;
        bytes[14..16].copy_from_slice(&self.data_size.to_le_bytes());
        bytes
    }

    /// Size of the whole record, header plus payload
    pub fn record_size(&self) -> usize {
        SECTOR_HEADER_SIZE + self.data_size as usize
    }

    /// Check if this record carries a deleted-data mark
    pub fn is_deleted(&self) -> bool {
        self.deleted != 0
    }
}

/// A sector record located inside a track buffer
#[derive(Debug, Clone, Copy)]
pub struct SectorRecord<'a> {
    /// Decoded record header
    pub header: SectorHeader,
    /// Offset of the payload from the start of the track
    pub data_offset: usize,
    /// Payload bytes
    pub data: &'a [u8],
}

impl SectorRecord<'_> {
    /// Sector addressing information (CHRN)
    pub fn id(&self) -> SectorId {
        self.header.id
    }
}
