/// D88 disk header

use crate::error::{D88Error, Result};
use crate::format::constants::*;
use crate::format::DiskKind;

/// Decoded D88 disk header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct D88Header {
    /// Disk name (up to 16 characters)
    pub name: String,
    /// Write-protect flag
    pub write_protect: bool,
    /// Media kind
    pub kind: DiskKind,
    /// Total image size in bytes, header included
    pub disk_size: u32,
    /// Byte offset of each track, 0 for an unformatted track
    pub track_offsets: [u32; TRACK_TABLE_ENTRIES],
}

impl D88Header {
    /// Create an empty 2D header
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            write_protect: false,
            kind: DiskKind::TwoD,
            disk_size: HEADER_SIZE as u32,
            track_offsets: [0; TRACK_TABLE_ENTRIES],
        }
    }

    /// Decode a header from the first `HEADER_SIZE` bytes of an image
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(D88Error::format(format!(
                "header truncated: {} of {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let raw_name = &bytes[HEADER_NAME_OFFSET..HEADER_NAME_OFFSET + NAME_SIZE];
        let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        let name = String::from_utf8_lossy(&raw_name[..name_len]).into_owned();

        let mut track_offsets = [0u32; TRACK_TABLE_ENTRIES];
        for (i, offset) in track_offsets.iter_mut().enumerate() {
            *offset = read_u32_le(bytes, HEADER_TRACK_TABLE_OFFSET + i * 4);
        }

        Ok(Self {
            name,
            write_protect: bytes[HEADER_WRITE_PROTECT_OFFSET] != 0,
            kind: DiskKind::from(bytes[HEADER_KIND_OFFSET]),
            disk_size: read_u32_le(bytes, HEADER_DISK_SIZE_OFFSET),
            track_offsets,
        })
    }

    /// Encode the header into its fixed on-disk layout
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];

        // The 17th byte stays NUL so the name is always terminated
        let name = self.name.as_bytes();
        let name_len = name.len().min(NAME_SIZE - 1);
        bytes[HEADER_NAME_OFFSET..HEADER_NAME_OFFSET + name_len].copy_from_slice(&name[..name_len]);

        bytes[HEADER_WRITE_PROTECT_OFFSET] = if self.write_protect {
            WRITE_PROTECT_ON
        } else {
            0
        };
        bytes[HEADER_KIND_OFFSET] = self.kind.into();
        bytes[HEADER_DISK_SIZE_OFFSET..HEADER_DISK_SIZE_OFFSET + 4]
            .copy_from_slice(&self.disk_size.to_le_bytes());

        for (i, offset) in self.track_offsets.iter().enumerate() {
            let at = HEADER_TRACK_TABLE_OFFSET + i * 4;
            bytes[at..at + 4].copy_from_slice(&offset.to_le_bytes());
        }

        bytes
    }

    /// Compute `(offset, length)` for each of the first `max_tracks` tracks
    ///
    /// A populated track runs up to the next populated offset, or to the end
    /// of the image for the last one. Unformatted tracks yield `None`.
    pub fn track_extents(&self, max_tracks: usize) -> Result<Vec<Option<(u64, usize)>>> {
        let max_tracks = max_tracks.min(TRACK_TABLE_ENTRIES);
        let disk_size = self.disk_size as u64;
        let mut extents = Vec::with_capacity(max_tracks);
        let mut previous = 0u64;

        for i in 0..max_tracks {
            let offset = self.track_offsets[i] as u64;
            if offset == 0 {
                extents.push(None);
                continue;
            }
            if offset < HEADER_SIZE as u64 || offset <= previous || offset > disk_size {
                return Err(D88Error::format(format!(
                    "track {} offset 0x{:X} out of order or out of range",
                    i, offset
                )));
            }
            previous = offset;

            let next = self.track_offsets[i + 1..max_tracks]
                .iter()
                .find(|&&o| o > 0)
                .map(|&o| o as u64)
                .unwrap_or(disk_size);
            if next < offset {
                return Err(D88Error::format(format!(
                    "track {} offset 0x{:X} follows next track at 0x{:X}",
                    i, offset, next
                )));
            }
            extents.push(Some((offset, (next - offset) as usize)));
        }

        Ok(extents)
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
