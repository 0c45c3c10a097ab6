/// D88 format layout constants

/// File extension identifying a D88 container
pub const D88_EXTENSION: &str = "d88";

/// Size of the fixed disk header
pub const HEADER_SIZE: usize = 0x2B0;

/// Length of the NUL-padded disk name
pub const NAME_SIZE: usize = 17;

/// Offset of the disk name in the header
pub const HEADER_NAME_OFFSET: usize = 0x00;

/// Offset of the reserved bytes in the header
pub const HEADER_RESERVED_OFFSET: usize = 0x11;

/// Offset of the write-protect flag in the header
pub const HEADER_WRITE_PROTECT_OFFSET: usize = 0x1A;

/// Offset of the disk kind in the header
pub const HEADER_KIND_OFFSET: usize = 0x1B;

/// Offset of the total disk size (u32 LE) in the header
pub const HEADER_DISK_SIZE_OFFSET: usize = 0x1C;

/// Offset of the track offset table in the header
pub const HEADER_TRACK_TABLE_OFFSET: usize = 0x20;

/// Number of entries in the track offset table
pub const TRACK_TABLE_ENTRIES: usize = 164;

/// Write-protect flag value for a protected image
pub const WRITE_PROTECT_ON: u8 = 0x10;

/// Size of a sector record header
pub const SECTOR_HEADER_SIZE: usize = 16;

/// Tracks addressable on a 2D disk (2 heads x 42 cylinders)
pub const MAX_TRACKS_2D: usize = 84;

/// Heads on a 2D disk
pub const HEADS_2D: usize = 2;

/// Most sectors a single Write-ID command can lay down
pub const MAX_FORMAT_SECTORS: usize = 20;

/// Convert a length code (N) to a payload size in bytes
#[inline]
pub fn size_code_to_bytes(size_code: u8) -> usize {
    // N above 7 is clamped; real controllers wrap at the same point
    128usize << size_code.min(7)
}

/// Convert a payload size in bytes to a length code
#[inline]
pub fn bytes_to_size_code(bytes: usize) -> Option<u8> {
    (0..=7u8).find(|&n| size_code_to_bytes(n) == bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(
            HEADER_TRACK_TABLE_OFFSET + TRACK_TABLE_ENTRIES * 4,
            HEADER_SIZE
        );
        assert_eq!(HEADER_RESERVED_OFFSET, HEADER_NAME_OFFSET + NAME_SIZE);
    }

    #[test]
    fn test_size_code_to_bytes() {
        assert_eq!(size_code_to_bytes(0), 128);
        assert_eq!(size_code_to_bytes(1), 256);
        assert_eq!(size_code_to_bytes(2), 512);
        assert_eq!(size_code_to_bytes(3), 1024);
        assert_eq!(size_code_to_bytes(7), 16384);
        assert_eq!(size_code_to_bytes(0xFF), 16384);
    }

    #[test]
    fn test_bytes_to_size_code() {
        assert_eq!(bytes_to_size_code(256), Some(1));
        assert_eq!(bytes_to_size_code(1024), Some(3));
        assert_eq!(bytes_to_size_code(1000), None);
    }
}
