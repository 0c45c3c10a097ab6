/// Raw track synthesis for Read Diagnostic
///
/// D88 images keep only sector payloads, so the gaps, sync runs and address
/// marks a real drive would return are generated here around the stored
/// geometry and data. CRC fields are written as 0xFFFF placeholders.

use crate::image::track::SectorIter;

/// Gap filler byte
pub const GAP_BYTE: u8 = 0x4E;

/// Index address mark, preceded by its sync bytes
pub const INDEX_MARK: [u8; 4] = [0xC2, 0xC2, 0xC2, 0xFC];

/// ID address mark
pub const ID_ADDRESS_MARK: [u8; 4] = [0xA1, 0xA1, 0xA1, 0xFE];

/// Data address mark
pub const DATA_ADDRESS_MARK: [u8; 4] = [0xA1, 0xA1, 0xA1, 0xFB];

/// Placeholder CRC
pub const CRC_PLACEHOLDER: [u8; 2] = [0xFF, 0xFF];

const GAP0_SIZE: usize = 80;
const SYNC_SIZE: usize = 12;
const GAP1_SIZE: usize = 50;
const GAP2_SIZE: usize = 22;
const GAP3_SIZE: usize = 22;
const GAP4_SIZE: usize = 22;

/// Payload slot of each synthesized data field
pub const DATA_SLOT_SIZE: usize = 256;

/// gap0, sync, index mark, gap1
pub const PREAMBLE_SIZE: usize = GAP0_SIZE + SYNC_SIZE + 4 + GAP1_SIZE;

/// sync, ID mark, CHRN, CRC, gap2
pub const ID_FIELD_SIZE: usize = SYNC_SIZE + 4 + 4 + 2 + GAP2_SIZE;

/// sync, data mark, payload slot, CRC, gap3
pub const DATA_FIELD_SIZE: usize = SYNC_SIZE + 4 + DATA_SLOT_SIZE + 2 + GAP3_SIZE;

/// gap4
pub const POSTAMBLE_SIZE: usize = GAP4_SIZE;

/// Sector count the reported length is always computed for
pub const REPORTED_SECTORS: usize = 16;

/// Length reported to the controller for every synthesized track
pub const REPORTED_TRACK_SIZE: usize =
    PREAMBLE_SIZE + (ID_FIELD_SIZE + DATA_FIELD_SIZE) * REPORTED_SECTORS + POSTAMBLE_SIZE;

/// Build the raw byte stream of `track` into `dest` and return its reported length
///
/// The reported length always assumes 16 sectors of 256 bytes. Tracks with
/// fewer sectors are padded with gap bytes up to that length; bytes beyond it
/// are generated but never handed to the host.
pub fn synthesize_track(dest: &mut Vec<u8>, track: &[u8]) -> usize {
    dest.clear();

    dest.extend(std::iter::repeat(GAP_BYTE).take(GAP0_SIZE));
    dest.extend(std::iter::repeat(0x00).take(SYNC_SIZE));
    dest.extend_from_slice(&INDEX_MARK);
    dest.extend(std::iter::repeat(GAP_BYTE).take(GAP1_SIZE));

    for record in SectorIter::new(track) {
        dest.extend(std::iter::repeat(0x00).take(SYNC_SIZE));
        dest.extend_from_slice(&ID_ADDRESS_MARK);
        dest.extend_from_slice(&record.id().to_bytes());
        dest.extend_from_slice(&CRC_PLACEHOLDER);
        dest.extend(std::iter::repeat(0x00).take(GAP2_SIZE));

        dest.extend(std::iter::repeat(0x00).take(SYNC_SIZE));
        dest.extend_from_slice(&DATA_ADDRESS_MARK);
        let copied = record.data.len().min(DATA_SLOT_SIZE);
        dest.extend_from_slice(&record.data[..copied]);
        dest.extend(std::iter::repeat(0x00).take(DATA_SLOT_SIZE - copied));
        dest.extend_from_slice(&CRC_PLACEHOLDER);
        dest.extend(std::iter::repeat(GAP_BYTE).take(GAP3_SIZE));
    }

    dest.extend(std::iter::repeat(GAP_BYTE).take(GAP4_SIZE));

    if dest.len() < REPORTED_TRACK_SIZE {
        dest.resize(REPORTED_TRACK_SIZE, GAP_BYTE);
    }
    REPORTED_TRACK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::sector::{SectorHeader, SectorId};

    fn build_track(count: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        for r in 1..=count {
            let header = SectorHeader {
                id: SectorId::new(2, 1, r, 1),
                sectors_in_track: count as u16,
                data_size: 256,
                ..Default::default()
            };
            buf.extend_from_slice(&header.encode());
            buf.extend(std::iter::repeat(r).take(256));
        }
        buf
    }

    #[test]
    fn test_field_sizes() {
        assert_eq!(PREAMBLE_SIZE, 146);
        assert_eq!(ID_FIELD_SIZE, 44);
        assert_eq!(DATA_FIELD_SIZE, 296);
        assert_eq!(REPORTED_TRACK_SIZE, 146 + 16 * 340 + 22);
    }

    #[test]
    fn test_synthesized_layout() {
        let track = build_track(16);
        let mut dest = Vec::new();
        let size = synthesize_track(&mut dest, &track);

        assert_eq!(size, REPORTED_TRACK_SIZE);
        assert_eq!(dest.len(), REPORTED_TRACK_SIZE);
        assert_eq!(&dest[92..96], &INDEX_MARK);

        let id_field = &dest[PREAMBLE_SIZE..];
        assert_eq!(&id_field[12..16], &ID_ADDRESS_MARK);
        assert_eq!(&id_field[16..20], &[2, 1, 1, 1]);
        assert_eq!(&id_field[20..22], &CRC_PLACEHOLDER);

        let data_field = &dest[PREAMBLE_SIZE + ID_FIELD_SIZE..];
        assert_eq!(&data_field[12..16], &DATA_ADDRESS_MARK);
        assert!(data_field[16..16 + 256].iter().all(|&b| b == 1));

        let second_id = &dest[PREAMBLE_SIZE + ID_FIELD_SIZE + DATA_FIELD_SIZE..];
        assert_eq!(second_id[18], 2);
    }

    #[test]
    fn test_short_track_reports_sixteen_sectors() {
        let track = build_track(5);
        let mut dest = Vec::new();
        let size = synthesize_track(&mut dest, &track);

        assert_eq!(size, REPORTED_TRACK_SIZE);
        assert_eq!(dest.len(), REPORTED_TRACK_SIZE);
        assert_eq!(dest[REPORTED_TRACK_SIZE - 1], GAP_BYTE);
    }
}
