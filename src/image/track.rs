/// Track extents and sector iteration

use crate::error::Result;
use crate::format::constants::SECTOR_HEADER_SIZE;
use crate::image::sector::{SectorHeader, SectorId, SectorRecord};
use crate::io::reader::read_track;
use std::fs::File;
use tracing::debug;

/// One track's slice of the image file, with its lazily loaded contents
#[derive(Debug, Clone)]
pub struct Track {
    /// Track index (cylinder * 2 + head)
    pub index: usize,
    /// Byte offset of the track in the image file
    pub offset: u64,
    /// Byte length of the track in the image file
    pub length: usize,
    /// Cached contents, populated on first access and kept until close
    buffer: Option<Vec<u8>>,
}

impl Track {
    /// Create a track descriptor with nothing cached
    pub fn new(index: usize, offset: u64, length: usize) -> Self {
        Self {
            index,
            offset,
            length,
            buffer: None,
        }
    }

    /// Check if the track contents have been loaded
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Cached contents, if loaded
    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Load the track from `file` on first use and return the cached contents
    pub fn load(&mut self, file: &mut File) -> Result<&mut Vec<u8>> {
        if self.buffer.is_none() {
            let data = read_track(file, self.offset, self.length)?;
            debug!(track = self.index, offset = self.offset, length = self.length, "track loaded");
            self.buffer = Some(data);
        }
        Ok(self.buffer.get_or_insert_with(Vec::new))
    }

    /// Drop cached contents
    pub fn release(&mut self) {
        self.buffer = None;
    }

    /// Iterate over the sector records of a loaded track (empty if not loaded)
    pub fn sectors(&self) -> SectorIter<'_> {
        SectorIter::new(self.buffer.as_deref().unwrap_or(&[]))
    }
}

/// Iterator over the sector records of a raw track buffer
///
/// Stops after the sector count declared by the first record, or as soon as a
/// record would run past the end of the buffer.
#[derive(Debug, Clone)]
pub struct SectorIter<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> SectorIter<'a> {
    /// Start iterating at the beginning of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        let remaining = SectorHeader::decode(buf)
            .map(|h| h.sectors_in_track as usize)
            .unwrap_or(0);
        Self {
            buf,
            pos: 0,
            remaining,
        }
    }
}

impl<'a> Iterator for SectorIter<'a> {
    type Item = SectorRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let header = SectorHeader::decode(&self.buf[self.pos.min(self.buf.len())..])?;
        let data_offset = self.pos + SECTOR_HEADER_SIZE;
        let data_end = data_offset + header.data_size as usize;
        if data_end > self.buf.len() {
            self.remaining = 0;
            return None;
        }

        self.pos = data_end;
        self.remaining -= 1;
        Some(SectorRecord {
            header,
            data_offset,
            data: &self.buf[data_offset..data_end],
        })
    }
}

/// Number of sector records present in a raw track buffer
///
/// Never more than the count declared in the first header, and never more
/// than the buffer actually holds.
pub fn sector_count(buf: &[u8]) -> usize {
    SectorIter::new(buf).count()
}

/// Find the first record in file order whose CHRN matches `id`
pub fn find_sector(buf: &[u8], id: SectorId) -> Option<SectorRecord<'_>> {
    SectorIter::new(buf).find(|record| record.id() == id)
}
