/// Builder for creating blank D88 images

use crate::error::{D88Error, Result};
use crate::format::constants::{
    size_code_to_bytes, HEADER_SIZE, HEADS_2D, MAX_FORMAT_SECTORS, MAX_TRACKS_2D,
};
use crate::format::D88Header;
use crate::image::sector::{SectorHeader, SectorId};
use crate::io::writer::write_image;
use std::path::Path;
use tracing::info;

/// Builder for constructing formatted 2D D88 images
#[derive(Debug, Clone)]
pub struct D88ImageBuilder {
    name: String,
    write_protect: bool,
    cylinders: u8,
    sectors_per_track: u8,
    size_code: u8,
    fill: u8,
}

impl D88ImageBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults to 40 cylinders of 16 sectors of 256 bytes, filled with 0xFF.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            write_protect: false,
            cylinders: 40,
            sectors_per_track: 16,
            size_code: 1,
            fill: 0xFF,
        }
    }

    /// Set the disk name
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Set the write-protect flag
    pub fn write_protect(mut self, write_protect: bool) -> Self {
        self.write_protect = write_protect;
        self
    }

    /// Set the number of cylinders (both heads are always formatted)
    pub fn cylinders(mut self, cylinders: u8) -> Self {
        self.cylinders = cylinders;
        self
    }

    /// Set sectors per track
    pub fn sectors_per_track(mut self, sectors_per_track: u8) -> Self {
        self.sectors_per_track = sectors_per_track;
        self
    }

    /// Set the length code of every sector
    pub fn size_code(mut self, size_code: u8) -> Self {
        self.size_code = size_code;
        self
    }

    /// Set the byte every payload is filled with
    pub fn fill(mut self, fill: u8) -> Self {
        self.fill = fill;
        self
    }

    /// Header and track contents the builder would write
    pub fn layout(&self) -> Result<(D88Header, Vec<Vec<u8>>)> {
        let track_count = self.cylinders as usize * HEADS_2D;
        if track_count > MAX_TRACKS_2D {
            return Err(D88Error::format(format!(
                "{} cylinders exceed the {} tracks of a 2D disk",
                self.cylinders, MAX_TRACKS_2D
            )));
        }
        if self.sectors_per_track as usize > MAX_FORMAT_SECTORS {
            return Err(D88Error::format(format!(
                "{} sectors per track exceed the limit of {}",
                self.sectors_per_track, MAX_FORMAT_SECTORS
            )));
        }

        let data_size = size_code_to_bytes(self.size_code);
        let mut header = D88Header::new(self.name.clone());
        header.write_protect = self.write_protect;

        let mut tracks = Vec::with_capacity(track_count);
        let mut offset = HEADER_SIZE;
        for index in 0..track_count {
            let cylinder = (index / HEADS_2D) as u8;
            let head = (index % HEADS_2D) as u8;

            let mut track = Vec::new();
            for record in 1..=self.sectors_per_track {
                let header = SectorHeader {
                    id: SectorId::new(cylinder, head, record, self.size_code),
                    sectors_in_track: self.sectors_per_track as u16,
                    data_size: data_size as u16,
                    ..Default::default()
                };
                track.extend_from_slice(&header.encode());
                track.extend(std::iter::repeat(self.fill).take(data_size));
            }

            if !track.is_empty() {
                header.track_offsets[index] = offset as u32;
                offset += track.len();
                tracks.push(track);
            }
        }
        header.disk_size = offset as u32;

        Ok((header, tracks))
    }

    /// Write the image to `path`
    pub fn build<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let (header, tracks) = self.layout()?;
        write_image(path.as_ref(), &header, &tracks)?;
        info!(
            path = %path.as_ref().display(),
            cylinders = self.cylinders,
            sectors = self.sectors_per_track,
            size_code = self.size_code,
            "created D88 image"
        );
        Ok(())
    }
}

impl Default for D88ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
