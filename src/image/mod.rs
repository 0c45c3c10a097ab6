/// D88 image data structures

/// Builder for writing blank D88 images
pub mod builder;
/// Raw track synthesis for diagnostic reads
pub mod raw;
/// Sector record definitions
pub mod sector;
/// Track extents and sector iteration
pub mod track;

pub use builder::D88ImageBuilder;
pub use sector::{SectorHeader, SectorId, SectorRecord};
pub use track::{SectorIter, Track};

use crate::error::{D88Error, Result};
use crate::format::constants::{size_code_to_bytes, MAX_FORMAT_SECTORS};
use crate::format::{is_d88_file, D88Header};
use crate::io::{reader, writer};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Physical position of the head: which track a sector operation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackPos {
    /// Cylinder the head is over
    pub cylinder: u8,
    /// Selected head
    pub head: u8,
}

impl TrackPos {
    /// Create a new track position
    pub fn new(cylinder: u8, head: u8) -> Self {
        Self { cylinder, head }
    }

    /// Track index in the D88 offset table
    pub fn index(&self) -> usize {
        self.cylinder as usize * 2 + (self.head & 0x01) as usize
    }
}

/// Parameters of a Write ID (track format) request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    /// Length code applied to every sector
    pub size_code: u8,
    /// Byte every payload is filled with
    pub fill: u8,
    /// Recording mode, false for FM
    pub mfm: bool,
    /// IDs to lay down, in rotational order
    pub ids: Vec<SectorId>,
}

/// An open D88 disk image
///
/// Tracks are read from the file the first time they are touched and then
/// kept in memory until [`close`](Self::close). Writes update the cache and
/// go straight through to the file.
#[derive(Debug)]
pub struct D88Image {
    file: Option<File>,
    path: PathBuf,
    header: D88Header,
    tracks: Vec<Option<Track>>,
    next_sector: usize,
    write_protect: bool,
}

impl D88Image {
    /// Open a D88 file from disk
    ///
    /// Write-protected images are reopened read-only. A file the host only
    /// lets us read is treated as write-protected as well.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !is_d88_file(path) {
            return Err(D88Error::format(format!(
                "{} is not a .d88 file",
                path.display()
            )));
        }

        let (mut file, read_only) = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => (file, false),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => (File::open(path)?, true),
            Err(e) => return Err(D88Error::Io(e)),
        };

        let actual = file.metadata()?.len();
        let header = reader::read_header(&mut file)?;
        if actual != header.disk_size as u64 {
            return Err(D88Error::SizeMismatch {
                declared: header.disk_size as u64,
                actual,
            });
        }

        let max_tracks = header
            .kind
            .max_tracks()
            .ok_or(D88Error::UnsupportedKind(u8::from(header.kind)))?;

        let tracks = header
            .track_extents(max_tracks)?
            .into_iter()
            .enumerate()
            .map(|(index, extent)| extent.map(|(offset, length)| Track::new(index, offset, length)))
            .collect();

        if header.write_protect && !read_only {
            file = File::open(path)?;
            debug!(path = %path.display(), "reopened read-only");
        }

        info!(
            path = %path.display(),
            name = %header.name,
            write_protect = header.write_protect || read_only,
            "opened D88 image"
        );

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            write_protect: header.write_protect || read_only,
            header,
            tracks,
            next_sector: 0,
        })
    }

    /// Release cached tracks and the file handle
    ///
    /// Safe to call more than once; afterwards every operation reports
    /// [`D88Error::NotReady`].
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "closed D88 image");
        }
        self.tracks.clear();
        self.next_sector = 0;
        self.write_protect = false;
    }

    /// Check if the image is open
    pub fn is_ready(&self) -> bool {
        self.file.is_some()
    }

    /// Check if writes are refused
    pub fn is_write_protected(&self) -> bool {
        self.write_protect
    }

    /// Decoded disk header
    pub fn header(&self) -> &D88Header {
        &self.header
    }

    /// Path the image was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of addressable tracks
    pub fn max_track(&self) -> usize {
        self.tracks.len()
    }

    /// Track descriptor, `None` for unformatted or out-of-range tracks
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index).and_then(Option::as_ref)
    }

    /// Locate and load the track under `pos`
    fn load(&mut self, pos: TrackPos) -> Result<(&mut File, &mut Track)> {
        let file = self.file.as_mut().ok_or(D88Error::NotReady)?;
        let track = self
            .tracks
            .get_mut(pos.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                D88Error::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("track {} is not formatted", pos.index()),
                ))
            })?;
        track.load(file)?;
        Ok((file, track))
    }

    /// Load the track under `pos` for a read, folding load failures into `not_found`
    fn load_for_read(&mut self, pos: TrackPos, not_found: D88Error) -> Result<&[u8]> {
        match self.load(pos) {
            Ok((_, track)) => Ok(track.buffer().unwrap_or(&[])),
            Err(D88Error::NotReady) => Err(D88Error::NotReady),
            Err(e) => {
                warn!(track = pos.index(), error = %e, "track could not be loaded");
                Err(not_found)
            }
        }
    }

    /// Copy the payload of the sector matching `id` into `dest`
    ///
    /// Records are scanned in file order and the first exact CHRN match wins.
    pub fn read_sector(&mut self, pos: TrackPos, id: SectorId, dest: &mut Vec<u8>) -> Result<usize> {
        let buf = self.load_for_read(pos, not_found(id))?;
        let record = track::find_sector(buf, id).ok_or_else(|| not_found(id))?;

        dest.clear();
        dest.extend_from_slice(record.data);
        Ok(record.data.len())
    }

    /// ID of the next sector to pass under the head
    ///
    /// Successive calls walk the track in on-disk order and wrap around after
    /// the last sector.
    pub fn read_id(&mut self, pos: TrackPos) -> Result<SectorId> {
        let missing = not_found(SectorId::new(pos.cylinder, pos.head, 0, 0));
        let cursor = self.next_sector;
        let buf = self.load_for_read(pos, missing)?;

        let count = track::sector_count(buf);
        if count == 0 {
            return Err(not_found(SectorId::new(pos.cylinder, pos.head, 0, 0)));
        }
        let cursor = if cursor >= count { 0 } else { cursor };
        let id = SectorIter::new(buf)
            .nth(cursor)
            .map(|record| record.id())
            .ok_or_else(|| not_found(SectorId::new(pos.cylinder, pos.head, 0, 0)))?;

        self.next_sector = cursor + 1;
        Ok(id)
    }

    /// Synthesize the raw contents of the track under `pos` into `dest`
    pub fn read_diagnostic(&mut self, pos: TrackPos, dest: &mut Vec<u8>) -> Result<usize> {
        let missing = not_found(SectorId::new(pos.cylinder, pos.head, 0, 0));
        let buf = self.load_for_read(pos, missing)?;
        Ok(raw::synthesize_track(dest, buf))
    }

    /// Overwrite the payload of the sector matching `id` and persist it
    ///
    /// Only the payload bytes are written back to the file.
    pub fn write_sector(&mut self, pos: TrackPos, id: SectorId, src: &[u8]) -> Result<usize> {
        if !self.is_ready() {
            return Err(D88Error::NotReady);
        }
        if self.write_protect {
            return Err(D88Error::WriteProtected);
        }

        let (file, track) = self.load(pos)?;
        let track_offset = track.offset;
        let buf = track.load(file)?;
        let (data_offset, data_size) = track::find_sector(buf, id)
            .map(|record| (record.data_offset, record.data.len()))
            .ok_or_else(|| not_found(id))?;

        let copied = data_size.min(src.len());
        buf[data_offset..data_offset + copied].copy_from_slice(&src[..copied]);
        writer::write_at(
            file,
            track_offset + data_offset as u64,
            &buf[data_offset..data_offset + data_size],
        )?;

        debug!(%id, bytes = data_size, "sector written");
        Ok(data_size)
    }

    /// Rebuild the track under `pos` from `request` and persist it in one write
    pub fn write_id(&mut self, pos: TrackPos, request: &FormatRequest) -> Result<usize> {
        if !self.is_ready() {
            return Err(D88Error::NotReady);
        }
        if self.write_protect {
            return Err(D88Error::WriteProtected);
        }

        let rebuilt = build_track(request);
        let (file, track) = self.load(pos)?;
        if rebuilt.len() > track.length {
            return Err(D88Error::Io(std::io::Error::new(
                ErrorKind::Other,
                format!(
                    "formatted track needs {} bytes, track {} has {}",
                    rebuilt.len(),
                    track.index,
                    track.length
                ),
            )));
        }

        let track_offset = track.offset;
        let buf = track.load(file)?;
        buf[..rebuilt.len()].copy_from_slice(&rebuilt);
        writer::write_at(file, track_offset, &rebuilt)?;

        debug!(
            track = pos.index(),
            sectors = request.ids.len(),
            size_code = request.size_code,
            "track formatted"
        );
        Ok(request.ids.len())
    }

    /// IDs of every sector on the track under `pos`, in on-disk order
    pub fn sector_ids(&mut self, pos: TrackPos) -> Result<Vec<SectorId>> {
        let (_, track) = self.load(pos)?;
        Ok(track.sectors().map(|record| record.id()).collect())
    }
}

impl Drop for D88Image {
    fn drop(&mut self) {
        self.close();
    }
}

fn not_found(id: SectorId) -> D88Error {
    D88Error::SectorNotFound {
        c: id.cylinder,
        h: id.head,
        r: id.record,
        n: id.size_code,
    }
}

/// Lay out the sector records of a freshly formatted track
fn build_track(request: &FormatRequest) -> Vec<u8> {
    let count = request.ids.len().min(MAX_FORMAT_SECTORS);
    let data_size = size_code_to_bytes(request.size_code);
    let mut buf = Vec::with_capacity(count * (16 + data_size));

    for id in request.ids.iter().take(count) {
        let header = SectorHeader {
            id: *id,
            sectors_in_track: count as u16,
            density: if request.mfm { 0x00 } else { 0x40 },
            deleted: 0,
            status: 0,
            data_size: data_size as u16,
        };
        buf.extend_from_slice(&header.encode());
        buf.extend(std::iter::repeat(request.fill).take(data_size));
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_pos_index() {
        assert_eq!(TrackPos::new(0, 0).index(), 0);
        assert_eq!(TrackPos::new(0, 1).index(), 1);
        assert_eq!(TrackPos::new(5, 1).index(), 11);
        assert_eq!(TrackPos::new(41, 1).index(), 83);
    }

    #[test]
    fn test_build_track() {
        let request = FormatRequest {
            size_code: 1,
            fill: 0xE5,
            mfm: true,
            ids: (1..=3).map(|r| SectorId::new(4, 0, r, 1)).collect(),
        };
        let buf = build_track(&request);
        assert_eq!(buf.len(), 3 * (16 + 256));

        let records: Vec<_> = SectorIter::new(&buf).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].id(), SectorId::new(4, 0, 3, 1));
        assert_eq!(records[0].header.density, 0);
        assert!(records[1].data.iter().all(|&b| b == 0xE5));
    }

    #[test]
    fn test_build_track_fm_density() {
        let request = FormatRequest {
            size_code: 0,
            fill: 0,
            mfm: false,
            ids: vec![SectorId::new(0, 0, 1, 0)],
        };
        let buf = build_track(&request);
        assert_eq!(SectorIter::new(&buf).next().unwrap().header.density, 0x40);
    }

    #[test]
    fn test_open_rejects_extension() {
        let result = D88Image::open("disk.dsk");
        assert!(matches!(result, Err(D88Error::Format(_))));
    }
}
