/// D88 file writer

use crate::error::{D88Error, Result};
use crate::format::constants::{HEADER_WRITE_PROTECT_OFFSET, WRITE_PROTECT_ON};
use crate::format::{is_d88_file, D88Header};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::Path;

/// Write `bytes` at `offset`, failing if fewer bytes reach the file
pub fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;

    let mut written = 0;
    while written < bytes.len() {
        match file.write(&bytes[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(D88Error::Io(e)),
        }
    }
    if written != bytes.len() {
        return Err(D88Error::short_write(bytes.len(), written));
    }

    file.flush()?;
    Ok(())
}

/// Write a complete image: the header followed by each populated track
///
/// Tracks are laid out back to back in table order, which must agree with
/// the offsets recorded in `header`. An existing file at `path` is left alone
/// and reported as [`D88Error::AlreadyExists`].
pub fn write_image<P: AsRef<Path>>(path: P, header: &D88Header, tracks: &[Vec<u8>]) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => D88Error::AlreadyExists(path.to_path_buf()),
            _ => D88Error::Io(e),
        })?;
    file.write_all(&header.encode())?;
    for track in tracks {
        file.write_all(track)?;
    }
    file.flush()?;
    Ok(())
}

/// Set or clear the write-protect flag in the header of the image at `path`
///
/// Only the flag byte is rewritten. The file must not be open as a mounted
/// image; callers check that first.
pub fn set_write_protect<P: AsRef<Path>>(path: P, protect: bool) -> Result<()> {
    let path = path.as_ref();
    if !is_d88_file(path) {
        return Err(D88Error::format(format!("{} is not a .d88 file", path.display())));
    }
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let header = super::reader::read_header(&mut file)?;
    let flag = if protect { WRITE_PROTECT_ON } else { 0 };
    if header.write_protect != protect {
        write_at(&mut file, HEADER_WRITE_PROTECT_OFFSET as u64, &[flag])?;
    }
    Ok(())
}
