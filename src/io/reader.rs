/// D88 file reader

use crate::error::{D88Error, Result};
use crate::format::constants::HEADER_SIZE;
use crate::format::D88Header;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Read and decode the disk header at the start of the file
pub fn read_header(file: &mut File) -> Result<D88Header> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut bytes).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => D88Error::format("file shorter than D88 header"),
        _ => D88Error::Io(e),
    })?;
    D88Header::decode(&bytes)
}

/// Read `length` bytes of raw track data starting at `offset`
pub fn read_track(file: &mut File, offset: u64, length: usize) -> Result<Vec<u8>> {
    let mut data = vec![0u8; length];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut data)?;
    Ok(data)
}
