/// I/O operations for reading and writing D88 files

/// Reader implementation for D88 files
pub mod reader;
/// Writer implementation for D88 files
pub mod writer;

pub use reader::{read_header, read_track};
pub use writer::{set_write_protect, write_at, write_image};
