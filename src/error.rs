use thiserror::Error;

/// Result type alias for D88 and controller operations
pub type Result<T> = std::result::Result<T, D88Error>;

/// Errors that can occur when working with D88 images
///
/// The first group is reported by [`D88Image::open`](crate::image::D88Image::open)
/// and leaves the drive empty until a later open succeeds. The second group is
/// reported by sector operations; the controller folds those into result
/// status bytes instead of passing them on.
#[derive(Debug, Error)]
pub enum D88Error {
    /// The file is not a D88 container, or its header is malformed
    #[error("Invalid format: {0}")]
    Format(String),

    /// The header's declared disk size disagrees with the file length
    #[error("Size mismatch: header declares {declared} bytes, file has {actual}")]
    SizeMismatch {
        /// Size recorded in the header
        declared: u64,
        /// Size of the file on disk
        actual: u64,
    },

    /// Disk kind other than 2D
    #[error("Unsupported disk kind 0x{0:02X}")]
    UnsupportedKind(u8),

    /// No image is open
    #[error("Drive not ready")]
    NotReady,

    /// The image was opened from a write-protected file
    #[error("Disk is write-protected")]
    WriteProtected,

    /// No sector record matches the requested geometry
    #[error("Sector not found: C={c:02X} H={h:02X} R={r:02X} N={n:02X}")]
    SectorNotFound {
        /// Cylinder
        c: u8,
        /// Head
        h: u8,
        /// Record
        r: u8,
        /// Length code
        n: u8,
    },

    /// I/O error occurred while reading or writing the backing file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid drive index specified
    #[error("Invalid drive {0} (max: 3)")]
    InvalidDrive(usize),

    /// A new image would overwrite an existing file
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(std::path::PathBuf),

    /// The image is bound to a drive and cannot be changed in place
    #[error("Image is mounted in drive {0}")]
    Mounted(usize),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl D88Error {
    /// Create a format error
    pub fn format<S: Into<String>>(message: S) -> Self {
        D88Error::Format(message.into())
    }

    /// Create an I/O error for a write that persisted fewer bytes than expected
    pub fn short_write(expected: usize, written: usize) -> Self {
        D88Error::Io(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            format!("short write: {written} of {expected} bytes"),
        ))
    }

    /// Whether this error can only come out of opening an image
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            D88Error::Format(_) | D88Error::SizeMismatch { .. } | D88Error::UnsupportedKind(_)
        )
    }
}
