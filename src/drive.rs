/// Drive slots and disk selection

use crate::config::FdcConfig;
use crate::error::{D88Error, Result};
use crate::image::D88Image;
use crate::io::writer;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Number of drive slots on the controller
pub const DRIVE_COUNT: usize = 4;

/// A single drive slot
///
/// The head position survives disk swaps: binding or unbinding an image never
/// touches `cylinder`.
#[derive(Debug, Default)]
pub struct Drive {
    image: Option<D88Image>,
    /// Cylinder the head was last moved to
    pub cylinder: u8,
    /// Spindle motor state
    pub motor: bool,
}

impl Drive {
    /// Check if a disk is bound and open
    pub fn is_ready(&self) -> bool {
        self.image.as_ref().is_some_and(D88Image::is_ready)
    }

    /// Check if the bound disk refuses writes
    pub fn is_write_protected(&self) -> bool {
        self.image.as_ref().is_some_and(D88Image::is_write_protected)
    }

    /// The bound image, if any
    pub fn image(&self) -> Option<&D88Image> {
        self.image.as_ref()
    }

    /// The bound image for sector operations
    pub fn image_mut(&mut self) -> Result<&mut D88Image> {
        self.image.as_mut().ok_or(D88Error::NotReady)
    }
}

/// Request sent by a disk-selection front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveRequest {
    /// Bind the image at `path` to drive `index`
    Open {
        /// Drive slot
        index: usize,
        /// Image file
        path: PathBuf,
    },
    /// Unbind whatever is in drive `index`
    Close {
        /// Drive slot
        index: usize,
    },
    /// Unbind every drive
    EjectAll,
}

/// The controller's four drive slots
#[derive(Debug, Default)]
pub struct DriveSet {
    drives: [Drive; DRIVE_COUNT],
}

impl DriveSet {
    /// Create four empty drives
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a drive set with the configured startup images mounted
    ///
    /// Images that fail to open are logged and left out.
    pub fn from_config(config: &FdcConfig) -> Self {
        let mut drives = Self::new();
        for (index, path) in config.disks().into_iter().enumerate() {
            if let Some(path) = path {
                if let Err(e) = drives.open_drive(index, path) {
                    warn!(drive = index, path = %path.display(), error = %e, "startup disk not mounted");
                }
            }
        }
        drives
    }

    /// Get a drive by index
    pub fn get(&self, index: usize) -> Result<&Drive> {
        self.drives.get(index).ok_or(D88Error::InvalidDrive(index))
    }

    /// Get a mutable drive by index
    pub fn get_mut(&mut self, index: usize) -> Result<&mut Drive> {
        self.drives.get_mut(index).ok_or(D88Error::InvalidDrive(index))
    }

    /// Drive selected by the unit bits of a command byte
    pub fn unit(&self, unit: u8) -> &Drive {
        &self.drives[(unit & 0x03) as usize]
    }

    /// Mutable drive selected by the unit bits of a command byte
    pub fn unit_mut(&mut self, unit: u8) -> &mut Drive {
        &mut self.drives[(unit & 0x03) as usize]
    }

    /// Iterate over the drives in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Drive> {
        self.drives.iter()
    }

    /// Bind the image at `path` to drive `index`, replacing any current disk
    ///
    /// On failure the drive is left empty.
    pub fn open_drive<P: AsRef<Path>>(&mut self, index: usize, path: P) -> Result<()> {
        let drive = self.get_mut(index)?;
        drive.image = None;
        let image = D88Image::open(path.as_ref())?;
        info!(drive = index, path = %path.as_ref().display(), "disk inserted");
        drive.image = Some(image);
        Ok(())
    }

    /// Unbind the disk in drive `index`
    pub fn close_drive(&mut self, index: usize) -> Result<()> {
        let drive = self.get_mut(index)?;
        if let Some(mut image) = drive.image.take() {
            image.close();
            info!(drive = index, "disk ejected");
        }
        Ok(())
    }

    /// Unbind every disk
    pub fn eject(&mut self) {
        for index in 0..DRIVE_COUNT {
            // Indices are always in range here
            let _ = self.close_drive(index);
        }
    }

    /// Carry out a disk-selection request
    pub fn apply(&mut self, request: DriveRequest) -> Result<()> {
        match request {
            DriveRequest::Open { index, path } => self.open_drive(index, path),
            DriveRequest::Close { index } => self.close_drive(index),
            DriveRequest::EjectAll => {
                self.eject();
                Ok(())
            }
        }
    }

    /// Drive currently holding the image at `path`, if any
    pub fn mounted_at<P: AsRef<Path>>(&self, path: P) -> Option<usize> {
        let wanted = canonical(path.as_ref());
        self.drives.iter().position(|drive| {
            drive
                .image()
                .is_some_and(|image| image.is_ready() && canonical(image.path()) == wanted)
        })
    }

    /// Set or clear the write-protect flag of an image that is not mounted
    ///
    /// A mounted image keeps its open-time protection, so changing the file
    /// under it is refused with [`D88Error::Mounted`].
    pub fn set_write_protect<P: AsRef<Path>>(&self, path: P, protect: bool) -> Result<()> {
        let path = path.as_ref();
        if let Some(index) = self.mounted_at(path) {
            return Err(D88Error::Mounted(index));
        }
        writer::set_write_protect(path, protect)?;
        info!(path = %path.display(), protect, "write protect changed");
        Ok(())
    }

    /// Set motor state from the low nibble of a motor-control write
    pub fn set_motors(&mut self, mask: u8) {
        for (i, drive) in self.drives.iter_mut().enumerate() {
            drive.motor = mask & (1 << i) != 0;
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
