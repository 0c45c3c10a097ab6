/*!
# d88fdc

A μPD765 floppy disk controller and D88 disk image store, as found in the
disk sub-processor of PC-8801 series machines.

## Features

- Phase-accurate controller state machine driven through port reads and writes
- Bit-exact ST0-ST3 and main status register reporting
- Lazily cached, write-through access to 2D D88 images
- Four drive slots with disk selection by message
- Shared interrupt request line for the host dispatcher

## Quick Start

```rust,no_run
use d88fdc::{DriveSet, Fdc, Phase};

let mut drives = DriveSet::new();
drives.open_drive(0, "system.d88")?;

let mut fdc = Fdc::new(drives);
let irq = fdc.irq_line();

// Read Data: drive 0, C=0 H=0 R=1 N=1, EOT=16
for byte in [0x46, 0x00, 0x00, 0x00, 0x01, 0x01, 0x10, 0x0E, 0xFF] {
    fdc.write_port(0xFB, byte);
}

let mut sector = Vec::new();
while sector.len() < 256 {
    sector.push(fdc.read_port(0xFB));
}
assert!(irq.take());

// Terminal count, then collect ST0, ST1, ST2, C, H, R, N
fdc.read_port(0xF8);
let mut result = Vec::new();
while fdc.phase() == Phase::Result {
    result.push(fdc.read_port(0xFB));
}
# Ok::<(), d88fdc::D88Error>(())
```

## Modules

- `controller`: The controller state machine and its port surface
- `drive`: Drive slots and disk selection
- `image`: D88 image access (D88Image, Track, SectorId)
- `format`: D88 header layout and constants
- `fdc`: Status register definitions
- `irq`: Interrupt request line
- `config`: Startup configuration
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Startup configuration
pub mod config;
/// Controller state machine and port surface
pub mod controller;
/// Drive slots and disk selection
pub mod drive;
/// Error types and Result alias
pub mod error;
/// FDC (Floppy Disk Controller) status registers
pub mod fdc;
/// D88 header layout and constants
pub mod format;
/// D88 image access (D88Image, Track, SectorId)
pub mod image;
/// Low-level reads and writes of image files
pub mod io;
/// Interrupt request line
pub mod irq;

// Re-export common types
pub use config::FdcConfig;
pub use controller::{Command, Fdc, IoParams, Phase, Port};
pub use drive::{Drive, DriveRequest, DriveSet, DRIVE_COUNT};
pub use error::{D88Error, Result};
pub use fdc::{FdcStatus0, FdcStatus1, FdcStatus2, FdcStatus3, MainStatus};
pub use format::{D88Header, DiskKind};
pub use image::{D88Image, D88ImageBuilder, FormatRequest, SectorId, Track, TrackPos};
pub use irq::IrqLine;
