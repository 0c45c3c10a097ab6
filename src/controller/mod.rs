/// μPD765 floppy disk controller state machine
///
/// The host drives the controller through register accesses only: command
/// and parameter bytes are written to the data register, execution-phase
/// data moves through the same register, and result bytes are read back
/// from it. The main status register tells the host which of these the
/// controller currently expects.
///
/// Sector operations complete synchronously inside the register access that
/// triggers them. Failures from the disk image never leave the controller;
/// they are reported through the ST0-ST2 result bytes.

/// Command opcode table
pub mod command;
/// Host port surface
pub mod ports;

pub use command::{Command, CommandDescriptor, DataPhase};
pub use ports::Port;

use crate::drive::DriveSet;
use crate::error::{D88Error, Result};
use crate::fdc::{FdcStatus0, FdcStatus1, FdcStatus2, FdcStatus3, MainStatus};
use crate::format::constants::{size_code_to_bytes, MAX_FORMAT_SECTORS};
use crate::image::{FormatRequest, SectorId, TrackPos};
use crate::irq::IrqLine;
use command::{FLAG_MF, FLAG_MT, FLAG_SK};
use tracing::{debug, trace, warn};

/// Maximum number of command bytes
pub const COMMAND_BUFFER_SIZE: usize = 10;

/// Maximum number of result bytes
pub const RESULT_BUFFER_SIZE: usize = 10;

/// Initial capacity of the transfer buffer, one full track of sector data
const TRANSFER_BUFFER_SIZE: usize = 256 * 32;

/// First record number on a track
///
/// 2D disks number their sectors from 1, so a transfer that runs past EOT
/// continues at this record on the next cylinder.
pub const FIRST_RECORD: u8 = 1;

/// Result byte reported for an invalid command
pub const INVALID_COMMAND_STATUS: u8 = FdcStatus0::IC;

/// Protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Idle, ready for the first command byte
    Waiting,
    /// Collecting command parameters
    Command,
    /// Moving sector data through the data register
    Execution,
    /// Handing result bytes back to the host
    Result,
}

/// Parameters of the active data command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoParams {
    /// Multi-track flag
    pub multi_track: bool,
    /// MFM recording
    pub mfm: bool,
    /// Skip deleted data
    pub skip: bool,
    /// Head select
    pub head: u8,
    /// Unit select
    pub unit: u8,
    /// Physical cylinder under the head
    pub cylinder: u8,
    /// Sector ID being addressed
    pub id: SectorId,
    /// Last record number on the track
    pub eot: u8,
    /// Gap length
    pub gpl: u8,
    /// Data length when N is 0
    pub dtl: u8,
    /// Sector payload size derived from N
    pub sector_length: usize,
}

impl IoParams {
    /// Decode the parameters of a 9-byte read or write command
    pub fn decode(bytes: &[u8]) -> Self {
        let byte = |i: usize| bytes.get(i).copied().unwrap_or(0);
        let id = SectorId::new(byte(2), byte(3), byte(4), byte(5));
        Self {
            multi_track: byte(0) & FLAG_MT != 0,
            mfm: byte(0) & FLAG_MF != 0,
            skip: byte(0) & FLAG_SK != 0,
            head: (byte(1) >> 2) & 0x01,
            unit: byte(1) & 0x03,
            cylinder: 0,
            id,
            eot: byte(6),
            gpl: byte(7),
            dtl: byte(8),
            sector_length: size_code_to_bytes(id.size_code),
        }
    }

    /// Step to the next record, rolling onto the next cylinder after EOT
    pub fn advance(&mut self) {
        self.id.record = self.id.record.wrapping_add(1);
        if self.id.record > self.eot {
            self.id.cylinder = self.id.cylinder.wrapping_add(1);
            self.id.record = FIRST_RECORD;
            self.cylinder = self.cylinder.wrapping_add(1);
        }
    }

    fn track(&self) -> TrackPos {
        TrackPos::new(self.cylinder, self.head)
    }
}

/// Parameters of an active Write ID command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FormatParams {
    mfm: bool,
    head: u8,
    unit: u8,
    size_code: u8,
    sectors: usize,
    gpl: u8,
    fill: u8,
}

/// Seek outcome held for the next Sense Interrupt Status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeekStatus {
    st0: u8,
    cylinder: u8,
}

/// The floppy disk controller
#[derive(Debug)]
pub struct Fdc {
    drives: DriveSet,
    irq: IrqLine,
    phase: Phase,
    main_status: MainStatus,
    command: Vec<u8>,
    descriptor: Option<&'static CommandDescriptor>,
    io: IoParams,
    format: FormatParams,
    buffer: Vec<u8>,
    buffer_len: usize,
    buffer_pos: usize,
    result: [u8; RESULT_BUFFER_SIZE],
    result_len: usize,
    result_pos: usize,
    seek_status: Option<SeekStatus>,
    precompensation: u8,
    drive_mode: u8,
    vfo: u8,
    trace_ports: bool,
}

impl Fdc {
    /// Create a controller over `drives`
    pub fn new(drives: DriveSet) -> Self {
        Self {
            drives,
            irq: IrqLine::new(),
            phase: Phase::Waiting,
            main_status: MainStatus::IDLE,
            command: Vec::with_capacity(COMMAND_BUFFER_SIZE),
            descriptor: None,
            io: IoParams::default(),
            format: FormatParams::default(),
            buffer: Vec::with_capacity(TRANSFER_BUFFER_SIZE),
            buffer_len: 0,
            buffer_pos: 0,
            result: [0; RESULT_BUFFER_SIZE],
            result_len: 0,
            result_pos: 0,
            seek_status: None,
            precompensation: 0,
            drive_mode: 0,
            vfo: 0,
            trace_ports: false,
        }
    }

    /// Handle to the interrupt request line, for the host dispatcher
    pub fn irq_line(&self) -> IrqLine {
        self.irq.clone()
    }

    /// The drives attached to this controller
    pub fn drives(&self) -> &DriveSet {
        &self.drives
    }

    /// Mutable access to the drives, for disk selection
    pub fn drives_mut(&mut self) -> &mut DriveSet {
        &mut self.drives
    }

    /// Current protocol phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Parameters of the most recent data command
    pub fn io_params(&self) -> &IoParams {
        &self.io
    }

    /// Log every port access at trace level
    pub fn set_trace_ports(&mut self, enabled: bool) {
        self.trace_ports = enabled;
    }

    /// Read the main status register
    pub fn read_status(&self) -> u8 {
        self.main_status.0
    }

    /// Write to the data register
    pub fn write_data(&mut self, value: u8) {
        if self.phase == Phase::Waiting {
            self.command.clear();
            self.descriptor = None;
            self.set_phase(Phase::Command);
        }

        match self.phase {
            Phase::Command => self.command_byte(value),
            Phase::Execution => match self.descriptor.map(|d| d.phase) {
                Some(DataPhase::Write) => self.execution_write(value),
                _ => trace!(value, "data write ignored during read execution"),
            },
            _ => trace!(value, phase = ?self.phase, "data write ignored"),
        }
    }

    /// Read from the data register
    pub fn read_data(&mut self) -> u8 {
        match self.phase {
            Phase::Result => {
                let value = self.result[self.result_pos];
                self.result_pos += 1;
                if self.result_pos >= self.result_len {
                    self.complete();
                }
                value
            }
            Phase::Execution => match self.descriptor.map(|d| d.phase) {
                Some(DataPhase::Read) => self.execution_read(),
                _ => self.main_status.0,
            },
            _ => {
                trace!(phase = ?self.phase, "data read outside result phase");
                self.main_status.0
            }
        }
    }

    /// Terminal count: stop the running transfer and report its result
    pub fn terminal_count(&mut self) -> u8 {
        if self.phase == Phase::Execution {
            debug!(transferred = self.buffer_pos, "terminal count");
            self.enter_result(7);
            self.irq.raise();
        } else {
            trace!(phase = ?self.phase, "terminal count outside execution");
        }
        0
    }

    /// Motor control and write precompensation, sharing one port
    pub fn write_motor_control(&mut self, value: u8) {
        if value & 0xF0 != 0 {
            trace!(motors = value & 0x0F, "motor control");
            self.drives.set_motors(value & 0x0F);
        } else {
            self.precompensation = value;
        }
    }

    /// Drive mode and precompensation control
    pub fn write_drive_mode(&mut self, value: u8) {
        self.drive_mode = value;
    }

    /// VFO window control
    pub fn write_vfo(&mut self, value: u8) {
        self.vfo = value;
    }

    /// Last value written to the drive mode port
    pub fn drive_mode(&self) -> u8 {
        self.drive_mode
    }

    /// Last value written to the VFO port
    pub fn vfo(&self) -> u8 {
        self.vfo
    }

    /// Last precompensation setting written to the motor control port
    pub fn precompensation(&self) -> u8 {
        self.precompensation
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "phase change");
        }
        self.phase = phase;
        self.main_status = match phase {
            Phase::Waiting => MainStatus::IDLE,
            Phase::Command => MainStatus(MainStatus::RQM | MainStatus::CB),
            Phase::Execution => {
                let mut status = MainStatus::RQM | MainStatus::EXM | MainStatus::CB;
                if self.descriptor.map(|d| d.phase) == Some(DataPhase::Read) {
                    status |= MainStatus::DIO;
                }
                MainStatus(status)
            }
            Phase::Result => MainStatus(MainStatus::RQM | MainStatus::DIO | MainStatus::CB),
        };
    }

    fn complete(&mut self) {
        self.command.clear();
        self.descriptor = None;
        self.result_len = 0;
        self.result_pos = 0;
        self.set_phase(Phase::Waiting);
    }

    fn enter_result(&mut self, len: usize) {
        self.result_len = len.min(RESULT_BUFFER_SIZE);
        self.result_pos = 0;
        self.set_phase(Phase::Result);
    }

    fn reject(&mut self) {
        warn!(command = ?self.command, "invalid command");
        self.result[0] = INVALID_COMMAND_STATUS;
        self.enter_result(1);
    }

    fn command_byte(&mut self, value: u8) {
        if self.command.len() >= COMMAND_BUFFER_SIZE {
            self.reject();
            return;
        }
        self.command.push(value);

        if self.command.len() == 1 {
            self.descriptor = CommandDescriptor::lookup(value);
            if self.descriptor.is_none() {
                self.reject();
                return;
            }
        }

        let Some(descriptor) = self.descriptor else {
            return;
        };
        if self.command.len() < descriptor.length {
            return;
        }

        trace!(command = %descriptor.command, bytes = ?self.command, "command decoded");
        match descriptor.command {
            Command::ReadData | Command::ReadDiagnostic => self.start_read(),
            Command::ReadId => self.read_id(),
            Command::WriteData => self.start_write_data(),
            Command::WriteId => self.start_write_id(),
            Command::Specify => self.specify(),
            Command::Seek => self.seek(),
            Command::Recalibrate => self.recalibrate(),
            Command::SenseInterruptStatus => self.sense_interrupt_status(),
            Command::SenseDeviceStatus => self.sense_device_status(),
            Command::ReadDeletedData | Command::WriteDeletedData => self.reject(),
        }
    }

    fn clear_result(&mut self) {
        self.result = [0; RESULT_BUFFER_SIZE];
    }

    fn set_result_id(&mut self, id: SectorId) {
        self.result[3..7].copy_from_slice(&id.to_bytes());
    }

    /// Preload a not-ready result and go straight to the result phase
    fn not_ready(&mut self, head: u8, unit: u8, id: SectorId) {
        self.result[0] = FdcStatus0::for_unit(head, unit).0 | FdcStatus0::AT | FdcStatus0::NR;
        self.result[1] = FdcStatus1::ND | FdcStatus1::MA;
        self.result[2] = FdcStatus2::MD;
        self.set_result_id(id);
        debug!(unit, "drive not ready");
        self.enter_result(7);
        self.irq.raise();
    }

    /// Fold a disk error into the ST0-ST2 result bytes
    fn report_error(&mut self, error: &D88Error) {
        let (st0, st1, st2) = match error {
            D88Error::NotReady => (FdcStatus0::AT | FdcStatus0::NR, 0, 0),
            D88Error::WriteProtected => (FdcStatus0::AT, FdcStatus1::NW, 0),
            D88Error::SectorNotFound { .. } => (
                FdcStatus0::AT,
                FdcStatus1::ND | FdcStatus1::MA,
                FdcStatus2::MD,
            ),
            _ => (FdcStatus0::AT, FdcStatus1::MA, 0),
        };
        match error {
            D88Error::SectorNotFound { .. } => debug!(%error, "command ended"),
            _ => warn!(%error, "command failed"),
        }
        self.result[0] |= st0;
        self.result[1] = st1;
        self.result[2] = st2;
    }

    fn start_read(&mut self) {
        self.io = IoParams::decode(&self.command);
        self.buffer.clear();
        self.buffer_len = 0;
        self.buffer_pos = 0;
        self.clear_result();

        let drive = self.drives.unit(self.io.unit);
        if !drive.is_ready() {
            self.not_ready(self.io.head, self.io.unit, self.io.id);
            return;
        }
        self.io.cylinder = drive.cylinder;
        self.result[0] = FdcStatus0::for_unit(self.io.head, self.io.unit).0;

        self.set_phase(Phase::Execution);
        self.irq.raise();
    }

    fn fetch(&mut self) -> Result<usize> {
        let image = self.drives.unit_mut(self.io.unit).image_mut()?;
        let track = self.io.track();
        let len = match self.descriptor.map(|d| d.command) {
            Some(Command::ReadDiagnostic) => image.read_diagnostic(track, &mut self.buffer)?,
            _ => image.read_sector(track, self.io.id, &mut self.buffer)?,
        };
        if len == 0 {
            return Err(D88Error::SectorNotFound {
                c: self.io.id.cylinder,
                h: self.io.id.head,
                r: self.io.id.record,
                n: self.io.id.size_code,
            });
        }
        Ok(len)
    }

    fn execution_read(&mut self) -> u8 {
        if self.buffer_pos >= self.buffer_len {
            match self.fetch() {
                Ok(len) => {
                    trace!(id = %self.io.id, len, "sector fetched");
                    self.buffer_len = len;
                    self.buffer_pos = 0;
                    self.io.advance();
                }
                Err(e) => {
                    self.report_error(&e);
                    self.set_result_id(self.io.id);
                    self.enter_result(7);
                    self.irq.raise();
                    return 0;
                }
            }
        }

        let value = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        self.set_result_id(self.io.id);
        self.irq.raise();
        value
    }

    fn read_id(&mut self) {
        let head = (self.command[1] >> 2) & 0x01;
        let unit = self.command[1] & 0x03;
        self.io = IoParams {
            mfm: self.command[0] & FLAG_MF != 0,
            head,
            unit,
            ..IoParams::default()
        };
        self.clear_result();

        let drive = self.drives.unit(unit);
        if !drive.is_ready() {
            self.not_ready(head, unit, SectorId::default());
            return;
        }
        let track = TrackPos::new(drive.cylinder, head);
        self.io.cylinder = drive.cylinder;

        self.result[0] = FdcStatus0::for_unit(head, unit).0;
        let id = self
            .drives
            .unit_mut(unit)
            .image_mut()
            .and_then(|image| image.read_id(track));
        match id {
            Ok(id) => {
                trace!(%id, "ID read");
                self.io.id = id;
                self.set_result_id(id);
            }
            Err(e) => self.report_error(&e),
        }
        self.enter_result(7);
        self.irq.raise();
    }

    fn start_write_data(&mut self) {
        self.io = IoParams::decode(&self.command);
        self.buffer.clear();
        self.buffer_len = self.io.sector_length;
        self.buffer_pos = 0;
        self.clear_result();

        let drive = self.drives.unit(self.io.unit);
        if !drive.is_ready() {
            self.not_ready(self.io.head, self.io.unit, self.io.id);
            return;
        }
        let write_protected = drive.is_write_protected();
        self.io.cylinder = drive.cylinder;
        self.result[0] = FdcStatus0::for_unit(self.io.head, self.io.unit).0;
        self.set_result_id(self.io.id);

        if write_protected {
            self.report_error(&D88Error::WriteProtected);
            self.enter_result(7);
            self.irq.raise();
            return;
        }

        self.set_phase(Phase::Execution);
        self.irq.raise();
    }

    fn start_write_id(&mut self) {
        let head = (self.command[1] >> 2) & 0x01;
        let unit = self.command[1] & 0x03;
        self.format = FormatParams {
            mfm: self.command[0] & FLAG_MF != 0,
            head,
            unit,
            size_code: self.command[2],
            sectors: (self.command[3] as usize).min(MAX_FORMAT_SECTORS),
            gpl: self.command[4],
            fill: self.command[5],
        };
        self.buffer.clear();
        self.buffer_len = self.format.sectors * 4;
        self.buffer_pos = 0;
        self.clear_result();

        let drive = self.drives.unit(unit);
        if !drive.is_ready() {
            self.not_ready(head, unit, SectorId::default());
            return;
        }
        let write_protected = drive.is_write_protected();
        self.result[0] = FdcStatus0::for_unit(head, unit).0;

        if write_protected {
            self.report_error(&D88Error::WriteProtected);
            self.enter_result(7);
            self.irq.raise();
            return;
        }

        if self.buffer_len == 0 {
            self.finish_write_id();
            return;
        }
        self.set_phase(Phase::Execution);
        self.irq.raise();
    }

    fn execution_write(&mut self, value: u8) {
        self.buffer.push(value);
        self.buffer_pos += 1;
        if self.buffer_pos >= self.buffer_len {
            match self.descriptor.map(|d| d.command) {
                Some(Command::WriteId) => self.finish_write_id(),
                _ => self.finish_write_data(),
            }
        }
        self.irq.raise();
    }

    fn finish_write_data(&mut self) {
        let track = self.io.track();
        let id = self.io.id;
        let written = self
            .drives
            .unit_mut(self.io.unit)
            .image_mut()
            .and_then(|image| image.write_sector(track, id, &self.buffer));
        match written {
            Ok(len) => trace!(%id, len, "sector written"),
            Err(e) => self.report_error(&e),
        }
        self.enter_result(7);
        self.irq.raise();
    }

    fn finish_write_id(&mut self) {
        let format = self.format;
        let ids = self
            .buffer
            .chunks_exact(4)
            .map(|chunk| SectorId::new(chunk[0], chunk[1], chunk[2], chunk[3]))
            .collect();
        let request = FormatRequest {
            size_code: format.size_code,
            fill: format.fill,
            mfm: format.mfm,
            ids,
        };

        let drive = self.drives.unit_mut(format.unit);
        let track = TrackPos::new(drive.cylinder, format.head);
        let formatted = drive
            .image_mut()
            .and_then(|image| image.write_id(track, &request));
        match formatted {
            Ok(sectors) => trace!(track = track.index(), sectors, gpl = format.gpl, "track formatted"),
            Err(e) => self.report_error(&e),
        }
        self.enter_result(7);
        self.irq.raise();
    }

    fn specify(&mut self) {
        trace!(
            srt = self.command[1] >> 4,
            hut = self.command[1] & 0x0F,
            hlt = self.command[2] >> 1,
            non_dma = self.command[2] & 0x01 != 0,
            "specify"
        );
        self.complete();
    }

    fn latch_seek(&mut self, unit: u8, cylinder: u8) {
        let drive = self.drives.unit_mut(unit);
        drive.cylinder = cylinder;

        let mut st0 = FdcStatus0::SE | (unit & FdcStatus0::US_MASK);
        if !drive.is_ready() {
            st0 |= FdcStatus0::AT | FdcStatus0::NR;
        }
        self.seek_status = Some(SeekStatus { st0, cylinder });
        debug!(unit, cylinder, st0 = %FdcStatus0(st0), "seek complete");

        self.complete();
        self.irq.raise();
    }

    fn seek(&mut self) {
        let unit = self.command[1] & 0x03;
        let cylinder = self.command[2];
        self.latch_seek(unit, cylinder);
    }

    fn recalibrate(&mut self) {
        let unit = self.command[1] & 0x03;
        self.latch_seek(unit, 0);
    }

    fn sense_interrupt_status(&mut self) {
        match self.seek_status.take() {
            Some(status) => {
                self.result[0] = status.st0;
                self.result[1] = status.cylinder;
                self.enter_result(2);
            }
            None => {
                self.result[0] = INVALID_COMMAND_STATUS;
                self.enter_result(1);
            }
        }
    }

    fn sense_device_status(&mut self) {
        let select = self.command[1] & (FdcStatus0::HD | FdcStatus0::US_MASK);
        let drive = self.drives.unit(select);

        let mut st3 = select | FdcStatus3::TS;
        if drive.is_ready() {
            st3 |= FdcStatus3::RY;
            if drive.is_write_protected() {
                st3 |= FdcStatus3::WP;
            }
            if drive.cylinder == 0 {
                st3 |= FdcStatus3::T0;
            }
        }
        trace!(st3 = %FdcStatus3(st3), "sense device status");

        self.result[0] = st3;
        self.enter_result(1);
    }
}
