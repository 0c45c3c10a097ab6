/// Integration tests for d88fdc

use d88fdc::format::constants::HEADER_SIZE;
use d88fdc::image::raw::{GAP_BYTE, INDEX_MARK, REPORTED_TRACK_SIZE};
use d88fdc::{
    D88Error, D88Image, D88ImageBuilder, DiskKind, DriveRequest, DriveSet, Fdc, FdcConfig,
    FdcStatus0, FdcStatus1, FdcStatus2, FdcStatus3, MainStatus, Phase, SectorId, TrackPos,
};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

const DATA_PORT: u8 = 0xFB;
const STATUS_PORT: u8 = 0xFA;
const TC_PORT: u8 = 0xF8;

/// Write the standard test disk: 40 cylinders of 16 sectors of 256 bytes
fn standard_image(dir: &Path, name: &str, fill: u8, write_protect: bool) -> PathBuf {
    let path = dir.join(name);
    D88ImageBuilder::new()
        .name("TEST")
        .cylinders(40)
        .sectors_per_track(16)
        .size_code(1)
        .fill(fill)
        .write_protect(write_protect)
        .build(&path)
        .expect("Failed to build image");
    path
}

fn controller_with(path: &Path, unit: usize) -> Fdc {
    let mut drives = DriveSet::new();
    drives.open_drive(unit, path).expect("Failed to open image");
    Fdc::new(drives)
}

fn send(fdc: &mut Fdc, bytes: &[u8]) {
    for &b in bytes {
        fdc.write_port(DATA_PORT, b);
    }
}

fn read_bytes(fdc: &mut Fdc, count: usize) -> Vec<u8> {
    (0..count).map(|_| fdc.read_port(DATA_PORT)).collect()
}

fn drain_result(fdc: &mut Fdc) -> Vec<u8> {
    let mut result = Vec::new();
    while fdc.phase() == Phase::Result {
        result.push(fdc.read_port(DATA_PORT));
    }
    result
}

fn read_data_command(unit: u8, head: u8, c: u8, r: u8, n: u8, eot: u8) -> [u8; 9] {
    [0x46, (head << 2) | unit, c, head, r, n, eot, 0x0E, 0xFF]
}

fn seek(fdc: &mut Fdc, unit: u8, cylinder: u8) -> Vec<u8> {
    send(fdc, &[0x0F, unit, cylinder]);
    send(fdc, &[0x08]);
    drain_result(fdc)
}

#[test]
fn test_standard_image_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);

    let expected = HEADER_SIZE + 40 * 2 * 16 * (16 + 256);
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, expected);

    let image = D88Image::open(&path).unwrap();
    assert_eq!(image.header().disk_size as usize, expected);
    assert_eq!(image.header().kind, DiskKind::TwoD);
    assert_eq!(image.max_track(), 84);
    assert!(image.track(79).is_some());
    assert!(image.track(80).is_none());
    assert!(!image.is_write_protected());
}

#[test]
fn test_read_data_first_sector() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);
    let irq = fdc.irq_line();

    send(&mut fdc, &read_data_command(0, 0, 0, 1, 1, 16));
    assert_eq!(fdc.phase(), Phase::Execution);
    assert_eq!(
        fdc.read_port(STATUS_PORT),
        MainStatus::RQM | MainStatus::EXM | MainStatus::DIO | MainStatus::CB
    );
    assert!(irq.take());

    let data = read_bytes(&mut fdc, 256);
    assert!(data.iter().all(|&b| b == 0xE5));
    assert!(irq.take());

    fdc.read_port(TC_PORT);
    let result = drain_result(&mut fdc);
    assert_eq!(result.len(), 7);
    assert_eq!(result[0], 0x00);
    assert_eq!(result[1], 0x00);
    assert_eq!(result[2], 0x00);
    assert_eq!(&result[3..], &[0, 0, 2, 1]);
    assert_eq!(fdc.phase(), Phase::Waiting);
    assert_eq!(fdc.read_port(STATUS_PORT), MainStatus::RQM);
}

#[test]
fn test_read_data_unbound_unit() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);

    send(&mut fdc, &read_data_command(2, 0, 0, 1, 1, 16));
    let result = drain_result(&mut fdc);

    let st0 = FdcStatus0(result[0]);
    assert!(st0.abnormal_termination());
    assert!(st0.not_ready());
    assert_eq!(st0.unit(), 2);
    assert_eq!(result[1], FdcStatus1::ND | FdcStatus1::MA);
    assert_eq!(result[2], FdcStatus2::MD);
}

#[test]
fn test_read_data_missing_sector() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);

    send(&mut fdc, &read_data_command(0, 0, 0, 17, 1, 17));
    fdc.read_port(DATA_PORT);
    assert_eq!(fdc.phase(), Phase::Result);

    let result = drain_result(&mut fdc);
    assert!(FdcStatus0(result[0]).abnormal_termination());
    assert_eq!(result[1], FdcStatus1::ND | FdcStatus1::MA);
    assert_eq!(result[2], FdcStatus2::MD);
}

#[test]
fn test_read_data_auto_advances_cylinder() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0x00, false);
    {
        let mut image = D88Image::open(&path).unwrap();
        image
            .write_sector(TrackPos::new(0, 0), SectorId::new(0, 0, 16, 1), &[0x16; 256])
            .unwrap();
        image
            .write_sector(TrackPos::new(1, 0), SectorId::new(1, 0, 1, 1), &[0x21; 256])
            .unwrap();
    }

    let mut fdc = controller_with(&path, 0);
    send(&mut fdc, &read_data_command(0, 0, 0, 16, 1, 16));

    let first = read_bytes(&mut fdc, 256);
    assert!(first.iter().all(|&b| b == 0x16));
    assert_eq!(fdc.io_params().id, SectorId::new(1, 0, 1, 1));

    let second = read_bytes(&mut fdc, 256);
    assert_eq!(fdc.phase(), Phase::Execution);
    assert!(second.iter().all(|&b| b == 0x21));

    fdc.read_port(TC_PORT);
    let result = drain_result(&mut fdc);
    assert_eq!(result[0], 0x00);
    assert_eq!(&result[3..], &[1, 0, 2, 1]);
    // The drive itself has not moved
    assert_eq!(fdc.drives().unit(0).cylinder, 0);
}

#[test]
fn test_write_data_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 1);

    assert_eq!(seek(&mut fdc, 1, 5), vec![FdcStatus0::SE | 1, 5]);

    send(&mut fdc, &[0x45, 0x05, 5, 1, 9, 1, 16, 0x1B, 0xFF]);
    assert_eq!(fdc.phase(), Phase::Execution);
    assert_eq!(
        fdc.read_port(STATUS_PORT),
        MainStatus::RQM | MainStatus::EXM | MainStatus::CB
    );

    let payload: Vec<u8> = (0..=255).collect();
    send(&mut fdc, &payload);
    let result = drain_result(&mut fdc);
    assert_eq!(result, vec![0x05, 0, 0, 5, 1, 9, 1]);

    fdc.drives_mut().eject();

    let mut image = D88Image::open(&path).unwrap();
    let mut data = Vec::new();
    let len = image
        .read_sector(TrackPos::new(5, 1), SectorId::new(5, 1, 9, 1), &mut data)
        .unwrap();
    assert_eq!(len, 256);
    assert_eq!(data, payload);

    // Neighbors are untouched
    image
        .read_sector(TrackPos::new(5, 1), SectorId::new(5, 1, 10, 1), &mut data)
        .unwrap();
    assert!(data.iter().all(|&b| b == 0xE5));
}

#[test]
fn test_write_protected_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "wp.d88", 0xE5, true);
    let before = std::fs::read(&path).unwrap();

    let mut fdc = controller_with(&path, 0);
    assert!(fdc.drives().unit(0).is_write_protected());

    send(&mut fdc, &[0x45, 0x00, 0, 0, 1, 1, 16, 0x1B, 0xFF]);
    let result = drain_result(&mut fdc);
    assert!(FdcStatus0(result[0]).abnormal_termination());
    assert!(FdcStatus1(result[1]).not_writable());

    // Bytes sent afterwards start a new (invalid) command instead of landing on disk
    send(&mut fdc, &[0x00]);
    drain_result(&mut fdc);

    send(&mut fdc, &[0x04, 0x00]);
    let st3 = FdcStatus3(drain_result(&mut fdc)[0]);
    assert!(st3.ready() && st3.write_protected() && st3.track_zero() && st3.two_sided());

    fdc.drives_mut().eject();
    assert_eq!(std::fs::read(&path).unwrap(), before);

    let mut image = D88Image::open(&path).unwrap();
    let result = image.write_sector(TrackPos::new(0, 0), SectorId::new(0, 0, 1, 1), &[0; 256]);
    assert!(matches!(result, Err(D88Error::WriteProtected)));
}

#[test]
fn test_read_id_walks_track() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut image = D88Image::open(&path).unwrap();
    let pos = TrackPos::new(2, 1);

    let records: Vec<u8> = (0..16).map(|_| image.read_id(pos).unwrap().record).collect();
    assert_eq!(records, (1..=16).collect::<Vec<u8>>());

    // Wraps back to the first sector
    assert_eq!(image.read_id(pos).unwrap(), SectorId::new(2, 1, 1, 1));
}

#[test]
fn test_read_id_wraps_on_overstated_sector_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.d88");
    D88ImageBuilder::new()
        .cylinders(1)
        .sectors_per_track(4)
        .build(&path)
        .unwrap();

    // Every record on track 0 claims six sectors although only four exist
    let mut bytes = std::fs::read(&path).unwrap();
    for sector in 0..4 {
        bytes[HEADER_SIZE + sector * (16 + 256) + 4] = 6;
    }
    std::fs::write(&path, &bytes).unwrap();

    let mut image = D88Image::open(&path).unwrap();
    let pos = TrackPos::new(0, 0);
    let records: Vec<u8> = (0..10).map(|_| image.read_id(pos).unwrap().record).collect();
    assert_eq!(records, vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2]);
}

#[test]
fn test_read_id_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);

    seek(&mut fdc, 0, 7);
    send(&mut fdc, &[0x4A, 0x04]);
    assert_eq!(drain_result(&mut fdc), vec![0x04, 0, 0, 7, 1, 1, 1]);
    send(&mut fdc, &[0x4A, 0x04]);
    assert_eq!(drain_result(&mut fdc)[5], 2);
}

#[test]
fn test_read_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);

    send(&mut fdc, &[0x42, 0x00, 0, 0, 1, 1, 16, 0x0E, 0xFF]);
    let raw = read_bytes(&mut fdc, REPORTED_TRACK_SIZE);
    assert_eq!(fdc.phase(), Phase::Execution);
    assert!(raw[..80].iter().all(|&b| b == GAP_BYTE));
    assert_eq!(&raw[92..96], &INDEX_MARK);

    fdc.read_port(TC_PORT);
    let result = drain_result(&mut fdc);
    assert_eq!(result[0], 0x00);
}

#[test]
fn test_write_id_reformats_track() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);

    seek(&mut fdc, 0, 3);
    send(&mut fdc, &[0x4D, 0x04, 2, 8, 0x35, 0x5A]);
    assert_eq!(fdc.phase(), Phase::Execution);
    for r in 1..=8 {
        send(&mut fdc, &[3, 1, r, 2]);
    }
    let result = drain_result(&mut fdc);
    assert_eq!(result, vec![0x04, 0, 0, 0, 0, 0, 0]);

    send(&mut fdc, &read_data_command(0, 1, 3, 4, 2, 8));
    let data = read_bytes(&mut fdc, 512);
    assert!(data.iter().all(|&b| b == 0x5A));
    fdc.read_port(TC_PORT);
    drain_result(&mut fdc);

    fdc.drives_mut().eject();
    let mut image = D88Image::open(&path).unwrap();
    let ids = image.sector_ids(TrackPos::new(3, 1)).unwrap();
    assert_eq!(ids.len(), 8);
    assert_eq!(ids[7], SectorId::new(3, 1, 8, 2));

    // Old geometry is gone
    let mut buf = Vec::new();
    let old = image.read_sector(TrackPos::new(3, 1), SectorId::new(3, 1, 1, 1), &mut buf);
    assert!(matches!(old, Err(D88Error::SectorNotFound { .. })));
}

#[test]
fn test_write_id_track_too_small() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let before = std::fs::read(&path).unwrap();
    let mut fdc = controller_with(&path, 0);

    // 16 sectors of 1024 bytes cannot fit a 16 x 256 track
    send(&mut fdc, &[0x4D, 0x00, 3, 16, 0x35, 0x00]);
    for r in 1..=16 {
        send(&mut fdc, &[0, 0, r, 3]);
    }
    let result = drain_result(&mut fdc);
    assert!(FdcStatus0(result[0]).abnormal_termination());
    assert_eq!(result[1], FdcStatus1::MA);

    fdc.drives_mut().eject();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_seek_with_disk_and_sense_device_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 3);

    assert_eq!(seek(&mut fdc, 3, 20), vec![FdcStatus0::SE | 3, 20]);

    send(&mut fdc, &[0x04, 0x07]);
    let st3 = drain_result(&mut fdc)[0];
    assert_eq!(st3, FdcStatus3::RY | FdcStatus3::TS | 0x07);

    send(&mut fdc, &[0x07, 0x03]);
    send(&mut fdc, &[0x08]);
    assert_eq!(drain_result(&mut fdc), vec![FdcStatus0::SE | 3, 0]);
}

#[test]
fn test_cylinder_survives_disk_swap() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut fdc = controller_with(&path, 0);

    seek(&mut fdc, 0, 9);
    fdc.drives_mut().apply(DriveRequest::Close { index: 0 }).unwrap();
    fdc.drives_mut()
        .apply(DriveRequest::Open {
            index: 0,
            path: path.clone(),
        })
        .unwrap();

    send(&mut fdc, &[0x4A, 0x00]);
    assert_eq!(drain_result(&mut fdc)[3], 9);
}

#[test]
fn test_open_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);

    let wrong_ext = dir.path().join("std.img");
    std::fs::copy(&path, &wrong_ext).unwrap();
    assert!(matches!(D88Image::open(&wrong_ext), Err(D88Error::Format(_))));

    let upper = dir.path().join("STD.D88");
    std::fs::copy(&path, &upper).unwrap();
    assert!(D88Image::open(&upper).is_ok());

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0x1B] = 0x20;
    let hd = dir.path().join("hd.d88");
    std::fs::write(&hd, &bytes).unwrap();
    assert!(matches!(
        D88Image::open(&hd),
        Err(D88Error::UnsupportedKind(0x20))
    ));

    let short = dir.path().join("short.d88");
    std::fs::write(&short, &bytes[..0x100]).unwrap();
    assert!(D88Image::open(&short).is_err());
}

#[test]
fn test_create_refuses_existing_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "keep.d88", 0xE5, false);
    let mut image = D88Image::open(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let result = D88ImageBuilder::new().cylinders(2).build(&path);
    assert!(matches!(result, Err(D88Error::AlreadyExists(_))));
    assert_eq!(std::fs::read(&path).unwrap(), before);

    // The open image still sees its sectors
    let mut buf = Vec::new();
    let id = SectorId::new(5, 0, 1, 1);
    assert_eq!(image.read_sector(TrackPos::new(5, 0), id, &mut buf).unwrap(), 256);
}

#[test]
fn test_write_protect_toggle_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "toggle.d88", 0xE5, false);
    let mut drives = DriveSet::new();

    drives.open_drive(0, &path).unwrap();
    assert!(matches!(
        drives.set_write_protect(&path, true),
        Err(D88Error::Mounted(0))
    ));
    drives.close_drive(0).unwrap();

    drives.set_write_protect(&path, true).unwrap();
    drives.open_drive(0, &path).unwrap();
    assert!(drives.get(0).unwrap().is_write_protected());
    let st3 = {
        let mut fdc = Fdc::new(drives);
        send(&mut fdc, &[0x04, 0x00]);
        drain_result(&mut fdc)[0]
    };
    assert_ne!(st3 & FdcStatus3::WP, 0);

    let mut drives = DriveSet::new();
    drives.set_write_protect(&path, false).unwrap();
    drives.open_drive(1, &path).unwrap();
    assert!(!drives.get(1).unwrap().is_write_protected());
}

#[test]
fn test_closed_image_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "std.d88", 0xE5, false);
    let mut image = D88Image::open(&path).unwrap();

    image.close();
    image.close();
    assert!(!image.is_ready());

    let mut buf = Vec::new();
    let pos = TrackPos::new(0, 0);
    let id = SectorId::new(0, 0, 1, 1);
    assert!(matches!(image.read_sector(pos, id, &mut buf), Err(D88Error::NotReady)));
    assert!(matches!(image.write_sector(pos, id, &[0; 256]), Err(D88Error::NotReady)));
}

#[test]
fn test_config_mounts_startup_disks() {
    let dir = tempfile::tempdir().unwrap();
    let path = standard_image(dir.path(), "boot.d88", 0xE5, false);
    let config = FdcConfig::parse(&format!(
        "disk1 = {:?}\ntrace_ports = true\n",
        path.display().to_string()
    ))
    .unwrap();

    let fdc = Fdc::new(DriveSet::from_config(&config));
    assert!(!fdc.drives().unit(0).is_ready());
    assert!(fdc.drives().unit(1).is_ready());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_size_mismatch_always_rejected(extra in 1usize..4096, truncate in any::<bool>()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.d88");
        D88ImageBuilder::new()
            .cylinders(2)
            .sectors_per_track(4)
            .build(&path)
            .unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        if truncate {
            let keep = bytes.len().saturating_sub(extra).max(HEADER_SIZE);
            bytes.truncate(keep);
        } else {
            bytes.extend(std::iter::repeat(0).take(extra));
        }
        std::fs::write(&path, &bytes).unwrap();

        let result = D88Image::open(&path);
        prop_assert!(
            matches!(result, Err(D88Error::SizeMismatch { .. })),
            "expected SizeMismatch, got {:?}",
            result.map(|_| ())
        );
    }

    #[test]
    fn prop_read_then_write_is_idempotent(
        cylinder in 0u8..40,
        head in 0u8..2,
        record in 1u8..=16,
        seed in any::<u8>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = standard_image(dir.path(), "std.d88", seed, false);
        let before = std::fs::read(&path).unwrap();

        let mut image = D88Image::open(&path).unwrap();
        let pos = TrackPos::new(cylinder, head);
        let id = SectorId::new(cylinder, head, record, 1);

        let mut data = Vec::new();
        image.read_sector(pos, id, &mut data).unwrap();
        image.write_sector(pos, id, &data).unwrap();

        let mut again = Vec::new();
        image.read_sector(pos, id, &mut again).unwrap();
        prop_assert_eq!(&again, &data);

        image.close();
        prop_assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
