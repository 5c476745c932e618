// SPDX-License-Identifier: MIT

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
};

use ndmgpt::{Config, NdmError, run, signature::FsSignature};
use ndmio::prelude::*;
use ndmpart::{
    DiskScanOptions, TableKind,
    gpt::{self, GPT_SIGNATURE},
    guids::GptPartitionKind,
    mbr::{self, MbrKind},
    scan_disk, validate_full_disk,
};
use tempfile::NamedTempFile;

const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

fn image(size: u64) -> NamedTempFile {
    let img = NamedTempFile::new().unwrap();
    img.as_file().set_len(size).unwrap();
    img
}

fn config(img: &NamedTempFile, create: bool, sector_size: Option<u64>) -> Config {
    Config {
        disk: img.path().to_str().unwrap().to_string(),
        create,
        sector_size,
    }
}

fn poke(img: &NamedTempFile, offset: u64, bytes: &[u8]) {
    let mut f = OpenOptions::new().write(true).open(img.path()).unwrap();
    f.seek(SeekFrom::Start(offset)).unwrap();
    f.write_all(bytes).unwrap();
}

fn head(img: &NamedTempFile, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    File::open(img.path()).unwrap().read_exact(&mut buf).unwrap();
    buf
}

fn report_json(out: &[u8]) -> serde_json::Value {
    serde_json::from_slice(out).unwrap()
}

#[test]
fn dry_run_512_reports_and_writes_nothing() {
    let img = image(GIB);
    let mut out = Vec::new();

    let outcome = run(&config(&img, false, None), &mut out).unwrap();
    assert!(!outcome.committed);

    let v = report_json(&out);
    assert_eq!(v["device"]["size"], "1073741824");
    assert_eq!(v["device"]["logical_block_size"], "512");
    assert_eq!(v["device"]["partition_table"], "gpt");
    let p = &v["table"]["partitions"][0];
    assert_eq!(p["name"], "OpenEBS_NDM");
    assert_eq!(p["type"], "0FC63DAF-8483-4772-8E79-3D69D8477DE4");
    assert_eq!(p["start"], "2048");
    assert_eq!(p["end"], "2097118");
    assert_eq!(p["number"], "1");

    assert!(head(&img, 64 * 1024).iter().all(|&b| b == 0));
}

#[test]
fn dry_run_4096_via_sector_size() {
    let img = image(GIB);
    let mut out = Vec::new();

    run(&config(&img, false, Some(4096)), &mut out).unwrap();

    let v = report_json(&out);
    assert_eq!(v["table"]["logical_sector_size"], "4096");
    assert_eq!(v["table"]["partitions"][0]["start"], "256");
    assert_eq!(v["table"]["partitions"][0]["end"], "262138");
}

#[test]
fn create_writes_verified_gpt() {
    let img = image(64 * MIB);
    let mut out = Vec::new();

    let outcome = run(&config(&img, true, None), &mut out).unwrap();
    assert!(outcome.committed);
    assert!(!out.is_empty());

    let file = OpenOptions::new().read(true).write(true).open(img.path()).unwrap();
    let mut io = StdBlockIO::new(file);
    validate_full_disk(&mut io, 512).unwrap();

    let info = scan_disk(&mut io, DiskScanOptions::new()).unwrap();
    assert_eq!(info.mbr_kind, MbrKind::Protective);
    assert_eq!(info.partitions.len(), 1);

    let p = &info.partitions[0];
    let total = 64 * MIB / 512;
    assert_eq!(p.name, "OpenEBS_NDM");
    assert_eq!(p.kind, GptPartitionKind::LINUX_FS);
    assert_eq!((p.start_lba, p.end_lba), (2048, total - 34));
    assert_eq!(p.attrs, 0);

    let header = info.gpt_header.unwrap();
    assert_eq!(header.last_usable_lba, p.end_lba);
    assert_eq!(header.backup_lba, total - 1);
    assert!(io.matches_at((total - 1) * 512, GPT_SIGNATURE).unwrap());

    let mbr = mbr::read_mbr(&mut io).unwrap();
    mbr.validate_protective(total).unwrap();
}

#[test]
fn create_with_4096_sectors() {
    let img = image(64 * MIB);
    let mut out = Vec::new();

    run(&config(&img, true, Some(4096)), &mut out).unwrap();

    let mut io = StdBlockIO::new(File::options().read(true).write(true).open(img.path()).unwrap());
    let (header, entries) = gpt::read_gpt_with_sector(&mut io, 4096).unwrap();
    let total = 64 * MIB / 4096;
    assert_eq!(entries.len(), 1);
    assert_eq!((entries[0].start_lba, entries[0].end_lba), (256, total - 6));
    assert_eq!(header.first_usable_lba, 6);
    validate_full_disk(&mut io, 4096).unwrap();
}

#[test]
fn second_run_sees_existing_table() {
    let img = image(64 * MIB);
    run(&config(&img, true, None), &mut Vec::new()).unwrap();

    let mut out = Vec::new();
    let err = run(&config(&img, true, None), &mut out).unwrap_err();
    assert!(
        matches!(err, NdmError::AlreadyPartitioned { kind: TableKind::Gpt, .. }),
        "{err}"
    );
    assert!(out.is_empty());
}

#[test]
fn legacy_mbr_is_a_table() {
    let img = image(64 * MIB);
    let entry = mbr::MbrEntry::new(0x00, [0, 0x21, 0], 0x83, [0xFE, 0xFF, 0xFF], 2048, 4096);
    let mut entries = [mbr::MbrEntry::new_empty(); 4];
    entries[0] = entry;
    {
        let file = OpenOptions::new().write(true).read(true).open(img.path()).unwrap();
        let mut io = StdBlockIO::new(file);
        mbr::write_mbr(&mut io, &mbr::Mbr::new_from_entries(entries)).unwrap();
    }

    let err = run(&config(&img, true, None), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, NdmError::AlreadyPartitioned { kind: TableKind::Mbr, .. }));
}

#[test]
fn empty_dos_label_is_kept() {
    let img = image(64 * MIB);
    poke(&img, 440, &0xDEAD_BEEFu32.to_le_bytes());
    poke(&img, 510, &[0x55, 0xAA]);

    let mut out = Vec::new();
    let err = run(&config(&img, true, None), &mut out).unwrap_err();
    assert!(
        matches!(err, NdmError::AlreadyPartitioned { kind: TableKind::Mbr, .. }),
        "{err}"
    );
    assert!(out.is_empty());

    // LBA 1 still blank, no GPT was written over the label
    assert!(head(&img, 1024)[512..].iter().all(|&b| b == 0));
}

#[test]
fn fat32_superfloppy_is_a_filesystem() {
    let img = image(64 * MIB);
    poke(&img, 3, b"mkfs.fat");
    poke(&img, 82, b"FAT32   ");
    poke(&img, 510, &[0x55, 0xAA]);

    let err = run(&config(&img, true, None), &mut Vec::new()).unwrap_err();
    match err {
        NdmError::FilesystemPresent { found, .. } => assert_eq!(found, vec![FsSignature::Fat]),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn backup_gpt_alone_is_a_table() {
    let size = 64 * MIB;
    let img = image(size);
    poke(&img, size - 512, GPT_SIGNATURE);

    let err = run(&config(&img, false, None), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, NdmError::AlreadyPartitioned { kind: TableKind::Gpt, .. }));
}

#[test]
fn ext4_superblock_is_refused() {
    let img = image(64 * MIB);
    poke(&img, 1080, &[0x53, 0xEF]);
    poke(&img, 1024 + 0x60, &0x0040u32.to_le_bytes());

    let mut out = Vec::new();
    let err = run(&config(&img, true, None), &mut out).unwrap_err();
    match err {
        NdmError::FilesystemPresent { found, .. } => assert_eq!(found, vec![FsSignature::Ext4]),
        other => panic!("unexpected {other}"),
    }
    assert!(out.is_empty());

    // nothing written: LBA 1 is still blank
    assert!(head(&img, 1024)[512..].iter().all(|&b| b == 0));
}

#[test]
fn tiny_image_has_no_layout() {
    let img = image(MIB);
    let mut out = Vec::new();

    let err = run(&config(&img, true, None), &mut out).unwrap_err();
    assert!(matches!(err, NdmError::InvalidLayout { .. }), "{err}");
    assert!(out.is_empty());
    assert!(head(&img, 4096).iter().all(|&b| b == 0));
}

#[test]
fn missing_disk_is_device_open() {
    let err = run(&Config::default(), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, NdmError::DeviceOpen { .. }));

    let err = run(
        &Config {
            disk: "/nonexistent/ndmgpt-test.img".into(),
            ..Default::default()
        },
        &mut Vec::new(),
    )
    .unwrap_err();
    assert!(matches!(err, NdmError::DeviceOpen { .. }));
}
