/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Rejection of malformed containers, one case per validation step, plus
//! the failure-atomicity guarantee of the codec entry points.

use std::fs;

use barch::{
    compress, decompress, BarchErrors, Container, ContainerKind, ContainerOptions,
};

mod common;

use common::{barch_bytes, bmp_bytes, patch_u16, patch_u32, write_file};

fn detail_of(err: &BarchErrors) -> String {
    format!("{err:?}")
}

/// Step 1: anything shorter than both headers is rejected outright
#[test]
fn rejects_file_too_small_for_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "tiny.bmp", &[b'X', b'X', 0x00, 0x00]);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidBmpHeader(_)));
}

/// Step 2: unknown signature
#[test]
fn rejects_unexpected_signature() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    bytes[0] = b'X';
    bytes[1] = b'Y';
    let path = write_file(dir.path(), "bad.bmp", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidBmpHeader(_)));
    assert!(detail_of(&err).contains("unexpected signature"));
}

/// Step 3: a structurally valid container of the wrong kind is its own
/// error, distinguishable from corruption
#[test]
fn rejects_wrong_container_kind() {
    let dir = tempfile::tempdir().unwrap();
    let bmp = write_file(dir.path(), "in.bmp", &bmp_bytes(4, 1, &[0x00; 4]));

    let err = Container::open(&bmp, ContainerKind::Barch).unwrap_err();
    assert!(matches!(
        err,
        BarchErrors::WrongContainerKind {
            expected: ContainerKind::Barch,
            found: ContainerKind::Bmp
        }
    ));

    let packed = dir.path().join("in.barch");
    compress(&bmp, &packed, None).unwrap();
    let err = Container::open(&packed, ContainerKind::Bmp).unwrap_err();
    assert!(matches!(err, BarchErrors::WrongContainerKind { .. }));
}

/// Step 4: the header's file size must match the bytes on disk
#[test]
fn rejects_file_size_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    patch_u32(&mut bytes, 2, 1000);
    let path = write_file(dir.path(), "bad.bmp", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidBmpHeader(_)));
    assert!(detail_of(&err).contains("size mismatch"));
}

/// Step 5: pixel data may not start inside the headers
#[test]
fn rejects_data_offset_inside_headers() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    patch_u32(&mut bytes, 10, 10);
    let path = write_file(dir.path(), "bad.bmp", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidBmpHeader(_)));
    assert!(detail_of(&err).contains("data offset"));
}

/// Step 6: BARCH needs a nonzero index offset strictly below the data
/// offset
#[test]
fn rejects_barch_with_bad_offsets() {
    let dir = tempfile::tempdir().unwrap();

    let mut zero_index = barch_bytes(4, 1, &[0x00], &[0x01]);
    patch_u32(&mut zero_index, 6, 0);
    let path = write_file(dir.path(), "zero.barch", &zero_index);
    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidBmpHeader(_)));
    assert!(detail_of(&err).contains("index offset"));

    let mut inverted = barch_bytes(4, 1, &[0x00], &[0x01]);
    patch_u32(&mut inverted, 10, 54); // data offset == index offset
    let path = write_file(dir.path(), "inverted.barch", &inverted);
    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidBmpHeader(_)));
}

/// Step 7: declared info header sizes below the classic 40 bytes
#[test]
fn rejects_undersized_info_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    patch_u32(&mut bytes, 14, 12);
    let path = write_file(dir.path(), "bad.bmp", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));
}

/// Step 8: only 8 bits per pixel are supported
#[test]
fn rejects_non_8bit_depth() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    patch_u16(&mut bytes, 28, 12);
    let path = write_file(dir.path(), "bad.bmp", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));
    assert!(detail_of(&err).contains("8-bit"));
}

/// Step 9: the declared color table must fit below the data (and index)
/// offsets
#[test]
fn rejects_offsets_overlapping_color_table() {
    let dir = tempfile::tempdir().unwrap();

    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    patch_u32(&mut bytes, 46, 100); // colors used
    let path = write_file(dir.path(), "bad.bmp", &bytes);
    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));

    let mut packed = barch_bytes(4, 1, &[0x00], &[0x01]);
    patch_u32(&mut packed, 46, 100);
    let path = write_file(dir.path(), "bad.barch", &packed);
    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));
}

/// Step 10: image size must be zero or exact for BMP, nonzero for BARCH
#[test]
fn rejects_inconsistent_image_size() {
    let dir = tempfile::tempdir().unwrap();

    let mut bmp = bmp_bytes(4, 2, &[0x00; 8]);
    patch_u32(&mut bmp, 34, 7); // neither 0 nor height * stride
    let path = write_file(dir.path(), "bad.bmp", &bmp);
    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));
    assert!(detail_of(&err).contains("image size"));

    let packed = barch_bytes(4, 1, &[0x00], &[]);
    let path = write_file(dir.path(), "empty.barch", &packed);
    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));
}

/// A BMP whose image size is zero is valid; the raw size is derived from
/// the geometry instead
#[test]
fn accepts_zero_image_size_for_bmp() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = common::bmp_bytes_with_image_size(4, 2, &[0x42; 8], 0);
    let path = write_file(dir.path(), "ok.bmp", &bytes);

    let container = Container::open(&path, ContainerKind::Bmp).unwrap();
    assert_eq!(container.pixel_data(), &[0x42; 8]);
}

/// The declared pixel region must lie inside the file
#[test]
fn rejects_truncated_pixel_region() {
    let dir = tempfile::tempdir().unwrap();

    // headers promise 2 rows of 4 bytes but only one row is present
    let bytes = common::bmp_bytes_with_image_size(4, 2, &[0x00; 4], 0);
    let path = write_file(dir.path(), "short.bmp", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidPixelData(_)));
}

/// The row index must fit between its offset and the pixel data
#[test]
fn rejects_row_index_overlapping_stream() {
    let dir = tempfile::tempdir().unwrap();

    // nine rows need two index bytes but only one is reserved
    let bytes = barch_bytes(4, 9, &[0x00], &[0x55, 0x55, 0x55]);
    let path = write_file(dir.path(), "overlap.barch", &bytes);

    let err = Container::open_detect(&path).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidPixelData(_)));
}

#[test]
fn rejects_dimensions_over_configured_caps() {
    let dir = tempfile::tempdir().unwrap();
    let pixels = vec![0x00_u8; 8 * 2];
    let path = write_file(dir.path(), "wide.bmp", &bmp_bytes(8, 2, &pixels));

    let options = ContainerOptions::new().set_max_width(4);
    let err = Container::open_with_options(&path, ContainerKind::Bmp, options).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));

    let options = ContainerOptions::new().set_max_height(1);
    let err = Container::open_with_options(&path, ContainerKind::Bmp, options).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidInfoHeader(_)));
}

#[test]
fn missing_source_reports_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.bmp");

    let err = Container::open_detect(&missing).unwrap_err();
    assert!(matches!(err, BarchErrors::FileNotFound(_)));

    let dst = dir.path().join("out.barch");
    let err = compress(&missing, &dst, None).unwrap_err();
    assert!(matches!(err, BarchErrors::FileNotFound(_)));
    assert!(!dst.exists());
}

/// A stream that runs dry mid-row must roll the output back
#[test]
fn truncated_stream_rolls_back_output() {
    let dir = tempfile::tempdir().unwrap();

    // the single row is marked non-empty and the stream opens a literal
    // group, which needs 34 bits; only 8 exist
    let bytes = barch_bytes(4, 1, &[0x00], &[0x03]);
    let src = write_file(dir.path(), "short.barch", &bytes);
    let dst = dir.path().join("out.bmp");

    let err = decompress(&src, &dst, None).unwrap_err();
    assert!(matches!(err, BarchErrors::InvalidPixelData(_)));
    assert!(!dst.exists());
}

#[test]
fn uncreatable_destination_reports_creation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_file(dir.path(), "in.bmp", &bmp_bytes(4, 1, &[0x00; 4]));

    let dst = dir.path().join("no-such-dir").join("out.barch");
    let err = compress(&src, &dst, None).unwrap_err();
    assert!(matches!(err, BarchErrors::FileCreationFailed(_)));
    assert!(!dst.exists());

    // a directory at the destination path is just as uncreatable
    let blocked = dir.path().join("blocked");
    fs::create_dir(&blocked).unwrap();
    let err = compress(&src, &blocked, None).unwrap_err();
    assert!(matches!(err, BarchErrors::FileCreationFailed(_)));
    assert!(blocked.is_dir());
}

/// An invalid source fails before the destination is even created
#[test]
fn invalid_source_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();

    let mut bytes = bmp_bytes(4, 1, &[0x00; 4]);
    patch_u32(&mut bytes, 2, 9999);
    let src = write_file(dir.path(), "bad.bmp", &bytes);
    let dst = dir.path().join("out.barch");

    assert!(compress(&src, &dst, None).is_err());
    assert!(!dst.exists());
}

/// An existing destination is truncated, not appended to
#[test]
fn existing_destination_is_replaced() {
    let dir = tempfile::tempdir().unwrap();

    let src = write_file(dir.path(), "in.bmp", &bmp_bytes(4, 1, &[0x00; 4]));
    let dst = write_file(dir.path(), "out.barch", &[0xAA_u8; 4096]);

    compress(&src, &dst, None).unwrap();
    let out = fs::read(&dst).unwrap();
    assert_eq!(&out[0..2], b"BA");
    assert_eq!(out.len(), 56);
}
