/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Compression of an uncompressed container into a BARCH file
//!
//! The transform keeps the original header region byte-identical (only
//! the fields that change meaning are patched afterwards) and replaces
//! the raw pixel rows with two sections: a bit-per-row emptiness index
//! and a variable-length packed stream. Per aligned 4-pixel group of a
//! non-empty row the stream carries
//!
//! | group value  | bits emitted    |
//! |--------------|-----------------|
//! | four white   | `0`             |
//! | four black   | `1 0`           |
//! | anything else| `1 1` + 32 bits of the group, LSB first |
//!
//! Entirely white rows contribute no bits at all.

use std::io::Write;
use std::path::Path;

use log::trace;

use crate::bitset::BitBuf;
use crate::common::{row_stride, BARCH_SIGNATURE, BLACK_GROUP, WHITE_GROUP};
use crate::container::Container;
use crate::errors::BarchErrors;
use crate::output::{copy_through, OutputFile};
use crate::progress::ProgressNotifier;
use crate::row_index::{white_row_pattern, RowIndex};

/// Compress the container at `source` into a BARCH file at `dest`
///
/// A BARCH source is copied through byte-identically. On any failure the
/// partially written destination is deleted; the caller observes either a
/// complete output file or none.
///
/// # Usage
/// ```no_run
/// fn main() -> Result<(), barch::BarchErrors> {
///     barch::compress("page.bmp", "page.barch", None)
/// }
/// ```
pub fn compress<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P, dest: Q, progress: Option<&mut dyn ProgressNotifier>,
) -> Result<(), BarchErrors> {
    let container = Container::open_detect(source)?;

    if container.is_compressed() {
        return copy_through(&container, dest.as_ref());
    }
    encode(&container, dest.as_ref(), progress)
}

fn encode(
    source: &Container, dest: &Path, mut progress: Option<&mut dyn ProgressNotifier>,
) -> Result<(), BarchErrors> {
    let mut out = OutputFile::create(dest)?;

    let header = *source.header();
    let info = *source.info_header();
    let width = source.width();
    let height = source.height();
    let stride = row_stride(width);
    let pixels = source.pixel_data();
    let pattern = white_row_pattern(width);

    // Phase one: mark every row whose bytes equal the white pattern
    // (padding included) in the row index.
    if let Some(sink) = progress.as_deref_mut() {
        sink.init(0, height);
    }

    let mut index = RowIndex::new(height);
    for row in 0..height {
        let row_bytes = &pixels[row * stride..(row + 1) * stride];
        if row_bytes == pattern.as_slice() {
            index
                .set(row, true)
                .ok_or_else(|| row_out_of_range(row, height))?;
        }
        if let Some(sink) = progress.as_deref_mut() {
            sink.notify(row);
        }
    }

    // Phase two: pack the non-empty rows, group by group.
    if let Some(sink) = progress.as_deref_mut() {
        sink.init(0, height * 2);
    }

    let mut stream = BitBuf::with_bit_capacity(pixels.len() * 9);
    for row in 0..height {
        let empty = index
            .test(row)
            .ok_or_else(|| row_out_of_range(row, height))?;
        if !empty {
            for group in pixels[row * stride..(row + 1) * stride].chunks_exact(4) {
                let value = u32::from_le_bytes([group[0], group[1], group[2], group[3]]);
                match value {
                    WHITE_GROUP => stream.push_bit(false),
                    BLACK_GROUP => {
                        stream.push_bit(true);
                        stream.push_bit(false);
                    }
                    _ => {
                        stream.push_bit(true);
                        stream.push_bit(true);
                        for bit in 0..32 {
                            stream.push_bit(value & (1 << bit) != 0);
                        }
                    }
                }
            }
        }
        if let Some(sink) = progress.as_deref_mut() {
            sink.notify(height + row);
        }
    }

    // The row index slots into the location previously occupied by the
    // pixel data; the packed stream follows it. A BARCH image size may
    // not be zero, so an all-empty stream still occupies one zero byte.
    let stream_bytes = stream.as_bytes();
    let image_size = stream_bytes.len().max(1) as u32;

    let mut out_header = header;
    out_header.signature = BARCH_SIGNATURE;
    out_header.index_offset = header.data_offset;
    out_header.data_offset = out_header.index_offset + index.byte_len() as u32;
    out_header.file_size = out_header.data_offset + image_size;

    let mut out_info = info;
    out_info.image_size = image_size;

    source.copy_prefix_to(&mut out, header.data_offset as usize)?;
    out.write_all(index.as_bytes())?;
    out.write_all(stream_bytes)?;
    if stream_bytes.is_empty() {
        out.write_all(&[0])?;
    }

    if out.position()? != u64::from(out_header.file_size) {
        return Err(BarchErrors::IoFailure(String::from(
            "short write while emitting compressed sections",
        )));
    }

    out.rewind()?;
    out.write_all(&out_header.to_bytes())?;
    out.write_all(&out_info.to_bytes())?;

    trace!(
        "Compressed {} bytes into {} bytes",
        source.file_size(),
        out_header.file_size
    );

    out.commit()
}

pub(crate) fn row_out_of_range(row: usize, height: usize) -> BarchErrors {
    BarchErrors::InvalidPixelData(format!("row {row} out of range for height {height}"))
}
