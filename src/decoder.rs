/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decompression of a BARCH file back into an uncompressed container
//!
//! The inverse of [`compress`](crate::compress): empty rows are restored
//! by splatting the white pattern, every other row is rebuilt four pixels
//! at a time from the variable-length stream. Decoding consumes exactly
//! the bits the encoder emitted; running out of stream mid-row means the
//! file is truncated or corrupt and the output is rolled back.

use std::io::Write;
use std::path::Path;

use log::trace;

use crate::bitset::BitView;
use crate::common::{row_stride, BLACK_GROUP, BMP_SIGNATURE, WHITE_GROUP};
use crate::container::Container;
use crate::encoder::row_out_of_range;
use crate::errors::BarchErrors;
use crate::output::{copy_through, OutputFile};
use crate::progress::ProgressNotifier;
use crate::row_index::white_row_pattern;

/// Decompress the container at `source` into a BMP file at `dest`
///
/// A BMP source is copied through byte-identically. On any failure the
/// partially written destination is deleted; the caller observes either a
/// complete output file or none.
///
/// # Usage
/// ```no_run
/// fn main() -> Result<(), barch::BarchErrors> {
///     barch::decompress("page.barch", "page.bmp", None)
/// }
/// ```
pub fn decompress<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P, dest: Q, progress: Option<&mut dyn ProgressNotifier>,
) -> Result<(), BarchErrors> {
    let container = Container::open_detect(source)?;

    if !container.is_compressed() {
        return copy_through(&container, dest.as_ref());
    }
    decode(&container, dest.as_ref(), progress)
}

fn decode(
    source: &Container, dest: &Path, mut progress: Option<&mut dyn ProgressNotifier>,
) -> Result<(), BarchErrors> {
    let mut out = OutputFile::create(dest)?;

    let header = *source.header();
    let info = *source.info_header();
    let width = source.width();
    let height = source.height();
    let stride = row_stride(width);
    let pattern = white_row_pattern(width);

    let index = source
        .row_index()
        .ok_or_else(|| BarchErrors::InvalidPixelData(String::from("missing row index region")))?;
    let stream = BitView::from_bytes(source.pixel_data());

    let mut pixels = vec![0_u8; height * stride];
    let mut bit_pos = 0_usize;

    if let Some(sink) = progress.as_deref_mut() {
        sink.init(0, height);
    }

    for row in 0..height {
        let row_bytes = &mut pixels[row * stride..(row + 1) * stride];
        let empty = index
            .test(row)
            .ok_or_else(|| row_out_of_range(row, height))?;

        if empty {
            row_bytes.copy_from_slice(&pattern);
        } else {
            for group_bytes in row_bytes.chunks_exact_mut(4) {
                let value = decode_group(&stream, &mut bit_pos)?;
                group_bytes.copy_from_slice(&value.to_le_bytes());
            }
        }

        if let Some(sink) = progress.as_deref_mut() {
            sink.notify(row);
        }
    }

    let image_size = pixels.len() as u32;

    // The pixel data returns to the location the row index occupied and
    // the reserved word goes back to zero.
    let mut out_header = header;
    out_header.signature = BMP_SIGNATURE;
    out_header.data_offset = header.index_offset;
    out_header.index_offset = 0;
    out_header.file_size = out_header.data_offset + image_size;

    let mut out_info = info;
    out_info.image_size = image_size;

    source.copy_prefix_to(&mut out, out_header.data_offset as usize)?;
    out.write_all(&pixels)?;

    if out.position()? != u64::from(out_header.file_size) {
        return Err(BarchErrors::IoFailure(String::from(
            "short write while emitting pixel data",
        )));
    }

    out.rewind()?;
    out.write_all(&out_header.to_bytes())?;
    out.write_all(&out_info.to_bytes())?;

    trace!(
        "Decompressed {} bytes into {} bytes",
        source.file_size(),
        out_header.file_size
    );

    out.commit()
}

/// Read one group code from the stream: `0` is four white pixels, `10`
/// four black ones, `11` prefixes 32 literal bits, LSB first
fn decode_group(stream: &BitView, bit_pos: &mut usize) -> Result<u32, BarchErrors> {
    if !next_bit(stream, bit_pos)? {
        return Ok(WHITE_GROUP);
    }
    if !next_bit(stream, bit_pos)? {
        return Ok(BLACK_GROUP);
    }

    let mut value = 0_u32;
    for bit in 0..32 {
        if next_bit(stream, bit_pos)? {
            value |= 1 << bit;
        }
    }
    Ok(value)
}

fn next_bit(stream: &BitView, bit_pos: &mut usize) -> Result<bool, BarchErrors> {
    let bit = stream.test(*bit_pos).ok_or_else(|| {
        BarchErrors::InvalidPixelData(String::from("compressed pixel stream exhausted"))
    })?;
    *bit_pos += 1;
    Ok(bit)
}
