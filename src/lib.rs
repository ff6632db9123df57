/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A lossless codec pair for 8-bit grayscale bitmap images
//!
//! This crate converts between the standard uncompressed raster container
//! (BMP, signature `BM`) and a compressed variant of it (BARCH, signature
//! `BA`). The compression exploits two properties common in scanned
//! documents and e-reader imagery: many rows are pure white, and within
//! the remaining rows most aligned 4-pixel groups are either pure white
//! or pure black. White rows cost a single bit in a row index, white and
//! black groups cost one and two bits respectively, and only mixed groups
//! are stored verbatim.
//!
//! # Features
//! - Whole-file, single-threaded, synchronous conversion in either
//!   direction
//! - Memory-mapped input with a buffered-read fallback
//! - Failure-atomic output: a failed call never leaves a partial file at
//!   the destination path
//! - Optional progress notifications at row granularity
//!
//! # Usage
//! ```no_run
//! use barch::{compress, decompress};
//!
//! fn main() -> Result<(), barch::BarchErrors> {
//!     compress("scan.bmp", "scan.barch", None)?;
//!     decompress("scan.barch", "restored.bmp", None)?;
//!     Ok(())
//! }
//! ```
//!
//! Inputs that are already in the requested format are copied through
//! byte-identically, so both entry points are idempotent.
//!
//! For lower-level access ([`Container`] views, the [`RowIndex`]
//! projection of a compressed file) open the container directly:
//!
//! ```no_run
//! use barch::{Container, ContainerKind};
//!
//! fn main() -> Result<(), barch::BarchErrors> {
//!     let container = Container::open("scan.barch", ContainerKind::Barch)?;
//!     let index = container.row_index().unwrap();
//!     let empty_rows = (0..container.height())
//!         .filter(|row| index.test(*row) == Some(true))
//!         .count();
//!     println!("{empty_rows} empty rows");
//!     Ok(())
//! }
//! ```
//!
//! # Container layout
//!
//! Both kinds share a 14-byte fixed header and a 40-byte-or-larger info
//! header. BARCH reuses the reserved word of the fixed header for the
//! offset of its row index and stores the packed bit stream where the raw
//! rows used to be:
//!
//! ```text
//! offset 0            FixedHeader      (14 bytes)
//! offset 14           InfoHeader       (>= 40 bytes)
//! offset 14 + Size    ColorTable       (ColorsUsed * 4 bytes, may be absent)
//! offset IndexOffset  RowIndex         (ceil(Height / 8) bytes, BARCH only)
//! offset DataOffset   PixelData/Stream (ImageSize bytes)
//! ```
//!
//! Only 8-bit grayscale images are supported; containers with any other
//! bit depth are rejected during validation.

pub use crate::bitset::{BitBuf, BitView};
pub use crate::common::{
    row_padding, row_stride, ContainerKind, FixedHeader, InfoHeader, BARCH_SIGNATURE,
    BMP_SIGNATURE, FIXED_HEADER_SIZE, HEADERS_SIZE, INFO_HEADER_SIZE,
};
pub use crate::container::{probe_barch, probe_bmp, Container, ContainerOptions, RawImage};
pub use crate::decoder::decompress;
pub use crate::encoder::compress;
pub use crate::errors::BarchErrors;
pub use crate::progress::ProgressNotifier;
pub use crate::row_index::{white_row_pattern, RowIndex};

mod bitset;
mod common;
mod container;
mod decoder;
mod encoder;
mod errors;
mod output;
mod progress;
mod row_index;
