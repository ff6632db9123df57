/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Opening and validating BMP/BARCH containers
//!
//! A [`Container`] is a validated, resident image of a source file. The
//! preferred backing is a read-only memory mapping; when mapping fails or
//! is disabled through [`ContainerOptions`] the whole file is read into a
//! buffer instead. Either way, all views handed out borrow from the
//! container and the backing is released when it drops.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{trace, warn};
use memmap2::Mmap;

use crate::common::{
    row_index_len, row_stride, u16_le, u32_le, ContainerKind, FixedHeader, InfoHeader,
    FIXED_HEADER_SIZE, HEADERS_SIZE, INFO_HEADER_SIZE,
};
use crate::errors::BarchErrors;
use crate::row_index::RowIndex;

/// Options honoured while opening a container
///
/// The dimension caps bound how much memory a hostile header can make the
/// codec allocate; files declaring larger images are rejected during
/// validation.
#[derive(Copy, Clone, Debug)]
pub struct ContainerOptions {
    max_width: usize,
    max_height: usize,
    use_mmap: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions {
            max_width: 1 << 14,
            max_height: 1 << 14,
            use_mmap: true,
        }
    }
}

impl ContainerOptions {
    pub fn new() -> ContainerOptions {
        ContainerOptions::default()
    }

    pub const fn max_width(&self) -> usize {
        self.max_width
    }

    pub const fn max_height(&self) -> usize {
        self.max_height
    }

    pub const fn use_mmap(&self) -> bool {
        self.use_mmap
    }

    /// Maximum accepted image width in pixels
    pub fn set_max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    /// Maximum accepted image height in pixels
    pub fn set_max_height(mut self, height: usize) -> Self {
        self.max_height = height;
        self
    }

    /// Whether to memory map the source; when `false` (or when mapping
    /// fails) the file is read into memory instead
    pub fn set_use_mmap(mut self, yes: bool) -> Self {
        self.use_mmap = yes;
        self
    }
}

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Buffered(buf) => buf,
        }
    }
}

/// A validated, read-only view of a BMP or BARCH file
///
/// The container owns the file backing for its lifetime; header structs
/// are parsed once at open time and every byte-level view
/// ([`pixel_data`](Self::pixel_data), [`row_index`](Self::row_index))
/// borrows from the backing.
///
/// # Usage
/// ```no_run
/// use barch::{Container, ContainerKind};
///
/// fn main() -> Result<(), barch::BarchErrors> {
///     let container = Container::open("scan.bmp", ContainerKind::Bmp)?;
///     let info = container.info_header();
///     println!("{} x {} pixels", info.width, info.height);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Container {
    path: PathBuf,
    backing: Backing,
    header: FixedHeader,
    info: InfoHeader,
    kind: ContainerKind,
}

/// A typed view of the raw pixels of an uncompressed container
///
/// `pixels[y * (width + padding) + x]` is the color of pixel `(x, y)`.
#[derive(Copy, Clone, Debug)]
pub struct RawImage<'a> {
    pub width: usize,
    pub height: usize,
    pub padding: usize,
    pub pixels: &'a [u8],
}

impl Container {
    /// Open `path`, expecting a container of kind `expected`
    ///
    /// A structurally valid container of the other kind is rejected with
    /// [`WrongContainerKind`](BarchErrors::WrongContainerKind), anything
    /// else that fails validation with the matching header/pixel error.
    pub fn open<P: AsRef<Path>>(
        path: P, expected: ContainerKind,
    ) -> Result<Container, BarchErrors> {
        Self::open_impl(path.as_ref(), Some(expected), ContainerOptions::default())
    }

    /// [`open`](Self::open) with explicit options
    pub fn open_with_options<P: AsRef<Path>>(
        path: P, expected: ContainerKind, options: ContainerOptions,
    ) -> Result<Container, BarchErrors> {
        Self::open_impl(path.as_ref(), Some(expected), options)
    }

    /// Open `path` accepting either container kind
    ///
    /// The codec entry points use this so that already-converted inputs
    /// can be passed through unchanged.
    pub fn open_detect<P: AsRef<Path>>(path: P) -> Result<Container, BarchErrors> {
        Self::open_impl(path.as_ref(), None, ContainerOptions::default())
    }

    /// [`open_detect`](Self::open_detect) with explicit options
    pub fn open_detect_with_options<P: AsRef<Path>>(
        path: P, options: ContainerOptions,
    ) -> Result<Container, BarchErrors> {
        Self::open_impl(path.as_ref(), None, options)
    }

    fn open_impl(
        path: &Path, expected: Option<ContainerKind>, options: ContainerOptions,
    ) -> Result<Container, BarchErrors> {
        let file = File::open(path)
            .map_err(|err| BarchErrors::FileNotFound(format!("{}: {err}", path.display())))?;

        let metadata = file
            .metadata()
            .map_err(|err| BarchErrors::FileOpenFailed(format!("{}: {err}", path.display())))?;

        if metadata.len() < HEADERS_SIZE as u64 {
            return Err(BarchErrors::InvalidBmpHeader(format!(
                "file too small for headers: {} bytes",
                metadata.len()
            )));
        }

        let backing = Self::acquire_backing(&file, path, options.use_mmap())?;
        let bytes = backing.bytes();
        let actual_size = bytes.len();

        // Fixed header, validated in declaration order; the first failed
        // check wins.
        let header = FixedHeader::parse(bytes);

        let kind = ContainerKind::from_signature(header.signature).ok_or_else(|| {
            BarchErrors::InvalidBmpHeader(format!(
                "unexpected signature: {:#06x}",
                header.signature
            ))
        })?;

        if let Some(expected) = expected {
            if expected != kind {
                return Err(BarchErrors::WrongContainerKind {
                    expected,
                    found: kind,
                });
            }
        }

        if header.file_size as usize != actual_size {
            return Err(BarchErrors::InvalidBmpHeader(format!(
                "file size mismatch: actual[{actual_size}] != expected[{}]",
                header.file_size
            )));
        }

        if (header.data_offset as usize) < HEADERS_SIZE {
            return Err(BarchErrors::InvalidBmpHeader(format!(
                "invalid data offset: {}",
                header.data_offset
            )));
        }

        if kind == ContainerKind::Barch {
            if header.index_offset == 0 {
                return Err(BarchErrors::InvalidBmpHeader(String::from(
                    "invalid index offset: 0",
                )));
            }
            if header.data_offset <= header.index_offset {
                return Err(BarchErrors::InvalidBmpHeader(format!(
                    "invalid data offset: {} does not follow row index at {}",
                    header.data_offset, header.index_offset
                )));
            }
        }

        let info = InfoHeader::parse(&bytes[FIXED_HEADER_SIZE..]);

        trace!("Info header size: {}", info.size);
        trace!("Width: {}", info.width);
        trace!("Height: {}", info.height);
        trace!("Bits per pixel: {}", info.bits_per_pixel);
        trace!("Image size: {}", info.image_size);

        if (info.size as usize) < INFO_HEADER_SIZE {
            return Err(BarchErrors::InvalidInfoHeader(format!(
                "incorrect info header size: {}",
                info.size
            )));
        }

        if info.bits_per_pixel != 8 {
            return Err(BarchErrors::InvalidInfoHeader(format!(
                "only 8-bit images are supported, found {} bits per pixel",
                info.bits_per_pixel
            )));
        }

        if info.width as usize > options.max_width() {
            return Err(BarchErrors::InvalidInfoHeader(format!(
                "width {} exceeds configured maximum {}",
                info.width,
                options.max_width()
            )));
        }

        if info.height as usize > options.max_height() {
            return Err(BarchErrors::InvalidInfoHeader(format!(
                "height {} exceeds configured maximum {}",
                info.height,
                options.max_height()
            )));
        }

        // The color table sits between the info header and the pixel
        // data; declared offsets may not land inside it.
        let color_table_end =
            FIXED_HEADER_SIZE as u64 + u64::from(info.size) + u64::from(info.colors_used) * 4;

        if u64::from(header.data_offset) < color_table_end {
            return Err(BarchErrors::InvalidInfoHeader(format!(
                "data offset {} overlaps color table ending at {color_table_end}",
                header.data_offset
            )));
        }

        if kind == ContainerKind::Barch && u64::from(header.index_offset) < color_table_end {
            return Err(BarchErrors::InvalidInfoHeader(format!(
                "index offset {} overlaps color table ending at {color_table_end}",
                header.index_offset
            )));
        }

        let stride = row_stride(info.width as usize) as u64;
        let raw_size = u64::from(info.height) * stride;

        match kind {
            ContainerKind::Barch => {
                if info.image_size == 0 {
                    return Err(BarchErrors::InvalidInfoHeader(String::from(
                        "unexpected image size: 0",
                    )));
                }
            }
            ContainerKind::Bmp => {
                if info.image_size != 0 && u64::from(info.image_size) != raw_size {
                    return Err(BarchErrors::InvalidInfoHeader(format!(
                        "unexpected image size: {} for {} rows of {stride} bytes",
                        info.image_size, info.height
                    )));
                }
            }
        }

        // Region fit: everything the views below hand out must lie
        // inside the file.
        let pixel_len = match kind {
            ContainerKind::Barch => u64::from(info.image_size),
            ContainerKind::Bmp => {
                if info.image_size != 0 {
                    u64::from(info.image_size)
                } else {
                    raw_size
                }
            }
        };

        if u64::from(header.data_offset) + pixel_len > actual_size as u64 {
            return Err(BarchErrors::InvalidPixelData(format!(
                "pixel data region of {pixel_len} bytes at offset {} extends past end of file",
                header.data_offset
            )));
        }

        if kind == ContainerKind::Barch {
            let index_end =
                u64::from(header.index_offset) + row_index_len(info.height as usize) as u64;
            if index_end > u64::from(header.data_offset) {
                return Err(BarchErrors::InvalidPixelData(format!(
                    "row index region ending at {index_end} overlaps pixel data at {}",
                    header.data_offset
                )));
            }
        }

        Ok(Container {
            path: path.to_path_buf(),
            backing,
            header,
            info,
            kind,
        })
    }

    fn acquire_backing(file: &File, path: &Path, use_mmap: bool) -> Result<Backing, BarchErrors> {
        if use_mmap {
            // SAFETY: the mapping is private and read-only, and the
            // container keeps it alive for as long as any view borrows
            // from it. Truncation of the underlying file by another
            // process while mapped is outside this crate's contract.
            match unsafe { Mmap::map(file) } {
                Ok(map) => return Ok(Backing::Mapped(map)),
                Err(err) => {
                    warn!(
                        "memory mapping {} failed ({err}), falling back to buffered read",
                        path.display()
                    );
                }
            }
        }

        let mut buf = Vec::new();
        let mut reader = file;
        reader
            .read_to_end(&mut buf)
            .map_err(|err| BarchErrors::FileOpenFailed(format!("{}: {err}", path.display())))?;
        Ok(Backing::Buffered(buf))
    }

    /// The path this container was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Actual on-disk size in bytes; always equal to the header's
    /// `file_size` field once validation passed
    pub fn file_size(&self) -> usize {
        self.backing.bytes().len()
    }

    pub fn header(&self) -> &FixedHeader {
        &self.header
    }

    pub fn info_header(&self) -> &InfoHeader {
        &self.info
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn is_compressed(&self) -> bool {
        self.kind == ContainerKind::Barch
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.info.width as usize
    }

    /// Image height in rows
    pub fn height(&self) -> usize {
        self.info.height as usize
    }

    /// The pixel-data region: raw rows for BMP, the packed bit stream for
    /// BARCH
    pub fn pixel_data(&self) -> &[u8] {
        let start = self.header.data_offset as usize;
        let len = if self.info.image_size != 0 {
            self.info.image_size as usize
        } else {
            self.height() * row_stride(self.width())
        };
        &self.backing.bytes()[start..start + len]
    }

    /// The row-emptiness bitmap projected onto the mapped file; `None`
    /// for uncompressed containers
    pub fn row_index(&self) -> Option<RowIndex<'_>> {
        if !self.is_compressed() {
            return None;
        }
        let start = self.header.index_offset as usize;
        let len = row_index_len(self.height());
        RowIndex::from_slice(&self.backing.bytes()[start..start + len], self.height())
    }

    /// The raw pixels of an uncompressed container; `None` for BARCH
    pub fn raw_image(&self) -> Option<RawImage<'_>> {
        if self.is_compressed() {
            return None;
        }
        Some(RawImage {
            width: self.width(),
            height: self.height(),
            padding: row_stride(self.width()) - self.width(),
            pixels: self.pixel_data(),
        })
    }

    /// Write the first `n_bytes` bytes of the source verbatim into `dest`
    ///
    /// The codec uses this to splice the original header region (fixed
    /// header, info header and any color table) into the output before
    /// patching the recomputed headers over it.
    pub fn copy_prefix_to<W: Write>(&self, dest: &mut W, n_bytes: usize) -> Result<(), BarchErrors> {
        let bytes = self.backing.bytes();
        if n_bytes > bytes.len() {
            return Err(BarchErrors::IoFailure(format!(
                "prefix of {n_bytes} bytes exceeds source size {}",
                bytes.len()
            )));
        }
        dest.write_all(&bytes[..n_bytes])?;
        Ok(())
    }
}

/// Probe some bytes to see if they begin a plausible BMP image
pub fn probe_bmp(bytes: &[u8]) -> bool {
    probe_kind(bytes) == Some(ContainerKind::Bmp)
}

/// Probe some bytes to see if they begin a plausible BARCH image
pub fn probe_barch(bytes: &[u8]) -> bool {
    probe_kind(bytes) == Some(ContainerKind::Barch)
}

fn probe_kind(bytes: &[u8]) -> Option<ContainerKind> {
    let signature = bytes.get(0..2).map(|sig| u16_le(sig, 0))?;
    let kind = ContainerKind::from_signature(signature)?;

    let info_size = bytes
        .get(FIXED_HEADER_SIZE..FIXED_HEADER_SIZE + 4)
        .map(|sz| u32_le(sz, 0))?;

    (info_size as usize >= INFO_HEADER_SIZE).then_some(kind)
}

#[cfg(test)]
mod tests {
    use super::{probe_barch, probe_bmp};

    #[test]
    fn probe_checks_signature_and_info_size() {
        let mut bytes = [0_u8; 18];
        bytes[0] = b'B';
        bytes[1] = b'M';
        bytes[14] = 40;
        assert!(probe_bmp(&bytes));
        assert!(!probe_barch(&bytes));

        bytes[1] = b'A';
        assert!(probe_barch(&bytes));
        assert!(!probe_bmp(&bytes));

        // declared info header too small
        bytes[14] = 12;
        assert!(!probe_barch(&bytes));

        assert!(!probe_bmp(b"BM"));
        assert!(!probe_bmp(b""));
    }
}
