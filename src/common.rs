/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Shared container definitions: signatures, header layouts and row geometry

/// `BM`, the signature of an uncompressed container
pub const BMP_SIGNATURE: u16 = 0x4D42;
/// `BA`, the signature of a compressed container
pub const BARCH_SIGNATURE: u16 = 0x4142;

/// Byte length of the fixed header
pub const FIXED_HEADER_SIZE: usize = 14;
/// Byte length of the classic info header; larger sizes are permitted on disk
pub const INFO_HEADER_SIZE: usize = 40;
/// Offset of the first byte past both headers
pub const HEADERS_SIZE: usize = FIXED_HEADER_SIZE + INFO_HEADER_SIZE;

/// Four white pixels, one aligned group
pub(crate) const WHITE_GROUP: u32 = 0xFFFF_FFFF;
/// Four black pixels, one aligned group
pub(crate) const BLACK_GROUP: u32 = 0x0000_0000;
pub(crate) const WHITE_PIXEL: u8 = 0xFF;

/// The two container flavours sharing one header layout
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ContainerKind {
    /// Uncompressed raster container, signature `BM`
    Bmp,
    /// Compressed container, signature `BA`
    Barch,
}

impl ContainerKind {
    pub fn from_signature(signature: u16) -> Option<ContainerKind> {
        match signature {
            BMP_SIGNATURE => Some(ContainerKind::Bmp),
            BARCH_SIGNATURE => Some(ContainerKind::Barch),
            _ => None,
        }
    }

    pub const fn signature(self) -> u16 {
        match self {
            ContainerKind::Bmp => BMP_SIGNATURE,
            ContainerKind::Barch => BARCH_SIGNATURE,
        }
    }
}

/// The fixed 14-byte header shared by both container kinds
///
/// The third word is reserved (zero) in BMP files and carries the offset
/// of the row-index region in BARCH files; its meaning follows the
/// signature.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FixedHeader {
    pub signature: u16,
    pub file_size: u32,
    pub index_offset: u32,
    pub data_offset: u32,
}

impl FixedHeader {
    /// Parse the header from the first [`FIXED_HEADER_SIZE`] bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> FixedHeader {
        debug_assert!(bytes.len() >= FIXED_HEADER_SIZE);

        FixedHeader {
            signature: u16_le(bytes, 0),
            file_size: u32_le(bytes, 2),
            index_offset: u32_le(bytes, 6),
            data_offset: u32_le(bytes, 10),
        }
    }

    pub fn to_bytes(&self) -> [u8; FIXED_HEADER_SIZE] {
        let mut out = [0_u8; FIXED_HEADER_SIZE];

        out[0..2].copy_from_slice(&self.signature.to_le_bytes());
        out[2..6].copy_from_slice(&self.file_size.to_le_bytes());
        out[6..10].copy_from_slice(&self.index_offset.to_le_bytes());
        out[10..14].copy_from_slice(&self.data_offset.to_le_bytes());

        out
    }
}

/// The classic 40-byte info header
///
/// On-disk info headers may declare a larger `size`; only the first 40
/// bytes are interpreted, the remainder travels untouched inside the
/// verbatim prefix copy the codec performs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InfoHeader {
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_m: u32,
    pub y_pixels_per_m: u32,
    pub colors_used: u32,
    pub num_important_colors: u32,
}

impl InfoHeader {
    /// Parse the info header from the first [`INFO_HEADER_SIZE`] bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> InfoHeader {
        debug_assert!(bytes.len() >= INFO_HEADER_SIZE);

        InfoHeader {
            size: u32_le(bytes, 0),
            width: u32_le(bytes, 4),
            height: u32_le(bytes, 8),
            planes: u16_le(bytes, 12),
            bits_per_pixel: u16_le(bytes, 14),
            compression: u32_le(bytes, 16),
            image_size: u32_le(bytes, 20),
            x_pixels_per_m: u32_le(bytes, 24),
            y_pixels_per_m: u32_le(bytes, 28),
            colors_used: u32_le(bytes, 32),
            num_important_colors: u32_le(bytes, 36),
        }
    }

    pub fn to_bytes(&self) -> [u8; INFO_HEADER_SIZE] {
        let mut out = [0_u8; INFO_HEADER_SIZE];

        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..8].copy_from_slice(&self.width.to_le_bytes());
        out[8..12].copy_from_slice(&self.height.to_le_bytes());
        out[12..14].copy_from_slice(&self.planes.to_le_bytes());
        out[14..16].copy_from_slice(&self.bits_per_pixel.to_le_bytes());
        out[16..20].copy_from_slice(&self.compression.to_le_bytes());
        out[20..24].copy_from_slice(&self.image_size.to_le_bytes());
        out[24..28].copy_from_slice(&self.x_pixels_per_m.to_le_bytes());
        out[28..32].copy_from_slice(&self.y_pixels_per_m.to_le_bytes());
        out[32..36].copy_from_slice(&self.colors_used.to_le_bytes());
        out[36..40].copy_from_slice(&self.num_important_colors.to_le_bytes());

        out
    }
}

/// Number of zero padding bytes appended to each row so that rows stay
/// 4-byte aligned on disk
pub const fn row_padding(width: usize) -> usize {
    (4 - width % 4) % 4
}

/// On-disk byte length of one row, `width + padding`
pub const fn row_stride(width: usize) -> usize {
    width + row_padding(width)
}

/// Byte length of the row-index bitmap for `height` rows
pub(crate) const fn row_index_len(height: usize) -> usize {
    (height + 7) / 8
}

pub(crate) fn u16_le(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_header_round_trips() {
        let header = FixedHeader {
            signature: BARCH_SIGNATURE,
            file_size: 0xDEAD_BEEF,
            index_offset: 54,
            data_offset: 60,
        };
        assert_eq!(FixedHeader::parse(&header.to_bytes()), header);
    }

    #[test]
    fn info_header_round_trips() {
        let info = InfoHeader {
            size: 40,
            width: 800,
            height: 600,
            planes: 1,
            bits_per_pixel: 8,
            compression: 0,
            image_size: 800 * 600,
            x_pixels_per_m: 2835,
            y_pixels_per_m: 2835,
            colors_used: 256,
            num_important_colors: 0,
        };
        assert_eq!(InfoHeader::parse(&info.to_bytes()), info);
    }

    #[test]
    fn signature_bytes_spell_the_magic() {
        assert_eq!(&BMP_SIGNATURE.to_le_bytes(), b"BM");
        assert_eq!(&BARCH_SIGNATURE.to_le_bytes(), b"BA");
    }

    #[test]
    fn padding_keeps_rows_aligned() {
        assert_eq!(row_padding(8), 0);
        assert_eq!(row_padding(5), 3);
        assert_eq!(row_padding(6), 2);
        assert_eq!(row_padding(7), 1);
        assert_eq!(row_stride(5), 8);
        assert_eq!(row_stride(0), 0);
    }

    #[test]
    fn row_index_len_rounds_up() {
        assert_eq!(row_index_len(0), 0);
        assert_eq!(row_index_len(1), 1);
        assert_eq!(row_index_len(8), 1);
        assert_eq!(row_index_len(9), 2);
        assert_eq!(row_index_len(16), 2);
    }
}
