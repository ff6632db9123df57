/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use core::fmt::{Debug, Display, Formatter};

use crate::common::ContainerKind;

/// Errors that can occur while opening a container or running the codec
///
/// Validation errors abort [`Container::open`](crate::Container::open)
/// before a reader is returned. Codec errors roll back the partially
/// written output file before they surface, so a failed call never leaves
/// a file at the destination path.
#[non_exhaustive]
pub enum BarchErrors {
    /// The source path could not be opened for reading
    FileNotFound(String),
    /// The source file exists but mapping or reading it failed
    FileOpenFailed(String),
    /// The output path could not be created
    FileCreationFailed(String),
    /// The fixed 14-byte header violates the container invariants
    InvalidBmpHeader(String),
    /// The info header violates the container invariants
    InvalidInfoHeader(String),
    /// A declared region does not fit in the file, or the compressed
    /// stream ran out of bits mid-row
    InvalidPixelData(String),
    /// The on-disk signature disagrees with the kind the caller expected
    ///
    /// Distinct from [`InvalidBmpHeader`](Self::InvalidBmpHeader) so that
    /// callers can tell "wrong kind of file" apart from "corrupt file".
    WrongContainerKind {
        expected: ContainerKind,
        found: ContainerKind,
    },
    /// A read, write or seek failed while producing the output file
    IoFailure(String),
}

impl Debug for BarchErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::FileNotFound(path) => {
                writeln!(f, "File does not exist: {path}")
            }
            Self::FileOpenFailed(detail) => {
                writeln!(f, "Unable to open file: {detail}")
            }
            Self::FileCreationFailed(path) => {
                writeln!(f, "Unable to create output file: {path}")
            }
            Self::InvalidBmpHeader(detail) => {
                writeln!(f, "Invalid header: {detail}")
            }
            Self::InvalidInfoHeader(detail) => {
                writeln!(f, "Invalid info header: {detail}")
            }
            Self::InvalidPixelData(detail) => {
                writeln!(f, "Invalid pixel data: {detail}")
            }
            Self::WrongContainerKind { expected, found } => {
                writeln!(f, "Expected a {expected:?} container but found {found:?}")
            }
            Self::IoFailure(detail) => {
                writeln!(f, "I/O error: {detail}")
            }
        }
    }
}

impl Display for BarchErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for BarchErrors {}

impl From<std::io::Error> for BarchErrors {
    fn from(value: std::io::Error) -> Self {
        BarchErrors::IoFailure(value.to_string())
    }
}
