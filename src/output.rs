/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Failure-atomic output files
//!
//! Every codec invocation either leaves a complete, well-formed file at
//! the destination path or no file at all. [`OutputFile`] is the guard
//! that enforces this: it truncates the destination on creation, and on
//! drop it deletes whatever was written unless [`commit`](OutputFile::commit)
//! ran first. Any early return via `?` therefore rolls the output back.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::error;

use crate::container::Container;
use crate::errors::BarchErrors;

#[derive(Debug)]
pub(crate) struct OutputFile {
    file: Option<File>,
    path: PathBuf,
}

impl OutputFile {
    /// Create (or truncate) the file at `path`
    ///
    /// Creation failure surfaces as
    /// [`FileCreationFailed`](BarchErrors::FileCreationFailed); no partial
    /// file can exist in that case.
    pub(crate) fn create(path: &Path) -> Result<OutputFile, BarchErrors> {
        let file = File::create(path).map_err(|err| {
            BarchErrors::FileCreationFailed(format!("{}: {err}", path.display()))
        })?;

        Ok(OutputFile {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    fn inner(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output already finalized"))
    }

    /// Current write position in bytes
    pub(crate) fn position(&mut self) -> Result<u64, BarchErrors> {
        Ok(self.inner()?.stream_position()?)
    }

    /// Move the cursor back to the start of the file so the final header
    /// bytes can be patched in place
    pub(crate) fn rewind(&mut self) -> Result<(), BarchErrors> {
        self.inner()?.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Keep the file: flush it and disarm the rollback
    pub(crate) fn commit(mut self) -> Result<(), BarchErrors> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // close before unlinking, some platforms refuse to remove
            // open files
            drop(file);
            if let Err(err) = fs::remove_file(&self.path) {
                error!("unable to roll back {}: {err}", self.path.display());
            }
        }
    }
}

/// Reproduce `source` byte-identically at `dest`
///
/// Compressing an already compressed container (and the reverse) is a
/// plain copy, still performed under the rollback guard.
pub(crate) fn copy_through(source: &Container, dest: &Path) -> Result<(), BarchErrors> {
    let mut out = OutputFile::create(dest)?;

    source.copy_prefix_to(&mut out, source.file_size())?;
    if out.position()? != source.file_size() as u64 {
        return Err(BarchErrors::IoFailure(String::from(
            "short write while copying container",
        )));
    }

    out.commit()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use super::OutputFile;

    #[test]
    fn dropped_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.barch");

        let mut out = OutputFile::create(&path).unwrap();
        out.write_all(b"half a header").unwrap();
        assert!(path.exists());

        drop(out);
        assert!(!path.exists());
    }

    #[test]
    fn committed_output_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whole.barch");

        let mut out = OutputFile::create(&path).unwrap();
        out.write_all(b"all of it").unwrap();
        out.commit().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"all of it");
    }

    #[test]
    fn creation_failure_reports_path() {
        let err = OutputFile::create(Path::new("/nonexistent-dir/out.barch")).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::BarchErrors::FileCreationFailed(_)
        ));
    }
}
