//! Package extraction with corruption cleanup
//!
//! Only the package's own raw file (`<stem>.dat`) is extracted; any other
//! entry is skipped so one package can never replace another item's files.
//! The raw file is staged and renamed into place with its CRC checked by the
//! zip reader, or the name is returned to the "absent" state: package, raw
//! file and staging file are removed so the next plan re-downloads it cleanly.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use finsync_core::{SyncError, commit, remove_if_exists, staging_path};

use crate::inventory::{LocalPackage, raw_name};

/// A file extracted from a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedRawFile {
    pub name: String,
    pub path: PathBuf,
}

/// Unpacks packages into their own directory
#[derive(Debug, Clone)]
pub struct ArchiveStage {
    dest_dir: PathBuf,
}

impl ArchiveStage {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
        }
    }

    /// Extract `<stem>.dat` from `package`.
    ///
    /// Fails with `CorruptArchive` (after cleanup) when the package cannot be
    /// read, the entry fails its CRC, or the expected `<stem>.dat` is not in
    /// the package. Destination I/O failures are reported as `Persist` and
    /// leave the package in place.
    pub fn unpack(&self, package: &LocalPackage) -> Result<Vec<UnpackedRawFile>, SyncError> {
        match self.extract_raw(package) {
            Ok(file) => Ok(vec![file]),
            Err(Extract::Corrupt(reason)) => {
                self.cleanup(package);
                Err(SyncError::CorruptArchive(format!("{}: {reason}", package.name)))
            }
            Err(Extract::Io(e)) => {
                let _ = remove_if_exists(&staging_path(&self.raw_path(package)));
                Err(SyncError::Persist(e))
            }
        }
    }

    fn raw_path(&self, package: &LocalPackage) -> PathBuf {
        self.dest_dir.join(raw_name(&package.name))
    }

    fn extract_raw(&self, package: &LocalPackage) -> Result<UnpackedRawFile, Extract> {
        let expected = raw_name(&package.name);
        let file = File::open(&package.path).map_err(Extract::corrupt)?;
        let mut archive = zip::ZipArchive::new(file).map_err(Extract::corrupt)?;

        let skipped = archive.len().saturating_sub(1);
        let mut entry = match archive.by_name(&expected) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(Extract::Corrupt(format!("{expected} not found in package")));
            }
            Err(e) => return Err(Extract::corrupt(e)),
        };
        if skipped > 0 {
            log::debug!("{}: skipping {skipped} other entr(ies)", package.name);
        }
        let dest = self.raw_path(package);
        let tmp = staging_path(&dest);
        let mut out = BufWriter::new(File::create(&tmp).map_err(Extract::Io)?);
        // Read errors here are CRC / inflate failures inside the package
        copy_entry(&mut entry, &mut out)?;
        out.flush().map_err(Extract::Io)?;
        drop(out);
        commit(&tmp, &dest).map_err(Extract::Io)?;

        log::debug!("{}: unpacked {expected}", package.name);
        Ok(UnpackedRawFile {
            name: expected,
            path: dest,
        })
    }

    fn cleanup(&self, package: &LocalPackage) {
        let raw = self.raw_path(package);
        for path in [package.path.clone(), staging_path(&raw), raw] {
            if let Err(e) = remove_if_exists(&path) {
                log::warn!("{}: cleanup of {} failed: {e}", package.name, path.display());
            }
        }
    }
}

enum Extract {
    Corrupt(String),
    Io(io::Error),
}

impl Extract {
    fn corrupt(e: impl std::fmt::Display) -> Self {
        Self::Corrupt(e.to_string())
    }
}

/// Copy one entry, separating source (archive) errors from destination errors
fn copy_entry(src: &mut impl io::Read, dst: &mut impl Write) -> Result<u64, Extract> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Extract::corrupt(e)),
        };
        dst.write_all(&buf[..n]).map_err(Extract::Io)?;
        total += n as u64;
    }
}
