//! Local inventory: what is already on disk
//!
//! Read-only scans of the package and derived-output directories. Nothing here
//! trusts timestamps; freshness is decided by content hash in [`crate::diff`].

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use finsync_core::{hash_file, is_valid_parquet};

pub const PACKAGE_EXT: &str = "zip";
pub const RAW_EXT: &str = "dat";
pub const SNAPSHOT_EXT: &str = "parquet";

/// Result of scanning one directory.
///
/// `Missing` and `Present(empty)` are kept apart so callers can tell a first
/// run from a steady state; both behave as "nothing here" for planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirScan {
    Missing,
    Present(BTreeSet<String>),
}

impl DirScan {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::Missing => false,
            Self::Present(names) => names.contains(name),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        let names = match self {
            Self::Missing => None,
            Self::Present(names) => Some(names.iter()),
        };
        names.into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Missing => 0,
            Self::Present(names) => names.len(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// A package already on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    pub name: String,
    pub path: PathBuf,
}

impl LocalPackage {
    /// Content hash, computed on demand by streaming the file
    pub fn content_hash(&self) -> io::Result<String> {
        hash_file(&self.path)
    }
}

/// Swap a package/raw name's extension (`gpcw20240101.zip` → `gpcw20240101.parquet`)
pub fn with_ext(name: &str, ext: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{stem}.{ext}")
}

/// Snapshot output file name for a package name
pub fn snapshot_name(package: &str) -> String {
    with_ext(package, SNAPSHOT_EXT)
}

/// Unpacked raw file name for a package name
pub fn raw_name(package: &str) -> String {
    with_ext(package, RAW_EXT)
}

/// Filesystem view over the package and snapshot directories
#[derive(Debug, Clone)]
pub struct LocalInventory {
    package_dir: PathBuf,
    snapshot_dir: PathBuf,
}

impl LocalInventory {
    pub fn new(package_dir: impl Into<PathBuf>, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_dir: package_dir.into(),
            snapshot_dir: snapshot_dir.into(),
        }
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    pub fn package_path(&self, name: &str) -> PathBuf {
        self.package_dir.join(name)
    }

    pub fn raw_path(&self, package: &str) -> PathBuf {
        self.package_dir.join(raw_name(package))
    }

    pub fn snapshot_path(&self, package: &str) -> PathBuf {
        self.snapshot_dir.join(snapshot_name(package))
    }

    /// Packaged files (`*.zip`) in the package directory
    pub fn list_packages(&self) -> anyhow::Result<Vec<LocalPackage>> {
        let scan = scan_dir(&self.package_dir, PACKAGE_EXT)?;
        Ok(scan
            .names()
            .map(|name| LocalPackage {
                path: self.package_dir.join(name),
                name: name.clone(),
            })
            .collect())
    }

    /// Package directory scan, distinguishing a missing directory
    pub fn scan_packages(&self) -> anyhow::Result<DirScan> {
        scan_dir(&self.package_dir, PACKAGE_EXT)
    }

    /// Derived snapshot outputs with a readable parquet footer
    pub fn list_derived(&self) -> anyhow::Result<DirScan> {
        Ok(match scan_dir(&self.snapshot_dir, SNAPSHOT_EXT)? {
            DirScan::Missing => DirScan::Missing,
            DirScan::Present(names) => DirScan::Present(
                names
                    .into_iter()
                    .filter(|n| {
                        let ok = is_valid_parquet(&self.snapshot_dir.join(n));
                        if !ok {
                            log::warn!("{n}: unreadable snapshot output, treating as absent");
                        }
                        ok
                    })
                    .collect(),
            ),
        })
    }

    /// Unpacked raw files (`*.dat`) in the package directory
    pub fn list_raw(&self) -> anyhow::Result<DirScan> {
        scan_dir(&self.package_dir, RAW_EXT)
    }

    /// Streaming content hash of any file
    pub fn hash_of(&self, path: &Path) -> io::Result<String> {
        hash_file(path)
    }
}

/// List regular files in `dir` with extension `ext`
fn scan_dir(dir: &Path, ext: &str) -> anyhow::Result<DirScan> {
    if !dir.is_dir() {
        return Ok(DirScan::Missing);
    }
    let pattern = dir.join(format!("*.{ext}"));
    let pattern = pattern.to_string_lossy();
    let names = glob::glob(&pattern)
        .with_context(|| format!("invalid glob pattern {pattern}"))?
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    Ok(DirScan::Present(names))
}
