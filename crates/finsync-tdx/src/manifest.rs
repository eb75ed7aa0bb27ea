//! Server manifest (`gpcw.txt`) fetching and parsing
//!
//! The manifest is a plain text listing, one `name,md5,size` triple per line,
//! and is the sole authority on which packages should exist locally.

use std::collections::{BTreeMap, HashSet};

use finsync_core::{SyncError, Transport};

use crate::inventory::PACKAGE_EXT;

/// Entry in the server manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    /// Lowercase hex MD5 of the package
    pub content_hash: String,
    pub size: u64,
}

/// Parsed manifest, keyed by package name
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Parse the full manifest text; any malformed line fails the whole parse.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let mut entries = BTreeMap::new();
        let mut seen = HashSet::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let lineno = idx + 1;
            let entry = parse_line(line).map_err(|reason| {
                SyncError::manifest_malformed(format!("line {lineno}: {reason}"))
            })?;
            if !seen.insert(entry.name.clone()) {
                return Err(SyncError::manifest_malformed(format!(
                    "line {lineno}: duplicate entry {}",
                    entry.name
                )));
            }
            entries.insert(entry.name.clone(), entry);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes the manifest promises
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }
}

impl FromIterator<ManifestEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|e| (e.name.clone(), e)).collect(),
        }
    }
}

fn parse_line(line: &str) -> Result<ManifestEntry, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, hash, size] = fields.as_slice() else {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    };
    check_name(name)?;
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid content hash {hash:?}"));
    }
    let size = size
        .parse::<u64>()
        .map_err(|e| format!("invalid size {size:?}: {e}"))?;
    Ok(ManifestEntry {
        name: (*name).to_string(),
        content_hash: hash.to_ascii_lowercase(),
        size,
    })
}

/// Names become paths under the package directory, so they must be a single
/// plain `*.zip` file name.
fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty file name".to_string());
    }
    if name.contains(['/', '\\', ':']) || name.starts_with('.') || name.contains("..") {
        return Err(format!("file name {name:?} is not a plain file name"));
    }
    let stem = name
        .strip_suffix(PACKAGE_EXT)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or_default();
    if stem.is_empty() {
        return Err(format!("file name {name:?} is not a .{PACKAGE_EXT} package"));
    }
    Ok(())
}

/// Fetches the manifest through a [`Transport`]. Makes a single attempt;
/// retries are the coordinator's business.
pub struct ManifestClient<'a, T: Transport + ?Sized> {
    transport: &'a T,
    url: &'a str,
}

impl<'a, T: Transport + ?Sized> ManifestClient<'a, T> {
    pub fn new(transport: &'a T, url: &'a str) -> Self {
        Self { transport, url }
    }

    pub fn fetch(&self) -> Result<Manifest, SyncError> {
        let text = self
            .transport
            .fetch_text(self.url)
            .map_err(SyncError::manifest_transport)?;
        Manifest::parse(&text)
    }
}
