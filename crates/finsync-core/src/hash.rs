//! MD5 content hashing, the change-detection signal published by the server

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

/// Files are hashed in fixed chunks so memory stays flat regardless of size
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file's full contents, returning the lowercase hex digest.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

/// Hash everything readable from `reader` in [`HASH_CHUNK_SIZE`] chunks.
pub fn hash_reader(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash raw bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Compare two hex digests, ignoring case and surrounding whitespace.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Return the first 8 hex characters of a digest.
pub fn short_hash(hex: &str) -> &str {
    hex.get(..8).unwrap_or(hex)
}
