//! Content fingerprints for change detection.
//!
//! Reads are bounded by [`ReadLimits`]. Entropy is computed over the first
//! `sample_bytes`. The digest is SHA-256 over the content, streamed in 8 KiB
//! chunks, up to `max_read_bytes`.
//!
//! A file longer than `max_read_bytes` is not read past the cap. Its digest
//! covers the capped prefix followed by a truncation tag and the file length
//! from metadata, and the fingerprint is marked `truncated`. The hashed input
//! of a truncated file is always longer than the cap, so it never collides
//! with the digest of a file that was read whole under the same cap.

use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::shannon_entropy;

/// Digest size (32 bytes)
pub const DIGEST_SIZE: usize = 32;

/// Read chunk size for streaming hashes
const CHUNK_SIZE: usize = 8192;

/// Default entropy sample (1 MiB)
pub const DEFAULT_SAMPLE_BYTES: usize = 1024 * 1024;

/// Default cap on bytes read per file (256 MiB)
pub const DEFAULT_MAX_READ_BYTES: u64 = 256 * 1024 * 1024;

/// Appended to the hashed prefix of a file cut off at the read cap.
const TRUNCATED_TAG: &[u8] = b"keygate:truncated:";

/// SHA-256 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

/// Byte budgets for reading one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    /// Prefix length used for entropy
    pub sample_bytes: usize,
    /// Hard cap on bytes read; longer files are digested by prefix and length
    pub max_read_bytes: u64,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self { sample_bytes: DEFAULT_SAMPLE_BYTES, max_read_bytes: DEFAULT_MAX_READ_BYTES }
    }
}

/// Result of analysing one piece of content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingerprint {
    /// Content digest (prefix plus length if `truncated`)
    pub digest: Digest,
    /// Content length in bytes
    pub size_bytes: u64,
    /// Entropy of the sampled prefix
    pub entropy: f64,
    /// Content was longer than the read cap and was not read in full
    pub truncated: bool,
}

/// Fingerprint in-memory content.
pub fn fingerprint_bytes(bytes: &[u8], sample_bytes: usize) -> Fingerprint {
    let sample = &bytes[..bytes.len().min(sample_bytes)];
    Fingerprint {
        digest: Digest(Sha256::digest(bytes).into()),
        size_bytes: bytes.len() as u64,
        entropy: shannon_entropy(sample),
        truncated: false,
    }
}

/// Fingerprint a file on disk, reading at most `limits.max_read_bytes`.
///
/// `size_bytes` is the number of bytes hashed, or the metadata length when
/// the file was truncated at the cap.
///
/// # Errors
///
/// Any I/O error from opening or reading. `NotFound` means the file vanished
/// and callers treat it as a delete.
pub fn fingerprint_file(path: &Path, limits: ReadLimits) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let streamed = stream(&mut file, limits)?;

    let size_bytes = if streamed.truncated {
        file.metadata()?.len().max(streamed.read + 1)
    } else {
        streamed.read
    };

    Ok(streamed.finish(size_bytes))
}

/// Hash state after one bounded pass over a reader.
struct Streamed {
    hasher: Sha256,
    sample: Vec<u8>,
    read: u64,
    truncated: bool,
}

impl Streamed {
    fn finish(mut self, size_bytes: u64) -> Fingerprint {
        if self.truncated {
            self.hasher.update(TRUNCATED_TAG);
            self.hasher.update(size_bytes.to_be_bytes());
        }

        Fingerprint {
            digest: Digest(self.hasher.finalize().into()),
            size_bytes,
            entropy: shannon_entropy(&self.sample),
            truncated: self.truncated,
        }
    }
}

/// Hash up to `max_read_bytes` from `reader`, then read one more byte to learn
/// whether more content remains.
fn stream<R: Read>(reader: &mut R, limits: ReadLimits) -> io::Result<Streamed> {
    let mut hasher = Sha256::new();
    let mut sample = Vec::with_capacity(limits.sample_bytes.min(CHUNK_SIZE * 16));
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut read = 0u64;

    {
        let mut capped = reader.by_ref().take(limits.max_read_bytes);
        loop {
            let n = match capped.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            hasher.update(&chunk[..n]);
            read += n as u64;

            let room = limits.sample_bytes.saturating_sub(sample.len());
            sample.extend_from_slice(&chunk[..n.min(room)]);
        }
    }

    let truncated = read == limits.max_read_bytes && has_more(reader)?;

    Ok(Streamed { hasher, sample, read, truncated })
}

fn has_more<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut extra = [0u8; 1];
    loop {
        match reader.read(&mut extra) {
            Ok(n) => return Ok(n > 0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }
}
