//! Frame content fingerprints.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// SHA-256 of a frame's raw pixel buffer.
///
/// Serialized as a lowercase hex string so cache files stay readable and
/// diffable across decoder upgrades.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameDigest([u8; 32]);

impl FrameDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Digest raw decoded frame content.
pub fn hash_frame(data: &[u8]) -> FrameDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    FrameDigest(out)
}

impl fmt::Display for FrameDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FrameDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameDigest({})", self)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid frame digest {0:?}: expected 64 hex characters")]
pub struct ParseDigestError(String);

impl FromStr for FrameDigest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(ParseDigestError(s.to_string()));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            // chunks of an ASCII string are valid UTF-8
            let pair = std::str::from_utf8(chunk).map_err(|_| ParseDigestError(s.to_string()))?;
            out[i] = u8::from_str_radix(pair, 16).map_err(|_| ParseDigestError(s.to_string()))?;
        }
        Ok(FrameDigest(out))
    }
}

impl TryFrom<String> for FrameDigest {
    type Error = ParseDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameDigest> for String {
    fn from(value: FrameDigest) -> Self {
        value.to_string()
    }
}
