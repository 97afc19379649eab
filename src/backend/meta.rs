//! Series metadata records and their on-disk envelope.
//!
//! ## Envelope
//!
//! ```text
//! +--------+---------+----------+------------------+-----------------+
//! | "TTMD" | version | length   | body (SSZ)       | SHA-256(body)   |
//! +--------+---------+----------+------------------+-----------------+
//!   4        u16 LE    u32 LE     length bytes       32 bytes
//! ```
//!
//! The body is the SSZ encoding of a [`SeriesSchema`]. The digest covers
//! the body only; a mismatch is reported as corruption together with the
//! hex digests for the log.

use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;

use crate::codec::CodecKind;
use crate::error::StoreError;

/// Envelope magic
pub const META_MAGIC: [u8; 4] = *b"TTMD";

/// Current envelope version
pub const META_VERSION: u16 = 1;

/// Bytes before the body
pub const META_HEADER_SIZE: usize = 10;

/// Digest size
pub const META_DIGEST_SIZE: usize = 32;

/// Longest series name a schema can hold
pub const MAX_NAME_LEN: usize = 32;

// ============================================================================
// SeriesSchema
// ============================================================================

/// Persistent description of a series.
///
/// Stored as fixed-width fields so that the SSZ encoding is constant size.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct SeriesSchema {
    /// Series name, zero padded
    pub name_raw: [u8; 32],

    /// Used bytes of `name_raw`
    pub name_len: u8,

    /// Codec as u8 (see [`CodecKind::to_u8`])
    pub codec_raw: u8,

    /// Decimal places most values are expected to carry
    pub exponent: u8,

    /// Values written when the schema was saved
    pub count: u64,

    /// Creation time, Unix milliseconds
    pub created_at: u64,
}

impl SeriesSchema {
    /// Build a schema.
    ///
    /// Fails with `OutOfRange` if `name` is longer than [`MAX_NAME_LEN`] bytes.
    pub fn new(name: &str, codec: CodecKind, exponent: u8, created_at: u64) -> crate::error::Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_NAME_LEN {
            return Err(StoreError::OutOfRange(format!(
                "series name {:?} is longer than {} bytes",
                name, MAX_NAME_LEN
            )));
        }
        let mut name_raw = [0u8; 32];
        name_raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            name_raw,
            name_len: bytes.len() as u8,
            codec_raw: codec.to_u8(),
            exponent,
            count: 0,
            created_at,
        })
    }

    /// Series name, `None` if the stored bytes are not valid UTF-8
    pub fn name(&self) -> Option<&str> {
        let len = (self.name_len as usize).min(MAX_NAME_LEN);
        std::str::from_utf8(&self.name_raw[..len]).ok()
    }

    /// Codec, `None` if the stored value is unknown
    #[inline]
    pub fn codec(&self) -> Option<CodecKind> {
        CodecKind::from_u8(self.codec_raw)
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// SHA-256 of `data`
pub fn digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Serialize a schema into a complete metadata file image.
pub fn encode(schema: &SeriesSchema) -> crate::error::Result<Vec<u8>> {
    let body = ssz_rs::serialize(schema)
        .map_err(|e| StoreError::Corrupt(format!("schema encoding failed: {:?}", e)))?;

    let mut out = Vec::with_capacity(META_HEADER_SIZE + body.len() + META_DIGEST_SIZE);
    out.extend_from_slice(&META_MAGIC);
    out.extend_from_slice(&META_VERSION.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&digest(&body));
    Ok(out)
}

/// Validate a metadata file image and deserialize its schema.
pub fn decode(data: &[u8]) -> crate::error::Result<SeriesSchema> {
    if data.len() < META_HEADER_SIZE + META_DIGEST_SIZE {
        return Err(StoreError::Corrupt(format!("truncated: {} bytes", data.len())));
    }
    if data[..4] != META_MAGIC {
        return Err(StoreError::Corrupt(format!("bad magic {}", hex::encode(&data[..4]))));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != META_VERSION {
        return Err(StoreError::Corrupt(format!("unsupported version {}", version)));
    }
    let length = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
    if data.len() != META_HEADER_SIZE + length + META_DIGEST_SIZE {
        return Err(StoreError::Corrupt(format!(
            "length field {} does not match file size {}",
            length,
            data.len()
        )));
    }

    let body = &data[META_HEADER_SIZE..META_HEADER_SIZE + length];
    let stored = &data[META_HEADER_SIZE + length..];
    let actual = digest(body);
    if stored != actual.as_slice() {
        return Err(StoreError::Corrupt(format!(
            "digest mismatch: stored {} computed {}",
            hex::encode(stored),
            hex::encode(actual)
        )));
    }

    ssz_rs::deserialize(body).map_err(|e| StoreError::Corrupt(format!("schema decoding failed: {:?}", e)))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SeriesSchema {
        let mut schema = SeriesSchema::new("btc.usd.last", CodecKind::Delta, 2, 1_703_577_600_000).unwrap();
        schema.count = 308;
        schema
    }

    #[test]
    fn test_schema_fields() {
        let schema = sample();
        assert_eq!(schema.name(), Some("btc.usd.last"));
        assert_eq!(schema.codec(), Some(CodecKind::Delta));
        assert_eq!(schema.exponent, 2);
    }

    #[test]
    fn test_schema_name_too_long() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let err = SeriesSchema::new(&name, CodecKind::Raw, 0, 0).unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange(_)));
        assert!(SeriesSchema::new(&name[..MAX_NAME_LEN], CodecKind::Raw, 0, 0).is_ok());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let schema = sample();
        let image = encode(&schema).unwrap();
        assert_eq!(&image[..4], b"TTMD");
        assert_eq!(decode(&image).unwrap(), schema);
    }

    #[test]
    fn test_schema_tree_root_tracks_fields() {
        let mut a = sample();
        let mut b = sample();
        assert_eq!(a.hash_tree_root().unwrap(), b.hash_tree_root().unwrap());
        b.count += 1;
        assert_ne!(a.hash_tree_root().unwrap(), b.hash_tree_root().unwrap());
    }

    #[test]
    fn test_envelope_deterministic() {
        assert_eq!(encode(&sample()).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn test_envelope_detects_corruption() {
        let image = encode(&sample()).unwrap();

        let mut flipped = image.clone();
        flipped[META_HEADER_SIZE] ^= 0x01;
        let err = decode(&flipped).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));

        let mut bad_magic = image.clone();
        bad_magic[0] = b'X';
        assert!(matches!(decode(&bad_magic), Err(StoreError::Corrupt(_))));

        let mut bad_version = image.clone();
        bad_version[4] = 9;
        assert!(decode(&bad_version).is_err());

        assert!(decode(&image[..image.len() - 1]).is_err());
        assert!(decode(&image[..5]).is_err());
    }
}
