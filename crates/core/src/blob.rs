//! Content-addressed blob storage with compression

use crate::error::{CoreError, ObjectKind, Result};
use crate::hash::{hash_bytes, Digest};

/// Blobs larger than this are considered for zstd compression
const COMPRESS_THRESHOLD: usize = 4096;

/// zstd compression level for blob payloads
const COMPRESS_LEVEL: i32 = 3;

/// Blob header format (version 1)
///
/// Layout: magic(4) + flags(1) + orig_len(8) + stored_len(8) = 21 bytes
#[derive(Debug, Clone)]
pub struct BlobHeader {
    /// Flags: bit0=compressed, bit1-7=reserved
    flags: u8,
    /// Original size (before compression)
    orig_len: u64,
    /// Stored size (after compression, if compressed)
    stored_len: u64,
}

impl BlobHeader {
    const MAGIC: [u8; 4] = *b"ABL1";
    const FLAG_COMPRESSED: u8 = 0b0000_0001;
    const LEN: usize = 21;

    fn new(orig_len: u64, stored_len: u64, compressed: bool) -> Self {
        let flags = if compressed { Self::FLAG_COMPRESSED } else { 0 };
        Self {
            flags,
            orig_len,
            stored_len,
        }
    }

    fn is_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESSED) != 0
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.extend_from_slice(&Self::MAGIC);
        buf.push(self.flags);
        buf.extend_from_slice(&self.orig_len.to_le_bytes());
        buf.extend_from_slice(&self.stored_len.to_le_bytes());
        buf
    }

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < Self::LEN {
            return Err(format!("blob record too short: {} bytes", bytes.len()));
        }
        if bytes[..4] != Self::MAGIC {
            return Err("bad blob magic".to_string());
        }
        let flags = bytes[4];
        let orig_len = u64::from_le_bytes(bytes[5..13].try_into().unwrap());
        let stored_len = u64::from_le_bytes(bytes[13..21].try_into().unwrap());
        Ok(Self {
            flags,
            orig_len,
            stored_len,
        })
    }
}

/// Content-addressed blob store backed by a sled tree
///
/// Keys are BLAKE3 digests of the raw (uncompressed) content, so `put`
/// is naturally idempotent. Writes are flushed before the digest is
/// returned: once a caller holds a digest, the content is durable.
pub struct BlobStore {
    tree: sled::Tree,
}

impl BlobStore {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    /// Store content and return its digest
    ///
    /// Identical content is stored exactly once; re-submitting returns
    /// the same digest without touching disk again.
    pub fn put(&self, data: &[u8]) -> Result<Digest> {
        let digest = hash_bytes(data);
        if self.tree.contains_key(digest.as_bytes())? {
            return Ok(digest);
        }

        let record = encode_blob(data)?;
        self.tree.insert(digest.as_bytes(), record)?;
        self.tree.flush()?;

        tracing::debug!(digest = %digest, size = data.len(), "stored blob");
        Ok(digest)
    }

    /// Fetch content by digest
    pub fn get(&self, digest: Digest) -> Result<Vec<u8>> {
        let record = self
            .tree
            .get(digest.as_bytes())?
            .ok_or(CoreError::NotFound {
                kind: ObjectKind::Blob,
                digest,
            })?;

        decode_blob(digest, &record)
    }

    /// Check whether a digest is present
    pub fn contains(&self, digest: Digest) -> Result<bool> {
        Ok(self.tree.contains_key(digest.as_bytes())?)
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the store holds no blobs
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn encode_blob(data: &[u8]) -> Result<Vec<u8>> {
    let (payload, compressed) = if data.len() > COMPRESS_THRESHOLD {
        let packed = zstd::bulk::compress(data, COMPRESS_LEVEL)?;
        // Only keep the compressed form when it actually saves space
        if packed.len() < data.len() {
            (packed, true)
        } else {
            (data.to_vec(), false)
        }
    } else {
        (data.to_vec(), false)
    };

    let header = BlobHeader::new(data.len() as u64, payload.len() as u64, compressed);
    let mut record = header.to_bytes();
    record.extend_from_slice(&payload);
    Ok(record)
}

fn decode_blob(digest: Digest, record: &[u8]) -> Result<Vec<u8>> {
    let corrupt = |detail: String| CoreError::Corrupt {
        kind: ObjectKind::Blob,
        digest,
        detail,
    };

    let header = BlobHeader::from_bytes(record).map_err(&corrupt)?;
    let payload = &record[BlobHeader::LEN..];
    if payload.len() as u64 != header.stored_len {
        return Err(corrupt(format!(
            "stored length mismatch: header says {}, record holds {}",
            header.stored_len,
            payload.len()
        )));
    }

    let data = if header.is_compressed() {
        zstd::bulk::decompress(payload, header.orig_len as usize)
            .map_err(|e| corrupt(format!("zstd decompress failed: {e}")))?
    } else {
        payload.to_vec()
    };

    if data.len() as u64 != header.orig_len {
        return Err(corrupt(format!(
            "original length mismatch: header says {}, got {}",
            header.orig_len,
            data.len()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_dir, store) = open_store();
        let data = b"fn main() {}\n";
        let digest = store.blobs().put(data).unwrap();
        assert_eq!(store.blobs().get(digest).unwrap(), data);
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_dir, store) = open_store();
        let data = b"same content";
        let d1 = store.blobs().put(data).unwrap();
        let d2 = store.blobs().put(data).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(store.blobs().len(), 1);
    }

    #[test]
    fn test_digest_matches_content_hash() {
        let (_dir, store) = open_store();
        let data = b"addressed by content";
        let digest = store.blobs().put(data).unwrap();
        assert_eq!(digest, hash_bytes(data));
    }

    #[test]
    fn test_large_blob_compressed_roundtrip() -> anyhow::Result<()> {
        let (_dir, store) = open_store();
        // Highly repetitive content well above the compression threshold
        let data = b"hello world ".repeat(1000);
        let digest = store.blobs().put(&data)?;
        assert_eq!(store.blobs().get(digest)?, data);
        Ok(())
    }

    #[test]
    fn test_empty_blob() {
        let (_dir, store) = open_store();
        let digest = store.blobs().put(b"").unwrap();
        assert_eq!(store.blobs().get(digest).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_missing_digest_is_not_found() {
        let (_dir, store) = open_store();
        let absent = hash_bytes(b"never stored");
        match store.blobs().get(absent) {
            Err(CoreError::NotFound { kind, digest }) => {
                assert_eq!(kind, ObjectKind::Blob);
                assert_eq!(digest, absent);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = BlobHeader::new(1000, 500, true);
        let bytes = header.to_bytes();
        let parsed = BlobHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.orig_len, 1000);
        assert_eq!(parsed.stored_len, 500);
        assert!(parsed.is_compressed());
    }

    #[test]
    fn test_truncated_record_is_corrupt() {
        let digest = hash_bytes(b"whatever");
        match decode_blob(digest, &[0u8; 4]) {
            Err(CoreError::Corrupt { .. }) => {}
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }
}
