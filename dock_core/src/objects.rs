//! Sharded, content-addressed object storage.
//!
//! Objects live at `{base}/{d0d1}/{drest}` where `d0d1` is the first
//! [`SHARD_WIDTH`](crate::digest::SHARD_WIDTH) hex characters of the digest.
//! Blobs and starlogs use the same layout under different base directories.

use crate::digest::{DIGEST_HEX_LEN, Digest, SHARD_WIDTH};
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Which namespace an [`ObjectStore`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// File content (`.dock/objects`).
    Blobs,
    /// Starlog records (`.dock/starlogs`).
    Starlogs,
}

impl Namespace {
    /// Directory name under `.dock`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Blobs => "objects",
            Namespace::Starlogs => "starlogs",
        }
    }
}

/// Write-once byte storage keyed by SHA3-256 digest.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    base: PathBuf,
    namespace: Namespace,
}

impl ObjectStore {
    /// Open the namespace rooted at `dock_dir`. No directories are created.
    pub fn new(dock_dir: &Path, namespace: Namespace) -> Self {
        Self {
            base: dock_dir.join(namespace.dir_name()),
            namespace,
        }
    }

    /// The namespace directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Get the path to an object file given its digest.
    pub fn object_path(&self, digest: &Digest) -> PathBuf {
        digest.shard_path(&self.base)
    }

    /// Whether an object with this digest is stored.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.object_path(digest).is_file()
    }

    /// Store `bytes` and return their digest.
    ///
    /// Storing content that is already present is a no-op.
    pub fn put(&self, bytes: &[u8]) -> Result<Digest> {
        let digest = Digest::of_bytes(bytes);
        let obj_path = self.object_path(&digest);
        if obj_path.exists() {
            return Ok(digest);
        }

        let shard_dir = self.base.join(digest.prefix());
        fs::create_dir_all(&shard_dir)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&shard_dir)?;
        temp_file.write_all(bytes)?;
        temp_file.flush()?;

        // Another writer may have stored the same content in the meantime.
        match temp_file.persist_noclobber(&obj_path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        tracing::trace!(namespace = ?self.namespace, %digest, "stored object");
        Ok(digest)
    }

    /// Read the object stored under `digest`.
    ///
    /// The content is re-hashed and must match its name.
    pub fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        let obj_path = self.object_path(digest);
        let bytes = match fs::read(&obj_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!(
                    "{} {}",
                    self.namespace.dir_name(),
                    digest
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let computed = Digest::of_bytes(&bytes);
        if computed != *digest {
            return Err(Error::corrupt_repository(
                &obj_path,
                format!("Digest mismatch: expected {}, got {}", digest, computed),
            ));
        }

        Ok(bytes)
    }

    /// Read an object by its hex name.
    ///
    /// Malformed names (including ones shorter than the shard prefix) are
    /// reported as NotFound, the same as unknown digests.
    pub fn get_hex(&self, hex: &str) -> Result<Vec<u8>> {
        if hex.len() <= SHARD_WIDTH {
            return Err(Error::not_found(format!(
                "{} {:?} (shorter than shard prefix)",
                self.namespace.dir_name(),
                hex
            )));
        }
        let digest = Digest::from_hex(hex)
            .map_err(|_| Error::not_found(format!("{} {:?}", self.namespace.dir_name(), hex)))?;
        self.get(&digest)
    }

    /// Enumerate every stored digest, sorted.
    ///
    /// Stray files that do not form a valid digest are skipped.
    pub fn digests(&self) -> Result<Vec<Digest>> {
        let mut digests = Vec::new();
        if !self.base.exists() {
            return Ok(digests);
        }

        for shard_entry in fs::read_dir(&self.base)? {
            let shard_path = shard_entry?.path();
            if !shard_path.is_dir() {
                continue;
            }

            let prefix = shard_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");
            if prefix.len() != SHARD_WIDTH {
                continue;
            }

            for obj_entry in fs::read_dir(&shard_path)? {
                let obj_path = obj_entry?.path();
                if !obj_path.is_file() {
                    continue;
                }

                let suffix = obj_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if prefix.len() + suffix.len() != DIGEST_HEX_LEN {
                    continue;
                }
                if let Ok(digest) = Digest::from_hex(&format!("{}{}", prefix, suffix)) {
                    digests.push(digest);
                }
            }
        }

        digests.sort();
        Ok(digests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn blob_store(temp_dir: &TempDir) -> ObjectStore {
        ObjectStore::new(temp_dir.path(), Namespace::Blobs)
    }

    #[test]
    fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        let digest = store.put(b"hello").unwrap();
        assert_eq!(digest, Digest::of_bytes(b"hello"));
        assert_eq!(store.get(&digest).unwrap(), b"hello");
    }

    #[test]
    fn test_layout_is_sharded() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        let digest = store.put(b"layout").unwrap();
        let hex = digest.to_hex();
        let expected = temp_dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        assert!(expected.is_file());
        assert_eq!(fs::read(expected).unwrap(), b"layout");
    }

    #[test]
    fn test_put_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        let first = store.put(b"same").unwrap();
        let second = store.put(b"same").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.digests().unwrap(), vec![first]);

        // Only the object itself lives in the shard (no leftover temp files).
        let shard = temp_dir.path().join("objects").join(first.prefix());
        assert_eq!(fs::read_dir(shard).unwrap().count(), 1);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        let result = store.get(&Digest::of_bytes(b"missing"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_get_hex_malformed_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        assert!(matches!(store.get_hex("a"), Err(Error::NotFound { .. })));
        assert!(matches!(store.get_hex("ab"), Err(Error::NotFound { .. })));
        assert!(matches!(store.get_hex("abcdef"), Err(Error::NotFound { .. })));

        let digest = store.put(b"by hex").unwrap();
        assert_eq!(store.get_hex(&digest.to_hex()).unwrap(), b"by hex");
    }

    #[test]
    fn test_tampered_object_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        let digest = store.put(b"original").unwrap();
        fs::write(store.object_path(&digest), b"tampered").unwrap();

        let result = store.get(&digest);
        assert!(matches!(result, Err(Error::CorruptRepository { .. })));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = ObjectStore::new(temp_dir.path(), Namespace::Blobs);
        let starlogs = ObjectStore::new(temp_dir.path(), Namespace::Starlogs);

        let digest = blobs.put(b"only a blob").unwrap();
        assert!(blobs.contains(&digest));
        assert!(!starlogs.contains(&digest));
        assert!(starlogs.digests().unwrap().is_empty());
    }

    #[test]
    fn test_digests_skips_stray_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = blob_store(&temp_dir);

        let a = store.put(b"a").unwrap();
        let b = store.put(b"b").unwrap();
        fs::write(store.base().join("README"), b"not an object").unwrap();
        fs::write(store.base().join(a.prefix()).join("short"), b"x").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.digests().unwrap(), expected);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// get(put(b)) == b, and a second put yields the same digest
        #[test]
        fn prop_content_addressing(data: Vec<u8>) {
            let temp_dir = TempDir::new().unwrap();
            let store = blob_store(&temp_dir);

            let digest = store.put(&data)?;
            prop_assert_eq!(store.get(&digest)?, data.clone());
            prop_assert_eq!(store.put(&data)?, digest);
            prop_assert_eq!(store.digests()?.len(), 1);
        }
    }
}
