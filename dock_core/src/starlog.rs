//! Starlog (commit) records and their canonical encoding.
//!
//! A starlog is stored as compact UTF-8 JSON with every object's keys in
//! lexicographic order:
//!
//! ```text
//! {"author":"..","email":"..","files":{"a.txt":"<digest>"},"message":"..","parent":null,"timestamp":".."}
//! ```
//!
//! Its identity is the SHA3-256 digest of exactly those bytes, so two records
//! with the same field values always share a digest.

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::objects::{Namespace, ObjectStore};
use crate::worktree::normalize;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Timestamp layout: ISO-8601 local wall clock with microseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// The complete tracked-file set of a starlog: path -> blob digest.
pub type FileMap = BTreeMap<String, Digest>;

/// Who recorded a starlog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A commit record.
///
/// Fields are declared in lexicographic order; serde emits them in
/// declaration order, which keeps the encoding canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Starlog {
    pub author: String,
    pub email: String,
    #[serde(default)]
    pub files: FileMap,
    pub message: String,
    pub parent: Option<Digest>,
    pub timestamp: String,
}

impl Starlog {
    /// Build a record stamped with `timestamp`.
    pub fn new(
        message: impl Into<String>,
        signature: &Signature,
        timestamp: NaiveDateTime,
        parent: Option<Digest>,
        files: FileMap,
    ) -> Self {
        Self {
            author: signature.name.clone(),
            email: signature.email.clone(),
            files,
            message: message.into(),
            parent,
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Canonical serialization, used both for hashing and for storage.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse stored bytes back into a record.
    ///
    /// Every file path must already be in normalized working-tree form.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let starlog: Self =
            serde_json::from_slice(bytes).map_err(|e| Error::corrupt_starlog(e.to_string()))?;
        starlog.check_paths()?;
        Ok(starlog)
    }

    /// Reject paths that are empty, absolute, escape the root or are not
    /// in the `/`-separated form `normalize` produces.
    pub fn check_paths(&self) -> Result<()> {
        for path in self.files.keys() {
            match normalize(path) {
                Ok(normalized) if !normalized.is_empty() && normalized == *path => {}
                _ => {
                    return Err(Error::corrupt_starlog(format!(
                        "file path outside the working tree: {:?}",
                        path
                    )));
                }
            }
        }
        Ok(())
    }

    /// The digest this record is (or would be) stored under.
    pub fn digest(&self) -> Result<Digest> {
        Ok(Digest::of_bytes(&self.encode()?))
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Starlog persistence on top of the starlog namespace.
#[derive(Debug, Clone)]
pub struct StarlogStore {
    objects: ObjectStore,
}

impl StarlogStore {
    /// Open the starlog namespace of the spacedock at `dock_dir`.
    pub fn new(dock_dir: &Path) -> Self {
        Self {
            objects: ObjectStore::new(dock_dir, Namespace::Starlogs),
        }
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Encode and store a record, returning its digest.
    ///
    /// The record's parent must already be stored.
    pub fn commit(&self, starlog: &Starlog) -> Result<Digest> {
        starlog.check_paths()?;
        if let Some(parent) = &starlog.parent
            && !self.objects.contains(parent)
        {
            return Err(Error::not_found(format!("parent starlog {}", parent)));
        }

        let digest = self.objects.put(&starlog.encode()?)?;
        tracing::debug!(%digest, parent = ?starlog.parent, files = starlog.files.len(), "stored starlog");
        Ok(digest)
    }

    /// Load a stored record.
    pub fn load(&self, digest: &Digest) -> Result<Starlog> {
        let bytes = self.objects.get(digest)?;
        Starlog::decode(&bytes)
    }

    /// Whether a starlog with this digest is stored.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.objects.contains(digest)
    }

    /// Load only the file set of a stored record.
    pub fn resolve_files(&self, digest: &Digest) -> Result<FileMap> {
        Ok(self.load(digest)?.files)
    }

    /// Walk parent links from `tip`, newest first.
    pub fn history(&self, tip: &Digest) -> Result<Vec<(Digest, Starlog)>> {
        let mut entries = Vec::new();
        let mut next = Some(*tip);

        while let Some(digest) = next {
            let starlog = self.load(&digest)?;
            next = starlog.parent;
            entries.push((digest, starlog));
        }

        Ok(entries)
    }

    /// Every stored starlog, newest timestamp first.
    pub fn list_all(&self) -> Result<Vec<(Digest, Starlog)>> {
        let mut entries = Vec::new();
        for digest in self.objects.digests()? {
            let starlog = self.load(&digest)?;
            entries.push((digest, starlog));
        }

        entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then(a.0.cmp(&b.0)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_micro_opt(hour, 15, 9, 265358)
            .unwrap()
    }

    fn signature() -> Signature {
        Signature::new("Jean-Luc", "picard@enterprise.test")
    }

    #[test]
    fn test_encode_is_sorted_and_compact() {
        let mut files = FileMap::new();
        files.insert("b.txt".to_string(), Digest::of_bytes(b"b"));
        files.insert("a.txt".to_string(), Digest::of_bytes(b"a"));
        let starlog = Starlog::new("first", &signature(), at(9), None, files);

        let encoded = String::from_utf8(starlog.encode().unwrap()).unwrap();
        let expected = format!(
            "{{\"author\":\"Jean-Luc\",\"email\":\"picard@enterprise.test\",\"files\":{{\"a.txt\":\"{}\",\"b.txt\":\"{}\"}},\"message\":\"first\",\"parent\":null,\"timestamp\":\"2025-03-14T09:15:09.265358\"}}",
            Digest::of_bytes(b"a"),
            Digest::of_bytes(b"b"),
        );
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_decode_roundtrip() {
        let mut files = FileMap::new();
        files.insert("src/main.rs".to_string(), Digest::of_bytes(b"fn main() {}"));
        let parent = Digest::of_bytes(b"parent");
        let starlog = Starlog::new("second", &signature(), at(10), Some(parent), files);

        let decoded = Starlog::decode(&starlog.encode().unwrap()).unwrap();
        assert_eq!(decoded, starlog);
    }

    #[test]
    fn test_decode_accepts_spaced_json_without_files() {
        let json = br#"{"author": "a", "email": "e", "message": "m", "parent": null, "timestamp": "t"}"#;
        let starlog = Starlog::decode(json).unwrap();
        assert!(starlog.files.is_empty());
        assert_eq!(starlog.parent, None);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(matches!(
            Starlog::decode(b"[1, 2, 3]"),
            Err(Error::CorruptStarlog { .. })
        ));
        assert!(matches!(
            Starlog::decode(br#"{"author": "a"}"#),
            Err(Error::CorruptStarlog { .. })
        ));
        assert!(matches!(
            Starlog::decode(b"\xff\xfe"),
            Err(Error::CorruptStarlog { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_paths_outside_the_tree() {
        let digest = Digest::of_bytes(b"x");
        for path in ["../escape.txt", "/etc/passwd", "", "a//b", "./a", "a\\b", "src/../x"] {
            let json = format!(
                r#"{{"author":"a","email":"e","files":{{{:?}:"{}"}},"message":"m","parent":null,"timestamp":"t"}}"#,
                path, digest
            );
            assert!(
                matches!(Starlog::decode(json.as_bytes()), Err(Error::CorruptStarlog { .. })),
                "{path:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_commit_rejects_paths_outside_the_tree() {
        let temp_dir = TempDir::new().unwrap();
        let store = StarlogStore::new(temp_dir.path());

        let mut files = FileMap::new();
        files.insert("../escape.txt".to_string(), Digest::of_bytes(b"x"));
        let starlog = Starlog::new("bad", &signature(), at(9), None, files);

        assert!(matches!(store.commit(&starlog), Err(Error::CorruptStarlog { .. })));
        assert!(store.objects().digests().unwrap().is_empty());
    }

    #[test]
    fn test_commit_and_resolve_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = StarlogStore::new(temp_dir.path());

        let mut files = FileMap::new();
        files.insert("a.txt".to_string(), Digest::of_bytes(b"hello"));
        let starlog = Starlog::new("first", &signature(), at(9), None, files.clone());

        let digest = store.commit(&starlog).unwrap();
        assert_eq!(digest, starlog.digest().unwrap());
        assert_eq!(store.resolve_files(&digest).unwrap(), files);
        assert!(
            temp_dir
                .path()
                .join("starlogs")
                .join(digest.prefix())
                .join(digest.suffix())
                .is_file()
        );
    }

    #[test]
    fn test_commit_rejects_unknown_parent() {
        let temp_dir = TempDir::new().unwrap();
        let store = StarlogStore::new(temp_dir.path());

        let orphan = Starlog::new(
            "orphan",
            &signature(),
            at(9),
            Some(Digest::of_bytes(b"nowhere")),
            FileMap::new(),
        );
        assert!(matches!(store.commit(&orphan), Err(Error::NotFound { .. })));
        assert!(store.objects().digests().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_files_unknown_digest() {
        let temp_dir = TempDir::new().unwrap();
        let store = StarlogStore::new(temp_dir.path());

        let result = store.resolve_files(&Digest::of_bytes(b"unknown"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_history_and_list_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = StarlogStore::new(temp_dir.path());

        let first = store
            .commit(&Starlog::new("one", &signature(), at(8), None, FileMap::new()))
            .unwrap();
        let second = store
            .commit(&Starlog::new("two", &signature(), at(9), Some(first), FileMap::new()))
            .unwrap();
        let third = store
            .commit(&Starlog::new("three", &signature(), at(10), Some(second), FileMap::new()))
            .unwrap();

        let history: Vec<_> = store.history(&third).unwrap().into_iter().map(|e| e.0).collect();
        assert_eq!(history, vec![third, second, first]);

        let all: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|e| e.1.message)
            .collect();
        assert_eq!(all, vec!["three", "two", "one"]);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Equal records encode identically regardless of map insertion order
        #[test]
        fn prop_encoding_ignores_insertion_order(
            entries in prop::collection::btree_map("[a-z]{1,8}(/[a-z]{1,8})?", any::<Vec<u8>>(), 0..12)
        ) {
            let pairs: Vec<(String, Digest)> = entries
                .iter()
                .map(|(p, c)| (p.clone(), Digest::of_bytes(c)))
                .collect();

            let mut forward = FileMap::new();
            for (path, digest) in pairs.iter() {
                forward.insert(path.clone(), *digest);
            }
            let mut backward = FileMap::new();
            for (path, digest) in pairs.iter().rev() {
                backward.insert(path.clone(), *digest);
            }

            let a = Starlog::new("msg", &signature(), at(12), None, forward);
            let b = Starlog::new("msg", &signature(), at(12), None, backward);
            prop_assert_eq!(a.encode()?, b.encode()?);
            prop_assert_eq!(a.digest()?, b.digest()?);
        }
    }
}
