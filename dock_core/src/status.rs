//! Working-tree classification against the stage and the latest starlog.

use crate::digest::Digest;
use crate::error::Result;
use crate::spacedock::Spacedock;
use crate::starlog::FileMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How a path differs from the last recorded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Listed in the stage.
    Staged,
    /// Tracked, present, content changed.
    Modified,
    /// Tracked, gone from the working tree.
    Deleted,
    /// Present, never recorded.
    Untracked,
}

impl FileStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Staged => "beamed",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Untracked => "untracked",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A deleted tracked path whose content reappeared under an untracked path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Result of scanning the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// The checked-out course.
    pub course: String,
    /// Its latest starlog, if any.
    pub tip: Option<Digest>,
    entries: BTreeMap<String, FileStatus>,
    renames: Vec<Rename>,
}

impl Scan {
    /// Every path that is not clean, with its status.
    pub fn entries(&self) -> &BTreeMap<String, FileStatus> {
        &self.entries
    }

    pub fn status(&self, path: &str) -> Option<FileStatus> {
        self.entries.get(path).copied()
    }

    fn with_status(&self, wanted: FileStatus) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, status)| **status == wanted)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    pub fn staged(&self) -> Vec<&str> {
        self.with_status(FileStatus::Staged)
    }

    pub fn modified(&self) -> Vec<&str> {
        self.with_status(FileStatus::Modified)
    }

    pub fn deleted(&self) -> Vec<&str> {
        self.with_status(FileStatus::Deleted)
    }

    pub fn untracked(&self) -> Vec<&str> {
        self.with_status(FileStatus::Untracked)
    }

    /// Deleted paths that look renamed. Derived only; classification is unaffected.
    pub fn renames(&self) -> &[Rename] {
        &self.renames
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether switching courses could lose work.
    ///
    /// Deleted paths do not count: the target tree decides whether they come back.
    pub fn blocks_warp(&self) -> bool {
        self.entries
            .values()
            .any(|s| matches!(s, FileStatus::Staged | FileStatus::Modified | FileStatus::Untracked))
    }
}

/// Classify paths.
///
/// `worktree` lists the files present, `staged` the stage, `tracked` the file
/// set of the latest starlog (empty if none). `digest_of` hashes a present
/// file and is only called for tracked, unstaged paths.
pub fn classify<F>(
    worktree: &BTreeSet<String>,
    staged: &[String],
    tracked: &FileMap,
    mut digest_of: F,
) -> Result<BTreeMap<String, FileStatus>>
where
    F: FnMut(&str) -> Result<Digest>,
{
    let staged: BTreeSet<&str> = staged.iter().map(String::as_str).collect();
    let mut entries = BTreeMap::new();

    for path in &staged {
        entries.insert(path.to_string(), FileStatus::Staged);
    }

    for (path, recorded) in tracked {
        if staged.contains(path.as_str()) {
            continue;
        }
        if !worktree.contains(path) {
            entries.insert(path.clone(), FileStatus::Deleted);
        } else if digest_of(path)? != *recorded {
            entries.insert(path.clone(), FileStatus::Modified);
        }
    }

    for path in worktree {
        if !staged.contains(path.as_str()) && !tracked.contains_key(path) {
            entries.insert(path.clone(), FileStatus::Untracked);
        }
    }

    Ok(entries)
}

/// Pair deleted paths with untracked paths of identical content.
///
/// A deleted path may pair with several untracked paths.
pub fn detect_renames<F>(
    entries: &BTreeMap<String, FileStatus>,
    tracked: &FileMap,
    mut digest_of: F,
) -> Result<Vec<Rename>>
where
    F: FnMut(&str) -> Result<Digest>,
{
    let deleted: Vec<(&String, &Digest)> = entries
        .iter()
        .filter(|(_, s)| **s == FileStatus::Deleted)
        .filter_map(|(path, _)| tracked.get_key_value(path))
        .collect();
    if deleted.is_empty() {
        return Ok(Vec::new());
    }

    let mut untracked: Vec<(&String, Digest)> = Vec::new();
    for (path, status) in entries {
        if *status == FileStatus::Untracked {
            untracked.push((path, digest_of(path)?));
        }
    }

    let mut renames = Vec::new();
    for (from, recorded) in deleted {
        for (to, digest) in &untracked {
            if digest == recorded {
                renames.push(Rename {
                    from: from.clone(),
                    to: (*to).clone(),
                });
            }
        }
    }
    Ok(renames)
}

impl Spacedock {
    /// Compare the working tree with the stage and the current course.
    pub fn scan(&self) -> Result<Scan> {
        self.ensure_proper()?;

        let course = self.courses().current()?;
        let tip = self.courses().current_latest()?;
        let tracked = match &tip {
            Some(tip) => self.starlogs().resolve_files(tip)?,
            None => FileMap::new(),
        };

        let worktree = self.worktree_files()?;
        let staged = self.stage().list();

        let entries = classify(&worktree, &staged, &tracked, |p| self.worktree_digest(p))?;
        let renames = detect_renames(&entries, &tracked, |p| self.worktree_digest(p))?;

        Ok(Scan {
            course,
            tip,
            entries,
            renames,
        })
    }
}
