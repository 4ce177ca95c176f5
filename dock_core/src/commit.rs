//! Recording the stage as a new starlog on the current course.

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::spacedock::Spacedock;
use crate::starlog::{FileMap, Signature, Starlog};
use crate::status::Rename;
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeMap;

/// What a successful commit recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The new starlog.
    pub digest: Digest,
    /// The course's previous latest starlog.
    pub parent: Option<Digest>,
    /// The course that was advanced.
    pub course: String,
    /// Staged paths whose content was stored.
    pub recorded: Vec<String>,
    /// Staged paths that no longer existed.
    pub skipped: Vec<String>,
    /// Parent paths carried forward under a new name.
    pub renamed: Vec<Rename>,
}

impl Spacedock {
    /// Commit the stage with the current local time.
    pub fn commit(&self, message: &str, signature: &Signature) -> Result<CommitOutcome> {
        self.commit_at(message, signature, Local::now().naive_local())
    }

    /// Commit the stage with an explicit timestamp.
    ///
    /// The course reference moves only if it still points at the parent seen
    /// at the start, and the stage is cleared only after it has moved.
    pub fn commit_at(
        &self,
        message: &str,
        signature: &Signature,
        timestamp: NaiveDateTime,
    ) -> Result<CommitOutcome> {
        self.ensure_proper()?;

        let staged = self.stage().list();
        if staged.is_empty() {
            return Err(Error::nothing_to_commit("no files beamed"));
        }

        let course = self.courses().current()?;
        let parent = self.courses().current_latest()?;
        let parent_files = match &parent {
            Some(parent) => self.starlogs().resolve_files(parent)?,
            None => FileMap::new(),
        };

        // Listed before the first write, so lister failures leave no trace.
        let worktree = self.worktree_files()?;

        // Rename candidates are hashed up front when a parent path is gone, so
        // a file vanishing mid-commit fails before any blob is stored.
        let candidates: BTreeMap<String, Digest> =
            if parent_files.keys().any(|p| !worktree.contains(p) && !staged.contains(p)) {
                let mut hashed = BTreeMap::new();
                for candidate in &worktree {
                    if !parent_files.contains_key(candidate) && !staged.contains(candidate) {
                        hashed.insert(candidate.clone(), self.worktree_digest(candidate)?);
                    }
                }
                hashed
            } else {
                BTreeMap::new()
            };

        let mut files = FileMap::new();
        let mut recorded = Vec::new();
        let mut skipped = Vec::new();

        for path in &staged {
            let full = self.worktree_path(path);
            if !full.is_file() {
                tracing::warn!(path = %path, "staged file no longer exists, skipping");
                skipped.push(path.clone());
                continue;
            }
            let content = std::fs::read(&full)?;
            files.insert(path.clone(), self.blobs().put(&content)?);
            recorded.push(path.clone());
        }

        if recorded.is_empty() {
            self.stage().clear()?;
            return Err(Error::nothing_to_commit(
                "none of the beamed files exist anymore",
            ));
        }

        let mut renamed = Vec::new();

        for (path, digest) in &parent_files {
            if files.contains_key(path) {
                continue;
            }
            if worktree.contains(path) {
                files.insert(path.clone(), *digest);
                continue;
            }

            let matches: Vec<&String> = candidates
                .iter()
                .filter(|(_, d)| *d == digest)
                .map(|(p, _)| p)
                .collect();
            if matches.len() > 1 {
                tracing::warn!(from = %path, candidates = matches.len(), "ambiguous rename, carrying every candidate");
            }
            for to in matches {
                files.insert(to.clone(), *digest);
                renamed.push(Rename {
                    from: path.clone(),
                    to: to.clone(),
                });
            }
        }

        let starlog = Starlog::new(message, signature, timestamp, parent, files);
        let digest = self.starlogs().commit(&starlog)?;
        self.courses().advance(&course, parent.as_ref(), &digest)?;
        self.stage().clear()?;

        tracing::info!(
            %digest,
            course = %course,
            recorded = recorded.len(),
            skipped = skipped.len(),
            "recorded starlog"
        );

        Ok(CommitOutcome {
            digest,
            parent,
            course,
            recorded,
            skipped,
            renamed,
        })
    }
}
