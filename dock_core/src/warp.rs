//! Switching the working tree to another course.

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::spacedock::Spacedock;
use crate::starlog::FileMap;
use std::fs;
use std::path::Path;

/// What a warp changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarpReport {
    pub from: String,
    pub to: String,
    /// Target files written (created or overwritten).
    pub written: Vec<String>,
    /// Files of the previous course removed because the target lacks them.
    pub removed: Vec<String>,
}

impl Spacedock {
    /// Check out `target`, replacing the tracked files of the current course
    /// with the target's tree.
    ///
    /// Refused with UnsafeWarp, before any write, while anything is staged,
    /// modified or untracked. HELM moves only once the tree is in place.
    pub fn warp(&self, target: &str) -> Result<WarpReport> {
        self.ensure_proper()?;

        let courses = self.courses();
        if !courses.exists(target) {
            return Err(Error::unknown_course(target));
        }

        let scan = self.scan()?;
        if scan.blocks_warp() {
            let owned = |paths: Vec<&str>| -> Vec<String> {
                paths.into_iter().map(String::from).collect()
            };
            return Err(Error::UnsafeWarp {
                staged: owned(scan.staged()),
                modified: owned(scan.modified()),
                untracked: owned(scan.untracked()),
            });
        }

        let current_files = match &scan.tip {
            Some(tip) => self.starlogs().resolve_files(tip)?,
            None => FileMap::new(),
        };
        let target_files = match courses.latest(target)? {
            Some(tip) => self.starlogs().resolve_files(&tip)?,
            None => FileMap::new(),
        };

        for (path, digest) in &target_files {
            if !self.blobs().contains(digest) {
                return Err(Error::corrupt_repository(
                    self.blobs().object_path(digest),
                    format!("missing blob for {}", path),
                ));
            }
        }

        let (written, removed) = self
            .materialize(&current_files, &target_files)
            .map_err(|err| match err {
                Error::CorruptRepository { .. } => err,
                other => Error::corrupt_repository(
                    self.root(),
                    format!("warp to {} interrupted: {}", target, other),
                ),
            })?;

        courses.set_current(target)?;
        tracing::info!(
            from = %scan.course,
            to = target,
            written = written.len(),
            removed = removed.len(),
            "warped"
        );

        Ok(WarpReport {
            from: scan.course,
            to: target.to_string(),
            written,
            removed,
        })
    }

    fn materialize(
        &self,
        current: &FileMap,
        target: &FileMap,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut written = Vec::new();
        let mut removed = Vec::new();

        // Removal runs first so a path can turn from a directory into a file
        // (or back) between the two trees.
        for path in current.keys() {
            if target.contains_key(path) {
                continue;
            }
            let full = self.worktree_path(path);
            if full.is_file() {
                fs::remove_file(&full)?;
                removed.push(path.clone());
            }
            self.prune_empty_dirs(&full)?;
        }

        for (path, digest) in target {
            let full = self.worktree_path(path);
            if full.is_file() && current.get(path) == Some(digest) {
                continue;
            }
            self.write_blob(&full, digest)?;
            written.push(path.clone());
        }

        Ok((written, removed))
    }

    fn write_blob(&self, full: &Path, digest: &Digest) -> Result<()> {
        let content = self.blobs().get(digest)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    /// Remove directories above `removed` that are now empty, stopping at the
    /// repository root.
    fn prune_empty_dirs(&self, removed: &Path) -> Result<()> {
        let mut dir = removed.parent();
        while let Some(current) = dir {
            if current == self.root() || !current.starts_with(self.root()) {
                break;
            }
            if current == self.dock_dir() || !current.is_dir() {
                break;
            }
            if fs::read_dir(current)?.next().is_some() {
                break;
            }
            fs::remove_dir(current)?;
            dir = current.parent();
        }
        Ok(())
    }
}
