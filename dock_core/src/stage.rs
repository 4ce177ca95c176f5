//! The staging area: an ordered list of paths in `.dock/stage`.

use crate::error::Result;
use crate::spacedock::{STAGE_FILE, Spacedock, write_atomic};
use crate::worktree::normalize;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

/// Paths selected for the next starlog, stored as a JSON array of strings.
///
/// Updates rewrite the whole file; concurrent writers are not supported.
pub struct Stage<'a> {
    dock: &'a Spacedock,
}

impl<'a> Stage<'a> {
    pub(crate) fn new(dock: &'a Spacedock) -> Self {
        Self { dock }
    }

    fn path(&self) -> PathBuf {
        self.dock.dock_dir().join(STAGE_FILE)
    }

    /// Staged paths in first-seen order.
    ///
    /// An absent, unreadable or malformed stage file reads as empty.
    pub fn list(&self) -> Vec<String> {
        let path = self.path();
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), %e, "cannot read stage, treating it as empty");
                }
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<String>>(&content) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(path = %path.display(), %e, "malformed stage, treating it as empty");
                Vec::new()
            }
        }
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Append the paths not staged yet, returning the ones that were added.
    pub fn add<I, S>(&self, paths: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut staged = self.list();
        let mut added = Vec::new();

        for path in paths {
            let path = path.into();
            if !staged.contains(&path) {
                staged.push(path.clone());
                added.push(path);
            }
        }

        if !added.is_empty() {
            self.write(&staged)?;
        }
        Ok(added)
    }

    /// Reset the stage to `[]`.
    pub fn clear(&self) -> Result<()> {
        self.write(&[])
    }

    fn write(&self, paths: &[String]) -> Result<()> {
        write_atomic(&self.path(), &serde_json::to_vec(paths)?)
    }
}

/// What `beam` did with each requested path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeamReport {
    /// Newly staged paths.
    pub beamed: Vec<String>,
    /// Tracked paths whose content matches the latest starlog.
    pub unchanged: Vec<String>,
    /// Paths that do not exist in the working tree.
    pub missing: Vec<String>,
    /// Paths excluded by `.dockignore` or always skipped.
    pub ignored: Vec<String>,
}

impl BeamReport {
    /// Whether anything was staged.
    pub fn is_empty(&self) -> bool {
        self.beamed.is_empty()
    }
}

impl Spacedock {
    /// Stage working-tree paths for the next starlog.
    ///
    /// Directories expand to the files below them. Ignored paths, paths
    /// missing from disk and tracked files with unchanged content are left
    /// out and reported.
    pub fn beam<I, S>(&self, paths: I) -> Result<BeamReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_proper()?;

        let tracked = match self.courses().current_latest()? {
            Some(tip) => self.starlogs().resolve_files(&tip)?,
            None => Default::default(),
        };

        let mut report = BeamReport::default();
        let mut listing: Option<BTreeSet<String>> = None;
        let mut candidates = Vec::new();

        for raw in paths {
            let rel = normalize(raw.as_ref())?;
            let full = self.worktree_path(&rel);

            if !rel.is_empty() && self.lister().is_ignored(self.root(), &rel) {
                report.ignored.push(rel);
                continue;
            }

            if full.is_dir() {
                if listing.is_none() {
                    listing = Some(self.worktree_files()?);
                }
                if let Some(files) = &listing {
                    candidates.extend(files.iter().filter(|f| is_under(f, &rel)).cloned());
                }
            } else if full.is_file() {
                candidates.push(rel);
            } else {
                report.missing.push(rel);
            }
        }

        let mut fresh = Vec::new();
        for rel in candidates {
            if let Some(recorded) = tracked.get(&rel)
                && self.worktree_digest(&rel)? == *recorded
            {
                report.unchanged.push(rel);
                continue;
            }
            if !fresh.contains(&rel) {
                fresh.push(rel);
            }
        }

        report.beamed = self.stage().add(fresh)?;

        for path in &report.missing {
            tracing::warn!(path = %path, "skipped beaming missing path");
        }
        tracing::debug!(
            beamed = report.beamed.len(),
            unchanged = report.unchanged.len(),
            ignored = report.ignored.len(),
            "beamed paths"
        );
        Ok(report)
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    dir.is_empty()
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
