//! Working-tree listing and path handling.

use crate::error::{Error, Result};
use crate::spacedock::DOCK_DIR;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::{Component, Path};

/// Per-directory ignore file honored by [`DockIgnoreLister`].
pub const DOCKIGNORE_FILE: &str = ".dockignore";

/// Directory names that are never part of the working tree.
const ALWAYS_SKIPPED: &[&str] = &[DOCK_DIR, ".git"];

/// Answers "which files exist" for a working tree.
pub trait FileLister: Debug {
    /// Every regular file under `root`, as `/`-separated paths relative to `root`.
    fn list_files(&self, root: &Path) -> Result<BTreeSet<String>>;

    /// Whether `rel` is excluded from the working tree.
    fn is_ignored(&self, _root: &Path, _rel: &str) -> bool {
        false
    }
}

/// Default lister: walks the tree with `.dockignore` files applied, skipping
/// `.dock` and `.git`.
#[derive(Debug, Clone, Default)]
pub struct DockIgnoreLister;

impl DockIgnoreLister {
    pub fn new() -> Self {
        Self
    }

    fn root_matcher(root: &Path) -> Option<Gitignore> {
        let path = root.join(DOCKIGNORE_FILE);
        if !path.is_file() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&path) {
            tracing::warn!(path = %path.display(), %err, "failed to parse .dockignore");
        }
        builder.build().ok()
    }
}

impl FileLister for DockIgnoreLister {
    fn list_files(&self, root: &Path) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();

        let walker = ignore::WalkBuilder::new(root)
            .hidden(false) // Include hidden files
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .add_custom_ignore_filename(DOCKIGNORE_FILE)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !ALWAYS_SKIPPED.contains(&name))
            })
            .build();

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let rel = entry.path().strip_prefix(root).map_err(|_| {
                Error::invalid_operation(format!(
                    "walked outside the working tree: {}",
                    entry.path().display()
                ))
            })?;
            files.insert(to_slash(rel)?);
        }

        Ok(files)
    }

    fn is_ignored(&self, root: &Path, rel: &str) -> bool {
        if rel
            .split('/')
            .any(|component| ALWAYS_SKIPPED.contains(&component))
        {
            return true;
        }

        match Self::root_matcher(root) {
            Some(matcher) => {
                let is_dir = root.join(rel).is_dir();
                matcher
                    .matched_path_or_any_parents(rel, is_dir)
                    .is_ignore()
            }
            None => false,
        }
    }
}

/// Turn a relative path into the `/`-separated form used in stages and starlogs.
pub fn to_slash(rel: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                Error::invalid_operation(format!("non UTF-8 path: {}", rel.display()))
            })?),
            Component::CurDir => {}
            _ => {
                return Err(Error::invalid_operation(format!(
                    "path must stay inside the working tree: {}",
                    rel.display()
                )));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Normalize a user-supplied working-tree path: `./a\b` becomes `a/b`.
///
/// The root itself normalizes to the empty string. Absolute paths and
/// paths escaping the root via `..` are rejected.
pub fn normalize(path: &str) -> Result<String> {
    to_slash(Path::new(&path.replace('\\', "/")))
}
