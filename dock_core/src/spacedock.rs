//! The spacedock: on-disk layout, validation and the repository handle.

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::objects::{Namespace, ObjectStore};
use crate::refs::CourseManager;
use crate::stage::Stage;
use crate::starlog::StarlogStore;
use crate::worktree::{DockIgnoreLister, FileLister};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the metadata directory at the repository root.
pub const DOCK_DIR: &str = ".dock";

/// Course created by `init` and checked out by default.
pub const DEFAULT_COURSE: &str = "core";

/// Directory holding course reference files, relative to `.dock`.
pub const HELM_DIR: &str = "links/helm";

/// Current-course pointer file, relative to `.dock`.
pub const HELM_FILE: &str = "HELM";

/// Stage file, relative to `.dock`.
pub const STAGE_FILE: &str = "stage";

/// CLI configuration file, relative to `.dock`.
pub const CONFIG_FILE: &str = "config.toml";

/// Whether a layout item is a directory or a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Dir,
    File,
}

/// One required entry of the spacedock layout.
#[derive(Debug, Clone, Copy)]
pub struct LayoutItem {
    /// Short stable name used when reporting missing items.
    pub key: &'static str,
    /// Path relative to the repository root.
    pub path: &'static str,
    pub kind: ItemKind,
}

/// Every item a proper spacedock must contain, parents before children.
pub const LAYOUT: &[LayoutItem] = &[
    LayoutItem {
        key: "dock",
        path: ".dock",
        kind: ItemKind::Dir,
    },
    LayoutItem {
        key: "objects",
        path: ".dock/objects",
        kind: ItemKind::Dir,
    },
    LayoutItem {
        key: "starlogs",
        path: ".dock/starlogs",
        kind: ItemKind::Dir,
    },
    LayoutItem {
        key: "links",
        path: ".dock/links",
        kind: ItemKind::Dir,
    },
    LayoutItem {
        key: "helm_d",
        path: ".dock/links/helm",
        kind: ItemKind::Dir,
    },
    LayoutItem {
        key: "stage",
        path: ".dock/stage",
        kind: ItemKind::File,
    },
    LayoutItem {
        key: "helm_f",
        path: ".dock/HELM",
        kind: ItemKind::File,
    },
    LayoutItem {
        key: "core",
        path: ".dock/links/helm/core",
        kind: ItemKind::File,
    },
    LayoutItem {
        key: "config",
        path: ".dock/config.toml",
        kind: ItemKind::File,
    },
];

/// What `Spacedock::init` had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// No spacedock existed; a fresh one was created.
    Created,
    /// The spacedock was already complete.
    Reinitialized,
    /// The listed items were missing and have been recreated.
    Repaired(Vec<&'static str>),
}

/// Handle to a repository and its `.dock` container.
///
/// Every operation goes through a handle, so several repositories can be
/// used side by side in one process.
#[derive(Debug)]
pub struct Spacedock {
    root: PathBuf,
    dock_dir: PathBuf,
    blobs: ObjectStore,
    starlogs: StarlogStore,
    lister: Box<dyn FileLister>,
}

impl Spacedock {
    /// Create a spacedock at `root`, or recreate whatever items are missing.
    ///
    /// Items that exist with the wrong kind (a directory where a file is
    /// expected, or the reverse) are not touched and fail the call.
    pub fn init<P: AsRef<Path>>(root: P) -> Result<(Self, InitOutcome)> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let fresh = !root.join(DOCK_DIR).exists();
        let mut repaired = Vec::new();

        for item in LAYOUT {
            let full_path = root.join(item.path);
            if full_path.exists() {
                if !kind_matches(&full_path, item.kind) {
                    return Err(Error::corrupt_repository(
                        &full_path,
                        format!("expected a {:?}, found something else", item.kind),
                    ));
                }
                continue;
            }

            match item.kind {
                ItemKind::Dir => fs::create_dir_all(&full_path)?,
                ItemKind::File => fs::write(&full_path, initial_content(item.key))?,
            }
            repaired.push(item.key);
        }

        let outcome = if fresh {
            InitOutcome::Created
        } else if repaired.is_empty() {
            InitOutcome::Reinitialized
        } else {
            InitOutcome::Repaired(repaired)
        };
        tracing::info!(root = %root.display(), ?outcome, "initialized spacedock");

        Ok((Self::handle(root), outcome))
    }

    /// Open an existing spacedock, validating its layout.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dock = Self::handle(root);
        dock.ensure_proper()?;
        Ok(dock)
    }

    fn handle(root: PathBuf) -> Self {
        let dock_dir = root.join(DOCK_DIR);
        Self {
            blobs: ObjectStore::new(&dock_dir, Namespace::Blobs),
            starlogs: StarlogStore::new(&dock_dir),
            lister: Box::new(DockIgnoreLister::new()),
            root,
            dock_dir,
        }
    }

    /// Replace the working-tree file lister.
    pub fn with_lister(mut self, lister: impl FileLister + 'static) -> Self {
        self.lister = Box::new(lister);
        self
    }

    /// Walk upwards from `start` to the first directory containing `.dock`.
    pub fn discover<P: AsRef<Path>>(start: P) -> Option<PathBuf> {
        let mut current = start.as_ref().to_path_buf();
        loop {
            if current.join(DOCK_DIR).is_dir() {
                return Some(current);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Keys of the layout items that are absent or of the wrong kind.
    pub fn missing_items<P: AsRef<Path>>(root: P) -> Vec<&'static str> {
        let root = root.as_ref();
        LAYOUT
            .iter()
            .filter(|item| !kind_matches(&root.join(item.path), item.kind))
            .map(|item| item.key)
            .collect()
    }

    /// Fail with CorruptRepository unless every layout item is in place.
    pub fn ensure_proper(&self) -> Result<()> {
        let missing = Self::missing_items(&self.root);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::corrupt_repository(
                &self.dock_dir,
                format!("missing or malformed: {}", missing.join(", ")),
            ))
        }
    }

    /// Get the repository root (the working tree).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the `.dock` directory.
    pub fn dock_dir(&self) -> &Path {
        &self.dock_dir
    }

    /// Blob storage.
    pub fn blobs(&self) -> &ObjectStore {
        &self.blobs
    }

    /// Starlog storage.
    pub fn starlogs(&self) -> &StarlogStore {
        &self.starlogs
    }

    /// Course references and the current-course pointer.
    pub fn courses(&self) -> CourseManager<'_> {
        CourseManager::new(self)
    }

    /// The staging area.
    pub fn stage(&self) -> Stage<'_> {
        Stage::new(self)
    }

    pub fn lister(&self) -> &dyn FileLister {
        self.lister.as_ref()
    }

    /// Absolute path of a working-tree-relative path.
    pub fn worktree_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Digest the current content of a working-tree file.
    pub fn worktree_digest(&self, rel: &str) -> Result<Digest> {
        Digest::of_file(&self.worktree_path(rel))
    }

    /// All working-tree files as reported by the lister.
    ///
    /// Listing happens before any operation mutates state, so failures are
    /// reported as NotFound or InvalidOperation rather than as corruption.
    pub fn worktree_files(&self) -> Result<BTreeSet<String>> {
        self.lister.list_files(&self.root).map_err(|err| match err {
            Error::Io { source } if source.kind() == std::io::ErrorKind::NotFound => {
                Error::not_found(format!("working tree entry: {}", source))
            }
            Error::Io { source } => {
                Error::invalid_operation(format!("cannot list working tree: {}", source))
            }
            other => other,
        })
    }
}

/// Replace `path` with `bytes` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::corrupt_repository(path, "path has no parent directory"))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    temp_file.persist(path)?;
    Ok(())
}

fn kind_matches(path: &Path, kind: ItemKind) -> bool {
    match kind {
        ItemKind::Dir => path.is_dir(),
        ItemKind::File => path.is_file(),
    }
}

fn initial_content(key: &str) -> String {
    match key {
        "stage" => "[]".to_string(),
        "helm_f" => format!("link: {}/{}\n", HELM_DIR, DEFAULT_COURSE),
        "config" => "# config.toml\n".to_string(),
        _ => String::new(),
    }
}
