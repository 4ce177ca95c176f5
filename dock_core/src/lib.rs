//! # Dock Core
//!
//! A small version-control engine built on SHA3-256 content addressing.
//!
//! A repository (a *spacedock*) keeps its metadata in `.dock/` at the root of
//! a working tree. File contents are stored once per digest, commits
//! (*starlogs*) record the full tracked-file set of a snapshot, and
//! *courses* are named lines of starlogs, one of which is checked out.
//!
//! ## Features
//!
//! - Sharded content-addressed storage for blobs and starlogs
//! - Canonical JSON starlogs with stable digests
//! - Courses with a HELM pointer to the checked-out course
//! - A staging area and working-tree classification
//! - Safe course switching that refuses to lose uncommitted work
//!
//! ## Example
//!
//! ```no_run
//! use dock_core::{Signature, Spacedock};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create (or repair) a spacedock
//! let (dock, _outcome) = Spacedock::init("./ship")?;
//!
//! // Stage and record a file
//! dock.beam(["notes.txt"])?;
//! let outcome = dock.commit("first entry", &Signature::new("Data", "data@example.com"))?;
//! println!("recorded {}", outcome.digest);
//!
//! // Branch off and switch to the new course
//! dock.courses().fork("away-mission")?;
//! dock.warp("away-mission")?;
//! # Ok(())
//! # }
//! ```

mod commit;
mod digest;
mod error;
mod objects;
mod refs;
mod spacedock;
mod stage;
mod starlog;
mod status;
mod warp;
mod worktree;

pub use commit::CommitOutcome;
pub use digest::{DIGEST_HEX_LEN, DIGEST_SIZE, Digest, SHARD_WIDTH};
pub use error::{Error, Result};
pub use objects::{Namespace, ObjectStore};
pub use refs::CourseManager;
pub use spacedock::{
    CONFIG_FILE, DEFAULT_COURSE, DOCK_DIR, InitOutcome, ItemKind, LAYOUT, LayoutItem, Spacedock,
};
pub use stage::{BeamReport, Stage};
pub use starlog::{FileMap, Signature, Starlog, StarlogStore, TIMESTAMP_FORMAT};
pub use status::{FileStatus, Rename, Scan, classify, detect_renames};
pub use warp::WarpReport;
pub use worktree::{DOCKIGNORE_FILE, DockIgnoreLister, FileLister, normalize};
