//! Course references and the HELM current-course pointer.
//!
//! A course is a file under `.dock/links/helm/` that is either empty (no
//! starlogs yet) or holds the hex digest of the course's latest starlog.
//! `.dock/HELM` names the checked-out course as `link: links/helm/<name>`.

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::spacedock::{DEFAULT_COURSE, HELM_DIR, HELM_FILE, Spacedock, write_atomic};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Manages courses of a spacedock.
pub struct CourseManager<'a> {
    dock: &'a Spacedock,
}

impl<'a> CourseManager<'a> {
    /// Create a new CourseManager for the given spacedock.
    pub(crate) fn new(dock: &'a Spacedock) -> Self {
        Self { dock }
    }

    fn helm_dir(&self) -> PathBuf {
        self.dock.dock_dir().join(HELM_DIR)
    }

    fn helm_file(&self) -> PathBuf {
        self.dock.dock_dir().join(HELM_FILE)
    }

    /// Get the path to a course reference file.
    fn course_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.helm_dir().join(name))
    }

    /// Whether a course with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.course_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Create a course with no starlogs.
    pub fn create(&self, name: &str) -> Result<()> {
        self.create_at(name, None)
    }

    /// Create a course starting at the current course's latest starlog.
    pub fn fork(&self, name: &str) -> Result<Option<Digest>> {
        let tip = self.current_latest()?;
        self.create_at(name, tip.as_ref())?;
        Ok(tip)
    }

    /// Create a course pointing at `tip` (or empty).
    ///
    /// Fails with AlreadyExists if the name is taken; creation is exclusive.
    pub fn create_at(&self, name: &str, tip: Option<&Digest>) -> Result<()> {
        let path = self.course_path(name)?;

        if let Some(tip) = tip
            && !self.dock.starlogs().contains(tip)
        {
            return Err(Error::not_found(format!("starlog {}", tip)));
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::already_exists(name));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(tip) = tip {
            file.write_all(tip.to_hex().as_bytes())?;
        }

        tracing::info!(course = name, tip = ?tip, "created course");
        Ok(())
    }

    /// The latest starlog of a course, or None if it has no starlogs yet.
    pub fn latest(&self, name: &str) -> Result<Option<Digest>> {
        let path = self.course_path(name)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!("course {}", name)));
            }
            Err(e) => return Err(e.into()),
        };

        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        Digest::from_hex(content)
            .map(Some)
            .map_err(|e| Error::corrupt_repository(&path, e.to_string()))
    }

    /// Point a course at `digest`, which must be a stored starlog.
    pub fn set_latest(&self, name: &str, digest: &Digest) -> Result<()> {
        let path = self.course_path(name)?;
        if !path.is_file() {
            return Err(Error::not_found(format!("course {}", name)));
        }
        if !self.dock.starlogs().contains(digest) {
            return Err(Error::not_found(format!("starlog {}", digest)));
        }

        write_atomic(&path, digest.to_hex().as_bytes())?;
        tracing::debug!(course = name, %digest, "moved course");
        Ok(())
    }

    /// Move a course from `expected` to `new`.
    ///
    /// Fails with InvalidOperation, leaving the course alone, if the course no
    /// longer points at `expected`.
    pub fn advance(&self, name: &str, expected: Option<&Digest>, new: &Digest) -> Result<()> {
        let actual = self.latest(name)?;
        if actual.as_ref() != expected {
            return Err(Error::invalid_operation(format!(
                "course {} moved from {} to {} during the operation",
                name,
                describe(expected),
                describe(actual.as_ref())
            )));
        }
        self.set_latest(name, new)
    }

    /// Name of the checked-out course.
    pub fn current(&self) -> Result<String> {
        let helm = self.helm_file();
        let content = fs::read_to_string(&helm)
            .map_err(|e| Error::corrupt_repository(&helm, e.to_string()))?;

        let name = content
            .trim()
            .strip_prefix("link:")
            .map(str::trim)
            .and_then(|link| link.strip_prefix(HELM_DIR))
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                Error::corrupt_repository(&helm, format!("malformed pointer: {:?}", content.trim()))
            })?;

        validate_name(name).map_err(|e| Error::corrupt_repository(&helm, e.to_string()))?;
        Ok(name.to_string())
    }

    /// Check out `name` by rewriting the HELM pointer.
    pub fn set_current(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(Error::unknown_course(name));
        }
        write_atomic(
            &self.helm_file(),
            format!("link: {}/{}", HELM_DIR, name).as_bytes(),
        )?;
        tracing::debug!(course = name, "updated helm");
        Ok(())
    }

    /// The checked-out course's latest starlog.
    ///
    /// A HELM pointing at a missing course is corruption.
    pub fn current_latest(&self) -> Result<Option<Digest>> {
        let current = self.current()?;
        self.latest(&current).map_err(|err| match err {
            Error::NotFound { .. } => Error::corrupt_repository(
                self.helm_file(),
                format!("points at missing course {}", current),
            ),
            other => other,
        })
    }

    /// Delete a course reference.
    ///
    /// The checked-out course and the default course cannot be deleted.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.course_path(name)?;

        if self.current()? == name {
            return Err(Error::invalid_operation(format!(
                "cannot delete the checked-out course {}",
                name
            )));
        }
        if name == DEFAULT_COURSE {
            return Err(Error::invalid_operation(format!(
                "cannot delete the default course {}",
                name
            )));
        }
        if !path.is_file() {
            return Err(Error::not_found(format!("course {}", name)));
        }

        fs::remove_file(&path)?;
        tracing::info!(course = name, "deleted course");
        Ok(())
    }

    /// All course names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(self.helm_dir())? {
            let path = entry?.path();
            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
                && validate_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Course names are single path components.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_course_name("Course name cannot be empty"));
    }

    if name.contains("..") || name.contains('/') || name.contains('\\') || name.starts_with('.')
    {
        return Err(Error::invalid_course_name(format!(
            "{} (must not contain .., path separators or start with .)",
            name
        )));
    }

    Ok(())
}

fn describe(digest: Option<&Digest>) -> String {
    digest.map_or_else(|| "<empty>".to_string(), |d| d.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::starlog::{FileMap, Signature, Starlog};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn init() -> (TempDir, Spacedock) {
        let temp_dir = TempDir::new().unwrap();
        let (dock, _) = Spacedock::init(temp_dir.path()).unwrap();
        (temp_dir, dock)
    }

    fn store_starlog(dock: &Spacedock, message: &str, parent: Option<Digest>) -> Digest {
        let timestamp = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let starlog = Starlog::new(
            message,
            &Signature::new("Data", "data@enterprise.test"),
            timestamp,
            parent,
            FileMap::new(),
        );
        dock.starlogs().commit(&starlog).unwrap()
    }

    #[test]
    fn test_default_course_is_current_and_empty() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        assert_eq!(courses.current().unwrap(), "core");
        assert_eq!(courses.latest("core").unwrap(), None);
        assert_eq!(courses.current_latest().unwrap(), None);
        assert_eq!(courses.list().unwrap(), vec!["core"]);
    }

    #[test]
    fn test_create_and_duplicate() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        courses.create("main").unwrap();
        assert!(courses.exists("main"));
        assert_eq!(courses.latest("main").unwrap(), None);

        assert!(matches!(
            courses.create("main"),
            Err(Error::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_set_latest_and_fork() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        let digest = store_starlog(&dock, "first", None);
        courses.set_latest("core", &digest).unwrap();
        assert_eq!(courses.latest("core").unwrap(), Some(digest));

        let tip = courses.fork("feature").unwrap();
        assert_eq!(tip, Some(digest));
        assert_eq!(courses.latest("feature").unwrap(), Some(digest));
    }

    #[test]
    fn test_set_latest_requires_stored_starlog() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        let unknown = Digest::of_bytes(b"not a starlog");
        assert!(matches!(
            courses.set_latest("core", &unknown),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            courses.create_at("ghost", Some(&unknown)),
            Err(Error::NotFound { .. })
        ));
        assert!(!courses.exists("ghost"));
    }

    #[test]
    fn test_latest_of_unknown_course() {
        let (_temp, dock) = init();
        assert!(matches!(
            dock.courses().latest("nope"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_garbage_reference_is_corruption() {
        let (temp, dock) = init();
        fs::write(temp.path().join(".dock/links/helm/core"), b"not-a-digest").unwrap();

        assert!(matches!(
            dock.courses().latest("core"),
            Err(Error::CorruptRepository { .. })
        ));
    }

    #[test]
    fn test_advance_is_compare_and_swap() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        let first = store_starlog(&dock, "first", None);
        let second = store_starlog(&dock, "second", Some(first));

        courses.advance("core", None, &first).unwrap();
        assert!(matches!(
            courses.advance("core", None, &second),
            Err(Error::InvalidOperation { .. })
        ));
        assert_eq!(courses.latest("core").unwrap(), Some(first));

        courses.advance("core", Some(&first), &second).unwrap();
        assert_eq!(courses.latest("core").unwrap(), Some(second));
    }

    #[test]
    fn test_set_current_writes_exact_pointer() {
        let (temp, dock) = init();
        let courses = dock.courses();

        courses.create("feature").unwrap();
        courses.set_current("feature").unwrap();

        assert_eq!(courses.current().unwrap(), "feature");
        let helm = fs::read_to_string(temp.path().join(".dock/HELM")).unwrap();
        assert_eq!(helm, "link: links/helm/feature");

        assert!(matches!(
            courses.set_current("missing"),
            Err(Error::UnknownCourse { .. })
        ));
    }

    #[test]
    fn test_malformed_helm_is_corruption() {
        let (temp, dock) = init();
        fs::write(temp.path().join(".dock/HELM"), b"ref: refs/heads/main").unwrap();

        assert!(matches!(
            dock.courses().current(),
            Err(Error::CorruptRepository { .. })
        ));
    }

    #[test]
    fn test_dangling_helm_is_corruption() {
        let (temp, dock) = init();
        fs::write(temp.path().join(".dock/HELM"), b"link: links/helm/gone").unwrap();

        assert!(matches!(
            dock.courses().current_latest(),
            Err(Error::CorruptRepository { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        courses.create("feature").unwrap();
        courses.delete("feature").unwrap();
        assert!(!courses.exists("feature"));

        assert!(matches!(
            courses.delete("feature"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_current_course_is_refused() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        courses.create("feature").unwrap();
        courses.set_current("feature").unwrap();

        assert!(matches!(
            courses.delete("feature"),
            Err(Error::InvalidOperation { .. })
        ));
        assert!(courses.exists("feature"));

        assert!(matches!(
            courses.delete("core"),
            Err(Error::InvalidOperation { .. })
        ));
        assert!(courses.exists("core"));
    }

    #[test]
    fn test_invalid_names() {
        let (_temp, dock) = init();
        let courses = dock.courses();

        for name in ["", "../etc", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(courses.create(name), Err(Error::InvalidCourseName { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Valid course names can be created, listed and checked out
        #[test]
        fn prop_valid_course_names_accepted(name in "[a-zA-Z0-9_-][a-zA-Z0-9_.-]{0,40}") {
            prop_assume!(!name.contains("..") && name != "core");

            let (_temp, dock) = init();
            let courses = dock.courses();

            courses.create(&name)?;
            prop_assert!(courses.list()?.contains(&name));
            courses.set_current(&name)?;
            prop_assert_eq!(courses.current()?, name);
        }
    }
}
