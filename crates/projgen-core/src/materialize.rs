use crate::error::{ProjgenError, Result};
use crate::extract::extract_object;
use crate::io::{atomic_write, contained_relative, ensure_dir};
use crate::paths::{self, sanitize_project_name, validate_owner};
use crate::project::ProjectInfo;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// An entry of the filename-to-content mapping that was not written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Outcome of one materialization.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializeReport {
    /// Sanitized project folder name.
    pub project: String,
    pub path: PathBuf,
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

// ---------------------------------------------------------------------------
// Materializer
// ---------------------------------------------------------------------------

/// Writes generated projects under `<projects_dir>/<owner>/<project>/`.
///
/// Writes are best-effort per file: an entry that cannot be written is logged
/// and reported in [`MaterializeReport::skipped`], and the batch continues.
/// Nothing is rolled back, so a failed run can leave a partial project.
#[derive(Debug, Clone)]
pub struct Materializer {
    projects_dir: PathBuf,
}

impl Materializer {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Directory a project named `project` would be written to.
    pub fn project_dir(&self, owner: &str, project: &str) -> PathBuf {
        paths::project_dir(&self.projects_dir, owner, &sanitize_project_name(project))
    }

    pub fn materialize(
        &self,
        owner: &str,
        project: &str,
        files: &Map<String, Value>,
    ) -> Result<MaterializeReport> {
        self.materialize_until(owner, project, files, || false)
    }

    /// Parse raw model output with [`extract_object`] and materialize the result.
    pub fn materialize_text(
        &self,
        owner: &str,
        project: &str,
        raw: &str,
    ) -> Result<MaterializeReport> {
        let files = extract_object(raw)?;
        self.materialize(owner, project, &files)
    }

    /// Materialize `files`, checking `is_cancelled` before each write.
    ///
    /// Cancellation stops the loop with [`ProjgenError::Cancelled`]; files
    /// already written stay on disk.
    pub fn materialize_until(
        &self,
        owner: &str,
        project: &str,
        files: &Map<String, Value>,
        is_cancelled: impl Fn() -> bool,
    ) -> Result<MaterializeReport> {
        validate_owner(owner)?;
        let safe_name = sanitize_project_name(project);
        if safe_name.is_empty() {
            return Err(ProjgenError::InvalidProjectName(project.to_string()));
        }

        let base = paths::project_dir(&self.projects_dir, owner, &safe_name);
        ensure_dir(&base)?;

        let mut written = Vec::new();
        let mut skipped = Vec::new();

        for (name, content) in files {
            if is_cancelled() {
                warn!(owner, project = %safe_name, written = written.len(), "materialize: cancelled");
                return Err(ProjgenError::Cancelled);
            }

            let Value::String(text) = content else {
                debug!(owner, file = %name, "materialize: skipping non-text entry");
                skipped.push(SkippedFile {
                    name: name.clone(),
                    reason: "content is not text".into(),
                });
                continue;
            };

            let Some(rel) = contained_relative(name) else {
                warn!(owner, file = %name, "materialize: rejecting path outside project");
                skipped.push(SkippedFile {
                    name: name.clone(),
                    reason: "path escapes the project directory".into(),
                });
                continue;
            };

            let target = base.join(rel);
            match atomic_write(&target, text.as_bytes()) {
                Ok(()) => written.push(target),
                Err(e) => {
                    warn!(owner, file = %name, error = %e, "materialize: write failed");
                    skipped.push(SkippedFile {
                        name: name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            owner,
            project = %safe_name,
            written = written.len(),
            skipped = skipped.len(),
            "materialize: done"
        );

        Ok(MaterializeReport {
            project: safe_name,
            path: base,
            files: written,
            skipped,
        })
    }

    /// Write the `project_info.json` sidecar, but only into an existing
    /// project directory. Returns whether the sidecar was written.
    pub fn write_project_info(&self, owner: &str, project: &str, info: &ProjectInfo) -> Result<bool> {
        let dir = self.project_dir(owner, project);
        if !dir.is_dir() {
            return Ok(false);
        }
        info.save(&dir)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn files(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn writes_files_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let report = m
            .materialize(
                "42",
                "Snake Game",
                &files(json!({"main.py": "print(1)", "src/util.py": "x = 1"})),
            )
            .unwrap();

        assert_eq!(report.project, "Snake_Game");
        assert_eq!(report.path, dir.path().join("42/Snake_Game"));
        assert_eq!(report.files.len(), 2);
        assert!(report.skipped.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("42/Snake_Game/src/util.py")).unwrap(),
            "x = 1"
        );
    }

    #[test]
    fn non_text_values_are_skipped() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let report = m
            .materialize(
                "42",
                "p",
                &files(json!({"a.txt": "a", "b.json": {"k": 1}, "c": 3, "d": null})),
            )
            .unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.skipped.len(), 3);
        assert!(!dir.path().join("42/p/b.json").exists());
    }

    #[test]
    fn materializing_twice_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let mapping = files(json!({"main.py": "v1", "lib/a.py": "a"}));
        m.materialize("42", "p", &mapping).unwrap();
        let first = crate::io::relative_files(&dir.path().join("42/p")).unwrap();
        m.materialize("42", "p", &mapping).unwrap();
        let second = crate::io::relative_files(&dir.path().join("42/p")).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("42/p/main.py")).unwrap(),
            "v1"
        );
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let dir = TempDir::new().unwrap();
        let projects = dir.path().join("projects");
        let m = Materializer::new(&projects);
        let report = m
            .materialize(
                "42",
                "p",
                &files(json!({"../../evil.txt": "x", "/abs.txt": "y", "ok.txt": "z"})),
            )
            .unwrap();
        assert_eq!(report.files, vec![projects.join("42/p/ok.txt")]);
        assert_eq!(report.skipped.len(), 2);
        assert!(!dir.path().join("evil.txt").exists());
        assert!(!projects.join("evil.txt").exists());
    }

    #[test]
    fn failed_write_is_skipped_and_batch_continues() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        // `src` as a file and `src/main.py` cannot both exist; one write fails.
        let report = m
            .materialize(
                "42",
                "p",
                &files(json!({"src": "x", "src/main.py": "y", "README.md": "hello"})),
            )
            .unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].name.starts_with("src"));
        assert!(!report.skipped[0].reason.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("42/p/README.md")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn invalid_owner_fails_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let err = m
            .materialize("../x", "p", &files(json!({"a": "b"})))
            .unwrap_err();
        assert!(matches!(err, ProjgenError::InvalidOwner(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn materialize_text_parses_first() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let report = m
            .materialize_text("7", "demo", "```json\n{\"r.txt\": \"pygame\",}\n```")
            .unwrap();
        assert_eq!(report.files.len(), 1);

        let err = m.materialize_text("7", "demo2", "no json here").unwrap_err();
        assert!(matches!(err, ProjgenError::NoJsonFound));
        assert!(!dir.path().join("7/demo2").exists());
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let err = m
            .materialize_until("42", "p", &files(json!({"a": "1"})), || true)
            .unwrap_err();
        assert!(matches!(err, ProjgenError::Cancelled));
        assert!(!dir.path().join("42/p/a").exists());
    }

    #[test]
    fn project_info_requires_existing_directory() {
        let dir = TempDir::new().unwrap();
        let m = Materializer::new(dir.path());
        let info = ProjectInfo {
            original_description: "Build a Snake Game".into(),
            tech_stack: "Python, Pygame".into(),
            difficulty: "Beginner".into(),
        };
        assert!(!m.write_project_info("42", "Build_a_Snake", &info).unwrap());

        m.materialize("42", "Build_a_Snake", &files(json!({"main.py": ""})))
            .unwrap();
        assert!(m.write_project_info("42", "Build_a_Snake", &info).unwrap());
        let loaded = ProjectInfo::load(&dir.path().join("42/Build_a_Snake"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, info);
    }
}
