use crate::error::{ProjgenError, Result};
use crate::io::{atomic_write, contained_relative, relative_files};
use crate::paths::{self, validate_owner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ProjectInfo
// ---------------------------------------------------------------------------

/// Sidecar describing the request a project was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub original_description: String,
    pub tech_stack: String,
    pub difficulty: String,
}

impl ProjectInfo {
    /// Load `project_info.json` from a project directory, `None` if absent.
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let path = paths::project_info_path(project_dir);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        atomic_write(&paths::project_info_path(project_dir), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Resolve a project directory by name, falling back to a case-insensitive
/// match among the owner's projects.
pub fn resolve_project_dir(projects_dir: &Path, owner: &str, project: &str) -> Result<PathBuf> {
    validate_owner(owner)?;
    let name_ok = contained_relative(project).is_some_and(|p| p.components().count() == 1);
    if !name_ok {
        return Err(ProjgenError::AccessDenied(project.to_string()));
    }

    let exact = paths::project_dir(projects_dir, owner, project);
    if exact.is_dir() {
        return Ok(exact);
    }

    let owner_dir = paths::owner_dir(projects_dir, owner);
    if owner_dir.is_dir() {
        for entry in std::fs::read_dir(&owner_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry
                .file_name()
                .to_string_lossy()
                .eq_ignore_ascii_case(project)
            {
                return Ok(entry.path());
            }
        }
    }

    Err(ProjgenError::ProjectNotFound(format!("{owner}/{project}")))
}

/// Every project of `owner` with its files, relative to the project root.
/// An owner with no projects yields an empty map.
pub fn list_projects(projects_dir: &Path, owner: &str) -> Result<BTreeMap<String, Vec<String>>> {
    validate_owner(owner)?;
    let owner_dir = paths::owner_dir(projects_dir, owner);
    let mut projects = BTreeMap::new();
    if !owner_dir.is_dir() {
        return Ok(projects);
    }
    for entry in std::fs::read_dir(&owner_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            projects.insert(name, relative_files(&entry.path())?);
        }
    }
    Ok(projects)
}

// ---------------------------------------------------------------------------
// Guarded read
// ---------------------------------------------------------------------------

/// Read a file from a project, refusing anything that resolves outside it.
///
/// The requested path is checked lexically first, then both the project root
/// and the target are canonicalized (following symlinks) and the target must
/// be a descendant of the root. Any failure of the check is
/// [`ProjgenError::AccessDenied`]; content is never returned in that case.
pub fn read_project_file(
    projects_dir: &Path,
    owner: &str,
    project: &str,
    filename: &str,
) -> Result<String> {
    let base = resolve_project_dir(projects_dir, owner, project)?;
    let rel = contained_relative(filename)
        .ok_or_else(|| ProjgenError::AccessDenied(filename.to_string()))?;

    let resolved_base = base.canonicalize()?;
    let full = resolved_base.join(rel);
    if !full.exists() {
        return Err(ProjgenError::FileNotFound(filename.to_string()));
    }
    let resolved_full = full
        .canonicalize()
        .map_err(|_| ProjgenError::AccessDenied(filename.to_string()))?;
    if !resolved_full.starts_with(&resolved_base) {
        return Err(ProjgenError::AccessDenied(filename.to_string()));
    }
    if !resolved_full.is_file() {
        return Err(ProjgenError::FileNotFound(filename.to_string()));
    }

    let bytes = std::fs::read(&resolved_full)?;
    String::from_utf8(bytes).map_err(|_| ProjgenError::BinaryFile(filename.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(dir: &TempDir) -> PathBuf {
        let projects = dir.path().join("generated_projects");
        atomic_write(&projects.join("42/Snake/main.py"), b"print('snake')").unwrap();
        atomic_write(&projects.join("42/Snake/assets/readme.txt"), b"hi").unwrap();
        atomic_write(&projects.join("42/Other/x.bin"), &[0xff, 0xfe, 0x00]).unwrap();
        atomic_write(&projects.join("7/Secret/key.txt"), b"secret").unwrap();
        atomic_write(&dir.path().join("outside.txt"), b"outside").unwrap();
        projects
    }

    #[test]
    fn reads_file_inside_project() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        let content = read_project_file(&projects, "42", "Snake", "main.py").unwrap();
        assert_eq!(content, "print('snake')");
        let nested = read_project_file(&projects, "42", "Snake", "assets/readme.txt").unwrap();
        assert_eq!(nested, "hi");
    }

    #[test]
    fn traversal_is_denied() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        for name in [
            "../Other/x.bin",
            "../../7/Secret/key.txt",
            "../../../outside.txt",
            "assets/../../Other/x.bin",
            "/etc/passwd",
        ] {
            let err = read_project_file(&projects, "42", "Snake", name).unwrap_err();
            assert!(
                matches!(err, ProjgenError::AccessDenied(_)),
                "expected denial for {name}, got {err:?}"
            );
        }
    }

    #[test]
    fn traversal_in_project_name_is_denied() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        let err = read_project_file(&projects, "42", "../7/Secret", "key.txt").unwrap_err();
        assert!(matches!(err, ProjgenError::AccessDenied(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_denied() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        std::os::unix::fs::symlink(
            dir.path().join("outside.txt"),
            projects.join("42/Snake/link.txt"),
        )
        .unwrap();
        let err = read_project_file(&projects, "42", "Snake", "link.txt").unwrap_err();
        assert!(matches!(err, ProjgenError::AccessDenied(_)));
    }

    #[test]
    fn missing_and_binary_files() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        assert!(matches!(
            read_project_file(&projects, "42", "Snake", "nope.py").unwrap_err(),
            ProjgenError::FileNotFound(_)
        ));
        assert!(matches!(
            read_project_file(&projects, "42", "Other", "x.bin").unwrap_err(),
            ProjgenError::BinaryFile(_)
        ));
        assert!(matches!(
            read_project_file(&projects, "42", "Missing", "a").unwrap_err(),
            ProjgenError::ProjectNotFound(_)
        ));
    }

    #[test]
    fn project_lookup_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        let resolved = resolve_project_dir(&projects, "42", "snake").unwrap();
        assert_eq!(resolved, projects.join("42/Snake"));
    }

    #[test]
    fn lists_projects_with_files() {
        let dir = TempDir::new().unwrap();
        let projects = seed(&dir);
        let listing = list_projects(&projects, "42").unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(
            listing["Snake"],
            vec!["assets/readme.txt".to_string(), "main.py".to_string()]
        );
        assert!(list_projects(&projects, "999").unwrap().is_empty());
    }
}
