use crate::error::{ProjgenError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DEFAULT_PROJECTS_DIR: &str = "generated_projects";
pub const STATE_DIR: &str = ".projgen";
pub const DEFAULT_STATUS_DB: &str = ".projgen/status.db";

pub const CONFIG_FILE: &str = "projgen.yaml";
pub const PROJECT_INFO_FILE: &str = "project_info.json";

/// Number of description words used to name a project folder.
const PROJECT_NAME_WORDS: usize = 3;

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn owner_dir(projects_dir: &Path, owner: &str) -> PathBuf {
    projects_dir.join(owner)
}

pub fn project_dir(projects_dir: &Path, owner: &str, project: &str) -> PathBuf {
    owner_dir(projects_dir, owner).join(project)
}

pub fn project_info_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_INFO_FILE)
}

// ---------------------------------------------------------------------------
// Owner validation
// ---------------------------------------------------------------------------

static OWNER_RE: OnceLock<Regex> = OnceLock::new();

fn owner_re() -> &'static Regex {
    OWNER_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]{1,64}$").unwrap())
}

/// Owner ids become a directory name, so only a conservative charset is accepted.
pub fn validate_owner(owner: &str) -> Result<()> {
    if !owner_re().is_match(owner) {
        return Err(ProjgenError::InvalidOwner(owner.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Project names
// ---------------------------------------------------------------------------

static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn unsafe_re() -> &'static Regex {
    UNSAFE_RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap())
}

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip filesystem-unsafe characters and collapse whitespace runs to `_`.
///
/// Leading and trailing dots are trimmed so the result can never be `.` or `..`.
pub fn sanitize_project_name(name: &str) -> String {
    let collapsed = whitespace_re().replace_all(name.trim(), "_");
    let stripped = unsafe_re().replace_all(&collapsed, "");
    stripped.trim_matches('.').to_string()
}

/// Folder name for a build request: the first three words of the description,
/// joined with underscores and sanitized.
pub fn project_name_from_description(description: &str) -> Result<String> {
    let words: Vec<&str> = description
        .split_whitespace()
        .take(PROJECT_NAME_WORDS)
        .collect();
    let name = sanitize_project_name(&words.join("_"));
    if !name.chars().any(char::is_alphanumeric) {
        return Err(ProjgenError::InvalidProjectName(description.to_string()));
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
