use crate::error::Result;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::Builder;

/// Prefix of in-flight temp files; listings skip anything starting with it.
pub const TEMP_PREFIX: &str = ".projgen-";

/// Replace `path` with `data` through a hidden temp file in the same directory,
/// creating missing parents. Readers see the old file or the new one, never a
/// partial write.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            ensure_dir(parent)?;
            parent
        }
        _ => Path::new("."),
    };
    let mut tmp = Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Lexically normalize a relative path that must stay under its base.
///
/// `.` components are dropped and `..` pops a previous component. Returns
/// `None` for absolute paths, empty paths, or any `..` that would climb above
/// the base.
pub fn contained_relative(name: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

/// All regular files under `dir`, as `/`-separated paths relative to `dir`, sorted.
pub fn relative_files(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    collect_files(dir, dir, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(base, &path, out)?;
        } else if file_type.is_file() {
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(base) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/main.py");
        atomic_write(&path, b"print(1)").unwrap();
        atomic_write(&path, b"print(2)").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print(2)");
    }

    #[test]
    fn listing_skips_in_flight_temp_files() {
        let dir = TempDir::new().unwrap();
        atomic_write(&dir.path().join("main.py"), b"x").unwrap();
        std::fs::write(dir.path().join(format!("{TEMP_PREFIX}abc123")), b"partial").unwrap();
        assert_eq!(relative_files(dir.path()).unwrap(), vec!["main.py"]);
    }

    #[test]
    fn contained_relative_accepts_nested_paths() {
        assert_eq!(
            contained_relative("src/main.py"),
            Some(PathBuf::from("src/main.py"))
        );
        assert_eq!(
            contained_relative("./src/../lib.rs"),
            Some(PathBuf::from("lib.rs"))
        );
    }

    #[test]
    fn contained_relative_rejects_escapes() {
        for name in ["../x", "src/../../x", "/etc/passwd", "", ".", "a/.."] {
            assert!(contained_relative(name).is_none(), "expected reject: {name}");
        }
    }

    #[test]
    fn relative_files_walks_recursively() {
        let dir = TempDir::new().unwrap();
        atomic_write(&dir.path().join("b.txt"), b"b").unwrap();
        atomic_write(&dir.path().join("src/a.rs"), b"a").unwrap();
        let files = relative_files(dir.path()).unwrap();
        assert_eq!(files, vec!["b.txt".to_string(), "src/a.rs".to_string()]);
    }
}
