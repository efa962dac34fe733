//! Resolves user-supplied paths inside a repository root and rejects escapes.
//!
//! Every filesystem-touching tool handler goes through [`resolve`] before
//! touching disk. Symlinks are resolved (via canonicalization) before the
//! containment check, so a symlink inside the repo pointing outside it is
//! still rejected.

use crate::error::CoreError;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Resolve `user_path` against `repo_root`, returning the canonical absolute
/// path if (and only if) it stays within the root.
///
/// Empty, `.`, `/`, and `./` all normalize to the repo root itself. A
/// leading `/` or `./` on any other path is stripped before joining, so
/// `user_path` is always treated as relative to `repo_root` regardless of
/// how it is spelled.
pub fn resolve(repo_root: &Path, user_path: &str) -> Result<PathBuf, CoreError> {
    let repo_root = repo_root
        .canonicalize()
        .map_err(|e| CoreError::InvalidPath(format!("repo root: {e}")))?;

    let trimmed = user_path.trim();
    let relative = if trimmed.is_empty() || trimmed == "." || trimmed == "/" || trimmed == "./" {
        PathBuf::new()
    } else {
        let stripped = trimmed.trim_start_matches("./").trim_start_matches('/');
        PathBuf::from(stripped)
    };

    let joined = repo_root.join(&relative);

    // `absolutize` lexically normalizes `..`/`.` without requiring the path
    // to exist yet (needed for write_to_file targets that don't exist).
    let normalized = joined
        .absolutize()
        .map_err(|e| CoreError::InvalidPath(format!("cannot normalize: {e}")))?
        .into_owned();

    // If the target (or any existing prefix of it) is a symlink, resolve it
    // so the containment check sees the real destination.
    let canonical = canonicalize_best_effort(&normalized);

    if !canonical.starts_with(&repo_root) {
        return Err(CoreError::InvalidPath(format!(
            "{} escapes repo root {}",
            user_path,
            repo_root.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize `path` if it exists; otherwise canonicalize the longest
/// existing ancestor and re-append the remaining (non-existent) components.
/// This lets the guard validate write targets that don't exist yet while
/// still resolving symlinks along any existing prefix.
fn canonicalize_best_effort(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    while !existing.exists() {
        match existing.clone().file_name() {
            Some(name) => {
                tail.push(name.to_owned());
                existing = match existing.parent() {
                    Some(p) => p.to_path_buf(),
                    None => break,
                };
            }
            None => break,
        }
    }

    let mut result = existing.canonicalize().unwrap_or(existing);
    for component in tail.into_iter().rev() {
        result.push(component);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn root_forms_normalize_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for form in ["", ".", "/", "./"] {
            let resolved = resolve(root, form).unwrap();
            assert_eq!(resolved, root.canonicalize().unwrap());
        }
    }

    #[test]
    fn rejects_parent_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let err = resolve(root, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath(_)));
    }

    #[test]
    fn absolute_path_is_remapped_under_root() {
        // Per spec §4.A, a leading `/` is stripped rather than treated as
        // an escape: "/etc/passwd" resolves to "<root>/etc/passwd".
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let resolved = resolve(root, "/etc/passwd").unwrap();
        assert!(resolved.starts_with(root.canonicalize().unwrap()));
        assert_eq!(resolved, root.join("etc/passwd").absolutize().unwrap().into_owned());
    }

    #[test]
    fn allows_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/lib.rs"), "// hi").unwrap();
        let resolved = resolve(root, "src/lib.rs").unwrap();
        assert_eq!(resolved, root.join("src/lib.rs").canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();
        let err = resolve(root, "escape/anything").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath(_)));
    }
}
