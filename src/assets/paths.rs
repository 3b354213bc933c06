use std::path::{Path, PathBuf};

use crate::foundation::error::{MontageError, MontageResult};

/// Normalize a relative source path: forward slashes, no `.`/`..` segments.
pub(crate) fn normalize_rel_path(source: &str) -> MontageResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(MontageError::validation("relative source path expected"));
    }
    if s.is_empty() {
        return Err(MontageError::validation("source path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(MontageError::validation(
                "relative source paths must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(MontageError::validation(
            "source path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Resolve a clip `src` to a local file: absolute paths are used as-is, relative ones are
/// joined onto `assets_root`.
pub fn resolve_source(src: &str, assets_root: &Path) -> MontageResult<PathBuf> {
    let src = src.trim();
    if src.contains("://") {
        return Err(MontageError::validation(format!(
            "remote source '{src}' must be downloaded before rendering"
        )));
    }
    let path = Path::new(src);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(assets_root.join(normalize_rel_path(src)?))
}

/// Stable short key for cache file names.
pub fn cache_key(parts: &[&str]) -> String {
    let joined = parts.join("\u{1f}");
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(joined.as_bytes()))
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MontageResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Removes the directory tree on drop unless disarmed.
pub(crate) struct DirGuard {
    path: Option<PathBuf>,
}

impl DirGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Keep the directory.
    pub(crate) fn keep(mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Some(p) = self.path.take()
            && let Err(e) = std::fs::remove_dir_all(&p)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %p.display(), error = %e, "failed to remove cache directory");
        }
    }
}
