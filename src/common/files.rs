//! File helpers: content hashing, mode-preserving copies, parent creation.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Create the parent directory of `path` if it doesn't exist.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// SHA-256 of a file's content.
pub fn sha256_file(path: &Path) -> Result<[u8; 32]> {
    let mut file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(hasher.finalize().into())
}

/// True when both paths are regular files with the same content.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    if !a.is_file() || !b.is_file() {
        return Ok(false);
    }
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(sha256_file(a)? == sha256_file(b)?)
}

/// Set Unix permission bits.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to chmod {:o} {}", mode, path.display()))
}

/// Copy `src` to `dst`, creating parents, then apply `mode`.
pub fn copy_with_mode(src: &Path, dst: &Path, mode: u32) -> Result<()> {
    ensure_parent_exists(dst)?;
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    set_mode(dst, mode)
}
