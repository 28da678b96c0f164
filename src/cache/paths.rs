//! Cache path utilities - uses ~/.cache/gitfleet/ by default

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Default directory for cached repository metrics.
/// Uses ~/.cache/gitfleet/ on Unix, %LOCALAPPDATA%/gitfleet/ on Windows.
pub fn default_cache_dir() -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            // Fallback to ~/.cache
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("gitfleet")
}

/// Stable, filesystem-safe slug identifying one repository.
///
/// The readable part comes from the repository name; the hash of the
/// canonical path keeps two clones with the same name apart.
pub fn repository_slug(name: &str, path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hash = format!("{:x}", digest);

    let readable = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(40)
        .collect::<String>();

    format!("{}-{}", readable, &hash[..12])
}
