// Local asset enumeration.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{io_err, EnumerateError, PreconditionError};

/// Extensions (lowercase) that are picked up from the source directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// One local file to publish. Built once at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Path relative to the store root, e.g. `assets/images/a.jpg`.
    pub path: String,
    pub file_name: String,
    pub content: Vec<u8>,
    /// Hex SHA-256 of `content`. Only used in logs.
    pub sha256: String,
}

impl AssetRecord {
    pub fn new(remote_dir: &str, file_name: impl Into<String>, content: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let path = if remote_dir.is_empty() {
            file_name.clone()
        } else {
            format!("{remote_dir}/{file_name}")
        };
        let sha256 = hex::encode(Sha256::digest(&content));
        Self {
            path,
            file_name,
            content,
            sha256,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read every image file directly inside `dir`, sorted by file name.
///
/// A missing directory, a non-directory or an empty result are
/// precondition failures.
pub fn enumerate(dir: &Path, remote_dir: &str) -> Result<Vec<AssetRecord>, EnumerateError> {
    if !dir.exists() {
        return Err(PreconditionError::MissingDirectory(dir.to_path_buf()).into());
    }
    if !dir.is_dir() {
        return Err(PreconditionError::NotADirectory(dir.to_path_buf()).into());
    }

    let mut assets = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        let content = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        assets.push(AssetRecord::new(remote_dir, file_name, content));
    }

    if assets.is_empty() {
        return Err(PreconditionError::NoAssets(dir.to_path_buf()).into());
    }

    assets.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = assets.len(), dir = %dir.display(), "enumerated assets");
    Ok(assets)
}
