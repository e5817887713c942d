use crate::utils::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

const HASH_LENGTH: usize = 32;

/// `{app}-{project}-{hash}`, where the hash covers every file of the project
/// so the same tree always maps to the same remote build.
pub fn get_build_id(app_name: &str, project_name: &str, project_dir: &Path) -> Result<String> {
    let hash = compute_tree_hash(project_dir)?;
    Ok(format!("{}-{}-{}", app_name, project_name, hash))
}

fn compute_tree_hash(project_dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(project_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(project_dir)
            .unwrap_or(entry.path());
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(std::fs::read(entry.path())?);
    }

    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..HASH_LENGTH].to_string())
}
