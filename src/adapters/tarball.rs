//! Source tarballs for the legacy remote builder.

use crate::project::ProjectFile;
use crate::utils::error::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Directory inside the upload that holds the part tarballs.
pub const TARBALL_DIR: &str = "remote-build";

/// Sources the farm can fetch itself (URLs, git remotes) are left untouched.
pub fn is_local_source(source: &str) -> bool {
    !(source.contains("://") || source.starts_with("git@") || source.starts_with("lp:"))
}

/// Write `source` (a directory or a single file) as a gzip'd tarball at `dest`,
/// rooted at `name`.
pub fn create_tarball(source: &Path, name: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let encoder = GzEncoder::new(File::create(dest)?, Compression::default());
    let mut archive = tar::Builder::new(encoder);

    if source.is_dir() {
        archive.append_dir_all(name, source)?;
    } else {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        archive.append_path_with_name(source, Path::new(name).join(file_name))?;
    }

    archive.into_inner()?.finish()?;
    Ok(())
}

/// Point each listed part's `source` at its tarball.
pub fn rewrite_part_sources(document: &mut serde_yaml::Value, tarballs: &BTreeMap<String, String>) {
    let Some(parts) = document
        .get_mut("parts")
        .and_then(|parts| parts.as_mapping_mut())
    else {
        return;
    };

    for (part_name, tarball) in tarballs {
        if let Some(part) = parts
            .get_mut(part_name.as_str())
            .and_then(|part| part.as_mapping_mut())
        {
            part.insert(
                serde_yaml::Value::String("source".to_string()),
                serde_yaml::Value::String(tarball.clone()),
            );
        }
    }
}

/// Tarball every part with a local source into `work_dir/remote-build/` and
/// write the rewritten project file into `work_dir`, at the same relative
/// location it has in the project. Returns the tarballs written.
pub fn package_local_sources(
    project_file: &ProjectFile,
    project_dir: &Path,
    work_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut replacements = BTreeMap::new();
    let mut written = Vec::new();

    for part in &project_file.project.parts {
        let Some(source) = part.source.as_deref() else {
            continue;
        };
        if !is_local_source(source) {
            tracing::debug!("Part {} uses remote source {}", part.name, source);
            continue;
        }

        let source_path = project_dir.join(source);
        if !source_path.exists() {
            tracing::warn!(
                "Source '{}' of part '{}' does not exist, leaving it unchanged",
                source,
                part.name
            );
            continue;
        }

        let relative = format!("{}/{}.tar.gz", TARBALL_DIR, part.name);
        let dest = work_dir.join(&relative);
        create_tarball(&source_path, &part.name, &dest)?;
        tracing::debug!("Packed {} into {}", source_path.display(), relative);

        replacements.insert(part.name.clone(), relative);
        written.push(dest);
    }

    let mut document = project_file.document.clone();
    rewrite_part_sources(&mut document, &replacements);

    let relative_project_file = project_file
        .path
        .strip_prefix(project_dir)
        .unwrap_or_else(|_| Path::new("snapcraft.yaml"));
    let target = work_dir.join(relative_project_file);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, serde_yaml::to_string(&document)?)?;

    Ok(written)
}
