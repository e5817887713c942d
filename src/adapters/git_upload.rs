//! Uploading a project tree to the farm through git, using `git2`.

use crate::utils::error::{RemoteBuildError, Result};
use git2::{Cred, IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository, Signature};
use regex::Regex;
use std::path::Path;
use walkdir::WalkDir;

/// Local branch holding the upload commit.
pub const WORK_BRANCH_REF: &str = "refs/heads/remote-build";
/// Branch the farm builds from.
pub const REMOTE_BRANCH_REF: &str = "refs/heads/main";

/// Build outputs that never belong in an upload.
const ALWAYS_EXCLUDED_DIRS: [&str; 4] = [".git", "parts", "stage", "prime"];

/// True when `project_dir` lives in a shallow clone. Shallow history cannot be pushed.
pub fn is_shallow_repository(project_dir: &Path) -> bool {
    match Repository::discover(project_dir) {
        Ok(repo) => repo.is_shallow(),
        Err(_) => false,
    }
}

pub fn ensure_not_shallow(project_dir: &Path) -> Result<()> {
    if is_shallow_repository(project_dir) {
        return Err(RemoteBuildError::ShallowClone {
            path: project_dir.display().to_string(),
        });
    }
    Ok(())
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    Regex::new(&format!("^{}$", escaped)).map_err(|e| RemoteBuildError::InvalidConfigValueError {
        field: "upload.exclude".to_string(),
        value: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Copy the project into `work_dir`, skipping build outputs, built snaps and
/// anything matching `excludes` (matched against the file name and the
/// relative path). Returns the number of files copied.
pub fn copy_project(project_dir: &Path, work_dir: &Path, excludes: &[String]) -> Result<usize> {
    let patterns = excludes
        .iter()
        .map(|p| glob_to_regex(p))
        .collect::<Result<Vec<_>>>()?;

    let is_excluded = |relative: &Path| -> bool {
        let relative_str = relative.to_string_lossy();
        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if relative.components().count() == 1 && ALWAYS_EXCLUDED_DIRS.contains(&file_name.as_str()) {
            return true;
        }
        if file_name == ".git" || file_name.ends_with(".snap") {
            return true;
        }
        patterns
            .iter()
            .any(|re| re.is_match(&file_name) || re.is_match(&relative_str))
    };

    let mut copied = 0;
    let walker = WalkDir::new(project_dir).min_depth(1).into_iter().filter_entry(|entry| {
        entry
            .path()
            .strip_prefix(project_dir)
            .map(|relative| !is_excluded(relative))
            .unwrap_or(false)
    });

    for entry in walker {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(project_dir) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = work_dir.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    tracing::trace!("Copied {} files into {}", copied, work_dir.display());
    Ok(copied)
}

/// Initialise a repository in `work_dir` and commit everything in it to
/// [`WORK_BRANCH_REF`].
pub fn commit_work_tree(work_dir: &Path, message: &str) -> Result<Oid> {
    let repo = Repository::init(work_dir)?;

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let signature = Signature::now("snapcraft", "snapcraft@localhost")?;
    let commit = repo.commit(
        Some(WORK_BRANCH_REF),
        &signature,
        &signature,
        message,
        &tree,
        &[],
    )?;

    tracing::debug!("Committed work tree as {}", commit);
    Ok(commit)
}

/// Push [`WORK_BRANCH_REF`] of the repository in `work_dir` to `url` as
/// [`REMOTE_BRANCH_REF`].
pub fn push_work_tree(work_dir: &Path, url: &str, token: Option<&str>) -> Result<()> {
    let repo = Repository::open(work_dir)?;
    let mut remote = repo.remote_anonymous(url)?;

    let mut callbacks = RemoteCallbacks::new();
    if let Some(token) = token {
        callbacks.credentials(move |_url, _username, _allowed| Cred::userpass_plaintext("x-token", token));
    }
    let mut options = PushOptions::new();
    options.remote_callbacks(callbacks);

    let refspec = format!("+{}:{}", WORK_BRANCH_REF, REMOTE_BRANCH_REF);
    remote.push(&[refspec.as_str()], Some(&mut options))?;

    tracing::debug!("Pushed {} to {}", refspec, url);
    Ok(())
}
