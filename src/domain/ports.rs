use crate::domain::model::{Build, BuildState};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A remote build service: uploads a project, drives builds and retrieves results.
#[async_trait]
pub trait RemoteBuilder: Send + Sync {
    /// Use a named farm project instead of an anonymous one.
    fn set_project(&mut self, project: &str);

    async fn is_project_private(&self) -> Result<bool>;

    async fn start_builds(
        &mut self,
        build_id: &str,
        project_dir: &Path,
        architectures: &[String],
    ) -> Result<Vec<Build>>;

    async fn resume_builds(&mut self, build_id: &str) -> Result<Vec<Build>>;

    /// Current state per architecture.
    async fn poll_states(&self) -> Result<BTreeMap<String, BuildState>>;

    async fn cancel_builds(&self) -> Result<()>;

    /// Download logs into `output_dir`; `None` for architectures without a log.
    async fn fetch_logs(&self, output_dir: &Path) -> Result<BTreeMap<String, Option<PathBuf>>>;

    async fn fetch_artifacts(&self, output_dir: &Path) -> Result<Vec<PathBuf>>;

    async fn cleanup(&self) -> Result<()>;
}

pub trait Prompter: Send + Sync {
    fn confirm(&self, prompt: &str, default: bool) -> bool;
}
