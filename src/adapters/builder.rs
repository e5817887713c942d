use crate::adapters::farm_client::{BuildRequest, FarmClient};
use crate::adapters::{git_upload, tarball};
use crate::domain::model::{Build, BuildPlan, BuildState, BuilderVariant, DebianArchitecture, ARCH_ALL};
use crate::domain::ports::RemoteBuilder;
use crate::project::ProjectFile;
use crate::utils::error::{RemoteBuildError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Remote builder backed by the build farm. The variant decides how the
/// upload is prepared and which architectures are requested.
pub struct FarmBuilder {
    client: FarmClient,
    variant: BuilderVariant,
    project_file: ProjectFile,
    build_plan: BuildPlan,
    excludes: Vec<String>,
    farm_project: Option<String>,
    build_id: Option<String>,
}

impl FarmBuilder {
    pub fn new(
        client: FarmClient,
        variant: BuilderVariant,
        project_file: ProjectFile,
        build_plan: BuildPlan,
        excludes: Vec<String>,
    ) -> Self {
        Self {
            client,
            variant,
            project_file,
            build_plan,
            excludes,
            farm_project: None,
            build_id: None,
        }
    }

    fn active_build_id(&self) -> Result<&str> {
        self.build_id
            .as_deref()
            .ok_or(RemoteBuildError::NoActiveBuilds)
    }

    /// Architectures sent to the farm for the requested build-fors.
    pub fn request_architectures(&self, architectures: &[String]) -> Vec<String> {
        match self.variant {
            BuilderVariant::Current => architectures.to_vec(),
            BuilderVariant::Legacy => map_build_for_to_build_on(architectures, &self.build_plan),
        }
    }

    /// Copy the project into `work_dir`; the legacy variant also packs local
    /// sources and rewrites the project file.
    fn prepare_upload(&self, project_dir: &Path, work_dir: &Path) -> Result<()> {
        let copied = git_upload::copy_project(project_dir, work_dir, &self.excludes)?;
        tracing::debug!("Prepared {} files for upload", copied);

        if self.variant == BuilderVariant::Legacy {
            let tarballs = tarball::package_local_sources(&self.project_file, project_dir, work_dir)?;
            tracing::debug!("Legacy builder packed {} part sources", tarballs.len());
        }
        Ok(())
    }
}

/// Legacy builds run natively, so each build-for becomes the build-on of its
/// request. `all` has no machine of its own and falls back to the build-on
/// the plan assigns it (or the host).
pub fn map_build_for_to_build_on(architectures: &[String], plan: &BuildPlan) -> Vec<String> {
    let mut mapped: Vec<String> = Vec::new();
    for arch in architectures {
        let candidates: Vec<String> = if arch == ARCH_ALL {
            let build_ons: Vec<String> = plan
                .iter()
                .filter(|info| info.build_for == ARCH_ALL)
                .map(|info| info.build_on.clone())
                .collect();
            if build_ons.is_empty() {
                vec![DebianArchitecture::from_host().to_string()]
            } else {
                build_ons
            }
        } else {
            vec![arch.clone()]
        };

        for candidate in candidates {
            if !mapped.contains(&candidate) {
                mapped.push(candidate);
            }
        }
    }
    mapped
}

#[async_trait]
impl RemoteBuilder for FarmBuilder {
    fn set_project(&mut self, project: &str) {
        self.farm_project = Some(project.to_string());
    }

    async fn is_project_private(&self) -> Result<bool> {
        match &self.farm_project {
            Some(name) => Ok(self.client.get_project(name).await?.private),
            None => Ok(false),
        }
    }

    async fn start_builds(
        &mut self,
        build_id: &str,
        project_dir: &Path,
        architectures: &[String],
    ) -> Result<Vec<Build>> {
        git_upload::ensure_not_shallow(project_dir)?;

        let work_dir = tempfile::tempdir()?;
        self.prepare_upload(project_dir, work_dir.path())?;
        git_upload::commit_work_tree(work_dir.path(), &format!("remote-build {}", build_id))?;

        self.build_id = Some(build_id.to_string());
        let git_url = self
            .client
            .create_repository(build_id, self.farm_project.as_deref())
            .await?;
        git_upload::push_work_tree(work_dir.path(), &git_url, self.client.token())?;

        let request = BuildRequest {
            build_id: build_id.to_string(),
            project: self.farm_project.clone(),
            snap_name: self.project_file.project.name.clone(),
            architectures: self.request_architectures(architectures),
            variant: self.variant,
        };
        let builds = self.client.request_builds(&request).await?;
        tracing::debug!("Farm accepted {} builds", builds.len());
        Ok(builds)
    }

    async fn resume_builds(&mut self, build_id: &str) -> Result<Vec<Build>> {
        self.build_id = Some(build_id.to_string());
        self.client.get_builds(build_id).await
    }

    async fn poll_states(&self) -> Result<BTreeMap<String, BuildState>> {
        let builds = self.client.get_builds(self.active_build_id()?).await?;
        Ok(builds.into_iter().map(|b| (b.arch, b.state)).collect())
    }

    async fn cancel_builds(&self) -> Result<()> {
        self.client.cancel_builds(self.active_build_id()?).await
    }

    async fn fetch_logs(&self, output_dir: &Path) -> Result<BTreeMap<String, Option<PathBuf>>> {
        let build_id = self.active_build_id()?;
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut logs = BTreeMap::new();

        for build in self.client.get_builds(build_id).await? {
            // arch 會成為檔名的一部分
            if Path::new(&build.arch).file_name() != Some(OsStr::new(&build.arch)) {
                tracing::warn!("Skipping log for invalid architecture '{}'", build.arch);
                logs.insert(build.arch, None);
                continue;
            }
            let path = match self.client.get_log(build_id, &build.arch).await? {
                Some(content) => {
                    let path = output_dir.join(format!(
                        "{}_{}-{}.txt",
                        self.project_file.project.name, build.arch, timestamp
                    ));
                    std::fs::write(&path, content)?;
                    Some(path)
                }
                None => None,
            };
            logs.insert(build.arch, path);
        }
        Ok(logs)
    }

    async fn fetch_artifacts(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let build_id = self.active_build_id()?;
        let mut artifacts = Vec::new();

        for artifact in self.client.list_artifacts(build_id).await? {
            // 只取檔名，避免寫出輸出目錄之外
            let Some(file_name) = Path::new(&artifact.name).file_name() else {
                tracing::warn!("Skipping artifact with invalid name '{}'", artifact.name);
                continue;
            };
            let content = self.client.download(&artifact.url).await?;
            let path = output_dir.join(file_name);
            std::fs::write(&path, content)?;
            tracing::debug!("Downloaded {} artifact {}", artifact.arch, path.display());
            artifacts.push(path);
        }
        Ok(artifacts)
    }

    async fn cleanup(&self) -> Result<()> {
        match &self.build_id {
            Some(build_id) => self.client.delete_repository(build_id).await,
            None => Ok(()),
        }
    }
}
