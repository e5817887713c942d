use crate::core::build_id::get_build_id;
use crate::domain::model::{
    is_supported_arch, is_valid_build_for, Build, BuildPlan, BuildState, BuilderVariant,
    DebianArchitecture, SUPPORTED_ARCHS,
};
use crate::domain::ports::{Prompter, RemoteBuilder};
use crate::project::build_plan::{filter_plan, get_build_plan, has_declared_architectures};
use crate::project::Project;
use crate::utils::error::{RemoteBuildError, Result, EX_OK, EX_TEMPFAIL};
use crate::utils::validation::humanize_list;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

pub const APP_NAME: &str = "snapcraft";

const CONFIRMATION_PROMPT: &str = "All data sent to remote builders will be publicly available. \
                                   Are you sure you want to continue?";

#[derive(Debug, Clone)]
pub struct RemoteBuildOptions {
    pub recover: bool,
    pub status: bool,
    pub launchpad_accept_public_upload: bool,
    /// Seconds to wait for the farm; 0 waits forever.
    pub launchpad_timeout: u64,
    pub build_id: Option<String>,
    pub build_fors: Option<Vec<String>>,
    pub build_ons: Option<Vec<String>>,
    pub project: Option<String>,
    pub project_dir: PathBuf,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
}

impl Default for RemoteBuildOptions {
    fn default() -> Self {
        Self {
            recover: false,
            status: false,
            launchpad_accept_public_upload: false,
            launchpad_timeout: 0,
            build_id: None,
            build_fors: None,
            build_ons: None,
            project: None,
            project_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Progress line for one poll: stopped, building, uploading, succeeded, pending.
pub fn format_progress(states: &BTreeMap<String, BuildState>) -> String {
    let mut building = Vec::new();
    let mut succeeded = Vec::new();
    let mut uploading = Vec::new();
    let mut pending = Vec::new();
    let mut not_building = Vec::new();

    // BTreeMap 已排序，各組保持字母順序
    for (arch, state) in states {
        let arch = arch.as_str();
        if state.is_running() {
            building.push(arch);
        } else if *state == BuildState::Success {
            succeeded.push(arch);
        } else if *state == BuildState::Uploading {
            uploading.push(arch);
        } else if *state == BuildState::Pending {
            pending.push(arch);
        } else {
            not_building.push(arch);
        }
    }

    let mut parts = Vec::new();
    if !not_building.is_empty() {
        parts.push(format!("Stopped: {}", not_building.join(",")));
    }
    if !building.is_empty() {
        parts.push(format!("Building: {}", building.join(", ")));
    }
    if !uploading.is_empty() {
        parts.push(format!("Uploading: {}", uploading.join(",")));
    }
    if !succeeded.is_empty() {
        parts.push(format!("Succeeded: {}", succeeded.join(", ")));
    }
    if !pending.is_empty() {
        parts.push(format!("Pending: {}", pending.join(", ")));
    }
    parts.join("; ")
}

/// The `remote-build` command: validates the request, uploads the project,
/// follows the builds and collects their output.
pub struct RemoteBuildCommand<B: RemoteBuilder, P: Prompter> {
    builder: B,
    prompter: P,
    project: Project,
    variant: BuilderVariant,
    build_plan: BuildPlan,
    options: RemoteBuildOptions,
}

impl<B: RemoteBuilder, P: Prompter> RemoteBuildCommand<B, P> {
    pub fn new(
        builder: B,
        prompter: P,
        project: Project,
        variant: BuilderVariant,
        options: RemoteBuildOptions,
    ) -> Self {
        let build_plan = get_build_plan(&project);
        Self {
            builder,
            prompter,
            project,
            variant,
            build_plan,
            options,
        }
    }

    /// Replace the resolved build plan.
    pub fn with_build_plan(mut self, build_plan: BuildPlan) -> Self {
        self.build_plan = build_plan;
        self
    }

    /// Run the command and return the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        if let Some(project) = self.options.project.clone() {
            self.builder.set_project(&project);
        }

        tracing::warn!("remote-build is experimental and is subject to change. Use with caution.");
        tracing::debug!("Build plan: {:?}", self.build_plan);
        tracing::trace!("Project directory: {}", self.options.project_dir.display());

        let build_id = match &self.options.build_id {
            Some(build_id) => build_id.clone(),
            None => get_build_id(APP_NAME, &self.project.name, &self.options.project_dir)?,
        };

        if self.options.status {
            return self.show_status(&build_id).await;
        }

        self.validate().await?;
        let archs = self.get_archs()?;

        // 上傳時間也計入逾時
        let deadline = (self.options.launchpad_timeout > 0).then(|| {
            tracing::debug!("Setting timeout to {} seconds", self.options.launchpad_timeout);
            Instant::now() + Duration::from_secs(self.options.launchpad_timeout)
        });

        let builds = if self.options.recover {
            tracing::info!("Recovering build {}", build_id);
            self.builder.resume_builds(&build_id).await?
        } else {
            tracing::info!("Starting new build. It may take a while to upload large projects.");
            let project_dir = self.options.project_dir.clone();
            match self.builder.start_builds(&build_id, &project_dir, &archs).await {
                Ok(builds) => builds,
                Err(RemoteBuildError::RepositoryConflict { .. }) => {
                    tracing::warn!("Remote repository already exists.");
                    self.cleanup().await;
                    return Ok(EX_TEMPFAIL);
                }
                Err(e) => {
                    tracing::warn!("Starting build failed.");
                    self.cleanup().await;
                    return Err(e);
                }
            }
        };

        let outcome = tokio::select! {
            result = self.monitor_and_complete(&build_id, &builds, deadline) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        let returncode = match outcome {
            Some(Ok(code)) => code,
            Some(Err(e)) => {
                tracing::error!("Remote build failed: {}", e);
                1
            }
            None => return self.handle_interrupt().await,
        };

        // 逾時的建置仍在進行中，保留遠端倉庫以便 --recover
        if returncode != EX_TEMPFAIL {
            self.cleanup().await;
        }
        Ok(returncode)
    }

    /// Ctrl-C while monitoring: optionally cancel the builds, never fail the run.
    pub async fn handle_interrupt(&self) -> Result<i32> {
        if self.prompter.confirm("Cancel builds?", true) {
            tracing::info!("Cancelling builds.");
            self.builder.cancel_builds().await?;
            self.cleanup().await;
        }
        Ok(EX_OK)
    }

    async fn cleanup(&self) {
        tracing::info!("Cleaning up");
        if let Err(e) = self.builder.cleanup().await {
            tracing::warn!("Cleanup failed: {}", e);
        }
    }

    async fn show_status(&mut self, build_id: &str) -> Result<i32> {
        let mut builds = self.builder.resume_builds(build_id).await?;
        builds.sort_by(|a, b| a.arch.cmp(&b.arch));

        if builds.is_empty() {
            println!("No builds found for {}", build_id);
        }
        for build in &builds {
            println!("{}: {}", build.arch, build.state);
        }
        Ok(EX_OK)
    }

    /// Pre-build validation.
    pub async fn validate(&self) -> Result<()> {
        #[cfg(unix)]
        {
            if std::env::var_os("SUDO_USER").is_some() && nix::unistd::Uid::effective().is_root() {
                tracing::warn!("Running with 'sudo' may cause permission errors and is discouraged.");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        let acknowledged = self.options.launchpad_accept_public_upload
            || (self.options.project.is_some() && self.builder.is_project_private().await?);
        if !acknowledged && !self.prompter.confirm(CONFIRMATION_PROMPT, false) {
            return Err(RemoteBuildError::PublicUploadNotAcknowledged);
        }

        for build_for in self.options.build_fors.iter().flatten() {
            if !is_valid_build_for(build_for) {
                return Err(RemoteBuildError::UnsupportedArchitecture {
                    arch: build_for.clone(),
                    supported: humanize_list(&SUPPORTED_ARCHS, "and"),
                });
            }
        }

        if let Some(build_ons) = &self.options.build_ons {
            if self.variant != BuilderVariant::Legacy {
                return Err(RemoteBuildError::BuildOnNotSupported);
            }
            for build_on in build_ons {
                if !is_supported_arch(build_on) {
                    return Err(RemoteBuildError::UnsupportedBuildOnArchitecture {
                        arch: build_on.clone(),
                        supported: humanize_list(&SUPPORTED_ARCHS, "and"),
                    });
                }
            }
        }

        self.validate_single_artifact_per_build_on()
    }

    /// Each build-on may produce one snap only.
    pub fn validate_single_artifact_per_build_on(&self) -> Result<()> {
        let mut build_map: Vec<(&str, Vec<&str>)> = Vec::new();
        for info in &self.build_plan {
            match build_map.iter_mut().find(|(on, _)| *on == info.build_on.as_str()) {
                Some((_, fors)) => fors.push(info.build_for.as_str()),
                None => build_map.push((info.build_on.as_str(), vec![info.build_for.as_str()])),
            }
        }

        // 一次列出所有錯誤
        let details: String = build_map
            .iter()
            .filter(|(_, fors)| fors.len() > 1)
            .map(|(on, fors)| {
                format!(
                    "\n  - Building on '{}' will create snaps for {}.",
                    on,
                    humanize_list(fors, "and")
                )
            })
            .collect();

        if !details.is_empty() {
            return Err(RemoteBuildError::MultipleArtifactsPerBuildOn { details });
        }
        Ok(())
    }

    /// Architectures to build for: the plan (filtered by `--build-for` when
    /// the project declares architectures), else the command line, else the host.
    pub fn get_archs(&self) -> Result<Vec<String>> {
        let build_fors = self.options.build_fors.as_ref().filter(|b| !b.is_empty());
        let build_ons = self.options.build_ons.as_ref().filter(|b| !b.is_empty());

        let archs: Vec<String> = if has_declared_architectures(&self.project) {
            if let Some(build_fors) = build_fors {
                tracing::debug!("Filtering the build plan using the '--build-for' argument.");
                let mut archs = Vec::new();
                for build_for in build_fors {
                    archs.extend(
                        filter_plan(&self.build_plan, build_for)
                            .into_iter()
                            .map(|info| info.build_for),
                    );
                    if archs.is_empty() {
                        return Err(RemoteBuildError::EmptyBuildPlan);
                    }
                }
                archs
            } else if let Some(build_ons) = build_ons {
                tracing::debug!("Filtering the build plan using the '--build-on' argument.");
                let archs: Vec<String> = self
                    .build_plan
                    .iter()
                    .filter(|info| build_ons.contains(&info.build_on))
                    .map(|info| info.build_for.clone())
                    .collect();
                if archs.is_empty() {
                    return Err(RemoteBuildError::EmptyBuildPlan);
                }
                archs
            } else {
                tracing::debug!("Using the project's build plan");
                self.build_plan.iter().map(|info| info.build_for.clone()).collect()
            }
        } else if let Some(build_fors) = build_fors {
            tracing::debug!("Using '--build-for' as the list of architectures to build for");
            build_fors.clone()
        } else if let Some(build_ons) = build_ons {
            tracing::debug!("Using '--build-on' as the list of architectures to build for");
            build_ons.clone()
        } else {
            let host = DebianArchitecture::from_host().to_string();
            tracing::debug!(
                "Using host architecture {} because no architectures were defined in the project or as a command-line argument.",
                host
            );
            vec![host]
        };

        tracing::debug!("Architectures to build for: {}", humanize_list(&archs, "and"));
        Ok(archs)
    }

    /// Poll until every build finished. `None` when the timeout ran out first.
    async fn wait_for_builds(
        &self,
        deadline: Option<Instant>,
    ) -> Result<Option<BTreeMap<String, BuildState>>> {
        loop {
            let states = self.builder.poll_states().await?;
            tracing::info!("{}", format_progress(&states));

            if states.values().all(|state| state.is_finished()) {
                return Ok(Some(states));
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(self.options.poll_interval.min(deadline - now)).await;
                }
                None => tokio::time::sleep(self.options.poll_interval).await,
            }
        }
    }

    async fn monitor_and_complete(
        &self,
        build_id: &str,
        builds: &[Build],
        deadline: Option<Instant>,
    ) -> Result<i32> {
        tracing::info!("Monitoring build");

        let Some(states) = self.wait_for_builds(deadline).await? else {
            let resume_command = format!("{} remote-build --recover --build-id={}", APP_NAME, build_id);
            println!(
                "Timed out waiting for build.\nTo resume, run '{}'",
                resume_command
            );
            return Ok(EX_TEMPFAIL);
        };

        let mut return_code = EX_OK;

        for (arch, state) in &states {
            if state.is_failure() {
                tracing::warn!("Build for architecture {} failed.", arch);
                return_code = 1;
            }
        }

        tracing::info!("Fetching {} build logs...", builds.len());
        let logs = self.builder.fetch_logs(&self.options.output_dir).await?;
        if logs.values().all(Option::is_none) {
            return_code = 1;
            tracing::warn!("No log files downloaded from the build farm.");
        }

        tracing::info!("Fetching build artifacts...");
        let artifacts = self.builder.fetch_artifacts(&self.options.output_dir).await?;
        if artifacts.is_empty() {
            return_code = 1;
            tracing::warn!("No build artifacts downloaded from the build farm.");
        }

        let mut log_names: Vec<String> = logs
            .values()
            .flatten()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        log_names.sort();
        let mut artifact_names: Vec<String> = artifacts
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        artifact_names.sort();

        println!(
            "Build completed.\nLog files: {}\nArtifacts: {}",
            log_names.join(", "),
            artifact_names.join(", ")
        );
        Ok(return_code)
    }
}
