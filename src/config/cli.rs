use crate::core::remote_build::RemoteBuildOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "snapcraft")]
#[command(about = "Build snaps on a remote build farm")]
pub struct Cli {
    /// Directory containing the snapcraft project
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Build farm base URL
    #[arg(long, global = true, env = "SNAPCRAFT_REMOTE_BUILD_URL")]
    pub farm_url: Option<String>,

    /// Build farm access token
    #[arg(long, global = true, env = "SNAPCRAFT_REMOTE_BUILD_TOKEN", hide_env_values = true)]
    pub farm_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Dispatch a build to the remote build farm
    RemoteBuild(RemoteBuildArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RemoteBuildArgs {
    /// Recover an interrupted build
    #[arg(long)]
    pub recover: bool,

    /// Acknowledge that uploaded code will be publicly available
    #[arg(long)]
    pub launchpad_accept_public_upload: bool,

    /// Seconds to wait for upload and builds, 0 waits forever
    #[arg(long, default_value_t = 0)]
    pub launchpad_timeout: u64,

    /// Print the state of the builds and exit
    #[arg(long)]
    pub status: bool,

    /// Specific build id to retrieve
    #[arg(long)]
    pub build_id: Option<String>,

    /// Architectures to build for
    #[arg(long, env = "CRAFT_BUILD_FOR", value_delimiter = ',', conflicts_with = "build_on")]
    pub build_for: Option<Vec<String>>,

    /// Architectures to build on (legacy builder only)
    #[arg(long, value_delimiter = ',')]
    pub build_on: Option<Vec<String>>,

    /// Farm project to build in
    #[arg(long)]
    pub project: Option<String>,

    /// Directory for downloaded logs and snaps
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

fn trimmed(values: Option<Vec<String>>) -> Option<Vec<String>> {
    values.map(|values| {
        values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    })
}

impl RemoteBuildArgs {
    pub fn into_options(self, project_dir: PathBuf, poll_interval: Duration) -> RemoteBuildOptions {
        RemoteBuildOptions {
            recover: self.recover,
            status: self.status,
            launchpad_accept_public_upload: self.launchpad_accept_public_upload,
            launchpad_timeout: self.launchpad_timeout,
            build_id: self.build_id,
            build_fors: trimmed(self.build_for),
            build_ons: trimmed(self.build_on),
            project: self.project,
            project_dir,
            output_dir: self.output_dir,
            poll_interval,
        }
    }
}
