use clap::Parser;
use snapcraft_remote::adapters::prompt::TerminalPrompter;
use snapcraft_remote::config::cli::{Cli, Command};
use snapcraft_remote::config::{select_builder, RemoteBuildStrategy, TomlConfig};
use snapcraft_remote::project::{build_plan::get_build_plan, load_project};
use snapcraft_remote::utils::error::RemoteBuildError;
use snapcraft_remote::utils::{logger, validation::Validate};
use snapcraft_remote::{FarmBuilder, FarmClient, RemoteBuildCommand, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("❌ remote-build failed: {} (Category: {:?})", e, e.category());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = TomlConfig::load(cli.config.as_deref())?;
    config.validate()?;

    // 命令列優先於設定檔
    let farm_url = cli
        .farm_url
        .or_else(|| config.farm.url.clone())
        .ok_or_else(|| RemoteBuildError::MissingConfigError {
            field: "farm.url".to_string(),
        })?;
    let farm_token = cli.farm_token.or_else(|| config.farm.token.clone());

    let project_dir = cli.project_dir.canonicalize().map_err(|_| {
        RemoteBuildError::ProjectNotFound {
            path: cli.project_dir.display().to_string(),
        }
    })?;

    let Command::RemoteBuild(args) = cli.command;

    let project_file = load_project(&project_dir)?;
    tracing::debug!("Using project file {}", project_file.path.display());

    let strategy = RemoteBuildStrategy::from_env()?;
    let variant = select_builder(project_file.project.effective_base(), strategy)?;
    let build_plan = get_build_plan(&project_file.project);

    let client = FarmClient::new(&farm_url, farm_token)?;
    let project = project_file.project.clone();
    let builder = FarmBuilder::new(
        client,
        variant,
        project_file,
        build_plan.clone(),
        config.upload_excludes(),
    );

    let options = args.into_options(project_dir, config.poll_interval());
    let mut command = RemoteBuildCommand::new(builder, TerminalPrompter, project, variant, options)
        .with_build_plan(build_plan);

    command.run().await
}
