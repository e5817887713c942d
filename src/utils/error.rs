use thiserror::Error;

/// sysexits.h
pub const EX_OK: i32 = 0;
pub const EX_TEMPFAIL: i32 = 75;
pub const EX_NOPERM: i32 = 77;
pub const EX_CONFIG: i32 = 78;

#[derive(Error, Debug)]
pub enum RemoteBuildError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid project YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Git operation failed: {0}")]
    GitError(#[from] git2::Error),

    #[error("Could not walk the project directory: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Could not find snapcraft.yaml in {path}")]
    ProjectNotFound { path: String },

    #[error("Issues while validating snapcraft.yaml: {message}")]
    InvalidProject { message: String },

    #[error("Remote build needs explicit acknowledgement that data sent to build servers is public.")]
    PublicUploadNotAcknowledged,

    #[error("Unsupported build-for architecture '{arch}'.")]
    UnsupportedArchitecture { arch: String, supported: String },

    #[error("Unsupported build-on architecture '{arch}'.")]
    UnsupportedBuildOnArchitecture { arch: String, supported: String },

    #[error("Remote build does not support building multiple snaps on the same architecture:{details}")]
    MultipleArtifactsPerBuildOn { details: String },

    #[error("No build matches the current execution environment.")]
    EmptyBuildPlan,

    #[error("Unknown value '{value}' in environment variable SNAPCRAFT_REMOTE_BUILD_STRATEGY.")]
    InvalidStrategy { value: String },

    #[error("The {variant} remote builder does not support base '{base}'.")]
    IncompatibleBuilder { variant: String, base: String },

    #[error("'--build-on' is only supported by the legacy remote builder.")]
    BuildOnNotSupported,

    #[error("Remote builds are not supported for shallowly cloned repositories: {path}")]
    ShallowClone { path: String },

    #[error("Remote repository for build '{build_id}' already exists.")]
    RepositoryConflict { build_id: String },

    #[error("Project '{name}' does not exist on the build farm.")]
    FarmProjectNotFound { name: String },

    #[error("Build farm returned {status}: {message}")]
    FarmError { status: u16, message: String },

    #[error("No builds have been started.")]
    NoActiveBuilds,
}

pub type Result<T> = std::result::Result<T, RemoteBuildError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Project,
    Configuration,
    Permission,
    Source,
    System,
}

impl RemoteBuildError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::FarmError { .. } | Self::RepositoryConflict { .. } => {
                ErrorCategory::Network
            }
            Self::ProjectNotFound { .. }
            | Self::InvalidProject { .. }
            | Self::YamlError(_)
            | Self::EmptyBuildPlan
            | Self::MultipleArtifactsPerBuildOn { .. }
            | Self::UnsupportedArchitecture { .. }
            | Self::UnsupportedBuildOnArchitecture { .. } => ErrorCategory::Project,
            Self::ConfigError { .. }
            | Self::TomlError(_)
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidStrategy { .. }
            | Self::IncompatibleBuilder { .. }
            | Self::BuildOnNotSupported
            | Self::FarmProjectNotFound { .. } => ErrorCategory::Configuration,
            Self::PublicUploadNotAcknowledged => ErrorCategory::Permission,
            Self::ShallowClone { .. } | Self::GitError(_) | Self::WalkError(_) => {
                ErrorCategory::Source
            }
            Self::IoError(_) | Self::SerializationError(_) | Self::NoActiveBuilds => {
                ErrorCategory::System
            }
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PublicUploadNotAcknowledged => EX_NOPERM,
            Self::UnsupportedArchitecture { .. }
            | Self::UnsupportedBuildOnArchitecture { .. }
            | Self::MultipleArtifactsPerBuildOn { .. }
            | Self::InvalidStrategy { .. }
            | Self::IncompatibleBuilder { .. }
            | Self::BuildOnNotSupported
            | Self::ConfigError { .. }
            | Self::TomlError(_)
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => EX_CONFIG,
            Self::RepositoryConflict { .. } => EX_TEMPFAIL,
            _ => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::PublicUploadNotAcknowledged => {
                "In non-interactive runs, please use the option `--launchpad-accept-public-upload`."
                    .to_string()
            }
            Self::UnsupportedArchitecture { supported, .. }
            | Self::UnsupportedBuildOnArchitecture { supported, .. } => format!(
                "Use a supported debian architecture. Supported architectures are: {}",
                supported
            ),
            Self::MultipleArtifactsPerBuildOn { .. } => {
                "Ensure that only one snap will be created for each build-on architecture."
                    .to_string()
            }
            Self::EmptyBuildPlan => {
                "Check the '--build-for' values against the project's platforms or architectures."
                    .to_string()
            }
            Self::InvalidStrategy { .. } => {
                "Valid values are 'disable-fallback' and 'force-fallback'.".to_string()
            }
            Self::IncompatibleBuilder { .. } => {
                "Unset SNAPCRAFT_REMOTE_BUILD_STRATEGY or change the project base.".to_string()
            }
            Self::BuildOnNotSupported => "Use '--build-for' instead.".to_string(),
            Self::ShallowClone { .. } => {
                "Fetch the full history with 'git fetch --unshallow' and try again.".to_string()
            }
            Self::RepositoryConflict { .. } => {
                "Wait for the previous build to finish or recover it with '--recover'.".to_string()
            }
            Self::ProjectNotFound { .. } => {
                "To start a new project, use 'snapcraft init'.".to_string()
            }
            Self::InvalidProject { .. } | Self::YamlError(_) => {
                "Fix the reported issue in snapcraft.yaml.".to_string()
            }
            Self::FarmProjectNotFound { .. } => {
                "Check the name passed to '--project'.".to_string()
            }
            Self::ApiError(_) | Self::FarmError { .. } => {
                "Check network connectivity and the build farm URL.".to_string()
            }
            Self::ConfigError { .. }
            | Self::TomlError(_)
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Check the configuration file and command-line arguments.".to_string()
            }
            Self::GitError(_) | Self::WalkError(_) => {
                "Check that the project directory is readable.".to_string()
            }
            Self::IoError(_) | Self::SerializationError(_) | Self::NoActiveBuilds => {
                "Run again with --verbose for more details.".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(e) if e.is_timeout() => "The build farm did not respond in time.".to_string(),
            Self::ApiError(e) if e.is_connect() => "Could not connect to the build farm.".to_string(),
            _ => self.to_string(),
        }
    }
}
