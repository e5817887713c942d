use crate::domain::model::BuilderVariant;
use crate::utils::error::{RemoteBuildError, Result};

pub const STRATEGY_ENV_VAR: &str = "SNAPCRAFT_REMOTE_BUILD_STRATEGY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBuildStrategy {
    /// Use the current remote builder.
    DisableFallback,
    /// Use the legacy remote builder.
    ForceFallback,
}

impl RemoteBuildStrategy {
    pub fn from_env() -> Result<Option<Self>> {
        Self::parse(std::env::var(STRATEGY_ENV_VAR).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Result<Option<Self>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some("disable-fallback") => Ok(Some(Self::DisableFallback)),
            Some("force-fallback") => Ok(Some(Self::ForceFallback)),
            Some(other) => Err(RemoteBuildError::InvalidStrategy {
                value: other.to_string(),
            }),
        }
    }
}

/// Pick the builder for a project base. core20 only works with the legacy
/// builder, core22 works with both, newer bases only with the current one.
pub fn select_builder(
    base: Option<&str>,
    strategy: Option<RemoteBuildStrategy>,
) -> Result<BuilderVariant> {
    let incompatible = |variant: BuilderVariant| RemoteBuildError::IncompatibleBuilder {
        variant: variant.to_string(),
        base: base.unwrap_or("unset").to_string(),
    };

    let variant = match (base, strategy) {
        (Some("core20"), Some(RemoteBuildStrategy::DisableFallback)) => {
            return Err(incompatible(BuilderVariant::Current))
        }
        (Some("core20"), _) => BuilderVariant::Legacy,
        (Some("core22"), Some(RemoteBuildStrategy::ForceFallback)) => BuilderVariant::Legacy,
        (Some("core22"), _) => BuilderVariant::Current,
        (_, Some(RemoteBuildStrategy::ForceFallback)) => {
            return Err(incompatible(BuilderVariant::Legacy))
        }
        _ => BuilderVariant::Current,
    };

    tracing::debug!(
        "Selected {} remote builder for base {:?} (strategy {:?})",
        variant,
        base,
        strategy
    );
    Ok(variant)
}
