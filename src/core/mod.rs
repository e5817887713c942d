pub mod build_id;
pub mod remote_build;

pub use crate::domain::model::{Build, BuildInfo, BuildPlan, BuildState, BuilderVariant};
pub use crate::domain::ports::{Prompter, RemoteBuilder};
pub use crate::utils::error::Result;
