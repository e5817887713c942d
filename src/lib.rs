pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod project;
pub mod utils;

pub use adapters::{builder::FarmBuilder, farm_client::FarmClient};
pub use core::remote_build::{RemoteBuildCommand, RemoteBuildOptions, APP_NAME};
pub use utils::error::{RemoteBuildError, Result};
