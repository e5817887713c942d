#[cfg(feature = "cli")]
pub mod cli;
pub mod strategy;
pub mod toml_config;

pub use strategy::{select_builder, RemoteBuildStrategy};
pub use toml_config::TomlConfig;
