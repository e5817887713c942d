// Adapters layer: concrete implementations for external systems (farm API, git, tarballs, prompts).

pub mod builder;
pub mod farm_client;
pub mod git_upload;
pub mod prompt;
pub mod tarball;
