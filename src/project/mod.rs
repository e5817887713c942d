//! Project metadata (`snapcraft.yaml`) loading and validation.

pub mod build_plan;

use crate::domain::model::{is_supported_arch, is_valid_build_for, SUPPORTED_ARCHS};
use crate::utils::error::{RemoteBuildError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Candidate locations, in lookup order.
pub const PROJECT_FILE_CANDIDATES: [&str; 3] =
    ["snap/snapcraft.yaml", "snapcraft.yaml", ".snapcraft.yaml"];

const MAX_SUMMARY_LENGTH: usize = 78;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub name: String,
    pub build_on: Vec<String>,
    pub build_for: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureEntry {
    pub build_on: Vec<String>,
    pub build_for: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub base: Option<String>,
    pub build_base: Option<String>,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub platforms: Option<Vec<Platform>>,
    pub architectures: Option<Vec<ArchitectureEntry>>,
    pub parts: Vec<Part>,
}

/// A project together with the file it was read from and its raw document.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub document: serde_yaml::Value,
    pub project: Project,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawPlatform {
    build_on: Option<OneOrMany>,
    build_for: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawArchitectureEntry {
    build_on: OneOrMany,
    build_for: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArchitecture {
    Name(String),
    Entry(RawArchitectureEntry),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawProject {
    name: Option<String>,
    base: Option<String>,
    build_base: Option<String>,
    version: Option<serde_yaml::Value>,
    summary: Option<String>,
    platforms: Option<serde_yaml::Mapping>,
    architectures: Option<Vec<RawArchitecture>>,
    parts: Option<serde_yaml::Mapping>,
}

fn invalid(message: impl Into<String>) -> RemoteBuildError {
    RemoteBuildError::InvalidProject {
        message: message.into(),
    }
}

impl Project {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_document(&document)
    }

    pub fn from_document(document: &serde_yaml::Value) -> Result<Self> {
        let raw: RawProject = serde_yaml::from_value(document.clone())?;

        let name = raw
            .name
            .ok_or_else(|| invalid("'name' is a required property"))?;
        let name_pattern = Regex::new(r"^[a-z0-9][a-z0-9+-]*$").map_err(|e| invalid(e.to_string()))?;
        if !name_pattern.is_match(&name) {
            return Err(invalid(format!(
                "'{}' does not match '^[a-z0-9][a-z0-9+-]*$'",
                name
            )));
        }

        if let Some(summary) = &raw.summary {
            if summary.chars().count() > MAX_SUMMARY_LENGTH {
                return Err(invalid(format!("'{}' is too long", summary)));
            }
        }

        if raw.platforms.is_some() && raw.architectures.is_some() {
            return Err(invalid(
                "'platforms' and 'architectures' cannot be used together",
            ));
        }

        let platforms = raw.platforms.map(parse_platforms).transpose()?;
        let architectures = raw.architectures.map(parse_architectures).transpose()?;

        let version = raw.version.and_then(|v| match v {
            serde_yaml::Value::String(s) => Some(s),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let parts = raw
            .parts
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| {
                let name = key.as_str()?.to_string();
                let source = value
                    .get("source")
                    .and_then(|s| s.as_str())
                    .map(str::to_string);
                Some(Part { name, source })
            })
            .collect();

        Ok(Self {
            name,
            base: raw.base,
            build_base: raw.build_base,
            version,
            summary: raw.summary,
            platforms,
            architectures,
            parts,
        })
    }

    /// The base that determines the project's schema version.
    pub fn effective_base(&self) -> Option<&str> {
        match (self.base.as_deref(), self.build_base.as_deref()) {
            (None | Some("bare"), Some(build_base)) => Some(build_base),
            (base, _) => base,
        }
    }
}

fn check_build_on(arch: &str) -> Result<()> {
    if !is_supported_arch(arch) {
        return Err(invalid(format!(
            "'{}' is not a valid build-on architecture. Valid architectures are: {}",
            arch,
            SUPPORTED_ARCHS.join(", ")
        )));
    }
    Ok(())
}

fn check_build_for(mut values: Vec<String>) -> Result<String> {
    if values.len() != 1 {
        return Err(invalid(format!(
            "build-for must list exactly one architecture, got {}",
            values.len()
        )));
    }
    let arch = values.remove(0);
    if !is_valid_build_for(&arch) {
        return Err(invalid(format!(
            "'{}' is not a valid build-for architecture",
            arch
        )));
    }
    Ok(arch)
}

fn parse_platforms(mapping: serde_yaml::Mapping) -> Result<Vec<Platform>> {
    let mut platforms = Vec::with_capacity(mapping.len());

    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| invalid("platform names must be strings"))?
            .to_string();

        let platform = if value.is_null() {
            // shorthand: `amd64:` builds on and for amd64
            if !is_supported_arch(&name) {
                return Err(invalid(format!(
                    "platform '{}' must define 'build-on' and 'build-for' because it is not a supported architecture",
                    name
                )));
            }
            Platform {
                build_on: vec![name.clone()],
                build_for: name.clone(),
                name,
            }
        } else {
            let raw: RawPlatform = serde_yaml::from_value(value)?;
            let build_on = raw
                .build_on
                .ok_or_else(|| invalid(format!("platform '{}' is missing 'build-on'", name)))?
                .into_vec();
            if build_on.is_empty() {
                return Err(invalid(format!("platform '{}' has an empty 'build-on'", name)));
            }
            for arch in &build_on {
                check_build_on(arch)?;
            }
            let build_for = match raw.build_for {
                Some(build_for) => check_build_for(build_for.into_vec())?,
                None if is_supported_arch(&name) => name.clone(),
                None => {
                    return Err(invalid(format!(
                        "platform '{}' is missing 'build-for'",
                        name
                    )))
                }
            };
            Platform {
                name,
                build_on,
                build_for,
            }
        };
        platforms.push(platform);
    }

    Ok(platforms)
}

fn parse_architectures(entries: Vec<RawArchitecture>) -> Result<Vec<ArchitectureEntry>> {
    let mut seen_build_on: HashSet<String> = HashSet::new();
    let mut parsed = Vec::with_capacity(entries.len());

    for entry in entries {
        let (build_on, build_for) = match entry {
            RawArchitecture::Name(arch) => (vec![arch], None),
            RawArchitecture::Entry(e) => (
                e.build_on.into_vec(),
                e.build_for.map(|b| check_build_for(b.into_vec())).transpose()?,
            ),
        };

        if build_on.is_empty() {
            return Err(invalid("'build-on' cannot be empty"));
        }
        for arch in &build_on {
            check_build_on(arch)?;
            // 同一個 build-on 只能出現一次
            if !seen_build_on.insert(arch.clone()) {
                return Err(invalid(format!(
                    "multiple items will build snaps that claim to run on '{}'; an architecture can only be listed once across all build-on keys",
                    arch
                )));
            }
        }

        parsed.push(ArchitectureEntry {
            build_on,
            build_for,
        });
    }

    Ok(parsed)
}

/// Find the project file under `project_dir`.
pub fn find_project_file(project_dir: &Path) -> Result<PathBuf> {
    PROJECT_FILE_CANDIDATES
        .iter()
        .map(|candidate| project_dir.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| RemoteBuildError::ProjectNotFound {
            path: project_dir.display().to_string(),
        })
}

pub fn load_project(project_dir: &Path) -> Result<ProjectFile> {
    let path = find_project_file(project_dir)?;
    tracing::debug!("Loading project from {}", path.display());

    let content = std::fs::read_to_string(&path)?;
    let document: serde_yaml::Value = serde_yaml::from_str(&content)?;
    let project = Project::from_document(&document)?;

    Ok(ProjectFile {
        path,
        document,
        project,
    })
}
