use crate::domain::model::{Build, BuilderVariant};
use crate::utils::error::{RemoteBuildError, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Deserialize)]
pub struct FarmProject {
    pub name: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildRequest {
    pub build_id: String,
    pub project: Option<String>,
    pub snap_name: String,
    pub architectures: Vec<String>,
    pub variant: BuilderVariant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactRef {
    pub arch: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct RepositoryRequest<'a> {
    build_id: &'a str,
    project: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    git_url: String,
}

#[derive(Debug, Deserialize)]
struct BuildsResponse {
    builds: Vec<Build>,
}

#[derive(Debug, Deserialize)]
struct ArtifactsResponse {
    artifacts: Vec<ArtifactRef>,
}

/// HTTP client for the build farm API.
#[derive(Debug, Clone)]
pub struct FarmClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl FarmClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        // 確保結尾有 '/'，否則 Url::join 會吃掉最後一段路徑
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|e| {
            RemoteBuildError::InvalidConfigValueError {
                field: "farm.url".to_string(),
                value: base_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteBuildError::ConfigError {
                message: format!("Invalid farm endpoint '{}': {}", path, e),
            })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(RemoteBuildError::FarmError {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get_project(&self, name: &str) -> Result<FarmProject> {
        let url = self.endpoint(&format!("projects/{}", name))?;
        tracing::debug!("Fetching farm project {}", url);

        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteBuildError::FarmProjectNotFound {
                name: name.to_string(),
            });
        }
        Ok(Self::check(response).await?.json().await?)
    }

    /// Create the git repository that receives the upload; returns its URL.
    pub async fn create_repository(&self, build_id: &str, project: Option<&str>) -> Result<String> {
        let url = self.endpoint("repositories")?;
        let response = self
            .request(Method::POST, url)
            .json(&RepositoryRequest { build_id, project })
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(RemoteBuildError::RepositoryConflict {
                build_id: build_id.to_string(),
            });
        }
        let body: RepositoryResponse = Self::check(response).await?.json().await?;
        tracing::debug!("Repository for {} created at {}", build_id, body.git_url);
        Ok(body.git_url)
    }

    pub async fn delete_repository(&self, build_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("repositories/{}", build_id))?;
        let response = self.request(Method::DELETE, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Repository for {} was already removed", build_id);
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    pub async fn request_builds(&self, request: &BuildRequest) -> Result<Vec<Build>> {
        let url = self.endpoint("builds")?;
        tracing::debug!(
            "Requesting builds for {} on {:?}",
            request.build_id,
            request.architectures
        );
        let response = self.request(Method::POST, url).json(request).send().await?;
        let body: BuildsResponse = Self::check(response).await?.json().await?;
        Ok(body.builds)
    }

    pub async fn get_builds(&self, build_id: &str) -> Result<Vec<Build>> {
        let url = self.endpoint(&format!("builds/{}", build_id))?;
        let response = self.request(Method::GET, url).send().await?;
        let body: BuildsResponse = Self::check(response).await?.json().await?;
        Ok(body.builds)
    }

    pub async fn cancel_builds(&self, build_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("builds/{}/cancel", build_id))?;
        let response = self.request(Method::POST, url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// `None` when the farm has no log for the architecture.
    pub async fn get_log(&self, build_id: &str, arch: &str) -> Result<Option<Vec<u8>>> {
        let url = self.endpoint(&format!("builds/{}/logs/{}", build_id, arch))?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    pub async fn list_artifacts(&self, build_id: &str) -> Result<Vec<ArtifactRef>> {
        let url = self.endpoint(&format!("builds/{}/artifacts", build_id))?;
        let response = self.request(Method::GET, url).send().await?;
        let body: ArtifactsResponse = Self::check(response).await?.json().await?;
        Ok(body.artifacts)
    }

    /// Download an artifact; `location` may be absolute or relative to the farm URL.
    /// Fetch an artifact. The token is only sent to the farm's own origin.
    pub async fn download(&self, location: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(location)?;
        let request = if url.origin() == self.base_url.origin() {
            self.request(Method::GET, url)
        } else {
            tracing::debug!("Downloading {} without farm credentials", url);
            self.client.request(Method::GET, url)
        };
        let response = request.send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
