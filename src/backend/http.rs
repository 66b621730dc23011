//! HTTP implementation of the scoring service seam, speaking JSON.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BackendError, BackendResult, ConnectivityProbe, LeaderboardRow, ScoringBackend};

/// Failures specific to building the HTTP backend.
#[derive(Debug, Error)]
pub enum HttpBackendError {
    /// Required environment variable is missing.
    #[error("missing scoring backend environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the missing variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build scoring backend client")]
    ClientBuilder {
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
}

/// Runtime configuration describing how to reach the scoring service.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the service, without a trailing slash.
    pub base_url: String,
    /// Bearer token attached to every request, when set.
    pub api_token: Option<String>,
}

impl HttpBackendConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
        }
    }

    /// Attach a bearer token to the configuration.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> Result<Self, HttpBackendError> {
        let base_url = std::env::var("SCORE_SYNC_BASE_URL")
            .map_err(|_| HttpBackendError::MissingEnvVar {
                var: "SCORE_SYNC_BASE_URL",
            })?;

        let mut config = Self::new(base_url);
        if let Ok(token) = std::env::var("SCORE_SYNC_API_TOKEN") {
            config = config.with_token(token);
        }
        Ok(config)
    }
}

/// Scoring service client over plain JSON HTTP endpoints.
#[derive(Clone)]
pub struct HttpScoringBackend {
    client: Client,
    base_url: Arc<str>,
    api_token: Option<Arc<str>>,
}

#[derive(Serialize)]
struct SubmitBody {
    score: i64,
    session_length_secs: u64,
}

#[derive(Deserialize)]
struct RejectionBody {
    reason: String,
}

impl HttpScoringBackend {
    /// Build a client from the given configuration.
    pub fn new(config: HttpBackendConfig) -> Result<Self, HttpBackendError> {
        let client = Client::builder()
            .build()
            .map_err(|source| HttpBackendError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            api_token: config.api_token.map(Arc::<str>::from),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if let Some(ref token) = self.api_token {
            builder.bearer_auth(token.as_ref())
        } else {
            builder
        }
    }

    async fn classify(response: reqwest::Response) -> BackendResult<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::AuthRequired),
            status if status.is_client_error() => {
                let reason = match response.json::<RejectionBody>().await {
                    Ok(body) => body.reason,
                    Err(_) => format!("status {status}"),
                };
                Err(BackendError::Rejected { reason })
            }
            status => Err(BackendError::transport_message(format!(
                "unexpected status {status}"
            ))),
        }
    }

    fn map_send_error(err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::transport("failed to reach scoring service", err)
        }
    }
}

impl ScoringBackend for HttpScoringBackend {
    fn submit_score(
        &self,
        stat: &str,
        score: i64,
        session_length_secs: u64,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let builder = self
            .request(reqwest::Method::POST, &format!("stats/{stat}/scores"))
            .json(&SubmitBody {
                score,
                session_length_secs,
            });

        Box::pin(async move {
            let response = builder.send().await.map_err(Self::map_send_error)?;
            Self::classify(response).await.map(|_| ())
        })
    }

    fn query_leaderboard(
        &self,
        stat: &str,
        top_n: usize,
    ) -> BoxFuture<'static, BackendResult<Vec<LeaderboardRow>>> {
        let builder = self.request(
            reqwest::Method::GET,
            &format!("stats/{stat}/leaderboard?top={top_n}"),
        );

        Box::pin(async move {
            let response = builder.send().await.map_err(Self::map_send_error)?;
            let response = Self::classify(response).await?;
            response
                .json::<Vec<LeaderboardRow>>()
                .await
                .map_err(|err| BackendError::transport("failed to decode leaderboard page", err))
        })
    }

    fn query_player_rank(
        &self,
        stat: &str,
    ) -> BoxFuture<'static, BackendResult<Option<LeaderboardRow>>> {
        let builder = self.request(reqwest::Method::GET, &format!("stats/{stat}/rank"));

        Box::pin(async move {
            let response = builder.send().await.map_err(Self::map_send_error)?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let response = Self::classify(response).await?;
            response
                .json::<Option<LeaderboardRow>>()
                .await
                .map_err(|err| BackendError::transport("failed to decode rank response", err))
        })
    }
}

/// Reachability probe that pings the service health endpoint.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client,
    url: Arc<str>,
}

impl HttpProbe {
    /// Build a probe against `base_url`'s health endpoint.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            url: Arc::<str>::from(format!("{}/health", base_url.trim_end_matches('/'))),
        }
    }
}

impl ConnectivityProbe for HttpProbe {
    fn is_reachable(&self) -> BoxFuture<'static, bool> {
        let request = self.client.get(self.url.as_ref());
        Box::pin(async move {
            match request.send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        })
    }
}
