//! Client for the remote recommendation service.
//!
//! `Backend` is the seam the core loop talks to; `HttpBackend` is the real
//! implementation over reqwest. Every call either resolves or rejects; no
//! client-side timeout is imposed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::BackendConfig;
use crate::protocol::{
    CardMedia, CardMediaRequest, CandidateSong, ErrorBody, GenresResponse,
    RecommendationsRequest, RecommendationsResponse, RegisterResponse, ScoredSong, SessionId,
    StartSessionRequest, StartSessionResponse, SwipeDecision, TrackId, UserProfile,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("backend error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("rate limited, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("unreadable response: {0}")]
    Decode(String),
    #[error("backend returned no {what}")]
    Empty { what: &'static str },
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// One method per backend endpoint.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_genres(&self) -> Result<Vec<String>, ApiError>;

    async fn register(&self, profile: &UserProfile) -> Result<SessionId, ApiError>;

    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<Vec<CandidateSong>, ApiError>;

    async fn card_media(&self, track_id: &TrackId) -> Result<CardMedia, ApiError>;

    async fn commit_swipe(&self, decision: &SwipeDecision) -> Result<(), ApiError>;

    async fn recommendations(&self, session_id: &SessionId)
        -> Result<Vec<ScoredSong>, ApiError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }

    let header_retry = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body: ErrorBody = response.json().await.unwrap_or_default();

    if status.as_u16() == 429 {
        let secs = body.retry_after.or(header_retry).unwrap_or(1);
        return Err(ApiError::RateLimited {
            retry_after: Duration::from_secs(secs),
        });
    }

    let message = body.error.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_genres(&self) -> Result<Vec<String>, ApiError> {
        let resp: GenresResponse = self.get_json("/api/genres").await?;
        let mut genres = resp.genres;
        genres.sort();
        genres.dedup();
        Ok(genres)
    }

    async fn register(&self, profile: &UserProfile) -> Result<SessionId, ApiError> {
        let resp: RegisterResponse = self.post_json("/api/user-login", profile).await?;
        Ok(resp.session_id)
    }

    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<Vec<CandidateSong>, ApiError> {
        let resp: StartSessionResponse = self.post_json("/api/initial-songs", request).await?;
        if let Some(total) = resp.total_songs {
            if total != resp.songs.len() {
                debug!(
                    "initial-songs: total_songs={} but {} rows",
                    total,
                    resp.songs.len()
                );
            }
        }
        Ok(resp.songs)
    }

    async fn card_media(&self, track_id: &TrackId) -> Result<CardMedia, ApiError> {
        let body = CardMediaRequest {
            track_id: track_id.clone(),
        };
        self.post_json("/get-song-detail", &body).await
    }

    async fn commit_swipe(&self, decision: &SwipeDecision) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post_json("/api/swipe", &decision.to_request()).await?;
        Ok(())
    }

    async fn recommendations(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScoredSong>, ApiError> {
        let body = RecommendationsRequest {
            session_id: session_id.clone(),
        };
        let resp: RecommendationsResponse = self.post_json("/api/recommendations", &body).await?;
        Ok(resp.recommendations)
    }
}
