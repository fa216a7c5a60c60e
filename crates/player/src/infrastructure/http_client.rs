//! HTTP client for the lobby and game endpoints

use std::time::Duration;

use async_trait::async_trait;
use dealer_domain::Card;
use dealer_shared::{JoinLobbyResponse, MoveRequest};
use reqwest::{Client, Response};
use url::Url;

use crate::ports::outbound::{ApiError, GameApiPort};

/// Default server base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

#[derive(Clone)]
pub struct HttpGameApi {
    client: Client,
    base_url: Url,
}

impl HttpGameApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ApiError::RequestFailed(format!("invalid base url {base_url}: {e}")))?;
        // `Url::join` replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl GameApiPort for HttpGameApi {
    async fn join_lobby(&self, username: Option<String>) -> Result<JoinLobbyResponse, ApiError> {
        let query: Vec<(&str, &str)> = username
            .as_deref()
            .map(|name| vec![("username", name)])
            .unwrap_or_default();
        let url = self.endpoint("lobby/join", &query)?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn start_game(&self, player_id: &str, token: &str) -> Result<(), ApiError> {
        let url = self.endpoint("game/start", &[("playerID", player_id)])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        ensure_success(response).await.map(|_| ())
    }

    async fn submit_move(
        &self,
        game_id: &str,
        player_id: &str,
        card: Card,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("game/move", &[("gameID", game_id), ("playerID", player_id)])?;

        let response = self
            .client
            .post(url)
            .json(&MoveRequest { card })
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        ensure_success(response).await.map(|_| ())
    }
}
