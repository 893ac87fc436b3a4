//! Session token acquisition
//!
//! The token endpoint is an opaque prerequisite to joining a room:
//! `POST {base}/token` with `{room_name, participant_name}` returns
//! `{token}`. Any non-success status is a connect failure.

use std::future::Future;
use std::time::Duration;

use lisa_core::{LisaError, LisaResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anything able to hand out a session credential
pub trait TokenProvider: Send + Sync + 'static {
    fn fetch_token(
        &self,
        room_name: &str,
        participant_name: &str,
    ) -> impl Future<Output = LisaResult<String>> + Send;
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    room_name: &'a str,
    participant_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// HTTP client for the token endpoint
#[derive(Clone, Debug)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenClient {
    /// `base_url` is the server root, e.g. `http://localhost:8000`
    pub fn new(base_url: &str, timeout: Duration) -> LisaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LisaError::Config(format!("HTTP client: {}", e)))?;

        Ok(TokenClient {
            http,
            endpoint: format!("{}/token", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TokenProvider for TokenClient {
    async fn fetch_token(&self, room_name: &str, participant_name: &str) -> LisaResult<String> {
        debug!(endpoint = %self.endpoint, room_name, participant_name, "requesting token");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&TokenRequest {
                room_name,
                participant_name,
            })
            .send()
            .await
            .map_err(|e| LisaError::TokenAcquisitionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LisaError::TokenAcquisitionFailed(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| LisaError::TokenAcquisitionFailed(format!("bad token response: {}", e)))?;

        Ok(body.token)
    }
}

/// Fixed credential, for rooms that do not check tokens
#[derive(Clone, Debug)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    async fn fetch_token(&self, _room_name: &str, _participant_name: &str) -> LisaResult<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_token_success() {
        let router = Router::new().route(
            "/token",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["room_name"], "lisa-room");
                assert_eq!(body["participant_name"], "user");
                Json(json!({ "token": "jwt-123" }))
            }),
        );
        let base = serve(router).await;

        let client = TokenClient::new(&base, Duration::from_secs(5)).unwrap();
        let token = client.fetch_token("lisa-room", "user").await.unwrap();
        assert_eq!(token, "jwt-123");
    }

    #[tokio::test]
    async fn test_fetch_token_server_error() {
        let router = Router::new().route(
            "/token",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;

        let client = TokenClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.fetch_token("lisa-room", "user").await.unwrap_err();
        assert!(matches!(err, LisaError::TokenAcquisitionFailed(_)));
    }

    #[tokio::test]
    async fn test_fetch_token_malformed_body() {
        let router = Router::new().route(
            "/token",
            post(|| async { Json(json!({ "jwt": "missing-field" })) }),
        );
        let base = serve(router).await;

        let client = TokenClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.fetch_token("lisa-room", "user").await.unwrap_err();
        assert!(matches!(err, LisaError::TokenAcquisitionFailed(_)));
    }

    #[tokio::test]
    async fn test_fetch_token_unreachable() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TokenClient::new(&format!("http://{}/", addr), Duration::from_secs(2)).unwrap();
        assert_eq!(client.endpoint(), format!("http://{}/token", addr));
        let err = client.fetch_token("lisa-room", "user").await.unwrap_err();
        assert!(matches!(err, LisaError::TokenAcquisitionFailed(_)));
    }

    #[tokio::test]
    async fn test_static_token() {
        let token = StaticToken("dev".into()).fetch_token("r", "p").await.unwrap();
        assert_eq!(token, "dev");
    }
}
