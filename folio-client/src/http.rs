//! HTTP client for Folio Server
//!
//! Every endpoint wraps its payload in [`ApiResponse`]; this client unwraps
//! `data` on success and maps failures onto [`ClientError`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use shared::error::ApiResponse;
use shared::models::{OrderedEntity, ScopeKey};
use shared::request::{EntityCreate, EntityPatch, ReorderRequest, ReorderResponse};

use crate::remote::RemoteStore;
use crate::{ClientConfig, ClientError, ClientResult};

/// Network HTTP client
///
/// Cheap to clone; clones share the connection pool and the token, so a
/// credential refresher can swap the token under a running synchronizer.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(config.token.clone())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token (shared by all clones)
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    /// Get the current token
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.authorize(self.client.get(self.url(path)));
        Self::handle_response(request.send().await?).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.authorize(self.client.post(self.url(path)).json(body));
        Self::handle_response(request.send().await?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.authorize(self.client.put(self.url(path)).json(body));
        Self::handle_response(request.send().await?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.authorize(self.client.delete(self.url(path)));
        Self::handle_response(request.send().await?).await
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::map_error(status, &text));
        }

        let body: ApiResponse<T> = serde_json::from_str(&text)?;
        if let Some(code) = body.error_code() {
            return Err(ClientError::InvalidResponse(format!(
                "{code} returned with status {status}: {}",
                body.message
            )));
        }
        body.data
            .ok_or_else(|| ClientError::InvalidResponse("Missing response data".to_string()))
    }

    fn map_error(status: StatusCode, text: &str) -> ClientError {
        let envelope = serde_json::from_str::<ApiResponse<serde_json::Value>>(text).ok();
        let message = envelope
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| text.to_string());

        if let Some(code) = envelope.as_ref().and_then(|e| e.error_code())
            && code.is_credential_expired()
        {
            return ClientError::CredentialExpired(message);
        }

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            StatusCode::CONFLICT => ClientError::Conflict(message),
            _ => ClientError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl RemoteStore for HttpClient {
    async fn create_entity(&self, scope: ScopeKey, data: EntityCreate) -> ClientResult<OrderedEntity> {
        self.post(&scope.collection_path(), &data).await
    }

    async fn update_entity(
        &self,
        scope: ScopeKey,
        id: i64,
        patch: EntityPatch,
    ) -> ClientResult<OrderedEntity> {
        self.put(&format!("{}/{id}", scope.collection_path()), &patch)
            .await
    }

    async fn delete_entity(&self, scope: ScopeKey, id: i64) -> ClientResult<i64> {
        self.delete(&format!("{}/{id}", scope.collection_path())).await
    }

    async fn reorder_entities(&self, scope: ScopeKey, source_id: i64, target_id: i64) -> ClientResult<()> {
        let request = ReorderRequest {
            source_id,
            target_id,
        };
        let response: ReorderResponse = self
            .post(&format!("{}/reorder", scope.collection_path()), &request)
            .await?;
        tracing::debug!(%scope, source_id, target_id, moved = response.moved, "Reorder acknowledged");
        Ok(())
    }

    async fn fetch_scope(&self, scope: ScopeKey) -> ClientResult<Vec<OrderedEntity>> {
        self.get(&scope.collection_path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_error_credential_expired() {
        let body = r#"{"code":1003,"message":"Token expired"}"#;
        let err = HttpClient::map_error(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, ClientError::CredentialExpired(ref m) if m == "Token expired"));
    }

    #[test]
    fn test_map_error_plain_unauthorized() {
        let body = r#"{"code":1001,"message":"Not authenticated"}"#;
        let err = HttpClient::map_error(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, ClientError::Unauthorized(_)));
    }

    #[test]
    fn test_map_error_by_status() {
        let body = r#"{"code":6101,"message":"block 9 not found"}"#;
        assert!(matches!(
            HttpClient::map_error(StatusCode::NOT_FOUND, body),
            ClientError::NotFound(ref m) if m == "block 9 not found"
        ));
        assert!(matches!(
            HttpClient::map_error(StatusCode::SERVICE_UNAVAILABLE, "busy"),
            ClientError::Server { status: 503, ref message } if message == "busy"
        ));
        assert!(matches!(
            HttpClient::map_error(StatusCode::BAD_REQUEST, "{}"),
            ClientError::Validation(_)
        ));
    }

    #[test]
    fn test_token_shared_between_clones() {
        let client = HttpClient::new(&ClientConfig::default().with_token("a")).unwrap();
        let clone = client.clone();
        clone.set_token(Some("b".into()));
        assert_eq!(client.token().as_deref(), Some("b"));
        assert_eq!(client.url("/api/health"), "http://localhost:3000/api/health");
    }
}
