//! People API Client - HTTP communication with the Google People API
//!
//! Handles the REST calls the importer needs:
//! - Paged connection listing (full and sync-token based)
//! - Contact creation for manually entered entries

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use super::engine::ConnectionSource;
use super::models::{ListConnectionsRequest, ListConnectionsResponse, NewContact, Person};

pub const DEFAULT_API_BASE_URL: &str = "https://people.googleapis.com";

/// API client for the People API
pub struct PeopleApiClient {
    client: Client,
    base_url: String,
    /// OAuth2 access token (cached in memory, wiped when replaced or dropped)
    access_token: Arc<RwLock<Option<Zeroizing<String>>>>,
}

impl PeopleApiClient {
    /// Create new API client against the production endpoint
    pub fn new() -> Result<Self, PeopleApiError> {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }

    /// Create new API client against another endpoint (tests, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, PeopleApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Set access token (after OAuth exchange or refresh)
    pub async fn set_token(&self, token: String) {
        let mut guard = self.access_token.write().await;
        *guard = Some(Zeroizing::new(token));
    }

    /// Get current token
    pub async fn get_token(&self) -> Option<Zeroizing<String>> {
        self.access_token.read().await.clone()
    }

    /// Clear token
    pub async fn clear_token(&self) {
        let mut guard = self.access_token.write().await;
        *guard = None;
    }

    /// Fetch one page of the connections collection
    pub async fn list_connections(
        &self,
        req: &ListConnectionsRequest,
    ) -> Result<ListConnectionsResponse, PeopleApiError> {
        let token = self.get_token().await
            .ok_or(PeopleApiError::Unauthorized)?;

        log::debug!(
            "Listing connections (page_token: {}, incremental: {})",
            req.page_token.is_some(),
            req.sync_token.is_some()
        );

        let response = self.client
            .get(format!("{}/v1/{}/connections", self.base_url, req.resource_name))
            .bearer_auth(token.as_str())
            .query(&req.query_pairs())
            .send()
            .await?;

        handle_response(response).await
    }

    /// Create a new directory entry
    pub async fn create_contact(&self, contact: &NewContact) -> Result<Person, PeopleApiError> {
        let token = self.get_token().await
            .ok_or(PeopleApiError::Unauthorized)?;

        let response = self.client
            .post(format!("{}/v1/people:createContact", self.base_url))
            .bearer_auth(token.as_str())
            .json(&contact.to_person())
            .send()
            .await?;

        let person: Person = handle_response(response).await?;
        log::info!(
            "Created contact {}",
            person.resource_name.as_deref().unwrap_or("<unnamed>")
        );

        Ok(person)
    }
}

#[async_trait]
impl ConnectionSource for PeopleApiClient {
    async fn list_connections(
        &self,
        request: &ListConnectionsRequest,
    ) -> Result<ListConnectionsResponse, PeopleApiError> {
        PeopleApiClient::list_connections(self, request).await
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PeopleApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Sync token expired or invalid")]
    SyncTokenExpired,

    #[error("Unauthorized - login required")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl PeopleApiError {
    pub fn is_sync_token_expired(&self) -> bool {
        matches!(self, PeopleApiError::SyncTokenExpired)
    }
}

/// Handle successful JSON response
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PeopleApiError> {
    let status = response.status();

    if status.is_success() {
        response.json::<T>().await
            .map_err(|e| PeopleApiError::InvalidResponse(e.to_string()))
    } else {
        Err(handle_error(response).await)
    }
}

/// Convert error response to PeopleApiError
async fn handle_error(response: reqwest::Response) -> PeopleApiError {
    let status = response.status();

    match status {
        StatusCode::GONE => PeopleApiError::SyncTokenExpired,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PeopleApiError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => PeopleApiError::RateLimitExceeded,
        StatusCode::BAD_REQUEST => {
            let msg = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            if msg.contains("EXPIRED_SYNC_TOKEN") {
                PeopleApiError::SyncTokenExpired
            } else {
                PeopleApiError::NetworkError(format!("{}: {}", status, msg))
            }
        }
        s if s.is_server_error() => {
            let msg = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            PeopleApiError::ServerError(msg)
        }
        _ => {
            let msg = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            PeopleApiError::NetworkError(format!("{}: {}", status, msg))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people::models::DEFAULT_PERSON_FIELDS;
    use mockito::{Matcher, Server, ServerGuard};

    async fn client_for(server: &ServerGuard) -> PeopleApiClient {
        let client = PeopleApiClient::with_base_url(server.url()).unwrap();
        client.set_token("test_token".to_string()).await;
        client
    }

    #[tokio::test]
    async fn test_token_management() {
        let client = PeopleApiClient::new().unwrap();
        assert!(client.get_token().await.is_none());

        client.set_token("test_token".to_string()).await;
        assert_eq!(
            client.get_token().await.as_deref().map(String::as_str),
            Some("test_token")
        );

        client.clear_token().await;
        assert!(client.get_token().await.is_none());
    }

    #[tokio::test]
    async fn test_list_requires_token() {
        let client = PeopleApiClient::with_base_url("http://127.0.0.1:9").unwrap();
        let request = ListConnectionsRequest::new(DEFAULT_PERSON_FIELDS, 100);

        let err = client.list_connections(&request).await.unwrap_err();
        assert!(matches!(err, PeopleApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_list_connections_sends_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/people/me/connections")
            .match_header("authorization", "Bearer test_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("personFields".into(), DEFAULT_PERSON_FIELDS.into()),
                Matcher::UrlEncoded("pageSize".into(), "100".into()),
                Matcher::UrlEncoded("requestSyncToken".into(), "true".into()),
                Matcher::UrlEncoded("syncToken".into(), "sync-1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{
                "connections": [{"resourceName": "people/c1", "names": [{"givenName": "Ada"}]}],
                "nextSyncToken": "sync-2"
            }"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let request = ListConnectionsRequest::new(DEFAULT_PERSON_FIELDS, 100)
            .with_sync_token("sync-1");
        let response = client.list_connections(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.connections.map(|c| c.len()), Some(1));
        assert_eq!(response.next_sync_token.as_deref(), Some("sync-2"));
    }

    #[tokio::test]
    async fn test_gone_maps_to_expired_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::Any)
            .with_status(410)
            .with_body(r#"{"error": {"code": 410, "status": "GONE"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let request = ListConnectionsRequest::new(DEFAULT_PERSON_FIELDS, 100)
            .with_sync_token("stale");
        let err = client.list_connections(&request).await.unwrap_err();

        assert!(err.is_sync_token_expired());
    }

    #[tokio::test]
    async fn test_bad_request_with_expired_reason() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error": {"code": 400, "status": "FAILED_PRECONDITION",
                "details": [{"reason": "EXPIRED_SYNC_TOKEN"}]}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let request = ListConnectionsRequest::new(DEFAULT_PERSON_FIELDS, 100)
            .with_sync_token("stale");
        let err = client.list_connections(&request).await.unwrap_err();

        assert!(err.is_sync_token_expired());
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let request = ListConnectionsRequest::new(DEFAULT_PERSON_FIELDS, 100);

        let cases = [
            (401, "unauthorized"),
            (429, "rate"),
            (503, "server"),
            (404, "network"),
        ];

        for (status, kind) in cases {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("GET", "/v1/people/me/connections")
                .match_query(Matcher::Any)
                .with_status(status)
                .with_body("boom")
                .create_async()
                .await;

            let client = client_for(&server).await;
            let err = client.list_connections(&request).await.unwrap_err();
            match (kind, &err) {
                ("unauthorized", PeopleApiError::Unauthorized) => {}
                ("rate", PeopleApiError::RateLimitExceeded) => {}
                ("server", PeopleApiError::ServerError(msg)) => assert_eq!(msg, "boom"),
                ("network", PeopleApiError::NetworkError(msg)) => assert!(msg.contains("404")),
                _ => panic!("status {} produced unexpected error {:?}", status, err),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = client_for(&server).await;
        let request = ListConnectionsRequest::new(DEFAULT_PERSON_FIELDS, 100);
        let err = client.list_connections(&request).await.unwrap_err();

        assert!(matches!(err, PeopleApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_create_contact_posts_person() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/people:createContact")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "names": [{"familyName": "Hopper", "givenName": "Grace"}],
                "emailAddresses": [{"value": "grace@example.com"}],
                "addresses": [{"formattedValue": "Arlington, VA"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"resourceName": "people/c42"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let person = client
            .create_contact(&NewContact {
                family_name: Some("Hopper".to_string()),
                given_name: Some("Grace".to_string()),
                email: Some("grace@example.com".to_string()),
                address: Some("Arlington, VA".to_string()),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(person.resource_name.as_deref(), Some("people/c42"));
    }
}
