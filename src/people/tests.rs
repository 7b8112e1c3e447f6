//! Integration Tests for People Module
//!
//! Runs the sync engine against the real HTTP client with mockito:
//! - Multi-page full retrieval
//! - Expired sync token followed by a full resync

#[cfg(test)]
mod integration_tests {
    use super::super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    /// First page of a full listing: no page token, no sync token
    const FIRST_FULL_PAGE_QUERY: &str =
        r"^personFields=[^&]*&pageSize=2&requestSyncToken=true$";

    fn connections(ids: &[u32]) -> serde_json::Value {
        ids.iter()
            .map(|id| {
                json!({
                    "resourceName": format!("people/c{}", id),
                    "names": [{"displayName": format!("Person {}", id)}],
                    "emailAddresses": [{"value": format!("p{}@example.com", id)}]
                })
            })
            .collect()
    }

    async fn mock_full_listing(server: &mut ServerGuard) -> Vec<mockito::Mock> {
        let first = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::Regex(FIRST_FULL_PAGE_QUERY.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "connections": connections(&[1, 2]),
                    "totalItems": 5,
                    "totalPeople": 5,
                    "nextPageToken": "p2",
                    "nextSyncToken": "sync-a"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let second = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "connections": connections(&[3, 4]),
                    "totalItems": 5,
                    "nextPageToken": "p3",
                    "nextSyncToken": "sync-b"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let third = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p3".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "connections": connections(&[5]),
                    "totalItems": 5,
                    "nextSyncToken": "sync-c"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        vec![first, second, third]
    }

    async fn engine_for(server: &ServerGuard) -> ContactSyncEngine<PeopleApiClient> {
        let client = PeopleApiClient::with_base_url(server.url()).unwrap();
        client.set_token("test_token".to_string()).await;
        ContactSyncEngine::new(client).with_page_size(2)
    }

    // ========================================================================
    // Full Retrieval
    // ========================================================================

    #[tokio::test]
    async fn test_full_retrieval_over_http() {
        let mut server = Server::new_async().await;
        let mocks = mock_full_listing(&mut server).await;

        let engine = engine_for(&server).await;
        let result = engine.get_connections(None).await.unwrap();

        for mock in &mocks {
            mock.assert_async().await;
        }
        assert!(!result.used_incremental_sync);
        assert_eq!(result.next_sync_token.as_deref(), Some("sync-c"));
        let emails: Vec<_> = result
            .contacts
            .iter()
            .filter_map(|c| c.primary_email())
            .collect();
        assert_eq!(
            emails,
            vec![
                "p1@example.com",
                "p2@example.com",
                "p3@example.com",
                "p4@example.com",
                "p5@example.com",
            ]
        );
    }

    // ========================================================================
    // Expired Token Recovery
    // ========================================================================

    #[tokio::test]
    async fn test_expired_token_resyncs_over_http() {
        let mut server = Server::new_async().await;
        let expired = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::UrlEncoded("syncToken".into(), "stale".into()))
            .with_status(410)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"code": 410, "message": "Sync token is expired."}}"#)
            .expect(1)
            .create_async()
            .await;
        let mocks = mock_full_listing(&mut server).await;

        let engine = engine_for(&server).await;
        let result = engine.get_connections(Some("stale")).await.unwrap();

        expired.assert_async().await;
        for mock in &mocks {
            mock.assert_async().await;
        }
        assert!(!result.used_incremental_sync);
        assert_eq!(result.contacts.len(), 5);
        assert_eq!(result.next_sync_token.as_deref(), Some("sync-c"));
    }

    #[tokio::test]
    async fn test_incremental_sync_over_http() {
        let mut server = Server::new_async().await;
        let changes = server
            .mock("GET", "/v1/people/me/connections")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("syncToken".into(), "sync-c".into()),
                Matcher::UrlEncoded("requestSyncToken".into(), "true".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "connections": [
                        {"resourceName": "people/c2", "metadata": {"deleted": true}}
                    ],
                    "nextSyncToken": "sync-d"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server).await;
        let result = engine.get_connections(Some("sync-c")).await.unwrap();

        changes.assert_async().await;
        assert!(result.used_incremental_sync);
        assert_eq!(result.next_sync_token.as_deref(), Some("sync-d"));
        assert_eq!(result.contacts.len(), 1);
        assert!(result.contacts[0].deleted);
    }
}
