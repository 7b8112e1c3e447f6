//! Contact Sync Engine - complete contact retrieval with token-based resync
//!
//! Two strategies, picked per call:
//! - Full retrieval: page through the whole collection. Continuation is
//!   driven by the `totalItems` count reported on the first page.
//! - Incremental sync: page through changes since a stored sync token.
//!   Incremental responses do not report a stable total, so continuation
//!   is driven by whether the last page came back full.
//!
//! A failed incremental sync falls back to a full retrieval. The engine keeps
//! no state between calls; persisting the returned sync token is the caller's
//! job.

use async_trait::async_trait;

use super::api::PeopleApiError;
use super::models::{
    Contact, ListConnectionsRequest, ListConnectionsResponse, Person, SyncResult,
    DEFAULT_PAGE_SIZE, DEFAULT_PERSON_FIELDS,
};

/// Paged `connections.list` capability consumed by the engine
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn list_connections(
        &self,
        request: &ListConnectionsRequest,
    ) -> Result<ListConnectionsResponse, PeopleApiError>;
}

/// Pages gathered by one strategy, before conversion to contacts
struct Retrieval {
    connections: Vec<Person>,
    next_sync_token: Option<String>,
}

pub struct ContactSyncEngine<S> {
    source: S,
    page_size: u32,
    person_fields: String,
}

impl<S: ConnectionSource> ContactSyncEngine<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            page_size: DEFAULT_PAGE_SIZE,
            person_fields: DEFAULT_PERSON_FIELDS.to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_person_fields(mut self, person_fields: impl Into<String>) -> Self {
        self.person_fields = person_fields.into();
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch the complete current contact set.
    ///
    /// With a sync token, an incremental sync is attempted first; any failure
    /// of that attempt (expired token included) is logged and replaced by a
    /// full retrieval. Errors of the full retrieval are returned as is.
    pub async fn get_connections(
        &self,
        next_sync_token: Option<&str>,
    ) -> Result<SyncResult, PeopleApiError> {
        if let Some(sync_token) = next_sync_token {
            match self.synchronize_connections(sync_token).await {
                Ok(retrieval) => {
                    log::info!(
                        "Incremental sync returned {} connections",
                        retrieval.connections.len()
                    );
                    return Ok(into_sync_result(retrieval, true));
                }
                Err(e) if e.is_sync_token_expired() => {
                    log::warn!("Sync token expired, performing full resync");
                }
                Err(e) => {
                    log::warn!("Incremental sync failed: {}. Performing full resync", e);
                }
            }
        } else {
            log::info!("Full sync: no previous sync token");
        }

        let retrieval = self.populate_all_connections().await?;
        log::info!("Full sync returned {} connections", retrieval.connections.len());

        Ok(into_sync_result(retrieval, false))
    }

    /// Page through the whole collection until the reported total is reached
    async fn populate_all_connections(&self) -> Result<Retrieval, PeopleApiError> {
        let mut request = ListConnectionsRequest::new(self.person_fields.clone(), self.page_size);

        let mut response = self.source.list_connections(&request).await?;
        let total_items = response.total_items.unwrap_or(0);
        let mut connections = response.take_connections();

        while (connections.len() as u64) < total_items {
            let Some(page_token) = response.next_page_token.take() else {
                log::warn!(
                    "Listing stopped at {} of {} connections: no next page token",
                    connections.len(),
                    total_items
                );
                break;
            };
            request.page_token = Some(page_token);

            response = self.source.list_connections(&request).await?;
            let page = response.take_connections();
            log::debug!("Fetched page of {} connections", page.len());
            connections.extend(page);
        }

        Ok(Retrieval {
            connections,
            next_sync_token: response.next_sync_token,
        })
    }

    /// Page through changes since `sync_token` while pages come back full
    async fn synchronize_connections(&self, sync_token: &str) -> Result<Retrieval, PeopleApiError> {
        let mut request = ListConnectionsRequest::new(self.person_fields.clone(), self.page_size)
            .with_sync_token(sync_token);

        let mut response = self.source.list_connections(&request).await?;
        let mut connections = response.take_connections();
        let mut retrieved = connections.len();

        while retrieved == self.page_size as usize {
            let Some(page_token) = response.next_page_token.take() else {
                log::debug!("Full page without next page token, sync complete");
                break;
            };
            request.page_token = Some(page_token);

            response = self.source.list_connections(&request).await?;
            let page = response.take_connections();
            retrieved = page.len();
            log::debug!("Fetched page of {} changed connections", retrieved);
            connections.extend(page);
        }

        Ok(Retrieval {
            connections,
            next_sync_token: response.next_sync_token,
        })
    }
}

fn into_sync_result(retrieval: Retrieval, used_incremental_sync: bool) -> SyncResult {
    SyncResult {
        used_incremental_sync,
        next_sync_token: retrieval.next_sync_token,
        contacts: retrieval.connections.into_iter().map(Contact::from).collect(),
    }
}

// ============================================================================
// Tests
// ============================================================================
