//! People Module - Google Contacts retrieval
//!
//! Provides the contact synchronization engine and its People API backend:
//! - Full retrieval of the connections collection (size-driven pagination)
//! - Incremental sync from a stored sync token (page-fill-driven pagination)
//! - Transparent fallback to a full resync when the token is rejected
//!
//! The engine never persists anything. Callers store `SyncResult::next_sync_token`
//! and hand it back on the next call.

pub mod api;
pub mod engine;
pub mod models;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use api::{PeopleApiClient, PeopleApiError, DEFAULT_API_BASE_URL};
pub use engine::{ConnectionSource, ContactSyncEngine};
pub use models::{
    Contact, NewContact, Person,
    ListConnectionsRequest, ListConnectionsResponse,
    SyncResult,
    DEFAULT_PAGE_SIZE, DEFAULT_PERSON_FIELDS, MAX_PAGE_SIZE, SYNC_TOKEN_RETENTION_DAYS,
};
