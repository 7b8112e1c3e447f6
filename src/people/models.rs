//! People Data Models - Directory Records and Sync Results
//!
//! Defines the wire shapes of the People API `connections.list` endpoint
//! and the contact records handed to callers.
//!
//! Data Categories:
//! - Person: raw directory record as returned by the service
//! - Contact: flattened record consumed by the import workflow
//! - ListConnectionsRequest / ListConnectionsResponse: one page exchange
//! - SyncResult: outcome of a complete (multi-page) fetch

use serde::{Deserialize, Serialize};

/// Resource name of the authenticated user's own connections collection
pub const OWN_CONNECTIONS: &str = "people/me";

/// Person fields requested on every listing
pub const DEFAULT_PERSON_FIELDS: &str = "names,emailAddresses,addresses";

/// Page size recommended by the service for `connections.list`
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the service accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Days after which the service stops honoring a sync token
pub const SYNC_TOKEN_RETENTION_DAYS: i64 = 7;

// ============================================================================
// Raw Directory Records
// ============================================================================

/// Directory entry as returned by the People API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PersonMetadata>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<Name>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<EmailAddress>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<Address>,
}

/// Entry-level metadata; `deleted` is only reported by incremental listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonMetadata {
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Name {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_value: Option<String>,
}

// ============================================================================
// Contact
// ============================================================================

/// One directory entry, flattened for templating
///
/// Field contents are copied as received; nothing is trimmed or validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Directory identifier (e.g. `people/c123`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub emails: Vec<String>,

    #[serde(default)]
    pub addresses: Vec<String>,

    /// Set when an incremental listing reports the entry as removed
    #[serde(default)]
    pub deleted: bool,
}

impl Contact {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    pub fn primary_address(&self) -> Option<&str> {
        self.addresses.first().map(String::as_str)
    }
}

impl From<Person> for Contact {
    fn from(person: Person) -> Self {
        let name = person.names.into_iter().next().unwrap_or_default();

        Self {
            resource_name: person.resource_name,
            family_name: name.family_name,
            given_name: name.given_name,
            display_name: name.display_name,
            emails: person
                .email_addresses
                .into_iter()
                .filter_map(|e| e.value)
                .collect(),
            addresses: person
                .addresses
                .into_iter()
                .filter_map(|a| a.formatted_value)
                .collect(),
            deleted: person.metadata.map(|m| m.deleted).unwrap_or(false),
        }
    }
}

/// Payload for creating a new directory entry from manually entered data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl NewContact {
    /// Convert into the `people:createContact` request body
    pub fn to_person(&self) -> Person {
        Person {
            names: vec![Name {
                display_name: None,
                family_name: self.family_name.clone(),
                given_name: self.given_name.clone(),
            }],
            email_addresses: self
                .email
                .iter()
                .map(|e| EmailAddress { value: Some(e.clone()) })
                .collect(),
            addresses: self
                .address
                .iter()
                .map(|a| Address { formatted_value: Some(a.clone()) })
                .collect(),
            ..Person::default()
        }
    }
}

// ============================================================================
// Page Exchange
// ============================================================================

/// Parameters of a single `connections.list` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConnectionsRequest {
    pub resource_name: String,
    pub person_fields: String,
    pub page_size: u32,
    pub page_token: Option<String>,
    pub request_sync_token: bool,
    pub sync_token: Option<String>,
}

impl ListConnectionsRequest {
    /// First-page request that asks the service for a fresh sync token
    pub fn new(person_fields: impl Into<String>, page_size: u32) -> Self {
        Self {
            resource_name: OWN_CONNECTIONS.to_string(),
            person_fields: person_fields.into(),
            page_size,
            page_token: None,
            request_sync_token: true,
            sync_token: None,
        }
    }

    pub fn with_sync_token(mut self, sync_token: impl Into<String>) -> Self {
        self.sync_token = Some(sync_token.into());
        self
    }

    /// Query string pairs in the order the service documents them
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("personFields", self.person_fields.clone()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(page_token) = &self.page_token {
            pairs.push(("pageToken", page_token.clone()));
        }
        if self.request_sync_token {
            pairs.push(("requestSyncToken", "true".to_string()));
        }
        if let Some(sync_token) = &self.sync_token {
            pairs.push(("syncToken", sync_token.clone()));
        }
        pairs
    }
}

/// One page of `connections.list`
///
/// `connections` is omitted by the service when the page is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConnectionsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Person>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_people: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_sync_token: Option<String>,
}

impl ListConnectionsResponse {
    /// Take this page's connections, treating a missing field as empty
    pub fn take_connections(&mut self) -> Vec<Person> {
        self.connections.take().unwrap_or_default()
    }
}

// ============================================================================
// Sync Result
// ============================================================================

/// Outcome of a complete contact fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// True only when a token-based sync was attempted and succeeded
    pub used_incremental_sync: bool,

    /// Token to persist for the next call, taken from the last page fetched
    pub next_sync_token: Option<String>,

    /// Contacts in the order their pages were received
    pub contacts: Vec<Contact>,
}

// ============================================================================
// Tests
// ============================================================================
