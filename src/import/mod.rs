//! Contact import into template documents
//!
//! Copies a template document for one contact, fills its `{contact.*}`
//! placeholders and, for manually entered contacts, creates the matching
//! directory entry.

pub mod template;

pub use template::FileTemplater;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::people::{Contact, NewContact, PeopleApiClient, PeopleApiError};

pub const FAMILY_NAME_PLACEHOLDER: &str = "{contact.familyName}";
pub const GIVEN_NAME_PLACEHOLDER: &str = "{contact.givenName}";
pub const DISPLAY_NAME_PLACEHOLDER: &str = "{contact.displayName}";
pub const EMAIL_PLACEHOLDER: &str = "{contact.email}";
pub const ADDRESS_PLACEHOLDER: &str = "{contact.address}";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create contact: {0}")]
    Directory(#[from] PeopleApiError),

    #[error("Manual entries need a directory to create the contact in")]
    NoDirectory,
}

/// Values for one imported document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Entered by hand rather than picked from the directory
    #[serde(default)]
    pub manual_edit: bool,
}

impl From<&Contact> for ImportRequest {
    fn from(contact: &Contact) -> Self {
        Self {
            family_name: contact.family_name.clone(),
            given_name: contact.given_name.clone(),
            display_name: contact.display_name.clone(),
            email: contact.primary_email().map(String::from),
            address: contact.primary_address().map(String::from),
            manual_edit: false,
        }
    }
}

impl ImportRequest {
    fn to_new_contact(&self) -> NewContact {
        NewContact {
            family_name: self.family_name.clone(),
            given_name: self.given_name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
        }
    }
}

/// Creates a filled copy of the template document
#[async_trait]
pub trait DocumentTemplater: Send + Sync {
    /// Returns the location of the new document
    async fn create_from_template(
        &self,
        document_name: &str,
        values: &[(&'static str, String)],
    ) -> Result<String, ImportError>;
}

/// Creates a new directory entry
#[async_trait]
pub trait DirectoryWriter: Send + Sync {
    async fn create_contact(&self, contact: &NewContact) -> Result<(), PeopleApiError>;
}

#[async_trait]
impl DirectoryWriter for PeopleApiClient {
    async fn create_contact(&self, contact: &NewContact) -> Result<(), PeopleApiError> {
        PeopleApiClient::create_contact(self, contact).await.map(|_| ())
    }
}

/// Document name: display name (or "family given") followed by an ISO timestamp
pub fn compute_document_name(
    family_name: Option<&str>,
    given_name: Option<&str>,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let base = match display_name.filter(|d| !d.is_empty()) {
        Some(display_name) => display_name.to_string(),
        None => format!("{} {}", family_name.unwrap_or(""), given_name.unwrap_or("")),
    };

    format!("{} {}", base, now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Placeholder substitutions for `request`; empty values are left out
pub fn placeholder_values(request: &ImportRequest) -> Vec<(&'static str, String)> {
    [
        (FAMILY_NAME_PLACEHOLDER, &request.family_name),
        (GIVEN_NAME_PLACEHOLDER, &request.given_name),
        (DISPLAY_NAME_PLACEHOLDER, &request.display_name),
        (EMAIL_PLACEHOLDER, &request.email),
        (ADDRESS_PLACEHOLDER, &request.address),
    ]
    .into_iter()
    .filter_map(|(placeholder, value)| {
        value
            .as_ref()
            .filter(|v| !v.is_empty())
            .map(|v| (placeholder, v.clone()))
    })
    .collect()
}

/// Create the document for `request`; manual entries are also added to `directory`
pub async fn import_contact_information<T, D>(
    templater: &T,
    directory: Option<&D>,
    request: &ImportRequest,
    now: DateTime<Utc>,
) -> Result<String, ImportError>
where
    T: DocumentTemplater + ?Sized,
    D: DirectoryWriter + ?Sized,
{
    if request.manual_edit && directory.is_none() {
        return Err(ImportError::NoDirectory);
    }

    let document_name = compute_document_name(
        request.family_name.as_deref(),
        request.given_name.as_deref(),
        request.display_name.as_deref(),
        now,
    );

    let location = templater
        .create_from_template(&document_name, &placeholder_values(request))
        .await?;
    log::info!("Created document {}", location);

    if let Some(directory) = directory.filter(|_| request.manual_edit) {
        directory.create_contact(&request.to_new_contact()).await?;
    }

    Ok(location)
}
