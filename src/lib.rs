//! # Contacts Import
//!
//! Imports Google Contacts into documents generated from a template.

pub mod config;
pub mod import;
pub mod oauth;
pub mod people;
pub mod store;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use config::{AppConfig, ConfigError};
use import::{FileTemplater, ImportError, ImportRequest};
use oauth::OAuthError;
use people::{Contact, ConnectionSource, ContactSyncEngine, PeopleApiClient, PeopleApiError};
use store::{Store, StoreError};

/// Top-level error for the command line application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    OAuth(#[from] OAuthError),

    #[error("People API error: {0}")]
    People(#[from] PeopleApiError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not logged in - run `contacts-import login` first")]
    NotLoggedIn,

    #[error("Contact {0} not found in Google Contacts")]
    ContactNotFound(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

#[derive(Parser)]
#[command(name = "contacts-import")]
#[command(version, about = "Import Google Contacts into template documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authorize access to your Google Contacts
    Login,

    /// Forget stored credentials, sync state and contacts
    Logout,

    /// Fetch contacts, incrementally when a sync token is stored
    Sync {
        /// Ignore the stored sync token and fetch everything
        #[arg(long)]
        full: bool,

        /// Print contacts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the contacts from the last sync without contacting Google
    List {
        /// Print contacts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a document from the template for one contact
    Import {
        /// Resource name of a synced contact (e.g. people/c123)
        #[arg(
            long,
            conflicts_with_all = ["family", "given", "display", "email", "address", "manual"]
        )]
        contact: Option<String>,

        #[arg(long)]
        family: Option<String>,

        #[arg(long)]
        given: Option<String>,

        #[arg(long)]
        display: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        address: Option<String>,

        /// Contact was entered by hand: also create it in Google Contacts
        #[arg(long)]
        manual: bool,
    },
}

/// What one `sync` did to the local contact list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub used_incremental_sync: bool,
    /// Entries returned by the service (only the changes when incremental)
    pub changed: usize,
    /// The complete local contact list after the sync
    pub contacts: Vec<Contact>,
}

/// Entry point of the `contacts-import` binary
pub async fn run() -> Result<(), AppError> {
    // Load .env file for OAuth credentials
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.db_path();
    log::info!("Database path: {:?}", db_path);
    let store = Store::new(&db_path)?;

    match cli.command {
        Commands::Login => login(&config, &store).await,
        Commands::Logout => {
            store.clear_refresh_token()?;
            store.clear_sync_token()?;
            store.clear_contacts()?;
            log::info!("Logged out");
            Ok(())
        }
        Commands::Sync { full, json } => {
            let engine = sync_engine(&config, &store).await?;
            let summary = sync_contacts(&engine, &store, full, Utc::now()).await?;
            print_contacts(&summary.contacts, json)
        }
        Commands::List { json } => print_contacts(&store.load_contacts()?, json),
        Commands::Import {
            contact,
            family,
            given,
            display,
            email,
            address,
            manual,
        } => {
            let request = match contact {
                Some(resource_name) => {
                    let contact = synced_contact(&config, &store, &resource_name).await?;
                    ImportRequest::from(&contact)
                }
                None => ImportRequest {
                    family_name: family,
                    given_name: given,
                    display_name: display,
                    email,
                    address,
                    manual_edit: manual,
                },
            };
            let location = import_contact(&config, &store, &request).await?;
            println!("{}", location);
            Ok(())
        }
    }
}

fn oauth_config(config: &AppConfig) -> oauth::OAuthConfig {
    oauth::google_contacts_config(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.redirect_port,
    )
}

async fn login(config: &AppConfig, store: &Store) -> Result<(), AppError> {
    let oauth_config = oauth_config(config);
    let pending = oauth::start_oauth_flow(&oauth_config)?;

    println!("Opening browser for Google sign-in. If it does not open, visit:\n{}", pending.auth_url);
    if let Err(e) = open::that(&pending.auth_url) {
        log::warn!("Failed to open browser: {}", e);
    }

    let port = config.redirect_port;
    let state = pending.csrf_token.secret().clone();
    let code = tokio::task::spawn_blocking(move || oauth::wait_for_callback(port, &state))
        .await
        .map_err(|e| AppError::Task(e.to_string()))??;

    let tokens = oauth::handle_oauth_callback(&oauth_config, code, pending.pkce_verifier).await?;
    match &tokens.refresh_token {
        Some(refresh_token) => store.save_refresh_token(refresh_token)?,
        None => log::warn!("No refresh token issued; revoke the app's access and log in again"),
    }

    // A new account invalidates whatever was synced before
    store.clear_sync_token()?;
    store.clear_contacts()?;
    log::info!("Login successful");

    Ok(())
}

async fn authorized_client(config: &AppConfig, store: &Store) -> Result<PeopleApiClient, AppError> {
    let refresh_token = store.load_refresh_token()?.ok_or(AppError::NotLoggedIn)?;
    let oauth_config = oauth_config(config);
    let mut tokens = oauth::refresh_access_token(&oauth_config, &refresh_token).await?;

    if let Some(rotated) = &tokens.refresh_token {
        store.save_refresh_token(rotated)?;
    }

    let client = PeopleApiClient::with_base_url(config.api_base_url.clone())?;
    client.set_token(tokens.take_access_token()).await;
    Ok(client)
}

async fn sync_engine(
    config: &AppConfig,
    store: &Store,
) -> Result<ContactSyncEngine<PeopleApiClient>, AppError> {
    let client = authorized_client(config, store).await?;
    Ok(ContactSyncEngine::new(client).with_page_size(config.page_size))
}

/// Run one sync against the stored state and persist its outcome.
///
/// The stored sync token is used unless `full` is set or it is older than
/// the retention window. The returned contacts are merged into (or, after a
/// full retrieval, replace) the stored list, and the new token is saved
/// with `now`.
pub async fn sync_contacts<S: ConnectionSource>(
    engine: &ContactSyncEngine<S>,
    store: &Store,
    full: bool,
    now: DateTime<Utc>,
) -> Result<SyncSummary, AppError> {
    let stored = if full { None } else { store.load_sync_token()? };
    let sync_token = match stored {
        Some(stored) if stored.is_stale(now) => {
            log::info!("Stored sync token is older than the retention window, skipping it");
            None
        }
        Some(stored) => Some(stored.token),
        None => None,
    };

    let result = engine.get_connections(sync_token.as_deref()).await?;
    store.apply_sync(&result, now)?;

    let contacts = store.load_contacts()?;
    log::info!(
        "Synced {} changed entries, {} contacts stored (incremental: {})",
        result.contacts.len(),
        contacts.len(),
        result.used_incremental_sync
    );

    Ok(SyncSummary {
        used_incremental_sync: result.used_incremental_sync,
        changed: result.contacts.len(),
        contacts,
    })
}

/// Look up a synced contact, syncing once if it is not stored yet
async fn synced_contact(
    config: &AppConfig,
    store: &Store,
    resource_name: &str,
) -> Result<Contact, AppError> {
    if let Some(contact) = store.find_contact(resource_name)? {
        return Ok(contact);
    }

    log::info!("{} is not in the local contact list, syncing first", resource_name);
    let engine = sync_engine(config, store).await?;
    sync_contacts(&engine, store, false, Utc::now()).await?;

    store
        .find_contact(resource_name)?
        .ok_or_else(|| AppError::ContactNotFound(resource_name.to_string()))
}

async fn import_contact(
    config: &AppConfig,
    store: &Store,
    request: &ImportRequest,
) -> Result<String, AppError> {
    let templater = FileTemplater::new(&config.template_path, &config.output_dir);

    let directory = if request.manual_edit {
        Some(authorized_client(config, store).await?)
    } else {
        None
    };

    let location =
        import::import_contact_information(&templater, directory.as_ref(), request, Utc::now())
            .await?;

    Ok(location)
}

fn print_contacts(contacts: &[Contact], json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(contacts)?);
        return Ok(());
    }

    for contact in contacts {
        let name = contact
            .display_name
            .clone()
            .unwrap_or_else(|| {
                format!(
                    "{} {}",
                    contact.given_name.as_deref().unwrap_or(""),
                    contact.family_name.as_deref().unwrap_or("")
                )
            });
        println!(
            "{}\t{}\t{}\t{}",
            contact.resource_name.as_deref().unwrap_or(""),
            name.trim(),
            contact.primary_email().unwrap_or(""),
            contact.primary_address().unwrap_or("")
        );
    }

    Ok(())
}
