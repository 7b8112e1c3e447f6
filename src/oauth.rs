//! OAuth2 Authentication Module
//!
//! Handles the installed-app OAuth2 flow for the Google account whose
//! contacts are imported: authorization URL with PKCE, localhost callback,
//! code exchange and refresh-token exchange.

use oauth2::{
    basic::BasicClient,
    reqwest::async_http_client,
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tiny_http::{Response, Server};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CONTACTS_SCOPE: &str = "https://www.googleapis.com/auth/contacts";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("OAuth2 error: {0}")]
    OAuth2(String),
    #[error("HTTP server error: {0}")]
    Server(String),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("State mismatch in OAuth callback")]
    StateMismatch,
    #[error("User cancelled authentication")]
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Tokens returned by a code or refresh exchange
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_secs: Option<u64>,
}

impl OAuthTokens {
    /// Move the access token out without leaving an unwiped copy behind
    pub fn take_access_token(&mut self) -> String {
        std::mem::take(&mut self.access_token)
    }
}

/// An authorization request waiting for its callback
pub struct PendingAuthorization {
    pub auth_url: String,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

/// Google OAuth2 configuration for the contacts scope
pub fn google_contacts_config(
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
    redirect_port: u16,
) -> OAuthConfig {
    OAuthConfig {
        client_id: client_id.into(),
        client_secret: client_secret.into(),
        auth_url: GOOGLE_AUTH_URL.to_string(),
        token_url: GOOGLE_TOKEN_URL.to_string(),
        redirect_uri: format!("http://localhost:{}/callback", redirect_port),
        scopes: vec![CONTACTS_SCOPE.to_string()],
    }
}

fn build_client(config: &OAuthConfig) -> Result<BasicClient, OAuthError> {
    let client = BasicClient::new(
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.clone())),
        AuthUrl::new(config.auth_url.clone()).map_err(|e| OAuthError::OAuth2(e.to_string()))?,
        Some(TokenUrl::new(config.token_url.clone()).map_err(|e| OAuthError::OAuth2(e.to_string()))?),
    )
    .set_redirect_uri(
        RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| OAuthError::OAuth2(e.to_string()))?,
    );

    Ok(client)
}

/// Start OAuth2 flow and return the authorization URL with its CSRF/PKCE secrets
pub fn start_oauth_flow(config: &OAuthConfig) -> Result<PendingAuthorization, OAuthError> {
    let client = build_client(config)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let mut auth_request = client.authorize_url(CsrfToken::new_random);

    for scope in &config.scopes {
        auth_request = auth_request.add_scope(Scope::new(scope.clone()));
    }

    // Offline access so a refresh token is issued on first consent
    let (auth_url, csrf_token) = auth_request
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok(PendingAuthorization {
        auth_url: auth_url.to_string(),
        csrf_token,
        pkce_verifier,
    })
}

/// Exchange the authorization code received on the callback for tokens
pub async fn handle_oauth_callback(
    config: &OAuthConfig,
    authorization_code: String,
    pkce_verifier: PkceCodeVerifier,
) -> Result<OAuthTokens, OAuthError> {
    let client = build_client(config)?;

    let token_result = client
        .exchange_code(AuthorizationCode::new(authorization_code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(async_http_client)
        .await
        .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

    Ok(OAuthTokens {
        access_token: token_result.access_token().secret().clone(),
        refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
        expires_in_secs: token_result.expires_in().map(|d| d.as_secs()),
    })
}

/// Obtain a fresh access token from a stored refresh token
pub async fn refresh_access_token(
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<OAuthTokens, OAuthError> {
    let client = build_client(config)?;

    let token_result = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(async_http_client)
        .await
        .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

    Ok(OAuthTokens {
        access_token: token_result.access_token().secret().clone(),
        refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
        expires_in_secs: token_result.expires_in().map(|d| d.as_secs()),
    })
}

/// Extract the authorization code from a callback request path
///
/// `expected_state` must match the `state` parameter echoed by the provider.
pub fn parse_callback(url: &str, expected_state: &str) -> Result<String, OAuthError> {
    let parsed = url::Url::parse(&format!("http://localhost{}", url))
        .map_err(|e| OAuthError::Server(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "error" if value == "access_denied" => return Err(OAuthError::Cancelled),
            "error" => return Err(OAuthError::OAuth2(value.into_owned())),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(OAuthError::StateMismatch);
    }

    code.ok_or_else(|| OAuthError::OAuth2("Authorization code missing from callback".to_string()))
}

/// Serve the OAuth redirect on localhost until one callback arrives
///
/// Blocking; run it on a blocking thread.
pub fn wait_for_callback(port: u16, expected_state: &str) -> Result<String, OAuthError> {
    let server = Server::http(("127.0.0.1", port))
        .map_err(|e| OAuthError::Server(e.to_string()))?;

    log::info!("OAuth callback server started on http://localhost:{}", port);

    for request in server.incoming_requests() {
        let url = request.url().to_string();
        if !url.starts_with("/callback") {
            let _ = request.respond(Response::from_string("Not found").with_status_code(404));
            continue;
        }

        log::info!("Received OAuth callback");
        let result = parse_callback(&url, expected_state);
        let body = match &result {
            Ok(_) => "Authentication successful! You can close this window and return to the terminal.",
            Err(_) => "Authentication failed! You can close this window.",
        };
        let _ = request.respond(Response::from_string(body));
        return result;
    }

    Err(OAuthError::Server("Callback server stopped".to_string()))
}
