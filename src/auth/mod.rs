//! OAuth 2.0 credentials for the photos data API.
//!
//! The flow mirrors the installed-application pattern: stored token →
//! refresh → interactive consent, persisting whatever comes out on top.

pub mod credential;
pub mod endpoints;
pub mod error;
pub mod flow;
pub mod responses;
pub mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use self::credential::CredentialRecord;
use self::responses::ClientSecrets;
pub use self::session::Session;

const CREDENTIALS_FILE_NAME: &str = "credentials.json";

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Inputs for credential acquisition, resolved from the CLI by `Config`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub config_directory: PathBuf,
    pub client_secrets: PathBuf,
    pub host_name: String,
    pub port: u16,
    pub local_webserver: bool,
}

impl AuthConfig {
    pub fn credentials_path(&self) -> PathBuf {
        self.config_directory.join(CREDENTIALS_FILE_NAME)
    }
}

/// Produce an authorized session.
///
/// 1. Locks the config directory against concurrent runs.
/// 2. Uses the stored credential if it is still fresh.
/// 3. Otherwise refreshes it, if it carries a refresh token.
/// 4. Otherwise runs the interactive consent flow.
/// 5. Persists whatever credential came out of 3 or 4.
pub async fn acquire_session(config: &AuthConfig) -> Result<Session> {
    tokio::fs::create_dir_all(&config.config_directory)
        .await
        .with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config.config_directory.display()
            )
        })?;

    let lock_file = session::acquire_lock(&config.config_directory).await?;

    let credentials_path = config.credentials_path();
    let stored = CredentialRecord::load(&credentials_path).await;

    let record = match stored {
        Some(record) if record.is_fresh(chrono::Utc::now()) => {
            tracing::debug!("Stored access token is still valid");
            record
        }
        stored => {
            let client = Client::builder().timeout(TOKEN_REQUEST_TIMEOUT).build()?;
            let secrets = ClientSecrets::load(&config.client_secrets).await?;
            let record = renew(&client, &secrets, config, stored).await?;
            record
                .save(&credentials_path)
                .await
                .with_context(|| {
                    format!("Failed to save credentials to {}", credentials_path.display())
                })?;
            record
        }
    };

    let session = Session::new(
        &record.token_type,
        &record.access_token,
        &config.config_directory,
        lock_file,
    )?;
    tracing::info!("Authorization completed successfully");
    Ok(session)
}

/// Refresh `stored` if possible, falling back to interactive consent.
async fn renew(
    client: &Client,
    secrets: &ClientSecrets,
    config: &AuthConfig,
    stored: Option<CredentialRecord>,
) -> Result<CredentialRecord> {
    if let Some(refresh_token) = stored.and_then(|r| r.refresh_token) {
        match flow::refresh(client, secrets, &refresh_token).await {
            Ok(resp) => {
                tracing::info!("Access token refreshed");
                return Ok(CredentialRecord::from_token_response(
                    resp,
                    Some(refresh_token),
                    chrono::Utc::now(),
                ));
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, asking for consent again: {}", e);
            }
        }
    }

    tracing::info!("Authorization required");
    let resp = flow::run_interactive(
        client,
        secrets,
        &config.host_name,
        config.port,
        config.local_webserver,
    )
    .await?;
    Ok(CredentialRecord::from_token_response(
        resp,
        None,
        chrono::Utc::now(),
    ))
}

/// Default location of the client secrets file inside `config_dir`.
pub fn default_client_secrets(config_dir: &Path) -> PathBuf {
    config_dir.join("client_secrets.json")
}
