use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;

use crate::photos::session::{PhotosSession, ServiceResponse, UploadBody};

const LOCK_FILE_NAME: &str = "gphotos-upload.lock";

/// Data API protocol version; the JSON feed shape depends on it.
const GDATA_VERSION: &str = "3";

const DEFAULT_USER_AGENT: &str = concat!("gphotos-upload/", env!("CARGO_PKG_VERSION"));

/// Uploads of large originals can take a while on slow links.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Take the per-config-directory lock, failing fast if another run holds it.
///
/// The advisory lock lives as long as the returned file handle.
pub async fn acquire_lock(config_dir: &Path) -> Result<std::fs::File> {
    let lock_path = config_dir.join(LOCK_FILE_NAME);
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::create(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;
        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another gphotos-upload instance is using this config directory (lock: {})",
                lock_path.display()
            )
        })?;
        Ok::<std::fs::File, anyhow::Error>(file)
    })
    .await?
}

/// Authorized HTTP session for the photos data API.
pub struct Session {
    client: Client,
    config_dir: PathBuf,
    /// Exclusive lock on the config directory, held for the session's lifetime
    /// and released when the file is dropped.
    #[allow(dead_code)]
    lock_file: std::fs::File,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config_dir", &self.config_dir)
            .field("client", &"<authorized>")
            .finish()
    }
}

impl Session {
    pub fn new(
        token_type: &str,
        access_token: &str,
        config_dir: &Path,
        lock_file: std::fs::File,
    ) -> Result<Self> {
        let mut auth_value = HeaderValue::from_str(&format!("{} {}", token_type, access_token))
            .context("Access token is not a valid header value")?;
        auth_value.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(AUTHORIZATION, auth_value);
        default_headers.insert(
            HeaderName::from_static("gdata-version"),
            HeaderValue::from_static(GDATA_VERSION),
        );
        default_headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            config_dir: config_dir.to_path_buf(),
            lock_file,
        })
    }
}

/// Build a header map from name/value pairs.
///
/// Values go through `from_bytes` so non-ASCII file names survive as
/// raw UTF-8 in the `Slug` header.
fn header_map(headers: &[(&str, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name {:?}", name))?;
        let value = HeaderValue::from_bytes(value.as_bytes())
            .with_context(|| format!("Invalid value for header {}", name))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait::async_trait]
impl PhotosSession for Session {
    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<ServiceResponse> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ServiceResponse::new(status, body))
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: UploadBody,
    ) -> Result<ServiceResponse> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .headers(header_map(headers)?)
            .body(reqwest::Body::from(body))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ServiceResponse::new(status, body))
    }
}
