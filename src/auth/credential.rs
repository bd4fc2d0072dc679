use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::endpoints::PHOTOS_SCOPE;
use super::error::AuthError;
use super::responses::TokenResponse;

/// Bumped whenever the on-disk layout changes; older records are discarded.
pub const CREDENTIAL_VERSION: u32 = 1;

/// A token that expires within this window is refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Persisted OAuth token, stored as `credentials.json` in the config directory.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub version: u32,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub scope: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("version", &self.version)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CredentialRecord {
    /// Build a record from a token endpoint response.
    ///
    /// Refresh responses usually omit `refresh_token`; `previous_refresh`
    /// carries the old one forward in that case.
    pub fn from_token_response(
        resp: TokenResponse,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        if let Some(granted) = resp.scope.as_deref() {
            if !granted.split_whitespace().any(|s| s == PHOTOS_SCOPE) {
                tracing::warn!("Token was granted for \"{}\", uploads may be refused", granted);
            }
        }
        Self {
            version: CREDENTIAL_VERSION,
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.or(previous_refresh),
            token_type: resp.token_type,
            scope: PHOTOS_SCOPE.to_string(),
            expires_at: resp.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }

    /// Whether the access token can be used as-is at `now`.
    /// A record without an expiry is trusted until the server rejects it.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }

    /// Load a usable record from `path`.
    ///
    /// Missing, corrupt, outdated and wrong-scope files are all treated as
    /// "no credential" so the caller falls through to a fresh consent.
    pub async fn load(path: &Path) -> Option<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No stored credentials at {}", path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read credentials {}: {}", path.display(), e);
                return None;
            }
        };
        let record: Self = match serde_json::from_str(&contents) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Credentials file corrupt, ignoring it: {}", e);
                return None;
            }
        };
        if record.version != CREDENTIAL_VERSION {
            tracing::info!(
                "Credentials version {} is not {}, re-authorizing",
                record.version,
                CREDENTIAL_VERSION
            );
            return None;
        }
        if record.scope != PHOTOS_SCOPE {
            tracing::info!("Stored credentials were granted for another scope, re-authorizing");
            return None;
        }
        tracing::debug!("Loaded credentials from {}", path.display());
        Some(record)
    }

    /// Write the record as pretty JSON, readable by the owner only.
    pub async fn save(&self, path: &Path) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(path, perms).await?;
        }
        tracing::debug!("Saved credentials to {}", path.display());
        Ok(())
    }
}
