use std::path::Path;

use serde::Deserialize;

use super::error::AuthError;

/// Client secrets file as downloaded from the developer console.
///
/// Both the `installed` and `web` application shapes are accepted;
/// only the fields used by the installed-app flow are read.
#[derive(Debug, Deserialize)]
pub struct ClientSecretsFile {
    #[serde(default)]
    pub installed: Option<ClientSecrets>,
    #[serde(default)]
    pub web: Option<ClientSecrets>,
}

#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ClientSecrets {
    /// Parse a client secrets document, preferring the `installed` block.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, AuthError> {
        let file: ClientSecretsFile =
            serde_json::from_str(contents).map_err(|e| AuthError::ClientSecrets {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        file.installed
            .or(file.web)
            .ok_or_else(|| AuthError::ClientSecrets {
                path: path.display().to_string(),
                message: "expected an \"installed\" or \"web\" client".into(),
            })
    }

    pub async fn load(path: &Path) -> Result<Self, AuthError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AuthError::ClientSecrets {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
        Self::parse(&contents, path)
    }
}

/// Token endpoint response for both the code exchange and refresh grants.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_secrets() {
        let json = r#"{"installed": {
            "client_id": "abc.apps.example",
            "client_secret": "s3cret",
            "auth_uri": "https://auth.example/o/oauth2/auth",
            "token_uri": "https://auth.example/token",
            "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
        }}"#;
        let secrets = ClientSecrets::parse(json, Path::new("cs.json")).unwrap();
        assert_eq!(secrets.client_id, "abc.apps.example");
        assert_eq!(secrets.token_uri, "https://auth.example/token");
    }

    #[test]
    fn test_parse_web_secrets_with_defaults() {
        let json = r#"{"web": {"client_id": "id", "client_secret": "sec"}}"#;
        let secrets = ClientSecrets::parse(json, Path::new("cs.json")).unwrap();
        assert_eq!(secrets.auth_uri, default_auth_uri());
        assert_eq!(secrets.token_uri, default_token_uri());
    }

    #[test]
    fn test_parse_secrets_without_client_block() {
        let err = ClientSecrets::parse("{}", Path::new("cs.json")).unwrap_err();
        assert!(matches!(err, AuthError::ClientSecrets { .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let json = r#"{"installed": {"client_id": "id", "client_secret": "hunter2"}}"#;
        let secrets = ClientSecrets::parse(json, Path::new("cs.json")).unwrap();
        assert!(!format!("{:?}", secrets).contains("hunter2"));
    }

    #[test]
    fn test_token_response_minimal() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access_token": "ya29"}"#).unwrap();
        assert_eq!(resp.access_token, "ya29");
        assert_eq!(resp.token_type, "Bearer");
        assert!(resp.refresh_token.is_none());
        assert!(resp.expires_in.is_none());
    }
}
