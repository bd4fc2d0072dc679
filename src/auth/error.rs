use thiserror::Error;

/// Failures while obtaining an authorized session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid client secrets {path}: {message}")]
    ClientSecrets { path: String, message: String },

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("OAuth state in redirect does not match the request")]
    StateMismatch,

    #[error("Malformed authorization redirect: {0}")]
    MalformedRedirect(String),

    #[error("Token endpoint error (HTTP {status}): {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
