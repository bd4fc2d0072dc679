//! Installed-application OAuth consent flow with PKCE.
//!
//! Two ways of receiving the authorization code: a one-shot loopback HTTP
//! listener (default) or the out-of-band copy/paste page.

use std::io::{self, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use uuid::Uuid;

use super::endpoints::{loopback_redirect_uri, OOB_REDIRECT_URI, PHOTOS_SCOPE};
use super::error::AuthError;
use super::responses::{ClientSecrets, TokenResponse};

const MAX_REQUEST_HEAD: usize = 16 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization complete</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
<p>Check the terminal for details.</p></body></html>";

/// PKCE verifier and its S256 challenge (RFC 7636).
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes[..]);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Build the consent page URL for `secrets.auth_uri`.
pub fn consent_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    pkce: &Pkce,
    state: &str,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(&secrets.auth_uri).map_err(|e| AuthError::ClientSecrets {
        path: "auth_uri".into(),
        message: format!("{}: {}", secrets.auth_uri, e),
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", PHOTOS_SCOPE)
        .append_pair("response_type", "code")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state);
    Ok(url)
}

/// Interpret the request target of a redirect hitting the loopback listener.
///
/// `Ok(None)` means the request is not an OAuth redirect at all (a browser
/// fetching `/favicon.ico`, say) and the listener should keep waiting.
pub fn parse_redirect(target: &str, expected_state: &str) -> Result<Option<String>, AuthError> {
    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .map_err(|e| AuthError::MalformedRedirect(format!("{}: {}", target, e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::AuthorizationDenied(error));
    }
    if code.is_none() && state.is_none() {
        return Ok(None);
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    code.map(Some)
        .ok_or_else(|| AuthError::MalformedRedirect("redirect carries no code".into()))
}

async fn read_request_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() > MAX_REQUEST_HEAD {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn respond(stream: &mut TcpStream, status: &str, page: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Serve requests on `listener` until the OAuth redirect arrives.
pub async fn receive_code(listener: TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!("Redirect listener accept failed: {}", e);
                continue;
            }
        };
        // A stray connection must not end the flow; only the redirect can.
        let head = match read_request_head(&mut stream).await {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!("Ignoring connection from {}: {}", peer, e);
                continue;
            }
        };
        let target = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("/");
        tracing::debug!("Redirect listener got {} from {}", target, peer);

        match parse_redirect(target, expected_state) {
            Ok(Some(code)) => {
                respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;
                return Ok(code);
            }
            Ok(None) => {
                if let Err(e) = respond(&mut stream, "404 Not Found", "").await {
                    tracing::debug!("Failed to answer {}: {}", peer, e);
                }
            }
            Err(e) => {
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await?;
                return Err(e);
            }
        }
    }
}

async fn read_pasted_code() -> Result<String, AuthError> {
    let code = tokio::task::spawn_blocking(|| {
        print!("Enter verification code: ");
        io::stdout().flush()?;
        let mut code = String::new();
        io::stdin().read_line(&mut code)?;
        Ok::<String, io::Error>(code.trim().to_string())
    })
    .await
    .map_err(io::Error::other)??;

    if code.is_empty() {
        return Err(AuthError::AuthorizationDenied("no code entered".into()));
    }
    Ok(code)
}

async fn post_token_form(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let response = client.post(token_uri).form(form).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        tracing::error!("Token endpoint returned {}: {}", status, body);
        return Err(AuthError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

pub async fn exchange_code(
    client: &Client,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
    pkce: &Pkce,
) -> Result<TokenResponse, AuthError> {
    tracing::debug!("Exchanging authorization code");
    post_token_form(
        client,
        &secrets.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
        ],
    )
    .await
}

pub async fn refresh(
    client: &Client,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    tracing::debug!("Refreshing access token");
    post_token_form(
        client,
        &secrets.token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
        ],
    )
    .await
}

/// Walk the user through consent and return the issued tokens.
///
/// If the loopback listener cannot bind, falls back to the copy/paste flow.
pub async fn run_interactive(
    client: &Client,
    secrets: &ClientSecrets,
    host: &str,
    port: u16,
    local_webserver: bool,
) -> Result<TokenResponse, AuthError> {
    let pkce = Pkce::generate();
    let state = Uuid::new_v4().simple().to_string();

    if local_webserver {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                let redirect_uri = loopback_redirect_uri(host, port);
                let url = consent_url(secrets, &redirect_uri, &pkce, &state)?;
                println!("Your browser has been opened to visit:");
                println!();
                println!("    {}", url);
                println!();
                println!("If your browser is on a different machine, re-run with --noauth-local-webserver");
                if let Err(e) = webbrowser::open(url.as_str()) {
                    tracing::warn!("Could not open a browser: {}", e);
                }
                let code = receive_code(listener, &state).await?;
                tracing::info!("Authorization code received");
                return exchange_code(client, secrets, &code, &redirect_uri, &pkce).await;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to listen on {}:{} ({}), falling back to copy/paste",
                    host,
                    port,
                    e
                );
            }
        }
    }

    let url = consent_url(secrets, OOB_REDIRECT_URI, &pkce, &state)?;
    println!("Go to the following link in your browser:");
    println!();
    println!("    {}", url);
    println!();
    let code = read_pasted_code().await?;
    exchange_code(client, secrets, &code, OOB_REDIRECT_URI, &pkce).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn secrets(token_uri: &str) -> ClientSecrets {
        let json = format!(
            r#"{{"installed": {{"client_id": "cid", "client_secret": "csec",
                "auth_uri": "https://accounts.example/o/oauth2/auth",
                "token_uri": "{}"}}}}"#,
            token_uri
        );
        ClientSecrets::parse(&json, std::path::Path::new("cs.json")).unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = read_request_head(&mut stream).await.unwrap();
            let length: usize = request
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse().ok())?
                })
                .unwrap_or(0);
            let head_len = request.find("\r\n\r\n").unwrap() + 4;
            while request.len() < head_len + length {
                let mut chunk = [0u8; 1024];
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (format!("http://{}/token", addr), handle)
    }

    fn form_of(request: &str) -> HashMap<String, String> {
        let body = request.split_once("\r\n\r\n").unwrap().1;
        url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect()
    }

    #[test]
    fn test_pkce_known_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_pkce_generate_format() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.verifier.len(), 43);
        assert_eq!(pkce.challenge.len(), 43);
        assert!(pkce
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(pkce.verifier, Pkce::generate().verifier);
    }

    #[test]
    fn test_consent_url_params() {
        let pkce = Pkce::from_verifier("v".repeat(43));
        let url = consent_url(&secrets("https://t"), "http://localhost:8080/", &pkce, "st").unwrap();
        assert!(url.as_str().starts_with("https://accounts.example/o/oauth2/auth?"));
        let q: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(q["client_id"], "cid");
        assert_eq!(q["redirect_uri"], "http://localhost:8080/");
        assert_eq!(q["scope"], PHOTOS_SCOPE);
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["access_type"], "offline");
        assert_eq!(q["prompt"], "consent");
        assert_eq!(q["code_challenge"], pkce.challenge);
        assert_eq!(q["code_challenge_method"], "S256");
        assert_eq!(q["state"], "st");
    }

    #[test]
    fn test_consent_url_bad_auth_uri() {
        let mut s = secrets("https://t");
        s.auth_uri = "not a url".into();
        let pkce = Pkce::generate();
        assert!(matches!(
            consent_url(&s, OOB_REDIRECT_URI, &pkce, "st"),
            Err(AuthError::ClientSecrets { .. })
        ));
    }

    #[test]
    fn test_parse_redirect_code() {
        let code = parse_redirect("/?state=abc&code=4%2F0Ab", "abc").unwrap();
        assert_eq!(code.as_deref(), Some("4/0Ab"));
    }

    #[test]
    fn test_parse_redirect_error() {
        assert!(matches!(
            parse_redirect("/?error=access_denied&state=abc", "abc"),
            Err(AuthError::AuthorizationDenied(e)) if e == "access_denied"
        ));
    }

    #[test]
    fn test_parse_redirect_state_mismatch() {
        assert!(matches!(
            parse_redirect("/?code=x&state=other", "abc"),
            Err(AuthError::StateMismatch)
        ));
    }

    #[test]
    fn test_parse_redirect_unrelated_path() {
        assert!(parse_redirect("/favicon.ico", "abc").unwrap().is_none());
    }

    #[test]
    fn test_parse_redirect_missing_code() {
        assert!(matches!(
            parse_redirect("/?state=abc", "abc"),
            Err(AuthError::MalformedRedirect(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_code_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { receive_code(listener, "nonce").await });

        let client = Client::new();
        let favicon = client
            .get(format!("http://{}/favicon.ico", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status().as_u16(), 404);

        let resp = client
            .get(format!("http://{}/?code=abc123&state=nonce", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp.text().await.unwrap().contains("Authorization complete"));

        assert_eq!(server.await.unwrap().unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_receive_code_survives_dropped_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { receive_code(listener, "nonce").await });

        // Closed without sending anything.
        drop(TcpStream::connect(addr).await.unwrap());
        // Half a request line, then gone before the answer.
        let mut partial = TcpStream::connect(addr).await.unwrap();
        partial.write_all(b"GET /favicon.i").await.unwrap();
        partial.shutdown().await.unwrap();
        drop(partial);

        let resp = Client::new()
            .get(format!("http://{}/?code=late&state=nonce", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(server.await.unwrap().unwrap(), "late");
    }

    #[tokio::test]
    async fn test_receive_code_denied() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { receive_code(listener, "nonce").await });

        let resp = Client::new()
            .get(format!("http://{}/?error=access_denied", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        assert!(matches!(
            server.await.unwrap(),
            Err(AuthError::AuthorizationDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let (token_uri, server) = serve_once(
            "200 OK",
            r#"{"access_token":"ya29.a","refresh_token":"1//r","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .await;
        let pkce = Pkce::from_verifier("x".repeat(43));
        let resp = exchange_code(&Client::new(), &secrets(&token_uri), "the-code", OOB_REDIRECT_URI, &pkce)
            .await
            .unwrap();
        assert_eq!(resp.access_token, "ya29.a");
        assert_eq!(resp.refresh_token.as_deref(), Some("1//r"));

        let form = form_of(&server.await.unwrap());
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "the-code");
        assert_eq!(form["code_verifier"], "x".repeat(43));
        assert_eq!(form["redirect_uri"], OOB_REDIRECT_URI);
        assert_eq!(form["client_id"], "cid");
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_token() {
        let (token_uri, server) =
            serve_once("200 OK", r#"{"access_token":"ya29.b","expires_in":3599}"#).await;
        let resp = refresh(&Client::new(), &secrets(&token_uri), "1//old")
            .await
            .unwrap();
        assert_eq!(resp.access_token, "ya29.b");
        assert!(resp.refresh_token.is_none());

        let form = form_of(&server.await.unwrap());
        assert_eq!(form["grant_type"], "refresh_token");
        assert_eq!(form["refresh_token"], "1//old");
    }

    #[tokio::test]
    async fn test_token_endpoint_error_status() {
        let (token_uri, _server) =
            serve_once("400 Bad Request", r#"{"error":"invalid_grant"}"#).await;
        match refresh(&Client::new(), &secrets(&token_uri), "1//revoked").await {
            Err(AuthError::TokenEndpoint { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(resp) => panic!("expected an error, got token {}", resp.token_type),
        }
    }
}
