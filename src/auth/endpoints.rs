//! OAuth constants for the Picasa Web Albums data API.

/// Scope granting read/write access to the user's photos.
pub const PHOTOS_SCOPE: &str = "https://picasaweb.google.com/data/";

/// Redirect URI for the copy/paste flow: the consent page shows the code
/// instead of redirecting.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Redirect URI for the loopback flow.
pub fn loopback_redirect_uri(host: &str, port: u16) -> String {
    format!("http://{}:{}/", host, port)
}
