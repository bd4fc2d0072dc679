//! URL builders for the photo service data API.
//!
//! `service_root` is the API prefix without a trailing slash, for example
//! `https://picasaweb.google.com/data`.

/// Feed of every photo owned by the authenticated user.
pub fn listing_url(service_root: &str) -> String {
    format!("{}/feed/api/user/default", service_root)
}

/// Upload target: the user's default album.
pub fn upload_url(service_root: &str) -> String {
    format!("{}/feed/api/user/default/albumid/default", service_root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let root = "https://picasaweb.google.com/data";
        assert_eq!(
            listing_url(root),
            "https://picasaweb.google.com/data/feed/api/user/default"
        );
        assert_eq!(
            upload_url(root),
            "https://picasaweb.google.com/data/feed/api/user/default/albumid/default"
        );
    }
}
