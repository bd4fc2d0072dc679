use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::endpoints;
use super::error::UploadServiceError;
use super::session::PhotosSession;

/// Requested page size. The service has no "all" value, so this is simply
/// larger than any real library; results beyond the service's own cap are
/// silently missing and will be treated as not yet uploaded.
const MAX_RESULTS: &str = "999999999";

/// `{"feed": {"entry": [{"title": {"$t": "..."}}]}}`
#[derive(Debug, Deserialize)]
struct ListingResponse {
    feed: Feed,
}

#[derive(Debug, Deserialize)]
struct Feed {
    /// Omitted entirely by the service when the account has no photos.
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Title,
}

#[derive(Debug, Deserialize)]
struct Title {
    #[serde(rename = "$t")]
    text: String,
}

/// Fetch the titles of every photo already online.
pub async fn load_inventory(
    session: &dyn PhotosSession,
    service_root: &str,
) -> Result<HashSet<String>, UploadServiceError> {
    let url = endpoints::listing_url(service_root);
    let response = session
        .get(
            &url,
            &[
                ("kind", "photo"),
                ("alt", "json"),
                ("fields", "entry(title)"),
                ("max-results", MAX_RESULTS),
            ],
        )
        .await?;

    if response.status() != 200 {
        tracing::error!("{}", response.text());
        return Err(UploadServiceError::ListingFetch {
            status: response.status(),
            body: response.text().to_string(),
        });
    }

    let listing: ListingResponse = response.json()?;
    Ok(listing
        .feed
        .entry
        .into_iter()
        .map(|e| e.title.text)
        .collect())
}

/// Dedup key for a local file: its basename.
///
/// Two files with the same name in different directories share a key.
pub fn unique_key_for_path(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

pub fn is_uploaded(path: &Path, inventory: &HashSet<String>) -> bool {
    unique_key_for_path(path).is_some_and(|key| inventory.contains(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photos::test_support::FakeSession;
    use crate::photos::session::ServiceResponse;

    fn inventory(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unique_key_is_basename() {
        assert_eq!(
            unique_key_for_path(Path::new("/photos/2020/a.jpg")).as_deref(),
            Some("a.jpg")
        );
        assert_eq!(
            unique_key_for_path(Path::new("b.JPEG")).as_deref(),
            Some("b.JPEG")
        );
        assert_eq!(unique_key_for_path(Path::new("/")), None);
    }

    #[test]
    fn test_is_uploaded_membership() {
        let inv = inventory(&["a.jpg", "c.jpg"]);
        assert!(is_uploaded(Path::new("/x/a.jpg"), &inv));
        assert!(is_uploaded(Path::new("/y/z/c.jpg"), &inv));
        assert!(!is_uploaded(Path::new("/x/b.jpg"), &inv));
        // Case matters: the key is compared verbatim.
        assert!(!is_uploaded(Path::new("/x/A.jpg"), &inv));
    }

    #[test]
    fn test_is_uploaded_empty_inventory() {
        assert!(!is_uploaded(Path::new("a.jpg"), &HashSet::new()));
    }

    #[tokio::test]
    async fn test_load_inventory_parses_titles() {
        let session = FakeSession::new(ServiceResponse::new(
            200,
            r#"{"version":"1.0","encoding":"UTF-8","feed":{"entry":[
                {"title":{"$t":"a.jpg"}},
                {"title":{"$t":"b.jpg"}}
            ]}}"#,
        ));
        let inv = load_inventory(&session, "https://svc/data").await.unwrap();
        assert_eq!(inv, inventory(&["a.jpg", "b.jpg"]));

        let gets = session.gets();
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].0, "https://svc/data/feed/api/user/default");
        assert_eq!(
            gets[0].1,
            vec![
                ("kind".to_string(), "photo".to_string()),
                ("alt".to_string(), "json".to_string()),
                ("fields".to_string(), "entry(title)".to_string()),
                ("max-results".to_string(), "999999999".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_inventory_without_entries_is_empty() {
        let session = FakeSession::new(ServiceResponse::new(200, r#"{"feed":{}}"#));
        let inv = load_inventory(&session, "https://svc/data").await.unwrap();
        assert!(inv.is_empty());
    }

    #[tokio::test]
    async fn test_load_inventory_non_200_surfaces_body() {
        let session = FakeSession::new(ServiceResponse::new(500, "Internal error"));
        match load_inventory(&session, "https://svc/data").await {
            Err(UploadServiceError::ListingFetch { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "Internal error");
            }
            other => panic!("Expected ListingFetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_inventory_malformed_body() {
        let session = FakeSession::new(ServiceResponse::new(200, "<html></html>"));
        assert!(matches!(
            load_inventory(&session, "https://svc/data").await,
            Err(UploadServiceError::MalformedListing(_))
        ));
    }
}
