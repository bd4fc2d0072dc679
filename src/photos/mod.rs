//! Photo service client: duplicate check against the remote listing and
//! single-file upload.
//!
//! The remote listing is fetched once, on the first duplicate check, and
//! is read-only for the rest of the run. Uploads made during the run do not
//! show up in it, so a second local file with an already-uploaded basename
//! is uploaded again; that case is logged at `warn`.

pub mod endpoints;
pub mod error;
pub mod inventory;
pub mod session;

use std::collections::HashSet;
use std::path::Path;

use tracing::Instrument;

use self::error::UploadServiceError;
use self::inventory::{is_uploaded, load_inventory, unique_key_for_path};
use self::session::PhotosSession;
use crate::types::FileOutcome;
use crate::upload::prepare::{prepare_upload_bytes, UploadPayload};

const CONTENT_TYPE_JPEG: &str = "image/jpeg";

pub struct PhotosService {
    session: Box<dyn PhotosSession>,
    service_root: String,
    photos_already_online: Option<HashSet<String>>,
    /// Basenames POSTed by this service. Only used for the repeat warning,
    /// never for the duplicate check.
    uploaded_this_run: HashSet<String>,
    /// Parent for every span this service opens.
    span: tracing::Span,
}

impl PhotosService {
    pub fn new(
        session: Box<dyn PhotosSession>,
        service_root: impl Into<String>,
        span: tracing::Span,
    ) -> Self {
        Self {
            session,
            service_root: service_root.into(),
            photos_already_online: None,
            uploaded_this_run: HashSet::new(),
            span,
        }
    }

    /// Upload `path` unless a photo with the same basename is already online.
    pub async fn ensure_file_uploaded(
        &mut self,
        path: &Path,
        full_quality: bool,
    ) -> Result<FileOutcome, UploadServiceError> {
        let span = tracing::info_span!(parent: &self.span, "file", file = %path.display());
        self.check_and_upload(path, full_quality)
            .instrument(span)
            .await
    }

    async fn check_and_upload(
        &mut self,
        path: &Path,
        full_quality: bool,
    ) -> Result<FileOutcome, UploadServiceError> {
        if self.file_is_uploaded(path).await? {
            return Ok(FileOutcome::Skipped);
        }
        let payload = prepare_upload_bytes(path, full_quality).await?;
        self.upload(path, payload).await?;
        Ok(FileOutcome::Uploaded)
    }

    pub async fn file_is_uploaded(&mut self, path: &Path) -> Result<bool, UploadServiceError> {
        let key = unique_key_for_path(path)
            .ok_or_else(|| UploadServiceError::InvalidFilename(path.display().to_string()))?;

        let exists = is_uploaded(path, self.ensure_loaded().await?);
        let exists_words = if exists { "is already" } else { "is not yet" };
        tracing::info!("{} {} online, last we checked", key, exists_words);

        Ok(exists)
    }

    /// Remote listing, fetched on first use and cached for the run.
    pub async fn ensure_loaded(&mut self) -> Result<&HashSet<String>, UploadServiceError> {
        if self.photos_already_online.is_none() {
            tracing::info!(
                parent: &self.span,
                "Loading existing-photo list from Google Photos (to make sure we do not upload duplicates)"
            );
            let inventory = load_inventory(self.session.as_ref(), &self.service_root).await?;
            tracing::debug!(parent: &self.span, count = inventory.len(), "Existing-photo list loaded");
            self.photos_already_online = Some(inventory);
        }
        Ok(&*self.photos_already_online.get_or_insert_with(HashSet::new))
    }

    /// POST the payload to the default album.
    pub async fn upload(
        &mut self,
        path: &Path,
        payload: UploadPayload,
    ) -> Result<(), UploadServiceError> {
        let slug = unique_key_for_path(path)
            .ok_or_else(|| UploadServiceError::InvalidFilename(path.display().to_string()))?;

        if self.uploaded_this_run.contains(&slug) {
            tracing::warn!(
                "{} was already uploaded earlier in this run; uploading {} as another copy",
                slug,
                path.display()
            );
        }
        tracing::info!("Uploading {}", slug);
        let headers = [
            ("Slug", slug.clone()),
            ("Content-Type", CONTENT_TYPE_JPEG.to_string()),
            ("Content-Length", payload.length.to_string()),
        ];
        let url = endpoints::upload_url(&self.service_root);
        let response = self.session.post(&url, &headers, payload.body).await?;

        if response.status() != 201 {
            tracing::error!("{}", response.text());
            return Err(UploadServiceError::Upload {
                status: response.status(),
                slug,
                body: response.text().to_string(),
            });
        }

        self.uploaded_this_run.insert(slug);
        Ok(())
    }
}
