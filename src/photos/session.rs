use serde::de::DeserializeOwned;

/// Body of an upload POST.
///
/// Unchanged originals are streamed straight from the open file; resized
/// images are already in memory.
#[derive(Debug)]
pub enum UploadBody {
    File(tokio::fs::File),
    Buffer(Vec<u8>),
}

impl UploadBody {
    /// Drain the body into memory. Used where a byte slice is needed.
    #[cfg(test)]
    pub async fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        match self {
            UploadBody::Buffer(bytes) => Ok(bytes),
            UploadBody::File(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).await?;
                Ok(bytes)
            }
        }
    }
}

impl From<UploadBody> for reqwest::Body {
    fn from(body: UploadBody) -> Self {
        match body {
            UploadBody::File(file) => {
                reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file))
            }
            UploadBody::Buffer(bytes) => reqwest::Body::from(bytes),
        }
    }
}

/// Buffered response: status code plus the full body text.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    status: u16,
    body: String,
}

impl ServiceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Minimal async session used by the photos service.
/// The concrete implementation lives in `crate::auth::session`.
#[async_trait::async_trait]
pub trait PhotosSession: Send + Sync {
    async fn get(&self, url: &str, params: &[(&str, &str)]) -> anyhow::Result<ServiceResponse>;

    async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: UploadBody,
    ) -> anyhow::Result<ServiceResponse>;
}
