//! Image Loading
//!
//! Turns an image reference from the conversation input into an inline
//! base64 payload the model backends can send. A reference is one of:
//!
//! - a local file path (`fridge.jpg`, `/tmp/shelf.png`)
//! - a `data:` URL (`data:image/png;base64,...`), passed through as-is
//! - an `http(s)` URL, downloaded with the shared HTTP client

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Media type assumed when nothing better is known
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Errors from resolving an image reference
#[derive(Debug, Error)]
pub enum ImageError {
    /// Local file could not be read
    #[error("failed to read image {path}: {source}")]
    Read {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Remote image could not be fetched
    #[error("failed to fetch image {url}: {source}")]
    Fetch {
        /// URL that was attempted
        url: String,
        /// Underlying HTTP error
        source: reqwest::Error,
    },

    /// Remote server answered with a non-success status
    #[error("image {url} returned {status}")]
    FetchStatus {
        /// URL that was attempted
        url: String,
        /// HTTP status
        status: reqwest::StatusCode,
    },

    /// Malformed `data:` URL
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// Reference resolved to zero bytes
    #[error("image {0} is empty")]
    Empty(String),
}

/// Base64-encoded image tagged with its media type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// MIME type, e.g. `image/jpeg`
    pub media_type: String,
    /// Standard base64 payload, no data-URL prefix
    pub base64: String,
}

impl ImageData {
    /// Wrap an already-encoded payload
    pub fn new(media_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            base64: base64.into(),
        }
    }

    /// Encode raw bytes
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(media_type, BASE64.encode(bytes))
    }

    /// Render as a `data:` URL
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }

    /// Parse a `data:<media>;base64,<payload>` URL
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidDataUrl`] if the URL is not base64 data
    /// or the payload does not decode, and [`ImageError::Empty`] for a
    /// payload with no bytes.
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ImageError::InvalidDataUrl("missing data: prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidDataUrl("missing payload".to_string()))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ImageError::InvalidDataUrl("only base64 data URLs are supported".to_string()))?;

        let bytes = BASE64
            .decode(payload)
            .map_err(|e| ImageError::InvalidDataUrl(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageError::Empty(url.to_string()));
        }

        let media_type = if media_type.is_empty() {
            DEFAULT_MEDIA_TYPE
        } else {
            media_type
        };
        Ok(Self::new(media_type, payload))
    }
}

/// Guess a media type from a file extension
#[must_use]
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => DEFAULT_MEDIA_TYPE,
    }
}

/// Resolves image references into [`ImageData`]
#[derive(Clone)]
pub struct ImageLoader {
    http_client: reqwest::Client,
}

impl ImageLoader {
    /// Create a loader with its own HTTP client
    #[must_use]
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(fetch_timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Resolve one reference
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] if the image cannot be read, fetched or
    /// decoded, or if it is empty.
    pub async fn load(&self, reference: &str) -> Result<ImageData, ImageError> {
        let reference = reference.trim();

        if reference.starts_with("data:") {
            return ImageData::from_data_url(reference);
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            return self.fetch(reference).await;
        }

        let path = PathBuf::from(reference);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ImageError::Read {
                path: path.clone(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(ImageError::Empty(reference.to_string()));
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Loaded image file");
        Ok(ImageData::from_bytes(media_type_for_path(&path), &bytes))
    }

    /// Resolve every reference, failing on the first bad one
    ///
    /// # Errors
    ///
    /// Returns the first [`ImageError`] encountered.
    pub async fn load_all(&self, references: &[String]) -> Result<Vec<ImageData>, ImageError> {
        let mut images = Vec::with_capacity(references.len());
        for reference in references {
            images.push(self.load(reference).await?);
        }
        Ok(images)
    }

    async fn fetch(&self, url: &str) -> Result<ImageData, ImageError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|source| ImageError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ImageError::FetchStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| media_type_for_path(Path::new(url)).to_string());

        let bytes = response.bytes().await.map_err(|source| ImageError::Fetch {
            url: url.to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(ImageError::Empty(url.to_string()));
        }

        tracing::debug!(url = url, bytes = bytes.len(), "Fetched remote image");
        Ok(ImageData::from_bytes(media_type, &bytes))
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
