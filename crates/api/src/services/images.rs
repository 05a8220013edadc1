//! Image hosting via Cloudinary unsigned uploads.
//!
//! Clients send images either as an existing `http(s)` URL, which is stored
//! as-is, or as base64 (bare or as a `data:` URI), which is uploaded. The
//! returned URL carries an 800x800 limit transformation.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ImageHostConfig;

/// Largest accepted decoded image.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Delivery transformation applied to every uploaded image.
const DELIVERY_TRANSFORMATION: &str = "c_limit,w_800,h_800/q_auto";

/// Folder used for vendor logos.
const LOGO_FOLDER: &str = "vendor-logos";

/// Errors from image handling.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Uploads are not configured on this server.
    #[error("image uploads are not configured")]
    NotConfigured,

    /// The payload is not a recognizable image.
    #[error("invalid image: {0}")]
    Invalid(String),

    /// The image host rejected the upload or could not be reached.
    #[error("image upload failed: {0}")]
    Upload(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// What an image is for; decides the destination folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Product,
    Logo,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    error: UploadErrorMessage,
}

#[derive(Debug, Deserialize)]
struct UploadErrorMessage {
    message: String,
}

/// Client for the image host.
#[derive(Debug, Clone)]
pub struct ImageHost {
    client: reqwest::Client,
    config: Option<ImageHostConfig>,
}

impl ImageHost {
    /// Create the client. `None` disables uploads; URLs still pass through.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: Option<ImageHostConfig>) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    /// Resolve a client-supplied image into a URL to store.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Invalid` for unusable payloads,
    /// `ImageError::NotConfigured` when an upload is needed but disabled,
    /// and `ImageError::Upload`/`Http` when the host fails.
    pub async fn store(&self, image: &str, kind: ImageKind) -> Result<String, ImageError> {
        let image = image.trim();
        match classify(image)? {
            ImageSource::Url => Ok(image.to_owned()),
            ImageSource::DataUri(data_uri) => self.upload(&data_uri, kind).await,
        }
    }

    async fn upload(&self, data_uri: &str, kind: ImageKind) -> Result<String, ImageError> {
        let config = self.config.as_ref().ok_or(ImageError::NotConfigured)?;
        let folder = match kind {
            ImageKind::Product => config.folder.as_str(),
            ImageKind::Logo => LOGO_FOLDER,
        };
        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            config.cloud_name
        );

        let response = self
            .client
            .post(&endpoint)
            .form(&[
                ("file", data_uri),
                ("upload_preset", config.upload_preset.as_str()),
                ("folder", folder),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<UploadErrorBody>()
                .await
                .map_or_else(|_| format!("status {status}"), |body| body.error.message);
            tracing::warn!(%status, %message, "Image upload rejected");
            return Err(ImageError::Upload(message));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Upload(format!("unexpected response: {e}")))?;

        tracing::debug!(url = %body.secure_url, folder, "Image uploaded");
        Ok(with_delivery_transformation(&body.secure_url))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ImageSource {
    Url,
    DataUri(String),
}

fn classify(image: &str) -> Result<ImageSource, ImageError> {
    if image.starts_with("https://") || image.starts_with("http://") {
        url::Url::parse(image).map_err(|e| ImageError::Invalid(e.to_string()))?;
        return Ok(ImageSource::Url);
    }

    if let Some(rest) = image.strip_prefix("data:") {
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| ImageError::Invalid("data URI must be base64".into()))?;
        if !mime.starts_with("image/") {
            return Err(ImageError::Invalid(format!("unsupported type {mime}")));
        }
        decode_checked(payload)?;
        return Ok(ImageSource::DataUri(image.to_owned()));
    }

    let bytes = decode_checked(image)?;
    let mime = sniff_mime(&bytes)
        .ok_or_else(|| ImageError::Invalid("unrecognized image format".into()))?;
    Ok(ImageSource::DataUri(format!("data:{mime};base64,{image}")))
}

fn decode_checked(payload: &str) -> Result<Vec<u8>, ImageError> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| ImageError::Invalid(format!("bad base64: {e}")))?;
    if bytes.is_empty() {
        return Err(ImageError::Invalid("empty image".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::Invalid("image larger than 5 MB".into()));
    }
    Ok(bytes)
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        Some("image/webp")
    } else {
        None
    }
}

/// Insert the delivery transformation after `/upload/` in a hosted URL.
fn with_delivery_transformation(secure_url: &str) -> String {
    secure_url.split_once("/upload/").map_or_else(
        || secure_url.to_owned(),
        |(head, tail)| format!("{head}/upload/{DELIVERY_TRANSFORMATION}/{tail}"),
    )
}
