//! HTTP client for the uploader API.
//!
//! Every endpoint answers with a JSON envelope `{success, message?, data?}`.
//! A well-formed `success: false` becomes [`Error::Rejected`]; anything
//! that prevents reading the envelope becomes [`Error::Transport`].
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - Generic `serde::de::DeserializeOwned` bounds for typed responses
//! - Traits returning `impl Future` as a seam for test doubles

use crate::config::{ConfigUpdate, RemoteConfig};
use crate::encode::UploadRequest;
use crate::playback::PlaybackCommand;
use crate::{Error, Result};
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded wait for any single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Response types ───────────────────────────────────────────────────

/// The common response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// Body of a non-2xx response. FastAPI puts the reason in `detail`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Positive acknowledgement of a command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ack {
    pub message: Option<String>,
}

/// Identifiers assigned by the server to a stored upload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(skip)]
    pub message: Option<String>,
}

/// One entry of `GET /api/upload/images`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub id: String,
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub uploaded_at: String,
}

/// A single decoded frame as returned by the frames endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FrameEntry {
    /// `data:image/png;base64,...` URL
    pub data: String,
    /// Milliseconds
    #[serde(default)]
    pub duration: u32,
}

/// Response of `GET /api/upload/{id}/frames`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FramesInfo {
    #[serde(default)]
    pub is_animated: bool,
    #[serde(default)]
    pub frames: Vec<FrameEntry>,
}

impl FramesInfo {
    /// Play/pause/stop are offered only for real animations.
    pub fn offers_playback(&self) -> bool {
        self.is_animated && self.frames.len() > 1
    }
}

#[derive(Serialize)]
struct AnimateRequest {
    action: PlaybackCommand,
}

// ── Seam ─────────────────────────────────────────────────────────────

/// The subset of the API the upload session and playback controller use.
///
/// [`ApiClient`] is the real implementation; tests substitute their own.
pub trait DeviceApi {
    fn fetch_config(&self) -> impl Future<Output = Result<RemoteConfig>>;

    fn upload(&self, request: &UploadRequest) -> impl Future<Output = Result<UploadReceipt>>;

    fn animate(&self, id: &str, command: PlaybackCommand) -> impl Future<Output = Result<Ack>>;
}

// ── Client ───────────────────────────────────────────────────────────

/// Typed client for every uploader endpoint.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::validation(format!("Invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::validation(format!("Invalid base URL {base_url}")));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments. Segments are
    /// percent-encoded, so file names with spaces are safe.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET /api/health. Any reply that parses as JSON counts as healthy.
    pub async fn health(&self) -> Result<()> {
        let response = self.http.get(self.endpoint(&["api", "health"])).send().await?;
        response.error_for_status()?.json::<serde_json::Value>().await?;
        Ok(())
    }

    /// GET /api/config/
    pub async fn fetch_config(&self) -> Result<RemoteConfig> {
        let response = self
            .http
            .get(self.endpoint(&["api", "config", ""]))
            .send()
            .await?;
        let envelope: Envelope<RemoteConfig> = read_envelope(response).await?;

        match envelope.data {
            Some(config) if envelope.success => Ok(config),
            _ => Err(Error::rejected(
                envelope.message,
                "Invalid configuration structure",
            )),
        }
    }

    /// POST /api/config/ with a partial update. Returns the stored config.
    pub async fn save_config(&self, update: &ConfigUpdate) -> Result<RemoteConfig> {
        let response = self
            .http
            .post(self.endpoint(&["api", "config", ""]))
            .json(update)
            .send()
            .await?;
        let envelope: Envelope<RemoteConfig> = read_envelope(response).await?;
        if !envelope.success {
            return Err(Error::rejected(envelope.message, "Error saving configuration"));
        }

        tracing::info!("Configuration saved");
        Ok(envelope.data.unwrap_or_default())
    }

    /// POST /api/upload as multipart form data.
    pub async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt> {
        let part = Part::bytes(request.payload.clone())
            .file_name(request.file_name.clone())
            .mime_str(request.mime)?;
        let form = Form::new()
            .part("image", part)
            .text("name", request.name.clone())
            .text("is_gif", if request.is_multi_frame { "true" } else { "false" });

        let response = self
            .http
            .post(self.endpoint(&["api", "upload"]))
            .multipart(form)
            .send()
            .await?;
        let envelope: Envelope<UploadReceipt> = read_envelope(response).await?;
        if !envelope.success {
            return Err(Error::rejected(envelope.message, "Error saving image"));
        }

        tracing::info!(
            "Uploaded {} ({} bytes, animated: {})",
            request.name,
            request.payload.len(),
            request.is_multi_frame
        );

        let mut receipt = envelope.data.unwrap_or_default();
        receipt.message = envelope.message;
        Ok(receipt)
    }

    /// GET /api/upload/images
    pub async fn list_images(&self) -> Result<Vec<StoredImage>> {
        let response = self
            .http
            .get(self.endpoint(&["api", "upload", "images"]))
            .send()
            .await?;
        let envelope: Envelope<Vec<StoredImage>> = read_envelope(response).await?;
        if !envelope.success {
            return Err(Error::rejected(envelope.message, "Error loading images"));
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// GET /api/upload/{id}/frames
    pub async fn frames(&self, id: &str) -> Result<FramesInfo> {
        let response = self
            .http
            .get(self.endpoint(&["api", "upload", id, "frames"]))
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Frames info for an asset, treating any failure as "not animated".
    pub async fn frames_or_still(&self, id: &str) -> FramesInfo {
        self.frames(id).await.unwrap_or_else(|e| {
            tracing::debug!("No frames info for {}: {}", id, e);
            FramesInfo::default()
        })
    }

    /// POST /api/upload/{id}/animate
    pub async fn animate(&self, id: &str, command: PlaybackCommand) -> Result<Ack> {
        let response = self
            .http
            .post(self.endpoint(&["api", "upload", id, "animate"]))
            .json(&AnimateRequest { action: command })
            .send()
            .await?;
        let fallback = format!("Could not {command} animation");
        ack(read_envelope(response).await?, &fallback)
    }

    /// DELETE /api/upload/{id}
    pub async fn delete_image(&self, id: &str) -> Result<Ack> {
        let response = self
            .http
            .delete(self.endpoint(&["api", "upload", id]))
            .send()
            .await?;
        let result = ack(read_envelope(response).await?, "Could not delete image")?;
        tracing::info!("Deleted image {}", id);
        Ok(result)
    }

    /// POST /api/upload/send-to-wled/{id}
    pub async fn send_to_wled(&self, id: &str) -> Result<Ack> {
        let response = self
            .http
            .post(self.endpoint(&["api", "upload", "send-to-wled", id]))
            .send()
            .await?;
        ack(read_envelope(response).await?, "Could not send to WLED")
    }

    /// GET /api/upload/download/{filename}: the stored file's bytes.
    pub async fn download(&self, filename: &str) -> Result<Vec<u8>> {
        self.fetch_bytes(&["api", "upload", "download", filename]).await
    }

    /// GET /api/upload/preview/{id}
    pub async fn preview(&self, id: &str) -> Result<Vec<u8>> {
        self.fetch_bytes(&["api", "upload", "preview", id]).await
    }

    async fn fetch_bytes(&self, segments: &[&str]) -> Result<Vec<u8>> {
        let response = self.http.get(self.endpoint(segments)).send().await?;
        let bytes = response.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl DeviceApi for ApiClient {
    async fn fetch_config(&self) -> Result<RemoteConfig> {
        ApiClient::fetch_config(self).await
    }

    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt> {
        ApiClient::upload(self, request).await
    }

    async fn animate(&self, id: &str, command: PlaybackCommand) -> Result<Ack> {
        ApiClient::animate(self, id, command).await
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Parse the envelope, turning HTTP error statuses into rejections that
/// carry the server's reason when it gave one.
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>> {
    let status = response.status();
    if !status.is_success() {
        let body: ErrorBody = response.json().await.unwrap_or_default();
        return Err(Error::rejected(
            body.detail.or(body.message),
            &format!("HTTP {}", status.as_u16()),
        ));
    }
    Ok(response.json().await?)
}

fn ack(envelope: Envelope<serde_json::Value>, fallback: &str) -> Result<Ack> {
    if envelope.success {
        Ok(Ack {
            message: envelope.message,
        })
    } else {
        Err(Error::rejected(envelope.message, fallback))
    }
}
