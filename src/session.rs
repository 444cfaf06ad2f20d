//! Upload session: the state of the two-step "pick a file, review, save"
//! flow, owned by one object instead of spread across globals.
//!
//! Flow:
//! 1. [`UploadSession::select_file`] reads and decodes the file, resolves
//!    the matrix geometry, then rasterizes. Geometry always comes first.
//! 2. The caller shows the preview and lets the user edit the name.
//! 3. [`UploadSession::save`] validates, encodes and uploads. Only a
//!    successful upload resets the session; failures leave it untouched
//!    so the user can retry without picking the file again.
//!
//! Every selection gets a new generation number. A finished upload only
//! resets the session if its generation is still current, so a result that
//! arrives after the user cancelled or picked another file is harmless.

use crate::client::{DeviceApi, UploadReceipt};
use crate::config::GeometryCache;
use crate::encode::{UploadRequest, encode_upload};
use crate::media::SourceImage;
use crate::raster::{Rasterized, rasterize};
use crate::{MatrixGeometry, Notice, Result};
use std::path::Path;

/// Which screen of the upload flow is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStep {
    SelectFile,
    Review,
}

/// The loaded image together with its rasterization.
#[derive(Clone, Debug)]
pub struct Selection {
    pub generation: u64,
    pub source: SourceImage,
    pub raster: Rasterized,
}

/// An encoded upload tagged with the selection it was built from.
#[derive(Clone, Debug)]
pub struct PendingUpload {
    pub generation: u64,
    pub request: UploadRequest,
}

#[derive(Debug)]
pub struct UploadSession {
    step: UploadStep,
    name: String,
    selection: Option<Selection>,
    geometry: GeometryCache,
    generation: u64,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new(GeometryCache::default())
    }
}

impl UploadSession {
    pub fn new(geometry: GeometryCache) -> Self {
        Self {
            step: UploadStep::SelectFile,
            name: String::new(),
            selection: None,
            geometry,
            generation: 0,
        }
    }

    pub fn step(&self) -> UploadStep {
        self.step
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn geometry(&self) -> MatrixGeometry {
        self.geometry.get()
    }

    /// Read, decode and rasterize a file from disk.
    pub async fn select_file<A: DeviceApi>(&mut self, api: &A, path: &Path) -> Result<&Selection> {
        let source = SourceImage::open(path).await?;
        self.select_source(api, source).await
    }

    /// Load an already decoded source and move to the review step.
    ///
    /// The geometry is refreshed before rasterizing; if the config service
    /// is unreachable the cached geometry is used.
    pub async fn select_source<A: DeviceApi>(
        &mut self,
        api: &A,
        source: SourceImage,
    ) -> Result<&Selection> {
        let geometry = self.geometry.refresh(api).await;
        let raster = rasterize(&source.decoded, geometry)?;

        self.generation += 1;
        tracing::info!(
            "Selected {} ({}x{}) for a {} matrix ({} LEDs)",
            source.file_name,
            source.width(),
            source.height(),
            raster.geometry,
            raster.geometry.pixel_count()
        );

        self.name = source.default_display_name();
        self.step = UploadStep::Review;
        Ok(self.selection.insert(Selection {
            generation: self.generation,
            source,
            raster,
        }))
    }

    /// Drop the current image and go back to file selection.
    pub fn cancel(&mut self) {
        self.step = UploadStep::SelectFile;
        self.name.clear();
        self.selection = None;
    }

    /// Validate and encode the current selection without sending it.
    pub fn prepare_upload(&self) -> Result<PendingUpload> {
        let request = encode_upload(
            &self.name,
            self.selection.as_ref().map(|s| &s.source),
            self.selection.as_ref().map(|s| &s.raster.matrix),
        )?;
        let generation = self.selection.as_ref().map_or(0, |s| s.generation);

        Ok(PendingUpload {
            generation,
            request,
        })
    }

    /// Apply the result of an upload started from `pending`.
    pub fn finish_upload(&mut self, pending: &PendingUpload, result: Result<UploadReceipt>) -> Notice {
        match result {
            Ok(receipt) => {
                if let (Some(id), Some(filename)) = (&receipt.id, &receipt.filename) {
                    tracing::info!("{} stored as {} (id {})", pending.request.name, filename, id);
                }

                let is_current = self
                    .selection
                    .as_ref()
                    .is_some_and(|s| s.generation == pending.generation);
                if is_current {
                    self.cancel();
                } else {
                    tracing::debug!(
                        "Upload for generation {} finished after the selection changed",
                        pending.generation
                    );
                }

                let fallback = if pending.request.is_multi_frame {
                    "GIF saved successfully"
                } else {
                    "Image saved successfully"
                };
                Notice::success(receipt.message.unwrap_or_else(|| fallback.to_string()))
            }
            Err(e) => {
                tracing::error!("Upload of {} failed: {}", pending.request.name, e);
                e.to_notice()
            }
        }
    }

    /// Validate, encode and upload the current selection.
    pub async fn save<A: DeviceApi>(&mut self, api: &A) -> Notice {
        let pending = match self.prepare_upload() {
            Ok(pending) => pending,
            Err(e) => return e.to_notice(),
        };
        let result = api.upload(&pending.request).await;
        self.finish_upload(&pending, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Ack;
    use crate::config::RemoteConfig;
    use crate::encode::{EMPTY_NAME_MESSAGE, NO_IMAGE_MESSAGE};
    use crate::playback::PlaybackCommand;
    use crate::{Error, NoticeLevel};
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::Mutex;

    enum Reply {
        Accept,
        Reject,
        Unreachable,
    }

    struct FakeServer {
        matrix: Option<MatrixGeometry>,
        reply: Reply,
        uploads: Mutex<Vec<UploadRequest>>,
        config_fetches: Mutex<u32>,
    }

    impl FakeServer {
        fn new(matrix: Option<MatrixGeometry>, reply: Reply) -> Self {
            Self {
                matrix,
                reply,
                uploads: Mutex::new(Vec::new()),
                config_fetches: Mutex::new(0),
            }
        }

        fn upload_count(&self) -> usize {
            self.uploads.lock().unwrap().len()
        }
    }

    impl DeviceApi for FakeServer {
        async fn fetch_config(&self) -> Result<RemoteConfig> {
            *self.config_fetches.lock().unwrap() += 1;
            match self.matrix {
                Some(matrix) => Ok(RemoteConfig {
                    matrix: Some(matrix),
                    ..Default::default()
                }),
                None => Err(Error::rejected(None, "config unavailable")),
            }
        }

        async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt> {
            self.uploads.lock().unwrap().push(request.clone());
            match self.reply {
                Reply::Accept => Ok(UploadReceipt::default()),
                Reply::Reject => Err(Error::rejected(Some("Disk full".into()), "Error saving image")),
                Reply::Unreachable => Err(Error::Io(std::io::Error::other("connection refused"))),
            }
        }

        async fn animate(&self, _id: &str, _command: PlaybackCommand) -> Result<Ack> {
            Ok(Ack::default())
        }
    }

    fn source(format: ImageFormat, name: &str) -> SourceImage {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 48, Rgba([0, 90, 200, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        SourceImage::from_bytes(name, out.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn selection_uses_fetched_geometry() {
        let server = FakeServer::new(Some(MatrixGeometry::new(32, 8)), Reply::Accept);
        let mut session = UploadSession::default();

        let selection = session.select_source(&server, source(ImageFormat::Png, "sky.png")).await.unwrap();
        assert_eq!(selection.raster.matrix.dimensions(), (32, 8));

        assert_eq!(session.step(), UploadStep::Review);
        assert_eq!(session.name(), "sky");
        assert_eq!(*server.config_fetches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unreachable_config_falls_back_to_cached_geometry() {
        let server = FakeServer::new(None, Reply::Accept);
        let mut session = UploadSession::new(GeometryCache::new(MatrixGeometry::new(16, 16)));

        let selection = session.select_source(&server, source(ImageFormat::Png, "sky.png")).await.unwrap();
        assert_eq!(selection.raster.geometry, MatrixGeometry::new(16, 16));
    }

    #[tokio::test]
    async fn empty_name_warns_without_network() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Accept);
        let mut session = UploadSession::default();
        session.select_source(&server, source(ImageFormat::Png, "sky.png")).await.unwrap();
        session.set_name("");

        let notice = session.save(&server).await;

        assert_eq!(notice, Notice::warning(EMPTY_NAME_MESSAGE));
        assert_eq!(server.upload_count(), 0);
        assert_eq!(session.step(), UploadStep::Review);
    }

    #[tokio::test]
    async fn missing_image_warns_without_network() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Accept);
        let mut session = UploadSession::default();
        session.set_name("something");

        let notice = session.save(&server).await;

        assert_eq!(notice, Notice::warning(NO_IMAGE_MESSAGE));
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn successful_save_resets_session() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Accept);
        let mut session = UploadSession::default();
        session.select_source(&server, source(ImageFormat::Gif, "loop.gif")).await.unwrap();

        let notice = session.save(&server).await;

        assert_eq!(notice, Notice::success("GIF saved successfully"));
        assert_eq!(session.step(), UploadStep::SelectFile);
        assert_eq!(session.name(), "");
        assert!(session.selection().is_none());

        let uploads = server.uploads.lock().unwrap();
        assert!(uploads[0].is_multi_frame);
    }

    #[tokio::test]
    async fn rejected_save_keeps_state_for_retry() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Reject);
        let mut session = UploadSession::default();
        session.select_source(&server, source(ImageFormat::Png, "sky.png")).await.unwrap();

        let notice = session.save(&server).await;

        assert_eq!(notice, Notice::danger("Disk full"));
        assert_eq!(session.step(), UploadStep::Review);
        assert_eq!(session.name(), "sky");
        assert!(session.selection().is_some());
    }

    #[tokio::test]
    async fn transport_failure_keeps_state_for_retry() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Unreachable);
        let mut session = UploadSession::default();
        session.select_source(&server, source(ImageFormat::Png, "sky.png")).await.unwrap();

        let notice = session.save(&server).await;

        assert_eq!(notice.level, NoticeLevel::Danger);
        assert!(session.selection().is_some());
    }

    #[tokio::test]
    async fn stale_upload_result_does_not_clear_new_selection() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Accept);
        let mut session = UploadSession::default();
        session.select_source(&server, source(ImageFormat::Png, "first.png")).await.unwrap();
        let pending = session.prepare_upload().unwrap();

        // User cancels and picks another file while the upload is in flight.
        session.cancel();
        session.select_source(&server, source(ImageFormat::Png, "second.png")).await.unwrap();

        let notice = session.finish_upload(&pending, Ok(UploadReceipt::default()));

        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(session.step(), UploadStep::Review);
        assert_eq!(session.name(), "second");
        assert_eq!(session.selection().unwrap().source.file_name, "second.png");
    }

    #[tokio::test]
    async fn cancel_clears_everything() {
        let server = FakeServer::new(Some(MatrixGeometry::default()), Reply::Accept);
        let mut session = UploadSession::default();
        session.select_source(&server, source(ImageFormat::Png, "sky.png")).await.unwrap();

        session.cancel();

        assert_eq!(session.step(), UploadStep::SelectFile);
        assert_eq!(session.name(), "");
        assert!(session.selection().is_none());
    }
}
