use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mime::Mime;
use rand::RngCore;
use rand::rngs::OsRng;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::api::error::AppError;
use crate::services::media::{MediaToolRunner, aspect_ratio_category};
use crate::services::storage::StorageService;

/// Outcome of a completed staging run: the object is durably stored and
/// every temporary file is already gone.
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

/// Orchestrates receive -> local spool -> probe -> classify -> remux ->
/// upload for a single request. Stateless across requests; every run works
/// on freshly named temp files and a freshly random storage key.
pub struct UploadService {
    storage: Arc<dyn StorageService>,
    media: Arc<dyn MediaToolRunner>,
    spool_dir: Option<PathBuf>,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn StorageService>,
        media: Arc<dyn MediaToolRunner>,
        spool_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            storage,
            media,
            spool_dir,
        }
    }

    /// Run the full staging pipeline on an incoming video body.
    ///
    /// The staged file and the remuxed file are owned by drop guards, so
    /// both are deleted on every exit path: success, any stage failure, or
    /// the whole future being dropped because the client went away.
    pub async fn stage_video<R>(
        &self,
        mut body: R,
        media_type: &Mime,
    ) -> Result<StoredObject, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        // Received -> BufferedLocally
        let staged = self.create_spool_file().await?;
        let mut writer = tokio::fs::File::from_std(
            staged
                .reopen()
                .map_err(|e| AppError::Internal(format!("failed to reopen spool file: {e}")))?,
        );

        let size = tokio::io::copy(&mut body, &mut writer).await.map_err(|e| {
            if body_limit_exceeded(&e) {
                AppError::PayloadTooLarge("upload exceeds the maximum allowed size".to_string())
            } else {
                AppError::BadRequest(format!("failed to read upload body: {e}"))
            }
        })?;
        writer
            .sync_all()
            .await
            .map_err(|e| AppError::Internal(format!("failed to flush spool file: {e}")))?;
        drop(writer);

        // BufferedLocally -> Probed (the prober opens its own handle)
        let info = self.media.probe(staged.path()).await?;

        // Probed -> Classified
        if info.aspect_ratio.is_none() {
            warn!(
                "no video stream found in upload ({} bytes), classifying as \"other\"",
                size
            );
        }
        let category = aspect_ratio_category(info.aspect_ratio.as_deref().unwrap_or_default());

        // Classified -> Remuxed
        let remuxed = TempPath::from_path(self.media.remux(staged.path()).await?);

        // Remuxed -> Uploaded
        let key = format!(
            "{}/{}.{}",
            category,
            random_object_id(),
            media_type.subtype().as_str()
        );

        self.storage
            .upload_file_from_path(&key, &remuxed, media_type.essence_str())
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        info!(
            "staged video upload: {} bytes, aspect ratio {:?} -> {}",
            size, info.aspect_ratio, key
        );

        Ok(StoredObject {
            bucket: self.storage.bucket().to_string(),
            key,
            size,
        })
        // `staged` and `remuxed` drop here and delete their files
    }

    async fn create_spool_file(&self) -> Result<NamedTempFile, AppError> {
        let spool_dir = self.spool_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut builder = tempfile::Builder::new();
            builder.prefix("video-upload-").suffix(".mp4");
            match spool_dir {
                Some(dir) => builder.tempfile_in(dir),
                None => builder.tempfile(),
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("spool task panicked: {e}")))?
        .map_err(|e| AppError::Internal(format!("failed to create spool file: {e}")))
    }
}

/// 32 bytes of OS randomness, URL-safe encoded: enough entropy that key
/// collisions across uploads are practically impossible.
pub(crate) fn random_object_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The transport layer caps the request body; when the cap is hit the read
/// error carries a `LengthLimitError` somewhere in its source chain.
fn body_limit_exceeded(err: &std::io::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
            return true;
        }
        source = e.source();
    }
    false
}
