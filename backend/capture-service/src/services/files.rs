/// File reader - resolves a stored record back to the bytes it describes
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::ImageRepository;
use crate::error::{AppError, Result};

/// Contents of one stored image or video
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct FileReader {
    images: Arc<dyn ImageRepository>,
}

impl FileReader {
    pub fn new(images: Arc<dyn ImageRepository>) -> Self {
        Self { images }
    }

    /// Read the file behind record `id`
    ///
    /// A missing record and a record whose file is gone are both `NotFound`.
    pub async fn read(&self, id: i64) -> Result<FileContent> {
        let stored = self
            .images
            .find_file(id)
            .await
            .map_err(|e| {
                warn!(image_id = id, error = %e, "Image lookup failed");
                AppError::Internal(format!("Failed to look up image {id}: {e}"))
            })?
            .ok_or_else(|| AppError::NotFound(format!("image {id}")))?;

        let path = stored.location();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(image_id = id, path = %path.display(), "Recorded file is missing");
                return Err(AppError::NotFound(format!("file for image {id}")));
            }
            Err(source) => return Err(AppError::FileUnreadable { path, source }),
        };

        debug!(image_id = id, path = %path.display(), size = bytes.len(), "Serving stored file");

        Ok(FileContent {
            content_type: stored.content_type(),
            file_name: stored.file_name,
            bytes,
        })
    }
}
