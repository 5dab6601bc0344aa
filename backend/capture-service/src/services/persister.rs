//! Channel persister - turns one image file on disk into one image record
//!
//! Workflow per file:
//! 1. Stat the file for its size
//! 2. Derive the inline thumbnail
//! 3. Insert the record
//! 4. Emit an audit event
//!
//! If the insert fails the file is deleted, so a failed call leaves neither a
//! record nor the file behind. Used for channel images and composites alike.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::thumbnail::ThumbnailCodec;
use crate::db::{AuditEvent, AuditSink, ImageRepository};
use crate::error::{AppError, Result};
use crate::models::{CaptureMetadata, Caller, NewImageRecord};

/// Outcome of persisting one file
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedFile {
    pub id: i64,
    pub path: PathBuf,
    pub file_size: i64,
    pub thumbnail_data: String,
}

/// Which operation log category a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Image,
    Video,
}

impl RecordKind {
    fn module(&self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Self::Image => "save image to local",
            Self::Video => "save video to local",
        }
    }

    fn id_field(&self) -> &'static str {
        match self {
            Self::Image => "image_id",
            Self::Video => "video_id",
        }
    }
}

#[derive(Clone)]
pub struct ChannelPersister {
    images: Arc<dyn ImageRepository>,
    audit: Arc<dyn AuditSink>,
    codec: ThumbnailCodec,
}

impl ChannelPersister {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        audit: Arc<dyn AuditSink>,
        codec: ThumbnailCodec,
    ) -> Self {
        Self {
            images,
            audit,
            codec,
        }
    }

    /// Persist `dir/file_name` under the given image number
    pub async fn persist(
        &self,
        meta: &CaptureMetadata,
        image_number: &str,
        dir: &Path,
        file_name: &str,
        caller: &Caller,
    ) -> Result<PersistedFile> {
        let path = dir.join(file_name);

        let file_size = stat_size(&path).await?;
        let thumbnail_data = self.codec.encode_async(path.clone()).await?;

        let record = NewImageRecord {
            examination_id: meta.examination_id,
            image_number: image_number.to_string(),
            eye_side: meta.eye_side,
            capture_mode: meta.capture_mode,
            image_type: meta.image_type.clone(),
            file_path: dir.to_string_lossy().into_owned(),
            file_name: file_name.to_string(),
            file_size,
            file_format: meta.file_format.clone(),
            acquisition_device: meta.acquisition_device.clone(),
            thumbnail_data,
            duration: None,
            created_by: caller.user_id,
        };

        let id = self
            .write_record(&record, &path, caller, RecordKind::Image)
            .await?;

        Ok(PersistedFile {
            id,
            path,
            file_size,
            thumbnail_data: record.thumbnail_data,
        })
    }

    /// Insert `record` describing the file at `path`
    ///
    /// Removes the file when the insert fails; a failed removal is only logged.
    pub async fn write_record(
        &self,
        record: &NewImageRecord,
        path: &Path,
        caller: &Caller,
        kind: RecordKind,
    ) -> Result<i64> {
        let id = match self.images.insert_image(record).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    examination_id = record.examination_id,
                    file_name = %record.file_name,
                    error = %e,
                    "Record insert failed, removing file"
                );
                if let Err(rm) = tokio::fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %rm, "Failed to remove orphaned file");
                }
                return Err(AppError::PersistenceFailed(format!(
                    "{}: {e}",
                    record.file_name
                )));
            }
        };

        info!(
            image_id = id,
            image_number = %record.image_number,
            examination_id = record.examination_id,
            file_name = %record.file_name,
            file_size = record.file_size,
            "Image record saved"
        );

        let mut payload = json!({
            "username": caller.username,
            "examination_id": record.examination_id,
            kind.id_field(): id,
            "eye_side": record.eye_side.as_str(),
            "file_name": record.file_name,
            "file_size": record.file_size,
            "ip_address": caller.ip_address,
        });
        if let Some(duration) = record.duration {
            payload["duration"] = json!(duration);
        }

        self.audit
            .record(AuditEvent {
                level: "INFO",
                module: kind.module(),
                action: kind.action(),
                user_id: caller.user_id,
                ip_address: caller.ip_address.clone(),
                payload,
            })
            .await;

        Ok(id)
    }
}

async fn stat_size(path: &Path) -> Result<i64> {
    let unreadable = |source| AppError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(unreadable(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    Ok(metadata.len() as i64)
}
