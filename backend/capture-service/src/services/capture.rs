//! Capture orchestrator
//!
//! Drives one capture request through its stages:
//! `Validating -> PersistingChannels -> Synthesizing -> PersistingComposite -> Done`.
//!
//! Channel records are written independently. When a later stage fails the
//! records already written stay in place and their ids are logged.

use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::identifiers::{
    composite_target, video_dir, video_file_name, ImageNumberGenerator, NumberKind,
};
use super::persister::{ChannelPersister, RecordKind};
use super::synthesis::{SynthesisRequest, Synthesizer};
use crate::error::{AppError, Result};
use crate::models::{
    Caller, CaptureRequest, CaptureResponse, ChannelRole, ImageInfo, NewImageRecord,
    SingleImageRequest, SingleImageResponse, VideoSaveResponse, VideoUpload, VIDEO_IMAGE_TYPE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureStage {
    Validating,
    PersistingChannels,
    Synthesizing,
    PersistingComposite,
    Done,
}

#[derive(Clone)]
pub struct CaptureOrchestrator {
    persister: ChannelPersister,
    synthesizer: Arc<dyn Synthesizer>,
    numbers: Arc<ImageNumberGenerator>,
    save_folder_path: PathBuf,
}

impl CaptureOrchestrator {
    pub fn new(
        persister: ChannelPersister,
        synthesizer: Arc<dyn Synthesizer>,
        numbers: Arc<ImageNumberGenerator>,
        save_folder_path: PathBuf,
    ) -> Self {
        Self {
            persister,
            synthesizer,
            numbers,
            save_folder_path,
        }
    }

    /// Persist every channel file and, in color mode, the synthesized composite
    ///
    /// Images are reported in caller order followed by the composite.
    pub async fn capture(&self, request: CaptureRequest, caller: &Caller) -> Result<CaptureResponse> {
        let meta = &request.meta;
        let examination_id = meta.examination_id;

        enter(CaptureStage::Validating, examination_id);
        ensure_files_exist(&request.file_dir, &request.image_names).await?;

        let image_number = self.numbers.next(NumberKind::Image, examination_id);
        let mut images = Vec::with_capacity(request.image_names.len() + 1);
        let mut synthesis = SynthesisRequest::default();

        enter(CaptureStage::PersistingChannels, examination_id);
        for (file_name, role) in request.classified() {
            let saved = match self
                .persister
                .persist(meta, &image_number, &request.file_dir, file_name, caller)
                .await
            {
                Ok(saved) => saved,
                Err(e) => {
                    return Err(abandon(CaptureStage::PersistingChannels, examination_id, &images, e))
                }
            };

            let path = saved.path.to_string_lossy().into_owned();
            match role {
                Some(ChannelRole::Infrared) => synthesis.ir_image = path.clone(),
                Some(ChannelRole::Green) => synthesis.green_image = path.clone(),
                Some(ChannelRole::Red) => synthesis.red_image = path.clone(),
                Some(ChannelRole::Blue) => synthesis.blue_image = path.clone(),
                None => {}
            }

            images.push(ImageInfo {
                id: saved.id,
                image_path: path,
                thumbnail_data: saved.thumbnail_data,
            });
        }

        if meta.capture_mode.wants_composite() {
            enter(CaptureStage::Synthesizing, examination_id);
            let target = composite_target(&request.file_dir, self.numbers.clock().now()).await;
            synthesis.color_img_path = target.to_string_lossy().into_owned();

            if let Err(e) = self.synthesizer.synthesize(&synthesis).await {
                return Err(abandon(
                    CaptureStage::Synthesizing,
                    examination_id,
                    &images,
                    e.into(),
                ));
            }

            enter(CaptureStage::PersistingComposite, examination_id);
            let composite_name = target
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    AppError::Internal(format!("composite path {} has no file name", target.display()))
                })?;

            let saved = match self
                .persister
                .persist(meta, &image_number, &request.file_dir, composite_name, caller)
                .await
            {
                Ok(saved) => saved,
                Err(e) => {
                    return Err(abandon(CaptureStage::PersistingComposite, examination_id, &images, e))
                }
            };

            images.push(ImageInfo {
                id: saved.id,
                image_path: synthesis.color_img_path,
                thumbnail_data: saved.thumbnail_data,
            });
        }

        enter(CaptureStage::Done, examination_id);
        info!(
            examination_id,
            image_number = %image_number,
            image_count = images.len(),
            capture_mode = meta.capture_mode.as_str(),
            "Capture saved"
        );

        Ok(CaptureResponse {
            images,
            capture_mode: meta.capture_mode,
            image_number,
        })
    }

    /// Persist one already-captured image
    pub async fn save_single(
        &self,
        request: SingleImageRequest,
        caller: &Caller,
    ) -> Result<SingleImageResponse> {
        let image_number = self
            .numbers
            .next(NumberKind::Image, request.meta.examination_id);

        let saved = self
            .persister
            .persist(
                &request.meta,
                &image_number,
                &request.file_dir,
                &request.image_name,
                caller,
            )
            .await?;

        Ok(SingleImageResponse {
            id: saved.id,
            image_number,
            image_path: saved.path.to_string_lossy().into_owned(),
            thumbnail_data: saved.thumbnail_data,
            capture_mode: request.meta.capture_mode,
        })
    }

    /// Write a recorded video under the storage root and record it
    pub async fn save_video(&self, upload: VideoUpload, caller: &Caller) -> Result<VideoSaveResponse> {
        let now = self.numbers.clock().now();
        let dir = video_dir(
            &self.save_folder_path,
            &upload.patient_id,
            upload.examination_id,
            now,
        );

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Internal(format!("Failed to create {}: {e}", dir.display()))
        })?;
        let (path, file_name) =
            write_new_video(&dir, now, &upload.file_format, &upload.payload).await?;

        let video_number = self.numbers.next(NumberKind::Video, upload.examination_id);
        let file_path = path.to_string_lossy().into_owned();
        let file_size = upload.payload.len() as i64;

        let record = NewImageRecord {
            examination_id: upload.examination_id,
            image_number: video_number.clone(),
            eye_side: upload.eye_side,
            capture_mode: upload.capture_mode,
            image_type: Some(VIDEO_IMAGE_TYPE.to_string()),
            file_path: file_path.clone(),
            file_name: file_name.clone(),
            file_size,
            file_format: upload.file_format,
            acquisition_device: Some(upload.acquisition_device),
            thumbnail_data: upload.cover_image_data,
            duration: Some(upload.duration),
            created_by: caller.user_id,
        };

        let id = self
            .persister
            .write_record(&record, &path, caller, RecordKind::Video)
            .await?;

        Ok(VideoSaveResponse {
            id,
            video_number,
            file_path,
            file_name,
            file_size,
            capture_mode: upload.capture_mode,
        })
    }
}

fn enter(stage: CaptureStage, examination_id: i64) {
    debug!(examination_id, ?stage, "Capture stage");
}

/// Every named file must be a regular file before anything is written
async fn ensure_files_exist(dir: &Path, names: &[String]) -> Result<()> {
    for name in names {
        let path = dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => {}
            Ok(_) => {
                return Err(AppError::FileUnreadable {
                    path,
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a regular file",
                    ),
                })
            }
            Err(source) => return Err(AppError::FileUnreadable { path, source }),
        }
    }
    Ok(())
}

/// Create the first free `HHMMSS[_N].{format}` under `dir` and fill it
///
/// Creation is exclusive, so a video saved earlier in the same second is
/// never overwritten.
async fn write_new_video(
    dir: &Path,
    now: DateTime<Local>,
    file_format: &str,
    payload: &[u8],
) -> Result<(PathBuf, String)> {
    let mut attempt = 0;
    loop {
        let file_name = video_file_name(now, file_format, attempt);
        let path = dir.join(&file_name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                fill_or_remove(file, &path, payload).await?;
                return Ok((path, file_name));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to create {}: {e}",
                    path.display()
                )))
            }
        }
    }
}

/// Write `payload` to `out`; on failure the partial file at `path` is removed
async fn fill_or_remove<W>(mut out: W, path: &Path, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match out.write_all(payload).await {
        Ok(()) => out.flush().await,
        Err(e) => Err(e),
    };
    drop(out);

    if let Err(e) = written {
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %rm, "Failed to remove partial video");
        }
        return Err(AppError::Internal(format!(
            "Failed to write {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

fn abandon(stage: CaptureStage, examination_id: i64, kept: &[ImageInfo], error: AppError) -> AppError {
    if kept.is_empty() {
        warn!(examination_id, ?stage, error = %error, "Capture aborted");
    } else {
        let kept_ids: Vec<i64> = kept.iter().map(|i| i.id).collect();
        warn!(
            examination_id,
            ?stage,
            ?kept_ids,
            error = %error,
            "Capture aborted, earlier records kept"
        );
    }
    error
}
