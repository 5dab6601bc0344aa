//! In-memory collaborators for service tests

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use crate::db::{AuditEvent, AuditSink, ImageRepository};
use crate::error::SynthesisError;
use crate::models::{NewImageRecord, StoredFile};
use crate::services::synthesis::{SynthesisRequest, Synthesizer};

/// Stores records in a vector; can be told to fail the Nth insert (1-based)
#[derive(Default)]
pub struct MemoryImageRepository {
    pub records: Mutex<Vec<NewImageRecord>>,
    pub fail_on: Mutex<Option<usize>>,
    attempts: Mutex<usize>,
}

impl MemoryImageRepository {
    pub fn failing_on(n: usize) -> Self {
        let repo = Self::default();
        *repo.fail_on.lock() = Some(n);
        repo
    }

    pub fn file_names(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.file_name.clone())
            .collect()
    }
}

#[async_trait]
impl ImageRepository for MemoryImageRepository {
    async fn insert_image(&self, record: &NewImageRecord) -> Result<i64, sqlx::Error> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            *attempts
        };
        if *self.fail_on.lock() == Some(attempt) {
            return Err(sqlx::Error::Protocol("injected insert failure".to_string()));
        }
        let mut records = self.records.lock();
        records.push(record.clone());
        Ok(records.len() as i64)
    }

    async fn find_file(&self, id: i64) -> Result<Option<StoredFile>, sqlx::Error> {
        let records = self.records.lock();
        let record = usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| records.get(index));
        Ok(record.map(|r| StoredFile {
            file_path: r.file_path.clone(),
            file_name: r.file_name.clone(),
            image_type: r.image_type.clone(),
        }))
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

/// How the fake colorizer answers
#[derive(Clone)]
pub enum FakeSynthesis {
    /// Write a composite at the requested path and echo it
    Echo,
    /// Write the composite but report a different path
    Mismatch(String),
    Fail(Arc<dyn Fn() -> SynthesisError + Send + Sync>),
}

pub struct FakeSynthesizer {
    pub behaviour: FakeSynthesis,
    pub calls: Mutex<Vec<SynthesisRequest>>,
}

impl FakeSynthesizer {
    pub fn new(behaviour: FakeSynthesis) -> Self {
        Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError> {
        self.calls.lock().push(request.clone());
        match &self.behaviour {
            FakeSynthesis::Echo => {
                write_jpeg(Path::new(&request.color_img_path), 24, 24);
                Ok(request.color_img_path.clone())
            }
            FakeSynthesis::Mismatch(other) => {
                write_jpeg(Path::new(&request.color_img_path), 24, 24);
                Err(SynthesisError::PathMismatch {
                    requested: request.color_img_path.clone(),
                    returned: other.clone(),
                })
            }
            FakeSynthesis::Fail(make) => Err(make()),
        }
    }
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 90]))
        .save(path)
        .unwrap();
}
