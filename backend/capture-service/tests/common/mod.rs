#![allow(dead_code)]

use async_trait::async_trait;
use capture_service::db::{AuditEvent, AuditSink, ImageRepository};
use capture_service::models::{NewImageRecord, StoredFile};
use capture_service::services::{
    CaptureOrchestrator, ChannelPersister, FileReader, FixedClock, HttpSynthesisClient, ImageNumberGenerator,
    SynthesisRequest, ThumbnailCodec,
};
use chrono::{Local, TimeZone};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const CHANNELS: [&str; 4] = ["a_IR.jpg", "a_G.jpg", "a_R.jpg", "a_B.jpg"];

#[derive(Default)]
pub struct MemoryImageRepository {
    pub records: Mutex<Vec<NewImageRecord>>,
}

#[async_trait]
impl ImageRepository for MemoryImageRepository {
    async fn insert_image(&self, record: &NewImageRecord) -> Result<i64, sqlx::Error> {
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

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]))
        .save(path)
        .unwrap();
}

/// Behaves like the colorization service: writes the composite, echoes its path
pub struct ColorizeResponder;

impl Respond for ColorizeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: SynthesisRequest = match request.body_json() {
            Ok(body) => body,
            Err(e) => {
                return ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"code": 400, "msg": e.to_string()}))
            }
        };
        write_jpeg(Path::new(&body.color_img_path), 40, 30);
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "msg": "colorized",
            "data": {"save_path": body.color_img_path}
        }))
    }
}

pub async fn colorize_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/colorize"))
        .respond_with(ColorizeResponder)
        .mount(&server)
        .await;
    server
}

pub struct TestContext {
    pub repo: Arc<MemoryImageRepository>,
    pub audit: Arc<RecordingAuditSink>,
    pub orchestrator: CaptureOrchestrator,
    pub files: FileReader,
}

pub fn context(server: &MockServer, save_folder: &Path) -> TestContext {
    let repo = Arc::new(MemoryImageRepository::default());
    let audit = Arc::new(RecordingAuditSink::default());
    let clock = Arc::new(FixedClock::new(
        Local.with_ymd_and_hms(2025, 6, 19, 10, 10, 10).unwrap(),
    ));

    let synthesizer = HttpSynthesisClient::new(
        format!("{}/api/colorize", server.uri()),
        Duration::from_secs(5),
        1,
        Duration::from_millis(10),
    )
    .unwrap();

    let orchestrator = CaptureOrchestrator::new(
        ChannelPersister::new(repo.clone(), audit.clone(), ThumbnailCodec::default()),
        Arc::new(synthesizer),
        Arc::new(ImageNumberGenerator::new(clock)),
        save_folder.to_path_buf(),
    );

    TestContext {
        files: FileReader::new(repo.clone()),
        repo,
        audit,
        orchestrator,
    }
}
