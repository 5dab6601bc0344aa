/// Image repository - inserts `fundus_images` rows
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{NewImageRecord, StoredFile, UPLOAD_STATUS_UPLOADED};

/// Write side of the image store used by the capture pipeline
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert one record and return its id
    async fn insert_image(&self, record: &NewImageRecord) -> Result<i64, sqlx::Error>;

    /// Location of a live (not soft-deleted) record
    async fn find_file(&self, id: i64) -> Result<Option<StoredFile>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn insert_image(&self, record: &NewImageRecord) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO fundus_images (
                examination_id, image_number, eye_side, capture_mode, image_type,
                file_path, file_name, file_size, file_format,
                acquisition_device, upload_status, thumbnail_data, duration, created_by,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                      CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            RETURNING id
            "#,
        )
        .bind(record.examination_id)
        .bind(&record.image_number)
        .bind(record.eye_side.as_str())
        .bind(record.capture_mode.as_str())
        .bind(&record.image_type)
        .bind(&record.file_path)
        .bind(&record.file_name)
        .bind(record.file_size)
        .bind(&record.file_format)
        .bind(&record.acquisition_device)
        .bind(UPLOAD_STATUS_UPLOADED)
        .bind(&record.thumbnail_data)
        .bind(record.duration)
        .bind(record.created_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_file(&self, id: i64) -> Result<Option<StoredFile>, sqlx::Error> {
        sqlx::query_as::<_, StoredFile>(
            r#"
            SELECT file_path, file_name, image_type
            FROM fundus_images
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
