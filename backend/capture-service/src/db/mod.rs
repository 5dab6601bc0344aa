/// Database access layer
///
/// This module provides:
/// - The image record repository (`fundus_images`)
/// - The audit sink (`system_logs`)
///
/// Both are traits so the capture pipeline can run against in-memory fakes.
pub mod audit_repo;
pub mod image_repo;

pub use audit_repo::{AuditEvent, AuditSink, PgAuditSink};
pub use image_repo::{ImageRepository, PgImageRepository};
