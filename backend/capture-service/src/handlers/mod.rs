/// HTTP handlers for capture-service
///
/// This module contains handlers for:
/// - Images: multi-channel capture, single image and video saves, file reads
/// - Health: liveness check
pub mod health;
pub mod images;

use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::error::AppError;

pub use health::health;
pub use images::{save_image, save_multi_image, save_video, serve_file};

/// Mount every route under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health))
            .route("/openapi.json", web::get().to(crate::openapi::openapi_json))
            .service(
                web::scope("/images")
                    .route("/save-multi-image", web::post().to(save_multi_image))
                    .route("/save-image", web::post().to(save_image))
                    .route("/save-video", web::post().to(save_video))
                    .route("/file/{id}", web::get().to(serve_file)),
            ),
    );
}

/// Body extraction errors reported in the same envelope as field checks
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024 * 1024)
        .error_handler(json_error)
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}
