use actix_web::HttpResponse;
/// OpenAPI documentation for the Capture Service
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Capture Service API",
        version = "1.0.0",
        description = "Persists fundus capture batches: per-channel images with inline thumbnails, the synthesized color composite, and recorded videos.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8086", description = "Development server"),
    ),
    paths(
        handlers::health::health,
        handlers::images::save_multi_image,
        handlers::images::save_image,
        handlers::images::save_video,
        handlers::images::serve_file,
    ),
    components(schemas(
        models::EyeSide,
        models::CaptureMode,
        models::SaveMultiImageRequest,
        models::SaveImageRequest,
        models::SaveVideoRequest,
        models::ImageInfo,
        models::CaptureResponse,
        models::SingleImageResponse,
        models::VideoSaveResponse,
    )),
    tags(
        (name = "health", description = "Service health checks"),
        (name = "images", description = "Capture, image and video persistence"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "gateway_user",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-User-Id",
                    "Numeric user id forwarded by the gateway",
                ))),
            )
        }
    }
}

/// Served at `/api/v1/openapi.json`
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/json")
        .json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_capture_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/api/v1/images/save-multi-image".to_string()));
        assert!(paths.contains(&"/api/v1/images/save-video".to_string()));
        assert!(paths.contains(&"/api/v1/health".to_string()));
        assert!(paths.contains(&"/api/v1/images/file/{id}".to_string()));
    }
}
