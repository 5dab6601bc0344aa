/// Image handlers - HTTP endpoints for capture persistence
use actix_web::{web, HttpResponse};

use crate::error::{AppError, Result};
use crate::models::{
    ApiResponse, Caller, CaptureRequest, CaptureResponse, SaveImageRequest,
    SaveMultiImageRequest, SaveVideoRequest, SingleImageRequest, SingleImageResponse,
    VideoSaveResponse, VideoUpload,
};
use crate::services::{CaptureOrchestrator, FileReader};

/// Persist a batch of channel images and, in color mode, their composite
#[utoipa::path(
    post,
    path = "/api/v1/images/save-multi-image",
    tag = "images",
    request_body = SaveMultiImageRequest,
    responses(
        (status = 200, description = "Images saved; channels first, composite last", body = CaptureResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Caller identity missing"),
        (status = 404, description = "Named file not found"),
        (status = 502, description = "Color synthesis failed"),
        (status = 504, description = "Color synthesis unavailable")
    )
)]
pub async fn save_multi_image(
    orchestrator: web::Data<CaptureOrchestrator>,
    caller: Caller,
    req: web::Json<SaveMultiImageRequest>,
) -> Result<HttpResponse> {
    let request = CaptureRequest::try_from(req.into_inner())?;
    let response = orchestrator.capture(request, &caller).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success("Images saved", response)))
}

/// Persist one already-captured image
#[utoipa::path(
    post,
    path = "/api/v1/images/save-image",
    tag = "images",
    request_body = SaveImageRequest,
    responses(
        (status = 200, description = "Image saved", body = SingleImageResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Caller identity missing"),
        (status = 404, description = "Image file not found")
    )
)]
pub async fn save_image(
    orchestrator: web::Data<CaptureOrchestrator>,
    caller: Caller,
    req: web::Json<SaveImageRequest>,
) -> Result<HttpResponse> {
    let request = SingleImageRequest::try_from(req.into_inner())?;
    let response = orchestrator.save_single(request, &caller).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success("Image saved", response)))
}

/// Store a recorded video under the storage root
#[utoipa::path(
    post,
    path = "/api/v1/images/save-video",
    tag = "images",
    request_body = SaveVideoRequest,
    responses(
        (status = 200, description = "Video saved", body = VideoSaveResponse),
        (status = 400, description = "Invalid request or payload"),
        (status = 401, description = "Caller identity missing")
    )
)]
pub async fn save_video(
    orchestrator: web::Data<CaptureOrchestrator>,
    caller: Caller,
    req: web::Json<SaveVideoRequest>,
) -> Result<HttpResponse> {
    let upload = VideoUpload::try_from(req.into_inner())?;
    let response = orchestrator.save_video(upload, &caller).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success("Video saved", response)))
}

/// Serve the image or video file behind a record
#[utoipa::path(
    get,
    path = "/api/v1/images/file/{id}",
    tag = "images",
    params(("id" = i64, Path, description = "Image record id")),
    responses(
        (status = 200, description = "File contents with a matching content type"),
        (status = 400, description = "Invalid image id"),
        (status = 401, description = "Caller identity missing"),
        (status = 404, description = "Record or file not found")
    )
)]
pub async fn serve_file(
    files: web::Data<FileReader>,
    _caller: Caller,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::Validation("Invalid image ID".to_string()))?;

    let content = files.read(id).await?;

    Ok(HttpResponse::Ok()
        .content_type(content.content_type)
        .insert_header((
            "Content-Disposition",
            format!("inline; filename=\"{}\"", content.file_name),
        ))
        .body(content.bytes))
}
