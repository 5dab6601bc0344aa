/// Data models for capture-service
///
/// This module defines structures for:
/// - Wire requests: multi-channel capture, single image, video
/// - Validated capture requests and channel roles
/// - Image records and response payloads
///
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Upload status written on every record created by this service
pub const UPLOAD_STATUS_UPLOADED: &str = "uploaded";

/// Image type recorded for videos
pub const VIDEO_IMAGE_TYPE: &str = "video";

/// Accepted video containers
pub const VIDEO_FORMATS: [&str; 4] = ["webm", "mp4", "ogv", "mov"];

// ========================================
// Enumerations
// ========================================

/// Which eye was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EyeSide {
    #[serde(rename = "OD")]
    Od,
    #[serde(rename = "OS")]
    Os,
}

impl EyeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Od => "OD",
            Self::Os => "OS",
        }
    }
}

impl FromStr for EyeSide {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OD" => Ok(Self::Od),
            "OS" => Ok(Self::Os),
            _ => Err(AppError::Validation("eye_side must be OD or OS".to_string())),
        }
    }
}

/// Capture mode: channel-only or channel plus synthesized composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Gray,
    Color,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Color => "color",
        }
    }

    pub fn wants_composite(&self) -> bool {
        matches!(self, Self::Color)
    }
}

impl FromStr for CaptureMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gray" => Ok(Self::Gray),
            "color" => Ok(Self::Color),
            _ => Err(AppError::Validation(
                "capture_mode must be gray or color".to_string(),
            )),
        }
    }
}

/// Spectral channel inferred from the device's filename suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Infrared,
    Green,
    Red,
    Blue,
}

impl ChannelRole {
    pub const ALL: [ChannelRole; 4] = [Self::Infrared, Self::Green, Self::Red, Self::Blue];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Infrared => "_IR.jpg",
            Self::Green => "_G.jpg",
            Self::Red => "_R.jpg",
            Self::Blue => "_B.jpg",
        }
    }

    /// `None` for files that are stored but never fed to synthesis
    pub fn classify(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| file_name.ends_with(role.suffix()))
    }
}

// ========================================
// Wire Requests
// ========================================

/// Multi-channel capture request
///
/// Every field is optional on the wire so that a missing field surfaces as a
/// validation error in the service envelope instead of a bare extractor error.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct SaveMultiImageRequest {
    #[validate(required, range(min = 1))]
    pub examination_id: Option<i64>,
    #[validate(required, length(min = 1))]
    pub file_dir: Option<String>,
    #[validate(required, length(min = 1))]
    pub image_name: Option<Vec<String>>,
    #[validate(required)]
    pub eye_side: Option<String>,
    pub image_type: Option<String>,
    pub resolution: Option<String>,
    #[validate(required, length(min = 1))]
    pub file_format: Option<String>,
    pub acquisition_device: Option<String>,
    #[validate(required)]
    pub capture_mode: Option<String>,
}

/// Single image request (gray capture)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct SaveImageRequest {
    #[validate(required, range(min = 1))]
    pub examination_id: Option<i64>,
    #[validate(required, length(min = 1))]
    pub file_dir: Option<String>,
    #[validate(required, length(min = 1))]
    pub image_name: Option<String>,
    #[validate(required)]
    pub eye_side: Option<String>,
    pub image_type: Option<String>,
    pub resolution: Option<String>,
    #[validate(required, length(min = 1))]
    pub file_format: Option<String>,
    pub acquisition_device: Option<String>,
    #[validate(required)]
    pub capture_mode: Option<String>,
}

/// Recorded video upload
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct SaveVideoRequest {
    #[validate(required, range(min = 1))]
    pub examination_id: Option<i64>,
    #[validate(required, length(min = 1))]
    pub patient_id: Option<String>,
    /// Base64 payload, optionally prefixed with `data:video/...;base64,`
    #[validate(required, length(min = 1))]
    pub video_data: Option<String>,
    #[validate(required, length(min = 1))]
    pub cover_image_data: Option<String>,
    #[validate(required)]
    pub eye_side: Option<String>,
    #[validate(required, range(min = 1))]
    pub duration: Option<i32>,
    #[validate(required)]
    pub file_format: Option<String>,
    #[validate(required, length(min = 1))]
    pub acquisition_device: Option<String>,
    #[validate(required)]
    pub capture_mode: Option<String>,
}

// ========================================
// Validated Requests
// ========================================

/// Fields shared by every image persisted for one request
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    pub examination_id: i64,
    pub eye_side: EyeSide,
    pub capture_mode: CaptureMode,
    pub image_type: Option<String>,
    pub file_format: String,
    pub acquisition_device: Option<String>,
}

/// A validated multi-channel capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub meta: CaptureMetadata,
    pub file_dir: PathBuf,
    pub image_names: Vec<String>,
}

impl CaptureRequest {
    /// Files paired with their channel role, in caller order
    pub fn classified(&self) -> impl Iterator<Item = (&str, Option<ChannelRole>)> {
        self.image_names
            .iter()
            .map(|name| (name.as_str(), ChannelRole::classify(name)))
    }
}

impl TryFrom<SaveMultiImageRequest> for CaptureRequest {
    type Error = AppError;

    fn try_from(req: SaveMultiImageRequest) -> Result<Self, Self::Error> {
        req.validate()?;

        let meta = CaptureMetadata {
            examination_id: required(req.examination_id, "examination_id")?,
            eye_side: parse_eye_side(req.eye_side.as_deref())?,
            capture_mode: parse_capture_mode(req.capture_mode.as_deref())?,
            image_type: non_empty(req.image_type),
            file_format: required(req.file_format, "file_format")?,
            acquisition_device: non_empty(req.acquisition_device),
        };
        let file_dir = PathBuf::from(required(req.file_dir, "file_dir")?);
        let image_names = required(req.image_name, "image_name")?;

        let mut seen = HashSet::new();
        let mut roles = HashSet::new();
        for name in &image_names {
            ensure_plain_file_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(AppError::Validation(format!(
                    "image_name contains {name} more than once"
                )));
            }
            if let Some(role) = ChannelRole::classify(name) {
                if !roles.insert(role) {
                    return Err(AppError::Validation(format!(
                        "more than one image matches the {} channel",
                        role.suffix()
                    )));
                }
            }
        }

        Ok(Self {
            meta,
            file_dir,
            image_names,
        })
    }
}

/// A validated single-image save
#[derive(Debug, Clone, PartialEq)]
pub struct SingleImageRequest {
    pub meta: CaptureMetadata,
    pub file_dir: PathBuf,
    pub image_name: String,
}

impl TryFrom<SaveImageRequest> for SingleImageRequest {
    type Error = AppError;

    fn try_from(req: SaveImageRequest) -> Result<Self, Self::Error> {
        req.validate()?;

        let image_name = required(req.image_name, "image_name")?;
        ensure_plain_file_name(&image_name)?;

        Ok(Self {
            meta: CaptureMetadata {
                examination_id: required(req.examination_id, "examination_id")?,
                eye_side: parse_eye_side(req.eye_side.as_deref())?,
                capture_mode: parse_capture_mode(req.capture_mode.as_deref())?,
                image_type: non_empty(req.image_type),
                file_format: required(req.file_format, "file_format")?,
                acquisition_device: non_empty(req.acquisition_device),
            },
            file_dir: PathBuf::from(required(req.file_dir, "file_dir")?),
            image_name,
        })
    }
}

/// A validated video save; `payload` is already base64-decoded
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub examination_id: i64,
    pub patient_id: String,
    pub payload: Vec<u8>,
    pub cover_image_data: String,
    pub eye_side: EyeSide,
    pub duration: i32,
    pub file_format: String,
    pub acquisition_device: String,
    pub capture_mode: CaptureMode,
}

impl TryFrom<SaveVideoRequest> for VideoUpload {
    type Error = AppError;

    fn try_from(req: SaveVideoRequest) -> Result<Self, Self::Error> {
        use base64::Engine as _;

        req.validate()?;

        let file_format = required(req.file_format, "file_format")?;
        if !VIDEO_FORMATS.contains(&file_format.as_str()) {
            return Err(AppError::Validation(format!(
                "file_format must be one of {}",
                VIDEO_FORMATS.join(", ")
            )));
        }

        let patient_id = required(req.patient_id, "patient_id")?;
        ensure_plain_file_name(&patient_id)?;

        let raw = required(req.video_data, "video_data")?;
        let encoded = match raw.strip_prefix("data:video/") {
            Some(rest) => rest.split_once(',').map(|(_, b64)| b64).unwrap_or(rest),
            None => raw.as_str(),
        };
        let payload = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Validation(format!("video_data is not valid base64: {e}")))?;

        Ok(Self {
            examination_id: required(req.examination_id, "examination_id")?,
            patient_id,
            payload,
            cover_image_data: required(req.cover_image_data, "cover_image_data")?,
            eye_side: parse_eye_side(req.eye_side.as_deref())?,
            duration: required(req.duration, "duration")?,
            file_format,
            acquisition_device: required(req.acquisition_device, "acquisition_device")?,
            capture_mode: parse_capture_mode(req.capture_mode.as_deref())?,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_eye_side(value: Option<&str>) -> Result<EyeSide, AppError> {
    required(value, "eye_side")?.parse()
}

fn parse_capture_mode(value: Option<&str>) -> Result<CaptureMode, AppError> {
    required(value, "capture_mode")?.parse()
}

/// Names must stay inside the directory they are joined onto
fn ensure_plain_file_name(name: &str) -> Result<(), AppError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains('\\') => Ok(()),
        _ => Err(AppError::Validation(format!(
            "{name:?} is not a plain file name"
        ))),
    }
}

// ========================================
// Caller
// ========================================

/// Authenticated caller as forwarded by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub username: String,
    pub ip_address: Option<String>,
}

// ========================================
// Records
// ========================================

/// Columns written for one `fundus_images` row
#[derive(Debug, Clone, PartialEq)]
pub struct NewImageRecord {
    pub examination_id: i64,
    pub image_number: String,
    pub eye_side: EyeSide,
    pub capture_mode: CaptureMode,
    pub image_type: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_format: String,
    pub acquisition_device: Option<String>,
    pub thumbnail_data: String,
    pub duration: Option<i32>,
    pub created_by: i64,
}

/// Location columns of a stored image or video
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredFile {
    pub file_path: String,
    pub file_name: String,
    pub image_type: Option<String>,
}

impl StoredFile {
    /// Images store their directory in `file_path`; videos store the full path
    pub fn location(&self) -> PathBuf {
        if self.image_type.as_deref() == Some(VIDEO_IMAGE_TYPE) {
            PathBuf::from(&self.file_path)
        } else {
            Path::new(&self.file_path).join(&self.file_name)
        }
    }

    pub fn content_type(&self) -> &'static str {
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webm") => "video/webm",
            Some("mp4") => "video/mp4",
            Some("ogv") => "video/ogg",
            Some("mov") => "video/quicktime",
            _ => "application/octet-stream",
        }
    }
}

// ========================================
// Responses
// ========================================

/// One persisted image as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageInfo {
    pub id: i64,
    pub image_path: String,
    pub thumbnail_data: String,
}

/// Result of a multi-channel capture
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptureResponse {
    pub images: Vec<ImageInfo>,
    pub capture_mode: CaptureMode,
    pub image_number: String,
}

/// Result of a single-image save
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SingleImageResponse {
    pub id: i64,
    pub image_number: String,
    pub image_path: String,
    #[serde(rename = "thumbnailData")]
    pub thumbnail_data: String,
    pub capture_mode: CaptureMode,
}

/// Result of a video save
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoSaveResponse {
    pub id: i64,
    pub video_number: String,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub capture_mode: CaptureMode,
}

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(msg: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            msg: msg.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<serde_json::Value> {
    pub fn error(code: u16, msg: &str, error_code: &str, details: String) -> Self {
        Self {
            code,
            msg: msg.to_string(),
            data: Some(serde_json::json!({
                "error_code": error_code,
                "details": details,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi_request(names: &[&str]) -> SaveMultiImageRequest {
        SaveMultiImageRequest {
            examination_id: Some(7),
            file_dir: Some("/tmp/cap".to_string()),
            image_name: Some(names.iter().map(|n| n.to_string()).collect()),
            eye_side: Some("OD".to_string()),
            file_format: Some("jpg".to_string()),
            capture_mode: Some("color".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_roles() {
        assert_eq!(ChannelRole::classify("a_IR.jpg"), Some(ChannelRole::Infrared));
        assert_eq!(ChannelRole::classify("a_G.jpg"), Some(ChannelRole::Green));
        assert_eq!(ChannelRole::classify("a_R.jpg"), Some(ChannelRole::Red));
        assert_eq!(ChannelRole::classify("a_B.jpg"), Some(ChannelRole::Blue));
        assert_eq!(ChannelRole::classify("a_IR.png"), None);
        assert_eq!(ChannelRole::classify("plain.jpg"), None);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("OS".parse::<EyeSide>().unwrap(), EyeSide::Os);
        assert_eq!("color".parse::<CaptureMode>().unwrap(), CaptureMode::Color);
        assert!(matches!("od".parse::<EyeSide>(), Err(AppError::Validation(_))));
        assert!(matches!(
            "Color".parse::<CaptureMode>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_valid_capture_request() {
        let req = CaptureRequest::try_from(multi_request(&["a_IR.jpg", "a_G.jpg", "extra.jpg"]))
            .unwrap();
        assert_eq!(req.meta.examination_id, 7);
        assert_eq!(req.meta.eye_side, EyeSide::Od);
        assert_eq!(req.meta.capture_mode, CaptureMode::Color);
        let roles: Vec<_> = req.classified().map(|(_, role)| role).collect();
        assert_eq!(
            roles,
            vec![Some(ChannelRole::Infrared), Some(ChannelRole::Green), None]
        );
    }

    #[test]
    fn test_missing_eye_side_is_validation_error() {
        let mut wire = multi_request(&["a_IR.jpg"]);
        wire.eye_side = None;
        let err = CaptureRequest::try_from(wire).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unknown_eye_side_rejected() {
        let mut wire = multi_request(&["a_IR.jpg"]);
        wire.eye_side = Some("OU".to_string());
        assert!(matches!(
            CaptureRequest::try_from(wire),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_file_list_rejected() {
        assert!(matches!(
            CaptureRequest::try_from(multi_request(&[])),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_examination_id_rejected() {
        let mut wire = multi_request(&["a_IR.jpg"]);
        wire.examination_id = Some(0);
        assert!(matches!(
            CaptureRequest::try_from(wire),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let err =
            CaptureRequest::try_from(multi_request(&["a_G.jpg", "b_G.jpg"])).unwrap_err();
        assert!(err.to_string().contains("_G.jpg"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        assert!(matches!(
            CaptureRequest::try_from(multi_request(&["x.jpg", "x.jpg"])),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_path_traversal_rejected() {
        for name in ["../a_IR.jpg", "sub/a_IR.jpg", "/etc/passwd", "..", "a\\b.jpg"] {
            assert!(
                CaptureRequest::try_from(multi_request(&[name])).is_err(),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_video_payload_strips_data_url_prefix() {
        let wire = SaveVideoRequest {
            examination_id: Some(3),
            patient_id: Some("P001".to_string()),
            video_data: Some("data:video/webm;base64,aGVsbG8=".to_string()),
            cover_image_data: Some("data:image/jpeg;base64,AAAA".to_string()),
            eye_side: Some("OS".to_string()),
            duration: Some(12),
            file_format: Some("webm".to_string()),
            acquisition_device: Some("cam-1".to_string()),
            capture_mode: Some("gray".to_string()),
        };
        let upload = VideoUpload::try_from(wire).unwrap();
        assert_eq!(upload.payload, b"hello");
        assert_eq!(upload.eye_side, EyeSide::Os);
    }

    #[test]
    fn test_video_format_whitelist() {
        let wire = SaveVideoRequest {
            examination_id: Some(3),
            patient_id: Some("P001".to_string()),
            video_data: Some("aGVsbG8=".to_string()),
            cover_image_data: Some("x".to_string()),
            eye_side: Some("OS".to_string()),
            duration: Some(12),
            file_format: Some("avi".to_string()),
            acquisition_device: Some("cam-1".to_string()),
            capture_mode: Some("gray".to_string()),
        };
        assert!(matches!(
            VideoUpload::try_from(wire),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_stored_file_location() {
        let image = StoredFile {
            file_path: "/tmp/cap".to_string(),
            file_name: "a_IR.jpg".to_string(),
            image_type: Some("fundus".to_string()),
        };
        assert_eq!(image.location(), PathBuf::from("/tmp/cap/a_IR.jpg"));
        assert_eq!(image.content_type(), "image/jpeg");

        let video = StoredFile {
            file_path: "/media/P001/20250619_12/080009.webm".to_string(),
            file_name: "080009.webm".to_string(),
            image_type: Some(VIDEO_IMAGE_TYPE.to_string()),
        };
        assert_eq!(
            video.location(),
            PathBuf::from("/media/P001/20250619_12/080009.webm")
        );
        assert_eq!(video.content_type(), "video/webm");
    }

    #[test]
    fn test_single_image_response_field_names() {
        let body = serde_json::to_value(SingleImageResponse {
            id: 1,
            image_number: "FI1".into(),
            image_path: "/tmp/a.jpg".into(),
            thumbnail_data: "abc".into(),
            capture_mode: CaptureMode::Gray,
        })
        .unwrap();
        assert_eq!(body["thumbnailData"], "abc");
        assert_eq!(body["capture_mode"], "gray");
    }
}
