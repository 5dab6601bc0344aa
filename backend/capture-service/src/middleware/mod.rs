/// Request extractors for capture-service
///
/// Authentication happens at the gateway, which forwards the validated
/// identity in `X-User-Id` and `X-Username`.
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::error::AppError;
use crate::models::Caller;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USERNAME_HEADER: &str = "X-Username";

impl FromRequest for Caller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(caller_from_request(req))
    }
}

fn caller_from_request(req: &HttpRequest) -> Result<Caller, AppError> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let user_id = header(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
        .parse::<i64>()
        .map_err(|_| AppError::Unauthorized("Invalid user ID".to_string()))?;

    let username = header(USERNAME_HEADER).unwrap_or_default().to_string();
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);

    Ok(Caller {
        user_id,
        username,
        ip_address,
    })
}
