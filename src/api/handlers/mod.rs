use crate::api::error::AppError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

pub mod auth;
pub mod health;
pub mod thumbnail_upload;
pub mod video_upload;
pub mod videos;

/// Multipart read failures are client errors, except when the transport
/// body cap was hit, which gets its own status.
pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}
