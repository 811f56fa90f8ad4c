use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::storage::ObjectRef;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateVideoRequest {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    pub description: Option<String>,
}

/// Swap the stored `bucket,key` composite for a freshly presigned URL.
/// Records without an upload, or with a legacy direct URL, pass through
/// untouched.
pub(crate) async fn sign_video_url(
    state: &crate::AppState,
    video: videos::Model,
) -> Result<videos::Model, AppError> {
    let Some(stored) = video.video_url.as_deref() else {
        return Ok(video);
    };
    let Ok(object_ref) = stored.parse::<ObjectRef>() else {
        return Ok(video);
    };

    let url = state
        .storage
        .presign_get(
            &object_ref.bucket,
            &object_ref.key,
            state.config.signed_url_ttl(),
        )
        .await
        .map_err(|e| AppError::Storage(format!("failed to presign video url: {e}")))?;

    Ok(videos::Model {
        video_url: Some(url),
        ..video
    })
}

/// Load a video and enforce that the caller owns it. Ownership mismatch is
/// reported as 401, the same as a bad credential.
pub(crate) async fn find_owned_video(
    state: &crate::AppState,
    claims: &Claims,
    video_id: &str,
) -> Result<videos::Model, AppError> {
    let video_id = Uuid::parse_str(video_id)
        .map_err(|_| AppError::BadRequest("Invalid video id".to_string()))?;

    let video = Videos::find_by_id(video_id.to_string())
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound("Video not found".to_string()))?;

    if video.user_id != claims.sub {
        return Err(AppError::Unauthorized(
            "You do not own this video".to_string(),
        ));
    }

    Ok(video)
}

#[utoipa::path(
    post,
    path = "/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Draft video record created"),
        (status = 400, description = "Invalid title"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn create_video(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<videos::Model>), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let now = Utc::now();
    let video = videos::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        title: Set(payload.title),
        description: Set(payload.description),
        thumbnail_url: Set(None),
        video_url: Set(None),
        user_id: Set(claims.sub),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let video = video.insert(&state.db).await?;

    Ok((StatusCode::CREATED, Json(video)))
}

#[utoipa::path(
    get,
    path = "/videos",
    responses(
        (status = 200, description = "The caller's videos, newest first"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn list_videos(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<videos::Model>>, AppError> {
    let videos = Videos::find()
        .filter(videos::Column::UserId.eq(&claims.sub))
        .order_by_desc(videos::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let mut signed = Vec::with_capacity(videos.len());
    for video in videos {
        signed.push(sign_video_url(&state, video).await?);
    }

    Ok(Json(signed))
}

#[utoipa::path(
    get,
    path = "/videos/{id}",
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video record with a fresh playback URL"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn get_video(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
) -> Result<Json<videos::Model>, AppError> {
    let video = find_owned_video(&state, &claims, &video_id).await?;
    let video = sign_video_url(&state, video).await?;
    Ok(Json(video))
}

#[utoipa::path(
    delete,
    path = "/videos/{id}",
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 204, description = "Video deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn delete_video(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let video = find_owned_video(&state, &claims, &video_id).await?;

    // Best effort: the record is the source of truth, a stale object only
    // costs storage
    if let Some(object_ref) = video
        .video_url
        .as_deref()
        .and_then(|url| url.parse::<ObjectRef>().ok())
    {
        if object_ref.bucket == state.storage.bucket() {
            if let Err(e) = state.storage.delete_object(&object_ref.key).await {
                warn!("failed to delete stored object {}: {}", object_ref.key, e);
            }
        }
    }

    video.delete(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}
