use crate::api::error::AppError;
use crate::api::handlers::multipart_error;
use crate::api::handlers::videos::{find_owned_video, sign_video_url};
use crate::entities::videos;
use crate::services::upload::random_object_id;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use chrono::Utc;
use mime::Mime;
use sea_orm::{ActiveModelTrait, Set};
use tracing::info;

const ACCEPTED_THUMBNAIL_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// The non-transcoding sibling of the video upload: same auth and
/// ownership checks, but the bytes land on the local assets disk and are
/// served directly, no probing or remuxing involved.
#[utoipa::path(
    post,
    path = "/videos/{id}/thumbnail",
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    request_body(content = String, description = "Multipart form with a `thumbnail` file field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Thumbnail stored; record returned"),
        (status = 400, description = "Invalid ID, missing file field, or wrong content type"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "Upload exceeds the size cap")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_thumbnail(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<videos::Model>, AppError> {
    let video = find_owned_video(&state, &claims, &video_id).await?;

    let mut thumbnail_url: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("thumbnail") {
            continue;
        }

        let declared = field
            .content_type()
            .ok_or_else(|| AppError::BadRequest("Missing content type".to_string()))?
            .to_string();
        let media_type: Mime = declared
            .parse()
            .map_err(|_| AppError::BadRequest("Malformed content type".to_string()))?;

        if !ACCEPTED_THUMBNAIL_TYPES.contains(&media_type.essence_str()) {
            return Err(AppError::BadRequest(format!(
                "Unsupported content type {declared}, expected one of {ACCEPTED_THUMBNAIL_TYPES:?}"
            )));
        }

        let data = field.bytes().await.map_err(multipart_error)?;

        let filename = format!(
            "{}.{}",
            random_object_id(),
            media_type.subtype().as_str()
        );
        let path = state.config.assets_root.join(&filename);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write thumbnail: {e}")))?;

        info!(
            "thumbnail for video {} uploaded by {}: {} ({} bytes)",
            video.id,
            claims.sub,
            filename,
            data.len()
        );

        thumbnail_url = Some(format!(
            "http://localhost:{}/assets/{}",
            state.config.port, filename
        ));
        break;
    }

    let thumbnail_url = thumbnail_url
        .ok_or_else(|| AppError::BadRequest("Missing `thumbnail` file field".to_string()))?;

    let mut active: videos::ActiveModel = video.into();
    active.thumbnail_url = Set(Some(thumbnail_url));
    active.updated_at = Set(Utc::now());
    let video = active.update(&state.db).await?;

    let video = sign_video_url(&state, video).await?;

    Ok(Json(video))
}
