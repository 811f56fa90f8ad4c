use crate::api::error::AppError;
use crate::api::handlers::multipart_error;
use crate::api::handlers::videos::{find_owned_video, sign_video_url};
use crate::entities::videos;
use crate::services::media::ACCEPTED_VIDEO_TYPE;
use crate::services::storage::ObjectRef;
use crate::services::upload::StoredObject;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use chrono::Utc;
use futures::TryStreamExt;
use mime::Mime;
use sea_orm::{ActiveModelTrait, Set};
use tokio_util::io::StreamReader;
use tracing::info;

#[utoipa::path(
    post,
    path = "/videos/{id}/upload",
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    request_body(content = String, description = "Multipart form with a `video` file field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video staged and stored; record returned with a fresh playback URL"),
        (status = 400, description = "Invalid ID, missing file field, or wrong content type"),
        (status = 401, description = "Unauthorized or not the owner"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "Upload exceeds the size cap"),
        (status = 500, description = "Probe, remux, or storage failure")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_video(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<videos::Model>, AppError> {
    // Everything that can be rejected cheaply happens before any file I/O
    let video = find_owned_video(&state, &claims, &video_id).await?;

    let mut stored: Option<StoredObject> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("video") {
            continue;
        }

        let declared = field
            .content_type()
            .ok_or_else(|| AppError::BadRequest("Missing content type".to_string()))?
            .to_string();
        let media_type: Mime = declared
            .parse()
            .map_err(|_| AppError::BadRequest("Malformed content type".to_string()))?;

        if media_type.essence_str() != ACCEPTED_VIDEO_TYPE {
            return Err(AppError::BadRequest(format!(
                "Unsupported content type {declared}, expected {ACCEPTED_VIDEO_TYPE}"
            )));
        }

        let body = field.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err));
        let reader = StreamReader::new(body);

        stored = Some(state.uploads.stage_video(reader, &media_type).await?);
        break;
    }

    let stored = stored
        .ok_or_else(|| AppError::BadRequest("Missing `video` file field".to_string()))?;

    let object_ref = ObjectRef {
        bucket: stored.bucket,
        key: stored.key,
    };

    info!(
        "video {} uploaded by {}: {} ({} bytes)",
        video.id, claims.sub, object_ref, stored.size
    );

    let mut active: videos::ActiveModel = video.into();
    active.video_url = Set(Some(object_ref.to_string()));
    active.updated_at = Set(Utc::now());
    let video = active.update(&state.db).await?;

    // Hand back a playable record right away
    let video = sign_video_url(&state, video).await?;

    Ok(Json(video))
}
