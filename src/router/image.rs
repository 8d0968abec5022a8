use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::AppState;
use crate::business::resolve_image_token;
use crate::error::Result;

/// Serve the image published under `token`.
pub async fn handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let image = resolve_image_token(state.businesses.as_ref(), &token).await?;

    Ok(([(header::CONTENT_TYPE, image.media_type)], image.blob))
}
