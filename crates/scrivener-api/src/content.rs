use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use uuid::Uuid;

use scrivener_types::api::{ArtifactFilter, FavoriteResponse};

use crate::error::{ApiResult, blocking};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn list_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    filter: Result<Query<ArtifactFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = filter?;
    let store = state.stores.content.clone();
    Ok(Json(blocking(move || store.list_by_user(auth.user_id, &filter)).await?))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(artifact_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let store = state.stores.content.clone();
    let is_favorite = blocking(move || store.toggle_favorite(artifact_id, auth.user_id)).await?;
    Ok(Json(FavoriteResponse { is_favorite }))
}

pub async fn stats(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<impl IntoResponse> {
    let store = state.stores.content.clone();
    Ok(Json(blocking(move || store.stats(auth.user_id)).await?))
}
