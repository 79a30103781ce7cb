use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use scrivener_types::api::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, RegisterResponse, UpdatePreferencesRequest,
    UpdateProfileRequest,
};

use crate::error::{ApiResult, blocking};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.credentials.clone();
    let user_id = blocking(move || store.register(&req.email, &req.password, req.display_name.as_deref())).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.credentials.clone();
    let user = blocking(move || {
        let id = store.verify(&req.email, &req.password)?;
        store.get_user(id)
    })
    .await?;
    Ok(Json(user))
}

pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<impl IntoResponse> {
    let store = state.stores.credentials.clone();
    Ok(Json(blocking(move || store.get_user(auth.user_id)).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.credentials.clone();
    let user = blocking(move || {
        store.update_profile(
            auth.user_id,
            req.display_name.as_deref(),
            req.profile_picture_url.as_deref(),
        )
    })
    .await?;
    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.credentials.clone();
    blocking(move || store.change_password(auth.user_id, &req.old_password, &req.new_password)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let store = state.stores.preferences.clone();
    Ok(Json(blocking(move || store.get(auth.user_id)).await?))
}

pub async fn put_preferences(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<UpdatePreferencesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.preferences.clone();
    let prefs = blocking(move || store.update(auth.user_id, req.default_tone, req.default_length, req.theme)).await?;
    Ok(Json(prefs))
}

pub async fn content_types(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let store = state.stores.content.clone();
    Ok(Json(blocking(move || store.content_types()).await?))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
