use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Basic;
use uuid::Uuid;

use scrivener_core::CoreError;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// Identity of the caller, inserted by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Verify HTTP Basic credentials on every protected request.
pub async fn require_auth(
    State(state): State<AppState>,
    credentials: Option<TypedHeader<Authorization<Basic>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(basic)) = credentials.ok_or(ApiError(CoreError::InvalidCredentials))?;

    let store = state.stores.credentials.clone();
    let (email, password) = (basic.username().to_string(), basic.password().to_string());
    let user_id = blocking(move || store.verify(&email, &password)).await?;

    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}
