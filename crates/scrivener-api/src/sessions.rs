use std::convert::Infallible;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use scrivener_core::{TurnEvent, TurnRequest};
use scrivener_types::api::{
    CreateSessionRequest, CreateSessionResponse, GenerateRequest, GenerateResponse, RenameSessionRequest,
    RetryRequest, StreamDelta, StreamStarted,
};

use crate::error::{ApiError, ApiResult, blocking};
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    /// Newest first.
    pub reverse: bool,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<SessionListQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let store = state.stores.sessions.clone();
    Ok(Json(blocking(move || store.list(auth.user_id, query.limit)).await?))
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.sessions.clone();
    let session_id = blocking(move || store.create(auth.user_id, req.content_type, req.title.as_deref())).await?;
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id })))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let store = state.stores.sessions.clone();
    Ok(Json(blocking(move || store.get(session_id, auth.user_id)).await?))
}

pub async fn rename_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<RenameSessionRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let store = state.stores.sessions.clone();
    Ok(Json(blocking(move || store.rename(session_id, auth.user_id, &req.title)).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let store = state.stores.sessions.clone();
    blocking(move || store.delete(session_id, auth.user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session_messages(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let store = state.stores.messages.clone();
    let history = blocking(move || store.history_for(session_id, auth.user_id, query.limit, query.reverse)).await?;
    Ok(Json(history))
}

/// One turn. Dropping the request (client disconnect) abandons the
/// generation without writing a reply.
pub async fn generate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let cancel = state.shutdown.child_token();
    let outcome = state
        .orchestrator
        .run_turn(
            TurnRequest {
                user_id: auth.user_id,
                session_id: req.session_id,
                prompt: req.prompt,
                content_type: req.content_type,
                tone: req.tone,
                length: req.length,
            },
            &cancel,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            session_id: outcome.session_id,
            artifact: outcome.artifact,
        }),
    ))
}

/// [`generate`] as server-sent events: `session` once the prompt is stored,
/// `delta` per chunk, then `done` with the [`GenerateResponse`] or `error`
/// with an error body. Request problems (validation, ownership) are still
/// plain JSON errors, returned before the stream opens.
pub async fn generate_stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(req) = body?;
    let pending = state
        .orchestrator
        .begin_turn(TurnRequest {
            user_id: auth.user_id,
            session_id: req.session_id,
            prompt: req.prompt,
            content_type: req.content_type,
            tone: req.tone,
            length: req.length,
        })
        .await?;
    let cancel = state.shutdown.child_token();

    let events = async_stream::stream! {
        yield Ok::<_, Infallible>(json_event("session", &StreamStarted { session_id: pending.session_id }));

        let turn = state.orchestrator.stream_turn(pending, cancel);
        let mut turn = std::pin::pin!(turn);
        while let Some(event) = turn.next().await {
            yield Ok(match event {
                Ok(TurnEvent::Delta(text)) => json_event("delta", &StreamDelta { text }),
                Ok(TurnEvent::Completed(outcome)) => json_event(
                    "done",
                    &GenerateResponse {
                        session_id: outcome.session_id,
                        artifact: outcome.artifact,
                    },
                ),
                Err(err) => json_event("error", &ApiError(err).body()),
            });
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(err) => {
            error!("Failed to encode {} event: {}", name, err);
            Event::default()
                .event("error")
                .data(r#"{"error":{"code":"internal","message":"internal server error"}}"#)
        }
    }
}

pub async fn retry(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<RetryRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let cancel = state.shutdown.child_token();
    let outcome = state
        .orchestrator
        .retry(auth.user_id, session_id, req.content_type, req.tone, req.length, &cancel)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            session_id: outcome.session_id,
            artifact: outcome.artifact,
        }),
    ))
}
