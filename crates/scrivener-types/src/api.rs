use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ArtifactSort, ContentType, GeneratedArtifact, Length, Theme, Tone};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// -- Profile & preferences --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePreferencesRequest {
    pub default_tone: Option<Tone>,
    pub default_length: Option<Length>,
    pub theme: Option<Theme>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentTypeInfo {
    pub id: i64,
    pub slug: ContentType,
    pub name: String,
    pub description: String,
}

// -- Sessions --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub content_type: Option<ContentType>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameSessionRequest {
    pub title: String,
}

// -- Generation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    pub session_id: Option<Uuid>,
    pub prompt: String,
    pub content_type: ContentType,
    pub tone: Option<Tone>,
    pub length: Option<Length>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryRequest {
    pub content_type: ContentType,
    pub tone: Option<Tone>,
    pub length: Option<Length>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub session_id: Uuid,
    pub artifact: GeneratedArtifact,
}

/// `session` event of a streamed turn: the prompt is stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamStarted {
    pub session_id: Uuid,
}

/// `delta` event of a streamed turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamDelta {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FavoriteResponse {
    pub is_favorite: bool,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

// -- Archive --

/// Filter for listing generated content; also the `/content` query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactFilter {
    pub content_type: Option<ContentType>,
    pub favorite_only: bool,
    pub search: Option<String>,
    pub sort: ArtifactSort,
    pub limit: Option<u32>,
}
