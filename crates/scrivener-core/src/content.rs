use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use scrivener_db::{ArtifactQuery, Database};
use scrivener_types::api::{ArtifactFilter, ContentTypeInfo};
use scrivener_types::models::{ContentType, ContentTypeCount, GeneratedArtifact, Length, Tone, UserStats};

use crate::convert;
use crate::error::{CoreError, CoreResult};
use crate::sessions::owned_session;

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const MAX_LIST_LIMIT: u32 = 1000;

/// Content Archive: every generated artifact, kept after its session is gone.
#[derive(Clone)]
pub struct ContentArchive {
    db: Arc<Database>,
}

impl ContentArchive {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        content_type: ContentType,
        prompt: &str,
        text: &str,
        tone: Tone,
        length: Length,
    ) -> CoreResult<Uuid> {
        if text.trim().is_empty() {
            return Err(CoreError::Validation("generated text must not be empty".into()));
        }
        let user = user_id.to_string();
        if !self.db.user_exists(&user)? {
            return Err(CoreError::NotFound("user"));
        }
        if let Some(session_id) = session_id {
            owned_session(&self.db, session_id, user_id)?;
        }

        let id = Uuid::new_v4();
        let session = session_id.map(|s| s.to_string());
        self.db.insert_artifact(
            &id.to_string(),
            &user,
            session.as_deref(),
            content_type.id(),
            prompt,
            text,
            tone.as_str(),
            length.as_str(),
        )?;

        debug!(artifact_id = %id, content_type = %content_type, "Recorded artifact");
        Ok(id)
    }

    pub fn get(&self, artifact_id: Uuid, user_id: Uuid) -> CoreResult<GeneratedArtifact> {
        let row = self
            .db
            .get_artifact(&artifact_id.to_string())?
            .ok_or(CoreError::NotFound("content"))?;
        if row.user_id != user_id.to_string() {
            return Err(CoreError::Forbidden);
        }
        convert::artifact(row)
    }

    pub fn list_by_user(&self, user_id: Uuid, filter: &ArtifactFilter) -> CoreResult<Vec<GeneratedArtifact>> {
        let query = ArtifactQuery {
            content_type_id: filter.content_type.map(|ct| ct.id()),
            favorite_only: filter.favorite_only,
            search: filter.search.clone(),
            sort: filter.sort,
            limit: filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
        };
        self.db
            .list_artifacts(&user_id.to_string(), &query)?
            .into_iter()
            .map(convert::artifact)
            .collect()
    }

    /// Returns the new favorite flag.
    pub fn toggle_favorite(&self, artifact_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        let current = self.get(artifact_id, user_id)?;
        let now = self
            .db
            .toggle_favorite(&current.id.to_string())?
            .ok_or(CoreError::NotFound("content"))?;
        debug!(artifact_id = %artifact_id, is_favorite = now, "Toggled favorite");
        Ok(now)
    }

    /// The seeded content type catalog, ordered by name.
    pub fn content_types(&self) -> CoreResult<Vec<ContentTypeInfo>> {
        self.db
            .list_content_types()?
            .into_iter()
            .map(|row| {
                Ok(ContentTypeInfo {
                    id: row.id,
                    slug: convert::parse_enum(&row.slug)?,
                    name: row.name,
                    description: row.description,
                })
            })
            .collect()
    }

    pub fn stats(&self, user_id: Uuid) -> CoreResult<UserStats> {
        let user = user_id.to_string();
        let counts = self.db.artifact_counts(&user)?;
        let sessions = self.db.count_sessions(&user)?;

        let by_content_type = counts
            .by_content_type
            .into_iter()
            .map(|(id, count)| {
                Ok(ContentTypeCount {
                    content_type: convert::content_type(id)?,
                    count,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(UserStats {
            total_content: counts.total,
            favorites: counts.favorites,
            sessions,
            total_words: counts.total_words,
            by_content_type,
        })
    }
}
