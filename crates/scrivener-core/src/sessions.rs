use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use scrivener_db::Database;
use scrivener_db::models::{SessionDeletion, SessionRow};
use scrivener_types::models::{ChatSession, ContentType, SessionSummary};

use crate::convert;
use crate::error::{CoreError, CoreResult};

pub const MAX_TITLE_CHARS: usize = 100;
pub const PROMPT_TITLE_CHARS: usize = 50;
pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// Session Ledger: chat sessions per user, most recently active first.
#[derive(Clone)]
pub struct SessionLedger {
    db: Arc<Database>,
}

impl SessionLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, user_id: Uuid, content_type: Option<ContentType>, title: Option<&str>) -> CoreResult<Uuid> {
        let user = user_id.to_string();
        if !self.db.user_exists(&user)? {
            return Err(CoreError::NotFound("user"));
        }

        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => truncate_chars(t, MAX_TITLE_CHARS),
            None => default_title(),
        };
        let session_id = Uuid::new_v4();
        self.db.create_session(
            &session_id.to_string(),
            &user,
            &title,
            content_type.map(|ct| ct.id()),
        )?;

        debug!(session_id = %session_id, user_id = %user_id, "Created session");
        Ok(session_id)
    }

    pub fn get(&self, session_id: Uuid, user_id: Uuid) -> CoreResult<ChatSession> {
        convert::session(self.authorize(session_id, user_id)?)
    }

    /// `limit` defaults to 50 and is capped at 200.
    pub fn list(&self, user_id: Uuid, limit: Option<u32>) -> CoreResult<Vec<SessionSummary>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.db
            .list_sessions(&user_id.to_string(), limit)?
            .into_iter()
            .map(convert::session_summary)
            .collect()
    }

    pub fn count(&self, user_id: Uuid) -> CoreResult<u32> {
        Ok(self.db.count_sessions(&user_id.to_string())?)
    }

    pub fn touch(&self, session_id: Uuid) -> CoreResult<()> {
        if self.db.touch_session(&session_id.to_string())? {
            Ok(())
        } else {
            Err(CoreError::NotFound("session"))
        }
    }

    pub fn rename(&self, session_id: Uuid, user_id: Uuid, title: &str) -> CoreResult<ChatSession> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("title must not be empty".into()));
        }
        let row = self.authorize(session_id, user_id)?;
        if !self.db.rename_session(&row.id, &truncate_chars(title, MAX_TITLE_CHARS))? {
            return Err(CoreError::NotFound("session"));
        }
        self.get(session_id, user_id)
    }

    /// Removes the session and its messages. Artifacts generated in it are
    /// kept with their session reference cleared.
    pub fn delete(&self, session_id: Uuid, user_id: Uuid) -> CoreResult<SessionDeletion> {
        let row = self.authorize(session_id, user_id)?;
        let deletion = self
            .db
            .delete_session(&row.id)?
            .ok_or(CoreError::NotFound("session"))?;

        info!(
            session_id = %session_id,
            messages = deletion.messages_removed,
            artifacts = deletion.artifacts_detached,
            "Deleted session"
        );
        Ok(deletion)
    }

    pub(crate) fn authorize(&self, session_id: Uuid, user_id: Uuid) -> CoreResult<SessionRow> {
        owned_session(&self.db, session_id, user_id)
    }
}

/// Load a session and check it belongs to `user_id`.
pub(crate) fn owned_session(db: &Database, session_id: Uuid, user_id: Uuid) -> CoreResult<SessionRow> {
    let row = db
        .get_session(&session_id.to_string())?
        .ok_or(CoreError::NotFound("session"))?;
    if row.user_id != user_id.to_string() {
        return Err(CoreError::Forbidden);
    }
    Ok(row)
}

pub fn default_title() -> String {
    Utc::now().format("Chat %Y-%m-%d %H:%M").to_string()
}

/// Title for a session opened by its first prompt.
pub fn title_from_prompt(prompt: &str) -> String {
    let prompt = prompt.trim();
    if prompt.chars().count() > PROMPT_TITLE_CHARS {
        format!("{}...", truncate_chars(prompt, PROMPT_TITLE_CHARS))
    } else {
        prompt.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
