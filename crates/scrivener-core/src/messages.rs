use std::sync::Arc;

use uuid::Uuid;

use scrivener_db::{Database, NewArtifact, ReplyCommit};
use scrivener_types::models::{ContentType, Length, Message, Role, Tone};

use crate::convert;
use crate::error::{CoreError, CoreResult};
use crate::sessions::owned_session;

/// An assistant reply together with the artifact it is archived as.
#[derive(Debug, Clone)]
pub struct Reply<'a> {
    pub user_id: Uuid,
    pub session_id: Uuid,
    /// `seq` of the prompt being answered. When set, the reply is refused
    /// once anything else follows that prompt.
    pub answers_seq: Option<u32>,
    pub content_type: ContentType,
    pub prompt: &'a str,
    pub text: &'a str,
    pub tone: Tone,
    pub length: Length,
}

/// Message Log: append-only, per-session ordered by `seq`.
#[derive(Clone)]
pub struct MessageLog {
    db: Arc<Database>,
}

impl MessageLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append at the end of the session's log. Also touches the session.
    pub fn append(&self, session_id: Uuid, role: Role, content: &str) -> CoreResult<Message> {
        if content.trim().is_empty() {
            return Err(CoreError::Validation("message content must not be empty".into()));
        }

        let row = self
            .db
            .append_message(&Uuid::new_v4().to_string(), &session_id.to_string(), role.as_str(), content)?
            .ok_or(CoreError::NotFound("session"))?;
        convert::message(row)
    }

    /// Append the reply and record its artifact atomically. Returns the
    /// appended message and the artifact id.
    pub fn append_reply(&self, reply: &Reply<'_>) -> CoreResult<(Message, Uuid)> {
        if reply.text.trim().is_empty() {
            return Err(CoreError::Validation("message content must not be empty".into()));
        }

        let artifact_id = Uuid::new_v4();
        let (artifact, user, session) = (
            artifact_id.to_string(),
            reply.user_id.to_string(),
            reply.session_id.to_string(),
        );
        let commit = self.db.append_reply(
            &Uuid::new_v4().to_string(),
            &session,
            reply.answers_seq,
            &NewArtifact {
                id: &artifact,
                user_id: &user,
                session_id: Some(&session),
                content_type_id: reply.content_type.id(),
                prompt: reply.prompt,
                generated_text: reply.text,
                tone: reply.tone.as_str(),
                length: reply.length.as_str(),
            },
        )?;

        match commit {
            ReplyCommit::Committed(row) => Ok((convert::message(row)?, artifact_id)),
            ReplyCommit::SessionMissing => Err(CoreError::NotFound("session")),
            ReplyCommit::PromptAnswered => Err(CoreError::Validation("prompt has already been answered".into())),
        }
    }

    /// Append with a role given as text; anything but `user` or `assistant`
    /// is rejected.
    pub fn append_str(&self, session_id: Uuid, role: &str, content: &str) -> CoreResult<Message> {
        self.append(session_id, parse_role(role)?, content)
    }

    /// Oldest-first by `seq`, or newest-first with `reverse`. With a limit,
    /// the window is always the most recent `limit` messages.
    pub fn history(&self, session_id: Uuid, limit: Option<u32>, reverse: bool) -> CoreResult<Vec<Message>> {
        self.db
            .list_messages(&session_id.to_string(), limit, reverse)?
            .into_iter()
            .map(convert::message)
            .collect()
    }

    pub fn history_for(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        limit: Option<u32>,
        reverse: bool,
    ) -> CoreResult<Vec<Message>> {
        owned_session(&self.db, session_id, user_id)?;
        self.history(session_id, limit, reverse)
    }

    pub fn last(&self, session_id: Uuid) -> CoreResult<Option<Message>> {
        self.db
            .last_message(&session_id.to_string())?
            .map(convert::message)
            .transpose()
    }
}

pub fn parse_role(raw: &str) -> CoreResult<Role> {
    raw.parse::<Role>().map_err(CoreError::Validation)
}
