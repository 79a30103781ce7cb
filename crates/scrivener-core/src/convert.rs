//! Row-to-model conversion. Corrupt rows surface as storage errors.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

use scrivener_db::models::{ArtifactRow, MessageRow, PreferencesRow, SessionRow, SessionSummaryRow, UserRow};
use scrivener_types::models::{
    ChatSession, ContentType, GeneratedArtifact, Message, SessionSummary, User, UserPreferences,
};

use crate::error::CoreResult;

pub(crate) fn parse_uuid(raw: &str, what: &str) -> CoreResult<Uuid> {
    Ok(raw.parse::<Uuid>().with_context(|| format!("corrupt {what} id '{raw}'"))?)
}

pub(crate) fn parse_timestamp(raw: &str) -> CoreResult<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no timezone
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("corrupt timestamp '{}': {}", raw, e).into())
}

pub(crate) fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> CoreResult<T> {
    Ok(raw.parse::<T>().map_err(|e| anyhow!("corrupt column value: {}", e))?)
}

pub(crate) fn content_type(id: i64) -> CoreResult<ContentType> {
    ContentType::from_id(id).ok_or_else(|| anyhow!("unknown content_type_id {}", id).into())
}

pub(crate) fn user(row: UserRow) -> CoreResult<User> {
    Ok(User {
        id: parse_uuid(&row.id, "user")?,
        email: row.email,
        display_name: row.display_name,
        profile_picture_url: row.profile_picture_url,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

pub(crate) fn session(row: SessionRow) -> CoreResult<ChatSession> {
    Ok(ChatSession {
        id: parse_uuid(&row.id, "session")?,
        user_id: parse_uuid(&row.user_id, "user")?,
        content_type: row.content_type_id.map(content_type).transpose()?,
        title: row.title,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

pub(crate) fn session_summary(row: SessionSummaryRow) -> CoreResult<SessionSummary> {
    Ok(SessionSummary {
        id: parse_uuid(&row.id, "session")?,
        title: row.title,
        content_type: row.content_type_id.map(content_type).transpose()?,
        message_count: row.message_count,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

pub(crate) fn message(row: MessageRow) -> CoreResult<Message> {
    Ok(Message {
        id: parse_uuid(&row.id, "message")?,
        session_id: parse_uuid(&row.session_id, "session")?,
        seq: row.seq,
        role: parse_enum(&row.role)?,
        content: row.content,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub(crate) fn artifact(row: ArtifactRow) -> CoreResult<GeneratedArtifact> {
    Ok(GeneratedArtifact {
        id: parse_uuid(&row.id, "artifact")?,
        user_id: parse_uuid(&row.user_id, "user")?,
        session_id: row.session_id.as_deref().map(|s| parse_uuid(s, "session")).transpose()?,
        content_type: content_type(row.content_type_id)?,
        prompt: row.prompt,
        generated_text: row.generated_text,
        tone: parse_enum(&row.tone)?,
        length: parse_enum(&row.length_preference)?,
        is_favorite: row.is_favorite,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub(crate) fn preferences(row: PreferencesRow) -> CoreResult<UserPreferences> {
    Ok(UserPreferences {
        user_id: parse_uuid(&row.user_id, "user")?,
        default_tone: parse_enum(&row.default_tone)?,
        default_length: parse_enum(&row.default_length)?,
        theme: parse_enum(&row.theme)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_rfc3339_and_sqlite_format() {
        let a = parse_timestamp("2026-01-02T03:04:05.123456Z").unwrap();
        let b = parse_timestamp("2026-01-02 03:04:05").unwrap();
        assert_eq!(a.timestamp(), b.timestamp());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn corrupt_ids_are_storage_errors() {
        assert!(matches!(parse_uuid("not-a-uuid", "user"), Err(crate::CoreError::Storage(_))));
        assert!(matches!(content_type(42), Err(crate::CoreError::Storage(_))));
    }
}
