use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};

use super::OptionalExt;
use super::content::{NewArtifact, insert_artifact_row};
use crate::models::MessageRow;
use crate::{Database, now_timestamp};

/// Outcome of [`Database::append_reply`].
#[derive(Debug)]
pub enum ReplyCommit {
    Committed(MessageRow),
    /// No session with that id belongs to the artifact's user.
    SessionMissing,
    /// The log no longer ends in the prompt being answered.
    PromptAnswered,
}

impl Database {
    // -- Messages --

    /// Append a message at the end of a session's log and touch the session.
    ///
    /// The sequence number is computed and inserted inside one IMMEDIATE
    /// transaction on the writer, so appends to a session are totally
    /// ordered regardless of wall-clock skew. Returns `None` if the session
    /// does not exist.
    pub fn append_message(
        &self,
        id: &str,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<Option<MessageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM chat_sessions WHERE id = ?1", [session_id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let row = insert_message(&tx, id, session_id, role, content)?;
            tx.commit()?;
            Ok(Some(row))
        })
    }

    /// Append the assistant reply and archive it as `artifact` in one
    /// IMMEDIATE transaction: both rows land or neither does.
    ///
    /// With `prompt_seq` set, the reply is written only while the log still
    /// ends in that user message, so one prompt is never answered twice.
    pub fn append_reply(
        &self,
        message_id: &str,
        session_id: &str,
        prompt_seq: Option<u32>,
        artifact: &NewArtifact<'_>,
    ) -> Result<ReplyCommit> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let owned: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM chat_sessions WHERE id = ?1 AND user_id = ?2",
                    [session_id, artifact.user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Ok(ReplyCommit::SessionMissing);
            }

            if let Some(expected) = prompt_seq {
                let last: Option<(u32, String)> = tx
                    .query_row(
                        "SELECT seq, role FROM chat_messages WHERE session_id = ?1 ORDER BY seq DESC LIMIT 1",
                        [session_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                if !matches!(&last, Some((seq, role)) if *seq == expected && role == "user") {
                    return Ok(ReplyCommit::PromptAnswered);
                }
            }

            let row = insert_message(&tx, message_id, session_id, "assistant", artifact.generated_text)?;
            insert_artifact_row(
                &tx,
                &NewArtifact {
                    session_id: Some(session_id),
                    ..*artifact
                },
            )?;
            tx.commit()?;
            Ok(ReplyCommit::Committed(row))
        })
    }

    /// Messages of a session by sequence.
    ///
    /// With `newest_first == false` the result is oldest-first; when `limit`
    /// is also set it is the *latest* `limit` messages, still oldest-first,
    /// which is the shape a context window wants.
    pub fn list_messages(
        &self,
        session_id: &str,
        limit: Option<u32>,
        newest_first: bool,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // SQLite treats a negative LIMIT as "no limit"
            let limit: i64 = limit.map(i64::from).unwrap_or(-1);
            let mut stmt = conn.prepare(
                "SELECT id, session_id, seq, role, content, created_at
                 FROM chat_messages
                 WHERE session_id = ?1
                 ORDER BY seq DESC
                 LIMIT ?2",
            )?;
            let mut rows = stmt
                .query_map(rusqlite::params![session_id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if !newest_first {
                rows.reverse();
            }
            Ok(rows)
        })
    }

    pub fn last_message(&self, session_id: &str) -> Result<Option<MessageRow>> {
        Ok(self.list_messages(session_id, Some(1), true)?.pop())
    }
}

/// Next `seq` for the session, the insert, and the session touch. Callers
/// hold an IMMEDIATE transaction.
fn insert_message(conn: &Connection, id: &str, session_id: &str, role: &str, content: &str) -> Result<MessageRow> {
    let seq: u32 = conn.query_row(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE session_id = ?1",
        [session_id],
        |row| row.get(0),
    )?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO chat_messages (id, session_id, seq, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id, session_id, seq, role, content, &now],
    )?;
    conn.execute(
        "UPDATE chat_sessions
         SET updated_at = ?1,
             activity = (SELECT COALESCE(MAX(activity), 0) + 1 FROM chat_sessions)
         WHERE id = ?2",
        rusqlite::params![&now, session_id],
    )?;

    Ok(MessageRow {
        id: id.to_string(),
        session_id: session_id.to_string(),
        seq,
        role: role.to_string(),
        content: content.to_string(),
        created_at: now,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        seq: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}
