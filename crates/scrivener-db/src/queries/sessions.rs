use anyhow::Result;
use rusqlite::TransactionBehavior;

use super::OptionalExt;
use crate::models::{SessionDeletion, SessionRow, SessionSummaryRow};
use crate::{Database, now_timestamp};

/// Next value of the global activity counter. Ordering sessions by this
/// instead of `updated_at` keeps "most recent first" exact even when two
/// touches land within the same clock tick.
const NEXT_ACTIVITY: &str = "(SELECT COALESCE(MAX(activity), 0) + 1 FROM chat_sessions)";

impl Database {
    // -- Sessions --

    pub fn create_session(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        content_type_id: Option<i64>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let now = now_timestamp();
            conn.execute(
                &format!(
                    "INSERT INTO chat_sessions (id, user_id, content_type_id, title, activity, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, {NEXT_ACTIVITY}, ?5, ?5)"
                ),
                rusqlite::params![id, user_id, content_type_id, title, now],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, content_type_id, title, created_at, updated_at
                 FROM chat_sessions WHERE id = ?1",
                [id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        content_type_id: row.get(2)?,
                        title: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Most recently active first.
    pub fn list_sessions(&self, user_id: &str, limit: u32) -> Result<Vec<SessionSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.title, s.content_type_id, s.created_at, s.updated_at,
                        (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id)
                 FROM chat_sessions s
                 WHERE s.user_id = ?1
                 ORDER BY s.activity DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(SessionSummaryRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content_type_id: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                        message_count: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_sessions(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM chat_sessions WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn touch_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE chat_sessions SET updated_at = ?1, activity = {NEXT_ACTIVITY} WHERE id = ?2"
                ),
                rusqlite::params![now_timestamp(), id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn rename_session(&self, id: &str, title: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![title, now_timestamp(), id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a session and its messages, detaching (not deleting) any
    /// generated content that referenced it. The schema carries the same
    /// cascade/set-null rules; they are applied explicitly here so the
    /// outcome does not depend on `foreign_keys` being enabled.
    pub fn delete_session(&self, id: &str) -> Result<Option<SessionDeletion>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM chat_sessions WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let messages_removed =
                tx.execute("DELETE FROM chat_messages WHERE session_id = ?1", [id])?;
            let artifacts_detached = tx.execute(
                "UPDATE generated_content SET session_id = NULL WHERE session_id = ?1",
                [id],
            )?;
            tx.execute("DELETE FROM chat_sessions WHERE id = ?1", [id])?;
            tx.commit()?;

            Ok(Some(SessionDeletion {
                messages_removed,
                artifacts_detached,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::db_with_user;

    #[test]
    fn sessions_listed_most_recent_first() {
        let (db, uid) = db_with_user("a@x.com");
        db.create_session("s1", &uid, "first", None).unwrap();
        db.create_session("s2", &uid, "second", Some(5)).unwrap();

        let ids: Vec<String> = db.list_sessions(&uid, 50).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s2", "s1"]);

        assert!(db.touch_session("s1").unwrap());
        let ids: Vec<String> = db.list_sessions(&uid, 50).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);

        assert_eq!(db.list_sessions(&uid, 1).unwrap().len(), 1);
        assert_eq!(db.count_sessions(&uid).unwrap(), 2);
    }

    #[test]
    fn delete_missing_session_reports_none() {
        let (db, _uid) = db_with_user("a@x.com");
        assert!(db.delete_session("nope").unwrap().is_none());
    }

    #[test]
    fn rename_changes_title() {
        let (db, uid) = db_with_user("a@x.com");
        db.create_session("s1", &uid, "old", None).unwrap();
        assert!(db.rename_session("s1", "new").unwrap());
        assert_eq!(db.get_session("s1").unwrap().unwrap().title, "new");
        assert!(!db.rename_session("s9", "new").unwrap());
    }
}
