use anyhow::Result;
use rusqlite::Connection;
use scrivener_types::models::{Length, Theme, Tone};

use super::OptionalExt;
use crate::models::PreferencesRow;
use crate::{Database, now_timestamp};

impl Database {
    // -- Preferences --

    pub fn get_preferences(&self, user_id: &str) -> Result<Option<PreferencesRow>> {
        self.with_conn(|conn| query_preferences(conn, user_id))
    }

    /// Return the user's preferences, inserting the defaults on first access.
    pub fn ensure_preferences(&self, user_id: &str) -> Result<PreferencesRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO user_preferences (user_id, default_tone, default_length, theme, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user_id,
                    Tone::default().as_str(),
                    Length::default().as_str(),
                    Theme::default().as_str(),
                    now_timestamp()
                ],
            )?;
            query_preferences(conn, user_id)?
                .ok_or_else(|| anyhow::anyhow!("Preferences missing after insert for {}", user_id))
        })
    }

    /// Insert or update; `None` fields keep their current (or default) value.
    pub fn upsert_preferences(
        &self,
        user_id: &str,
        default_tone: Option<&str>,
        default_length: Option<&str>,
        theme: Option<&str>,
    ) -> Result<PreferencesRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_preferences (user_id, default_tone, default_length, theme, updated_at)
                 VALUES (?1, COALESCE(?2, ?5), COALESCE(?3, ?6), COALESCE(?4, ?7), ?8)
                 ON CONFLICT (user_id) DO UPDATE SET
                     default_tone = COALESCE(?2, user_preferences.default_tone),
                     default_length = COALESCE(?3, user_preferences.default_length),
                     theme = COALESCE(?4, user_preferences.theme),
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    user_id,
                    default_tone,
                    default_length,
                    theme,
                    Tone::default().as_str(),
                    Length::default().as_str(),
                    Theme::default().as_str(),
                    now_timestamp()
                ],
            )?;
            query_preferences(conn, user_id)?
                .ok_or_else(|| anyhow::anyhow!("Preferences missing after upsert for {}", user_id))
        })
    }
}

fn query_preferences(conn: &Connection, user_id: &str) -> Result<Option<PreferencesRow>> {
    conn.query_row(
        "SELECT user_id, default_tone, default_length, theme, updated_at
         FROM user_preferences WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(PreferencesRow {
                user_id: row.get(0)?,
                default_tone: row.get(1)?,
                default_length: row.get(2)?,
                theme: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
}
