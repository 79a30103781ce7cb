use std::sync::Arc;

use uuid::Uuid;

use scrivener_db::Database;
use scrivener_types::models::{Length, Theme, Tone, UserPreferences};

use crate::convert;
use crate::error::{CoreError, CoreResult};

/// Per-user generation defaults and UI theme.
#[derive(Clone)]
pub struct PreferenceStore {
    db: Arc<Database>,
}

impl PreferenceStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// First access stores the defaults.
    pub fn get(&self, user_id: Uuid) -> CoreResult<UserPreferences> {
        let user = user_id.to_string();
        if let Some(row) = self.db.get_preferences(&user)? {
            return convert::preferences(row);
        }
        self.ensure_user(&user)?;
        convert::preferences(self.db.ensure_preferences(&user)?)
    }

    pub fn update(
        &self,
        user_id: Uuid,
        tone: Option<Tone>,
        length: Option<Length>,
        theme: Option<Theme>,
    ) -> CoreResult<UserPreferences> {
        let user = user_id.to_string();
        self.ensure_user(&user)?;
        let row = self.db.upsert_preferences(
            &user,
            tone.as_ref().map(Tone::as_str),
            length.as_ref().map(Length::as_str),
            theme.as_ref().map(Theme::as_str),
        )?;
        convert::preferences(row)
    }

    fn ensure_user(&self, user: &str) -> CoreResult<()> {
        if self.db.user_exists(user)? {
            Ok(())
        } else {
            Err(CoreError::NotFound("user"))
        }
    }
}
