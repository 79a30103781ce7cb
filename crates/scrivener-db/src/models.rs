//! Database row types. These map directly to SQLite rows and stay distinct
//! from the scrivener-types models to keep the DB layer independent.

use std::fmt;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub iterations: u32,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// Verifier columns never reach logs.
impl fmt::Debug for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRow")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ContentTypeRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub content_type_id: Option<i64>,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug)]
pub struct SessionSummaryRow {
    pub id: String,
    pub title: String,
    pub content_type_id: Option<i64>,
    pub message_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub seq: u32,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ArtifactRow {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub content_type_id: i64,
    pub prompt: String,
    pub generated_text: String,
    pub tone: String,
    pub length_preference: String,
    pub is_favorite: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct PreferencesRow {
    pub user_id: String,
    pub default_tone: String,
    pub default_length: String,
    pub theme: String,
    pub updated_at: String,
}

/// What a session delete removed or detached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionDeletion {
    pub messages_removed: usize,
    pub artifacts_detached: usize,
}

#[derive(Debug, Default)]
pub struct ArtifactCounts {
    pub total: u32,
    pub favorites: u32,
    /// Whitespace-separated words across every generated text.
    pub total_words: u64,
    /// `(content_type_id, count)` pairs, ordered by id.
    pub by_content_type: Vec<(i64, u32)>,
}
