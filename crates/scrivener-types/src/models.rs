use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Enumerations --

/// Author of a chat message. Free-form role strings are parsed into this at
/// the boundary and never stored any other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// The fixed catalog of content kinds. Ids match the seeded `content_types` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    LinkedinPost,
    ProfessionalEmail,
    AdContent,
    ConversationalText,
    BlogPost,
    SocialMediaCaption,
}

impl ContentType {
    pub const ALL: [ContentType; 6] = [
        ContentType::LinkedinPost,
        ContentType::ProfessionalEmail,
        ContentType::AdContent,
        ContentType::ConversationalText,
        ContentType::BlogPost,
        ContentType::SocialMediaCaption,
    ];

    pub fn id(&self) -> i64 {
        match self {
            ContentType::LinkedinPost => 1,
            ContentType::ProfessionalEmail => 2,
            ContentType::AdContent => 3,
            ContentType::ConversationalText => 4,
            ContentType::BlogPost => 5,
            ContentType::SocialMediaCaption => 6,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|ct| ct.id() == id)
    }

    /// Stable machine name, identical to the serde representation.
    pub fn slug(&self) -> &'static str {
        match self {
            ContentType::LinkedinPost => "linkedin_post",
            ContentType::ProfessionalEmail => "professional_email",
            ContentType::AdContent => "ad_content",
            ContentType::ConversationalText => "conversational_text",
            ContentType::BlogPost => "blog_post",
            ContentType::SocialMediaCaption => "social_media_caption",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContentType::LinkedinPost => "LinkedIn Post",
            ContentType::ProfessionalEmail => "Professional Email",
            ContentType::AdContent => "Ad Content",
            ContentType::ConversationalText => "Conversational Text",
            ContentType::BlogPost => "Blog Post",
            ContentType::SocialMediaCaption => "Social Media Caption",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ContentType::LinkedinPost => "Professional posts for LinkedIn",
            ContentType::ProfessionalEmail => "Business and formal emails",
            ContentType::AdContent => "Advertising copy and promotional content",
            ContentType::ConversationalText => "Casual conversational content",
            ContentType::BlogPost => "Long-form blog articles",
            ContentType::SocialMediaCaption => "Short captions for social platforms",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentType {
    type Err = String;

    /// Accepts either the slug (`blog_post`) or the display name (`Blog Post`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|ct| ct.slug() == needle || ct.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("invalid content type: '{needle}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Creative,
    Persuasive,
    Informative,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Creative => "creative",
            Tone::Persuasive => "persuasive",
            Tone::Informative => "informative",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "creative" => Ok(Tone::Creative),
            "persuasive" => Ok(Tone::Persuasive),
            "informative" => Ok(Tone::Informative),
            other => Err(format!("invalid tone: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Length {
    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Length {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(Length::Short),
            "medium" => Ok(Length::Medium),
            "long" => Ok(Length::Long),
            other => Err(format!("invalid length: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("invalid theme: '{other}'")),
        }
    }
}

/// Ordering for archive listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSort {
    /// Newest first.
    #[default]
    Recent,
    Oldest,
    /// Favorites first, newest first within each group.
    Favorites,
}

// -- Entities --

/// Public view of a user. Carries no verifier material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_type: Option<ContentType>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the "recent chats" listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub content_type: Option<ContentType>,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    /// 1-based position within the session.
    pub seq: u32,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` once the originating session has been deleted.
    pub session_id: Option<Uuid>,
    pub content_type: ContentType,
    pub prompt: String,
    pub generated_text: String,
    pub tone: Tone,
    pub length: Length,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub default_tone: Tone,
    pub default_length: Length,
    pub theme: Theme,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total_content: u32,
    pub favorites: u32,
    pub sessions: u32,
    pub total_words: u64,
    pub by_content_type: Vec<ContentTypeCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeCount {
    pub content_type: ContentType,
    pub count: u32,
}
