use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;
pub type WindowId = Uuid;

/// Number of visual accent themes a note can select from.
pub const NOTE_THEME_COUNT: u8 = 5;

/// A note as it travels between windows and the persistence process.
///
/// Timestamps are optional in transit; the store stamps them on write and
/// always returns them populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub theme: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned: bool,
}

impl Note {
    /// Builds a new note with a client-assigned id, ready to be persisted.
    /// The theme is clamped into the accent domain.
    pub fn new(title: impl Into<String>, content: impl Into<String>, theme: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            theme: clamp_theme(theme),
            created_at: None,
            updated_at: None,
            pinned: false,
        }
    }
}

/// A note as it lives in storage: timestamps always present, plus the
/// soft-delete flag that never travels in the transit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub theme: u8,
    pub pinned: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteRecord {
    /// Projects the record back into the transit shape.
    pub fn to_note(&self) -> Note {
        Note {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            theme: self.theme,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            pinned: self.pinned,
        }
    }
}

/// A single field-level change to a note.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteEdit {
    Title(String),
    Content(String),
    Theme(u8),
}

impl NoteEdit {
    pub fn apply(self, note: &mut Note) {
        match self {
            NoteEdit::Title(title) => note.title = title,
            NoteEdit::Content(content) => note.content = content,
            NoteEdit::Theme(theme) => note.theme = clamp_theme(theme),
        }
    }
}

fn clamp_theme(theme: u8) -> u8 {
    theme.min(NOTE_THEME_COUNT - 1)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Main,
    PinnedNote,
    Timer,
}

/// The typed client-side surface of the bridge. One implementation marshals
/// through the inter-process relay; tests substitute recording mocks.
#[async_trait]
pub trait NoteApi: Send + Sync {
    async fn create_note(&self, note: &Note) -> Result<()>;
    async fn read_note(&self, id: NoteId) -> Result<Option<NoteRecord>>;
    async fn read_active_notes(&self) -> Result<Vec<NoteRecord>>;
    async fn read_all_notes(&self) -> Result<Vec<NoteRecord>>;
    async fn update_note(&self, note: &Note) -> Result<()>;
    async fn delete_note(&self, id: NoteId) -> Result<()>;
    async fn delete_note_permanently(&self, id: NoteId) -> Result<()>;
    async fn pin_note(&self, id: NoteId) -> Result<()>;
    async fn open_timer_window(&self) -> Result<()>;
    async fn close_window(&self) -> Result<()>;
}

/// Window-control collaborator. Carries no data-model semantics; the bridge
/// forwards directives here verbatim.
pub trait WindowManager: Send + Sync {
    fn open_pinned_note(&self, note_id: NoteId) -> Result<WindowId>;
    fn open_timer_window(&self) -> Result<WindowId>;
    fn close_window(&self, window: WindowId) -> Result<()>;
}
