use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::migration::StoredNote;

/// Color given to folders created without one
pub const DEFAULT_FOLDER_COLOR: &str = "#6366f1";

/// Title given to freshly created notes
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";

/// Cornell section a block belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Cue / index column
    Index,
    /// Main notes
    Content,
    /// Summary
    Notes,
}

impl BlockType {
    /// Export and migration order
    pub const ALL: [BlockType; 3] = [BlockType::Index, BlockType::Content, BlockType::Notes];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Index => "index",
            BlockType::Content => "content",
            BlockType::Notes => "notes",
        }
    }

    /// Title a new block of this type starts with
    pub fn default_title(&self) -> &'static str {
        match self {
            BlockType::Index => "Index / Cues",
            BlockType::Content => "Main Notes",
            BlockType::Notes => "Summary",
        }
    }

    /// Human label used by the terminal renderer
    pub fn label(&self) -> &'static str {
        match self {
            BlockType::Index => "Index / Cue",
            BlockType::Content => "Content",
            BlockType::Notes => "Summary",
        }
    }
}

impl Default for BlockType {
    fn default() -> Self {
        Self::Content
    }
}

impl std::str::FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "index" | "cue" | "cues" => Ok(BlockType::Index),
            "content" | "main" => Ok(BlockType::Content),
            "notes" | "summary" => Ok(BlockType::Notes),
            other => Err(format!("Unknown block type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Folder {
    pub fn new(name: String, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            color: color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FOLDER_COLOR.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl NoteBlock {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            id: format!("block-{}", Uuid::new_v4()),
            block_type,
            title: block_type.default_title().to_string(),
            content: String::new(),
        }
    }
}

/// A Cornell note. Deserialization goes through [`StoredNote`] so notes
/// written by the legacy single-field schema are upgraded on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "StoredNote")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub blocks: Vec<NoteBlock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder_id: Option<String>,
}

impl Note {
    pub fn new(folder_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_NOTE_TITLE.to_string(),
            blocks: vec![NoteBlock::new(BlockType::Content)],
            created_at: now,
            updated_at: now,
            folder_id,
        }
    }

    /// Refresh `updated_at` after a mutation
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn blocks_of(&self, block_type: BlockType) -> impl Iterator<Item = &NoteBlock> {
        self.blocks.iter().filter(move |b| b.block_type == block_type)
    }
}

/// Partial update of a note. `None` leaves the field unchanged; for
/// `folder_id`, `Some(None)` moves the note to uncategorized.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub id: String,
    pub title: Option<String>,
    pub blocks: Option<Vec<NoteBlock>>,
    pub folder_id: Option<Option<String>>,
}

impl NoteUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Changes to a single block
#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Notes grouped for display: one entry per folder in folder order, plus
/// the uncategorized notes (null or dangling `folder_id`).
#[derive(Debug, Clone, Default)]
pub struct FolderGroups {
    pub folders: Vec<(Folder, Vec<Note>)>,
    pub uncategorized: Vec<Note>,
}

impl FolderGroups {
    pub fn notes_in(&self, folder_id: &str) -> usize {
        self.folders
            .iter()
            .find(|(f, _)| f.id == folder_id)
            .map(|(_, notes)| notes.len())
            .unwrap_or(0)
    }
}
