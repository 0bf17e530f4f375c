//! Upgrade of notes written by the single-field schema.
//!
//! Before blocks existed a note carried exactly one string per Cornell
//! section (`index`, `content`, `notes`). Any note that arrives without a
//! `blocks` field is converted into the block list form when it is loaded,
//! whether it comes from the local store or from the remote document.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::models::{BlockType, Note, NoteBlock};

/// On-disk shape of a note, covering both schemas
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNote {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub blocks: Option<Vec<NoteBlock>>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub folder_id: Option<String>,
}

impl From<StoredNote> for Note {
    fn from(stored: StoredNote) -> Self {
        migrate_note(stored)
    }
}

/// Convert a stored note into the current model.
///
/// - A note that already has `blocks` is returned unchanged.
/// - Otherwise one block is synthesized per non-empty legacy field, in
///   index -> content -> notes order, with the text kept verbatim.
/// - If every legacy field is empty, a single empty content block is used.
///
/// Block ids are derived from the note id, so converting the same legacy
/// note twice yields identical blocks.
pub fn migrate_note(stored: StoredNote) -> Note {
    let blocks = match stored.blocks {
        Some(blocks) => blocks,
        None => {
            let legacy = [
                (BlockType::Index, stored.index.unwrap_or_default()),
                (BlockType::Content, stored.content.unwrap_or_default()),
                (BlockType::Notes, stored.notes.unwrap_or_default()),
            ];

            let mut blocks: Vec<NoteBlock> = legacy
                .into_iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(block_type, text)| legacy_block(&stored.id, block_type, text))
                .collect();

            if blocks.is_empty() {
                blocks.push(legacy_block(&stored.id, BlockType::Content, String::new()));
            }

            log::debug!(
                "Migration: converted legacy note {} into {} block(s)",
                stored.id,
                blocks.len()
            );
            blocks
        }
    };

    Note {
        id: stored.id,
        title: stored.title,
        blocks,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
        folder_id: stored.folder_id,
    }
}

fn legacy_block(note_id: &str, block_type: BlockType, content: String) -> NoteBlock {
    NoteBlock {
        id: format!("{}-{}", note_id, block_type.as_str()),
        block_type,
        title: block_type.default_title().to_string(),
        content,
    }
}
