use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use super::kv_store::{KvStore, Persisted, COLLAPSED_FOLDERS_KEY, FOLDERS_KEY, NOTES_KEY};
use super::models::{BlockType, BlockUpdate, Folder, FolderGroups, Note, NoteBlock, NoteUpdate};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Data directory not found")]
    DataDirNotFound,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Local notes, folders and folder-collapsed flags, each persisted whole
/// under its own key.
#[derive(Debug)]
pub struct Workspace {
    notes: Persisted<Vec<Note>>,
    folders: Persisted<Vec<Folder>>,
    collapsed: Persisted<HashMap<String, bool>>,
}

impl Workspace {
    pub fn open(base_path: PathBuf) -> Self {
        let store = KvStore::new(base_path);
        Self {
            notes: Persisted::open(store.clone(), NOTES_KEY),
            folders: Persisted::open(store.clone(), FOLDERS_KEY),
            collapsed: Persisted::open(store, COLLAPSED_FOLDERS_KEY),
        }
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("cornell-notes"))
            .ok_or(StorageError::DataDirNotFound)
    }

    pub fn notes(&self) -> &[Note] {
        self.notes.get()
    }

    pub fn folders(&self) -> &[Folder] {
        self.folders.get()
    }

    pub fn get_note(&self, note_id: &str) -> Result<&Note> {
        self.notes
            .get()
            .iter()
            .find(|n| n.id == note_id)
            .ok_or_else(|| StorageError::NoteNotFound(note_id.to_string()))
    }

    pub fn get_folder(&self, folder_id: &str) -> Result<&Folder> {
        self.folders
            .get()
            .iter()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| StorageError::FolderNotFound(folder_id.to_string()))
    }

    /// Folder a note belongs to, or `None` when uncategorized or dangling
    pub fn folder_of(&self, note: &Note) -> Option<&Folder> {
        note.folder_id
            .as_deref()
            .and_then(|id| self.folders.get().iter().find(|f| f.id == id))
    }

    // ===== Folder Operations =====

    /// Create a folder. New folders are listed first.
    pub fn create_folder(&mut self, name: &str, color: Option<String>) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidOperation(
                "Folder name cannot be empty".to_string(),
            ));
        }

        let folder = Folder::new(name.to_string(), color);
        let created = folder.clone();
        self.folders.update(|folders| folders.insert(0, folder))?;

        log::info!("Created folder '{}' ({})", created.name, created.id);
        Ok(created)
    }

    /// Rename or recolor a folder
    pub fn update_folder(
        &mut self,
        folder_id: &str,
        name: Option<&str>,
        color: Option<String>,
    ) -> Result<Folder> {
        let name = match name.map(str::trim) {
            Some("") => {
                return Err(StorageError::InvalidOperation(
                    "Folder name cannot be empty".to_string(),
                ))
            }
            other => other.map(str::to_string),
        };

        let idx = self.folder_index(folder_id)?;
        self.folders.update(|folders| {
            let folder = &mut folders[idx];
            if let Some(name) = name {
                folder.name = name;
            }
            if let Some(color) = color {
                folder.color = color;
            }
            folder.clone()
        })
    }

    /// Delete a folder. With `delete_notes` its notes are deleted too;
    /// otherwise they become uncategorized. Returns the number of notes
    /// affected.
    pub fn delete_folder(&mut self, folder_id: &str, delete_notes: bool) -> Result<usize> {
        let idx = self.folder_index(folder_id)?;
        self.folders.update(|folders| {
            folders.remove(idx);
        })?;

        let affected = self.notes.update(|notes| {
            let before = notes.len();
            if delete_notes {
                notes.retain(|n| n.folder_id.as_deref() != Some(folder_id));
                before - notes.len()
            } else {
                let mut moved = 0;
                for note in notes.iter_mut() {
                    if note.folder_id.as_deref() == Some(folder_id) {
                        note.folder_id = None;
                        note.touch();
                        moved += 1;
                    }
                }
                moved
            }
        })?;

        if self.collapsed.get().contains_key(folder_id) {
            self.collapsed.update(|map| {
                map.remove(folder_id);
            })?;
        }

        log::info!(
            "Deleted folder {} ({} note(s) {})",
            folder_id,
            affected,
            if delete_notes { "deleted" } else { "moved to uncategorized" }
        );
        Ok(affected)
    }

    /// Flip a folder's collapsed flag, returning the new state
    pub fn toggle_folder(&mut self, folder_id: &str) -> Result<bool> {
        self.collapsed.update(|map| {
            let entry = map.entry(folder_id.to_string()).or_insert(false);
            *entry = !*entry;
            *entry
        })
    }

    pub fn is_collapsed(&self, folder_id: &str) -> bool {
        self.collapsed.get().get(folder_id).copied().unwrap_or(false)
    }

    // ===== Note Operations =====

    /// Create a note with a single empty content block. New notes are
    /// listed first.
    pub fn create_note(&mut self, folder_id: Option<String>) -> Result<Note> {
        let note = Note::new(folder_id);
        let created = note.clone();
        self.notes.update(|notes| notes.insert(0, note))?;
        Ok(created)
    }

    /// Apply a partial update and refresh `updated_at`
    pub fn update_note(&mut self, update: NoteUpdate) -> Result<Note> {
        self.modify_note(&update.id, |note| {
            if let Some(title) = update.title {
                note.title = title;
            }
            if let Some(blocks) = update.blocks {
                note.blocks = blocks;
            }
            if let Some(folder_id) = update.folder_id {
                note.folder_id = folder_id;
            }
            Ok(())
        })?;
        Ok(self.get_note(&update.id)?.clone())
    }

    pub fn rename_note(&mut self, note_id: &str, title: &str) -> Result<Note> {
        self.update_note(NoteUpdate {
            title: Some(title.to_string()),
            ..NoteUpdate::new(note_id)
        })
    }

    /// Append a block with the default title for its type
    pub fn add_block(&mut self, note_id: &str, block_type: BlockType) -> Result<NoteBlock> {
        let block = NoteBlock::new(block_type);
        let added = block.clone();
        self.modify_note(note_id, |note| {
            note.blocks.push(block);
            Ok(())
        })?;
        Ok(added)
    }

    pub fn update_block(&mut self, note_id: &str, block_id: &str, update: BlockUpdate) -> Result<()> {
        self.modify_note(note_id, |note| {
            let block = note
                .blocks
                .iter_mut()
                .find(|b| b.id == block_id)
                .ok_or_else(|| StorageError::BlockNotFound(block_id.to_string()))?;
            if let Some(title) = update.title {
                block.title = title;
            }
            if let Some(content) = update.content {
                block.content = content;
            }
            Ok(())
        })
    }

    pub fn delete_block(&mut self, note_id: &str, block_id: &str) -> Result<()> {
        self.modify_note(note_id, |note| {
            let before = note.blocks.len();
            note.blocks.retain(|b| b.id != block_id);
            if note.blocks.len() == before {
                return Err(StorageError::BlockNotFound(block_id.to_string()));
            }
            Ok(())
        })
    }

    pub fn delete_note(&mut self, note_id: &str) -> Result<()> {
        let idx = self.note_index(note_id)?;
        self.notes.update(|notes| {
            notes.remove(idx);
        })
    }

    /// Move a note into a folder (or uncategorized with `None`). Returns
    /// `false` without touching the note when it is already there.
    pub fn move_note_to_folder(&mut self, note_id: &str, folder_id: Option<String>) -> Result<bool> {
        if let Some(ref fid) = folder_id {
            self.get_folder(fid)?;
        }

        if self.get_note(note_id)?.folder_id == folder_id {
            return Ok(false);
        }

        self.update_note(NoteUpdate {
            folder_id: Some(folder_id),
            ..NoteUpdate::new(note_id)
        })?;
        Ok(true)
    }

    /// Group notes by folder. Notes whose folder is missing are treated as
    /// uncategorized rather than dropped.
    pub fn group_by_folder(&self) -> FolderGroups {
        let mut groups = FolderGroups {
            folders: self
                .folders
                .get()
                .iter()
                .map(|f| (f.clone(), Vec::new()))
                .collect(),
            uncategorized: Vec::new(),
        };

        for note in self.notes.get() {
            let slot = note
                .folder_id
                .as_deref()
                .and_then(|fid| groups.folders.iter_mut().find(|(f, _)| f.id == fid));
            match slot {
                Some((_, notes)) => notes.push(note.clone()),
                None => groups.uncategorized.push(note.clone()),
            }
        }

        groups
    }

    // ===== Bulk Operations =====

    /// Replace both collections, as done after downloading remote state
    pub fn replace_all(&mut self, notes: Vec<Note>, folders: Vec<Folder>) -> Result<()> {
        self.notes.set(notes)?;
        self.folders.set(folders)?;
        Ok(())
    }

    /// Drop all local notes, folders and collapsed flags
    pub fn clear(&mut self) -> Result<()> {
        self.notes.set(Vec::new())?;
        self.folders.set(Vec::new())?;
        self.collapsed.set(HashMap::new())?;
        Ok(())
    }

    fn note_index(&self, note_id: &str) -> Result<usize> {
        self.notes
            .get()
            .iter()
            .position(|n| n.id == note_id)
            .ok_or_else(|| StorageError::NoteNotFound(note_id.to_string()))
    }

    fn folder_index(&self, folder_id: &str) -> Result<usize> {
        self.folders
            .get()
            .iter()
            .position(|f| f.id == folder_id)
            .ok_or_else(|| StorageError::FolderNotFound(folder_id.to_string()))
    }

    /// Run `f` on a copy of the note; on success store it with a fresh
    /// `updated_at`.
    fn modify_note(
        &mut self,
        note_id: &str,
        f: impl FnOnce(&mut Note) -> Result<()>,
    ) -> Result<()> {
        let idx = self.note_index(note_id)?;
        let mut note = self.notes.get()[idx].clone();
        f(&mut note)?;
        note.touch();
        self.notes.update(|notes| notes[idx] = note)
    }
}
