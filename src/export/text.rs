use std::fs;
use std::sync::OnceLock;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::storage::{BlockType, Note, NoteBlock};

/// File name used when a title sanitizes to nothing
const FALLBACK_FILE_STEM: &str = "cornell_note";

/// Separator placed between blocks of the same section
const BLOCK_SEPARATOR: &str = "\n\n----\n\n";

/// Export a note as plain text.
///
/// Sections are emitted in index, content, notes order. Blocks whose
/// content is blank are skipped and a section with no remaining blocks is
/// left out entirely.
pub fn export_note_to_text(note: &Note) -> String {
    let sections: Vec<String> = BlockType::ALL
        .iter()
        .filter_map(|block_type| {
            let blocks: Vec<&NoteBlock> = note
                .blocks_of(*block_type)
                .filter(|b| !b.content.trim().is_empty())
                .collect();
            if blocks.is_empty() {
                None
            } else {
                Some(format!("# {}\n\n{}", block_type.as_str(), join_blocks(&blocks)))
            }
        })
        .collect();

    sections.join("\n\n").trim().to_string()
}

/// Join the blocks of one section. The first block contributes only its
/// content; each following block is preceded by the separator and, when it
/// has one, its title line.
fn join_blocks(blocks: &[&NoteBlock]) -> String {
    let mut iter = blocks.iter();
    let mut result = match iter.next() {
        Some(first) => first.content.clone(),
        None => return String::new(),
    };

    for block in iter {
        result.push_str(BLOCK_SEPARATOR);
        if !block.title.is_empty() {
            result.push_str(&block.title);
            result.push('\n');
        }
        result.push_str(&block.content);
    }

    result
}

fn unsafe_char_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[^a-z0-9]").unwrap())
}

/// File name for an exported note: every character outside `[a-z0-9]` is
/// replaced with `_` and the result lowercased.
pub fn export_file_name(title: &str) -> String {
    let stem = unsafe_char_re().replace_all(title, "_").to_lowercase();
    let stem = if stem.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        stem
    };
    format!("{}.txt", stem)
}

/// Write the export of `note` into `dir`, returning the file path
pub fn write_note_export(note: &Note, dir: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(&note.title));
    fs::write(&path, export_note_to_text(note))?;
    log::info!("Exported note {} to {:?}", note.id, path);
    Ok(path)
}
