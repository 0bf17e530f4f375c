use std::sync::OnceLock;

use cornell_lib::storage::{BlockType, Folder, Note, NoteBlock};
use cornell_lib::sync::{SaveStatus, SavingStatus};
use regex::Regex;

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

const WRAP_WIDTH: usize = 80;

pub fn paint(text: &str, code: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", code, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Render a note as its three Cornell sections. Blocks are numbered in note
/// order so they can be addressed from the command line.
pub fn render_note(note: &Note, folder: Option<&Folder>, use_color: bool) -> String {
    let mut lines = vec![paint(&note.title, Color::BOLD, use_color)];

    let location = match folder {
        Some(f) => format!("{} {}", folder_swatch(&f.color, use_color), f.name),
        None => "Uncategorized".to_string(),
    };
    lines.push(paint(
        &format!("{} | updated {}", location, note.updated_at.format("%Y-%m-%d %H:%M")),
        Color::DIM,
        use_color,
    ));

    for block_type in BlockType::ALL {
        let blocks: Vec<(usize, &NoteBlock)> = note
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.block_type == block_type)
            .collect();
        if blocks.is_empty() {
            continue;
        }

        lines.push(String::new());
        lines.push(paint(
            &format!("== {} ==", block_type.label()),
            Color::CYAN,
            use_color,
        ));
        for (position, block) in blocks {
            lines.extend(render_block(position + 1, block, use_color));
        }
    }

    lines.join("\n")
}

fn render_block(number: usize, block: &NoteBlock, use_color: bool) -> Vec<String> {
    let title = if block.title.is_empty() {
        block.block_type.default_title()
    } else {
        block.title.as_str()
    };

    let mut lines = vec![paint(&format!("[{}] {}", number, title), Color::BOLD, use_color)];
    if block.content.trim().is_empty() {
        lines.push(paint("    (empty)", Color::GRAY, use_color));
    } else {
        lines.extend(wrap_lines(&block.content, "    ", WRAP_WIDTH));
    }
    lines
}

/// Save indicator line, or `None` when there is nothing to show
pub fn indicator_line(status: &SaveStatus, use_color: bool) -> Option<String> {
    let text = status.indicator()?;
    let code = match status.status {
        SavingStatus::Saving => Color::YELLOW,
        SavingStatus::Saved => Color::GREEN,
        SavingStatus::Error => Color::RED,
        SavingStatus::Idle => Color::GRAY,
    };
    let mut line = paint(text, code, use_color);
    if let Some(ref error) = status.error {
        line.push_str(&format!(": {}", error));
    }
    Some(line)
}

fn hex_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").unwrap())
}

/// Colored bullet for a folder's `#rrggbb` color; a plain bullet otherwise
pub fn folder_swatch(color: &str, use_color: bool) -> String {
    if !use_color {
        return "\u{25cf}".to_string();
    }

    match hex_color_re().captures(color) {
        Some(caps) => {
            let channel = |i: usize| u8::from_str_radix(&caps[i], 16).unwrap_or(0);
            format!(
                "\x1b[38;2;{};{};{}m\u{25cf}{}",
                channel(1),
                channel(2),
                channel(3),
                Color::RESET
            )
        }
        None => "\u{25cf}".to_string(),
    }
}

/// Simple word-wrapping for terminal output. Blank lines are kept.
fn wrap_lines(text: &str, prefix: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let effective_width = max_width.saturating_sub(prefix.len());

    for line in text.lines() {
        if line.chars().count() <= effective_width {
            lines.push(format!("{}{}", prefix, line).trim_end().to_string());
            continue;
        }

        let mut current_line = String::new();
        for word in line.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + 1 + word.chars().count() <= effective_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(format!("{}{}", prefix, current_line));
                current_line = word.to_string();
            }
        }
        if !current_line.is_empty() {
            lines.push(format!("{}{}", prefix, current_line));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_note_groups_sections() {
        let mut note = Note::new(None);
        note.title = "Photosynthesis".to_string();
        note.blocks[0].content = "Light reactions".to_string();
        let mut cue = NoteBlock::new(BlockType::Index);
        cue.content = "What is ATP?".to_string();
        note.blocks.push(cue);

        let rendered = render_note(&note, None, false);

        let cue_at = rendered.find("== Index / Cue ==").unwrap();
        let content_at = rendered.find("== Content ==").unwrap();
        assert!(cue_at < content_at);
        assert!(rendered.contains("[2] Index / Cues"));
        assert!(rendered.contains("    Light reactions"));
        assert!(rendered.contains("Uncategorized"));
        assert!(!rendered.contains("== Summary =="));
    }

    #[test]
    fn test_indicator_line() {
        let status = SaveStatus {
            status: SavingStatus::Error,
            error: Some("offline".to_string()),
            ..SaveStatus::default()
        };
        assert_eq!(indicator_line(&status, false).unwrap(), "Error saving: offline");
        assert!(indicator_line(&SaveStatus::default(), false).is_none());
    }

    #[test]
    fn test_folder_swatch() {
        assert_eq!(folder_swatch("#6366f1", true), "\x1b[38;2;99;102;241m\u{25cf}\x1b[0m");
        assert_eq!(folder_swatch("blue", true), "\u{25cf}");
        assert_eq!(folder_swatch("#6366f1", false), "\u{25cf}");
    }

    #[test]
    fn test_wrap_lines() {
        let lines = wrap_lines("one two three four", "  ", 12);
        assert_eq!(lines, vec!["  one two", "  three four"]);
        assert_eq!(wrap_lines("a\n\nb", "", 80), vec!["a", "", "b"]);
    }
}
