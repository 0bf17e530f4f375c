use anyhow::Result;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let workspace = app.workspace();
    let groups = workspace.group_by_folder();

    match format {
        OutputFormat::Json => {
            let folders: Vec<serde_json::Value> = groups
                .folders
                .iter()
                .map(|(folder, notes)| {
                    serde_json::json!({
                        "id": folder.id,
                        "name": folder.name,
                        "color": folder.color,
                        "collapsed": workspace.is_collapsed(&folder.id),
                        "notes": notes.iter().map(note_summary).collect::<Vec<_>>(),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "folders": folders,
                "uncategorized": groups.uncategorized.iter().map(note_summary).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if workspace.notes().is_empty() && workspace.folders().is_empty() {
                println!("No notes yet. Create one with `cornell-cli new`.");
                return Ok(());
            }

            for (folder, notes) in &groups.folders {
                let collapsed = if workspace.is_collapsed(&folder.id) { " [collapsed]" } else { "" };
                println!(
                    "{} {} ({} notes){}",
                    terminal::folder_swatch(&folder.color, use_color),
                    folder.name,
                    notes.len(),
                    collapsed
                );
                for note in notes {
                    print_note_line(note, use_color);
                }
            }

            if !groups.uncategorized.is_empty() {
                println!("Uncategorized ({} notes)", groups.uncategorized.len());
                for note in &groups.uncategorized {
                    print_note_line(note, use_color);
                }
            }
        }
    }

    Ok(())
}

fn note_summary(note: &cornell_lib::Note) -> serde_json::Value {
    serde_json::json!({
        "id": note.id,
        "title": note.title,
        "blocks": note.blocks.len(),
        "updatedAt": note.updated_at.to_rfc3339(),
    })
}

fn print_note_line(note: &cornell_lib::Note, use_color: bool) {
    let updated = note.updated_at.format("%Y-%m-%d").to_string();
    if use_color {
        println!("    {}  {}{}{}", note.title, Color::GRAY, updated, Color::RESET);
    } else {
        println!("    {}  {}", note.title, updated);
    }
}
