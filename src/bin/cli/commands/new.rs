use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;
use cornell_lib::storage::{BlockUpdate, NoteUpdate};

pub fn run(
    app: &App,
    title: Option<&str>,
    folder_name: Option<&str>,
    content: Option<String>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let folder = folder_name.map(|name| app.find_folder(name)).transpose()?;
    let folder_id = folder.as_ref().map(|f| f.id.clone());

    let note = app.edit(|ws| {
        let note = ws.create_note(folder_id)?;
        if let Some(text) = content.filter(|t| !t.is_empty()) {
            let block_id = note.blocks[0].id.clone();
            ws.update_block(
                &note.id,
                &block_id,
                BlockUpdate {
                    content: Some(text),
                    ..Default::default()
                },
            )?;
        }
        match title {
            Some(title) => ws.update_note(NoteUpdate {
                title: Some(title.to_string()),
                ..NoteUpdate::new(&note.id)
            }),
            None => ws.get_note(&note.id).cloned(),
        }
    })?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&note)?);
        }
        OutputFormat::Plain => {
            println!("Created note \"{}\"", note.title);
            if let Some(f) = folder {
                println!("  Folder: {} {}", terminal::folder_swatch(&f.color, use_color), f.name);
            }
            println!("  ID: {}", note.id);
        }
    }

    Ok(())
}
