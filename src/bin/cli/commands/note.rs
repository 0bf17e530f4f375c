use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub fn run_rename(app: &App, query: &str, title: &str, format: &OutputFormat) -> Result<()> {
    let note = app.find_note(query)?;
    let renamed = app.edit(|ws| ws.rename_note(&note.id, title))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&renamed)?),
        OutputFormat::Plain => println!("Renamed \"{}\" to \"{}\"", note.title, renamed.title),
    }
    Ok(())
}

pub fn run_move(app: &App, query: &str, folder_name: Option<&str>, format: &OutputFormat) -> Result<()> {
    let note = app.find_note(query)?;
    let folder = folder_name.map(|name| app.find_folder(name)).transpose()?;
    let target = folder.as_ref().map(|f| f.id.clone());

    let moved = app.edit(|ws| ws.move_note_to_folder(&note.id, target))?;
    let destination = folder.map(|f| f.name).unwrap_or_else(|| "Uncategorized".to_string());

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": note.id,
                "moved": moved,
                "destination": destination,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain if moved => println!("Moved \"{}\" to {}", note.title, destination),
        OutputFormat::Plain => println!("\"{}\" is already in {}", note.title, destination),
    }
    Ok(())
}

pub fn run_delete(app: &App, query: &str, format: &OutputFormat) -> Result<()> {
    let note = app.find_note(query)?;
    app.edit(|ws| ws.delete_note(&note.id))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "id": note.id, "deleted": true }));
        }
        OutputFormat::Plain => println!("Deleted note \"{}\"", note.title),
    }
    Ok(())
}
