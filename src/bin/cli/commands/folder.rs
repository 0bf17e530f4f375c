use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run_create(
    app: &App,
    name: &str,
    color: Option<String>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let folder = app.edit(|ws| ws.create_folder(name, color))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&folder)?),
        OutputFormat::Plain => {
            println!(
                "Created folder {} {}",
                terminal::folder_swatch(&folder.color, use_color),
                folder.name
            );
            println!("  ID: {}", folder.id);
        }
    }
    Ok(())
}

pub fn run_edit(
    app: &App,
    query: &str,
    name: Option<&str>,
    color: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    if name.is_none() && color.is_none() {
        anyhow::bail!("Nothing to change: pass --name and/or --color");
    }

    let folder = app.find_folder(query)?;
    let updated = app.edit(|ws| ws.update_folder(&folder.id, name, color))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&updated)?),
        OutputFormat::Plain => println!("Updated folder \"{}\"", updated.name),
    }
    Ok(())
}

pub fn run_delete(app: &App, query: &str, delete_notes: bool, format: &OutputFormat) -> Result<()> {
    let folder = app.find_folder(query)?;
    let affected = app.edit(|ws| ws.delete_folder(&folder.id, delete_notes))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": folder.id,
                "deletedNotes": if delete_notes { affected } else { 0 },
                "movedNotes": if delete_notes { 0 } else { affected },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain if delete_notes => {
            println!("Deleted folder \"{}\" and {} note(s)", folder.name, affected)
        }
        OutputFormat::Plain => println!(
            "Deleted folder \"{}\"; {} note(s) moved to Uncategorized",
            folder.name, affected
        ),
    }
    Ok(())
}

pub fn run_toggle(app: &App, query: &str, format: &OutputFormat) -> Result<()> {
    let folder = app.find_folder(query)?;
    // Collapsed flags stay local and are not part of the saved document
    let collapsed = app.workspace().toggle_folder(&folder.id)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "id": folder.id, "collapsed": collapsed }));
        }
        OutputFormat::Plain => println!(
            "Folder \"{}\" {}",
            folder.name,
            if collapsed { "collapsed" } else { "expanded" }
        ),
    }
    Ok(())
}
