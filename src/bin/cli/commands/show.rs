use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run(app: &App, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let note = app.find_note(query)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&note)?);
        }
        OutputFormat::Plain => {
            let workspace = app.workspace();
            let folder = workspace.folder_of(&note);
            println!("{}", terminal::render_note(&note, folder, use_color));
        }
    }

    Ok(())
}
