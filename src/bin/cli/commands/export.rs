use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;
use cornell_lib::export::{export_note_to_text, write_note_export};

pub fn run(
    app: &App,
    query: &str,
    out_dir: Option<PathBuf>,
    to_stdout: bool,
    format: &OutputFormat,
) -> Result<()> {
    let note = app.find_note(query)?;

    if to_stdout {
        println!("{}", export_note_to_text(&note));
        return Ok(());
    }

    let dir = match out_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let path = write_note_export(&note, &dir)
        .with_context(|| format!("Failed to write export to {}", dir.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "id": note.id, "path": path.to_string_lossy() }));
        }
        OutputFormat::Plain => println!("Exported \"{}\" to {}", note.title, path.display()),
    }
    Ok(())
}
