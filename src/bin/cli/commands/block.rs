use anyhow::{bail, Result};

use crate::app::App;
use crate::OutputFormat;
use cornell_lib::storage::{BlockType, BlockUpdate};

pub fn run_add(
    app: &App,
    query: &str,
    kind: BlockType,
    content: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let note = app.find_note(query)?;

    let block = app.edit(|ws| {
        let block = ws.add_block(&note.id, kind)?;
        match content {
            Some(text) => {
                ws.update_block(
                    &note.id,
                    &block.id,
                    BlockUpdate {
                        content: Some(text.clone()),
                        ..Default::default()
                    },
                )?;
                Ok(cornell_lib::NoteBlock { content: text, ..block })
            }
            None => Ok(block),
        }
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&block)?),
        OutputFormat::Plain => println!(
            "Added {} block [{}] to \"{}\"",
            kind.label(),
            note.blocks.len() + 1,
            note.title
        ),
    }
    Ok(())
}

pub fn run_edit(
    app: &App,
    query: &str,
    block_query: &str,
    title: Option<String>,
    content: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    if title.is_none() && content.is_none() {
        bail!("Nothing to change: pass --title and/or --content");
    }

    let note = app.find_note(query)?;
    let block = App::find_block(&note, block_query)?;
    app.edit(|ws| ws.update_block(&note.id, &block.id, BlockUpdate { title, content }))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "noteId": note.id, "blockId": block.id, "updated": true }));
        }
        OutputFormat::Plain => println!("Updated block {} of \"{}\"", block_query, note.title),
    }
    Ok(())
}

pub fn run_delete(app: &App, query: &str, block_query: &str, format: &OutputFormat) -> Result<()> {
    let note = app.find_note(query)?;
    let block = App::find_block(&note, block_query)?;
    app.edit(|ws| ws.delete_block(&note.id, &block.id))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "noteId": note.id, "blockId": block.id, "deleted": true }));
        }
        OutputFormat::Plain => println!("Removed {} block from \"{}\"", block.block_type.label(), note.title),
    }
    Ok(())
}
