use anyhow::Result;

use crate::app::App;
use crate::render::terminal;
use cornell_lib::Note;

const BRANCH: &str = "\u{251c}\u{2500}\u{2500} ";
const LAST_BRANCH: &str = "\u{2514}\u{2500}\u{2500} ";

pub fn run(app: &App, use_color: bool) -> Result<()> {
    let workspace = app.workspace();
    let groups = workspace.group_by_folder();

    println!("Cornell Notes");

    let total_items = groups.folders.len() + groups.uncategorized.len();
    let mut item_idx = 0;

    for (folder, notes) in &groups.folders {
        item_idx += 1;
        let is_last = item_idx == total_items;
        let connector = if is_last { LAST_BRANCH } else { BRANCH };
        let swatch = terminal::folder_swatch(&folder.color, use_color);

        if workspace.is_collapsed(&folder.id) {
            println!("{}{} {}/ ({} notes)", connector, swatch, folder.name, notes.len());
            continue;
        }

        println!("{}{} {}/", connector, swatch, folder.name);
        let child_prefix = if is_last { "    " } else { "\u{2502}   " };
        print_notes(notes, child_prefix);
    }

    // Uncategorized notes sit at the root
    for note in &groups.uncategorized {
        item_idx += 1;
        let connector = if item_idx == total_items { LAST_BRANCH } else { BRANCH };
        println!("{}{}", connector, note.title);
    }

    Ok(())
}

fn print_notes(notes: &[Note], prefix: &str) {
    for (i, note) in notes.iter().enumerate() {
        let connector = if i + 1 == notes.len() { LAST_BRANCH } else { BRANCH };
        println!("{}{}{}", prefix, connector, note.title);
    }
}
