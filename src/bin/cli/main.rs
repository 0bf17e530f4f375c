mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cornell_lib::storage::BlockType;

#[derive(Parser)]
#[command(name = "cornell-cli", about = "Cornell notes CLI with Google Drive sync", version)]
struct Cli {
    /// Data directory (default: platform local data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Save to Google Drive after changing anything
    #[arg(long, global = true)]
    save: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List folders and their notes
    List,

    /// Show the folder tree, honoring collapsed folders
    Tree,

    /// Show a note's Cornell sections
    Show {
        /// Note title or id (case-insensitive prefix match)
        note: String,
    },

    /// Create a new note
    New {
        /// Note title (defaults to "Untitled Note")
        title: Option<String>,
        /// Place in a named folder
        #[arg(long)]
        folder: Option<String>,
        /// Initial main-notes text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
    },

    /// Rename a note
    Rename {
        note: String,
        title: String,
    },

    /// Move a note to a folder, or to uncategorized when no folder is given
    Move {
        note: String,
        #[arg(long)]
        folder: Option<String>,
    },

    /// Delete a note
    Rm {
        note: String,
    },

    /// Export a note as plain text
    Export {
        note: String,
        /// Directory to write into (default: current directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Folder management
    #[command(subcommand)]
    Folder(FolderCommand),

    /// Block management
    #[command(subcommand)]
    Block(BlockCommand),

    /// Sign in to Google Drive and pull the remote notes
    Login,

    /// Sign out of Google Drive and clear local notes (kept when not signed in)
    Logout,

    /// Replace local notes with the Google Drive copy
    Pull,

    /// Upload local notes to Google Drive
    Save,

    /// Show sign-in and save status. Unsaved changes are only tracked
    /// within a single invocation; use --save to upload as you edit.
    Status,
}

#[derive(Subcommand)]
enum FolderCommand {
    /// Create a folder
    New {
        name: String,
        /// Hex color, e.g. "#22c55e"
        #[arg(long)]
        color: Option<String>,
    },

    /// Rename or recolor a folder
    Edit {
        folder: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a folder, keeping its notes unless --delete-notes is given
    Rm {
        folder: String,
        #[arg(long)]
        delete_notes: bool,
    },

    /// Collapse or expand a folder in listings
    Toggle {
        folder: String,
    },
}

#[derive(Subcommand)]
enum BlockCommand {
    /// Append a block to a note
    Add {
        note: String,
        /// index, content or notes
        #[arg(value_parser = parse_block_type)]
        kind: BlockType,
        /// Initial text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
    },

    /// Edit a block's title or content
    Edit {
        note: String,
        /// Block number as shown by `show`, or block id prefix
        block: String,
        #[arg(long)]
        title: Option<String>,
        /// New text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
    },

    /// Remove a block
    Rm {
        note: String,
        block: String,
    },
}

fn parse_block_type(s: &str) -> Result<BlockType, String> {
    s.parse()
}

/// Read content from stdin if piped, or resolve "-" as stdin
fn resolve_content(content: Option<String>) -> Option<String> {
    match content.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
            Some(buf)
        }
        _ => content,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.data_dir.clone(), cli.save)?;

    match cli.command {
        Command::List => commands::list::run(&app, &cli.format, use_color)?,
        Command::Tree => commands::tree::run(&app, use_color)?,
        Command::Show { note } => commands::show::run(&app, &note, &cli.format, use_color)?,
        Command::New { title, folder, content } => {
            let content = resolve_content(content);
            commands::new::run(
                &app,
                title.as_deref(),
                folder.as_deref(),
                content,
                &cli.format,
                use_color,
            )?;
        }
        Command::Rename { note, title } => commands::note::run_rename(&app, &note, &title, &cli.format)?,
        Command::Move { note, folder } => {
            commands::note::run_move(&app, &note, folder.as_deref(), &cli.format)?
        }
        Command::Rm { note } => commands::note::run_delete(&app, &note, &cli.format)?,
        Command::Export { note, out, stdout } => {
            commands::export::run(&app, &note, out, stdout, &cli.format)?
        }
        Command::Folder(subcmd) => match subcmd {
            FolderCommand::New { name, color } => {
                commands::folder::run_create(&app, &name, color, &cli.format, use_color)?
            }
            FolderCommand::Edit { folder, name, color } => {
                commands::folder::run_edit(&app, &folder, name.as_deref(), color, &cli.format)?
            }
            FolderCommand::Rm { folder, delete_notes } => {
                commands::folder::run_delete(&app, &folder, delete_notes, &cli.format)?
            }
            FolderCommand::Toggle { folder } => {
                commands::folder::run_toggle(&app, &folder, &cli.format)?
            }
        },
        Command::Block(subcmd) => match subcmd {
            BlockCommand::Add { note, kind, content } => {
                let content = resolve_content(content);
                commands::block::run_add(&app, &note, kind, content, &cli.format)?
            }
            BlockCommand::Edit { note, block, title, content } => {
                let content = resolve_content(content);
                commands::block::run_edit(&app, &note, &block, title, content, &cli.format)?
            }
            BlockCommand::Rm { note, block } => {
                commands::block::run_delete(&app, &note, &block, &cli.format)?
            }
        },
        Command::Login => commands::sync::run_login(&app, &cli.format, use_color)?,
        Command::Logout => commands::sync::run_logout(&app, &cli.format)?,
        Command::Pull => commands::sync::run_pull(&app, &cli.format)?,
        Command::Save => commands::sync::run_save(&app, &cli.format, use_color)?,
        Command::Status => commands::sync::run_status(&app, &cli.format, use_color)?,
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
