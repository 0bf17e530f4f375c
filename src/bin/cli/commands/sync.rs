use anyhow::{bail, Result};

use crate::app::App;
use crate::render::terminal::{self, paint, Color};
use crate::OutputFormat;
use cornell_lib::sync::{SaveOutcome, SyncOutcome};

pub fn run_login(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    app.require_drive()?;
    let remote = app.scheduler.remote();

    app.block_on(remote.sign_in());
    if !remote.is_signed_in() {
        bail!("Sign-in was not completed");
    }

    // A fresh sign-in replaces local notes with the Drive copy
    let outcome = app.block_on(app.scheduler.sync_from_remote())?;
    print_sync_outcome(&outcome, format, use_color)
}

pub fn run_logout(app: &App, format: &OutputFormat) -> Result<()> {
    let ended = app.block_on(app.scheduler.sign_out());

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "signedIn": false, "cleared": ended }))
        }
        OutputFormat::Plain if ended => println!("Signed out. Local notes were cleared."),
        OutputFormat::Plain => println!("Not signed in. Local notes were kept."),
    }
    Ok(())
}

pub fn run_pull(app: &App, format: &OutputFormat) -> Result<()> {
    app.require_drive()?;
    if !app.scheduler.remote().is_signed_in() {
        bail!("Not signed in. Run `cornell-cli login` first.");
    }

    let outcome = app.block_on(app.scheduler.sync_from_remote())?;
    print_sync_outcome(&outcome, format, false)
}

pub fn run_save(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    app.require_drive()?;

    let outcome = app.block_on(app.scheduler.save());
    let status = app.scheduler.status();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "outcome": outcome.as_ref().ok(),
                "status": status,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => match outcome {
            Ok(SaveOutcome::NotSignedIn) => println!("Not signed in. Run `cornell-cli login` first."),
            Ok(_) => {
                if let Some(line) = terminal::indicator_line(&status, use_color) {
                    println!("{}", line);
                }
            }
            Err(_) => {
                if let Some(line) = terminal::indicator_line(&status, use_color) {
                    eprintln!("{}", line);
                }
            }
        },
    }

    outcome.map(|_| ()).map_err(Into::into)
}

pub fn run_status(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let status = app.scheduler.status();
    let (notes, folders) = {
        let workspace = app.workspace();
        (workspace.notes().len(), workspace.folders().len())
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "dataDir": app.data_dir.to_string_lossy(),
                "driveAvailable": app.drive_available(),
                "remoteFolder": app.config.sync.folder_name,
                "remoteFile": app.config.sync.file_name,
                "notes": notes,
                "folders": folders,
                "status": status,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Data directory: {}", app.data_dir.display());
            println!("Notes: {}  Folders: {}", notes, folders);

            if let Err(e) = app.require_drive() {
                println!("Google Drive: unavailable ({})", e);
                return Ok(());
            }
            let signed_in = if status.signed_in {
                paint("signed in", Color::GREEN, use_color)
            } else {
                paint("signed out", Color::GRAY, use_color)
            };
            println!(
                "Google Drive: {} ({}/{})",
                signed_in, app.config.sync.folder_name, app.config.sync.file_name
            );
            match terminal::indicator_line(&status, use_color) {
                Some(line) => println!("Save status: {}", line),
                None => println!("Save status: up to date in this session"),
            }
        }
    }
    Ok(())
}

fn print_sync_outcome(outcome: &SyncOutcome, format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Plain => match outcome {
            SyncOutcome::Pulled { notes, folders } => println!(
                "{} {} note(s) and {} folder(s) from Google Drive",
                paint("Loaded", Color::GREEN, use_color),
                notes,
                folders
            ),
            SyncOutcome::AlreadySyncing => println!("A sync is already running"),
            SyncOutcome::Discarded => println!("Signed out during sync; nothing was loaded"),
        },
    }
    Ok(())
}
