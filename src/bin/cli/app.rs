use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context, Result};

use cornell_lib::config::AppConfig;
use cornell_lib::storage::{Folder, KvStore, Note, NoteBlock, StorageError, Workspace};
use cornell_lib::sync::{InitError, RemoteSync, SaveOutcome, SaveScheduler};

/// Shared application state for CLI commands
pub struct App {
    pub data_dir: PathBuf,
    pub config: AppConfig,
    pub scheduler: Arc<SaveScheduler>,
    /// Why Drive sync is unavailable, if it is
    init_error: Option<InitError>,
    save_after_change: bool,
    runtime: tokio::runtime::Runtime,
}

impl App {
    /// Open the workspace and set up the Drive adapter
    pub fn new(data_dir: Option<PathBuf>, save_after_change: bool) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => Workspace::default_data_dir().context("Failed to get data directory")?,
        };
        let config = AppConfig::load(&data_dir).context("Failed to load config.toml")?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let store = KvStore::new(data_dir.clone());
        let remote = RemoteSync::google(&config, store, |url| {
            eprintln!("Open this URL in your browser to sign in:\n\n  {}\n", url);
        })
        .context("Failed to create Drive client")?;

        let init_error = match remote.initialize() {
            Ok(_) => None,
            Err(e) => {
                log::warn!("Drive sync unavailable: {}", e);
                Some(e)
            }
        };

        let workspace = Arc::new(Mutex::new(Workspace::open(data_dir.clone())));
        let scheduler = Arc::new(SaveScheduler::new(
            workspace,
            Arc::new(remote),
            config.sync.clone(),
        ));

        Ok(Self {
            data_dir,
            config,
            scheduler,
            init_error,
            save_after_change,
            runtime,
        })
    }

    pub fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.scheduler
            .workspace()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Run a future on the CLI runtime
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Fail with the user-facing message when Drive sync is unavailable
    pub fn require_drive(&self) -> Result<()> {
        match &self.init_error {
            Some(e) => bail!("{}", e.user_message()),
            None => Ok(()),
        }
    }

    pub fn drive_available(&self) -> bool {
        self.init_error.is_none()
    }

    /// Apply a change, then save to Drive when `--save` was given
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut Workspace) -> std::result::Result<R, StorageError>,
    ) -> Result<R> {
        let result = self.scheduler.edit(f)?;
        if self.save_after_change {
            match self.block_on(self.scheduler.save()) {
                Ok(SaveOutcome::NotSignedIn) => eprintln!("Not signed in; change kept locally"),
                Ok(_) => {}
                Err(e) => eprintln!("Error saving: {}", e),
            }
        }
        Ok(result)
    }

    /// Find a note by id prefix or title (case-insensitive prefix match)
    pub fn find_note(&self, query: &str) -> Result<Note> {
        let workspace = self.workspace();
        let notes = workspace.notes();

        if let Some(note) = notes.iter().find(|n| n.id == query) {
            return Ok(note.clone());
        }

        let query_lower = query.to_lowercase();
        if let Some(note) = notes.iter().find(|n| n.title.to_lowercase() == query_lower) {
            return Ok(note.clone());
        }

        let matches: Vec<&Note> = notes
            .iter()
            .filter(|n| n.title.to_lowercase().starts_with(&query_lower) || n.id.starts_with(query))
            .collect();

        match matches.len() {
            0 => bail!("No note matching '{}'", query),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous note '{}'. Matches:\n{}",
                query,
                matches
                    .iter()
                    .map(|n| format!("  - {} ({})", n.title, &n.id[..8.min(n.id.len())]))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }

    /// Find a folder by name (case-insensitive prefix match)
    pub fn find_folder(&self, name: &str) -> Result<Folder> {
        let workspace = self.workspace();
        let folders = workspace.folders();
        let name_lower = name.to_lowercase();

        if let Some(f) = folders.iter().find(|f| f.name.to_lowercase() == name_lower) {
            return Ok(f.clone());
        }

        let matches: Vec<&Folder> = folders
            .iter()
            .filter(|f| f.name.to_lowercase().starts_with(&name_lower))
            .collect();

        match matches.len() {
            0 => bail!(
                "No folder matching '{}'. Available folders:\n{}",
                name,
                folders
                    .iter()
                    .map(|f| format!("  - {}", f.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous folder name '{}'. Matches:\n{}",
                name,
                matches
                    .iter()
                    .map(|f| format!("  - {}", f.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }

    /// Find a block by its 1-based position or by id prefix
    pub fn find_block(note: &Note, query: &str) -> Result<NoteBlock> {
        if let Ok(position) = query.parse::<usize>() {
            if position >= 1 && position <= note.blocks.len() {
                return Ok(note.blocks[position - 1].clone());
            }
        }

        let matches: Vec<&NoteBlock> = note.blocks.iter().filter(|b| b.id.starts_with(query)).collect();
        match matches.len() {
            0 => bail!("No block matching '{}' in note \"{}\"", query, note.title),
            1 => Ok(matches[0].clone()),
            _ => bail!("Ambiguous block id '{}'", query),
        }
    }
}
