//! Save scheduling: tracks unsaved local changes, runs at most one upload
//! at a time, and replaces local state with the remote document once per
//! sign-in.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use super::config::{SaveStatus, SavingStatus, SyncSettings};
use super::remote::{RemoteDocument, RemoteSync, SyncError};
use crate::storage::{StorageError, Workspace};

/// Workspace shared between the scheduler and its callers
pub type SharedWorkspace = Arc<Mutex<Workspace>>;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Failed to save to Drive: {0}")]
    Sync(#[from] SyncError),
}

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveOutcome {
    Saved,
    /// Another save was already uploading
    AlreadySaving,
    /// A sync was running or had just finished
    SkippedWhileSyncing,
    NotSignedIn,
}

/// Result of a remote sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOutcome {
    /// Local state was replaced with the remote document
    Pulled { notes: usize, folders: usize },
    AlreadySyncing,
    /// The user signed out while the download was running
    Discarded,
}

#[derive(Debug, Default)]
struct SaveState {
    status: SavingStatus,
    has_unsaved_changes: bool,
    is_syncing: bool,
    error: Option<String>,
    /// Bumped on every recorded change
    revision: u64,
    /// Bumped on every save attempt and reset
    generation: u64,
}

struct Shared {
    state: Mutex<SaveState>,
    auth: watch::Receiver<bool>,
    status_tx: watch::Sender<SaveStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SaveState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self, state: &SaveState) -> SaveStatus {
        SaveStatus {
            status: state.status,
            has_unsaved_changes: state.has_unsaved_changes,
            is_syncing: state.is_syncing,
            signed_in: *self.auth.borrow(),
            error: state.error.clone(),
        }
    }

    /// Apply `f` to the state and publish the new status
    fn update<R>(&self, f: impl FnOnce(&mut SaveState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.status_tx.send_replace(self.snapshot(&state));
        result
    }
}

/// Marks an interrupted upload as failed so the flag cannot stay stuck
struct SavingGuard {
    shared: Arc<Shared>,
    generation: u64,
    armed: bool,
}

impl Drop for SavingGuard {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Save scheduler: save was interrupted");
            let generation = self.generation;
            self.shared.update(|state| {
                if state.status == SavingStatus::Saving && state.generation == generation {
                    state.status = SavingStatus::Error;
                    state.has_unsaved_changes = true;
                    state.error = Some("Save interrupted".to_string());
                }
            });
        }
    }
}

/// Keeps `is_syncing` set for the grace window after a sync, however it ends
struct SyncGuard {
    shared: Arc<Shared>,
    grace: std::time::Duration,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        let shared = self.shared.clone();
        let clear = move |shared: Arc<Shared>| shared.update(|state| state.is_syncing = false);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let grace = self.grace;
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    clear(shared);
                });
            }
            Err(_) => clear(shared),
        }
    }
}

/// Coordinates local edits, explicit saves and remote syncs
pub struct SaveScheduler {
    workspace: SharedWorkspace,
    remote: Arc<RemoteSync>,
    settings: SyncSettings,
    shared: Arc<Shared>,
}

impl SaveScheduler {
    pub fn new(workspace: SharedWorkspace, remote: Arc<RemoteSync>, settings: SyncSettings) -> Self {
        let auth = remote.subscribe();
        let (status_tx, _) = watch::channel(SaveStatus {
            signed_in: *auth.borrow(),
            ..SaveStatus::default()
        });

        Self {
            workspace,
            remote,
            settings,
            shared: Arc::new(Shared {
                state: Mutex::new(SaveState::default()),
                auth,
                status_tx,
            }),
        }
    }

    pub fn workspace(&self) -> &SharedWorkspace {
        &self.workspace
    }

    pub fn remote(&self) -> &Arc<RemoteSync> {
        &self.remote
    }

    pub fn status(&self) -> SaveStatus {
        let state = self.shared.lock();
        self.shared.snapshot(&state)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Apply a mutation to the workspace and record it as a local change
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut Workspace) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let result = {
            let mut workspace = self.lock_workspace();
            f(&mut workspace)?
        };
        self.record_local_change();
        Ok(result)
    }

    /// Flag unsaved changes. Ignored while signed out and while a sync is
    /// running or within its grace window. Returns whether the change was
    /// recorded.
    pub fn record_local_change(&self) -> bool {
        if !self.remote.is_signed_in() {
            return false;
        }

        self.shared.update(|state| {
            if state.is_syncing {
                log::debug!("Save scheduler: ignoring change applied during sync");
                return false;
            }
            state.has_unsaved_changes = true;
            state.revision += 1;
            true
        })
    }

    /// Upload the full local state.
    ///
    /// Only one upload runs at a time. On success the dirty flag is cleared
    /// unless another change landed during the upload, and the status shows
    /// saved for a while before reverting to idle.
    pub async fn save(&self) -> Result<SaveOutcome, SaveError> {
        if !self.remote.is_signed_in() {
            return Ok(SaveOutcome::NotSignedIn);
        }

        let started = self.shared.update(|state| {
            if state.is_syncing {
                return Err(SaveOutcome::SkippedWhileSyncing);
            }
            if state.status == SavingStatus::Saving {
                return Err(SaveOutcome::AlreadySaving);
            }
            state.status = SavingStatus::Saving;
            state.error = None;
            state.generation += 1;
            Ok((state.revision, state.generation))
        });
        let (revision, generation) = match started {
            Ok(started) => started,
            Err(outcome) => {
                log::debug!("Save scheduler: save skipped ({:?})", outcome);
                return Ok(outcome);
            }
        };

        let mut guard = SavingGuard {
            shared: self.shared.clone(),
            generation,
            armed: true,
        };

        let document = {
            let workspace = self.lock_workspace();
            RemoteDocument {
                notes: workspace.notes().to_vec(),
                folders: workspace.folders().to_vec(),
            }
        };
        let result = self.remote.push_local_state(&document).await;
        guard.armed = false;

        // A reset during the upload owns the state now
        match result {
            Ok(()) => {
                let current = self.shared.update(|state| {
                    if state.generation != generation {
                        return false;
                    }
                    state.status = SavingStatus::Saved;
                    if state.revision == revision {
                        state.has_unsaved_changes = false;
                    }
                    true
                });
                if current {
                    self.schedule_idle(generation);
                } else {
                    log::info!("Save scheduler: state was reset during upload");
                }
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                log::error!("Save scheduler: save failed: {}", e);
                self.shared.update(|state| {
                    if state.generation == generation {
                        state.status = SavingStatus::Error;
                        state.has_unsaved_changes = true;
                        state.error = Some(e.to_string());
                    }
                });
                Err(SaveError::Sync(e))
            }
        }
    }

    /// Replace local state with the remote document.
    ///
    /// Local edits made while this runs, and for the grace window after it
    /// ends, are not flagged as unsaved.
    pub async fn sync_from_remote(&self) -> Result<SyncOutcome, SyncError> {
        let already = self.shared.update(|state| std::mem::replace(&mut state.is_syncing, true));
        if already {
            return Ok(SyncOutcome::AlreadySyncing);
        }
        let _guard = SyncGuard {
            shared: self.shared.clone(),
            grace: self.settings.sync_grace(),
        };

        log::info!("Save scheduler: syncing from Drive");
        let document = self.remote.fetch_remote_state().await.map_err(|e| {
            log::error!("Save scheduler: failed to sync data from Drive: {}", e);
            e
        })?;

        if !self.remote.is_signed_in() {
            log::info!("Save scheduler: signed out during sync, discarding remote data");
            return Ok(SyncOutcome::Discarded);
        }

        let outcome = SyncOutcome::Pulled {
            notes: document.notes.len(),
            folders: document.folders.len(),
        };
        self.lock_workspace()
            .replace_all(document.notes, document.folders)?;
        self.shared.update(|state| {
            state.has_unsaved_changes = false;
            state.revision += 1;
        });

        log::info!("Save scheduler: sync complete {:?}", outcome);
        Ok(outcome)
    }

    /// React to a published auth state
    pub async fn handle_auth_change(&self, signed_in: bool) {
        if signed_in {
            // Failures are logged by sync_from_remote
            let _ = self.sync_from_remote().await;
        } else {
            self.reset();
        }
    }

    /// Sign out of Drive and drop all local state. Without an active
    /// session nothing is cleared. Returns whether a session was ended.
    pub async fn sign_out(&self) -> bool {
        let ended = self.remote.sign_out().await;
        if ended {
            self.reset();
        }
        ended
    }

    /// Clear the workspace and the save state after sign-out
    pub fn reset(&self) {
        if let Err(e) = self.lock_workspace().clear() {
            log::error!("Save scheduler: failed to clear local data: {}", e);
        }
        self.shared.update(|state| {
            state.status = SavingStatus::Idle;
            state.has_unsaved_changes = false;
            state.error = None;
            state.revision += 1;
            state.generation += 1;
        });
        log::info!("Save scheduler: local state cleared");
    }

    /// Revert "saved" to idle unless another save started meanwhile
    fn schedule_idle(&self, generation: u64) {
        let shared = self.shared.clone();
        let delay = self.settings.saved_display();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.update(|state| {
                if state.status == SavingStatus::Saved && state.generation == generation {
                    state.status = SavingStatus::Idle;
                }
            });
        });
    }

    fn lock_workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, Note};
    use crate::sync::testing::{test_config, MemoryDrive, ScriptedConsent};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    const SEEDED: &str = r#"{"notes":[{"id":"remote-1","title":"From Drive","blocks":[{"id":"b1","type":"content","title":"Main Notes","content":"remote"}],"createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z","folderId":null}],"folders":[]}"#;

    async fn setup(drive: Arc<MemoryDrive>, sign_in: bool) -> (TempDir, Arc<SaveScheduler>) {
        let dir = TempDir::new().unwrap();
        let config = test_config();
        let remote = Arc::new(RemoteSync::new(
            &config,
            KvStore::new(dir.path().to_path_buf()),
            drive,
            Arc::new(ScriptedConsent::granting()),
        ));
        remote.initialize().unwrap();
        if sign_in {
            remote.sign_in().await;
        }

        let workspace = Arc::new(Mutex::new(Workspace::open(dir.path().to_path_buf())));
        let scheduler = Arc::new(SaveScheduler::new(workspace, remote, config.sync));
        (dir, scheduler)
    }

    async fn wait_for_status(scheduler: &SaveScheduler, status: SavingStatus) {
        let mut rx = scheduler.subscribe_status();
        let _ = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.status == status))
            .await
            .expect("status not reached");
    }

    #[tokio::test]
    async fn test_local_change_marks_unsaved() {
        let (_dir, scheduler) = setup(Arc::new(MemoryDrive::new()), true).await;

        scheduler.edit(|ws| ws.create_note(None)).unwrap();

        let status = scheduler.status();
        assert!(status.has_unsaved_changes);
        assert!(status.signed_in);
        assert_eq!(status.indicator(), Some("Unsaved changes"));
    }

    #[tokio::test]
    async fn test_changes_ignored_while_signed_out() {
        let (_dir, scheduler) = setup(Arc::new(MemoryDrive::new()), false).await;

        scheduler.edit(|ws| ws.create_note(None)).unwrap();

        assert!(!scheduler.status().has_unsaved_changes);
        assert_eq!(scheduler.save().await.unwrap(), SaveOutcome::NotSignedIn);
        assert_eq!(scheduler.workspace().lock().unwrap().notes().len(), 1);
    }

    #[tokio::test]
    async fn test_save_uploads_and_reverts_to_idle() {
        let drive = Arc::new(MemoryDrive::new());
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        let note = scheduler.edit(|ws| ws.create_note(None)).unwrap();

        assert_eq!(scheduler.save().await.unwrap(), SaveOutcome::Saved);

        let status = scheduler.status();
        assert_eq!(status.status, SavingStatus::Saved);
        assert!(!status.has_unsaved_changes);
        let uploaded = RemoteDocument::parse(&drive.content_of("app-data.cornell").unwrap()).unwrap();
        assert_eq!(uploaded.notes, vec![note]);

        wait_for_status(&scheduler, SavingStatus::Idle).await;
        assert_eq!(scheduler.status().indicator(), None);
    }

    #[tokio::test]
    async fn test_single_save_in_flight() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();
        drive.hold_uploads();

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.save().await }
        });
        wait_for_status(&scheduler, SavingStatus::Saving).await;

        assert_eq!(scheduler.save().await.unwrap(), SaveOutcome::AlreadySaving);

        drive.release_uploads();
        assert_eq!(first.await.unwrap().unwrap(), SaveOutcome::Saved);
        assert_eq!(drive.upload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_change_during_upload_stays_unsaved() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();
        drive.hold_uploads();

        let save = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.save().await }
        });
        wait_for_status(&scheduler, SavingStatus::Saving).await;
        scheduler.edit(|ws| ws.create_folder("Late", None)).unwrap();
        drive.release_uploads();
        save.await.unwrap().unwrap();

        let status = scheduler.status();
        assert_eq!(status.status, SavingStatus::Saved);
        assert!(status.has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_changes_and_allows_retry() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();
        drive.fail_uploads.store(true, Ordering::SeqCst);

        assert!(scheduler.save().await.is_err());
        let status = scheduler.status();
        assert_eq!(status.status, SavingStatus::Error);
        assert!(status.has_unsaved_changes);
        assert!(status.error.is_some());
        assert_eq!(status.indicator(), Some("Error saving"));

        drive.fail_uploads.store(false, Ordering::SeqCst);
        assert_eq!(scheduler.save().await.unwrap(), SaveOutcome::Saved);
        assert!(scheduler.status().error.is_none());
    }

    #[tokio::test]
    async fn test_interrupted_save_does_not_stay_saving() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        drive.hold_uploads();

        let save = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.save().await }
        });
        wait_for_status(&scheduler, SavingStatus::Saving).await;
        save.abort();
        let _ = save.await;

        let status = scheduler.status();
        assert_eq!(status.status, SavingStatus::Error);
        assert!(status.has_unsaved_changes);
        drive.release_uploads();
    }

    #[tokio::test]
    async fn test_sync_replaces_local_state() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive, true).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();

        let outcome = scheduler.sync_from_remote().await.unwrap();

        assert_eq!(outcome, SyncOutcome::Pulled { notes: 1, folders: 0 });
        let notes: Vec<Note> = scheduler.workspace().lock().unwrap().notes().to_vec();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, "remote-1");
        assert!(!scheduler.status().has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_changes_in_sync_grace_window_are_ignored() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive, true).await;

        scheduler.sync_from_remote().await.unwrap();
        assert!(scheduler.status().is_syncing);
        scheduler.edit(|ws| ws.rename_note("remote-1", "Renamed")).unwrap();
        assert!(!scheduler.status().has_unsaved_changes);
        assert_eq!(scheduler.save().await.unwrap(), SaveOutcome::SkippedWhileSyncing);

        let mut rx = scheduler.subscribe_status();
        let _ = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.is_syncing))
            .await
            .unwrap();
        scheduler.edit(|ws| ws.rename_note("remote-1", "Again")).unwrap();
        assert!(scheduler.status().has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let drive = Arc::new(MemoryDrive::new());
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        scheduler.edit(|ws| ws.create_folder("Physics", None)).unwrap();
        scheduler.edit(|ws| ws.create_note(None)).unwrap();

        assert!(scheduler.sign_out().await);

        let status = scheduler.status();
        assert!(!status.signed_in);
        assert!(!status.has_unsaved_changes);
        assert_eq!(status.status, SavingStatus::Idle);
        let workspace = scheduler.workspace().lock().unwrap();
        assert!(workspace.notes().is_empty());
        assert!(workspace.folders().is_empty());
        assert!(drive.revoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sign_out_during_upload_stays_cleared() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();
        drive.fail_uploads.store(true, Ordering::SeqCst);
        drive.hold_uploads();

        let save = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.save().await }
        });
        wait_for_status(&scheduler, SavingStatus::Saving).await;
        assert!(scheduler.sign_out().await);
        drive.release_uploads();
        assert!(save.await.unwrap().is_err());

        let status = scheduler.status();
        assert_eq!(status.status, SavingStatus::Idle);
        assert!(!status.has_unsaved_changes);
        assert!(status.error.is_none());
        assert_eq!(status.indicator(), None);
        assert!(scheduler.workspace().lock().unwrap().notes().is_empty());
    }

    #[tokio::test]
    async fn test_successful_upload_after_sign_out_stays_idle() {
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(SEEDED);
        let (_dir, scheduler) = setup(drive.clone(), true).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();
        drive.hold_uploads();

        let save = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.save().await }
        });
        wait_for_status(&scheduler, SavingStatus::Saving).await;
        scheduler.sign_out().await;
        drive.release_uploads();
        save.await.unwrap().unwrap();

        let status = scheduler.status();
        assert_eq!(status.status, SavingStatus::Idle);
        assert!(!status.has_unsaved_changes);
    }

    #[tokio::test]
    async fn test_sign_out_without_session_keeps_local_notes() {
        let drive = Arc::new(MemoryDrive::new());
        let (_dir, scheduler) = setup(drive.clone(), false).await;
        scheduler.edit(|ws| ws.create_note(None)).unwrap();

        assert!(!scheduler.sign_out().await);

        assert_eq!(scheduler.workspace().lock().unwrap().notes().len(), 1);
        assert!(!drive.revoked.load(Ordering::SeqCst));
    }
}
