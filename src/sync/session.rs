use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::scheduler::SaveScheduler;

/// Messages to control the session loop
#[derive(Debug)]
pub enum SessionMessage {
    /// Save now
    Save,
    /// Pull the remote document again
    Resync,
    /// App closing
    Shutdown,
}

/// Handle for the background session loop
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Request a save from the loop
    pub fn save(&self) {
        let _ = self.sender.try_send(SessionMessage::Save);
    }

    pub fn resync(&self) {
        let _ = self.sender.try_send(SessionMessage::Resync);
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.sender.send(SessionMessage::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Start the session loop.
///
/// Follows the auth channel: every sign-in triggers exactly one sync from
/// the remote document, every sign-out clears local state. A signed-in
/// state that is already current when the loop starts (a restored token)
/// counts as a sign-in.
pub fn start_session(scheduler: Arc<SaveScheduler>, auth: watch::Receiver<bool>) -> SessionHandle {
    let (tx, rx) = mpsc::channel(32);
    let task = tokio::spawn(session_loop(scheduler, auth, rx));
    SessionHandle { sender: tx, task }
}

async fn session_loop(
    scheduler: Arc<SaveScheduler>,
    mut auth: watch::Receiver<bool>,
    mut receiver: mpsc::Receiver<SessionMessage>,
) {
    log::info!("Session: started");

    let signed_in = *auth.borrow_and_update();
    if signed_in {
        scheduler.handle_auth_change(true).await;
    }

    loop {
        tokio::select! {
            changed = auth.changed() => {
                if changed.is_err() {
                    log::debug!("Session: auth channel closed");
                    break;
                }
                let signed_in = *auth.borrow_and_update();
                log::info!("Session: auth state changed, signed_in={}", signed_in);
                scheduler.handle_auth_change(signed_in).await;
            }
            msg = receiver.recv() => {
                match msg {
                    Some(SessionMessage::Save) => {
                        if let Err(e) = scheduler.save().await {
                            log::error!("Session: save failed: {}", e);
                        }
                    }
                    Some(SessionMessage::Resync) => {
                        let _ = scheduler.sync_from_remote().await;
                    }
                    Some(SessionMessage::Shutdown) | None => {
                        log::info!("Session: shutting down");
                        break;
                    }
                }
            }
        }
    }
}
