//! Registry of live sessions
//!
//! Tracks every session started through it so a host can enumerate and kill
//! them, and refuses new sessions once shutdown began.

use crate::error::{Error, Result};
use crate::options::RunnerOptions;
use crate::session::{self, Session, SessionHandle};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Starts sessions and keeps handles to the live ones.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    shutting_down: Arc<AtomicBool>,
}

impl SessionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and register it until it exits.
    pub async fn start<I, S>(
        &self,
        command: &str,
        args: I,
        options: RunnerOptions,
    ) -> Result<Session>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let session = session::start(command, args, options)?;
        let handle = session.handle();
        let id = handle.id().to_string();
        {
            let mut sessions = self.sessions.write().await;
            // shutdown_all may have collected its handles while this one spawned
            if self.shutting_down.load(Ordering::SeqCst) {
                drop(sessions);
                drop(session);
                handle.kill().await?;
                return Err(Error::ShuttingDown);
            }
            sessions.insert(id.clone(), handle.clone());
        }

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            handle.wait_exited().await;
            sessions.write().await.remove(&id);
        });

        Ok(session)
    }

    /// Handle of a live session.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Identifiers of live sessions.
    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Number of live sessions.
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Kill one session. Unknown ids are a no-op.
    pub async fn kill(&self, id: &str) -> Result<()> {
        match self.get(id).await {
            Some(handle) => handle.kill().await,
            None => Ok(()),
        }
    }

    /// Refuse new sessions and kill every live one.
    pub async fn shutdown_all(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        info!(count = handles.len(), "Shutting down sessions");
        futures::future::join_all(handles.iter().map(SessionHandle::kill)).await;
        self.sessions.write().await.clear();
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
