//! Fitment sessions.
//!
//! A session is one user's walk through the cascade. Its state lives in a
//! dedicated actor task; the store only keeps handles to those actors.
//!
//! # Architecture
//!
//! - [`SessionHandle`]: cloneable sender side of a session actor
//! - [`SessionStore`]: thread-safe map of live sessions with idle expiry
//! - [`SessionView`]: serializable snapshot returned to clients

mod actor;
mod view;

pub use actor::{SessionDeps, SessionHandle};
pub use view::{
    ModificationOption, PositionOption, SessionView, StageOptions, TOP_BRANDS, order_brands,
    order_positions,
};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

/// Shortest interval between idle sweeps.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Thread-safe store for session actors.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    deps: SessionDeps,
}

impl SessionStore {
    #[must_use]
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                deps,
            }),
        }
    }

    /// Start a new session. Must be called from within a tokio runtime.
    pub fn create(&self) -> SessionHandle {
        let id = Uuid::new_v4().to_string();
        let handle = SessionHandle::spawn(id.clone(), self.inner.deps.clone());
        self.write().insert(id.clone(), handle.clone());
        tracing::info!(name: "session.created", session_id = %id, "Session created");
        handle
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.read().get(id).cloned()
    }

    /// Drop a session. Its actor stops once in-flight requests release their handles.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            tracing::info!(name: "session.removed", session_id = %id, "Session removed");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every session idle for longer than `timeout`. Returns how many went.
    pub fn prune_idle(&self, timeout: Duration) -> usize {
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|_, handle| handle.idle_for() <= timeout);
        let pruned = before - guard.len();
        drop(guard);

        if pruned > 0 {
            tracing::info!(name: "session.pruned", count = pruned, "Pruned idle sessions");
        }
        pruned
    }

    /// Run [`prune_idle`](Self::prune_idle) periodically until the task is aborted.
    pub fn spawn_idle_sweep(&self, timeout: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = (timeout / 4).max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.prune_idle(timeout);
            }
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionHandle>> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
