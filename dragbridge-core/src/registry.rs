//! The set of file-promise transfers in flight, grouped by drag session.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::NotFoundError;
use crate::task::{DeliveryState, DeliveryTask};
use crate::util::lock;

/// Maps drag session ids to their delivery tasks.
///
/// File names are unique within a session. The map is guarded by a mutex; tasks are always
/// closed or abandoned after the lock is released, since doing so may call back into the OS or
/// the host application.
#[derive(Default)]
pub struct TransferRegistry {
    sessions: Mutex<HashMap<String, Vec<Arc<DeliveryTask>>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `tasks` with `session_id`, replacing whatever the session held before.
    ///
    /// Replaced tasks are abandoned. Returns how many were replaced.
    pub fn register(&self, session_id: &str, tasks: Vec<Arc<DeliveryTask>>) -> usize {
        debug!(session_id, count = tasks.len(), "registering transfers");
        let replaced = lock(&self.sessions).insert(session_id.to_owned(), tasks).unwrap_or_default();

        for task in &replaced {
            if task.state() == DeliveryState::Streaming {
                warn!(session_id, file_name = task.file_name(), "replacing a transfer still streaming");
            }
            task.abandon();
        }
        replaced.len()
    }

    pub fn find(&self, session_id: &str, file_name: &str) -> Result<Arc<DeliveryTask>, NotFoundError> {
        let sessions = lock(&self.sessions);
        let tasks = sessions.get(session_id).ok_or_else(|| NotFoundError::session(session_id))?;
        tasks
            .iter()
            .find(|task| task.file_name() == file_name)
            .cloned()
            .ok_or_else(|| NotFoundError::file(session_id, file_name))
    }

    /// Remove the task of `file_name`, and the session itself once it has no tasks left.
    pub fn remove_completed(&self, session_id: &str, file_name: &str) -> Result<Arc<DeliveryTask>, NotFoundError> {
        let mut sessions = lock(&self.sessions);
        let tasks = sessions.get_mut(session_id).ok_or_else(|| NotFoundError::session(session_id))?;
        let index = tasks
            .iter()
            .position(|task| task.file_name() == file_name)
            .ok_or_else(|| NotFoundError::file(session_id, file_name))?;

        let task = tasks.remove(index);
        if tasks.is_empty() {
            sessions.remove(session_id);
        }
        debug!(session_id, file_name, "removed completed transfer");
        Ok(task)
    }

    /// Drop every task of `session_id`, finished or not.
    ///
    /// Used when a drag ends inside the originating window: the OS never asks for promised files
    /// that were moved within the application. Returns the discarded tasks, all closed.
    pub fn discard(&self, session_id: &str) -> Vec<Arc<DeliveryTask>> {
        let discarded = lock(&self.sessions).remove(session_id).unwrap_or_default();
        for task in &discarded {
            task.abandon();
        }
        if !discarded.is_empty() {
            debug!(session_id, count = discarded.len(), "discarded transfers");
        }
        discarded
    }

    pub fn contains(&self, session_id: &str, file_name: &str) -> bool {
        self.find(session_id, file_name).is_ok()
    }

    /// Number of tasks registered under `session_id`.
    pub fn session_len(&self, session_id: &str) -> usize {
        lock(&self.sessions).get(session_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.sessions).is_empty()
    }

    /// Reset the idle clock of every open task registered under `session_id`.
    pub fn keep_alive(&self, session_id: &str) {
        let tasks = lock(&self.sessions).get(session_id).cloned().unwrap_or_default();
        for task in tasks {
            task.keep_alive();
        }
    }

    /// Expire and remove every task idle for longer than `timeout` at `now`.
    ///
    /// Returns the tasks that were reaped.
    pub fn reap_stalled(&self, timeout: Duration, now: Instant) -> Vec<Arc<DeliveryTask>> {
        let mut stalled = Vec::new();
        {
            let mut sessions = lock(&self.sessions);
            sessions.retain(|_, tasks| {
                tasks.retain(|task| {
                    if task.idle_for(now) > timeout {
                        stalled.push(task.clone());
                        false
                    } else {
                        true
                    }
                });
                !tasks.is_empty()
            });
        }

        for task in &stalled {
            warn!(
                session_id = task.session_id(),
                file_name = task.file_name(),
                state = ?task.state(),
                "reaping stalled transfer"
            );
            task.expire();
        }
        stalled
    }
}

impl fmt::Debug for TransferRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sessions = lock(&self.sessions);
        f.debug_map()
            .entries(sessions.iter().map(|(id, tasks)| {
                (id, tasks.iter().map(|task| task.file_name()).collect::<Vec<_>>())
            }))
            .finish()
    }
}
