use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::Session;
use crate::errors::AppError;

pub type SharedSession = Arc<Mutex<Session>>;

struct Entry {
    session: SharedSession,
    last_seen: Instant,
}

/// In-memory registry of live sessions. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new, signed-out session and returns its id.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let entry = Entry {
            session: Arc::new(Mutex::new(Session::new(id))),
            last_seen: Instant::now(),
        };
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, entry);
        info!("Opened session {id} ({} live)", sessions.len());
        id
    }

    /// Looks up a session and marks it as recently used.
    pub async fn get(&self, id: Uuid) -> Result<SharedSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
        entry.last_seen = Instant::now();
        Ok(entry.session.clone())
    }

    /// Drops sessions unused for at least `ttl`. A session still referenced
    /// elsewhere, such as by a running upload, is kept. Returns how many were
    /// removed.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_seen.elapsed() < ttl || Arc::strong_count(&entry.session) > 1
        });
        before - sessions.len()
    }

    /// Runs `evict_idle` in the background every quarter of `ttl`.
    pub fn spawn_reaper(&self, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = (ttl / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let evicted = store.evict_idle(ttl).await;
                if evicted > 0 {
                    info!("Evicted {evicted} idle sessions");
                } else {
                    debug!("No idle sessions to evict");
                }
            }
        })
    }
}
