use chrono::{DateTime, Utc};
use log::info;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

/// A receiver registered through the offer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub id: String,
    pub endpoint: SocketAddr,
    /// Registration time. Recorded only; sessions never expire.
    pub last_seen: DateTime<Utc>,
}

impl ClientSession {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            id: format!("{:016x}", rand::random::<u64>()),
            endpoint,
            last_seen: Utc::now(),
        }
    }
}

/// The set of active receivers, shared between the offer endpoint and the distributor.
///
/// Registration replaces the whole set, so at most one receiver is active. Readers take a
/// snapshot under the lock and do their I/O after releasing it.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<Vec<ClientSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `endpoint` the only receiver and returns its new session.
    pub fn register(&self, endpoint: SocketAddr) -> ClientSession {
        let session = ClientSession::new(endpoint);

        let replaced = {
            let mut sessions = self.sessions.lock();
            let replaced = std::mem::take(&mut *sessions);
            sessions.push(session.clone());
            replaced
        };

        for old in &replaced {
            info!("Session {} ({}) replaced", old.id, old.endpoint);
        }
        info!("Session {} registered for {}", session.id, session.endpoint);

        session
    }

    pub fn snapshot(&self) -> Vec<ClientSession> {
        self.sessions.lock().clone()
    }

    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.sessions.lock().iter().map(|s| s.endpoint).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
