use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use crate::tprintln;

use super::principal::Principal;

pub type SessionId = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> anyhow::Result<SessionId> {
    // 256-bit random id, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow::anyhow!("session id entropy unavailable: {}", e))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-memory cookie sessions. Cloning shares the underlying maps.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    user_index: Arc<RwLock<HashMap<i64, HashSet<SessionId>>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            user_index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn issue(&self, principal: Principal) -> anyhow::Result<Session> {
        let now = Instant::now();
        let sess = Session {
            session_id: gen_id()?,
            principal,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.session_id.clone(), sess.clone());
        self.user_index.write()
            .entry(sess.principal.user_id)
            .or_default()
            .insert(sess.session_id.clone());
        tprintln!("session.issue user={} ttl_secs={}", sess.principal.user_id, self.ttl.as_secs());
        Ok(sess)
    }

    /// Principal for a live session; expired entries are dropped on sight.
    pub fn validate(&self, session_id: &str) -> Option<Principal> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(session_id) {
                Some(s) if s.expires_at > now => return Some(s.principal.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired { self.remove(session_id); }
        None
    }

    pub fn logout(&self, session_id: &str) -> bool {
        self.remove(session_id)
    }

    /// Drop every session of a user. Returns how many were removed.
    pub fn revoke_user(&self, user_id: i64) -> usize {
        let ids = self.user_index.write().remove(&user_id).unwrap_or_default();
        let mut s = self.sessions.write();
        let count = ids.iter().filter(|id| s.remove(*id).is_some()).count();
        debug!(target: "publiceye::auth", "session.revoke user={} count={}", user_id, count);
        count
    }

    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<SessionId> = self.sessions.read().values()
            .filter(|s| s.expires_at <= now)
            .map(|s| s.session_id.clone())
            .collect();
        for id in &expired { self.remove(id); }
        expired.len()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn remove(&self, session_id: &str) -> bool {
        let Some(sess) = self.sessions.write().remove(session_id) else { return false; };
        let mut idx = self.user_index.write();
        if let Some(set) = idx.get_mut(&sess.principal.user_id) {
            set.remove(session_id);
            if set.is_empty() { idx.remove(&sess.principal.user_id); }
        }
        true
    }
}
