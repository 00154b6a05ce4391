use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::SharedStore;
use crate::tprintln;

use super::principal::Principal;
use super::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Result of a successful register or login: the API token plus a fresh cookie session.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub principal: Principal,
    pub token: String,
    pub session: Session,
}

pub trait AuthProvider: Send + Sync {
    /// Create an account (with its profile and token) and open a session.
    fn register(&self, req: &LoginRequest, admin: bool) -> AppResult<LoginResponse>;
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
    fn authenticate_token(&self, key: &str) -> AppResult<Principal>;
    fn authenticate_session(&self, session_id: &str) -> Option<Principal>;
    /// Delete the caller's token and drop its sessions.
    fn logout(&self, principal: &Principal) -> AppResult<()>;
    fn delete_user(&self, principal: &Principal) -> AppResult<()>;
}

/// Provider backed by the local JSON store and the in-memory session map.
pub struct LocalAuthProvider {
    pub store: SharedStore,
    pub sm: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, sm: SessionManager) -> Self { Self { store, sm } }

    fn open_session(&self, principal: Principal, token: String) -> AppResult<LoginResponse> {
        let session = self.sm.issue(principal.clone())?;
        Ok(LoginResponse { principal, token, session })
    }
}

fn invalid_credentials() -> AppError {
    AppError::not_found("invalid_credentials", "Invalid credentials.")
}

impl AuthProvider for LocalAuthProvider {
    fn register(&self, req: &LoginRequest, admin: bool) -> AppResult<LoginResponse> {
        let email = security::normalize_email(&req.email);
        self.store.0.lock().check_new_user(&email, &req.password)?;
        // Argon2 runs without the store lock held.
        let password_hash = security::hash_password(&req.password)?;
        let (principal, token) = {
            let mut guard = self.store.0.lock();
            let user = guard.insert_user(&email, password_hash, admin, admin)?;
            let (token, _) = guard.get_or_create_token(user.id)?;
            (Principal::from(&user), token.key)
        };
        info!(target: "publiceye::auth", "registered user id={} admin={}", principal.user_id, admin);
        self.open_session(principal, token)
    }

    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let email = security::normalize_email(&req.email);
        let user = {
            let guard = self.store.0.lock();
            guard.user_by_email(&email).cloned()
        };
        // Argon2 verification runs outside the store lock.
        let Some(user) = user.filter(|u| u.is_active) else {
            debug!(target: "publiceye::auth", "login rejected: unknown or inactive account");
            return Err(invalid_credentials());
        };
        if !security::verify_password(&user.password_hash, &req.password) {
            debug!(target: "publiceye::auth", "login rejected: bad password user id={}", user.id);
            return Err(invalid_credentials());
        }
        let (token, created) = self.store.0.lock().get_or_create_token(user.id)?;
        tprintln!("auth.login user={} new_token={}", user.id, created);
        info!(target: "publiceye::auth", "login user id={}", user.id);
        self.open_session(Principal::from(&user), token.key)
    }

    fn authenticate_token(&self, key: &str) -> AppResult<Principal> {
        let guard = self.store.0.lock();
        match guard.user_for_token(key) {
            Some(u) if u.is_active => Ok(Principal::from(u)),
            _ => Err(AppError::auth("invalid_token", "Invalid token.")),
        }
    }

    fn authenticate_session(&self, session_id: &str) -> Option<Principal> {
        let principal = self.sm.validate(session_id)?;
        // Flags may have changed since the session was issued; re-read the row.
        let guard = self.store.0.lock();
        guard.user(principal.user_id).filter(|u| u.is_active).map(Principal::from)
    }

    fn logout(&self, principal: &Principal) -> AppResult<()> {
        let key = {
            let mut guard = self.store.0.lock();
            let key = guard.token_for_user(principal.user_id).map(|t| t.key.clone());
            if let Some(k) = &key { guard.delete_token(k)?; }
            key
        };
        let sessions = self.sm.revoke_user(principal.user_id);
        info!(target: "publiceye::auth", "logout user id={} token_deleted={} sessions={}", principal.user_id, key.is_some(), sessions);
        Ok(())
    }

    fn delete_user(&self, principal: &Principal) -> AppResult<()> {
        let removed = self.store.0.lock().delete_user(principal.user_id)?;
        if !removed {
            warn!(target: "publiceye::auth", "delete_user: user id={} already gone", principal.user_id);
            return Err(AppError::not_found("not_found", "Not found."));
        }
        self.sm.revoke_user(principal.user_id);
        info!(target: "publiceye::auth", "deleted user id={}", principal.user_id);
        Ok(())
    }
}
