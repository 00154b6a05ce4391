//! Identity and session management for the publiceye API.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;

pub use principal::Principal;
pub use session::{Session, SessionId, SessionManager};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
