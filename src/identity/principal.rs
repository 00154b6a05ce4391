use serde::{Deserialize, Serialize};

use crate::storage::User;

/// The authenticated caller as seen by handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl From<&User> for Principal {
    fn from(u: &User) -> Self {
        Self { user_id: u.id, email: u.email.clone(), is_staff: u.is_staff, is_superuser: u.is_superuser }
    }
}
