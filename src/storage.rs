//!
//! publiceye storage module
//! ------------------------
//! Relational rows for users, profiles, affiliations and auth tokens, kept in
//! memory and persisted as one pretty-printed JSON file per table under the
//! configured data root (`users.json`, `profiles.json`, `affiliations.json`,
//! `tokens.json`).
//!
//! Key responsibilities:
//! - Auto-increment ids and the one-to-one user/profile/token links.
//! - Cascading deletes (user -> profile, token).
//! - Field validation that needs table access (email and category uniqueness,
//!   affiliation references).
//! - Write-through persistence: every mutation rewrites the touched tables via
//!   a temp file and rename. A failed write rolls the in-memory tables back.
//!
//! The public API centers around `Store`, wrapped in a thread-safe
//! `SharedStore` (`Arc<Mutex<Store>>`) by the server.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, FieldErrors};
use crate::security;

/// Party labels installed into an empty affiliation catalog on first start.
pub const DEFAULT_AFFILIATIONS: &[&str] = &[
    "Democratic Party",
    "Republican Party",
    "Libertarian Party",
    "Green Party",
    "Constitution Party",
    "American Independent Party",
    "Peace and Freedom Party",
    "Working Families Party",
    "Independence Party of America",
    "Reform Party",
    "American Solidarity Party",
    "Unity Party of America",
    "Modern Whig Party",
    "Alaskan Independence Party",
    "California National Party",
    "New York State Right to Life Party",
    "Vermont Progressive Party",
    "Rhode Island Moderate Party",
    "Independent American Party",
    "Progressive Party",
    "Socialist Party USA",
    "Party for Socialism and Liberation",
    "American Party",
    "Justice Party",
    "Natural Law Party",
    "Prohibition Party",
    "Transhumanist Party",
    "Pirate Party",
    "American Heritage Party",
    "U.S. Marijuana Party",
    "Veterans Party of America",
    "Conservative Party USA",
    "America First Party",
    "Communist Party USA",
    "American Freedom Party",
    "Christian Liberty Party",
    "Citizens Party of the United States",
    "Independent",
    "Unaffiliated",
    "Nonpartisan",
];

fn default_true() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Also the login name.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub affiliations: BTreeSet<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    pub id: i64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub key: String,
    pub user_id: i64,
    pub created: DateTime<Utc>,
}

/// Partial profile update. `display_name: Some(None)` clears the name.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub display_name: Option<Option<String>>,
    /// Replaces the whole set when non-empty; empty or `None` leaves it untouched.
    pub affiliations: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table { Users, Profiles, Affiliations, Tokens }

impl Table {
    fn file_name(self) -> &'static str {
        match self {
            Table::Users => "users.json",
            Table::Profiles => "profiles.json",
            Table::Affiliations => "affiliations.json",
            Table::Tokens => "tokens.json",
        }
    }
}

/// Pre-mutation copy of the tables a write touches.
struct Snapshot {
    users: Option<BTreeMap<i64, User>>,
    profiles: Option<BTreeMap<i64, Profile>>,
    affiliations: Option<BTreeMap<i64, Affiliation>>,
    tokens: Option<BTreeMap<String, Token>>,
    next_ids: (i64, i64, i64),
}

pub struct Store {
    root: PathBuf,
    users: BTreeMap<i64, User>,
    profiles: BTreeMap<i64, Profile>,
    affiliations: BTreeMap<i64, Affiliation>,
    tokens: BTreeMap<String, Token>,
    next_user_id: i64,
    next_profile_id: i64,
    next_affiliation_id: i64,
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() { return Ok(Vec::new()); }
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.iter().all(|b| b.is_ascii_whitespace()) { return Ok(Vec::new()); }
    let rows = serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    Ok(rows)
}

fn next_id<'a>(ids: impl Iterator<Item = &'a i64>) -> i64 {
    ids.max().copied().unwrap_or(0) + 1
}

impl Store {
    /// Open (or create) the store rooted at `root`, loading any existing tables.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create or access data root: {}", root.display()))?;

        let users: Vec<User> = read_table(&root.join(Table::Users.file_name()))?;
        let profiles: Vec<Profile> = read_table(&root.join(Table::Profiles.file_name()))?;
        let affiliations: Vec<Affiliation> = read_table(&root.join(Table::Affiliations.file_name()))?;
        let tokens: Vec<Token> = read_table(&root.join(Table::Tokens.file_name()))?;

        let users: BTreeMap<i64, User> = users.into_iter().map(|u| (u.id, u)).collect();
        // Drop rows whose owner no longer exists (e.g. hand-edited files).
        let profiles: BTreeMap<i64, Profile> = profiles.into_iter()
            .filter(|p| users.contains_key(&p.user_id))
            .map(|p| (p.id, p))
            .collect();
        let tokens: BTreeMap<String, Token> = tokens.into_iter()
            .filter(|t| users.contains_key(&t.user_id))
            .map(|t| (t.key.clone(), t))
            .collect();
        let affiliations: BTreeMap<i64, Affiliation> = affiliations.into_iter().map(|a| (a.id, a)).collect();

        info!(
            target: "publiceye::storage",
            "store opened root='{}' users={} profiles={} affiliations={} tokens={}",
            root.display(), users.len(), profiles.len(), affiliations.len(), tokens.len()
        );

        Ok(Self {
            next_user_id: next_id(users.keys()),
            next_profile_id: next_id(profiles.keys()),
            next_affiliation_id: next_id(affiliations.keys()),
            root,
            users,
            profiles,
            affiliations,
            tokens,
        })
    }

    fn write_rows<T: Serialize>(&self, table: Table, rows: Vec<&T>) -> Result<()> {
        let path = self.root.join(table.file_name());
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&rows)?;
        fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        debug!(target: "publiceye::storage", "persisted table='{}' rows={}", table.file_name(), rows.len());
        Ok(())
    }

    fn snapshot(&self, tables: &[Table]) -> Snapshot {
        Snapshot {
            users: tables.contains(&Table::Users).then(|| self.users.clone()),
            profiles: tables.contains(&Table::Profiles).then(|| self.profiles.clone()),
            affiliations: tables.contains(&Table::Affiliations).then(|| self.affiliations.clone()),
            tokens: tables.contains(&Table::Tokens).then(|| self.tokens.clone()),
            next_ids: (self.next_user_id, self.next_profile_id, self.next_affiliation_id),
        }
    }

    fn restore(&mut self, snap: Snapshot) {
        if let Some(users) = snap.users { self.users = users; }
        if let Some(profiles) = snap.profiles { self.profiles = profiles; }
        if let Some(affiliations) = snap.affiliations { self.affiliations = affiliations; }
        if let Some(tokens) = snap.tokens { self.tokens = tokens; }
        (self.next_user_id, self.next_profile_id, self.next_affiliation_id) = snap.next_ids;
    }

    /// Persist `tables`. On failure memory is rolled back to `snap` and the
    /// tables are rewritten from it, so memory never runs ahead of disk.
    fn commit(&mut self, tables: &[Table], snap: Snapshot) -> Result<()> {
        let Err(err) = self.persist(tables) else { return Ok(()); };
        self.restore(snap);
        if let Err(again) = self.persist(tables) {
            warn!(target: "publiceye::storage", "rollback rewrite failed: {:#}", again);
        }
        warn!(target: "publiceye::storage", "mutation rolled back: {:#}", err);
        Err(err)
    }

    fn persist(&self, tables: &[Table]) -> Result<()> {
        for t in tables {
            match t {
                Table::Users => self.write_rows(*t, self.users.values().collect())?,
                Table::Profiles => self.write_rows(*t, self.profiles.values().collect())?,
                Table::Affiliations => self.write_rows(*t, self.affiliations.values().collect())?,
                Table::Tokens => {
                    let mut rows: Vec<&Token> = self.tokens.values().collect();
                    rows.sort_by_key(|t| t.user_id);
                    self.write_rows(*t, rows)?
                }
            }
        }
        Ok(())
    }

    // ---- users ----

    pub fn user(&self, id: i64) -> Option<&User> { self.users.get(&id) }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    pub fn user_count(&self) -> usize { self.users.len() }

    /// Field checks for a new account, including email uniqueness. `email`
    /// is expected to be normalized already. All field errors are reported
    /// together.
    pub fn check_new_user(&self, email: &str, password: &str) -> AppResult<()> {
        let mut errors: FieldErrors = security::validate_credentials(email, password);
        if !errors.contains_key("email") && self.user_by_email(email).is_some() {
            errors.entry("email".into()).or_default().push("user with this email already exists.".into());
        }
        if !errors.is_empty() { return Err(AppError::validation(errors)); }
        Ok(())
    }

    /// Insert a user with an already hashed password, together with its empty
    /// profile. Uniqueness is checked again since hashing happens unlocked.
    pub fn insert_user(&mut self, email: &str, password_hash: String, is_staff: bool, is_superuser: bool) -> AppResult<User> {
        if self.user_by_email(email).is_some() {
            return Err(AppError::field("email", "user with this email already exists."));
        }
        const TABLES: [Table; 2] = [Table::Users, Table::Profiles];
        let snap = self.snapshot(&TABLES);
        let user = User {
            id: self.next_user_id,
            email: email.to_string(),
            password_hash,
            is_staff,
            is_superuser,
            is_active: true,
            date_joined: Utc::now(),
        };
        let profile = Profile { id: self.next_profile_id, user_id: user.id, display_name: None, affiliations: BTreeSet::new() };
        self.next_user_id += 1;
        self.next_profile_id += 1;
        self.users.insert(user.id, user.clone());
        self.profiles.insert(profile.id, profile);
        self.commit(&TABLES, snap)?;
        debug!(target: "publiceye::storage", "insert_user id={} staff={} superuser={}", user.id, is_staff, is_superuser);
        Ok(user)
    }

    /// Remove a user and everything that hangs off it. Returns false when absent.
    pub fn delete_user(&mut self, id: i64) -> AppResult<bool> {
        if !self.users.contains_key(&id) { return Ok(false); }
        const TABLES: [Table; 3] = [Table::Users, Table::Profiles, Table::Tokens];
        let snap = self.snapshot(&TABLES);
        self.users.remove(&id);
        self.profiles.retain(|_, p| p.user_id != id);
        self.tokens.retain(|_, t| t.user_id != id);
        self.commit(&TABLES, snap)?;
        debug!(target: "publiceye::storage", "delete_user id={} (profile and token cascaded)", id);
        Ok(true)
    }

    // ---- tokens ----

    pub fn token_for_user(&self, user_id: i64) -> Option<&Token> {
        self.tokens.values().find(|t| t.user_id == user_id)
    }

    /// The user's existing token, or a freshly generated one. The flag is true
    /// when a token was created.
    pub fn get_or_create_token(&mut self, user_id: i64) -> AppResult<(Token, bool)> {
        if !self.users.contains_key(&user_id) {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        if let Some(t) = self.token_for_user(user_id) {
            return Ok((t.clone(), false));
        }
        let key = security::generate_token_key()?;
        let token = Token { key: key.clone(), user_id, created: Utc::now() };
        let snap = self.snapshot(&[Table::Tokens]);
        self.tokens.insert(key, token.clone());
        self.commit(&[Table::Tokens], snap)?;
        Ok((token, true))
    }

    pub fn delete_token(&mut self, key: &str) -> AppResult<bool> {
        if !self.tokens.contains_key(key) { return Ok(false); }
        let snap = self.snapshot(&[Table::Tokens]);
        self.tokens.remove(key);
        self.commit(&[Table::Tokens], snap)?;
        Ok(true)
    }

    /// Resolve a token key to its live user.
    pub fn user_for_token(&self, key: &str) -> Option<&User> {
        self.tokens.get(key).and_then(|t| self.users.get(&t.user_id))
    }

    // ---- profiles ----

    pub fn profile_for_user(&self, user_id: i64) -> Option<&Profile> {
        self.profiles.values().find(|p| p.user_id == user_id)
    }

    /// Affiliation rows referenced by a profile, ordered by id.
    pub fn profile_affiliations(&self, profile: &Profile) -> Vec<Affiliation> {
        profile.affiliations.iter().filter_map(|id| self.affiliations.get(id).cloned()).collect()
    }

    /// Apply a partial edit to the user's profile. Nothing is written unless
    /// every field validates.
    pub fn edit_profile(&mut self, user_id: i64, edit: ProfileEdit) -> AppResult<Profile> {
        let Some(profile_id) = self.profile_for_user(user_id).map(|p| p.id) else {
            return Err(AppError::not_found("not_found", "Not found."));
        };

        let mut errors = FieldErrors::new();
        if let Some(Some(name)) = &edit.display_name {
            if let Some(msg) = security::validate_display_name(name) {
                errors.entry("display_name".into()).or_default().push(msg);
            }
        }
        let replacement: Option<BTreeSet<i64>> = match &edit.affiliations {
            Some(ids) if !ids.is_empty() => {
                for id in ids {
                    if !self.affiliations.contains_key(id) {
                        errors.entry("affiliations".into()).or_default()
                            .push(format!("Invalid pk \"{}\" - object does not exist.", id));
                    }
                }
                Some(ids.iter().copied().collect())
            }
            _ => None,
        };
        if !errors.is_empty() { return Err(AppError::validation(errors)); }

        let snap = self.snapshot(&[Table::Profiles]);
        let Some(profile) = self.profiles.get_mut(&profile_id) else {
            return Err(AppError::not_found("not_found", "Not found."));
        };
        if let Some(name) = edit.display_name {
            profile.display_name = name;
        }
        if let Some(set) = replacement {
            profile.affiliations = set;
        }
        let updated = profile.clone();
        self.commit(&[Table::Profiles], snap)?;
        Ok(updated)
    }

    // ---- affiliations ----

    pub fn affiliations(&self) -> Vec<&Affiliation> { self.affiliations.values().collect() }

    /// Case-insensitive lookup by label.
    pub fn affiliation_by_category(&self, category: &str) -> Option<&Affiliation> {
        let wanted = category.trim().to_lowercase();
        self.affiliations.values().find(|a| a.category.to_lowercase() == wanted)
    }

    /// Insert a new catalog entry; labels are title-cased and unique ignoring case.
    pub fn create_affiliation(&mut self, category: &str) -> AppResult<Affiliation> {
        let label = security::title_case(category.trim());
        if label.is_empty() {
            return Err(AppError::field("category", "This field may not be blank."));
        }
        if self.affiliation_by_category(&label).is_some() {
            return Err(AppError::field("category", "affiliation with this category already exists."));
        }
        let snap = self.snapshot(&[Table::Affiliations]);
        let row = Affiliation { id: self.next_affiliation_id, category: label };
        self.next_affiliation_id += 1;
        self.affiliations.insert(row.id, row.clone());
        self.commit(&[Table::Affiliations], snap)?;
        Ok(row)
    }

    /// Install `labels` verbatim when the catalog is empty. Returns how many were added.
    pub fn seed_affiliations(&mut self, labels: &[&str]) -> AppResult<usize> {
        if !self.affiliations.is_empty() { return Ok(0); }
        let snap = self.snapshot(&[Table::Affiliations]);
        for label in labels {
            let row = Affiliation { id: self.next_affiliation_id, category: label.trim().to_string() };
            self.next_affiliation_id += 1;
            self.affiliations.insert(row.id, row);
        }
        self.commit(&[Table::Affiliations], snap)?;
        info!(target: "publiceye::storage", "seeded affiliation catalog with {} entries", labels.len());
        Ok(labels.len())
    }
}

#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Store::open(root)?))))
    }
}
