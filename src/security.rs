//! Credential helpers: Argon2 password hashing, token keys and the field
//! validation rules for users, profiles and affiliations.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{SaltString, PasswordHash};
use regex::Regex;

use crate::error::FieldErrors;

pub const EMAIL_MAX_LEN: usize = 254;
pub const DISPLAY_NAME_MIN_LEN: usize = 3;
pub const DISPLAY_NAME_MAX_LEN: usize = 50;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("email regex")
});

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// 20 random bytes rendered as 40 lowercase hex characters.
pub fn generate_token_key() -> Result<String> {
    let mut bytes = [0u8; 20];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow!(e.to_string()))?;
    let mut key = String::with_capacity(40);
    use std::fmt::Write as _;
    for b in &bytes { let _ = write!(&mut key, "{:02x}", b); }
    Ok(key)
}

/// Trim and lowercase the domain part; the local part is case-sensitive.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Field checks applied before a user row is created. Uniqueness is checked
/// by the store since it needs the user table.
pub fn validate_credentials(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if email.trim().is_empty() {
        errors.entry("email".into()).or_default().push("This field cannot be blank.".into());
    } else {
        let n = email.chars().count();
        if n > EMAIL_MAX_LEN {
            errors.entry("email".into()).or_default()
                .push(format!("Ensure this value has at most {} characters (it has {}).", EMAIL_MAX_LEN, n));
        }
        if !is_valid_email(email) {
            errors.entry("email".into()).or_default().push("Enter a valid email address.".into());
        }
    }
    if password.is_empty() {
        errors.entry("password".into()).or_default().push("This field cannot be blank.".into());
    }
    errors
}

/// Empty names are allowed (the field is optional); otherwise 3..=50 characters.
pub fn validate_display_name(name: &str) -> Option<String> {
    if name.is_empty() { return None; }
    let n = name.chars().count();
    if n < DISPLAY_NAME_MIN_LEN {
        return Some(format!("Ensure this field has at least {} characters.", DISPLAY_NAME_MIN_LEN));
    }
    if n > DISPLAY_NAME_MAX_LEN {
        return Some(format!("Ensure this field has no more than {} characters.", DISPLAY_NAME_MAX_LEN));
    }
    None
}

/// Title-case a category label: the first letter of every alphabetic run is
/// uppercased and the rest lowercased ("green party" -> "Green Party").
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha { out.extend(ch.to_lowercase()); } else { out.extend(ch.to_uppercase()); }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let phc = hash_password("hunter22").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password(&phc, "hunter22"));
        assert!(!verify_password(&phc, "hunter23"));
        assert!(!verify_password("not-a-phc", "hunter22"));
    }

    #[test]
    fn token_keys_are_hex_and_distinct() {
        let a = generate_token_key().unwrap();
        let b = generate_token_key().unwrap();
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn email_normalization_and_validation() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "Jane.Doe@example.com");
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("j+tag@mail.example.org"));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@"));
        assert!(!is_valid_email("jane doe@example.com"));
    }

    #[test]
    fn credential_errors_are_per_field() {
        let errs = validate_credentials("", "");
        assert_eq!(errs["email"], vec!["This field cannot be blank."]);
        assert_eq!(errs["password"], vec!["This field cannot be blank."]);

        let errs = validate_credentials("nope", "pw");
        assert_eq!(errs["email"], vec!["Enter a valid email address."]);
        assert!(!errs.contains_key("password"));

        assert!(validate_credentials("ok@example.com", "pw").is_empty());
    }

    #[test]
    fn display_name_bounds() {
        assert!(validate_display_name("").is_none());
        assert!(validate_display_name("abc").is_none());
        assert!(validate_display_name(&"x".repeat(50)).is_none());
        assert!(validate_display_name("ab").is_some());
        assert!(validate_display_name(&"x".repeat(51)).is_some());
        // characters, not bytes
        assert!(validate_display_name("héé").is_none());
    }

    #[test]
    fn title_case_matches_label_style() {
        assert_eq!(title_case("green party"), "Green Party");
        assert_eq!(title_case("DEMOCRATIC PARTY"), "Democratic Party");
        assert_eq!(title_case("u.s. marijuana party"), "U.S. Marijuana Party");
    }
}
