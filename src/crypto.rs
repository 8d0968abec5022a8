//! Credential hashing and identity derivation.
//!
//! Every digest is a lowercase hex-encoded SHA-256. Passwords are hashed as
//! `sha256(password ++ salt)` and identity tokens as `sha256(username ++ salt)`,
//! so both survive a round-trip through any store as plain strings.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const SALT_ENTROPY: usize = 32;

/// Hex-encoded SHA-256 of `data`.
fn digest(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Generate a fresh salt.
///
/// The salt is an opaque 64-char hex string built from OS randomness mixed
/// with the current timestamp.
pub fn generate_salt() -> String {
    let mut entropy = [0u8; SALT_ENTROPY];
    OsRng.fill_bytes(&mut entropy);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(now.to_string());
    hasher.update(entropy);
    hex::encode(hasher.finalize())
}

/// Hash `plaintext` concatenated with `salt`.
pub fn hash_with_salt(plaintext: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    hasher.update(salt);
    hex::encode(hasher.finalize())
}

/// Derive the identity token shared by both stores.
pub fn derive_identity_token(username: &str, salt: &str) -> String {
    hash_with_salt(username, salt)
}

/// Check a supplied password against stored credential material.
pub fn verify_login(
    stored_hash: &str,
    stored_salt: &str,
    supplied_plaintext: &str,
) -> bool {
    let computed = hash_with_salt(supplied_plaintext, stored_salt);
    constant_time_eq::constant_time_eq(computed.as_bytes(), stored_hash.as_bytes())
}

/// Public token of a business image, derived from its name.
pub fn image_token(name: &str) -> String {
    digest(name)
}

/// Credential material produced for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub salt: String,
    pub password_hash: String,
    pub identity: String,
}

impl Credentials {
    /// Salt, hash the password and derive the identity token of an account.
    pub fn generate(username: &str, password: &str) -> Self {
        let salt = generate_salt();

        Self {
            password_hash: hash_with_salt(password, &salt),
            identity: derive_identity_token(username, &salt),
            salt,
        }
    }
}
