//! SQLite-backed account store.
//!
//! One table:
//! - `users`: id, name, email (unique, case-insensitive), password_hash,
//!   salt, created_at
//!
//! Passwords are stretched with iterated SHA-256 (100k rounds) over a
//! per-user random salt. Comparison is constant-time, and an unknown email
//! performs a dummy hash so the timing of a failed login does not reveal
//! whether the account exists.

use anyhow::{bail, Result};
use parking_lot::Mutex;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// A registered account, as handed to the session store and the pages.
/// The password hash never leaves this module.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: i64,
}

/// SQLite-backed account store.
pub struct UserStore {
    conn: Mutex<rusqlite::Connection>,
}

impl UserStore {
    /// Open (or create) the account database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new account. Returns the stored record.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<UserRecord> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            bail!("Name cannot be empty");
        }
        if name.len() > 64 {
            bail!("Name too long (max 64 characters)");
        }
        if !looks_like_email(email) {
            bail!("Please enter a valid email address");
        }
        if password.len() < 8 {
            bail!("Password must be at least 8 characters");
        }

        let id = uuid::Uuid::new_v4().to_string();
        let salt = generate_salt();
        let password_hash = hash_password(password, &salt);
        let now = epoch_secs() as i64;

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, name, email, password_hash, salt, now],
        );

        match result {
            Ok(_) => Ok(UserRecord {
                id,
                name: name.to_string(),
                email: email.to_string(),
                created_at: now,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                bail!("An account with this email already exists")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check credentials. Returns the `UserRecord` on success.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord> {
        let conn = self.conn.lock();
        let row: Result<(String, String, String, String, i64), _> = conn.query_row(
            "SELECT id, name, password_hash, salt, created_at
             FROM users WHERE email = ?1 COLLATE NOCASE",
            rusqlite::params![email.trim()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        );

        match row {
            Ok((id, name, stored_hash, salt, created_at)) => {
                let attempt_hash = hash_password(password, &salt);
                if !constant_time_eq(stored_hash.as_bytes(), attempt_hash.as_bytes()) {
                    bail!("Invalid email or password");
                }
                Ok(UserRecord {
                    id,
                    name,
                    email: email.trim().to_string(),
                    created_at,
                })
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                // Perform dummy hash to prevent timing side-channel
                let _ = hash_password(password, "0000000000000000");
                bail!("Invalid email or password");
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Count registered accounts.
    pub fn user_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Loose shape check; real validation is the confirmation the user can log
/// back in. Rejects the obviously malformed without trying to parse RFC 5322.
fn looks_like_email(email: &str) -> bool {
    if email.is_empty() || email.len() > 254 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

// ── Cryptographic Helpers ───────────────────────────────────────────

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password with salt using iterated SHA-256.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    // Iterated hashing for key stretching
    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Tests ───────────────────────────────────────────────────────────
