//! Credential store: a flat `users` table checked at login.
//!
//! Password hashes are salted PBKDF2-SHA256 in PHC string format.
//! Verification is delegated to the password-hash library, which
//! compares digests in constant time. Unknown username and wrong
//! password are indistinguishable to callers.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::Pbkdf2;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{self, DatabaseError};
use crate::models::Role;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("User '{0}' already exists")]
    UserExists(String),
}

/// Outcome of a credential check. `role` is present exactly when
/// `authenticated` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub authenticated: bool,
    pub role: Option<Role>,
}

impl Verification {
    fn denied() -> Self {
        Self {
            authenticated: false,
            role: None,
        }
    }
}

/// Handle on the users database. Connections are opened per operation;
/// the store itself is cheap to clone and share.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db_path: PathBuf,
}

impl CredentialStore {
    /// Open (creating and migrating if needed) the users database.
    pub fn open(db_path: &Path) -> Result<Self, AuthError> {
        // Run migrations once up front so later per-call opens are cheap.
        db::open_database(db_path)?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
        })
    }

    fn connect(&self) -> Result<Connection, AuthError> {
        Ok(db::open_database(&self.db_path)?)
    }

    /// Check a username/password pair against the stored hash.
    ///
    /// Both "no such user" and "wrong password" yield the same denied
    /// result; callers cannot probe which usernames exist.
    pub fn verify(&self, username: &str, password: &str) -> Result<Verification, AuthError> {
        let conn = self.connect()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT password_hash, role FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((stored_hash, role_str)) = row else {
            return Ok(Verification::denied());
        };

        let parsed = match PasswordHash::new(&stored_hash) {
            Ok(h) => h,
            Err(e) => {
                // A malformed stored hash denies login; the learner sees
                // the same generic message as for a wrong password.
                tracing::error!(user = %username, error = %e, "stored password hash unparseable");
                return Ok(Verification::denied());
            }
        };

        if Pbkdf2.verify_password(password.as_bytes(), &parsed).is_err() {
            return Ok(Verification::denied());
        }

        let role = Role::from_str(&role_str)?;
        Ok(Verification {
            authenticated: true,
            role: Some(role),
        })
    }

    /// Provision a new user with a freshly salted hash.
    ///
    /// Administrative operation, exposed through the `useradd` binary,
    /// never through the HTTP surface.
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<(), AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Pbkdf2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        let conn = self.connect()?;
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![username, hash, role.as_str()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AuthError::UserExists(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
