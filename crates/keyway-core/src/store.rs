//! Identity and profile stores
//!
//! Contracts for the storage collaborators the pipeline consumes, plus an
//! in-memory [`MemoryProfileService`] suitable for single-process deployments
//! and tests. Persistent backends implement the same traits.

use crate::error::{AuthError, AuthResult};
use crate::profile::UserProfile;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Record field holding the profile identifier.
pub const ID: &str = "id";

/// Record field holding the linked account identifier.
pub const LINKED_ID: &str = "linked_id";

/// Record field holding the username.
pub const USERNAME: &str = "username";

/// A stored account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Profile identifier
    pub id: String,

    /// Linked account identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_id: Option<String>,

    /// Lookup key for password authentication
    pub username: String,

    /// Encoded secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Full profile as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_profile: Option<String>,

    /// Additional attributes
    #[serde(default)]
    pub attributes: HashMap<String, Value>,

    /// Account validity end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_expires_at: Option<DateTime<Utc>>,

    /// Secret validity end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_expires_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    /// Create a record with an already encoded secret.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        encoded_password: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            linked_id: None,
            username: username.into(),
            password: encoded_password,
            serialized_profile: None,
            attributes: HashMap::new(),
            account_expires_at: None,
            password_expires_at: None,
        }
    }

    /// Value of a field or attribute, for filtering.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            ID => Some(Value::String(self.id.clone())),
            LINKED_ID => self.linked_id.clone().map(Value::String),
            USERNAME => Some(Value::String(self.username.clone())),
            other => self.attributes.get(other).cloned(),
        }
    }

    /// Rebuild the profile stored in this record.
    ///
    /// The serialized profile wins when present; otherwise the profile is
    /// assembled from the identifier, username and attributes.
    pub fn to_profile(&self) -> AuthResult<UserProfile> {
        if let Some(serialized) = &self.serialized_profile {
            return serde_json::from_str(serialized).map_err(|e| {
                AuthError::Technical(format!("Cannot deserialize profile {}: {}", self.id, e))
            });
        }

        let mut profile = UserProfile::new(self.id.clone());
        profile.set_linked_id(self.linked_id.clone());
        profile.add_attribute(crate::profile::USERNAME, self.username.clone());
        for (name, value) in &self.attributes {
            profile.add_attribute(name.clone(), value.clone());
        }
        Ok(profile)
    }
}

/// Lookup of accounts by username.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// All records matching `username`; zero, one or many.
    async fn find_by_username(&self, username: &str) -> AuthResult<Vec<AccountRecord>>;
}

/// Encodes secrets for storage and compares plain secrets to stored ones.
pub trait SecretMatcher: Send + Sync {
    /// Encode a plain secret for storage.
    fn encode(&self, plain: &str) -> AuthResult<String>;

    /// Check a plain secret against an encoded one.
    fn matches(&self, plain: &str, encoded: &str) -> bool;
}

/// Stores secrets as they are. Only for tests and migrations.
#[derive(Debug, Clone, Default)]
pub struct PlainTextSecretMatcher;

impl SecretMatcher for PlainTextSecretMatcher {
    fn encode(&self, plain: &str) -> AuthResult<String> {
        Ok(plain.to_string())
    }

    fn matches(&self, plain: &str, encoded: &str) -> bool {
        constant_time_eq(plain.as_bytes(), encoded.as_bytes())
    }
}

/// Argon2id with a random salt per secret, stored as a PHC string
/// (`$argon2id$v=19$...`).
#[derive(Debug, Clone, Default)]
pub struct Argon2SecretMatcher;

impl SecretMatcher for Argon2SecretMatcher {
    fn encode(&self, plain: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Technical(format!("Cannot hash secret: {e}")))
    }

    fn matches(&self, plain: &str, encoded: &str) -> bool {
        let hash = match PasswordHash::new(encoded) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "Stored secret is not a PHC string");
                return false;
            }
        };
        match Argon2::default().verify_password(plain.as_bytes(), &hash) {
            Ok(()) => true,
            Err(password_hash::Error::Password) => false,
            Err(e) => {
                warn!(error = %e, "Secret verification failed");
                false
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Storage of profiles and their secrets.
#[async_trait]
pub trait ProfileService: IdentityStore {
    /// Store a new profile with an optional plain secret.
    async fn create(&self, profile: &UserProfile, password: Option<&str>) -> AuthResult<()>;

    /// Replace a stored profile; a `None` secret keeps the stored one.
    async fn update(&self, profile: &UserProfile, password: Option<&str>) -> AuthResult<()>;

    /// Delete a stored profile.
    async fn remove(&self, profile: &UserProfile) -> AuthResult<()>;

    /// Profile by identifier.
    async fn find_by_id(&self, id: &str) -> AuthResult<Option<UserProfile>>;

    /// Profile by linked account identifier.
    async fn find_by_linked_id(&self, linked_id: &str) -> AuthResult<Option<UserProfile>>;

    /// Raw records whose field `key` equals `value`.
    async fn read(&self, key: &str, value: &str) -> AuthResult<Vec<AccountRecord>>;
}

/// In-memory [`ProfileService`].
pub struct MemoryProfileService {
    records: RwLock<Vec<AccountRecord>>,
    matcher: Arc<dyn SecretMatcher>,
}

impl std::fmt::Debug for MemoryProfileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProfileService")
            .field("records", &self.records.read().len())
            .finish()
    }
}

impl MemoryProfileService {
    /// Create an empty store using `matcher` to encode secrets.
    pub fn new(matcher: Arc<dyn SecretMatcher>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            matcher,
        }
    }

    /// Secret matcher used by this store.
    pub fn matcher(&self) -> Arc<dyn SecretMatcher> {
        self.matcher.clone()
    }

    /// Insert a raw record without uniqueness checks.
    pub fn insert_record(&self, record: AccountRecord) {
        self.records.write().push(record);
    }

    fn to_record(&self, profile: &UserProfile, password: Option<&str>) -> AuthResult<AccountRecord> {
        let serialized = serde_json::to_string(profile)
            .map_err(|e| AuthError::Technical(format!("Cannot serialize profile: {e}")))?;
        let username = profile.username().unwrap_or(profile.id()).to_string();

        let mut record = AccountRecord::new(
            profile.id(),
            username,
            password
                .filter(|p| !p.is_empty())
                .map(|p| self.matcher.encode(p))
                .transpose()?,
        );
        record.linked_id = profile.linked_id().map(String::from);
        record.serialized_profile = Some(serialized);
        record.attributes = profile.attributes().clone();
        Ok(record)
    }
}

#[async_trait]
impl IdentityStore for MemoryProfileService {
    async fn find_by_username(&self, username: &str) -> AuthResult<Vec<AccountRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.username == username)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileService for MemoryProfileService {
    async fn create(&self, profile: &UserProfile, password: Option<&str>) -> AuthResult<()> {
        crate::util::assert_not_blank("id", Some(profile.id()))?;
        let record = self.to_record(profile, password)?;

        let mut records = self.records.write();
        if records.iter().any(|r| r.id == record.id) {
            return Err(AuthError::Technical(format!(
                "Profile already exists: {}",
                record.id
            )));
        }
        records.push(record);
        Ok(())
    }

    async fn update(&self, profile: &UserProfile, password: Option<&str>) -> AuthResult<()> {
        let mut record = self.to_record(profile, password)?;

        let mut records = self.records.write();
        let existing = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| AuthError::Technical(format!("No profile to update: {}", profile.id())))?;
        if record.password.is_none() {
            record.password = existing.password.take();
        }
        record.account_expires_at = existing.account_expires_at;
        record.password_expires_at = existing.password_expires_at;
        *existing = record;
        Ok(())
    }

    async fn remove(&self, profile: &UserProfile) -> AuthResult<()> {
        self.records.write().retain(|r| r.id != profile.id());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<UserProfile>> {
        let record = self.records.read().iter().find(|r| r.id == id).cloned();
        record.map(|r| r.to_profile()).transpose()
    }

    async fn find_by_linked_id(&self, linked_id: &str) -> AuthResult<Option<UserProfile>> {
        let record = self
            .records
            .read()
            .iter()
            .find(|r| r.linked_id.as_deref() == Some(linked_id))
            .cloned();
        record.map(|r| r.to_profile()).transpose()
    }

    async fn read(&self, key: &str, value: &str) -> AuthResult<Vec<AccountRecord>> {
        let expected = Value::String(value.to_string());
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.field(key).as_ref() == Some(&expected))
            .cloned()
            .collect())
    }
}
