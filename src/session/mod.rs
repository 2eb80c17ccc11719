//! Persistent session storage.
//!
//! The store is a synchronous key-value map shared by every manager. It plays
//! the role of the browser's local storage: a snapshot is read, values are
//! replaced, nothing is transactional across keys.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use file_store::JsonFileStore;

mod file_store;

/// The fixed set of persisted keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Bearer token of the active session.
    AuthToken,
    /// JSON snapshot of the authenticated [`User`].
    UserData,
    /// Legacy user id slot. Only ever cleared.
    UserId,
    /// Mirror of `user_data`.
    UserInfo,
    /// Identifier generated for each installed session.
    SessionId,
    /// Id of the user owning the active session.
    ActiveUserId,
    /// Page the user was on when the Google login started.
    GoogleAuthRedirect,
    /// Masked preview of the stored Gemini API key.
    GeminiKeyPreview,
    /// `"true"`/`"false"` capability flag: a Gemini API key is configured.
    HasGeminiKey,
}

impl StorageKey {
    /// Every key, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::AuthToken,
        Self::UserData,
        Self::UserId,
        Self::UserInfo,
        Self::SessionId,
        Self::ActiveUserId,
        Self::GoogleAuthRedirect,
        Self::GeminiKeyPreview,
        Self::HasGeminiKey,
    ];

    /// The storage name of the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthToken => "auth_token",
            Self::UserData => "user_data",
            Self::UserId => "user_id",
            Self::UserInfo => "user_info",
            Self::SessionId => "session_id",
            Self::ActiveUserId => "active_user_id",
            Self::GoogleAuthRedirect => "google_auth_redirect",
            Self::GeminiKeyPreview => "gemini_api_key_preview",
            Self::HasGeminiKey => "has_gemini_key",
        }
    }

    /// Looks a key up by its storage name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// Synchronous key-value storage for the session.
///
/// Implementations have no failure mode: an unusable backing medium is an
/// unsupported environment, so write failures are logged and swallowed.
pub trait SessionStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: StorageKey) -> Option<String>;
    /// Writes (replaces) a value.
    fn set(&self, key: StorageKey, value: &str);
    /// Removes a value. Removing a missing key is a no-op.
    fn remove(&self, key: StorageKey);
}

/// In-memory [`SessionStore`]. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no key at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn set(&self, key: StorageKey, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.to_string());
    }

    fn remove(&self, key: StorageKey) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }
}

/// Snapshot of the authenticated user, cached alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user id.
    pub id: String,
    /// Email address, used to detect a change of account.
    pub email: String,
    /// Public username.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub username: String,
    /// Display name.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub full_name: String,
    /// Whether the account is active.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub is_active: bool,
    /// Creation timestamp, as sent by the backend.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub created_at: String,
    /// Last update timestamp, as sent by the backend.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub updated_at: String,
}

/// A snapshot of everything the store knows about the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Bearer token.
    pub token: Option<String>,
    /// Cached user. `None` when missing or unparseable.
    pub user: Option<User>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Id of the user owning the session.
    pub active_user_id: Option<String>,
    /// Cached capability flag, `None` when never probed.
    pub has_gemini_key: Option<bool>,
    /// Cached key preview.
    pub gemini_key_preview: Option<String>,
}

impl Session {
    /// Reads the session from the store. Never touches the network.
    #[must_use]
    pub fn load(store: &dyn SessionStore) -> Self {
        let user = store
            .get(StorageKey::UserData)
            .and_then(|raw| match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(error) => {
                    tracing::warn!(%error, "stored user snapshot is unreadable, ignoring it");
                    None
                }
            });

        Self {
            token: store.get(StorageKey::AuthToken),
            user,
            session_id: store.get(StorageKey::SessionId),
            active_user_id: store.get(StorageKey::ActiveUserId),
            has_gemini_key: store
                .get(StorageKey::HasGeminiKey)
                .map(|flag| flag == "true"),
            gemini_key_preview: store.get(StorageKey::GeminiKeyPreview),
        }
    }

    /// Authenticated iff both a token and a user are present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }
}

/// Generates a new session identifier: `session_<unix millis>_<9 chars>`.
#[must_use]
pub fn generate_session_id() -> String {
    let entropy = Uuid::new_v4().simple().to_string();

    format!(
        "session_{}_{}",
        Utc::now().timestamp_millis(),
        &entropy[..9]
    )
}

/// Removes every session key. The pending Google redirect is kept because the
/// OAuth round trip may still be in flight.
pub fn clear_auth_data(store: &dyn SessionStore) {
    for key in StorageKey::ALL {
        if key != StorageKey::GoogleAuthRedirect {
            store.remove(key);
        }
    }
}

/// Session replacement: when a session for a different email is stored, wipe
/// it before a new one is installed. Returns the evicted email.
pub(crate) fn evict_other_user(store: &dyn SessionStore, incoming_email: &str) -> Option<String> {
    store.get(StorageKey::AuthToken)?;
    let current = Session::load(store).user?;

    if current.email == incoming_email {
        return None;
    }

    tracing::warn!(
        current = %current.email,
        incoming = %incoming_email,
        "login with a different account detected, clearing the previous session"
    );
    clear_auth_data(store);

    Some(current.email)
}

/// Writes the user snapshot and the session bookkeeping keys.
pub(crate) fn persist_user(
    store: &dyn SessionStore,
    user: &User,
    session_id: &str,
) -> Result<(), serde_json::Error> {
    let snapshot = serde_json::to_string(user)?;

    store.set(StorageKey::UserData, &snapshot);
    store.set(StorageKey::UserInfo, &snapshot);
    store.set(StorageKey::SessionId, session_id);
    store.set(StorageKey::ActiveUserId, &user.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User {
            id: "1".to_string(),
            email: email.to_string(),
            username: "someone".to_string(),
            full_name: "Some One".to_string(),
            is_active: true,
            created_at: "2024-01-01T00:00:00".to_string(),
            updated_at: "2024-01-01T00:00:00".to_string(),
        }
    }

    #[test]
    fn session_ids_have_expected_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn storage_names_round_trip() {
        for key in StorageKey::ALL {
            assert_eq!(StorageKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(StorageKey::from_name("nope"), None);
    }

    #[test]
    fn clear_keeps_google_redirect() {
        let store = MemoryStore::default();
        for key in StorageKey::ALL {
            store.set(key, "x");
        }

        clear_auth_data(&store);

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(StorageKey::GoogleAuthRedirect).as_deref(),
            Some("x")
        );
    }

    #[test]
    fn unreadable_user_is_not_authenticated() {
        let store = MemoryStore::default();
        store.set(StorageKey::AuthToken, "T");
        store.set(StorageKey::UserData, "{not json");

        let session = Session::load(&store);
        assert_eq!(session.token.as_deref(), Some("T"));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn eviction_only_for_a_different_email() {
        let store = MemoryStore::default();
        store.set(StorageKey::AuthToken, "T");
        persist_user(&store, &user("a@x.com"), "session_1_abc").unwrap();
        store.set(StorageKey::HasGeminiKey, "true");

        assert_eq!(evict_other_user(&store, "a@x.com"), None);
        assert!(Session::load(&store).is_authenticated());

        assert_eq!(
            evict_other_user(&store, "b@x.com").as_deref(),
            Some("a@x.com")
        );
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_needs_a_token() {
        let store = MemoryStore::default();
        persist_user(&store, &user("a@x.com"), "session_1_abc").unwrap();

        assert_eq!(evict_other_user(&store, "b@x.com"), None);
        assert!(store.get(StorageKey::UserData).is_some());
    }
}
