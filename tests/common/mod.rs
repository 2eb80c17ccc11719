#![allow(dead_code)]

use std::sync::Arc;

use httpmock::MockServer;
use postiva_rs::{HeadlessBrowser, MemoryStore, Postiva, SessionStore, StorageKey, User};
use serde_json::{json, Value};

pub const ORIGIN: &str = "http://localhost:3000";

pub struct Harness {
    pub client: Postiva,
    pub store: Arc<MemoryStore>,
    pub browser: Arc<HeadlessBrowser>,
}

pub fn harness(server: &MockServer) -> Harness {
    harness_with_browser(server, HeadlessBrowser::new(ORIGIN))
}

pub fn harness_with_browser(server: &MockServer, browser: HeadlessBrowser) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let browser = Arc::new(browser);

    let client = Postiva::new(&server.base_url())
        .with_store(store.clone())
        .with_browser(browser.clone());

    Harness {
        client,
        store,
        browser,
    }
}

/// A harness whose store already holds a session for `a@x.com`.
pub fn logged_in(server: &MockServer, token: &str) -> Harness {
    let harness = harness(server);
    seed_session(harness.store.as_ref(), token, "u1", "a@x.com");
    harness
}

pub fn seed_session(store: &dyn SessionStore, token: &str, id: &str, email: &str) {
    store.set(StorageKey::AuthToken, token);
    store.set(StorageKey::UserData, &user_json(id, email).to_string());
    store.set(StorageKey::ActiveUserId, id);
}

pub fn user_json(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "username": email.split('@').next().unwrap_or_default(),
        "full_name": "Test User",
        "is_active": true,
        "created_at": "2025-01-01T00:00:00",
        "updated_at": "2025-01-01T00:00:00"
    })
}

pub fn stored_user(store: &dyn SessionStore) -> Option<User> {
    store
        .get(StorageKey::UserData)
        .map(|raw| serde_json::from_str(&raw).unwrap())
}
