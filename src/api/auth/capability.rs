//! Best-effort probe of the "has Gemini API key" capability flag.

use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::FetchError;
use crate::session::StorageKey;
use crate::Postiva;

const GEMINI_KEYS_PATH: &str = "/gemini-keys/";

#[derive(Deserialize)]
struct GeminiKey {
    api_key_preview: Option<String>,
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    is_active: bool,
}

/// Runs the probe on a detached task. Its outcome is only logged here; the
/// login that started it never waits for it.
pub(crate) fn spawn_probe(client: Postiva, token: String) -> JoinHandle<Result<bool, FetchError>> {
    tokio::spawn(async move {
        let result = probe(&client, &token).await;

        match &result {
            Ok(has_key) => tracing::debug!(has_key, "cached Gemini key presence"),
            Err(error) => tracing::warn!(%error, "Gemini key fetch failed after login (ignored)"),
        }

        result
    })
}

/// Fetches the key and caches the flag, unless the session changed meanwhile.
async fn probe(client: &Postiva, token: &str) -> Result<bool, FetchError> {
    let url = client.endpoint(GEMINI_KEYS_PATH);

    let response = client.request_get(&url, None, Some(token)).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::from_response(response, "fetch Gemini key").await);
    }

    let key = response.json::<Option<GeminiKey>>().await?;

    let has_key = key
        .as_ref()
        .is_some_and(|key| key.api_key_preview.is_some() || key.is_active);

    let store = client.store();

    if store.get(StorageKey::AuthToken).as_deref() != Some(token) {
        tracing::debug!("session changed while probing, discarding capability flag");
        return Ok(has_key);
    }

    match key {
        Some(GeminiKey {
            api_key_preview: Some(preview),
            ..
        }) => store.set(StorageKey::GeminiKeyPreview, &preview),
        Some(_) => {}
        None => store.remove(StorageKey::GeminiKeyPreview),
    }
    store.set(StorageKey::HasGeminiKey, if has_key { "true" } else { "false" });

    Ok(has_key)
}
