//! Keychain storage for amend credentials
//!
//! All credentials live in a single keychain entry, stored as JSON, so the
//! OS prompts at most once per session.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

const KEYRING_SERVICE: &str = "amend-credentials";
const KEYRING_USERNAME: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

type KeyringResult<T> = Result<T, String>;

static CREDENTIALS_CACHE: OnceLock<Mutex<Option<StoredCredentials>>> = OnceLock::new();
static KEYRING_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

fn credentials_cache() -> &'static Mutex<Option<StoredCredentials>> {
    CREDENTIALS_CACHE.get_or_init(|| Mutex::new(None))
}

fn keyring_disabled() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var("AMEND_DISABLE_KEYRING")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

/// Warn about keychain errors only once per session
pub fn warn_keychain_error_once(context: &str, err: &str) {
    if KEYRING_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    eprintln!(
        "  Warning: Couldn't access system keychain for {}: {}",
        context, err
    );
    eprintln!("  Tip: You can set OPENAI_API_KEY to bypass the keychain.");
}

fn read_credentials_uncached() -> KeyringResult<StoredCredentials> {
    if keyring_disabled() {
        return Ok(StoredCredentials::default());
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(json) => {
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse credentials: {}", e))
        }
        Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
        Err(err) => Err(err.to_string()),
    }
}

fn write_credentials(creds: &StoredCredentials) -> Result<(), String> {
    if keyring_disabled() {
        return Err("system keychain is disabled (AMEND_DISABLE_KEYRING)".to_string());
    }
    let json = serde_json::to_string(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    entry.set_password(&json).map_err(|e| e.to_string())
}

fn read_credentials_cached() -> KeyringResult<StoredCredentials> {
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(ref creds) = *guard {
        return Ok(creds.clone());
    }

    let creds = read_credentials_uncached()?;
    *guard = Some(creds.clone());
    Ok(creds)
}

fn update_cache(creds: StoredCredentials) {
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(creds);
}

// ============================================================================
// Public API
// ============================================================================

/// Get the model API key from the keychain
pub fn get_api_key() -> KeyringResult<Option<String>> {
    Ok(read_credentials_cached()?.api_key)
}

/// Store the model API key in the keychain, verifying it reads back
pub fn set_api_key(key: &str) -> Result<(), String> {
    let mut creds = read_credentials_cached().unwrap_or_default();
    creds.api_key = Some(key.to_string());
    write_credentials(&creds)?;

    match read_credentials_uncached()?.api_key {
        Some(stored) if stored == key => {
            update_cache(creds);
            Ok(())
        }
        Some(_) => Err("API key verification failed: stored key doesn't match".to_string()),
        None => Err("API key verification failed: key was not persisted".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_disabled_in_tests() {
        assert!(keyring_disabled());
        assert_eq!(get_api_key().unwrap(), None);
        assert!(set_api_key("sk-test").is_err());
    }

    #[test]
    fn test_stored_credentials_serialization() {
        let creds = StoredCredentials {
            api_key: Some("sk-test".to_string()),
        };
        let json = serde_json::to_string(&creds).unwrap();
        assert_eq!(json, r#"{"api_key":"sk-test"}"#);

        let empty = serde_json::to_string(&StoredCredentials::default()).unwrap();
        assert_eq!(empty, "{}");
    }

    #[test]
    fn test_stored_credentials_deserialize_empty() {
        let parsed: StoredCredentials = serde_json::from_str("{}").unwrap();
        assert!(parsed.api_key.is_none());
    }
}
