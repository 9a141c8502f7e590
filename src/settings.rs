use crate::storage::{FileStorage, StorageError};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

pub const SETTINGS_STORE_FILE: &str = "settings.json";

pub const KEY_API_BASE_URL: &str = "apiBaseUrl";
pub const KEY_REQUEST_TIMEOUT_SECONDS: &str = "requestTimeoutSeconds";
pub const KEY_CREDENTIAL_STORE: &str = "credentialStore";
pub const KEY_DOCUMENTS_PAGE_SIZE: &str = "documentsPageSize";
pub const KEY_REMEMBER_ME: &str = "rememberMe";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

fn defaults() -> Map<String, Value> {
  Map::from_iter([
    (KEY_API_BASE_URL.to_string(), json!(DEFAULT_API_BASE_URL)),
    (KEY_REQUEST_TIMEOUT_SECONDS.to_string(), json!(60)),
    (KEY_CREDENTIAL_STORE.to_string(), json!("file")),
    (KEY_DOCUMENTS_PAGE_SIZE.to_string(), json!(50)),
    (KEY_REMEMBER_ME.to_string(), json!(true)),
  ])
}

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("unknown setting '{0}'")]
  UnknownKey(String),
  #[error("setting '{key}' expects {expected}")]
  InvalidValue { key: String, expected: &'static str },
  #[error(transparent)]
  Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStore {
  File,
  Keyring,
}

#[derive(Clone)]
pub struct SettingsStore {
  file: Arc<FileStorage>,
  values: Arc<RwLock<Map<String, Value>>>,
}

impl SettingsStore {
  pub fn open(path: impl AsRef<Path>) -> Self {
    let file = FileStorage::new(path.as_ref());
    let values = match file.read_map() {
      Ok(map) => map,
      Err(err) => {
        tracing::warn!(path = %path.as_ref().display(), error = %err, "settings unreadable; using defaults");
        Map::new()
      }
    };
    Self {
      file: Arc::new(file),
      values: Arc::new(RwLock::new(values)),
    }
  }

  pub fn get(&self, key: &str) -> Option<Value> {
    let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
    values
      .get(key)
      .cloned()
      .or_else(|| defaults().get(key).cloned())
  }

  pub fn get_u64(&self, key: &str, fallback: u64) -> u64 {
    self.get(key).and_then(|v| v.as_u64()).unwrap_or(fallback)
  }

  pub fn get_bool(&self, key: &str, fallback: bool) -> bool {
    self.get(key).and_then(|v| v.as_bool()).unwrap_or(fallback)
  }

  pub fn get_string(&self, key: &str) -> Option<String> {
    let v = self.get(key)?;
    let s = v.as_str()?.trim();
    if s.is_empty() {
      None
    } else {
      Some(s.to_string())
    }
  }

  pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), StorageError> {
    let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
    values.insert(key.to_string(), value.into());
    self.file.write_map(&values)
  }

  pub fn remove(&self, key: &str) -> Result<(), StorageError> {
    let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
    if values.remove(key).is_none() {
      return Ok(());
    }
    self.file.write_map(&values)
  }

  pub fn entries(&self) -> Vec<(String, Value)> {
    let mut keys: Vec<String> = defaults().keys().cloned().collect();
    keys.sort();
    keys
      .into_iter()
      .filter_map(|key| self.get(&key).map(|value| (key, value)))
      .collect()
  }

  pub fn set_from_str(&self, key: &str, raw: &str) -> Result<Value, SettingsError> {
    let value = parse_setting_value(key, raw)?;
    self.set(key, value.clone())?;
    Ok(value)
  }

  pub fn api_base_url(&self) -> String {
    self
      .get_string(KEY_API_BASE_URL)
      .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
  }

  pub fn request_timeout_seconds(&self) -> u64 {
    self.get_u64(KEY_REQUEST_TIMEOUT_SECONDS, 60).max(1)
  }

  pub fn documents_page_size(&self) -> u32 {
    self
      .get_u64(KEY_DOCUMENTS_PAGE_SIZE, 50)
      .clamp(1, 100) as u32
  }

  pub fn remember_me(&self) -> bool {
    self.get_bool(KEY_REMEMBER_ME, true)
  }

  pub fn credential_store(&self) -> CredentialStore {
    match self.get_string(KEY_CREDENTIAL_STORE).as_deref() {
      Some("keyring") => CredentialStore::Keyring,
      _ => CredentialStore::File,
    }
  }
}

pub fn parse_setting_value(key: &str, raw: &str) -> Result<Value, SettingsError> {
  let defaults = defaults();
  let Some(default) = defaults.get(key) else {
    return Err(SettingsError::UnknownKey(key.to_string()));
  };
  let raw = raw.trim();
  let invalid = |expected| SettingsError::InvalidValue {
    key: key.to_string(),
    expected,
  };

  match default {
    Value::Bool(_) => match raw {
      "true" | "yes" | "1" => Ok(json!(true)),
      "false" | "no" | "0" => Ok(json!(false)),
      _ => Err(invalid("true or false")),
    },
    Value::Number(_) => raw
      .parse::<u64>()
      .map(|n| json!(n))
      .map_err(|_| invalid("a non-negative integer")),
    _ if key == KEY_CREDENTIAL_STORE => match raw {
      "file" | "keyring" => Ok(json!(raw)),
      _ => Err(invalid("'file' or 'keyring'")),
    },
    _ if raw.is_empty() => Err(invalid("a non-empty string")),
    _ => Ok(json!(raw)),
  }
}
