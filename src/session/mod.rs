//! Session registry: provider-issued session ids per chat.
//!
//! Resumable CLI backends hand out a session id on their first turn. The
//! agent loop records it here and passes it back on later turns of the same
//! chat, so only the newest message has to be sent.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SageError;

/// One stored association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub chat_id: String,
    pub provider_name: String,
    pub session_id: String,
}

/// Storage abstraction for provider sessions.
pub trait SessionStore: Send + Sync {
    fn get(&self, chat_id: &str, provider: &str) -> Result<Option<String>, SageError>;
    fn set(&self, chat_id: &str, provider: &str, session_id: &str) -> Result<(), SageError>;
    /// Forget every provider session of a chat ("new chat").
    fn clear(&self, chat_id: &str) -> Result<(), SageError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<(String, String), String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<ProviderSession> {
        let Ok(map) = self.sessions.read() else {
            return Vec::new();
        };
        let mut out: Vec<ProviderSession> = map
            .iter()
            .map(|((chat_id, provider_name), session_id)| ProviderSession {
                chat_id: chat_id.clone(),
                provider_name: provider_name.clone(),
                session_id: session_id.clone(),
            })
            .collect();
        out.sort_by(|a, b| (&a.chat_id, &a.provider_name).cmp(&(&b.chat_id, &b.provider_name)));
        out
    }
}

fn poisoned() -> SageError {
    SageError::InvalidState("session store lock poisoned".into())
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, chat_id: &str, provider: &str) -> Result<Option<String>, SageError> {
        let map = self.sessions.read().map_err(|_| poisoned())?;
        Ok(map.get(&(chat_id.to_string(), provider.to_string())).cloned())
    }

    fn set(&self, chat_id: &str, provider: &str, session_id: &str) -> Result<(), SageError> {
        let mut map = self.sessions.write().map_err(|_| poisoned())?;
        map.insert(
            (chat_id.to_string(), provider.to_string()),
            session_id.to_string(),
        );
        Ok(())
    }

    fn clear(&self, chat_id: &str) -> Result<(), SageError> {
        let mut map = self.sessions.write().map_err(|_| poisoned())?;
        map.retain(|(chat, _), _| chat != chat_id);
        Ok(())
    }
}

/// File-backed store: one TOML file per chat.
///
/// File names are a readable slug of the chat id followed by its base64url
/// encoding, so distinct ids never share a file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Store under `~/.sage/sessions`.
    pub fn new_default() -> Self {
        Self::new(default_sessions_dir())
    }

    fn chat_path(&self, chat_id: &str) -> PathBuf {
        self.base_dir.join(format!(
            "{}.{}.toml",
            normalize_label(chat_id),
            URL_SAFE_NO_PAD.encode(chat_id.as_bytes())
        ))
    }

    /// Load the chat's file, ignoring one that belongs to a different chat.
    fn load_chat(&self, chat_id: &str) -> Result<Option<SessionFile>, SageError> {
        let path = self.chat_path(chat_id);
        Ok(self.load(&path)?.filter(|file| {
            let owned = file.chat_id == chat_id;
            if !owned {
                tracing::warn!(path = %path.display(), "session file belongs to another chat");
            }
            owned
        }))
    }

    fn load(&self, path: &Path) -> Result<Option<SessionFile>, SageError> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file = toml::from_str(&raw).map_err(|e| {
            SageError::InvalidState(format!("corrupt session file {}: {e}", path.display()))
        })?;
        Ok(Some(file))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, chat_id: &str, provider: &str) -> Result<Option<String>, SageError> {
        let file = self.load_chat(chat_id)?;
        Ok(file
            .and_then(|f| f.sessions.get(provider).map(|entry| entry.session_id.clone())))
    }

    fn set(&self, chat_id: &str, provider: &str, session_id: &str) -> Result<(), SageError> {
        let path = self.chat_path(chat_id);
        let mut file = self.load_chat(chat_id)?.unwrap_or_else(|| SessionFile {
            version: 1,
            chat_id: chat_id.to_string(),
            sessions: BTreeMap::new(),
        });
        file.sessions.insert(
            provider.to_string(),
            SessionEntry {
                session_id: session_id.to_string(),
                updated_at: Utc::now(),
            },
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string(&file)
            .map_err(|e| SageError::InvalidState(format!("failed to encode session file: {e}")))?;
        fs::write(&path, serialized)?;
        Ok(())
    }

    fn clear(&self, chat_id: &str) -> Result<(), SageError> {
        if self.load_chat(chat_id)?.is_none() {
            return Ok(());
        }
        match fs::remove_file(self.chat_path(chat_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    chat_id: String,
    #[serde(default)]
    sessions: BTreeMap<String, SessionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionEntry {
    session_id: String,
    updated_at: DateTime<Utc>,
}

fn default_sessions_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".sage").join("sessions"))
        .unwrap_or_else(|| PathBuf::from(".sage").join("sessions"))
}

fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let out: String = trimmed
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '-' || lower == '_' {
                lower
            } else {
                '-'
            }
        })
        .collect();
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}
