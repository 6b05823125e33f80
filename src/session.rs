//! Session persistence: append-only turn logs keyed by session id.
//!
//! Each session is one JSONL file; every completed turn appends one line.
//! Loading replays the log to rebuild conversation history.

use crate::errors::{RagError, Result};
use crate::types::Turn;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStoreConfig {
    /// Base directory for session logs
    pub storage_dir: PathBuf,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        let storage_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragpilot")
            .join("sessions");
        Self { storage_dir }
    }
}

/// Append-only session turn store
pub struct SessionStore {
    config: SessionStoreConfig,
}

impl SessionStore {
    /// Create a store, ensuring the storage directory exists
    pub fn new(config: SessionStoreConfig) -> Result<Self> {
        if !config.storage_dir.exists() {
            std::fs::create_dir_all(&config.storage_dir)?;
        }
        Ok(Self { config })
    }

    /// Create with the default storage location
    pub fn default_config() -> Result<Self> {
        Self::new(SessionStoreConfig::default())
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.config
            .storage_dir
            .join(format!("session_{}.jsonl", session_id))
    }

    /// Append one completed turn to the session log
    pub fn append(&self, session_id: &str, turn: &Turn) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))?;

        let line = serde_json::to_string(turn)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Replay a session log into its turns, oldest first
    pub fn load(&self, session_id: &str) -> Result<Vec<Turn>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&path)?;
        let reader = BufReader::new(file);

        let mut turns = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let turn: Turn = serde_json::from_str(&line).map_err(|e| {
                RagError::Configuration(format!(
                    "Corrupt session log {}: {}",
                    path.display(),
                    e
                ))
            })?;
            turns.push(turn);
        }
        Ok(turns)
    }

    /// List all persisted session ids
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        if !self.config.storage_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.config.storage_dir)? {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(id) = name
                    .strip_prefix("session_")
                    .and_then(|rest| rest.strip_suffix(".jsonl"))
                {
                    sessions.push(id.to_string());
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}
