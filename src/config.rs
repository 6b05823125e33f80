//! Configuration management for ragpilot.
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.ragpilot/config.toml

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for ragpilot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub agent: AgentConfig,
    pub paths: PathsConfig,
}

/// Ollama connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub chat_model: String,
    pub embedding_model: String,
}

/// Document chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters; must be < chunk_size
    pub overlap: usize,
}

/// Vector index backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// "qdrant" for a running Qdrant instance, "memory" for in-process
    pub backend: String,
    pub qdrant_url: String,
    pub collection: String,
    /// Embedding dimension; must match the configured embedding model
    pub dimension: usize,
}

/// Retrieval behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum number of results per retrieval
    pub top_k: usize,
    /// Minimum similarity score; results below are filtered out. Negative
    /// infinity (the default) disables the filter.
    pub min_score: f32,
    /// When true, retrieving against an empty index is an error instead of
    /// an empty result set
    pub strict_empty_index: bool,
}

/// Agent controller behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum rewrite-and-retry attempts per turn
    pub max_retries: u32,
    /// Recent turns folded into the working query as conversational context
    pub memory_turns: usize,
    /// Bound on stored conversation history
    pub max_memory_turns: usize,
    /// Per-collaborator-call deadline
    pub call_timeout_ms: u64,
    /// Retry budget for retrieval/generation collaborator failures
    pub collaborator_retries: u32,
    /// Base delay for exponential backoff between collaborator retries
    pub backoff_base_ms: u64,
    /// Relevance grader: "lexical" or "llm"
    pub grader: String,
    /// Sufficiency threshold for the lexical grader, in [0, 1]
    pub grader_threshold: f32,
}

/// File system paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state_dir: String,
    pub session_dir: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            chat_model: "qwen2.5:7b-instruct".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            overlap: 200,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: "qdrant".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "ragpilot".to_string(),
            dimension: 768,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: f32::NEG_INFINITY,
            strict_empty_index: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            memory_turns: 4,
            max_memory_turns: 100,
            call_timeout_ms: 30_000,
            collaborator_retries: 2,
            backoff_base_ms: 250,
            grader: "lexical".to_string(),
            grader_threshold: 0.3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let base = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragpilot");
        Self {
            state_dir: base.to_string_lossy().to_string(),
            session_dir: base.join("sessions").to_string_lossy().to_string(),
        }
    }
}

impl Config {
    /// Default config file location: ~/.ragpilot/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragpilot")
            .join("config.toml")
    }

    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RagError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RagError::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate parameter ranges. Called at startup; failures are fatal.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunking.overlap ({}) must be < chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Configuration(
                "retrieval.top_k must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.agent.grader_threshold) {
            return Err(RagError::Configuration(format!(
                "agent.grader_threshold ({}) must be in [0, 1]",
                self.agent.grader_threshold
            )));
        }
        if self.agent.grader != "lexical" && self.agent.grader != "llm" {
            return Err(RagError::Configuration(format!(
                "agent.grader must be \"lexical\" or \"llm\", got {:?}",
                self.agent.grader
            )));
        }
        if self.agent.call_timeout_ms == 0 {
            return Err(RagError::Configuration(
                "agent.call_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.index.backend != "qdrant" && self.index.backend != "memory" {
            return Err(RagError::Configuration(format!(
                "index.backend must be \"qdrant\" or \"memory\", got {:?}",
                self.index.backend
            )));
        }
        if self.index.dimension == 0 {
            return Err(RagError::Configuration(
                "index.dimension must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Ollama base URL from host and port
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }
}
