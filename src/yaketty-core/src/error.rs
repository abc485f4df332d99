//! Error types for the dialogue system.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum YakettyError {
    #[error("Config file '{name}' not found in {}", .dir.display())]
    ConfigNotFound { dir: PathBuf, name: String },

    #[error("File not found in local or embedded library: {0}")]
    NotFound(String),

    #[error("Embedded file not found: {0}")]
    EmbeddedNotFound(String),

    #[error("Error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid Ollama host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl YakettyError {
    /// Whether a failed chat request is worth sending again.
    pub fn is_transient(&self) -> bool {
        match self {
            YakettyError::Http(e) => !e.is_builder() && !e.is_decode(),
            YakettyError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
