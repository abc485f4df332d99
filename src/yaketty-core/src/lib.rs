//! yaketty core library
//!
//! Scripted two-persona dialogues over the Ollama chat API: persona and
//! scenario library, layered configuration, and the turn-taking driver.

pub mod client;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod library;
pub mod options;
pub mod persona;
pub mod scenario;

pub use client::{ChatBackend, ChatMessage, ChatRequest, ChatResponse, OllamaClient, Role};
pub use config::{Config, Overrides};
pub use dialogue::{BotId, Dialogue, DialogueEvent, DialogueMessage, EndReason};
pub use error::YakettyError;
pub use library::{Library, LibraryKind};
pub use options::ModelOptions;
pub use persona::Persona;
pub use scenario::Scenario;
