//! Model sampling options passed through to Ollama.
//!
//! Every field is optional so that persona, shared and built-in layers can be
//! merged without mistaking an explicit value for an unset one.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NUM_CTX: i64 = 8192;
pub const DEFAULT_REPEAT_LAST_N: i64 = -1;
pub const DEFAULT_REPEAT_PENALTY: f32 = 1.1;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TOP_K: i64 = 40;
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Generation options for a single persona.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Size of the context window used to generate the next token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Stop sequences; generation halts when one is produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ModelOptions {
    /// Built-in defaults.
    pub fn defaults() -> Self {
        Self {
            num_ctx: Some(DEFAULT_NUM_CTX),
            repeat_last_n: Some(DEFAULT_REPEAT_LAST_N),
            repeat_penalty: Some(DEFAULT_REPEAT_PENALTY),
            temperature: Some(DEFAULT_TEMPERATURE),
            stop: Some(Vec::new()),
            top_k: Some(DEFAULT_TOP_K),
            top_p: Some(DEFAULT_TOP_P),
        }
    }

    /// Fill every unset field from `fallback`. Set fields are kept.
    pub fn merge(&mut self, fallback: &ModelOptions) {
        fill(&mut self.num_ctx, &fallback.num_ctx);
        fill(&mut self.repeat_last_n, &fallback.repeat_last_n);
        fill(&mut self.repeat_penalty, &fallback.repeat_penalty);
        fill(&mut self.temperature, &fallback.temperature);
        fill(&mut self.stop, &fallback.stop);
        fill(&mut self.top_k, &fallback.top_k);
        fill(&mut self.top_p, &fallback.top_p);
    }

    /// Return a copy with every unset field taken from the built-in defaults.
    pub fn with_defaults(mut self) -> Self {
        self.merge(&Self::defaults());
        self
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, fallback: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(fallback);
    }
}
