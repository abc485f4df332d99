//! Dialogue orchestration logic.
//!
//! Drives the turn-taking loop between the two personas: every reply is
//! recorded and immediately answered by the opposing persona, each seeing the
//! history from its own perspective.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ChatBackend, ChatMessage, ChatRequest, Role};
use crate::config::Config;
use crate::error::YakettyError;
use crate::persona::Persona;
use crate::scenario::Scenario;

/// Inject [`PERIODIC_REMINDER`] whenever the history length is a multiple of
/// this.
pub const REMINDER_INTERVAL: usize = 12;

/// Recorded in place of an empty reply.
pub const EMPTY_REPLY: &str = "...";

pub const BASE_PROMPT: &str = "You are playing a character in a dialogue scenario. The user represents the other character.

Embody your assigned persona completely - adopt their knowledge, beliefs, vocabulary, mannerisms, and communication style.
Build meaningfully on previous exchanges and provide responses that advance the dialogue.
Stay authentic to your character's worldview and never break character or make meta-commentary about being AI.
Keep your statements and responses brief and relevant to the scenario; avoid monologues.
Expect the other character to respond appropriately to the scenario, and remember that you're conversing with them.
Never repeat yourself unless explicitly prompted.
*SPEAK* as your character.

Your character details and scenario context follow.";

pub const PERIODIC_REMINDER: &str =
    "Remember: stay true to your character and the scenario context.";

/// Which side of the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotId {
    Persona1,
    Persona2,
}

impl BotId {
    pub fn opponent(self) -> Self {
        match self {
            BotId::Persona1 => BotId::Persona2,
            BotId::Persona2 => BotId::Persona1,
        }
    }

    fn index(self) -> usize {
        match self {
            BotId::Persona1 => 0,
            BotId::Persona2 => 1,
        }
    }
}

/// A line in the dialogue transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueMessage {
    pub speaker: BotId,
    pub speaker_name: String,
    pub content: String,
}

/// Why a dialogue stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// An empty reply followed an earlier empty reply.
    Exhausted,
    /// The configured number of lines was reached.
    TurnLimit,
}

/// Events emitted during a dialogue.
#[derive(Debug, Clone)]
pub enum DialogueEvent {
    /// A persona said something.
    Message { name: String, content: String },
    /// The dialogue has concluded.
    End(EndReason),
}

/// Callback for dialogue events.
pub type DialogueCallback = Box<dyn Fn(DialogueEvent) + Send + Sync>;

/// Orchestrates the dialogue between two personas.
pub struct Dialogue {
    scenario: Scenario,
    extra_prompts: Vec<String>,
    personas: [Persona; 2],
    max_turns: Option<usize>,
    backend: Box<dyn ChatBackend>,
    transcript: Vec<DialogueMessage>,
    /// Whether the latest line was a placeholder for an empty reply.
    last_was_empty: bool,
    callback: Option<DialogueCallback>,
}

impl Dialogue {
    pub fn new(config: Config, backend: Box<dyn ChatBackend>) -> Self {
        Self {
            scenario: config.scenario,
            extra_prompts: config.prompts,
            personas: [config.persona1, config.persona2],
            max_turns: config.max_turns,
            backend,
            transcript: Vec::new(),
            last_was_empty: false,
            callback: None,
        }
    }

    /// Set a callback for dialogue events.
    pub fn with_callback(mut self, callback: DialogueCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn persona(&self, bot: BotId) -> &Persona {
        &self.personas[bot.index()]
    }

    /// Run the dialogue until it is exhausted, hits the turn limit, or a
    /// request fails.
    pub async fn run(&mut self) -> Result<Vec<DialogueMessage>, YakettyError> {
        let mut speaker = BotId::Persona1;
        let mut request = self.opening_request();
        debug!(perspective = %self.persona(speaker).name, ?request, "sending opening request");

        let reason = loop {
            let response = self.backend.chat(&request).await?;
            if let Some(reason) = self.handle_reply(speaker, &response.message.content) {
                break reason;
            }

            speaker = speaker.opponent();
            request = self.from_perspective(speaker);
            debug!(perspective = %self.persona(speaker).name, ?request, "sending chat request");
        };

        info!(?reason, lines = self.transcript.len(), "dialogue ended");
        self.emit_event(DialogueEvent::End(reason));
        Ok(self.transcript.clone())
    }

    /// Record a reply from `speaker`. Returns a reason when the dialogue
    /// should stop.
    fn handle_reply(&mut self, speaker: BotId, raw: &str) -> Option<EndReason> {
        let content = sanitize_response(raw);

        if content.is_empty() {
            if self.last_was_empty {
                return Some(EndReason::Exhausted);
            }
            debug!(perspective = %self.persona(speaker).name, "empty reply");
            self.last_was_empty = true;
            self.add_message(speaker, EMPTY_REPLY.to_string());
        } else {
            self.last_was_empty = false;
            self.add_message(speaker, content);
        }

        match self.max_turns {
            Some(limit) if self.transcript.len() >= limit => Some(EndReason::TurnLimit),
            _ => None,
        }
    }

    fn add_message(&mut self, speaker: BotId, content: String) {
        let name = self.persona(speaker).name.clone();
        self.emit_event(DialogueEvent::Message {
            name: name.clone(),
            content: content.clone(),
        });
        self.transcript.push(DialogueMessage {
            speaker,
            speaker_name: name,
            content,
        });
    }

    /// System prompts for `bot`, excluding the opening prompt.
    fn system_prompts(&self, bot: BotId, reminder: bool) -> Vec<String> {
        let persona = self.persona(bot);
        let mut prompts = Vec::with_capacity(5 + persona.prompts.len() + self.extra_prompts.len());

        prompts.push(BASE_PROMPT.to_string());
        prompts.push(self.scenario.scenario.clone());
        prompts.push(persona.persona.clone());
        prompts.push(self.scenario.roles[bot.index()].clone());
        if reminder {
            prompts.push(PERIODIC_REMINDER.to_string());
        }
        prompts.extend(persona.prompts.iter().cloned());
        prompts.extend(self.extra_prompts.iter().cloned());

        prompts.retain(|p| !p.trim().is_empty());
        prompts
    }

    fn request(&self, bot: BotId, messages: Vec<ChatMessage>) -> ChatRequest {
        let persona = self.persona(bot);
        ChatRequest {
            model: persona.model.clone(),
            messages,
            stream: false,
            options: persona.options.clone(),
        }
    }

    /// The first request: persona 1's system prompts plus the opening prompt.
    pub fn opening_request(&self) -> ChatRequest {
        let mut prompts = self.system_prompts(BotId::Persona1, false);
        if !self.scenario.opening_prompt.trim().is_empty() {
            prompts.push(self.scenario.opening_prompt.clone());
        }

        let messages = prompts.into_iter().map(ChatMessage::system).collect();
        self.request(BotId::Persona1, messages)
    }

    /// The next request for `bot`: its system prompts followed by the history,
    /// with its own lines as the assistant and the other side's as the user.
    pub fn from_perspective(&self, bot: BotId) -> ChatRequest {
        let history = self.transcript.len();
        let reminder = history > 0 && history % REMINDER_INTERVAL == 0;

        let mut messages: Vec<ChatMessage> = self
            .system_prompts(bot, reminder)
            .into_iter()
            .map(ChatMessage::system)
            .collect();
        messages.reserve(history);

        for line in &self.transcript {
            let role = if line.speaker == bot {
                Role::Assistant
            } else {
                Role::User
            };
            messages.push(ChatMessage::new(role, line.content.clone()));
        }

        self.request(bot, messages)
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: DialogueEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    /// Get the full transcript.
    pub fn transcript(&self) -> &[DialogueMessage] {
        &self.transcript
    }
}

/// Tags whose content is the model's reasoning, not part of the reply.
const REASONING_TAGS: [&str; 4] = ["think", "thinking", "reasoning", "reflection"];

/// Strip reasoning blocks such as `<think>...</think>` and surrounding
/// whitespace from a reply.
pub fn sanitize_response(response: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        let any_tag = REASONING_TAGS.join("|");
        let mut patterns: Vec<Regex> = REASONING_TAGS
            .iter()
            .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok())
            .collect();
        // A reply cut off by `stop` or the context window leaves its block open.
        patterns.extend(Regex::new(&format!(r"(?is)<(?:{any_tag})\b[^>]*>.*$")).ok());
        patterns.extend(Regex::new(&format!(r"(?i)</(?:{any_tag})\s*>")).ok());
        patterns
    });

    let mut result = response.to_string();
    for re in patterns {
        result = re.replace_all(&result, "").into_owned();
    }
    result.trim().to_string()
}
