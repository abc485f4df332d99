//! Transcript rendering.

use clap::ValueEnum;
use colored::Colorize;

/// How each line of the dialogue is written to stdout.
pub trait OutputStyle: Send + Sync {
    fn format(&self, name: &str, words: &str) -> String;

    fn render(&self, name: &str, words: &str) {
        print!("{}", self.format(name, words));
    }
}

/// Bold speaker name followed by the line and a blank line.
pub struct Text;

impl OutputStyle for Text {
    fn format(&self, name: &str, words: &str) -> String {
        format!("{}: {}\n\n", name.bold(), words)
    }
}

/// One JSON object per line.
pub struct Json;

impl OutputStyle for Json {
    fn format(&self, name: &str, words: &str) -> String {
        let line = serde_json::json!({ "name": name, "content": words });
        format!("{line}\n")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn style(self) -> Box<dyn OutputStyle> {
        match self {
            OutputFormat::Text => Box::new(Text),
            OutputFormat::Json => Box::new(Json),
        }
    }
}
