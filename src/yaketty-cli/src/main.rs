//! yaketty CLI
//!
//! Runs a scripted dialogue between two AI personas using a local or remote
//! Ollama server.

mod output;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yaketty_core::library::{self, LibraryKind};
use yaketty_core::{
    Config, Dialogue, DialogueEvent, EndReason, ModelOptions, OllamaClient, Overrides,
};

use output::{OutputFormat, OutputStyle};

#[derive(Parser, Debug)]
#[command(
    name = "yaketty",
    version,
    about = "A CLI for driving conversational AI models",
    long_about = "Orchestrates dialogues between two personas using the Ollama API. \
                  Two models play different characters in a scenario, each answering the other in turn.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Dialogue config name or file, looked up in the config directory
    #[arg(value_name = "CONFIG")]
    config: Option<String>,

    /// Override the scenario (library name, file path, or description)
    #[arg(short, long)]
    scenario: Option<String>,

    /// The path to library scenarios [default: scenarios]
    #[arg(short = 'S', long)]
    scenarios: Option<PathBuf>,

    /// Additional system prompts for the dialogue
    #[arg(short, long, action = ArgAction::Append, value_delimiter = ',')]
    prompts: Vec<String>,

    /// Override the persona for the first bot
    #[arg(short = '1', long)]
    persona1: Option<String>,

    /// Override the persona for the second bot
    #[arg(short = '2', long)]
    persona2: Option<String>,

    /// The path to library personas [default: personas]
    #[arg(short = 'P', long)]
    personas: Option<PathBuf>,

    /// Opening prompt for the first persona
    #[arg(short, long)]
    opening: Option<String>,

    /// Override the model for both personas
    #[arg(short, long)]
    model: Option<String>,

    /// The directory holding the configuration file
    #[arg(short = 'c', long, default_value = ".")]
    path: PathBuf,

    /// Size of the context window used to generate the next token [default: 8192]
    #[arg(long, value_name = "TOKENS")]
    context: Option<i64>,

    /// How far back to look to prevent repetition (-1 = context size) [default: -1]
    #[arg(long, allow_hyphen_values = true)]
    repeat_last_n: Option<i64>,

    /// How strongly to penalize repetitions [default: 1.1]
    #[arg(long)]
    repeat_penalty: Option<f32>,

    /// Temperature of the model: increase to answer more creatively [default: 0.8]
    #[arg(long)]
    temperature: Option<f32>,

    /// Stop sequences that end a reply
    #[arg(long, action = ArgAction::Append, value_delimiter = ',')]
    stop: Vec<String>,

    /// Higher (e.g. 100) gives more diverse answers, lower (e.g. 10) more
    /// conservative [default: 40]
    #[arg(long)]
    top_k: Option<i64>,

    /// Higher (e.g. 0.95) gives more diverse text, lower (e.g. 0.5) more focused [default: 0.9]
    #[arg(long)]
    top_p: Option<f32>,

    /// Stop after this many lines of dialogue
    #[arg(long, value_name = "LINES")]
    max_turns: Option<usize>,

    /// Transcript format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long = "verbosity", action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List all available embedded personas
    ListPersonas,
    /// List all available embedded scenarios
    ListScenarios,
    /// Display the contents of an embedded persona
    ShowPersona {
        /// Persona name, without the .yaml extension
        name: String,
    },
    /// Display the contents of an embedded scenario
    ShowScenario {
        /// Scenario name, without the .yaml extension
        name: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            scenario: self.scenario.clone(),
            scenarios: self.scenarios.clone(),
            persona1: self.persona1.clone(),
            persona2: self.persona2.clone(),
            personas: self.personas.clone(),
            opening: self.opening.clone(),
            model: self.model.clone(),
            prompts: self.prompts.clone(),
            options: ModelOptions {
                num_ctx: self.context,
                repeat_last_n: self.repeat_last_n,
                repeat_penalty: self.repeat_penalty,
                temperature: self.temperature,
                stop: (!self.stop.is_empty()).then(|| self.stop.clone()),
                top_k: self.top_k,
                top_p: self.top_p,
            },
            max_turns: self.max_turns,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables (OLLAMA_HOST) from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(command) = &cli.command {
        run_library_command(command)?;
        return Ok(());
    }

    let Some(name) = cli.config.as_deref() else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a dialogue CONFIG is required unless a subcommand is given",
            )
            .exit();
    };

    let config = Config::load(&cli.path, name, &cli.overrides())?;
    let client = OllamaClient::from_env()?;
    info!(host = %client.base_url(), "using Ollama server");

    let mut dialogue =
        Dialogue::new(config, Box::new(client)).with_callback(console_callback(cli.format.style()));

    tokio::select! {
        result = dialogue.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    Ok(())
}

fn run_library_command(command: &Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::ListPersonas => library::list(LibraryKind::Personas)
            .iter()
            .for_each(|name| println!("{name}")),
        Command::ListScenarios => library::list(LibraryKind::Scenarios)
            .iter()
            .for_each(|name| println!("{name}")),
        Command::ShowPersona { name } => {
            print!("{}", library::embedded(LibraryKind::Personas, name)?)
        }
        Command::ShowScenario { name } => {
            print!("{}", library::embedded(LibraryKind::Scenarios, name)?)
        }
    }
    Ok(())
}

/// Log to stderr: warnings by default, more with each `-v`. `RUST_LOG` wins.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

/// Create a callback that renders dialogue events to the console.
fn console_callback(style: Box<dyn OutputStyle>) -> Box<dyn Fn(DialogueEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DialogueEvent::Message { name, content } => style.render(&name, &content),
        DialogueEvent::End(EndReason::Exhausted) => {
            eprintln!("{}", "Both personas have run out of things to say.".dimmed());
        }
        DialogueEvent::End(EndReason::TurnLimit) => {
            eprintln!("{}", "Turn limit reached.".dimmed());
        }
    })
}
