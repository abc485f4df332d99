//! Configuration module for loading YAML dialogue configs.
//!
//! Layers, lowest precedence first: built-in defaults, the config file, the
//! scenario and persona files it references, then command-line overrides.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::YakettyError;
use crate::library::{Library, LibraryKind};
use crate::options::ModelOptions;
use crate::persona::{DEFAULT_MODEL, Persona, parse_yaml};
use crate::scenario::Scenario;

pub const DEFAULT_PERSONA1_NAME: &str = "Jane";
pub const DEFAULT_PERSONA2_NAME: &str = "John";

const CONFIG_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Fully resolved dialogue configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub scenario: Scenario,
    /// Extra system prompts sent to both personas.
    pub prompts: Vec<String>,
    pub persona1: Persona,
    pub persona2: Persona,
    /// Stop after this many recorded lines.
    pub max_turns: Option<usize>,
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub scenario: Option<String>,
    pub scenarios: Option<PathBuf>,
    pub persona1: Option<String>,
    pub persona2: Option<String>,
    pub personas: Option<PathBuf>,
    pub opening: Option<String>,
    pub model: Option<String>,
    /// Appended to the config file's prompts.
    pub prompts: Vec<String>,
    /// Shared options; win over the config file's shared options.
    pub options: ModelOptions,
    pub max_turns: Option<usize>,
}

/// Config file contents as written.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    scenario: Option<String>,
    roles: Option<Vec<String>>,
    opening_prompt: Option<String>,
    prompts: Vec<String>,
    persona1: Persona,
    persona2: Persona,
    options: ModelOptions,
    model: Option<String>,
    max_turns: Option<usize>,
    personas: Option<PathBuf>,
    scenarios: Option<PathBuf>,
}

impl Config {
    /// Load configuration `name` from directory `dir`, applying `overrides`.
    pub fn load<P: AsRef<Path>>(
        dir: P,
        name: &str,
        overrides: &Overrides,
    ) -> Result<Self, YakettyError> {
        let path = locate(dir.as_ref(), name)?;
        debug!(filename = %path.display(), "loading config");

        let content = fs::read_to_string(&path).map_err(|source| YakettyError::Io {
            path: path.clone(),
            source,
        })?;

        Self::from_str(&content, &path.display().to_string(), overrides)
    }

    /// Build configuration from YAML content.
    pub fn from_str(
        content: &str,
        origin: &str,
        overrides: &Overrides,
    ) -> Result<Self, YakettyError> {
        let file: ConfigFile = parse_yaml(content, origin)?;
        debug!(config = ?file, "config as written");

        let library = Library::new(
            overrides
                .personas
                .clone()
                .or(file.personas)
                .unwrap_or_else(|| PathBuf::from(LibraryKind::Personas.dir_name())),
            overrides
                .scenarios
                .clone()
                .or(file.scenarios)
                .unwrap_or_else(|| PathBuf::from(LibraryKind::Scenarios.dir_name())),
        );

        let mut scenario = Scenario::default();
        if let Some(reference) = overrides.scenario.as_ref().or(file.scenario.as_ref()) {
            scenario.apply_reference(&library, reference)?;
        }
        if let Some(roles) = file.roles {
            scenario.set_roles(roles);
        }
        if let Some(opening) = file.opening_prompt {
            scenario.opening_prompt = opening;
        }

        let mut personas = [file.persona1, file.persona2];
        let cli_personas = [&overrides.persona1, &overrides.persona2];
        for (i, persona) in personas.iter_mut().enumerate() {
            // Scenario defaults only fill a persona nobody else named.
            let reference = if !persona.persona.is_empty() {
                persona.persona.clone()
            } else if cli_personas[i].is_none() {
                scenario.default_personas[i].clone().unwrap_or_default()
            } else {
                String::new()
            };
            if !reference.is_empty() {
                debug!(persona = i + 1, reference = %reference, "resolving persona");
                persona.apply_reference(&library, &reference)?;
            }

            if let Some(reference) = cli_personas[i] {
                debug!(persona = i + 1, reference = %reference, "applying persona override");
                persona.apply_reference(&library, reference)?;
            }
        }

        if let Some(opening) = &overrides.opening {
            scenario.opening_prompt = opening.clone();
        }

        let mut prompts = file.prompts;
        prompts.extend(overrides.prompts.iter().cloned());

        let mut shared = overrides.options.clone();
        shared.merge(&file.options);

        let global_model = overrides.model.clone().or(file.model);
        let default_names = [DEFAULT_PERSONA1_NAME, DEFAULT_PERSONA2_NAME];
        for (persona, default_name) in personas.iter_mut().zip(default_names) {
            if persona.name.is_empty() {
                persona.name = default_name.to_string();
            }
            if persona.model.is_empty() {
                persona.model = DEFAULT_MODEL.to_string();
            }
            persona.options.merge(&shared);
            persona.options = std::mem::take(&mut persona.options).with_defaults();

            if let Some(model) = &global_model {
                persona.model = model.clone();
            }
        }
        if let Some(model) = &global_model {
            debug!(model = %model, "applied global model override");
        }

        let [persona1, persona2] = personas;
        let config = Config {
            scenario,
            prompts,
            persona1,
            persona2,
            max_turns: overrides.max_turns.or(file.max_turns),
        };
        debug!(config = ?config, "resolved config");
        Ok(config)
    }
}

/// Find the config file: `dir/name` as given, else with a YAML extension.
fn locate(dir: &Path, name: &str) -> Result<PathBuf, YakettyError> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Ok(exact);
    }

    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| YakettyError::ConfigNotFound {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        })
}
