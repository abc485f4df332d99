//! Persona definitions.
//!
//! A persona is one side of the dialogue: who it is, which model plays it and
//! how that model samples.

use serde::{Deserialize, Serialize};

use crate::error::YakettyError;
use crate::library::{Library, LibraryKind, Resolved};
use crate::options::ModelOptions;

pub const DEFAULT_MODEL: &str = "gemma3";

/// One of the two AI characters in a dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    /// The Ollama model playing this persona (e.g. "gemma3", "llama3.2").
    pub model: String,
    /// Display name used when rendering the transcript.
    pub name: String,
    /// Character description, or a library reference before resolution.
    pub persona: String,
    /// Extra system prompts for this persona only.
    pub prompts: Vec<String>,
    pub options: ModelOptions,
}

/// Fields present in a persona file. Absent fields leave the target unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersonaFile {
    model: Option<String>,
    name: Option<String>,
    persona: Option<String>,
    prompts: Option<Vec<String>>,
    options: Option<ModelOptions>,
}

impl Persona {
    /// Create a new persona with the given name and model.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the character description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.persona = description.into();
        self
    }

    /// Set the persona-specific system prompts.
    pub fn with_prompts(mut self, prompts: Vec<String>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set the persona-specific model options.
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Overlay the fields of a persona YAML document onto this persona.
    pub fn overlay_yaml(&mut self, yaml: &str, origin: &str) -> Result<(), YakettyError> {
        let file: PersonaFile = parse_yaml(yaml, origin)?;

        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(name) = file.name {
            self.name = name;
        }
        if let Some(persona) = file.persona {
            self.persona = persona;
        }
        if let Some(prompts) = file.prompts {
            self.prompts = prompts;
        }
        if let Some(mut options) = file.options {
            options.merge(&self.options);
            self.options = options;
        }
        Ok(())
    }

    /// Resolve `reference` against the persona library. A file is overlaid onto
    /// this persona, replacing the reference; anything else becomes the
    /// description.
    pub fn apply_reference(
        &mut self,
        library: &Library,
        reference: &str,
    ) -> Result<(), YakettyError> {
        match library.resolve(LibraryKind::Personas, reference)? {
            Resolved::File { origin, content } => {
                self.persona.clear();
                self.overlay_yaml(&content, &origin)
            }
            Resolved::Inline(text) => {
                self.persona = text;
                Ok(())
            }
        }
    }
}

/// Parse YAML, treating an empty document as all defaults.
pub(crate) fn parse_yaml<T>(yaml: &str, origin: &str) -> Result<T, YakettyError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if yaml.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(yaml).map_err(|source| YakettyError::Yaml {
        origin: origin.to_string(),
        source,
    })
}
