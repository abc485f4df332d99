//! Scenario definitions: the setting both personas share.

use serde::Deserialize;

use crate::error::YakettyError;
use crate::library::{Library, LibraryKind, Resolved};
use crate::persona::parse_yaml;

pub const DEFAULT_OPENING_PROMPT: &str =
    "Start the conversation with an appropriate greeting or opening statement for this scenario";

/// The setting of a dialogue and each side's role in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Description of the setting.
    pub scenario: String,
    /// Role for persona 1 and persona 2 respectively.
    pub roles: [String; 2],
    /// Instruction given to persona 1 for the first line only.
    pub opening_prompt: String,
    /// Persona references used when the config leaves a persona unset.
    pub default_personas: [Option<String>; 2],
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            scenario: String::new(),
            roles: Default::default(),
            opening_prompt: DEFAULT_OPENING_PROMPT.to_string(),
            default_personas: Default::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScenarioFile {
    scenario: Option<String>,
    roles: Option<Vec<String>>,
    opening_prompt: Option<String>,
    persona1: Option<String>,
    persona2: Option<String>,
}

impl Scenario {
    /// Overlay the fields of a scenario YAML document onto this scenario.
    pub fn overlay_yaml(&mut self, yaml: &str, origin: &str) -> Result<(), YakettyError> {
        let file: ScenarioFile = parse_yaml(yaml, origin)?;

        if let Some(scenario) = file.scenario {
            self.scenario = scenario;
        }
        if let Some(roles) = file.roles {
            self.set_roles(roles);
        }
        if let Some(opening) = file.opening_prompt {
            self.opening_prompt = opening;
        }
        if file.persona1.is_some() {
            self.default_personas[0] = file.persona1;
        }
        if file.persona2.is_some() {
            self.default_personas[1] = file.persona2;
        }
        Ok(())
    }

    /// Set both roles from a list; missing entries become empty.
    pub fn set_roles(&mut self, roles: Vec<String>) {
        let mut roles = roles.into_iter();
        self.roles = [
            roles.next().unwrap_or_default(),
            roles.next().unwrap_or_default(),
        ];
    }

    /// Resolve `reference` against the scenario library. A file is overlaid;
    /// anything else becomes the scenario description.
    pub fn apply_reference(
        &mut self,
        library: &Library,
        reference: &str,
    ) -> Result<(), YakettyError> {
        match library.resolve(LibraryKind::Scenarios, reference)? {
            Resolved::File { origin, content } => {
                self.scenario.clear();
                self.overlay_yaml(&content, &origin)
            }
            Resolved::Inline(text) => {
                self.scenario = text;
                Ok(())
            }
        }
    }
}
