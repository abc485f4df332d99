//! Persona and scenario library.
//!
//! Files are looked up in a local directory first so users can add or override
//! entries, then in the copy of the library embedded in the binary.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::YakettyError;

const YAML_EXTENSION: &str = ".yaml";

static EMBEDDED: &[(&str, &str)] = &[
    ("personas/barista.yaml", include_str!("../library/personas/barista.yaml")),
    ("personas/detective.yaml", include_str!("../library/personas/detective.yaml")),
    ("personas/philosopher.yaml", include_str!("../library/personas/philosopher.yaml")),
    ("personas/pirate.yaml", include_str!("../library/personas/pirate.yaml")),
    ("personas/student.yaml", include_str!("../library/personas/student.yaml")),
    ("personas/suspect.yaml", include_str!("../library/personas/suspect.yaml")),
    ("scenarios/agora.yaml", include_str!("../library/scenarios/agora.yaml")),
    ("scenarios/coffee-shop.yaml", include_str!("../library/scenarios/coffee-shop.yaml")),
    ("scenarios/interrogation.yaml", include_str!("../library/scenarios/interrogation.yaml")),
    ("scenarios/treasure.yaml", include_str!("../library/scenarios/treasure.yaml")),
];

/// The two kinds of library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryKind {
    Personas,
    Scenarios,
}

impl LibraryKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            LibraryKind::Personas => "personas",
            LibraryKind::Scenarios => "scenarios",
        }
    }
}

/// Result of resolving a persona or scenario reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The reference named a file; `origin` says where it was found.
    File { origin: String, content: String },
    /// The reference matched no file and is used verbatim.
    Inline(String),
}

/// Local library directories.
#[derive(Debug, Clone)]
pub struct Library {
    personas: PathBuf,
    scenarios: PathBuf,
}

impl Default for Library {
    fn default() -> Self {
        Self::new(
            LibraryKind::Personas.dir_name(),
            LibraryKind::Scenarios.dir_name(),
        )
    }
}

impl Library {
    pub fn new(personas: impl Into<PathBuf>, scenarios: impl Into<PathBuf>) -> Self {
        Self {
            personas: personas.into(),
            scenarios: scenarios.into(),
        }
    }

    /// Local directory for `kind`.
    pub fn dir(&self, kind: LibraryKind) -> &Path {
        match kind {
            LibraryKind::Personas => &self.personas,
            LibraryKind::Scenarios => &self.scenarios,
        }
    }

    /// Read `filename` from the local directory, falling back to the embedded
    /// library. Local errors other than not-found are reported.
    pub fn read(&self, kind: LibraryKind, filename: &str) -> Result<String, YakettyError> {
        let local = self.dir(kind).join(filename);
        match fs::read_to_string(&local) {
            Ok(content) => {
                debug!(path = %local.display(), "loaded file from local library");
                return Ok(content);
            }
            Err(e) if e.kind() != ErrorKind::NotFound => {
                return Err(YakettyError::Io {
                    path: local,
                    source: e,
                });
            }
            Err(_) => {}
        }

        let key = embedded_key(kind, filename);
        let content =
            lookup_embedded(&key).ok_or_else(|| YakettyError::NotFound(filename.to_string()))?;
        debug!(path = %key, "loaded file from embedded library");
        Ok(content.to_string())
    }

    /// Whether `filename` exists in either tier.
    pub fn exists(&self, kind: LibraryKind, filename: &str) -> bool {
        self.dir(kind).join(filename).is_file()
            || lookup_embedded(&embedded_key(kind, filename)).is_some()
    }

    /// Resolve a reference: a direct path is read (errors propagate), a
    /// library name is looked up with `.yaml` appended when missing, and
    /// anything else is returned as inline text.
    pub fn resolve(&self, kind: LibraryKind, reference: &str) -> Result<Resolved, YakettyError> {
        if is_direct_path(reference) {
            debug!(path = reference, kind = kind.dir_name(), "loading from direct path");
            let content = read_path(Path::new(reference))?;
            return Ok(Resolved::File {
                origin: reference.to_string(),
                content,
            });
        }

        let filename = yaml_filename(reference);
        if self.exists(kind, &filename) {
            debug!(name = reference, kind = kind.dir_name(), "loading from library");
            let content = self.read(kind, &filename)?;
            return Ok(Resolved::File {
                origin: self.dir(kind).join(&filename).display().to_string(),
                content,
            });
        }

        Ok(Resolved::Inline(reference.to_string()))
    }
}

/// Read a direct path from disk, falling back to the embedded library under
/// the same relative path (e.g. `personas/pirate.yaml`).
pub fn read_path(path: &Path) -> Result<String, YakettyError> {
    match fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "loaded file from direct path");
            Ok(content)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let key = path.to_string_lossy().replace('\\', "/");
            let key = key.trim_start_matches("./");
            match lookup_embedded(key) {
                Some(content) => {
                    debug!(path = key, "loaded file from embedded library");
                    Ok(content.to_string())
                }
                None => Err(YakettyError::NotFound(path.display().to_string())),
            }
        }
        Err(e) => Err(YakettyError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Names of the embedded entries of `kind`, without extension, sorted.
pub fn list(kind: LibraryKind) -> Vec<&'static str> {
    let prefix = format!("{}/", kind.dir_name());
    let mut names: Vec<&'static str> = EMBEDDED
        .iter()
        .filter_map(|(key, _)| key.strip_prefix(prefix.as_str()))
        .filter_map(|file| file.strip_suffix(YAML_EXTENSION))
        .collect();
    names.sort_unstable();
    names
}

/// Embedded content for `name`, ignoring the local directory.
pub fn embedded(kind: LibraryKind, name: &str) -> Result<&'static str, YakettyError> {
    lookup_embedded(&embedded_key(kind, &yaml_filename(name)))
        .ok_or_else(|| YakettyError::EmbeddedNotFound(name.to_string()))
}

/// Text containing whitespace is never a path. Otherwise absolute paths and
/// paths with a separator are direct, and a bare `*.yaml` name is direct only
/// when it exists in the working directory.
pub fn is_direct_path(reference: &str) -> bool {
    if reference.is_empty() || reference.contains(char::is_whitespace) {
        return false;
    }

    let path = Path::new(reference);
    if path.is_absolute()
        || reference.contains(std::path::MAIN_SEPARATOR)
        || reference.contains('/')
    {
        return true;
    }

    reference.ends_with(YAML_EXTENSION) && path.is_file()
}

fn yaml_filename(name: &str) -> String {
    if name.ends_with(YAML_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{YAML_EXTENSION}")
    }
}

fn embedded_key(kind: LibraryKind, filename: &str) -> String {
    format!("{}/{}", kind.dir_name(), filename)
}

fn lookup_embedded(key: &str) -> Option<&'static str> {
    EMBEDDED
        .iter()
        .find(|(path, _)| *path == key)
        .map(|(_, content)| *content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_library() -> (tempfile::TempDir, Library) {
        let dir = tempfile::TempDir::new().unwrap();
        let personas = dir.path().join("personas");
        let scenarios = dir.path().join("scenarios");
        fs::create_dir_all(&personas).unwrap();
        fs::create_dir_all(&scenarios).unwrap();
        (dir, Library::new(personas, scenarios))
    }

    #[test]
    fn test_local_file_overrides_embedded() {
        let (_dir, library) = temp_library();
        fs::write(
            library.dir(LibraryKind::Personas).join("pirate.yaml"),
            "name: Local Pete\n",
        )
        .unwrap();

        let content = library.read(LibraryKind::Personas, "pirate.yaml").unwrap();
        assert_eq!(content, "name: Local Pete\n");
    }

    #[test]
    fn test_falls_back_to_embedded() {
        let (_dir, library) = temp_library();
        let content = library.read(LibraryKind::Personas, "pirate.yaml").unwrap();
        assert!(content.contains("Captain Redbeard"));
    }

    #[test]
    fn test_missing_everywhere() {
        let (_dir, library) = temp_library();
        let err = library
            .read(LibraryKind::Scenarios, "nowhere.yaml")
            .unwrap_err();
        assert!(matches!(err, YakettyError::NotFound(name) if name == "nowhere.yaml"));
        assert!(!library.exists(LibraryKind::Scenarios, "nowhere.yaml"));
    }

    #[test]
    fn test_exists_checks_both_tiers() {
        let (_dir, library) = temp_library();
        fs::write(
            library.dir(LibraryKind::Scenarios).join("garden.yaml"),
            "scenario: A garden\n",
        )
        .unwrap();

        assert!(library.exists(LibraryKind::Scenarios, "garden.yaml"));
        assert!(library.exists(LibraryKind::Scenarios, "agora.yaml"));
        assert!(!library.exists(LibraryKind::Personas, "garden.yaml"));
    }

    #[test]
    fn test_resolve_library_name_adds_extension() {
        let (_dir, library) = temp_library();
        match library.resolve(LibraryKind::Personas, "detective").unwrap() {
            Resolved::File { content, .. } => assert!(content.contains("Inspector Hale")),
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_name_is_inline() {
        let (_dir, library) = temp_library();
        let resolved = library
            .resolve(LibraryKind::Personas, "A grumpy lighthouse keeper")
            .unwrap();
        assert_eq!(
            resolved,
            Resolved::Inline("A grumpy lighthouse keeper".to_string())
        );
    }

    #[test]
    fn test_resolve_direct_path() {
        let (dir, library) = temp_library();
        let path = dir.path().join("custom.yaml");
        fs::write(&path, "name: Custom\n").unwrap();

        let resolved = library
            .resolve(LibraryKind::Personas, path.to_str().unwrap())
            .unwrap();
        assert!(matches!(resolved, Resolved::File { content, .. } if content == "name: Custom\n"));
    }

    #[test]
    fn test_resolve_missing_direct_path_is_error() {
        let (dir, library) = temp_library();
        let path = dir.path().join("missing.yaml");
        let err = library
            .resolve(LibraryKind::Personas, path.to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, YakettyError::NotFound(_)));
    }

    #[test]
    fn test_read_path_falls_back_to_embedded() {
        let content = read_path(Path::new("scenarios/treasure.yaml")).unwrap();
        assert!(content.contains("Port Royal"));
    }

    #[test]
    fn test_is_direct_path() {
        assert!(is_direct_path("/etc/yaketty/pirate.yaml"));
        assert!(is_direct_path("personas/pirate.yaml"));
        assert!(!is_direct_path("pirate"));
        assert!(!is_direct_path("pirate.yaml"));
        assert!(!is_direct_path("A pirate who loves parrots"));
        assert!(!is_direct_path("A sailor and/or smuggler"));
    }

    #[test]
    fn test_list_embedded() {
        let personas = list(LibraryKind::Personas);
        assert_eq!(
            personas,
            vec!["barista", "detective", "philosopher", "pirate", "student", "suspect"]
        );
        let scenarios = list(LibraryKind::Scenarios);
        assert_eq!(scenarios, vec!["agora", "coffee-shop", "interrogation", "treasure"]);
    }

    #[test]
    fn test_embedded_lookup() {
        assert!(embedded(LibraryKind::Scenarios, "agora").is_ok());
        assert!(embedded(LibraryKind::Scenarios, "agora.yaml").is_ok());
        assert!(matches!(
            embedded(LibraryKind::Personas, "agora"),
            Err(YakettyError::EmbeddedNotFound(_))
        ));
    }
}
