//! # Manifest Module
//!
//! File-backed scanner: reads raw routes and commands from a YAML or JSON
//! manifest and hands them to [`Registry::setup`](crate::registry::Registry::setup).
//!
//! ## Format
//!
//! ```yaml
//! routes:
//!   - name: users.show
//!     path: /users/{id}
//!     methods: [GET]
//!     target: UserController::show
//!     parameters:
//!       - name: id
//!         pattern: '\d+'
//!         cast: integer
//!     middleware:
//!       matched: [auth]
//!
//! commands:
//!   - name: deploy
//!     signature: "deploy {env} {--dry-run}"
//!     description: Deploy the current build
//!     target: DeployCommand
//! ```
//!
//! Placeholders without an entry under `parameters` are declared with the
//! defaults for their kind (a single path segment for routes, one token for
//! commands). Files ending in `.json` are parsed as JSON, anything else as
//! YAML.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::compiler::{placeholder_names, Syntax};
use crate::definition::{
    CommandDefinition, Parameter, RawCommand, RawRoute, RouteDefinition, StageMiddleware,
    TargetRef, TypeCaster, DEFAULT_ARGUMENT_PATTERN, DEFAULT_SEGMENT_PATTERN,
};
use crate::error::{ManifestError, ScanError};
use crate::registry::Scanner;

/// Parsed manifest file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub routes: Vec<ManifestRoute>,
    #[serde(default)]
    pub commands: Vec<ManifestCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestRoute {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    pub target: String,
    #[serde(default)]
    pub parameters: Vec<ManifestParameter>,
    #[serde(default)]
    pub middleware: StageMiddleware,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestCommand {
    pub name: String,
    pub signature: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target: String,
    #[serde(default)]
    pub parameters: Vec<ManifestParameter>,
    #[serde(default)]
    pub middleware: StageMiddleware,
}

/// Parameter entry; every field but `name` falls back to the kind's default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestParameter {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub capture: Option<bool>,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub cast: TypeCaster,
}

impl ManifestParameter {
    fn into_parameter(self, default_pattern: &str) -> Parameter {
        let mut param = Parameter::new(self.name)
            .pattern(self.pattern.unwrap_or_else(|| default_pattern.to_string()))
            .cast(self.cast);
        param.is_optional = self.optional;
        param.is_repeatable = self.repeatable;
        param.should_capture = self.capture.unwrap_or(true);
        param.default_value = self.default;
        param
    }
}

/// Declared parameters in manifest order, followed by defaults for any
/// placeholder the manifest left undeclared.
fn declare_parameters(
    name: &str,
    template: &str,
    syntax: Syntax,
    declared: Vec<ManifestParameter>,
) -> Result<Vec<Parameter>, ManifestError> {
    let default_pattern = match syntax {
        Syntax::Route => DEFAULT_SEGMENT_PATTERN,
        Syntax::Command => DEFAULT_ARGUMENT_PATTERN,
    };
    let placeholders =
        placeholder_names(template, syntax).map_err(|source| ManifestError::Template {
            name: name.to_string(),
            source,
        })?;

    let mut parameters: Vec<Parameter> = declared
        .into_iter()
        .map(|p| p.into_parameter(default_pattern))
        .collect();
    for (placeholder, _) in placeholders {
        if !parameters.iter().any(|p| p.name == placeholder) {
            parameters.push(Parameter::new(placeholder).pattern(default_pattern));
        }
    }
    Ok(parameters)
}

impl ManifestRoute {
    /// Convert into the raw form the compiler consumes.
    ///
    /// # Errors
    ///
    /// An unknown HTTP method or a malformed path template.
    pub fn into_raw(self) -> Result<RawRoute, ManifestError> {
        let methods = self
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                    ManifestError::Method {
                        route: self.name.clone(),
                        method: m.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = declare_parameters(&self.name, &self.path, Syntax::Route, self.parameters)?;

        Ok(RawRoute {
            name: self.name,
            template: self.path,
            methods,
            parameters,
            middleware: self.middleware,
            target: TargetRef::new(self.target),
        })
    }
}

impl ManifestCommand {
    /// Convert into the raw form the compiler consumes.
    ///
    /// # Errors
    ///
    /// A malformed command signature.
    pub fn into_raw(self) -> Result<RawCommand, ManifestError> {
        let parameters =
            declare_parameters(&self.name, &self.signature, Syntax::Command, self.parameters)?;
        Ok(RawCommand {
            name: self.name,
            template: self.signature,
            description: self.description,
            parameters,
            middleware: self.middleware,
            target: TargetRef::new(self.target),
        })
    }
}

impl Manifest {
    /// Read a manifest file, choosing the parser by extension.
    ///
    /// # Errors
    ///
    /// IO failures and parse errors, with the offending path.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let manifest: Manifest = if is_json {
            serde_json::from_str(&text).map_err(|source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&text).map_err(|source| ManifestError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        info!(
            path = %path.display(),
            routes_count = manifest.routes.len(),
            commands_count = manifest.commands.len(),
            "Manifest loaded"
        );
        Ok(manifest)
    }
}

/// Scanner collaborator backed by a manifest file
///
/// The file is re-read on every scan, so a forced rebuild picks up edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestScanner {
    path: PathBuf,
}

impl ManifestScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw routes in manifest order.
    ///
    /// # Errors
    ///
    /// See [`Manifest::load`] and [`ManifestRoute::into_raw`].
    pub fn routes(&self) -> Result<Vec<RawRoute>, ManifestError> {
        let raws = Manifest::load(&self.path)?
            .routes
            .into_iter()
            .map(ManifestRoute::into_raw)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(path = %self.path.display(), count = raws.len(), "Scanned routes");
        Ok(raws)
    }

    /// Raw commands in manifest order.
    ///
    /// # Errors
    ///
    /// See [`Manifest::load`] and [`ManifestCommand::into_raw`].
    pub fn commands(&self) -> Result<Vec<RawCommand>, ManifestError> {
        let raws = Manifest::load(&self.path)?
            .commands
            .into_iter()
            .map(ManifestCommand::into_raw)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(path = %self.path.display(), count = raws.len(), "Scanned commands");
        Ok(raws)
    }
}

impl Scanner<RouteDefinition> for ManifestScanner {
    fn scan(&self) -> Result<Vec<RawRoute>, ScanError> {
        self.routes().map_err(ScanError::new)
    }
}

impl Scanner<CommandDefinition> for ManifestScanner {
    fn scan(&self) -> Result<Vec<RawCommand>, ScanError> {
        self.commands().map_err(ScanError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Definition, Stage};
    use crate::registry::{Registry, SetupOptions, SetupSource};
    use std::io::Write;

    const YAML: &str = r#"
routes:
  - name: users.show
    path: /users/{id}
    methods: [get, HEAD]
    target: UserController::show
    parameters:
      - name: id
        pattern: '\d+'
        cast: integer
    middleware:
      matched: [auth]
  - name: files
    path: /files/{path}
    target: FileController
    parameters:
      - name: path
        repeatable: true
commands:
  - name: deploy
    signature: "deploy {env} {--dry-run}"
    description: Deploy the current build
    target: DeployCommand
"#;

    fn write(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_routes_from_yaml() {
        let file = write(".yaml", YAML);
        let routes = ManifestScanner::new(file.path()).routes().unwrap();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].methods, vec![Method::GET, Method::HEAD]);
        assert_eq!(routes[0].parameters[0].match_pattern, r"\d+");
        assert_eq!(routes[0].parameters[0].caster, TypeCaster::Integer);
        assert_eq!(routes[0].middleware[&Stage::Matched].len(), 1);
        assert!(routes[1].parameters[0].is_repeatable);
        assert_eq!(routes[1].parameters[0].match_pattern, DEFAULT_SEGMENT_PATTERN);
    }

    #[test]
    fn test_undeclared_placeholders_get_defaults() {
        let file = write(".yml", YAML);
        let commands = ManifestScanner::new(file.path()).commands().unwrap();

        let deploy = &commands[0];
        let names: Vec<&str> = deploy.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["env", "dry-run"]);
        assert_eq!(deploy.parameters[0].match_pattern, DEFAULT_ARGUMENT_PATTERN);
        assert_eq!(deploy.description.as_deref(), Some("Deploy the current build"));
        assert!(CommandDefinition::compile(deploy.clone()).is_ok());
    }

    #[test]
    fn test_json_manifest() {
        let file = write(
            ".json",
            r#"{"routes": [{"name": "health", "path": "/health", "target": "Health"}]}"#,
        );
        let routes = ManifestScanner::new(file.path()).routes().unwrap();
        assert_eq!(routes[0].name, "health");
        assert!(routes[0].methods.is_empty());
    }

    #[test]
    fn test_invalid_method() {
        let file = write(
            ".yaml",
            "routes:\n  - name: bad\n    path: /x\n    methods: ['GE T']\n    target: X\n",
        );
        let err = ManifestScanner::new(file.path()).routes().unwrap_err();
        assert!(matches!(err, ManifestError::Method { ref route, .. } if route == "bad"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write(".yaml", "routes: []\nextra: true\n");
        assert!(matches!(
            Manifest::load(file.path()),
            Err(ManifestError::Yaml { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Manifest::load(Path::new("/nonexistent/manifest.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn test_scanner_feeds_registry_setup() {
        let file = write(".yaml", YAML);
        let scanner = ManifestScanner::new(file.path());

        let mut routes = Registry::<RouteDefinition>::new();
        let source = routes.setup(&scanner, &SetupOptions::default()).unwrap();
        assert_eq!(source, SetupSource::Scanner);
        assert!(routes.has("users.show"));
        assert_eq!(routes.len(), 2);

        let mut commands = Registry::<CommandDefinition>::new();
        commands.setup(&scanner, &SetupOptions::default()).unwrap();
        assert_eq!(commands.get("deploy").unwrap().template(), "deploy {env} {--dry-run}");
    }
}
