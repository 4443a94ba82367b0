//! Protocol file loader
//!
//! This module implements the loading pipeline:
//! 1. Size check and read
//! 2. Environment variable expansion (pre-parse, on raw text)
//! 3. YAML parsing
//! 4. Deserialization to typed config
//! 5. Validation
//! 6. Freeze into an `ExercisePlan`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::ProtocolFile;
use crate::config::validation::Validator;
use crate::error::ConfigError;
use crate::protocol::ExercisePlan;

// ============================================================================
// Public API
// ============================================================================

/// Options for the protocol loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for protocol size.
    pub config_limits: ConfigLimits,
}

/// Limits that keep a protocol file within reason.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of phases per cycle.
    pub max_phases: usize,

    /// Maximum number of cycles.
    pub max_cycles: u32,

    /// Maximum protocol file size in bytes.
    pub max_file_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_phases: env_or("BREATHWORK_MAX_PHASES", 32),
            max_cycles: env_or("BREATHWORK_MAX_CYCLES", 1000),
            max_file_size: env_or("BREATHWORK_MAX_FILE_SIZE", 64 * 1024),
        }
    }
}

/// Result of loading a protocol.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated exercise.
    pub plan: ExercisePlan,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during protocol loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Protocol file loader.
#[derive(Debug, Default)]
pub struct ProtocolLoader {
    options: LoaderOptions,
}

impl ProtocolLoader {
    /// Creates a new loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loads a protocol file and returns the frozen plan.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or is too large
    /// - An environment variable marked required is unset
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let max = self.options.config_limits.max_file_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > max {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {max} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, &path.display().to_string())
    }

    /// Loads a protocol from YAML text; `origin` names it in diagnostics.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file-system failures.
    pub fn load_str(&self, raw: &str, origin: &str) -> Result<LoadResult, ConfigError> {
        self.load_str_with(raw, origin, |name| std::env::var(name).ok())
    }

    /// Like [`load_str`](Self::load_str) with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Same as [`load_str`](Self::load_str).
    pub fn load_str_with<F>(
        &self,
        raw: &str,
        origin: &str,
        lookup: F,
    ) -> Result<LoadResult, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        // Handle UTF-8 BOM
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env_sub = EnvSubstitution::new(lookup);
        let substituted = env_sub.substitute(raw, origin)?;
        warnings.extend(env_sub.warnings);

        let root: serde_yaml::Value =
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from(origin),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: PathBuf::from(origin),
                line: None,
                message: "protocol file is empty".to_string(),
            });
        }

        let file: ProtocolFile =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from(origin),
                line: None,
                message: format!("failed to deserialize protocol: {e}"),
            })?;

        let mut validator = Validator::new();
        let result = validator.validate(&file.protocol, &self.options.config_limits);

        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.to_string(),
                errors: result.errors,
            });
        }

        for issue in result.warnings {
            warnings.push(LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            });
        }

        let protocol = result.protocol.ok_or_else(|| ConfigError::ValidationError {
            path: origin.to_string(),
            errors: Vec::new(),
        })?;

        Ok(LoadResult {
            plan: ExercisePlan::new(Arc::new(protocol), file.protocol.cycles_or_default()),
            warnings,
        })
    }
}

// ============================================================================
// Environment Substitution
// ============================================================================

/// Expands environment variable references in raw YAML text.
struct EnvSubstitution<F> {
    lookup: F,
    warnings: Vec<LoadWarning>,
}

impl<F> EnvSubstitution<F>
where
    F: Fn(&str) -> Option<String>,
{
    const fn new(lookup: F) -> Self {
        Self {
            lookup,
            warnings: Vec::new(),
        }
    }

    /// Substitutes environment variables in raw YAML text.
    ///
    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset, with warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw: &str, origin: &str) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let spec = parse_var_spec(&mut chars, origin)?;
                    match ((self.lookup)(&spec.name), spec.fallback) {
                        (Some(value), _) => result.push_str(&value),
                        (None, Fallback::Default(value)) => result.push_str(&value),
                        (None, Fallback::Required(message)) => {
                            return Err(ConfigError::EnvVarNotSet {
                                var: spec.name,
                                location: if message.is_empty() {
                                    origin.to_string()
                                } else {
                                    message
                                },
                            });
                        }
                        (None, Fallback::Empty) => {
                            self.warnings.push(LoadWarning {
                                message: format!(
                                    "environment variable '{}' is not set, using empty string",
                                    spec.name
                                ),
                                location: Some(origin.to_string()),
                            });
                        }
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }
}

/// What to do when a referenced variable is unset.
enum Fallback {
    Empty,
    Default(String),
    Required(String),
}

struct VarSpec {
    name: String,
    fallback: Fallback,
}

/// Parses the inside of `${...}`; the opening brace is already consumed.
fn parse_var_spec(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    origin: &str,
) -> Result<VarSpec, ConfigError> {
    let mut name = String::new();

    while let Some(c) = chars.next() {
        match c {
            '}' => {
                return Ok(VarSpec {
                    name,
                    fallback: Fallback::Empty,
                });
            }
            ':' if matches!(chars.peek(), Some('-' | '?')) => {
                let required = chars.next() == Some('?');
                let rest = read_until_close(chars, &name, origin)?;
                let fallback = if required {
                    Fallback::Required(rest)
                } else {
                    Fallback::Default(rest)
                };
                return Ok(VarSpec { name, fallback });
            }
            _ => name.push(c),
        }
    }

    Err(unclosed(&name, origin))
}

fn read_until_close(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    name: &str,
    origin: &str,
) -> Result<String, ConfigError> {
    let mut value = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(value);
        }
        value.push(c);
    }
    Err(unclosed(name, origin))
}

fn unclosed(name: &str, origin: &str) -> ConfigError {
    ConfigError::ParseError {
        path: PathBuf::from(origin),
        line: None,
        message: format!("unclosed environment variable reference: ${{{name}"),
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
