//! Error types for command configuration and argv parsing.

use std::fmt;
use thiserror::Error;

/// A mistake in how a [`Command`](crate::Command) tree was declared.
///
/// These surface while the tree is built (or, for cross-field references,
/// before the first parse) and never depend on user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{what} name must not be empty or contain whitespace: '{name}'")]
    InvalidName { what: &'static str, name: String },

    #[error("duplicate field name '{name}' in command '{command}'")]
    DuplicateName { command: String, name: String },

    #[error("invalid alias '{alias}' for '{name}': expected '-x' or '--long'")]
    InvalidAlias { name: String, alias: String },

    #[error("alias '{alias}' of '{name}' is already used by '{existing}'")]
    DuplicateAlias {
        alias: String,
        name: String,
        existing: String,
    },

    #[error("invalid arity for '{name}': {reason}")]
    InvalidArity { name: String, reason: String },

    #[error("invalid declaration for '{name}': {reason}")]
    InvalidField { name: String, reason: String },

    #[error("positional '{name}' cannot follow '{existing}': only one positional may have a non-fixed arity")]
    AmbiguousPositionals { name: String, existing: String },

    #[error("subcommand '{name}' in '{command}' clashes with existing subcommand '{existing}'")]
    DuplicateSubcommand {
        command: String,
        name: String,
        existing: String,
    },

    #[error("'{name}' {relation} unknown field '{other}'")]
    UnknownReference {
        name: String,
        relation: &'static str,
        other: String,
    },
}

/// What went wrong with a single token or field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown option '{name}'")]
    UnknownOption { name: String },

    #[error("option '{name}' is ambiguous; it could be {}", .candidates.join(", "))]
    AmbiguousOption {
        name: String,
        candidates: Vec<String>,
    },

    #[error("'{name}' expects {expected} value(s) but got {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("option '{name}' does not take a value")]
    UnexpectedValue { name: String },

    #[error("unexpected argument '{value}'")]
    UnexpectedArgument { value: String },

    #[error("unknown subcommand '{name}' (available: {})", .available.join(", "))]
    UnknownSubcommand {
        name: String,
        available: Vec<String>,
    },

    #[error("a subcommand is required (available: {})", .available.join(", "))]
    MissingSubcommand { available: Vec<String> },

    #[error("missing required option '{name}'")]
    MissingRequiredOption { name: String },

    #[error("missing required argument '{name}'")]
    MissingRequiredArgument { name: String },

    #[error("invalid value for '{name}': {message}")]
    Conversion {
        name: String,
        value: String,
        message: String,
    },

    #[error("invalid value '{value}' for '{name}': {}", .messages.join("; "))]
    Validation {
        name: String,
        value: String,
        messages: Vec<String>,
    },

    #[error("'{name}' cannot be used with '{other}'")]
    Conflict { name: String, other: String },

    #[error("'{name}' requires '{other}'")]
    MissingDependency { name: String, other: String },
}

impl ParseErrorKind {
    /// Structural errors stop the scan; field errors are collected.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownOption { .. }
                | Self::AmbiguousOption { .. }
                | Self::ArityMismatch { .. }
                | Self::UnexpectedValue { .. }
                | Self::UnexpectedArgument { .. }
                | Self::UnknownSubcommand { .. }
        )
    }
}

/// One failure, with the offending token and its argv position when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ParseErrorKind,
    pub token: Option<String>,
    pub position: Option<usize>,
}

impl Failure {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            token: None,
            position: None,
        }
    }

    pub fn at(kind: ParseErrorKind, token: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            token: Some(token.into()),
            position: Some(position),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

/// Everything wrong with one parse invocation.
///
/// Holds at least one [`Failure`], plus the command path (root first) the
/// parser had reached so callers can render the matching usage line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    failures: Vec<Failure>,
    command_path: Vec<String>,
}

impl ParseError {
    pub(crate) fn new(failures: Vec<Failure>, command_path: Vec<String>) -> Self {
        debug_assert!(!failures.is_empty());
        Self {
            failures,
            command_path,
        }
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Kind of the first failure.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.failures[0].kind
    }

    pub fn command_path(&self) -> &[String] {
        &self.command_path
    }

    /// Conventional exit status for usage errors.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            fmt::Display::fmt(failure, f)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Error returned by [`Parser::parse`](crate::Parser::parse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Parse(e) => e.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_failures() {
        let err = ParseError::new(
            vec![
                Failure::new(ParseErrorKind::MissingRequiredOption {
                    name: "--name".to_string(),
                }),
                Failure::at(
                    ParseErrorKind::Conversion {
                        name: "--count".to_string(),
                        value: "x".to_string(),
                        message: "'x' is not a valid integer".to_string(),
                    },
                    "x",
                    3,
                ),
            ],
            vec!["app".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "missing required option '--name'; invalid value for '--count': 'x' is not a valid integer"
        );
        assert_eq!(err.failures()[1].position, Some(3));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn ambiguity_names_all_candidates() {
        let kind = ParseErrorKind::AmbiguousOption {
            name: "--ver".to_string(),
            candidates: vec!["--verbose".to_string(), "--version".to_string()],
        };
        assert_eq!(
            kind.to_string(),
            "option '--ver' is ambiguous; it could be --verbose, --version"
        );
        assert!(kind.is_structural());
    }
}
