//! JSON model for declaring argforge command trees.
//!
//! A [`CommandSchema`] mirrors [`argforge::Command`] field for field, with
//! plain strings where the engine uses typed values (arity, value type,
//! defaults). [`CommandSchema::build`] turns it into a checked `Command`.

use argforge::{
    Arity, BoolLiterals, Command, ConfigurationError, Multiplicity, OptionSpec, PathCheck, PathKind,
    PositionalSpec, Validator, Value, ValueType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default file name the CLI looks for.
pub const DEFAULT_SCHEMA_FILE: &str = "argforge.json";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("invalid arity '{arity}' for '{field}' (expected N, ?, *, + or N+)")]
    InvalidArity { field: String, arity: String },

    #[error("unknown value type '{value_type}' for '{field}'")]
    UnknownValueType { field: String, value_type: String },

    #[error("unknown path kind '{kind}' for '{field}' (expected file or dir)")]
    UnknownPathKind { field: String, kind: String },

    #[error("invalid default for '{field}': {message}")]
    InvalidDefault { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MultipleSchema {
    #[default]
    Overwrite,
    Accumulate,
    Count,
}

impl From<MultipleSchema> for Multiplicity {
    fn from(value: MultipleSchema) -> Self {
        match value {
            MultipleSchema::Overwrite => Multiplicity::Overwrite,
            MultipleSchema::Accumulate => Multiplicity::Accumulate,
            MultipleSchema::Count => Multiplicity::Count,
        }
    }
}

/// Value type and checks shared by options and positionals.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ValueSchema {
    /// `string` (default), `integer`, `float`, `boolean`, `choice` or `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Implies `choice` when `value-type` is omitted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub must_exist: bool,
    /// `file` or `dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub non_empty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct OptionSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    /// Shorthand for arity `1`; ignored when `arity` is set.
    #[serde(default)]
    pub takes_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<String>,
    #[serde(default)]
    pub multiple: MultipleSchema,
    #[serde(flatten)]
    pub value: ValueSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PositionalSchema {
    pub name: String,
    /// Defaults to `1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(flatten)]
    pub value: ValueSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub subcommand_required: bool,
    #[serde(default)]
    pub allow_passthrough: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positionals: Vec<PositionalSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandSchema>,
}

impl CommandSchema {
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the command tree, including cross-field reference checks.
    pub fn build(&self) -> Result<Command, SchemaError> {
        let command = self.build_command()?;
        command.validate()?;
        Ok(command)
    }

    fn build_command(&self) -> Result<Command, SchemaError> {
        let mut command = Command::new(self.name.clone());
        command.summary = self.summary.clone();
        command.description = self.description.clone();
        command.version = self.version.clone();
        command.aliases = self.aliases.clone();
        command.hidden = self.hidden;
        command.subcommand_required = self.subcommand_required;
        command.allow_passthrough = self.allow_passthrough;

        for option in &self.options {
            command.add_option(option.to_spec()?)?;
        }
        for positional in &self.positionals {
            command.add_positional(positional.to_spec()?)?;
        }
        for child in &self.subcommands {
            command.add_subcommand(child.build_command()?)?;
        }
        Ok(command)
    }
}

impl OptionSchema {
    fn arity(&self) -> Result<Arity, SchemaError> {
        match &self.arity {
            Some(raw) => parse_arity(&self.name, raw),
            None if self.takes_value => Ok(Arity::Fixed(1)),
            None => Ok(Arity::Fixed(0)),
        }
    }

    pub fn to_spec(&self) -> Result<OptionSpec, SchemaError> {
        let arity = self.arity()?;
        let multiplicity = Multiplicity::from(self.multiple);
        let value_type = self.value.value_type(&self.name)?;

        let default = match &self.default_value {
            None => None,
            Some(raw) if arity == Arity::Fixed(0) => {
                let flag_type = if multiplicity == Multiplicity::Count {
                    ValueType::Integer
                } else {
                    ValueType::Boolean(BoolLiterals::default())
                };
                Some(convert_default(&self.name, &flag_type, arity, raw)?)
            }
            Some(raw) => {
                let value = convert_default(&self.name, &value_type, arity, raw)?;
                if multiplicity == Multiplicity::Accumulate {
                    Some(Value::List(vec![value]))
                } else {
                    Some(value)
                }
            }
        };

        Ok(OptionSpec {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            arity,
            value_type,
            default,
            required: self.required,
            multiplicity,
            validators: self.value.validators(),
            help: self.help.clone(),
            value_name: self.value_name.clone(),
            env: self.env.clone(),
            hidden: self.hidden,
            conflicts_with: self.conflicts_with.clone(),
            requires: self.requires.clone(),
        })
    }
}

impl PositionalSchema {
    pub fn to_spec(&self) -> Result<PositionalSpec, SchemaError> {
        let arity = match &self.arity {
            Some(raw) => parse_arity(&self.name, raw)?,
            None => Arity::Fixed(1),
        };
        let value_type = self.value.value_type(&self.name)?;
        let default = self
            .default_value
            .as_deref()
            .map(|raw| convert_default(&self.name, &value_type, arity, raw))
            .transpose()?;

        Ok(PositionalSpec {
            name: self.name.clone(),
            arity,
            value_type,
            default,
            validators: self.value.validators(),
            help: self.help.clone(),
            value_name: self.value_name.clone(),
        })
    }
}

impl ValueSchema {
    fn value_type(&self, field: &str) -> Result<ValueType, SchemaError> {
        let declared = self.value_type.as_deref().unwrap_or(if self.possible_values.is_empty() {
            "string"
        } else {
            "choice"
        });
        let value_type = match declared {
            "string" => ValueType::String,
            "integer" | "int" => ValueType::Integer,
            "float" | "number" => ValueType::Float,
            "boolean" | "bool" => ValueType::boolean(),
            "choice" => ValueType::Choice {
                choices: self.possible_values.clone(),
                case_sensitive: !self.ignore_case,
            },
            "path" => ValueType::Path(PathCheck {
                must_exist: self.must_exist,
                kind: self.path_kind(field)?,
            }),
            other => {
                return Err(SchemaError::UnknownValueType {
                    field: field.to_string(),
                    value_type: other.to_string(),
                });
            }
        };
        Ok(value_type)
    }

    fn path_kind(&self, field: &str) -> Result<Option<PathKind>, SchemaError> {
        match self.path_kind.as_deref() {
            None => Ok(None),
            Some("file") => Ok(Some(PathKind::File)),
            Some("dir") | Some("directory") => Ok(Some(PathKind::Dir)),
            Some(other) => Err(SchemaError::UnknownPathKind {
                field: field.to_string(),
                kind: other.to_string(),
            }),
        }
    }

    fn validators(&self) -> Vec<Validator> {
        let mut validators = Vec::new();
        if self.min.is_some() || self.max.is_some() {
            validators.push(Validator::Range {
                min: self.min,
                max: self.max,
            });
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            validators.push(Validator::Length {
                min: self.min_length,
                max: self.max_length,
            });
        }
        if self.non_empty {
            validators.push(Validator::NonEmpty);
        }
        validators
    }
}

/// `N`, `?`, `*`, `+` or `N+`.
fn parse_arity(field: &str, raw: &str) -> Result<Arity, SchemaError> {
    let invalid = || SchemaError::InvalidArity {
        field: field.to_string(),
        arity: raw.to_string(),
    };
    let raw = raw.trim();
    match raw {
        "?" => Ok(Arity::Optional),
        "*" => Ok(Arity::Variadic { min: 0 }),
        "+" => Ok(Arity::Variadic { min: 1 }),
        _ => match raw.strip_suffix('+') {
            Some(min) => min
                .parse()
                .map(|min| Arity::Variadic { min })
                .map_err(|_| invalid()),
            None => raw.parse().map(Arity::Fixed).map_err(|_| invalid()),
        },
    }
}

/// Multi-value defaults are whitespace-separated.
fn convert_default(field: &str, value_type: &ValueType, arity: Arity, raw: &str) -> Result<Value, SchemaError> {
    let converted = if arity.is_scalar() || arity == Arity::Fixed(0) {
        value_type.convert(raw)
    } else {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if !arity.accepts(parts.len()) {
            return Err(SchemaError::InvalidDefault {
                field: field.to_string(),
                message: format!("expected {} values, got {}", arity.describe(), parts.len()),
            });
        }
        parts
            .into_iter()
            .map(|part| value_type.convert(part))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    };
    converted.map_err(|message| SchemaError::InvalidDefault {
        field: field.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_strings() {
        assert_eq!(parse_arity("a", "0").unwrap(), Arity::Fixed(0));
        assert_eq!(parse_arity("a", " 2 ").unwrap(), Arity::Fixed(2));
        assert_eq!(parse_arity("a", "?").unwrap(), Arity::Optional);
        assert_eq!(parse_arity("a", "*").unwrap(), Arity::Variadic { min: 0 });
        assert_eq!(parse_arity("a", "+").unwrap(), Arity::Variadic { min: 1 });
        assert_eq!(parse_arity("a", "3+").unwrap(), Arity::Variadic { min: 3 });
        assert!(matches!(
            parse_arity("a", "many"),
            Err(SchemaError::InvalidArity { .. })
        ));
    }

    #[test]
    fn possible_values_imply_choice() {
        let value = ValueSchema {
            possible_values: vec!["fast".to_string(), "slow".to_string()],
            ignore_case: true,
            ..Default::default()
        };
        match value.value_type("mode").unwrap() {
            ValueType::Choice {
                choices,
                case_sensitive,
            } => {
                assert_eq!(choices, vec!["fast", "slow"]);
                assert!(!case_sensitive);
            }
            other => panic!("unexpected type: {other:?}"),
        }
    }

    #[test]
    fn unknown_value_type_is_rejected() {
        let value = ValueSchema {
            value_type: Some("date".to_string()),
            ..Default::default()
        };
        let err = value.value_type("when").unwrap_err();
        assert_eq!(err.to_string(), "unknown value type 'date' for 'when'");
    }

    #[test]
    fn defaults_are_typed() {
        let option = OptionSchema {
            name: "jobs".to_string(),
            takes_value: true,
            default_value: Some("4".to_string()),
            value: ValueSchema {
                value_type: Some("integer".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(option.to_spec().unwrap().default, Some(Value::Int(4)));

        let positional = PositionalSchema {
            name: "files".to_string(),
            arity: Some("*".to_string()),
            default_value: Some("a.txt b.txt".to_string()),
            ..Default::default()
        };
        assert_eq!(
            positional.to_spec().unwrap().default,
            Some(Value::List(vec![Value::from("a.txt"), Value::from("b.txt")]))
        );

        let bad = OptionSchema {
            default_value: Some("lots".to_string()),
            ..option
        };
        assert!(matches!(
            bad.to_spec(),
            Err(SchemaError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn multi_value_default_must_match_arity() {
        let point = OptionSchema {
            name: "point".to_string(),
            arity: Some("2".to_string()),
            default_value: Some("1".to_string()),
            value: ValueSchema {
                value_type: Some("integer".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = point.to_spec().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid default for 'point': expected 2 values, got 1"
        );

        let fixed = OptionSchema {
            default_value: Some("1 2".to_string()),
            ..point
        };
        assert_eq!(
            fixed.to_spec().unwrap().default,
            Some(Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn validators_follow_declared_checks() {
        let value = ValueSchema {
            min: Some(1.0),
            max_length: Some(8),
            non_empty: true,
            ..Default::default()
        };
        let validators = value.validators();
        assert_eq!(validators.len(), 3);
        assert!(matches!(
            validators[0],
            Validator::Range {
                min: Some(_),
                max: None
            }
        ));
    }

    #[test]
    fn kebab_case_round_trip() {
        let schema = CommandSchema {
            name: "tool".to_string(),
            subcommand_required: true,
            options: vec![OptionSchema {
                name: "out-dir".to_string(),
                takes_value: true,
                value_name: Some("DIR".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let json = schema.to_json_pretty().unwrap();
        assert!(json.contains("\"subcommand-required\": true"));
        assert!(json.contains("\"value-name\": \"DIR\""));
        assert_eq!(CommandSchema::from_json(&json).unwrap(), schema);
    }
}
