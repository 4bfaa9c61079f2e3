//! Typed values and the conversions that produce them from raw argv text.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A converted argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Paths, and plain strings viewed as paths.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p.as_path()),
            Self::Str(s) => Some(Path::new(s)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

/// Literal sets accepted by [`ValueType::Boolean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolLiterals {
    pub truthy: Vec<String>,
    pub falsy: Vec<String>,
    pub case_sensitive: bool,
}

impl Default for BoolLiterals {
    fn default() -> Self {
        Self {
            truthy: ["true", "yes", "on", "1"].map(String::from).to_vec(),
            falsy: ["false", "no", "off", "0"].map(String::from).to_vec(),
            case_sensitive: false,
        }
    }
}

impl BoolLiterals {
    pub fn parse(&self, raw: &str) -> Option<bool> {
        let hit = |set: &[String]| {
            set.iter().any(|lit| {
                if self.case_sensitive {
                    lit == raw
                } else {
                    lit.eq_ignore_ascii_case(raw)
                }
            })
        };
        if hit(&self.truthy) {
            Some(true)
        } else if hit(&self.falsy) {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
}

/// Filesystem checks applied by [`ValueType::Path`].
///
/// `kind` is only enforced for paths that exist, unless `must_exist` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathCheck {
    pub must_exist: bool,
    pub kind: Option<PathKind>,
}

pub type ConvertFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// A named, user-supplied conversion function.
#[derive(Clone)]
pub struct Converter {
    name: String,
    func: Arc<ConvertFn>,
}

impl Converter {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        (self.func)(raw)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter").field("name", &self.name).finish()
    }
}

/// The declared type of an option or positional value.
#[derive(Debug, Clone, Default)]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Float,
    Boolean(BoolLiterals),
    Choice {
        choices: Vec<String>,
        case_sensitive: bool,
    },
    Path(PathCheck),
    Custom(Converter),
}

impl ValueType {
    pub fn boolean() -> Self {
        Self::Boolean(BoolLiterals::default())
    }

    /// Case-sensitive choice among `choices`.
    pub fn choice<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choice {
            choices: choices.into_iter().map(Into::into).collect(),
            case_sensitive: true,
        }
    }

    pub fn path() -> Self {
        Self::Path(PathCheck::default())
    }

    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::Custom(Converter::new(name, func))
    }

    /// Values listed in help output, if the type is a closed set.
    pub fn possible_values(&self) -> Option<&[String]> {
        match self {
            Self::Choice { choices, .. } => Some(choices.as_slice()),
            _ => None,
        }
    }

    /// Convert one raw token. The error is a human-readable reason.
    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        match self {
            Self::String => Ok(Value::Str(raw.to_string())),
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("'{raw}' is not a valid integer")),
            Self::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float)
                .ok_or_else(|| format!("'{raw}' is not a valid number")),
            Self::Boolean(literals) => literals.parse(raw).map(Value::Bool).ok_or_else(|| {
                let mut expected = literals.truthy.clone();
                expected.extend(literals.falsy.iter().cloned());
                format!(
                    "'{raw}' is not a valid boolean (expected one of: {})",
                    expected.join(", ")
                )
            }),
            Self::Choice {
                choices,
                case_sensitive,
            } => choices
                .iter()
                .find(|c| {
                    if *case_sensitive {
                        c.as_str() == raw
                    } else {
                        c.eq_ignore_ascii_case(raw)
                    }
                })
                .map(|c| Value::Str(c.clone()))
                .ok_or_else(|| {
                    format!(
                        "invalid choice '{raw}' (choose from: {})",
                        choices.join(", ")
                    )
                }),
            Self::Path(check) => convert_path(raw, check),
            Self::Custom(converter) => converter.convert(raw),
        }
    }
}

fn convert_path(raw: &str, check: &PathCheck) -> Result<Value, String> {
    if raw.is_empty() {
        return Err("path must not be empty".to_string());
    }
    let path = PathBuf::from(raw);
    if !check.must_exist && check.kind.is_none() {
        return Ok(Value::Path(path));
    }

    let exists = path.exists();
    if check.must_exist && !exists {
        return Err(format!("path '{raw}' does not exist"));
    }
    if exists {
        match check.kind {
            Some(PathKind::File) if !path.is_file() => {
                return Err(format!("'{raw}' is not a file"));
            }
            Some(PathKind::Dir) if !path.is_dir() => {
                return Err(format!("'{raw}' is not a directory"));
            }
            _ => {}
        }
    }
    Ok(Value::Path(path))
}
