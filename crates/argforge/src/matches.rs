//! Bound values produced by a successful parse.

use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSource {
    CommandLine,
    Env,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bound {
    pub value: Value,
    pub source: ValueSource,
}

/// Parsed values for one command, plus the matched subcommand (if any).
///
/// Fields that were neither supplied nor defaulted are absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Matches {
    command: String,
    values: IndexMap<String, Bound>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rest: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subcommand: Option<Box<Matches>>,
}

impl Matches {
    pub(crate) fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Name of the command these values belong to.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|b| &b.value)
    }

    pub fn bound(&self, name: &str) -> Option<&Bound> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn source(&self, name: &str) -> Option<ValueSource> {
        self.values.get(name).map(|b| b.source)
    }

    /// Whether the value was given in argv (not env or default).
    pub fn is_explicit(&self, name: &str) -> bool {
        self.source(name) == Some(ValueSource::CommandLine)
    }

    /// A flag's state; absent flags are `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    pub fn get_path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(Value::as_path)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bound)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Surplus positionals kept because the command allows passthrough.
    pub fn rest(&self) -> &[String] {
        &self.rest
    }

    pub fn subcommand(&self) -> Option<&Matches> {
        self.subcommand.as_deref()
    }

    pub fn subcommand_name(&self) -> Option<&str> {
        self.subcommand().map(Matches::command)
    }

    /// Command names from this command down to the deepest subcommand.
    pub fn command_path(&self) -> Vec<&str> {
        let mut path = vec![self.command.as_str()];
        let mut current = self;
        while let Some(sub) = current.subcommand() {
            path.push(sub.command());
            current = sub;
        }
        path
    }

    /// Like [`Matches::command_path`] without this command itself.
    pub fn subcommand_path(&self) -> Vec<&str> {
        self.command_path().split_off(1)
    }

    /// The deepest matched command's values.
    pub fn leaf(&self) -> &Matches {
        let mut current = self;
        while let Some(sub) = current.subcommand() {
            current = sub;
        }
        current
    }
}

impl Matches {
    pub(crate) fn bind(&mut self, name: &str, value: Value, source: ValueSource) {
        tracing::trace!(field = name, %value, ?source, "bound");
        self.values
            .insert(name.to_string(), Bound { value, source });
    }

    pub(crate) fn push_rest(&mut self, value: &str) {
        self.rest.push(value.to_string());
    }

    pub(crate) fn set_subcommand(&mut self, sub: Matches) {
        self.subcommand = Some(Box::new(sub));
    }
}
