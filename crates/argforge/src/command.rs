//! The declarative command model: options, positionals and subcommands.

use crate::error::ConfigurationError;
use crate::validate::Validator;
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use std::collections::HashSet;

/// How many values an option or positional consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` values. `Fixed(0)` on an option makes it a flag.
    Fixed(usize),
    /// Zero or one value (positionals only).
    Optional,
    /// At least `min` values, no upper bound.
    Variadic { min: usize },
}

impl Default for Arity {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl Arity {
    pub fn min(&self) -> usize {
        match *self {
            Self::Fixed(n) => n,
            Self::Optional => 0,
            Self::Variadic { min } => min,
        }
    }

    pub fn max(&self) -> Option<usize> {
        match *self {
            Self::Fixed(n) => Some(n),
            Self::Optional => Some(1),
            Self::Variadic { .. } => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    /// Whether the field binds a single scalar rather than a list.
    pub fn is_scalar(&self) -> bool {
        self.max() == Some(1)
    }

    /// Whether `count` values satisfy this arity.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min() && self.max().is_none_or(|max| count <= max)
    }

    /// Expected count as shown in arity errors: `2`, `at most 1`, `at least 1`.
    pub fn describe(&self) -> String {
        match *self {
            Self::Fixed(n) => n.to_string(),
            Self::Optional => "at most 1".to_string(),
            Self::Variadic { min } => format!("at least {min}"),
        }
    }
}

/// What happens when an option occurs more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Multiplicity {
    /// The last occurrence wins.
    #[default]
    Overwrite,
    /// Every occurrence is kept, in order.
    Accumulate,
    /// Flags only: bind the number of occurrences.
    Count,
}

/// Declaration of a named option.
///
/// Fill it with struct-update syntax over [`OptionSpec::flag`],
/// [`OptionSpec::value`] or `Default`, then hand it to
/// [`Command::add_option`], which validates it.
#[derive(Debug, Clone, Default)]
pub struct OptionSpec {
    pub name: String,
    /// `-x` / `--long` spellings. Bare `x` and `long` are normalized; an empty
    /// list means `--<name>`.
    pub aliases: Vec<String>,
    pub arity: Arity,
    pub value_type: ValueType,
    pub default: Option<Value>,
    pub required: bool,
    pub multiplicity: Multiplicity,
    pub validators: Vec<Validator>,
    pub help: String,
    pub value_name: Option<String>,
    /// Environment variable consulted when the option is absent from argv.
    pub env: Option<String>,
    pub hidden: bool,
    pub conflicts_with: Vec<String>,
    pub requires: Vec<String>,
}

impl OptionSpec {
    /// A boolean flag.
    pub fn flag(name: impl Into<String>, aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            arity: Arity::Fixed(0),
            ..Default::default()
        }
    }

    /// An option taking one value.
    pub fn value(name: impl Into<String>, aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            arity: Arity::Fixed(1),
            ..Default::default()
        }
    }

    pub fn takes_value(&self) -> bool {
        self.arity.max() != Some(0)
    }

    pub fn value_name(&self) -> String {
        placeholder(self.value_name.as_deref(), &self.name)
    }

    /// The spelling used in messages: first long alias, else first alias.
    pub fn display_name(&self) -> &str {
        self.aliases
            .iter()
            .find(|a| a.starts_with("--"))
            .or_else(|| self.aliases.first())
            .map(|a| a.as_str())
            .unwrap_or(self.name.as_str())
    }

    pub fn long_aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .iter()
            .filter(|a| a.starts_with("--"))
            .map(|a| a.as_str())
    }
}

/// Declaration of a positional argument.
#[derive(Debug, Clone, Default)]
pub struct PositionalSpec {
    pub name: String,
    pub arity: Arity,
    pub value_type: ValueType,
    /// Only allowed for `Optional` and `Variadic` arities.
    pub default: Option<Value>,
    pub validators: Vec<Validator>,
    pub help: String,
    pub value_name: Option<String>,
}

impl PositionalSpec {
    pub fn new(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            name: name.into(),
            arity,
            ..Default::default()
        }
    }

    pub fn required(&self) -> bool {
        self.arity.min() > 0
    }

    pub fn value_name(&self) -> String {
        placeholder(self.value_name.as_deref(), &self.name)
    }

    pub fn display_name(&self) -> String {
        format!("<{}>", self.value_name())
    }
}

fn placeholder(explicit: Option<&str>, name: &str) -> String {
    explicit
        .map(|s| s.to_string())
        .unwrap_or_else(|| name.to_ascii_uppercase().replace('-', "_"))
}

/// A command: its options, positionals and owned subcommands.
///
/// Built once, then shared read-only by any number of parses. Children hold
/// no link back to their parent; help rendering receives the ancestor chain
/// from [`Command::resolve_path`] instead.
#[derive(Debug, Clone, Default)]
pub struct Command {
    name: String,
    pub summary: String,
    pub description: String,
    pub version: String,
    /// Alternative names this command answers to as a subcommand.
    pub aliases: Vec<String>,
    pub hidden: bool,
    /// Fail when no subcommand is given (only meaningful with subcommands).
    pub subcommand_required: bool,
    /// Collect surplus positionals into `Matches::rest` instead of failing.
    pub allow_passthrough: bool,
    options: Vec<OptionSpec>,
    alias_index: IndexMap<String, usize>,
    positionals: Vec<PositionalSpec>,
    subcommands: IndexMap<String, Command>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn positionals(&self) -> &[PositionalSpec] {
        &self.positionals
    }

    pub fn subcommands(&self) -> impl Iterator<Item = &Command> {
        self.subcommands.values()
    }

    pub fn has_subcommands(&self) -> bool {
        !self.subcommands.is_empty()
    }

    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn positional(&self, name: &str) -> Option<&PositionalSpec> {
        self.positionals.iter().find(|p| p.name == name)
    }

    /// Index of the option spelled exactly `alias` (e.g. `--verbose`, `-v`).
    pub fn option_index(&self, alias: &str) -> Option<usize> {
        self.alias_index.get(alias).copied()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias_index.contains_key(alias)
    }

    pub fn has_short(&self, c: char) -> bool {
        let mut buf = [0u8; 4];
        let mut alias = String::from("-");
        alias.push_str(c.encode_utf8(&mut buf));
        self.has_alias(&alias)
    }

    /// Subcommand by name or alias.
    pub fn subcommand(&self, name: &str) -> Option<&Command> {
        self.subcommands.get(name).or_else(|| {
            self.subcommands
                .values()
                .find(|c| c.aliases.iter().any(|a| a == name))
        })
    }

    /// Walk `path` (subcommand names or aliases below `self`) and return the
    /// chain of commands from `self` to the last one.
    pub fn resolve_path<S: AsRef<str>>(&self, path: &[S]) -> Option<Vec<&Command>> {
        let mut chain = vec![self];
        let mut current = self;
        for name in path {
            current = current.subcommand(name.as_ref())?;
            chain.push(current);
        }
        Some(chain)
    }

    /// Fewest positional tokens this command needs.
    pub fn min_positionals(&self) -> usize {
        self.positionals.iter().map(|p| p.arity.min()).sum()
    }

    /// Most positional tokens this command can take, `None` if unbounded.
    pub fn max_positionals(&self) -> Option<usize> {
        self.positionals
            .iter()
            .try_fold(0usize, |acc, p| p.arity.max().map(|m| acc + m))
    }

    /// Name shown in messages for an option or positional field.
    pub fn field_display_name(&self, name: &str) -> String {
        if let Some(o) = self.option(name) {
            return o.display_name().to_string();
        }
        if let Some(p) = self.positional(name) {
            return p.display_name();
        }
        name.to_string()
    }

    fn has_field(&self, name: &str) -> bool {
        self.option(name).is_some() || self.positional(name).is_some()
    }

    /// Register an option, checking names, aliases and arity.
    pub fn add_option(&mut self, mut spec: OptionSpec) -> Result<&mut Self, ConfigurationError> {
        check_name("option", &spec.name)?;
        if self.has_field(&spec.name) {
            return Err(ConfigurationError::DuplicateName {
                command: self.name.clone(),
                name: spec.name,
            });
        }

        if spec.aliases.is_empty() {
            spec.aliases.push(format!("--{}", spec.name));
        }
        let mut aliases = Vec::with_capacity(spec.aliases.len());
        for raw in &spec.aliases {
            let alias = normalize_alias(raw);
            if !is_valid_alias(&alias) {
                return Err(ConfigurationError::InvalidAlias {
                    name: spec.name.clone(),
                    alias: raw.clone(),
                });
            }
            let existing = self
                .option_index(&alias)
                .map(|i| self.options[i].name.clone())
                .or_else(|| aliases.contains(&alias).then(|| spec.name.clone()));
            if let Some(existing) = existing {
                return Err(ConfigurationError::DuplicateAlias {
                    alias,
                    name: spec.name.clone(),
                    existing,
                });
            }
            aliases.push(alias);
        }
        spec.aliases = aliases;

        match spec.arity {
            Arity::Optional => {
                return Err(ConfigurationError::InvalidArity {
                    name: spec.name,
                    reason: "options take a fixed or variadic number of values".to_string(),
                });
            }
            Arity::Variadic { min: 0 } => {
                return Err(ConfigurationError::InvalidArity {
                    name: spec.name,
                    reason: "variadic options need at least one value".to_string(),
                });
            }
            _ => {}
        }
        if spec.multiplicity == Multiplicity::Count && spec.takes_value() {
            return Err(ConfigurationError::InvalidField {
                name: spec.name,
                reason: "only flags can count occurrences".to_string(),
            });
        }
        if spec.required && spec.default.is_some() {
            return Err(ConfigurationError::InvalidField {
                name: spec.name,
                reason: "a required option cannot have a default".to_string(),
            });
        }

        let index = self.options.len();
        for alias in &spec.aliases {
            self.alias_index.insert(alias.clone(), index);
        }
        self.options.push(spec);
        Ok(self)
    }

    /// Register a positional, keeping the arity sequence unambiguous.
    pub fn add_positional(&mut self, spec: PositionalSpec) -> Result<&mut Self, ConfigurationError> {
        check_name("positional", &spec.name)?;
        if self.has_field(&spec.name) {
            return Err(ConfigurationError::DuplicateName {
                command: self.name.clone(),
                name: spec.name,
            });
        }
        if spec.arity == Arity::Fixed(0) {
            return Err(ConfigurationError::InvalidArity {
                name: spec.name,
                reason: "positionals take at least one value".to_string(),
            });
        }
        if !spec.arity.is_fixed() {
            if let Some(existing) = self.positionals.iter().find(|p| !p.arity.is_fixed()) {
                return Err(ConfigurationError::AmbiguousPositionals {
                    name: spec.name,
                    existing: existing.name.clone(),
                });
            }
        } else if spec.default.is_some() {
            return Err(ConfigurationError::InvalidField {
                name: spec.name,
                reason: "a positional with fixed arity is always required and cannot have a default"
                    .to_string(),
            });
        }
        self.positionals.push(spec);
        Ok(self)
    }

    /// Attach a child command; its name and aliases must be new here.
    pub fn add_subcommand(&mut self, child: Command) -> Result<&mut Self, ConfigurationError> {
        check_name("subcommand", &child.name)?;
        let mut taken: HashSet<&str> = HashSet::new();
        for name in std::iter::once(&child.name).chain(child.aliases.iter()) {
            if !taken.insert(name.as_str()) {
                return Err(ConfigurationError::DuplicateSubcommand {
                    command: self.name.clone(),
                    name: name.clone(),
                    existing: child.name.clone(),
                });
            }
            if let Some(existing) = self.subcommand(name) {
                return Err(ConfigurationError::DuplicateSubcommand {
                    command: self.name.clone(),
                    name: name.clone(),
                    existing: existing.name.clone(),
                });
            }
        }
        self.subcommands.insert(child.name.clone(), child);
        Ok(self)
    }

    /// Check `conflicts_with` / `requires` references across the whole tree.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for opt in &self.options {
            let relations = opt
                .conflicts_with
                .iter()
                .map(|o| ("conflicts with", o))
                .chain(opt.requires.iter().map(|o| ("requires", o)));
            for (relation, other) in relations {
                if !self.has_field(other) {
                    return Err(ConfigurationError::UnknownReference {
                        name: opt.name.clone(),
                        relation,
                        other: other.clone(),
                    });
                }
            }
        }
        for child in self.subcommands.values() {
            child.validate()?;
        }
        Ok(())
    }
}

fn check_name(what: &'static str, name: &str) -> Result<(), ConfigurationError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConfigurationError::InvalidName {
            what,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn normalize_alias(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        trimmed.to_string()
    } else if trimmed.chars().count() == 1 {
        format!("-{trimmed}")
    } else {
        format!("--{trimmed}")
    }
}

fn is_valid_alias(alias: &str) -> bool {
    let no_space = !alias.chars().any(char::is_whitespace);
    if let Some(long) = alias.strip_prefix("--") {
        no_space && !long.is_empty() && !long.starts_with('-') && !long.contains('=')
    } else if let Some(short) = alias.strip_prefix('-') {
        let mut chars = short.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c != '-' && c != '=' && !c.is_whitespace())
    } else {
        false
    }
}
