//! Post-conversion validators.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub type CheckFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// A check run against a converted value.
///
/// Validators see the value as it is bound: a list for multi-value or
/// accumulating fields, a scalar otherwise.
#[derive(Clone)]
pub enum Validator {
    /// Inclusive numeric bounds; lists are checked element-wise.
    Range { min: Option<f64>, max: Option<f64> },
    /// Character count of strings and paths, item count of lists.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    NonEmpty,
    Custom {
        description: String,
        check: Arc<CheckFn>,
    },
}

impl Validator {
    pub fn range(min: impl Into<Option<f64>>, max: impl Into<Option<f64>>) -> Self {
        Self::Range {
            min: min.into(),
            max: max.into(),
        }
    }

    pub fn custom<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Collect every message this validator produces for `value`.
    fn check(&self, value: &Value, out: &mut Vec<String>) {
        match self {
            Self::Range { min, max } => match value {
                Value::List(items) => {
                    for item in items {
                        self.check(item, out);
                    }
                }
                _ => match value.as_float() {
                    Some(x) => {
                        if let Some(min) = min.filter(|m| x < *m) {
                            out.push(format!("{value} is less than the minimum {}", fmt_bound(min)));
                        }
                        if let Some(max) = max.filter(|m| x > *m) {
                            out.push(format!("{value} is greater than the maximum {}", fmt_bound(max)));
                        }
                    }
                    None => out.push(format!("'{value}' is not a number")),
                },
            },
            Self::Length { min, max } => {
                let Some(len) = length_of(value) else {
                    return;
                };
                if let Some(min) = min.filter(|m| len < *m) {
                    out.push(format!("length {len} is less than the minimum {min}"));
                }
                if let Some(max) = max.filter(|m| len > *m) {
                    out.push(format!("length {len} is greater than the maximum {max}"));
                }
            }
            Self::NonEmpty => {
                if length_of(value) == Some(0) {
                    out.push("value must not be empty".to_string());
                }
            }
            Self::Custom { description, check } => {
                if let Err(msg) = check(value) {
                    if msg.is_empty() {
                        out.push(format!("failed check: {description}"));
                    } else {
                        out.push(msg);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::NonEmpty => f.write_str("NonEmpty"),
            Self::Custom { description, .. } => f
                .debug_struct("Custom")
                .field("description", description)
                .finish_non_exhaustive(),
        }
    }
}

/// Run all `validators` against `value`, reporting every failure at once.
pub fn validate(value: &Value, validators: &[Validator]) -> Result<(), Vec<String>> {
    let mut messages = Vec::new();
    for validator in validators {
        validator.check(value, &mut messages);
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages)
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Str(s) => Some(s.chars().count()),
        Value::Path(p) => Some(p.as_os_str().len()),
        Value::List(items) => Some(items.len()),
        _ => None,
    }
}

fn fmt_bound(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        x.to_string()
    }
}
