use anyhow::{Context, Result, bail};
use argforge::Command;
use argforge_schema::{CommandSchema, DEFAULT_SCHEMA_FILE, OptionSchema, PositionalSchema, ValueSchema};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LoadedSchema {
    pub path: PathBuf,
    pub schema: CommandSchema,
}

impl LoadedSchema {
    pub fn build(&self) -> Result<Command> {
        self.schema
            .build()
            .with_context(|| format!("invalid command schema: {}", self.path.display()))
    }
}

/// Read the schema at `schema_path`, or `argforge.json` in the current directory.
pub fn load_schema(schema_path: Option<&Path>) -> Result<LoadedSchema> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let path = match schema_path {
        Some(p) => resolve_against(&cwd, p),
        None => cwd.join(DEFAULT_SCHEMA_FILE),
    };

    if !path.exists() {
        bail!("schema not found: {}", path.display());
    }

    let contents = fs::read(&path)
        .with_context(|| format!("failed to read schema: {}", path.display()))?;
    let schema = CommandSchema::from_json_bytes(&contents)
        .with_context(|| format!("failed to parse schema JSON: {}", path.display()))?;
    tracing::debug!(path = %path.display(), command = %schema.name, "loaded schema");

    Ok(LoadedSchema { path, schema })
}

/// Write a starter schema into `project_dir`. Existing files are kept unless
/// `overwrite` is set.
pub fn write_default_schema(project_dir: &Path, name: Option<&str>, overwrite: bool) -> Result<PathBuf> {
    let dest = project_dir.join(DEFAULT_SCHEMA_FILE);
    if dest.exists() && !overwrite {
        bail!("{} already exists", dest.display());
    }

    let name = name
        .map(|s| s.to_string())
        .or_else(|| guess_project_name(project_dir))
        .unwrap_or_else(|| "my-cli".to_string());
    let schema = starter_schema(&name);

    let mut out = schema.to_json_pretty().context("failed to serialize schema")?;
    out.push('\n');

    let tmp = dest.with_extension("tmp");
    fs::write(&tmp, out.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    if overwrite && dest.exists() {
        fs::remove_file(&dest).with_context(|| format!("failed to remove {}", dest.display()))?;
    }
    fs::rename(&tmp, &dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))?;
    Ok(dest)
}

fn starter_schema(name: &str) -> CommandSchema {
    let greet = CommandSchema {
        name: "greet".to_string(),
        summary: "Print a greeting".to_string(),
        options: vec![OptionSchema {
            name: "shout".to_string(),
            aliases: vec!["-s".to_string(), "--shout".to_string()],
            help: "Print in upper case".to_string(),
            ..Default::default()
        }],
        positionals: vec![PositionalSchema {
            name: "who".to_string(),
            arity: Some("?".to_string()),
            help: "Who to greet".to_string(),
            default_value: Some("world".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    CommandSchema {
        name: name.to_string(),
        summary: "Describe your command here".to_string(),
        version: "0.1.0".to_string(),
        options: vec![
            OptionSchema {
                name: "verbose".to_string(),
                aliases: vec!["-v".to_string(), "--verbose".to_string()],
                help: "More output (repeatable)".to_string(),
                multiple: argforge_schema::MultipleSchema::Count,
                ..Default::default()
            },
            OptionSchema {
                name: "jobs".to_string(),
                aliases: vec!["-j".to_string(), "--jobs".to_string()],
                help: "Number of workers".to_string(),
                takes_value: true,
                default_value: Some("1".to_string()),
                value: ValueSchema {
                    value_type: Some("integer".to_string()),
                    min: Some(1.0),
                    ..Default::default()
                },
                ..Default::default()
            },
        ],
        subcommands: vec![greet],
        ..Default::default()
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn guess_project_name(project_dir: &Path) -> Option<String> {
    // `.` and `..` carry no name; fall back to the current directory.
    let file_name = project_dir.file_name().and_then(|s| s.to_str());
    let direct = file_name.filter(|s| !s.is_empty() && *s != "." && *s != "..");
    if let Some(name) = direct {
        return Some(name.to_string());
    }

    let cwd = std::env::current_dir().ok()?;
    cwd.file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before UNIX_EPOCH")
            .as_nanos();
        let pid = std::process::id();
        let dir = std::env::temp_dir().join(format!("argforge-schema-{prefix}-{pid}-{nanos}"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn starter_schema_builds() {
        let command = starter_schema("demo").build().expect("starter schema is valid");
        assert_eq!(command.name(), "demo");
        assert!(command.subcommand("greet").is_some());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = make_temp_dir("roundtrip").join("tooling");
        fs::create_dir_all(&dir).expect("create project dir");

        let path = write_default_schema(&dir, None, false).expect("write schema");
        let loaded = load_schema(Some(&path)).expect("load schema");
        assert_eq!(loaded.schema.name, "tooling");
        assert!(loaded.build().is_ok());

        let err = write_default_schema(&dir, None, false).expect_err("no overwrite");
        assert!(err.to_string().contains("already exists"), "{err}");
        assert!(write_default_schema(&dir, Some("renamed"), true).is_ok());

        let _ = fs::remove_dir_all(dir.parent().unwrap_or(&dir));
    }

    #[test]
    fn missing_schema_is_an_error() {
        let dir = make_temp_dir("missing");
        let err = load_schema(Some(&dir.join("nope.json"))).expect_err("missing");
        assert!(err.to_string().starts_with("schema not found"), "{err}");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_schema_names_the_file() {
        let dir = make_temp_dir("malformed");
        let path = dir.join("argforge.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_schema(Some(&path)).expect_err("bad json");
        assert!(
            err.to_string().starts_with("failed to parse schema JSON"),
            "{err}"
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
