//! Application configuration loading for CLI defaults.
//!
//! The file uses a flat `key = value` subset of TOML: strings are
//! double-quoted, numbers and booleans are bare, `#` starts a comment.

use std::env;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};

/// Directory name under the config base.
const APP_CONFIG_DIR: &str = "tabfetch";
const CONFIG_FILE_NAME: &str = "config.toml";

/// File-backed defaults for tabfetch. Every field mirrors a CLI option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub name_filter: Option<String>,
    /// Header names, replacing column detection.
    pub columns: Option<Vec<String>>,
    pub max_columns: Option<u8>,
    pub concurrency: Option<u8>,
    pub max_attempts: Option<u8>,
    pub disambiguate: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Checks every present value against the range the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        check_range("max_columns", self.max_columns, 1..=50)?;
        check_range("concurrency", self.concurrency, 1..=100)?;
        check_range("max_attempts", self.max_attempts, 1..=10)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1..=3600)?;
        check_range("read_timeout_secs", self.read_timeout_secs, 1..=3600)?;
        if self
            .columns
            .as_ref()
            .is_some_and(|columns| columns.iter().any(|c| c.is_empty()))
        {
            bail!("Invalid config value for `columns`: entries must not be empty");
        }
        Ok(())
    }

    fn set(&mut self, key: &str, scalar: Scalar) -> Result<()> {
        match key {
            "output_dir" => self.output_dir = Some(PathBuf::from(scalar.into_text()?)),
            "name_filter" => self.name_filter = Some(scalar.into_text()?),
            "columns" => {
                let list = scalar.into_text()?;
                self.columns = Some(list.split(',').map(|c| c.trim().to_string()).collect());
            }
            "max_columns" => self.max_columns = Some(scalar.into_integer()?),
            "concurrency" => self.concurrency = Some(scalar.into_integer()?),
            "max_attempts" => self.max_attempts = Some(scalar.into_integer()?),
            "disambiguate" => self.disambiguate = Some(scalar.into_boolean()?),
            "connect_timeout_secs" => self.connect_timeout_secs = Some(scalar.into_integer()?),
            "read_timeout_secs" => self.read_timeout_secs = Some(scalar.into_integer()?),
            "verbosity" => self.verbosity = Some(scalar.into_text()?.parse()?),
            unknown => bail!("Unknown configuration key: '{unknown}'"),
        }
        Ok(())
    }
}

fn check_range<T>(field: &str, value: Option<T>, range: RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    match value {
        Some(value) if !range.contains(&value) => bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        ),
        _ => Ok(()),
    }
}

/// Log verbosity accepted by the `verbosity` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl FromStr for VerbositySetting {
    type Err = anyhow::Error;

    fn from_str(label: &str) -> Result<Self> {
        match label {
            "default" => Ok(Self::Default),
            "verbose" => Ok(Self::Verbose),
            "quiet" => Ok(Self::Quiet),
            "debug" => Ok(Self::Debug),
            other => bail!("Unknown verbosity '{other}'. Expected one of: default, verbose, quiet, debug"),
        }
    }
}

/// A bare value from the right-hand side of `key = value`.
#[derive(Debug, PartialEq, Eq)]
enum Scalar {
    Text(String),
    Integer(u64),
    Boolean(bool),
}

impl Scalar {
    fn scan(raw: &str) -> Result<Self> {
        if let Some(inner) = raw.strip_prefix('"') {
            return inner
                .strip_suffix('"')
                .map(|text| Self::Text(text.to_string()))
                .ok_or_else(|| anyhow!("Unterminated string"));
        }
        match raw {
            "true" => return Ok(Self::Boolean(true)),
            "false" => return Ok(Self::Boolean(false)),
            _ => {}
        }
        raw.parse::<u64>()
            .map(Self::Integer)
            .map_err(|_| anyhow!("Unrecognized value '{raw}'"))
    }

    fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => bail!("Expected double-quoted string, found {other:?}"),
        }
    }

    fn into_integer<T: TryFrom<u64>>(self) -> Result<T> {
        match self {
            Self::Integer(n) => T::try_from(n).map_err(|_| anyhow!("Integer {n} is out of range")),
            other => bail!("Expected integer, found {other:?}"),
        }
    }

    fn into_boolean(self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(b),
            other => bail!("Expected 'true' or 'false', found {other:?}"),
        }
    }
}

/// Resolved config path and the parsed file, if one exists.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: Option<FileConfig>,
}

/// `$XDG_CONFIG_HOME/tabfetch/config.toml`, else `$HOME/.config/tabfetch/config.toml`.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    let base = non_empty_env("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty_env("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join(APP_CONFIG_DIR).join(CONFIG_FILE_NAME))
}

fn non_empty_env(name: &str) -> Option<std::ffi::OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Loads the default config file. A missing file is not an error.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = path
        .as_deref()
        .filter(|p| p.exists())
        .map(load_file_config)
        .transpose()?;
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut config = FileConfig::default();
    for (line_no, line) in (1_usize..).zip(raw.lines()) {
        let line = without_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| anyhow!("Invalid config syntax on line {line_no}: expected key = value"))?;

        Scalar::scan(value)
            .and_then(|scalar| config.set(key, scalar))
            .with_context(|| format!("Invalid `{key}` entry on line {line_no}"))?;
    }
    config.validate()?;
    Ok(config)
}

/// Cuts the line at the first `#` outside a quoted string.
fn without_comment(line: &str) -> &str {
    let mut quoted = false;
    let cut = line.char_indices().find(|&(_, ch)| {
        if ch == '"' {
            quoted = !quoted;
        }
        ch == '#' && !quoted
    });
    cut.map_or(line, |(index, _)| &line[..index])
}
