//! Config file loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines (a TOML subset). Values
//! set there replace the built-in defaults; command-line flags replace both.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use url::Url;

const APP_DIR: &str = "gallica-dl";

/// Values read from the config file; `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Views per PDF request.
    pub block_size: Option<u32>,
    /// Attempts per block, first one included.
    pub trials: Option<u32>,
    pub concurrency: Option<u8>,
    /// Leading pages Gallica adds to each block.
    pub preamble_pages: Option<u8>,
    pub base_url: Option<String>,
    /// Contact URL or address appended to the User-Agent.
    pub contact: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    /// Minimum delay between two requests to Gallica, in milliseconds.
    pub request_spacing_ms: Option<u64>,
}

impl FileConfig {
    /// Checks values against the ranges the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        check_range("block_size", self.block_size, 1..=u32::MAX)?;
        check_range("trials", self.trials, 1..=20)?;
        check_range("concurrency", self.concurrency, 1..=16)?;
        check_range("preamble_pages", self.preamble_pages, 0..=20)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1..=3600)?;
        check_range("read_timeout_secs", self.read_timeout_secs, 1..=3600)?;
        check_range("request_spacing_ms", self.request_spacing_ms, 0..=60_000)?;

        if let Some(base_url) = &self.base_url {
            let parsed = Url::parse(base_url)
                .with_context(|| format!("Invalid config value for `base_url`: '{base_url}'"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("Invalid config value for `base_url`: '{base_url}'. Expected an http(s) URL");
            }
        }
        if let Some(contact) = &self.contact
            && contact.trim().is_empty()
        {
            bail!("Invalid config value for `contact`: must not be empty");
        }
        Ok(())
    }
}

fn check_range<T>(field: &str, value: Option<T>, range: std::ops::RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config path, when one could be resolved.
    pub path: Option<PathBuf>,
    pub config: Option<FileConfig>,
    pub loaded_from_file: bool,
}

impl LoadedConfig {
    fn not_loaded(path: Option<PathBuf>) -> Self {
        Self {
            path,
            config: None,
            loaded_from_file: false,
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/gallica-dl/config.toml`
/// 2. `$HOME/.config/gallica-dl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if the file exists.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config: Some(config),
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig::not_loaded(path)),
    }
}

/// Loads an explicitly named config file, which must exist.
pub fn load_config_at(path: &Path) -> Result<LoadedConfig> {
    let config = load_file_config(path)?;
    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "block_size" => {
                cfg.block_size = Some(parse_integer_u32(value).with_context(context)?);
            }
            "trials" => cfg.trials = Some(parse_integer_u32(value).with_context(context)?),
            "concurrency" => {
                cfg.concurrency = Some(parse_integer_u8(value).with_context(context)?);
            }
            "preamble_pages" => {
                cfg.preamble_pages = Some(parse_integer_u8(value).with_context(context)?);
            }
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(context)?),
            "contact" => cfg.contact = Some(parse_string_literal(value).with_context(context)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "request_spacing_ms" => {
                cfg.request_spacing_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let value = parse_integer_u64(raw_value)?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}
