//! Application configuration loading and resolution of run settings.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use davbench_core::webdav::ClientConfig;
use davbench_core::workflow::{FileSet, SuiteConfig};

use crate::cli::Args;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// File configuration for benchmark defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Server root URL.
    pub url: Option<String>,
    /// Account name.
    pub user: Option<String>,
    pub small_count: Option<u64>,
    pub small_size_kib: Option<u64>,
    pub small_parallel: Option<u64>,
    pub medium_count: Option<u64>,
    pub medium_size_mib: Option<u64>,
    pub medium_parallel: Option<u64>,
    pub large_size_mib: Option<u64>,
    /// Chunk size for chunked uploads in MiB.
    pub chunk_size_mib: Option<u64>,
    /// Use chunked uploads for the large file when the server supports them.
    pub chunked: Option<bool>,
    /// Leave the scratch folder on the server.
    pub keep_files: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    /// Timeout for the finalizing MOVE of a chunked upload.
    pub move_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        validate_range("small_count", self.small_count, 1, 1000)?;
        validate_range("small_size_kib", self.small_size_kib, 1, 1_048_576)?;
        validate_range("small_parallel", self.small_parallel, 1, 100)?;
        validate_range("medium_count", self.medium_count, 1, 1000)?;
        validate_range("medium_size_mib", self.medium_size_mib, 1, 10_240)?;
        validate_range("medium_parallel", self.medium_parallel, 1, 100)?;
        validate_range("large_size_mib", self.large_size_mib, 1, 102_400)?;
        validate_range("chunk_size_mib", self.chunk_size_mib, 1, 1024)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("request_timeout_secs", self.request_timeout_secs, 1, 86_400)?;
        validate_range("move_timeout_secs", self.move_timeout_secs, 1, 86_400)?;

        if let Some(url) = &self.url
            && url.trim().is_empty()
        {
            bail!("Invalid config value for `url`: must not be empty");
        }

        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/davbench/config.toml`
/// 2. `$HOME/.config/davbench/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("davbench")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("davbench")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Reads and validates one config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "url" | "user" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_no}"))?;
                if key == "url" {
                    cfg.url = Some(parsed);
                } else {
                    cfg.user = Some(parsed);
                }
            }
            "chunked" | "keep_files" => {
                let parsed = parse_boolean(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_no}"))?;
                if key == "chunked" {
                    cfg.chunked = Some(parsed);
                } else {
                    cfg.keep_files = Some(parsed);
                }
            }
            _ => {
                let Some(slot) = integer_slot(&mut cfg, key) else {
                    bail!("Unknown configuration key: '{key}' on line {line_no}");
                };
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_no}"))?;
                *slot = Some(parsed);
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn integer_slot<'a>(cfg: &'a mut FileConfig, key: &str) -> Option<&'a mut Option<u64>> {
    let slot = match key {
        "small_count" => &mut cfg.small_count,
        "small_size_kib" => &mut cfg.small_size_kib,
        "small_parallel" => &mut cfg.small_parallel,
        "medium_count" => &mut cfg.medium_count,
        "medium_size_mib" => &mut cfg.medium_size_mib,
        "medium_parallel" => &mut cfg.medium_parallel,
        "large_size_mib" => &mut cfg.large_size_mib,
        "chunk_size_mib" => &mut cfg.chunk_size_mib,
        "connect_timeout_secs" => &mut cfg.connect_timeout_secs,
        "request_timeout_secs" => &mut cfg.request_timeout_secs,
        "move_timeout_secs" => &mut cfg.move_timeout_secs,
        _ => return None,
    };
    Some(slot)
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

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

/// Everything `main` needs to start a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub client: ClientConfig,
    pub suite: SuiteConfig,
}

/// Merges CLI arguments over file values over built-in defaults.
pub fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> Result<RunSettings> {
    let fallback = FileConfig::default();
    let file = file.unwrap_or(&fallback);
    let defaults = SuiteConfig::default();

    let Some(url) = args.url.clone().or_else(|| file.url.clone()) else {
        bail!("No server URL given: pass --url, set DAVBENCH_URL, or set `url` in the config file");
    };
    let Some(user) = args.user.clone().or_else(|| file.user.clone()) else {
        bail!("No user given: pass --user, set DAVBENCH_USER, or set `user` in the config file");
    };
    let Some(password) = args.password.clone() else {
        bail!("No password given: pass --password or set DAVBENCH_PASSWORD");
    };

    let small = FileSet {
        count: pick_count(args.small_count, file.small_count, defaults.small.count)?,
        size: pick(args.small_size_kib, file.small_size_kib)
            .map_or(defaults.small.size, |kib| kib * KIB),
        parallel: pick_count(args.small_parallel, file.small_parallel, defaults.small.parallel)?,
    };
    let medium = FileSet {
        count: pick_count(args.medium_count, file.medium_count, defaults.medium.count)?,
        size: pick(args.medium_size_mib, file.medium_size_mib)
            .map_or(defaults.medium.size, |mib| mib * MIB),
        parallel: pick_count(
            args.medium_parallel,
            file.medium_parallel,
            defaults.medium.parallel,
        )?,
    };
    let large_size = pick(args.large_size_mib, file.large_size_mib)
        .map_or(defaults.large_size, |mib| mib * MIB);
    let chunked = !args.no_chunking && file.chunked.unwrap_or(defaults.chunked);
    let keep_files = args.keep_files || file.keep_files.unwrap_or(defaults.keep_files);

    let mut client = ClientConfig::new(url, user, password);
    if let Some(mib) = pick(args.chunk_size_mib, file.chunk_size_mib) {
        let bytes = usize::try_from(mib * MIB).context("chunk size does not fit in memory")?;
        client = client.with_chunk_size(bytes);
    }
    if let Some(secs) = file.connect_timeout_secs {
        client.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.request_timeout_secs {
        client.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.move_timeout_secs {
        client = client.with_move_timeout(Duration::from_secs(secs));
    }

    Ok(RunSettings {
        client,
        suite: SuiteConfig {
            small,
            medium,
            large_size,
            chunked,
            keep_files,
        },
    })
}

fn pick(cli: Option<u64>, file: Option<u64>) -> Option<u64> {
    cli.or(file)
}

fn pick_count(cli: Option<u16>, file: Option<u64>, default: usize) -> Result<usize> {
    match cli.map(u64::from).or(file) {
        Some(value) => usize::try_from(value).context("count does not fit in usize"),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["davbench", "--url", "https://cloud.test", "-u", "bob", "-p", "pw"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
url = "https://cloud.example.com"
small_count = 10
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.url.as_deref(), Some("https://cloud.example.com"));
        assert_eq!(cfg.small_count, Some(10));
        assert!(cfg.user.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
small_parallel = 4 # workers
user = "alice#1" # hash inside quotes is kept
chunked = false
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.small_parallel, Some(4));
        assert_eq!(cfg.user.as_deref(), Some("alice#1"));
        assert_eq!(cfg.chunked, Some(false));
    }

    #[test]
    fn test_parse_config_rejects_zero_parallelism() {
        let err = parse_config_str("small_parallel = 0").expect_err("invalid parallelism expected");
        assert!(err.to_string().contains("small_parallel"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("medium_count = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(format!("{err:#}").contains("medium_count"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("keep_files = yes").expect_err("invalid boolean expected");
        assert!(err.to_string().contains("keep_files"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_url() {
        let err = parse_config_str("url = https://x").expect_err("unquoted string");
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("password = \"x\"").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_load_file_config_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "large_size_mib = 64\nmove_timeout_secs = 900").unwrap();
        let cfg = load_file_config(file.path()).unwrap();
        assert_eq!(cfg.large_size_mib, Some(64));
        assert_eq!(cfg.move_timeout_secs, Some(900));
    }

    #[test]
    fn test_load_file_config_reports_path_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a key value line").unwrap();
        let err = load_file_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_resolve_settings_uses_defaults() {
        let settings = resolve_settings(&args(&[]), None).unwrap();
        assert_eq!(settings.suite, SuiteConfig::default());
        assert_eq!(settings.client.base_url, "https://cloud.test");
        assert_eq!(settings.client.username, "bob");
    }

    #[test]
    fn test_resolve_settings_cli_overrides_file() {
        let file = FileConfig {
            small_count: Some(50),
            small_parallel: Some(10),
            medium_size_mib: Some(2),
            chunked: Some(true),
            ..FileConfig::default()
        };
        let settings =
            resolve_settings(&args(&["--small-count", "7", "--no-chunking"]), Some(&file))
                .unwrap();
        assert_eq!(settings.suite.small.count, 7);
        assert_eq!(settings.suite.small.parallel, 10);
        assert_eq!(settings.suite.medium.size, 2 * MIB);
        assert!(!settings.suite.chunked);
    }

    #[test]
    fn test_resolve_settings_converts_units() {
        let settings = resolve_settings(
            &args(&["--small-size-kib", "4", "--chunk-size-mib", "8"]),
            None,
        )
        .unwrap();
        assert_eq!(settings.suite.small.size, 4096);
        assert_eq!(settings.client.chunk_size, 8 * 1024 * 1024);
    }

    #[test]
    fn test_resolve_settings_url_from_file() {
        let file = FileConfig {
            url: Some("https://from-file.test".to_string()),
            user: Some("carol".to_string()),
            ..FileConfig::default()
        };
        let parsed = Args::try_parse_from(["davbench", "-p", "pw"]).unwrap();
        let settings = resolve_settings(&parsed, Some(&file)).unwrap();
        assert_eq!(settings.client.base_url, "https://from-file.test");
        assert_eq!(settings.client.username, "carol");
    }

    #[test]
    fn test_resolve_settings_requires_password() {
        let parsed =
            Args::try_parse_from(["davbench", "--url", "https://x.test", "-u", "bob"]).unwrap();
        let err = resolve_settings(&parsed, None).unwrap_err();
        assert!(err.to_string().contains("password"));
    }
}
