use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub sample: SampleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Where the DuckDB database lives.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbMode {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    #[serde(default)]
    pub mode: DbMode,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BrowserConfig {
    /// When set, browsing is confined to this directory.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
        }
    }
}

fn default_max_rows() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SampleConfig {
    #[serde(default = "default_sample_dir")]
    pub dir: PathBuf,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            dir: default_sample_dir(),
        }
    }
}

fn default_sample_dir() -> PathBuf {
    std::env::temp_dir().join("duckdb_loader")
}

impl Config {
    /// Defaults used when no config file is present: in-memory database,
    /// unconfined browsing, loopback on port 5000.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))
    }
}

/// Loads and validates the TOML config. A missing file yields
/// [`Config::minimal`]; a present but invalid file is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let addr = config.bind_addr()?;
    if !addr.ip().is_loopback() {
        anyhow::bail!(
            "server.bind must be a loopback address, got {} (this tool exposes the whole filesystem)",
            addr
        );
    }

    if config.db.mode == DbMode::File && config.db.path.is_none() {
        anyhow::bail!("db.path is required when db.mode = \"file\"");
    }

    if config.query.max_rows == 0 {
        anyhow::bail!("query.max_rows must be > 0");
    }

    if let Some(root) = &config.browser.root {
        if !root.is_dir() {
            anyhow::bail!("browser.root is not a directory: {}", root.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:5000");
        assert_eq!(cfg.db.mode, DbMode::Memory);
        assert_eq!(cfg.query.max_rows, 10_000);
        assert!(cfg.browser.root.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("loader.toml");
        fs::write(
            &path,
            format!(
                r#"[server]
bind = "127.0.0.1:8123"

[db]
mode = "file"
path = "{root}/loader.duckdb"

[browser]
root = "{root}"
show_hidden = true
exclude_globs = ["*.tmp"]

[query]
max_rows = 50
"#,
                root = tmp.path().display()
            ),
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.bind_addr().unwrap().port(), 8123);
        assert_eq!(cfg.db.mode, DbMode::File);
        assert!(cfg.browser.show_hidden);
        assert_eq!(cfg.browser.exclude_globs, vec!["*.tmp".to_string()]);
        assert_eq!(cfg.query.max_rows, 50);
    }

    #[test]
    fn test_rejects_non_loopback_bind() {
        let mut cfg = Config::minimal();
        cfg.server.bind = "0.0.0.0:5000".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_file_mode_requires_path() {
        let mut cfg = Config::minimal();
        cfg.db.mode = DbMode::File;
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("db.path"));
    }

    #[test]
    fn test_zero_max_rows_rejected() {
        let mut cfg = Config::minimal();
        cfg.query.max_rows = 0;
        assert!(validate(&cfg).is_err());
    }
}
