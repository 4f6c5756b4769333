//! Server configuration: `config.toml` layered with `HUDDLE__*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use huddle_cascade::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  #[serde(default = "default_store_path")]
  pub store_path:              PathBuf,
  /// When set, `serve` also reprocesses failed notices on this period.
  #[serde(default)]
  pub reprocess_interval_secs: Option<u64>,
  #[serde(default)]
  pub engine:                  EngineConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("huddle.db") }

/// Read `path` (optional) and the environment. `HUDDLE__PORT=9000` sets
/// `port`; `HUDDLE__ENGINE__DISPATCH__CHUNK_SIZE=10` sets a nested field.
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("HUDDLE")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store_path, PathBuf::from("huddle.db"));
    assert_eq!(cfg.reprocess_interval_secs, None);
    assert_eq!(cfg.engine, EngineConfig::default());
  }

  #[test]
  fn nested_engine_settings_override_defaults() {
    let cfg = parse(
      r#"
      port = 9000

      [engine.dispatch]
      chunk_size = 10

      [engine.dispatch.retry]
      retryable_keywords = ["timeout"]
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.engine.dispatch.chunk_size, 10);
    assert_eq!(cfg.engine.dispatch.retry.max_retries, 3);
    assert_eq!(cfg.engine.dispatch.retry.retryable_keywords, vec!["timeout"]);
    assert_eq!(cfg.engine.cascade.default_reason, "管理员删除");
  }

  #[test]
  fn tilde_expands_to_home() {
    let expanded = expand_tilde(Path::new("~/huddle.db"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expanded, PathBuf::from(home).join("huddle.db"));
    }
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }
}
