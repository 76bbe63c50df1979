//! Config loader (strict parsing, environment overrides).

pub mod schema;

use std::fs;
use std::path::Path;

use vigil_core::error::{Result, VigilError};

pub use schema::{MetricsSection, OpsSection, ServiceSection, VigilConfig};

pub fn load_from_file(path: &str) -> Result<VigilConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| VigilError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<VigilConfig> {
    let cfg = parse(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Startup loader: the file at `path` when it exists (defaults otherwise),
/// then environment overrides, then validation.
pub fn load<F>(path: &str, env: F) -> Result<VigilConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = if Path::new(path).exists() {
        let s = fs::read_to_string(path)
            .map_err(|e| VigilError::Config(format!("read config failed ({path}): {e}")))?;
        parse(&s)?
    } else {
        tracing::info!(%path, "config file not found, using defaults");
        VigilConfig::default()
    };
    cfg.apply_env(env);
    cfg.validate()?;
    Ok(cfg)
}

fn parse(s: &str) -> Result<VigilConfig> {
    serde_yaml::from_str(s).map_err(|e| VigilError::Config(format!("invalid yaml: {e}")))
}
