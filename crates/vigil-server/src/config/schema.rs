use std::net::SocketAddr;

use regex::Regex;
use serde::Deserialize;
use vigil_core::error::{Result, VigilError};
use vigil_core::registry::View;

use crate::hooks::ignore::DEFAULT_IGNORE_PATHS;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub ops: OpsSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSection::default(),
            ops: OpsSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl VigilConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VigilError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.service.validate()?;
        self.ops.validate()?;
        self.metrics.validate()?;

        Ok(())
    }

    /// Apply environment overrides (read once at startup).
    ///
    /// `SERVICE_NAME`, `SERVICE_VERSION` (fallback `RELEASE_VERSION`),
    /// `DEPLOYMENT_ENVIRONMENT`, `OPS_HOST`, `OPS_PORT`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVICE_NAME") {
            self.service.name = v;
        }
        if let Some(v) = get("SERVICE_VERSION").or_else(|| get("RELEASE_VERSION")) {
            self.service.version = v;
        }
        if let Some(v) = get("DEPLOYMENT_ENVIRONMENT") {
            self.service.environment = v;
        }

        let host = get("OPS_HOST");
        let port = get("OPS_PORT");
        if host.is_some() || port.is_some() {
            let (cur_host, cur_port) = split_listen(&self.ops.listen);
            let host = host.unwrap_or(cur_host);
            let port = port.unwrap_or(cur_port);
            self.ops.listen = join_listen(&host, &port);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_service_version")]
    pub version: String,

    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: default_service_version(),
            environment: default_environment(),
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VigilError::Config("service.name is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsSection {
    #[serde(default = "default_ops_listen")]
    pub listen: String,
}

impl Default for OpsSection {
    fn default() -> Self {
        Self {
            listen: default_ops_listen(),
        }
    }
}

impl OpsSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            VigilError::Config(format!("ops.listen must be a valid SocketAddr ({}): {e}", self.listen))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_ignore_paths")]
    pub ignore_paths: Vec<String>,

    #[serde(default)]
    pub ignore_route_regex: Option<String>,

    #[serde(default)]
    pub suppress_default_metrics: bool,

    #[serde(default)]
    pub suppress_advanced_metrics: bool,

    #[serde(default = "default_event_loop_resolution_ms")]
    pub event_loop_resolution_ms: u64,

    #[serde(default)]
    pub views: Vec<View>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            ignore_paths: default_ignore_paths(),
            ignore_route_regex: None,
            suppress_default_metrics: false,
            suppress_advanced_metrics: false,
            event_loop_resolution_ms: default_event_loop_resolution_ms(),
            views: Vec::new(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(re) = &self.ignore_route_regex {
            Regex::new(re).map_err(|e| {
                VigilError::Config(format!("metrics.ignore_route_regex does not compile: {e}"))
            })?;
        }
        if !(1..=1000).contains(&self.event_loop_resolution_ms) {
            return Err(VigilError::Config(
                "metrics.event_loop_resolution_ms must be between 1 and 1000".into(),
            ));
        }
        for v in &self.views {
            v.validate()
                .map_err(|e| VigilError::Config(format!("metrics.views: {e}")))?;
        }
        Ok(())
    }
}

fn default_service_version() -> String {
    "unset".into()
}
fn default_environment() -> String {
    "development".into()
}
fn default_ops_listen() -> String {
    "0.0.0.0:9464".into()
}
fn default_ignore_paths() -> Vec<String> {
    DEFAULT_IGNORE_PATHS.iter().map(|p| p.to_string()).collect()
}
fn default_event_loop_resolution_ms() -> u64 {
    10
}

fn split_listen(listen: &str) -> (String, String) {
    match listen.rsplit_once(':') {
        Some((host, port)) => (
            host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port.to_string(),
        ),
        None => (listen.to_string(), "9464".to_string()),
    }
}

fn join_listen(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
