//! Static process identity attached to every exported measurement.

use crate::error::{Result, VigilError};

pub const SERVICE_NAME: &str = "service.name";
pub const SERVICE_NAMESPACE: &str = "service.namespace";
pub const SERVICE_VERSION: &str = "service.version";
pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

/// Immutable service identity. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    service_name: String,
    service_version: String,
    environment: String,
}

impl Resource {
    /// Fails when `service_name` is empty: the process must not start without
    /// an identity.
    pub fn new(
        service_name: impl Into<String>,
        service_version: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self> {
        let service_name = service_name.into();
        if service_name.trim().is_empty() {
            return Err(VigilError::Config("service name is required".into()));
        }
        Ok(Self {
            service_name,
            service_version: service_version.into(),
            environment: environment.into(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Attribute pairs in a fixed order. The namespace mirrors the service name.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        vec![
            (SERVICE_NAME, self.service_name.as_str()),
            (SERVICE_NAMESPACE, self.service_name.as_str()),
            (SERVICE_VERSION, self.service_version.as_str()),
            (DEPLOYMENT_ENVIRONMENT, self.environment.as_str()),
        ]
    }
}
