//! Controller settings loaded from a YAML config file

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::location::DeploymentLocation;

pub const DEFAULT_CONCURRENCY: u16 = 4;
pub const DEFAULT_REQUEUE_SECONDS: u64 = 30;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Settings for one controller process
///
/// ```yaml
/// location:
///   envType: prod
///   account: "123456789012"
///   region: us-east-1
///   label: blue
/// concurrency: 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSettings {
    pub location: DeploymentLocation,

    /// Restrict watches to one namespace; all namespaces when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Maximum number of descriptors reconciled in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: u16,

    /// Delay before a retriable failure is processed again
    #[serde(default = "default_requeue_seconds")]
    pub requeue_seconds: u64,

    /// Port serving `/metrics`; `null` turns the listener off
    #[serde(default = "default_metrics_port")]
    pub metrics_port: Option<u16>,
}

fn default_concurrency() -> u16 {
    DEFAULT_CONCURRENCY
}

fn default_requeue_seconds() -> u64 {
    DEFAULT_REQUEUE_SECONDS
}

fn default_metrics_port() -> Option<u16> {
    Some(DEFAULT_METRICS_PORT)
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            location: DeploymentLocation::default(),
            namespace: None,
            concurrency: DEFAULT_CONCURRENCY,
            requeue_seconds: DEFAULT_REQUEUE_SECONDS,
            metrics_port: default_metrics_port(),
        }
    }
}

impl ControllerSettings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Check every field, reporting all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.location.account.is_empty() {
            problems.push("location.account must be set".to_string());
        }
        if self.location.region.is_empty() {
            problems.push("location.region must be set".to_string());
        }
        if self.concurrency == 0 {
            problems.push("concurrency must be greater than zero".to_string());
        }
        if self.requeue_seconds == 0 {
            problems.push("requeueSeconds must be greater than zero".to_string());
        }
        if self.metrics_port == Some(0) {
            problems.push("metricsPort must not be 0".to_string());
        }
        if matches!(&self.namespace, Some(ns) if ns.is_empty()) {
            problems.push("namespace must not be empty when set".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidSettings { problems })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::EnvType;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let settings = ControllerSettings::from_yaml(
            r#"
location:
  envType: prod
  account: "123456789012"
  region: us-east-1
"#,
        )
        .unwrap();

        assert_eq!(settings.location.env_type, EnvType::Prod);
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.requeue_seconds, DEFAULT_REQUEUE_SECONDS);
        assert!(settings.namespace.is_none());
        assert_eq!(settings.metrics_port, Some(DEFAULT_METRICS_PORT));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_metrics_listener_can_be_disabled() {
        let settings = ControllerSettings::from_yaml(
            "location:\n  envType: dev\n  account: a\n  region: r\nmetricsPort: null\n",
        )
        .unwrap();
        assert!(settings.metrics_port.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let settings = ControllerSettings {
            concurrency: 0,
            ..Default::default()
        };

        let err = settings.validate().unwrap_err();
        match err {
            CoreError::InvalidSettings { problems } => {
                assert_eq!(problems.len(), 3);
                assert!(problems.iter().any(|p| p.contains("account")));
                assert!(problems.iter().any(|p| p.contains("region")));
                assert!(problems.iter().any(|p| p.contains("concurrency")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_env_type_rejected() {
        let result = ControllerSettings::from_yaml(
            "location:\n  envType: qa\n  account: a\n  region: r\n",
        );
        assert!(result.is_err());
    }
}
