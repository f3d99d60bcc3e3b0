//! Where the controller is deployed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Environment class of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvType {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl EnvType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }

    /// Staging and production run with high-availability defaults
    pub fn is_production_like(&self) -> bool {
        matches!(self, Self::Staging | Self::Prod)
    }
}

impl FromStr for EnvType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" => Ok(Self::Prod),
            other => Err(CoreError::UnknownEnvType(other.to_string())),
        }
    }
}

impl fmt::Display for EnvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster location used to pick per-environment defaults
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentLocation {
    pub env_type: EnvType,

    #[serde(default)]
    pub account: String,

    #[serde(default)]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DeploymentLocation {
    pub fn new(env_type: EnvType, account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            env_type,
            account: account.into(),
            region: region.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for DeploymentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.env_type, self.account, self.region)?;
        if let Some(label) = &self.label {
            write!(f, ".{}", label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_type_parse() {
        assert_eq!("prod".parse::<EnvType>().unwrap(), EnvType::Prod);
        assert_eq!("dev".parse::<EnvType>().unwrap(), EnvType::Dev);
        assert!("production".parse::<EnvType>().is_err());
    }

    #[test]
    fn test_production_like() {
        assert!(EnvType::Prod.is_production_like());
        assert!(EnvType::Staging.is_production_like());
        assert!(!EnvType::Dev.is_production_like());
    }

    #[test]
    fn test_location_yaml() {
        let loc: DeploymentLocation = serde_yaml::from_str(
            "envType: staging\naccount: \"12345\"\nregion: us-east-1\nlabel: blue\n",
        )
        .unwrap();
        assert_eq!(loc.env_type, EnvType::Staging);
        assert_eq!(loc.to_string(), "staging.12345.us-east-1.blue");
    }
}
