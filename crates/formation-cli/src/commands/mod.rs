//! CLI command implementations

pub mod render;
pub mod run;

use clap::Args;
use std::path::Path;

use formation_core::{ControllerSettings, EnvType};

use crate::error::{CliError, Result};

/// Deployment location flags shared by `run` and `render`
#[derive(Args, Debug, Default, Clone)]
pub struct LocationArgs {
    /// Environment type of the cluster (dev, staging, prod)
    #[arg(long, env = "FORMATION_ENV_TYPE")]
    pub env_type: Option<String>,

    /// Account the cluster runs in
    #[arg(long, env = "FORMATION_ACCOUNT")]
    pub account: Option<String>,

    /// Region the cluster runs in
    #[arg(long, env = "FORMATION_REGION")]
    pub region: Option<String>,

    /// Free-form label distinguishing clusters in the same region
    #[arg(long, env = "FORMATION_LABEL")]
    pub label: Option<String>,
}

impl LocationArgs {
    /// Override the settings' location with any flags that were given
    pub fn apply(&self, settings: &mut ControllerSettings) -> Result<()> {
        let location = &mut settings.location;
        if let Some(env_type) = &self.env_type {
            location.env_type = env_type.parse::<EnvType>().map_err(|e| {
                CliError::config_with_help(e.to_string(), "use --env-type dev, staging or prod")
            })?;
        }
        if let Some(account) = &self.account {
            location.account = account.clone();
        }
        if let Some(region) = &self.region {
            location.region = region.clone();
        }
        if let Some(label) = &self.label {
            location.label = Some(label.clone());
        }
        Ok(())
    }
}

/// Settings from `path`, or the defaults when no file was given
pub fn load_settings(path: Option<&Path>) -> Result<ControllerSettings> {
    match path {
        Some(path) => ControllerSettings::from_file(path).map_err(|e| match e {
            formation_core::CoreError::Io(io) => CliError::Io {
                message: format!("{}: {}", path.display(), io),
            },
            other => CliError::config(format!("{}: {}", path.display(), other)),
        }),
        None => Ok(ControllerSettings::default()),
    }
}
