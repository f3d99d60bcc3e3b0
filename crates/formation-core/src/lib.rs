//! Formation Core - shared types for the Formation controller
//!
//! This crate provides the foundational types used throughout Formation:
//! - `Condition`: Tri-state status conditions with transition times
//! - `ReleaseData`: Release document used for `${release:...}` variables
//! - `DeploymentLocation`: Environment, account and region of the cluster
//! - `DefaultsTable`: Per-resource-type defaults
//! - `ControllerSettings`: Controller configuration file

pub mod condition;
pub mod defaults;
pub mod error;
pub mod location;
pub mod release_data;
pub mod settings;

pub use condition::{Condition, ConditionStatus, ConditionType, ResourceStatus, find_condition};
pub use defaults::{DefaultsBuilder, DefaultsTable};
pub use error::{CoreError, Result};
pub use location::{DeploymentLocation, EnvType};
pub use release_data::{RELEASE_DATA_KEY, ReleaseData};
pub use settings::ControllerSettings;
