//! Custom resources reconciled by the controller
//!
//! - `LocationDescriptor` is the declarative intent: the abstract resources a
//!   service needs in one location.
//! - `StateObject` (kind `State`) is what the provisioning engine consumes:
//!   the same resources with variables expanded and defaults attached.

use formation_core::{Condition, ResourceStatus};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "formation.io",
    version = "v1",
    kind = "LocationDescriptor",
    plural = "locationdescriptors",
    shortname = "ld",
    namespaced,
    status = "LocationDescriptorStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct LocationDescriptorSpec {
    /// Config map handed through to the state object
    #[serde(default)]
    pub config_map_name: String,

    #[serde(default)]
    pub config_map_names: ConfigMapNames,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<DescriptorResource>,
}

/// Config maps a descriptor reads from
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct ConfigMapNames {
    /// Config map holding release data
    #[serde(default)]
    pub release: String,
}

/// One abstract resource in a descriptor
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorResource {
    pub name: String,

    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceDependency>,

    /// Raw spec; may contain `${release:...}` variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<JsonValue>,
}

/// Dependency on another resource of the same descriptor
///
/// Accepts either a bare resource name or `{name, attributes}`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(from = "DependencyRepr")]
pub struct ResourceDependency {
    pub name: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DependencyRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        attributes: Map<String, JsonValue>,
    },
}

impl From<DependencyRepr> for ResourceDependency {
    fn from(repr: DependencyRepr) -> Self {
        match repr {
            DependencyRepr::Name(name) => Self {
                name,
                attributes: Map::new(),
            },
            DependencyRepr::Full { name, attributes } => Self { name, attributes },
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationDescriptorStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_statuses: Vec<ResourceStatus>,
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "orchestration.io",
    version = "v1",
    kind = "State",
    root = "StateObject",
    plural = "states",
    namespaced,
    status = "StateStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct StateSpec {
    #[serde(default)]
    pub config_map_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<StateResource>,
}

/// A resource ready for provisioning
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateResource {
    pub name: String,

    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<StateDependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<JsonValue>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct StateDependency {
    pub name: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
}

impl From<&ResourceDependency> for StateDependency {
    fn from(dep: &ResourceDependency) -> Self {
        Self {
            name: dep.name.clone(),
            attributes: dep.attributes.clone(),
        }
    }
}

/// Written by the provisioning engine only
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_statuses: Vec<ResourceStatus>,
}
