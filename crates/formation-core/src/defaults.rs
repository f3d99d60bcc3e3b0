//! Per-resource-type default settings
//!
//! Every resource written to a state object carries a `defaults` document the
//! provisioning engine falls back to when the resource spec leaves a setting
//! out. Defaults depend on the resource type and, for some types, on the
//! environment the controller runs in.

use once_cell::sync::Lazy;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;

use crate::location::DeploymentLocation;

pub const DYNAMODB: &str = "DynamoDB";
pub const KUBE_COMPUTE: &str = "KubeCompute";
pub const KUBE_INGRESS: &str = "KubeIngress";

const KUBE_COMPUTE_MIN_REPLICAS: i32 = 1;
const KUBE_COMPUTE_MIN_REPLICAS_PROD: i32 = 3;
const KUBE_COMPUTE_MAX_REPLICAS: i32 = 5;
const KUBE_COMPUTE_CPU_TARGET_UTILIZATION: i32 = 80;
const KUBE_COMPUTE_PROBE_TIMEOUT_SECONDS: i32 = 1;
const KUBE_COMPUTE_PROBE_PERIOD_SECONDS: i32 = 10;
const KUBE_COMPUTE_PROBE_SUCCESS_THRESHOLD: i32 = 1;
const KUBE_COMPUTE_PROBE_FAILURE_THRESHOLD: i32 = 3;
const KUBE_COMPUTE_HEALTHCHECK_PATH: &str = "/healthcheck";

// Sized like a t2.micro.
const KUBE_COMPUTE_REQUEST_CPU: &str = "150m";
const KUBE_COMPUTE_REQUEST_MEMORY: &str = "750Mi";
const KUBE_COMPUTE_LIMIT_CPU: &str = "1";
const KUBE_COMPUTE_LIMIT_MEMORY: &str = "1Gi";

const KUBE_INGRESS_TIMEOUT_SECONDS: i32 = 60;

/// Builds the defaults document for one resource type
pub type DefaultsBuilder = fn(&DeploymentLocation) -> JsonValue;

static BUILTIN: Lazy<HashMap<&'static str, DefaultsBuilder>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, DefaultsBuilder> = HashMap::new();
    table.insert(DYNAMODB, dynamodb_defaults);
    table.insert(KUBE_COMPUTE, kube_compute_defaults);
    table.insert(KUBE_INGRESS, kube_ingress_defaults);
    table
});

/// Lookup table from resource type tag to defaults builder
#[derive(Clone)]
pub struct DefaultsTable {
    builders: HashMap<String, DefaultsBuilder>,
}

impl DefaultsTable {
    /// Table with the built-in resource types
    pub fn builtin() -> Self {
        Self {
            builders: BUILTIN
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// Table with no entries; every lookup yields `{}`
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register or replace the builder for a resource type
    pub fn with(mut self, resource_type: impl Into<String>, builder: DefaultsBuilder) -> Self {
        self.builders.insert(resource_type.into(), builder);
        self
    }

    /// Defaults for a resource type at a location; unknown types get `{}`
    pub fn lookup(&self, resource_type: &str, location: &DeploymentLocation) -> JsonValue {
        match self.builders.get(resource_type) {
            Some(builder) => builder(location),
            None => json!({}),
        }
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.builders.contains_key(resource_type)
    }

    /// Registered type tags, sorted
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.builders.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}

impl Default for DefaultsTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for DefaultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultsTable")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

fn dynamodb_defaults(_location: &DeploymentLocation) -> JsonValue {
    json!({ "BackupPeriod": "1 hours" })
}

fn kube_ingress_defaults(_location: &DeploymentLocation) -> JsonValue {
    json!({ "timeoutSeconds": KUBE_INGRESS_TIMEOUT_SECONDS })
}

fn kube_compute_defaults(location: &DeploymentLocation) -> JsonValue {
    let min_replicas = if location.env_type.is_production_like() {
        KUBE_COMPUTE_MIN_REPLICAS_PROD
    } else {
        KUBE_COMPUTE_MIN_REPLICAS
    };

    json!({
        "Scaling": {
            "MinReplicas": min_replicas,
            "MaxReplicas": KUBE_COMPUTE_MAX_REPLICAS,
            "Metrics": [
                {
                    "Type": "Resource",
                    "Resource": {
                        "Name": "cpu",
                        "TargetAverageUtilization": KUBE_COMPUTE_CPU_TARGET_UTILIZATION,
                    },
                },
            ],
        },
        "Container": {
            "ImagePullPolicy": "IfNotPresent",
            "LivenessProbe": http_health_check(),
            "ReadinessProbe": http_health_check(),
            "Resources": {
                "Requests": {
                    "cpu": KUBE_COMPUTE_REQUEST_CPU,
                    "memory": KUBE_COMPUTE_REQUEST_MEMORY,
                },
                "Limits": {
                    "cpu": KUBE_COMPUTE_LIMIT_CPU,
                    "memory": KUBE_COMPUTE_LIMIT_MEMORY,
                },
            },
        },
        "Port": {
            "Protocol": "TCP",
        },
    })
}

fn http_health_check() -> JsonValue {
    json!({
        "TimeoutSeconds": KUBE_COMPUTE_PROBE_TIMEOUT_SECONDS,
        "PeriodSeconds": KUBE_COMPUTE_PROBE_PERIOD_SECONDS,
        "SuccessThreshold": KUBE_COMPUTE_PROBE_SUCCESS_THRESHOLD,
        "FailureThreshold": KUBE_COMPUTE_PROBE_FAILURE_THRESHOLD,
        "HTTPGet": {
            "Path": KUBE_COMPUTE_HEALTHCHECK_PATH,
            "Scheme": "HTTP",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::EnvType;

    fn location(env: EnvType) -> DeploymentLocation {
        DeploymentLocation::new(env, "123456", "us-west-2")
    }

    #[test]
    fn test_dynamodb_defaults() {
        let table = DefaultsTable::builtin();
        assert_eq!(
            table.lookup(DYNAMODB, &location(EnvType::Dev)),
            json!({ "BackupPeriod": "1 hours" })
        );
    }

    #[test]
    fn test_kube_ingress_defaults() {
        let table = DefaultsTable::builtin();
        assert_eq!(
            table.lookup(KUBE_INGRESS, &location(EnvType::Prod)),
            json!({ "timeoutSeconds": 60 })
        );
    }

    #[test]
    fn test_unknown_type_is_empty_object() {
        let table = DefaultsTable::builtin();
        assert_eq!(table.lookup("SQS", &location(EnvType::Dev)), json!({}));
        assert_eq!(table.lookup("", &location(EnvType::Dev)), json!({}));
    }

    #[test]
    fn test_kube_compute_defaults_dev() {
        let table = DefaultsTable::builtin();
        let expected: JsonValue = serde_json::from_str(
            r#"{"Container":{"ImagePullPolicy":"IfNotPresent","LivenessProbe":{"FailureThreshold":3,"HTTPGet":{"Path":"/healthcheck","Scheme":"HTTP"},"PeriodSeconds":10,"SuccessThreshold":1,"TimeoutSeconds":1},"ReadinessProbe":{"FailureThreshold":3,"HTTPGet":{"Path":"/healthcheck","Scheme":"HTTP"},"PeriodSeconds":10,"SuccessThreshold":1,"TimeoutSeconds":1},"Resources":{"Limits":{"cpu":"1","memory":"1Gi"},"Requests":{"cpu":"150m","memory":"750Mi"}}},"Port":{"Protocol":"TCP"},"Scaling":{"MaxReplicas":5,"Metrics":[{"Resource":{"Name":"cpu","TargetAverageUtilization":80},"Type":"Resource"}],"MinReplicas":1}}"#,
        )
        .unwrap();

        assert_eq!(table.lookup(KUBE_COMPUTE, &location(EnvType::Dev)), expected);
    }

    #[test]
    fn test_kube_compute_min_replicas_by_env() {
        let table = DefaultsTable::builtin();
        for (env, expected) in [(EnvType::Dev, 1), (EnvType::Staging, 3), (EnvType::Prod, 3)] {
            let defaults = table.lookup(KUBE_COMPUTE, &location(env));
            assert_eq!(defaults["Scaling"]["MinReplicas"], json!(expected), "env {}", env);
        }
    }

    #[test]
    fn test_custom_builder() {
        fn sqs(_: &DeploymentLocation) -> JsonValue {
            json!({ "MaxReceiveCount": 100 })
        }

        let table = DefaultsTable::empty().with("SQS", sqs);
        assert!(table.contains("SQS"));
        assert!(!table.contains(DYNAMODB));
        assert_eq!(
            table.lookup("SQS", &location(EnvType::Dev)),
            json!({ "MaxReceiveCount": 100 })
        );
        assert_eq!(table.resource_types(), vec!["SQS"]);
    }
}
