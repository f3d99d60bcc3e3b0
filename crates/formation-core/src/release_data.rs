//! Release data published alongside a location descriptor

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// ConfigMap data key holding the release document
pub const RELEASE_DATA_KEY: &str = "releases";

/// Nested key/value document used to fill `${release:...}` variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseData(pub Map<String, JsonValue>);

impl ReleaseData {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse the payload of a release config map
    ///
    /// Returns `Ok(None)` for an empty payload. Anything that is not a YAML
    /// mapping is rejected.
    pub fn from_yaml(yaml: &str) -> Result<Option<Self>> {
        if yaml.trim().is_empty() {
            return Ok(None);
        }

        let value: JsonValue = serde_yaml::from_str(yaml)?;
        match value {
            JsonValue::Null => Ok(None),
            JsonValue::Object(map) => Ok(Some(Self(map))),
            other => Err(CoreError::MalformedReleaseData {
                message: format!("expected a mapping, found {}", json_type_name(&other)),
            }),
        }
    }

    /// Extract release data from the string data of a config map
    pub fn from_config_map_data(data: Option<&BTreeMap<String, String>>) -> Result<Option<Self>> {
        let payload = data
            .and_then(|d| d.get(RELEASE_DATA_KEY))
            .ok_or_else(|| CoreError::MissingReleaseKey {
                key: RELEASE_DATA_KEY.to_string(),
            })?;
        Self::from_yaml(payload)
    }

    /// Load release data from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, JsonValue>> for ReleaseData {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "sequence",
        JsonValue::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_yaml_nested() {
        let data = ReleaseData::from_yaml(
            r#"
foobar: 123
deep:
  foobar: something else
"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(data.get("foobar"), Some(&json!(123)));
        assert_eq!(data.get("deep.foobar"), Some(&json!("something else")));
        assert_eq!(data.get("deep.missing"), None);
        assert_eq!(data.get("foobar.inner"), None);
    }

    #[test]
    fn test_from_yaml_empty_is_absent() {
        assert!(ReleaseData::from_yaml("").unwrap().is_none());
        assert!(ReleaseData::from_yaml("   \n").unwrap().is_none());
        assert!(ReleaseData::from_yaml("~").unwrap().is_none());
    }

    #[test]
    fn test_from_yaml_rejects_non_mapping() {
        let err = ReleaseData::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, CoreError::MalformedReleaseData { .. }));
        assert!(err.to_string().contains("sequence"));
    }

    #[test]
    fn test_from_config_map_data_missing_key() {
        let mut data = BTreeMap::new();
        data.insert("other".to_string(), "a: b".to_string());

        let err = ReleaseData::from_config_map_data(Some(&data)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "release config map is missing expected data key: 'releases'"
        );

        assert!(ReleaseData::from_config_map_data(None).is_err());
    }

    #[test]
    fn test_from_config_map_data() {
        let mut data = BTreeMap::new();
        data.insert(RELEASE_DATA_KEY.to_string(), "version: \"1.2\"".to_string());

        let release = ReleaseData::from_config_map_data(Some(&data))
            .unwrap()
            .unwrap();
        assert_eq!(release.get("version"), Some(&json!("1.2")));
    }
}
