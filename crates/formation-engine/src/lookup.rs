//! Dotted-path lookup into nested maps

use serde_json::{Map, Value as JsonValue};

use crate::error::ExpandError;
use crate::suggestions::closest_key;

/// Descend `path` (dot separated) into `map`
///
/// A missing key at any depth is `VariableNotDefined` for the whole path,
/// with a hint when a sibling key is close enough. Descending through a
/// non-map value is `NotAMap`.
pub fn find_in_map<'a>(map: &'a Map<String, JsonValue>, path: &str) -> Result<&'a JsonValue, ExpandError> {
    let mut current = map;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let value = current.get(part).ok_or_else(|| ExpandError::VariableNotDefined {
            path: path.to_string(),
            suggestion: closest_key(part, current.keys()),
        })?;

        if parts.peek().is_none() {
            return Ok(value);
        }

        current = value.as_object().ok_or_else(|| ExpandError::NotAMap {
            path: path.to_string(),
        })?;
    }

    // split always yields at least one part
    Err(ExpandError::VariableNotDefined {
        path: path.to_string(),
        suggestion: None,
    })
}
