//! Document-level expansion
//!
//! Walks a JSON document and expands every string in it. Maps may carry an
//! `${inline}` key whose value (after expansion) must be a map; its entries
//! are merged into the enclosing map underneath the map's own keys.

use serde_json::{Map, Value as JsonValue};

use crate::error::{ErrorList, ExpandError};
use crate::expander::{VariableExpander, VariableResolver, prefix_matches};

/// Map key whose value is merged into the enclosing map
pub const INLINE_KEY: &str = "${inline}";

/// Expands `${prefix:path}` variables throughout a document
pub struct SpecExpander<'a> {
    resolver: &'a dyn VariableResolver,
    required_prefix: String,
    reserved_prefixes: Vec<String>,
}

impl<'a> SpecExpander<'a> {
    /// Expander resolving variables that start with `required_prefix`
    pub fn new(resolver: &'a dyn VariableResolver, required_prefix: impl Into<String>) -> Self {
        Self {
            resolver,
            required_prefix: required_prefix.into(),
            reserved_prefixes: Vec::new(),
        }
    }

    /// Prefixes left untouched for a later expansion stage
    pub fn with_reserved_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn required_prefix(&self) -> &str {
        &self.required_prefix
    }

    /// Expand a whole document, collecting every failure
    pub fn expand(&self, document: &JsonValue) -> Result<JsonValue, ErrorList> {
        let mut errors = ErrorList::new();
        let expanded = self.expand_value(document, &mut errors);
        errors.into_result(expanded)
    }

    fn expand_value(&self, value: &JsonValue, errors: &mut ErrorList) -> JsonValue {
        match value {
            JsonValue::Object(map) => JsonValue::Object(self.expand_map(map, errors)),
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.expand_value(item, errors))
                    .collect(),
            ),
            JsonValue::String(s) => self.expand_string(s, errors),
            other => other.clone(),
        }
    }

    fn expand_map(&self, map: &Map<String, JsonValue>, errors: &mut ErrorList) -> Map<String, JsonValue> {
        let mut expanded = Map::new();

        if let Some(inline) = map.get(INLINE_KEY) {
            let before = errors.len();
            match self.expand_value(inline, errors) {
                JsonValue::Object(inherited) => expanded = inherited,
                JsonValue::String(s) if self.is_reserved(&s) => {
                    expanded.insert(INLINE_KEY.to_string(), JsonValue::String(s));
                }
                _ if errors.len() > before => {}
                _ => errors.push(ExpandError::InlineNotMap),
            }
        }

        for (key, value) in map {
            if key == INLINE_KEY {
                continue;
            }

            let value = match self.expand_value(value, errors) {
                JsonValue::Object(mut own) => {
                    if let Some(JsonValue::Object(inherited)) = expanded.get(key) {
                        fill_missing(&mut own, inherited);
                    }
                    JsonValue::Object(own)
                }
                other => other,
            };
            expanded.insert(key.clone(), value);
        }

        expanded
    }

    fn expand_string(&self, input: &str, errors: &mut ErrorList) -> JsonValue {
        let expander = VariableExpander::new(self.resolver, &self.required_prefix);
        match expander.expand(input) {
            Ok(value) => value,
            Err(failures) => {
                let prefix_mismatch = failures
                    .iter()
                    .any(|e| matches!(e, ExpandError::PrefixNotFound { .. }));

                if !prefix_mismatch {
                    errors.extend(failures);
                } else if self.is_reserved(input) {
                    return JsonValue::String(input.to_string());
                } else {
                    errors.extend(
                        failures
                            .into_iter()
                            .filter(|e| !matches!(e, ExpandError::PrefixNotFound { .. }))
                            .collect(),
                    );
                    errors.push(ExpandError::UnknownPrefix {
                        value: input.to_string(),
                        expected: self.required_prefix.clone(),
                    });
                }
                JsonValue::String(input.to_string())
            }
        }
    }

    fn is_reserved(&self, input: &str) -> bool {
        self.reserved_prefixes
            .iter()
            .any(|prefix| prefix_matches(input, prefix))
    }
}

/// Copy entries of `src` missing from `dst`, recursing into maps present on both sides
fn fill_missing(dst: &mut Map<String, JsonValue>, src: &Map<String, JsonValue>) {
    for (key, value) in src {
        match (dst.get_mut(key), value) {
            (None, _) => {
                dst.insert(key.clone(), value.clone());
            }
            (Some(JsonValue::Object(d)), JsonValue::Object(s)) => fill_missing(d, s),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value_resolver(_path: &str) -> Result<JsonValue, ExpandError> {
        Ok(json!("value"))
    }

    fn map_resolver(_path: &str) -> Result<JsonValue, ExpandError> {
        Ok(json!({
            "key": { "key": "value", "more": "stuff", "in": "here" },
            "top": "inherited",
        }))
    }

    fn undefined_resolver(path: &str) -> Result<JsonValue, ExpandError> {
        Err(ExpandError::VariableNotDefined {
            path: path.to_string(),
            suggestion: None,
        })
    }

    #[test]
    fn test_expand_nested_maps() {
        let expander = SpecExpander::new(&value_resolver, "");
        let doc = json!({
            "key1": { "key": "${expand.me}" },
            "key2": { "key": "${expand.me}" },
            "list": ["${a}", 1, true, null],
        });

        assert_eq!(
            expander.expand(&doc).unwrap(),
            json!({
                "key1": { "key": "value" },
                "key2": { "key": "value" },
                "list": ["value", 1, true, null],
            })
        );
    }

    #[test]
    fn test_required_prefix() {
        let expander = SpecExpander::new(&value_resolver, "expected_prefix.");
        assert_eq!(
            expander.expand(&json!("${expected_prefix.foobar.stuff}")).unwrap(),
            json!("value")
        );

        let errs = expander.expand(&json!("${bad_prefix.foobar.stuff}")).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs.to_string().starts_with("unknown template prefix"));
    }

    #[test]
    fn test_reserved_prefixes_pass_through() {
        let expander = SpecExpander::new(&value_resolver, "expected_prefix:-_")
            .with_reserved_prefixes(["reserved_prefix.", "secret_prefix."]);

        assert_eq!(
            expander.expand(&json!("${expected_prefix:-_foobar.stuff}")).unwrap(),
            json!("value")
        );
        assert_eq!(
            expander.expand(&json!("${reserved_prefix.foobar.stuff}")).unwrap(),
            json!("${reserved_prefix.foobar.stuff}")
        );
        assert_eq!(
            expander.expand(&json!("${secret_prefix.foobar.stuff}")).unwrap(),
            json!("${secret_prefix.foobar.stuff}")
        );
        assert!(expander.expand(&json!("${bad_prefix.foobar.stuff}")).is_err());
    }

    #[test]
    fn test_inline_merges_under_own_keys() {
        let expander = SpecExpander::new(&map_resolver, "");
        let doc = json!({
            "key1": "value",
            "${inline}": "${expand.me}",
            "key": { "should": "merge", "more": "own" },
        });

        assert_eq!(
            expander.expand(&doc).unwrap(),
            json!({
                "key1": "value",
                "top": "inherited",
                "key": { "should": "merge", "key": "value", "more": "own", "in": "here" },
            })
        );
    }

    #[test]
    fn test_inline_literal_map() {
        let expander = SpecExpander::new(&value_resolver, "");
        let doc = json!({
            "${inline}": { "a": "${x}", "b": 2 },
            "b": 3,
        });

        assert_eq!(expander.expand(&doc).unwrap(), json!({ "a": "value", "b": 3 }));
    }

    #[test]
    fn test_inline_must_be_map() {
        let expander = SpecExpander::new(&value_resolver, "");
        let errs = expander
            .expand(&json!({ "${inline}": [1, 2], "a": 1 }))
            .unwrap_err();
        assert_eq!(errs.errors(), &[ExpandError::InlineNotMap]);
    }

    #[test]
    fn test_inline_reserved_kept() {
        let expander =
            SpecExpander::new(&value_resolver, "release:").with_reserved_prefixes(["self:"]);
        let expanded = expander
            .expand(&json!({ "${inline}": "${self:spec}", "a": 1 }))
            .unwrap();
        assert_eq!(expanded, json!({ "${inline}": "${self:spec}", "a": 1 }));
    }

    #[test]
    fn test_all_failures_collected() {
        let expander = SpecExpander::new(&undefined_resolver, "release:");
        let doc = json!({
            "a": "${release:one}",
            "b": ["${release:two}", { "c": "${release:three}-${release:four}" }],
            "d": "${other:five}",
            "e": "${missing",
        });

        let errs = expander.expand(&doc).unwrap_err();
        assert_eq!(errs.len(), 6);
        assert_eq!(errs.iter().filter(|e| e.is_undefined()).count(), 4);
    }

    #[test]
    fn test_scalars_pass_through() {
        let expander = SpecExpander::new(&undefined_resolver, "release:");
        assert_eq!(expander.expand(&json!(42)).unwrap(), json!(42));
        assert_eq!(expander.expand(&JsonValue::Null).unwrap(), JsonValue::Null);
    }
}
