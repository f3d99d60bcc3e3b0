//! String-level `${prefix:path}` expansion
//!
//! Grammar:
//! - `$$` is a literal `$`
//! - `${name}` is a variable; `name` may itself contain variables
//!   (`${a-${b}}` resolves `b` first and splices its text into the outer name)
//! - a `${` that is never closed is an error
//!
//! A string made of exactly one variable that resolves to a map or list is
//! replaced by that structured value. In every other case the pieces are
//! rendered to text and concatenated.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{ErrorList, ExpandError};

static VALID_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9\-_.]*$").expect("valid regex"));

/// Resolves a variable path (prefix already stripped) to a value
pub trait VariableResolver {
    fn resolve(&self, path: &str) -> Result<JsonValue, ExpandError>;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> Result<JsonValue, ExpandError>,
{
    fn resolve(&self, path: &str) -> Result<JsonValue, ExpandError> {
        self(path)
    }
}

/// Check a variable name once its prefix has been removed
pub fn is_valid_variable_name(name: &str) -> bool {
    VALID_VARIABLE.is_match(name)
}

/// Expands variables carrying one required prefix
pub struct VariableExpander<'a> {
    resolver: &'a dyn VariableResolver,
    prefix: &'a str,
}

impl<'a> VariableExpander<'a> {
    pub fn new(resolver: &'a dyn VariableResolver, prefix: &'a str) -> Self {
        Self { resolver, prefix }
    }

    /// Expand every variable in `input`
    pub fn expand(&self, input: &str) -> Result<JsonValue, ErrorList> {
        let handler = |name: &str| -> Result<JsonValue, ExpandError> {
            let path = strip_and_validate(name, self.prefix)?;
            self.resolver.resolve(path)
        };
        TemplateParser::new(input, &handler).parse()
    }

    /// Whether every variable in `input` carries this expander's prefix
    /// and is well formed. Nothing is resolved.
    pub fn has_valid_prefix(&self, input: &str) -> bool {
        prefix_matches(input, self.prefix)
    }
}

/// Whether every variable in `input` carries `prefix` and is well formed
pub(crate) fn prefix_matches(input: &str, prefix: &str) -> bool {
    let handler = |name: &str| -> Result<JsonValue, ExpandError> {
        strip_and_validate(name, prefix)?;
        Ok(JsonValue::String(name.to_string()))
    };
    TemplateParser::new(input, &handler).parse().is_ok()
}

fn strip_and_validate<'n>(name: &'n str, prefix: &str) -> Result<&'n str, ExpandError> {
    let path = name.strip_prefix(prefix).ok_or_else(|| ExpandError::PrefixNotFound {
        prefix: prefix.to_string(),
    })?;
    if !is_valid_variable_name(path) {
        return Err(ExpandError::InvalidVariableName {
            name: path.to_string(),
        });
    }
    Ok(path)
}

/// Render a resolved value as text for concatenation
pub fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Segment {
    Text(String),
    Value(JsonValue),
}

type NameHandler<'h> = dyn Fn(&str) -> Result<JsonValue, ExpandError> + 'h;

struct TemplateParser<'h> {
    chars: Vec<char>,
    pos: usize,
    handler: &'h NameHandler<'h>,
}

impl<'h> TemplateParser<'h> {
    fn new(input: &str, handler: &'h NameHandler<'h>) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            handler,
        }
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse(mut self) -> Result<JsonValue, ErrorList> {
        let mut errors = ErrorList::new();
        let mut segments = Vec::new();
        let mut text = String::new();

        while let Some(c) = self.next() {
            if c == '$' {
                match self.peek() {
                    Some('$') => {
                        self.pos += 1;
                        text.push('$');
                        continue;
                    }
                    Some('{') => {
                        self.pos += 1;
                        match self.parse_variable() {
                            Ok(value) => {
                                if !text.is_empty() {
                                    segments.push(Segment::Text(std::mem::take(&mut text)));
                                }
                                segments.push(Segment::Value(value));
                            }
                            Err(err) => errors.push(err),
                        }
                        continue;
                    }
                    _ => {}
                }
            }
            text.push(c);
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        errors.into_result(join_segments(segments))
    }

    /// Parse after `${` up to and including the matching `}`
    fn parse_variable(&mut self) -> Result<JsonValue, ExpandError> {
        let mut name = String::new();
        let mut nested_error = None;

        while let Some(c) = self.next() {
            match c {
                '}' => {
                    return match nested_error {
                        Some(err) => Err(err),
                        None => (self.handler)(&name),
                    };
                }
                '$' if self.peek() == Some('$') => {
                    self.pos += 1;
                    name.push('$');
                }
                '$' if self.peek() == Some('{') => {
                    self.pos += 1;
                    match self.parse_variable() {
                        Ok(value) => name.push_str(&render_value(&value)),
                        Err(ExpandError::MissingClosingBracket) => {
                            return Err(ExpandError::MissingClosingBracket);
                        }
                        Err(err) => {
                            nested_error.get_or_insert(err);
                        }
                    }
                }
                other => name.push(other),
            }
        }

        Err(ExpandError::MissingClosingBracket)
    }
}

fn join_segments(segments: Vec<Segment>) -> JsonValue {
    if let [Segment::Value(value @ (JsonValue::Object(_) | JsonValue::Array(_)))] = segments.as_slice() {
        return value.clone();
    }

    let mut out = String::new();
    for segment in &segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Value(v) => out.push_str(&render_value(v)),
        }
    }
    JsonValue::String(out)
}
