//! Expansion error types

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// A single failure while expanding a document
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExpandError {
    #[error("missing closing bracket")]
    #[diagnostic(code(formation::expand::syntax))]
    MissingClosingBracket,

    #[error("invalid variable name: {name}")]
    #[diagnostic(
        code(formation::expand::invalid_name),
        help("variable names start with a letter and contain only letters, digits, '-', '_' and '.'")
    )]
    InvalidVariableName { name: String },

    #[error("variable not defined: {path:?}{}", did_you_mean(.suggestion))]
    #[diagnostic(code(formation::expand::undefined))]
    VariableNotDefined {
        path: String,
        suggestion: Option<String>,
    },

    #[error("key must refer to map")]
    #[diagnostic(code(formation::expand::not_a_map))]
    NotAMap { path: String },

    /// A token whose prefix is neither the required one nor reserved
    #[error("unknown template prefix in {value:?}: expected {expected:?}")]
    #[diagnostic(code(formation::expand::unknown_prefix))]
    UnknownPrefix { value: String, expected: String },

    /// Raised per token while parsing; folded into `UnknownPrefix` per string
    #[error("required prefix '{prefix}' not found")]
    #[diagnostic(code(formation::expand::prefix))]
    PrefixNotFound { prefix: String },

    #[error("only maps can be inherited")]
    #[diagnostic(code(formation::expand::inline))]
    InlineNotMap,

    /// Resolver-specific failure
    #[error("{message}")]
    #[diagnostic(code(formation::expand::resolve))]
    Unresolvable { message: String },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(", did you mean {:?}", s),
        None => String::new(),
    }
}

impl ExpandError {
    pub fn unresolvable(message: impl Into<String>) -> Self {
        Self::Unresolvable {
            message: message.into(),
        }
    }

    /// Whether this is an undefined-variable failure
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::VariableNotDefined { .. })
    }
}

/// Ordered accumulator of independent expansion errors
///
/// Errors are collected rather than returned on first failure, so one bad
/// reference never hides another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    errors: Vec<ExpandError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ExpandError) {
        self.errors.push(error);
    }

    /// Append every error of another list, flattening it
    pub fn extend(&mut self, other: ErrorList) {
        self.errors.extend(other.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ExpandError] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExpandError> {
        self.errors.iter()
    }

    /// Convert to a result, `Ok(value)` only if nothing was collected
    pub fn into_result<T>(self, value: T) -> Result<T, ErrorList> {
        if self.has_errors() { Err(self) } else { Ok(value) }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

impl From<ExpandError> for ErrorList {
    fn from(err: ExpandError) -> Self {
        Self { errors: vec![err] }
    }
}

impl FromIterator<ExpandError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = ExpandError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ErrorList {
    type Item = ExpandError;
    type IntoIter = std::vec::IntoIter<ExpandError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a ExpandError;
    type IntoIter = std::slice::Iter<'a, ExpandError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
