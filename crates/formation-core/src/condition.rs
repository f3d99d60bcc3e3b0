//! Status conditions shared by location descriptors and state objects
//!
//! A condition is a `(type, status)` pair with an optional reason and message.
//! The transition time only moves when the status changes, which lets
//! observers tell a flapping object from one that is just being re-reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition type tag
///
/// The three well-known types are modelled as variants; anything else a
/// provisioning engine reports is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    InProgress,
    Ready,
    Error,
    Other(String),
}

impl ConditionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "InProgress",
            Self::Ready => "Ready",
            Self::Error => "Error",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ConditionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "InProgress" => Self::InProgress,
            "Ready" => Self::Ready,
            "Error" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for ConditionType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ConditionType> for String {
    fn from(t: ConditionType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state condition status
///
/// A status string outside the three known values is kept in `Other` so that
/// an object reporting it can still be read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    Other(String),
}

impl ConditionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
            Self::Other(s) => s,
        }
    }

    /// One of `True`, `False` or `Unknown`
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for ConditionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "True" => Self::True,
            "False" => Self::False,
            "Unknown" => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<ConditionStatus> for String {
    fn from(status: ConditionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl From<bool> for ConditionStatus {
    fn from(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single status condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Create a condition with an empty reason and message and no transition time
    pub fn new(type_: impl Into<ConditionType>, status: ConditionStatus) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_transition_time(mut self, time: DateTime<Utc>) -> Self {
        self.last_transition_time = Some(time);
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.type_, self.status)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Find a condition by type, returning its position and a reference
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    type_: &ConditionType,
) -> Option<(usize, &'a Condition)> {
    conditions
        .iter()
        .enumerate()
        .find(|(_, c)| &c.type_ == type_)
}

/// Conditions reported for one named resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
