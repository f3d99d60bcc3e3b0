//! Formation Engine - variable expansion for resource specs
//!
//! This crate provides the `${prefix:dotted.path}` expansion used when a
//! location descriptor is turned into a state object:
//! - Escapes (`$$`), nested variables and structured substitution
//! - Required and reserved prefixes
//! - `${inline}` map inheritance
//! - Multi-error collection with "did you mean" hints

pub mod error;
pub mod expander;
pub mod lookup;
pub mod spec;
pub mod suggestions;

pub use error::{ErrorList, ExpandError};
pub use expander::{VariableExpander, VariableResolver, is_valid_variable_name, render_value};
pub use lookup::find_in_map;
pub use spec::{INLINE_KEY, SpecExpander};
