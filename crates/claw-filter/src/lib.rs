//! Boolean filter expressions for alarm routing.
//!
//! `claw-filter` compiles small rule expressions once and evaluates them
//! against any type implementing [`EvalContext`].
//!
//! # Language
//!
//! - literals: `'text'`, `"text"`, `42`, `-1.5`, `true`, `false`, `null`, `[a, b]`
//! - dotted paths resolved by the context: `alarm.node.label`
//! - comparison: `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - full-match regex or list membership: `=~`, `!~`
//! - prefix and suffix: `=^`, `!^`, `=$`, `!$`
//! - logic: `&&`/`and`, `||`/`or`, `!`/`not`, parentheses
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use claw_filter::{Expression, Predicate, Value};
//!
//! let mut alarm = HashMap::new();
//! alarm.insert("alarm.severity".to_string(), Value::from("CRITICAL"));
//! alarm.insert("alarm.node.label".to_string(), Value::from("core-sw-1"));
//!
//! let filter = Expression::compile(
//!     "alarm.severity =~ ['MAJOR', 'CRITICAL'] && alarm.node.label =^ 'core-'",
//! ).unwrap();
//! assert!(filter.test(&alarm).unwrap());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod expression;
mod lexer;
mod parser;
pub mod value;

pub use error::{FilterError, Result};
pub use expression::{Expression, Predicate};
pub use value::{EvalContext, Value};
