//! Load-time error types for rule sources.
//!
//! Resolution never returns errors: a failed lookup is simply "no replacement".

use serde::{Deserialize, Serialize};

use crate::ids::FormId;

/// Reasons a single rule is rejected while a project is loaded.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RuleError {
    /// A second template rule for the same clip and template
    #[error("Duplicate template rule for {template:?} on clip '{clip}'")]
    DuplicateTemplate { clip: String, template: FormId },

    /// A second condition rule with the same priority on one clip
    #[error("Duplicate priority {priority} on clip '{clip}'")]
    DuplicatePriority { clip: String, priority: i32 },

    /// Priority 0 is reserved for template rules
    #[error("Condition rule on clip '{clip}' uses reserved priority 0")]
    ReservedPriority { clip: String },

    /// Condition references a predicate the library does not know
    #[error("Unknown predicate: {name}")]
    UnknownPredicate { name: String },

    /// Wrong number of arguments for a predicate
    #[error("Predicate {name} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A literal number was given where a form reference is required
    #[error("Predicate {name} argument {position} must be a form reference")]
    MalformedArgument { name: String, position: usize },

    /// Rule source names no original clip
    #[error("Rule has an empty source clip")]
    EmptySourceClip,
}

impl RuleError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::DuplicateTemplate { .. }
            | Self::DuplicatePriority { .. }
            | Self::ReservedPriority { .. } => "priority",
            Self::UnknownPredicate { .. }
            | Self::ArityMismatch { .. }
            | Self::MalformedArgument { .. } => "condition",
            Self::EmptySourceClip => "data",
        }
    }
}
