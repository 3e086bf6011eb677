//! Condition expressions: flat chains of predicate terms joined by AND/OR.
//!
//! There is no grouping and no precedence. Terms are evaluated left to right
//! with lazy OR and failing AND short-circuits, in the exact order written.

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::ids::{ActorHandle, PredicateId};
use crate::predicate::{Arg, PredicateLibrary};
use crate::world::WorldQuery;

fn default_true() -> bool {
    true
}

/// Term as supplied by a rule source, before predicate names are resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermSpec {
    pub predicate: String,
    #[serde(default)]
    pub args: Vec<Arg>,
    #[serde(default)]
    pub negate: bool,
    /// Join with the next term: `true` = AND, `false` = OR.
    #[serde(default = "default_true")]
    pub and_next: bool,
    /// The plugin that defines the referenced forms is not loaded.
    #[serde(default)]
    pub source_missing: bool,
}

impl TermSpec {
    pub fn new(predicate: &str, args: Vec<Arg>) -> Self {
        Self {
            predicate: predicate.to_string(),
            args,
            negate: false,
            and_next: true,
            source_missing: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn or_next(mut self) -> Self {
        self.and_next = false;
        self
    }
}

/// Term with its predicate resolved to a library id.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub predicate: PredicateId,
    pub args: Vec<Arg>,
    pub negate: bool,
    pub and_next: bool,
    pub source_missing: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Condition {
    terms: Vec<Term>,
}

impl Condition {
    /// Resolve every term against `lib`. The first bad term rejects the condition.
    pub fn compile(specs: &[TermSpec], lib: &PredicateLibrary) -> Result<Self, RuleError> {
        let terms = specs
            .iter()
            .map(|spec| {
                let predicate = lib.check_args(&spec.predicate, &spec.args)?;
                Ok(Term {
                    predicate,
                    args: spec.args.clone(),
                    negate: spec.negate,
                    and_next: spec.and_next,
                    source_missing: spec.source_missing,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, lib: &PredicateLibrary, world: &dyn WorldQuery, actor: ActorHandle) -> bool {
        // Set after `true || ...`: following OR terms need no evaluation.
        let mut or_satisfied = false;

        for term in &self.terms {
            if or_satisfied {
                // (true || x && y) behaves as (true && y) from here on
                if term.and_next {
                    or_satisfied = false;
                }
                continue;
            }

            let result = if term.source_missing {
                false
            } else {
                lib.call(term.predicate, world, actor, &term.args)
            };

            if result == term.negate {
                if term.and_next {
                    return false;
                }
            } else {
                or_satisfied = !term.and_next;
            }
        }

        true
    }
}
