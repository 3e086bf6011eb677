//! Predicate library: named boolean tests over actor and world state.
//!
//! Each predicate declares an arity and a numeric-argument mask. Bit `i` set
//! means argument `i` is a number, given either as a literal or as a global
//! variable read at call time; a clear bit means the argument is a form
//! reference. Predicates fail closed: unknown names, bad argument lists and
//! missing host objects all evaluate to `false`.

pub mod functions;

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::ids::{ActorHandle, FormId, PredicateId};
use crate::world::WorldQuery;

/// One predicate argument as written in a rule source.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arg {
    /// Literal number.
    Value(f32),
    /// Form reference. In numeric positions it names a global variable.
    Form(FormId),
}

impl Arg {
    /// Resolve a numeric argument, reading global variables through `world`.
    #[inline]
    pub fn number(&self, world: &dyn WorldQuery) -> Option<f32> {
        match *self {
            Arg::Value(v) => Some(v),
            Arg::Form(global) => world.global_value(global),
        }
    }

    #[inline]
    pub fn form(&self) -> Option<FormId> {
        match *self {
            Arg::Form(id) => Some(id),
            Arg::Value(_) => None,
        }
    }
}

/// Signature of a predicate implementation.
pub type PredicateFn = dyn Fn(&dyn WorldQuery, ActorHandle, &[Arg]) -> bool + Send + Sync;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateSpec {
    pub name: String,
    pub arity: usize,
    pub numeric_mask: u32,
}

impl PredicateSpec {
    #[inline]
    pub fn is_numeric(&self, position: usize) -> bool {
        position < 32 && self.numeric_mask & (1 << position) != 0
    }
}

struct Entry {
    spec: PredicateSpec,
    func: Arc<PredicateFn>,
}

/// Registry of predicates addressable by name at load time and by
/// [`PredicateId`] on the hot path.
pub struct PredicateLibrary {
    entries: Vec<Entry>,
    by_name: HashMap<String, PredicateId>,
}

impl PredicateLibrary {
    /// Library with every built-in predicate registered.
    pub fn new() -> Self {
        let mut lib = Self::empty();
        functions::register_builtins(&mut lib);
        lib
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register (or replace) a predicate. Replacing keeps the existing id.
    pub fn register<F>(&mut self, name: &str, arity: usize, numeric_mask: u32, func: F) -> PredicateId
    where
        F: Fn(&dyn WorldQuery, ActorHandle, &[Arg]) -> bool + Send + Sync + 'static,
    {
        let spec = PredicateSpec {
            name: name.to_string(),
            arity,
            numeric_mask,
        };
        let entry = Entry {
            spec,
            func: Arc::new(func),
        };
        let key = name.to_ascii_lowercase();
        if let Some(&id) = self.by_name.get(&key) {
            self.entries[id.0 as usize] = entry;
            return id;
        }
        let id = PredicateId(self.entries.len() as u16);
        self.entries.push(entry);
        self.by_name.insert(key, id);
        id
    }

    /// Case-insensitive name lookup.
    pub fn id(&self, name: &str) -> Option<PredicateId> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn spec(&self, id: PredicateId) -> Option<&PredicateSpec> {
        self.entries.get(id.0 as usize).map(|e| &e.spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.spec.name.as_str())
    }

    /// Validate an argument list against a predicate's signature.
    pub fn check_args(&self, name: &str, args: &[Arg]) -> Result<PredicateId, RuleError> {
        let id = self.id(name).ok_or_else(|| RuleError::UnknownPredicate {
            name: name.to_string(),
        })?;
        let spec = &self.entries[id.0 as usize].spec;
        if args.len() != spec.arity {
            return Err(RuleError::ArityMismatch {
                name: spec.name.clone(),
                expected: spec.arity,
                actual: args.len(),
            });
        }
        for (position, arg) in args.iter().enumerate() {
            if !spec.is_numeric(position) && arg.form().is_none() {
                return Err(RuleError::MalformedArgument {
                    name: spec.name.clone(),
                    position,
                });
            }
        }
        Ok(id)
    }

    /// Hot-path call by id.
    #[inline]
    pub fn call(&self, id: PredicateId, world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg]) -> bool {
        match self.entries.get(id.0 as usize) {
            Some(entry) if entry.spec.arity == args.len() => (entry.func)(world, actor, args),
            _ => false,
        }
    }

    /// Evaluate a predicate by name.
    pub fn evaluate(&self, name: &str, world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg]) -> bool {
        match self.id(name) {
            Some(id) => self.call(id, world, actor, args),
            None => false,
        }
    }
}

impl Default for PredicateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PredicateLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateLibrary")
            .field("predicates", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoWorld;
    impl WorldQuery for NoWorld {}

    #[test]
    fn builtins_are_registered() {
        let lib = PredicateLibrary::new();
        assert_eq!(lib.len(), 53);
        assert!(lib.id("IsFemale").is_some());
        assert_eq!(lib.id("isfemale"), lib.id("IsFemale"));
        let spec = lib.spec(lib.id("IsFactionRankLessThan").unwrap()).unwrap();
        assert_eq!(spec.arity, 2);
        assert!(spec.is_numeric(0));
        assert!(!spec.is_numeric(1));
    }

    #[test]
    fn unknown_predicate_fails_closed() {
        let lib = PredicateLibrary::new();
        assert!(!lib.evaluate("IsDancing", &NoWorld, ActorHandle(1), &[]));
    }

    #[test]
    fn missing_world_data_fails_closed() {
        let lib = PredicateLibrary::new();
        for name in lib.names().collect::<Vec<_>>() {
            let spec = lib.spec(lib.id(name).unwrap()).unwrap().clone();
            let args: Vec<Arg> = (0..spec.arity)
                .map(|i| {
                    if spec.is_numeric(i) {
                        Arg::Form(FormId(0xDEAD))
                    } else {
                        Arg::Form(FormId(0xBEEF))
                    }
                })
                .collect();
            assert!(
                !lib.evaluate(name, &NoWorld, ActorHandle(1), &args),
                "{name} should fail closed"
            );
        }
    }

    #[test]
    fn wrong_arity_fails_closed_at_call_time() {
        let lib = PredicateLibrary::new();
        let id = lib.id("ValueEqualTo").unwrap();
        assert!(!lib.call(id, &NoWorld, ActorHandle(1), &[Arg::Value(1.0)]));
        assert!(lib.call(
            id,
            &NoWorld,
            ActorHandle(1),
            &[Arg::Value(1.0), Arg::Value(1.0)]
        ));
    }

    #[test]
    fn check_args_reports_signature_problems() {
        let lib = PredicateLibrary::new();
        assert!(matches!(
            lib.check_args("IsInFaction", &[]),
            Err(RuleError::ArityMismatch { expected: 1, actual: 0, .. })
        ));
        assert!(matches!(
            lib.check_args("IsInFaction", &[Arg::Value(3.0)]),
            Err(RuleError::MalformedArgument { position: 0, .. })
        ));
        assert!(lib.check_args("IsLevelLessThan", &[Arg::Value(3.0)]).is_ok());
        assert!(lib
            .check_args("IsLevelLessThan", &[Arg::Form(FormId(0x10))])
            .is_ok());
    }

    #[test]
    fn replacing_keeps_id() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut lib = PredicateLibrary::empty();
        let first = lib.register("Probe", 0, 0, |_, _, _| false);
        let counter = hits.clone();
        let second = lib.register("probe", 0, 0, move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert_eq!(first, second);
        assert_eq!(lib.len(), 1);
        assert!(lib.call(first, &NoWorld, ActorHandle(0), &[]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
