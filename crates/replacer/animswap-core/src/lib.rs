//! Animswap core: data-driven animation clip substitution.
//!
//! A host registers behavior projects and their replacement rules, lets the
//! engine augment each project's clip table once, and then asks
//! [`Engine::resolve`] on every clip activation which clip to play instead.

pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod finish;
pub mod ids;
pub mod predicate;
pub mod rules;
pub mod table;
pub mod world;

// Re-exports for hosts
pub use condition::{Condition, Term, TermSpec};
pub use config::{Config, DEFAULT_ANIMATION_LIMIT};
pub use engine::{ActivationGuard, Engine, Project};
pub use error::RuleError;
pub use finish::FinishCache;
pub use ids::{ActorHandle, ClipSlot, FormId, PredicateId, ProjectId, TableId};
pub use predicate::{Arg, PredicateLibrary, PredicateSpec};
pub use rules::{ConditionLink, LoadReport, Rule, RuleRegistry, RuleSource, TemplateLink};
pub use table::{augment, Augmentation, AugmentedTable, ClipBuffer, ClipTable, SlotRule, SlotRules};
pub use world::{
    ActorFlag, ActorForm, EquippedItem, Hand, ItemKind, Relation, SpellSchool, ValueLayer, WorldQuery,
};
