//! Identifiers shared between the engine and its host.

use serde::{Deserialize, Serialize};

/// Position of a clip name inside a project's runtime clip table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ClipSlot(pub u32);

impl ClipSlot {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Host form identifier (templates, keywords, factions, global variables, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(pub u32);

/// Opaque handle to a live character, only meaningful to the host's `WorldQuery`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActorHandle(pub u64);

/// Identity of a host clip-table object. The engine never dereferences it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// Handle to a project registered with an [`Engine`](crate::engine::Engine).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub u32);

/// Dense index into a [`PredicateLibrary`](crate::predicate::PredicateLibrary).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PredicateId(pub u16);
