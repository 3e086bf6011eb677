//! Read-only view of host character and world state.
//!
//! The host implements [`WorldQuery`]; predicates only ever read through it.
//! Every accessor is fallible and the defaults answer `None`, so a host that
//! does not support a query makes the corresponding predicates evaluate false.

use serde::{Deserialize, Serialize};

use crate::ids::{ActorHandle, FormId};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

/// Boolean state of an actor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ActorFlag {
    Female,
    Child,
    PlayerTeammate,
    InInterior,
    Unique,
    Attacking,
    Running,
    Sneaking,
    Sprinting,
    InAir,
    InCombat,
    WeaponDrawn,
    /// The actor is the player character.
    Player,
    /// The actor is a full character (as opposed to a creature-less reference).
    Character,
}

/// Single form an actor is associated with, compared by identity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ActorForm {
    /// Template (actor base) the actor was spawned from.
    Template,
    Race,
    Class,
    CombatStyle,
    VoiceType,
    EquippedShout,
    ParentCell,
    Worldspace,
    Location,
}

/// Set-membership relation between an actor and a form.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Relation {
    Faction,
    Keyword,
    MagicEffect,
    /// Affected by any magic effect carrying the keyword.
    MagicEffectKeyword,
    Perk,
    /// Knows the spell or shout.
    Spell,
    RefType,
    /// Wears the item.
    Worn,
    /// Wears any item carrying the keyword.
    WornKeyword,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ValueLayer {
    Current,
    Base,
    /// Permanent (maximum) value.
    Maximum,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SpellSchool {
    Alteration,
    Conjuration,
    Destruction,
    Illusion,
    Restoration,
}

/// What kind of object sits in a hand, as far as the type predicates care.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Host weapon animation type (0 = hand to hand ... 9 = crossbow).
    Weapon { weapon_type: u8 },
    Shield,
    Armor,
    Light,
    Spell { school: Option<SpellSchool> },
    Scroll,
    Other,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub form: FormId,
    pub kind: ItemKind,
}

/// Host world/actor query service.
pub trait WorldQuery {
    fn actor_flag(&self, _actor: ActorHandle, _flag: ActorFlag) -> Option<bool> {
        None
    }

    fn actor_form(&self, _actor: ActorHandle, _which: ActorForm) -> Option<FormId> {
        None
    }

    /// `None` when the form is unknown to the host.
    fn relation(&self, _actor: ActorHandle, _relation: Relation, _form: FormId) -> Option<bool> {
        None
    }

    fn equipped(&self, _actor: ActorHandle, _hand: Hand) -> Option<EquippedItem> {
        None
    }

    fn item_has_keyword(&self, _item: FormId, _keyword: FormId) -> Option<bool> {
        None
    }

    fn actor_value(&self, _actor: ActorHandle, _value: u32, _layer: ValueLayer) -> Option<f32> {
        None
    }

    fn level(&self, _actor: ActorHandle) -> Option<u16> {
        None
    }

    /// Rank in a faction the actor belongs to; `None` for non-members.
    fn faction_rank(&self, _actor: ActorHandle, _faction: FormId) -> Option<i32> {
        None
    }

    /// Current value of a global variable.
    fn global_value(&self, _global: FormId) -> Option<f32> {
        None
    }

    fn current_weather(&self) -> Option<FormId> {
        None
    }

    /// Calendar time in (fractional) days since the game started.
    fn game_days_passed(&self) -> Option<f32> {
        None
    }

    fn hours_per_day(&self) -> f32 {
        24.0
    }

    /// Whether `current` is `location` or one of its descendants.
    fn location_within(&self, _current: FormId, _location: FormId) -> Option<bool> {
        None
    }

    /// Movement angle relative to facing, in radians. `None` while standing still.
    fn movement_angle(&self, _actor: ActorHandle) -> Option<f32> {
        None
    }
}
