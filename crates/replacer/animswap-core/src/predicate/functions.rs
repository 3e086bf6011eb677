//! Built-in predicates.

use std::f64::consts::TAU;

use rand::Rng;

use super::{Arg, PredicateLibrary};
use crate::ids::{ActorHandle, FormId};
use crate::world::{ActorFlag, ActorForm, Hand, ItemKind, Relation, SpellSchool, ValueLayer, WorldQuery};

/// Keyword that distinguishes warhammers from two-handed axes.
pub const WARHAMMER_KEYWORD: FormId = FormId(0x6D930);

const WEAPON_TYPE_TWO_HAND_AXE: u8 = 6;
const WEAPON_TYPE_CROSSBOW: u8 = 9;

/// Equipped-item type codes used by `IsEquipped*Type`:
/// -1 others, 0 fists, 1 swords, 2 daggers, 3 war axes, 4 maces, 5 greatswords,
/// 6 battleaxes, 7 bows, 8 staves, 9 crossbows, 10 warhammers, 11 shields,
/// 12 alteration, 13 illusion, 14 destruction, 15 conjuration, 16 restoration,
/// 17 scrolls, 18 torches.
pub fn equipped_type_code(world: &dyn WorldQuery, form: FormId, kind: ItemKind) -> i32 {
    match kind {
        ItemKind::Spell { school } => match school {
            Some(SpellSchool::Alteration) => 12,
            Some(SpellSchool::Illusion) => 13,
            Some(SpellSchool::Destruction) => 14,
            Some(SpellSchool::Conjuration) => 15,
            Some(SpellSchool::Restoration) => 16,
            None => -1,
        },
        ItemKind::Scroll => 17,
        ItemKind::Shield => 11,
        ItemKind::Light => 18,
        ItemKind::Weapon { weapon_type } if weapon_type > WEAPON_TYPE_CROSSBOW => -1,
        ItemKind::Weapon { weapon_type } if weapon_type == WEAPON_TYPE_TWO_HAND_AXE => {
            if world.item_has_keyword(form, WARHAMMER_KEYWORD) == Some(true) {
                10
            } else {
                i32::from(weapon_type)
            }
        }
        ItemKind::Weapon { weapon_type } => i32::from(weapon_type),
        ItemKind::Armor | ItemKind::Other => -1,
    }
}

/// `current / maximum` clamped to `[0, 1]`; a non-positive maximum counts as full.
pub fn percentage(current: f32, maximum: f32) -> f32 {
    if maximum <= 0.0 {
        return 1.0;
    }
    if current > 0.0 {
        if current >= maximum {
            return 1.0;
        }
        return current / maximum;
    }
    0.0
}

/// Movement direction code: 0 standing still, 1 forward, 2 right, 3 back, 4 left.
/// Sector boundaries sit halfway between the cardinal directions.
pub fn movement_direction(angle: Option<f32>) -> f32 {
    let Some(angle) = angle else {
        return 0.0;
    };
    let wrapped = f64::from(angle).rem_euclid(TAU);
    let y = ((((wrapped / TAU) as f32) + 0.125) * 4.0) % 4.0;
    y.floor() + 1.0
}

/// Hours elapsed in the current in-game day.
pub fn hour_of_day(days_passed: f32, hours_per_day: f32) -> f32 {
    days_passed.fract() * hours_per_day
}

#[inline]
fn numbers<const N: usize>(world: &dyn WorldQuery, args: &[Arg]) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.number(world)?;
    }
    Some(out)
}

#[inline]
fn form_arg(args: &[Arg], position: usize) -> Option<FormId> {
    args.get(position).and_then(Arg::form)
}

fn flag(world: &dyn WorldQuery, actor: ActorHandle, which: ActorFlag) -> bool {
    world.actor_flag(actor, which).unwrap_or(false)
}

fn form_is(world: &dyn WorldQuery, actor: ActorHandle, which: ActorForm, args: &[Arg]) -> bool {
    match (world.actor_form(actor, which), form_arg(args, 0)) {
        (Some(current), Some(wanted)) => current == wanted,
        _ => false,
    }
}

fn related(world: &dyn WorldQuery, actor: ActorHandle, relation: Relation, args: &[Arg]) -> bool {
    form_arg(args, 0)
        .and_then(|form| world.relation(actor, relation, form))
        .unwrap_or(false)
}

fn equipped_is(world: &dyn WorldQuery, actor: ActorHandle, hand: Hand, args: &[Arg]) -> bool {
    match (world.equipped(actor, hand), form_arg(args, 0)) {
        (Some(item), Some(wanted)) => item.form == wanted,
        _ => false,
    }
}

fn equipped_type(world: &dyn WorldQuery, actor: ActorHandle, hand: Hand, args: &[Arg]) -> bool {
    let Some([wanted]) = numbers::<1>(world, args) else {
        return false;
    };
    match world.equipped(actor, hand) {
        Some(item) => equipped_type_code(world, item.form, item.kind) as f32 == wanted,
        None => false,
    }
}

fn equipped_keyword(world: &dyn WorldQuery, actor: ActorHandle, hand: Hand, args: &[Arg]) -> bool {
    match (world.equipped(actor, hand), form_arg(args, 0)) {
        (Some(item), Some(keyword)) => world.item_has_keyword(item.form, keyword).unwrap_or(false),
        _ => false,
    }
}

fn actor_value_cmp(
    world: &dyn WorldQuery,
    actor: ActorHandle,
    layer: ValueLayer,
    args: &[Arg],
    cmp: fn(f32, f32) -> bool,
) -> bool {
    let Some([value_id, wanted]) = numbers::<2>(world, args) else {
        return false;
    };
    match world.actor_value(actor, value_id as u32, layer) {
        Some(value) => cmp(value, wanted),
        None => false,
    }
}

fn actor_value_pct_cmp(world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg], cmp: fn(f32, f32) -> bool) -> bool {
    let Some([value_id, wanted]) = numbers::<2>(world, args) else {
        return false;
    };
    let value_id = value_id as u32;
    let current = world.actor_value(actor, value_id, ValueLayer::Current);
    let maximum = world.actor_value(actor, value_id, ValueLayer::Maximum);
    match (current, maximum) {
        (Some(current), Some(maximum)) => cmp(percentage(current, maximum), wanted),
        _ => false,
    }
}

fn faction_rank_cmp(world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg], cmp: fn(f32, f32) -> bool) -> bool {
    let Some(wanted) = args.first().and_then(|a| a.number(world)) else {
        return false;
    };
    let Some(faction) = form_arg(args, 1) else {
        return false;
    };
    if world.relation(actor, Relation::Faction, faction) != Some(true) {
        return false;
    }
    match world.faction_rank(actor, faction) {
        Some(rank) => cmp(rank as f32, wanted),
        None => false,
    }
}

fn eq(a: f32, b: f32) -> bool {
    a == b
}

fn lt(a: f32, b: f32) -> bool {
    a < b
}

fn random_chance(world: &dyn WorldQuery, _actor: ActorHandle, args: &[Arg]) -> bool {
    let Some([chance]) = numbers::<1>(world, args) else {
        return false;
    };
    if !(0.0..=1.0).contains(&chance) {
        return false;
    }
    if chance == 1.0 {
        return true;
    }
    chance > rand::thread_rng().gen::<f32>()
}

fn game_time_less_than(world: &dyn WorldQuery, _actor: ActorHandle, args: &[Arg]) -> bool {
    let Some([hour]) = numbers::<1>(world, args) else {
        return false;
    };
    match world.game_days_passed() {
        Some(days) => hour > hour_of_day(days, world.hours_per_day()),
        None => false,
    }
}

fn in_location(world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg]) -> bool {
    let (Some(location), Some(current)) = (form_arg(args, 0), world.actor_form(actor, ActorForm::Location)) else {
        return false;
    };
    current == location || world.location_within(current, location).unwrap_or(false)
}

fn movement_is(world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg]) -> bool {
    let Some([wanted]) = numbers::<1>(world, args) else {
        return false;
    };
    movement_direction(world.movement_angle(actor)) == wanted
}

fn level_less_than(world: &dyn WorldQuery, actor: ActorHandle, args: &[Arg]) -> bool {
    let Some([wanted]) = numbers::<1>(world, args) else {
        return false;
    };
    match world.level(actor) {
        Some(level) => f32::from(level) < wanted,
        None => false,
    }
}

fn weather_is(world: &dyn WorldQuery, _actor: ActorHandle, args: &[Arg]) -> bool {
    match (world.current_weather(), form_arg(args, 0)) {
        (Some(current), Some(wanted)) => current == wanted,
        _ => false,
    }
}

fn values_cmp(world: &dyn WorldQuery, args: &[Arg], cmp: fn(f32, f32) -> bool) -> bool {
    match numbers::<2>(world, args) {
        Some([a, b]) => cmp(a, b),
        None => false,
    }
}

macro_rules! flag_predicate {
    ($flag:expr) => {
        |w: &dyn WorldQuery, a: ActorHandle, _: &[Arg]| flag(w, a, $flag)
    };
}

macro_rules! form_predicate {
    ($which:expr) => {
        |w: &dyn WorldQuery, a: ActorHandle, args: &[Arg]| form_is(w, a, $which, args)
    };
}

macro_rules! relation_predicate {
    ($relation:expr) => {
        |w: &dyn WorldQuery, a: ActorHandle, args: &[Arg]| related(w, a, $relation, args)
    };
}

/// Register the built-in catalog. Registration order defines the ids.
pub(crate) fn register_builtins(lib: &mut PredicateLibrary) {
    use ActorFlag as F;
    use ActorForm as AF;
    use Relation as R;
    use ValueLayer as L;

    lib.register("IsEquippedRight", 1, 0, |w, a, args| equipped_is(w, a, Hand::Right, args));
    lib.register("IsEquippedRightType", 1, 1, |w, a, args| equipped_type(w, a, Hand::Right, args));
    lib.register("IsEquippedRightHasKeyword", 1, 0, |w, a, args| {
        equipped_keyword(w, a, Hand::Right, args)
    });
    lib.register("IsEquippedLeft", 1, 0, |w, a, args| equipped_is(w, a, Hand::Left, args));
    lib.register("IsEquippedLeftType", 1, 1, |w, a, args| equipped_type(w, a, Hand::Left, args));
    lib.register("IsEquippedLeftHasKeyword", 1, 0, |w, a, args| {
        equipped_keyword(w, a, Hand::Left, args)
    });
    lib.register("IsEquippedShout", 1, 0, form_predicate!(AF::EquippedShout));
    lib.register("IsWorn", 1, 0, relation_predicate!(R::Worn));
    lib.register("IsWornHasKeyword", 1, 0, relation_predicate!(R::WornKeyword));
    lib.register("IsFemale", 0, 0, flag_predicate!(F::Female));
    lib.register("IsChild", 0, 0, flag_predicate!(F::Child));
    lib.register("IsPlayerTeammate", 0, 0, flag_predicate!(F::PlayerTeammate));
    lib.register("IsInInterior", 0, 0, flag_predicate!(F::InInterior));
    lib.register("IsInFaction", 1, 0, relation_predicate!(R::Faction));
    lib.register("HasKeyword", 1, 0, relation_predicate!(R::Keyword));
    lib.register("HasMagicEffect", 1, 0, relation_predicate!(R::MagicEffect));
    lib.register("HasMagicEffectWithKeyword", 1, 0, relation_predicate!(R::MagicEffectKeyword));
    lib.register("HasPerk", 1, 0, relation_predicate!(R::Perk));
    lib.register("HasSpell", 1, 0, relation_predicate!(R::Spell));
    lib.register("IsActorValueEqualTo", 2, 3, |w, a, args| actor_value_cmp(w, a, L::Current, args, eq));
    lib.register("IsActorValueLessThan", 2, 3, |w, a, args| actor_value_cmp(w, a, L::Current, args, lt));
    lib.register("IsActorValueBaseEqualTo", 2, 3, |w, a, args| actor_value_cmp(w, a, L::Base, args, eq));
    lib.register("IsActorValueBaseLessThan", 2, 3, |w, a, args| actor_value_cmp(w, a, L::Base, args, lt));
    lib.register("IsActorValueMaxEqualTo", 2, 3, |w, a, args| actor_value_cmp(w, a, L::Maximum, args, eq));
    lib.register("IsActorValueMaxLessThan", 2, 3, |w, a, args| actor_value_cmp(w, a, L::Maximum, args, lt));
    lib.register("IsActorValuePercentageEqualTo", 2, 3, |w, a, args| actor_value_pct_cmp(w, a, args, eq));
    lib.register("IsActorValuePercentageLessThan", 2, 3, |w, a, args| actor_value_pct_cmp(w, a, args, lt));
    lib.register("IsLevelLessThan", 1, 1, level_less_than);
    lib.register("IsActorBase", 1, 0, form_predicate!(AF::Template));
    lib.register("IsRace", 1, 0, form_predicate!(AF::Race));
    lib.register("CurrentWeather", 1, 0, weather_is);
    lib.register("CurrentGameTimeLessThan", 1, 1, game_time_less_than);
    lib.register("ValueEqualTo", 2, 3, |w, _, args| values_cmp(w, args, eq));
    lib.register("ValueLessThan", 2, 3, |w, _, args| values_cmp(w, args, lt));
    lib.register("Random", 1, 1, random_chance);
    lib.register("IsUnique", 0, 0, flag_predicate!(F::Unique));
    lib.register("IsClass", 1, 0, form_predicate!(AF::Class));
    lib.register("IsCombatStyle", 1, 0, form_predicate!(AF::CombatStyle));
    lib.register("IsVoiceType", 1, 0, form_predicate!(AF::VoiceType));
    lib.register("IsAttacking", 0, 0, flag_predicate!(F::Attacking));
    lib.register("IsRunning", 0, 0, flag_predicate!(F::Running));
    lib.register("IsSneaking", 0, 0, flag_predicate!(F::Sneaking));
    lib.register("IsSprinting", 0, 0, flag_predicate!(F::Sprinting));
    lib.register("IsInAir", 0, 0, flag_predicate!(F::InAir));
    lib.register("IsInCombat", 0, 0, flag_predicate!(F::InCombat));
    lib.register("IsWeaponDrawn", 0, 0, flag_predicate!(F::WeaponDrawn));
    lib.register("IsInLocation", 1, 0, in_location);
    lib.register("HasRefType", 1, 0, relation_predicate!(R::RefType));
    lib.register("IsParentCell", 1, 0, form_predicate!(AF::ParentCell));
    lib.register("IsWorldSpace", 1, 0, form_predicate!(AF::Worldspace));
    lib.register("IsFactionRankEqualTo", 2, 1, |w, a, args| faction_rank_cmp(w, a, args, eq));
    lib.register("IsFactionRankLessThan", 2, 1, |w, a, args| faction_rank_cmp(w, a, args, lt));
    lib.register("IsMovementDirection", 1, 1, movement_is);
}
