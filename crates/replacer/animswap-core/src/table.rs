//! Clip tables and the one-shot augmentation that embeds replacement clips.
//!
//! After augmentation a table of `capacity` entries is laid out as
//!
//! ```text
//! [0, injected)                 replacement clips, deduplicated
//! [injected, offset)            empty padding
//! [offset, capacity)            original clips, original order
//! ```
//!
//! with `offset = capacity - original_count`. An original slot `s` lives at
//! `s + offset` afterwards, which is the numbering the host hands back to
//! [`SlotRules::resolve`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::condition::Condition;
use crate::error::RuleError;
use crate::ids::{ActorHandle, ClipSlot, FormId, TableId};
use crate::predicate::PredicateLibrary;
use crate::rules::{Rule, RuleRegistry};
use crate::world::{ActorForm, WorldQuery};

/// Immutable list of clip names, cheap to clone and hand to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipBuffer(Arc<[String]>);

impl ClipBuffer {
    pub fn new(names: Vec<String>) -> Self {
        Self(names.into())
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: ClipSlot) -> Option<&str> {
        self.0.get(slot.index()).map(String::as_str)
    }
}

impl From<Vec<String>> for ClipBuffer {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

/// Host-owned clip-name table. The engine reads it and may replace its
/// contents, but only ever refers to it by [`TableId`].
pub trait ClipTable {
    fn id(&self) -> TableId;
    fn clip_names(&self) -> &[String];
    fn install(&mut self, buffer: ClipBuffer);
}

/// One entry of a slot's priority-ordered rule list. A `None` target comes
/// from a rule without a replacement name: it matches, and the original clip
/// plays.
#[derive(Clone, Debug)]
pub enum SlotRule {
    /// Every template rule of the slot, consulted together at priority 0.
    Templates(HashMap<FormId, Option<ClipSlot>>),
    Condition {
        priority: i32,
        condition: Arc<Condition>,
        target: Option<ClipSlot>,
    },
}

impl SlotRule {
    pub fn priority(&self) -> i32 {
        match self {
            SlotRule::Templates(_) => 0,
            SlotRule::Condition { priority, .. } => *priority,
        }
    }
}

/// Per original slot, the rules in descending priority with targets already
/// translated into runtime numbering.
#[derive(Clone, Debug, Default)]
pub struct SlotRules {
    offset: u32,
    slots: Vec<Box<[SlotRule]>>,
}

impl SlotRules {
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Runtime slot of an original slot.
    #[inline]
    pub fn translate(&self, original: ClipSlot) -> Option<ClipSlot> {
        original.0.checked_add(self.offset).map(ClipSlot)
    }

    /// Original slot of a runtime slot, if it lies in the original region.
    #[inline]
    pub fn original_of(&self, runtime: ClipSlot) -> Option<ClipSlot> {
        runtime.0.checked_sub(self.offset).map(ClipSlot)
    }

    /// Rules for an original slot.
    pub fn rules(&self, original: ClipSlot) -> &[SlotRule] {
        self.slots.get(original.index()).map(|r| &r[..]).unwrap_or(&[])
    }

    /// Number of original slots that carry at least one rule.
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|r| !r.is_empty()).count()
    }

    /// First matching rule for `runtime` (a runtime slot), highest priority first.
    /// Resolution stops at the first match even when it keeps the original.
    pub fn resolve(
        &self,
        runtime: ClipSlot,
        lib: &PredicateLibrary,
        world: &dyn WorldQuery,
        actor: ActorHandle,
    ) -> Option<ClipSlot> {
        let original = self.original_of(runtime)?;
        for rule in self.slots.get(original.index())?.iter() {
            match rule {
                SlotRule::Templates(by_template) => {
                    let hit = world
                        .actor_form(actor, ActorForm::Template)
                        .and_then(|template| by_template.get(&template));
                    if let Some(target) = hit {
                        return *target;
                    }
                }
                SlotRule::Condition {
                    condition, target, ..
                } => {
                    if condition.evaluate(lib, world, actor) {
                        return *target;
                    }
                }
            }
        }
        None
    }
}

/// Result of a successful build: the new buffer plus the rules that index it.
#[derive(Clone, Debug)]
pub struct AugmentedTable {
    original: Arc<[String]>,
    buffer: ClipBuffer,
    rules: SlotRules,
    injected: usize,
    overflowed: bool,
}

impl AugmentedTable {
    pub fn buffer(&self) -> &ClipBuffer {
        &self.buffer
    }

    pub fn original_names(&self) -> &[String] {
        &self.original
    }

    pub fn rules(&self) -> &SlotRules {
        &self.rules
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn injected(&self) -> usize {
        self.injected
    }

    /// Replacements did not fit: originals were shifted but no rules installed.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Whether `names` is the table this augmentation was built from.
    pub fn built_from(&self, names: &[String]) -> bool {
        self.original[..] == *names
    }

    /// Whether `names` already holds the augmented buffer.
    pub fn installed_in(&self, names: &[String]) -> bool {
        self.buffer.names() == names
    }
}

#[derive(Clone, Debug)]
pub enum Augmentation {
    Ready(AugmentedTable),
    /// The original table alone fills the capacity; nothing was changed.
    Aborted { original: usize, capacity: u32 },
    /// No rule applies to any clip of the table.
    Skipped,
}

impl Augmentation {
    pub fn table(&self) -> Option<&AugmentedTable> {
        match self {
            Augmentation::Ready(table) => Some(table),
            Augmentation::Aborted { .. } | Augmentation::Skipped => None,
        }
    }
}

/// Deduplicated replacement clip names in first-seen order.
#[derive(Default)]
struct Injected {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl Injected {
    fn intern(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        let next = self.names.len() as u32;
        let key = name.to_ascii_lowercase();
        if !self.index.contains_key(&key) {
            self.index.insert(key, next);
            self.names.push(name.to_string());
        }
    }

    fn slot_of(&self, name: &str) -> Option<ClipSlot> {
        if name.is_empty() {
            return None;
        }
        self.index.get(&name.to_ascii_lowercase()).copied().map(ClipSlot)
    }
}

/// Accumulates one slot's rules while enforcing the per-slot invariants.
#[derive(Default)]
struct SlotRuleSet {
    templates: HashMap<FormId, Option<ClipSlot>>,
    conditions: Vec<(i32, Arc<Condition>, Option<ClipSlot>)>,
}

impl SlotRuleSet {
    fn push(&mut self, clip: &str, rule: &Rule, target: Option<ClipSlot>) -> Result<(), RuleError> {
        match rule {
            Rule::Template(t) => {
                if self.templates.contains_key(&t.template) {
                    return Err(RuleError::DuplicateTemplate {
                        clip: clip.to_string(),
                        template: t.template,
                    });
                }
                self.templates.insert(t.template, target);
            }
            Rule::Condition(c) => {
                if self.conditions.iter().any(|(p, _, _)| *p == c.priority) {
                    return Err(RuleError::DuplicatePriority {
                        clip: clip.to_string(),
                        priority: c.priority,
                    });
                }
                self.conditions.push((c.priority, c.condition.clone(), target));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Box<[SlotRule]> {
        self.conditions.sort_by(|a, b| b.0.cmp(&a.0));
        let split = self.conditions.partition_point(|(p, _, _)| *p > 0);
        let mut low = self.conditions.split_off(split);
        let mut out: Vec<SlotRule> = Vec::with_capacity(self.conditions.len() + low.len() + 1);
        out.extend(self.conditions.drain(..).map(condition_rule));
        if !self.templates.is_empty() {
            out.push(SlotRule::Templates(self.templates));
        }
        out.extend(low.drain(..).map(condition_rule));
        out.into_boxed_slice()
    }
}

fn condition_rule((priority, condition, target): (i32, Arc<Condition>, Option<ClipSlot>)) -> SlotRule {
    SlotRule::Condition {
        priority,
        condition,
        target,
    }
}

/// Build the augmented table for `names`.
///
/// `conflict_latch` is flipped the first time a rule has to be skipped
/// because it collides with another rule at the same slot; only that first
/// conflict is logged.
pub fn augment(names: &[String], registry: &RuleRegistry, capacity: u32, conflict_latch: &AtomicBool) -> Augmentation {
    let original = names.len();
    if original == 0 {
        return Augmentation::Skipped;
    }
    if original >= capacity as usize {
        return Augmentation::Aborted { original, capacity };
    }

    let lowered: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
    if !lowered.iter().any(|n| registry.has_rules_lowercase(n)) {
        return Augmentation::Skipped;
    }

    let mut injected = Injected::default();
    for lower in &lowered {
        for rule in registry.rules_lowercase(lower) {
            if let Rule::Template(t) = rule {
                injected.intern(&t.to);
            }
        }
    }
    for lower in &lowered {
        for rule in registry.rules_lowercase(lower) {
            if let Rule::Condition(c) = rule {
                injected.intern(&c.to);
            }
        }
    }

    let capacity_len = capacity as usize;
    let offset = capacity_len - original;
    let injected_count = injected.names.len();
    let overflowed = original + injected_count > capacity_len;

    let mut buffer = Vec::with_capacity(capacity_len);
    if !overflowed {
        buffer.extend(injected.names.iter().cloned());
    }
    buffer.resize(offset, String::new());
    buffer.extend(names.iter().cloned());

    let mut slots = Vec::new();
    if !overflowed {
        slots.reserve(original);
        for lower in &lowered {
            let mut set = SlotRuleSet::default();
            for rule in registry.rules_lowercase(lower) {
                // empty target: matches, but the original clip plays
                let target = injected.slot_of(rule.target());
                if let Err(err) = set.push(lower, rule, target) {
                    if !conflict_latch.swap(true, Ordering::Relaxed) {
                        log::error!("skipping conflicting rule: {err}");
                    }
                }
            }
            slots.push(set.finish());
        }
    }

    Augmentation::Ready(AugmentedTable {
        original: names.into(),
        buffer: ClipBuffer::new(buffer),
        rules: SlotRules {
            offset: offset as u32,
            slots,
        },
        injected: injected_count,
        overflowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::TermSpec;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn always() -> Condition {
        Condition::default()
    }

    #[test]
    fn layout_puts_replacements_low_and_originals_high() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("walk.hkx", 5, always(), "cond.hkx").unwrap();
        reg.insert_template_rule("idle.hkx", FormId(1), "tmpl.hkx").unwrap();
        reg.insert_template_rule("walk.hkx", FormId(2), "TMPL.hkx").unwrap();

        let latch = AtomicBool::new(false);
        let aug = augment(&names(&["Idle.hkx", "Walk.hkx"]), &reg, 8, &latch);
        let table = aug.table().unwrap();
        assert_eq!(
            table.buffer().names(),
            &names(&["tmpl.hkx", "cond.hkx", "", "", "", "", "Idle.hkx", "Walk.hkx"])[..]
        );
        assert_eq!(table.injected(), 2);
        assert_eq!(table.rules().offset(), 6);
        assert!(!table.overflowed());
        assert!(!latch.load(Ordering::Relaxed));

        let walk = table.rules().rules(ClipSlot(1));
        assert_eq!(walk.len(), 2);
        assert_eq!(walk[0].priority(), 5);
        match &walk[1] {
            SlotRule::Templates(map) => assert_eq!(map.get(&FormId(2)), Some(&Some(ClipSlot(0)))),
            other => panic!("expected templates, got {other:?}"),
        }
    }

    #[test]
    fn negative_priorities_sort_below_templates() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", -1, always(), "neg.hkx").unwrap();
        reg.insert_template_rule("a.hkx", FormId(3), "t.hkx").unwrap();
        reg.insert_condition_rule("a.hkx", 2, always(), "pos.hkx").unwrap();
        let aug = augment(&names(&["a.hkx"]), &reg, 4, &AtomicBool::new(false));
        let priorities: Vec<i32> = aug
            .table()
            .unwrap()
            .rules()
            .rules(ClipSlot(0))
            .iter()
            .map(SlotRule::priority)
            .collect();
        assert_eq!(priorities, [2, 0, -1]);
    }

    #[test]
    fn aborts_when_originals_fill_capacity() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 1, always(), "b.hkx").unwrap();
        let aug = augment(&names(&["a.hkx", "c.hkx"]), &reg, 2, &AtomicBool::new(false));
        assert!(matches!(aug, Augmentation::Aborted { original: 2, capacity: 2 }));
    }

    #[test]
    fn overflow_keeps_originals_but_installs_no_rules() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 1, always(), "x.hkx").unwrap();
        reg.insert_condition_rule("b.hkx", 1, always(), "y.hkx").unwrap();
        let aug = augment(&names(&["a.hkx", "b.hkx"]), &reg, 3, &AtomicBool::new(false));
        let table = aug.table().unwrap();
        assert!(table.overflowed());
        assert_eq!(table.buffer().names(), &names(&["", "a.hkx", "b.hkx"])[..]);
        assert_eq!(table.rules().populated(), 0);
    }

    #[test]
    fn empty_targets_are_not_injected() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 1, always(), "").unwrap();
        reg.insert_condition_rule("a.hkx", 2, always(), "b.hkx").unwrap();
        let aug = augment(&names(&["a.hkx"]), &reg, 4, &AtomicBool::new(false));
        let table = aug.table().unwrap();
        assert_eq!(table.injected(), 1);
        assert_eq!(table.buffer().names(), &names(&["b.hkx", "", "", "a.hkx"])[..]);
        assert_eq!(table.rules().rules(ClipSlot(0)).len(), 2);
    }

    #[test]
    fn matching_empty_target_stops_lower_rules() {
        struct Nobody;
        impl WorldQuery for Nobody {}

        let lib = PredicateLibrary::new();
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 10, always(), "").unwrap();
        reg.insert_condition_rule("a.hkx", 5, always(), "low.hkx").unwrap();
        reg.insert_template_rule("a.hkx", FormId(1), "").unwrap();
        let aug = augment(&names(&["a.hkx"]), &reg, 4, &AtomicBool::new(false));
        let rules = aug.table().unwrap().rules();
        assert_eq!(rules.resolve(ClipSlot(3), &lib, &Nobody, ActorHandle(1)), None);

        // with the empty rule out of the way the lower one fires
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 5, always(), "low.hkx").unwrap();
        let aug = augment(&names(&["a.hkx"]), &reg, 4, &AtomicBool::new(false));
        let rules = aug.table().unwrap().rules();
        assert_eq!(
            rules.resolve(ClipSlot(3), &lib, &Nobody, ActorHandle(1)),
            Some(ClipSlot(0))
        );
    }

    #[test]
    fn unrelated_table_is_skipped() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 1, always(), "b.hkx").unwrap();
        let latch = AtomicBool::new(false);
        assert!(matches!(augment(&names(&["z.hkx"]), &reg, 4, &latch), Augmentation::Skipped));
        assert!(matches!(augment(&[], &reg, 4, &latch), Augmentation::Skipped));
    }

    #[test]
    fn repeated_clip_name_gets_rules_at_every_slot() {
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 1, always(), "b.hkx").unwrap();
        let aug = augment(&names(&["a.hkx", "c.hkx", "A.HKX"]), &reg, 8, &AtomicBool::new(false));
        let rules = aug.table().unwrap().rules();
        assert_eq!(rules.rules(ClipSlot(0)).len(), 1);
        assert!(rules.rules(ClipSlot(1)).is_empty());
        assert_eq!(rules.rules(ClipSlot(2)).len(), 1);
    }

    #[test]
    fn slot_rule_set_rejects_runtime_duplicates() {
        let lib = PredicateLibrary::new();
        let cond = Condition::compile(&[TermSpec::new("IsFemale", vec![])], &lib).unwrap();
        let mut reg = RuleRegistry::new();
        reg.insert_condition_rule("a.hkx", 4, cond, "x.hkx").unwrap();
        let rule = &reg.rules_in_load_order("a.hkx")[0];

        let mut set = SlotRuleSet::default();
        set.push("a.hkx", rule, Some(ClipSlot(0))).unwrap();
        assert!(matches!(
            set.push("a.hkx", rule, Some(ClipSlot(1))),
            Err(RuleError::DuplicatePriority { priority: 4, .. })
        ));
        assert_eq!(set.finish().len(), 1);
    }

    #[test]
    fn runtime_region_translation() {
        let rules = SlotRules {
            offset: 10,
            slots: Vec::new(),
        };
        assert_eq!(rules.translate(ClipSlot(3)), Some(ClipSlot(13)));
        assert_eq!(rules.translate(ClipSlot(u32::MAX - 5)), None);
        assert_eq!(rules.original_of(ClipSlot(13)), Some(ClipSlot(3)));
        assert_eq!(rules.original_of(ClipSlot(9)), None);
    }
}
