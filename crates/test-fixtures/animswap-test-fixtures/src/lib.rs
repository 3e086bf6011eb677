use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use hashbrown::{HashMap, HashSet};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use animswap_core::{
    ActorFlag, ActorForm, ActorHandle, ClipBuffer, ClipTable, EquippedItem, FormId, Hand, Relation, RuleSource,
    TableId, ValueLayer, WorldQuery,
};

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    projects: HashMap<String, ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    /// Behavior file path as the host reports it.
    path: String,
    rules: String,
    clips: String,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path).with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name).ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod projects {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.projects.keys().cloned().collect()
    }

    /// Behavior file path of a fixture project.
    pub fn path(name: &str) -> Result<String> {
        Ok(lookup(&MANIFEST.projects, "project", name)?.path.clone())
    }

    pub fn rules_json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.projects, "project", name)?;
        read_to_string(&entry.rules)
    }

    pub fn rules(name: &str) -> Result<RuleSource> {
        let entry = lookup(&MANIFEST.projects, "project", name)?;
        load_json(&entry.rules)
    }

    /// Clip names of the project's host table before augmentation.
    pub fn clips(name: &str) -> Result<Vec<String>> {
        let entry = lookup(&MANIFEST.projects, "project", name)?;
        load_json(&entry.clips)
    }

    pub fn table(name: &str, id: u64) -> Result<VecTable> {
        Ok(VecTable::new(TableId(id), clips(name)?))
    }
}

/// In-memory host clip table.
#[derive(Clone, Debug, PartialEq)]
pub struct VecTable {
    id: TableId,
    names: Vec<String>,
    installs: usize,
}

impl VecTable {
    pub fn new(id: TableId, names: Vec<String>) -> Self {
        Self {
            id,
            names,
            installs: 0,
        }
    }

    pub fn from_names(id: u64, names: &[&str]) -> Self {
        Self::new(TableId(id), names.iter().map(|s| s.to_string()).collect())
    }

    /// How many times a buffer was installed.
    pub fn installs(&self) -> usize {
        self.installs
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl ClipTable for VecTable {
    fn id(&self) -> TableId {
        self.id
    }

    fn clip_names(&self) -> &[String] {
        &self.names
    }

    fn install(&mut self, buffer: ClipBuffer) {
        self.names = buffer.names().to_vec();
        self.installs += 1;
    }
}

/// Map-backed [`WorldQuery`]. Anything not set answers `None`.
#[derive(Clone, Debug, Default)]
pub struct FakeWorld {
    flags: HashMap<(ActorHandle, ActorFlag), bool>,
    forms: HashMap<(ActorHandle, ActorForm), FormId>,
    relations: HashMap<(ActorHandle, Relation), HashSet<FormId>>,
    known_forms: HashSet<FormId>,
    equipped: HashMap<(ActorHandle, Hand), EquippedItem>,
    item_keywords: HashSet<(FormId, FormId)>,
    values: HashMap<(ActorHandle, u32, ValueLayer), f32>,
    levels: HashMap<ActorHandle, u16>,
    ranks: HashMap<(ActorHandle, FormId), i32>,
    globals: HashMap<FormId, f32>,
    weather: Option<FormId>,
    days_passed: Option<f32>,
    /// child location -> parent location
    parents: HashMap<FormId, FormId>,
    movement: HashMap<ActorHandle, f32>,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// A full character (not the player) so activation redirects apply.
    pub fn character(actor: ActorHandle) -> Self {
        Self::new().flag(actor, ActorFlag::Character, true)
    }

    pub fn flag(mut self, actor: ActorHandle, flag: ActorFlag, value: bool) -> Self {
        self.flags.insert((actor, flag), value);
        self
    }

    pub fn form(mut self, actor: ActorHandle, which: ActorForm, form: FormId) -> Self {
        self.forms.insert((actor, which), form);
        self
    }

    pub fn template(self, actor: ActorHandle, template: FormId) -> Self {
        self.form(actor, ActorForm::Template, template)
    }

    /// Make `form` known to the world without relating it to anyone.
    pub fn known(mut self, form: FormId) -> Self {
        self.known_forms.insert(form);
        self
    }

    pub fn relate(mut self, actor: ActorHandle, relation: Relation, form: FormId) -> Self {
        self.known_forms.insert(form);
        self.relations.entry((actor, relation)).or_default().insert(form);
        self
    }

    pub fn equip(mut self, actor: ActorHandle, hand: Hand, item: EquippedItem) -> Self {
        self.known_forms.insert(item.form);
        self.equipped.insert((actor, hand), item);
        self
    }

    pub fn item_keyword(mut self, item: FormId, keyword: FormId) -> Self {
        self.item_keywords.insert((item, keyword));
        self
    }

    pub fn actor_value_of(mut self, actor: ActorHandle, value: u32, layer: ValueLayer, amount: f32) -> Self {
        self.values.insert((actor, value, layer), amount);
        self
    }

    pub fn level_of(mut self, actor: ActorHandle, level: u16) -> Self {
        self.levels.insert(actor, level);
        self
    }

    /// Join `faction` at `rank`.
    pub fn rank(mut self, actor: ActorHandle, faction: FormId, rank: i32) -> Self {
        self.ranks.insert((actor, faction), rank);
        self.relate(actor, Relation::Faction, faction)
    }

    pub fn global(mut self, global: FormId, value: f32) -> Self {
        self.globals.insert(global, value);
        self
    }

    pub fn weather(mut self, weather: FormId) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn days_passed(mut self, days: f32) -> Self {
        self.days_passed = Some(days);
        self
    }

    pub fn location_parent(mut self, child: FormId, parent: FormId) -> Self {
        self.parents.insert(child, parent);
        self
    }

    pub fn moving(mut self, actor: ActorHandle, angle: f32) -> Self {
        self.movement.insert(actor, angle);
        self
    }
}

impl WorldQuery for FakeWorld {
    fn actor_flag(&self, actor: ActorHandle, flag: ActorFlag) -> Option<bool> {
        self.flags.get(&(actor, flag)).copied()
    }

    fn actor_form(&self, actor: ActorHandle, which: ActorForm) -> Option<FormId> {
        self.forms.get(&(actor, which)).copied()
    }

    fn relation(&self, actor: ActorHandle, relation: Relation, form: FormId) -> Option<bool> {
        if !self.known_forms.contains(&form) {
            return None;
        }
        Some(
            self.relations
                .get(&(actor, relation))
                .is_some_and(|set| set.contains(&form)),
        )
    }

    fn equipped(&self, actor: ActorHandle, hand: Hand) -> Option<EquippedItem> {
        self.equipped.get(&(actor, hand)).copied()
    }

    fn item_has_keyword(&self, item: FormId, keyword: FormId) -> Option<bool> {
        Some(self.item_keywords.contains(&(item, keyword)))
    }

    fn actor_value(&self, actor: ActorHandle, value: u32, layer: ValueLayer) -> Option<f32> {
        self.values.get(&(actor, value, layer)).copied()
    }

    fn level(&self, actor: ActorHandle) -> Option<u16> {
        self.levels.get(&actor).copied()
    }

    fn faction_rank(&self, actor: ActorHandle, faction: FormId) -> Option<i32> {
        self.ranks.get(&(actor, faction)).copied()
    }

    fn global_value(&self, global: FormId) -> Option<f32> {
        self.globals.get(&global).copied()
    }

    fn current_weather(&self) -> Option<FormId> {
        self.weather
    }

    fn game_days_passed(&self) -> Option<f32> {
        self.days_passed
    }

    fn location_within(&self, current: FormId, location: FormId) -> Option<bool> {
        let mut at = current;
        // bounded so a cyclic parent map terminates
        for _ in 0..=self.parents.len() {
            if at == location {
                return Some(true);
            }
            match self.parents.get(&at) {
                Some(parent) => at = *parent,
                None => return Some(false),
            }
        }
        Some(false)
    }

    fn movement_angle(&self, actor: ActorHandle) -> Option<f32> {
        self.movement.get(&actor).copied()
    }
}
