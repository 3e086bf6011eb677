//! Engine: owns projects, the predicate library and the finish cache.
//!
//! Lifecycle, in host order:
//! - `register_project` / `on_project_registered` (needs `&mut self`)
//! - `prepare_table` when the host generates a project's clip table
//! - `resolve` / `redirect_activation` on every clip load and activation
//! - `on_table_finishing` / `finish_table` from the host's finishing pass
//! - `on_table_released` when the host tears the table down

use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use hashbrown::HashMap;

use crate::config::Config;
use crate::finish::FinishCache;
use crate::ids::{ActorHandle, ClipSlot, ProjectId, TableId};
use crate::predicate::PredicateLibrary;
use crate::rules::{LoadReport, RuleRegistry, RuleSource};
use crate::table::{augment, Augmentation, ClipBuffer, ClipTable};
use crate::world::{ActorFlag, WorldQuery};

/// One behavior project and its rules.
#[derive(Debug)]
pub struct Project {
    id: ProjectId,
    key: String,
    folder: String,
    rules: RuleRegistry,
    augmentation: OnceLock<Augmentation>,
}

impl Project {
    fn new(id: ProjectId, key: String) -> Self {
        let folder = match key.rfind(|c: char| c == '\\' || c == '/') {
            Some(pos) => key[..pos].to_string(),
            None => String::new(),
        };
        Self {
            id,
            key,
            folder,
            rules: RuleRegistry::new(),
            augmentation: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    /// Lower-cased project path.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Directory part of the project path.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// `None` until the first table of this project has been prepared.
    pub fn augmentation(&self) -> Option<&Augmentation> {
        self.augmentation.get()
    }

    pub fn is_augmented(&self) -> bool {
        matches!(self.augmentation.get(), Some(Augmentation::Ready(_)))
    }
}

/// Swapped clip binding, restored when dropped.
#[must_use = "the original binding is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ActivationGuard<'a> {
    binding: &'a mut u32,
    original: u32,
}

impl ActivationGuard<'_> {
    pub fn original(&self) -> ClipSlot {
        ClipSlot(self.original)
    }

    pub fn replacement(&self) -> ClipSlot {
        ClipSlot(*self.binding)
    }
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        *self.binding = self.original;
    }
}

#[derive(Debug)]
pub struct Engine {
    cfg: Config,
    predicates: PredicateLibrary,
    projects: Vec<Project>,
    by_key: HashMap<String, ProjectId>,
    /// Live host tables holding a project's augmented buffer.
    bound: Mutex<HashMap<TableId, ProjectId>>,
    finishing: FinishCache,
    conflict_logged: AtomicBool,
}

impl Engine {
    /// Engine with the built-in predicate library.
    pub fn new(cfg: Config) -> Self {
        Self::with_predicates(cfg, PredicateLibrary::new())
    }

    pub fn with_predicates(cfg: Config, predicates: PredicateLibrary) -> Self {
        Self {
            cfg,
            predicates,
            projects: Vec::new(),
            by_key: HashMap::new(),
            bound: Mutex::new(HashMap::new()),
            finishing: FinishCache::new(),
            conflict_logged: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn predicates(&self) -> &PredicateLibrary {
        &self.predicates
    }

    /// Register host-specific predicates before any rules are loaded.
    pub fn predicates_mut(&mut self) -> &mut PredicateLibrary {
        &mut self.predicates
    }

    /// Register a project by its behavior file path. Registering the same
    /// path twice (in any letter case) returns the existing project.
    pub fn register_project(&mut self, path: &str) -> ProjectId {
        let key = path.to_ascii_lowercase();
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        let id = ProjectId(self.projects.len() as u32);
        self.projects.push(Project::new(id, key.clone()));
        self.by_key.insert(key, id);
        id
    }

    /// Register a project (if needed) and load its rules.
    pub fn on_project_registered(&mut self, path: &str, source: &RuleSource) -> LoadReport {
        let id = self.register_project(path);
        let Engine {
            projects, predicates, ..
        } = self;
        let project = &mut projects[id.0 as usize];
        if project.augmentation.get().is_some() {
            log::warn!("{}: rules added after the table was built are ignored", project.key);
        }
        let report = project.rules.load(source, predicates);
        log::info!(
            "{}: {} rule(s) loaded, {} rejected",
            project.key,
            report.accepted,
            report.rejected.len()
        );
        report
    }

    pub fn project_id(&self, path: &str) -> Option<ProjectId> {
        self.by_key.get(&path.to_ascii_lowercase()).copied()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(id.0 as usize)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    fn bindings(&self) -> MutexGuard<'_, HashMap<TableId, ProjectId>> {
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Project whose augmented buffer a host table holds.
    pub fn project_for_table(&self, table: TableId) -> Option<ProjectId> {
        self.bindings().get(&table).copied()
    }

    /// Every live table bound to `project`.
    pub fn tables_of(&self, project: ProjectId) -> Vec<TableId> {
        let mut tables: Vec<TableId> = self
            .bindings()
            .iter()
            .filter(|(_, bound)| **bound == project)
            .map(|(table, _)| *table)
            .collect();
        tables.sort_by_key(|t| t.0);
        tables
    }

    fn bind(&self, project: &Project, table: TableId) {
        if let Some(previous) = self.bindings().insert(table, project.id) {
            if previous != project.id {
                log::warn!("{}: table {:#x} rebound from another project", project.key, table.0);
            }
        }
    }

    fn report_build(&self, project: &Project, original: usize, aug: &Augmentation) {
        let limit = self.cfg.animation_limit;
        match aug {
            Augmentation::Ready(table) if table.overflowed() => log::warn!(
                "{} / {} : {} exceeds the animation limit, replacements disabled",
                original + table.injected(),
                limit,
                project.key
            ),
            Augmentation::Ready(table) => log::info!(
                "{} / {} : {}",
                original + table.injected(),
                limit,
                project.key
            ),
            Augmentation::Aborted { original, capacity } => log::error!(
                "{original} / {capacity} : {} original clips fill the animation limit",
                project.key
            ),
            Augmentation::Skipped => log::trace!("{}: no clip has replacements", project.key),
        }
    }

    /// Augment `table` for `project`. The augmentation is built from the first
    /// non-empty table prepared for the project and reused for later tables
    /// with the same original clip names. The pending buffer is recorded in
    /// the finish cache before it is installed.
    ///
    /// Racing first calls each build without waiting on one another; the
    /// first to publish wins and the others adopt its result.
    ///
    /// Returns whether the table now holds the augmented buffer.
    pub fn prepare_table(&self, project: ProjectId, table: &mut dyn ClipTable) -> bool {
        let Some(proj) = self.projects.get(project.0 as usize) else {
            return false;
        };
        let table_id = table.id();
        if table.clip_names().is_empty() {
            log::trace!("{}: table {:#x} has no clips yet", proj.key, table_id.0);
            return false;
        }

        let aug = match proj.augmentation.get() {
            Some(aug) => aug,
            None => {
                let names = table.clip_names();
                let candidate = augment(
                    names,
                    &proj.rules,
                    self.cfg.animation_limit,
                    &self.conflict_logged,
                );
                if proj.augmentation.set(candidate).is_ok() {
                    if let Some(aug) = proj.augmentation.get() {
                        self.report_build(proj, names.len(), aug);
                    }
                }
                match proj.augmentation.get() {
                    Some(aug) => aug,
                    None => return false,
                }
            }
        };
        let Some(built) = aug.table() else {
            return false;
        };

        if built.installed_in(table.clip_names()) {
            self.bind(proj, table_id);
            return true;
        }
        if !built.built_from(table.clip_names()) {
            log::warn!(
                "{}: table {:#x} does not match the clips the augmentation was built from",
                proj.key,
                table_id.0
            );
            return false;
        }

        let buffer = built.buffer().clone();
        self.finishing.record(table_id, buffer.clone());
        table.install(buffer);
        self.bind(proj, table_id);
        true
    }

    /// Replacement for a runtime slot of `project`, if a rule matches.
    #[inline]
    pub fn resolve(
        &self,
        project: ProjectId,
        slot: ClipSlot,
        world: &dyn WorldQuery,
        actor: ActorHandle,
    ) -> Option<ClipSlot> {
        let built = self.projects.get(project.0 as usize)?.augmentation.get()?.table()?;
        built.rules().resolve(slot, &self.predicates, world, actor)
    }

    /// Called from the host's finishing pass: the buffer to install instead of
    /// the host's own data, if one is pending for `table`.
    pub fn on_table_finishing(&self, table: TableId) -> Option<ClipBuffer> {
        self.finishing.take(table)
    }

    /// Install the pending buffer for `table`, if any.
    pub fn finish_table(&self, table: &mut dyn ClipTable) -> bool {
        match self.on_table_finishing(table.id()) {
            Some(buffer) => {
                table.install(buffer);
                true
            }
            None => false,
        }
    }

    /// The host destroyed `table`: forget it without touching it.
    pub fn on_table_released(&self, table: TableId) {
        if let Some(project) = self.bindings().remove(&table) {
            if let Some(project) = self.project(project) {
                log::trace!("{}: released table {:#x}", project.key, table.0);
            }
        }
        self.finishing.discard(table);
    }

    pub fn pending_finishes(&self) -> usize {
        self.finishing.len()
    }

    /// Point a clip's binding index at its replacement while it activates.
    ///
    /// Applies only to characters and only for a table bound to an augmented
    /// project. The returned guard puts the original index back when dropped.
    pub fn redirect_activation<'a>(
        &self,
        table: TableId,
        binding: &'a mut u32,
        world: &dyn WorldQuery,
        actor: ActorHandle,
    ) -> Option<ActivationGuard<'a>> {
        if world.actor_flag(actor, ActorFlag::Character) != Some(true) {
            return None;
        }
        let project = self.project_for_table(table)?;
        let built = self.projects.get(project.0 as usize)?.augmentation.get()?.table()?;
        let slot = ClipSlot(*binding);
        if slot.index() >= built.capacity() {
            return None;
        }
        let replacement = built.rules().resolve(slot, &self.predicates, world, actor)?;
        let original = std::mem::replace(binding, replacement.0);
        Some(ActivationGuard { binding, original })
    }
}
