use animswap_core::{
    ActorFlag, ActorHandle, Augmentation, ClipSlot, ConditionLink, Config, Engine, FormId, ProjectId, RuleSource,
    TableId, TemplateLink, TermSpec,
};
use animswap_test_fixtures::{projects, FakeWorld, VecTable};

const ACTOR: ActorHandle = ActorHandle(0x7);

fn always(from: &str, to: &str, priority: i32) -> ConditionLink {
    ConditionLink {
        from: from.into(),
        to: to.into(),
        priority,
        conditions: Vec::new(),
    }
}

fn engine_with(limit: u32, source: RuleSource) -> Engine {
    let mut engine = Engine::new(Config {
        animation_limit: limit,
    });
    engine.on_project_registered("Actors\\Test\\Project.hkx", &source);
    engine
}

fn project(engine: &Engine) -> ProjectId {
    engine.project_id("actors\\test\\project.hkx").unwrap()
}

#[test]
fn augmentation_is_idempotent() {
    let engine = engine_with(
        8,
        RuleSource {
            templates: Vec::new(),
            conditions: vec![always("a.hkx", "a_new.hkx", 1)],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::from_names(1, &["a.hkx", "b.hkx"]);
    assert!(engine.prepare_table(id, &mut table));
    let after_first = table.clone();

    assert!(engine.prepare_table(id, &mut table));
    assert_eq!(table, after_first);
    assert_eq!(table.installs(), 1);
    assert_eq!(engine.pending_finishes(), 1);
}

#[test]
fn original_table_at_capacity_is_never_touched() {
    let engine = engine_with(
        3,
        RuleSource {
            templates: vec![TemplateLink {
                from: "a.hkx".into(),
                to: "a_tmpl.hkx".into(),
                template: FormId(9),
            }],
            conditions: vec![always("b.hkx", "b_new.hkx", 1)],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::from_names(1, &["a.hkx", "b.hkx", "c.hkx"]);
    let before = table.clone();

    assert!(!engine.prepare_table(id, &mut table));
    assert_eq!(table, before);
    assert_eq!(engine.pending_finishes(), 0);
    assert!(matches!(
        engine.project(id).unwrap().augmentation(),
        Some(Augmentation::Aborted { original: 3, capacity: 3 })
    ));

    let world = FakeWorld::new().template(ACTOR, FormId(9));
    for slot in 0..8 {
        assert_eq!(engine.resolve(id, ClipSlot(slot), &world, ACTOR), None);
    }
    // a second attempt does not retry
    assert!(!engine.prepare_table(id, &mut table));
    assert_eq!(table, before);
}

#[test]
fn too_many_replacements_leave_low_region_empty() {
    let engine = engine_with(
        4,
        RuleSource {
            templates: Vec::new(),
            conditions: vec![
                always("a.hkx", "x.hkx", 1),
                always("b.hkx", "y.hkx", 1),
                always("c.hkx", "z.hkx", 1),
            ],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::from_names(1, &["a.hkx", "b.hkx", "c.hkx"]);
    assert!(engine.prepare_table(id, &mut table));
    assert_eq!(table.names(), ["", "a.hkx", "b.hkx", "c.hkx"]);

    let world = FakeWorld::new();
    for slot in 0..4 {
        assert_eq!(engine.resolve(id, ClipSlot(slot), &world, ACTOR), None);
    }
}

#[test]
fn finishing_pass_installs_the_pending_buffer_once() {
    let engine = engine_with(
        6,
        RuleSource {
            templates: Vec::new(),
            conditions: vec![always("a.hkx", "a_new.hkx", 2)],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::from_names(0x51, &["a.hkx", "b.hkx"]);
    assert!(engine.prepare_table(id, &mut table));
    let augmented = table.names().to_vec();

    // the host's own finish pass rewrites the table with its original data ...
    let mut finished = VecTable::from_names(0x51, &["a.hkx", "b.hkx"]);
    // ... and the engine's buffer wins
    assert!(engine.finish_table(&mut finished));
    assert_eq!(finished.names(), &augmented[..]);
    assert_eq!(engine.pending_finishes(), 0);

    // nothing left for a second pass
    assert!(!engine.finish_table(&mut finished));
    assert_eq!(engine.on_table_finishing(TableId(0x51)), None);
}

#[test]
fn unrelated_table_finishing_is_ignored() {
    let engine = engine_with(6, RuleSource::default());
    let mut table = VecTable::from_names(3, &["a.hkx"]);
    assert!(!engine.finish_table(&mut table));
    assert_eq!(table.installs(), 0);
}

#[test]
fn teardown_forgets_table_and_pending_buffer() {
    let engine = engine_with(
        6,
        RuleSource {
            templates: Vec::new(),
            conditions: vec![always("a.hkx", "a_new.hkx", 2)],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::from_names(0x99, &["a.hkx"]);
    engine.prepare_table(id, &mut table);
    assert_eq!(engine.project_for_table(TableId(0x99)), Some(id));

    engine.on_table_released(TableId(0x99));
    assert_eq!(engine.project_for_table(TableId(0x99)), None);
    assert_eq!(engine.pending_finishes(), 0);

    let mut binding = 5u32;
    let world = FakeWorld::character(ACTOR);
    assert!(engine
        .redirect_activation(TableId(0x99), &mut binding, &world, ACTOR)
        .is_none());

    // a new table object for the same project binds again
    let mut replacement = VecTable::from_names(0x9A, &["a.hkx"]);
    assert!(engine.prepare_table(id, &mut replacement));
    assert_eq!(engine.project_for_table(TableId(0x9A)), Some(id));
}

#[test]
fn activation_redirect_only_for_characters() {
    let mut engine = Engine::new(Config { animation_limit: 4 });
    engine.on_project_registered(
        "Actors\\Test\\Project.hkx",
        &RuleSource {
            templates: Vec::new(),
            conditions: vec![ConditionLink {
                from: "sneak.hkx".into(),
                to: "sneak_new.hkx".into(),
                priority: 3,
                conditions: vec![TermSpec::new("IsSneaking", vec![])],
            }],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::from_names(0x10, &["idle.hkx", "sneak.hkx"]);
    assert!(engine.prepare_table(id, &mut table));

    let sneaking = FakeWorld::character(ACTOR).flag(ACTOR, ActorFlag::Sneaking, true);
    let mut binding = 3u32;
    {
        let guard = engine
            .redirect_activation(TableId(0x10), &mut binding, &sneaking, ACTOR)
            .expect("redirected");
        assert_eq!(guard.replacement(), ClipSlot(0));
        assert_eq!(table.names()[guard.replacement().index()], "sneak_new.hkx");
    }
    assert_eq!(binding, 3);

    let prop = FakeWorld::new().flag(ACTOR, ActorFlag::Sneaking, true);
    assert!(engine
        .redirect_activation(TableId(0x10), &mut binding, &prop, ACTOR)
        .is_none());

    let standing = FakeWorld::character(ACTOR);
    assert!(engine
        .redirect_activation(TableId(0x10), &mut binding, &standing, ACTOR)
        .is_none());
    assert_eq!(binding, 3);
}

#[test]
fn earlier_tables_keep_redirecting_after_later_ones_bind() {
    let engine = engine_with(
        4,
        RuleSource {
            templates: Vec::new(),
            conditions: vec![always("a.hkx", "b.hkx", 1)],
        },
    );
    let id = project(&engine);
    let mut first = VecTable::from_names(0x1, &["a.hkx"]);
    let mut second = VecTable::from_names(0x2, &["a.hkx"]);
    assert!(engine.prepare_table(id, &mut first));
    assert!(engine.prepare_table(id, &mut second));
    assert_eq!(first.names()[0], "b.hkx");

    let world = FakeWorld::character(ACTOR);
    for table in [TableId(0x1), TableId(0x2)] {
        let mut binding = 3u32;
        let guard = engine
            .redirect_activation(table, &mut binding, &world, ACTOR)
            .expect("redirected");
        assert_eq!(guard.replacement(), ClipSlot(0));
    }

    engine.on_table_released(TableId(0x2));
    assert_eq!(engine.tables_of(id), [TableId(0x1)]);
    let mut binding = 3u32;
    assert!(engine
        .redirect_activation(TableId(0x1), &mut binding, &world, ACTOR)
        .is_some());
}

#[test]
fn empty_first_table_leaves_the_project_unbuilt() {
    let engine = engine_with(
        4,
        RuleSource {
            templates: Vec::new(),
            conditions: vec![always("a.hkx", "b.hkx", 1)],
        },
    );
    let id = project(&engine);
    let mut table = VecTable::new(TableId(0x3), Vec::new());
    assert!(!engine.prepare_table(id, &mut table));
    assert!(engine.project(id).unwrap().augmentation().is_none());

    let mut table = VecTable::from_names(0x3, &["a.hkx"]);
    assert!(engine.prepare_table(id, &mut table));
    assert_eq!(table.names(), ["b.hkx", "", "", "a.hkx"]);
}

#[test]
fn later_tables_reuse_the_first_build() {
    let mut engine = Engine::new(Config { animation_limit: 64 });
    let path = projects::path("default-male").unwrap();
    engine.on_project_registered(&path, &projects::rules("default-male").unwrap());
    let id = engine.project_id(&path).unwrap();

    let mut first = projects::table("default-male", 1).unwrap();
    let mut second = projects::table("default-male", 2).unwrap();
    assert!(engine.prepare_table(id, &mut first));
    assert!(engine.prepare_table(id, &mut second));
    assert_eq!(first.names(), second.names());
    assert_eq!(engine.pending_finishes(), 2);

    let mut foreign = projects::table("wolf", 3).unwrap();
    assert!(!engine.prepare_table(id, &mut foreign));
    assert_eq!(foreign.installs(), 0);
}

#[test]
fn limit_comes_from_configuration() {
    let mut cfg = Config::from_json_str(r#"{ "animation_limit": 5 }"#).unwrap();
    assert!(!cfg.apply_animation_limit(-1));
    let mut engine = Engine::new(cfg);
    engine.on_project_registered(
        "p.hkx",
        &RuleSource {
            templates: Vec::new(),
            conditions: vec![always("a.hkx", "b.hkx", 1)],
        },
    );
    let id = engine.project_id("P.HKX").unwrap();
    let mut table = VecTable::from_names(1, &["a.hkx"]);
    assert!(engine.prepare_table(id, &mut table));
    assert_eq!(table.names().len(), 5);
    assert_eq!(engine.config().animation_limit, 5);
}
