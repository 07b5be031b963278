//! Configuration-cache round trips of bean graphs.

use std::ptr;
use std::rc::Rc;
use std::thread;

use build_logic::beans::framework::{ConventionTask, DefaultTask, CONVENTION_TASK, DEFAULT_TASK};
use build_logic::beans::{
    bean_ref, blank, Bean, BeanRef, BeanType, BeanValue, EnumConstant, EnumType, FieldType, IgnoredFields,
    Instantiation, InstantiationScheme, Opaque, TypeRegistry,
};
use build_logic::serialization::{CacheError, ConfigurationCache};
use build_logic::{bean_field, impl_bean};
use cc_serialize::{CodecError, CollectedProblems, ParallelStreamConfig, ProblemKind};
use tempfile::TempDir;

// =============================================================================
// Test types
// =============================================================================

#[derive(Debug, Default)]
struct Peano {
    prev: Option<BeanRef>,
}

static PEANO: BeanType = BeanType {
    name: "Peano",
    superclass: None,
    fields: &[bean_field!(Peano, prev: Option<BeanRef>, FieldType::Bean(&PEANO))],
    instantiation: Instantiation::Blank(blank::<Peano>),
    convention: None,
};

impl_bean!(Peano, PEANO);

static LOG_LEVEL: EnumType = EnumType {
    name: "LogLevel",
    constants: &[
        EnumConstant { enum_name: "LogLevel", name: "QUIET", ordinal: 0 },
        EnumConstant { enum_name: "LogLevel", name: "INFO", ordinal: 1 },
        EnumConstant { enum_name: "LogLevel", name: "DEBUG", ordinal: 2 },
    ],
};

#[derive(Debug, Default)]
struct Node {
    task: DefaultTask,
    label: String,
    next: Option<BeanRef>,
    peers: Vec<BeanRef>,
    level: Option<&'static EnumConstant>,
}

static NODE: BeanType = BeanType {
    name: "Node",
    superclass: Some(&DEFAULT_TASK),
    fields: &[
        bean_field!(Node, label: String, FieldType::String),
        bean_field!(Node, next: Option<BeanRef>, FieldType::Bean(&NODE)),
        bean_field!(Node, peers: Vec<BeanRef>, FieldType::List),
        bean_field!(Node, level: Option<&'static EnumConstant>, FieldType::Enum(&LOG_LEVEL)),
    ],
    instantiation: Instantiation::Blank(blank::<Node>),
    convention: None,
};

impl_bean!(Node, NODE, task);

#[derive(Debug)]
struct Deploy {
    task: ConventionTask,
    target: Option<String>,
    __target__: bool,
    worker: Opaque,
    payload: BeanValue,
    retries: i32,
}

impl Default for Deploy {
    fn default() -> Self {
        Self {
            task: ConventionTask::default(),
            target: None,
            __target__: false,
            worker: Opaque("Thread"),
            payload: BeanValue::Null,
            retries: 0,
        }
    }
}

static DEPLOY: BeanType = BeanType {
    name: "Deploy",
    superclass: Some(&CONVENTION_TASK),
    fields: &[
        bean_field!(Deploy, target: Option<String>, FieldType::String),
        bean_field!(Deploy, __target__: bool, FieldType::Boolean),
        bean_field!(Deploy, worker: Opaque, FieldType::Named("Thread")),
        bean_field!(Deploy, payload: BeanValue, FieldType::Any),
        bean_field!(Deploy, retries: i32, FieldType::Int),
    ],
    instantiation: Instantiation::Blank(blank::<Deploy>),
    convention: None,
};

impl_bean!(Deploy, DEPLOY, task);

/// Two versions of the same type, as written by an older build and read by a
/// newer one.
#[derive(Debug, Default)]
struct SettingV1 {
    value: Option<String>,
}

static SETTING_V1: BeanType = BeanType {
    name: "Setting",
    superclass: None,
    fields: &[bean_field!(SettingV1, value: Option<String>, FieldType::String)],
    instantiation: Instantiation::Blank(blank::<SettingV1>),
    convention: None,
};

impl_bean!(SettingV1, SETTING_V1);

#[derive(Debug, Default)]
struct SettingV2 {
    value: Option<i64>,
}

static SETTING_V2: BeanType = BeanType {
    name: "Setting",
    superclass: None,
    fields: &[bean_field!(SettingV2, value: Option<i64>, FieldType::BoxedLong)],
    instantiation: Instantiation::Blank(blank::<SettingV2>),
    convention: None,
};

impl_bean!(SettingV2, SETTING_V2);

#[derive(Debug, Default)]
struct Decorated {
    weight: i64,
}

static DECORATED: BeanType = BeanType {
    name: "Decorated",
    superclass: None,
    fields: &[bean_field!(Decorated, weight: i64, FieldType::Long)],
    instantiation: Instantiation::Generated,
    convention: None,
};

impl_bean!(Decorated, DECORATED);

struct DecoratingScheme;

impl InstantiationScheme for DecoratingScheme {
    fn deserialization_instance(&self, ty: &'static BeanType) -> Option<Box<dyn Bean>> {
        ptr::eq(ty, &DECORATED).then(|| Box::new(Decorated::default()) as Box<dyn Bean>)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_framework_types();
    registry
        .register_bean(&PEANO)
        .register_bean(&NODE)
        .register_bean(&DEPLOY)
        .register_bean(&DECORATED)
        .register_enum(&LOG_LEVEL);
    registry
}

fn round_trip(cache: &ConfigurationCache, root: &BeanValue, problems: &mut CollectedProblems) -> BeanValue {
    let bytes = cache.encode_graph(root, problems).unwrap();
    cache.decode_graph(&bytes, problems).unwrap()
}

fn with<T: 'static, R>(bean: &BeanRef, ty: &'static BeanType, f: impl FnOnce(&T) -> R) -> R {
    let bean = bean.borrow();
    let part = bean.declared_part(ty).expect("declared part");
    f(part.downcast_ref::<T>().expect("part type"))
}

fn peano(n: usize) -> BeanRef {
    let mut current = bean_ref(Peano::default());
    for _ in 0..n {
        current = bean_ref(Peano { prev: Some(current) });
    }
    current
}

fn peano_depth(bean: &BeanRef) -> usize {
    let mut depth = 0;
    let mut current = Rc::clone(bean);
    loop {
        let prev = with(&current, &PEANO, |p: &Peano| p.prev.clone());
        match prev {
            Some(prev) => {
                depth += 1;
                current = prev;
            }
            None => return depth,
        }
    }
}

/// Unlinks a chain front to back so dropping it does not recurse.
fn dismantle(bean: &BeanRef) {
    let mut next = take_prev(bean);
    while let Some(current) = next {
        next = take_prev(&current);
    }
}

fn take_prev(bean: &BeanRef) -> Option<BeanRef> {
    let mut bean = bean.borrow_mut();
    let part = bean.declared_part_mut(&PEANO).unwrap();
    part.downcast_mut::<Peano>().unwrap().prev.take()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

fn node(label: &str) -> BeanRef {
    bean_ref(Node {
        label: label.to_string(),
        ..Node::default()
    })
}

fn set_next(from: &BeanRef, to: &BeanRef) {
    let mut from = from.borrow_mut();
    let part = from.declared_part_mut(&NODE).unwrap();
    part.downcast_mut::<Node>().unwrap().next = Some(Rc::clone(to));
}

// =============================================================================
// Deep graphs
// =============================================================================

#[test]
fn test_peano_numbers_round_trip() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    for n in [0usize, 1, 2, 17, 256, 1023] {
        let root = BeanValue::Bean(peano(n));
        let loaded = round_trip(&cache, &root, &mut problems);
        assert_eq!(peano_depth(loaded.as_bean().unwrap()), n);
        dismantle(root.as_bean().unwrap());
        dismantle(loaded.as_bean().unwrap());
    }
    assert!(problems.is_empty());
}

#[test]
fn test_deep_chain_on_default_stack() {
    // A plain spawned thread: no enlarged stack.
    let handle = thread::spawn(|| {
        let cache = ConfigurationCache::new(registry());
        let mut problems = CollectedProblems::new();
        let root = BeanValue::Bean(peano(20_000));

        let bytes = cache.encode_graph(&root, &mut problems).unwrap();
        let loaded = cache.decode_graph(&bytes, &mut problems).unwrap();
        assert_eq!(peano_depth(loaded.as_bean().unwrap()), 20_000);
        assert!(problems.is_empty());

        dismantle(root.as_bean().unwrap());
        dismantle(loaded.as_bean().unwrap());
    });
    handle.join().unwrap();
}

#[test]
fn test_deep_graph_through_file_with_small_chunks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("entry.bin");
    let cache = ConfigurationCache::new(registry()).with_stream_config(ParallelStreamConfig {
        chunk_size: 16,
        max_chunks: 4,
        writer_timeout_seconds: 60,
    });
    let mut problems = CollectedProblems::new();
    let root = BeanValue::Bean(peano(5_000));

    cache.store_graph(&path, &root, &mut problems).unwrap();
    let loaded = cache.load_graph(&path, &mut problems).unwrap();
    assert_eq!(peano_depth(loaded.as_bean().unwrap()), 5_000);

    dismantle(root.as_bean().unwrap());
    dismantle(loaded.as_bean().unwrap());
}

#[test]
fn test_nested_bean_body_follows_enclosing_body() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let outer = bean_ref(Node {
        label: "outer".into(),
        peers: vec![bean_ref(Peano::default())],
        ..Node::default()
    });
    set_next(&outer, &node("inner"));

    let bytes = cache.encode_graph(&BeanValue::Bean(outer), &mut problems).unwrap();
    let inner_header = rfind(&bytes, b"\x04Node").unwrap();
    let peer_header = find(&bytes, b"\x05Peano").unwrap();
    let inner_label = find(&bytes, b"inner").unwrap();

    // `peers` is written after `next`, yet the whole outer body precedes the
    // inner one.
    assert!(find(&bytes, b"outer").unwrap() < inner_header);
    assert!(inner_header < peer_header);
    assert!(peer_header < inner_label);

    let loaded = cache.decode_graph(&bytes, &mut problems).unwrap();
    let outer = loaded.as_bean().unwrap();
    assert_eq!(with(outer, &NODE, |n: &Node| n.peers.len()), 1);
    let inner = with(outer, &NODE, |n: &Node| n.next.clone()).unwrap();
    assert_eq!(with(&inner, &NODE, |n: &Node| n.label.clone()), "inner");
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_enum_constants_keep_identity() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let bean = bean_ref(Node {
        level: Some(&LOG_LEVEL.constants[2]),
        ..Node::default()
    });

    let loaded = round_trip(&cache, &BeanValue::Bean(bean), &mut problems);
    let level = with(loaded.as_bean().unwrap(), &NODE, |n: &Node| n.level).unwrap();
    assert!(ptr::eq(level, &LOG_LEVEL.constants[2]));
    assert_eq!(level.name, "DEBUG");

    let root = BeanValue::List(vec![BeanValue::Enum(&LOG_LEVEL.constants[0])]);
    assert_eq!(round_trip(&cache, &root, &mut problems), root);
}

#[test]
fn test_shared_references_and_cycles() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let a = node("a");
    let b = node("b");
    set_next(&a, &b);
    set_next(&b, &a);
    {
        let mut borrowed = a.borrow_mut();
        let node = borrowed.declared_part_mut(&NODE).unwrap().downcast_mut::<Node>().unwrap();
        node.peers = vec![Rc::clone(&a), Rc::clone(&b)];
    }

    let root = BeanValue::List(vec![
        BeanValue::Bean(Rc::clone(&a)),
        BeanValue::Bean(Rc::clone(&b)),
        BeanValue::Bean(Rc::clone(&a)),
    ]);
    let loaded = round_trip(&cache, &root, &mut problems);
    let BeanValue::List(items) = loaded else {
        panic!("expected a list");
    };
    let (a2, b2) = (items[0].as_bean().unwrap(), items[1].as_bean().unwrap());

    assert!(Rc::ptr_eq(a2, items[2].as_bean().unwrap()));
    assert!(!Rc::ptr_eq(a2, b2));
    assert!(with(a2, &NODE, |n: &Node| Rc::ptr_eq(n.next.as_ref().unwrap(), b2)));
    assert!(with(b2, &NODE, |n: &Node| Rc::ptr_eq(n.next.as_ref().unwrap(), a2)));
    assert!(with(a2, &NODE, |n: &Node| Rc::ptr_eq(&n.peers[0], a2) && Rc::ptr_eq(&n.peers[1], b2)));
    assert_eq!(with(b2, &NODE, |n: &Node| n.label.clone()), "b");
    assert!(problems.is_empty());

    // Break the cycles so the graphs are freed.
    for bean in [&a, &b, a2, b2] {
        let mut borrowed = bean.borrow_mut();
        let node = borrowed.declared_part_mut(&NODE).unwrap().downcast_mut::<Node>().unwrap();
        node.next = None;
        node.peers.clear();
    }
}

// =============================================================================
// Soft problems
// =============================================================================

#[test]
fn test_unwritable_fields_are_reported_and_skipped() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let bean = bean_ref(Deploy {
        target: Some("explicit".into()),
        __target__: true,
        payload: BeanValue::List(vec![BeanValue::Int(1), BeanValue::Opaque("Socket")]),
        retries: 3,
        ..Deploy::default()
    });

    let loaded = round_trip(&cache, &BeanValue::Bean(bean), &mut problems);

    let kinds: Vec<_> = problems.problems().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![ProblemKind::CannotWrite, ProblemKind::UnsupportedFieldType]);
    let traces: Vec<_> = problems.problems().iter().map(|p| p.trace.to_string()).collect();
    assert!(traces[0].starts_with("field `payload` of `Deploy` bean"), "{}", traces[0]);
    assert!(traces[1].starts_with("field `worker` of `Deploy` bean"), "{}", traces[1]);

    with(loaded.as_bean().unwrap(), &DEPLOY, |d: &Deploy| {
        assert_eq!(d.target.as_deref(), Some("explicit"));
        assert_eq!(d.retries, 3);
        assert_eq!(d.payload, BeanValue::Null);
    });
}

#[test]
fn test_convention_value_replaces_unset_field() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let mut deploy = Deploy::default();
    deploy.task.convention("target", BeanValue::String("production".into()));
    deploy.task.convention("retries", BeanValue::Int(9));

    let loaded = round_trip(&cache, &BeanValue::Bean(bean_ref(deploy)), &mut problems);
    with(loaded.as_bean().unwrap(), &DEPLOY, |d: &Deploy| {
        assert_eq!(d.target.as_deref(), Some("production"));
        // No `__retries__` flag: the field itself is written.
        assert_eq!(d.retries, 0);
    });
}

#[test]
fn test_convention_value_of_wrong_type_is_ignored() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let mut deploy = Deploy {
        target: Some("own".into()),
        ..Deploy::default()
    };
    deploy.task.convention("target", BeanValue::Int(1));

    let loaded = round_trip(&cache, &BeanValue::Bean(bean_ref(deploy)), &mut problems);
    with(loaded.as_bean().unwrap(), &DEPLOY, |d: &Deploy| {
        assert_eq!(d.target.as_deref(), Some("own"));
    });
}

#[test]
fn test_incompatible_stored_value_is_reported() {
    let mut writer_registry = TypeRegistry::new();
    writer_registry.register_bean(&SETTING_V1);
    let writer = ConfigurationCache::new(writer_registry);
    let mut reader_registry = TypeRegistry::new();
    reader_registry.register_bean(&SETTING_V2);
    let reader = ConfigurationCache::new(reader_registry);

    let mut problems = CollectedProblems::new();
    let bean = bean_ref(SettingV1 {
        value: Some("seven".into()),
    });
    let bytes = writer.encode_graph(&BeanValue::Bean(bean), &mut problems).unwrap();
    let loaded = reader.decode_graph(&bytes, &mut problems).unwrap();

    assert_eq!(problems.problems().len(), 1);
    assert_eq!(problems.problems()[0].kind, ProblemKind::IncompatibleValue);
    assert_eq!(with(loaded.as_bean().unwrap(), &SETTING_V2, |s: &SettingV2| s.value), None);
}

#[test]
fn test_ignored_fields_are_not_written() {
    let cache = ConfigurationCache::new(registry())
        .with_ignored_fields(IgnoredFields::new(&["Node.label"]).unwrap());
    let mut problems = CollectedProblems::new();

    let loaded = round_trip(&cache, &BeanValue::Bean(node("kept out")), &mut problems);
    assert_eq!(with(loaded.as_bean().unwrap(), &NODE, |n: &Node| n.label.clone()), "");
}

// =============================================================================
// Hard failures
// =============================================================================

#[test]
fn test_nested_read_failure_carries_property_trace() {
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let root = node("outer");
    let inner = node("inner");
    set_next(&root, &inner);
    let bytes = cache.encode_graph(&BeanValue::Bean(root), &mut problems).unwrap();

    // A reader that knows the framework types but not `Node`.
    let reader = ConfigurationCache::new(TypeRegistry::with_framework_types());
    let err = reader.decode_graph(&bytes, &mut problems).unwrap_err();
    assert!(matches!(err, CacheError::Codec(CodecError::Format(_))), "{err}");

    // The root type is known, the type stored in its `next` field is not.
    let mut partial = TypeRegistry::new();
    partial.register_bean(&NODE);
    let outer = bean_ref(Node {
        next: Some(bean_ref(Peano::default())),
        ..Node::default()
    });
    let bytes = cache
        .encode_graph(&BeanValue::List(vec![BeanValue::Bean(outer)]), &mut problems)
        .unwrap();
    let reader = ConfigurationCache::new(partial);
    match reader.decode_graph(&bytes, &mut problems).unwrap_err() {
        CacheError::Codec(CodecError::PropertyLoad { trace, source }) => {
            assert!(trace.to_string().starts_with("field `next` of `Node` bean"), "{trace}");
            assert!(matches!(*source, CodecError::Format(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_generated_types_need_an_instantiation_scheme() {
    let mut problems = CollectedProblems::new();
    let root = BeanValue::Bean(bean_ref(Decorated { weight: 12 }));

    let plain = ConfigurationCache::new(registry());
    let bytes = plain.encode_graph(&root, &mut problems).unwrap();
    assert!(matches!(
        plain.decode_graph(&bytes, &mut problems),
        Err(CacheError::Codec(CodecError::Unsupported(_)))
    ));

    let with_scheme = ConfigurationCache::new(registry()).with_scheme(DecoratingScheme);
    let loaded = with_scheme.decode_graph(&bytes, &mut problems).unwrap();
    assert_eq!(with(loaded.as_bean().unwrap(), &DECORATED, |d: &Decorated| d.weight), 12);
}

#[test]
fn test_store_into_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("entry.bin");
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();

    let err = cache
        .store_graph(&path, &BeanValue::Bean(peano(3)), &mut problems)
        .unwrap_err();
    assert!(matches!(err, CacheError::Stream(_)), "{err}");
}

#[test]
fn test_load_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let cache = ConfigurationCache::new(registry());
    let mut problems = CollectedProblems::new();
    let err = cache.load_graph(&dir.path().join("nope.bin"), &mut problems).unwrap_err();
    assert!(matches!(err, CacheError::Io { .. }));
}
