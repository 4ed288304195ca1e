//! Integration Tests for Mirrors
//!
//! These tests drive a source tree through the public API and check the
//! mirror's structure, metadata, annotations and hook order.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use ditto_core::{
    flush, is_mirror_node, next_tick, path, wrap, Array, Flush, Key, Mirror, MirrorConfig,
    MirrorNode, MirrorOptions, Object, Path, Signal, Value,
};

fn source(json: serde_json::Value) -> Signal<Value> {
    Signal::new(Value::from(json))
}

fn object(value: &Value) -> Object {
    value.as_object().cloned().expect("object")
}

fn node_at(mirror: &Mirror, path: &Path) -> MirrorNode {
    ditto_core::get_by_path(&mirror.get(), path)
        .unwrap_or_else(|| panic!("no mirror node at {path}"))
}

/// Annotate every node with `$meta = { path, order }` after its children are
/// built, and bump `order` after every update.
fn meta_mirror(source: &Signal<Value>, flush: Flush) -> Mirror {
    let order = Arc::new(AtomicI64::new(1));
    let created = order.clone();
    wrap(
        source,
        MirrorOptions::new()
            .meta_keys(["$meta"])
            .flush(flush)
            .on_children_created(move |args| {
                let order = created.fetch_add(1, Ordering::SeqCst);
                args.node.annotate("$meta", json!({ "path": args.path, "order": order }));
            })
            .on_children_updated(move |args| {
                let order = order.fetch_add(1, Ordering::SeqCst);
                args.node.update_annotation("$meta", |meta| meta["order"] = json!(order));
            }),
    )
}

fn order(node: &MirrorNode) -> i64 {
    node.annotation("$meta").and_then(|meta| meta["order"].as_i64()).expect("$meta.order")
}

/// Every mirror node path, sorted.
fn node_paths(node: &MirrorNode) -> Vec<Path> {
    fn walk(node: &MirrorNode, out: &mut Vec<Path>) {
        out.push(node.path());
        for key in node.keys_untracked() {
            if let Some(child) = node.child_untracked(&key) {
                walk(&child, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(node, &mut out);
    out.sort();
    out
}

/// The registry holds exactly three subscriptions per live node.
fn assert_no_leaks(mirror: &Mirror) {
    let paths = node_paths(&mirror.get());
    assert_eq!(mirror.registered_paths(), paths);
    assert_eq!(mirror.subscription_count(), paths.len() * 3);
}

// ---- Hooks ----

fn recording(
    log: &Arc<Mutex<Vec<String>>>,
    tag: &'static str,
) -> impl Fn(ditto_core::HookArgs<'_>) + Send + Sync {
    let log = log.clone();
    move |args| log.lock().push(format!("{tag} {}", args.path))
}

/// Test that `on_created` runs parents first and `on_children_created` runs
/// children first.
#[test]
fn creation_hooks_run_pre_and_post_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let src = source(json!({ "foo": { "bar": 42 } }));
    let _mirror = wrap(
        &src,
        MirrorOptions::new()
            .flush(Flush::Sync)
            .on_created(recording(&log, "created"))
            .on_children_created(recording(&log, "children")),
    );

    assert_eq!(
        *log.lock(),
        vec![
            "created []",
            r#"created ["foo"]"#,
            r#"created ["foo","bar"]"#,
            r#"children ["foo","bar"]"#,
            r#"children ["foo"]"#,
            "children []",
        ]
    );
}

/// Test that update hooks do not run when nothing changed.
#[test]
fn update_hooks_do_not_run_on_creation_or_equal_writes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let src = source(json!({ "foo": { "bar": 42 } }));
    let _mirror = wrap(
        &src,
        MirrorOptions::new()
            .flush(Flush::Sync)
            .on_updated(recording(&log, "updated"))
            .on_children_updated(recording(&log, "children")),
    );
    assert!(log.lock().is_empty());

    let foo = object(&object(&src.get_untracked()).get_untracked("foo").unwrap());
    foo.insert("bar", 42);
    assert!(log.lock().is_empty());
}

/// Test that `on_updated` runs for the replaced node only.
#[test]
fn on_updated_runs_for_the_replaced_node() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let src = source(json!({ "foo": { "bar": 42 } }));
    let _mirror = wrap(
        &src,
        MirrorOptions::new().flush(Flush::Sync).on_updated(recording(&log, "updated")),
    );

    // Root
    src.set(Value::from(json!({ "foo": { "bar": 42 } })));
    assert_eq!(*log.lock(), vec!["updated []"]);

    // Nesting
    log.lock().clear();
    object(&src.get_untracked()).insert("foo", Value::from(json!({ "bar": 42 })));
    assert_eq!(*log.lock(), vec![r#"updated ["foo"]"#]);

    // Leaf
    log.lock().clear();
    let foo = object(&object(&src.get_untracked()).get_untracked("foo").unwrap());
    foo.insert("bar", 43);
    assert_eq!(*log.lock(), vec![r#"updated ["foo","bar"]"#]);
}

/// Test that update hooks wrap the rebuild of the children.
#[test]
fn update_hooks_bracket_child_recreation() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let src = source(json!({ "a": { "b": 1 } }));
    let _mirror = wrap(
        &src,
        MirrorOptions::new()
            .flush(Flush::Sync)
            .on_created(recording(&log, "created"))
            .on_updated(recording(&log, "updated"))
            .on_children_updated(recording(&log, "children-updated")),
    );
    log.lock().clear();

    object(&src.get_untracked()).insert("a", Value::from(json!({ "b": 2 })));
    assert_eq!(
        *log.lock(),
        vec![
            r#"updated ["a"]"#,
            r#"created ["a","b"]"#,
            r#"children-updated ["a"]"#,
        ]
    );
}

// ---- Meta keys ----

/// Test that annotations named in `meta_keys` survive every kind of write,
/// and that only the update hook changes them.
#[test]
fn it_should_retain_meta_keys() {
    let src = source(json!({ "foo": 42, "bar": [{ "id": 1, "baz": 42 }] }));
    let mirror = wrap(
        &src,
        MirrorOptions::new()
            .meta_keys(["$count"])
            .flush(Flush::Sync)
            .on_created(|args| args.node.annotate("$count", 0))
            .on_updated(|args| {
                args.node.update_annotation("$count", |count| {
                    *count = json!(count.as_i64().unwrap_or(0) + 1)
                })
            }),
    );

    let counts = || -> [i64; 5] {
        let paths = [path![], path!["foo"], path!["bar"], path!["bar", 0], path!["bar", 0, "baz"]];
        paths.map(|p| {
            node_at(&mirror, &p)
                .annotation("$count")
                .and_then(|count| count.as_i64())
                .expect("$count")
        })
    };
    let root = || object(&src.get_untracked());
    let bar = || root().get_untracked("bar").unwrap().as_array().cloned().unwrap();
    let bar0 = || object(&bar().get_untracked(0).unwrap());

    assert_eq!(counts(), [0, 0, 0, 0, 0]);

    src.set(Value::from(json!({ "foo": 43, "bar": [{ "id": 1, "baz": 42 }] })));
    assert_eq!(counts(), [1, 0, 0, 0, 0]);

    src.set(Value::from(json!({ "foo": 44, "bar": [{ "id": 1, "baz": 42 }] })));
    assert_eq!(counts(), [2, 0, 0, 0, 0]);

    root().insert("foo", 45);
    assert_eq!(counts(), [2, 1, 0, 0, 0]);

    root().insert("foo", 46);
    assert_eq!(counts(), [2, 2, 0, 0, 0]);

    root().insert("bar", Value::from(json!([{ "id": 1, "baz": 43 }])));
    assert_eq!(counts(), [2, 2, 1, 0, 0]);

    root().insert("bar", Value::from(json!([{ "id": 1, "baz": 44 }])));
    assert_eq!(counts(), [2, 2, 2, 0, 0]);

    bar().set(0, Value::from(json!({ "id": 1, "baz": 45 })));
    assert_eq!(counts(), [2, 2, 2, 1, 0]);

    bar().set(0, Value::from(json!({ "id": 1, "baz": 46 })));
    assert_eq!(counts(), [2, 2, 2, 2, 0]);

    bar0().insert("baz", 47);
    assert_eq!(counts(), [2, 2, 2, 2, 1]);

    bar0().insert("baz", 48);
    assert_eq!(counts(), [2, 2, 2, 2, 2]);

    bar().set(0, Value::from(json!({ "id": 1, "baz": 49 })));
    assert_eq!(counts(), [2, 2, 2, 3, 0]);

    root().insert("bar", Value::from(json!([{ "id": 1, "baz": 50 }])));
    assert_eq!(counts(), [2, 2, 3, 0, 0]);

    src.set(Value::from(json!({ "foo": 45, "bar": [{ "id": 1, "baz": 51 }] })));
    assert_eq!(counts(), [3, 0, 0, 0, 0]);

    assert_no_leaks(&mirror);
}

/// Test that fields not declared as meta keys are cleaned up, while sealed
/// ones are skipped.
#[test]
fn undeclared_annotations_are_removed_unless_sealed() {
    let src = source(json!({ "a": 1 }));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let root = mirror.get();
    root.annotate("$loose", true);
    root.annotate("$kept", true);
    assert!(root.seal_annotation("$kept"));

    object(&src.get_untracked()).insert("b", 2);

    assert_eq!(root.annotation("$loose"), None);
    assert_eq!(root.annotation("$kept"), Some(json!(true)));
    assert_eq!(root.keys(), vec![Key::from("a"), Key::from("$kept"), Key::from("b")]);
}

/// Test the end-to-end `$meta` scenario: a leaf write only touches the leaf.
#[test]
fn meta_annotations_end_to_end() {
    let src = source(json!({ "a": "foo", "b": { "c": "bar" } }));
    let mirror = meta_mirror(&src, Flush::Deferred);

    let meta = |p: Path| node_at(&mirror, &p).annotation("$meta").unwrap();
    assert_eq!(meta(path![]), json!({ "path": [], "order": 4 }));
    assert_eq!(meta(path!["a"]), json!({ "path": ["a"], "order": 1 }));
    assert_eq!(meta(path!["b"]), json!({ "path": ["b"], "order": 3 }));
    assert_eq!(meta(path!["b", "c"]), json!({ "path": ["b", "c"], "order": 2 }));

    let b = object(&object(&src.get_untracked()).get_untracked("b").unwrap());
    b.insert("c", "baz");
    flush();

    assert_eq!(order(&node_at(&mirror, &path![])), 4);
    assert_eq!(order(&node_at(&mirror, &path!["a"])), 1);
    assert_eq!(order(&node_at(&mirror, &path!["b"])), 3);
    assert_eq!(order(&node_at(&mirror, &path!["b", "c"])), 5);

    let c = node_at(&mirror, &path!["b", "c"]);
    assert!(matches!(c.model(), Value::String(ref s) if &**s == "baz"));
}

// ---- Structure ----

/// Test that the mirror is isomorphic to the source.
#[test]
fn structure_mirrors_the_source() {
    let src = source(json!([
        { "id": 0, "value": "foo" },
        { "id": 1, "value": [{ "id": 0, "value": "bar" }] },
    ]));
    let plain = wrap(&src, MirrorOptions::new());
    assert!(plain.get().is_list());
    assert_eq!(
        plain.get().to_json(),
        json!([
            { "id": {}, "value": {} },
            { "id": {}, "value": [{ "id": {}, "value": {} }] },
        ])
    );

    let mirror = meta_mirror(&src, Flush::Deferred);

    let orders: Vec<i64> = [
        path![0, "id"],
        path![0, "value"],
        path![0],
        path![1, "id"],
        path![1, "value", 0, "id"],
        path![1, "value", 0, "value"],
        path![1, "value", 0],
        path![1, "value"],
        path![1],
        path![],
    ]
    .iter()
    .map(|p| order(&node_at(&mirror, p)))
    .collect();
    assert_eq!(orders, (1..=10).collect::<Vec<_>>());

    let inner = node_at(&mirror, &path![1, "value", 0]);
    assert_eq!(inner.id(), Some(0.0));
    assert_eq!(inner.path(), path![1, "value", 0]);
    assert!(is_mirror_node(&inner));
    assert_no_leaks(&mirror);
}

/// Test that a primitive source gets a keyed node with no fields.
#[test]
fn primitive_source_has_empty_node() {
    let src = source(json!("foo"));
    let mirror = meta_mirror(&src, Flush::Deferred);
    let root = mirror.get();

    assert!(!root.is_list());
    assert_eq!(root.keys(), vec![Key::from("$meta")]);
    assert!(matches!(root.model(), Value::String(ref s) if &**s == "foo"));

    src.set(Value::from("bar"));
    flush();
    assert_eq!(order(&mirror.get()), 2);
    assert!(matches!(mirror.get().model(), Value::String(ref s) if &**s == "bar"));
}

/// Test that holes in a sparse source stay holes in the mirror.
#[test]
fn sparse_arrays_keep_holes() {
    let array = Array::with_len(2);
    array.set(1, Value::from(json!({ "id": 1, "value": "foo" })));
    let src = Signal::new(Value::from(array.clone()));
    let mirror = meta_mirror(&src, Flush::Deferred);
    let root = mirror.get();

    assert_eq!(root.len(), 2);
    assert!(root.child(0).is_none());
    assert_eq!(root.child(1).unwrap().id(), Some(1.0));
    assert_eq!(order(&root.child(1).unwrap()), 3);
    assert_eq!(order(&root), 4);

    let model = root.model();
    assert!(model.as_array().unwrap().ptr_eq(&array));
    assert_eq!(model.to_json(), json!([null, { "id": 1, "value": "foo" }]));
}

// ---- Arrays ----

/// Test that reversing recreates every moved element with the ids swapped.
#[test]
fn reverse_recreates_moved_elements() {
    let src = source(json!([
        { "id": 1, "value": "a" },
        { "id": 2, "value": "b" },
        { "id": 3, "value": "c" },
        { "id": 4, "value": "d" },
    ]));
    let mirror = meta_mirror(&src, Flush::Deferred);
    let before: Vec<MirrorNode> = mirror.get().items().into_iter().flatten().collect();
    assert_eq!(order(&mirror.get()), 13);

    src.get_untracked().as_array().unwrap().reverse();
    flush();

    let after: Vec<MirrorNode> = mirror.get().items().into_iter().flatten().collect();
    let ids: Vec<Option<f64>> = after.iter().map(MirrorNode::id).collect();
    assert_eq!(ids, vec![Some(4.0), Some(3.0), Some(2.0), Some(1.0)]);
    assert!(before.iter().zip(&after).all(|(old, new)| !old.ptr_eq(new)));

    let orders: Vec<i64> = after.iter().map(order).collect();
    assert_eq!(orders, vec![16, 19, 22, 25]);
    assert_eq!(order(&mirror.get()), 13);
    assert_no_leaks(&mirror);
}

/// Test that an element that keeps its index and id is patched, not recreated.
#[test]
fn elements_in_place_are_kept() {
    let src = source(json!([{ "id": 1 }, { "id": 2 }]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let first = mirror.get().child(0).unwrap();

    let array = src.get_untracked().as_array().cloned().unwrap();
    array.push(Value::from(json!({ "id": 3 })));

    let root = mirror.get();
    assert!(root.child(0).unwrap().ptr_eq(&first));
    assert_eq!(root.child(2).unwrap().id(), Some(3.0));
    assert_eq!(root.child(2).unwrap().path(), path![2]);
    assert_no_leaks(&mirror);
}

/// Test pop, shift and unshift.
#[test]
fn pop_shift_unshift() {
    let src = source(json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let array = src.get_untracked().as_array().cloned().unwrap();
    let ids = || -> Vec<Option<f64>> {
        mirror
            .get()
            .items()
            .into_iter()
            .map(|item| item.and_then(|node| node.id()))
            .collect()
    };

    array.pop();
    assert_eq!(ids(), vec![Some(1.0), Some(2.0)]);
    assert_no_leaks(&mirror);

    array.shift();
    assert_eq!(ids(), vec![Some(2.0)]);
    assert_no_leaks(&mirror);

    array.unshift(Value::from(json!({ "id": 9 })));
    assert_eq!(ids(), vec![Some(9.0), Some(2.0)]);
    assert_eq!(mirror.get().child(1).unwrap().path(), path![1]);
    assert_no_leaks(&mirror);
}

/// Test that an element pushed without an id leaves a hole.
#[test]
fn elements_without_id_are_not_added() {
    let src = source(json!([1, 2]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    assert_eq!(mirror.get().keys(), vec![Key::Index(0), Key::Index(1)]);

    src.get_untracked().as_array().unwrap().push(3);
    let root = mirror.get();
    assert_eq!(root.len(), 3);
    assert!(root.child(2).is_none());
}

/// Test that replacing the array keeps an element without an id when the new
/// array has a hole at its index.
#[test]
fn replacement_keeps_slot_without_id_over_a_hole() {
    let src = source(json!([1, 2]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));

    src.set(Value::from(Array::from_slots(vec![None, Some(Value::from(2))])));

    let root = mirror.get();
    assert_eq!(root.model().to_json(), json!([null, 2]));
    assert_eq!(root.keys(), vec![Key::Index(0), Key::Index(1)]);
    assert_eq!(root.child(0).unwrap().model().to_json(), json!(1));
    assert_no_leaks(&mirror);
}

/// Test that shrinking the length drops the truncated subtrees and their
/// subscriptions.
#[test]
fn length_truncation_tears_down_subscriptions() {
    let src = source(json!([
        { "id": 1, "value": "foo" },
        { "id": 2, "value": [{ "id": 3, "value": "bar" }] },
    ]));
    let mirror = meta_mirror(&src, Flush::Deferred);
    assert_eq!(mirror.registered_paths().len(), 10);

    src.get_untracked().as_array().unwrap().set_len(1);
    flush();

    let root = mirror.get();
    assert_eq!(root.len(), 1);
    assert_eq!(order(&root), 10);
    assert_eq!(
        mirror.registered_paths(),
        vec![path![], path![0], path![0, "id"], path![0, "value"]]
    );
    assert_no_leaks(&mirror);
}

/// Test sorting by a field.
#[test]
fn sort_reorders_by_identity() {
    let src = source(json!([{ "id": 3 }, { "id": 1 }, { "id": 2 }]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let array = src.get_untracked().as_array().cloned().unwrap();

    array.sort_by(|a, b| a.id().unwrap_or(0.0).total_cmp(&b.id().unwrap_or(0.0)));

    let ids: Vec<Option<f64>> =
        mirror.get().items().into_iter().map(|n| n.and_then(|n| n.id())).collect();
    assert_eq!(ids, vec![Some(1.0), Some(2.0), Some(3.0)]);
    assert_no_leaks(&mirror);
}

/// Test that duplicate ids resolve to the last occurrence.
#[test]
fn duplicate_ids_last_one_wins() {
    let src = source(json!([{ "id": 1 }, { "id": 1 }, { "id": 2 }]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let array = src.get_untracked().as_array().cloned().unwrap();
    let ids = || -> Vec<Option<f64>> {
        mirror
            .get()
            .items()
            .into_iter()
            .map(|item| item.and_then(|node| node.id()))
            .collect()
    };
    assert_eq!(ids(), vec![Some(1.0), Some(1.0), Some(2.0)]);
    assert_no_leaks(&mirror);

    array.push(Value::from(json!({ "id": 3 })));
    assert_eq!(ids(), vec![Some(1.0), Some(1.0), Some(2.0), Some(3.0)]);
    assert_no_leaks(&mirror);

    // Id 1 is still known from slot 0 when the addition pass starts, so
    // neither of its new slots is filled.
    array.reverse();
    assert_eq!(ids(), vec![Some(3.0), Some(2.0), None, None]);
    assert_no_leaks(&mirror);

    array.pop();
    assert_eq!(ids(), vec![Some(3.0), Some(2.0), Some(1.0)]);
    assert_no_leaks(&mirror);
}

/// Test moving an element to a new index with a fresh copy.
#[test]
fn same_id_with_new_object() {
    let src = source(json!([{ "id": 1, "value": "foo" }]));
    let mirror = meta_mirror(&src, Flush::Deferred);
    let array = src.get_untracked().as_array().cloned().unwrap();

    array.set(1, Value::from(json!({ "id": 1, "value": "foo" })));
    array.delete(0);
    flush();

    let root = mirror.get();
    assert!(root.child(0).is_none());
    assert_eq!(root.len(), 2);
    assert_eq!(order(&node_at(&mirror, &path![1, "id"])), 5);
    assert_eq!(order(&node_at(&mirror, &path![1, "value"])), 6);
    assert_eq!(order(&node_at(&mirror, &path![1])), 7);
    assert_eq!(order(&root), 4);
    assert_eq!(root.model().to_json(), json!([null, { "id": 1, "value": "foo" }]));
    assert_no_leaks(&mirror);
}

/// Test moving an element to a new index with the same object.
#[test]
fn same_id_with_same_object() {
    let src = source(json!([{ "id": 1, "value": "foo" }]));
    let mirror = meta_mirror(&src, Flush::Deferred);
    let array = src.get_untracked().as_array().cloned().unwrap();

    array.set(1, array.get_untracked(0).unwrap());
    array.delete(0);
    flush();

    let root = mirror.get();
    assert!(root.child(0).is_none());
    assert_eq!(order(&node_at(&mirror, &path![1])), 7);
    assert_eq!(node_at(&mirror, &path![1]).path(), path![1]);
    assert_no_leaks(&mirror);
}

/// Test that an element replaced by one with the same id is patched in place.
#[test]
fn same_id_at_same_index_is_patched() {
    let src = source(json!([{ "id": 1, "value": "foo" }]));
    let mirror = meta_mirror(&src, Flush::Sync);
    let element = mirror.get().child(0).unwrap();

    let array = src.get_untracked().as_array().cloned().unwrap();
    array.set(0, Value::from(json!({ "id": 1, "value": "bar" })));

    let patched = mirror.get().child(0).unwrap();
    assert!(patched.ptr_eq(&element));
    // The rebuilt `id` and `value` nodes take 5 and 6.
    assert_eq!(order(&patched), 7);
    assert_eq!(patched.model().to_json(), json!({ "id": 1, "value": "bar" }));
}

// ---- Shape changes ----

/// Test that the root is rebuilt when it flips between array and object.
#[test]
fn root_shape_change_rebuilds_the_mirror() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let src = source(json!({ "a": 1 }));
    let mirror = wrap(
        &src,
        MirrorOptions::new().flush(Flush::Sync).on_created(recording(&log, "created")),
    );
    let first = mirror.get();
    log.lock().clear();

    src.set(Value::from(json!([{ "id": 1 }])));
    let second = mirror.get();
    assert!(!second.ptr_eq(&first));
    assert!(second.is_list());
    assert_eq!(second.child(0).unwrap().id(), Some(1.0));
    assert_eq!(
        *log.lock(),
        vec!["created []", "created [0]", r#"created [0,"id"]"#]
    );
    assert_no_leaks(&mirror);

    src.set(Value::from("plain"));
    let third = mirror.get();
    assert!(!third.is_list());
    assert!(third.keys().is_empty());
    assert_no_leaks(&mirror);
}

/// Test that observers of the mirror signal see root replacement.
#[test]
fn root_replacement_is_observable() {
    let src = source(json!({}));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let swaps = Arc::new(AtomicI64::new(0));
    let swaps_clone = swaps.clone();
    let signal = mirror.signal();
    let _handle = ditto_core::watch(
        move || signal.get(),
        move |_, _| {
            swaps_clone.fetch_add(1, Ordering::SeqCst);
        },
        Flush::Sync,
    );

    src.set(Value::from(json!({ "b": 1 })));
    assert_eq!(swaps.load(Ordering::SeqCst), 0);

    src.set(Value::from(json!([])));
    assert_eq!(swaps.load(Ordering::SeqCst), 1);
}

/// Test a child changing between object, array and primitive.
#[test]
fn child_kind_changes() {
    let src = source(json!({ "a": { "x": 1 } }));
    let mirror = meta_mirror(&src, Flush::Sync);
    let root = object(&src.get_untracked());

    root.insert("a", Value::from(json!([{ "id": 7 }])));
    let a = node_at(&mirror, &path!["a"]);
    assert!(a.is_list());
    assert_eq!(a.child(0).unwrap().id(), Some(7.0));
    assert_no_leaks(&mirror);

    root.insert("a", 5);
    let a = node_at(&mirror, &path!["a"]);
    assert!(!a.is_list());
    assert_eq!(a.keys(), vec![Key::from("$meta")]);
    assert_no_leaks(&mirror);

    root.insert("a", Value::from(json!({ "y": true })));
    let a = node_at(&mirror, &path!["a"]);
    assert_eq!(a.to_json()["y"]["$meta"]["path"], json!(["a", "y"]));
    assert_no_leaks(&mirror);

    root.remove("a");
    assert!(mirror.get().child("a").is_none());
    assert_no_leaks(&mirror);
}

/// Test that an array slot holding a primitive is reshaped in place.
#[test]
fn slot_without_id_is_reshaped_in_place() {
    let src = source(json!([1]));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    let slot = mirror.get().child(0).unwrap();

    src.get_untracked().as_array().unwrap().set(0, Value::from(json!([true])));

    let reshaped = mirror.get().child(0).unwrap();
    assert!(reshaped.ptr_eq(&slot));
    assert!(reshaped.is_list());
    assert_eq!(reshaped.len(), 1);
    assert_no_leaks(&mirror);
}

// ---- Flush timing ----

/// Test that deferred mirrors wait for a flush.
#[test]
fn deferred_mirror_waits_for_flush() {
    let src = source(json!({ "a": 1 }));
    let mirror = wrap(&src, MirrorOptions::new());

    object(&src.get_untracked()).insert("b", 2);
    assert!(mirror.get().child("b").is_none());

    assert!(flush() > 0);
    assert!(mirror.get().child("b").is_some());
}

/// Test that `next_tick` applies queued work.
#[tokio::test]
async fn next_tick_applies_deferred_changes() {
    let src = source(json!({ "items": [{ "id": 1 }] }));
    let mirror = wrap(&src, MirrorOptions::new());

    let items = object(&src.get_untracked()).get_untracked("items").unwrap();
    items.as_array().unwrap().push(Value::from(json!({ "id": 2 })));
    next_tick().await;

    assert_eq!(node_at(&mirror, &path!["items", 1]).id(), Some(2.0));
    assert_no_leaks(&mirror);
}

/// Test that a mirror can be configured from JSON.
#[test]
fn mirror_from_json_config() {
    let config = MirrorConfig::from_json(r#"{ "metaKeys": ["$note"], "flush": "sync" }"#).unwrap();
    let src = source(json!({ "a": 1 }));
    let mirror = wrap(&src, MirrorOptions::from_config(config));
    mirror.get().annotate("$note", "keep me");

    object(&src.get_untracked()).remove("a");

    let root = mirror.get();
    assert!(root.child("a").is_none());
    assert_eq!(root.annotation("$note"), Some(json!("keep me")));
}

/// Test that dropping the mirror releases every subscription.
#[test]
fn dropping_the_mirror_unsubscribes() {
    let src = source(json!({ "a": { "b": 1 } }));
    let mirror = wrap(&src, MirrorOptions::new().flush(Flush::Sync));
    // Kind watcher plus the root's three subscriptions.
    assert_eq!(src.subscriber_count(), 4);

    drop(mirror);
    assert_eq!(src.subscriber_count(), 0);
}
