use memory::{Class, Closure, Function, Heap, Instance, Ownership, Value};
use std::collections::HashMap;

fn new_class(name: &str) -> Class {
    Class {
        name: name.to_string(),
        superclass: None,
        members: HashMap::new(),
        meta: None,
        owner: None,
    }
}

#[test]
fn unreachable_objects_are_swept() {
    let mut heap = Heap::new();
    let live = heap.alloc_string("kept".to_string());
    let dead = heap.alloc_string("dropped".to_string());

    heap.trace(vec![Value::string(live)]);
    heap.sweep();

    assert!(heap.get_string(live).is_some());
    assert!(heap.get_string(dead).is_none());
}

#[test]
fn closure_keeps_function_and_captures_alive() {
    let mut heap = Heap::new();
    let cap = heap.alloc_string("captured".to_string());
    let func = heap.alloc_function(
        Function::bytecode(Some("f".into()), 0, 1, vec![], vec![]),
        Ownership::Gc,
    );
    let closure = heap.alloc_closure(
        Closure {
            function: func,
            captured: vec![Value::string(cap)],
        },
        Ownership::Gc,
    );

    heap.trace(vec![Value::closure(closure)]);
    heap.sweep();

    assert!(heap.get_closure(closure).is_some());
    assert!(heap.get_function(func).is_some());
    assert!(heap.get_string(cap).is_some());
}

#[test]
fn class_roots_its_meta_and_members() {
    let mut heap = Heap::new();
    let member = heap.alloc_string("member payload".to_string());

    let meta = heap.alloc_class(new_class("Thing meta"), Ownership::Gc);
    let class = heap.alloc_class(new_class("Thing"), Ownership::Gc);
    heap.get_class_mut(class).unwrap().meta = Some(meta);
    heap.get_class_mut(meta).unwrap().owner = Some(class);
    heap.get_class_mut(meta)
        .unwrap()
        .members
        .insert("payload".into(), Value::string(member));

    heap.trace(vec![Value::class(class)]);
    heap.sweep();

    assert!(heap.get_class(class).is_some());
    assert!(heap.get_class(meta).is_some());
    assert!(heap.get_string(member).is_some());
}

#[test]
fn host_owned_objects_survive_collection_unrooted() {
    let mut heap = Heap::new();
    let class = heap.alloc_class(new_class("HostThing"), Ownership::Host);
    let func = heap.alloc_function(Function::native(None, 1, 0), Ownership::Host);
    let closure = heap.alloc_closure(Closure::bare(func), Ownership::Host);

    // No roots at all: a full collection must not touch pinned objects.
    heap.trace(vec![]);
    heap.sweep();

    assert!(heap.get_class(class).is_some());
    assert!(heap.get_function(func).is_some());
    assert!(heap.get_closure(closure).is_some());
}

#[test]
fn released_host_objects_are_reclaimed() {
    let mut heap = Heap::new();
    let class = heap.alloc_class(new_class("HostThing"), Ownership::Host);
    assert_eq!(heap.classes.live_count(), 1);

    heap.release_class(class);
    assert!(heap.get_class(class).is_none());
    assert_eq!(heap.classes.live_count(), 0);

    // Releasing twice is a no-op.
    heap.release_class(class);
    assert_eq!(heap.classes.live_count(), 0);
}

#[test]
fn instances_trace_their_class_and_fields() {
    let mut heap = Heap::new();
    let class = heap.alloc_class(new_class("Point"), Ownership::Gc);
    let field = heap.alloc_string("field".to_string());
    let mut inst = Instance::new(class);
    inst.fields.insert("x".into(), Value::string(field));
    let inst = heap.alloc_instance(inst);

    heap.trace(vec![Value::instance(inst)]);
    heap.sweep();

    assert!(heap.get_instance(inst).is_some());
    assert!(heap.get_class(class).is_some());
    assert!(heap.get_string(field).is_some());
}

#[test]
fn freed_slots_are_reused() {
    let mut heap = Heap::new();
    let a = heap.alloc_string("a".to_string());
    heap.trace(vec![]);
    heap.sweep();
    assert!(heap.get_string(a).is_none());

    let b = heap.alloc_string("b".to_string());
    assert_eq!(a, b, "sweep should return the slot to the free list");
    assert_eq!(heap.get_string(b).map(String::as_str), Some("b"));
}
