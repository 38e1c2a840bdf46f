use pretty_assertions::assert_eq;
use quill_values::{VMArray, VMObject, VMString, Value};

use super::*;

#[test]
fn unreachable_allocations_are_freed_before_exceeding_threshold() {
    let mut heap = Heap::new(4, 64);
    let threshold = heap.threshold();
    let mut kept = None;

    // Two more allocations than the threshold; only the first stays reachable.
    for i in 0..threshold + 2 {
        if heap.needs_collection() {
            heap.collect(kept.map(Value::Heap));
        }
        let r = heap.insert(VMString::new(format!("item {}", i)));
        if kept.is_none() {
            kept = Some(r);
        }
    }

    assert_eq!(heap.collections(), 1);
    heap.collect(kept.map(Value::Heap));
    assert_eq!(heap.live(), 1);
    let kept = kept.unwrap();
    assert_eq!(
        heap.get(kept).unwrap().downcast::<VMString>().unwrap().as_str(),
        "item 0"
    );
}

#[test]
fn collection_waits_until_the_threshold_is_exceeded() {
    let mut heap = Heap::new(4, 64);
    for i in 0..4 {
        heap.insert(VMString::new(i.to_string()));
    }
    assert!(!heap.needs_collection());
    heap.insert(VMString::new("one more"));
    assert!(heap.needs_collection());
}

#[test]
fn marking_follows_nested_references() {
    let mut heap = Heap::new(8, 64);
    let inner = heap.insert(VMString::new("inner"));
    let mut object = VMObject::new(0, 1);
    object.set(0, Value::Heap(inner)).unwrap();
    let object = heap.insert(object);
    let array = heap.insert(VMArray::from_values([Value::Heap(object)]));
    heap.insert(VMString::new("garbage"));

    let freed = heap.collect([Value::Heap(array)]);

    assert_eq!(freed, 1);
    assert!(heap.contains(inner));
    assert!(heap.contains(object));
}

#[test]
fn cycles_are_collected() {
    let mut heap = Heap::new(8, 64);
    let a = heap.insert(VMArray::new());
    let b = heap.insert(VMArray::from_values([Value::Heap(a)]));
    heap.get_as_mut::<VMArray>(Value::Heap(a))
        .unwrap()
        .push(Value::Heap(b));

    assert_eq!(heap.collect([]), 2);
    assert_eq!(heap.live(), 0);
}

#[test]
fn freed_slots_are_reused() {
    let mut heap = Heap::new(8, 64);
    let first = heap.insert(VMString::new("a"));
    heap.collect([]);
    let second = heap.insert(VMString::new("b"));
    assert_eq!(first, second);
}

#[test]
fn threshold_grows_when_most_values_survive() {
    let mut heap = Heap::new(4, 16);
    let roots: Vec<Value> = (0..4)
        .map(|i| Value::Heap(heap.insert(VMString::new(i.to_string()))))
        .collect();
    heap.collect(roots.iter().copied());
    assert_eq!(heap.threshold(), 8);
    heap.collect(roots.iter().copied());
    assert_eq!(heap.threshold(), 16);

    let more: Vec<Value> = (0..4)
        .map(|i| Value::Heap(heap.insert(VMString::new(i.to_string()))))
        .chain(roots)
        .collect();
    heap.collect(more);
    assert_eq!(heap.threshold(), 16);
}

#[test]
fn threshold_shrinks_to_minimum_when_most_values_die() {
    let mut heap = Heap::new(2, 64);
    let keep: Vec<Value> = (0..2)
        .map(|_| Value::Heap(heap.insert(VMArray::new())))
        .collect();
    heap.collect(keep.iter().copied());
    heap.collect(keep.iter().copied());
    assert_eq!(heap.threshold(), 8);

    heap.collect([]);
    assert_eq!(heap.threshold(), 4);
    heap.collect([]);
    heap.collect([]);
    assert_eq!(heap.threshold(), 2);
}

#[test]
fn typed_access_checks_the_payload() {
    let mut heap = Heap::new(8, 64);
    let s = Value::Heap(heap.insert(VMString::new("x")));
    assert!(matches!(
        heap.get_as::<VMArray>(s),
        Err(RuntimeError::PayloadMismatch(_))
    ));
    assert_eq!(
        heap.get_as::<VMArray>(Value::Null),
        Err(RuntimeError::NullReference)
    );
}
