//! Tests for the type registry

use pretty_assertions::assert_eq;

use super::TypeRegistry;
use crate::types::{Member, PROTO, SymbolType, TypeId, TypeKind};

fn point_fields() -> Vec<Member> {
    vec![Member::new("x", TypeId::INT), Member::new("y", TypeId::INT)]
}

#[test]
fn builtins_have_fixed_ids() {
    let registry = TypeRegistry::new();
    assert_eq!(registry.name(TypeId::VOID), "void");
    assert_eq!(registry.name(TypeId::INT), "int");
    assert_eq!(registry.name(TypeId::ARRAY), "array");
    assert_eq!(registry.builtin("string"), Some(TypeId::STRING));
    assert_eq!(registry.builtin("Point"), None);
}

#[test]
fn every_builtin_but_void_has_a_prototype() {
    let registry = TypeRegistry::new();
    assert_eq!(registry.proto(TypeId::VOID), None);
    for id in [TypeId::NULL, TypeId::ANY, TypeId::INT, TypeId::STRING, TypeId::ARRAY] {
        assert!(registry.proto(id).is_some(), "{} lacks $proto", registry.name(id));
    }
}

#[test]
fn structurally_identical_structs_share_an_id() {
    let mut registry = TypeRegistry::new();
    let first = registry.define_struct("Point", Vec::new(), point_fields());
    let before = registry.len();
    let second = registry.define_struct("Point", Vec::new(), point_fields());
    assert_eq!(first, second);
    assert_eq!(registry.len(), before);
}

#[test]
fn identical_raw_types_converge() {
    let mut registry = TypeRegistry::new();
    let make = || {
        SymbolType::new("Pair", TypeKind::Struct).with_members(vec![
            Member::new("a", TypeId::FLOAT),
            Member::new("b", TypeId::STRING),
        ])
    };
    let a = registry.register(make());
    let b = registry.register(make());
    assert_eq!(a, b);
}

#[test]
fn different_member_order_is_a_different_type() {
    let mut registry = TypeRegistry::new();
    let a = registry.define_struct("Point", Vec::new(), point_fields());
    let mut swapped = point_fields();
    swapped.reverse();
    let b = registry.define_struct("Point", Vec::new(), swapped);
    assert_ne!(a, b);
}

#[test]
fn member_defaults_do_not_affect_identity() {
    let mut registry = TypeRegistry::new();
    let a = registry.define_struct("Point", Vec::new(), point_fields());
    let mut with_default = point_fields();
    with_default[0].default = Some(crate::syntax::build::int(3));
    let b = registry.define_struct("Point", Vec::new(), with_default);
    assert_eq!(a, b);
}

#[test]
fn struct_fields_come_from_the_prototype() {
    let mut registry = TypeRegistry::new();
    let point = registry.define_struct("Point", Vec::new(), point_fields());
    assert_eq!(registry.get(point).members[0].name, PROTO);
    assert_eq!(registry.field(point, "y"), Some((1, TypeId::INT)));
    assert_eq!(registry.field(point, "z"), None);
}

#[test]
fn array_instances_are_deduplicated() {
    let mut registry = TypeRegistry::new();
    let a = registry.array_of(TypeId::INT);
    let b = registry.instantiate(TypeId::ARRAY, &[TypeId::INT]);
    assert_eq!(a, b);
    assert_eq!(registry.name(a), "array<int>");
    assert_eq!(registry.element_type(a), Some(TypeId::INT));
    assert_eq!(registry.owner_name(a), "array");
}

#[test]
fn generic_struct_instantiation_substitutes_fields() {
    let mut registry = TypeRegistry::new();
    let t = registry.generic_param(0, "T");
    let boxed = registry.define_struct("Box", vec!["T".to_owned()], vec![Member::new("value", t)]);
    assert!(registry.is_open(t));

    let box_float = registry.instantiate(boxed, &[TypeId::FLOAT]);
    assert_eq!(registry.name(box_float), "Box<float>");
    assert_eq!(registry.field(box_float, "value"), Some((0, TypeId::FLOAT)));
    let instance = registry.get(box_float).instance.clone().unwrap();
    assert_eq!(instance.base, boxed);
    assert_eq!(instance.args, vec![TypeId::FLOAT]);

    assert_eq!(registry.instantiate(boxed, &[TypeId::FLOAT]), box_float);
}

#[test]
fn substitute_reaches_into_arrays_and_functions() {
    let mut registry = TypeRegistry::new();
    let t = registry.generic_param(0, "T");
    let array_t = registry.array_of(t);
    let func = registry.function_type(vec![array_t], t);

    let concrete = registry.substitute(func, &[TypeId::STRING]);
    assert_eq!(registry.name(concrete), "function<string, array<string>>");
    assert!(!registry.is_open(concrete));
}
