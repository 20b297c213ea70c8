use std::sync::Arc;

use stackflow_index::*;
use stackflow_types::{ClassRef, Type, Value};

fn hierarchy() -> (MemIndex, ClassRef, ClassRef) {
    let base = ClassRef::declare().name("Base").new();
    let leaf = ClassRef::declare().name("Leaf").parent(base.clone()).new();
    let base_m = FuncInfo::declare()
        .name("m")
        .cls(base.clone())
        .return_type(Type::INT)
        .new();
    let leaf_m = FuncInfo::declare()
        .name("m")
        .cls(leaf.clone())
        .return_type(Type::STR)
        .new();
    let index = MemIndex::new()
        .with_class(
            ClassDecl::builder()
                .cls(base.clone())
                .methods(vec![base_m])
                .constants(vec![("K".into(), Value::Int(3))])
                .public_statics(vec![("count".into(), Type::int(0))])
                .build(),
        )
        .with_class(
            ClassDecl::builder()
                .cls(leaf.clone())
                .methods(vec![leaf_m])
                .build(),
        );
    (index, base, leaf)
}

#[test]
fn overridden_methods_resolve_to_a_family() {
    let (index, base, leaf) = hierarchy();
    let call = CallContext {
        args: vec![],
        context: Type::obj_sub(base.clone()),
    };

    let family = index.resolve_method(None, &Type::obj_sub(base.clone()), "m");
    assert!(matches!(family, FuncRef::Family { ref candidates, .. } if candidates.len() == 2));
    assert_eq!(index.lookup_return_type(&call, &family), Type::INT.union(&Type::STR));

    let exact = index.resolve_method(None, &Type::obj_exact(base), "m");
    assert_eq!(index.lookup_return_type(&call, &exact), Type::INT);

    let leaf_m = index.resolve_method(None, &Type::obj_sub(leaf), "m");
    assert_eq!(leaf_m.to_string(), "Leaf::m");

    let missing = index.resolve_method(None, &Type::OBJ, "m");
    assert!(!missing.cant_be_magic_call());
}

#[test]
fn builtins_fold_on_literal_arguments() {
    let index = MemIndex::new();
    let strlen = index.resolve_func("STRLEN");
    let info = strlen.exact().expect("strlen is a builtin");
    assert!(strlen.is_foldable());
    assert_eq!(
        index.lookup_foldable_return_type(info, &[Type::str("abc")]),
        Type::int(3)
    );
    assert_eq!(
        index.lookup_foldable_return_type(info, &[Type::int(3)]),
        Type::BOTTOM
    );
    assert_eq!(index.lookup_foldable_return_type(info, &[Type::STR]), Type::INT);
}

#[test]
fn user_fold_functions_are_consulted() {
    let twice = FuncInfo::declare()
        .name("twice")
        .return_type(Type::INT)
        .flags(FuncFlags::FOLDABLE)
        .fold(Arc::new(|args: &[Value]| match args {
            [Value::Int(i)] => Some(Value::Int(i * 2)),
            _ => None,
        }))
        .new();
    let index = MemIndex::new().with_func(twice.clone());
    assert_eq!(
        index.lookup_foldable_return_type(&twice, &[Type::int(21)]),
        Type::int(42)
    );
}

#[test]
fn public_statics_only_widen() {
    let (index, base, leaf) = hierarchy();
    let name = Type::str("count");
    assert_eq!(
        index.lookup_public_static(&Type::cls_exact(leaf.clone()), &name),
        Type::int(0)
    );
    index.merge_public_static(&Type::cls_exact(leaf), &name, &Type::int(1));
    assert_eq!(
        index.public_static("Base", "count"),
        Some(Type::int(0).union(&Type::int(1)))
    );
    index.merge_public_static(&Type::CLS, &Type::STR, &Type::STR);
    let widened = index.lookup_public_static(&Type::cls_sub(base), &name);
    assert!(Type::STR.subtype_of(&widened));
}

#[test]
fn constants_and_constraints() {
    let (index, base, _) = hierarchy();
    let index = index
        .with_constant("LIMIT", Value::Int(10))
        .with_dynamic_constant("NOW");
    assert_eq!(index.lookup_constant("LIMIT"), Some(Type::int(10)));
    assert_eq!(index.lookup_constant("NOW"), Some(Type::INIT_CELL));
    assert_eq!(index.lookup_constant("MISSING"), None);
    assert_eq!(
        index.lookup_class_constant(&Type::cls_exact(base.clone()), "K"),
        Type::int(3)
    );

    let int = TypeConstraint::named("int");
    assert!(index.satisfies_constraint(None, &Type::int(4), &int));
    assert!(!index.satisfies_constraint(None, &Type::NUM, &int));
    let opt_base = TypeConstraint::named("Base").nullable();
    assert_eq!(
        index.lookup_constraint(None, &opt_base),
        Type::obj_sub(base).opt()
    );
    let unknown = TypeConstraint::named("Nope");
    assert!(!index.satisfies_constraint(None, &Type::OBJ, &unknown));
    assert!(index.builtin_class("Exception").is_some());
}
