use stackflow_test_utils::lattice::{assert_finite_lattice_laws, assert_lattice_laws};
use stackflow_types::{ArrayKey, ClassRef, Lattice, Type};

fn scalar_samples() -> Vec<Type> {
    vec![
        Type::INT,
        Type::int(1),
        Type::int(2),
        Type::int(1).opt(),
        Type::STR,
        Type::str("a"),
        Type::INIT_NULL,
        Type::UNINIT,
        Type::BOOL,
        Type::TRUE,
        Type::NUM,
        Type::dbl(1.5),
        Type::INIT_CELL,
        Type::CELL,
    ]
}

#[test]
fn scalar_types_form_a_lattice() {
    assert_finite_lattice_laws(&scalar_samples());
}

#[test]
fn packed_containers_form_a_lattice() {
    assert_finite_lattice_laws(&[
        Type::vec_empty(),
        Type::vec(vec![Type::int(1)]),
        Type::vec(vec![Type::INT]),
        Type::vec_n(Type::INT),
        Type::VEC,
        Type::INIT_NULL,
    ]);
}

#[test]
fn struct_dicts_form_a_lattice() {
    assert_lattice_laws(&[
        Type::dict(vec![(ArrayKey::from("a"), Type::int(1))]),
        Type::dict(vec![(ArrayKey::from("a"), Type::INT)]),
        Type::dict_n(Type::STR, Type::INT),
        Type::DICT,
    ]);
}

#[test]
fn objects_form_a_lattice() {
    let base = ClassRef::declare().name("Base").new();
    let a = ClassRef::declare().name("A").parent(base.clone()).new();
    let b = ClassRef::declare().name("B").parent(base.clone()).new();
    assert_finite_lattice_laws(&[
        Type::OBJ,
        Type::obj_sub(base.clone()),
        Type::obj_exact(base),
        Type::obj_exact(a.clone()),
        Type::obj_sub(a),
        Type::obj_exact(b),
    ]);
}

#[test]
fn joins_keep_shared_specialization() {
    let joined = Type::vec(vec![Type::int(1)]).join(&Type::vec(vec![Type::int(2)]));
    assert_eq!(joined, Type::vec(vec![Type::INT]));
    assert_eq!(
        Type::vec_empty().join(&Type::vec(vec![Type::STR])),
        Type::vec_n(Type::STR)
    );
}
