use stackflow_bytecode::TypeConstraint;
use stackflow_types::{ClassRef, Type};

use crate::func::{CallContext, FuncInfo, FuncRef};

/// Whole-program facts the interpreter queries.
///
/// `ctx` is the class of the function being analyzed, when it is a method.
/// Implementations only ever widen the facts they report for mutable tables,
/// so answers stay sound while the program is still being analyzed.
pub trait Index: Send + Sync {
    fn resolve_class(&self, name: &str) -> Option<ClassRef>;

    fn resolve_func(&self, name: &str) -> FuncRef;

    /// The function called when `name` turns out not to exist, or `None`
    /// when `name` certainly exists.
    fn resolve_func_fallback(&self, name: &str, fallback: &str) -> Option<FuncRef>;

    /// Resolve method `name` on receivers of class type `cls`.
    fn resolve_method(&self, ctx: Option<&ClassRef>, cls: &Type, name: &str) -> FuncRef;

    /// The constructor run for objects of class type `cls`, if any.
    fn resolve_ctor(&self, ctx: Option<&ClassRef>, cls: &Type) -> Option<FuncRef>;

    fn lookup_return_type(&self, call: &CallContext, func: &FuncRef) -> Type;

    /// Return type of calling a foldable `func` on `args`; a literal type
    /// when the call can be evaluated, bottom when it cannot.
    fn lookup_foldable_return_type(&self, func: &FuncInfo, args: &[Type]) -> Type;

    /// `None` for constants that are not defined anywhere.
    fn lookup_constant(&self, name: &str) -> Option<Type>;

    fn lookup_class_constant(&self, cls: &Type, name: &str) -> Type;

    /// Type of public static property `name` of class type `cls`.
    fn lookup_public_static(&self, cls: &Type, name: &Type) -> Type;

    /// Record a store to a public static property.
    fn merge_public_static(&self, cls: &Type, name: &Type, val: &Type);

    /// Whether every value of `t` passes `tc`, so the check is a no-op.
    fn satisfies_constraint(&self, ctx: Option<&ClassRef>, t: &Type, tc: &TypeConstraint) -> bool;

    /// The type values passing `tc` have.
    fn lookup_constraint(&self, ctx: Option<&ClassRef>, tc: &TypeConstraint) -> Type;

    fn builtin_class(&self, name: &str) -> Option<ClassRef>;

    fn is_effect_free(&self, func: &FuncRef) -> bool;
}
