use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use stackflow_bytecode::TypeConstraint;
use stackflow_types::{ClassRef, ClassSpec, Type, TypeBits, Value, eval};

use crate::func::{CallContext, FuncFlags, FuncInfo, FuncRef};
use crate::index::Index;

/// A class declaration registered with a [`MemIndex`].
#[derive(Clone, Debug)]
pub struct ClassDecl {
    cls: ClassRef,
    methods: Vec<Arc<FuncInfo>>,
    constants: Vec<(Arc<str>, Value)>,
    public_statics: Vec<(Arc<str>, Type)>,
    builtin: bool,
}

#[bon::bon]
impl ClassDecl {
    #[builder]
    pub fn new(
        cls: ClassRef,
        #[builder(default)] methods: Vec<Arc<FuncInfo>>,
        #[builder(default)] constants: Vec<(Arc<str>, Value)>,
        /// Public static properties with their initial types.
        #[builder(default)]
        public_statics: Vec<(Arc<str>, Type)>,
        #[builder(default)] builtin: bool,
    ) -> Self {
        ClassDecl {
            cls,
            methods,
            constants,
            public_statics,
            builtin,
        }
    }
}

struct ClassEntry {
    cls: ClassRef,
    methods: FxHashMap<String, Arc<FuncInfo>>,
    constants: FxHashMap<Arc<str>, Value>,
    statics: Vec<Arc<str>>,
    builtin: bool,
}

type StaticKey = (Arc<str>, Arc<str>);

/// An [`Index`] over declarations held in memory.
///
/// Class and function names are case-insensitive.
pub struct MemIndex {
    classes: FxHashMap<String, ClassEntry>,
    funcs: FxHashMap<String, Arc<FuncInfo>>,
    constants: FxHashMap<Arc<str>, Option<Value>>,
    public_statics: RwLock<FxHashMap<StaticKey, Type>>,
    fold_memo: Mutex<FxHashMap<String, Type>>,
}

const FOLDABLE_BUILTINS: &[(&str, TypeBits)] = &[
    ("strlen", TypeBits::INT),
    ("abs", TypeBits::NUM),
    ("count", TypeBits::INT),
    ("min", TypeBits::INIT_CELL),
    ("max", TypeBits::INIT_CELL),
    ("intval", TypeBits::INT),
    ("floatval", TypeBits::DBL),
    ("boolval", TypeBits::BOOL),
    ("strval", TypeBits::STR),
    ("strtolower", TypeBits::STR),
    ("strtoupper", TypeBits::STR),
    ("str_repeat", TypeBits::STR),
    ("chr", TypeBits::STR),
    ("ord", TypeBits::INT),
    ("is_int", TypeBits::BOOL),
    ("is_float", TypeBits::BOOL),
    ("is_string", TypeBits::BOOL),
    ("is_bool", TypeBits::BOOL),
    ("is_null", TypeBits::BOOL),
    ("is_array", TypeBits::BOOL),
];

const OTHER_BUILTINS: &[(&str, TypeBits)] = &[
    ("extract", TypeBits::INT),
    ("compact", TypeBits::ARR),
    ("parse_str", TypeBits::INIT_NULL),
    ("get_defined_vars", TypeBits::ARR),
    ("defined", TypeBits::BOOL),
    ("function_exists", TypeBits::BOOL),
    ("trigger_error", TypeBits::BOOL),
    ("var_dump", TypeBits::INIT_NULL),
];

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// The class a class or object type is specialized to.
fn class_spec(t: &Type) -> Option<&ClassSpec> {
    t.dcls().or_else(|| t.dobj())
}

impl Default for MemIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemIndex {
    /// An index holding only the builtin classes and functions.
    pub fn new() -> Self {
        let mut index = MemIndex {
            classes: FxHashMap::default(),
            funcs: FxHashMap::default(),
            constants: FxHashMap::default(),
            public_statics: RwLock::new(FxHashMap::default()),
            fold_memo: Mutex::new(FxHashMap::default()),
        };

        let throwable = ClassRef::declare()
            .name("Throwable")
            .is_interface(true)
            .new();
        let exception = ClassRef::declare()
            .name("Exception")
            .interfaces(vec![throwable.clone()])
            .new();
        let awaitable = ClassRef::declare()
            .name("Awaitable")
            .is_interface(true)
            .new();
        let wait_handle = ClassRef::declare()
            .name("WaitHandle")
            .interfaces(vec![awaitable.clone()])
            .new();
        let closure = ClassRef::declare().name("Closure").is_final(true).new();
        for cls in [throwable, exception, awaitable, wait_handle, closure] {
            index.insert_class(ClassDecl::builder().cls(cls).builtin(true).build());
        }

        let foldable = FuncFlags::BUILTIN | FuncFlags::FOLDABLE | FuncFlags::EFFECT_FREE;
        for (name, ret) in FOLDABLE_BUILTINS {
            index.insert_func(
                FuncInfo::declare()
                    .name(*name)
                    .return_type(Type::from_bits(*ret))
                    .flags(foldable)
                    .new(),
            );
        }
        for (name, ret) in OTHER_BUILTINS {
            index.insert_func(
                FuncInfo::declare()
                    .name(*name)
                    .return_type(Type::from_bits(*ret))
                    .flags(FuncFlags::BUILTIN)
                    .new(),
            );
        }
        index
    }

    pub fn with_class(mut self, decl: ClassDecl) -> Self {
        self.insert_class(decl);
        self
    }

    pub fn with_func(mut self, func: Arc<FuncInfo>) -> Self {
        self.insert_func(func);
        self
    }

    /// Declare a constant with a known value.
    pub fn with_constant(mut self, name: &str, value: Value) -> Self {
        self.constants.insert(name.into(), Some(value));
        self
    }

    /// Declare a constant whose value is only known at runtime.
    pub fn with_dynamic_constant(mut self, name: &str) -> Self {
        self.constants.insert(name.into(), None);
        self
    }

    fn insert_class(&mut self, decl: ClassDecl) {
        let name: Arc<str> = decl.cls.name().into();
        let mut statics = Vec::with_capacity(decl.public_statics.len());
        {
            let mut table = self.public_statics.write();
            for (prop, ty) in decl.public_statics {
                table.insert((name.clone(), prop.clone()), ty);
                statics.push(prop);
            }
        }
        let entry = ClassEntry {
            methods: decl
                .methods
                .into_iter()
                .map(|m| (key(m.name()), m))
                .collect(),
            constants: decl.constants.into_iter().collect(),
            statics,
            builtin: decl.builtin,
            cls: decl.cls,
        };
        self.classes.insert(key(&name), entry);
    }

    fn insert_func(&mut self, func: Arc<FuncInfo>) {
        self.funcs.insert(key(func.name()), func);
    }

    /// Current type of a public static property, for inspection.
    pub fn public_static(&self, cls: &str, prop: &str) -> Option<Type> {
        self.public_statics
            .read()
            .get(&(Arc::from(cls), Arc::from(prop)))
            .cloned()
    }

    fn entry(&self, cls: &ClassRef) -> Option<&ClassEntry> {
        self.classes.get(&key(cls.name()))
    }

    /// `cls` and its ancestors that the index knows about, nearest first.
    fn lineage<'a>(&'a self, cls: &'a ClassRef) -> impl Iterator<Item = &'a ClassEntry> + 'a {
        std::iter::once(cls)
            .chain(cls.ancestors())
            .filter_map(|c| self.entry(c))
    }

    fn find_method(&self, cls: &ClassRef, name: &str) -> Option<Arc<FuncInfo>> {
        let name = key(name);
        self.lineage(cls)
            .find_map(|e| e.methods.get(&name))
            .cloned()
    }

    /// The class declaring public static `prop` as seen from `cls`.
    fn static_owner(&self, cls: &ClassRef, prop: &str) -> Option<Arc<str>> {
        self.lineage(cls)
            .find(|e| e.statics.iter().any(|p| &**p == prop))
            .map(|e| Arc::from(e.cls.name()))
    }

    /// Type of a class constraint name, and whether a value of that type
    /// certainly passes the runtime check.
    fn constraint_type(&self, ctx: Option<&ClassRef>, tc: &TypeConstraint) -> (Type, bool) {
        let Some(name) = tc.name() else {
            return (Type::INIT_CELL, true);
        };
        let (ty, precise) = match name.to_ascii_lowercase().as_str() {
            "int" => (Type::INT, true),
            "float" => (Type::DBL, true),
            "string" => (Type::STR, true),
            "bool" => (Type::BOOL, true),
            "num" => (Type::NUM, true),
            "arraykey" => (Type::ARR_KEY, true),
            "array" => (Type::ARR, true),
            "vec" => (Type::VEC, true),
            "dict" => (Type::DICT, true),
            "keyset" => (Type::KEYSET, true),
            "resource" => (Type::RES, true),
            "mixed" => return (Type::INIT_CELL, true),
            "void" => (Type::INIT_NULL, true),
            "noreturn" => (Type::BOTTOM, true),
            "this" => match ctx {
                Some(cls) if !cls.could_be_overridden() => (Type::obj_exact(cls.clone()), true),
                Some(cls) => (Type::obj_sub(cls.clone()), false),
                None => (Type::OBJ, false),
            },
            "self" => match ctx {
                Some(cls) => (Type::obj_sub(cls.clone()), true),
                None => (Type::OBJ, false),
            },
            _ => match self.resolve_class(name) {
                Some(cls) => (Type::obj_sub(cls), true),
                None => (Type::OBJ, false),
            },
        };
        if tc.is_nullable() {
            (ty.opt(), precise)
        } else {
            (ty, precise)
        }
    }
}

impl Index for MemIndex {
    fn resolve_class(&self, name: &str) -> Option<ClassRef> {
        self.classes.get(&key(name)).map(|e| e.cls.clone())
    }

    fn resolve_func(&self, name: &str) -> FuncRef {
        match self.funcs.get(&key(name)) {
            Some(f) => FuncRef::Exact(f.clone()),
            None => FuncRef::Unknown(name.into()),
        }
    }

    fn resolve_func_fallback(&self, name: &str, fallback: &str) -> Option<FuncRef> {
        if self.funcs.contains_key(&key(name)) {
            None
        } else {
            Some(self.resolve_func(fallback))
        }
    }

    fn resolve_method(&self, _ctx: Option<&ClassRef>, cls: &Type, name: &str) -> FuncRef {
        let unknown = || FuncRef::Unknown(name.into());
        let Some(spec) = class_spec(cls) else {
            return unknown();
        };
        let Some(found) = self.find_method(&spec.cls, name) else {
            return unknown();
        };
        if spec.is_exact()
            || !spec.cls.could_be_overridden()
            || found.flags().contains(FuncFlags::FINAL)
        {
            return FuncRef::Exact(found);
        }
        let lname = key(name);
        let mut candidates = vec![found];
        for entry in self.classes.values() {
            if entry.cls == spec.cls || !entry.cls.subclass_of(&spec.cls) {
                continue;
            }
            if let Some(m) = entry.methods.get(&lname) {
                if !candidates.iter().any(|c| Arc::ptr_eq(c, m)) {
                    candidates.push(m.clone());
                }
            }
        }
        if candidates.len() == 1 {
            return FuncRef::Exact(candidates.swap_remove(0));
        }
        FuncRef::Family {
            name: name.into(),
            candidates,
        }
    }

    fn resolve_ctor(&self, ctx: Option<&ClassRef>, cls: &Type) -> Option<FuncRef> {
        match self.resolve_method(ctx, cls, "__construct") {
            FuncRef::Unknown(_) => None,
            found => Some(found),
        }
    }

    fn lookup_return_type(&self, _call: &CallContext, func: &FuncRef) -> Type {
        match func {
            FuncRef::Exact(info) => info.return_type().clone(),
            FuncRef::Family { candidates, .. } => candidates
                .iter()
                .fold(Type::BOTTOM, |acc, c| acc.union(c.return_type())),
            FuncRef::Unknown(_) => Type::INIT_CELL,
        }
    }

    fn lookup_foldable_return_type(&self, func: &FuncInfo, args: &[Type]) -> Type {
        let Some(values) = args.iter().map(Type::tv).collect::<Option<Vec<Value>>>() else {
            return func.return_type().clone();
        };
        let memo_key = format!(
            "{}({})",
            key(func.name()),
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        if let Some(t) = self.fold_memo.lock().get(&memo_key) {
            return t.clone();
        }
        let folded = func.fold(&values).or_else(|| {
            func.is_builtin()
                .then(|| eval::call_builtin(func.name(), &values).ok())
                .flatten()
        });
        let ty = folded.map_or(Type::BOTTOM, |v| Type::from_value(&v));
        self.fold_memo.lock().insert(memo_key, ty.clone());
        ty
    }

    fn lookup_constant(&self, name: &str) -> Option<Type> {
        self.constants.get(name).map(|v| match v {
            Some(v) => Type::from_value(v),
            None => Type::INIT_CELL,
        })
    }

    fn lookup_class_constant(&self, cls: &Type, name: &str) -> Type {
        class_spec(cls)
            .and_then(|spec| {
                self.lineage(&spec.cls)
                    .find_map(|e| e.constants.get(name))
                    .map(Type::from_value)
            })
            .unwrap_or(Type::INIT_CELL)
    }

    fn lookup_public_static(&self, cls: &Type, name: &Type) -> Type {
        let (Some(spec), Some(prop)) = (class_spec(cls), name.str_val()) else {
            return Type::INIT_CELL;
        };
        let Some(owner) = self.static_owner(&spec.cls, prop) else {
            return Type::INIT_CELL;
        };
        self.public_statics
            .read()
            .get(&(owner, Arc::from(prop)))
            .cloned()
            .unwrap_or(Type::INIT_CELL)
    }

    fn merge_public_static(&self, cls: &Type, name: &Type, val: &Type) {
        let owner = class_spec(cls).map(|spec| &spec.cls);
        let exact_key = match (owner, name.str_val()) {
            (Some(cls), Some(prop)) => self
                .static_owner(cls, prop)
                .map(|owner| (owner, Arc::<str>::from(prop))),
            _ => None,
        };
        let mut table = self.public_statics.write();
        if let Some(k) = exact_key {
            if let Some(t) = table.get_mut(&k) {
                *t = t.union(val);
            }
            return;
        }
        // Unknown class or property: any matching property may be written.
        for ((owner_name, prop), t) in table.iter_mut() {
            let class_matches = owner.is_none_or(|c| {
                self.resolve_class(owner_name)
                    .is_some_and(|o| c.subclass_of(&o) || o.subclass_of(c))
            });
            let prop_matches = name.str_val().is_none_or(|p| p == &**prop);
            if class_matches && prop_matches {
                *t = t.union(val);
            }
        }
    }

    fn satisfies_constraint(&self, ctx: Option<&ClassRef>, t: &Type, tc: &TypeConstraint) -> bool {
        if !tc.has_constraint() {
            return true;
        }
        let (ty, precise) = self.constraint_type(ctx, tc);
        precise && t.subtype_of(&ty)
    }

    fn lookup_constraint(&self, ctx: Option<&ClassRef>, tc: &TypeConstraint) -> Type {
        self.constraint_type(ctx, tc).0
    }

    fn builtin_class(&self, name: &str) -> Option<ClassRef> {
        self.classes
            .get(&key(name))
            .filter(|e| e.builtin)
            .map(|e| e.cls.clone())
    }

    fn is_effect_free(&self, func: &FuncRef) -> bool {
        func.exact()
            .is_some_and(|f| f.flags().contains(FuncFlags::EFFECT_FREE))
    }
}
