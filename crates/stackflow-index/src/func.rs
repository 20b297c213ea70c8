use std::fmt;
use std::sync::Arc;

use stackflow_types::{ClassRef, Type, Value};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FuncFlags: u32 {
        /// Implemented natively.
        const BUILTIN = 1 << 0;
        /// Calls with literal arguments may be evaluated at analysis time.
        const FOLDABLE = 1 << 1;
        /// Has no observable side effects.
        const EFFECT_FREE = 1 << 2;
        const STATIC = 1 << 3;
        /// No subclass can override this method.
        const FINAL = 1 << 4;
    }
}

/// Evaluates a foldable call on literal arguments. `None` when the call
/// cannot be folded.
pub type FoldFn = Arc<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

/// What the index knows about a function or method.
pub struct FuncInfo {
    name: Arc<str>,
    cls: Option<ClassRef>,
    return_type: Type,
    flags: FuncFlags,
    fold: Option<FoldFn>,
}

#[bon::bon]
impl FuncInfo {
    #[builder(finish_fn = new)]
    pub fn declare(
        #[builder(into)] name: Arc<str>,
        /// The declaring class of a method.
        cls: Option<ClassRef>,
        #[builder(default = Type::INIT_CELL)] return_type: Type,
        #[builder(default)] flags: FuncFlags,
        fold: Option<FoldFn>,
    ) -> Arc<FuncInfo> {
        Arc::new(FuncInfo {
            name,
            cls,
            return_type,
            flags,
            fold,
        })
    }
}

impl FuncInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cls(&self) -> Option<&ClassRef> {
        self.cls.as_ref()
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn flags(&self) -> FuncFlags {
        self.flags
    }

    pub fn is_builtin(&self) -> bool {
        self.flags.contains(FuncFlags::BUILTIN)
    }

    pub fn is_foldable(&self) -> bool {
        self.flags.contains(FuncFlags::FOLDABLE)
    }

    pub fn fold(&self, args: &[Value]) -> Option<Value> {
        self.fold.as_ref().and_then(|f| f(args))
    }
}

impl fmt::Debug for FuncInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncInfo")
            .field("name", &self.name)
            .field("cls", &self.cls)
            .field("return_type", &self.return_type)
            .field("flags", &self.flags)
            .field("fold", &self.fold.is_some())
            .finish()
    }
}

/// A call target as far as it could be resolved.
#[derive(Clone, Debug)]
pub enum FuncRef {
    /// Exactly this function.
    Exact(Arc<FuncInfo>),
    /// One of several overriding implementations of a method.
    Family {
        name: Arc<str>,
        candidates: Vec<Arc<FuncInfo>>,
    },
    /// Known only by name.
    Unknown(Arc<str>),
}

impl FuncRef {
    pub fn name(&self) -> &str {
        match self {
            FuncRef::Exact(info) => info.name(),
            FuncRef::Family { name, .. } | FuncRef::Unknown(name) => name,
        }
    }

    pub fn exact(&self) -> Option<&Arc<FuncInfo>> {
        match self {
            FuncRef::Exact(info) => Some(info),
            _ => None,
        }
    }

    /// Whether the call certainly reaches a declared method rather than a
    /// magic `__call` handler.
    pub fn cant_be_magic_call(&self) -> bool {
        !matches!(self, FuncRef::Unknown(_))
    }

    pub fn is_builtin(&self) -> bool {
        self.exact().is_some_and(|f| f.is_builtin())
    }

    pub fn is_foldable(&self) -> bool {
        self.exact().is_some_and(|f| f.is_foldable())
    }

    /// Whether this names `name`, ignoring ASCII case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
    }
}

impl PartialEq for FuncRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FuncRef::Exact(a), FuncRef::Exact(b)) => Arc::ptr_eq(a, b),
            (FuncRef::Family { name: a, .. }, FuncRef::Family { name: b, .. }) => a == b,
            (FuncRef::Unknown(a), FuncRef::Unknown(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncRef::Exact(info) => match info.cls() {
                Some(cls) => write!(f, "{cls}::{}", info.name()),
                None => f.write_str(info.name()),
            },
            FuncRef::Family { name, .. } => write!(f, "*::{name}"),
            FuncRef::Unknown(name) => write!(f, "?{name}"),
        }
    }
}

/// Arguments and receiver of a call whose return type is looked up.
#[derive(Clone, Debug, PartialEq)]
pub struct CallContext {
    pub args: Vec<Type>,
    /// The object or class the callee runs against; bottom for free
    /// functions.
    pub context: Type,
}
