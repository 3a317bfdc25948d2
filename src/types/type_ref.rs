use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::compiler::parse_type_text;

/// Identity of a binary module in the host's type space (e.g. `app.users`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Primitive types declared by the `core` bootstrap module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Object,
    Bool,
    Int,
    Long,
    Float,
    String,
}

impl Primitive {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Object" => Some(Primitive::Object),
            "Bool" => Some(Primitive::Bool),
            "Int" => Some(Primitive::Int),
            "Long" => Some(Primitive::Long),
            "Float" => Some(Primitive::Float),
            "String" => Some(Primitive::String),
            _ => None,
        }
    }
}

/// Reference to a type used by a handler definition or by generated source.
///
/// Text form: `app.users::User`, `core::List<core::Int>`, `[core::String]`,
/// `Async<app.users::User>`. A named type without a module (`Anonymous`) has
/// no locatable declaring module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    Named {
        module: Option<ModuleId>,
        name: String,
        args: Vec<TypeRef>,
    },
    Array(Box<TypeRef>),
    /// Asynchronous-result wrapper; only meaningful as a response type.
    Async(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(module: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        TypeRef::Named {
            module: Some(module.into()),
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(module: impl Into<ModuleId>, name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            module: Some(module.into()),
            name: name.into(),
            args,
        }
    }

    /// A named type whose declaring module is unknown (anonymous or in-memory only).
    pub fn anonymous(name: impl Into<String>) -> Self {
        TypeRef::Named {
            module: None,
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn array(elem: TypeRef) -> Self {
        TypeRef::Array(Box::new(elem))
    }

    pub fn asynchronous(inner: TypeRef) -> Self {
        TypeRef::Async(Box::new(inner))
    }

    pub fn core(name: &str) -> Self {
        TypeRef::named(super::catalog::CORE_MODULE, name)
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, TypeRef::Async(_))
    }

    /// Strip the asynchronous-result wrapper, if any.
    #[must_use]
    pub fn unwrap_async(&self) -> &TypeRef {
        match self {
            TypeRef::Async(inner) => inner,
            other => other,
        }
    }

    #[must_use]
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            TypeRef::Named { module, .. } => module.as_ref(),
            _ => None,
        }
    }

    /// Last path segment without generic arguments (`app.users::User` → `User`).
    #[must_use]
    pub fn simple_name(&self) -> &str {
        match self {
            TypeRef::Named { name, .. } => name,
            TypeRef::Array(elem) | TypeRef::Async(elem) => elem.simple_name(),
        }
    }

    #[must_use]
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            TypeRef::Named { module: Some(m), name, args }
                if args.is_empty() && m.as_str() == super::catalog::CORE_MODULE =>
            {
                Primitive::from_name(name)
            }
            _ => None,
        }
    }

    /// Type arguments and element types directly nested in this reference.
    #[must_use]
    pub fn children(&self) -> Vec<&TypeRef> {
        match self {
            TypeRef::Named { args, .. } => args.iter().collect(),
            TypeRef::Array(elem) | TypeRef::Async(elem) => vec![elem.as_ref()],
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { module, name, args } => {
                if let Some(module) = module {
                    write!(f, "{module}::")?;
                }
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeRef::Array(elem) => write!(f, "[{elem}]"),
            TypeRef::Async(inner) => write!(f, "Async<{inner}>"),
        }
    }
}

impl FromStr for TypeRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_type_text(s)
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<TypeRef>().map_err(serde::de::Error::custom)
    }
}
