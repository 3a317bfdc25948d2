use super::lexer::Span;
use crate::types::{ModuleId, TypeRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExprKind {
    Path {
        module: Option<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
    Array(Box<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

impl TypeExpr {
    /// Syntactic conversion: `Async<T>` without a module becomes
    /// [`TypeRef::Async`], other module-less paths stay module-less.
    pub fn to_type_ref(&self) -> TypeRef {
        match &self.kind {
            TypeExprKind::Array(elem) => TypeRef::array(elem.to_type_ref()),
            TypeExprKind::Path {
                module: None,
                name,
                args,
            } if name == "Async" && args.len() == 1 => TypeRef::asynchronous(args[0].to_type_ref()),
            TypeExprKind::Path { module, name, args } => TypeRef::Named {
                module: module.as_deref().map(ModuleId::from),
                name: name.clone(),
                args: args.iter().map(TypeExpr::to_type_ref).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrArg {
    Str(String, Span),
    Type(TypeExpr),
}

impl AttrArg {
    pub fn span(&self) -> Span {
        match self {
            AttrArg::Str(_, span) => span.clone(),
            AttrArg::Type(ty) => ty.span.clone(),
        }
    }
}

/// `#[name]` or `#[name(arg, ...)]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: Ident,
    pub args: Vec<AttrArg>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDecl {
    pub attrs: Vec<Attribute>,
    pub name: Ident,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub attrs: Vec<Attribute>,
    pub name: Ident,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInit {
    pub name: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(Ident),
    Field {
        base: Box<Expr>,
        field: Ident,
        span: Span,
    },
    New {
        ty: TypeExpr,
        fields: Vec<FieldInit>,
        span: Span,
    },
    Call {
        func: Ident,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        span: Span,
    },
    Await {
        inner: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Var(ident) => ident.span.clone(),
            Expr::Field { span, .. }
            | Expr::New { span, .. }
            | Expr::Call { span, .. }
            | Expr::Await { span, .. } => span.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Let { name: Ident, value: Expr, span: Span },
    Return { value: Expr, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. } | Stmt::Return { span, .. } => span.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpDecl {
    pub attrs: Vec<Attribute>,
    pub is_async: bool,
    pub name: Ident,
    pub params: Vec<ParamDecl>,
    pub ret: TypeExpr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Shape(ShapeDecl),
    Op(OpDecl),
}

/// Parsed contents of one source unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub items: Vec<Item>,
}
