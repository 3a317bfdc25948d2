//! Semantic analysis and lowering.
//!
//! Every unit of a compilation is checked together: shapes declared in one unit
//! are visible to operations in every other unit. Types are resolved against the
//! compilation's [`ReferenceSet`] plus its own shapes; anything else is an error.

use std::collections::{HashMap, HashSet};

use http::Method;

use super::ast::{
    AttrArg, Attribute, Expr, Item, OpDecl, ParamDecl, ShapeDecl, SourceFile, Stmt, TypeExpr,
    TypeExprKind,
};
use super::image::{
    BridgeCall, FieldImage, ModuleImage, OperationImage, ParamImage, ParamSource, ShapeImage,
    Symbol, SymbolKind, ValueExpr, IMAGE_FORMAT,
};
use super::lexer::Span;
use super::SourceUnit;
use crate::definition::{route_placeholders, SUPPORTED_METHODS};
use crate::diagnostics::{line_col, Diagnostic, Severity};
use crate::resolver::ReferenceSet;
use crate::types::{object_type, FieldInfo, ModuleId, Primitive, TypeRef};

const PROCESS: &str = "process";
const PROCESS_ASYNC: &str = "process_async";

/// A unit that parsed successfully.
pub(crate) struct ParsedUnit<'a> {
    pub unit: &'a SourceUnit,
    pub file: SourceFile,
}

pub(crate) struct CheckOutput {
    pub image: ModuleImage,
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Default)]
struct Sink {
    diagnostics: Vec<Diagnostic>,
}

impl Sink {
    fn error(&mut self, unit: &SourceUnit, code: &'static str, message: String, span: Span, label: &str) {
        self.diagnostics.push(
            Diagnostic::new(Severity::Error, code, message, &unit.name, &unit.text, span)
                .with_label(label),
        );
    }

    fn warning(&mut self, unit: &SourceUnit, code: &'static str, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::new(
            Severity::Warning,
            code,
            message,
            &unit.name,
            &unit.text,
            span,
        ));
    }
}

/// Types visible to a compilation.
struct TypeEnv<'a> {
    references: &'a ReferenceSet,
    module: &'a ModuleId,
    shapes: HashMap<String, Vec<FieldInfo>>,
}

impl TypeEnv<'_> {
    fn is_local(&self, module: &str) -> bool {
        module == self.module.as_str()
    }

    fn resolve(&self, sink: &mut Sink, unit: &SourceUnit, expr: &TypeExpr, allow_async: bool) -> Option<TypeRef> {
        match &expr.kind {
            TypeExprKind::Array(elem) => self
                .resolve(sink, unit, elem, false)
                .map(TypeRef::array),
            TypeExprKind::Path {
                module: None,
                name,
                args,
            } if name == "Async" => {
                if !allow_async {
                    sink.error(
                        unit,
                        "E0104",
                        "`Async<..>` is only allowed as the return type of an async operation".into(),
                        expr.span.clone(),
                        "not allowed here",
                    );
                    return None;
                }
                if args.len() != 1 {
                    sink.error(
                        unit,
                        "E0103",
                        format!("`Async` expects 1 type argument, found {}", args.len()),
                        expr.span.clone(),
                        "wrong number of type arguments",
                    );
                    return None;
                }
                self.resolve(sink, unit, &args[0], false)
                    .map(TypeRef::asynchronous)
            }
            TypeExprKind::Path {
                module: None,
                name,
                args,
            } => self.resolve_local(sink, unit, expr, name, args),
            TypeExprKind::Path {
                module: Some(module),
                name,
                args,
            } if self.is_local(module) => self.resolve_local(sink, unit, expr, name, args),
            TypeExprKind::Path {
                module: Some(module),
                name,
                args,
            } => {
                let id = ModuleId::new(module.as_str());
                let Some(found) = self.references.get(&id) else {
                    sink.error(
                        unit,
                        "E0101",
                        format!("module `{module}` is not referenced by this compilation"),
                        expr.span.clone(),
                        "unresolved module",
                    );
                    return None;
                };
                let Some(info) = found.find_type(name) else {
                    sink.error(
                        unit,
                        "E0102",
                        format!("type `{name}` not found in module `{module}`"),
                        expr.span.clone(),
                        "unknown type",
                    );
                    return None;
                };
                if info.generic_arity != args.len() {
                    sink.error(
                        unit,
                        "E0103",
                        format!(
                            "type `{module}::{name}` expects {} type argument(s), found {}",
                            info.generic_arity,
                            args.len()
                        ),
                        expr.span.clone(),
                        "wrong number of type arguments",
                    );
                    return None;
                }
                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    resolved.push(self.resolve(sink, unit, arg, false));
                }
                let resolved: Option<Vec<_>> = resolved.into_iter().collect();
                Some(TypeRef::generic(id, name.as_str(), resolved?))
            }
        }
    }

    fn resolve_local(
        &self,
        sink: &mut Sink,
        unit: &SourceUnit,
        expr: &TypeExpr,
        name: &str,
        args: &[TypeExpr],
    ) -> Option<TypeRef> {
        if !self.shapes.contains_key(name) {
            sink.error(
                unit,
                "E0105",
                format!(
                    "cannot find type `{name}` in this compilation; types from other modules must name their module"
                ),
                expr.span.clone(),
                "not found",
            );
            return None;
        }
        if !args.is_empty() {
            sink.error(
                unit,
                "E0103",
                format!("shape `{name}` takes no type arguments"),
                expr.span.clone(),
                "wrong number of type arguments",
            );
            return None;
        }
        Some(TypeRef::named(self.module.clone(), name))
    }

    /// Declared fields of a named type, if it has any declaration.
    fn fields_of(&self, ty: &TypeRef) -> Option<&[FieldInfo]> {
        let TypeRef::Named {
            module: Some(module),
            name,
            args,
        } = ty
        else {
            return None;
        };
        if !args.is_empty() {
            return None;
        }
        if module == self.module {
            return self.shapes.get(name).map(Vec::as_slice);
        }
        self.references
            .lookup(module, name)
            .map(|info| info.fields.as_slice())
    }
}

fn assignable(target: &TypeRef, value: &TypeRef) -> bool {
    target == value || *target == object_type()
}

fn is_wire_scalar(ty: &TypeRef) -> bool {
    matches!(ty.primitive(), Some(p) if p != Primitive::Object)
}

fn symbol(kind: SymbolKind, name: &str, unit: &SourceUnit, span: &Span) -> Symbol {
    let (line, column) = line_col(&unit.text, span.start);
    Symbol {
        kind,
        name: name.to_string(),
        unit: unit.name.clone(),
        path: unit.path.clone(),
        line,
        column,
    }
}

#[derive(Clone)]
struct Var {
    value: ValueExpr,
    ty: TypeRef,
}

/// Check every parsed unit together and lower them into a module image.
pub(crate) fn check_program(
    units: &[ParsedUnit<'_>],
    references: &ReferenceSet,
    module: &ModuleId,
    controller: &str,
) -> CheckOutput {
    let mut sink = Sink::default();
    let mut symbols = Vec::new();

    // Shape names first, so declaration order across units does not matter.
    let mut declared: Vec<(&SourceUnit, &ShapeDecl)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for parsed in units {
        for item in &parsed.file.items {
            if let Item::Shape(shape) = item {
                if seen.insert(shape.name.name.as_str()) {
                    declared.push((parsed.unit, shape));
                } else {
                    sink.error(
                        parsed.unit,
                        "E0201",
                        format!("shape `{}` is defined more than once", shape.name.name),
                        shape.name.span.clone(),
                        "duplicate definition",
                    );
                }
            }
        }
    }

    let mut env = TypeEnv {
        references,
        module,
        shapes: declared
            .iter()
            .map(|(_, shape)| (shape.name.name.clone(), Vec::new()))
            .collect(),
    };

    let mut shapes = Vec::with_capacity(declared.len());
    for (unit, shape) in &declared {
        for attr in &shape.attrs {
            sink.warning(
                unit,
                "W0201",
                format!("unknown attribute `{}` is ignored", attr.name.name),
                attr.span.clone(),
            );
        }
        let mut fields: Vec<FieldInfo> = Vec::with_capacity(shape.fields.len());
        for field in &shape.fields {
            if fields.iter().any(|f| f.name == field.name.name) {
                sink.error(
                    unit,
                    "E0202",
                    format!(
                        "field `{}` is declared more than once in shape `{}`",
                        field.name.name, shape.name.name
                    ),
                    field.name.span.clone(),
                    "duplicate field",
                );
                continue;
            }
            if let Some(ty) = env.resolve(&mut sink, unit, &field.ty, false) {
                fields.push(FieldInfo {
                    name: field.name.name.clone(),
                    ty,
                });
            }
        }
        shapes.push(ShapeImage {
            name: shape.name.name.clone(),
            fields: fields
                .iter()
                .map(|f| FieldImage {
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                })
                .collect(),
        });
        symbols.push(symbol(SymbolKind::Shape, &shape.name.name, unit, &shape.name.span));
        env.shapes.insert(shape.name.name.clone(), fields);
    }

    let mut operations = Vec::new();
    let mut op_names: HashSet<&str> = HashSet::new();
    for parsed in units {
        for item in &parsed.file.items {
            let Item::Op(op) = item else { continue };
            if !op_names.insert(op.name.name.as_str()) {
                sink.error(
                    parsed.unit,
                    "E0203",
                    format!("operation `{}` is defined more than once", op.name.name),
                    op.name.span.clone(),
                    "duplicate definition",
                );
                continue;
            }
            let mut checker = OpChecker {
                env: &env,
                sink: &mut sink,
                unit: parsed.unit,
                op,
            };
            if let Some(image) = checker.check() {
                operations.push(image);
            }
            symbols.push(symbol(SymbolKind::Operation, &op.name.name, parsed.unit, &op.name.span));
        }
    }

    CheckOutput {
        image: ModuleImage {
            format: IMAGE_FORMAT,
            module: module.clone(),
            controller: controller.to_string(),
            shapes,
            operations,
        },
        symbols,
        diagnostics: sink.diagnostics,
    }
}

struct OpChecker<'a, 'e> {
    env: &'a TypeEnv<'e>,
    sink: &'a mut Sink,
    unit: &'a SourceUnit,
    op: &'a OpDecl,
}

struct HttpRoute {
    method: Method,
    route: String,
    span: Span,
}

impl OpChecker<'_, '_> {
    fn error(&mut self, code: &'static str, message: String, span: Span, label: &str) {
        self.sink.error(self.unit, code, message, span, label);
    }

    fn resolve(&mut self, expr: &TypeExpr, allow_async: bool) -> Option<TypeRef> {
        self.env.resolve(self.sink, self.unit, expr, allow_async)
    }

    fn check(&mut self) -> Option<OperationImage> {
        let op = self.op;
        let (http, produces) = self.check_attributes();
        let params = self.check_params(http.as_ref());
        let ret = self.resolve(&op.ret, true);

        if let Some(ret) = &ret {
            if op.is_async != ret.is_async() {
                let message = if op.is_async {
                    format!("async operation `{}` must return `Async<..>`", op.name.name)
                } else {
                    format!(
                        "operation `{}` returns `{ret}` but is not declared `async`",
                        op.name.name
                    )
                };
                self.error("E0213", message, op.ret.span.clone(), "return type");
            }
        }

        let call = self.check_body(params.as_deref(), ret.as_ref().map(TypeRef::unwrap_async));
        let http = http?;
        let (params, (locals, call)) = (params?, call?);
        Some(OperationImage {
            name: op.name.name.clone(),
            method: http.method.to_string(),
            route: http.route,
            produces,
            params,
            locals,
            call,
        })
    }

    fn check_attributes(&mut self) -> (Option<HttpRoute>, Option<TypeRef>) {
        let op = self.op;
        let mut http: Option<HttpRoute> = None;
        let mut http_seen = false;
        let mut produces = None;
        for attr in &op.attrs {
            match attr.name.name.as_str() {
                "http" => {
                    if http_seen {
                        self.error(
                            "E0205",
                            "duplicate `http` attribute".into(),
                            attr.span.clone(),
                            "second route",
                        );
                        continue;
                    }
                    http_seen = true;
                    http = self.check_http(attr);
                }
                "produces" => match attr.args.as_slice() {
                    [AttrArg::Type(ty)] => produces = self.resolve(ty, false),
                    _ => self.error(
                        "E0205",
                        "expected `#[produces(Type)]`".into(),
                        attr.span.clone(),
                        "malformed attribute",
                    ),
                },
                other => self.sink.warning(
                    self.unit,
                    "W0201",
                    format!("unknown attribute `{other}` is ignored"),
                    attr.span.clone(),
                ),
            }
        }
        if !http_seen {
            self.error(
                "E0204",
                format!("operation `{}` has no `#[http(..)]` route attribute", op.name.name),
                op.name.span.clone(),
                "missing route",
            );
        }
        (http, produces)
    }

    fn check_http(&mut self, attr: &Attribute) -> Option<HttpRoute> {
        let [AttrArg::Type(verb), AttrArg::Str(route, route_span)] = attr.args.as_slice() else {
            self.error(
                "E0205",
                "expected `#[http(METHOD, \"/route\")]`".into(),
                attr.span.clone(),
                "malformed attribute",
            );
            return None;
        };
        let TypeExprKind::Path {
            module: None,
            name: verb_name,
            args,
        } = &verb.kind
        else {
            self.error(
                "E0206",
                "expected an HTTP method".into(),
                verb.span.clone(),
                "not a method",
            );
            return None;
        };
        let method = Method::from_bytes(verb_name.as_bytes())
            .ok()
            .filter(|m| args.is_empty() && SUPPORTED_METHODS.contains(m));
        let Some(method) = method else {
            self.error(
                "E0206",
                format!("unsupported HTTP method `{verb_name}`"),
                verb.span.clone(),
                "unsupported method",
            );
            return None;
        };
        if !route.starts_with('/') {
            self.error(
                "E0205",
                format!("route `{route}` must start with `/`"),
                route_span.clone(),
                "invalid route",
            );
            return None;
        }
        Some(HttpRoute {
            method,
            route: route.clone(),
            span: attr.span.clone(),
        })
    }

    fn check_params(&mut self, http: Option<&HttpRoute>) -> Option<Vec<ParamImage>> {
        let op = self.op;
        let placeholders = http.map(|h| route_placeholders(&h.route));
        let mut params = Vec::with_capacity(op.params.len());
        let mut ok = true;
        let mut names: HashSet<&str> = HashSet::new();
        let mut body_like = 0usize;

        for param in &op.params {
            if !names.insert(param.name.name.as_str()) {
                self.error(
                    "E0208",
                    format!("parameter `{}` is declared more than once", param.name.name),
                    param.name.span.clone(),
                    "duplicate parameter",
                );
                ok = false;
                continue;
            }
            let Some((source, wire_name)) = self.binding_source(param) else {
                ok = false;
                continue;
            };
            let Some(ty) = self.resolve(&param.ty, false) else {
                ok = false;
                continue;
            };

            match source {
                ParamSource::Path | ParamSource::Query => {
                    if !is_wire_scalar(&ty) {
                        self.error(
                            "E0212",
                            format!(
                                "parameter `{}` is bound from the {} and must have a primitive type, found `{ty}`",
                                param.name.name,
                                if source == ParamSource::Path { "path" } else { "query string" }
                            ),
                            param.ty.span.clone(),
                            "not a primitive",
                        );
                        ok = false;
                    }
                }
                ParamSource::Body | ParamSource::Form => {
                    body_like += 1;
                    if body_like > 1 {
                        self.error(
                            "E0211",
                            format!(
                                "operation `{}` has more than one body or form parameter",
                                op.name.name
                            ),
                            param.name.span.clone(),
                            "second body parameter",
                        );
                        ok = false;
                    }
                    if source == ParamSource::Form && self.env.fields_of(&ty).is_none() {
                        self.error(
                            "E0215",
                            format!("form parameter `{}` must be a shape, found `{ty}`", param.name.name),
                            param.ty.span.clone(),
                            "not a shape",
                        );
                        ok = false;
                    }
                }
            }

            if source == ParamSource::Path {
                if let Some(placeholders) = &placeholders {
                    if !placeholders.contains(&wire_name) {
                        self.error(
                            "E0209",
                            format!("path parameter `{wire_name}` does not appear in the route"),
                            param.name.span.clone(),
                            "not in route",
                        );
                        ok = false;
                    }
                }
            }

            params.push(ParamImage {
                name: param.name.name.clone(),
                wire_name,
                source,
                ty,
            });
        }

        if let (Some(http), Some(placeholders)) = (http, &placeholders) {
            for placeholder in placeholders {
                let bound = params
                    .iter()
                    .any(|p| p.source == ParamSource::Path && &p.wire_name == placeholder);
                let declared = op.params.iter().any(|p| {
                    p.attrs.iter().any(|a| a.name.name == "path")
                        && (p.name.name == *placeholder
                            || p.attrs.iter().any(|a| {
                                matches!(a.args.as_slice(), [AttrArg::Str(s, _)] if s == placeholder)
                            }))
                });
                if !bound && !declared {
                    self.error(
                        "E0210",
                        format!("route placeholder `{{{placeholder}}}` has no `#[path]` parameter"),
                        http.span.clone(),
                        "unbound placeholder",
                    );
                    ok = false;
                }
            }
        }

        ok.then_some(params)
    }

    fn binding_source(&mut self, param: &ParamDecl) -> Option<(ParamSource, String)> {
        let mut found: Option<(ParamSource, &Attribute)> = None;
        let mut count = 0usize;
        for attr in &param.attrs {
            let source = match attr.name.name.as_str() {
                "path" => ParamSource::Path,
                "query" => ParamSource::Query,
                "body" => ParamSource::Body,
                "form" => ParamSource::Form,
                other => {
                    self.sink.warning(
                        self.unit,
                        "W0201",
                        format!("unknown attribute `{other}` is ignored"),
                        attr.span.clone(),
                    );
                    continue;
                }
            };
            count += 1;
            if found.is_none() {
                found = Some((source, attr));
            }
        }
        let (source, attr) = match found {
            Some(found) if count == 1 => found,
            _ => {
                self.error(
                    "E0207",
                    format!(
                        "parameter `{}` needs exactly one of `#[path]`, `#[query]`, `#[body]`, `#[form]`",
                        param.name.name
                    ),
                    param.name.span.clone(),
                    "binding",
                );
                return None;
            }
        };
        match attr.args.as_slice() {
            [] => Some((source, param.name.name.clone())),
            [AttrArg::Str(wire, _)] => Some((source, wire.clone())),
            _ => {
                self.error(
                    "E0205",
                    format!("expected `#[{}]` or `#[{}(\"wire-name\")]`", attr.name.name, attr.name.name),
                    attr.span.clone(),
                    "malformed attribute",
                );
                None
            }
        }
    }

    fn check_body(
        &mut self,
        params: Option<&[ParamImage]>,
        result: Option<&TypeRef>,
    ) -> Option<(Vec<ValueExpr>, BridgeCall)> {
        let op = self.op;
        let mut vars: HashMap<String, Option<Var>> = HashMap::new();
        // Parameters that failed to check are still in scope, with no type.
        for (idx, param) in op.params.iter().enumerate() {
            let var = params.and_then(|p| p.get(idx)).map(|img| Var {
                value: ValueExpr::Param(idx),
                ty: img.ty.clone(),
            });
            vars.entry(param.name.name.clone()).or_insert(var);
        }

        let mut locals = Vec::new();
        let mut call = None;
        let mut returned = false;
        let mut ok = true;

        for stmt in &op.body {
            if returned {
                self.error(
                    "E0310",
                    "unreachable statement after `return`".into(),
                    stmt.span(),
                    "unreachable",
                );
                ok = false;
                break;
            }
            match stmt {
                Stmt::Let { name, value, .. } => {
                    if vars.contains_key(&name.name) {
                        self.error(
                            "E0311",
                            format!("`{}` is already defined", name.name),
                            name.span.clone(),
                            "redefined",
                        );
                        ok = false;
                        continue;
                    }
                    let var = self.check_value(value, &vars).map(|(value, ty)| {
                        locals.push(value);
                        Var {
                            value: ValueExpr::Local(locals.len() - 1),
                            ty,
                        }
                    });
                    ok &= var.is_some();
                    vars.insert(name.name.clone(), var);
                }
                Stmt::Return { value, .. } => {
                    returned = true;
                    call = self.check_return(value, &vars, result);
                    ok &= call.is_some();
                }
            }
        }

        if !returned {
            self.error(
                "E0309",
                format!("operation `{}` never returns a value", op.name.name),
                op.name.span.clone(),
                "missing `return`",
            );
            return None;
        }
        if !ok {
            return None;
        }
        call.map(|call| (locals, call))
    }

    fn check_return(
        &mut self,
        value: &Expr,
        vars: &HashMap<String, Option<Var>>,
        result: Option<&TypeRef>,
    ) -> Option<BridgeCall> {
        let op = self.op;
        let (call_expr, awaited) = match value {
            Expr::Await { inner, span } => {
                if !op.is_async {
                    self.error(
                        "E0308",
                        "`await` is only allowed in async operations".into(),
                        span.clone(),
                        "not async",
                    );
                    return None;
                }
                (inner.as_ref(), true)
            }
            other => (other, false),
        };
        let Expr::Call {
            func,
            type_args,
            args,
            span,
        } = call_expr
        else {
            self.error(
                "E0313",
                "an operation must return the result of `process` or `process_async`".into(),
                value.span(),
                "not a bridge call",
            );
            return None;
        };

        let is_async = match func.name.as_str() {
            PROCESS => false,
            PROCESS_ASYNC => true,
            other => {
                self.error(
                    "E0305",
                    format!("cannot find function `{other}`"),
                    func.span.clone(),
                    "unknown function",
                );
                return None;
            }
        };
        if type_args.len() != 2 {
            self.error(
                "E0306",
                format!("`{}` expects 2 type arguments, found {}", func.name, type_args.len()),
                span.clone(),
                "wrong number of type arguments",
            );
            return None;
        }
        if args.len() != 1 {
            self.error(
                "E0306",
                format!("`{}` expects 1 argument, found {}", func.name, args.len()),
                span.clone(),
                "wrong number of arguments",
            );
            return None;
        }

        let request = self.resolve(&type_args[0], false);
        let response = self.resolve(&type_args[1], false);
        let arg = self.check_value(&args[0], vars);
        let (request, response, (arg, arg_ty)) = (request?, response?, arg?);

        if !assignable(&request, &arg_ty) {
            self.error(
                "E0304",
                format!("mismatched types: expected `{request}`, found `{arg_ty}`"),
                args[0].span(),
                "request object",
            );
            return None;
        }

        if awaited && !is_async {
            self.error(
                "E0307",
                "`await` expects a `process_async` call".into(),
                func.span.clone(),
                "not awaitable",
            );
            return None;
        }
        if op.is_async && !is_async {
            self.error(
                "E0314",
                format!("async operation `{}` must call `process_async`", op.name.name),
                func.span.clone(),
                "synchronous call",
            );
            return None;
        }
        if is_async && !awaited {
            self.error(
                "E0304",
                format!(
                    "mismatched types: expected `{response}`, found `{}`",
                    TypeRef::asynchronous(response.clone())
                ),
                call_expr.span(),
                "missing `await`",
            );
            return None;
        }
        if let Some(result) = result {
            if *result != response {
                self.error(
                    "E0304",
                    format!(
                        "mismatched types: operation `{}` returns `{result}`, but the bridge call produces `{response}`",
                        op.name.name
                    ),
                    type_args[1].span.clone(),
                    "response type",
                );
                return None;
            }
        }

        Some(BridgeCall {
            request,
            response,
            is_async,
            arg,
        })
    }

    fn check_value(
        &mut self,
        expr: &Expr,
        vars: &HashMap<String, Option<Var>>,
    ) -> Option<(ValueExpr, TypeRef)> {
        match expr {
            Expr::Var(ident) => match vars.get(&ident.name) {
                Some(Some(var)) => Some((var.value.clone(), var.ty.clone())),
                // already reported where it was declared
                Some(None) => None,
                None => {
                    self.error(
                        "E0301",
                        format!("cannot find value `{}`", ident.name),
                        ident.span.clone(),
                        "not found",
                    );
                    None
                }
            },
            Expr::Field { base, field, span } => {
                let (base_value, base_ty) = self.check_value(base, vars)?;
                let env = self.env;
                let Some(fields) = env.fields_of(&base_ty) else {
                    self.error(
                        "E0302",
                        format!("type `{base_ty}` has no fields"),
                        span.clone(),
                        "no fields",
                    );
                    return None;
                };
                let Some(found) = fields.iter().find(|f| f.name == field.name) else {
                    self.error(
                        "E0302",
                        format!("no field `{}` on type `{base_ty}`", field.name),
                        field.span.clone(),
                        "unknown field",
                    );
                    return None;
                };
                let ty = found.ty.clone();
                Some((
                    ValueExpr::Field {
                        base: Box::new(base_value),
                        name: field.name.clone(),
                    },
                    ty,
                ))
            }
            Expr::New { ty, fields, span } => {
                let resolved = self.resolve(ty, false)?;
                let env = self.env;
                let Some(declared) = env.fields_of(&resolved) else {
                    self.error(
                        "E0302",
                        format!("type `{resolved}` has no declared fields and cannot be constructed"),
                        span.clone(),
                        "not constructible",
                    );
                    return None;
                };
                let declared = declared.to_vec();
                let mut ok = true;
                let mut inits: Vec<(String, ValueExpr)> = Vec::with_capacity(fields.len());
                for init in fields {
                    if inits.iter().any(|(name, _)| *name == init.name.name) {
                        self.error(
                            "E0303",
                            format!("field `{}` specified more than once", init.name.name),
                            init.name.span.clone(),
                            "duplicate field",
                        );
                        ok = false;
                        continue;
                    }
                    let Some(target) = declared.iter().find(|f| f.name == init.name.name) else {
                        self.error(
                            "E0302",
                            format!("no field `{}` on type `{resolved}`", init.name.name),
                            init.name.span.clone(),
                            "unknown field",
                        );
                        ok = false;
                        continue;
                    };
                    let Some((value, value_ty)) = self.check_value(&init.value, vars) else {
                        ok = false;
                        continue;
                    };
                    if !assignable(&target.ty, &value_ty) {
                        self.error(
                            "E0304",
                            format!(
                                "mismatched types: field `{}` expects `{}`, found `{value_ty}`",
                                init.name.name, target.ty
                            ),
                            init.value.span(),
                            "wrong type",
                        );
                        ok = false;
                        continue;
                    }
                    inits.push((init.name.name.clone(), value));
                }
                ok.then(|| {
                    (
                        ValueExpr::New {
                            ty: resolved.clone(),
                            fields: inits,
                        },
                        resolved,
                    )
                })
            }
            Expr::Call { span, .. } | Expr::Await { span, .. } => {
                self.error(
                    "E0312",
                    "bridge calls are only allowed as the returned value".into(),
                    span.clone(),
                    "not in return position",
                );
                None
            }
        }
    }
}
