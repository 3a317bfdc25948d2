//! Loads an emitted module image into the running process.
//!
//! Loading produces a [`CompiledModule`]: a `Dynamic` [`Module`] exporting one
//! type per shape plus the shared controller type, whose operations are
//! [`GeneratedOperation`]s ready to be routed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use http::Method;
use serde_json::{Map, Value};
use tracing::debug;

use super::image::{
    ModuleImage, OperationImage, ParamSource, SymbolKind, SymbolTable, ValueExpr, IMAGE_FORMAT,
};
use super::BuildMode;
use crate::bridge::{RequestKey, RequestProcessor};
use crate::endpoint::{
    coerce_wire_value, parse_form, BindingError, Operation, OperationCall, OperationError,
    OperationFuture, RouteAnnotation, SourceLocation,
};
use crate::types::{controller_type, FieldInfo, Module, ModuleId, ModuleOrigin, TypeInfo, TypeRef};

/// The image could not be loaded.
#[derive(Debug)]
pub enum LoadError {
    Decode(serde_json::Error),
    UnsupportedFormat { found: u32, expected: u32 },
    InvalidMethod { operation: String, method: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Decode(err) => write!(f, "failed to decode module image: {err}"),
            LoadError::UnsupportedFormat { found, expected } => write!(
                f,
                "unsupported module image format {found} (expected {expected})"
            ),
            LoadError::InvalidMethod { operation, method } => {
                write!(f, "operation '{operation}' has invalid method '{method}'")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Decode(err)
    }
}

/// The loaded, executable result of one compilation.
///
/// Lives for the rest of the process once registered; never unloaded.
#[derive(Debug)]
pub struct CompiledModule {
    module: Arc<Module>,
    controller: Arc<TypeInfo>,
    mode: BuildMode,
    symbols: Option<SymbolTable>,
}

impl CompiledModule {
    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.module.id
    }

    /// The module as seen by discovery.
    #[must_use]
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Every type the module exports: shapes first, then the controller.
    #[must_use]
    pub fn types(&self) -> &[Arc<TypeInfo>] {
        &self.module.types
    }

    /// The shared controller holding every generated operation.
    #[must_use]
    pub fn controller(&self) -> &Arc<TypeInfo> {
        &self.controller
    }

    pub fn operations(&self) -> impl Iterator<Item = &Arc<dyn Operation>> {
        self.controller.operations.iter()
    }

    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.operations().find(|op| op.name() == name)
    }

    #[must_use]
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Debug-symbol stream, present only for debug builds.
    #[must_use]
    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }
}

/// Load an emitted image, and the debug-symbol stream if there is one.
///
/// # Errors
///
/// Returns [`LoadError`] if either stream cannot be decoded, the image format is
/// not supported, or an operation carries an invalid HTTP method.
pub fn load(image: &[u8], symbols: Option<&[u8]>) -> Result<CompiledModule, LoadError> {
    let image: ModuleImage = serde_json::from_slice(image)?;
    if image.format != IMAGE_FORMAT {
        return Err(LoadError::UnsupportedFormat {
            found: image.format,
            expected: IMAGE_FORMAT,
        });
    }
    let symbols: Option<SymbolTable> = symbols.map(serde_json::from_slice::<SymbolTable>).transpose()?;
    let mode = if symbols.is_some() {
        BuildMode::Debug
    } else {
        BuildMode::Release
    };

    let shape_fields: HashMap<String, Vec<FieldInfo>> = image
        .shapes
        .iter()
        .map(|shape| {
            let fields = shape
                .fields
                .iter()
                .map(|f| FieldInfo {
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                })
                .collect();
            (shape.name.clone(), fields)
        })
        .collect();

    let mut controller = TypeInfo::new(image.module.clone(), image.controller.clone())
        .with_base(controller_type());
    for op in image.operations {
        let location = symbols
            .as_ref()
            .and_then(|table| table.find(SymbolKind::Operation, &op.name))
            .map(|symbol| SourceLocation {
                unit: symbol.unit.clone(),
                path: symbol.path.clone(),
                line: symbol.line,
                column: symbol.column,
            });
        let generated = GeneratedOperation::new(op, &image.module, &shape_fields, location)?;
        debug!(operation = %generated.name(), route = %generated.route.template, "loaded operation");
        controller = controller.with_operation(Arc::new(generated));
    }

    let mut module = Module::new(image.module.clone(), ModuleOrigin::Dynamic);
    for shape in &image.shapes {
        let mut info = TypeInfo::new(image.module.clone(), shape.name.clone());
        if let Some(fields) = shape_fields.get(&shape.name) {
            info.fields = fields.clone();
        }
        module = module.with_type(info);
    }
    let controller = Arc::new(controller);
    module.types.push(Arc::clone(&controller));

    Ok(CompiledModule {
        module: Arc::new(module),
        controller,
        mode,
        symbols,
    })
}

#[derive(Debug)]
struct BoundParam {
    name: String,
    wire_name: String,
    source: ParamSource,
    ty: TypeRef,
    /// Field types of a form parameter's shape, for coercing url-encoded values
    form_fields: Vec<FieldInfo>,
}

/// An operation produced by the compiler.
#[derive(Debug)]
pub struct GeneratedOperation {
    name: String,
    route: RouteAnnotation,
    params: Vec<BoundParam>,
    locals: Vec<ValueExpr>,
    request: TypeRef,
    response: TypeRef,
    is_async: bool,
    arg: ValueExpr,
    location: Option<SourceLocation>,
}

impl GeneratedOperation {
    fn new(
        op: OperationImage,
        module: &ModuleId,
        shapes: &HashMap<String, Vec<FieldInfo>>,
        location: Option<SourceLocation>,
    ) -> Result<Self, LoadError> {
        let method = Method::from_bytes(op.method.as_bytes()).map_err(|_| LoadError::InvalidMethod {
            operation: op.name.clone(),
            method: op.method.clone(),
        })?;
        let mut route = RouteAnnotation::new(method, op.route);
        route.produces = op.produces;

        let params = op
            .params
            .into_iter()
            .map(|p| {
                let form_fields = match (&p.source, &p.ty) {
                    (ParamSource::Form, TypeRef::Named { module: Some(m), name, .. }) if m == module => {
                        shapes.get(name).cloned().unwrap_or_default()
                    }
                    _ => Vec::new(),
                };
                BoundParam {
                    name: p.name,
                    wire_name: p.wire_name,
                    source: p.source,
                    ty: p.ty,
                    form_fields,
                }
            })
            .collect();

        Ok(Self {
            name: op.name,
            route,
            params,
            locals: op.locals,
            request: op.call.request,
            response: op.call.response,
            is_async: op.call.is_async,
            arg: op.call.arg,
            location,
        })
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    #[must_use]
    pub fn request_key(&self) -> RequestKey {
        RequestKey::new(self.request.clone(), self.response.clone())
    }

    fn bind(&self, call: &OperationCall) -> Result<Vec<Value>, BindingError> {
        let mut values = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let value = match param.source {
                ParamSource::Path => {
                    let raw = call.path_params.get(&param.wire_name).ok_or_else(|| {
                        BindingError::MissingPathParam {
                            param: param.wire_name.clone(),
                        }
                    })?;
                    coerce_wire_value(&param.wire_name, raw, &param.ty)?
                }
                ParamSource::Query => match call.query_params.get(&param.wire_name) {
                    Some(raw) => coerce_wire_value(&param.wire_name, raw, &param.ty)?,
                    None => Value::Null,
                },
                ParamSource::Body => {
                    let body = call
                        .body
                        .as_deref()
                        .filter(|b| !b.trim().is_empty())
                        .ok_or_else(|| BindingError::MissingBody {
                            param: param.name.clone(),
                        })?;
                    serde_json::from_str(body).map_err(|e| BindingError::InvalidBody {
                        param: param.name.clone(),
                        message: e.to_string(),
                    })?
                }
                ParamSource::Form => {
                    let body = call.body.as_deref().ok_or_else(|| BindingError::MissingBody {
                        param: param.name.clone(),
                    })?;
                    let form = parse_form(body);
                    let mut object = Map::new();
                    for field in &param.form_fields {
                        if let Some(raw) = form.get(&field.name) {
                            object.insert(
                                field.name.clone(),
                                coerce_wire_value(&field.name, raw, &field.ty)?,
                            );
                        }
                    }
                    Value::Object(object)
                }
            };
            values.push(value);
        }
        Ok(values)
    }

    fn evaluate(&self, params: &[Value]) -> Value {
        let mut locals = Vec::with_capacity(self.locals.len());
        for local in &self.locals {
            let value = eval(local, params, &locals);
            locals.push(value);
        }
        eval(&self.arg, params, &locals)
    }
}

fn eval(expr: &ValueExpr, params: &[Value], locals: &[Value]) -> Value {
    match expr {
        ValueExpr::Param(i) => params.get(*i).cloned().unwrap_or(Value::Null),
        ValueExpr::Local(i) => locals.get(*i).cloned().unwrap_or(Value::Null),
        ValueExpr::Field { base, name } => match eval(base, params, locals) {
            Value::Object(mut map) => map.remove(name).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        ValueExpr::New { fields, .. } => {
            let mut map = Map::new();
            for (name, value) in fields {
                map.insert(name.clone(), eval(value, params, locals));
            }
            Value::Object(map)
        }
    }
}

impl Operation for GeneratedOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn route(&self) -> &RouteAnnotation {
        &self.route
    }

    fn invoke(&self, call: OperationCall, processor: Arc<dyn RequestProcessor>) -> OperationFuture {
        let request = match self.bind(&call) {
            Ok(params) => self.evaluate(&params),
            Err(err) => return futures::future::ready(Err(OperationError::Binding(err))).boxed(),
        };
        let key = self.request_key();
        debug!(operation = %self.name, key = %key, "invoking request processor");
        if self.is_async {
            processor
                .process_async(key, request)
                .map(|result| result.map_err(OperationError::Dispatch))
                .boxed()
        } else {
            let result = processor
                .process(&key, request)
                .map_err(OperationError::Dispatch);
            futures::future::ready(result).boxed()
        }
    }

    fn source_location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }
}
