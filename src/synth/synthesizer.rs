use std::fmt;

use askama::Template;
use tracing::debug;

use super::names::{sanitize_ident, NameAllocator, NameCollisionExhaustion};
use super::surrogate::SurrogateSource;
use super::templates::{
    AssignLine, FieldLine, OperationTemplateData, ParamLine, ShapeTemplateData,
};
use crate::compiler::SourceUnit;
use crate::config::ForgeConfig;
use crate::definition::{route_placeholders, BindingKind, HandlerDefinition, ParameterBinding};

/// Generated source for one handler definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub operation_name: String,
    /// Present only when the definition has body or form bindings
    pub auxiliary_shape_name: Option<String>,
    pub auxiliary_shape_source: Option<String>,
    pub operation_source: String,
}

impl OperationSpec {
    /// Compilation units for this operation, carrier shape first.
    #[must_use]
    pub fn units(&self) -> Vec<SourceUnit> {
        let mut units = Vec::with_capacity(2);
        if let (Some(name), Some(text)) = (&self.auxiliary_shape_name, &self.auxiliary_shape_source) {
            units.push(SourceUnit::new(name.as_str(), text.as_str()));
        }
        units.push(SourceUnit::new(
            self.operation_name.as_str(),
            self.operation_source.as_str(),
        ));
        units
    }
}

/// Synthesis failed for one definition.
#[derive(Debug)]
pub enum SynthesisError {
    NameCollision(NameCollisionExhaustion),
    Render(askama::Error),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::NameCollision(err) => write!(f, "{err}"),
            SynthesisError::Render(err) => write!(f, "failed to render generated source: {err}"),
        }
    }
}

impl std::error::Error for SynthesisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthesisError::NameCollision(err) => Some(err),
            SynthesisError::Render(err) => Some(err),
        }
    }
}

impl From<NameCollisionExhaustion> for SynthesisError {
    fn from(err: NameCollisionExhaustion) -> Self {
        SynthesisError::NameCollision(err)
    }
}

impl From<askama::Error> for SynthesisError {
    fn from(err: askama::Error) -> Self {
        SynthesisError::Render(err)
    }
}

/// A wire parameter: every binding sharing one target property.
struct ParamGroup<'d> {
    body_like: bool,
    target: &'d str,
    bindings: Vec<&'d ParameterBinding>,
}

fn group_bindings(def: &HandlerDefinition) -> Vec<ParamGroup<'_>> {
    let mut groups: Vec<ParamGroup<'_>> = Vec::new();
    for binding in &def.parameters {
        let body_like = binding.kind.is_body_like();
        match groups
            .iter_mut()
            .find(|g| g.body_like == body_like && g.target == binding.target_property)
        {
            Some(group) => group.bindings.push(binding),
            None => groups.push(ParamGroup {
                body_like,
                target: &binding.target_property,
                bindings: vec![binding],
            }),
        }
    }
    groups
}

fn escape_str(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn binding_attr(name: &str, target: &str, ident: &str) -> String {
    if target == ident {
        format!("#[{name}]")
    } else {
        format!("#[{name}(\"{}\")]", escape_str(target))
    }
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Generate the operation (and carrier shape, if needed) for one definition.
///
/// The operation takes the request type's simple name, or its first free
/// numeric variant in `names`. One surrogate is drawn from `surrogates` per
/// call and names both the carrier shape and the request variable.
///
/// # Errors
///
/// Returns [`SynthesisError`] when no operation name is available or a
/// template fails to render.
pub fn synthesize(
    def: &HandlerDefinition,
    names: &mut NameAllocator,
    surrogates: &mut SurrogateSource,
) -> Result<OperationSpec, SynthesisError> {
    let operation_name = names.allocate(&sanitize_ident(def.request_type.simple_name()))?;
    let surrogate = surrogates.next_id();
    let placeholders = route_placeholders(&def.route);
    let groups = group_bindings(def);

    let body_bindings: Vec<&ParameterBinding> = groups
        .iter()
        .filter(|g| g.body_like)
        .flat_map(|g| g.bindings.iter().copied())
        .collect();
    let carrier_name = if body_bindings.is_empty() {
        None
    } else {
        Some(names.allocate(&format!("{operation_name}Body_{surrogate}"))?)
    };
    let carrier_source = match &carrier_name {
        Some(name) => {
            let shape = ShapeTemplateData {
                name: name.clone(),
                fields: body_bindings
                    .iter()
                    .map(|b| FieldLine {
                        name: b.source_property.clone(),
                        ty: b.value_type.to_string(),
                    })
                    .collect(),
            };
            Some(ensure_newline(shape.render()?))
        }
        None => None,
    };

    let mut idents = NameAllocator::new();
    let request_var = format!("request_{surrogate}");
    idents.reserve(&request_var);
    let mut params = Vec::with_capacity(groups.len());
    let mut assignments = Vec::with_capacity(def.parameters.len());
    for group in &groups {
        let ident = idents.allocate(&sanitize_ident(group.target))?;
        let (attr, ty) = if group.body_like {
            let kind = match group.bindings.first().map(|b| b.kind) {
                Some(BindingKind::FromForm) => "form",
                _ => "body",
            };
            (
                binding_attr(kind, group.target, &ident),
                carrier_name.clone().unwrap_or_default(),
            )
        } else {
            let kind = if placeholders.iter().any(|p| p == group.target) {
                "path"
            } else {
                "query"
            };
            let ty = group
                .bindings
                .first()
                .map(|b| b.value_type.to_string())
                .unwrap_or_default();
            (binding_attr(kind, group.target, &ident), ty)
        };
        for binding in &group.bindings {
            let value = if group.body_like {
                format!("{ident}.{}", binding.source_property)
            } else {
                ident.clone()
            };
            assignments.push(AssignLine {
                field: binding.source_property.clone(),
                value,
            });
        }
        params.push(ParamLine { attr, ident, ty });
    }

    let response = def.response_type.unwrap_async();
    let operation = OperationTemplateData {
        method: def.method.to_string(),
        route: escape_str(&def.route),
        is_async: def.is_async(),
        name: operation_name.clone(),
        params,
        return_type: def.response_type.to_string(),
        request_type: def.request_type.to_string(),
        response_type: response.to_string(),
        request_var,
        assignments,
    };
    let operation_source = ensure_newline(operation.render()?);
    debug!(
        operation = %operation_name,
        carrier = carrier_name.as_deref().unwrap_or("-"),
        "synthesized operation"
    );

    Ok(OperationSpec {
        operation_name,
        auxiliary_shape_name: carrier_name,
        auxiliary_shape_source: carrier_source,
        operation_source,
    })
}

/// Synthesizes a whole definition list with one shared naming history.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    names: NameAllocator,
    surrogates: SurrogateSource,
}

impl Synthesizer {
    #[must_use]
    pub fn new(names: NameAllocator, surrogates: SurrogateSource) -> Self {
        Self { names, surrogates }
    }

    #[must_use]
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self::new(
            NameAllocator::with_max_suffix(config.max_name_suffix),
            SurrogateSource::new(config.surrogates),
        )
    }

    /// # Errors
    ///
    /// See [`synthesize`].
    pub fn synthesize(&mut self, def: &HandlerDefinition) -> Result<OperationSpec, SynthesisError> {
        synthesize(def, &mut self.names, &mut self.surrogates)
    }

    /// Synthesize every definition in order.
    ///
    /// # Errors
    ///
    /// Stops at the first definition that fails.
    pub fn synthesize_all(
        &mut self,
        defs: &[HandlerDefinition],
    ) -> Result<Vec<OperationSpec>, SynthesisError> {
        defs.iter().map(|def| self.synthesize(def)).collect()
    }

    #[must_use]
    pub fn names(&self) -> &NameAllocator {
        &self.names
    }
}
