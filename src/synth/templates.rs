use askama::Template;

/// One `Name: Type,` line of a shape declaration.
#[derive(Debug, Clone)]
pub struct FieldLine {
    pub name: String,
    pub ty: String,
}

/// One operation parameter with its binding attribute already rendered.
#[derive(Debug, Clone)]
pub struct ParamLine {
    /// e.g. `#[path]` or `#[query("page-size")]`
    pub attr: String,
    pub ident: String,
    pub ty: String,
}

/// One `Field = value,` initializer of the request object.
#[derive(Debug, Clone)]
pub struct AssignLine {
    pub field: String,
    pub value: String,
}

/// Carrier shape for body and form parameters.
#[derive(Template)]
#[template(
    source = "shape {{ name }} {
{%- for field in fields %}
    {{ field.name }}: {{ field.ty }},
{%- endfor %}
}
",
    ext = "txt",
    escape = "none"
)]
pub struct ShapeTemplateData {
    pub name: String,
    pub fields: Vec<FieldLine>,
}

/// Generated operation: route metadata, wire parameters, request construction
/// and the bridge call.
#[derive(Template)]
#[template(
    source = r#"#[http({{ method }}, "{{ route }}")]
#[produces({{ response_type }})]
{% if is_async %}async {% endif %}op {{ name }}(
{%- for param in params %}{% if !loop.first %}, {% endif %}{{ param.attr }} {{ param.ident }}: {{ param.ty }}{% endfor -%}
) -> {{ return_type }} {
    let {{ request_var }} = new {{ request_type }} {
{%- for assign in assignments %}
        {{ assign.field }} = {{ assign.value }},
{%- endfor %}
    };
    return {% if is_async %}await process_async{% else %}process{% endif %}::<{{ request_type }}, {{ response_type }}>({{ request_var }});
}
"#,
    ext = "txt",
    escape = "none"
)]
pub struct OperationTemplateData {
    pub method: String,
    /// Already escaped for a string literal
    pub route: String,
    pub is_async: bool,
    pub name: String,
    pub params: Vec<ParamLine>,
    pub return_type: String,
    pub request_type: String,
    pub response_type: String,
    pub request_var: String,
    pub assignments: Vec<AssignLine>,
}
