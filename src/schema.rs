//! Declarative output schemas and their validation.
//!
//! An [`ObjectSchema`] is plain data: a list of [`Field`]s, each with a
//! [`FieldKind`], a nullable flag and optional guidance text. The same value
//! is interpreted two ways:
//!
//! - [`ObjectSchema::to_json_schema`] emits a strict JSON Schema for the
//!   provider's `response_format` or a tool's `parameters`.
//! - [`ObjectSchema::validate`] checks a returned `Value` against that JSON
//!   Schema with the `jsonschema` crate and reports the first violation.
//!
//! Every field is required. A field the model has no data for must be
//! present as `null`, which is only accepted when the field is nullable.
//!
//! ```
//! use llm_flows::schema::{Field, ObjectSchema};
//! use serde_json::json;
//!
//! let schema = ObjectSchema::new()
//!     .field(Field::string("title"))
//!     .field(Field::string("location").nullable());
//!
//! assert!(schema.validate(&json!({"title": "Standup", "location": null})).is_ok());
//! assert!(schema.validate(&json!({"title": "Standup"})).is_err());
//! ```

use jsonschema::error::{ValidationError, ValidationErrorKind};
use serde_json::{json, Map, Value};

/// Key under which array-framed output is wrapped on the wire.
///
/// Strict structured output requires an object at the root, so an array of
/// records travels as `{"elements": [...]}`.
pub const ARRAY_WRAPPER_KEY: &str = "elements";

/// Primitive or composite kind of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    /// A string restricted to a fixed set of values.
    Enum(Vec<String>),
    /// A homogeneous array; items are never nullable.
    Array(Box<FieldKind>),
    Object(ObjectSchema),
}

/// A single named field in an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Whether `null` is an accepted value. The field must still be present.
    pub nullable: bool,
    /// Free-text guidance forwarded to the model as the JSON Schema `description`.
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// A string field restricted to `values`.
    pub fn one_of(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Enum(values.iter().map(|v| v.to_string()).collect()),
        )
    }

    pub fn array_of(name: impl Into<String>, item: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(item)))
    }

    pub fn object(name: impl Into<String>, schema: ObjectSchema) -> Self {
        Self::new(name, FieldKind::Object(schema))
    }

    /// Accept `null` for this field.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attach guidance text for the model.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Whether a structured call expects one object or an array of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    Object,
    Array,
}

/// An object shape: ordered, uniquely named fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A field with the same name replaces the earlier one.
    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Emit a strict JSON Schema: all fields required, no extra properties.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                kind_schema(&field.kind, field.nullable, field.description.as_deref()),
            );
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validate `value` against this schema. Returns the first violation found.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        check(&self.to_json_schema(), value)
    }
}

/// The schema sent as the provider's `response_format` for a framed call.
pub fn response_schema(schema: &ObjectSchema, framing: Framing) -> Value {
    match framing {
        Framing::Object => schema.to_json_schema(),
        Framing::Array => json!({
            "type": "object",
            "properties": {
                ARRAY_WRAPPER_KEY: {
                    "type": "array",
                    "items": schema.to_json_schema(),
                },
            },
            "required": [ARRAY_WRAPPER_KEY],
            "additionalProperties": false,
        }),
    }
}

/// Validate framed output and strip the wire wrapper from array output.
///
/// A bare top-level array is accepted as well, since non-strict providers
/// sometimes skip the wrapper. Record paths are reported under the wrapper,
/// as in `$.elements[1].title`.
pub fn validate_framed(
    schema: &ObjectSchema,
    framing: Framing,
    value: Value,
) -> Result<Value, SchemaViolation> {
    match framing {
        Framing::Object => {
            schema.validate(&value)?;
            Ok(value)
        }
        Framing::Array => {
            let mut wrapped = match value {
                Value::Array(items) => json!({ ARRAY_WRAPPER_KEY: items }),
                other => other,
            };
            check(&response_schema(schema, framing), &wrapped)?;
            Ok(wrapped
                .get_mut(ARRAY_WRAPPER_KEY)
                .map(Value::take)
                .unwrap_or_default())
        }
    }
}

fn check(schema: &Value, value: &Value) -> Result<(), SchemaViolation> {
    let validator = jsonschema::validator_for(schema).map_err(|e| SchemaViolation::Invalid {
        path: "$".into(),
        message: format!("unusable schema: {}", e),
    })?;
    let result = match validator.iter_errors(value).next() {
        Some(error) => Err(SchemaViolation::from_error(&error)),
        None => Ok(()),
    };
    result
}

/// Why a value failed schema validation. `path` is a JSONPath-like locator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("{path}: required field is missing")]
    MissingField { path: String },

    #[error("{path}: field is not declared in the schema")]
    UnexpectedField { path: String },

    #[error("{path}: null is not allowed")]
    UnexpectedNull { path: String },

    #[error("{path}: {message}")]
    Invalid { path: String, message: String },

    #[error("{path}: {value:?} is not one of {allowed:?}")]
    NotInEnum {
        path: String,
        value: String,
        allowed: Vec<String>,
    },
}

impl SchemaViolation {
    pub fn path(&self) -> &str {
        match self {
            SchemaViolation::MissingField { path }
            | SchemaViolation::UnexpectedField { path }
            | SchemaViolation::UnexpectedNull { path }
            | SchemaViolation::Invalid { path, .. }
            | SchemaViolation::NotInEnum { path, .. } => path,
        }
    }

    fn from_error(error: &ValidationError<'_>) -> Self {
        let path = json_path(&error.instance_path.to_string());
        if error.instance.is_null() {
            return SchemaViolation::UnexpectedNull { path };
        }
        match &error.kind {
            ValidationErrorKind::Required { property } => SchemaViolation::MissingField {
                path: child_path(&path, property.as_str().unwrap_or_default()),
            },
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                SchemaViolation::UnexpectedField {
                    path: child_path(&path, unexpected.first().map(String::as_str).unwrap_or_default()),
                }
            }
            ValidationErrorKind::Enum { options } => SchemaViolation::NotInEnum {
                path,
                value: match error.instance.as_str() {
                    Some(s) => s.to_string(),
                    None => error.instance.to_string(),
                },
                allowed: options
                    .as_array()
                    .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default(),
            },
            _ => SchemaViolation::Invalid {
                path,
                message: error.to_string(),
            },
        }
    }
}

/// `/attendees/1` becomes `$.attendees[1]`.
fn json_path(pointer: &str) -> String {
    let mut path = String::from("$");
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if segment.parse::<usize>().is_ok() {
            path.push('[');
            path.push_str(&segment);
            path.push(']');
        } else {
            path = child_path(&path, &segment);
        }
    }
    path
}

fn child_path(parent: &str, name: &str) -> String {
    format!("{}.{}", parent, name)
}

fn kind_schema(kind: &FieldKind, nullable: bool, description: Option<&str>) -> Value {
    let mut schema = match kind {
        FieldKind::String => json!({"type": "string"}),
        FieldKind::Number => json!({"type": "number"}),
        FieldKind::Integer => json!({"type": "integer"}),
        FieldKind::Boolean => json!({"type": "boolean"}),
        FieldKind::Enum(values) => {
            let mut allowed: Vec<Value> = values.iter().map(|v| json!(v)).collect();
            if nullable {
                allowed.push(Value::Null);
            }
            json!({"type": "string", "enum": allowed})
        }
        FieldKind::Array(item) => json!({
            "type": "array",
            "items": kind_schema(item, false, None),
        }),
        FieldKind::Object(inner) => inner.to_json_schema(),
    };

    if nullable {
        if let Some(ty) = schema.get("type").and_then(|t| t.as_str()).map(str::to_string) {
            schema["type"] = json!([ty, "null"]);
        }
    }
    if let Some(text) = description {
        schema["description"] = json!(text);
    }
    schema
}
