//! Argument extraction and coercion.
//!
//! Each handler parameter is described by an [`ArgumentSpec`] fixed at
//! registration time. At dispatch each parameter is resolved against the field's
//! raw arguments (after variable substitution and schema defaults) into a
//! bound argument, coercing values into the declared [`TargetType`].

use crate::context::ExecutionContext;
use crate::dataloader::LoaderKey;
use crate::error::ArgumentBindingError;
use crate::invocation::Environment;
use crate::projection::{AccessorTable, Projection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;

/// Scalar kinds a raw value can be coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    Float,
    String,
    Boolean,
    /// Identifier, always represented as a string.
    Id,
}

impl ScalarKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Id => "ID",
        }
    }
}

/// The type a handler declared for a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetType {
    Scalar(ScalarKind),
    List(Box<TargetType>),
    Object(Arc<InputShape>),
    /// Raw JSON, passed through untouched.
    Any,
}

impl TargetType {
    pub fn list(inner: TargetType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Strips list wrappers.
    pub fn element(&self) -> &TargetType {
        match self {
            Self::List(inner) => inner.element(),
            other => other,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.as_str().to_string(),
            Self::List(inner) => format!("[{}]", inner.describe()),
            Self::Object(shape) => shape.name.clone(),
            Self::Any => "any value".to_string(),
        }
    }
}

impl From<InputShape> for TargetType {
    fn from(shape: InputShape) -> Self {
        Self::Object(Arc::new(shape))
    }
}

/// Declared fields of a structured input type.
#[derive(Debug, Clone, PartialEq)]
pub struct InputShape {
    pub name: String,
    pub fields: Vec<InputField>,
}

/// One declared field of an [`InputShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct InputField {
    pub name: String,
    pub ty: TargetType,
    pub required: bool,
}

impl InputShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declares a field typed as `T`. `Option<T>` fields are optional.
    pub fn field<T: InputType>(mut self, name: impl Into<String>) -> Self {
        self.fields.push(InputField {
            name: name.into(),
            ty: T::target(),
            required: T::required(),
        });
        self
    }
}

/// Types that can be bound from GraphQL input.
///
/// Implemented for the primitive types, `Option<T>`, `Vec<T>`, [`Id`] and
/// `serde_json::Value`. Input structs implement it by describing their
/// fields with an [`InputShape`]:
///
/// ```
/// use fieldbind_runtime::{InputShape, InputType, TargetType};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct BookCriteria {
///     author: Option<String>,
/// }
///
/// impl InputType for BookCriteria {
///     fn target() -> TargetType {
///         InputShape::new("BookCriteria")
///             .field::<Option<String>>("author")
///             .into()
///     }
/// }
/// ```
pub trait InputType: DeserializeOwned + Send + 'static {
    fn target() -> TargetType;

    /// Whether an absent value is an error.
    fn required() -> bool {
        true
    }
}

macro_rules! impl_scalar_input {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl InputType for $ty {
                fn target() -> TargetType {
                    TargetType::Scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

impl_scalar_input! {
    i8 => Int,
    i16 => Int,
    i32 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Long,
    i64 => Long,
    u64 => Long,
    usize => Long,
    f32 => Float,
    f64 => Float,
    String => String,
    bool => Boolean,
    Id => Id,
}

impl InputType for Value {
    fn target() -> TargetType {
        TargetType::Any
    }

    fn required() -> bool {
        false
    }
}

impl<T: InputType> InputType for Option<T> {
    fn target() -> TargetType {
        T::target()
    }

    fn required() -> bool {
        false
    }
}

impl<T: InputType> InputType for Vec<T> {
    fn target() -> TargetType {
        TargetType::list(T::target())
    }
}

/// A GraphQL `ID` value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Coerces a raw value into `target`. `name` is the dotted argument path
/// used in error messages.
pub fn coerce(name: &str, value: &Value, target: &TargetType) -> Result<Value, ArgumentBindingError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match target {
        TargetType::Any => Ok(value.clone()),
        TargetType::Scalar(kind) => coerce_scalar(name, value, *kind),
        TargetType::List(inner) => match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(&format!("{name}[{i}]"), item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce(name, single, inner)?])),
        },
        TargetType::Object(shape) => {
            let Value::Object(map) = value else {
                return Err(mismatch(name, &shape.name, value));
            };
            coerce_object(name, map, shape).map(Value::Object)
        }
    }
}

fn coerce_object(
    name: &str,
    raw: &Map<String, Value>,
    shape: &InputShape,
) -> Result<Map<String, Value>, ArgumentBindingError> {
    let mut object = Map::with_capacity(shape.fields.len());
    for field in &shape.fields {
        match raw.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(ArgumentBindingError::MissingField {
                    name: name.to_string(),
                    type_name: shape.name.clone(),
                    field: field.name.clone(),
                });
            }
            None => {}
            Some(value) => {
                let path = format!("{name}.{}", field.name);
                object.insert(field.name.clone(), coerce(&path, value, &field.ty)?);
            }
        }
    }
    Ok(object)
}

fn coerce_scalar(name: &str, value: &Value, kind: ScalarKind) -> Result<Value, ArgumentBindingError> {
    let coerced = match (kind, value) {
        (ScalarKind::Int | ScalarKind::Long, _) => integer(value).and_then(|n| {
            if kind == ScalarKind::Int && i32::try_from(n).is_err() {
                None
            } else {
                Some(Value::from(n))
            }
        }),
        (ScalarKind::Float, Value::Number(n)) => n.as_f64().map(Value::from),
        (ScalarKind::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::from),
        (ScalarKind::String, Value::String(_)) => Some(value.clone()),
        (ScalarKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ScalarKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ScalarKind::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ScalarKind::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ScalarKind::Id, Value::String(_)) => Some(value.clone()),
        (ScalarKind::Id, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            Some(Value::String(n.to_string()))
        }
        _ => None,
    };
    coerced.ok_or_else(|| mismatch(name, kind.as_str(), value))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn mismatch(name: &str, expected: &str, found: &Value) -> ArgumentBindingError {
    ArgumentBindingError::Coercion {
        name: name.to_string(),
        expected: expected.to_string(),
        found: describe_value(found),
    }
}

pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

/// How a parameter is resolved.
#[derive(Debug, Clone)]
pub enum ArgumentShape {
    /// A named argument coerced to a scalar or list type.
    Scalar(TargetType),
    /// A named input object argument.
    Object(Arc<InputShape>),
    /// An accessor view over the top-level arguments (unnamed) or a named
    /// object argument.
    Projection(Arc<AccessorTable>),
    /// The request's [`ExecutionContext`].
    Context,
    /// The field's [`Environment`].
    Environment,
    /// The parent value.
    Source,
    /// A typed [`DataLoader`](crate::DataLoader) handle.
    Loader(LoaderKey),
}

/// Coarse classification of an [`ArgumentShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    Scalar,
    Object,
    Projection,
    Context,
    Environment,
    Source,
    Loader,
}

impl ArgumentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Object => "object",
            Self::Projection => "projection",
            Self::Context => "context",
            Self::Environment => "environment",
            Self::Source => "source",
            Self::Loader => "data loader",
        }
    }
}

/// Registration-time description of one handler parameter.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub(crate) name: Option<String>,
    pub(crate) shape: ArgumentShape,
    pub(crate) required: bool,
}

impl ArgumentSpec {
    /// A named field argument bound as `T`.
    pub fn argument<T: InputType>(name: impl Into<String>) -> Self {
        let shape = match T::target() {
            TargetType::Object(shape) => ArgumentShape::Object(shape),
            target => ArgumentShape::Scalar(target),
        };
        Self {
            name: Some(name.into()),
            shape,
            required: T::required(),
        }
    }

    /// A projection over all of the field's arguments.
    pub fn projection(table: AccessorTable) -> Self {
        Self {
            name: None,
            shape: ArgumentShape::Projection(Arc::new(table)),
            required: false,
        }
    }

    /// A projection over the named object argument.
    pub fn projected(name: impl Into<String>, table: AccessorTable) -> Self {
        Self {
            name: Some(name.into()),
            shape: ArgumentShape::Projection(Arc::new(table)),
            required: true,
        }
    }

    pub fn context() -> Self {
        Self::unnamed(ArgumentShape::Context)
    }

    pub fn environment() -> Self {
        Self::unnamed(ArgumentShape::Environment)
    }

    pub fn source() -> Self {
        Self::unnamed(ArgumentShape::Source)
    }

    /// A data loader handle for the registered `K -> V` pair.
    pub fn data_loader<K: 'static, V: 'static>() -> Self {
        Self::unnamed(ArgumentShape::Loader(LoaderKey::of::<K, V>()))
    }

    fn unnamed(shape: ArgumentShape) -> Self {
        Self {
            name: None,
            shape,
            required: false,
        }
    }

    /// Marks a named parameter as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shape(&self) -> &ArgumentShape {
        &self.shape
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn kind(&self) -> ArgumentKind {
        match self.shape {
            ArgumentShape::Scalar(_) => ArgumentKind::Scalar,
            ArgumentShape::Object(_) => ArgumentKind::Object,
            ArgumentShape::Projection(_) => ArgumentKind::Projection,
            ArgumentShape::Context => ArgumentKind::Context,
            ArgumentShape::Environment => ArgumentKind::Environment,
            ArgumentShape::Source => ArgumentKind::Source,
            ArgumentShape::Loader(_) => ArgumentKind::Loader,
        }
    }
}

/// A parameter value resolved for one invocation.
#[derive(Clone)]
pub(crate) enum BoundArgument {
    Value(Value),
    Absent,
    Projection(Projection),
    Context(ExecutionContext),
    Environment(Environment),
    Loader(Arc<dyn Any + Send + Sync>),
}

impl BoundArgument {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) | Self::Absent => "value",
            Self::Projection(_) => "projection",
            Self::Context(_) => "context",
            Self::Environment(_) => "environment",
            Self::Loader(_) => "data loader",
        }
    }
}

/// Resolves one spec against the field's raw arguments.
pub(crate) fn extract(
    spec: &ArgumentSpec,
    raw: &Arc<Map<String, Value>>,
    env: &Environment,
) -> Result<BoundArgument, ArgumentBindingError> {
    match &spec.shape {
        ArgumentShape::Context => Ok(BoundArgument::Context(env.context().clone())),
        ArgumentShape::Environment => Ok(BoundArgument::Environment(env.clone())),
        ArgumentShape::Source => Ok(BoundArgument::Value(env.source().clone())),
        ArgumentShape::Loader(key) => env
            .erased_loader(*key)
            .map(BoundArgument::Loader)
            .ok_or(ArgumentBindingError::LoaderUnavailable {
                key: key.key_name,
                value: key.value_name,
            }),
        ArgumentShape::Projection(table) => match &spec.name {
            None => Ok(BoundArgument::Projection(Projection::new(
                Arc::clone(table),
                Arc::clone(raw),
            ))),
            Some(name) => match named(spec, name, raw)? {
                None => Ok(BoundArgument::Absent),
                Some(Value::Object(map)) => Ok(BoundArgument::Projection(Projection::new(
                    Arc::clone(table),
                    Arc::new(map.clone()),
                ))),
                Some(other) => Err(mismatch(name, table.type_name(), other)),
            },
        },
        ArgumentShape::Scalar(target) => bind_value(spec, raw, target),
        ArgumentShape::Object(shape) => {
            bind_value(spec, raw, &TargetType::Object(Arc::clone(shape)))
        }
    }
}

fn bind_value(
    spec: &ArgumentSpec,
    raw: &Map<String, Value>,
    target: &TargetType,
) -> Result<BoundArgument, ArgumentBindingError> {
    let Some(name) = &spec.name else {
        return Ok(BoundArgument::Absent);
    };
    match named(spec, name, raw)? {
        None => Ok(BoundArgument::Absent),
        Some(value) => coerce(name, value, target).map(BoundArgument::Value),
    }
}

/// Looks up a named argument, treating null as absent.
fn named<'a>(
    spec: &ArgumentSpec,
    name: &str,
    raw: &'a Map<String, Value>,
) -> Result<Option<&'a Value>, ArgumentBindingError> {
    match raw.get(name) {
        None | Some(Value::Null) if spec.required => Err(ArgumentBindingError::Missing {
            name: name.to_string(),
        }),
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value)),
    }
}

/// Deserializes a coerced value, mapping serde failures to binding errors.
pub(crate) fn deserialize<T: DeserializeOwned>(
    name: &str,
    value: Value,
) -> Result<T, ArgumentBindingError> {
    serde_json::from_value(value).map_err(|e| ArgumentBindingError::Deserialize {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct BookCriteria {
        author: Option<String>,
        year: Option<i32>,
    }

    impl InputType for BookCriteria {
        fn target() -> TargetType {
            InputShape::new("BookCriteria")
                .field::<Option<String>>("author")
                .field::<Option<i32>>("year")
                .into()
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct NewAuthor {
        first_name: String,
        tags: Vec<String>,
    }

    impl InputType for NewAuthor {
        fn target() -> TargetType {
            InputShape::new("NewAuthor")
                .field::<String>("first_name")
                .field::<Vec<String>>("tags")
                .into()
        }
    }

    #[test]
    fn test_string_to_numeric() {
        let target = i64::target();
        assert_eq!(coerce("id", &json!("1"), &target).unwrap(), json!(1));
        assert_eq!(coerce("id", &json!(" 42 "), &target).unwrap(), json!(42));
        assert_eq!(coerce("id", &json!(7.0), &target).unwrap(), json!(7));
        assert_eq!(
            coerce("price", &json!("2.5"), &f64::target()).unwrap(),
            json!(2.5)
        );
    }

    #[test]
    fn test_failed_coercion() {
        let err = coerce("id", &json!("abc"), &i64::target()).unwrap_err();
        assert_eq!(
            err,
            ArgumentBindingError::Coercion {
                name: "id".to_string(),
                expected: "Long".to_string(),
                found: "string \"abc\"".to_string(),
            }
        );
        assert!(coerce("n", &json!(3_000_000_000_i64), &i32::target()).is_err());
        assert!(coerce("n", &json!(1.5), &i64::target()).is_err());
        assert!(coerce("flag", &json!("yes"), &bool::target()).is_err());
    }

    #[test]
    fn test_identifier_coercion() {
        assert_eq!(coerce("id", &json!(99), &Id::target()).unwrap(), json!("99"));
        assert_eq!(coerce("id", &json!("a1"), &Id::target()).unwrap(), json!("a1"));
        assert!(coerce("id", &json!(true), &Id::target()).is_err());
    }

    #[test]
    fn test_single_value_becomes_list() {
        let target = Vec::<i64>::target();
        assert_eq!(coerce("ids", &json!("3"), &target).unwrap(), json!([3]));
        assert_eq!(coerce("ids", &json!([1, "2"]), &target).unwrap(), json!([1, 2]));

        let err = coerce("ids", &json!([1, "x"]), &target).unwrap_err();
        assert!(matches!(err, ArgumentBindingError::Coercion { name, .. } if name == "ids[1]"));
    }

    #[test]
    fn test_object_drops_unknown_and_keeps_missing_absent() {
        let value = coerce(
            "criteria",
            &json!({"author": "Orwell", "publisher": "Secker"}),
            &BookCriteria::target(),
        )
        .unwrap();
        assert_eq!(value, json!({"author": "Orwell"}));

        let criteria: BookCriteria = deserialize("criteria", value).unwrap();
        assert_eq!(
            criteria,
            BookCriteria {
                author: Some("Orwell".to_string()),
                year: None
            }
        );
    }

    #[test]
    fn test_object_coerces_nested_fields() {
        let value = coerce(
            "criteria",
            &json!({"year": "1949"}),
            &BookCriteria::target(),
        )
        .unwrap();
        assert_eq!(value, json!({"year": 1949}));
    }

    #[test]
    fn test_object_missing_required_field() {
        let err = coerce("author", &json!({"tags": []}), &NewAuthor::target()).unwrap_err();
        assert_eq!(
            err,
            ArgumentBindingError::MissingField {
                name: "author".to_string(),
                type_name: "NewAuthor".to_string(),
                field: "first_name".to_string(),
            }
        );

        let err = coerce("author", &json!("James"), &NewAuthor::target()).unwrap_err();
        assert!(matches!(err, ArgumentBindingError::Coercion { .. }));
    }

    #[test]
    fn test_spec_classification() {
        assert_eq!(ArgumentSpec::argument::<i64>("id").kind(), ArgumentKind::Scalar);
        assert!(ArgumentSpec::argument::<i64>("id").is_required());
        assert!(!ArgumentSpec::argument::<Option<i64>>("id").is_required());
        assert_eq!(
            ArgumentSpec::argument::<BookCriteria>("criteria").kind(),
            ArgumentKind::Object
        );
        assert_eq!(
            ArgumentSpec::argument::<Vec<BookCriteria>>("all").kind(),
            ArgumentKind::Scalar
        );
        assert_eq!(ArgumentSpec::context().kind(), ArgumentKind::Context);
        assert_eq!(ArgumentSpec::context().name(), None);
        assert_eq!(
            ArgumentSpec::data_loader::<i64, String>().kind(),
            ArgumentKind::Loader
        );
        assert!(!ArgumentSpec::argument::<i64>("id").optional().is_required());
    }

    #[test]
    fn test_bind_missing_required() {
        let spec = ArgumentSpec::argument::<i64>("id");
        let raw = Map::new();
        let err = bind_value(&spec, &raw, &i64::target()).err();
        assert_eq!(
            err,
            Some(ArgumentBindingError::Missing {
                name: "id".to_string()
            })
        );

        let spec = ArgumentSpec::argument::<Option<i64>>("id");
        assert!(matches!(
            bind_value(&spec, &raw, &i64::target()),
            Ok(BoundArgument::Absent)
        ));
    }
}
