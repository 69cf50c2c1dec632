//! Field bindings and the binding registry.
//!
//! A [`FieldBinding`] ties a schema coordinate to a handler and the ordered
//! list of its parameters. The [`BindingRegistry`] validates every binding
//! against the schema when it is built, so dispatch is a table lookup plus
//! an indexed call.

use crate::arguments::{ArgumentShape, ArgumentSpec, TargetType};
use crate::dataloader::BatchLoaderRegistry;
use crate::error::{HandlerResult, RegistrationError};
use crate::invocation::Invocation;
use crate::schema::{FieldDef, Schema, TypeDef, TypeRef};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What kind of field a handler is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Query,
    Mutation,
    Subscription,
    /// A field of a non-root object type.
    Field,
}

/// Shape of a binding's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    Scalar,
    List,
    Deferred,
    Stream,
}

/// A (type name, field name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaCoordinate {
    pub type_name: String,
    pub field_name: String,
}

impl SchemaCoordinate {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl std::fmt::Display for SchemaCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// The value a handler produced.
pub enum FieldResult {
    Value(Value),
    Future(BoxFuture<'static, HandlerResult<Value>>),
    Stream(BoxStream<'static, HandlerResult<Value>>),
}

impl std::fmt::Debug for FieldResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Future(_) => f.write_str("Future(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

pub(crate) type Handler = Arc<dyn Fn(Invocation) -> HandlerResult<FieldResult> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerStyle {
    Sync,
    Async,
    Stream,
}

/// A handler bound to a schema field.
#[derive(Clone)]
pub struct FieldBinding {
    kind: HandlerKind,
    type_name: Option<String>,
    field_name: String,
    arguments: Arc<[ArgumentSpec]>,
    style: HandlerStyle,
    returns_list: bool,
    handler: Handler,
}

impl FieldBinding {
    /// Starts a binding for a field of the query root type.
    pub fn query(field_name: impl Into<String>) -> BindingBuilder {
        BindingBuilder::new(HandlerKind::Query, None, field_name.into())
    }

    /// Starts a binding for a field of the mutation root type.
    pub fn mutation(field_name: impl Into<String>) -> BindingBuilder {
        BindingBuilder::new(HandlerKind::Mutation, None, field_name.into())
    }

    /// Starts a binding for a field of the subscription root type.
    pub fn subscription(field_name: impl Into<String>) -> BindingBuilder {
        BindingBuilder::new(HandlerKind::Subscription, None, field_name.into())
    }

    /// Starts a binding for a field of an object type.
    pub fn field(type_name: impl Into<String>, field_name: impl Into<String>) -> BindingBuilder {
        BindingBuilder::new(HandlerKind::Field, Some(type_name.into()), field_name.into())
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// The bound coordinate. Root bindings learn their type name when the
    /// registry is built.
    pub fn coordinate(&self) -> Option<SchemaCoordinate> {
        self.type_name
            .as_ref()
            .map(|t| SchemaCoordinate::new(t.clone(), self.field_name.clone()))
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    pub fn result_shape(&self) -> ResultShape {
        match self.style {
            HandlerStyle::Stream => ResultShape::Stream,
            HandlerStyle::Async => ResultShape::Deferred,
            HandlerStyle::Sync if self.returns_list => ResultShape::List,
            HandlerStyle::Sync => ResultShape::Scalar,
        }
    }

    pub(crate) fn specs(&self) -> Arc<[ArgumentSpec]> {
        Arc::clone(&self.arguments)
    }

    pub(crate) fn invoke(&self, invocation: Invocation) -> HandlerResult<FieldResult> {
        (self.handler)(invocation)
    }

    fn label(&self) -> String {
        match &self.type_name {
            Some(t) => format!("{t}.{}", self.field_name),
            None => format!("{:?}.{}", self.kind, self.field_name),
        }
    }
}

impl std::fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("coordinate", &self.label())
            .field("arguments", &self.arguments)
            .field("shape", &self.result_shape())
            .finish_non_exhaustive()
    }
}

/// Builder returned by the [`FieldBinding`] constructors.
pub struct BindingBuilder {
    kind: HandlerKind,
    type_name: Option<String>,
    field_name: String,
    arguments: Vec<ArgumentSpec>,
}

impl BindingBuilder {
    fn new(kind: HandlerKind, type_name: Option<String>, field_name: String) -> Self {
        Self {
            kind,
            type_name,
            field_name,
            arguments: Vec::new(),
        }
    }

    /// Declares the next handler parameter.
    pub fn argument(mut self, spec: ArgumentSpec) -> Self {
        self.arguments.push(spec);
        self
    }

    /// Binds a handler that returns its value immediately.
    pub fn resolve<F, T>(self, handler: F) -> FieldBinding
    where
        F: Fn(Invocation) -> HandlerResult<T> + Send + Sync + 'static,
        T: Serialize,
    {
        self.finish(
            HandlerStyle::Sync,
            Arc::new(move |invocation| {
                let value = handler(invocation)?;
                Ok(FieldResult::Value(serde_json::to_value(value)?))
            }),
        )
    }

    /// Binds a handler that returns a future.
    pub fn resolve_async<F, Fut, T>(self, handler: F) -> FieldBinding
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
        T: Serialize,
    {
        self.finish(
            HandlerStyle::Async,
            Arc::new(move |invocation| {
                let future = handler(invocation).map(|result| -> HandlerResult<Value> { Ok(serde_json::to_value(result?)?) });
                Ok(FieldResult::Future(future.boxed()))
            }),
        )
    }

    /// Binds a handler that returns a stream of values. Only valid for
    /// subscription root fields.
    pub fn resolve_stream<F, S, T>(self, handler: F) -> FieldBinding
    where
        F: Fn(Invocation) -> HandlerResult<S> + Send + Sync + 'static,
        S: Stream<Item = HandlerResult<T>> + Send + 'static,
        T: Serialize,
    {
        self.finish(
            HandlerStyle::Stream,
            Arc::new(move |invocation| {
                let stream = handler(invocation)?.map(|item| -> HandlerResult<Value> { Ok(serde_json::to_value(item?)?) });
                Ok(FieldResult::Stream(stream.boxed()))
            }),
        )
    }

    fn finish(self, style: HandlerStyle, handler: Handler) -> FieldBinding {
        FieldBinding {
            kind: self.kind,
            type_name: self.type_name,
            field_name: self.field_name,
            arguments: self.arguments.into(),
            style,
            returns_list: false,
            handler,
        }
    }
}

/// Validated bindings, keyed by coordinate.
#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: FxHashMap<String, FxHashMap<String, Arc<FieldBinding>>>,
}

impl BindingRegistry {
    /// Starts a registry for `schema`.
    pub fn builder(schema: Arc<Schema>) -> BindingRegistryBuilder {
        BindingRegistryBuilder {
            schema,
            bindings: Vec::new(),
        }
    }

    /// Looks up the binding of a field.
    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&Arc<FieldBinding>> {
        self.bindings.get(type_name)?.get(field_name)
    }

    pub fn len(&self) -> usize {
        self.bindings.values().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FieldBinding>> {
        self.bindings.values().flat_map(FxHashMap::values)
    }

    /// Checks that every data loader parameter refers to a registered loader.
    pub fn check_loaders(&self, loaders: &BatchLoaderRegistry) -> Result<(), RegistrationError> {
        for binding in self.iter() {
            for spec in binding.arguments() {
                if let ArgumentShape::Loader(key) = spec.shape() {
                    if !loaders.contains_key(*key) {
                        return Err(RegistrationError::MissingLoader {
                            coordinate: binding.label(),
                            key: key.key_name,
                            value: key.value_name,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Collects bindings and validates them on [`build`](Self::build).
pub struct BindingRegistryBuilder {
    schema: Arc<Schema>,
    bindings: Vec<FieldBinding>,
}

impl BindingRegistryBuilder {
    /// Adds a binding.
    pub fn bind(mut self, binding: FieldBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Validates every binding against the schema.
    pub fn build(self) -> Result<BindingRegistry, RegistrationError> {
        let schema = &self.schema;
        schema.check()?;

        let mut registry = BindingRegistry::default();
        for mut binding in self.bindings {
            let type_name = match binding.kind {
                HandlerKind::Field => binding.type_name.clone().unwrap_or_default(),
                HandlerKind::Query => root(schema.query_type.as_ref(), "query")?,
                HandlerKind::Mutation => root(schema.mutation_type.as_ref(), "mutation")?,
                HandlerKind::Subscription => root(schema.subscription_type.as_ref(), "subscription")?,
            };
            let coordinate = SchemaCoordinate::new(type_name.clone(), binding.field_name.clone());

            match schema.get_type(&type_name) {
                Some(TypeDef::Object(_)) => {}
                Some(_) => return Err(RegistrationError::NotAnObject { type_name }),
                None => return Err(RegistrationError::UnknownType { name: type_name }),
            }
            let field = schema
                .field(&type_name, &binding.field_name)
                .ok_or_else(|| RegistrationError::UnknownField {
                    coordinate: coordinate.to_string(),
                })?;

            let is_subscription_root = schema.subscription_type.as_deref() == Some(type_name.as_str());
            match (binding.style, is_subscription_root) {
                (HandlerStyle::Stream, false) => {
                    return Err(RegistrationError::StreamOutsideSubscription {
                        coordinate: coordinate.to_string(),
                    })
                }
                (HandlerStyle::Sync | HandlerStyle::Async, true) => {
                    return Err(RegistrationError::SubscriptionWithoutStream {
                        coordinate: coordinate.to_string(),
                    })
                }
                _ => {}
            }

            check_arguments(schema, &coordinate, field, binding.arguments())?;

            let slot = registry.bindings.entry(type_name.clone()).or_default();
            if slot.contains_key(&binding.field_name) {
                return Err(RegistrationError::DuplicateBinding {
                    coordinate: coordinate.to_string(),
                });
            }
            binding.type_name = Some(type_name);
            binding.returns_list = field.ty.is_list();
            slot.insert(binding.field_name.clone(), Arc::new(binding));
        }
        Ok(registry)
    }
}

fn root(name: Option<&String>, kind: &'static str) -> Result<String, RegistrationError> {
    name.cloned()
        .ok_or(RegistrationError::MissingRootType { kind })
}

fn check_arguments(
    schema: &Schema,
    coordinate: &SchemaCoordinate,
    field: &FieldDef,
    specs: &[ArgumentSpec],
) -> Result<(), RegistrationError> {
    let mut seen = FxHashSet::default();
    for spec in specs {
        let Some(name) = spec.name() else {
            if let ArgumentShape::Projection(table) = spec.shape() {
                for key in table.keys() {
                    if !field.arguments.contains_key(key) {
                        return Err(RegistrationError::UnknownAccessorKey {
                            coordinate: coordinate.to_string(),
                            projection: table.type_name().to_string(),
                            key: key.to_string(),
                        });
                    }
                }
            }
            continue;
        };

        if !seen.insert(name) {
            return Err(RegistrationError::AmbiguousParameter {
                coordinate: coordinate.to_string(),
                parameter: name.to_string(),
            });
        }
        let argument = field
            .arguments
            .get(name)
            .ok_or_else(|| RegistrationError::UnknownArgument {
                coordinate: coordinate.to_string(),
                argument: name.to_string(),
            })?;

        let mismatch = |expected: String| RegistrationError::ShapeMismatch {
            coordinate: coordinate.to_string(),
            parameter: name.to_string(),
            expected,
            found: argument.ty.to_string(),
        };

        match spec.shape() {
            ArgumentShape::Scalar(target) => check_target(schema, &argument.ty, target).map_err(mismatch)?,
            ArgumentShape::Object(shape) => {
                check_target(schema, &argument.ty, &TargetType::Object(Arc::clone(shape))).map_err(mismatch)?;
            }
            ArgumentShape::Projection(table) => {
                let input = match (&argument.ty, schema.input_object(argument.ty.named_type())) {
                    (ty, Some(input)) if !ty.is_list() => input,
                    _ => return Err(mismatch(table.type_name().to_string())),
                };
                for key in table.keys() {
                    if !input.fields.contains_key(key) {
                        return Err(RegistrationError::UnknownAccessorKey {
                            coordinate: coordinate.to_string(),
                            projection: table.type_name().to_string(),
                            key: key.to_string(),
                        });
                    }
                }
            }
            ArgumentShape::Context
            | ArgumentShape::Environment
            | ArgumentShape::Source
            | ArgumentShape::Loader(_) => {}
        }
    }
    Ok(())
}

/// Checks that a declared target can hold values of the schema type.
fn check_target(schema: &Schema, ty: &TypeRef, target: &TargetType) -> Result<(), String> {
    match (ty, target) {
        (_, TargetType::Any) => Ok(()),
        (TypeRef::NonNull(inner), _) => check_target(schema, inner, target),
        (TypeRef::List(inner), TargetType::List(element)) => check_target(schema, inner, element),
        (TypeRef::List(_), _) => Err(target.describe()),
        // A single value is accepted where a list is declared.
        (TypeRef::Named(_), TargetType::List(element)) => check_target(schema, ty, element),
        (TypeRef::Named(name), TargetType::Object(shape)) => match schema.input_object(name) {
            Some(input) => match shape.fields.iter().find(|f| !input.fields.contains_key(&f.name)) {
                Some(extra) => Err(format!("{} with field `{}`", shape.name, extra.name)),
                None => Ok(()),
            },
            None => Err(shape.name.clone()),
        },
        (TypeRef::Named(name), TargetType::Scalar(kind)) => match schema.get_type(name) {
            Some(def) if def.is_leaf() => Ok(()),
            _ => Err(kind.as_str().to_string()),
        },
    }
}
