//! What a handler receives when it is invoked.

use crate::arguments::{deserialize, extract, ArgumentSpec, BoundArgument};
use crate::context::ExecutionContext;
use crate::dataloader::{DataLoader, DataLoaders, LoaderKey};
use crate::error::ArgumentBindingError;
use crate::projection::Projection;
use crate::response::PathSegment;
use crate::schema::TypeRef;
use fieldbind_syntax::OperationType;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::hash::Hash;
use std::sync::Arc;

/// Low-level view of the field being resolved.
///
/// Gives handlers access to the raw arguments, the parent value, the field
/// path, the request context, the operation's variables and the request's
/// data loaders.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

struct EnvironmentInner {
    operation: OperationType,
    parent_type: String,
    field_name: String,
    return_type: TypeRef,
    arguments: Arc<Map<String, Value>>,
    source: Value,
    path: Vec<PathSegment>,
    context: ExecutionContext,
    variables: Arc<Map<String, Value>>,
    loaders: DataLoaders,
}

pub(crate) struct EnvironmentParts {
    pub(crate) operation: OperationType,
    pub(crate) parent_type: String,
    pub(crate) field_name: String,
    pub(crate) return_type: TypeRef,
    pub(crate) arguments: Map<String, Value>,
    pub(crate) source: Value,
    pub(crate) path: Vec<PathSegment>,
    pub(crate) context: ExecutionContext,
    pub(crate) variables: Arc<Map<String, Value>>,
    pub(crate) loaders: DataLoaders,
}

impl Environment {
    pub(crate) fn new(parts: EnvironmentParts) -> Self {
        Self {
            inner: Arc::new(EnvironmentInner {
                operation: parts.operation,
                parent_type: parts.parent_type,
                field_name: parts.field_name,
                return_type: parts.return_type,
                arguments: Arc::new(parts.arguments),
                source: parts.source,
                path: parts.path,
                context: parts.context,
                variables: parts.variables,
                loaders: parts.loaders,
            }),
        }
    }

    pub fn operation(&self) -> OperationType {
        self.inner.operation
    }

    pub fn parent_type(&self) -> &str {
        &self.inner.parent_type
    }

    pub fn field_name(&self) -> &str {
        &self.inner.field_name
    }

    pub fn return_type(&self) -> &TypeRef {
        &self.inner.return_type
    }

    /// Raw arguments after variable substitution and schema defaults.
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.inner.arguments
    }

    /// Reads a raw argument as `T` without coercion.
    pub fn argument<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.inner
            .arguments
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The parent value.
    pub fn source(&self) -> &Value {
        &self.inner.source
    }

    /// Response path of the field.
    pub fn path(&self) -> &[PathSegment] {
        &self.inner.path
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.inner.variables
    }

    /// The request's loader for `K -> V`, if one is registered.
    pub fn data_loader<K, V>(&self) -> Option<DataLoader<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.inner.loaders.get::<K, V>()
    }

    pub(crate) fn raw_arguments(&self) -> &Arc<Map<String, Value>> {
        &self.inner.arguments
    }

    pub(crate) fn erased_loader(&self, key: LoaderKey) -> Option<Arc<dyn Any + Send + Sync>> {
        self.inner.loaders.erased(key)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("parent_type", &self.inner.parent_type)
            .field("field_name", &self.inner.field_name)
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

/// Resolved parameters of one handler call, accessed by declaration index.
pub struct Invocation {
    specs: Arc<[ArgumentSpec]>,
    arguments: Vec<BoundArgument>,
    env: Environment,
}

impl Invocation {
    /// Resolves every parameter. Fails before the handler runs if any
    /// parameter cannot be bound.
    pub(crate) fn bind(specs: Arc<[ArgumentSpec]>, env: Environment) -> Result<Self, ArgumentBindingError> {
        let raw = Arc::clone(env.raw_arguments());
        let arguments = specs
            .iter()
            .map(|spec| extract(spec, &raw, &env))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            specs,
            arguments,
            env,
        })
    }

    /// Reads a scalar, object or source parameter as `T`.
    ///
    /// Absent optional parameters read as null, so they bind to `Option<T>`.
    pub fn argument<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgumentBindingError> {
        let name = self.label(index);
        match self.bound(index)? {
            BoundArgument::Value(value) => deserialize(&name, value.clone()),
            BoundArgument::Absent => deserialize(&name, Value::Null),
            BoundArgument::Projection(_)
            | BoundArgument::Context(_)
            | BoundArgument::Environment(_)
            | BoundArgument::Loader(_) => Err(ArgumentBindingError::Parameter {
                index,
                expected: BoundArgument::Absent.kind(),
            }),
        }
    }

    /// Reads a named parameter as `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentBindingError> {
        self.argument(self.index_of(name)?)
    }

    /// A projection parameter.
    pub fn projection(&self, index: usize) -> Result<&Projection, ArgumentBindingError> {
        match self.bound(index)? {
            BoundArgument::Projection(projection) => Ok(projection),
            BoundArgument::Absent => Err(ArgumentBindingError::Missing {
                name: self.label(index),
            }),
            _ => Err(ArgumentBindingError::Parameter {
                index,
                expected: "projection",
            }),
        }
    }

    /// A projection parameter that may be absent.
    pub fn optional_projection(&self, index: usize) -> Result<Option<&Projection>, ArgumentBindingError> {
        match self.bound(index)? {
            BoundArgument::Absent => Ok(None),
            _ => self.projection(index).map(Some),
        }
    }

    /// A context parameter.
    pub fn context(&self, index: usize) -> Result<&ExecutionContext, ArgumentBindingError> {
        match self.bound(index)? {
            BoundArgument::Context(context) => Ok(context),
            _ => Err(ArgumentBindingError::Parameter {
                index,
                expected: "context",
            }),
        }
    }

    /// A data loader parameter.
    pub fn data_loader<K, V>(&self, index: usize) -> Result<DataLoader<K, V>, ArgumentBindingError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.bound(index)? {
            BoundArgument::Loader(handle) => handle
                .downcast_ref::<DataLoader<K, V>>()
                .cloned()
                .ok_or(ArgumentBindingError::LoaderUnavailable {
                    key: std::any::type_name::<K>(),
                    value: std::any::type_name::<V>(),
                }),
            _ => Err(ArgumentBindingError::Parameter {
                index,
                expected: "data loader",
            }),
        }
    }

    /// The parent value as `T`.
    pub fn source<T: DeserializeOwned>(&self) -> Result<T, ArgumentBindingError> {
        deserialize("source", self.env.source().clone())
    }

    /// The field's environment. Available whether or not an environment
    /// parameter was declared.
    pub fn environment(&self) -> &Environment {
        match self.arguments.iter().find_map(|a| match a {
            BoundArgument::Environment(env) => Some(env),
            _ => None,
        }) {
            Some(env) => env,
            None => &self.env,
        }
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    fn bound(&self, index: usize) -> Result<&BoundArgument, ArgumentBindingError> {
        self.arguments.get(index).ok_or(ArgumentBindingError::Parameter {
            index,
            expected: "declared",
        })
    }

    fn index_of(&self, name: &str) -> Result<usize, ArgumentBindingError> {
        self.specs
            .iter()
            .position(|s| s.name() == Some(name))
            .ok_or_else(|| ArgumentBindingError::UnknownParameter {
                name: name.to_string(),
            })
    }

    fn label(&self, index: usize) -> String {
        self.specs
            .get(index)
            .and_then(|s| s.name().map(str::to_string))
            .unwrap_or_else(|| format!("#{index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::BatchLoaderRegistry;
    use crate::projection::AccessorTable;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn environment(arguments: Value, source: Value, registry: BatchLoaderRegistry) -> Environment {
        let context = ExecutionContext::new();
        Environment::new(EnvironmentParts {
            operation: OperationType::Query,
            parent_type: "Query".to_string(),
            field_name: "bookById".to_string(),
            return_type: TypeRef::from("Book"),
            arguments: match arguments {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            source,
            path: vec![PathSegment::Field("bookById".to_string())],
            context: context.clone(),
            variables: Arc::new(Map::new()),
            loaders: DataLoaders::new(Arc::new(registry), context, CancellationToken::new(), None),
        })
    }

    fn specs(specs: Vec<ArgumentSpec>) -> Arc<[ArgumentSpec]> {
        specs.into()
    }

    #[test]
    fn test_bind_by_index_and_name() {
        let env = environment(json!({"id": "1"}), json!({}), BatchLoaderRegistry::new());
        let invocation = Invocation::bind(
            specs(vec![ArgumentSpec::argument::<i64>("id"), ArgumentSpec::context()]),
            env,
        )
        .unwrap();

        assert_eq!(invocation.argument::<i64>(0).unwrap(), 1);
        assert_eq!(invocation.get::<i64>("id").unwrap(), 1);
        assert!(invocation.context(1).is_ok());
        assert!(matches!(
            invocation.argument::<i64>(1),
            Err(ArgumentBindingError::Parameter { index: 1, .. })
        ));
        assert!(matches!(
            invocation.get::<i64>("missing"),
            Err(ArgumentBindingError::UnknownParameter { .. })
        ));
        assert!(invocation.argument::<i64>(5).is_err());
    }

    #[test]
    fn test_bind_fails_before_invocation() {
        let env = environment(json!({"id": "abc"}), json!({}), BatchLoaderRegistry::new());
        let result = Invocation::bind(specs(vec![ArgumentSpec::argument::<i64>("id")]), env);
        assert!(matches!(result, Err(ArgumentBindingError::Coercion { .. })));
    }

    #[test]
    fn test_absent_optional_binds_to_none() {
        let env = environment(json!({}), json!({}), BatchLoaderRegistry::new());
        let invocation =
            Invocation::bind(specs(vec![ArgumentSpec::argument::<Option<i64>>("limit")]), env).unwrap();
        assert_eq!(invocation.argument::<Option<i64>>(0).unwrap(), None);
    }

    #[test]
    fn test_source_and_environment() {
        let env = environment(json!({"id": "7"}), json!({"authorId": 101}), BatchLoaderRegistry::new());
        let invocation = Invocation::bind(
            specs(vec![ArgumentSpec::source(), ArgumentSpec::environment()]),
            env,
        )
        .unwrap();

        assert_eq!(invocation.argument::<Value>(0).unwrap(), json!({"authorId": 101}));
        assert_eq!(invocation.source::<Value>().unwrap()["authorId"], json!(101));

        let env = invocation.environment();
        assert_eq!(env.field_name(), "bookById");
        assert_eq!(env.argument::<String>("id"), Some("7".to_string()));
        assert_eq!(env.path(), &[PathSegment::Field("bookById".to_string())]);
        assert_eq!(env.operation(), OperationType::Query);
    }

    #[test]
    fn test_projection_parameters() {
        let table = AccessorTable::new("BookProjection").accessor::<Option<String>>("author");
        let env = environment(
            json!({"author": "Orwell", "criteria": {"author": "Huxley"}}),
            json!({}),
            BatchLoaderRegistry::new(),
        );
        let invocation = Invocation::bind(
            specs(vec![
                ArgumentSpec::projection(table.clone()),
                ArgumentSpec::projected("criteria", table.clone()),
                ArgumentSpec::projected("other", table).optional(),
            ]),
            env,
        )
        .unwrap();

        let top = invocation.projection(0).unwrap();
        assert_eq!(top.get::<String>("author").unwrap(), "Orwell");
        let nested = invocation.projection(1).unwrap();
        assert_eq!(nested.get::<String>("author").unwrap(), "Huxley");
        assert!(invocation.optional_projection(2).unwrap().is_none());
        assert!(invocation.projection(2).is_err());
    }

    #[test]
    fn test_missing_required_projection() {
        let table = AccessorTable::new("BookProjection").accessor::<Option<String>>("author");
        let env = environment(json!({}), json!({}), BatchLoaderRegistry::new());
        let result = Invocation::bind(specs(vec![ArgumentSpec::projected("criteria", table)]), env);
        assert!(matches!(result, Err(ArgumentBindingError::Missing { .. })));
    }

    #[tokio::test]
    async fn test_loader_parameter() {
        let mut registry = BatchLoaderRegistry::new();
        registry
            .for_type_pair::<i64, String>()
            .register_batch_loader(|keys: Vec<i64>, _env| async move {
                Ok(keys.iter().map(|k| format!("author-{k}")).collect())
            })
            .unwrap();
        let env = environment(json!({}), json!({}), registry);
        let invocation = Invocation::bind(specs(vec![ArgumentSpec::data_loader::<i64, String>()]), env).unwrap();

        assert!(invocation.data_loader::<i64, String>(0).is_ok());
        assert!(invocation.data_loader::<String, String>(0).is_err());
        assert!(invocation.environment().data_loader::<i64, String>().is_some());
    }

    #[test]
    fn test_unregistered_loader_fails_binding() {
        let env = environment(json!({}), json!({}), BatchLoaderRegistry::new());
        let result = Invocation::bind(specs(vec![ArgumentSpec::data_loader::<i64, String>()]), env);
        assert!(matches!(result, Err(ArgumentBindingError::LoaderUnavailable { .. })));
    }
}
