//! Operation execution.
//!
//! The executor turns a request into a [`RequestScope`], collects the
//! selected fields and resolves them against the binding registry. Every
//! resolution pass runs under [`DataLoaders::drive`], which flushes the
//! loader queues whenever the field tree stops making progress.

use crate::binding::{BindingRegistry, FieldBinding, FieldResult};
use crate::config::ExecutorConfig;
use crate::context::ExecutionContext;
use crate::dataloader::{BatchLoaderRegistry, DataLoaders};
use crate::error::{ExecutionError, HandlerError, HandlerResult, ResolveError, NON_NULL, OPERATION, PARSE};
use crate::invocation::{Environment, EnvironmentParts, Invocation};
use crate::request::ExecutionRequest;
use crate::response::{format_path, FieldError, PathSegment, Response};
use crate::schema::{FieldDef, Schema, TypeDef, TypeRef};
use fieldbind_syntax::{
    self as syntax, Directive, Document, Field, OperationDefinition, OperationType, Selection, SelectionSet,
};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info_span, warn, Instrument};

/// Fields of one selection set grouped by response key.
pub(crate) type GroupedFields<'a> = IndexMap<&'a str, Vec<&'a Field>>;

/// Marker for a null that must replace the nearest nullable ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NullPropagation;

/// Shared, immutable parts of a service.
pub(crate) struct Executor {
    pub(crate) schema: Arc<Schema>,
    pub(crate) bindings: Arc<BindingRegistry>,
    pub(crate) loaders: Arc<BatchLoaderRegistry>,
    pub(crate) config: Arc<ExecutorConfig>,
}

impl Executor {
    /// Executes a query or mutation.
    pub(crate) async fn execute(&self, request: ExecutionRequest) -> Response {
        let scope = match self.prepare(request) {
            Ok(scope) => scope,
            Err(response) => return response,
        };
        if scope.operation.operation == OperationType::Subscription {
            return request_error(ExecutionError::SubscriptionRequired, &scope.source);
        }
        let span = info_span!(
            "request",
            id = %scope.id,
            operation = %scope.operation.operation,
        );
        scope.run().instrument(span).await
    }

    /// Parses the document, selects the operation, runs the configure hooks
    /// and coerces variables.
    pub(crate) fn prepare(&self, request: ExecutionRequest) -> Result<RequestScope, Response> {
        let (input, cancel) = request.into_input();
        let source = input.document;

        let document = match syntax::parse(&source).into_result() {
            Ok(document) => document,
            Err(errors) => return Err(request_error(ExecutionError::Parse(errors), &source)),
        };
        let prepared = select_operation(&document, input.operation_name.as_deref()).and_then(|operation| {
            let root_type = self
                .schema
                .root_type(operation.operation)
                .ok_or(ExecutionError::UnsupportedOperation(operation.operation.as_str()))?;
            let variables = coerce_variables(operation, input.variables)?;
            Ok((operation.clone(), root_type.to_string(), variables))
        });
        let (operation, root_type, variables) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => return Err(request_error(error, &source)),
        };

        Ok(RequestScope {
            schema: Arc::clone(&self.schema),
            bindings: Arc::clone(&self.bindings),
            loader_registry: Arc::clone(&self.loaders),
            config: Arc::clone(&self.config),
            source,
            document,
            operation,
            root_type,
            variables: Arc::new(variables),
            context: input.context,
            id: input.id,
            cancel,
        })
    }
}

/// Everything one request needs, shared by all of its resolution passes.
pub(crate) struct RequestScope {
    pub(crate) schema: Arc<Schema>,
    pub(crate) bindings: Arc<BindingRegistry>,
    loader_registry: Arc<BatchLoaderRegistry>,
    pub(crate) config: Arc<ExecutorConfig>,
    pub(crate) source: String,
    document: Document,
    pub(crate) operation: OperationDefinition,
    pub(crate) root_type: String,
    pub(crate) variables: Arc<Map<String, Value>>,
    pub(crate) context: ExecutionContext,
    pub(crate) id: String,
    pub(crate) cancel: CancellationToken,
}

impl RequestScope {
    /// Fresh loader state. Dropping the last handle cancels its batches.
    pub(crate) fn loaders(&self) -> DataLoaders {
        DataLoaders::new(
            Arc::clone(&self.loader_registry),
            self.context.clone(),
            self.cancel.child_token(),
            self.config.max_batch_size,
        )
    }

    /// Resolves the operation's root selection set.
    pub(crate) async fn run(&self) -> Response {
        let state = ExecutionState::new(self, self.loaders());
        let fields = self.root_fields();
        let serial = self.operation.operation == OperationType::Mutation;
        let root = Arc::new(Value::Object(Map::new()));

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                return Response::error(FieldError::new("request was cancelled").with_code(OPERATION));
            }
            result = state.loaders.drive(execute_selection_set(
                &state,
                &self.root_type,
                root,
                fields,
                Vec::new(),
                serial,
            )) => result,
        };
        state.into_response(result.unwrap_or(Value::Null))
    }

    pub(crate) fn root_fields(&self) -> GroupedFields<'_> {
        let mut fields = GroupedFields::new();
        self.collect_fields(
            &self.root_type,
            &self.operation.selection_set,
            &mut fields,
            &mut FxHashSet::default(),
        );
        fields
    }

    /// Collects the fields selected on `object_type`, expanding fragments
    /// and honoring `@skip` and `@include`.
    fn collect_fields<'a>(
        &'a self,
        object_type: &str,
        selection_set: &'a SelectionSet,
        fields: &mut GroupedFields<'a>,
        visited: &mut FxHashSet<&'a str>,
    ) {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.included(&field.directives) {
                        fields.entry(field.response_key()).or_default().push(field);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives) || !visited.insert(spread.name.as_str()) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragment(spread.name.as_str()) else {
                        continue;
                    };
                    if self.schema.type_applies(fragment.type_condition.as_str(), object_type) {
                        self.collect_fields(object_type, &fragment.selection_set, fields, visited);
                    }
                }
                Selection::InlineFragment(inline) => {
                    if !self.included(&inline.directives) {
                        continue;
                    }
                    let applies = inline
                        .type_condition
                        .as_ref()
                        .map_or(true, |c| self.schema.type_applies(c.as_str(), object_type));
                    if applies {
                        self.collect_fields(object_type, &inline.selection_set, fields, visited);
                    }
                }
            }
        }
    }

    fn included(&self, directives: &[Directive]) -> bool {
        directives.iter().all(|directive| match directive.name.as_str() {
            "skip" => !self.condition(directive),
            "include" => self.condition(directive),
            _ => true,
        })
    }

    fn condition(&self, directive: &Directive) -> bool {
        directive
            .arguments
            .iter()
            .find(|a| a.name.as_str() == "if")
            .and_then(|a| literal(&a.value, &self.variables))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Raw arguments of a field: literals with variables substituted, then
    /// schema defaults for omitted arguments.
    pub(crate) fn field_arguments(&self, def: &FieldDef, field: &Field) -> Map<String, Value> {
        let mut arguments: Map<String, Value> = field
            .arguments
            .iter()
            .filter_map(|a| literal(&a.value, &self.variables).map(|v| (a.name.value.clone(), v)))
            .collect();
        for (name, input) in &def.arguments {
            if arguments.contains_key(name) {
                continue;
            }
            if let Some(default) = &input.default_value {
                arguments.insert(name.clone(), default.clone());
            }
        }
        arguments
    }

    fn location(&self, field: &Field) -> (usize, usize) {
        field.span.line_col(&self.source)
    }
}

/// Per-pass state: the pass's loaders and the errors it produced.
pub(crate) struct ExecutionState<'a> {
    pub(crate) scope: &'a RequestScope,
    pub(crate) loaders: DataLoaders,
    errors: Mutex<Vec<FieldError>>,
}

impl<'a> ExecutionState<'a> {
    pub(crate) fn new(scope: &'a RequestScope, loaders: DataLoaders) -> Self {
        Self {
            scope,
            loaders,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn into_response(self, data: Value) -> Response {
        let errors = self.errors.into_inner();
        Response {
            data: Some(data),
            errors: (!errors.is_empty()).then_some(errors),
        }
    }

    pub(crate) fn resolve_error(&self, error: &ResolveError, field: &Field, path: &[PathSegment]) {
        warn!(path = %format_path(path), code = error.code(), "{error}");
        self.record(error.to_string(), error.code(), field, path);
    }

    fn record(&self, message: String, code: &str, field: &Field, path: &[PathSegment]) {
        let (line, column) = self.scope.location(field);
        let error = FieldError::new(message)
            .with_location(line, column)
            .with_path(path.to_vec())
            .with_code(code);
        self.errors.lock().push(error);
    }

    /// True if an error was recorded at or below `path`.
    fn has_error_at(&self, path: &[PathSegment]) -> bool {
        self.errors
            .lock()
            .iter()
            .any(|e| e.path.as_deref().is_some_and(|p| p.starts_with(path)))
    }

    /// Binds the handler's parameters and calls it.
    pub(crate) fn invoke(
        &self,
        binding: &FieldBinding,
        parent_type: &str,
        def: &FieldDef,
        field: &Field,
        parent: &Value,
        path: &[PathSegment],
    ) -> HandlerResult<FieldResult> {
        let scope = self.scope;
        let env = Environment::new(EnvironmentParts {
            operation: scope.operation.operation,
            parent_type: parent_type.to_string(),
            field_name: def.name.clone(),
            return_type: def.ty.clone(),
            arguments: scope.field_arguments(def, field),
            source: parent.clone(),
            path: path.to_vec(),
            context: scope.context.clone(),
            variables: Arc::clone(&scope.variables),
            loaders: self.loaders.clone(),
        });
        let invocation = Invocation::bind(binding.specs(), env)?;
        debug!(
            parent_type,
            field = %def.name,
            path = %format_path(path),
            "dispatching field"
        );
        binding.invoke(invocation)
    }

    async fn settle(&self, result: FieldResult) -> HandlerResult<Value> {
        match result {
            FieldResult::Value(value) => Ok(value),
            FieldResult::Future(future) => match self.scope.config.field_timeout() {
                Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
                    ResolveError::from(HandlerError::new(format!(
                        "field timed out after {}ms",
                        limit.as_millis()
                    )))
                })?,
                None => future.await,
            },
            FieldResult::Stream(_) => Err(HandlerError::new(
                "stream results are only valid on subscription root fields",
            )
            .into()),
        }
    }
}

/// Resolves a grouped selection set against `parent`. Mutation roots run
/// their fields one after another.
pub(crate) fn execute_selection_set<'a>(
    state: &'a ExecutionState<'a>,
    object_type: &'a str,
    parent: Arc<Value>,
    fields: GroupedFields<'a>,
    path: Vec<PathSegment>,
    serial: bool,
) -> BoxFuture<'a, Result<Value, NullPropagation>> {
    async move {
        let mut data = Map::with_capacity(fields.len());
        if serial {
            for (key, group) in fields {
                let field_path = child_path(&path, PathSegment::Field(key.to_string()));
                let value = resolve_field(state, object_type, Arc::clone(&parent), group, field_path).await?;
                data.insert(key.to_string(), value);
            }
        } else {
            let keys: Vec<&str> = fields.keys().copied().collect();
            let pending = fields.into_iter().map(|(key, group)| {
                let field_path = child_path(&path, PathSegment::Field(key.to_string()));
                resolve_field(state, object_type, Arc::clone(&parent), group, field_path)
            });
            let results = join_all(pending).await;
            for (key, result) in keys.into_iter().zip(results) {
                data.insert(key.to_string(), result?);
            }
        }
        Ok(Value::Object(data))
    }
    .boxed()
}

/// Resolves one response key: dispatches to the bound handler or the
/// default resolver, then completes the value.
fn resolve_field<'a>(
    state: &'a ExecutionState<'a>,
    parent_type: &'a str,
    parent: Arc<Value>,
    fields: Vec<&'a Field>,
    path: Vec<PathSegment>,
) -> BoxFuture<'a, Result<Value, NullPropagation>> {
    async move {
        let Some(&field) = fields.first() else {
            return Ok(Value::Null);
        };
        let name = field.name.as_str();
        if name == "__typename" {
            return Ok(Value::String(parent_type.to_string()));
        }

        let scope = state.scope;
        let Some(def) = scope.schema.field(parent_type, name) else {
            state.record(
                format!("type `{parent_type}` has no field `{name}`"),
                OPERATION,
                field,
                &path,
            );
            return Ok(Value::Null);
        };

        let depth = path.iter().filter(|s| matches!(s, PathSegment::Field(_))).count();
        if depth > scope.config.max_depth {
            state.record(
                format!("field exceeds the maximum depth of {}", scope.config.max_depth),
                OPERATION,
                field,
                &path,
            );
            return null_for(&def.ty);
        }

        let resolved = match scope.bindings.get(parent_type, name) {
            Some(binding) => {
                let call = async {
                    match state.invoke(binding, parent_type, def, field, &parent, &path) {
                        Ok(result) => state.settle(result).await,
                        Err(error) => Err(error),
                    }
                };
                if scope.config.tracing {
                    let span = debug_span!("field", path = %format_path(&path));
                    call.instrument(span).await
                } else {
                    call.await
                }
            }
            None => Ok(default_resolve(&parent, name)),
        };

        match resolved {
            Ok(value) => complete_value(state, &def.ty, fields, value, path).await,
            Err(error) => {
                state.resolve_error(&error, field, &path);
                null_for(&def.ty)
            }
        }
    }
    .boxed()
}

pub(crate) fn null_for(ty: &TypeRef) -> Result<Value, NullPropagation> {
    if ty.is_non_null() {
        Err(NullPropagation)
    } else {
        Ok(Value::Null)
    }
}

/// Completes a resolved value against its schema type.
pub(crate) fn complete_value<'a>(
    state: &'a ExecutionState<'a>,
    ty: &'a TypeRef,
    fields: Vec<&'a Field>,
    value: Value,
    path: Vec<PathSegment>,
) -> BoxFuture<'a, Result<Value, NullPropagation>> {
    async move {
        match ty {
            TypeRef::NonNull(inner) => {
                let completed = complete_value(state, inner, fields.clone(), value, path.clone()).await?;
                if !completed.is_null() {
                    return Ok(completed);
                }
                if !state.has_error_at(&path) {
                    if let Some(field) = fields.first() {
                        state.record(
                            format!("non-null field `{}` resolved to null", format_path(&path)),
                            NON_NULL,
                            field,
                            &path,
                        );
                    }
                }
                Err(NullPropagation)
            }
            _ if value.is_null() => Ok(Value::Null),
            TypeRef::List(inner) => {
                let Value::Array(items) = value else {
                    if let Some(field) = fields.first() {
                        state.record(
                            format!("expected a list at `{}`", format_path(&path)),
                            OPERATION,
                            field,
                            &path,
                        );
                    }
                    return Ok(Value::Null);
                };
                let pending = items.into_iter().enumerate().map(|(index, item)| {
                    let item_path = child_path(&path, PathSegment::Index(index));
                    complete_value(state, inner, fields.clone(), item, item_path)
                });
                let completed = join_all(pending)
                    .await
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>();
                Ok(completed.map_or(Value::Null, Value::Array))
            }
            TypeRef::Named(name) => match state.scope.schema.get_type(name) {
                Some(TypeDef::Object(object)) => complete_object(state, &object.name, &fields, value, path).await,
                Some(def) if def.is_abstract() => {
                    let concrete = value
                        .get("__typename")
                        .and_then(Value::as_str)
                        .and_then(|t| state.scope.schema.get_type(t))
                        .filter(|t| matches!(t, TypeDef::Object(_)) && state.scope.schema.type_applies(def.name(), t.name()));
                    match (concrete, fields.first()) {
                        (Some(object), _) => complete_object(state, object.name(), &fields, value, path).await,
                        (None, Some(field)) => {
                            state.record(
                                format!("could not resolve the object type of abstract type `{}`", def.name()),
                                OPERATION,
                                field,
                                &path,
                            );
                            Ok(Value::Null)
                        }
                        (None, None) => Ok(Value::Null),
                    }
                }
                _ => Ok(value),
            },
        }
    }
    .boxed()
}

async fn complete_object<'a>(
    state: &'a ExecutionState<'a>,
    object_type: &'a str,
    fields: &[&'a Field],
    value: Value,
    path: Vec<PathSegment>,
) -> Result<Value, NullPropagation> {
    let mut grouped = GroupedFields::new();
    let mut visited = FxHashSet::default();
    for field in fields {
        if let Some(selection_set) = &field.selection_set {
            state
                .scope
                .collect_fields(object_type, selection_set, &mut grouped, &mut visited);
        }
    }
    if grouped.is_empty() {
        return Ok(value);
    }
    execute_selection_set(state, object_type, Arc::new(value), grouped, path, false).await
}

fn child_path(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment);
    child
}

/// Reads `name` from the parent object, falling back to its snake_case form.
fn default_resolve(parent: &Value, name: &str) -> Value {
    let Value::Object(map) = parent else {
        return Value::Null;
    };
    map.get(name)
        .or_else(|| map.get(&to_snake_case(name)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.char_indices() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts an argument literal, substituting variables. Returns `None` for
/// a variable that was not provided.
pub(crate) fn literal(value: &syntax::Value, variables: &Map<String, Value>) -> Option<Value> {
    Some(match value {
        syntax::Value::Variable(name) => return variables.get(name.as_str()).cloned(),
        syntax::Value::Int(i, _) => Value::from(*i),
        syntax::Value::Float(f, _) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        syntax::Value::String(s, _) => Value::String(s.clone()),
        syntax::Value::Boolean(b, _) => Value::Bool(*b),
        syntax::Value::Null(_) => Value::Null,
        syntax::Value::Enum(name) => Value::String(name.value.clone()),
        syntax::Value::List(items, _) => Value::Array(
            items
                .iter()
                .map(|item| literal(item, variables).unwrap_or(Value::Null))
                .collect(),
        ),
        syntax::Value::Object(entries, _) => Value::Object(
            entries
                .iter()
                .filter_map(|(name, v)| literal(v, variables).map(|v| (name.value.clone(), v)))
                .collect(),
        ),
    })
}

fn select_operation<'d>(
    document: &'d Document,
    name: Option<&str>,
) -> Result<&'d OperationDefinition, ExecutionError> {
    if let Some(name) = name {
        return document
            .operations()
            .find(|op| op.name.as_ref().is_some_and(|n| n.as_str() == name))
            .ok_or_else(|| ExecutionError::UnknownOperation(name.to_string()));
    }
    let mut operations = document.operations();
    let first = operations.next().ok_or(ExecutionError::NoOperation)?;
    if operations.next().is_some() {
        return Err(ExecutionError::AmbiguousOperation);
    }
    Ok(first)
}

/// Applies operation defaults to variables that were not provided.
fn coerce_variables(
    operation: &OperationDefinition,
    mut provided: Map<String, Value>,
) -> Result<Map<String, Value>, ExecutionError> {
    let empty = Map::new();
    for definition in &operation.variables {
        let name = definition.name.as_str();
        if provided.contains_key(name) {
            continue;
        }
        if let Some(default) = definition.default_value.as_ref().and_then(|d| literal(d, &empty)) {
            provided.insert(name.to_string(), default);
        } else if matches!(definition.ty, syntax::Type::NonNull(..)) {
            return Err(ExecutionError::MissingVariable(name.to_string()));
        }
    }
    Ok(provided)
}

/// A response for a request that failed before any field ran.
pub(crate) fn request_error(error: ExecutionError, source: &str) -> Response {
    match error {
        ExecutionError::Parse(errors) => Response::errors(
            errors
                .iter()
                .map(|e| {
                    let (line, column) = e.span.line_col(source);
                    FieldError::new(e.message.clone())
                        .with_location(line, column)
                        .with_code(PARSE)
                })
                .collect(),
        ),
        other => {
            warn!(error = %other, "request rejected");
            Response::error(FieldError::new(other.to_string()).with_code(other.code()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(source: &str) -> Document {
        syntax::parse(source).into_result().unwrap()
    }

    #[test]
    fn test_default_resolve_falls_back_to_snake_case() {
        let parent = json!({"firstName": "George", "last_name": "Orwell"});
        assert_eq!(default_resolve(&parent, "firstName"), json!("George"));
        assert_eq!(default_resolve(&parent, "lastName"), json!("Orwell"));
        assert_eq!(default_resolve(&parent, "missing"), Value::Null);
        assert_eq!(default_resolve(&json!(3), "id"), Value::Null);
        assert_eq!(to_snake_case("bookById"), "book_by_id");
    }

    #[test]
    fn test_literal_substitutes_variables() {
        let document = parse(r#"{ a(x: $id, list: [1, $missing], obj: {k: $id, gone: $missing}, e: RED, f: 1.5) }"#);
        let Some(syntax::Definition::Operation(op)) = document.definitions.first() else {
            panic!("expected an operation");
        };
        let Some(Selection::Field(field)) = op.selection_set.selections.first() else {
            panic!("expected a field");
        };
        let variables: Map<String, Value> = json!({"id": "1"}).as_object().cloned().unwrap();
        let values: Vec<Option<Value>> = field
            .arguments
            .iter()
            .map(|a| literal(&a.value, &variables))
            .collect();
        assert_eq!(
            values,
            vec![
                Some(json!("1")),
                Some(json!([1, null])),
                Some(json!({"k": "1"})),
                Some(json!("RED")),
                Some(json!(1.5)),
            ]
        );
        assert_eq!(literal(&syntax::Value::Variable(syntax::Name::new("nope", syntax::Span::default())), &variables), None);
    }

    #[test]
    fn test_select_operation() {
        let document = parse("query A { a } query B { b }");
        assert_eq!(
            select_operation(&document, Some("B")).unwrap().name.as_ref().unwrap().as_str(),
            "B"
        );
        assert_eq!(
            select_operation(&document, None).unwrap_err(),
            ExecutionError::AmbiguousOperation
        );
        assert_eq!(
            select_operation(&document, Some("C")).unwrap_err(),
            ExecutionError::UnknownOperation("C".into())
        );
        assert!(select_operation(&parse("{ a }"), None).is_ok());
        assert_eq!(
            select_operation(&parse("fragment F on Book { id }"), None).unwrap_err(),
            ExecutionError::NoOperation
        );
    }

    #[test]
    fn test_coerce_variables() {
        let document = parse("query Q($id: ID!, $limit: Int = 10, $after: String) { a }");
        let op = select_operation(&document, None).unwrap();

        let err = coerce_variables(op, Map::new()).unwrap_err();
        assert_eq!(err, ExecutionError::MissingVariable("id".into()));

        let provided = json!({"id": "1"}).as_object().cloned().unwrap();
        let variables = coerce_variables(op, provided).unwrap();
        assert_eq!(variables.get("limit"), Some(&json!(10)));
        assert!(!variables.contains_key("after"));
    }

    #[test]
    fn test_parse_errors_carry_locations() {
        let response = request_error(
            ExecutionError::Parse(vec![fieldbind_syntax::SyntaxError::new(
                "unexpected token",
                syntax::Span::new(4, 5),
            )]),
            "{\n  }",
        );
        assert!(response.data.is_none());
        let error = &response.field_errors()[0];
        assert_eq!(error.code(), Some(PARSE));
        assert_eq!(error.locations.as_ref().unwrap()[0].line, 2);
    }
}
