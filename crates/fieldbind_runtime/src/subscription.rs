//! Subscription execution.
//!
//! The root field's handler returns a stream. Every element runs through the
//! regular completion pipeline as a fresh root value, with its own loader
//! state, and produces one response. Responses are delivered in emission
//! order even when several elements are prepared at once.

use crate::binding::FieldResult;
use crate::error::{ExecutionError, HandlerResult};
use crate::executor::{complete_value, null_for, request_error, ExecutionState, Executor, NullPropagation, RequestScope};
use crate::request::ExecutionRequest;
use crate::response::{PathSegment, Response, ResponseStream};
use fieldbind_syntax::OperationType;
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

impl Executor {
    /// Starts a subscription. Queries and mutations yield a single response.
    pub(crate) fn subscribe(&self, request: ExecutionRequest) -> ResponseStream {
        let scope = match self.prepare(request) {
            Ok(scope) => Arc::new(scope),
            Err(response) => return stream::once(future::ready(response)).boxed(),
        };
        let span = info_span!(
            "request",
            id = %scope.id,
            operation = %scope.operation.operation,
        );

        if scope.operation.operation != OperationType::Subscription {
            let run = async move { scope.run().await };
            return stream::once(run.instrument(span)).boxed();
        }

        let source = match span.in_scope(|| scope.source_stream()) {
            Ok(source) => source,
            Err(response) => return stream::once(future::ready(response)).boxed(),
        };

        let cancel = scope.cancel.clone();
        let buffer = scope.config.subscription_buffer.max(1);
        source
            .map(move |item| {
                let scope = Arc::clone(&scope);
                async move { scope.event_response(item).await }.instrument(span.clone())
            })
            .buffered(buffer)
            .take_until(async move { cancel.cancelled().await })
            .boxed()
    }
}

impl RequestScope {
    /// Calls the subscription root handler and returns its element stream.
    fn source_stream(&self) -> Result<BoxStream<'static, HandlerResult<Value>>, Response> {
        let fields = self.root_fields();
        if fields.len() != 1 {
            return Err(request_error(ExecutionError::SubscriptionRootCount, &self.source));
        }
        let Some((key, group)) = fields.into_iter().next() else {
            return Err(request_error(ExecutionError::SubscriptionRootCount, &self.source));
        };
        let Some(&field) = group.first() else {
            return Err(request_error(ExecutionError::SubscriptionRootCount, &self.source));
        };
        let name = field.name.as_str();
        let not_a_stream = || request_error(ExecutionError::NotAStream(name.to_string()), &self.source);
        let (Some(def), Some(binding)) = (
            self.schema.field(&self.root_type, name),
            self.bindings.get(&self.root_type, name),
        ) else {
            return Err(not_a_stream());
        };

        let state = ExecutionState::new(self, self.loaders());
        let path = vec![PathSegment::Field(key.to_string())];
        match state.invoke(binding, &self.root_type, def, field, &Value::Object(Map::new()), &path) {
            Ok(FieldResult::Stream(stream)) => {
                debug!(field = name, "subscription stream opened");
                Ok(state.loaders.drive_stream(stream))
            }
            Ok(FieldResult::Value(_) | FieldResult::Future(_)) => Err(not_a_stream()),
            Err(error) => {
                state.resolve_error(&error, field, &path);
                let data = match null_for(&def.ty) {
                    Ok(null) => Value::Object(Map::from_iter([(key.to_string(), null)])),
                    Err(NullPropagation) => Value::Null,
                };
                Err(state.into_response(data))
            }
        }
    }

    /// Completes one stream element as if it were the root field's value.
    async fn event_response(&self, item: HandlerResult<Value>) -> Response {
        let state = ExecutionState::new(self, self.loaders());
        let fields = self.root_fields();
        let Some((key, group)) = fields.into_iter().next() else {
            return state.into_response(Value::Null);
        };
        let (Some(&field), Some(def)) = (
            group.first(),
            group.first().and_then(|f| self.schema.field(&self.root_type, f.name.as_str())),
        ) else {
            return state.into_response(Value::Null);
        };
        let path = vec![PathSegment::Field(key.to_string())];

        let completed = match item {
            Ok(value) => {
                state
                    .loaders
                    .drive(complete_value(&state, &def.ty, group, value, path))
                    .await
            }
            Err(error) => {
                state.resolve_error(&error, field, &path);
                null_for(&def.ty)
            }
        };
        let data = match completed {
            Ok(value) => Value::Object(Map::from_iter([(key.to_string(), value)])),
            Err(NullPropagation) => Value::Null,
        };
        state.into_response(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingRegistry, FieldBinding};
    use crate::config::ExecutorConfig;
    use crate::dataloader::BatchLoaderRegistry;
    use crate::arguments::ArgumentSpec;
    use crate::error::{HandlerError, ResolveError, OPERATION};
    use std::time::Duration;
    use crate::schema::{FieldDef, ObjectDef, SchemaBuilder};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn executor() -> Executor {
        let schema = Arc::new(
            SchemaBuilder::new()
                .query_type("Query")
                .subscription_type("Subscription")
                .add_type(ObjectDef::new("Query").field(FieldDef::new("ping", "String")))
                .add_type(
                    ObjectDef::new("Subscription")
                        .field(FieldDef::new("ticks", "Int!"))
                        .field(FieldDef::new("failing", "Int"))
                        .field(FieldDef::new("forever", "Int"))
                        .field(FieldDef::new("names", "String")),
                )
                .build(),
        );
        let bindings = BindingRegistry::builder(Arc::clone(&schema))
            .bind(FieldBinding::query("ping").resolve(|_| Ok("pong")))
            .bind(FieldBinding::subscription("ticks").resolve_stream(|_| {
                let items: Vec<HandlerResult<i64>> = vec![Ok(1), Err(HandlerError::new("skipped").into()), Ok(3)];
                Ok(stream::iter(items))
            }))
            .bind(
                FieldBinding::subscription("failing")
                    .resolve_stream(|_| Err::<stream::Empty<HandlerResult<i64>>, _>(HandlerError::new("closed").into())),
            )
            .bind(
                FieldBinding::subscription("forever")
                    .resolve_stream(|_| Ok(stream::pending::<HandlerResult<i64>>())),
            )
            .bind(
                FieldBinding::subscription("names")
                    .argument(ArgumentSpec::data_loader::<i64, String>())
                    .resolve_stream(|inv| {
                        let loader = inv.data_loader::<i64, String>(0)?;
                        Ok(stream::iter([1, 2, 1]).then(move |id| {
                            let load = loader.load(id);
                            async move { Ok::<_, ResolveError>(load.await?) }
                        }))
                    }),
            )
            .build()
            .unwrap();

        let mut loaders = BatchLoaderRegistry::new();
        loaders
            .for_type_pair::<i64, String>()
            .register_batch_loader(|ids: Vec<i64>, _env| async move {
                Ok(ids.iter().map(|id| format!("name-{id}")).collect())
            })
            .unwrap();
        Executor {
            schema,
            bindings: Arc::new(bindings),
            loaders: Arc::new(loaders),
            config: Arc::new(ExecutorConfig::default()),
        }
    }

    #[tokio::test]
    async fn test_one_response_per_element() {
        let responses: Vec<Response> = executor()
            .subscribe(ExecutionRequest::new("subscription { ticks }"))
            .collect()
            .await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].data, Some(json!({"ticks": 1})));
        assert_eq!(responses[1].data, Some(Value::Null));
        assert_eq!(responses[1].field_errors()[0].message, "skipped");
        assert_eq!(responses[2].data, Some(json!({"ticks": 3})));
        assert!(!responses[2].has_errors());
    }

    #[tokio::test]
    async fn test_handler_failure_ends_stream() {
        let responses: Vec<Response> = executor()
            .subscribe(ExecutionRequest::new("subscription { failing }"))
            .collect()
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].data, Some(json!({"failing": null})));
        assert_eq!(responses[0].field_errors()[0].message, "closed");
    }

    #[tokio::test]
    async fn test_root_field_count() {
        let responses: Vec<Response> = executor()
            .subscribe(ExecutionRequest::new("subscription { ticks failing }"))
            .collect()
            .await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0].data.is_none());
        assert_eq!(responses[0].field_errors()[0].code(), Some(OPERATION));
    }

    #[tokio::test]
    async fn test_query_through_subscribe() {
        let responses: Vec<Response> = executor()
            .subscribe(ExecutionRequest::new("{ ping }"))
            .collect()
            .await;
        assert_eq!(responses, vec![Response::data(json!({"ping": "pong"}))]);
    }

    #[tokio::test]
    async fn test_cancellation_ends_stream() {
        let token = CancellationToken::new();
        let mut stream = executor().subscribe(
            ExecutionRequest::new("subscription { forever }").cancellation_token(token.clone()),
        );
        token.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_execute_rejects_subscriptions() {
        let response = executor()
            .execute(ExecutionRequest::new("subscription { ticks }"))
            .await;
        assert!(response.data.is_none());
        assert_eq!(response.field_errors()[0].code(), Some(OPERATION));
    }

    #[tokio::test]
    async fn test_loads_inside_root_stream_settle() {
        let responses: Vec<Response> = tokio::time::timeout(
            Duration::from_secs(2),
            executor()
                .subscribe(ExecutionRequest::new("subscription { names }"))
                .collect(),
        )
        .await
        .unwrap();
        assert_eq!(
            responses.iter().map(|r| r.data.clone()).collect::<Vec<_>>(),
            vec![
                Some(json!({"names": "name-1"})),
                Some(json!({"names": "name-2"})),
                Some(json!({"names": "name-1"})),
            ]
        );
    }
}
