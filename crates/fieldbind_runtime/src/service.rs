//! The service façade.

use crate::binding::{BindingRegistry, FieldBinding};
use crate::config::ExecutorConfig;
use crate::dataloader::BatchLoaderRegistry;
use crate::error::RegistrationError;
use crate::executor::Executor;
use crate::request::ExecutionRequest;
use crate::response::{Response, ResponseStream};
use crate::schema::Schema;
use std::sync::Arc;
use tracing::info;

/// Executes operations against a schema and its bindings.
///
/// Cheap to clone; clones share the schema, bindings and loader registry.
#[derive(Clone)]
pub struct GraphQlService {
    executor: Arc<Executor>,
}

impl GraphQlService {
    /// Starts building a service for `schema`.
    pub fn builder(schema: Schema) -> ServiceBuilder {
        ServiceBuilder {
            schema,
            bindings: Vec::new(),
            loaders: BatchLoaderRegistry::new(),
            config: ExecutorConfig::default(),
        }
    }

    /// Executes a query or mutation.
    pub async fn execute(&self, request: ExecutionRequest) -> Response {
        self.executor.execute(request).await
    }

    /// Starts a subscription, producing one response per element.
    ///
    /// Queries and mutations produce a single response.
    pub fn subscribe(&self, request: ExecutionRequest) -> ResponseStream {
        self.executor.subscribe(request)
    }

    pub fn schema(&self) -> &Schema {
        &self.executor.schema
    }

    pub fn bindings(&self) -> &BindingRegistry {
        &self.executor.bindings
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.executor.config
    }
}

impl std::fmt::Debug for GraphQlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlService")
            .field("bindings", &self.executor.bindings.len())
            .field("loaders", &self.executor.loaders)
            .field("config", &self.executor.config)
            .finish()
    }
}

/// Builder for [`GraphQlService`].
pub struct ServiceBuilder {
    schema: Schema,
    bindings: Vec<FieldBinding>,
    loaders: BatchLoaderRegistry,
    config: ExecutorConfig,
}

impl ServiceBuilder {
    /// Adds a field binding.
    pub fn bind(mut self, binding: FieldBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Uses `loaders` for data loader parameters.
    pub fn batch_loaders(mut self, loaders: BatchLoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates every binding and loader reference.
    pub fn build(self) -> Result<GraphQlService, RegistrationError> {
        let schema = Arc::new(self.schema);
        let bindings = self
            .bindings
            .into_iter()
            .fold(BindingRegistry::builder(Arc::clone(&schema)), |builder, binding| builder.bind(binding))
            .build()?;
        bindings.check_loaders(&self.loaders)?;

        info!(
            bindings = bindings.len(),
            loaders = self.loaders.len(),
            "service ready"
        );
        Ok(GraphQlService {
            executor: Arc::new(Executor {
                schema,
                bindings: Arc::new(bindings),
                loaders: Arc::new(self.loaders),
                config: Arc::new(self.config),
            }),
        })
    }
}
