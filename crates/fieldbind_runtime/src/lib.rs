//! Schema-mapping invocation runtime for fieldbind.
//!
//! Routes GraphQL operations to registered field handlers:
//! - `schema`: Programmatic type graph
//! - `binding`: Field bindings and the validated binding registry
//! - `arguments`: Argument specs, coercion and extraction
//! - `projection`: Accessor views over raw argument maps
//! - `invocation`: What a handler receives
//! - `dataloader`: Per-request batching and deduplication of keyed loads
//! - `context`: Per-request key/value store
//! - `request`: Execution requests and configure hooks
//! - `response`: Responses, field errors and typed projection
//! - `service`: The service façade
//! - `config`: Executor configuration
//! - `error`: Error types

pub mod arguments;
pub mod binding;
pub mod config;
pub mod context;
pub mod dataloader;
pub mod error;
mod executor;
pub mod invocation;
pub mod projection;
pub mod request;
pub mod response;
pub mod schema;
pub mod service;
mod subscription;

pub use arguments::{ArgumentKind, ArgumentShape, ArgumentSpec, Id, InputField, InputShape, InputType, ScalarKind, TargetType};
pub use binding::{
    BindingRegistry, FieldBinding, FieldResult, HandlerKind, ResultShape, SchemaCoordinate,
};
pub use config::ExecutorConfig;
pub use context::ExecutionContext;
pub use dataloader::{BatchLoaderEnvironment, BatchLoaderRegistry, DataLoader, LoaderKey};
pub use error::{
    ArgumentBindingError, BatchLoadError, ExecutionError, HandlerError, HandlerResult, ProjectionError,
    RegistrationError, ResolveError,
};
pub use fieldbind_syntax::OperationType;
pub use invocation::{Environment, Invocation};
pub use projection::{AccessorTable, Projection};
pub use request::{ExecutionInput, ExecutionRequest};
pub use response::{FieldError, Location, PathSegment, Response, ResponseStream, ResponseStreamExt};
pub use schema::{
    EnumDef, FieldDef, InputObjectDef, InputValueDef, InterfaceDef, ObjectDef, ScalarDef, Schema, SchemaBuilder,
    TypeDef, TypeRef, UnionDef,
};
pub use service::{GraphQlService, ServiceBuilder};
