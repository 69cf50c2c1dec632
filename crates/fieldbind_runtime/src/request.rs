//! Incoming execution requests.

use crate::context::ExecutionContext;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

type ConfigureHook = Box<dyn FnOnce(&mut ExecutionInput) + Send>;

/// One operation to execute, with its variables and initial context.
pub struct ExecutionRequest {
    document: String,
    variables: Map<String, Value>,
    operation_name: Option<String>,
    context: HashMap<String, Value>,
    id: Option<String>,
    cancellation: Option<CancellationToken>,
    hooks: Vec<ConfigureHook>,
}

impl ExecutionRequest {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            variables: Map::new(),
            operation_name: None,
            context: HashMap::new(),
            id: None,
            cancellation: None,
            hooks: Vec::new(),
        }
    }

    /// Replaces the variables.
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Sets one variable. Values that fail to serialize become null.
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.variables.insert(name.into(), value);
        self
    }

    /// Selects an operation of a multi-operation document.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Seeds the execution context.
    pub fn context_value(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.context.insert(key.into(), value);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Ties the request to an external token; cancelling it aborts batch
    /// loads and ends subscription streams.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Registers a hook that runs before dispatch. Hooks run in the order
    /// they were added.
    pub fn configure<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut ExecutionInput) + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// Runs the hooks and returns the final input with the request's token.
    pub(crate) fn into_input(self) -> (ExecutionInput, CancellationToken) {
        let mut input = ExecutionInput {
            document: self.document,
            variables: self.variables,
            operation_name: self.operation_name,
            id: self.id.unwrap_or_else(generate_id),
            context: ExecutionContext::from_snapshot(self.context),
        };
        for hook in self.hooks {
            hook(&mut input);
        }
        (input, self.cancellation.unwrap_or_default())
    }
}

impl std::fmt::Debug for ExecutionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .field("operation_name", &self.operation_name)
            .field("id", &self.id)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

/// The request as seen by configure hooks.
#[derive(Debug)]
pub struct ExecutionInput {
    pub document: String,
    pub variables: Map<String, Value>,
    pub operation_name: Option<String>,
    pub id: String,
    pub(crate) context: ExecutionContext,
}

impl ExecutionInput {
    /// The request's context. Writes made here are visible to every handler.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

fn generate_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("req_{timestamp:x}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hooks_see_seeded_context() {
        let request = ExecutionRequest::new("{ a }")
            .variable("id", "1")
            .context_value("tenant", "acme")
            .configure(|input| {
                let tenant: String = input.context().get("tenant").unwrap();
                input.context().insert("seen", tenant);
                input.variables.insert("extra".into(), json!(true));
            });

        let (input, token) = request.into_input();
        assert_eq!(input.context().get::<String>("seen").as_deref(), Some("acme"));
        assert_eq!(input.variables.get("id"), Some(&json!("1")));
        assert_eq!(input.variables.get("extra"), Some(&json!(true)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_hooks_run_in_order() {
        let (input, _) = ExecutionRequest::new("{ a }")
            .configure(|input| input.operation_name = Some("First".into()))
            .configure(|input| {
                let name = input.operation_name.take().unwrap_or_default();
                input.operation_name = Some(format!("{name}Second"));
            })
            .into_input();
        assert_eq!(input.operation_name.as_deref(), Some("FirstSecond"));
    }

    #[test]
    fn test_request_ids() {
        let (a, _) = ExecutionRequest::new("{ a }").into_input();
        let (b, _) = ExecutionRequest::new("{ a }").into_input();
        assert!(a.id.starts_with("req_"));
        assert_ne!(a.id, b.id);

        let (c, _) = ExecutionRequest::new("{ a }").id("fixed").into_input();
        assert_eq!(c.id, "fixed");
    }

    #[test]
    fn test_external_token() {
        let token = CancellationToken::new();
        let (_, own) = ExecutionRequest::new("{ a }")
            .cancellation_token(token.clone())
            .into_input();
        token.cancel();
        assert!(own.is_cancelled());
    }
}
