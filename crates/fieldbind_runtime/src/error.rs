//! Error types for the invocation runtime.

use fieldbind_syntax::SyntaxError;
use thiserror::Error;

/// Result type returned by field handlers.
pub type HandlerResult<T> = Result<T, ResolveError>;

/// Error code attached to argument extraction failures.
pub const ARGUMENT_BINDING: &str = "ARGUMENT_BINDING";
/// Error code attached to failed batch loads.
pub const BATCH_LOAD: &str = "BATCH_LOAD";
/// Error code attached to failures raised inside handlers.
pub const HANDLER_INVOCATION: &str = "HANDLER_INVOCATION";
/// Error code for a null produced where the schema forbids one.
pub const NON_NULL: &str = "NON_NULL";
/// Error code for unparsable operation text.
pub const PARSE: &str = "PARSE";
/// Error code for operation selection and variable failures.
pub const OPERATION: &str = "OPERATION";

/// Failure to turn raw arguments into the type a handler declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentBindingError {
    #[error("required argument `{name}` was not provided")]
    Missing { name: String },

    #[error("argument `{name}`: cannot coerce {found} to {expected}")]
    Coercion {
        name: String,
        expected: String,
        found: String,
    },

    #[error("argument `{name}`: required field `{field}` of {type_name} was not provided")]
    MissingField {
        name: String,
        type_name: String,
        field: String,
    },

    #[error("argument `{name}`: {message}")]
    Deserialize { name: String, message: String },

    #[error("parameter {index} is not a {expected} parameter")]
    Parameter { index: usize, expected: &'static str },

    #[error("no parameter named `{name}`")]
    UnknownParameter { name: String },

    #[error("projection {projection} has no accessor `{accessor}`")]
    UnknownAccessor {
        projection: String,
        accessor: String,
    },

    #[error("no batch loader registered for {key} -> {value}")]
    LoaderUnavailable {
        key: &'static str,
        value: &'static str,
    },
}

/// Failure of a batch load. Every waiter of the failed batch observes the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("batch load failed: {message}")]
pub struct BatchLoadError {
    pub message: String,
}

impl BatchLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn length_mismatch(keys: usize, values: usize) -> Self {
        Self::new(format!(
            "batch function returned {values} values for {keys} keys"
        ))
    }

    pub(crate) fn cancelled() -> Self {
        Self::new("request was cancelled before the batch completed")
    }
}

/// An error raised by a handler body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub code: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Wraps any error type.
    pub fn from_error(error: impl std::error::Error) -> Self {
        Self::new(error.to_string())
    }

    /// Overrides the `extensions.code` reported for this error.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Why a single field failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    ArgumentBinding(#[from] ArgumentBindingError),

    #[error(transparent)]
    BatchLoad(#[from] BatchLoadError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl ResolveError {
    /// Error code reported under `extensions.code`.
    pub fn code(&self) -> &str {
        match self {
            Self::ArgumentBinding(_) => ARGUMENT_BINDING,
            Self::BatchLoad(_) => BATCH_LOAD,
            Self::Handler(e) => e.code.as_deref().unwrap_or(HANDLER_INVOCATION),
        }
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(error: serde_json::Error) -> Self {
        Self::Handler(HandlerError::new(format!(
            "failed to serialize handler result: {error}"
        )))
    }
}

/// Failure to read a typed value out of a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("response has no data")]
    NoData,

    #[error("no value at path `{path}`")]
    MissingPath { path: String },

    #[error("value at `{path}` is null")]
    Null { path: String },

    #[error("field error at `{path}`: {message}")]
    FieldError { path: String, message: String },

    #[error("value at `{path}` is not a list")]
    NotAList { path: String },

    #[error("value at `{path}` does not match the requested shape: {message}")]
    ShapeMismatch { path: String, message: String },

    #[error("invalid path `{path}`")]
    InvalidPath { path: String },
}

/// An invalid handler or loader registration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("schema has no {kind} root type")]
    MissingRootType { kind: &'static str },

    #[error("type `{name}` is referenced but not defined")]
    UnknownType { name: String },

    #[error("`{type_name}` is not an object type")]
    NotAnObject { type_name: String },

    #[error("schema has no field `{coordinate}`")]
    UnknownField { coordinate: String },

    #[error("`{coordinate}` is bound more than once")]
    DuplicateBinding { coordinate: String },

    #[error("a batch loader for {key} -> {value} is already registered")]
    DuplicateLoader {
        key: &'static str,
        value: &'static str,
    },

    #[error("`{coordinate}` has no argument `{argument}`")]
    UnknownArgument {
        coordinate: String,
        argument: String,
    },

    #[error("`{coordinate}`: parameter `{parameter}` is declared more than once")]
    AmbiguousParameter {
        coordinate: String,
        parameter: String,
    },

    #[error("`{coordinate}`: parameter `{parameter}` expects {expected} but the schema declares {found}")]
    ShapeMismatch {
        coordinate: String,
        parameter: String,
        expected: String,
        found: String,
    },

    #[error("`{coordinate}`: projection {projection} reads `{key}` which is not an input of the field")]
    UnknownAccessorKey {
        coordinate: String,
        projection: String,
        key: String,
    },

    #[error("`{coordinate}`: stream handlers are only valid on subscription root fields")]
    StreamOutsideSubscription { coordinate: String },

    #[error("`{coordinate}`: subscription root fields must return a stream")]
    SubscriptionWithoutStream { coordinate: String },

    #[error("`{coordinate}`: no batch loader registered for {key} -> {value}")]
    MissingLoader {
        coordinate: String,
        key: &'static str,
        value: &'static str,
    },
}

/// A request-level failure, reported before any field is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("{}", .0.first().map_or("syntax error", |e| e.message.as_str()))]
    Parse(Vec<SyntaxError>),

    #[error("document contains no operations")]
    NoOperation,

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("an operation name is required when the document contains several operations")]
    AmbiguousOperation,

    #[error("schema does not support {0} operations")]
    UnsupportedOperation(&'static str),

    #[error("variable `${0}` of non-null type was not provided")]
    MissingVariable(String),

    #[error("subscription operations must select exactly one root field")]
    SubscriptionRootCount,

    #[error("subscription operations must be started with `subscribe`")]
    SubscriptionRequired,

    #[error("subscription field `{0}` did not produce a stream")]
    NotAStream(String),
}

impl ExecutionError {
    /// Error code reported under `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => PARSE,
            _ => OPERATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_codes() {
        let err: ResolveError = ArgumentBindingError::Missing {
            name: "id".to_string(),
        }
        .into();
        assert_eq!(err.code(), ARGUMENT_BINDING);

        let err: ResolveError = BatchLoadError::new("down").into();
        assert_eq!(err.code(), BATCH_LOAD);
        assert_eq!(err.to_string(), "batch load failed: down");

        let err: ResolveError = HandlerError::new("boom").into();
        assert_eq!(err.code(), HANDLER_INVOCATION);

        let err: ResolveError = HandlerError::new("nope").with_code("NOT_FOUND").into();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_parse_error_message_uses_first_diagnostic() {
        let err = ExecutionError::Parse(vec![SyntaxError::new(
            "expected `}`",
            fieldbind_syntax::Span::new(3, 4),
        )]);
        assert_eq!(err.to_string(), "expected `}`");
        assert_eq!(err.code(), PARSE);
        assert_eq!(ExecutionError::NoOperation.code(), OPERATION);
    }
}
