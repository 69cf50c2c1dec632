//! Responses and typed extraction from them.

use crate::error::ProjectionError;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// One response per subscription event.
pub type ResponseStream = BoxStream<'static, Response>;

impl Response {
    /// Creates a successful response with data.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// Creates an error response.
    pub fn error(error: FieldError) -> Self {
        Self {
            data: None,
            errors: Some(vec![error]),
        }
    }

    /// Creates an error response with multiple errors.
    pub fn errors(errors: Vec<FieldError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// Returns true if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Returns true if the response has data.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// The field errors, possibly empty.
    pub fn field_errors(&self) -> &[FieldError] {
        self.errors.as_deref().unwrap_or_default()
    }

    /// The first error reported exactly at `path`.
    pub fn error_at(&self, path: &str) -> Option<&FieldError> {
        let segments = parse_path(path).ok()?;
        self.field_errors()
            .iter()
            .find(|e| e.path.as_deref() == Some(segments.as_slice()))
    }

    /// The value at `path`, e.g. `bookById.author` or `books[0].name`.
    pub fn value_at(&self, path: &str) -> Result<&Value, ProjectionError> {
        let segments = parse_path(path)?;
        let mut current = self.data.as_ref().ok_or(ProjectionError::NoData)?;
        for segment in &segments {
            let next = match (segment, current) {
                (PathSegment::Field(name), Value::Object(map)) => map.get(name),
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
                _ => None,
            };
            current = match next {
                Some(value) => value,
                None => return Err(self.missing(path, &segments)),
            };
        }
        Ok(current)
    }

    /// Deserializes the value at `path` into `T`.
    pub fn to_entity<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProjectionError> {
        let value = self.value_at(path)?;
        if value.is_null() {
            if let Some(error) = self.error_within(path) {
                return Err(ProjectionError::FieldError {
                    path: path.to_string(),
                    message: error.message.clone(),
                });
            }
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            if value.is_null() {
                ProjectionError::Null {
                    path: path.to_string(),
                }
            } else {
                ProjectionError::ShapeMismatch {
                    path: path.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Deserializes every element of the list at `path` into `T`.
    pub fn to_entity_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ProjectionError> {
        let value = self.value_at(path)?;
        let Value::Array(items) = value else {
            if value.is_null() {
                if let Some(error) = self.error_within(path) {
                    return Err(ProjectionError::FieldError {
                        path: path.to_string(),
                        message: error.message.clone(),
                    });
                }
            }
            return Err(ProjectionError::NotAList {
                path: path.to_string(),
            });
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item.clone()).map_err(|e| ProjectionError::ShapeMismatch {
                    path: format!("{path}[{i}]"),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn missing(&self, path: &str, segments: &[PathSegment]) -> ProjectionError {
        match self.error_under(segments) {
            Some(error) => ProjectionError::FieldError {
                path: path.to_string(),
                message: error.message.clone(),
            },
            None => ProjectionError::MissingPath {
                path: path.to_string(),
            },
        }
    }

    /// An error at `path` or below it, which explains a null at `path`.
    fn error_within(&self, path: &str) -> Option<&FieldError> {
        let segments = parse_path(path).ok()?;
        self.error_under(&segments)
    }

    fn error_under(&self, segments: &[PathSegment]) -> Option<&FieldError> {
        self.field_errors().iter().find(|e| {
            e.path.as_deref().is_some_and(|p| {
                p.starts_with(segments) || segments.starts_with(p)
            })
        })
    }
}

/// Typed extraction over a stream of subscription responses.
pub trait ResponseStreamExt: Stream<Item = Response> + Sized + Send + 'static {
    /// Maps every response to the entity at `path`.
    fn to_entities<T>(self, path: &str) -> BoxStream<'static, Result<T, ProjectionError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = path.to_string();
        self.map(move |response| response.to_entity(&path)).boxed()
    }
}

impl<S> ResponseStreamExt for S where S: Stream<Item = Response> + Sized + Send + 'static {}

/// A field error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The error message.
    pub message: String,
    /// Source locations of the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    /// The path to the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Error extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, Value>>,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    /// Adds a path to the error.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds a source location.
    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.locations
            .get_or_insert_with(Vec::new)
            .push(Location { line, column });
        self
    }

    /// Adds an extension.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", Value::String(code.into()))
    }

    /// The `extensions.code` value, if any.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }
}

/// A 1-based source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Formats a path as `books[0].author`.
pub fn format_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        if matches!(segment, PathSegment::Field(_)) && !out.is_empty() {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

/// Parses `books[0].author` into path segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, ProjectionError> {
    let invalid = || ProjectionError::InvalidPath {
        path: path.to_string(),
    };
    if path.is_empty() {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(i) => part.split_at(i),
            None => (part, ""),
        };
        if name.is_empty() {
            return Err(invalid());
        }
        segments.push(PathSegment::Field(name.to_string()));
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(invalid)?;
            let index = rest[1..close].parse().map_err(|_| invalid())?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid());
            }
        }
    }
    Ok(segments)
}
