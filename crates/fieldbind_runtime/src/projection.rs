//! Projected argument views.
//!
//! A projection satisfies a declared set of accessors directly from the raw
//! argument map, without first building an input struct. The accessor table
//! is fixed at registration time.

use crate::arguments::{coerce, deserialize, InputType, TargetType};
use crate::error::ArgumentBindingError;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One accessor of a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    /// Key read from the raw argument map.
    pub key: String,
    pub ty: TargetType,
    pub required: bool,
}

/// Accessors a projection type declares.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorTable {
    type_name: String,
    accessors: IndexMap<String, Accessor>,
}

impl AccessorTable {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            accessors: IndexMap::new(),
        }
    }

    /// Declares an accessor reading the raw key of the same name.
    pub fn accessor<T: InputType>(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.accessor_for::<T>(name.clone(), name)
    }

    /// Declares an accessor reading a differently named raw key.
    pub fn accessor_for<T: InputType>(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.accessors.insert(
            name.into(),
            Accessor {
                key: key.into(),
                ty: T::target(),
                required: T::required(),
            },
        );
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    /// Raw keys read by the accessors.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.accessors.values().map(|a| a.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}

/// A typed view over a raw argument map.
#[derive(Debug, Clone)]
pub struct Projection {
    table: Arc<AccessorTable>,
    raw: Arc<Map<String, Value>>,
}

impl Projection {
    pub(crate) fn new(table: Arc<AccessorTable>, raw: Arc<Map<String, Value>>) -> Self {
        Self { table, raw }
    }

    pub fn type_name(&self) -> &str {
        self.table.type_name()
    }

    /// Reads an accessor, coercing the raw value to the declared type.
    pub fn get<T: DeserializeOwned>(&self, accessor: &str) -> Result<T, ArgumentBindingError> {
        let value = self.coerced(accessor)?;
        deserialize(accessor, value)
    }

    /// Returns true if the accessor's raw key is present and not null.
    pub fn is_set(&self, accessor: &str) -> bool {
        self.table
            .get(accessor)
            .and_then(|a| self.raw.get(&a.key))
            .is_some_and(|v| !v.is_null())
    }

    /// The backing raw map.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Every accessor's coerced value, keyed by accessor name. Unset
    /// optional accessors are omitted.
    pub fn to_value(&self) -> Result<Value, ArgumentBindingError> {
        let mut object = Map::with_capacity(self.table.len());
        for name in self.table.accessors.keys() {
            if self.is_set(name) {
                object.insert(name.clone(), self.coerced(name)?);
            } else {
                self.coerced(name)?;
            }
        }
        Ok(Value::Object(object))
    }

    fn coerced(&self, accessor: &str) -> Result<Value, ArgumentBindingError> {
        let Some(def) = self.table.get(accessor) else {
            return Err(ArgumentBindingError::UnknownAccessor {
                projection: self.table.type_name.clone(),
                accessor: accessor.to_string(),
            });
        };
        match self.raw.get(&def.key) {
            None | Some(Value::Null) if def.required => Err(ArgumentBindingError::MissingField {
                name: accessor.to_string(),
                type_name: self.table.type_name.clone(),
                field: def.key.clone(),
            }),
            None => Ok(Value::Null),
            Some(value) => coerce(&def.key, value, &def.ty),
        }
    }
}
