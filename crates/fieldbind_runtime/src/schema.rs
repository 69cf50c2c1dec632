//! Programmatic schema model.
//!
//! The host builds the type graph with [`SchemaBuilder`]. The runtime uses it
//! to validate bindings, to know the type of every field it completes, and to
//! apply argument defaults and non-null propagation.

use crate::error::RegistrationError;
use fieldbind_syntax::OperationType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A GraphQL schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, TypeDef>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a type by name.
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Returns all types.
    pub fn types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types.iter()
    }

    /// Returns the root type name for an operation kind.
    pub fn root_type(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => self.query_type.as_deref(),
            OperationType::Mutation => self.mutation_type.as_deref(),
            OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Looks up a field on an object or interface type.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        match self.types.get(type_name)? {
            TypeDef::Object(o) => o.fields.get(field_name),
            TypeDef::Interface(i) => i.fields.get(field_name),
            _ => None,
        }
    }

    /// Looks up an input object type.
    pub fn input_object(&self, name: &str) -> Option<&InputObjectDef> {
        match self.types.get(name)? {
            TypeDef::InputObject(def) => Some(def),
            _ => None,
        }
    }

    /// Returns true if values of `object_type` satisfy the type condition `condition`.
    pub fn type_applies(&self, condition: &str, object_type: &str) -> bool {
        if condition == object_type {
            return true;
        }
        match self.types.get(condition) {
            Some(TypeDef::Union(u)) => u.members.iter().any(|m| m == object_type),
            Some(TypeDef::Interface(_)) => match self.types.get(object_type) {
                Some(TypeDef::Object(o)) => o.implements.iter().any(|i| i == condition),
                _ => false,
            },
            _ => false,
        }
    }

    /// Verifies that every referenced type is defined.
    pub fn check(&self) -> Result<(), RegistrationError> {
        let known = |name: &str| -> Result<(), RegistrationError> {
            if self.types.contains_key(name) {
                Ok(())
            } else {
                Err(RegistrationError::UnknownType {
                    name: name.to_string(),
                })
            }
        };

        for root in [&self.query_type, &self.mutation_type, &self.subscription_type]
            .into_iter()
            .flatten()
        {
            match self.types.get(root) {
                Some(TypeDef::Object(_)) => {}
                Some(_) => {
                    return Err(RegistrationError::NotAnObject {
                        type_name: root.clone(),
                    })
                }
                None => known(root.as_str())?,
            }
        }

        for def in self.types.values() {
            match def {
                TypeDef::Object(ObjectDef {
                    fields, implements, ..
                })
                | TypeDef::Interface(InterfaceDef {
                    fields, implements, ..
                }) => {
                    for name in implements {
                        known(name.as_str())?;
                    }
                    for field in fields.values() {
                        known(field.ty.named_type())?;
                        for arg in field.arguments.values() {
                            known(arg.ty.named_type())?;
                        }
                    }
                }
                TypeDef::Union(u) => {
                    for member in &u.members {
                        known(member.as_str())?;
                    }
                }
                TypeDef::InputObject(input) => {
                    for field in input.fields.values() {
                        known(field.ty.named_type())?;
                    }
                }
                TypeDef::Scalar(_) | TypeDef::Enum(_) => {}
            }
        }
        Ok(())
    }
}

/// A type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
            Self::Interface(i) => &i.name,
            Self::Union(u) => &u.name,
            Self::Enum(e) => &e.name,
            Self::InputObject(i) => &i.name,
        }
    }

    /// Returns true for scalars and enums.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// Returns true for interfaces and unions.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Union(_))
    }
}

/// Scalar type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

/// Object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declares an implemented interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Union type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

impl UnionDef {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Enum type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<String>,
}

impl EnumDef {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Input object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValueDef>,
}

impl InputObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, field: InputValueDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValueDef>,
}

impl FieldDef {
    /// Creates a field. The type is written in SDL notation, e.g. `[Book!]!`.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: ty.into(),
            arguments: IndexMap::new(),
        }
    }

    /// Adds an argument.
    pub fn argument(mut self, argument: InputValueDef) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Argument or input field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<serde_json::Value>,
}

impl InputValueDef {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: ty.into(),
            default_value: None,
        }
    }

    /// Sets the value used when the argument is omitted.
    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// Parses SDL type notation such as `Int`, `[Book]` or `[Book!]!`.
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        if let Some(inner) = source.strip_suffix('!') {
            let inner = Self::parse(inner)?;
            if matches!(inner, Self::NonNull(_)) {
                return None;
            }
            return Some(Self::non_null(inner));
        }
        if let Some(inner) = source.strip_prefix('[') {
            let inner = inner.strip_suffix(']')?;
            return Some(Self::list(Self::parse(inner)?));
        }
        let valid = !source.is_empty()
            && source
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !source.starts_with(|c: char| c.is_ascii_digit());
        valid.then(|| Self::named(source))
    }

    /// Returns the innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Returns true if the type is a list, ignoring a non-null wrapper.
    pub fn is_list(&self) -> bool {
        match self {
            Self::List(_) => true,
            Self::NonNull(inner) => inner.is_list(),
            Self::Named(_) => false,
        }
    }
}

impl From<&str> for TypeRef {
    /// Parses SDL notation. Unparsable text becomes a named type, which
    /// [`Schema::check`] then reports as unknown.
    fn from(source: &str) -> Self {
        Self::parse(source).unwrap_or_else(|| Self::named(source))
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Schema builder.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Creates a new schema builder with the built-in scalars.
    pub fn new() -> Self {
        let mut builder = Self::default();
        for name in ["Int", "Float", "String", "Boolean", "ID"] {
            builder.schema.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                    description: Some(format!("Built-in {name} scalar")),
                }),
            );
        }
        builder
    }

    /// Sets the query type.
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Sets the mutation type.
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription type.
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    /// Adds a type.
    pub fn add_type(mut self, type_def: impl Into<TypeDef>) -> Self {
        let type_def = type_def.into();
        self.schema
            .types
            .insert(type_def.name().to_string(), type_def);
        self
    }

    /// Adds a custom scalar.
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.add_type(ScalarDef {
            name: name.into(),
            description: None,
        })
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        self.schema
    }
}

macro_rules! impl_into_type_def {
    ($($def:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$def> for TypeDef {
                fn from(def: $def) -> Self {
                    Self::$variant(def)
                }
            }
        )*
    };
}

impl_into_type_def! {
    ScalarDef => Scalar,
    ObjectDef => Object,
    InterfaceDef => Interface,
    UnionDef => Union,
    EnumDef => Enum,
    InputObjectDef => InputObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(
                ObjectDef::new("Query").field(
                    FieldDef::new("books", "[Book!]!")
                        .argument(InputValueDef::new("criteria", "BookCriteria")),
                ),
            )
            .add_type(ObjectDef::new("Book").implements("Node").field(FieldDef::new("id", "ID!")))
            .add_type(InterfaceDef::new("Node").field(FieldDef::new("id", "ID!")))
            .add_type(UnionDef::new("SearchResult", ["Book"]))
            .add_type(InputObjectDef::new("BookCriteria").field(InputValueDef::new("author", "String")))
            .build()
    }

    #[test]
    fn test_type_ref_parse() {
        assert_eq!(TypeRef::parse("Int"), Some(TypeRef::named("Int")));
        assert_eq!(
            TypeRef::parse("[Book!]!"),
            Some(TypeRef::non_null(TypeRef::list(TypeRef::non_null(
                TypeRef::named("Book")
            ))))
        );
        assert_eq!(TypeRef::parse("Int!!"), None);
        assert_eq!(TypeRef::parse("[Int"), None);
        assert_eq!(TypeRef::parse(""), None);
        assert_eq!(TypeRef::from("[Book!]!").to_string(), "[Book!]!");
    }

    #[test]
    fn test_type_ref_helpers() {
        let ty = TypeRef::from("[Book!]!");
        assert!(ty.is_list());
        assert!(ty.is_non_null());
        assert_eq!(ty.named_type(), "Book");
        assert!(!TypeRef::from("Book").is_list());
    }

    #[test]
    fn test_field_lookup() {
        let schema = library();
        let field = schema.field("Query", "books").unwrap();
        assert!(field.arguments.contains_key("criteria"));
        assert!(schema.field("Query", "missing").is_none());
        assert!(schema.input_object("BookCriteria").is_some());
        assert_eq!(schema.root_type(OperationType::Query), Some("Query"));
        assert_eq!(schema.root_type(OperationType::Mutation), None);
    }

    #[test]
    fn test_type_applies() {
        let schema = library();
        assert!(schema.type_applies("Book", "Book"));
        assert!(schema.type_applies("Node", "Book"));
        assert!(schema.type_applies("SearchResult", "Book"));
        assert!(!schema.type_applies("Query", "Book"));
    }

    #[test]
    fn test_check_reports_unknown_types() {
        assert!(library().check().is_ok());

        let schema = SchemaBuilder::new()
            .query_type("Query")
            .add_type(ObjectDef::new("Query").field(FieldDef::new("author", "Author")))
            .build();
        assert_eq!(
            schema.check(),
            Err(RegistrationError::UnknownType {
                name: "Author".to_string()
            })
        );

        let schema = SchemaBuilder::new().query_type("Missing").build();
        assert!(schema.check().is_err());
    }
}
