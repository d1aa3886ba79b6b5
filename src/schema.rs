//! GraphQL schema as reported by the standard introspection query.
//!
//! These are plain data types; a [`Schema`] is built once from an
//! introspection response and never mutated afterwards.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

/// A possibly wrapped type reference, e.g. `NON_NULL(LIST(OBJECT("User")))`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: TypeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    pub fn named(kind: TypeKind, name: impl Into<String>) -> Self {
        TypeRef {
            kind,
            name: Some(name.into()),
            of_type: None,
        }
    }

    pub fn wrap(kind: TypeKind, inner: TypeRef) -> Self {
        TypeRef {
            kind,
            name: None,
            of_type: Some(Box::new(inner)),
        }
    }

    /// Name of the innermost named type, skipping `LIST` and `NON_NULL` wrappers.
    pub fn base_name(&self) -> Option<&str> {
        match (&self.name, &self.of_type) {
            (Some(name), _) => Some(name),
            (None, Some(inner)) => inner.base_name(),
            (None, None) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<InputValue>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub locations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<InputValue>,
}

/// One entry of `__schema.types`.
///
/// Introspection returns `null` for lists that do not apply to a kind (e.g.
/// `fields` on a scalar); those decode as empty and are omitted on output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaType {
    pub kind: TypeKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fields: Vec<Field>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub input_fields: Vec<InputValue>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub interfaces: Vec<TypeRef>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub enum_values: Vec<EnumValue>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub possible_types: Vec<TypeRef>,
}

impl SchemaType {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, deserialize_with = "root_type")]
    pub query_type: Option<TypeRef>,
    #[serde(default, deserialize_with = "root_type")]
    pub mutation_type: Option<TypeRef>,
    #[serde(default, deserialize_with = "root_type")]
    pub subscription_type: Option<TypeRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub types: Vec<SchemaType>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub directives: Vec<Directive>,
}

impl Schema {
    /// Names of the query, mutation and subscription root types, in that order.
    pub fn root_type_names(&self) -> impl Iterator<Item = &str> {
        [
            &self.query_type,
            &self.mutation_type,
            &self.subscription_type,
        ]
        .into_iter()
        .filter_map(|root| root.as_ref().and_then(|r| r.name.as_deref()))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    pub fn find_type(&self, name: &str) -> Option<&SchemaType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Exact match against root operation type names, then declared type names.
    pub fn declares_type(&self, name: &str) -> bool {
        self.root_type_names().any(|root| root == name) || self.type_names().any(|t| t == name)
    }

    /// Exact match against declared type names or any field of any type.
    pub fn declares_type_or_field(&self, name: &str) -> bool {
        self.types
            .iter()
            .any(|t| t.name == name || t.has_field(name))
    }

    /// Root operation type names followed by every declared type name.
    pub fn available_fields(&self) -> Vec<String> {
        self.root_type_names()
            .chain(self.type_names())
            .map(str::to_string)
            .collect()
    }
}

// The introspection query only selects `name` on root types, which are always objects.
fn root_type<'de, D>(deserializer: D) -> Result<Option<TypeRef>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct RootType {
        #[serde(default)]
        kind: Option<TypeKind>,
        name: Option<String>,
    }

    Ok(Option::<RootType>::deserialize(deserializer)?.map(|root| TypeRef {
        kind: root.kind.unwrap_or(TypeKind::Object),
        name: root.name,
        of_type: None,
    }))
}

pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
