//! Catalog record kinds, record shapes and the outgoing request value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::lenient;

/// Which catalog collection is being synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Profile,
    Category,
    Product,
}

impl RecordKind {
    /// Value of the `action` query/form parameter selecting this kind on the backend.
    pub fn action(&self) -> &'static str {
        match self {
            RecordKind::Profile => "getProfile",
            RecordKind::Category => "getProductCategories",
            RecordKind::Product => "getProducts",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Profile => "profile",
            RecordKind::Category => "category",
            RecordKind::Product => "product",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flat catalog record that can be fetched, cached and observed.
///
/// The same type is used for the wire record and the cached row: records are
/// never nested and never mutated field by field.
pub trait CatalogRecord:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: RecordKind;

    /// Stable natural key of the record (short name, category id, product id).
    fn natural_key(&self) -> &str;

    /// Whether the record belongs to the cache scope selected by `filter`.
    fn in_scope(&self, _filter: &str) -> bool {
        true
    }

    /// Places the record in the scope selected by `filter`. Afterwards
    /// `in_scope(filter)` holds.
    fn assign_scope(&mut self, _filter: &str) {}
}

/// Organizational profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, deserialize_with = "lenient::string")]
    pub short_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub website: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub logo_url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
}

impl CatalogRecord for Profile {
    const KIND: RecordKind = RecordKind::Profile;

    fn natural_key(&self) -> &str {
        &self.short_name
    }
}

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub image_url: String,
}

impl CatalogRecord for Category {
    const KIND: RecordKind = RecordKind::Category;

    fn natural_key(&self) -> &str {
        &self.id
    }
}

/// Product. `price` and `stock` stay strings: the backend sends them that way
/// and the cache mirrors the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub product_category_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stock: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub image_url: String,
}

impl CatalogRecord for Product {
    const KIND: RecordKind = RecordKind::Product;

    fn natural_key(&self) -> &str {
        &self.id
    }

    fn in_scope(&self, filter: &str) -> bool {
        self.product_category_id == filter
    }

    fn assign_scope(&mut self, filter: &str) {
        self.product_category_id = filter.to_string();
    }
}

/// One logical request against the catalog endpoint.
///
/// `filter` only applies to products, where it carries the category id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub session_token: String,
    pub kind: RecordKind,
    pub filter: Option<String>,
}

impl RemoteRequest {
    pub fn new(session_token: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            session_token: session_token.into(),
            kind,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Category id for product requests; `None` for every other kind.
    pub fn product_category_id(&self) -> Option<&str> {
        match self.kind {
            RecordKind::Product => self.filter.as_deref(),
            _ => None,
        }
    }
}
