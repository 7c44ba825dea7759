//! The search backend seam.
//!
//! The browser never talks to a search engine directly. It builds a
//! [`SearchQuery`] (an ordered list of operations) and hands it to a
//! [`SearchBackend`], which counts, slices, facets and finds similar
//! documents. [`MemoryBackend`] is the bundled implementation.

pub mod memory;

pub use memory::MemoryBackend;

use crate::error::BackendError;
use crate::paginate::Cursor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field holding `app_label.model_name` on every indexed document.
pub const CONTENT_TYPE_FIELD: &str = "django_ct";
/// Field holding the primary key on every indexed document.
pub const ID_FIELD: &str = "django_id";

/// Operators every backend is expected to understand.
pub const PORTABLE_FILTERS: &[&str] = &[
    "exact",
    "gt",
    "gte",
    "in",
    "lt",
    "lte",
    "range",
    "startswith",
];

/// One step of a query, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueryOp {
    /// Route the query to a named connection
    Using { connection: String },
    /// Exact match on a field value
    Filter { field: String, value: String },
    /// Raw `field:"value"` narrow expression
    Narrow { expression: String },
    /// Request facet counts for a field
    Facet { field: String },
    /// Restrict to `app_label.model_name` content types
    Models { models: Vec<String> },
    /// Free-text query
    AutoQuery { text: String },
    /// Eager-load backing objects
    LoadAll,
}

/// An executable query: the ordered operations to apply.
///
/// An empty query matches every indexed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    ops: Vec<QueryOp>,
}

impl SearchQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[QueryOp] {
        &self.ops
    }

    pub fn using(mut self, connection: impl Into<String>) -> Self {
        self.ops.push(QueryOp::Using {
            connection: connection.into(),
        });
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(QueryOp::Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn narrow(mut self, expression: impl Into<String>) -> Self {
        self.ops.push(QueryOp::Narrow {
            expression: expression.into(),
        });
        self
    }

    pub fn facet(mut self, field: impl Into<String>) -> Self {
        self.ops.push(QueryOp::Facet {
            field: field.into(),
        });
        self
    }

    pub fn models(mut self, models: Vec<String>) -> Self {
        self.ops.push(QueryOp::Models { models });
        self
    }

    pub fn auto_query(mut self, text: impl Into<String>) -> Self {
        self.ops.push(QueryOp::AutoQuery { text: text.into() });
        self
    }

    pub fn load_all(mut self) -> Self {
        self.ops.push(QueryOp::LoadAll);
        self
    }

    /// Connection selected by the last `Using` step, if any.
    pub fn connection(&self) -> Option<&str> {
        self.ops.iter().rev().find_map(|op| match op {
            QueryOp::Using { connection } => Some(connection.as_str()),
            _ => None,
        })
    }
}

/// An indexed model type offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedModel {
    pub app_label: String,
    pub model_name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
}

impl IndexedModel {
    /// `app_label.model_name`
    pub fn content_type(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }
}

/// A field the index keeps verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredField {
    pub name: String,
    /// Attribute on the source model this field was built from
    #[serde(default)]
    pub model_attr: Option<String>,
}

/// One raw hit as returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub app_label: String,
    pub model_name: String,
    pub pk: String,
    #[serde(default)]
    pub score: f32,
    pub verbose_name: String,
    /// Name of the index's main content field
    pub content_field: String,
    /// Stored-field metadata declared by the index
    #[serde(default)]
    pub stored_fields: Vec<StoredField>,
    /// Every field present on the hit
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl SearchHit {
    pub fn content_type(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Generic attribute lookup: hit metadata first, then indexed fields.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "app_label" => Some(Value::String(self.app_label.clone())),
            "model_name" => Some(Value::String(self.model_name.clone())),
            "pk" => Some(Value::String(self.pk.clone())),
            "score" => Some(Value::from(self.score as f64)),
            "verbose_name" => Some(Value::String(self.verbose_name.clone())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// Raw facet counts keyed by bucket kind, then field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetCounts {
    #[serde(default)]
    pub dates: BTreeMap<String, Vec<(String, u64)>>,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<(String, u64)>>,
    #[serde(default)]
    pub queries: BTreeMap<String, Vec<(String, u64)>>,
}

/// A full-text search engine as seen by the browser.
///
/// All methods are synchronous; a backend doing network I/O blocks.
pub trait SearchBackend: Send + Sync {
    /// Every model type with a search index on the default connection.
    fn indexed_models(&self) -> Vec<IndexedModel>;

    /// Field names the backend is willing to facet on.
    fn facet_fieldnames(&self) -> Vec<String>;

    /// Whether queries routed to the named connection can run.
    fn serves_connection(&self, _connection: &str) -> bool {
        true
    }

    /// Comparison operators this backend supports.
    fn supported_filters(&self) -> Vec<&'static str> {
        PORTABLE_FILTERS.to_vec()
    }

    /// Escape a user value for substitution into a query expression.
    fn clean(&self, value: &str) -> String;

    fn count(&self, query: &SearchQuery) -> Result<usize, BackendError>;

    fn fetch(
        &self,
        query: &SearchQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, BackendError>;

    fn facet_counts(&self, query: &SearchQuery) -> Result<FacetCounts, BackendError>;

    /// Documents similar to `hit`, best first.
    fn more_like_this(&self, hit: &SearchHit, limit: usize) -> Result<Vec<SearchHit>, BackendError>;

    /// Whether the object a hit was indexed from still exists in the primary store.
    fn object_exists(&self, hit: &SearchHit) -> bool;
}

/// A query bound to the backend that will run it.
pub struct BoundQuery<'a> {
    backend: &'a dyn SearchBackend,
    query: SearchQuery,
}

impl<'a> BoundQuery<'a> {
    pub fn new(backend: &'a dyn SearchBackend, query: SearchQuery) -> Self {
        Self { backend, query }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn facet_counts(&self) -> Result<FacetCounts, BackendError> {
        self.backend.facet_counts(&self.query)
    }
}

impl Cursor for BoundQuery<'_> {
    type Item = SearchHit;
    type Error = BackendError;

    fn count(&self) -> Result<usize, BackendError> {
        self.backend.count(&self.query)
    }

    fn slice(&self, offset: usize, limit: usize) -> Result<Vec<SearchHit>, BackendError> {
        self.backend.fetch(&self.query, offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder_keeps_order() {
        let query = SearchQuery::all()
            .using("archive")
            .narrow("author:\"ann\"")
            .facet("author")
            .models(vec!["blog.post".into()])
            .auto_query("rust");
        let kinds: Vec<&str> = query
            .ops()
            .iter()
            .map(|op| match op {
                QueryOp::Using { .. } => "using",
                QueryOp::Narrow { .. } => "narrow",
                QueryOp::Facet { .. } => "facet",
                QueryOp::Models { .. } => "models",
                QueryOp::AutoQuery { .. } => "auto_query",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["using", "narrow", "facet", "models", "auto_query"]);
        assert_eq!(query.connection(), Some("archive"));
    }

    #[test]
    fn test_hit_attribute_passthrough() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), Value::String("Hello".into()));
        let hit = SearchHit {
            app_label: "blog".into(),
            model_name: "post".into(),
            pk: "7".into(),
            score: 1.5,
            verbose_name: "post".into(),
            content_field: "text".into(),
            stored_fields: vec![],
            fields,
        };
        assert_eq!(hit.content_type(), "blog.post");
        assert_eq!(hit.attribute("pk"), Some(Value::String("7".into())));
        assert_eq!(hit.attribute("title"), Some(Value::String("Hello".into())));
        assert_eq!(hit.attribute("missing"), None);
    }
}
