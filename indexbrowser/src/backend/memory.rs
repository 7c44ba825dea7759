//! In-memory [`SearchBackend`] over JSON fixture corpora.
//!
//! Each connection owns one corpus: index definitions plus documents.
//! Matching is a linear scan. Free text is a case-insensitive substring
//! test per term, and the score is the number of term occurrences.

use super::{
    FacetCounts, IndexedModel, QueryOp, SearchBackend, SearchHit, SearchQuery, StoredField,
    CONTENT_TYPE_FIELD, ID_FIELD,
};
use crate::capability::DEFAULT_CONNECTION;
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Characters escaped by [`SearchBackend::clean`].
const RESERVED: &[char] = &[
    '\\', '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':',
    '/',
];

const SAMPLE_FIXTURE: &str = include_str!("../../fixtures/sample.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub model_attr: Option<String>,
    #[serde(default)]
    pub faceted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub app_label: String,
    pub model_name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    #[serde(default = "default_content_field")]
    pub content_field: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

fn default_content_field() -> String {
    "text".to_string()
}

impl IndexDefinition {
    pub fn content_type(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content_type: String,
    pub pk: String,
    /// False once the backing object was deleted but the index was not updated
    #[serde(default = "default_live")]
    pub live: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

fn default_live() -> bool {
    true
}

impl Document {
    fn values(&self, field: &str) -> Vec<String> {
        match field {
            CONTENT_TYPE_FIELD => vec![self.content_type.clone()],
            ID_FIELD => vec![self.pk.clone()],
            _ => self.fields.get(field).map(flatten).unwrap_or_default(),
        }
    }

    fn text(&self) -> String {
        self.fields
            .values()
            .flat_map(flatten)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

fn flatten(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        other => vec![other.to_string()],
    }
}

/// One connection's worth of indexes and documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Corpus {
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        let corpus: Corpus = serde_json::from_str(json)?;
        corpus.check()?;
        Ok(corpus)
    }

    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn check(&self) -> Result<(), BackendError> {
        for doc in &self.documents {
            if self.index_for(&doc.content_type).is_none() {
                return Err(BackendError::Fixture(format!(
                    "document {}:{} has no index definition",
                    doc.content_type, doc.pk
                )));
            }
        }
        Ok(())
    }

    fn index_for(&self, content_type: &str) -> Option<&IndexDefinition> {
        self.indexes
            .iter()
            .find(|index| index.content_type() == content_type)
    }

    fn hit(&self, doc: &Document, score: f32) -> Option<SearchHit> {
        let index = self.index_for(&doc.content_type)?;
        Some(SearchHit {
            app_label: index.app_label.clone(),
            model_name: index.model_name.clone(),
            pk: doc.pk.clone(),
            score,
            verbose_name: index.verbose_name.clone(),
            content_field: index.content_field.clone(),
            stored_fields: index
                .fields
                .iter()
                .filter(|f| f.stored)
                .map(|f| StoredField {
                    name: f.name.clone(),
                    model_attr: f.model_attr.clone(),
                })
                .collect(),
            fields: doc.fields.clone(),
        })
    }

    fn find(&self, content_type: &str, pk: &str) -> Option<&Document> {
        self.documents
            .iter()
            .find(|doc| doc.content_type == content_type && doc.pk == pk)
    }
}

/// Parsed free-text query.
#[derive(Debug, Default)]
struct Terms {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Terms {
    fn parse(text: &str) -> Self {
        let mut terms = Self::default();
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            match word.strip_prefix('-') {
                Some(rest) if !rest.is_empty() => terms.exclude.push(rest.to_string()),
                _ => terms.include.push(word),
            }
        }
        terms
    }

    /// Occurrence count, or `None` when the document does not match.
    fn score(&self, text: &str) -> Option<f32> {
        if self.exclude.iter().any(|term| text.contains(term.as_str())) {
            return None;
        }
        let mut score = 0usize;
        for term in &self.include {
            match text.matches(term.as_str()).count() {
                0 => return None,
                n => score += n,
            }
        }
        Some(score as f32)
    }
}

/// Reverse of [`SearchBackend::clean`] for a quoted narrow value.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_narrow(expression: &str) -> Result<(String, String), BackendError> {
    let malformed = || BackendError::MalformedQuery(format!("bad narrow expression: {expression}"));
    let (field, quoted) = expression.split_once(':').ok_or_else(malformed)?;
    let inner = quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(malformed)?;
    if field.is_empty() {
        return Err(malformed());
    }
    Ok((field.to_string(), unescape(inner)))
}

pub struct MemoryBackend {
    corpora: BTreeMap<String, Corpus>,
}

impl MemoryBackend {
    /// A backend with an empty default connection.
    pub fn new() -> Self {
        let mut corpora = BTreeMap::new();
        corpora.insert(DEFAULT_CONNECTION.to_string(), Corpus::default());
        Self { corpora }
    }

    /// The bundled demo corpus on the default connection.
    pub fn sample() -> Self {
        let corpus = Corpus::from_json(SAMPLE_FIXTURE).expect("bundled sample fixture is valid");
        Self::new().with_corpus(DEFAULT_CONNECTION, corpus)
    }

    pub fn with_corpus(mut self, connection: impl Into<String>, corpus: Corpus) -> Self {
        self.corpora.insert(connection.into(), corpus);
        self
    }

    /// Load one fixture file per connection.
    pub fn from_fixtures(fixtures: &BTreeMap<String, PathBuf>) -> Result<Self, BackendError> {
        let mut backend = Self::new();
        for (connection, path) in fixtures {
            let corpus = Corpus::load(path).map_err(|e| {
                BackendError::Fixture(format!("{}: {}", path.display(), e))
            })?;
            tracing::info!(
                connection = %connection,
                indexes = corpus.indexes.len(),
                documents = corpus.documents.len(),
                "Loaded fixture corpus"
            );
            backend = backend.with_corpus(connection.as_str(), corpus);
        }
        Ok(backend)
    }

    pub fn connections(&self) -> impl Iterator<Item = &str> {
        self.corpora.keys().map(String::as_str)
    }

    fn default_corpus(&self) -> Option<&Corpus> {
        self.corpora.get(DEFAULT_CONNECTION)
    }

    fn corpus(&self, query: &SearchQuery) -> Result<&Corpus, BackendError> {
        let name = query.connection().unwrap_or(DEFAULT_CONNECTION);
        self.corpora
            .get(name)
            .ok_or_else(|| BackendError::UnknownConnection(name.to_string()))
    }

    /// Matching documents with scores, best first.
    fn execute<'a>(
        &'a self,
        query: &SearchQuery,
    ) -> Result<(&'a Corpus, Vec<(&'a Document, f32)>), BackendError> {
        let corpus = self.corpus(query)?;
        let mut filters: Vec<(String, String)> = Vec::new();
        let mut models: Option<BTreeSet<&str>> = None;
        let mut terms: Option<Terms> = None;

        for op in query.ops() {
            match op {
                QueryOp::Filter { field, value } => filters.push((field.clone(), value.clone())),
                QueryOp::Narrow { expression } => filters.push(parse_narrow(expression)?),
                QueryOp::Models { models: list } => {
                    models = Some(list.iter().map(String::as_str).collect())
                }
                QueryOp::AutoQuery { text } => terms = Some(Terms::parse(text)),
                QueryOp::Using { .. } | QueryOp::Facet { .. } | QueryOp::LoadAll => {}
            }
        }

        let mut matched: Vec<(&Document, f32)> = corpus
            .documents
            .iter()
            .filter(|doc| {
                models
                    .as_ref()
                    .map_or(true, |m| m.contains(doc.content_type.as_str()))
            })
            .filter(|doc| {
                filters
                    .iter()
                    .all(|(field, value)| doc.values(field).iter().any(|v| v == value))
            })
            .filter_map(|doc| match &terms {
                Some(terms) => terms.score(&doc.text()).map(|score| (doc, score)),
                None => Some((doc, 1.0)),
            })
            .collect();

        if terms.is_some() {
            matched.sort_by(|a, b| b.1.total_cmp(&a.1));
        }
        Ok((corpus, matched))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchBackend for MemoryBackend {
    fn serves_connection(&self, connection: &str) -> bool {
        self.corpora.contains_key(connection)
    }

    fn indexed_models(&self) -> Vec<IndexedModel> {
        let mut models: Vec<IndexedModel> = self
            .default_corpus()
            .map(|corpus| {
                corpus
                    .indexes
                    .iter()
                    .map(|index| IndexedModel {
                        app_label: index.app_label.clone(),
                        model_name: index.model_name.clone(),
                        verbose_name: index.verbose_name.clone(),
                        verbose_name_plural: index.verbose_name_plural.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        models.sort_by_key(IndexedModel::content_type);
        models
    }

    fn facet_fieldnames(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .default_corpus()
            .into_iter()
            .flat_map(|corpus| corpus.indexes.iter())
            .flat_map(|index| index.fields.iter())
            .filter(|field| field.faceted)
            .map(|field| field.name.as_str())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    fn clean(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            if RESERVED.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn count(&self, query: &SearchQuery) -> Result<usize, BackendError> {
        Ok(self.execute(query)?.1.len())
    }

    fn fetch(
        &self,
        query: &SearchQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, BackendError> {
        let (corpus, matched) = self.execute(query)?;
        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(doc, score)| corpus.hit(doc, score))
            .collect())
    }

    fn facet_counts(&self, query: &SearchQuery) -> Result<FacetCounts, BackendError> {
        let (_, matched) = self.execute(query)?;
        let mut counts = FacetCounts::default();
        for op in query.ops() {
            let QueryOp::Facet { field } = op else {
                continue;
            };
            if counts.fields.contains_key(field) {
                continue;
            }
            let mut tally: BTreeMap<String, u64> = BTreeMap::new();
            for (doc, _) in &matched {
                for value in doc.values(field) {
                    *tally.entry(value).or_default() += 1;
                }
            }
            let mut values: Vec<(String, u64)> = tally.into_iter().collect();
            values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            counts.fields.insert(field.clone(), values);
        }
        Ok(counts)
    }

    fn more_like_this(&self, hit: &SearchHit, limit: usize) -> Result<Vec<SearchHit>, BackendError> {
        let Some(corpus) = self.default_corpus() else {
            return Ok(Vec::new());
        };
        let content_type = hit.content_type();
        let words = |text: &str| -> BTreeSet<String> {
            text.split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.chars().count() >= 4)
                .map(str::to_lowercase)
                .collect()
        };
        let source = match hit.fields.get(&hit.content_field) {
            Some(value) => words(&flatten(value).join(" ")),
            None => BTreeSet::new(),
        };
        if source.is_empty() {
            return Ok(Vec::new());
        }

        let mut similar: Vec<(&Document, usize)> = corpus
            .documents
            .iter()
            .filter(|doc| !(doc.content_type == content_type && doc.pk == hit.pk))
            .filter_map(|doc| {
                let index = corpus.index_for(&doc.content_type)?;
                let text = doc.values(&index.content_field).join(" ");
                let shared = words(&text).intersection(&source).count();
                (shared > 0).then_some((doc, shared))
            })
            .collect();
        similar.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(similar
            .into_iter()
            .take(limit)
            .filter_map(|(doc, shared)| corpus.hit(doc, shared as f32))
            .collect())
    }

    fn object_exists(&self, hit: &SearchHit) -> bool {
        self.default_corpus()
            .and_then(|corpus| corpus.find(&hit.content_type(), &hit.pk))
            .is_some_and(|doc| doc.live)
    }
}
