//! Display-ready wrapper over a raw search hit.

use crate::backend::SearchHit;
use crate::urls::{Route, UrlResolver};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A field value in raw and display-safe form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    /// Text form, trimmed
    pub raw: String,
    /// Tags stripped, then HTML-escaped
    pub safe: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_attr: Option<String>,
}

impl FieldValue {
    fn new(value: Option<&Value>, model_attr: Option<String>) -> Self {
        let raw = value_text(value).trim().to_string();
        let safe = escape_html(&strip_tags(&raw));
        Self {
            raw,
            safe,
            model_attr,
        }
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| value_text(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static tag pattern is valid"))
}

pub fn strip_tags(text: &str) -> String {
    tag_pattern().replace_all(text, "").into_owned()
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// One search hit prepared for display.
///
/// Link fields are `None` whenever the console has no matching page. Any
/// attribute not exposed here is reachable through [`WrappedResult::get`].
#[derive(Debug, Clone, Serialize)]
pub struct WrappedResult {
    pub content_type: String,
    pub app_label: String,
    pub model_name: String,
    pub pk: String,
    pub score: f32,
    pub verbose_name: String,
    pub stored_fields: BTreeMap<String, FieldValue>,
    pub additional_fields: BTreeMap<String, FieldValue>,
    pub content_field: String,
    pub app_url: Option<String>,
    pub model_url: Option<String>,
    pub pk_url: Option<String>,
    pub detail_url: Option<String>,
    #[serde(skip)]
    hit: SearchHit,
}

impl WrappedResult {
    pub fn new(hit: SearchHit, urls: &dyn UrlResolver) -> Self {
        let stored_fields: BTreeMap<String, FieldValue> = hit
            .stored_fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    FieldValue::new(hit.fields.get(&field.name), field.model_attr.clone()),
                )
            })
            .collect();
        let additional_fields = hit
            .fields
            .iter()
            .filter(|(name, _)| !stored_fields.contains_key(*name))
            .map(|(name, value)| (name.clone(), FieldValue::new(Some(value), None)))
            .collect();

        let content_type = hit.content_type();
        let app_url = urls.reverse(Route::AppList {
            app_label: &hit.app_label,
        });
        let model_url = urls.reverse(Route::Changelist {
            app_label: &hit.app_label,
            model_name: &hit.model_name,
        });
        let pk_url = urls.reverse(Route::Change {
            app_label: &hit.app_label,
            model_name: &hit.model_name,
            pk: &hit.pk,
        });
        let detail_url = urls.reverse(Route::Detail {
            content_type: &content_type,
            pk: &hit.pk,
        });
        if model_url.is_none() {
            tracing::trace!(content_type = %content_type, "No console page for model");
        }

        Self {
            content_type,
            app_label: hit.app_label.clone(),
            model_name: hit.model_name.clone(),
            pk: hit.pk.clone(),
            score: hit.score,
            verbose_name: hit.verbose_name.clone(),
            stored_fields,
            additional_fields,
            content_field: hit.content_field.clone(),
            app_url,
            model_url,
            pk_url,
            detail_url,
            hit,
        }
    }

    pub fn wrap_all(hits: Vec<SearchHit>, urls: &dyn UrlResolver) -> Vec<Self> {
        hits.into_iter().map(|hit| Self::new(hit, urls)).collect()
    }

    /// Value of the index's main content field.
    pub fn get_content(&self) -> Option<&Value> {
        self.hit.fields.get(&self.content_field)
    }

    pub fn stored_field_count(&self) -> usize {
        self.stored_fields.len()
    }

    pub fn additional_field_count(&self) -> usize {
        self.additional_fields.len()
    }

    /// Pass-through to the wrapped hit for anything not exposed above.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.hit.attribute(name)
    }

    pub fn hit(&self) -> &SearchHit {
        &self.hit
    }
}
