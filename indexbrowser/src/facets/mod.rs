//! Facet values and candidates, and the URL state that toggles them.

pub mod counts;

pub use counts::{FacetEntry, FacetSummary};

use crate::querystring::QueryParams;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub const SELECTED_FACETS: &str = "selected_facets";
pub const POSSIBLE_FACETS: &str = "possible_facets";
pub const PAGE_VAR: &str = "p";

/// A `field:value` narrow currently applied to the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFacet {
    field: String,
    value: String,
    token: String,
    params: QueryParams,
}

impl AppliedFacet {
    /// Split a raw `field:value` token. Tokens without a colon, or with an
    /// empty field, yield nothing.
    pub fn parse(token: &str, params: &QueryParams) -> Option<Self> {
        let (field, value) = token.split_once(':')?;
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            value: value.to_string(),
            token: token.to_string(),
            params: params.clone(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Query string that narrows to this facet alone.
    pub fn link(&self) -> String {
        let mut params = self.params.clone();
        params.set(SELECTED_FACETS, self.token.as_str());
        params.set(POSSIBLE_FACETS, self.field.as_str());
        params.remove(PAGE_VAR);
        params.to_query_string()
    }

    /// Query string with this facet removed from the applied set.
    pub fn remove_link(&self) -> String {
        let mut params = self.params.clone();
        params.remove_value(SELECTED_FACETS, &self.token);
        params.remove(PAGE_VAR);
        params.to_query_string()
    }

    /// Backend narrow expression, with the value passed through `clean`.
    pub fn narrow_expression(&self, clean: impl Fn(&str) -> String) -> String {
        format!("{}:\"{}\"", self.field, clean(&self.value))
    }
}

impl Serialize for AppliedFacet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("AppliedFacet", 5)?;
        s.serialize_field("field", &self.field)?;
        s.serialize_field("value", &self.value)?;
        s.serialize_field("token", &self.token)?;
        s.serialize_field("link", &self.link())?;
        s.serialize_field("remove_link", &self.remove_link())?;
        s.end()
    }
}

/// Whether a submitted `selected_facets` token may be applied.
///
/// The token must be at least three characters, contain a colon that is
/// neither first nor last, and name one of the `offered` facet fields.
pub fn is_selectable_token(token: &str, offered: &[String]) -> bool {
    if token.chars().count() < 3 {
        return false;
    }
    match token.find(':') {
        Some(0) | None => false,
        Some(idx) if idx == token.len() - 1 => false,
        Some(idx) => offered.iter().any(|f| f == &token[..idx]),
    }
}

/// A field the backend can compute facet counts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCandidate {
    fieldname: String,
    params: QueryParams,
}

impl FacetCandidate {
    pub fn new(fieldname: impl Into<String>, params: &QueryParams) -> Self {
        Self {
            fieldname: fieldname.into(),
            params: params.clone(),
        }
    }

    pub fn fieldname(&self) -> &str {
        &self.fieldname
    }

    /// `publication_date` -> `Publication Date`
    pub fn label(&self) -> String {
        title_case(&self.fieldname.replace('_', " "))
    }

    pub fn is_requested(&self) -> bool {
        self.params
            .get_list(POSSIBLE_FACETS)
            .contains(&self.fieldname.as_str())
    }

    /// Query string toggling this field in `possible_facets`.
    pub fn link(&self) -> String {
        let mut params = self.params.clone();
        if self.is_requested() {
            params.remove_value(POSSIBLE_FACETS, &self.fieldname);
        } else {
            params.append(POSSIBLE_FACETS, self.fieldname.as_str());
        }
        params.remove(PAGE_VAR);
        params.to_query_string()
    }
}

impl Serialize for FacetCandidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FacetCandidate", 4)?;
        s.serialize_field("fieldname", &self.fieldname)?;
        s.serialize_field("label", &self.label())?;
        s.serialize_field("requested", &self.is_requested())?;
        s.serialize_field("link", &self.link())?;
        s.end()
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
