//! Multi-valued query parameters and query-string reconciliation.
//!
//! Every link the browser emits (pagination, facet toggles, connection
//! switches) is a mutation of the current request's query string. The
//! helpers here copy the current parameters, apply the mutation and
//! re-encode, so no state ever lives outside the URL.

use url::form_urlencoded;

/// Ordered multi-map of decoded query parameters.
///
/// Keys may repeat (`models=a&models=b`). Single-value accessors return the
/// last value for a key, matching how browsers submit repeated fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw query string. A leading `?` is ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Last value submitted for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_list(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Distinct keys in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.pairs {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Replace every value of `key` with a single value.
    ///
    /// The new pair takes the position of the first existing occurrence, or
    /// is appended when the key is new.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.set_list(key, [value]);
    }

    pub fn set_list<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let position = self.pairs.iter().position(|(k, _)| k == key);
        self.pairs.retain(|(k, _)| k != key);
        let new_pairs: Vec<(String, String)> = values
            .into_iter()
            .map(|v| (key.to_string(), v.into()))
            .collect();
        let at = position.unwrap_or(self.pairs.len()).min(self.pairs.len());
        self.pairs.splice(at..at, new_pairs);
    }

    /// Remove every value of `key`, returning what was removed.
    pub fn remove(&mut self, key: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.pairs.retain(|(k, v)| {
            if k == key {
                removed.push(v.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove one specific value from a multi-valued key.
    pub fn remove_value(&mut self, key: &str, value: &str) {
        self.pairs.retain(|(k, v)| !(k == key && v == value));
    }

    /// Drop every key starting with any of `prefixes`.
    pub fn remove_prefixed(&mut self, prefixes: &[&str]) {
        self.pairs
            .retain(|(k, _)| !prefixes.iter().any(|p| k.starts_with(p)));
    }

    /// Form-encode without the leading `?`.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// Form-encode with the leading `?`, as used for links.
    pub fn to_query_string(&self) -> String {
        format!("?{}", self.encode())
    }
}

/// Build a query string from `current` with keys removed and overridden.
///
/// Every key starting with one of the `remove` prefixes is dropped first.
/// Then each `add` entry deletes its key when the value is `None`, or
/// overwrites it with the single given value. The result always starts with
/// `?`, even when no parameters remain.
pub fn reconcile(current: &QueryParams, add: &[(&str, Option<&str>)], remove: &[&str]) -> String {
    let mut params = current.clone();
    params.remove_prefixed(remove);
    for (key, value) in add {
        match value {
            Some(value) => params.set(key, *value),
            None => {
                params.remove(key);
            }
        }
    }
    params.to_query_string()
}
