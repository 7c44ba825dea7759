//! Display wrapper over a backend's raw facet counts.

use super::{AppliedFacet, PAGE_VAR, POSSIBLE_FACETS, SELECTED_FACETS};
use crate::backend::FacetCounts;
use crate::querystring::QueryParams;
use serde::Serialize;
use std::collections::BTreeMap;

/// One displayable `(value, count)` pair with its toggle link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetEntry {
    pub field: String,
    pub value: String,
    pub count: u64,
    /// Whether this value is currently narrowed on
    pub applied: bool,
    /// Applies the narrow, or removes it when already applied
    pub link: String,
}

impl FacetEntry {
    fn new(field: &str, value: &str, count: u64, params: &QueryParams) -> Self {
        let token = format!("{field}:{value}");
        let applied = params.get_list(SELECTED_FACETS).contains(&token.as_str());
        let link = if applied {
            match AppliedFacet::parse(&token, params) {
                Some(facet) => facet.remove_link(),
                None => params.to_query_string(),
            }
        } else {
            let mut next = params.clone();
            next.append(SELECTED_FACETS, token.as_str());
            if !next.get_list(POSSIBLE_FACETS).contains(&field) {
                next.append(POSSIBLE_FACETS, field);
            }
            next.remove(PAGE_VAR);
            next.to_query_string()
        };
        Self {
            field: field.to_string(),
            value: value.to_string(),
            count,
            applied,
            link,
        }
    }
}

type Grouped = BTreeMap<String, Vec<FacetEntry>>;

/// Facet counts filtered to displayable entries and grouped by field.
///
/// Emptiness is decided by the raw entry count across all three buckets,
/// before zero counts and blank values are dropped. A summary can therefore
/// be non-empty while emitting no entries at all.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FacetSummary {
    #[serde(rename = "count")]
    raw_len: usize,
    dates: Grouped,
    fields: Grouped,
    queries: Grouped,
}

impl FacetSummary {
    /// `params` are the cleaned request parameters; any page parameter is ignored.
    pub fn new(counts: &FacetCounts, params: &QueryParams) -> Self {
        let mut params = params.clone();
        params.remove(PAGE_VAR);
        let raw_len = [&counts.dates, &counts.fields, &counts.queries]
            .iter()
            .flat_map(|bucket| bucket.values())
            .map(Vec::len)
            .sum();
        Self {
            raw_len,
            dates: group(&counts.dates, &params),
            fields: group(&counts.fields, &params),
            queries: group(&counts.queries, &params),
        }
    }

    pub fn len(&self) -> usize {
        self.raw_len
    }

    pub fn is_empty(&self) -> bool {
        self.raw_len == 0
    }

    pub fn date_facets(&self) -> &Grouped {
        &self.dates
    }

    pub fn field_facets(&self) -> &Grouped {
        &self.fields
    }

    pub fn query_facets(&self) -> &Grouped {
        &self.queries
    }

    /// Every emitted entry: dates, then fields, then queries.
    pub fn entries(&self) -> impl Iterator<Item = &FacetEntry> {
        self.dates
            .values()
            .chain(self.fields.values())
            .chain(self.queries.values())
            .flatten()
    }
}

fn group(bucket: &BTreeMap<String, Vec<(String, u64)>>, params: &QueryParams) -> Grouped {
    let mut grouped = Grouped::new();
    for (field, values) in bucket {
        let entries: Vec<FacetEntry> = values
            .iter()
            .filter(|(value, count)| *count > 0 && !value.trim().is_empty())
            .map(|(value, count)| FacetEntry::new(field, value.trim(), *count, params))
            .collect();
        if !entries.is_empty() {
            grouped.insert(field.clone(), entries);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(fields: &[(&str, &[(&str, u64)])]) -> FacetCounts {
        FacetCounts {
            fields: fields
                .iter()
                .map(|(f, vals)| {
                    (
                        f.to_string(),
                        vals.iter().map(|(v, c)| (v.to_string(), *c)).collect(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_counts_are_dropped() {
        let summary = FacetSummary::new(
            &counts(&[("color", &[("red", 3), ("blue", 0)])]),
            &QueryParams::new(),
        );
        let entries: Vec<&FacetEntry> = summary.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "red");
        assert_eq!(entries[0].count, 3);
        assert_eq!(summary.len(), 2);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_blank_values_are_dropped() {
        let summary = FacetSummary::new(
            &counts(&[("color", &[("  ", 4), ("", 1), (" green ", 2)])]),
            &QueryParams::new(),
        );
        let values: Vec<&str> = summary.entries().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["green"]);
    }

    #[test]
    fn test_non_empty_with_nothing_displayable() {
        // Known quirk: emptiness counts raw entries, so this summary is
        // non-empty even though it emits nothing.
        let summary = FacetSummary::new(
            &counts(&[("color", &[("blue", 0)])]),
            &QueryParams::new(),
        );
        assert!(!summary.is_empty());
        assert_eq!(summary.entries().count(), 0);
        assert!(summary.field_facets().is_empty());
    }

    #[test]
    fn test_empty_counts_are_empty() {
        let summary = FacetSummary::new(&FacetCounts::default(), &QueryParams::new());
        assert!(summary.is_empty());
        assert_eq!(summary.len(), 0);
    }

    #[test]
    fn test_grouped_and_sorted_by_field() {
        let summary = FacetSummary::new(
            &counts(&[("size", &[("xl", 1)]), ("author", &[("ann", 2), ("bob", 5)])]),
            &QueryParams::new(),
        );
        let fields: Vec<&String> = summary.field_facets().keys().collect();
        assert_eq!(fields, vec!["author", "size"]);
        assert_eq!(summary.field_facets()["author"].len(), 2);
    }

    #[test]
    fn test_entry_links_toggle() {
        let params = QueryParams::parse("selected_facets=color:red&possible_facets=color&p=2");
        let summary = FacetSummary::new(
            &counts(&[("color", &[("red", 3), ("green", 1)])]),
            &params,
        );
        let entries = &summary.field_facets()["color"];

        let red = entries.iter().find(|e| e.value == "red").unwrap();
        assert!(red.applied);
        let red_link = QueryParams::parse(&red.link);
        assert!(red_link.get_list(SELECTED_FACETS).is_empty());

        let green = entries.iter().find(|e| e.value == "green").unwrap();
        assert!(!green.applied);
        let green_link = QueryParams::parse(&green.link);
        assert_eq!(
            green_link.get_list(SELECTED_FACETS),
            vec!["color:red", "color:green"]
        );
        assert_eq!(green_link.get_list(POSSIBLE_FACETS), vec!["color"]);
        assert!(!green_link.contains_key(PAGE_VAR));
    }
}
