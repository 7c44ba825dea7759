//! The search request form.
//!
//! A form starts unbound, is bound to request parameters, then validated.
//! Invalid or unbound forms never fail a search: they broaden to every
//! indexed document.

use crate::backend::{IndexedModel, SearchBackend, SearchQuery};
use crate::capability::{BackendProfile, DEFAULT_CONNECTION};
use crate::facets::{
    is_selectable_token, AppliedFacet, FacetCandidate, PAGE_VAR, POSSIBLE_FACETS,
    SELECTED_FACETS,
};
use crate::querystring::QueryParams;
use serde::Serialize;
use std::collections::BTreeMap;

pub const SEARCH_VAR: &str = "q";
pub const MODELS_VAR: &str = "models";
pub const CONNECTION_VAR: &str = "connection";

/// Smallest accepted page number.
pub const MIN_PAGE: usize = 0;

const NON_FIELD_ERRORS: &str = "__all__";

/// Values that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedSearch {
    pub q: String,
    pub models: Vec<String>,
    pub connection: Option<String>,
    pub possible_facets: Vec<String>,
    pub selected_facets: Vec<String>,
    pub page: usize,
}

impl CleanedSearch {
    /// Re-encode the cleaned values as query parameters.
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if !self.q.is_empty() {
            params.append(SEARCH_VAR, self.q.as_str());
        }
        for model in &self.models {
            params.append(MODELS_VAR, model.as_str());
        }
        if let Some(connection) = &self.connection {
            params.append(CONNECTION_VAR, connection.as_str());
        }
        for field in &self.possible_facets {
            params.append(POSSIBLE_FACETS, field.as_str());
        }
        for token in &self.selected_facets {
            params.append(SELECTED_FACETS, token.as_str());
        }
        params.append(PAGE_VAR, self.page.to_string());
        params
    }
}

/// Field name -> messages. `__all__` holds cross-field errors.
pub type FormErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Unbound,
    Bound(QueryParams),
    Valid {
        params: QueryParams,
        cleaned: CleanedSearch,
    },
    Invalid {
        params: QueryParams,
        errors: FormErrors,
    },
}

/// A `(value, label)` pair offered by a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

pub struct SearchForm<'a> {
    backend: &'a dyn SearchBackend,
    profile: &'a BackendProfile,
    load_all: bool,
    model_choices: Vec<Choice>,
    facet_choices: Vec<String>,
    connection_choices: Vec<Choice>,
    state: FormState,
}

impl<'a> SearchForm<'a> {
    /// An unbound form with its choice lists populated.
    pub fn new(backend: &'a dyn SearchBackend, profile: &'a BackendProfile, load_all: bool) -> Self {
        let facet_choices = if profile.supports_faceting() {
            backend.facet_fieldnames()
        } else {
            Vec::new()
        };
        let connection_choices = if profile.supports_multiple_connections() {
            profile
                .get_connections()
                .into_iter()
                .map(|(value, label)| Choice { value, label })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            backend,
            profile,
            load_all,
            model_choices: model_choices(&backend.indexed_models()),
            facet_choices,
            connection_choices,
            state: FormState::Unbound,
        }
    }

    /// Bind to request parameters. Validation happens in [`Self::validate`].
    pub fn bind(mut self, params: &QueryParams) -> Self {
        self.state = FormState::Bound(params.clone());
        self
    }

    /// Bind when there is anything to bind to, as the views do.
    pub fn bind_if_present(self, params: &QueryParams) -> Self {
        if params.is_empty() {
            self
        } else {
            self.bind(params)
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self.state, FormState::Unbound)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, FormState::Valid { .. })
    }

    pub fn errors(&self) -> Option<&FormErrors> {
        match &self.state {
            FormState::Invalid { errors, .. } => Some(errors),
            _ => None,
        }
    }

    pub fn cleaned(&self) -> Option<&CleanedSearch> {
        match &self.state {
            FormState::Valid { cleaned, .. } => Some(cleaned),
            _ => None,
        }
    }

    pub fn model_choices(&self) -> &[Choice] {
        &self.model_choices
    }

    pub fn facet_choices(&self) -> &[String] {
        &self.facet_choices
    }

    pub fn connection_choices(&self) -> &[Choice] {
        &self.connection_choices
    }

    pub fn has_multiple_connections(&self) -> bool {
        !self.connection_choices.is_empty()
    }

    /// Initial value of the connection field.
    pub fn initial_connection(&self) -> &'static str {
        DEFAULT_CONNECTION
    }

    /// Run validation on a bound form. Returns whether it is valid.
    ///
    /// Unbound forms stay unbound; validating twice is a no-op.
    pub fn validate(&mut self) -> bool {
        let params = match &self.state {
            FormState::Bound(params) => params.clone(),
            _ => return self.is_valid(),
        };
        self.state = match self.clean(&params) {
            Ok(cleaned) => FormState::Valid { params, cleaned },
            Err(errors) => {
                tracing::debug!(?errors, "Search form failed validation");
                FormState::Invalid { params, errors }
            }
        };
        self.is_valid()
    }

    fn clean(&self, params: &QueryParams) -> Result<CleanedSearch, FormErrors> {
        let mut errors = FormErrors::new();

        let q = params.get(SEARCH_VAR).unwrap_or_default().trim().to_string();

        let models = self.clean_choices(
            params,
            MODELS_VAR,
            |v| self.model_choices.iter().any(|c| c.value == v),
            &mut errors,
        );

        let connection = match params.get(CONNECTION_VAR).filter(|c| !c.is_empty()) {
            Some(c) if self.connection_choices.iter().any(|choice| choice.value == c) => {
                Some(c.to_string())
            }
            Some(c) if self.has_multiple_connections() => {
                push_error(&mut errors, CONNECTION_VAR, invalid_choice(c));
                None
            }
            // single-connection setups have no connection field to submit
            _ => None,
        };

        let possible_facets = self.clean_choices(
            params,
            POSSIBLE_FACETS,
            |v| self.facet_choices.iter().any(|f| f == v),
            &mut errors,
        );

        let selected_facets = self.clean_choices(
            params,
            SELECTED_FACETS,
            |v| is_selectable_token(v, &self.facet_choices),
            &mut errors,
        );

        let page = coerce_page(params.get(PAGE_VAR));

        if !selected_facets.is_empty() && possible_facets.is_empty() {
            push_error(
                &mut errors,
                NON_FIELD_ERRORS,
                "Facets were selected for narrowing, but no facet fields were requested; \
                 select the matching possible facets as well"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(CleanedSearch {
                q,
                models,
                connection,
                possible_facets,
                selected_facets,
                page,
            })
        } else {
            Err(errors)
        }
    }

    fn clean_choices(
        &self,
        params: &QueryParams,
        key: &str,
        is_valid: impl Fn(&str) -> bool,
        errors: &mut FormErrors,
    ) -> Vec<String> {
        let mut cleaned = Vec::new();
        for value in params.get_list(key) {
            if is_valid(value) {
                if !cleaned.iter().any(|c: &String| c == value) {
                    cleaned.push(value.to_string());
                }
            } else {
                push_error(errors, key, invalid_choice(value));
            }
        }
        cleaned
    }

    /// Cleaned values as query parameters; empty unless the form is valid.
    pub fn cleaned_params(&self) -> QueryParams {
        self.cleaned()
            .map(CleanedSearch::to_params)
            .unwrap_or_default()
    }

    /// Requested 0-based page.
    ///
    /// Taken from the cleaned values when valid, otherwise coerced from the
    /// raw parameter. Malformed input becomes [`MIN_PAGE`].
    pub fn page(&self) -> usize {
        match &self.state {
            FormState::Valid { cleaned, .. } => cleaned.page,
            FormState::Bound(params) | FormState::Invalid { params, .. } => {
                coerce_page(params.get(PAGE_VAR))
            }
            FormState::Unbound => MIN_PAGE,
        }
    }

    /// Facets currently narrowing the search.
    pub fn applied_facets(&self) -> Vec<AppliedFacet> {
        match self.cleaned() {
            Some(cleaned) => {
                let params = cleaned.to_params();
                cleaned
                    .selected_facets
                    .iter()
                    .filter_map(|token| AppliedFacet::parse(token, &params))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Facet fields offered for counting, linked against the current state.
    pub fn facet_candidates(&self) -> Vec<FacetCandidate> {
        let params = self.cleaned_params();
        self.facet_choices
            .iter()
            .map(|field| FacetCandidate::new(field.as_str(), &params))
            .collect()
    }

    /// Build the query for the current state.
    ///
    /// Steps are applied in a fixed order because some backends are
    /// sensitive to clause order: connection, narrows, facet requests,
    /// model restriction, free text, eager load.
    pub fn search(&self) -> SearchQuery {
        let Some(cleaned) = self.cleaned() else {
            return SearchQuery::all();
        };
        let mut query = SearchQuery::all();

        if self.profile.supports_multiple_connections() {
            if let Some(connection) = &cleaned.connection {
                query = query.using(connection.as_str());
            }
        }

        for facet in self.applied_facets() {
            let expression = facet.narrow_expression(|value| self.backend.clean(value));
            tracing::debug!(%expression, "Narrowing search");
            query = query.narrow(expression);
        }

        for field in &cleaned.possible_facets {
            query = query.facet(field.as_str());
        }

        if !cleaned.models.is_empty() {
            query = query.models(cleaned.models.clone());
        }

        if !cleaned.q.is_empty() {
            query = query.auto_query(cleaned.q.as_str());
        }

        if self.load_all {
            query = query.load_all();
        }

        query
    }

    /// Serializable snapshot for the display context.
    pub fn summary(&self) -> FormSummary {
        let (values, errors) = match &self.state {
            FormState::Unbound => (QueryParams::new(), FormErrors::new()),
            FormState::Bound(params) | FormState::Valid { params, .. } => {
                (params.clone(), FormErrors::new())
            }
            FormState::Invalid { params, errors } => (params.clone(), errors.clone()),
        };
        let selected = |key: &str, value: &str| values.get_list(key).contains(&value);
        FormSummary {
            bound: self.is_bound(),
            valid: self.is_valid(),
            q: values.get(SEARCH_VAR).unwrap_or_default().to_string(),
            models: self
                .model_choices
                .iter()
                .map(|c| SummaryChoice::new(c, selected(MODELS_VAR, &c.value)))
                .collect(),
            connections: self
                .connection_choices
                .iter()
                .map(|c| {
                    let chosen = match values.get(CONNECTION_VAR) {
                        Some(v) => v == c.value,
                        None => c.value == DEFAULT_CONNECTION,
                    };
                    SummaryChoice::new(c, chosen)
                })
                .collect(),
            possible_facets: self
                .facet_candidates()
                .iter()
                .map(|f| SummaryChoice {
                    value: f.fieldname().to_string(),
                    label: f.label(),
                    selected: selected(POSSIBLE_FACETS, f.fieldname()),
                })
                .collect(),
            selected_facets: values
                .get_list(SELECTED_FACETS)
                .into_iter()
                .map(str::to_string)
                .collect(),
            page: self.page(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryChoice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SummaryChoice {
    fn new(choice: &Choice, selected: bool) -> Self {
        Self {
            value: choice.value.clone(),
            label: choice.label.clone(),
            selected,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSummary {
    pub bound: bool,
    pub valid: bool,
    pub q: String,
    pub models: Vec<SummaryChoice>,
    pub connections: Vec<SummaryChoice>,
    pub possible_facets: Vec<SummaryChoice>,
    pub selected_facets: Vec<String>,
    pub page: usize,
    pub errors: FormErrors,
}

/// `(app_label.model_name, Verbose names)` sorted by label.
pub fn model_choices(models: &[IndexedModel]) -> Vec<Choice> {
    let mut choices: Vec<Choice> = models
        .iter()
        .map(|m| Choice {
            value: m.content_type(),
            label: capitalize(&m.verbose_name_plural),
        })
        .collect();
    choices.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.value.cmp(&b.value)));
    choices
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parse a 0-based page parameter, falling back to [`MIN_PAGE`].
pub fn coerce_page(raw: Option<&str>) -> usize {
    raw.and_then(|p| p.trim().parse::<usize>().ok())
        .unwrap_or(MIN_PAGE)
}

fn invalid_choice(value: &str) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}

fn push_error(errors: &mut FormErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, QueryOp};
    use crate::config::Config;

    fn faceting_profile() -> BackendProfile {
        let config = Config::from_toml("[search]\nsearch_engine = \"solr\"").unwrap();
        BackendProfile::detect(&config.search).unwrap()
    }

    fn multi_profile() -> BackendProfile {
        let config = Config::from_toml(
            r#"
            [search.connections.default]
            engine = "solr"

            [search.connections.archive]
            engine = "whoosh"
            "#,
        )
        .unwrap();
        BackendProfile::detect(&config.search).unwrap()
    }

    fn backend() -> MemoryBackend {
        MemoryBackend::sample()
    }

    #[test]
    fn test_unbound_form_searches_everything() {
        let backend = backend();
        let profile = faceting_profile();
        let form = SearchForm::new(&backend, &profile, false);
        assert!(!form.is_bound());
        assert!(!form.is_valid());
        assert_eq!(form.search(), SearchQuery::all());
    }

    #[test]
    fn test_choices_follow_capabilities() {
        let backend = backend();
        let profile = faceting_profile();
        let form = SearchForm::new(&backend, &profile, false);
        assert_eq!(form.facet_choices(), &["author".to_string(), "color".to_string()]);
        assert!(form.connection_choices().is_empty());

        let plain = BackendProfile::detect(&Default::default()).unwrap();
        let form = SearchForm::new(&backend, &plain, false);
        assert!(form.facet_choices().is_empty());

        let profile = multi_profile();
        let form = SearchForm::new(&backend, &profile, false);
        assert_eq!(form.connection_choices().len(), 2);
        assert!(form.has_multiple_connections());
    }

    #[test]
    fn test_model_choices_sorted_by_label() {
        let backend = backend();
        let profile = faceting_profile();
        let form = SearchForm::new(&backend, &profile, false);
        let labels: Vec<&str> = form.model_choices().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Comments", "Posts"]);
    }

    #[test]
    fn test_selected_without_possible_is_invalid() {
        let backend = backend();
        let profile = faceting_profile();
        let params = QueryParams::parse("selected_facets=color:red");
        let mut form = SearchForm::new(&backend, &profile, false).bind(&params);
        assert!(!form.validate());
        let errors = form.errors().unwrap();
        assert!(errors.contains_key(NON_FIELD_ERRORS));

        let unbound = SearchForm::new(&backend, &profile, false);
        assert_eq!(form.search(), unbound.search());
    }

    #[test]
    fn test_unknown_facet_field_rejected() {
        let backend = backend();
        let profile = faceting_profile();
        let params = QueryParams::parse("possible_facets=size&selected_facets=size:xl");
        let mut form = SearchForm::new(&backend, &profile, false).bind(&params);
        assert!(!form.validate());
        let errors = form.errors().unwrap();
        assert!(errors.contains_key(POSSIBLE_FACETS));
        assert!(errors.contains_key(SELECTED_FACETS));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let backend = backend();
        let profile = faceting_profile();
        let params = QueryParams::parse("models=shop.item");
        let mut form = SearchForm::new(&backend, &profile, false).bind(&params);
        assert!(!form.validate());
        assert!(form.errors().unwrap().contains_key(MODELS_VAR));
        assert!(form.cleaned_params().is_empty());
    }

    #[test]
    fn test_valid_search_applies_steps_in_order() {
        let backend = backend();
        let profile = multi_profile();
        let params = QueryParams::parse(
            "q=hello&models=blog.post&connection=archive\
             &possible_facets=author&selected_facets=author:ann&p=2",
        );
        let faceting = faceting_profile();
        let mut form = SearchForm::new(&backend, &faceting, true).bind(&params);
        // no connection field on a single-connection setup
        assert!(form.validate());
        assert_eq!(form.page(), 2);
        let ops = form.search().ops().to_vec();
        assert_eq!(
            ops,
            vec![
                QueryOp::Narrow {
                    expression: "author:\"ann\"".into()
                },
                QueryOp::Facet {
                    field: "author".into()
                },
                QueryOp::Models {
                    models: vec!["blog.post".into()]
                },
                QueryOp::AutoQuery { text: "hello".into() },
                QueryOp::LoadAll,
            ]
        );

        let mut form = SearchForm::new(&backend, &profile, false)
            .bind(&QueryParams::parse("connection=archive&models=blog.post"));
        assert!(form.validate());
        assert_eq!(
            form.search().ops().first(),
            Some(&QueryOp::Using {
                connection: "archive".into()
            })
        );
    }

    #[test]
    fn test_unknown_connection_rejected() {
        let backend = backend();
        let profile = multi_profile();
        let mut form = SearchForm::new(&backend, &profile, false)
            .bind(&QueryParams::parse("connection=nowhere"));
        assert!(!form.validate());
        assert!(form.errors().unwrap().contains_key(CONNECTION_VAR));
    }

    #[test]
    fn test_narrow_values_are_cleaned() {
        let backend = backend();
        let profile = faceting_profile();
        let params =
            QueryParams::parse("possible_facets=author&selected_facets=author:a(b)");
        let mut form = SearchForm::new(&backend, &profile, false).bind(&params);
        assert!(form.validate());
        assert_eq!(
            form.search().ops()[0],
            QueryOp::Narrow {
                expression: "author:\"a\\(b\\)\"".into()
            }
        );
    }

    #[test]
    fn test_blank_query_is_not_applied() {
        let backend = backend();
        let profile = faceting_profile();
        let mut form =
            SearchForm::new(&backend, &profile, false).bind(&QueryParams::parse("q=+++"));
        assert!(form.validate());
        assert_eq!(form.search(), SearchQuery::all());
    }

    #[test]
    fn test_page_coercion() {
        assert_eq!(coerce_page(Some("abc")), 0);
        assert_eq!(coerce_page(Some("-3")), 0);
        assert_eq!(coerce_page(Some(" 4 ")), 4);
        assert_eq!(coerce_page(None), 0);

        let backend = backend();
        let profile = faceting_profile();
        let mut form =
            SearchForm::new(&backend, &profile, false).bind(&QueryParams::parse("p=abc"));
        assert!(form.validate());
        assert_eq!(form.page(), 0);
    }

    #[test]
    fn test_applied_facets_from_cleaned_data() {
        let backend = backend();
        let profile = faceting_profile();
        let params = QueryParams::parse(
            "possible_facets=author&possible_facets=color\
             &selected_facets=author:ann&selected_facets=color:red",
        );
        let mut form = SearchForm::new(&backend, &profile, false).bind(&params);
        assert!(form.validate());
        let applied: Vec<String> = form
            .applied_facets()
            .iter()
            .map(|f| f.token().to_string())
            .collect();
        assert_eq!(applied, vec!["author:ann", "color:red"]);
    }

    #[test]
    fn test_summary_reports_errors() {
        let backend = backend();
        let profile = faceting_profile();
        let mut form = SearchForm::new(&backend, &profile, false)
            .bind(&QueryParams::parse("selected_facets=color:red&q=x"));
        form.validate();
        let summary = form.summary();
        assert!(summary.bound);
        assert!(!summary.valid);
        assert_eq!(summary.q, "x");
        assert_eq!(summary.selected_facets, vec!["color:red"]);
        assert!(summary.errors.contains_key(NON_FIELD_ERRORS));
    }
}
