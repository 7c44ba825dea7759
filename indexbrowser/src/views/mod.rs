//! Index and detail views.
//!
//! Views produce serializable context values; rendering belongs to the
//! caller. Expected outcomes other than a render (redirects, not-found,
//! permission denied) come back as [`IndexResponse`] or [`BrowseError`].

pub mod changelist;

pub use changelist::{ChangeList, PageLink};

use crate::backend::{BoundQuery, SearchBackend, SearchQuery, CONTENT_TYPE_FIELD, ID_FIELD};
use crate::capability::{settings_summary, BackendProfile, SchemeVersion, SettingEntry};
use crate::config::{Config, SearchConfig};
use crate::error::{BrowseError, ConfigError, Result};
use crate::facets::{AppliedFacet, FacetCandidate, FacetSummary, PAGE_VAR, POSSIBLE_FACETS};
use crate::form::{model_choices, FormSummary, SearchForm, CONNECTION_VAR, MODELS_VAR, SEARCH_VAR};
use crate::paginate::{PageError, Paginator};
use crate::querystring::{reconcile, QueryParams};
use crate::result::WrappedResult;
use crate::urls::{AdminUrls, UrlResolver};
use serde::Serialize;
use std::sync::Arc;

/// App the browser presents itself under in the console.
pub const APP_LABEL: &str = "indexbrowser";
pub const MODULE_NAME: &str = "search results";

/// Similar documents shown on the detail page.
pub const MORE_LIKE_THIS_LIMIT: usize = 5;

/// The user a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requester {
    pub name: String,
    pub is_superuser: bool,
}

impl Requester {
    pub fn new(name: impl Into<String>, is_superuser: bool) -> Self {
        Self {
            name: name.into(),
            is_superuser,
        }
    }

    /// Used when authentication is disabled.
    pub fn local_superuser() -> Self {
        Self::new("local", true)
    }
}

#[derive(Debug, Clone)]
pub struct BrowseRequest {
    /// Path the request was made to, used for redirects
    pub path: String,
    pub params: QueryParams,
    pub user: Requester,
}

impl BrowseRequest {
    pub fn new(path: impl Into<String>, params: QueryParams, user: Requester) -> Self {
        Self {
            path: path.into(),
            params,
            user,
        }
    }
}

#[derive(Debug)]
pub enum IndexResponse {
    Render(Box<IndexContext>),
    /// Location to redirect to
    Redirect(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterChoice {
    pub op: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub faceting: bool,
    pub multiple_connections: bool,
    pub valid_filters: Vec<FilterChoice>,
}

#[derive(Debug, Serialize)]
pub struct IndexContext {
    pub results: Vec<WrappedResult>,
    pub pagination_required: bool,
    /// Half-open range of 1-based page numbers
    pub page_range: (usize, usize),
    pub page_num: usize,
    pub result_count: usize,
    pub title: String,
    pub app_label: String,
    pub module_name: String,
    pub filtered: bool,
    pub form: FormSummary,
    pub form_valid: bool,
    /// Current query string without the page parameter
    pub query_string: String,
    pub search_model_count: usize,
    pub search_facet_count: usize,
    pub search_var: &'static str,
    pub page_var: &'static str,
    pub query: Option<String>,
    pub connection: Option<String>,
    pub facets: FacetSummary,
    pub applied_facets: Vec<AppliedFacet>,
    pub facet_candidates: Vec<FacetCandidate>,
    pub changelist: ChangeList,
    pub capabilities: Capabilities,
    pub version: SchemeVersion,
}

#[derive(Debug, Serialize)]
pub struct DetailContext {
    pub original: WrappedResult,
    pub title: String,
    pub app_label: String,
    pub module_name: String,
    pub settings: Vec<SettingEntry>,
    pub has_change_permission: bool,
    pub similar_objects: Vec<WrappedResult>,
    pub version: SchemeVersion,
    pub form: FormSummary,
    pub form_valid: bool,
}

#[derive(Debug, Serialize)]
pub struct ObjectContext {
    pub settings: Vec<SettingEntry>,
    pub result: Option<WrappedResult>,
    pub version: SchemeVersion,
}

/// Read-only browser over a search backend.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct ResultsBrowser {
    backend: Arc<dyn SearchBackend>,
    profile: Arc<BackendProfile>,
    urls: Arc<dyn UrlResolver>,
    search: Arc<SearchConfig>,
    per_page: usize,
    load_all: bool,
}

impl ResultsBrowser {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        profile: BackendProfile,
        urls: Arc<dyn UrlResolver>,
    ) -> Self {
        Self {
            backend,
            profile: Arc::new(profile),
            urls,
            search: Arc::new(SearchConfig::default()),
            per_page: 100,
            load_all: false,
        }
    }

    /// Detect the backend profile and read browser settings from `config`.
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn SearchBackend>,
    ) -> std::result::Result<Self, ConfigError> {
        let profile = BackendProfile::detect(&config.search)?;
        if let Some((name, _)) = profile
            .get_connections()
            .into_iter()
            .find(|(name, _)| !backend.serves_connection(name))
        {
            return Err(ConfigError::UnservedConnection(name));
        }
        Ok(Self::new(backend, profile, Arc::new(AdminUrls::new(&config.browser)))
            .with_per_page(config.results_per_page()?)
            .with_load_all(config.browser.load_all)
            .with_search_settings(config.search.clone()))
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn with_load_all(mut self, load_all: bool) -> Self {
        self.load_all = load_all;
        self
    }

    pub fn with_search_settings(mut self, search: SearchConfig) -> Self {
        self.search = Arc::new(search);
        self
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    fn check_permission(&self, user: &Requester) -> Result<()> {
        if user.is_superuser {
            Ok(())
        } else {
            tracing::info!(user = %user.name, "Refusing non-superuser");
            Err(BrowseError::PermissionDenied("Not a superuser".to_string()))
        }
    }

    fn form(&self, params: &QueryParams) -> SearchForm<'_> {
        let mut form =
            SearchForm::new(self.backend.as_ref(), &self.profile, self.load_all).bind_if_present(params);
        form.validate();
        form
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            faceting: self.profile.supports_faceting(),
            multiple_connections: self.profile.supports_multiple_connections(),
            valid_filters: self
                .profile
                .get_valid_filters(self.backend.as_ref())
                .into_iter()
                .map(|(op, label)| FilterChoice { op, label })
                .collect(),
        }
    }

    /// List every search result, narrowed by the request parameters.
    ///
    /// A request without `models` is redirected to one selecting every
    /// indexed model, starting from the first page.
    pub fn index(&self, request: &BrowseRequest) -> Result<IndexResponse> {
        self.check_permission(&request.user)?;
        let params = &request.params;
        let form = self.form(params);

        let available = model_choices(&self.backend.indexed_models());
        if available.is_empty() {
            return Err(BrowseError::NoIndexes);
        }

        if !params.contains_key(MODELS_VAR) {
            let mut next = params.clone();
            next.remove(PAGE_VAR);
            next.append(PAGE_VAR, crate::form::MIN_PAGE.to_string());
            for choice in &available {
                next.append(MODELS_VAR, choice.value.as_str());
            }
            if form.has_multiple_connections() {
                next.append(CONNECTION_VAR, form.initial_connection());
            }
            let location = format!("{}{}", request.path, next.to_query_string());
            tracing::info!(%location, "No models selected, redirecting");
            return Ok(IndexResponse::Redirect(location));
        }

        let query = form.search();
        tracing::debug!(ops = query.ops().len(), "Running search");
        let paginator = Paginator::new(BoundQuery::new(self.backend.as_ref(), query), self.per_page)
            .map_err(|e| {
                tracing::error!(error = %e, "Search backend failed while counting results");
                BrowseError::Backend(e)
            })?;

        let page_no = form.page();
        let Some(number) = page_no.checked_add(1) else {
            tracing::info!(page = page_no, "Page number out of range");
            return Err(BrowseError::InvalidPage(format!(
                "{page_no}: page contains no results"
            )));
        };
        let page = match paginator.page(number) {
            Ok(page) => page,
            Err(PageError::InvalidPage { number, reason }) => {
                tracing::info!(page = number, reason, "Invalid page requested");
                return Err(BrowseError::InvalidPage(format!("{number}: {reason}")));
            }
            Err(PageError::Cursor(e)) => {
                tracing::error!(error = %e, "Search backend failed while fetching a page");
                return Err(BrowseError::Backend(e));
            }
        };

        let cleaned = form.cleaned_params();
        let facet_counts = paginator.cursor().facet_counts().map_err(|e| {
            tracing::error!(error = %e, "Search backend failed while counting facets");
            BrowseError::Backend(e)
        })?;
        let facets = FacetSummary::new(&facet_counts, &cleaned);

        let changelist = ChangeList::new(
            params,
            page.number,
            paginator.num_pages(),
            paginator.count(),
            self.per_page,
        );

        tracing::info!(
            results = paginator.count(),
            page = page.number,
            "Rendering search results"
        );

        let context = IndexContext {
            pagination_required: page.has_other_pages(),
            page_range: (1, paginator.num_pages() + 1),
            page_num: page.number,
            result_count: paginator.count(),
            results: WrappedResult::wrap_all(page.object_list, self.urls.as_ref()),
            title: MODULE_NAME.to_string(),
            app_label: APP_LABEL.to_string(),
            module_name: MODULE_NAME.to_string(),
            filtered: true,
            form_valid: form.is_valid(),
            form: form.summary(),
            query_string: reconcile(params, &[(PAGE_VAR, None)], &[]),
            search_model_count: cleaned.get_list(MODELS_VAR).len(),
            search_facet_count: cleaned.get_list(POSSIBLE_FACETS).len(),
            search_var: SEARCH_VAR,
            page_var: PAGE_VAR,
            query: params.get(SEARCH_VAR).map(str::to_string),
            connection: params.get(CONNECTION_VAR).map(str::to_string),
            facets,
            applied_facets: form.applied_facets(),
            facet_candidates: form.facet_candidates(),
            changelist,
            capabilities: self.capabilities(),
            version: self.profile.version(),
        };
        Ok(IndexResponse::Render(Box::new(context)))
    }

    fn lookup_query(content_type: &str, pk: &str) -> SearchQuery {
        SearchQuery::all()
            .filter(ID_FIELD, pk)
            .filter(CONTENT_TYPE_FIELD, content_type)
    }

    /// Show one indexed document by `app_label.model_name` and primary key.
    pub fn view(
        &self,
        user: &Requester,
        content_type: &str,
        pk: &str,
        params: &QueryParams,
    ) -> Result<DetailContext> {
        self.check_permission(user)?;
        let key = (content_type, pk);
        let hit = match self.backend.fetch(&Self::lookup_query(content_type, pk), 0, 1) {
            Ok(hits) => hits.into_iter().next(),
            Err(e) => {
                tracing::warn!(error = %e, content_type, pk, "Search backend failed during lookup");
                return Err(BrowseError::NotFound(format!("{e} while trying query {key:?}")));
            }
        };
        let Some(hit) = hit else {
            return Err(BrowseError::NotFound(format!(
                "Search result using query {key:?} does not exist"
            )));
        };

        let similar = if self.backend.object_exists(&hit) {
            match self.backend.more_like_this(&hit, MORE_LIKE_THIS_LIMIT) {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(error = %e, "More-like-this lookup failed");
                    Vec::new()
                }
            }
        } else {
            tracing::debug!(content_type, pk, "Indexed object no longer exists");
            Vec::new()
        };

        let original = WrappedResult::new(hit, self.urls.as_ref());
        let form = self.form(params);
        Ok(DetailContext {
            title: format!("View stored data for this {}", original.verbose_name),
            original,
            app_label: APP_LABEL.to_string(),
            module_name: MODULE_NAME.to_string(),
            settings: settings_summary(&self.search),
            has_change_permission: user.is_superuser,
            similar_objects: WrappedResult::wrap_all(similar, self.urls.as_ref()),
            version: self.profile.version(),
            form_valid: form.is_valid(),
            form: form.summary(),
        })
    }

    /// Settings plus the indexed document for a model instance, if any.
    pub fn for_object(
        &self,
        user: &Requester,
        app_label: &str,
        model_name: &str,
        pk: &str,
    ) -> Result<ObjectContext> {
        self.check_permission(user)?;
        let content_type = format!("{app_label}.{}", model_name.to_lowercase());
        let hits = self
            .backend
            .fetch(&Self::lookup_query(&content_type, pk), 0, 1)?;
        Ok(ObjectContext {
            settings: settings_summary(&self.search),
            result: hits
                .into_iter()
                .next()
                .map(|hit| WrappedResult::new(hit, self.urls.as_ref())),
            version: self.profile.version(),
        })
    }
}
