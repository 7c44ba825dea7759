//! indexbrowser - a read-only console for inspecting full-text search indexes
//!
//! The browser lists indexed documents with free-text search, model and
//! connection selection, and facet narrowing, and shows the stored data of
//! single documents. It talks to the search engine through the
//! [`backend::SearchBackend`] seam and to the host admin console through
//! [`urls::UrlResolver`]; [`api`] serves the views over HTTP.

pub mod api;
pub mod backend;
pub mod capability;
pub mod config;
pub mod error;
pub mod facets;
pub mod form;
pub mod paginate;
pub mod querystring;
pub mod result;
pub mod urls;
pub mod views;

pub use backend::{MemoryBackend, SearchBackend, SearchQuery};
pub use capability::{BackendProfile, SchemeVersion};
pub use config::Config;
pub use error::{BackendError, BrowseError, ConfigError, Result};
pub use querystring::{reconcile, QueryParams};
pub use views::{BrowseRequest, IndexResponse, Requester, ResultsBrowser};
