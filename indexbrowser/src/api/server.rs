use super::auth::{auth_middleware, ApiKeys};
use super::routes;
use crate::config::{Config, CorsConfig};
use crate::views::ResultsBrowser;
use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::{self, Next},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    browser: ResultsBrowser,
    keys: Arc<ApiKeys>,
    cors_config: CorsConfig,
    mount_path: String,
}

impl ApiServer {
    pub fn new(browser: ResultsBrowser, config: &Config) -> Self {
        let mut mount_path = config.browser.mount_path.clone();
        if !mount_path.starts_with('/') {
            mount_path.insert(0, '/');
        }
        if !mount_path.ends_with('/') {
            mount_path.push('/');
        }
        Self {
            browser,
            keys: Arc::new(ApiKeys::new(&config.security)),
            cors_config: config.server.cors.clone(),
            mount_path,
        }
    }

    /// Build CORS layer from configuration
    fn build_cors_layer(&self) -> CorsLayer {
        if !self.cors_config.enabled {
            return CorsLayer::new();
        }

        let origins: Vec<HeaderValue> = self
            .cors_config
            .origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect();
        let has_wildcard = self.cors_config.origins.iter().any(|o| o == "*");

        let cors = if has_wildcard {
            CorsLayer::new().allow_origin(tower_http::cors::Any)
        } else if origins.is_empty() {
            CorsLayer::new()
        } else {
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }

    pub fn router(&self) -> Router {
        let mount = &self.mount_path;
        let browse_routes = Router::new()
            .route(mount, get(routes::index))
            .route(&format!("{mount}_object/:app_label/:model_name/:pk"), get(routes::object))
            .route(&format!("{mount}:content_type/:pk/"), get(routes::detail))
            .with_state(self.browser.clone());

        let keys = self.keys.clone();
        Router::new()
            .merge(browse_routes)
            .route("/health", get(routes::health))
            .layer(middleware::from_fn(move |req: Request, next: Next| {
                auth_middleware(keys.clone(), req, next)
            }))
            .layer(self.build_cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self, addr: &str) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Index browser listening on {}{}", addr, self.mount_path);
        axum::serve(listener, self.router()).await
    }
}
