//! Bearer API-key authentication.
//!
//! Each configured key maps to a named [`Requester`]; the superuser flag on
//! the key decides whether the browser views let it in. With security
//! disabled every request runs as [`Requester::local_superuser`].

use crate::config::SecurityConfig;
use crate::views::Requester;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::collections::HashMap;
use std::sync::Arc;

/// Paths served without credentials
const AUTH_WHITELIST: &[&str] = &["/health"];

pub struct ApiKeys {
    enabled: bool,
    keys: HashMap<String, Requester>,
}

impl ApiKeys {
    pub fn new(config: &SecurityConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|k| (k.key.clone(), Requester::new(k.name.clone(), k.superuser)))
            .collect();
        Self {
            enabled: config.enabled,
            keys,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn authenticate(&self, api_key: &str) -> Option<Requester> {
        self.keys.get(api_key).cloned()
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn is_whitelisted(path: &str) -> bool {
    AUTH_WHITELIST.contains(&path)
}

pub async fn auth_middleware(
    keys: Arc<ApiKeys>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path();
    if is_whitelisted(path) {
        return Ok(next.run(request).await);
    }

    let user = if keys.is_enabled() {
        let Some(api_key) = bearer_token(&request) else {
            return Err(StatusCode::UNAUTHORIZED);
        };
        match keys.authenticate(api_key) {
            Some(user) => user,
            None => {
                tracing::warn!("Rejected unknown API key");
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
    } else {
        Requester::local_superuser()
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
