//! Reverse-URL lookup against the host admin console.

use crate::config::BrowserConfig;
use url::Url;

/// A page the browser may link to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// The console's index for one app
    AppList { app_label: &'a str },
    /// The console's list page for one model
    Changelist { app_label: &'a str, model_name: &'a str },
    /// The console's edit page for one object
    Change {
        app_label: &'a str,
        model_name: &'a str,
        pk: &'a str,
    },
    /// This browser's own detail page for an indexed document
    Detail { content_type: &'a str, pk: &'a str },
}

/// Resolves routes to paths. `None` means the console has no such page.
pub trait UrlResolver: Send + Sync {
    fn reverse(&self, route: Route<'_>) -> Option<String>;
}

/// Resolver built from the `[browser]` configuration.
///
/// Only models listed in `registered_models` have console pages; the
/// browser's own detail page always resolves.
#[derive(Debug, Clone)]
pub struct AdminUrls {
    admin_path: String,
    mount_path: String,
    registered: Vec<(String, String)>,
}

impl AdminUrls {
    pub fn new(config: &BrowserConfig) -> Self {
        let registered = config
            .registered_models
            .iter()
            .filter_map(|entry| {
                entry
                    .split_once('.')
                    .map(|(app, model)| (app.to_string(), model.to_lowercase()))
            })
            .collect();
        Self {
            admin_path: with_trailing_slash(&config.admin_path),
            mount_path: with_trailing_slash(&config.mount_path),
            registered,
        }
    }

    fn has_app(&self, app_label: &str) -> bool {
        self.registered.iter().any(|(app, _)| app == app_label)
    }

    fn has_model(&self, app_label: &str, model_name: &str) -> bool {
        let model_name = model_name.to_lowercase();
        self.registered
            .iter()
            .any(|(app, model)| app == app_label && *model == model_name)
    }
}

impl UrlResolver for AdminUrls {
    fn reverse(&self, route: Route<'_>) -> Option<String> {
        match route {
            Route::AppList { app_label } => self
                .has_app(app_label)
                .then(|| join_segments(&self.admin_path, &[app_label]))
                .flatten(),
            Route::Changelist {
                app_label,
                model_name,
            } => self
                .has_model(app_label, model_name)
                .then(|| join_segments(&self.admin_path, &[app_label, model_name]))
                .flatten(),
            Route::Change {
                app_label,
                model_name,
                pk,
            } => self
                .has_model(app_label, model_name)
                .then(|| join_segments(&self.admin_path, &[app_label, model_name, pk]))
                .flatten(),
            Route::Detail { content_type, pk } => {
                join_segments(&self.mount_path, &[content_type, pk])
            }
        }
    }
}

/// Append percent-encoded segments to `base`, keeping the trailing slash.
fn join_segments(base: &str, segments: &[&str]) -> Option<String> {
    let mut url = Url::parse("http://localhost/").ok()?;
    url.set_path(base);
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(segments)
        .push("");
    Some(url.path().to_string())
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> AdminUrls {
        AdminUrls::new(&BrowserConfig {
            admin_path: "/console".into(),
            registered_models: vec!["blog.Post".into(), "broken".into()],
            ..Default::default()
        })
    }

    #[test]
    fn test_registered_model_routes() {
        let urls = urls();
        assert_eq!(
            urls.reverse(Route::AppList { app_label: "blog" }).as_deref(),
            Some("/console/blog/")
        );
        assert_eq!(
            urls.reverse(Route::Changelist {
                app_label: "blog",
                model_name: "post"
            })
            .as_deref(),
            Some("/console/blog/post/")
        );
        assert_eq!(
            urls.reverse(Route::Change {
                app_label: "blog",
                model_name: "post",
                pk: "12"
            })
            .as_deref(),
            Some("/console/blog/post/12/")
        );
    }

    #[test]
    fn test_unregistered_routes_miss() {
        let urls = urls();
        assert!(urls.reverse(Route::AppList { app_label: "shop" }).is_none());
        assert!(urls
            .reverse(Route::Changelist {
                app_label: "blog",
                model_name: "comment"
            })
            .is_none());
    }

    #[test]
    fn test_detail_always_resolves() {
        let urls = urls();
        assert_eq!(
            urls.reverse(Route::Detail {
                content_type: "shop.item",
                pk: "3"
            })
            .as_deref(),
            Some("/admin/indexbrowser/searchresult/shop.item/3/")
        );
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let urls = urls();
        assert_eq!(
            urls.reverse(Route::Detail {
                content_type: "blog.post",
                pk: "a?b#c"
            })
            .as_deref(),
            Some("/admin/indexbrowser/searchresult/blog.post/a%3Fb%23c/")
        );
        assert_eq!(
            urls.reverse(Route::Change {
                app_label: "blog",
                model_name: "post",
                pk: "2024/01 draft"
            })
            .as_deref(),
            Some("/console/blog/post/2024%2F01%20draft/")
        );
    }
}
