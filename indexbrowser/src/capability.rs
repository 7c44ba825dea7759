//! Backend capability detection.
//!
//! Search settings come in two incompatible shapes. The legacy scheme is a
//! flat namespace of keys with a single `search_engine`; the current scheme
//! is a table of named connections, each with its own `engine`. The shape is
//! resolved once into a [`ConfigScheme`] and everything downstream branches
//! on that tag instead of re-reading raw configuration.

use crate::backend::SearchBackend;
use crate::config::{ConnectionMap, SearchConfig};
use crate::error::ConfigError;
use serde::Serialize;

/// Name of the connection every current-scheme configuration must define.
pub const DEFAULT_CONNECTION: &str = "default";

/// Legacy key naming the single engine.
pub const LEGACY_ENGINE_KEY: &str = "search_engine";

const LEGACY_FACETING_ENGINES: &[&str] = &["solr", "xapian"];
const FACETING_ENGINE_MARKERS: &[&str] = &["solr", "xapian", "elasticsearch"];

/// Comparison operators a backend may expose, with display labels.
pub const FILTER_VOCABULARY: &[(&str, &str)] = &[
    ("contains", "contains"),
    ("exact", "exact"),
    ("fuzzy", "similar to (fuzzy)"),
    ("gt", "greater than"),
    ("gte", "greater than or equal to"),
    ("in", "in"),
    ("lt", "less than"),
    ("lte", "less than or equal to"),
    ("range", "range (inclusive)"),
    ("startswith", "starts with"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemeVersion {
    V1,
    V2,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub name: String,
    pub title: String,
    pub engine: String,
}

/// The resolved configuration shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigScheme {
    /// Flat keys; `engine` is the `search_engine` value if one was given.
    Legacy { engine: Option<String> },
    /// Named connections in configuration order. Always contains `default`.
    Connections(Vec<Connection>),
    /// Nothing configured at all.
    Empty,
}

/// What the configured backend can do, derived once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendProfile {
    scheme: ConfigScheme,
}

impl BackendProfile {
    /// Resolve the configuration scheme.
    ///
    /// The connections table wins when both shapes are present. A
    /// connections table without `default`, or a connection without an
    /// `engine`, is a configuration error.
    pub fn detect(config: &SearchConfig) -> Result<Self, ConfigError> {
        let scheme = match &config.connections {
            Some(connections) => ConfigScheme::Connections(Self::read_connections(connections)?),
            None if config.settings.is_empty() => ConfigScheme::Empty,
            None => ConfigScheme::Legacy {
                engine: config
                    .settings
                    .get(LEGACY_ENGINE_KEY)
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
        };
        let profile = Self { scheme };
        tracing::debug!(
            version = ?profile.version(),
            faceting = profile.supports_faceting(),
            multiple_connections = profile.supports_multiple_connections(),
            "Detected search backend profile"
        );
        Ok(profile)
    }

    fn read_connections(connections: &ConnectionMap) -> Result<Vec<Connection>, ConfigError> {
        if connections.get(DEFAULT_CONNECTION).is_none() {
            return Err(ConfigError::MissingDefaultConnection);
        }
        connections
            .iter()
            .map(|(name, settings)| {
                let settings = settings.as_table().ok_or_else(|| ConfigError::InvalidSetting {
                    key: format!("connections.{name}"),
                    reason: "expected a table of connection settings".to_string(),
                })?;
                let engine = settings
                    .get("engine")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ConfigError::MissingEngine(name.to_string()))?;
                let title = settings
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or(name.as_str());
                Ok(Connection {
                    name: name.to_string(),
                    title: title.to_string(),
                    engine: engine.to_string(),
                })
            })
            .collect()
    }

    pub fn scheme(&self) -> &ConfigScheme {
        &self.scheme
    }

    pub fn version(&self) -> SchemeVersion {
        match self.scheme {
            ConfigScheme::Legacy { .. } => SchemeVersion::V1,
            ConfigScheme::Connections(_) => SchemeVersion::V2,
            ConfigScheme::Empty => SchemeVersion::Unknown,
        }
    }

    pub fn supports_faceting(&self) -> bool {
        match &self.scheme {
            ConfigScheme::Legacy { engine: Some(engine) } => {
                LEGACY_FACETING_ENGINES.contains(&engine.as_str())
            }
            ConfigScheme::Connections(connections) => connections
                .iter()
                .find(|c| c.name == DEFAULT_CONNECTION)
                .is_some_and(|c| {
                    FACETING_ENGINE_MARKERS
                        .iter()
                        .any(|marker| c.engine.contains(marker))
                }),
            _ => false,
        }
    }

    pub fn supports_multiple_connections(&self) -> bool {
        match &self.scheme {
            ConfigScheme::Connections(connections) => connections.len() > 1,
            _ => false,
        }
    }

    /// `(name, title)` for every connection, in configuration order.
    pub fn get_connections(&self) -> Vec<(String, String)> {
        match &self.scheme {
            ConfigScheme::Connections(connections) => connections
                .iter()
                .map(|c| (c.name.clone(), c.title.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Comparison operators the backend declares, with their labels.
    pub fn get_valid_filters(&self, backend: &dyn SearchBackend) -> Vec<(&'static str, &'static str)> {
        let supported = backend.supported_filters();
        FILTER_VOCABULARY
            .iter()
            .filter(|(op, _)| supported.contains(op))
            .copied()
            .collect()
    }
}

/// One configured search setting, tidied for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingEntry {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

fn display_name(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

fn display_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every search setting as `(NAME, value, connection)` rows.
pub fn settings_summary(config: &SearchConfig) -> Vec<SettingEntry> {
    match &config.connections {
        Some(connections) => connections
            .iter()
            .filter_map(|(connection, settings)| {
                settings.as_table().map(|table| (connection, table))
            })
            .flat_map(|(connection, settings)| {
                settings.iter().map(move |(key, value)| SettingEntry {
                    name: display_name(key),
                    value: display_value(value),
                    connection: Some(connection.to_string()),
                })
            })
            .collect(),
        None => config
            .settings
            .iter()
            .map(|(key, value)| SettingEntry {
                name: display_name(key),
                value: display_value(value),
                connection: None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::Config;

    fn search(toml: &str) -> SearchConfig {
        Config::from_toml(toml).unwrap().search
    }

    #[test]
    fn test_legacy_faceting_whitelist() {
        let profile = BackendProfile::detect(&search("[search]\nsearch_engine = \"solr\"")).unwrap();
        assert_eq!(profile.version(), SchemeVersion::V1);
        assert!(profile.supports_faceting());
        assert!(!profile.supports_multiple_connections());
        assert!(profile.get_connections().is_empty());

        // legacy matching is exact, not substring
        let profile =
            BackendProfile::detect(&search("[search]\nsearch_engine = \"solr_custom\"")).unwrap();
        assert!(!profile.supports_faceting());

        let profile = BackendProfile::detect(&search("[search]\nsearch_engine = \"whoosh\"")).unwrap();
        assert!(!profile.supports_faceting());
    }

    #[test]
    fn test_current_scheme_substring_match() {
        let profile = BackendProfile::detect(&search(
            r#"
            [search.connections.default]
            engine = "backends.elasticsearch_backend.ElasticsearchSearchEngine"
            path = "test"
            "#,
        ))
        .unwrap();
        assert_eq!(profile.version(), SchemeVersion::V2);
        assert!(profile.supports_faceting());
        assert!(!profile.supports_multiple_connections());
    }

    #[test]
    fn test_current_scheme_without_faceting() {
        let profile = BackendProfile::detect(&search(
            r#"
            [search.connections.default]
            engine = "backends.whoosh_backend.WhooshEngine"
            "#,
        ))
        .unwrap();
        assert!(!profile.supports_faceting());
    }

    #[test]
    fn test_connections_in_order_with_titles() {
        let profile = BackendProfile::detect(&search(
            r#"
            [search.connections.default]
            engine = "solr"

            [search.connections.archive]
            engine = "whoosh"
            title = "Old stuff"

            [search.connections.backup]
            engine = "xapian"
            "#,
        ))
        .unwrap();
        assert!(profile.supports_multiple_connections());
        assert_eq!(
            profile.get_connections(),
            vec![
                ("default".to_string(), "default".to_string()),
                ("archive".to_string(), "Old stuff".to_string()),
                ("backup".to_string(), "backup".to_string()),
            ]
        );
    }

    #[test]
    fn test_connections_take_precedence_over_flat_keys() {
        let profile = BackendProfile::detect(&search(
            r#"
            [search]
            search_engine = "whoosh"

            [search.connections.default]
            engine = "solr"
            "#,
        ))
        .unwrap();
        assert_eq!(profile.version(), SchemeVersion::V2);
        assert!(profile.supports_faceting());
    }

    #[test]
    fn test_missing_default_connection_is_error() {
        let result = BackendProfile::detect(&search(
            r#"
            [search.connections.other]
            engine = "solr"
            "#,
        ));
        assert!(matches!(result, Err(ConfigError::MissingDefaultConnection)));
    }

    #[test]
    fn test_missing_engine_is_error() {
        let result = BackendProfile::detect(&search(
            r#"
            [search.connections.default]
            path = "/tmp/index"
            "#,
        ));
        assert!(matches!(result, Err(ConfigError::MissingEngine(name)) if name == "default"));
    }

    #[test]
    fn test_connection_must_be_a_table() {
        let result = BackendProfile::detect(&search(
            r#"
            [search.connections]
            default = "solr"
            "#,
        ));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidSetting { key, .. }) if key == "connections.default"
        ));
    }

    #[test]
    fn test_empty_config_is_unknown() {
        let profile = BackendProfile::detect(&SearchConfig::default()).unwrap();
        assert_eq!(profile.version(), SchemeVersion::Unknown);
        assert!(!profile.supports_faceting());
        assert!(!profile.supports_multiple_connections());
    }

    #[test]
    fn test_valid_filters_current_scheme() {
        let profile = BackendProfile::detect(&search(
            "[search.connections.default]\nengine = \"solr\"",
        ))
        .unwrap();
        let backend = MemoryBackend::new();
        let filters = profile.get_valid_filters(&backend);
        assert_eq!(
            filters,
            vec![
                ("exact", "exact"),
                ("gt", "greater than"),
                ("gte", "greater than or equal to"),
                ("in", "in"),
                ("lt", "less than"),
                ("lte", "less than or equal to"),
                ("range", "range (inclusive)"),
                ("startswith", "starts with"),
            ]
        );
    }

    #[test]
    fn test_settings_summary_connections() {
        let config = search(
            r#"
            [search.connections.default]
            engine = "solr"
            path = "test"

            [search.connections.archive]
            engine = "whoosh"
            path = "old"
            "#,
        );
        let summary = settings_summary(&config);
        assert_eq!(summary.len(), 4);
        let names: std::collections::BTreeSet<&str> =
            summary.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["ENGINE", "PATH"].into_iter().collect());
        assert_eq!(summary[0].connection.as_deref(), Some("default"));
    }

    #[test]
    fn test_settings_summary_legacy() {
        let config = search(
            r#"
            [search]
            search_engine = "whoosh"
            whoosh_path = "/tmp/idx"
            siteconf = "search_sites"
            "#,
        );
        let summary = settings_summary(&config);
        let names: Vec<&str> = summary.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SEARCH ENGINE", "SITECONF", "WHOOSH PATH"]);
        assert!(summary.iter().all(|s| s.connection.is_none()));
    }
}
