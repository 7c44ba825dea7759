use thiserror::Error;

/// Fatal problems with the search backend configuration, raised at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("search connections are configured but there is no `default` connection")]
    MissingDefaultConnection,

    #[error("search connection `{0}` has no `engine` setting")]
    MissingEngine(String),

    #[error("search connection `{0}` is not served by the backend")]
    UnservedConnection(String),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Faults reported by a search backend while executing a query.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("fixture error: {0}")]
    Fixture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcomes of a browse request that are surfaced to the host console.
#[derive(Error, Debug)]
pub enum BrowseError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No search indexes bound to the backend")]
    NoIndexes,

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl BrowseError {
    /// True for every outcome the host maps to a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoIndexes | Self::InvalidPage(_) | Self::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BrowseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(BrowseError::NoIndexes.is_not_found());
        assert!(BrowseError::InvalidPage("9".into()).is_not_found());
        assert!(BrowseError::NotFound("gone".into()).is_not_found());
        assert!(!BrowseError::PermissionDenied("nope".into()).is_not_found());
        assert!(!BrowseError::Backend(BackendError::Execution("boom".into())).is_not_found());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::MissingEngine("archive".into());
        assert_eq!(err.to_string(), "search connection `archive` has no `engine` setting");
    }
}
