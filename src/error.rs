use thiserror::Error;

/// Failures surfaced by the search engine. None of these are fatal; the
/// engine turns each one into a status line and an alert cue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Enter a search query.")]
    InvalidQuery,
    #[error("Search failed: {0}")]
    RemoteUnavailable(String),
    #[error("Update failed: {0}")]
    TransientFetchFailure(String),
    #[error("Enqueued {succeeded}/{total} file(s).")]
    PartialEnqueueFailure { succeeded: usize, total: usize },
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_read_as_status_lines() {
        assert_eq!(SearchError::InvalidQuery.to_string(), "Enter a search query.");
        assert_eq!(
            SearchError::RemoteUnavailable("connection refused".into()).to_string(),
            "Search failed: connection refused"
        );
        assert_eq!(
            SearchError::PartialEnqueueFailure {
                succeeded: 2,
                total: 5
            }
            .to_string(),
            "Enqueued 2/5 file(s)."
        );
    }
}
