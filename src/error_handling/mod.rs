//! Error handling and fetch statistics.
//!
//! This module provides:
//! - Error type definitions, one enum per concern
//! - Categorization of transport errors into `NetworkErrorKind`
//! - Outcome statistics tracking

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_reqwest_error, network_error, outcome_of};
pub use stats::FetchStats;
pub use types::{
    FetchError, InitializationError, NetworkErrorKind, OutcomeType, RenderError, XmlError,
    XsltError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_fetch_stats_initialization() {
        let stats = FetchStats::new();
        for outcome in OutcomeType::iter() {
            assert_eq!(stats.get(outcome), 0);
        }
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.summary(), "");
    }

    #[test]
    fn test_fetch_stats_increment_and_summary() {
        let stats = FetchStats::new();
        stats.increment(OutcomeType::Completed);
        stats.increment(OutcomeType::Completed);
        stats.increment(OutcomeType::TimedOut);

        assert_eq!(stats.get(OutcomeType::Completed), 2);
        assert_eq!(stats.get(OutcomeType::TimedOut), 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.summary(), "completed=2 timed out=1");
    }

    #[test]
    fn test_outcome_of_classifies_results() {
        let ok: Result<(), FetchError> = Ok(());
        assert_eq!(outcome_of(&ok), OutcomeType::Completed);

        let timeout: Result<(), FetchError> = Err(FetchError::Network {
            url: "http://example.com/".to_string(),
            kind: NetworkErrorKind::Timeout,
            message: "elapsed".to_string(),
        });
        assert_eq!(outcome_of(&timeout), OutcomeType::TimedOut);

        let connect: Result<(), FetchError> = Err(FetchError::Network {
            url: "http://example.com/".to_string(),
            kind: NetworkErrorKind::Connect,
            message: "refused".to_string(),
        });
        assert_eq!(outcome_of(&connect), OutcomeType::Failed);
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = FetchError::Network {
            url: "http://example.com/a.xml".to_string(),
            kind: NetworkErrorKind::Status(404),
            message: "Not Found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP status 404 fetching http://example.com/a.xml: Not Found"
        );
        assert_eq!(
            RenderError::ElementNotFound("news".to_string()).to_string(),
            "no element with id 'news' in page"
        );
        assert_eq!(
            FetchError::TransportUnavailable.to_string(),
            "no HTTP transport is available on this host"
        );
    }
}
