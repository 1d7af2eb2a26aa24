//! Run statistics logging.

use log::{debug, info};

use crate::error_handling::{FetchStats, OutcomeType};

/// Logs the outcome counters of a run.
///
/// The one-line summary goes to debug; failures are repeated at info so
/// they are visible at the default level.
pub fn log_fetch_statistics(stats: &FetchStats, elapsed_seconds: f64) {
    debug!(
        "Fetch statistics after {elapsed_seconds:.2}s: {} ({} requests)",
        stats.summary(),
        stats.total()
    );

    let unsuccessful = stats.total() - stats.get(OutcomeType::Completed);
    if unsuccessful > 0 {
        info!("{unsuccessful} of {} requests did not complete", stats.total());
    }
}
