//! Log records for submission outcomes.
//!
//! Each [`SubmitOutcome`] variant maps to a fixed set of lines; failures are
//! warnings and never stop the run.

use sitearchiver_shared::PageUrl;
use sitearchiver_submitter::SubmitOutcome;
use tracing::{info, warn};

/// Emit the log lines for one submission.
pub fn report_outcome(url: &PageUrl, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Success {
            archived_url,
            job_id,
            message,
        } => {
            info!(
                page = %url,
                archived_url = %archived_url.as_deref().unwrap_or("-"),
                job_id = %job_id.as_deref().unwrap_or("-"),
                "archived page"
            );
            if let Some(note) = message {
                warn!(page = %url, service_message = %note, "archive service returned a message");
            }
        }
        SubmitOutcome::Rejected { status, body } => {
            warn!(page = %url, status, body = %body, "unable to archive page");
        }
        SubmitOutcome::TransportFailure { detail } => {
            warn!(page = %url, error = %detail, "archive request failed");
        }
    }
}
