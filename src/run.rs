use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::evidence::{self, Checkpoint};
use crate::field::FieldSpec;
use crate::filler::{FieldFiller, FillOutcome};
use crate::surface::{FormSurface, ScrollEdge};
use crate::verifier::{SubmissionResult, SubmissionStatus, SubmissionVerifier};
use crate::wait;

/// Everything a run observed, one outcome per field in mapping order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<FillOutcome>,
    pub submission: SubmissionResult,
}

impl RunReport {
    pub fn located(&self) -> usize {
        self.outcomes.iter().filter(|o| o.located()).count()
    }

    pub fn filled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.attempted).count()
    }

    pub fn mismatched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.attempted && !o.matched).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.attempted).count()
    }

    /// Every field took its value and the submission was not refused.
    pub fn is_success(&self) -> bool {
        let fields_ok = self.outcomes.iter().all(|o| o.attempted && o.matched);
        let submitted_ok = !matches!(
            self.submission.status,
            SubmissionStatus::NotSubmitted | SubmissionStatus::Rejected | SubmissionStatus::Failed
        );
        fields_ok && submitted_ok
    }
}

/// Scroll to the bottom and back so lazily rendered sections are attached.
async fn prime_lazy_content(surface: &dyn FormSurface, config: &RunConfig) {
    let timing = &config.timing;
    for edge in [ScrollEdge::Bottom, ScrollEdge::Top] {
        if let Err(e) = surface.scroll_page(edge).await {
            warn!(?edge, error = %e, "page scroll failed");
            continue;
        }
        wait::until_settled(timing.settle_timeout, timing.poll_interval, || async move {
            surface.inventory().await.map(|f| f.len()).ok()
        })
        .await;
    }
}

async fn log_inventory(surface: &dyn FormSurface) {
    match surface.inventory().await {
        Ok(fields) => {
            info!(count = fields.len(), "found form elements");
            for (i, f) in fields.iter().enumerate() {
                debug!(
                    index = i + 1,
                    tag = %f.tag,
                    name = %f.name,
                    id = %f.id,
                    kind = %f.r#type,
                    "form element"
                );
            }
        }
        Err(e) => warn!(error = %e, "could not enumerate form elements"),
    }
}

/// Fill every field once, in order, then submit and verify.
///
/// The page must already show the form. Nothing in here aborts early: the
/// report always carries one outcome per field and a submission result.
pub async fn run_intake(surface: &dyn FormSurface, fields: &[FieldSpec], config: &RunConfig) -> RunReport {
    evidence::capture(surface, &config.evidence_dir, Checkpoint::InitialLoad).await;
    prime_lazy_content(surface, config).await;
    log_inventory(surface).await;

    let filler = FieldFiller::new(surface, config.timing);
    let mut outcomes = Vec::with_capacity(fields.len());
    for spec in fields {
        outcomes.push(filler.fill(spec).await);
    }

    evidence::capture(surface, &config.evidence_dir, Checkpoint::Filled).await;

    let submission = SubmissionVerifier::new(surface, config).submit().await;
    let report = RunReport { outcomes, submission };
    info!(
        located = report.located(),
        filled = report.filled(),
        mismatched = report.mismatched(),
        skipped = report.skipped(),
        status = ?report.submission.status,
        "run finished"
    );
    report
}
