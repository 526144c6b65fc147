use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::Result;
use crate::evidence::{self, Checkpoint};
use crate::selector::{Selector, Tag};
use crate::surface::{ElementRef, FormSurface};
use crate::wait;

const ERROR_CLASSES: &[&str] = &["error-message", "alert-danger", "text-danger"];
const SUCCESS_CLASSES: &[&str] = &["success-message", "alert-success", "text-success"];

/// Submit control candidates, most specific first.
pub fn submit_candidates() -> Vec<Selector> {
    vec![
        Selector::attr(Tag::Button, "type", "submit"),
        Selector::text(Tag::Button, "Submit"),
        Selector::text(Tag::Button, "Enviar"),
        Selector::attr(Tag::Input, "type", "submit"),
        Selector::class(Tag::Button, "submit-button"),
        Selector::class(Tag::Button, "form-submit"),
    ]
}

pub fn error_indicators() -> Vec<Selector> {
    ERROR_CLASSES.iter().map(|c| Selector::class(Tag::Any, c)).collect()
}

pub fn success_indicators() -> Vec<Selector> {
    SUCCESS_CLASSES.iter().map(|c| Selector::class(Tag::Any, c)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    /// No submit control was found.
    NotSubmitted,
    /// The page navigated away from the form.
    Redirected,
    /// Error indicators were shown.
    Rejected,
    /// Success indicators were shown or the server acknowledged the request.
    Accepted,
    /// Submitted, but nothing on the page or the wire said how it went.
    Inconclusive,
    /// Verification itself broke down.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub status: SubmissionStatus,
    pub final_url: String,
    pub error_messages: Vec<String>,
    pub success_messages: Vec<String>,
    pub api_response: Option<serde_json::Value>,
}

impl SubmissionResult {
    fn empty(status: SubmissionStatus, final_url: String) -> Self {
        Self {
            status,
            final_url,
            error_messages: Vec::new(),
            success_messages: Vec::new(),
            api_response: None,
        }
    }
}

pub struct SubmissionVerifier<'a> {
    surface: &'a dyn FormSurface,
    config: &'a RunConfig,
}

impl<'a> SubmissionVerifier<'a> {
    pub fn new(surface: &'a dyn FormSurface, config: &'a RunConfig) -> Self {
        Self { surface, config }
    }

    /// Submit the form and classify the outcome. Never fails: problems are
    /// logged and folded into the returned status.
    pub async fn submit(&self) -> SubmissionResult {
        let Some(control) = self.locate_control().await else {
            error!("could not find any submit control, skipping submission");
            let url = self.surface.current_url().await.unwrap_or_default();
            evidence::capture(self.surface, &self.config.evidence_dir, Checkpoint::Submitted).await;
            return SubmissionResult::empty(SubmissionStatus::NotSubmitted, url);
        };

        let mut result = SubmissionResult::empty(SubmissionStatus::Inconclusive, String::new());
        if let Err(e) = self.verify(&control, &mut result).await {
            error!(error = %e, "error during form submission");
            evidence::capture(self.surface, &self.config.evidence_dir, Checkpoint::Error).await;
            if result.final_url.is_empty() {
                result.final_url = self.surface.current_url().await.unwrap_or_default();
            }
            result.status = SubmissionStatus::Failed;
        }
        result
    }

    async fn locate_control(&self) -> Option<ElementRef> {
        for (rank, selector) in submit_candidates().into_iter().enumerate() {
            match self.surface.query(&selector).await {
                Ok(mut found) if !found.is_empty() => {
                    if rank > 0 {
                        info!(selector = %selector, "found submit control with fallback selector");
                    } else {
                        debug!(selector = %selector, "found submit control");
                    }
                    return Some(ElementRef {
                        info: found.swap_remove(0),
                        selector,
                        index: 0,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(selector = %selector, error = %e, "submit selector query failed"),
            }
        }
        None
    }

    /// Fill `result` as evidence comes in, so whatever was collected before a
    /// failure survives it.
    async fn verify(&self, control: &ElementRef, result: &mut SubmissionResult) -> Result<()> {
        let timing = &self.config.timing;
        let surface = self.surface;

        surface.scroll_into_view(control).await?;
        wait::until_stable(surface, control, timing.settle_timeout, timing.poll_interval).await;
        surface.begin_observation().await?;
        info!("submitting form");
        surface.click(control).await?;

        let marker = self.config.form_path_marker.as_str();
        let errors = error_indicators();
        let successes = success_indicators();
        let all_indicators: Vec<Selector> = errors.iter().chain(successes.iter()).cloned().collect();
        let all_indicators = &all_indicators;
        let reacted = wait::until(timing.submit_settle, timing.poll_interval, || async move {
            let left_form = matches!(surface.current_url().await, Ok(url) if !url.contains(marker));
            left_form || matches!(surface.texts(all_indicators).await, Ok(t) if !t.is_empty())
        })
        .await;
        if !reacted {
            debug!("page showed no reaction to submit within settle bound");
        }

        result.final_url = surface.current_url().await?;
        info!(url = %result.final_url, "current URL after submission");
        let on_form = result.final_url.contains(marker);

        if on_form {
            result.error_messages = surface.texts(&errors).await?;
            for message in &result.error_messages {
                error!(%message, "form submission error");
            }
            result.success_messages = surface.texts(&successes).await?;
            for message in &result.success_messages {
                info!(%message, "success message");
            }
        }

        evidence::capture(surface, &self.config.evidence_dir, Checkpoint::Submitted).await;

        match surface
            .wait_for_response(&self.config.response_filter, timing.response_timeout)
            .await
        {
            Ok(Some(body)) => {
                info!(response = %body, "server response");
                result.api_response = Some(body);
            }
            Ok(None) => info!("no API response detected, submission may still have gone through"),
            Err(e) => info!(error = %e, "API response not readable, treating as inconclusive"),
        }

        result.status = classify(on_form, result);
        info!(status = ?result.status, "form submission process completed");
        Ok(())
    }
}

fn classify(on_form: bool, result: &SubmissionResult) -> SubmissionStatus {
    if !on_form {
        SubmissionStatus::Redirected
    } else if !result.error_messages.is_empty() {
        SubmissionStatus::Rejected
    } else if !result.success_messages.is_empty() || result.api_response.is_some() {
        SubmissionStatus::Accepted
    } else {
        SubmissionStatus::Inconclusive
    }
}
