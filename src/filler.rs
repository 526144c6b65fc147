use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Timing;
use crate::error::Result;
use crate::field::{DeclaredKind, FieldKind, FieldSpec};
use crate::locator::FieldLocator;
use crate::surface::{ElementRef, FormSurface};
use crate::wait;

const CONFIRM_KEY: &str = "Enter";

/// Result of filling one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillOutcome {
    pub field: String,
    /// An interaction was made with a located element.
    pub attempted: bool,
    /// The value read back equals the value the protocol meant to set.
    pub matched: bool,
    pub kind: Option<FieldKind>,
    pub selector: Option<String>,
    /// Value the protocol aimed for. Differs from the mapping's value for
    /// native selects, which always take the first selectable option.
    pub target: Option<String>,
    pub observed: Option<String>,
    pub note: Option<String>,
}

impl FillOutcome {
    fn not_found(field: &str) -> Self {
        Self {
            field: field.to_string(),
            attempted: false,
            matched: false,
            kind: None,
            selector: None,
            target: None,
            observed: None,
            note: Some("element not found".into()),
        }
    }

    pub fn located(&self) -> bool {
        self.selector.is_some()
    }
}

/// What a protocol did with a located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Filled { target: String, observed: String },
    Skipped(String),
}

/// One interaction protocol per [`FieldKind`].
#[async_trait]
pub trait FillProtocol: Send + Sync {
    async fn apply(
        &self,
        surface: &dyn FormSurface,
        element: &ElementRef,
        value: &str,
        timing: &Timing,
    ) -> Result<Step>;
}

/// Scroll, set the value directly, read it back.
pub struct TextEntry;

/// Pick the first option with a non-empty value.
pub struct FirstSelectableOption;

/// Click, type the value as keystrokes, confirm the top suggestion.
pub struct SearchableDropdown;

static TEXT_ENTRY: TextEntry = TextEntry;
static FIRST_SELECTABLE: FirstSelectableOption = FirstSelectableOption;
static SEARCHABLE_DROPDOWN: SearchableDropdown = SearchableDropdown;

impl FieldKind {
    pub fn protocol(&self) -> &'static dyn FillProtocol {
        match self {
            FieldKind::TextInput | FieldKind::TextArea => &TEXT_ENTRY,
            FieldKind::NativeSelect => &FIRST_SELECTABLE,
            FieldKind::CustomDropdown => &SEARCHABLE_DROPDOWN,
        }
    }
}

async fn bring_into_view(surface: &dyn FormSurface, element: &ElementRef, timing: &Timing) -> Result<()> {
    surface.scroll_into_view(element).await?;
    if !wait::until_stable(surface, element, timing.settle_timeout, timing.poll_interval).await {
        debug!(selector = %element.selector, "element did not settle after scroll");
    }
    Ok(())
}

#[async_trait]
impl FillProtocol for TextEntry {
    async fn apply(
        &self,
        surface: &dyn FormSurface,
        element: &ElementRef,
        value: &str,
        timing: &Timing,
    ) -> Result<Step> {
        bring_into_view(surface, element, timing).await?;
        surface.set_value(element, value).await?;
        let observed = surface.value(element).await?;
        Ok(Step::Filled {
            target: value.to_string(),
            observed,
        })
    }
}

#[async_trait]
impl FillProtocol for FirstSelectableOption {
    async fn apply(
        &self,
        surface: &dyn FormSurface,
        element: &ElementRef,
        _value: &str,
        timing: &Timing,
    ) -> Result<Step> {
        bring_into_view(surface, element, timing).await?;
        let options = surface.options(element).await?;
        debug!(selector = %element.selector, ?options, "available options");
        let Some(choice) = options.into_iter().find(|o| !o.value.is_empty()) else {
            return Ok(Step::Skipped("no selectable option".into()));
        };
        surface.select_option(element, &choice.value).await?;
        info!(selector = %element.selector, option = %choice.text, "selected option");
        let observed = surface.value(element).await?;
        Ok(Step::Filled {
            target: choice.value,
            observed,
        })
    }
}

#[async_trait]
impl FillProtocol for SearchableDropdown {
    async fn apply(
        &self,
        surface: &dyn FormSurface,
        element: &ElementRef,
        value: &str,
        timing: &Timing,
    ) -> Result<Step> {
        surface.click(element).await?;
        surface.type_text(element, value).await?;
        let echoed = wait::until(timing.settle_timeout, timing.poll_interval, || async move {
            matches!(surface.value(element).await, Ok(v) if v == value)
        })
        .await;
        if !echoed {
            debug!(selector = %element.selector, "search box did not echo typed text");
        }
        surface.press_key(element, CONFIRM_KEY).await?;
        wait::until(timing.settle_timeout, timing.poll_interval, || async move {
            matches!(surface.displayed_value(element).await, Ok(v) if v == value)
        })
        .await;
        let observed = surface.displayed_value(element).await?;
        info!(selector = %element.selector, selected = %observed, "dropdown selection");
        Ok(Step::Filled {
            target: value.to_string(),
            observed,
        })
    }
}

/// Drives one field from located element to verified value. A missing field,
/// a failed interaction or a read-back mismatch ends up in the
/// [`FillOutcome`]; none of them is fatal to the run.
pub struct FieldFiller<'a> {
    surface: &'a dyn FormSurface,
    timing: Timing,
}

impl<'a> FieldFiller<'a> {
    pub fn new(surface: &'a dyn FormSurface, timing: Timing) -> Self {
        Self { surface, timing }
    }

    /// Fill one field exactly once and report what happened.
    pub async fn fill(&self, spec: &FieldSpec) -> FillOutcome {
        let locator = FieldLocator::new(self.surface);
        let located = match &spec.declared {
            DeclaredKind::SearchableDropdown(handle) => locator.locate_dropdown(&spec.name, handle).await,
            declared => locator.locate(&spec.name, declared).await,
        };
        let Some(element) = located else {
            error!(field = %spec.name, "could not find element for field, skipping");
            return FillOutcome::not_found(&spec.name);
        };

        let kind = FieldKind::classify(&spec.declared, element.tag());
        debug!(field = %spec.name, %kind, "filling field");
        let mut outcome = FillOutcome {
            field: spec.name.clone(),
            attempted: true,
            matched: false,
            kind: Some(kind),
            selector: Some(element.selector.to_string()),
            target: None,
            observed: None,
            note: None,
        };

        match kind.protocol().apply(self.surface, &element, &spec.value, &self.timing).await {
            Ok(Step::Filled { target, observed }) => {
                outcome.matched = observed == target;
                if outcome.matched {
                    info!(field = %spec.name, %kind, "field handled");
                } else {
                    warn!(
                        field = %spec.name,
                        expected = %target,
                        observed = %observed,
                        "validation failed, continuing"
                    );
                    outcome.note = Some("value mismatch".into());
                }
                outcome.target = Some(target);
                outcome.observed = Some(observed);
            }
            Ok(Step::Skipped(reason)) => {
                warn!(field = %spec.name, %reason, "field skipped");
                outcome.attempted = false;
                outcome.note = Some(reason);
            }
            Err(e) => {
                error!(field = %spec.name, error = %e, "interaction failed, continuing");
                outcome.note = Some(e.to_string());
            }
        }
        outcome
    }
}
