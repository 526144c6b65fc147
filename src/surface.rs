use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::selector::Selector;

/// Represents a form control discovered on the page.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct FormField {
    pub tag: String,
    pub r#type: String,
    pub name: String,
    pub id: String,
    pub value: String,
    pub placeholder: String,
    pub label: String,
}

/// Live tag information of one element matched by a selector.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ElementInfo {
    /// Lowercase tag name.
    pub tag: String,
    /// The `type` attribute, empty when absent.
    #[serde(default)]
    pub r#type: String,
}

/// Handle to a located element: the selector that matched plus its ordinal
/// among all matches in document order.
///
/// Only valid for the document it was resolved against; a reload or
/// navigation invalidates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: Selector,
    pub index: usize,
    pub info: ElementInfo,
}

impl ElementRef {
    pub fn tag(&self) -> &str {
        &self.info.tag
    }
}

/// One `<option>` of a native select.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// Viewport-relative layout box of an element.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEdge {
    Top,
    Bottom,
}

/// Which network exchange counts as the server's acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFilter {
    pub method: String,
    pub url_marker: String,
}

impl ResponseFilter {
    pub fn matches(&self, method: &str, url: &str) -> bool {
        method.eq_ignore_ascii_case(&self.method) && url.contains(&self.url_marker)
    }
}

impl Default for ResponseFilter {
    fn default() -> Self {
        Self {
            method: "POST".into(),
            url_marker: "/api".into(),
        }
    }
}

/// Everything the form-filling core needs from a live page.
///
/// Every call suspends until the browser confirms completion. Implementations
/// must not hold element handles across calls; each call resolves its
/// [`ElementRef`] against the current document.
#[async_trait]
pub trait FormSurface: Send + Sync {
    /// All elements matching `selector`, in document order.
    async fn query(&self, selector: &Selector) -> Result<Vec<ElementInfo>>;

    /// Every `input`, `select` and `textarea` on the page.
    async fn inventory(&self) -> Result<Vec<FormField>>;

    async fn scroll_page(&self, edge: ScrollEdge) -> Result<()>;

    /// Smooth-scroll the element to the vertical center of the viewport.
    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()>;

    async fn bounding_box(&self, element: &ElementRef) -> Result<Option<BoundingBox>>;

    /// Set the control's value directly and fire `input`/`change`.
    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<()>;

    /// The control's current `value` property.
    async fn value(&self, element: &ElementRef) -> Result<String>;

    /// What a user sees as the control's value. For searchable dropdowns this
    /// is the rendered selection rather than the search box contents.
    async fn displayed_value(&self, element: &ElementRef) -> Result<String>;

    async fn options(&self, element: &ElementRef) -> Result<Vec<SelectOption>>;

    async fn select_option(&self, element: &ElementRef, value: &str) -> Result<()>;

    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// Type `text` as individual keystrokes into the element.
    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()>;

    async fn press_key(&self, element: &ElementRef, key: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Trimmed text content of every element matching any of `selectors`,
    /// in document order, each element once. Blank texts are dropped.
    async fn texts(&self, selectors: &[Selector]) -> Result<Vec<String>>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Start recording network exchanges. Only requests sent after this call
    /// are visible to [`FormSurface::wait_for_response`]; anything recorded
    /// before it is discarded.
    async fn begin_observation(&self) -> Result<()>;

    /// Wait up to `timeout` for a finished exchange matching `filter` and return
    /// its JSON body. `Ok(None)` when nothing matched in time.
    async fn wait_for_response(
        &self,
        filter: &ResponseFilter,
        timeout: Duration,
    ) -> Result<Option<serde_json::Value>>;
}
