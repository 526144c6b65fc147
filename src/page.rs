use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventLoadingFinished, EventRequestWillBeSent, GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::Page as CrPage;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::element::Element;
use crate::error::{Error, Result};
use crate::selector::{normalize_text, text_matches, Selector};
use crate::surface::{
    BoundingBox, ElementInfo, ElementRef, FormField, FormSurface, ResponseFilter, ScrollEdge,
    SelectOption,
};

/// A request that finished loading.
#[derive(Debug)]
struct Exchange {
    request_id: RequestId,
    method: String,
    url: String,
}

/// Wrapper around a chromiumoxide Page. Network events are followed from the
/// moment it is attached, but exchanges are only recorded for requests sent
/// after [`FormSurface::begin_observation`].
pub struct Page {
    inner: CrPage,
    observing: Arc<AtomicBool>,
    finished: Mutex<mpsc::UnboundedReceiver<Exchange>>,
    recorder: JoinHandle<()>,
}

impl Page {
    pub(crate) async fn attach(inner: CrPage) -> Result<Self> {
        // Subscribe before enabling the network domain so no early event is missed.
        let mut sent = inner
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| Error::LaunchError(format!("Failed to listen for requests: {e}")))?;
        let mut loaded = inner
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| Error::LaunchError(format!("Failed to listen for finished loads: {e}")))?;
        inner
            .execute(network::EnableParams::default())
            .await
            .map_err(|e| Error::LaunchError(format!("Failed to enable network domain: {e}")))?;

        let observing = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        let armed = Arc::clone(&observing);
        let recorder = tokio::spawn(async move {
            let mut pending: HashMap<String, (String, String)> = HashMap::new();
            loop {
                tokio::select! {
                    Some(event) = sent.next() => {
                        if !armed.load(Ordering::Acquire) {
                            continue;
                        }
                        pending.insert(
                            event.request_id.inner().clone(),
                            (event.request.method.clone(), event.request.url.clone()),
                        );
                    }
                    Some(event) = loaded.next() => {
                        let Some((method, url)) = pending.remove(event.request_id.inner()) else {
                            continue;
                        };
                        let exchange = Exchange {
                            request_id: event.request_id.clone(),
                            method,
                            url,
                        };
                        if tx.send(exchange).is_err() {
                            break;
                        }
                    }
                    else => break,
                }
            }
        });

        Ok(Self {
            inner,
            observing,
            finished: Mutex::new(rx),
            recorder,
        })
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    // ── Observations ────────────────────────────────────────────────

    /// Take a screenshot of the visible viewport and save it to a file (PNG).
    pub async fn screenshot_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.inner
            .save_screenshot(params, path)
            .await
            .map_err(|e| Error::ScreenshotError(e.to_string()))?;
        Ok(())
    }

    /// Get all form fields on the page.
    pub async fn get_form_fields(&self) -> Result<Vec<FormField>> {
        let js = r#"
            JSON.stringify(
                Array.from(document.querySelectorAll('input, select, textarea')).map(el => {
                    let label = '';
                    if (el.id) {
                        const labelEl = document.querySelector(`label[for="${el.id}"]`);
                        if (labelEl) label = (labelEl.innerText || '').trim();
                    }
                    if (!label && el.closest('label')) {
                        label = (el.closest('label').innerText || '').trim();
                    }
                    return {
                        tag: el.tagName.toLowerCase(),
                        type: el.type || '',
                        name: el.name || '',
                        id: el.id || '',
                        value: el.value || '',
                        placeholder: el.placeholder || '',
                        label: label
                    };
                })
            )
        "#;
        self.eval_json(js.to_string()).await
    }

    /// Evaluate a script that returns `JSON.stringify(...)` and decode it.
    async fn eval_json<T: DeserializeOwned>(&self, js: String) -> Result<T> {
        let result = self
            .inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        let json_str: String = result
            .into_value()
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(serde_json::from_str(&json_str)?)
    }

    /// Run `body` with `el` bound to the referenced element and return what it
    /// returns. Fails with `ElementNotFound` when the reference no longer resolves.
    async fn on_element(&self, element: &ElementRef, body: &str) -> Result<serde_json::Value> {
        let target = element_js(element)?;
        let js = format!(
            r#"
            JSON.stringify((() => {{
                const el = {target};
                if (!el) return {{ found: false }};
                const value = (() => {{ {body} }})();
                return {{ found: true, value: value === undefined ? null : value }};
            }})())
            "#
        );

        #[derive(serde::Deserialize)]
        struct Reply {
            found: bool,
            #[serde(default)]
            value: serde_json::Value,
        }

        let reply: Reply = self.eval_json(js).await?;
        if !reply.found {
            return Err(Error::ElementNotFound(element.selector.to_string()));
        }
        Ok(reply.value)
    }

    // ── Element Queries ─────────────────────────────────────────────

    /// Find all elements matching the given CSS selector.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<Element>> {
        let els = self
            .inner
            .find_elements(selector)
            .await
            .map_err(|e| Error::ElementNotFound(e.to_string()))?;
        Ok(els.into_iter().map(Element::new).collect())
    }

    /// Resolve a reference to a live element for input-event interaction.
    async fn resolve(&self, element: &ElementRef) -> Result<Element> {
        let candidates = self.find_elements(&element.selector.to_css()).await?;
        let mut matching = Vec::with_capacity(candidates.len());
        for el in candidates {
            if let Some(text) = element.selector.text_filter() {
                if !text_matches(&el.inner_text().await?, text) {
                    continue;
                }
            }
            matching.push(el);
        }
        matching
            .into_iter()
            .nth(element.index)
            .ok_or_else(|| Error::ElementNotFound(element.selector.to_string()))
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.recorder.abort();
    }
}

/// Script expression evaluating to the array of elements matching `selector`.
fn matches_js(selector: &Selector) -> Result<String> {
    let css = serde_json::to_string(&selector.to_css())?;
    let text = serde_json::to_string(&selector.text_filter().map(normalize_text))?;
    Ok(format!(
        "Array.from(document.querySelectorAll({css})).filter(e => {text} === null || \
         (e.innerText || e.textContent || '').replace(/\\s+/g, ' ').trim().toLowerCase().includes({text}))"
    ))
}

/// Script expression evaluating to the referenced element or `null`.
fn element_js(element: &ElementRef) -> Result<String> {
    Ok(format!("({}[{}] || null)", matches_js(&element.selector)?, element.index))
}

#[async_trait]
impl FormSurface for Page {
    async fn query(&self, selector: &Selector) -> Result<Vec<ElementInfo>> {
        let js = format!(
            "JSON.stringify({}.map(e => ({{ tag: e.tagName.toLowerCase(), type: e.getAttribute('type') || '' }})))",
            matches_js(selector)?
        );
        self.eval_json(js).await
    }

    async fn inventory(&self) -> Result<Vec<FormField>> {
        self.get_form_fields().await
    }

    async fn scroll_page(&self, edge: ScrollEdge) -> Result<()> {
        let js = match edge {
            ScrollEdge::Top => "window.scrollTo(0, 0)",
            ScrollEdge::Bottom => "window.scrollTo(0, document.body.scrollHeight)",
        };
        self.inner
            .evaluate(js)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        self.on_element(element, "el.scrollIntoView({ behavior: 'smooth', block: 'center' });")
            .await?;
        Ok(())
    }

    async fn bounding_box(&self, element: &ElementRef) -> Result<Option<BoundingBox>> {
        let body = "const r = el.getBoundingClientRect(); \
                    return { x: r.x, y: r.y, width: r.width, height: r.height };";
        match self.on_element(element, body).await {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(Error::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<()> {
        let value_js = serde_json::to_string(value)?;
        // The prototype setter keeps framework-managed inputs in sync.
        let body = format!(
            r#"
            el.focus();
            const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value')?.set;
            if (setter) setter.call(el, {value_js}); else el.value = {value_js};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#
        );
        self.on_element(element, &body).await?;
        Ok(())
    }

    async fn value(&self, element: &ElementRef) -> Result<String> {
        let value = self.on_element(element, "return el.value ?? '';").await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn displayed_value(&self, element: &ElementRef) -> Result<String> {
        let body = r#"
            const box = el.closest('[class*="container"]');
            const shown = box && box.querySelector('[class*="singleValue"], [class*="single-value"]');
            const text = shown ? (shown.textContent || '').trim() : '';
            return text || el.value || '';
        "#;
        let value = self.on_element(element, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn options(&self, element: &ElementRef) -> Result<Vec<SelectOption>> {
        let body = "return Array.from(el.options || []).map(o => \
                    ({ value: o.value, text: (o.textContent || '').trim() }));";
        let value = self.on_element(element, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn select_option(&self, element: &ElementRef, value: &str) -> Result<()> {
        let value_js = serde_json::to_string(value)?;
        let body = format!(
            r#"
            el.value = {value_js};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#
        );
        self.on_element(element, &body).await?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.resolve(element).await?.click().await
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.resolve(element).await?.type_text(text).await
    }

    async fn press_key(&self, element: &ElementRef, key: &str) -> Result<()> {
        self.resolve(element).await?.press_key(key).await
    }

    async fn current_url(&self) -> Result<String> {
        self.url().await
    }

    async fn texts(&self, selectors: &[Selector]) -> Result<Vec<String>> {
        let mut groups = Vec::with_capacity(selectors.len());
        for selector in selectors {
            groups.push(matches_js(selector)?);
        }
        let js = format!(
            r#"
            JSON.stringify((() => {{
                const found = new Set([{groups}].flat());
                return Array.from(found)
                    .sort((a, b) => (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1)
                    .map(e => (e.textContent || '').trim())
                    .filter(t => t.length > 0);
            }})())
            "#,
            groups = groups.join(", ")
        );
        self.eval_json(js).await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.screenshot_to_file(path).await
    }

    async fn begin_observation(&self) -> Result<()> {
        let mut finished = self.finished.lock().await;
        while let Ok(stale) = finished.try_recv() {
            debug!(url = %stale.url, "discarding exchange recorded before observation");
        }
        self.observing.store(true, Ordering::Release);
        Ok(())
    }

    async fn wait_for_response(
        &self,
        filter: &ResponseFilter,
        timeout: Duration,
    ) -> Result<Option<serde_json::Value>> {
        let mut finished = self.finished.lock().await;
        let matched = tokio::time::timeout(timeout, async {
            while let Some(exchange) = finished.recv().await {
                if filter.matches(&exchange.method, &exchange.url) {
                    return Some(exchange);
                }
            }
            None
        })
        .await
        .ok()
        .flatten();

        let Some(exchange) = matched else {
            return Ok(None);
        };
        debug!(method = %exchange.method, url = %exchange.url, "matched network exchange");

        let response = self
            .inner
            .execute(GetResponseBodyParams::new(exchange.request_id))
            .await
            .map_err(|e| Error::JsError(format!("Failed to read response body: {e}")))?;
        if response.result.base64_encoded {
            warn!(url = %exchange.url, "response body is binary, not decoding");
            return Ok(None);
        }
        match serde_json::from_str(&response.result.body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(url = %exchange.url, error = %e, "response body is not JSON");
                Ok(None)
            }
        }
    }
}
