#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use intake_pilot::error::{Error, Result};
use intake_pilot::selector::{text_matches, AttrMatch, Predicate, Selector};
use intake_pilot::surface::{
    BoundingBox, ElementInfo, ElementRef, FormField, FormSurface, ResponseFilter, ScrollEdge,
    SelectOption,
};
use intake_pilot::{RunConfig, Timing};

pub const FORM_URL: &str = "https://stub.test/form";

#[derive(Debug, Clone, Default)]
pub struct StubElement {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub value: String,
    pub options: Vec<SelectOption>,
    /// Choices of a searchable dropdown; `None` for plain elements.
    pub choices: Option<Vec<String>>,
    /// When set, reads of the value always return this.
    pub pinned_value: Option<String>,
}

impl StubElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn input(name: &str) -> Self {
        Self::new("input").attr("name", name).attr("type", "text")
    }

    pub fn textarea(name: &str) -> Self {
        Self::new("textarea").attr("name", name)
    }

    pub fn select(name: &str, options: &[(&str, &str)]) -> Self {
        let mut el = Self::new("select").attr("name", name);
        el.options = options.iter().map(|(v, t)| SelectOption::new(*v, *t)).collect();
        el
    }

    /// A react-select style search box.
    pub fn dropdown(library_index: u32, choices: &[&str]) -> Self {
        let mut el = Self::new("input")
            .attr("id", &format!("react-select-{library_index}-input"))
            .attr("role", "combobox")
            .attr("type", "text");
        el.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        el
    }

    pub fn button(text: &str) -> Self {
        Self::new("button").text(text)
    }

    pub fn div(class: &str, text: &str) -> Self {
        Self::new("div").attr("class", class).text(text)
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn pinned(mut self, value: &str) -> Self {
        self.pinned_value = Some(value.to_string());
        self
    }

    fn key(&self) -> String {
        self.attrs
            .get("name")
            .or_else(|| self.attrs.get("id"))
            .cloned()
            .unwrap_or_else(|| self.tag.clone())
    }

    fn read_value(&self) -> String {
        self.pinned_value.clone().unwrap_or_else(|| self.value.clone())
    }

    fn is_submit(&self) -> bool {
        match self.tag.as_str() {
            "button" => self.attrs.get("type").map_or(true, |t| t == "submit"),
            "input" => self.attrs.get("type").is_some_and(|t| t == "submit"),
            _ => false,
        }
    }
}

pub fn matches(selector: &Selector, el: &StubElement) -> bool {
    if !selector.tag.accepts(&el.tag) {
        return false;
    }
    match &selector.predicate {
        Predicate::Attr { name, value, op } => el.attrs.get(name).is_some_and(|v| match op {
            AttrMatch::Exact => v == value,
            AttrMatch::Contains => v.contains(value.as_str()),
        }),
        Predicate::Id(id) => el.attrs.get("id") == Some(id),
        Predicate::Class(class) => el
            .attrs
            .get("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
        Predicate::Text(text) => text_matches(&el.text, text),
    }
}

/// A finished request as the page's network log would show it.
#[derive(Debug, Clone)]
struct Exchange {
    method: String,
    url: String,
    body: serde_json::Value,
}

/// Makes an operation fail once it has succeeded `skip` times.
struct Failure {
    /// Prefix of the action string, e.g. `click:button` or `texts`.
    action: String,
    skip: usize,
}

#[derive(Default)]
struct State {
    url: String,
    elements: Vec<StubElement>,
    /// Appended to the page when a submit control is clicked.
    on_submit_append: Vec<StubElement>,
    /// URL the page moves to when a submit control is clicked.
    on_submit_navigate: Option<String>,
    /// Body of the `POST /api/submit` a submit click sends.
    response: Option<serde_json::Value>,
    /// Finished exchanges, cleared when observation begins.
    network: Vec<Exchange>,
    failures: Vec<Failure>,
    actions: Vec<String>,
    screenshots: Vec<PathBuf>,
}

impl State {
    fn record(&mut self, exchange: Exchange) {
        self.network.push(exchange);
    }

    fn check(&mut self, action: &str) -> Result<()> {
        let Some(failure) = self.failures.iter_mut().find(|f| action.starts_with(&f.action)) else {
            return Ok(());
        };
        if failure.skip > 0 {
            failure.skip -= 1;
            return Ok(());
        }
        Err(Error::JsError(format!("injected failure on {action}")))
    }
}

pub struct StubPage {
    state: Mutex<State>,
}

impl StubPage {
    pub fn new(elements: Vec<StubElement>) -> Self {
        Self {
            state: Mutex::new(State {
                url: FORM_URL.to_string(),
                elements,
                ..State::default()
            }),
        }
    }

    pub fn on_submit_append(self, element: StubElement) -> Self {
        self.lock().on_submit_append.push(element);
        self
    }

    pub fn on_submit_navigate(self, url: &str) -> Self {
        self.lock().on_submit_navigate = Some(url.to_string());
        self
    }

    pub fn with_response(self, body: serde_json::Value) -> Self {
        self.lock().response = Some(body);
        self
    }

    /// Simulate a request the page sends on its own right now, e.g. a
    /// lookup fired by a cascading dropdown.
    pub fn send_request(&self, method: &str, url: &str, body: serde_json::Value) {
        self.lock().record(Exchange {
            method: method.to_string(),
            url: url.to_string(),
            body,
        });
    }

    /// Fail every operation whose action starts with `action`.
    pub fn fail_on(self, action: &str) -> Self {
        self.fail_after(action, 0)
    }

    /// Let `skip` matching operations through, then fail the rest.
    pub fn fail_after(self, action: &str, skip: usize) -> Self {
        self.lock().failures.push(Failure {
            action: action.to_string(),
            skip,
        });
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    pub fn screenshots(&self) -> Vec<String> {
        self.lock()
            .screenshots
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }

    /// Current value of the first element whose name or id is `key`.
    pub fn value_of(&self, key: &str) -> Option<String> {
        self.lock()
            .elements
            .iter()
            .find(|e| e.key() == key)
            .map(StubElement::read_value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("stub state poisoned")
    }

    /// Index into `elements` of the referenced element.
    fn position(state: &State, element: &ElementRef) -> Result<usize> {
        state
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| matches(&element.selector, e))
            .map(|(i, _)| i)
            .nth(element.index)
            .ok_or_else(|| Error::ElementNotFound(element.selector.to_string()))
    }

    fn with_element<T>(
        &self,
        element: &ElementRef,
        action: &str,
        f: impl FnOnce(&mut StubElement) -> T,
    ) -> Result<T> {
        let mut state = self.lock();
        let at = Self::position(&state, element)?;
        let action = format!("{action}:{}", state.elements[at].key());
        state.check(&action)?;
        state.actions.push(action);
        Ok(f(&mut state.elements[at]))
    }
}

#[async_trait]
impl FormSurface for StubPage {
    async fn query(&self, selector: &Selector) -> Result<Vec<ElementInfo>> {
        Ok(self
            .lock()
            .elements
            .iter()
            .filter(|e| matches(selector, e))
            .map(|e| ElementInfo {
                tag: e.tag.clone(),
                r#type: e.attrs.get("type").cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn inventory(&self) -> Result<Vec<FormField>> {
        Ok(self
            .lock()
            .elements
            .iter()
            .filter(|e| matches!(e.tag.as_str(), "input" | "select" | "textarea"))
            .map(|e| {
                let attr = |k: &str| e.attrs.get(k).cloned().unwrap_or_default();
                FormField {
                    tag: e.tag.clone(),
                    r#type: attr("type"),
                    name: attr("name"),
                    id: attr("id"),
                    value: e.read_value(),
                    placeholder: attr("placeholder"),
                    label: String::new(),
                }
            })
            .collect())
    }

    async fn scroll_page(&self, edge: ScrollEdge) -> Result<()> {
        self.lock().actions.push(format!("scroll-page:{edge:?}"));
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        self.with_element(element, "scroll", |_| ())
    }

    async fn bounding_box(&self, element: &ElementRef) -> Result<Option<BoundingBox>> {
        let state = self.lock();
        Ok(Self::position(&state, element).ok().map(|at| BoundingBox {
            x: 0.0,
            y: at as f64 * 40.0,
            width: 200.0,
            height: 30.0,
        }))
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<()> {
        self.with_element(element, "set", |e| e.value = value.to_string())
    }

    async fn value(&self, element: &ElementRef) -> Result<String> {
        let state = self.lock();
        let at = Self::position(&state, element)?;
        Ok(state.elements[at].read_value())
    }

    async fn displayed_value(&self, element: &ElementRef) -> Result<String> {
        self.value(element).await
    }

    async fn options(&self, element: &ElementRef) -> Result<Vec<SelectOption>> {
        let state = self.lock();
        let at = Self::position(&state, element)?;
        Ok(state.elements[at].options.clone())
    }

    async fn select_option(&self, element: &ElementRef, value: &str) -> Result<()> {
        self.with_element(element, "select", |e| e.value = value.to_string())
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        let submitted = self.with_element(element, "click", |e| e.is_submit())?;
        if submitted {
            let mut state = self.lock();
            let appended = std::mem::take(&mut state.on_submit_append);
            state.elements.extend(appended);
            if let Some(url) = state.on_submit_navigate.take() {
                state.url = url;
            }
            if let Some(body) = state.response.clone() {
                state.record(Exchange {
                    method: "POST".into(),
                    url: "https://stub.test/api/submit".into(),
                    body,
                });
            }
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.with_element(element, "type", |e| e.value.push_str(text))
    }

    async fn press_key(&self, element: &ElementRef, key: &str) -> Result<()> {
        self.with_element(element, &format!("key-{key}"), |e| {
            let Some(choices) = &e.choices else { return };
            if key != "Enter" {
                return;
            }
            let typed = e.value.to_lowercase();
            // The highlighted suggestion is the first one containing the typed text.
            if let Some(top) = choices.iter().find(|c| c.to_lowercase().contains(&typed)) {
                e.value = top.clone();
            }
        })
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn texts(&self, selectors: &[Selector]) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.check("texts")?;
        Ok(state
            .elements
            .iter()
            .filter(|e| selectors.iter().any(|s| matches(s, e)))
            .map(|e| e.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn begin_observation(&self) -> Result<()> {
        let mut state = self.lock();
        state.network.clear();
        state.actions.push("observe".into());
        Ok(())
    }

    async fn wait_for_response(
        &self,
        filter: &ResponseFilter,
        _timeout: Duration,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self
            .lock()
            .network
            .iter()
            .find(|e| filter.matches(&e.method, &e.url))
            .map(|e| e.body.clone()))
    }
}

pub fn fast_timing() -> Timing {
    Timing {
        poll_interval: Duration::from_millis(1),
        settle_timeout: Duration::from_millis(20),
        submit_settle: Duration::from_millis(20),
        response_timeout: Duration::from_millis(10),
    }
}

pub fn test_config() -> RunConfig {
    RunConfig::default()
        .form_url(FORM_URL)
        .evidence_dir("evidence")
        .timing(fast_timing())
}

/// A page carrying every intake field: nine direct controls and three
/// searchable dropdowns.
pub fn intake_page() -> StubPage {
    StubPage::new(vec![
        StubElement::input("nombre"),
        StubElement::input("apellidos"),
        StubElement::input("telefono").attr("type", "tel"),
        StubElement::input("correo").attr("type", "email"),
        StubElement::input("direccion"),
        StubElement::dropdown(2, &["Argentina", "Colombia", "Costa Rica"]),
        StubElement::dropdown(3, &["Barranquilla", "Bogota", "Cali"]),
        StubElement::dropdown(4, &["Antioquia", "Cundinamarca", "Valle del Cauca"]),
        StubElement::input("codigoPostal"),
        StubElement::select(
            "ocupacion",
            &[("", "Seleccione"), ("Software Engineer", "Software Engineer"), ("Designer", "Designer")],
        ),
        StubElement::input("empresa"),
        StubElement::textarea("datosAdicionales"),
        StubElement::button("Enviar").attr("type", "submit"),
    ])
}
