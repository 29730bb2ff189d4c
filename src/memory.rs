//! In-memory host and canned data source.
//!
//! Headless implementations of the host seams: a link that counts native
//! clicks, an opener with named form fields, a popup that keeps the last
//! rendered fragments, and a [`CollectionSource`] answering from a route
//! table. Used by the test suites and by embedders that drive the picker
//! without a browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::CollectionSource;
use crate::descriptor::WriteTarget;
use crate::error::{ClassHelperError, Result};
use crate::host::{LinkElement, NativeClick, OpenerDocument, PopupFeatures, PopupWindow};
use crate::render::{AccumulatorFragment, PaginationFragment, PopupView, SearchFragment, TableFragment};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// LINK
// ============================================================================

/// Where a click on a [`MemoryLink`] went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClick {
    /// The native behavior ran.
    Native,
    /// The class helper owns the click.
    Intercepted,
}

/// A link whose native behavior just counts invocations.
pub struct MemoryLink {
    attributes: HashMap<String, String>,
    native: Mutex<Option<NativeClick>>,
    native_clicks: Arc<AtomicUsize>,
}

impl MemoryLink {
    pub fn new<I, K, V>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let native_clicks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&native_clicks);
        Self {
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            native: Mutex::new(Some(NativeClick::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))),
            native_clicks,
        }
    }

    /// Simulate a user click.
    pub fn click(&self) -> LinkClick {
        match lock(&self.native).as_mut() {
            Some(native) => {
                native.invoke();
                LinkClick::Native
            }
            None => LinkClick::Intercepted,
        }
    }

    pub fn native_clicks(&self) -> usize {
        self.native_clicks.load(Ordering::SeqCst)
    }

    pub fn is_intercepted(&self) -> bool {
        lock(&self.native).is_none()
    }
}

impl LinkElement for MemoryLink {
    fn data_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn intercept_click(&self) -> Option<NativeClick> {
        lock(&self.native).take()
    }

    fn restore_click(&self, native: NativeClick) {
        *lock(&self.native) = Some(native);
    }
}

// ============================================================================
// OPENER
// ============================================================================

/// Opener document with named form fields.
#[derive(Default)]
pub struct MemoryOpener {
    fields: Mutex<Vec<(Option<String>, String, String)>>,
    popups: Mutex<Vec<Arc<MemoryPopup>>>,
    failures: Mutex<Vec<String>>,
    block_popups: AtomicBool,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&self, form: Option<&str>, field: &str, value: &str) {
        let mut fields = lock(&self.fields);
        let form = form.map(str::to_string);
        match fields
            .iter_mut()
            .find(|(f, name, _)| *f == form && name.as_str() == field)
        {
            Some(entry) => entry.2 = value.to_string(),
            None => fields.push((form, field.to_string(), value.to_string())),
        }
    }

    /// Field lookup; without a form name the first field called `field`.
    pub fn field(&self, form: Option<&str>, field: &str) -> Option<String> {
        lock(&self.fields)
            .iter()
            .find(|(f, name, _)| name == field && (form.is_none() || f.as_deref() == form))
            .map(|(_, _, value)| value.clone())
    }

    /// Make subsequent `open_popup` calls fail, like a popup blocker.
    pub fn block_popups(&self, blocked: bool) {
        self.block_popups.store(blocked, Ordering::SeqCst);
    }

    pub fn popups_opened(&self) -> usize {
        lock(&self.popups).len()
    }

    pub fn last_popup(&self) -> Option<Arc<MemoryPopup>> {
        lock(&self.popups).last().cloned()
    }

    pub fn failures(&self) -> Vec<String> {
        lock(&self.failures).clone()
    }
}

impl OpenerDocument for MemoryOpener {
    fn field_value(&self, target: &WriteTarget) -> Option<String> {
        self.field(target.form.as_deref(), &target.field)
    }

    fn set_field_value(&self, target: &WriteTarget, value: &str) {
        let form = target.form.as_deref();
        // write where a read would have found it
        let existing = lock(&self.fields)
            .iter()
            .find(|(f, name, _)| *name == target.field && (form.is_none() || f.as_deref() == form))
            .map(|(f, _, _)| f.clone());
        match existing {
            Some(found) => self.set_field(found.as_deref(), &target.field, value),
            None => self.set_field(form, &target.field, value),
        }
    }

    fn open_popup(&self, features: &PopupFeatures) -> Result<Arc<dyn PopupWindow>> {
        if self.block_popups.load(Ordering::SeqCst) {
            return Err(ClassHelperError::Popup("popup blocked".to_string()));
        }
        let popup = Arc::new(MemoryPopup::new(*features));
        lock(&self.popups).push(Arc::clone(&popup));
        Ok(popup)
    }

    fn report_failure(&self, message: &str) {
        lock(&self.failures).push(message.to_string());
    }
}

// ============================================================================
// POPUP
// ============================================================================

/// A popup that keeps the current fragments for inspection.
pub struct MemoryPopup {
    features: PopupFeatures,
    view: Mutex<Option<PopupView>>,
    closed: AtomicBool,
}

impl MemoryPopup {
    pub fn new(features: PopupFeatures) -> Self {
        Self {
            features,
            view: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn features(&self) -> PopupFeatures {
        self.features
    }

    /// Snapshot of what is currently shown.
    pub fn view(&self) -> Option<PopupView> {
        lock(&self.view).clone()
    }

    /// The user closes the window directly.
    pub fn close_by_user(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn update(&self, apply: impl FnOnce(&mut PopupView)) {
        if let Some(view) = lock(&self.view).as_mut() {
            apply(view);
        }
    }
}

impl PopupWindow for MemoryPopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn render(&self, view: PopupView) {
        *lock(&self.view) = Some(view);
    }

    fn replace_search(&self, fragment: SearchFragment) {
        self.update(|view| view.search = Some(fragment));
    }

    fn replace_pagination(&self, fragment: PaginationFragment) {
        self.update(|view| view.pagination = fragment);
    }

    fn replace_table(&self, fragment: TableFragment) {
        self.update(|view| view.table = fragment);
    }

    fn replace_accumulator(&self, fragment: AccumulatorFragment) {
        self.update(|view| view.accumulator = fragment);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// DATA SOURCE
// ============================================================================

enum Reply {
    Json(Value),
    Fail(ClassHelperError),
}

/// [`CollectionSource`] answering from a route table.
///
/// A route matches when its pattern occurs in the requested URL (as
/// written, or percent-decoded); the first registered match wins. Unmatched
/// requests fail with a `Network` error. Every request is recorded.
#[derive(Default)]
pub struct StaticSource {
    routes: Vec<(String, Reply)>,
    requests: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, body: Value) -> Self {
        self.routes.push((pattern.to_string(), Reply::Json(body)));
        self
    }

    pub fn fail(mut self, pattern: &str, error: ClassHelperError) -> Self {
        self.routes.push((pattern.to_string(), Reply::Fail(error)));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl CollectionSource for StaticSource {
    async fn get_json(&self, url: &str) -> Result<Value> {
        lock(&self.requests).push(url.to_string());
        let decoded = percent_decode(url);
        let reply = self
            .routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()) || decoded.contains(pattern.as_str()))
            .map(|(_, reply)| reply);
        match reply {
            Some(Reply::Json(body)) => Ok(body.clone()),
            Some(Reply::Fail(error)) => Err(error.clone()),
            None => Err(ClassHelperError::network(url, "no route")),
        }
    }
}

fn percent_decode(url: &str) -> String {
    url::form_urlencoded::parse(url.as_bytes())
        .map(|(k, v)| if v.is_empty() { k.into_owned() } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join("&")
}
