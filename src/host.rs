//! Host seams: the link, the opener document and the popup window.
//!
//! The controller never touches a DOM. Whatever embeds it (a browser
//! binding, a test harness, a TUI) implements these traits; the two windows
//! only ever talk through a [`SessionHandle`].

use std::fmt;
use std::sync::Arc;

use crate::descriptor::{LinkDescriptor, WriteTarget};
use crate::error::Result;
use crate::render::{AccumulatorFragment, PaginationFragment, PopupView, SearchFragment, TableFragment};
use crate::selection::SelectionSet;

/// A link's native click behavior, captured once before interception so it
/// can be handed back on failure.
pub struct NativeClick(Box<dyn FnMut() + Send>);

impl NativeClick {
    pub fn new(action: impl FnMut() + Send + 'static) -> Self {
        Self(Box::new(action))
    }

    pub fn invoke(&mut self) {
        (self.0)()
    }
}

impl fmt::Debug for NativeClick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeClick")
    }
}

/// The class-help anchor.
pub trait LinkElement: Send + Sync {
    /// Value of `data-{name}`.
    fn data_attribute(&self, name: &str) -> Option<String>;

    /// Suppress the native click and hand it over. `None` if it is already
    /// intercepted.
    fn intercept_click(&self) -> Option<NativeClick>;

    /// Give the native click back.
    fn restore_click(&self, native: NativeClick);
}

/// The wrapping element: the links it contains and its `searchWith`
/// attribute.
#[derive(Clone)]
pub struct ClassHelperElement {
    pub links: Vec<Arc<dyn LinkElement>>,
    pub search_with: Option<String>,
}

impl ClassHelperElement {
    pub fn new(link: Arc<dyn LinkElement>) -> Self {
        Self {
            links: vec![link],
            search_with: None,
        }
    }

    pub fn search_with(mut self, fields: &str) -> Self {
        self.search_with = Some(fields.to_string());
        self
    }
}

/// Window features requested for the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
}

impl PopupFeatures {
    pub fn for_descriptor(descriptor: &LinkDescriptor) -> Self {
        Self {
            width: descriptor.popup_width,
            height: descriptor.popup_height,
        }
    }
}

impl fmt::Display for PopupFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "popup=yes,width={},height={}", self.width, self.height)
    }
}

/// The document the class-help link lives in.
pub trait OpenerDocument: Send + Sync {
    fn field_value(&self, target: &WriteTarget) -> Option<String>;

    fn set_field_value(&self, target: &WriteTarget, value: &str);

    /// Open a blank secondary window.
    fn open_popup(&self, features: &PopupFeatures) -> Result<Arc<dyn PopupWindow>>;

    /// Visible failure indication for a session that had to be aborted.
    fn report_failure(&self, message: &str);
}

/// The secondary window.
///
/// The user may close it at any time without the controller noticing, so
/// every use is preceded by [`PopupWindow::is_closed`].
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;

    /// Initial render of the whole popup.
    fn render(&self, view: PopupView);

    fn replace_search(&self, fragment: SearchFragment);

    fn replace_pagination(&self, fragment: PaginationFragment);

    fn replace_table(&self, fragment: TableFragment);

    fn replace_accumulator(&self, fragment: AccumulatorFragment);

    fn close(&self);
}

/// The only path between the two windows.
///
/// Reads the opener's target field once when a session starts and writes
/// it once when the session is finalized.
#[derive(Clone)]
pub struct SessionHandle {
    opener: Arc<dyn OpenerDocument>,
    target: Option<WriteTarget>,
}

impl SessionHandle {
    pub fn new(opener: Arc<dyn OpenerDocument>, target: Option<WriteTarget>) -> Self {
        Self { opener, target }
    }

    pub fn target(&self) -> Option<&WriteTarget> {
        self.target.as_ref()
    }

    /// Selection seeded from the target field; empty without a target.
    pub fn seed(&self) -> SelectionSet {
        self.target
            .as_ref()
            .and_then(|target| self.opener.field_value(target))
            .map(|value| SelectionSet::seeded(&value))
            .unwrap_or_default()
    }

    /// Write `value` back. Returns whether there was a target to write to.
    pub fn commit(&self, value: &str) -> bool {
        match &self.target {
            Some(target) => {
                self.opener.set_field_value(target, value);
                true
            }
            None => false,
        }
    }
}
