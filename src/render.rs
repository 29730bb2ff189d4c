//! Popup fragments
//!
//! View models for the four parts of the popup: search form, pagination
//! bar, result table and accumulator bar. They carry no markup; a host
//! turns them into whatever it renders.
//!
//! Every interactive control raises exactly one [`PickerEvent`] on the
//! session bus. Pagination and search controls stay silent while the
//! [`NavigationGate`] is closed.

use classhelper_types::{DropdownOption, Record};

use crate::api::PageResult;
use crate::catalog::Translations;
use crate::descriptor::{LinkDescriptor, SearchField};
use crate::events::{EventSender, NavigationGate, PageDirection, PickerEvent};
use crate::query::SearchFilters;
use crate::selection::SelectionSet;

/// Everything shown in a freshly opened popup.
#[derive(Debug, Clone)]
pub struct PopupView {
    pub stylesheet: String,
    pub search: Option<SearchFragment>,
    pub pagination: PaginationFragment,
    pub table: TableFragment,
    pub accumulator: AccumulatorFragment,
}

// ============================================================================
// SEARCH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchInput {
    Text { name: String },
    Dropdown { name: String, options: Vec<DropdownOption> },
}

impl SearchInput {
    pub fn name(&self) -> &str {
        match self {
            SearchInput::Text { name } | SearchInput::Dropdown { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchFragment {
    pub inputs: Vec<SearchInput>,
    pub search_label: String,
    pub reset_label: String,
    bus: EventSender,
    gate: NavigationGate,
}

impl SearchFragment {
    /// Submit the form. Returns whether the search was raised.
    pub fn submit<I, K, V>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !self.gate.is_open() {
            return false;
        }
        let filters: SearchFilters = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.bus.emit(PickerEvent::SearchSubmitted { filters })
    }

    /// Submit with every input blank.
    pub fn submit_empty(&self) -> bool {
        self.submit(
            self.inputs
                .iter()
                .map(|input| (input.name().to_string(), String::new())),
        )
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct PageControl {
    pub label: String,
    pub uri: String,
    direction: PageDirection,
    view: u64,
    bus: EventSender,
    gate: NavigationGate,
}

impl PageControl {
    /// Follow the link. Returns whether the request was raised.
    pub fn activate(&self) -> bool {
        if !self.gate.is_open() {
            return false;
        }
        self.bus.emit_for_view(
            PickerEvent::PageRequested {
                direction: self.direction,
                uri: self.uri.clone(),
            },
            self.view,
        )
    }
}

#[derive(Debug, Clone)]
pub struct PaginationFragment {
    pub prev: Option<PageControl>,
    /// `"first..last"` row numbers of the page.
    pub info: String,
    pub next: Option<PageControl>,
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct TableRow {
    pub key: String,
    pub cells: Vec<String>,
    pub selected: bool,
    bus: EventSender,
}

impl TableRow {
    pub fn toggle(&self) -> bool {
        self.bus.emit(PickerEvent::RowToggled {
            key: self.key.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TableFragment {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TableFragment {
    pub fn row(&self, key: &str) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.key == key)
    }
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct AccumulatorFragment {
    /// Preview of the joined selection.
    pub value: String,
    pub apply_label: String,
    pub cancel_label: String,
    bus: EventSender,
}

impl AccumulatorFragment {
    pub fn apply(&self) -> bool {
        self.finalize()
    }

    /// Raises the same event as Apply.
    pub fn cancel(&self) -> bool {
        self.finalize()
    }

    fn finalize(&self) -> bool {
        self.bus.emit(PickerEvent::SelectionFinalized {
            value: self.value.clone(),
        })
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builds fragments wired to one session's bus.
///
/// Pure given its inputs: the same data always yields the same fragment.
#[derive(Debug, Clone)]
pub struct FragmentBuilder {
    bus: EventSender,
    gate: NavigationGate,
    translations: Translations,
}

impl FragmentBuilder {
    pub fn new(bus: EventSender, gate: NavigationGate, translations: Translations) -> Self {
        Self {
            bus,
            gate,
            translations,
        }
    }

    pub fn search(&self, fields: &[SearchField], options: &[Vec<DropdownOption>]) -> SearchFragment {
        let inputs = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| match (&field.dropdown, options.get(idx)) {
                (Some(_), Some(options)) if !options.is_empty() => SearchInput::Dropdown {
                    name: field.name.clone(),
                    options: options.clone(),
                },
                _ => SearchInput::Text {
                    name: field.name.clone(),
                },
            })
            .collect();

        SearchFragment {
            inputs,
            search_label: self.translations.get("Search").to_string(),
            reset_label: self.translations.get("Reset").to_string(),
            bus: self.bus.clone(),
            gate: self.gate.clone(),
        }
    }

    /// Controls are omitted for directions the server gave no link for.
    pub fn pagination(
        &self,
        page: &PageResult,
        page_index: u32,
        page_size: u32,
        view: u64,
    ) -> PaginationFragment {
        let control = |uri: &Option<String>, direction, label: &str| {
            uri.as_ref().map(|uri| PageControl {
                label: self.translations.get(label).to_string(),
                uri: uri.clone(),
                direction,
                view,
                bus: self.bus.clone(),
                gate: self.gate.clone(),
            })
        };

        PaginationFragment {
            prev: control(&page.previous_page_uri, PageDirection::Prev, "Prev"),
            info: page_range(page_index, page_size),
            next: control(&page.next_page_uri, PageDirection::Next, "Next"),
        }
    }

    pub fn table(
        &self,
        descriptor: &LinkDescriptor,
        rows: &[Record],
        selection: &SelectionSet,
    ) -> TableFragment {
        let key_field = descriptor.key_field();
        let rows = rows
            .iter()
            .map(|record| {
                let key = key_field
                    .map(|field| PageResult::cell(record, field))
                    .unwrap_or_default();
                TableRow {
                    selected: selection.contains(&key),
                    cells: descriptor
                        .display_fields
                        .iter()
                        .map(|field| PageResult::cell(record, field))
                        .collect(),
                    key,
                    bus: self.bus.clone(),
                }
            })
            .collect();

        TableFragment {
            headers: descriptor.display_fields.clone(),
            rows,
        }
    }

    pub fn accumulator(&self, selection: &SelectionSet) -> AccumulatorFragment {
        AccumulatorFragment {
            value: selection.current_value(),
            apply_label: self.translations.get("Apply").to_string(),
            cancel_label: self.translations.get("Cancel").to_string(),
            bus: self.bus.clone(),
        }
    }
}

/// Row range label, e.g. page 2 of size 10 is `"11..20"`.
pub fn page_range(page_index: u32, page_size: u32) -> String {
    let index = u64::from(page_index.max(1));
    let size = u64::from(page_size);
    format!("{}..{}", 1 + (index - 1) * size, index * size)
}
