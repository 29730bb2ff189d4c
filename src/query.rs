//! Query building for the tracker REST API.
//!
//! Collection URLs are built once from the descriptor and the live
//! [`QueryState`]. After that, navigation follows server-supplied links and
//! the page index is read back from the `self` link, never recomputed.

use std::collections::BTreeMap;

use url::Url;

use crate::catalog::TRANSLATION_KEYS;
use crate::config::ClassHelperConfig;
use crate::descriptor::{LinkDescriptor, SearchField};
use crate::error::Result;
use crate::location::PageLocation;

pub const PAGE_INDEX: &str = "@page_index";
pub const PAGE_SIZE: &str = "@page_size";
pub const FIELDS: &str = "@fields";
pub const SORT: &str = "@sort";
pub const VERBOSE: &str = "@verbose";
pub const TEMPLATE: &str = "@template";

/// Submitted search form values, field name to text.
pub type SearchFilters = BTreeMap<String, String>;

/// Mutable query state of one popup session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    page_index: u32,
    search_filters: SearchFilters,
}

impl QueryState {
    pub fn new(descriptor: &LinkDescriptor) -> Self {
        Self {
            page_index: descriptor.initial_page_index,
            search_filters: SearchFilters::new(),
        }
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn search_filters(&self) -> &SearchFilters {
        &self.search_filters
    }

    /// Start a new search: filters are replaced wholesale and the page
    /// index goes back to 1.
    pub fn begin_search(&mut self, filters: SearchFilters) {
        self.page_index = 1;
        self.search_filters = filters;
    }

    /// Adopt the page index carried by a `self` link.
    ///
    /// Returns the new index, or `None` (state untouched) when the link
    /// carries no usable `@page_index`.
    pub fn sync_from_self_link(&mut self, self_uri: &str) -> Option<u32> {
        let index = page_index_from_uri(self_uri)?;
        self.page_index = index;
        Some(index)
    }
}

/// Read `@page_index` from a hypermedia link.
pub fn page_index_from_uri(uri: &str) -> Option<u32> {
    let url = Url::parse(uri).ok()?;
    let index = url
        .query_pairs()
        .find(|(key, _)| key == PAGE_INDEX)
        .map(|(_, value)| value.into_owned())?;
    index.trim().parse().ok()
}

/// Collection URL: page index, page size and field projection always,
/// sort only when the descriptor has one.
pub fn build_collection_url(base: &Url, descriptor: &LinkDescriptor, state: &QueryState) -> Url {
    let mut url = base.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(PAGE_INDEX, &state.page_index.to_string())
            .append_pair(PAGE_SIZE, &descriptor.page_size.to_string())
            .append_pair(FIELDS, &descriptor.display_fields.join(","));
        if !descriptor.sort_spec.is_empty() {
            query.append_pair(SORT, &descriptor.sort_spec.join(","));
        }
    }
    url
}

/// Collection URL plus one parameter per non-empty search filter.
pub fn build_search_url(base: &Url, descriptor: &LinkDescriptor, state: &QueryState) -> Url {
    let mut url = build_collection_url(base, descriptor, state);
    let filters: Vec<_> = state
        .search_filters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    if !filters.is_empty() {
        let mut query = url.query_pairs_mut();
        for (field, value) in filters {
            query.append_pair(field, value);
        }
    }
    url
}

/// Dropdown option source for a search field.
///
/// Fields listed in `dropdown_sources` come from the REST root, every other
/// field from the data API class of the same name.
pub fn build_dropdown_url(
    location: &PageLocation,
    config: &ClassHelperConfig,
    field: &SearchField,
) -> Result<Url> {
    let mut url = match config.dropdown_sources.get(&field.name) {
        Some(path) => location.rest_root_url(config, path)?,
        None => location.collection_url(config, &field.name)?,
    };
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(VERBOSE, "2");
        if let Some(sort) = field.dropdown.as_ref().and_then(|d| d.sort.as_ref()) {
            query.append_pair(SORT, &sort.param());
        }
    }
    Ok(url)
}

/// `{tracker}?@template=json&properties=Apply,Cancel,...`
pub fn build_translation_url(location: &PageLocation) -> Result<Url> {
    let mut url = location.tracker_url()?;
    url.query_pairs_mut()
        .append_pair(TEMPLATE, "json")
        .append_pair("properties", &TRANSLATION_KEYS.join(","));
    Ok(url)
}
