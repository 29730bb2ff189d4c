//! Process-wide lookup catalogs: UI translations and dropdown options.
//!
//! Both are populated lazily, at most once, and are read-only afterwards.
//! Failures never block the picker: translations fall back to English and a
//! dropdown without options degrades to a text field.
//!
//! Controllers receive the catalogs as an `Arc<Catalogs>`; [`shared`] hands
//! out the page-wide instance and tests build their own with canned data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use classhelper_types::{CollectionEnvelope, DropdownOption};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::api::CollectionSource;
use crate::error::{ClassHelperError, Result};

/// Translation keys used by the popup, doubling as their English text.
pub const TRANSLATION_KEYS: [&str; 6] = ["Apply", "Cancel", "Next", "Prev", "Search", "Reset"];

/// Localized UI strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Translations {
    table: HashMap<String, String>,
}

impl Translations {
    /// The English defaults.
    pub fn english() -> Self {
        Self::default()
    }

    pub fn from_table(table: HashMap<String, String>) -> Self {
        Self { table }
    }

    /// Localized text for `key`, or the key itself when untranslated.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.table.get(key).map(String::as_str).unwrap_or(key)
    }

    fn from_json(url: &str, body: Value) -> Result<Self> {
        let Value::Object(map) = body else {
            return Err(ClassHelperError::response_format(
                url,
                "translation response is not an object",
            ));
        };
        let table = map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key, text)),
                _ => None,
            })
            .collect();
        Ok(Self { table })
    }
}

/// Translations, fetched once.
#[derive(Debug, Default)]
pub struct TranslationCache {
    cell: OnceCell<Translations>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that is already loaded and never touches the network.
    pub fn preloaded(translations: Translations) -> Self {
        Self {
            cell: OnceCell::new_with(Some(translations)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Load on first use; later calls return the cached table.
    ///
    /// Any failure is logged and the English defaults are cached instead.
    pub async fn load(&self, source: &dyn CollectionSource, url: &str) -> Translations {
        self.cell
            .get_or_init(|| async {
                match fetch_translations(source, url).await {
                    Ok(translations) => {
                        debug!(url, "translations loaded");
                        translations
                    }
                    Err(error) => {
                        warn!(%error, "error fetching translations, using english");
                        Translations::english()
                    }
                }
            })
            .await
            .clone()
    }

    /// Current table, English if not loaded yet.
    pub fn current(&self) -> Translations {
        self.cell.get().cloned().unwrap_or_default()
    }
}

async fn fetch_translations(source: &dyn CollectionSource, url: &str) -> Result<Translations> {
    let body = source.get_json(url).await?;
    Translations::from_json(url, body)
}

/// Dropdown options keyed by source URL, each fetched once.
#[derive(Debug, Default)]
pub struct DropdownCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Vec<DropdownOption>>>>>,
}

impl DropdownCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install canned options for a source URL.
    pub fn preload(&self, url: &str, options: Vec<DropdownOption>) {
        let cell = OnceCell::new_with(Some(options));
        self.lock().insert(url.to_string(), Arc::new(cell));
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.lock()
            .get(url)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Options for `url`, fetching on first use.
    ///
    /// A failed fetch is logged and cached as "no options".
    pub async fn options(&self, source: &dyn CollectionSource, url: &str) -> Vec<DropdownOption> {
        let cell = Arc::clone(self.lock().entry(url.to_string()).or_default());
        cell.get_or_init(|| async {
            match fetch_dropdown_options(source, url).await {
                Ok(options) => options,
                Err(error) => {
                    warn!(%error, "error fetching dropdown options");
                    Vec::new()
                }
            }
        })
        .await
        .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<Vec<DropdownOption>>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fetch a verbose collection and turn each record into an option.
pub async fn fetch_dropdown_options(
    source: &dyn CollectionSource,
    url: &str,
) -> Result<Vec<DropdownOption>> {
    let body = source.get_json(url).await?;
    let envelope: CollectionEnvelope = serde_json::from_value(body)
        .map_err(|e| ClassHelperError::response_format(url, e))?;
    Ok(envelope
        .data
        .collection
        .iter()
        .filter_map(DropdownOption::from_record)
        .collect())
}

/// Both catalogs.
#[derive(Debug, Default)]
pub struct Catalogs {
    pub translations: TranslationCache,
    pub dropdowns: DropdownCache,
}

impl Catalogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translations(translations: Translations) -> Self {
        Self {
            translations: TranslationCache::preloaded(translations),
            dropdowns: DropdownCache::new(),
        }
    }
}

static SHARED: OnceLock<Arc<Catalogs>> = OnceLock::new();

/// The page-wide catalogs.
pub fn shared() -> Arc<Catalogs> {
    Arc::clone(SHARED.get_or_init(|| Arc::new(Catalogs::new())))
}
