//! classhelper - popup record picker for tracker class-help links
//!
//! A class-help link on an edit form opens a popup listing records of a
//! tracker class. The user pages through them, filters them and ticks rows;
//! Apply writes the comma-joined ids back into a field of the form.
//!
//! ## Flow
//! ```text
//! link attributes ─► LinkDescriptor ─► QueryState ─► REST URL ─► PageResult
//!                                                                   │
//!        opener field ◄── SessionHandle ◄── ClassHelper ◄── PickerEvent bus
//! ```
//!
//! The crate is headless: a host supplies the link, the opener document and
//! the popup window through the traits in [`host`], and the data through a
//! [`api::CollectionSource`] ([`RestClient`] for a live tracker).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use classhelper::memory::{MemoryLink, MemoryOpener};
//! use classhelper::{ClassHelper, ClassHelperConfig, ClassHelperElement, HostEnvironment, PageLocation, RestClient};
//!
//! # async fn run() -> classhelper::Result<()> {
//! let config = ClassHelperConfig::from_env()?;
//! let link = Arc::new(MemoryLink::new([
//!     ("helpurl", "keyword?@startwith=0&@pagesize=20&properties=id,name&property=keyword&form=issue_edit"),
//!     ("width", "600"),
//!     ("height", "500"),
//! ]));
//! let env = HostEnvironment::new(
//!     PageLocation::parse("https://bugs.example.org/demo/issue12")?,
//!     Arc::new(MemoryOpener::new()),
//!     Arc::new(RestClient::new(&config)?),
//! )
//! .with_config(config);
//!
//! if let Some(mut helper) = ClassHelper::connect(&ClassHelperElement::new(link), env) {
//!     helper.click().await?;
//!     helper.process_events().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod host;
pub mod location;
pub mod logging;
pub mod memory;
pub mod query;
pub mod render;
pub mod selection;

pub use api::{CollectionSource, PageResult, RestClient};
pub use catalog::{Catalogs, Translations};
pub use config::ClassHelperConfig;
pub use controller::{ClassHelper, HostEnvironment, SessionEnd, SessionState};
pub use descriptor::{LinkDescriptor, SearchField, SelectionMode, WriteTarget};
pub use error::{ClassHelperError, DescriptorError, Result};
pub use events::{NavigationGate, PageDirection, PickerEvent};
pub use host::{ClassHelperElement, LinkElement, OpenerDocument, PopupWindow, SessionHandle};
pub use location::PageLocation;
pub use query::{QueryState, SearchFilters};
pub use selection::SelectionSet;

// Wire types
pub use classhelper_types::{DropdownOption, Record};
