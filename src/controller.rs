//! Popup session controller
//!
//! One [`ClassHelper`] owns one class-help link. Activating the link opens a
//! popup session; fragments in the popup raise events on the session bus;
//! [`ClassHelper::process_events`] consumes them and re-renders.
//!
//! ```text
//!   Idle ──click──► Opening ──ok──► Ready ◄──────────────┐
//!                      │              │  nextPage/prevPage │
//!                      │              ├──► Paging ─────────┤
//!                      │              │  search            │
//!                      │              ├──► Searching ──────┘
//!                      │              │  valueSelected
//!                      │              └──► Applying ──► Idle
//!                      └──── any fetch/parse error ────► Failed
//! ```
//!
//! Failed closes the popup, gives the link its native click back and drops
//! the session bus. Nothing retries; a later click starts from scratch.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::api::{fetch_page, CollectionSource, PageResult};
use crate::catalog::{Catalogs, Translations};
use crate::config::ClassHelperConfig;
use crate::descriptor::{LinkDescriptor, SearchField};
use crate::error::{ClassHelperError, DescriptorError, Result};
use crate::events::{self, BusMessage, BusStats, EventReceiver, NavigationGate, PageDirection, PickerEvent};
use crate::host::{
    ClassHelperElement, LinkElement, NativeClick, OpenerDocument, PopupFeatures, PopupWindow,
    SessionHandle,
};
use crate::location::PageLocation;
use crate::query::{
    build_collection_url, build_dropdown_url, build_search_url, build_translation_url, QueryState,
    SearchFilters,
};
use crate::render::{FragmentBuilder, PopupView, SearchFragment};
use crate::selection::SelectionSet;

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Ready,
    Paging,
    Searching,
    Applying,
    Failed,
}

/// How a popup session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Apply or Cancel. `written` is false when the link has no target field.
    Finalized { value: String, written: bool },
    /// The window was closed directly; the selection was discarded.
    ClosedByUser,
}

/// Everything a controller needs from the page it lives on.
#[derive(Clone)]
pub struct HostEnvironment {
    pub location: PageLocation,
    pub opener: Arc<dyn OpenerDocument>,
    pub source: Arc<dyn CollectionSource>,
    pub catalogs: Arc<Catalogs>,
    pub config: Arc<ClassHelperConfig>,
}

impl HostEnvironment {
    /// Environment using the page-wide catalogs and default configuration.
    pub fn new(
        location: PageLocation,
        opener: Arc<dyn OpenerDocument>,
        source: Arc<dyn CollectionSource>,
    ) -> Self {
        Self {
            location,
            opener,
            source,
            catalogs: crate::catalog::shared(),
            config: Arc::new(ClassHelperConfig::default()),
        }
    }

    pub fn with_catalogs(mut self, catalogs: Arc<Catalogs>) -> Self {
        self.catalogs = catalogs;
        self
    }

    pub fn with_config(mut self, config: ClassHelperConfig) -> Self {
        self.config = Arc::new(config);
        self
    }
}

/// State of one open popup.
struct PopupSession {
    id: Uuid,
    popup: Arc<dyn PopupWindow>,
    handle: SessionHandle,
    query: QueryState,
    selection: SelectionSet,
    page: PageResult,
    receiver: EventReceiver,
    gate: NavigationGate,
    fragments: FragmentBuilder,
    /// Bumped whenever the pagination bar is replaced.
    view: u64,
}

/// Controller for one class-help link.
pub struct ClassHelper {
    link: Arc<dyn LinkElement>,
    native: Option<NativeClick>,
    descriptor: LinkDescriptor,
    base_url: Url,
    stylesheet: String,
    search_with: Option<String>,
    env: HostEnvironment,
    state: SessionState,
    session: Option<PopupSession>,
    last_error: Option<ClassHelperError>,
}

impl ClassHelper {
    /// Take over the element's link.
    ///
    /// Returns `None` when the element cannot be activated; the reason is
    /// logged and the link keeps its native click.
    pub fn connect(element: &ClassHelperElement, env: HostEnvironment) -> Option<Self> {
        if env.location.is_disabled(&env.config) {
            debug!("class helper disabled by page url");
            return None;
        }
        match Self::activate(element, env) {
            Ok(helper) => Some(helper),
            Err(error) => {
                error!(%error, "class helper not activated");
                None
            }
        }
    }

    /// Like [`ClassHelper::connect`] but hands back the reason.
    ///
    /// On error the link has already been restored.
    pub fn try_connect(element: &ClassHelperElement, env: HostEnvironment) -> Result<Self> {
        if env.location.is_disabled(&env.config) {
            return Err(ClassHelperError::Environment(
                "class helper disabled by page url".to_string(),
            ));
        }
        Self::activate(element, env)
    }

    fn activate(element: &ClassHelperElement, env: HostEnvironment) -> Result<Self> {
        let link = match element.links.as_slice() {
            [link] => Arc::clone(link),
            links => return Err(DescriptorError::LinkCount(links.len()).into()),
        };

        let native = link.intercept_click();
        let parsed = LinkDescriptor::from_link(link.as_ref())
            .map_err(ClassHelperError::from)
            .and_then(|descriptor| {
                let base_url = env
                    .location
                    .collection_url(&env.config, &descriptor.collection_path)?;
                let stylesheet = env.location.stylesheet_url(&env.config)?.to_string();
                Ok((descriptor, base_url, stylesheet))
            });

        match parsed {
            Ok((descriptor, base_url, stylesheet)) => {
                debug!(class = %descriptor.collection_path, %base_url, "class helper connected");
                Ok(Self {
                    link,
                    native,
                    descriptor,
                    base_url,
                    stylesheet,
                    search_with: element.search_with.clone(),
                    env,
                    state: SessionState::Idle,
                    session: None,
                    last_error: None,
                })
            }
            Err(error) => {
                if let Some(native) = native {
                    link.restore_click(native);
                }
                Err(error)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn descriptor(&self) -> &LinkDescriptor {
        &self.descriptor
    }

    pub fn query_state(&self) -> Option<&QueryState> {
        self.session.as_ref().map(|s| &s.query)
    }

    pub fn selection(&self) -> Option<&SelectionSet> {
        self.session.as_ref().map(|s| &s.selection)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn bus_stats(&self) -> Option<BusStats> {
        self.session.as_ref().map(|s| s.receiver.stats())
    }

    pub fn last_error(&self) -> Option<&ClassHelperError> {
        self.last_error.as_ref()
    }

    /// Warm the translation catalog ahead of the first click.
    pub async fn prefetch_translations(&self) {
        self.translations().await;
    }

    /// The intercepted link was clicked.
    ///
    /// Opens a popup unless one is already open. After a failure the link
    /// is re-armed first, so a click always starts a clean session.
    #[instrument(skip_all, fields(class = %self.descriptor.collection_path))]
    pub async fn click(&mut self) -> Result<()> {
        if self.state == SessionState::Failed {
            self.rearm();
        }
        if let Some(session) = &self.session {
            if !session.popup.is_closed() {
                debug!(session = %session.id, "popup already open");
                return Ok(());
            }
            self.end_closed_by_user();
        }
        self.open().await
    }

    /// Take the link's click back after a failure.
    pub fn rearm(&mut self) {
        if self.native.is_none() {
            self.native = self.link.intercept_click();
        }
        self.state = SessionState::Idle;
    }

    /// The wrapper's `searchWith` attribute changed.
    ///
    /// An open popup gets a rebuilt search fragment; when the attribute was
    /// previously unset the new fields show up on the next open only.
    pub async fn set_search_with(&mut self, value: Option<String>) {
        let previous = std::mem::replace(&mut self.search_with, value);
        if previous.is_none() {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.popup.is_closed() {
            return;
        }
        let fragment = self.search_fragment(&session.fragments).await;
        session.popup.replace_search(fragment);
    }

    /// Drain the session bus.
    ///
    /// Returns `Some` once the session has ended, either through Apply /
    /// Cancel or because the popup was closed directly.
    pub async fn process_events(&mut self) -> Result<Option<SessionEnd>> {
        loop {
            let Some(session) = self.session.as_ref() else {
                return Ok(None);
            };
            if session.popup.is_closed() {
                return Ok(Some(self.end_closed_by_user()));
            }
            let Some(message) = session.receiver.try_recv() else {
                return Ok(None);
            };
            if let Some(end) = self.dispatch(message).await? {
                return Ok(Some(end));
            }
        }
    }

    async fn dispatch(&mut self, message: BusMessage) -> Result<Option<SessionEnd>> {
        debug!(event = message.event.name(), "event");
        match message.event {
            PickerEvent::PageRequested { direction, uri } => {
                let current = self.session.as_ref().map(|s| s.view);
                if message.view.is_some() && message.view != current {
                    debug!(?direction, "page request from a replaced pagination bar, ignoring");
                    return Ok(None);
                }
                self.page_change(direction, &uri).await
            }
            PickerEvent::SearchSubmitted { filters } => self.search(filters).await,
            PickerEvent::RowToggled { key } => {
                self.toggle(&key);
                Ok(None)
            }
            PickerEvent::SelectionFinalized { value } => Ok(Some(self.finalize(value))),
        }
    }

    async fn open(&mut self) -> Result<()> {
        self.state = SessionState::Opening;
        let id = Uuid::new_v4();
        let handle = SessionHandle::new(
            Arc::clone(&self.env.opener),
            self.descriptor.target.clone(),
        );
        let selection = handle.seed();

        let features = PopupFeatures::for_descriptor(&self.descriptor);
        let popup = match self.env.opener.open_popup(&features) {
            Ok(popup) => popup,
            Err(error) => return Err(self.fail(error)),
        };
        info!(session = %id, %features, seeded = selection.len(), "popup opened");

        let (bus, receiver) = events::channel(self.env.config.event_buffer);
        let gate = NavigationGate::new();
        let fragments = FragmentBuilder::new(bus, gate.clone(), self.translations().await);
        let query = QueryState::new(&self.descriptor);
        let url = build_collection_url(&self.base_url, &self.descriptor, &query);

        self.session = Some(PopupSession {
            id,
            popup,
            handle,
            query,
            selection,
            page: PageResult::default(),
            receiver,
            gate: gate.clone(),
            fragments,
            view: 0,
        });

        let fetched = {
            let _busy = gate.hold();
            fetch_page(self.env.source.as_ref(), url.as_str()).await
        };
        let page = match fetched {
            Ok(page) => page,
            Err(error) => return Err(self.fail(error)),
        };

        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let search = match &self.search_with {
            Some(_) => Some(self.search_fragment(&session.fragments).await),
            None => None,
        };

        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.popup.is_closed() {
            self.end_closed_by_user();
            return Ok(());
        }
        sync_page_index(&mut session.query, &page);
        session.page = page;
        session.view += 1;
        let fragments = &session.fragments;
        session.popup.render(PopupView {
            stylesheet: self.stylesheet.clone(),
            search,
            pagination: fragments.pagination(
                &session.page,
                session.query.page_index(),
                self.descriptor.page_size,
                session.view,
            ),
            table: fragments.table(&self.descriptor, &session.page.rows, &session.selection),
            accumulator: fragments.accumulator(&session.selection),
        });
        self.state = SessionState::Ready;
        Ok(())
    }

    #[instrument(skip_all, fields(?direction))]
    async fn page_change(&mut self, direction: PageDirection, uri: &str) -> Result<Option<SessionEnd>> {
        self.state = SessionState::Paging;
        self.fetch_and_show(uri).await
    }

    #[instrument(skip_all, fields(filters = filters.len()))]
    async fn search(&mut self, filters: SearchFilters) -> Result<Option<SessionEnd>> {
        self.state = SessionState::Searching;
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        session.query.begin_search(filters);
        let url = build_search_url(&self.base_url, &self.descriptor, &session.query);
        self.fetch_and_show(url.as_str()).await
    }

    /// Fetch `uri` and replace the pagination bar and the table. The search
    /// form and the accumulator bar are left alone.
    async fn fetch_and_show(&mut self, uri: &str) -> Result<Option<SessionEnd>> {
        let Some(gate) = self.session.as_ref().map(|s| s.gate.clone()) else {
            return Ok(None);
        };
        let fetched = {
            let _busy = gate.hold();
            fetch_page(self.env.source.as_ref(), uri).await
        };
        let page = match fetched {
            Ok(page) => page,
            Err(error) => return Err(self.fail(error)),
        };

        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        if session.popup.is_closed() {
            return Ok(Some(self.end_closed_by_user()));
        }
        sync_page_index(&mut session.query, &page);
        session.page = page;
        session.view += 1;
        session.popup.replace_pagination(session.fragments.pagination(
            &session.page,
            session.query.page_index(),
            self.descriptor.page_size,
            session.view,
        ));
        session.popup.replace_table(session.fragments.table(
            &self.descriptor,
            &session.page.rows,
            &session.selection,
        ));
        debug!(page_index = session.query.page_index(), rows = session.page.rows.len(), "page shown");
        self.state = SessionState::Ready;
        Ok(None)
    }

    fn toggle(&mut self, key: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let selected = session.selection.toggle(key);
        debug!(key, selected, value = %session.selection.current_value(), "row toggled");
        session.popup.replace_table(session.fragments.table(
            &self.descriptor,
            &session.page.rows,
            &session.selection,
        ));
        session
            .popup
            .replace_accumulator(session.fragments.accumulator(&session.selection));
    }

    /// Commit the live selection. The value carried by the event is the
    /// bar's render-time preview and may lag behind queued toggles.
    fn finalize(&mut self, shown: String) -> SessionEnd {
        self.state = SessionState::Applying;
        let (value, written) = match self.session.take() {
            Some(session) => {
                let value = session.selection.current_value();
                if value != shown {
                    debug!(%shown, %value, "accumulator bar was behind the selection");
                }
                let written = session.handle.commit(&value);
                session.popup.close();
                info!(session = %session.id, %value, written, "selection finalized");
                (value, written)
            }
            None => (shown, false),
        };
        self.state = SessionState::Idle;
        SessionEnd::Finalized { value, written }
    }

    fn end_closed_by_user(&mut self) -> SessionEnd {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, "popup closed directly, selection discarded");
        }
        self.state = SessionState::Idle;
        SessionEnd::ClosedByUser
    }

    /// Abort the session: close the popup, drop the bus, restore the link.
    fn fail(&mut self, error: ClassHelperError) -> ClassHelperError {
        self.state = SessionState::Failed;
        if let Some(session) = self.session.take() {
            if !session.popup.is_closed() {
                session.popup.close();
            }
        }
        if let Some(native) = self.native.take() {
            self.link.restore_click(native);
        }
        error!(%error, "class helper session failed");
        if !error.is_activation_error() {
            self.env.opener.report_failure(error.user_message());
        }
        self.last_error = Some(error.clone());
        error
    }

    async fn translations(&self) -> Translations {
        match build_translation_url(&self.env.location) {
            Ok(url) => {
                self.env
                    .catalogs
                    .translations
                    .load(self.env.source.as_ref(), url.as_str())
                    .await
            }
            Err(error) => {
                warn!(%error, "cannot build translation url");
                self.env.catalogs.translations.current()
            }
        }
    }

    async fn search_fragment(&self, fragments: &FragmentBuilder) -> SearchFragment {
        let fields = SearchField::parse_list(self.search_with.as_deref().unwrap_or(""));
        let mut options = Vec::with_capacity(fields.len());
        for field in &fields {
            if field.dropdown.is_none() {
                options.push(Vec::new());
                continue;
            }
            let loaded = match build_dropdown_url(&self.env.location, &self.env.config, field) {
                Ok(url) => {
                    self.env
                        .catalogs
                        .dropdowns
                        .options(self.env.source.as_ref(), url.as_str())
                        .await
                }
                Err(error) => {
                    warn!(%error, field = %field.name, "cannot build dropdown url");
                    Vec::new()
                }
            };
            options.push(loaded);
        }
        fragments.search(&fields, &options)
    }
}

impl Drop for ClassHelper {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.popup.close();
        }
        if let Some(native) = self.native.take() {
            self.link.restore_click(native);
        }
    }
}

/// The `self` link is the only source of the page index once a page has
/// been fetched.
fn sync_page_index(query: &mut QueryState, page: &PageResult) {
    match page.self_page_uri.as_deref() {
        Some(uri) => {
            if query.sync_from_self_link(uri).is_none() {
                warn!(uri, "self link without @page_index, keeping page index");
            }
        }
        None => debug!("response without self link, keeping page index"),
    }
}
