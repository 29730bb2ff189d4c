//! End-to-end popup sessions against the in-memory host.

use std::sync::Arc;

use classhelper::memory::{LinkClick, MemoryLink, MemoryOpener, MemoryPopup, StaticSource};
use classhelper::render::SearchInput;
use classhelper::{
    Catalogs, ClassHelper, ClassHelperElement, ClassHelperError, DropdownOption, HostEnvironment,
    PageLocation, PopupWindow, SessionEnd, SessionState, Translations,
};
use serde_json::{json, Value};

const PAGE_URL: &str = "http://tracker.test/demo/issue12";
const ISSUE_HELP: &str =
    "issue?@startwith=0&@pagesize=2&properties=id,title&property=superseder&form=issue_edit";
const PAGE_2: &str =
    "http://tracker.test/demo/rest/data/issue?@page_index=2&@page_size=2&@fields=id,title";

fn issue(id: &str, title: &str) -> Value {
    json!({"id": id, "title": title, "link": format!("http://tracker.test/demo/rest/data/issue/{id}")})
}

fn page_one() -> Value {
    json!({"data": {
        "collection": [issue("1", "crash on start"), issue("2", "typo")],
        "@total_size": 4,
        "@links": {
            "self": [{"uri": "http://tracker.test/demo/rest/data/issue?@page_index=1&@page_size=2&@fields=id,title", "rel": "self"}],
            "next": [{"uri": PAGE_2, "rel": "next"}]
        }
    }})
}

fn page_two() -> Value {
    json!({"data": {
        "collection": [issue("3", "slow search"), issue("7", "broken link")],
        "@total_size": 4,
        "@links": {
            "self": [{"uri": PAGE_2, "rel": "self"}],
            "prev": [{"uri": "http://tracker.test/demo/rest/data/issue?@page_index=1&@page_size=2&@fields=id,title", "rel": "prev"}]
        }
    }})
}

fn issue_source() -> StaticSource {
    StaticSource::new()
        .route("@page_index=2", page_two())
        .route("rest/data/issue", page_one())
}

struct Fixture {
    link: Arc<MemoryLink>,
    opener: Arc<MemoryOpener>,
    source: Arc<StaticSource>,
    helper: ClassHelper,
}

impl Fixture {
    fn new(helpurl: &str, search_with: Option<&str>, source: StaticSource) -> Self {
        let link = Arc::new(MemoryLink::new([
            ("helpurl", helpurl),
            ("width", "600"),
            ("height", "500"),
        ]));
        let opener = Arc::new(MemoryOpener::new());
        let source = Arc::new(source);
        let mut element = ClassHelperElement::new(link.clone());
        if let Some(fields) = search_with {
            element = element.search_with(fields);
        }
        let env = HostEnvironment::new(
            PageLocation::parse(PAGE_URL).unwrap(),
            opener.clone(),
            source.clone(),
        )
        .with_catalogs(Arc::new(Catalogs::with_translations(Translations::english())));
        let helper = ClassHelper::connect(&element, env).expect("helper connects");
        Self {
            link,
            opener,
            source,
            helper,
        }
    }

    fn issues() -> Self {
        Self::new(ISSUE_HELP, None, issue_source())
    }

    fn popup(&self) -> Arc<MemoryPopup> {
        self.opener.last_popup().expect("popup opened")
    }
}

#[tokio::test]
async fn test_first_page_request() {
    let mut fx = Fixture::issues();
    fx.helper.click().await.unwrap();

    let requests = fx.source.requests();
    assert_eq!(requests.len(), 1);
    let url = url::Url::parse(&requests[0]).unwrap();
    assert_eq!(url.path(), "/demo/rest/data/issue");
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![
            ("@page_index".to_string(), "1".to_string()),
            ("@page_size".to_string(), "2".to_string()),
            ("@fields".to_string(), "id,title".to_string()),
        ]
    );

    let popup = fx.popup();
    assert_eq!(popup.features().to_string(), "popup=yes,width=600,height=500");
    let view = popup.view().unwrap();
    assert_eq!(view.stylesheet, "http://tracker.test/demo/@@file/classhelper.css");
    assert_eq!(view.pagination.info, "1..2");
    assert!(view.pagination.prev.is_none());
    assert_eq!(view.table.headers, vec!["id", "title"]);
    assert_eq!(view.table.rows[0].cells, vec!["1", "crash on start"]);
    assert_eq!(fx.helper.state(), SessionState::Ready);
    assert!(fx.helper.session_id().is_some());
}

#[tokio::test]
async fn test_next_page_follows_server_link() {
    let mut fx = Fixture::issues();
    fx.helper.click().await.unwrap();
    let popup = fx.popup();

    let before = popup.view().unwrap();
    assert!(before.pagination.next.as_ref().unwrap().activate());
    assert_eq!(fx.helper.process_events().await.unwrap(), None);

    let requests = fx.source.requests();
    assert_eq!(requests.last().map(String::as_str), Some(PAGE_2));

    let query = fx.helper.query_state().unwrap();
    assert_eq!(query.page_index(), 2);
    assert!(query.search_filters().is_empty());

    let after = popup.view().unwrap();
    assert_eq!(after.pagination.info, "3..4");
    assert!(after.pagination.next.is_none());
    assert!(after.pagination.prev.is_some());
    assert_eq!(after.table.rows[1].key, "7");
    assert_eq!(after.accumulator.value, before.accumulator.value);
    assert_eq!(fx.helper.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_double_click_on_next_fetches_once() {
    let mut fx = Fixture::issues();
    fx.helper.click().await.unwrap();
    let next = fx.popup().view().unwrap().pagination.next.unwrap();

    assert!(next.activate());
    assert!(next.activate());
    fx.helper.process_events().await.unwrap();

    let page_two_fetches = fx
        .source
        .requests()
        .iter()
        .filter(|url| url.as_str() == PAGE_2)
        .count();
    assert_eq!(page_two_fetches, 1);
    assert_eq!(fx.helper.query_state().unwrap().page_index(), 2);
}

#[tokio::test]
async fn test_apply_writes_joined_value() {
    let mut fx = Fixture::issues();
    fx.helper.click().await.unwrap();
    let popup = fx.popup();

    // pick 3 and 7 on the second page
    popup.view().unwrap().pagination.next.unwrap().activate();
    fx.helper.process_events().await.unwrap();
    let table = popup.view().unwrap().table;
    table.row("3").unwrap().toggle();
    table.row("7").unwrap().toggle();
    fx.helper.process_events().await.unwrap();

    let accumulator = popup.view().unwrap().accumulator;
    assert_eq!(accumulator.value, "3,7");
    accumulator.apply();

    let end = fx.helper.process_events().await.unwrap();
    assert_eq!(
        end,
        Some(SessionEnd::Finalized {
            value: "3,7".into(),
            written: true
        })
    );
    assert_eq!(
        fx.opener.field(Some("issue_edit"), "superseder").as_deref(),
        Some("3,7")
    );
    assert!(popup.is_closed());
    assert_eq!(fx.helper.state(), SessionState::Idle);
    assert!(fx.helper.session_id().is_none());
}

#[tokio::test]
async fn test_cancel_also_writes() {
    let mut fx = Fixture::issues();
    fx.opener.set_field(Some("issue_edit"), "superseder", "3,7");
    fx.helper.click().await.unwrap();
    let popup = fx.popup();

    let view = popup.view().unwrap();
    assert_eq!(view.accumulator.value, "3,7");
    view.table.row("1").unwrap().toggle();
    fx.helper.process_events().await.unwrap();
    popup.view().unwrap().accumulator.cancel();

    let end = fx.helper.process_events().await.unwrap();
    assert!(matches!(end, Some(SessionEnd::Finalized { .. })));
    assert_eq!(
        fx.opener.field(Some("issue_edit"), "superseder").as_deref(),
        Some("3,7,1")
    );
}

#[tokio::test]
async fn test_without_target_nothing_is_written() {
    let mut fx = Fixture::new(
        "issue?@startwith=0&@pagesize=2&properties=id,title",
        None,
        issue_source(),
    );
    fx.helper.click().await.unwrap();
    let popup = fx.popup();
    popup.view().unwrap().table.row("2").unwrap().toggle();
    fx.helper.process_events().await.unwrap();
    popup.view().unwrap().accumulator.apply();

    let end = fx.helper.process_events().await.unwrap();
    assert_eq!(
        end,
        Some(SessionEnd::Finalized {
            value: "2".into(),
            written: false
        })
    );
}

#[tokio::test]
async fn test_malformed_descriptor_keeps_native_click() {
    let link = Arc::new(MemoryLink::new([
        ("helpurl", ISSUE_HELP),
        ("width", "600"),
    ]));
    let opener = Arc::new(MemoryOpener::new());
    let env = HostEnvironment::new(
        PageLocation::parse(PAGE_URL).unwrap(),
        opener.clone(),
        Arc::new(issue_source()),
    );

    assert!(ClassHelper::connect(&ClassHelperElement::new(link.clone()), env).is_none());
    assert_eq!(link.click(), LinkClick::Native);
    assert_eq!(link.native_clicks(), 1);
    assert_eq!(opener.popups_opened(), 0);
    assert!(opener.failures().is_empty());
}

#[tokio::test]
async fn test_network_failure_aborts_session() {
    let source = StaticSource::new()
        .fail(
            "@page_index=2",
            ClassHelperError::Network {
                url: PAGE_2.into(),
                message: "HTTP 500 Internal Server Error".into(),
            },
        )
        .route("rest/data/issue", page_one());
    let mut fx = Fixture::new(ISSUE_HELP, None, source);
    fx.helper.click().await.unwrap();
    let popup = fx.popup();
    let view = popup.view().unwrap();

    view.pagination.next.as_ref().unwrap().activate();
    let error = fx.helper.process_events().await.unwrap_err();
    assert!(matches!(error, ClassHelperError::Network { .. }));

    assert_eq!(fx.helper.state(), SessionState::Failed);
    assert!(popup.is_closed());
    assert_eq!(fx.opener.failures(), vec!["error fetching data from the tracker"]);
    assert_eq!(fx.link.click(), LinkClick::Native);

    // controls of the dead session go nowhere
    assert!(!view.table.rows[0].toggle());
    assert!(fx.opener.field(Some("issue_edit"), "superseder").is_none());

    // next activation starts clean
    fx.helper.click().await.unwrap();
    assert_eq!(fx.helper.state(), SessionState::Ready);
    assert_eq!(fx.opener.popups_opened(), 2);
    assert_eq!(fx.helper.query_state().unwrap().page_index(), 1);
    assert!(fx.link.is_intercepted());
}

#[tokio::test]
async fn test_bad_json_shape_is_response_format_error() {
    let source = StaticSource::new().route("rest/data/issue", json!({"items": []}));
    let mut fx = Fixture::new(ISSUE_HELP, None, source);

    let error = fx.helper.click().await.unwrap_err();
    assert!(matches!(error, ClassHelperError::ResponseFormat { .. }));
    assert!(fx.popup().is_closed());
    assert_eq!(fx.opener.failures(), vec!["error reading data from the tracker"]);
}

#[tokio::test]
async fn test_closed_popup_discards_selection() {
    let mut fx = Fixture::issues();
    fx.opener.set_field(Some("issue_edit"), "superseder", "9");
    fx.helper.click().await.unwrap();
    let popup = fx.popup();

    popup.view().unwrap().table.row("1").unwrap().toggle();
    popup.close_by_user();

    let end = fx.helper.process_events().await.unwrap();
    assert_eq!(end, Some(SessionEnd::ClosedByUser));
    assert_eq!(fx.helper.state(), SessionState::Idle);
    assert_eq!(
        fx.opener.field(Some("issue_edit"), "superseder").as_deref(),
        Some("9")
    );

    fx.helper.click().await.unwrap();
    assert_eq!(fx.opener.popups_opened(), 2);
    assert_eq!(fx.helper.selection().unwrap().current_value(), "9");
}

#[tokio::test]
async fn test_empty_search_matches_collection_request() {
    let mut fx = Fixture::new(ISSUE_HELP, Some("title"), issue_source());
    fx.helper.click().await.unwrap();

    let search = fx.popup().view().unwrap().search.unwrap();
    assert_eq!(search.search_label, "Search");
    assert!(search.submit_empty());
    fx.helper.process_events().await.unwrap();

    let requests = fx.source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_search_resets_to_first_page() {
    let source = StaticSource::new()
        .route("title=crash", page_one())
        .route("@page_index=2", page_two())
        .route("rest/data/issue", page_one());
    let mut fx = Fixture::new(ISSUE_HELP, Some("title"), source);
    fx.helper.click().await.unwrap();
    let popup = fx.popup();

    popup.view().unwrap().pagination.next.unwrap().activate();
    fx.helper.process_events().await.unwrap();
    assert_eq!(fx.helper.query_state().unwrap().page_index(), 2);

    let search = popup.view().unwrap().search.unwrap();
    assert!(search.submit([("title", "crash")]));
    fx.helper.process_events().await.unwrap();

    let last = fx.source.requests().pop().unwrap();
    let url = url::Url::parse(&last).unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("@page_index".into(), "1".into())));
    assert!(pairs.contains(&("title".into(), "crash".into())));

    let query = fx.helper.query_state().unwrap();
    assert_eq!(query.page_index(), 1);
    assert_eq!(query.search_filters().get("title").map(String::as_str), Some("crash"));
}

#[tokio::test]
async fn test_search_with_dropdowns() {
    let source = issue_source()
        .route(
            "rest/data/status",
            json!({"data": {"collection": [
                {"id": "1", "link": "http://tracker.test/demo/rest/data/status/1", "name": "unread"},
                {"id": "2", "link": "http://tracker.test/demo/rest/data/status/2", "name": "open"}
            ]}}),
        )
        .route(
            "rest/roles",
            json!({"data": {"collection": [{"id": "admin", "name": "Admin"}]}}),
        );
    let mut fx = Fixture::new(ISSUE_HELP, Some("title,status[]-order,roles[],keyword[]"), source);
    fx.helper.click().await.unwrap();

    let search = fx.popup().view().unwrap().search.unwrap();
    assert!(matches!(&search.inputs[0], SearchInput::Text { name } if name == "title"));
    match &search.inputs[1] {
        SearchInput::Dropdown { name, options } => {
            assert_eq!(name, "status");
            assert_eq!(
                options[1],
                DropdownOption {
                    id: "2".into(),
                    label: "open".into()
                }
            );
        }
        other => panic!("expected dropdown, got {other:?}"),
    }
    assert!(matches!(&search.inputs[2], SearchInput::Dropdown { name, .. } if name == "roles"));
    // no route for keyword: degraded to text
    assert!(matches!(&search.inputs[3], SearchInput::Text { name } if name == "keyword"));

    let status_request = fx
        .source
        .requests()
        .into_iter()
        .find(|url| url.contains("rest/data/status"))
        .unwrap();
    let pairs: Vec<(String, String)> = url::Url::parse(&status_request)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("@verbose".to_string(), "2".to_string()),
            ("@sort".to_string(), "-order".to_string()),
        ]
    );
    assert_eq!(fx.helper.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_changing_search_with_replaces_search_form() {
    let mut fx = Fixture::new(ISSUE_HELP, Some("title"), issue_source());
    fx.helper.click().await.unwrap();
    let popup = fx.popup();
    let table_before = popup.view().unwrap().table.rows.len();

    fx.helper.set_search_with(Some("title,keyword".into())).await;

    let view = popup.view().unwrap();
    let names: Vec<&str> = view.search.as_ref().unwrap().inputs.iter().map(SearchInput::name).collect();
    assert_eq!(names, vec!["title", "keyword"]);
    assert_eq!(view.table.rows.len(), table_before);
}

#[tokio::test]
async fn test_first_search_with_waits_for_next_open() {
    let mut fx = Fixture::issues();
    fx.helper.click().await.unwrap();
    let popup = fx.popup();

    fx.helper.set_search_with(Some("title".into())).await;
    assert!(popup.view().unwrap().search.is_none());

    popup.close_by_user();
    fx.helper.click().await.unwrap();
    let search = fx.popup().view().unwrap().search.unwrap();
    assert_eq!(search.inputs.len(), 1);
}

#[tokio::test]
async fn test_translations_fetched_once_and_applied() {
    let catalogs = Arc::new(Catalogs::new());
    let source = Arc::new(
        issue_source().route(
            "@template=json",
            json!({"Apply": "Übernehmen", "Next": "Weiter"}),
        ),
    );
    let opener = Arc::new(MemoryOpener::new());
    let connect = |link: Arc<MemoryLink>| {
        let env = HostEnvironment::new(
            PageLocation::parse(PAGE_URL).unwrap(),
            opener.clone(),
            source.clone(),
        )
        .with_catalogs(catalogs.clone());
        ClassHelper::connect(&ClassHelperElement::new(link), env).unwrap()
    };
    let attrs = [("helpurl", ISSUE_HELP), ("width", "600"), ("height", "500")];
    let mut first = connect(Arc::new(MemoryLink::new(attrs)));
    let mut second = connect(Arc::new(MemoryLink::new(attrs)));

    first.prefetch_translations().await;
    first.click().await.unwrap();
    second.click().await.unwrap();

    let view = opener.last_popup().unwrap().view().unwrap();
    assert_eq!(view.accumulator.apply_label, "Übernehmen");
    assert_eq!(view.accumulator.cancel_label, "Cancel");
    assert_eq!(view.pagination.next.unwrap().label, "Weiter");

    let translation_requests = source
        .requests()
        .iter()
        .filter(|url| url.contains("template"))
        .count();
    assert_eq!(translation_requests, 1);
}
