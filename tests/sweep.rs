//! End-to-end sweeps against scripted Kleinanzeigen pages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use listing_crawler::{
    error::Result,
    models::{Config, ErrorKind, Filter, Listing},
    pipeline::{CrawlScheduler, build_scheduler},
    services::{ChannelNotifier, HttpTransport, Notification, Notifier, RawResponse},
    storage::{MemoryStorage, ProcessedStore},
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const SEARCH: &str = "https://www.kleinanzeigen.de/s-fahrraeder/k0";
const PAGE_2: &str = "https://www.kleinanzeigen.de/s-fahrraeder/seite:2/k0";

fn ad(id: u32) -> String {
    format!("https://www.kleinanzeigen.de/s-anzeige/item/{}", id)
}

/// Serves fixed bodies by URL, 404 for everything else.
#[derive(Default)]
struct ScriptedSite {
    pages: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSite {
    fn serve(&self, url: &str, body: String) {
        self.pages.lock().unwrap().insert(url.to_string(), body);
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedSite {
    async fn get(&self, url: &str, _user_agent: &str) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = self.pages.lock().unwrap().get(url).cloned();
        Ok(match body {
            Some(body) => RawResponse::ok(body),
            None => RawResponse {
                status: 404,
                retry_after: None,
                body: "not found".into(),
            },
        })
    }
}

fn search_page(ids: &[u32], pages: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li><article class="aditem"><div class="aditem-main">
                     <div class="aditem-main--top--right">Heute</div>
                     <h2><a href="/s-anzeige/item/{id}">Item {id}</a></h2>
                     <p class="aditem-main--middle--price-shipping--price">{id}0 €</p>
                   </div></article></li>"#
            )
        })
        .collect();
    let pagination: String = pages
        .iter()
        .map(|p| format!(r#"<a class="pagination-page" href="{p}">n</a>"#))
        .collect();
    format!(
        r#"<html><body><ul id="srchrslt-adtable">{items}</ul><div>{pagination}</div></body></html>"#
    )
}

fn detail_page(title: &str, description: &str) -> String {
    format!(
        r#"<html><body><h1 id="viewad-title">{title}</h1>
           <p id="viewad-description-text">{description}</p></body></html>"#
    )
}

struct Harness {
    site: Arc<ScriptedSite>,
    storage: Arc<MemoryStorage>,
    scheduler: CrawlScheduler,
    rx: UnboundedReceiver<Notification>,
    _diagnostics: TempDir,
}

impl Harness {
    async fn new(filters: Vec<Filter>) -> Self {
        let diagnostics = TempDir::new().unwrap();
        let mut config = Config::default();
        config.limiter.pre_jitter_ms = 0;
        config.limiter.post_wait_jitter_secs = [0, 0];
        config.paths.diagnostics_dir = diagnostics.path().to_path_buf();

        let site = Arc::new(ScriptedSite::default());
        let storage = Arc::new(MemoryStorage::with_filters(filters));
        let (notifier, rx) = ChannelNotifier::channel();
        let scheduler = build_scheduler(
            &config,
            Arc::clone(&storage),
            site.clone(),
            Arc::new(notifier),
        )
        .await
        .unwrap();

        Self {
            site,
            storage,
            scheduler,
            rx,
            _diagnostics: diagnostics,
        }
    }

    fn matches(&mut self) -> Vec<String> {
        let mut links = Vec::new();
        while let Ok(notification) = self.rx.try_recv() {
            if let Notification::Match { listing, .. } = notification {
                links.push(listing.link);
            }
        }
        links
    }

    fn admin_messages(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(notification) = self.rx.try_recv() {
            if let Notification::Admin(message) = notification {
                messages.push(message);
            }
        }
        messages
    }
}

fn returning_filter(include: &[&str]) -> Filter {
    let mut filter = Filter::new("Bikes", SEARCH).with_include(include.iter().copied());
    filter.first_run_completed = true;
    filter
}

#[tokio::test(start_paused = true)]
async fn test_match_notifies_once_and_is_recorded() {
    let filter = returning_filter(&["foo"]);
    let id = filter.id;
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1], &[]));
    h.site.serve(&ad(1), detail_page("foo item", "in good shape"));

    let summary = h.scheduler.sweep().await.unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(h.matches(), vec![ad(1)]);
    assert!(h.scheduler.processed().contains(id, &ad(1)));
}

#[tokio::test(start_paused = true)]
async fn test_known_listing_is_not_reevaluated() {
    let filter = returning_filter(&["foo"]);
    let id = filter.id;
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1], &[]));
    h.site.serve(&ad(1), detail_page("foo item", "in good shape"));

    h.scheduler.sweep().await.unwrap();
    let first_seen = h.scheduler.processed().entries(id)[0].last_found;
    assert_eq!(h.matches().len(), 1);

    h.scheduler.sweep().await.unwrap();

    assert!(h.matches().is_empty());
    assert_eq!(h.site.calls_to(&ad(1)), 1);
    assert_eq!(h.site.calls_to(SEARCH), 2);
    assert!(h.scheduler.processed().entries(id)[0].last_found >= first_seen);
}

#[tokio::test(start_paused = true)]
async fn test_first_sweep_is_silent_without_initial_pull() {
    let filter = Filter::new("Bikes", SEARCH).with_include(["foo"]);
    let id = filter.id;
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1], &[]));
    h.site.serve(&ad(1), detail_page("foo item", "x"));

    h.scheduler.sweep().await.unwrap();

    assert!(h.matches().is_empty());
    assert!(h.scheduler.processed().contains(id, &ad(1)));
    assert!(h.storage.filter(id).unwrap().first_run_completed);

    h.site.serve(SEARCH, search_page(&[2, 1], &[]));
    h.site.serve(&ad(2), detail_page("another foo", "x"));
    h.scheduler.sweep().await.unwrap();

    assert_eq!(h.matches(), vec![ad(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_initial_pull_notifies_on_first_sweep() {
    let filter = Filter::new("Bikes", SEARCH)
        .with_include(["foo"])
        .with_initial_pull(true);
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1], &[]));
    h.site.serve(&ad(1), detail_page("foo item", "x"));

    h.scheduler.sweep().await.unwrap();

    assert_eq!(h.matches(), vec![ad(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_pages_are_processed_oldest_first() {
    let filter = returning_filter(&[]);
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1, 2], &["/s-fahrraeder/seite:2/k0"]));
    h.site.serve(PAGE_2, search_page(&[3, 4], &[]));
    for id in 1..=4 {
        h.site.serve(&ad(id), detail_page("bike", "x"));
    }

    h.scheduler.sweep().await.unwrap();

    assert_eq!(h.matches(), vec![ad(4), ad(3), ad(2), ad(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_non_matching_listing_is_recorded_without_notification() {
    let filter = returning_filter(&["foo"]).with_exclude(["defekt"]);
    let id = filter.id;
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1, 2], &[]));
    h.site.serve(&ad(1), detail_page("foo item", "leider defekt"));
    h.site.serve(&ad(2), detail_page("bar item", "top"));

    h.scheduler.sweep().await.unwrap();

    assert!(h.matches().is_empty());
    let known = h.scheduler.processed().known_links(id);
    assert!(known.contains(&ad(1)) && known.contains(&ad(2)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_detail_fetch_is_retried_next_sweep() {
    let filter = returning_filter(&["foo"]);
    let id = filter.id;
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1], &[]));

    h.scheduler.sweep().await.unwrap();
    assert!(!h.scheduler.processed().contains(id, &ad(1)));

    h.site.serve(&ad(1), detail_page("foo item", "x"));
    h.scheduler.sweep().await.unwrap();

    assert_eq!(h.matches(), vec![ad(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_site_is_skipped() {
    let stray = Filter::new("Stray", "https://www.example.org/search?q=bike");
    let filter = returning_filter(&["foo"]);
    let mut h = Harness::new(vec![stray, filter]).await;
    h.site.serve(SEARCH, search_page(&[1], &[]));
    h.site.serve(&ad(1), detail_page("foo item", "x"));

    let summary = h.scheduler.sweep().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(h.matches(), vec![ad(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_first_page_aborts_filter() {
    let filter = Filter::new("Bikes", SEARCH);
    let id = filter.id;
    let mut h = Harness::new(vec![filter]).await;

    let summary = h.scheduler.sweep().await.unwrap();

    assert_eq!(summary.aborted, 1);
    assert_eq!(h.site.calls_to(SEARCH), 2);
    assert!(!h.storage.filter(id).unwrap().first_run_completed);
    // Two failed attempts cross the alert threshold
    let alerts = h.admin_messages();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains(&format!("{}: 2", ErrorKind::HttpRequest)));
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_detail_pages_raise_alert() {
    let filter = returning_filter(&["foo"]);
    let mut h = Harness::new(vec![filter]).await;
    h.site.serve(SEARCH, search_page(&[1, 2], &[]));
    h.site.serve(&ad(1), "<html><body>redesigned</body></html>".into());
    h.site.serve(&ad(2), "<html><body>redesigned</body></html>".into());

    h.scheduler.sweep().await.unwrap();

    let alerts = h.admin_messages();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("parse-title: 2"));
    assert!(alerts[0].contains("parse-link: 0"));
}

/// Panics when asked to notify subscribers of the filter titled "Boom".
struct BoomNotifier;

impl Notifier for BoomNotifier {
    fn notify_subscribers(&self, filter: &Filter, _listing: &Listing) {
        if filter.title == "Boom" {
            panic!("notifier exploded");
        }
    }

    fn notify_admins(&self, _message: &str) {}
}

#[tokio::test(start_paused = true)]
async fn test_panicking_filter_does_not_lose_site_state() {
    let mut boom = returning_filter(&["foo"]);
    boom.title = "Boom".into();
    let calm = Filter::new("Calm", SEARCH);
    let calm_id = calm.id;

    let diagnostics = TempDir::new().unwrap();
    let mut config = Config::default();
    config.limiter.pre_jitter_ms = 0;
    config.limiter.post_wait_jitter_secs = [0, 0];
    config.paths.diagnostics_dir = diagnostics.path().to_path_buf();

    let site = Arc::new(ScriptedSite::default());
    site.serve(SEARCH, search_page(&[1], &[]));
    site.serve(&ad(1), detail_page("foo item", "in good shape"));
    let storage = Arc::new(MemoryStorage::with_filters(vec![boom, calm]));
    let scheduler = build_scheduler(
        &config,
        Arc::clone(&storage),
        site.clone(),
        Arc::new(BoomNotifier),
    )
    .await
    .unwrap();

    let summary = scheduler.sweep().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    assert!(storage.filter(calm_id).unwrap().first_run_completed);
    let saved = storage.load().await.unwrap();
    assert!(saved[&calm_id].iter().any(|e| e.uri == ad(1)));
}
