// Per-page controller: owns page state and answers every request.
use super::protocol::{PageEvent, Request, Response};
use crate::analyzer::candidates::{MAX_PRICE_TEXT_LEN, ScoreWeights};
use crate::analyzer::extract::{Extraction, ExtractionSource, extract_price};
use crate::analyzer::signal::build_summary;
use crate::analyzer::snapshot::build_snapshot;
use crate::co2::Co2Estimator;
use crate::model::{FetchError, HistoryStats, MessageError, PriceCandidate, PriceSummary};
use crate::normalizer::resolve_product_id;
use crate::notifier::NotificationScheduler;
use crate::page::{NodeId, PageFetcher, PageTree, PageView};
use crate::parser::parse_price;
use crate::storage::history::save_snapshot;
use crate::storage::{SqliteStorage, append_price, summarize};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How far up from the clicked element a manual pick may look for a price.
const MAX_PICK_ANCESTORS: usize = 2;

pub struct PageController {
    fetcher: Arc<dyn PageFetcher>,
    estimator: Arc<dyn Co2Estimator>,
    storage: Arc<Mutex<SqliteStorage>>,
    scheduler: NotificationScheduler,
    weights: ScoreWeights,

    url: Option<String>,
    tree: Option<PageTree>,
    last_source: Option<ExtractionSource>,
    clicks: u32,
    widget_injected: bool,
    widget_open: bool,
    select_mode: bool,
}

impl PageController {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        estimator: Arc<dyn Co2Estimator>,
        storage: Arc<Mutex<SqliteStorage>>,
        scheduler: NotificationScheduler,
    ) -> Self {
        Self {
            fetcher,
            estimator,
            storage,
            scheduler,
            weights: ScoreWeights::default(),
            url: None,
            tree: None,
            last_source: None,
            clicks: 0,
            widget_injected: false,
            widget_open: false,
            select_mode: false,
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Debug string of where the last tracked price came from.
    pub fn last_source(&self) -> Option<&'static str> {
        self.last_source.map(|s| s.as_str())
    }

    pub fn is_ready(&self) -> bool {
        self.url.is_some() && self.tree.is_some()
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    pub fn is_selecting(&self) -> bool {
        self.select_mode
    }

    pub fn is_widget_open(&self) -> bool {
        self.widget_open
    }

    /// Fetches `url` and makes it the active page. On failure the page is not ready.
    pub async fn load_page(&mut self, url: &str) -> Result<(), FetchError> {
        info!("🌐 Loading page {}", url);
        match self.fetcher.fetch(url).await {
            Ok(html) => {
                self.set_page(url, PageTree::from_html(&html)).await;
                Ok(())
            }
            Err(e) => {
                warn!("❌ Could not load {}: {}", url, e);
                self.url = None;
                self.tree = None;
                self.reset_page_state();
                Err(e)
            }
        }
    }

    /// Installs an already built page and refreshes the product snapshot.
    pub async fn set_page(&mut self, url: &str, tree: PageTree) {
        self.url = Some(url.to_string());
        self.reset_page_state();

        match build_snapshot(&tree, url, Utc::now()) {
            Ok(snapshot) => {
                info!(
                    "🧾 Snapshot: '{}' {:?}, {} ({:.2} kg)",
                    snapshot.title, snapshot.category, snapshot.material, snapshot.weight_kg
                );
                if let Err(e) = save_snapshot(&*self.storage.lock().await, &snapshot) {
                    warn!("Snapshot save failed: {:?}", e);
                }
            }
            Err(e) => warn!("No snapshot for {}: {}", url, e),
        }
        self.tree = Some(tree);
    }

    fn reset_page_state(&mut self) {
        self.last_source = None;
        self.clicks = 0;
        self.widget_injected = false;
        self.widget_open = false;
        self.select_mode = false;
    }

    fn page(&self) -> Result<(&str, &PageTree), MessageError> {
        match (&self.url, &self.tree) {
            (Some(url), Some(tree)) => Ok((url, tree)),
            _ => Err(MessageError::NotReady),
        }
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        debug!("Handling request {:?}", request);
        let result = match request {
            Request::Ping => Ok(Response::ready()),
            Request::TrackPriceAuto => self.track_auto().await.map(Response::tracked),
            Request::SelectPriceMode => self.enter_select_mode(),
            Request::OpenWidget => self.open_widget(),
            Request::Co2EstimateRequest { material, weight_kg } => self
                .estimator
                .estimate(&material, weight_kg)
                .await
                .map(Response::co2)
                .map_err(MessageError::from),
            Request::ScheduleNotification { delay_seconds, title, message } => self
                .scheduler
                .schedule(delay_seconds, &title, &message, Utc::now())
                .await
                .map(|p| Response::scheduled(p.scheduled_for))
                .map_err(MessageError::from),
        };
        if let Err(e) = &result {
            warn!("Request failed: {}", e);
        }
        Response::from(result)
    }

    /// Host events. Only a completed manual pick yields a response.
    pub async fn handle_event(&mut self, event: PageEvent) -> Option<Response> {
        match event {
            PageEvent::Navigate { url } => {
                if self.is_ready() && self.url.as_deref() == Some(url.as_str()) {
                    debug!("Already on {}", url);
                } else if let Err(e) = self.load_page(&url).await {
                    debug!("Navigation to {} left the page not ready: {}", url, e);
                }
                None
            }
            PageEvent::Click { x, y } => {
                self.clicks += 1;
                if !self.select_mode {
                    return None;
                }
                self.select_mode = false;
                Some(Response::from(self.track_pick(x, y).await.map(Response::tracked)))
            }
            PageEvent::KeyDown { key } => {
                if self.select_mode && key == "Escape" {
                    info!("Price selection cancelled");
                    self.select_mode = false;
                }
                None
            }
        }
    }

    async fn track_auto(&mut self) -> Result<PriceSummary, MessageError> {
        let (_, tree) = self.page()?;
        let extraction = extract_price(tree, &self.weights).ok_or(MessageError::NoPrice)?;
        self.record(extraction).await
    }

    async fn track_pick(&mut self, x: f64, y: f64) -> Result<PriceSummary, MessageError> {
        let (_, tree) = self.page()?;
        let node = tree.element_at(x, y).ok_or(MessageError::NoPrice)?;
        let candidate = picked_price(tree, node).ok_or(MessageError::NoPrice)?;
        self.record(Extraction { candidate, source: ExtractionSource::Manual }).await
    }

    /// Appends the live price to history and summarizes against it.
    async fn record(&mut self, extraction: Extraction) -> Result<PriceSummary, MessageError> {
        let url = self.page()?.0.to_string();
        let product_id = resolve_product_id(&url)?;
        let current: PriceCandidate = extraction.candidate;
        self.last_source = Some(extraction.source);

        let stats = {
            let storage = self.storage.lock().await;
            append_price(&*storage, &product_id, current, &url, Utc::now())?;
            summarize(&*storage, &product_id, current.currency)?
        };
        let stats = stats.unwrap_or(HistoryStats {
            lowest: current.value,
            highest: current.value,
            currency: current.currency,
            point_count: 0,
        });

        let summary = build_summary(current, &stats);
        info!(
            "📊 {} {:.2} {} (low {:.2}, high {:.2}, {} points) via {}",
            summary.signal,
            summary.current,
            summary.currency,
            summary.lowest,
            summary.highest,
            summary.point_count,
            extraction.source
        );
        Ok(summary)
    }

    fn enter_select_mode(&mut self) -> Result<Response, MessageError> {
        self.page()?;
        info!("🖱 Click a price on the page (Escape cancels)");
        self.select_mode = true;
        Ok(Response::ack())
    }

    fn open_widget(&mut self) -> Result<Response, MessageError> {
        self.page()?;
        if !self.widget_injected {
            debug!("Injecting widget");
            self.widget_injected = true;
        }
        self.widget_open = true;
        Ok(Response::ack())
    }
}

/// The clicked element's price, else the nearest short ancestor's.
fn picked_price<V: PageView>(view: &V, node: NodeId) -> Option<PriceCandidate> {
    std::iter::once(node)
        .chain(view.ancestors(node).into_iter().take(MAX_PICK_ANCESTORS))
        .map(|n| view.text_content(n))
        .filter(|text| !text.is_empty() && text.chars().count() <= MAX_PRICE_TEXT_LEN)
        .find_map(|text| parse_price(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Co2Error, Co2Estimate, Currency, Signal};
    use crate::notifier::LogNotifier;
    use crate::page::ElementSpec;
    use crate::storage::history::load_snapshot;
    use crate::storage::load_history;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.pages.get(url).cloned().ok_or(FetchError::InvalidResponse(404))
        }
    }

    /// Fails the first fetch, then serves the product page.
    struct FlakyFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for FlakyFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(FetchError::InvalidResponse(503)),
                _ => Ok(PRODUCT_HTML.to_string()),
            }
        }
    }

    struct FixedEstimator;

    #[async_trait]
    impl Co2Estimator for FixedEstimator {
        async fn estimate(&self, material: &str, weight_kg: f64) -> Result<Co2Estimate, Co2Error> {
            if material == "kryptonite" {
                return Err(Co2Error::Api { status: 400, message: "Unknown activity".into() });
            }
            Ok(Co2Estimate {
                co2e: weight_kg * 2.0,
                co2e_unit: "kg".into(),
                factor_name: format!("{} factor", material),
                unit_type: "Weight".into(),
            })
        }
    }

    const PRODUCT_URL: &str = "https://www.shop.se/p/ullkofta?utm_source=mail";
    const PRODUCT_HTML: &str = r#"<html><body><main>
        <h1>Ullkofta</h1>
        <div class="price">499 kr</div>
        <p>Delbetala 49 kr/mån</p>
    </main></body></html>"#;

    fn controller() -> (PageController, Arc<Mutex<SqliteStorage>>) {
        let storage = Arc::new(Mutex::new(SqliteStorage::in_memory().unwrap()));
        let fetcher = StaticFetcher {
            pages: HashMap::from([(PRODUCT_URL.to_string(), PRODUCT_HTML.to_string())]),
        };
        let scheduler = NotificationScheduler::new(storage.clone(), Arc::new(LogNotifier));
        let controller = PageController::new(Arc::new(fetcher), Arc::new(FixedEstimator), storage.clone(), scheduler);
        (controller, storage)
    }

    fn pick_page() -> PageTree {
        let mut tree = PageTree::new(ElementSpec::new("body").rect(0.0, 0.0, 800.0, 600.0));
        tree.append(0, ElementSpec::new("h1").text("Lampa").rect(0.0, 0.0, 300.0, 40.0));
        let price = tree.append(0, ElementSpec::new("div").rect(0.0, 100.0, 200.0, 30.0));
        tree.append(price, ElementSpec::new("span").text("1 299").rect(0.0, 100.0, 80.0, 30.0));
        tree.append(price, ElementSpec::new("span").text("kr").rect(90.0, 100.0, 30.0, 30.0));
        tree
    }

    #[tokio::test]
    async fn test_ping() {
        let (mut c, _) = controller();
        assert_eq!(c.handle(Request::Ping).await, Response::ready());
    }

    #[tokio::test]
    async fn test_track_requires_loaded_page() {
        let (mut c, _) = controller();
        let response = c.handle(Request::TrackPriceAuto).await;
        assert_eq!(
            response,
            Response::Error { ok: false, error: "Page not ready. Refresh the page and try again.".into() }
        );
    }

    #[tokio::test]
    async fn test_navigate_then_track() {
        let (mut c, storage) = controller();
        assert!(c.handle_event(PageEvent::Navigate { url: PRODUCT_URL.into() }).await.is_none());
        assert_eq!(c.current_url(), Some(PRODUCT_URL));

        let snapshot = load_snapshot(&*storage.lock().await).unwrap().unwrap();
        assert_eq!(snapshot.product_id.as_str(), "shop.se|https://www.shop.se/p/ullkofta");

        let Response::Tracked { ok, summary } = c.handle(Request::TrackPriceAuto).await else {
            panic!("expected a summary");
        };
        assert!(ok);
        assert_eq!(summary.current, 499.0);
        assert_eq!(summary.currency, Currency::Sek);
        assert_eq!(summary.point_count, 1);
        assert_eq!(summary.signal, Signal::GoodTimeToBuy);
        assert_eq!(summary.percent_vs_lowest, Some(0));
        assert_eq!(c.last_source(), Some("dom"));

        // Same price again right away is deduplicated.
        c.handle(Request::TrackPriceAuto).await;
        let history = load_history(&*storage.lock().await, &snapshot.product_id).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_navigation_leaves_page_not_ready() {
        let (mut c, _) = controller();
        c.handle_event(PageEvent::Navigate { url: "https://shop.se/missing".into() }).await;
        let response = c.handle(Request::SelectPriceMode).await;
        assert!(matches!(response, Response::Error { ok: false, .. }));
        assert!(!c.is_selecting());
    }

    #[tokio::test]
    async fn test_navigation_retries_after_failed_load() {
        let storage = Arc::new(Mutex::new(SqliteStorage::in_memory().unwrap()));
        let fetcher = Arc::new(FlakyFetcher { calls: AtomicUsize::new(0) });
        let scheduler = NotificationScheduler::new(storage.clone(), Arc::new(LogNotifier));
        let mut c = PageController::new(fetcher.clone(), Arc::new(FixedEstimator), storage, scheduler);

        c.handle_event(PageEvent::Navigate { url: PRODUCT_URL.into() }).await;
        assert!(!c.is_ready());
        assert_eq!(c.current_url(), None);

        c.handle_event(PageEvent::Navigate { url: PRODUCT_URL.into() }).await;
        assert!(c.is_ready());
        let response = c.handle(Request::TrackPriceAuto).await;
        assert!(matches!(response, Response::Tracked { ok: true, .. }));

        // Already loaded, so no third fetch
        c.handle_event(PageEvent::Navigate { url: PRODUCT_URL.into() }).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_track_without_price() {
        let (mut c, _) = controller();
        c.set_page("https://shop.se/om-oss", PageTree::from_html("<html><body><h1>Om oss</h1></body></html>"))
            .await;
        assert_eq!(
            c.handle(Request::TrackPriceAuto).await,
            Response::Error { ok: false, error: "No price found on this page.".into() }
        );
    }

    #[tokio::test]
    async fn test_manual_pick_reads_parent_text() {
        let (mut c, storage) = controller();
        c.set_page("https://shop.se/p/lampa", pick_page()).await;

        assert_eq!(c.handle(Request::SelectPriceMode).await, Response::ack());
        assert!(c.is_selecting());

        let response = c.handle_event(PageEvent::Click { x: 95.0, y: 110.0 }).await.unwrap();
        let Response::Tracked { summary, .. } = response else {
            panic!("expected a summary, got {:?}", response);
        };
        assert_eq!(summary.current, 1299.0);
        assert_eq!(summary.currency, Currency::Sek);
        assert!(!c.is_selecting());
        assert_eq!(c.last_source(), Some("manual"));
        assert_eq!(c.clicks(), 1);

        let id = resolve_product_id("https://shop.se/p/lampa").unwrap();
        assert_eq!(load_history(&*storage.lock().await, &id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_escape_cancels_pick() {
        let (mut c, _) = controller();
        c.set_page("https://shop.se/p/lampa", pick_page()).await;
        c.handle(Request::SelectPriceMode).await;
        c.handle_event(PageEvent::KeyDown { key: "Escape".into() }).await;
        assert!(!c.is_selecting());
        assert!(c.handle_event(PageEvent::Click { x: 10.0, y: 110.0 }).await.is_none());
        assert_eq!(c.clicks(), 1);
    }

    #[tokio::test]
    async fn test_open_widget_is_idempotent() {
        let (mut c, _) = controller();
        c.set_page("https://shop.se/p/lampa", pick_page()).await;
        assert_eq!(c.handle(Request::OpenWidget).await, Response::ack());
        assert_eq!(c.handle(Request::OpenWidget).await, Response::ack());
        assert!(c.is_widget_open());
    }

    #[tokio::test]
    async fn test_co2_request() {
        let (mut c, _) = controller();
        let ok = c
            .handle(Request::Co2EstimateRequest { material: "wool".into(), weight_kg: 0.5 })
            .await;
        let Response::Co2 { result, .. } = ok else { panic!("expected co2 result") };
        assert_eq!(result.co2e, 1.0);

        let err = c
            .handle(Request::Co2EstimateRequest { material: "kryptonite".into(), weight_kg: 1.0 })
            .await;
        assert_eq!(err, Response::Error { ok: false, error: "Unknown activity".into() });
    }

    #[tokio::test]
    async fn test_schedule_notification() {
        let (mut c, _) = controller();
        let before = Utc::now().timestamp_millis();
        let response = c
            .handle(Request::ScheduleNotification { delay_seconds: 30, title: "T".into(), message: "M".into() })
            .await;
        let Response::Scheduled { scheduled_for, .. } = response else { panic!("expected scheduledFor") };
        assert!(scheduled_for >= before + 30_000);
    }
}
