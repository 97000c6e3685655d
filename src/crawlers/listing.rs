//! The listing extraction loop.
//!
//! Pages through one shop's catalog, extracts a record per item node, skips
//! items that fail extraction and records already emitted in this run, and
//! stops on the first fetch failure, an empty page, a missing next-page
//! signal or the page cap. Pages are fetched one at a time and only when the
//! records of the previous page have all been consumed.

use crate::fetchers::{FetchRequest, PageFetcher};
use crate::parsers::html;
use crate::results::ProductRecord;
use crate::shops::{PageContext, ShopExtractor};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Why pagination ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FetchFailed,
    EmptyPage,
    NoNextPage,
    PageCap,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::FetchFailed => "page fetch failed",
            StopReason::EmptyPage => "page had no items",
            StopReason::NoNextPage => "no next page",
            StopReason::PageCap => "page cap reached",
        })
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub pages_fetched: u32,
    pub items_seen: usize,
    pub records_emitted: usize,
    pub items_failed: usize,
    pub duplicates: usize,
    pub coercions: usize,
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// First listing page; the shop's own when `None`
    pub listing_url: Option<Url>,
    /// Safety cap on fetched pages
    pub max_pages: u32,
    /// How long a browser waits for the item grid
    pub wait_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            listing_url: None,
            max_pages: 100,
            wait_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    FetchingPage(u32),
    ExtractingItems { page: u32, has_next: bool },
    Done,
}

/// A single pass over a shop listing, pulled one record at a time
pub struct ListingRun<F> {
    fetcher: F,
    shop: &'static dyn ShopExtractor,
    listing_url: Url,
    base_url: Url,
    max_pages: u32,
    wait_timeout: Duration,
    state: LoopState,
    pending: VecDeque<ProductRecord>,
    seen: HashSet<String>,
    stats: RunStats,
}

impl<F: PageFetcher> ListingRun<F> {
    pub fn new(fetcher: F, shop: &'static dyn ShopExtractor, options: RunOptions) -> Self {
        Self {
            fetcher,
            listing_url: options.listing_url.unwrap_or_else(|| shop.listing_url()),
            base_url: shop.base_url(),
            shop,
            max_pages: options.max_pages,
            wait_timeout: options.wait_timeout,
            state: LoopState::FetchingPage(1),
            pending: VecDeque::new(),
            seen: HashSet::new(),
            stats: RunStats::default(),
        }
    }

    /// Next unique record, fetching another page only when the current one is used up
    pub async fn next_record(&mut self) -> Option<ProductRecord> {
        loop {
            match self.state {
                LoopState::Done => return None,
                LoopState::ExtractingItems { page, has_next } => {
                    if let Some(record) = self.pending.pop_front() {
                        self.stats.records_emitted += 1;
                        return Some(record);
                    }
                    self.state = if has_next {
                        LoopState::FetchingPage(page + 1)
                    } else {
                        self.stop(StopReason::NoNextPage, page)
                    };
                }
                // checked before every fetch, so a cap of 0 fetches nothing
                LoopState::FetchingPage(page) if page > self.max_pages => {
                    self.state = self.stop(StopReason::PageCap, page - 1);
                }
                LoopState::FetchingPage(page) => {
                    self.state = self.fetch_page(page).await;
                }
            }
        }
    }

    /// End the run and release the fetcher's session
    pub async fn finish(mut self) -> RunStats {
        if self.state != LoopState::Done {
            ::log::info!("Run finished before pagination ended");
        }
        if let Err(e) = self.fetcher.close().await {
            ::log::warn!("Failed to close page fetcher: {}", e);
        }
        self.stats
    }

    async fn fetch_page(&mut self, page: u32) -> LoopState {
        let url = self.shop.page_url(&self.listing_url, page);
        ::log::info!("Scraping page {}: {}", page, url);

        let request = FetchRequest::listing(self.shop, url, self.wait_timeout);
        let markup = match self.fetcher.fetch(&request).await {
            Ok(markup) => markup,
            Err(e) => {
                ::log::error!("Failed to fetch page {}: {}", page, e);
                return self.stop(StopReason::FetchFailed, page);
            }
        };
        self.stats.pages_fetched += 1;

        let (item_count, has_next) = self.extract_page(page, &markup);
        if item_count == 0 {
            return self.stop(StopReason::EmptyPage, page);
        }
        LoopState::ExtractingItems { page, has_next }
    }

    /// Parse one page into pending records. Returns the number of item nodes
    /// and whether the shop signals another page.
    fn extract_page(&mut self, page: u32, markup: &str) -> (usize, bool) {
        let doc = html::parse(markup);
        let mut ctx = PageContext::new(page, &self.base_url);
        let mut item_count = 0;

        for (index, item) in doc.select(self.shop.item_selector()).enumerate() {
            item_count += 1;
            let record = match self.shop.extract(item, &mut ctx) {
                Ok(record) => record,
                Err(e) => {
                    ctx.coercions.clear();
                    self.stats.items_failed += 1;
                    ::log::warn!("Skipping item {} on page {}: {}", index + 1, page, e);
                    continue;
                }
            };

            for coercion in ctx.coercions.drain(..) {
                self.stats.coercions += 1;
                ::log::info!("  {}: {}", record.title, coercion);
            }

            if !self.seen.insert(record.key().to_string()) {
                self.stats.duplicates += 1;
                ::log::info!("  Duplicate skipped: {}", record.key());
                continue;
            }

            ::log::info!("  Scraped: {}", record.title);
            self.pending.push_back(record);
        }

        self.stats.items_seen += item_count;
        let has_next = item_count > 0 && self.shop.has_next_page(&doc, page, item_count);
        ::log::debug!(
            "Page {}: {} items, {} queued, next page: {}",
            page,
            item_count,
            self.pending.len(),
            has_next
        );
        (item_count, has_next)
    }

    fn stop(&mut self, reason: StopReason, page: u32) -> LoopState {
        ::log::info!("Pagination ended at page {}: {}", page, reason);
        self.stats.stop_reason = Some(reason);
        LoopState::Done
    }
}

/// Run the loop in a task, streaming records through a channel as they are found.
///
/// The task closes the fetcher when pagination ends or the receiver is dropped
/// and resolves to the run's counters.
pub fn start<F>(
    fetcher: F,
    shop: &'static dyn ShopExtractor,
    options: RunOptions,
) -> (mpsc::Receiver<ProductRecord>, JoinHandle<RunStats>)
where
    F: PageFetcher + 'static,
{
    let (tx, rx) = mpsc::channel::<ProductRecord>(256);
    let handle = tokio::spawn(async move {
        let mut run = ListingRun::new(fetcher, shop, options);
        while let Some(record) = run.next_record().await {
            if tx.send(record).await.is_err() {
                ::log::warn!("Record receiver dropped, stopping run");
                break;
            }
        }
        run.finish().await
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::testing::ScriptedFetcher;
    use crate::parsers::html::css;
    use crate::shops::static_url;
    use scraper::{ElementRef, Html, Selector};
    use std::sync::LazyLock;

    static ITEM: LazyLock<Selector> = LazyLock::new(|| css("li.product"));
    static NAME: LazyLock<Selector> = LazyLock::new(|| css("a.name"));
    static PRICE: LazyLock<Selector> = LazyLock::new(|| css("span.price"));
    static NEXT: LazyLock<Selector> = LazyLock::new(|| css("a.next"));

    /// Minimal shop: `li.product` items, `a.next` pager, `?page=N` URLs
    struct FixtureShop;

    impl ShopExtractor for FixtureShop {
        fn name(&self) -> &'static str {
            "fixture"
        }

        fn base_url(&self) -> Url {
            static_url("https://shop.example")
        }

        fn listing_url(&self) -> Url {
            static_url("https://shop.example/phones")
        }

        fn page_url(&self, listing: &Url, page: u32) -> Url {
            static_url(&format!("{listing}?page={page}"))
        }

        fn item_selector(&self) -> &Selector {
            &ITEM
        }

        fn extract_title(&self, item: ElementRef<'_>) -> Option<String> {
            html::first_text(item, &NAME)
        }

        fn extract_link(&self, item: ElementRef<'_>) -> Option<String> {
            html::first_attr(item, &NAME, "href")
        }

        fn extract_price(&self, item: ElementRef<'_>) -> Option<String> {
            html::first_text(item, &PRICE)
        }

        fn has_next_page(&self, doc: &Html, _page: u32, _item_count: usize) -> bool {
            html::exists(doc, &NEXT)
        }
    }

    static SHOP: FixtureShop = FixtureShop;

    const PAGE_1: &str = "https://shop.example/phones?page=1";
    const PAGE_2: &str = "https://shop.example/phones?page=2";
    const PAGE_3: &str = "https://shop.example/phones?page=3";

    fn item(name: &str, href: &str, price: &str) -> String {
        format!(r#"<li class="product"><a class="name" href="{href}">{name}</a><span class="price">{price}</span></li>"#)
    }

    fn page(items: &[String], next: bool) -> String {
        let pager = if next { r##"<a class="next" href="#">next</a>"## } else { "" };
        format!("<html><body><ul>{}</ul>{}</body></html>", items.concat(), pager)
    }

    fn options(max_pages: u32) -> RunOptions {
        RunOptions {
            max_pages,
            ..RunOptions::default()
        }
    }

    async fn collect(fetcher: ScriptedFetcher, max_pages: u32) -> (Vec<ProductRecord>, RunStats) {
        let mut run = ListingRun::new(fetcher, &SHOP, options(max_pages));
        let mut records = Vec::new();
        while let Some(record) = run.next_record().await {
            records.push(record);
        }
        (records, run.finish().await)
    }

    #[tokio::test]
    async fn test_malformed_item_skipped_and_empty_page_stops() {
        let malformed = r#"<li class="product"><span class="price">10 zł</span></li>"#.to_string();
        let fetcher = ScriptedFetcher::new()
            .page(
                PAGE_1,
                &page(
                    &[
                        item("Phone A", "/p/a", "1 299,99 zł"),
                        malformed,
                        item("Phone B", "/p/b", "899 zł"),
                    ],
                    true,
                ),
            )
            .page(PAGE_2, &page(&[], true));
        let log = fetcher.clone();

        let (records, stats) = collect(fetcher, 100).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Phone A");
        assert_eq!(records[0].price, 1299.99);
        assert_eq!(records[0].product_link.as_deref(), Some("https://shop.example/p/a"));
        assert_eq!(records[1].title, "Phone B");
        assert_eq!(log.requested(), vec![PAGE_1, PAGE_2]);
        assert_eq!(stats.items_failed, 1);
        assert_eq!(stats.stop_reason, Some(StopReason::EmptyPage));
        assert!(log.was_closed());
    }

    #[tokio::test]
    async fn test_duplicate_across_pages_emitted_once() {
        let fetcher = ScriptedFetcher::new()
            .page(
                PAGE_1,
                &page(&[item("Phone A", "/p/a", "100"), item("Phone B", "/p/b", "200")], true),
            )
            .page(
                PAGE_2,
                &page(&[item("Phone B again", "/p/b", "200"), item("Phone C", "/p/c", "300")], false),
            );

        let (records, stats) = collect(fetcher, 100).await;

        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Phone A", "Phone B", "Phone C"]);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.stop_reason, Some(StopReason::NoNextPage));

        let keys: HashSet<_> = records.iter().map(|r| r.key()).collect();
        assert_eq!(keys.len(), records.len());
    }

    #[tokio::test]
    async fn test_empty_first_page_fetches_once() {
        let fetcher = ScriptedFetcher::new().page(PAGE_1, &page(&[], true));
        let log = fetcher.clone();

        let (records, stats) = collect(fetcher, 100).await;

        assert!(records.is_empty());
        assert_eq!(log.requested(), vec![PAGE_1]);
        assert_eq!(stats.stop_reason, Some(StopReason::EmptyPage));
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_pagination_without_retry() {
        let fetcher = ScriptedFetcher::new()
            .page(PAGE_1, &page(&[item("Phone A", "/p/a", "100")], true))
            .failing(PAGE_2)
            .page(PAGE_3, &page(&[item("Phone C", "/p/c", "300")], false));
        let log = fetcher.clone();

        let (records, stats) = collect(fetcher, 100).await;

        assert_eq!(records.len(), 1);
        assert_eq!(log.requested(), vec![PAGE_1, PAGE_2]);
        assert_eq!(stats.pages_fetched, 1);
        assert_eq!(stats.stop_reason, Some(StopReason::FetchFailed));
        assert!(log.was_closed());
    }

    #[tokio::test]
    async fn test_page_cap_stops_always_present_next_signal() {
        let mut fetcher = ScriptedFetcher::new();
        for n in 1..=5 {
            let url = format!("https://shop.example/phones?page={n}");
            let markup = page(&[item(&format!("Phone {n}"), &format!("/p/{n}"), "100")], true);
            fetcher = fetcher.page(&url, &markup);
        }
        let log = fetcher.clone();

        let (records, stats) = collect(fetcher, 3).await;

        assert_eq!(records.len(), 3);
        assert_eq!(log.requested().len(), 3);
        assert_eq!(stats.stop_reason, Some(StopReason::PageCap));
    }

    #[tokio::test]
    async fn test_zero_page_cap_fetches_nothing() {
        let fetcher = ScriptedFetcher::new().page(PAGE_1, &page(&[item("Phone", "/p/1", "100")], true));
        let log = fetcher.clone();

        let (records, stats) = collect(fetcher, 0).await;

        assert!(records.is_empty());
        assert!(log.requested().is_empty());
        assert_eq!(stats.pages_fetched, 0);
        assert_eq!(stats.stop_reason, Some(StopReason::PageCap));
    }

    #[tokio::test]
    async fn test_records_emitted_before_next_fetch() {
        let fetcher = ScriptedFetcher::new()
            .page(PAGE_1, &page(&[item("Phone A", "/p/a", "100"), item("Phone B", "/p/b", "1")], true))
            .page(PAGE_2, &page(&[], false));
        let log = fetcher.clone();
        let mut run = ListingRun::new(fetcher, &SHOP, options(100));

        run.next_record().await.unwrap();
        run.next_record().await.unwrap();
        assert_eq!(log.requested().len(), 1);

        assert!(run.next_record().await.is_none());
        assert_eq!(log.requested().len(), 2);
        assert!(run.next_record().await.is_none());
        assert_eq!(log.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_is_identical() {
        let fetcher = ScriptedFetcher::new()
            .page(
                PAGE_1,
                &page(&[item("Phone A", "/p/a", "1 299,99 zł"), item("Phone B", "/p/b", "bad")], true),
            )
            .page(PAGE_2, &page(&[item("Phone C", "/p/c", "3 000")], false));

        let (first, first_stats) = collect(fetcher.clone(), 100).await;
        let (second, second_stats) = collect(fetcher, 100).await;

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first_stats.coercions, 1);
        assert_eq!(first_stats, second_stats);
    }

    #[tokio::test]
    async fn test_start_streams_records_and_reports_stats() {
        let fetcher = ScriptedFetcher::new()
            .page(PAGE_1, &page(&[item("Phone A", "/p/a", "100")], true))
            .page(PAGE_2, &page(&[item("Phone B", "/p/b", "200")], false));
        let log = fetcher.clone();

        let (mut rx, handle) = start(fetcher, &SHOP, options(100));
        let mut titles = Vec::new();
        while let Some(record) = rx.recv().await {
            titles.push(record.title);
        }
        let stats = handle.await.unwrap();

        assert_eq!(titles, vec!["Phone A", "Phone B"]);
        assert_eq!(stats.records_emitted, 2);
        assert_eq!(stats.pages_fetched, 2);
        assert!(log.was_closed());
    }
}
