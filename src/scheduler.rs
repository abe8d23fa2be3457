use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow, ensure};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use scraper::Html;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{info, warn};
use url::Url;

use crate::article::{self, Article};
use crate::db;
use crate::fetch::Fetch;
use crate::rows::{self, Layout};
use crate::thread::{self, ThreadSummary};

// One capture of the front page and the articles listed on it.
#[derive(Debug)]
pub struct Snapshot {
    pub id: i64,
    pub taken_at: DateTime<Utc>,
    pub articles: Vec<Article>,
}

// Shared by both loops
pub struct Crawler<F> {
    fetcher: F,
    db: Mutex<Connection>,
    layout: Layout,
    root: Url,
}

impl<F: Fetch> Crawler<F> {
    pub fn new(fetcher: F, conn: Connection, layout: Layout, root: Url) -> Self {
        Self {
            fetcher,
            db: Mutex::new(conn),
            layout,
            root,
        }
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub async fn take_snapshot(&self) -> Result<Snapshot> {
        let body = self.fetcher.fetch(self.root.as_str()).await?;
        self.record_snapshot(&body)
    }

    fn record_snapshot(&self, body: &str) -> Result<Snapshot> {
        let document = Html::parse_document(body);
        let rows = rows::front_page_rows(&document, &self.layout);
        let taken_at = Utc::now();

        let conn = self.lock_db()?;
        let id = db::insert_snapshot(&conn, &taken_at)?;
        let articles = article::assemble(&conn, id, &rows, &self.layout)?;
        info!(snapshot = id, articles = articles.len(), "stored front page");

        Ok(Snapshot {
            id,
            taken_at,
            articles,
        })
    }

    /// Fetch an article's item page and store its comment thread.
    pub async fn crawl_comments(&self, article: &Article) -> Result<ThreadSummary> {
        let url = self.root.join(&article.comments_link)?;
        info!(url = %url, "parsing comments");
        let body = self.fetcher.fetch(url.as_str()).await?;
        self.record_thread(article, &body)
    }

    fn record_thread(&self, article: &Article, body: &str) -> Result<ThreadSummary> {
        let document = Html::parse_document(body);
        let rows = rows::comment_rows(&document, &self.layout);

        let mut conn = self.lock_db()?;
        thread::store_thread(&mut conn, article, &rows, &self.layout)
    }

    // One article per limiter tick, failures are logged and skipped
    pub async fn process_snapshot(&self, snapshot: &Snapshot, limiter: &mut Interval) {
        info!(
            snapshot = snapshot.id,
            taken_at = %snapshot.taken_at,
            articles = snapshot.articles.len(),
            "updating front page comments"
        );

        for article in &snapshot.articles {
            limiter.tick().await;
            if let Err(e) = self.crawl_comments(article).await {
                warn!(
                    article = %article.comments_link,
                    error = %e,
                    "failed to store comment thread"
                );
            }
        }
    }
}

// Snapshot loop. The first snapshot is taken right away.
pub async fn produce<F: Fetch>(
    crawler: Arc<Crawler<F>>,
    interval: Duration,
    snapshots: mpsc::Sender<Snapshot>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        info!("snapshotting front page");

        match crawler.take_snapshot().await {
            Ok(snapshot) => {
                // Waits here while the previous snapshot is still queued
                if snapshots.send(snapshot).await.is_err() {
                    warn!("snapshot queue closed, stopping snapshot loop");
                    return;
                }
            }
            Err(e) => warn!(error = %e, "front page snapshot failed, skipping cycle"),
        }
    }
}

// Missed ticks are delayed, never bursted
pub fn rate_limiter(throttle: Duration) -> Interval {
    let mut limiter = time::interval(throttle);
    limiter.set_missed_tick_behavior(MissedTickBehavior::Delay);
    limiter
}

// Comments loop. Runs until the queue closes.
pub async fn consume<F: Fetch>(
    crawler: Arc<Crawler<F>>,
    throttle: Duration,
    mut snapshots: mpsc::Receiver<Snapshot>,
) {
    let mut limiter = rate_limiter(throttle);

    while let Some(snapshot) = snapshots.recv().await {
        crawler.process_snapshot(&snapshot, &mut limiter).await;
    }
}

// Run both loops for the life of the process.
pub async fn run<F: Fetch + 'static>(
    crawler: Crawler<F>,
    interval: Duration,
    throttle: Duration,
) -> Result<()> {
    ensure!(!interval.is_zero(), "snapshot interval must be positive");
    ensure!(!throttle.is_zero(), "throttle must be positive");

    let crawler = Arc::new(crawler);
    let (tx, rx) = mpsc::channel(1);

    info!(interval = ?interval, "starting snapshot loop");
    let producer = tokio::spawn(produce(Arc::clone(&crawler), interval, tx));

    info!(throttle = ?throttle, "starting comments loop");
    consume(crawler, throttle, rx).await;

    producer.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::fixtures;

    struct FakeSite {
        pages: HashMap<String, String>,
        front_fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetch for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url == fixtures::ROOT_URL {
                self.front_fetches.fetch_add(1, Ordering::SeqCst);
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("no page at {url}"))
        }
    }

    fn item_url(id: i64) -> String {
        format!("{}item?id={id}", fixtures::ROOT_URL)
    }

    fn thread_page(id: i64) -> String {
        fixtures::comment_page(&[
            fixtures::comment(id * 100 + 1, "alice", 0, "top"),
            fixtures::comment(id * 100 + 2, "bob", 40, "reply"),
        ])
    }

    // Crawler over a fake site with the fixture front page plus the given item pages
    fn crawler(items: &[i64]) -> (Crawler<FakeSite>, Arc<AtomicUsize>) {
        let front_fetches = Arc::new(AtomicUsize::new(0));
        let mut pages: HashMap<_, _> = items
            .iter()
            .map(|id| (item_url(*id), thread_page(*id)))
            .collect();
        pages.insert(fixtures::ROOT_URL.to_string(), fixtures::front_page());

        let site = FakeSite {
            pages,
            front_fetches: Arc::clone(&front_fetches),
        };
        let crawler = Crawler::new(
            site,
            db::open_in_memory().unwrap(),
            Layout::new().unwrap(),
            Url::parse(fixtures::ROOT_URL).unwrap(),
        );
        (crawler, front_fetches)
    }

    fn count(crawler: &Crawler<FakeSite>, table: &str) -> i64 {
        crawler
            .lock_db()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_then_comments() {
        let (crawler, _) = crawler(&[1, 2]);

        let snapshot = crawler.take_snapshot().await.unwrap();
        assert_eq!(snapshot.articles.len(), 2);
        assert!(snapshot.articles.iter().all(|a| a.snapshot_id == snapshot.id));

        let summary = crawler.crawl_comments(&snapshot.articles[0]).await.unwrap();
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.edges, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_article_does_not_stop_snapshot() {
        let (crawler, _) = crawler(&[2]);
        let snapshot = crawler.take_snapshot().await.unwrap();

        let mut limiter = rate_limiter(Duration::from_secs(1));
        crawler.process_snapshot(&snapshot, &mut limiter).await;

        assert_eq!(count(&crawler, "comments"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_blocks_while_queue_is_full() {
        let (crawler, front_fetches) = crawler(&[]);
        let (tx, mut rx) = mpsc::channel(1);
        let producer = tokio::spawn(produce(Arc::new(crawler), Duration::from_secs(60), tx));

        // One snapshot queued, the next one taken but stuck handing off
        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(front_fetches.load(Ordering::SeqCst), 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.id, 1);

        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(front_fetches.load(Ordering::SeqCst), 3);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.id, 2);

        producer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_comment_requests_are_throttled() {
        let (crawler, _) = crawler(&[1, 2, 3, 4]);

        let snapshot = {
            let conn = crawler.lock_db().unwrap();
            let id = db::insert_snapshot(&conn, &Utc::now()).unwrap();
            let articles = (1..=4)
                .map(|rank| {
                    let mut article = Article {
                        snapshot_id: id,
                        rank,
                        title: format!("Story {rank}"),
                        comments_link: format!("item?id={rank}"),
                        ..Article::default()
                    };
                    article.id = db::insert_article(&conn, &article).unwrap();
                    article
                })
                .collect();
            Snapshot {
                id,
                taken_at: Utc::now(),
                articles,
            }
        };

        let throttle = Duration::from_secs(1);
        let mut limiter = rate_limiter(throttle);
        let start = time::Instant::now();
        crawler.process_snapshot(&snapshot, &mut limiter).await;

        assert!(start.elapsed() >= throttle * 3);
        assert_eq!(count(&crawler, "comments"), 8);
    }

    #[tokio::test]
    async fn test_run_rejects_zero_durations() {
        let (crawler, _) = crawler(&[]);
        let result = run(crawler, Duration::ZERO, Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
