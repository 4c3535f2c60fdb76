//! Walkthrough of the cache, de-duplicator, embed pool and connection manager
//!
//! Run with: cargo run --example embed_walkthrough
//!
//! Uses in-process stand-ins for the embedded player and the push
//! connection, so it runs without network access. Set `RUST_LOG` to
//! `embedcache=debug` to see pool and connection bookkeeping.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use embedcache::connection::{ConnectionConfig, Established};
use embedcache::pool::ReadySignal;
use embedcache::{
    spawn_sweeper, ConnectionManager, Connector, DedupConfig, EmbedOptions, EmbedPool, Link, LinkEvent,
    PoolConfig, RequestDeduplicator, RequestOptions, ResourceCache, RetryPolicy, Surface, Widget,
    WidgetFactory,
};

/// Player that becomes ready as soon as it is created
struct ConsolePlayer {
    channel: String,
}

impl Widget for ConsolePlayer {
    fn attach(&mut self, surface: &Surface) {
        println!("  [player {}] attached to {}", self.channel, surface);
    }

    fn detach(&mut self) {
        println!("  [player {}] detached", self.channel);
    }

    fn set_muted(&mut self, muted: bool) {
        println!("  [player {}] muted={}", self.channel, muted);
    }
}

struct ConsoleFactory;

impl WidgetFactory for ConsoleFactory {
    type Widget = ConsolePlayer;

    fn create(&self, channel: &str, options: &EmbedOptions, ready: ReadySignal) -> ConsolePlayer {
        println!(
            "  [factory] creating player for {} (autoplay={}, muted={})",
            channel, options.autoplay, options.muted
        );
        ready.notify();
        ConsolePlayer {
            channel: channel.to_string(),
        }
    }
}

/// Link that prints what it sends
struct ConsoleLink {
    key: String,
}

impl Link for ConsoleLink {
    fn send(&self, payload: Bytes) -> io::Result<()> {
        println!("  [link {}] -> {}", self.key, String::from_utf8_lossy(&payload));
        Ok(())
    }

    fn close(&self) {
        println!("  [link {}] closed", self.key);
    }
}

/// Connector that refuses the first attempt and keeps event senders around
#[derive(Default)]
struct FlakyConnector {
    attempts: AtomicU32,
    events: Arc<parking_lot::Mutex<Vec<mpsc::Sender<LinkEvent>>>>,
}

#[async_trait]
impl Connector for FlakyConnector {
    type Link = ConsoleLink;

    async fn connect(&self, key: &str, _config: &ConnectionConfig) -> io::Result<Established<ConsoleLink>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  [connector] attempt {} for {}", attempt, key);

        if attempt == 1 {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "server warming up"));
        }

        let (tx, rx) = mpsc::channel(8);
        self.events.lock().push(tx);

        Ok(Established {
            link: Arc::new(ConsoleLink { key: key.to_string() }),
            events: rx,
        })
    }
}

fn cache_walkthrough() {
    println!("== ResourceCache ==");

    let mut cache: ResourceCache<&str, u32> = ResourceCache::new();
    cache.set("pinned", 1, Duration::from_secs(60), 10);
    cache.set("recent", 2, Duration::from_secs(60), 0);

    println!("  victim would be {:?}", cache.victim());
    println!("  get(pinned) = {:?}", cache.get(&"pinned"));
    println!("  stats: {:?}", cache.stats());
}

async fn dedup_walkthrough() -> Result<(), Box<dyn std::error::Error>> {
    println!("== RequestDeduplicator ==");

    let dedup: Arc<RequestDeduplicator<String, String>> = Arc::new(RequestDeduplicator::with_config(
        DedupConfig::default().retry(RetryPolicy::default().delays(Duration::from_millis(50), Duration::from_millis(200))),
    ));
    let calls = Arc::new(AtomicU32::new(0));

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let dedup = Arc::clone(&dedup);
        let calls = Arc::clone(&calls);
        waiters.push(tokio::spawn(async move {
            dedup
                .get(
                    "tournaments:upcoming",
                    move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            if n == 1 {
                                Err("upstream hiccup".to_string())
                            } else {
                                Ok("3 tournaments".to_string())
                            }
                        }
                    },
                    RequestOptions::new().ttl(Duration::from_secs(30)),
                )
                .await
        }));
    }

    for waiter in waiters {
        println!("  caller got {:?}", waiter.await?);
    }
    println!("  fetcher invoked {} times", calls.load(Ordering::SeqCst));

    let removed = dedup.invalidate(embedcache::KeyPattern::prefix("tournaments:"));
    println!("  invalidated {} entries; stats: {:?}", removed, dedup.stats());

    Ok(())
}

async fn pool_walkthrough() -> Result<(), Box<dyn std::error::Error>> {
    println!("== EmbedPool ==");

    let pool = Arc::new(EmbedPool::with_config(
        ConsoleFactory,
        PoolConfig::with_size(2)
            .release_grace(Duration::from_millis(100))
            .preload_delay(Duration::from_millis(100)),
    ));
    let sweeper = spawn_sweeper(Arc::clone(&pool), pool.config().sweep_interval);

    let channels = ["gaules", "alanzoka", "loud_coringa"];

    let shown = pool.acquire(channels[0])?;
    pool.attach(&shown, Surface::container("hero"))?;
    pool.set_visible(&shown, true)?;
    pool.wait_ready(&shown, Duration::from_secs(1)).await?;
    println!("  showing {} on {}", shown.channel, shown.id);

    pool.schedule_neighbors(&channels, channels[0]);
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("  {} preloaded: {}", channels[1], pool.is_preloaded(channels[1]));

    // Flick away and back within the grace period
    pool.release(&shown);
    let again = pool.acquire(channels[0])?;
    println!("  reacquired same handle: {}", again.id == shown.id);

    let recent = ["casimiro", "gaules", "baiano"];
    println!("  suggested from history: {:?}", pool.suggest_preload(&recent, 1));
    println!("  ready handles: {}", pool.ready_handles().len());
    println!("  stats: {:?}", pool.stats());

    sweeper.abort();
    pool.clear();
    Ok(())
}

async fn connection_walkthrough() -> Result<(), Box<dyn std::error::Error>> {
    println!("== ConnectionManager ==");

    let connector = FlakyConnector::default();
    let events = Arc::clone(&connector.events);
    let manager = Arc::new(ConnectionManager::with_config(
        connector,
        ConnectionConfig::default()
            .reconnect_interval(Duration::from_millis(200))
            .keep_alive_interval(Duration::from_millis(300)),
    ));

    manager.open("live-status").await?;
    println!("  status: {:?}", manager.status());

    manager.keep_alive_default("live-status");
    tokio::time::sleep(Duration::from_millis(700)).await;

    // Abnormal close from the remote triggers a silent reconnect
    let remote = events.lock().last().cloned();
    if let Some(tx) = remote {
        tx.send(LinkEvent::Closed { code: 1006 }).await?;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("  after drop: {:?}", manager.connection_status("live-status"));

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("  recovered: {:?}", manager.status());

    manager.close_all();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("embedcache=info".parse()?)
                .add_directive("embed_walkthrough=info".parse()?),
        )
        .init();

    cache_walkthrough();
    dedup_walkthrough().await?;
    pool_walkthrough().await?;
    connection_walkthrough().await?;

    Ok(())
}
