//! Connection manager implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::ConnectionConfig;
use super::state::{ConnectionState, ConnectionStatus};
use super::transport::{Connector, Established, Link, LinkEvent};
use crate::error::{ConnectionError, Result};

type PendingOpen<L> = Shared<BoxFuture<'static, Result<Arc<L>>>>;

/// Per-key connection record
struct Entry<L> {
    /// Distinguishes this record from one created after a `close`
    id: u64,
    state: ConnectionState,
    reconnect_attempts: u32,
    last_connect_at: Instant,
    config: ConnectionConfig,
    link: Option<Arc<L>>,
    /// Connect attempt shared by every `open` caller
    pending: Option<PendingOpen<L>>,
    /// Flipped by `close` to reject pending waiters
    closed: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
    supervisor: Option<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
}

impl<L: Link> Entry<L> {
    fn new(id: u64, config: ConnectionConfig) -> Self {
        let (closed, _) = watch::channel(false);

        Self {
            id,
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            last_connect_at: Instant::now(),
            config,
            link: None,
            pending: None,
            closed,
            driver: None,
            supervisor: None,
            keep_alive: None,
        }
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            reconnect_attempts: self.reconnect_attempts,
            last_connect_at: self.last_connect_at,
        }
    }

    fn holds(&self, link: &Arc<L>) -> bool {
        self.link.as_ref().is_some_and(|current| Arc::ptr_eq(current, link))
    }

    /// Drop the current link, stopping its supervisor and keep-alive
    fn drop_link(&mut self) -> Option<Arc<L>> {
        if let Some(task) = self.supervisor.take() {
            task.abort();
        }
        self.stop_keep_alive();
        self.link.take()
    }

    fn stop_keep_alive(&mut self) {
        if let Some(task) = self.keep_alive.take() {
            task.abort();
        }
    }

    /// Terminal teardown
    fn shutdown(mut self) {
        self.state = ConnectionState::Closing;
        self.closed.send_replace(true);
        if let Some(task) = self.driver.take() {
            task.abort();
        }
        if let Some(link) = self.drop_link() {
            link.close();
        }
    }
}

/// Outcome of a remote event for the supervisor
enum Supervision {
    Continue,
    Stop,
}

/// Keyed manager of resilient persistent connections
///
/// At most one link exists per key. Concurrent `open` calls share a single
/// connect attempt; failures on an open link trigger reconnects in the
/// background, observable only through [`status`](Self::status).
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: ConnectionConfig,
    entries: Mutex<HashMap<String, Entry<C::Link>>>,
    next_id: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager with default configuration
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, ConnectionConfig::default())
    }

    /// Create a manager with custom default configuration
    pub fn with_config(connector: C, config: ConnectionConfig) -> Self {
        Self {
            connector,
            config,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Get the default configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the connection for `key` with the default configuration
    pub async fn open(self: &Arc<Self>, key: &str) -> Result<Arc<C::Link>> {
        self.open_with(key, self.config.clone()).await
    }

    /// Open the connection for `key`
    ///
    /// Returns the existing link if the connection is open, joins the
    /// pending attempt if one is in progress, and otherwise starts
    /// connecting. `config` only applies when a new attempt is started.
    pub async fn open_with(self: &Arc<Self>, key: &str, config: ConnectionConfig) -> Result<Arc<C::Link>> {
        let pending = {
            let mut entries = self.entries.lock();

            match entries.get_mut(key) {
                Some(entry) => {
                    if let (ConnectionState::Open, Some(link)) = (entry.state, &entry.link) {
                        return Ok(Arc::clone(link));
                    }

                    if let Some(pending) = &entry.pending {
                        tracing::debug!(key = key, state = %entry.state, "Joining pending connect");
                        pending.clone()
                    } else {
                        if let Some(link) = entry.drop_link() {
                            link.close();
                        }
                        entry.config = config;
                        self.start_connect(key, entry, Duration::ZERO)
                    }
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let mut entry = Entry::new(id, config);
                    let pending = self.start_connect(key, &mut entry, Duration::ZERO);
                    entries.insert(key.to_string(), entry);
                    pending
                }
            }
        };

        pending.await
    }

    /// Register a connect attempt on `entry`, starting after `delay`
    fn start_connect(
        self: &Arc<Self>,
        key: &str,
        entry: &mut Entry<C::Link>,
        delay: Duration,
    ) -> PendingOpen<C::Link> {
        let manager = Arc::downgrade(self);
        let owned_key = key.to_string();
        let id = entry.id;
        let closed = entry.closed.subscribe();

        let future = async move {
            tokio::select! {
                outcome = Self::connect_loop(manager, owned_key.clone(), id, delay) => outcome,
                _ = wait_closed(closed) => Err(ConnectionError::Closed(owned_key).into()),
            }
        }
        .boxed()
        .shared();

        entry.state = if delay.is_zero() {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        entry.pending = Some(future.clone());

        // Drive the attempt even if every caller goes away
        let driver = future.clone();
        entry.driver = Some(tokio::spawn(async move {
            let _ = driver.await;
        }));

        future
    }

    async fn connect_loop(
        manager: Weak<Self>,
        key: String,
        id: u64,
        mut delay: Duration,
    ) -> Result<Arc<C::Link>> {
        loop {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let manager = manager
                .upgrade()
                .ok_or_else(|| ConnectionError::Closed(key.clone()))?;
            let config = manager.begin_attempt(&key, id)?;

            let attempt =
                tokio::time::timeout(config.connect_timeout, manager.connector.connect(&key, &config)).await;

            match attempt {
                Ok(Ok(established)) => return manager.finish_open(&key, id, established),
                Ok(Err(e)) => {
                    delay = manager.schedule_retry(&key, id, e.to_string())?;
                }
                Err(_) => {
                    manager.remove_if_current(&key, id);
                    tracing::warn!(
                        key = %key,
                        timeout_ms = config.connect_timeout.as_millis() as u64,
                        "Connect timed out"
                    );
                    return Err(ConnectionError::Timeout {
                        key,
                        timeout: config.connect_timeout,
                    }
                    .into());
                }
            }
        }
    }

    fn begin_attempt(&self, key: &str, id: u64) -> Result<ConnectionConfig> {
        let mut entries = self.entries.lock();
        let entry = current(&mut entries, key, id).ok_or_else(|| ConnectionError::Closed(key.to_string()))?;

        entry.state = ConnectionState::Connecting;
        entry.last_connect_at = Instant::now();

        tracing::debug!(key = key, attempt = entry.reconnect_attempts, "Connecting");

        Ok(entry.config.clone())
    }

    /// Count a failed attempt; returns the delay before the next one
    fn schedule_retry(&self, key: &str, id: u64, reason: String) -> Result<Duration> {
        let mut entries = self.entries.lock();
        let entry = current(&mut entries, key, id).ok_or_else(|| ConnectionError::Closed(key.to_string()))?;

        if entry.reconnect_attempts >= entry.config.max_reconnect_attempts {
            let attempts = entry.reconnect_attempts;
            entries.remove(key);

            tracing::warn!(key = key, attempts = attempts, reason = %reason, "Reconnect attempts exhausted");

            return Err(ConnectionError::Rejected {
                key: key.to_string(),
                attempts,
                reason,
            }
            .into());
        }

        entry.reconnect_attempts += 1;
        entry.state = ConnectionState::Reconnecting;
        let delay = entry.config.backoff().delay(entry.reconnect_attempts);

        tracing::info!(
            key = key,
            attempt = entry.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "Connect failed, scheduling reconnect"
        );

        Ok(delay)
    }

    fn finish_open(
        self: &Arc<Self>,
        key: &str,
        id: u64,
        established: Established<C::Link>,
    ) -> Result<Arc<C::Link>> {
        let Established { link, events } = established;
        let mut entries = self.entries.lock();

        let Some(entry) = current(&mut entries, key, id) else {
            link.close();
            return Err(ConnectionError::Closed(key.to_string()).into());
        };

        entry.state = ConnectionState::Open;
        entry.reconnect_attempts = 0;
        entry.link = Some(Arc::clone(&link));
        entry.pending = None;
        entry.driver = None;
        entry.supervisor = Some(tokio::spawn(Self::supervise(
            Arc::downgrade(self),
            key.to_string(),
            id,
            Arc::clone(&link),
            events,
        )));

        tracing::info!(key = key, "Connection opened");

        Ok(link)
    }

    async fn supervise(
        manager: Weak<Self>,
        key: String,
        id: u64,
        link: Arc<C::Link>,
        mut events: mpsc::Receiver<LinkEvent>,
    ) {
        loop {
            let event = events
                .recv()
                .await
                .unwrap_or_else(|| LinkEvent::Error("event stream ended".to_string()));

            let Some(manager) = manager.upgrade() else {
                return;
            };
            if let Supervision::Stop = manager.on_event(&key, id, &link, event) {
                return;
            }
        }
    }

    fn on_event(self: &Arc<Self>, key: &str, id: u64, link: &Arc<C::Link>, event: LinkEvent) -> Supervision {
        let mut entries = self.entries.lock();
        let Some(entry) = current(&mut entries, key, id).filter(|entry| entry.holds(link)) else {
            return Supervision::Stop;
        };

        entry.stop_keep_alive();

        let normal = event.is_normal_closure();
        let reason = match event {
            LinkEvent::Closing => {
                entry.state = ConnectionState::Closing;
                tracing::debug!(key = key, "Remote closing");
                return Supervision::Continue;
            }
            LinkEvent::Closed { code } => format!("closed with code {}", code),
            LinkEvent::Error(reason) => reason,
        };

        // The calling task is this supervisor
        entry.supervisor = None;
        entry.link = None;

        if normal {
            entry.state = ConnectionState::Disconnected;
            tracing::info!(key = key, "Connection closed");
            return Supervision::Stop;
        }

        if entry.reconnect_attempts < entry.config.max_reconnect_attempts {
            entry.reconnect_attempts += 1;
            let delay = entry.config.backoff().delay(entry.reconnect_attempts);

            tracing::warn!(
                key = key,
                attempt = entry.reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Connection lost, reconnecting"
            );

            // Nobody awaits a background reconnect; the spawned driver polls it
            drop(self.start_connect(key, entry, delay));
        } else {
            tracing::warn!(key = key, reason = %reason, "Connection lost, reconnect attempts exhausted");
            entries.remove(key);
        }

        Supervision::Stop
    }

    fn remove_if_current(&self, key: &str, id: u64) {
        let mut entries = self.entries.lock();
        if current(&mut entries, key, id).is_some() {
            entries.remove(key);
        }
    }

    /// Close the connection for `key`
    ///
    /// Terminal: pending `open` callers are rejected and no reconnect is
    /// attempted afterwards. Returns false if the key is unknown.
    pub fn close(&self, key: &str) -> bool {
        let entry = self.entries.lock().remove(key);

        match entry {
            Some(entry) => {
                let state = entry.state;
                entry.shutdown();
                tracing::info!(key = key, previous = %state, "Connection closed by caller");
                true
            }
            None => false,
        }
    }

    /// Close every connection, returning how many were closed
    pub fn close_all(&self) -> usize {
        let entries: Vec<(String, Entry<C::Link>)> = self.entries.lock().drain().collect();
        let count = entries.len();

        for (_, entry) in entries {
            entry.shutdown();
        }

        if count > 0 {
            tracing::info!(closed = count, "All connections closed");
        }
        count
    }

    /// Send keep-alive probes on `key` every `interval` while it stays open
    ///
    /// Replaces an earlier keep-alive for the same key. Returns false if the
    /// connection is not open. The probe stops for good once the connection
    /// leaves `Open` or a send fails.
    pub fn keep_alive(self: &Arc<Self>, key: &str, interval: Duration) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let Some(link) = entry.link.clone().filter(|_| entry.state == ConnectionState::Open) else {
            return false;
        };

        let task = tokio::spawn(Self::probe(
            Arc::downgrade(self),
            key.to_string(),
            entry.id,
            link,
            interval.max(Duration::from_millis(1)),
            entry.config.ping_payload.clone(),
        ));

        if let Some(previous) = entry.keep_alive.replace(task) {
            previous.abort();
        }

        tracing::debug!(key = key, interval_ms = interval.as_millis() as u64, "Keep-alive enabled");
        true
    }

    /// Keep-alive with the configured default interval
    pub fn keep_alive_default(self: &Arc<Self>, key: &str) -> bool {
        self.keep_alive(key, self.config.keep_alive_interval)
    }

    async fn probe(
        manager: Weak<Self>,
        key: String,
        id: u64,
        link: Arc<C::Link>,
        interval: Duration,
        payload: bytes::Bytes,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let open = manager
                .upgrade()
                .map(|manager| manager.is_open_on(&key, id, &link))
                .unwrap_or(false);
            if !open {
                tracing::debug!(key = %key, "Keep-alive stopped");
                return;
            }

            if let Err(e) = link.send(payload.clone()) {
                tracing::warn!(key = %key, error = %e, "Keep-alive probe failed");
                return;
            }
        }
    }

    fn is_open_on(&self, key: &str, id: u64, link: &Arc<C::Link>) -> bool {
        let mut entries = self.entries.lock();
        current(&mut entries, key, id)
            .map(|entry| entry.state == ConnectionState::Open && entry.holds(link))
            .unwrap_or(false)
    }

    /// The open link for `key`, if any
    pub fn link(&self, key: &str) -> Option<Arc<C::Link>> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        match entry.state {
            ConnectionState::Open => entry.link.clone(),
            _ => None,
        }
    }

    /// State of every known connection
    pub fn status(&self) -> HashMap<String, ConnectionState> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.state))
            .collect()
    }

    /// Detailed status of one connection
    pub fn connection_status(&self, key: &str) -> Option<ConnectionStatus> {
        self.entries.lock().get(key).map(Entry::status)
    }

    /// Number of known connections
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no connection is known
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        for (_, entry) in self.entries.get_mut().drain() {
            entry.shutdown();
        }
    }
}

/// The entry for `key` if it is still the record `id`
fn current<'a, L>(entries: &'a mut HashMap<String, Entry<L>>, key: &str, id: u64) -> Option<&'a mut Entry<L>> {
    entries.get_mut(key).filter(|entry| entry.id == id)
}

/// Resolves once `close` flips the flag; never resolves otherwise
async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let flagged = closed.wait_for(|closed| *closed).await.is_ok();
    if !flagged {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio_test::assert_ok;

    use super::*;
    use crate::error::Error;

    enum Step {
        Accept,
        AcceptAfter(Duration),
        Refuse,
        Hang,
    }

    #[derive(Default)]
    struct MockLink {
        sent: Mutex<Vec<Bytes>>,
        closed: AtomicBool,
        fail_send: AtomicBool,
    }

    impl Link for MockLink {
        fn send(&self, payload: Bytes) -> io::Result<()> {
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.sent.lock().push(payload);
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockConnector {
        script: Mutex<VecDeque<Step>>,
        attempts: Mutex<Vec<Instant>>,
        links: Mutex<Vec<(Arc<MockLink>, mpsc::Sender<LinkEvent>)>>,
    }

    impl MockConnector {
        fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                script: Mutex::new(steps.into_iter().collect()),
                ..Default::default()
            }
        }

        fn accept(&self) -> Established<MockLink> {
            let (tx, rx) = mpsc::channel(8);
            let link = Arc::new(MockLink::default());
            self.links.lock().push((Arc::clone(&link), tx));
            Established { link, events: rx }
        }

        fn attempts(&self) -> usize {
            self.attempts.lock().len()
        }

        fn events(&self, index: usize) -> mpsc::Sender<LinkEvent> {
            self.links.lock()[index].1.clone()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Link = MockLink;

        async fn connect(&self, _key: &str, _config: &ConnectionConfig) -> io::Result<Established<MockLink>> {
            self.attempts.lock().push(Instant::now());
            let step = self.script.lock().pop_front().unwrap_or(Step::Accept);

            match step {
                Step::Accept => Ok(self.accept()),
                Step::AcceptAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(self.accept())
                }
                Step::Refuse => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
                Step::Hang => std::future::pending().await,
            }
        }
    }

    fn manager(connector: MockConnector) -> Arc<ConnectionManager<MockConnector>> {
        Arc::new(ConnectionManager::new(connector))
    }

    /// Let spawned supervisors observe sent events
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_returns_existing_link() {
        let manager = manager(MockConnector::default());

        let first = manager.open("live").await.unwrap();
        let second = manager.open("live").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.connector.attempts(), 1);
        assert_eq!(manager.status().get("live"), Some(&ConnectionState::Open));
        assert!(manager.link("live").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_opens_share_attempt() {
        let manager = manager(MockConnector::scripted([Step::AcceptAfter(Duration::from_secs(1))]));

        let a = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.open("push").await })
        };
        let b = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.open("push").await })
        };

        settle().await;
        assert_eq!(manager.status().get("push"), Some(&ConnectionState::Connecting));

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_rejects_all_waiters() {
        let manager = manager(MockConnector::scripted([Step::Hang]));

        let other = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.open("slow").await })
        };
        let result = manager.open("slow").await;

        let expected: Result<()> = Err(Error::Connection(ConnectionError::Timeout {
            key: "slow".into(),
            timeout: Duration::from_secs(5),
        }));
        assert_eq!(result.map(|_| ()), expected.clone());
        assert_eq!(other.await.unwrap().map(|_| ()), expected);
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failures_back_off_linearly() {
        let manager = manager(MockConnector::scripted([Step::Refuse, Step::Refuse, Step::Accept]));

        assert_ok!(manager.open("flaky").await);

        let attempts = manager.connector.attempts.lock().clone();
        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, vec![Duration::from_secs(2), Duration::from_secs(4)]);

        let status = manager.connection_status("flaky").unwrap();
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reconnects_reject() {
        let manager = manager(MockConnector::scripted([
            Step::Refuse,
            Step::Refuse,
            Step::Refuse,
            Step::Refuse,
        ]));

        let result = manager.open("down").await;

        match result {
            Err(Error::Connection(ConnectionError::Rejected { key, attempts, reason })) => {
                assert_eq!(key, "down");
                assert_eq!(attempts, 3);
                assert_eq!(reason, "refused");
            }
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
        assert_eq!(manager.connector.attempts(), 4);
        assert!(manager.connection_status("down").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_remote_close_disconnects() {
        let manager = manager(MockConnector::default());
        manager.open("chat").await.unwrap();

        manager.connector.events(0).send(LinkEvent::Closing).await.unwrap();
        settle().await;
        assert_eq!(manager.status().get("chat"), Some(&ConnectionState::Closing));

        manager
            .connector
            .events(0)
            .send(LinkEvent::Closed { code: 1000 })
            .await
            .unwrap();
        settle().await;

        assert_eq!(manager.status().get("chat"), Some(&ConnectionState::Disconnected));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(manager.connector.attempts(), 1);

        // A later open reconnects on demand
        manager.open("chat").await.unwrap();
        assert_eq!(manager.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_reconnects_silently() {
        let manager = manager(MockConnector::default());
        let first = manager.open("status").await.unwrap();

        manager
            .connector
            .events(0)
            .send(LinkEvent::Closed { code: 1006 })
            .await
            .unwrap();
        settle().await;

        let status = manager.connection_status("status").unwrap();
        assert_eq!(status.state, ConnectionState::Reconnecting);
        assert_eq!(status.reconnect_attempts, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let status = manager.connection_status("status").unwrap();
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(manager.connector.attempts(), 2);

        let second = manager.open("status").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_joins_background_reconnect() {
        let manager = manager(MockConnector::default());
        manager.open("feed").await.unwrap();

        manager
            .connector
            .events(0)
            .send(LinkEvent::Error("reset by peer".into()))
            .await
            .unwrap();
        settle().await;

        let link = manager.open("feed").await.unwrap();
        assert!(Arc::ptr_eq(&link, &manager.connector.links.lock()[1].0));
        assert_eq!(manager.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_reconnecting_is_terminal() {
        let manager = manager(MockConnector::default());
        manager.open("ticker").await.unwrap();

        manager
            .connector
            .events(0)
            .send(LinkEvent::Error("reset".into()))
            .await
            .unwrap();
        settle().await;
        assert_eq!(manager.status().get("ticker"), Some(&ConnectionState::Reconnecting));

        assert!(manager.close("ticker"));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(manager.connector.attempts(), 1);
        assert!(manager.status().is_empty());
        assert!(!manager.close("ticker"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_pending_open() {
        let manager = manager(MockConnector::scripted([Step::AcceptAfter(Duration::from_secs(3))]));

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.open("lobby").await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        manager.close("lobby");

        let result = waiter.await.unwrap();
        assert_eq!(
            result.map(|_| ()),
            Err(Error::Connection(ConnectionError::Closed("lobby".into())))
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_errors_exhaust_and_remove() {
        let manager = Arc::new(ConnectionManager::with_config(
            MockConnector::scripted([Step::Accept, Step::Refuse]),
            ConnectionConfig::default().max_reconnect_attempts(1),
        ));
        manager.open("once").await.unwrap();

        manager
            .connector
            .events(0)
            .send(LinkEvent::Closed { code: 1011 })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(manager.connector.attempts(), 2);
        assert!(manager.connection_status("once").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_sends_while_open() {
        let manager = manager(MockConnector::default());
        let link = manager.open("ws").await.unwrap();

        assert!(manager.keep_alive("ws", Duration::from_secs(30)));
        tokio::time::sleep(Duration::from_secs(61)).await;

        {
            let sent = link.sent.lock();
            assert_eq!(sent.len(), 2);
            assert_eq!(&sent[0][..], br#"{"type":"ping"}"#);
        }

        manager
            .connector
            .events(0)
            .send(LinkEvent::Closed { code: 1000 })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(link.sent.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_stops_on_send_failure() {
        let manager = manager(MockConnector::default());
        let link = manager.open("ws").await.unwrap();

        assert!(manager.keep_alive_default("ws"));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(link.sent.lock().len(), 1);

        link.fail_send.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        link.fail_send.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(90)).await;

        assert_eq!(link.sent.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_requires_open() {
        let manager = manager(MockConnector::default());
        assert!(!manager.keep_alive("missing", Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all() {
        let manager = manager(MockConnector::default());
        let a = manager.open("a").await.unwrap();
        let b = manager.open("b").await.unwrap();

        assert_eq!(manager.close_all(), 2);
        assert!(a.closed.load(Ordering::SeqCst));
        assert!(b.closed.load(Ordering::SeqCst));
        assert!(manager.is_empty());
    }
}
