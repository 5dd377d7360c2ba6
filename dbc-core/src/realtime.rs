//! Realtime event connection.
//!
//! [`ConnectionManager`] owns one connection through an injectable
//! [`Transport`]. Listeners can be registered before the connection exists; they
//! start receiving events once it is up and stay registered until their
//! [`Subscription`] is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const DEFAULT_URL: &str = "http://localhost:5000";

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub url: String,
    pub token: String,
}

impl RealtimeConfig {
    /// A trailing `/api` on the URL is dropped; events live at the server root.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.trim_end_matches('/');
        let url = url.strip_suffix("/api").unwrap_or(url);
        Self {
            url: if url.is_empty() { DEFAULT_URL.to_string() } else { url.to_string() },
            token: token.into(),
        }
    }
}

/// One event received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub event: String,
    pub payload: Value,
}

/// Wire connection used by the manager.
///
/// An implementation opens one session to `config.url`, authenticating with
/// `config.token`, and forwards every server event into the returned channel.
/// The channel closes when the session ends. `emit` sends an event on the open
/// session, and `disconnect` closes it so no further events are delivered.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the connection; incoming events arrive on the returned channel
    /// until it closes.
    async fn connect(&self, config: &RealtimeConfig) -> Result<mpsc::Receiver<RealtimeMessage>>;

    async fn emit(&self, event: &str, payload: Value) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, Vec<(u64, Listener)>>,
    next_id: u64,
}

impl Registry {
    fn listeners_for(&self, event: &str) -> Vec<Listener> {
        self.listeners
            .get(event)
            .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    fn remove(&mut self, event: &str, id: u64) {
        if let Some(ls) = self.listeners.get_mut(event) {
            ls.retain(|(lid, _)| *lid != id);
            if ls.is_empty() {
                self.listeners.remove(event);
            }
        }
    }
}

/// Handle for a registered listener; dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    event: String,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.lock() {
                registry.remove(&self.event, self.id);
            }
        }
    }
}

pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    registry: Arc<Mutex<Registry>>,
    pump: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            registry: Arc::new(Mutex::new(Registry::default())),
            pump: tokio::sync::Mutex::new(None),
        }
    }

    /// Connect unless already connected.
    pub async fn connect(&self, config: &RealtimeConfig) -> Result<()> {
        let mut pump = self.pump.lock().await;
        if pump.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Realtime connection already open");
            return Ok(());
        }

        let mut messages = self.transport.connect(config).await?;
        info!(url = %config.url, "Realtime connection opened");

        let registry = Arc::downgrade(&self.registry);
        *pump = Some(tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                let Some(registry) = registry.upgrade() else { break };
                let listeners = match registry.lock() {
                    Ok(registry) => registry.listeners_for(&message.event),
                    Err(_) => break,
                };
                for listener in listeners {
                    listener(&message.payload);
                }
            }
            debug!("Realtime event stream ended");
        }));
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        let Some(handle) = self.pump.lock().await.take() else {
            return Ok(());
        };
        handle.abort();
        self.transport.disconnect().await?;
        info!("Realtime connection closed");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.pump
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Register `listener` for `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> Result<Subscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = event.into();
        let mut registry = self.registry.lock().map_err(|_| Error::LockPoisoned)?;
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(event.clone())
            .or_default()
            .push((id, Arc::new(listener)));

        Ok(Subscription {
            id,
            event,
            registry: Arc::downgrade(&self.registry),
        })
    }

    pub async fn emit(&self, event: &str, payload: Value) -> Result<()> {
        if !self.is_connected().await {
            warn!(event, "Dropping realtime emit while disconnected");
            return Err(Error::Transport("not connected".into()));
        }
        self.transport.emit(event, payload).await
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .map(|r| r.listeners.get(event).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockTransport {
        sender: Mutex<Option<mpsc::Sender<RealtimeMessage>>>,
        connects: AtomicUsize,
        emitted: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Transport for Arc<MockTransport> {
        async fn connect(&self, _config: &RealtimeConfig) -> Result<mpsc::Receiver<RealtimeMessage>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(16);
            *self.sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn emit(&self, event: &str, payload: Value) -> Result<()> {
            self.emitted.lock().unwrap().push((event.to_string(), payload));
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            self.sender.lock().unwrap().take();
            Ok(())
        }
    }

    impl MockTransport {
        async fn push(&self, event: &str, payload: Value) {
            let sender = self.sender.lock().unwrap().clone().unwrap();
            sender
                .send(RealtimeMessage {
                    event: event.into(),
                    payload,
                })
                .await
                .unwrap();
        }
    }

    fn config() -> RealtimeConfig {
        RealtimeConfig::new("http://localhost:5000/api", "token")
    }

    #[test]
    fn test_config_strips_api_suffix() {
        assert_eq!(config().url, "http://localhost:5000");
        assert_eq!(RealtimeConfig::new("https://console.example/api/", "t").url, "https://console.example");
        assert_eq!(RealtimeConfig::new("", "t").url, DEFAULT_URL);
    }

    #[tokio::test]
    async fn test_listeners_registered_before_connect_receive_events() {
        let transport = Arc::new(MockTransport::default());
        let manager = ConnectionManager::new(transport.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = manager
            .on("notification", move |payload| {
                let _ = tx.send(payload.clone());
            })
            .unwrap();

        manager.connect(&config()).await.unwrap();
        transport.push("notification", json!({"id": 1})).await;
        transport.push("other", json!({"id": 2})).await;

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(received, Some(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_connect_twice_is_noop() {
        let transport = Arc::new(MockTransport::default());
        let manager = ConnectionManager::new(transport.clone());
        manager.connect(&config()).await.unwrap();
        manager.connect(&config()).await.unwrap();
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
        assert!(manager.is_connected().await);

        manager.disconnect().await.unwrap();
        assert!(!manager.is_connected().await);
        manager.disconnect().await.unwrap();

        manager.connect(&config()).await.unwrap();
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unregisters() {
        let manager = ConnectionManager::new(Arc::new(MockTransport::default()));
        let first = manager.on("query_result", |_| {}).unwrap();
        let second = manager.on("query_result", |_| {}).unwrap();
        assert_eq!(manager.listener_count("query_result"), 2);

        drop(first);
        assert_eq!(manager.listener_count("query_result"), 1);
        second.unsubscribe();
        assert_eq!(manager.listener_count("query_result"), 0);
    }

    #[tokio::test]
    async fn test_emit_requires_connection() {
        let transport = Arc::new(MockTransport::default());
        let manager = ConnectionManager::new(transport.clone());
        let err = manager.emit("ping", json!(null)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        manager.connect(&config()).await.unwrap();
        manager.emit("ping", json!({"n": 1})).await.unwrap();
        assert_eq!(transport.emitted.lock().unwrap().len(), 1);
    }
}
