//! In-memory mock live update server for integration tests.
//!
//! Implements the server side of the protocol over plain channels: global
//! id allocation starting at 0, per-connection reference-counted
//! subscription tables, full snapshots after every subscribe/unsubscribe,
//! initial value batches after each snapshot, and error frames for unknown
//! property paths. Value pushes carry the raw (possibly partial) value so
//! the client's patching is exercised on the wire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use liveupdate_client::{ChannelEvent, ChannelRx, ChannelTx, Connector, TransportError};
use liveupdate_core::wire::{ClientFrame, ServerFrame, SubscriptionEntry, ValueChange};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "timed out waiting until: {description}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

struct ServerSub {
    id: u64,
    count: u64,
    object: String,
    property: String,
}

struct ConnState {
    to_client: mpsc::UnboundedSender<ChannelEvent>,
    subs: Mutex<HashMap<String, ServerSub>>,
}

impl ConnState {
    fn send(&self, frame: &ServerFrame) {
        let text = serde_json::to_string(frame).unwrap();
        let _ = self.to_client.send(ChannelEvent::Message(text));
    }

    fn snapshot(&self) -> Vec<SubscriptionEntry> {
        let mut entries: Vec<SubscriptionEntry> = self
            .subs
            .lock()
            .values()
            .map(|sub| SubscriptionEntry {
                id: sub.id,
                object_path: sub.object.clone(),
                property_path: sub.property.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

struct ServerInner {
    objects: Mutex<HashMap<String, HashMap<String, Value>>>,
    next_id: AtomicU64,
    conns: Mutex<Vec<Arc<ConnState>>>,
    received: Mutex<Vec<ClientFrame>>,
}

impl ServerInner {
    fn handle_frame(&self, conn: &Arc<ConnState>, text: &str) {
        let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
            panic!("mock server received malformed frame: {text}");
        };
        self.received.lock().push(frame.clone());

        match frame {
            ClientFrame::Subscribe { object, properties } => {
                for property in &properties {
                    let known = self
                        .objects
                        .lock()
                        .get(&object)
                        .is_some_and(|props| props.contains_key(property));
                    if !known {
                        conn.send(&ServerFrame::Error(format!(
                            "propertyPath '{property}' not found"
                        )));
                        continue;
                    }
                    let mut subs = conn.subs.lock();
                    let sub = subs
                        .entry(format!("{object}/{property}"))
                        .or_insert_with(|| ServerSub {
                            id: self.next_id.fetch_add(1, Ordering::SeqCst),
                            count: 0,
                            object: object.clone(),
                            property: property.clone(),
                        });
                    sub.count += 1;
                }
                conn.send(&ServerFrame::Subscriptions(conn.snapshot()));

                // Initial values, only for successful subscriptions.
                let changes: Vec<ValueChange> = {
                    let subs = conn.subs.lock();
                    let objects = self.objects.lock();
                    properties
                        .iter()
                        .filter_map(|property| {
                            let sub = subs.get(&format!("{object}/{property}"))?;
                            let value = objects.get(&object)?.get(property)?.clone();
                            Some(ValueChange { id: sub.id, value })
                        })
                        .collect()
                };
                if !changes.is_empty() {
                    conn.send(&ServerFrame::ValuesChanged(changes));
                }
            }
            ClientFrame::Unsubscribe { ids } => {
                {
                    let mut subs = conn.subs.lock();
                    for id in ids {
                        let Some(key) = subs
                            .iter()
                            .find(|(_, sub)| sub.id == id)
                            .map(|(key, _)| key.clone())
                        else {
                            continue;
                        };
                        let empty = {
                            let sub = subs.get_mut(&key).unwrap();
                            sub.count -= 1;
                            sub.count == 0
                        };
                        if empty {
                            let _ = subs.remove(&key);
                        }
                    }
                }
                conn.send(&ServerFrame::Subscriptions(conn.snapshot()));
            }
            ClientFrame::Set(values) => {
                for set in values {
                    let target = conn
                        .subs
                        .lock()
                        .values()
                        .find(|sub| sub.id == set.id)
                        .map(|sub| (sub.object.clone(), sub.property.clone()));
                    if let Some((object, property)) = target {
                        self.simulate_change(&object, &property, set.value);
                    }
                }
            }
        }
    }

    fn simulate_change(&self, object: &str, property: &str, value: Value) {
        // Merge into the store one level deep (partial sets accumulate) but
        // push the raw value so the client does its own patching.
        {
            let mut objects = self.objects.lock();
            let slot = objects
                .entry(object.to_string())
                .or_default()
                .entry(property.to_string())
                .or_insert(Value::Null);
            *slot = match (slot.clone(), value.clone()) {
                (Value::Object(mut prior), Value::Object(patch)) => {
                    for (field, v) in patch {
                        let _ = prior.insert(field, v);
                    }
                    Value::Object(prior)
                }
                _ => value.clone(),
            };
        }
        let key = format!("{object}/{property}");
        for conn in self.conns.lock().iter() {
            let id = conn.subs.lock().get(&key).map(|sub| sub.id);
            if let Some(id) = id {
                conn.send(&ServerFrame::ValuesChanged(vec![ValueChange {
                    id,
                    value: value.clone(),
                }]));
            }
        }
    }

    fn remove_conn(&self, conn: &Arc<ConnState>) {
        self.conns.lock().retain(|c| !Arc::ptr_eq(c, conn));
    }
}

/// Handle for driving the mock server from a test.
pub struct MockLiveServer {
    inner: Arc<ServerInner>,
}

impl MockLiveServer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServerInner {
                objects: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                conns: Mutex::new(Vec::new()),
                received: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Seed a property value into the server's object store.
    pub fn seed(&self, object: &str, property: &str, value: Value) {
        let _ = self
            .inner
            .objects
            .lock()
            .entry(object.to_string())
            .or_default()
            .insert(property.to_string(), value);
    }

    pub fn connector(&self) -> Arc<MockConnector> {
        Arc::new(MockConnector {
            inner: self.inner.clone(),
        })
    }

    /// Push a value change as the server would, with a raw partial value.
    pub fn simulate_change(&self, object: &str, property: &str, value: Value) {
        self.inner.simulate_change(object, property, value);
    }

    /// Close every live connection with the given close code.
    pub fn drop_connections(&self, code: u16) {
        for conn in self.inner.conns.lock().drain(..) {
            let _ = conn.to_client.send(ChannelEvent::Closed { code: Some(code) });
        }
    }

    /// Inject a raw text frame into every live connection.
    pub fn send_raw(&self, text: &str) {
        for conn in self.inner.conns.lock().iter() {
            let _ = conn
                .to_client
                .send(ChannelEvent::Message(text.to_string()));
        }
    }

    /// Number of live connections.
    pub fn connections(&self) -> usize {
        self.inner.conns.lock().len()
    }

    /// Subscription snapshot of the most recent connection.
    pub fn entries(&self) -> Vec<SubscriptionEntry> {
        self.inner
            .conns
            .lock()
            .last()
            .map(|conn| conn.snapshot())
            .unwrap_or_default()
    }

    /// Server-side reference count for a key on the most recent connection.
    pub fn refcount(&self, object: &str, property: &str) -> u64 {
        self.inner
            .conns
            .lock()
            .last()
            .and_then(|conn| {
                conn.subs
                    .lock()
                    .get(&format!("{object}/{property}"))
                    .map(|sub| sub.count)
            })
            .unwrap_or(0)
    }

    /// All client frames received so far.
    pub fn received(&self) -> Vec<ClientFrame> {
        self.inner.received.lock().clone()
    }

    pub fn clear_received(&self) {
        self.inner.received.lock().clear();
    }
}

/// Connector handing out in-memory channels to the mock server.
pub struct MockConnector {
    inner: Arc<ServerInner>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<(Box<dyn ChannelTx>, Box<dyn ChannelRx>), TransportError> {
        let (to_server_tx, mut to_server_rx) = mpsc::unbounded_channel::<String>();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel::<ChannelEvent>();
        let conn = Arc::new(ConnState {
            to_client: to_client_tx,
            subs: Mutex::new(HashMap::new()),
        });
        self.inner.conns.lock().push(conn.clone());

        let inner = self.inner.clone();
        let task_conn = conn.clone();
        drop(tokio::spawn(async move {
            while let Some(text) = to_server_rx.recv().await {
                inner.handle_frame(&task_conn, &text);
            }
            inner.remove_conn(&task_conn);
        }));

        Ok((
            Box::new(MockTx { tx: to_server_tx }),
            Box::new(MockRx { rx: to_client_rx }),
        ))
    }
}

struct MockTx {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl ChannelTx for MockTx {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.tx.send(text).map_err(|_| TransportError::Send {
            context: "mock server hung up".into(),
        })
    }
}

struct MockRx {
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

#[async_trait]
impl ChannelRx for MockRx {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}
