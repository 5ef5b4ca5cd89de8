//! The live update client: connection lifecycle, session loop, resync.
//!
//! One client owns one logical server endpoint. All registry mutation
//! happens on the single session task as it processes inbound frames, so a
//! `read()` anywhere is always consistent with the last fully-processed
//! message. Outbound requests are fire-and-forget through an unbounded
//! command channel; the client never blocks waiting for a server reply.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use liveupdate_core::close_reason;
use liveupdate_core::wire::{ClientFrame, ServerFrame, SetValue, SubscriptionEntry};
use liveupdate_core::PropertyKey;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::config::ClientConfig;
use crate::connection::{ConnectionState, ConnectionStatus};
use crate::errors::TransportError;
use crate::registry::{subscribe_frame, RegistryState};
use crate::transport::{ChannelEvent, ChannelRx, ChannelTx, Connector, WsConnector};

/// Diagnostic snapshot of the client's current state.
#[derive(Debug, Clone)]
pub struct DebugInfo {
    /// Connection status and diagnostic text.
    pub status: ConnectionStatus,
    /// Most recent subscription snapshot.
    pub subscriptions: Vec<SubscriptionEntry>,
    /// Cached values by canonical key.
    pub values: HashMap<String, Value>,
    /// Most recent server error text, if any.
    pub last_error: Option<String>,
}

/// State shared between the client handle, its bindings, and the session
/// task. Registry mutation is exclusive to the session task; bindings only
/// read.
pub(crate) struct ClientShared {
    status_tx: watch::Sender<ConnectionStatus>,
    registry: RwLock<RegistryState>,
    sender: RwLock<Option<mpsc::UnboundedSender<ClientFrame>>>,
    /// Bumped on every reconnect so a stale session task cannot clobber the
    /// status of its successor.
    epoch: AtomicU64,
}

impl ClientShared {
    pub(crate) fn new() -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::disconnected());
        Self {
            status_tx,
            registry: RwLock::new(RegistryState::new()),
            sender: RwLock::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.registry.read()
    }

    fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    fn publish(&self, state: ConnectionState, detail: String) {
        let _ = self.status_tx.send_replace(ConnectionStatus { state, detail });
    }

    /// Enqueue a frame for the session task.
    ///
    /// Contract: sending is only valid while the connection is open. Frames
    /// enqueued in any other state are dropped with a debug log — never
    /// queued for later.
    fn send_frame(&self, frame: ClientFrame) {
        if self.status_tx.borrow().state != ConnectionState::Open {
            debug!("dropping outbound frame: connection not open");
            return;
        }
        if let Some(tx) = self.sender.read().as_ref() {
            let _ = tx.send(frame);
        }
    }

    pub(crate) fn send_subscribe(&self, object_path: &str, property_paths: &[String]) {
        self.send_frame(subscribe_frame(object_path, property_paths));
    }

    pub(crate) fn send_unsubscribe(&self, keys: &[String]) {
        let frame = self.registry.read().unsubscribe_frame(keys);
        if let Some(frame) = frame {
            self.send_frame(frame);
        }
    }

    pub(crate) fn set_value(&self, id: u64, value: Value) {
        self.send_frame(ClientFrame::Set(vec![SetValue { id, value }]));
    }

    /// Apply one inbound text frame. Malformed frames are logged and
    /// dropped; they are not fatal to the connection.
    fn handle_message(&self, text: &str) {
        match ServerFrame::parse(text) {
            Ok(frame) => self.registry.write().apply(frame),
            Err(e) => warn!(error = %e, "dropping malformed live update frame"),
        }
    }

    /// Update diagnostic text without changing state. Channel errors carry
    /// no structured information; the subsequent close is authoritative.
    fn note_channel_error(&self, epoch: u64, detail: String) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        let state = self.status_tx.borrow().state;
        self.publish(state, detail);
    }

    /// Transition to Closed on behalf of the session task for `epoch`.
    fn close_session(&self, epoch: u64, code: Option<u16>) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        *self.sender.write() = None;
        let detail = match code {
            Some(code) => close_reason(code),
            None => {
                let prior = self.status_tx.borrow().detail.clone();
                if prior.is_empty() {
                    "Connection closed".to_string()
                } else {
                    prior
                }
            }
        };
        info!(detail = %detail, "live update connection closed");
        self.publish(ConnectionState::Closed, detail);
    }
}

/// Client-side live-property subscription manager.
///
/// Starts disconnected; [`reconnect`](Self::reconnect) establishes the
/// channel (and re-establishes all known subscriptions after a drop).
/// Reconnection is always caller- or upstream-triggered — there is no
/// retry timer.
pub struct LiveUpdateClient {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<ClientShared>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl LiveUpdateClient {
    /// Client over the standard WebSocket transport.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let connector = Arc::new(WsConnector::new(config.url()));
        Self::with_connector(config, connector)
    }

    /// Client over a caller-supplied channel implementation.
    #[must_use]
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            shared: Arc::new(ClientShared::new()),
            session: Mutex::new(None),
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open (or re-open) the channel.
    ///
    /// Any live session is torn down first, whether or not the new dial
    /// succeeds; a reconnect always supersedes the current channel.
    ///
    /// On success every key of the last-known snapshot is resubscribed,
    /// grouped by object path, *before* the status flips to Open — so no
    /// consumer ever observes an open connection without its subscriptions
    /// in flight. The server treats resubscribes exactly like fresh
    /// subscribes and allocates fresh ids.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the channel could not be opened;
    /// the status is left Closed with the error as diagnostic text.
    pub async fn reconnect(&self) -> Result<(), TransportError> {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        // Tear the current session down before dialing: a failed dial must
        // not leave the old task applying pushes behind a Closed status.
        *self.shared.sender.write() = None;
        if let Some(old) = self.session.lock().take() {
            old.abort();
        }
        self.shared.publish(ConnectionState::Connecting, String::new());

        let (tx, rx) = match self.connector.connect().await {
            Ok(halves) => halves,
            Err(e) => {
                self.shared.publish(ConnectionState::Closed, e.to_string());
                return Err(e);
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let resync = self.shared.registry.read().resync_frames();
        if !resync.is_empty() {
            info!(requests = resync.len(), "resubscribing after reconnect");
        }
        for frame in resync {
            let _ = cmd_tx.send(frame);
        }
        *self.shared.sender.write() = Some(cmd_tx);
        self.shared.publish(ConnectionState::Open, String::new());

        let handle = tokio::spawn(run_session(self.shared.clone(), epoch, tx, rx, cmd_rx));
        *self.session.lock() = Some(handle);
        Ok(())
    }

    /// Subscribe to a batch of properties of one object.
    ///
    /// `bindings` maps caller-facing names to property paths; all paths are
    /// batched into a single subscribe request for the object. Every call
    /// re-issues the request — even for keys another binding already holds.
    /// The server reference-counts duplicate interest and responds
    /// idempotently, so client-side deduplication would be incorrect.
    #[must_use]
    pub fn subscribe(&self, object_path: &str, bindings: &[(&str, &str)]) -> Vec<Binding> {
        let properties: Vec<String> = bindings.iter().map(|(_, p)| (*p).to_string()).collect();
        self.shared.send_subscribe(object_path, &properties);

        bindings
            .iter()
            .map(|(name, property_path)| {
                Binding::new(
                    (*name).to_string(),
                    PropertyKey::new(object_path, *property_path),
                    self.shared.clone(),
                )
            })
            .collect()
    }

    /// Subscribe with derived binding names.
    ///
    /// Names are the property paths with a leading `object.` stripped and
    /// dots replaced by underscores, e.g. `object.offset` → `offset`.
    #[must_use]
    pub fn auto_subscribe(&self, object_path: &str, property_paths: &[&str]) -> Vec<Binding> {
        let named: Vec<(String, &str)> = property_paths
            .iter()
            .map(|path| (derive_binding_name(path), *path))
            .collect();
        let pairs: Vec<(&str, &str)> = named
            .iter()
            .map(|(name, path)| (name.as_str(), *path))
            .collect();
        self.subscribe(object_path, &pairs)
    }

    /// Write a batch of values in one request. Fire-and-forget.
    pub fn set_values(&self, values: Vec<SetValue>) {
        if values.is_empty() {
            return;
        }
        self.shared.send_frame(ClientFrame::Set(values));
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Watch receiver for status changes (for overlay-style consumers).
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Snapshot of subscriptions, cached values, and the last server error.
    #[must_use]
    pub fn debug_info(&self) -> DebugInfo {
        let registry = self.shared.registry.read();
        DebugInfo {
            status: self.shared.status(),
            subscriptions: registry.entries().to_vec(),
            values: registry.values(),
            last_error: registry.last_error().map(String::from),
        }
    }
}

impl Drop for LiveUpdateClient {
    fn drop(&mut self) {
        if let Some(handle) = self.session.lock().take() {
            handle.abort();
        }
    }
}

/// Derive a binding name from a property path.
fn derive_binding_name(property_path: &str) -> String {
    let trimmed = property_path
        .strip_prefix("object.")
        .unwrap_or(property_path);
    trimmed.replace('.', "_")
}

/// Session loop: single task owning the channel halves.
///
/// Inbound frames are fully applied to the registry before the next await
/// point; outbound frames come from the command channel. The loop ends when
/// the channel closes or the command channel is dropped.
async fn run_session(
    shared: Arc<ClientShared>,
    epoch: u64,
    mut tx: Box<dyn ChannelTx>,
    mut rx: Box<dyn ChannelRx>,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientFrame>,
) {
    loop {
        tokio::select! {
            frame = cmd_rx.recv() => {
                let Some(frame) = frame else { break };
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode outbound frame");
                        continue;
                    }
                };
                debug!(frame = %text, "sending");
                if let Err(e) = tx.send(text).await {
                    shared.note_channel_error(epoch, e.to_string());
                    shared.close_session(epoch, None);
                    return;
                }
            }
            event = rx.recv() => {
                match event {
                    Some(ChannelEvent::Message(text)) => shared.handle_message(&text),
                    Some(ChannelEvent::Error(detail)) => {
                        warn!(detail = %detail, "channel error");
                        shared.note_channel_error(epoch, detail);
                    }
                    Some(ChannelEvent::Closed { code }) => {
                        shared.close_session(epoch, code);
                        return;
                    }
                    None => {
                        shared.close_session(epoch, None);
                        return;
                    }
                }
            }
        }
    }
    shared.close_session(epoch, None);
}
