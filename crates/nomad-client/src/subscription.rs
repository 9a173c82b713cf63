//! Demand-aware subscription handles
//!
//! A [`Subscription`] is the caller's side of a blocking query or an event
//! stream. Callers register handlers per [`EventKind`]; the background worker
//! behind the subscription only observes how many handlers exist and pushes
//! events into them through the [`EventSink`] trait.
//!
//! # Lifecycle
//!
//! - Created by [`crate::NomadClient::blocking_query`] or
//!   [`crate::NomadClient::stream`] (or the resource wrappers)
//! - Network activity starts once a handler is attached
//! - Call [`Subscription::close`] for explicit teardown, or let it drop

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::stream::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::NomadClientError;

/// The kinds of events a subscription delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A snapshot (blocking query) or a single event (stream)
    Data,
    /// A failure; the subscription keeps running
    Error,
    /// Stream connection established
    Connected,
    /// Stream connection lost or aborted
    Disconnected,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Data,
        EventKind::Error,
        EventKind::Connected,
        EventKind::Disconnected,
    ];

    fn slot(self) -> usize {
        match self {
            Self::Data => 0,
            Self::Error => 1,
            Self::Connected => 2,
            Self::Disconnected => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Error => "error",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to subscription handlers
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    Data(serde_json::Value),
    Error(Arc<NomadClientError>),
    Connected,
    Disconnected,
}

impl SubscriptionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::Error(_) => EventKind::Error,
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
        }
    }

    pub fn error(err: NomadClientError) -> Self {
        Self::Error(Arc::new(err))
    }
}

/// A registered callback
pub type Handler = Arc<dyn Fn(&SubscriptionEvent) + Send + Sync>;

/// Identifies a registered handler for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Fan-out point the background workers emit into
pub trait EventSink: Send + Sync {
    /// Register a handler and return its id
    fn add_handler(&self, kind: EventKind, handler: Handler) -> HandlerId;

    /// Remove a handler; `false` if it was not registered
    fn remove_handler(&self, kind: EventKind, id: HandlerId) -> bool;

    /// Deliver an event to every handler of its kind
    fn emit(&self, event: SubscriptionEvent);

    /// Number of handlers currently attached for `kind`
    fn demand(&self, kind: EventKind) -> usize;
}

/// Which protocol a subscription runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    BlockingQuery,
    EventStream,
}

/// State shared between a [`Subscription`] and its worker
///
/// The worker only ever holds a `Weak` to this.
pub(crate) struct SubscriptionShared {
    handlers: Mutex<[Vec<(HandlerId, Handler)>; 4]>,
    counts: [AtomicUsize; 4],
    next_id: AtomicU64,
    /// Highest `Index` seen on emitted stream events
    resume_index: Option<AtomicU64>,
    active: AtomicBool,
    /// Last of "connected"/"disconnected" emitted
    connected: AtomicBool,
    cancel: CancellationToken,
}

impl SubscriptionShared {
    pub(crate) fn new(resume_from: Option<u64>) -> Self {
        Self {
            handlers: Mutex::new(Default::default()),
            counts: Default::default(),
            next_id: AtomicU64::new(1),
            resume_index: resume_from.map(AtomicU64::new),
            active: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn resume_index(&self) -> Option<u64> {
        self.resume_index
            .as_ref()
            .map(|index| index.load(Ordering::Acquire))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the worker and detach every handler; `false` if already done
    pub(crate) fn shutdown(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        self.connected.store(false, Ordering::Release);
        // Dropped outside the lock: handlers may own resources with Drop impls.
        let detached = {
            let mut handlers = self.handlers.lock();
            for count in &self.counts {
                count.store(0, Ordering::Release);
            }
            std::mem::take(&mut *handlers)
        };
        drop(detached);
        true
    }

    fn track_index(&self, event: &SubscriptionEvent) {
        if let (Some(resume), SubscriptionEvent::Data(value)) = (&self.resume_index, event) {
            if let Some(index) = value.get("Index").and_then(|v| v.as_u64()) {
                resume.fetch_max(index, Ordering::AcqRel);
            }
        }
    }
}

impl EventSink for SubscriptionShared {
    fn add_handler(&self, kind: EventKind, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // Checked under the lock: shutdown clears the flag before taking it
        let mut handlers = self.handlers.lock();
        if !self.is_active() {
            return id;
        }
        handlers[kind.slot()].push((id, handler));
        self.counts[kind.slot()].store(handlers[kind.slot()].len(), Ordering::Release);
        id
    }

    fn remove_handler(&self, kind: EventKind, id: HandlerId) -> bool {
        let removed = {
            let mut handlers = self.handlers.lock();
            let slot = &mut handlers[kind.slot()];
            let removed = slot
                .iter()
                .position(|(existing, _)| *existing == id)
                .map(|pos| slot.remove(pos));
            self.counts[kind.slot()].store(slot.len(), Ordering::Release);
            removed
        };
        removed.is_some()
    }

    fn emit(&self, event: SubscriptionEvent) {
        if !self.is_active() {
            return;
        }
        self.track_index(&event);
        match &event {
            SubscriptionEvent::Connected => self.connected.store(true, Ordering::Release),
            SubscriptionEvent::Disconnected => self.connected.store(false, Ordering::Release),
            _ => {}
        }

        // Snapshot so handlers can call back into on/off without deadlocking.
        let targets: Vec<Handler> = self.handlers.lock()[event.kind().slot()]
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in targets {
            handler(&event);
        }
    }

    fn demand(&self, kind: EventKind) -> usize {
        self.counts[kind.slot()].load(Ordering::Acquire)
    }
}

/// Caller-owned handle to a running blocking query or event stream
///
/// Dropping the handle closes it.
pub struct Subscription {
    shared: Arc<SubscriptionShared>,
    path: String,
    mode: SubscriptionMode,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<SubscriptionShared>, path: String, mode: SubscriptionMode) -> Self {
        Self { shared, path, mode }
    }

    /// Register a handler for one event kind
    ///
    /// Attaching the first "data" or "error" handler is what lets a blocking
    /// query start issuing requests.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&SubscriptionEvent) + Send + Sync + 'static,
    {
        self.shared.add_handler(kind, Arc::new(handler))
    }

    /// Register a handler for "data" payloads only
    pub fn on_data<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.on(EventKind::Data, move |event| {
            if let SubscriptionEvent::Data(value) = event {
                handler(value);
            }
        })
    }

    /// Register a handler for "error" events only
    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&NomadClientError) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let SubscriptionEvent::Error(err) = event {
                handler(err);
            }
        })
    }

    /// Remove a previously registered handler
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        self.shared.remove_handler(kind, id)
    }

    /// Number of handlers attached for `kind`
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.shared.demand(kind)
    }

    /// Stop all network activity and detach every handler
    ///
    /// Calling this more than once is a no-op.
    pub fn close(&self) {
        if self.shared.shutdown() {
            debug!("Closed {:?} subscription on {}", self.mode, self.path);
        }
    }

    /// `false` once closed, or once a stream reader tore itself down
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Resolves when the subscription stops running
    pub async fn closed(&self) {
        self.shared.cancel.cancelled().await
    }

    /// Whether the event stream connection is currently established
    ///
    /// The reader may connect before a "connected" handler is attached, so
    /// handlers registered late should check this first. Always `false` for
    /// blocking queries.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Last stream index seen; `None` for blocking queries
    pub fn resume_index(&self) -> Option<u64> {
        self.shared.resume_index()
    }

    /// Request path this subscription targets
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Receive every event kind as a `Stream`
    ///
    /// The stream registers its own handlers (and therefore counts as demand);
    /// dropping it removes them again. It ends when the subscription closes.
    pub fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let ids = EventKind::ALL
            .iter()
            .map(|&kind| {
                let tx = tx.clone();
                let id = self.on(kind, move |event| {
                    let _ = tx.send(event.clone());
                });
                (kind, id)
            })
            .collect();

        EventStream {
            rx,
            sink: Arc::downgrade(&self.shared),
            ids,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// `Stream` view over a [`Subscription`], see [`Subscription::events`]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
    sink: Weak<SubscriptionShared>,
    ids: Vec<(EventKind, HandlerId)>,
}

impl Stream for EventStream {
    type Item = SubscriptionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.upgrade() {
            for (kind, id) in self.ids.drain(..) {
                sink.remove_handler(kind, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn subscription(resume: Option<u64>) -> Subscription {
        Subscription::new(
            Arc::new(SubscriptionShared::new(resume)),
            "/v1/test".into(),
            SubscriptionMode::BlockingQuery,
        )
    }

    #[test]
    fn test_demand_counts_follow_handlers() {
        let sub = subscription(None);
        assert_eq!(sub.handler_count(EventKind::Data), 0);

        let a = sub.on_data(|_| {});
        let b = sub.on_data(|_| {});
        let e = sub.on_error(|_| {});
        assert_eq!(sub.handler_count(EventKind::Data), 2);
        assert_eq!(sub.handler_count(EventKind::Error), 1);

        assert!(sub.off(EventKind::Data, a));
        assert!(!sub.off(EventKind::Data, a));
        // Removing under the wrong kind does nothing
        assert!(!sub.off(EventKind::Error, b));
        assert!(sub.off(EventKind::Data, b));
        assert!(sub.off(EventKind::Error, e));
        assert_eq!(sub.handler_count(EventKind::Data), 0);
        assert_eq!(sub.handler_count(EventKind::Error), 0);
    }

    #[test]
    fn test_emit_reaches_only_matching_kind() {
        let sub = subscription(None);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        sub.on_data(move |v| s.lock().push(v.clone()));
        let s = seen.clone();
        sub.on(EventKind::Connected, move |_| s.lock().push(json!("connected")));

        sub.shared.emit(SubscriptionEvent::Data(json!({"a": 1})));
        sub.shared.emit(SubscriptionEvent::Disconnected);
        sub.shared.emit(SubscriptionEvent::Connected);

        assert_eq!(*seen.lock(), vec![json!({"a": 1}), json!("connected")]);
    }

    #[test]
    fn test_handler_may_detach_itself_during_emit() {
        let sub = Arc::new(subscription(None));
        let calls = Arc::new(AtomicUsize::new(0));
        let id_slot = Arc::new(Mutex::new(None));

        let (sub2, calls2, slot2) = (Arc::downgrade(&sub), calls.clone(), id_slot.clone());
        let id = sub.on_data(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
            if let (Some(sub), Some(id)) = (sub2.upgrade(), *slot2.lock()) {
                sub.off(EventKind::Data, id);
            }
        });
        *id_slot.lock() = Some(id);

        sub.shared.emit(SubscriptionEvent::Data(json!(1)));
        sub.shared.emit(SubscriptionEvent::Data(json!(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sub.handler_count(EventKind::Data), 0);
    }

    #[test]
    fn test_close_is_idempotent_and_detaches() {
        let sub = subscription(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        sub.on_data(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        sub.close();
        sub.close();
        assert!(!sub.is_active());
        assert!(sub.shared.cancel.is_cancelled());
        assert_eq!(sub.handler_count(EventKind::Data), 0);

        sub.shared.emit(SubscriptionEvent::Data(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Late registrations are ignored
        sub.on_data(|_| {});
        assert_eq!(sub.handler_count(EventKind::Data), 0);
    }

    #[test]
    fn test_resume_index_tracks_highest_event_index() {
        let sub = subscription(Some(10));
        assert_eq!(sub.resume_index(), Some(10));

        sub.shared.emit(SubscriptionEvent::Data(json!({"Index": 15})));
        sub.shared.emit(SubscriptionEvent::Data(json!({"Index": 12})));
        sub.shared.emit(SubscriptionEvent::Data(json!({"Topic": "Job"})));
        assert_eq!(sub.resume_index(), Some(15));

        assert_eq!(subscription(None).resume_index(), None);
    }

    #[tokio::test]
    async fn test_event_stream_delivers_and_detaches() {
        let sub = subscription(None);
        let mut events = sub.events();
        assert_eq!(sub.handler_count(EventKind::Data), 1);
        assert_eq!(sub.handler_count(EventKind::Disconnected), 1);

        sub.shared.emit(SubscriptionEvent::Connected);
        sub.shared.emit(SubscriptionEvent::Data(json!({"x": 1})));

        assert_eq!(events.next().await.map(|e| e.kind()), Some(EventKind::Connected));
        match events.next().await {
            Some(SubscriptionEvent::Data(v)) => assert_eq!(v, json!({"x": 1})),
            other => panic!("unexpected: {:?}", other),
        }

        drop(events);
        assert_eq!(sub.handler_count(EventKind::Data), 0);
    }

    #[test]
    fn test_connected_state_follows_events() {
        let sub = subscription(None);
        assert!(!sub.is_connected());

        // No handler attached; state is tracked anyway
        sub.shared.emit(SubscriptionEvent::Connected);
        assert!(sub.is_connected());
        sub.shared.emit(SubscriptionEvent::Disconnected);
        assert!(!sub.is_connected());

        sub.shared.emit(SubscriptionEvent::Connected);
        sub.close();
        assert!(!sub.is_connected());
    }

    #[test]
    fn test_handlers_added_during_close_are_dropped() {
        for _ in 0..200 {
            let sub = Arc::new(subscription(None));
            let adders: Vec<_> = (0..4)
                .map(|_| {
                    let sub = sub.clone();
                    std::thread::spawn(move || {
                        for _ in 0..50 {
                            sub.on_data(|_| {});
                        }
                    })
                })
                .collect();
            sub.close();
            for adder in adders {
                adder.join().unwrap();
            }
            assert_eq!(sub.handler_count(EventKind::Data), 0);
        }
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_close() {
        let sub = subscription(None);
        let mut events = sub.events();
        sub.close();
        assert!(events.next().await.is_none());
    }
}
