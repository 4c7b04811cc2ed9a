use std::path::Path;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::{debug, info};

use mrl_types::PrincipalId;

use crate::error::Result;
use crate::event::{EventKind, EventPayload, LedgerEvent, Registry};
use crate::hlc::{EventAnchor, HybridLogicalClock};
use crate::wal::{WalConfig, WalEntry, WriteAheadLog};

/// Filter for subscribing to a subset of ledger events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events from these registries are delivered.
    pub registries: Option<Vec<Registry>>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
    /// If set, only events mentioning one of these principals are delivered.
    pub principals: Option<Vec<PrincipalId>>,
    /// If set, only events stamped after this anchor are delivered.
    pub since: Option<EventAnchor>,
}

impl EventFilter {
    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if let Some(ref registries) = self.registries {
            if !registries.contains(&event.registry) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(ref principals) = self.principals {
            if !principals.iter().any(|p| event.payload.mentions(p)) {
                return false;
            }
        }
        if let Some(ref since) = self.since {
            if !event.anchor.is_after(since) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for ledger events.
pub type EventStream = broadcast::Receiver<LedgerEvent>;

/// Internal subscriber: a filter paired with a broadcast sender.
struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<LedgerEvent>,
}

/// Fan-out router that delivers events to matching subscribers.
struct EventRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, filter: EventFilter, capacity: usize) -> EventStream {
        let (tx, rx) = broadcast::channel(capacity);
        let sub = Subscriber { filter, sender: tx };
        self.subscribers
            .write()
            .expect("router lock poisoned")
            .push(sub);
        rx
    }

    /// Route an event to all matching subscribers. Subscribers whose
    /// channels are closed are pruned.
    fn route(&self, event: &LedgerEvent) {
        let mut subs = self.subscribers.write().expect("router lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                // If send fails (no receivers), the subscriber is stale.
                sub.sender.send(event.clone()).is_ok()
            } else {
                // Keep non-matching subscribers; they may match future
                // events. Only prune if the channel itself is closed.
                sub.sender.receiver_count() > 0
            }
        });
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("router lock poisoned").len()
    }
}

/// Configuration for the [`NotificationHub`].
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Node identifier for the HLC.
    pub node_id: u16,
    /// WAL configuration.
    pub wal: WalConfig,
    /// Capacity of per-subscriber broadcast channels.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            wal: WalConfig::default(),
            channel_capacity: 1024,
        }
    }
}

/// Central notification hub: crash-recoverable event bus with causal
/// ordering.
///
/// Combines a [`HybridLogicalClock`] for stamps, a [`WriteAheadLog`] for
/// at-least-once delivery across crashes, and an internal router for
/// fan-out to filtered subscribers. Emission order is preserved per
/// registry because each registry's commits are serialized before they
/// reach the hub.
pub struct NotificationHub {
    hlc: HybridLogicalClock,
    wal: WriteAheadLog,
    router: EventRouter,
    config: HubConfig,
}

impl NotificationHub {
    /// Create a new hub, opening (or creating) the WAL at the given path.
    pub fn new(wal_path: &Path, config: HubConfig) -> Result<Self> {
        let hlc = HybridLogicalClock::new(config.node_id);
        let wal = WriteAheadLog::open(wal_path, config.wal.clone())?;
        let router = EventRouter::new();

        info!(node_id = config.node_id, wal_path = %wal_path.display(), "notification hub started");

        Ok(Self {
            hlc,
            wal,
            router,
            config,
        })
    }

    /// Emit a single event through the hub.
    ///
    /// The event is stamped with the next HLC tick, persisted to the WAL
    /// (the write-ahead guarantee behind at-least-once delivery), then
    /// routed to matching subscribers.
    pub fn emit(&self, payload: EventPayload) -> Result<LedgerEvent> {
        let anchor = self.hlc.now();
        let event = LedgerEvent::new(anchor, payload);

        self.wal.append(&WalEntry {
            event: event.clone(),
        })?;
        self.router.route(&event);

        debug!(id = %event.id, kind = %event.kind, "event emitted");
        Ok(event)
    }

    /// Subscribe to events matching the given filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.router.subscribe(filter, self.config.channel_capacity)
    }

    /// Recover all events from the WAL.
    ///
    /// Used after a crash (or on every open) to replay events that were
    /// committed but possibly not fully delivered. Consumers dedupe by
    /// event id.
    pub fn recover(&self) -> Result<Vec<LedgerEvent>> {
        let entries = self.wal.recover()?;
        let events: Vec<LedgerEvent> = entries.into_iter().map(|e| e.event).collect();
        info!(count = events.len(), "recovered events from WAL");
        Ok(events)
    }

    /// Checkpoint the WAL, marking all current data as committed.
    pub fn checkpoint(&self) -> Result<()> {
        let offset = self.wal.offset();
        if offset > 0 {
            self.wal.checkpoint(offset)?;
        }
        Ok(())
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }

    /// Reference to the underlying HLC.
    pub fn hlc(&self) -> &HybridLogicalClock {
        &self.hlc
    }
}
