use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hybrid Logical Clock stamp carried by every notification.
///
/// Combines a physical wall-clock component with a logical counter and a
/// node identifier. Stamps from one hub are strictly monotonic, which is
/// what gives subscribers in-order delivery within a registry.
///
/// Ordering: `physical_ms` → `logical` → `node_id` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventAnchor {
    /// Wall-clock milliseconds since the UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events within the same physical millisecond.
    pub logical: u32,
    /// Node identifier to break ties between nodes.
    pub node_id: u16,
}

impl EventAnchor {
    /// Create an anchor with explicit values.
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// The zero anchor.
    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
            node_id: 0,
        }
    }

    /// Returns `true` if this anchor is causally after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl PartialOrd for EventAnchor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventAnchor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for EventAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventAnchor({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for EventAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.n{}", self.physical_ms, self.logical, self.node_id)
    }
}

/// Internal mutable state of the Hybrid Logical Clock.
struct HlcState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid Logical Clock producing monotonically increasing [`EventAnchor`]
/// values. Safe for concurrent use across threads via an internal [`Mutex`].
///
/// Local event rule: `physical = max(wall_clock, state.physical)`; if the
/// physical component advanced, `logical = 0`, otherwise `logical += 1`.
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<HlcState>,
}

impl HybridLogicalClock {
    /// Create a new HLC for the given node.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(HlcState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    /// Generate a new stamp, strictly greater than any previously returned
    /// value from this clock.
    pub fn now(&self) -> EventAnchor {
        let wall = Self::wall_clock_ms();
        let mut state = self.state.lock().expect("HLC mutex poisoned");

        let new_physical = wall.max(state.physical_ms);
        let new_logical = if new_physical > state.physical_ms {
            0
        } else {
            state.logical + 1
        };

        state.physical_ms = new_physical;
        state.logical = new_logical;

        EventAnchor::new(new_physical, new_logical, self.node_id)
    }

    /// The node identifier this clock was created with.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
