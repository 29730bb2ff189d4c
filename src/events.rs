//! Internal event bus between popup fragments and the session controller.
//!
//! Fragments never call the controller. Each interactive control holds an
//! [`EventSender`] and raises exactly one [`PickerEvent`]; the controller
//! drains the matching [`EventReceiver`].
//!
//! `emit()` never blocks and never fails. Row toggles and Apply/Cancel are
//! always queued; navigation requests are dropped once the backlog reaches
//! the bus capacity, since a pending fetch makes them redundant. A
//! disconnected bus drops everything and bumps a counter. Dropping the
//! receiver is how a session detaches every listener at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::query::SearchFilters;

/// Which way a pagination control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Prev,
    Next,
}

/// The closed vocabulary fragments use to signal intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    /// Follow a server-supplied prev/next link verbatim.
    PageRequested { direction: PageDirection, uri: String },
    /// Search form submitted; an empty map is a reset.
    SearchSubmitted { filters: SearchFilters },
    /// A table row was clicked.
    RowToggled { key: String },
    /// Apply or Cancel on the accumulator bar.
    SelectionFinalized { value: String },
}

impl PickerEvent {
    /// Events that start a fetch.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            PickerEvent::PageRequested { .. } | PickerEvent::SearchSubmitted { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PickerEvent::PageRequested {
                direction: PageDirection::Prev,
                ..
            } => "prevPage",
            PickerEvent::PageRequested {
                direction: PageDirection::Next,
                ..
            } => "nextPage",
            PickerEvent::SearchSubmitted { .. } => "search",
            PickerEvent::RowToggled { .. } => "selection",
            PickerEvent::SelectionFinalized { .. } => "valueSelected",
        }
    }
}

/// An event plus the render generation of the fragment that raised it.
///
/// Pagination controls stamp the generation they were rendered for, so a
/// second click on a "next" that has already been followed is recognisably
/// stale. Other controls leave it unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub event: PickerEvent,
    pub view: Option<u64>,
}

/// Create a bus whose navigation backlog is capped at `capacity`.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (sender, receiver) = unbounded();
    let stats = Arc::new(BusCounters::default());
    (
        EventSender {
            sender,
            navigation_capacity: capacity.max(1),
            stats: Arc::clone(&stats),
        },
        EventReceiver { receiver, stats },
    )
}

#[derive(Debug, Default)]
struct BusCounters {
    emitted: AtomicU64,
    dropped: AtomicU64,
}

/// Sending half, cloned into every control.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<BusMessage>,
    navigation_capacity: usize,
    stats: Arc<BusCounters>,
}

impl EventSender {
    /// Emit an event - NEVER BLOCKS, NEVER FAILS.
    ///
    /// Returns whether the event reached the bus.
    pub fn emit(&self, event: PickerEvent) -> bool {
        self.send(BusMessage { event, view: None })
    }

    pub(crate) fn emit_for_view(&self, event: PickerEvent, view: u64) -> bool {
        self.send(BusMessage {
            event,
            view: Some(view),
        })
    }

    fn send(&self, message: BusMessage) -> bool {
        let backlogged =
            message.event.is_navigation() && self.sender.len() >= self.navigation_capacity;
        if !backlogged && self.sender.send(message).is_ok() {
            self.stats.emitted.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }
}

/// Receiving half, owned by the session controller.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: Receiver<BusMessage>,
    stats: Arc<BusCounters>,
}

impl EventReceiver {
    /// Returns `None` if the bus is empty.
    pub fn try_recv(&self) -> Option<BusMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }
}

impl BusCounters {
    fn snapshot(&self) -> BusStats {
        BusStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Bus statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events that reached the bus
    pub emitted: u64,
    /// Events dropped (navigation backlog full or session detached)
    pub dropped: u64,
}

// ============================================================================
// NAVIGATION GATE
// ============================================================================

/// Shared "fetch in flight" flag.
///
/// Pagination and search controls check it before emitting, which is how
/// they are disabled while the controller waits on the network.
#[derive(Debug, Clone, Default)]
pub struct NavigationGate {
    busy: Arc<AtomicBool>,
}

impl NavigationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }

    /// Close the gate until the returned guard is dropped.
    pub fn hold(&self) -> GateGuard {
        self.busy.store(true, Ordering::Release);
        GateGuard {
            busy: Arc::clone(&self.busy),
        }
    }
}

/// Reopens the gate on drop.
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
