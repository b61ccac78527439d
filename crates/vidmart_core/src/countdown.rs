//! crates/vidmart_core/src/countdown.rs
//!
//! The amend window of a freshly placed order.
//!
//! An order can be topped up for 60 seconds after it is placed. The customer
//! may pause the countdown ("add more items"), which snapshots the remaining
//! seconds and marks the order as the single active order that the next
//! checkout will merge into. Observing the countdown again resumes it from the
//! snapshot. Once it runs out the order can only be tracked.
//!
//! The snapshots and the active-order slot live in [`SessionFlags`], a plain
//! key-value map. Nothing here can fail; unreadable flag values are treated as
//! if they were never written.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// How long an order stays amendable, in seconds.
pub const ORDER_WINDOW_SECS: i64 = 60;

const ACTIVE_ORDER_KEY: &str = "active_order_id";
const PAUSE_KEY_PREFIX: &str = "order_pause_";

//=========================================================================================
// Session flags
//=========================================================================================

/// The stored form of a paused countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSnapshot {
    pub paused_time: u32,
    pub order_id: Uuid,
}

/// Per-user key-value flags: one pause snapshot per order plus the single
/// active-order slot. Writes to the slot are last-writer-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFlags {
    entries: BTreeMap<String, String>,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no active order and no pause snapshot is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The order currently paused for amendment, if any.
    pub fn active_order(&self) -> Option<Uuid> {
        let raw = self.entries.get(ACTIVE_ORDER_KEY)?;
        match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(value = %raw, "ignoring malformed active order flag");
                None
            }
        }
    }

    pub fn set_active_order(&mut self, order_id: Uuid) {
        self.entries
            .insert(ACTIVE_ORDER_KEY.to_string(), order_id.to_string());
    }

    pub fn clear_active_order(&mut self) {
        self.entries.remove(ACTIVE_ORDER_KEY);
    }

    /// Clears the active slot only if it points at `order_id`.
    pub fn clear_active_order_if(&mut self, order_id: Uuid) {
        if self.active_order() == Some(order_id) {
            self.clear_active_order();
        }
    }

    pub fn pause_snapshot(&self, order_id: Uuid) -> Option<PauseSnapshot> {
        let raw = self.entries.get(&pause_key(order_id))?;
        match serde_json::from_str::<PauseSnapshot>(raw) {
            Ok(snapshot) if snapshot.order_id == order_id && snapshot.paused_time > 0 => {
                Some(snapshot)
            }
            Ok(_) => {
                warn!(%order_id, "ignoring pause snapshot that does not match its order");
                None
            }
            Err(e) => {
                warn!(%order_id, error = %e, "ignoring malformed pause snapshot");
                None
            }
        }
    }

    pub fn store_pause_snapshot(&mut self, snapshot: PauseSnapshot) {
        // Serialising two plain fields cannot fail.
        if let Ok(raw) = serde_json::to_string(&snapshot) {
            self.entries.insert(pause_key(snapshot.order_id), raw);
        }
    }

    pub fn remove_pause_snapshot(&mut self, order_id: Uuid) {
        self.entries.remove(&pause_key(order_id));
    }

    /// Writes a raw value, e.g. one restored from client storage.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

fn pause_key(order_id: Uuid) -> String {
    format!("{PAUSE_KEY_PREFIX}{order_id}")
}

//=========================================================================================
// Countdown state machine
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Running { remaining_secs: u32 },
    Paused { snapshot_secs: u32 },
    Expired,
}

impl CountdownPhase {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    pub fn remaining_secs(&self) -> Option<u32> {
        match *self {
            Self::Running { remaining_secs } => Some(remaining_secs),
            Self::Paused { snapshot_secs } => Some(snapshot_secs),
            Self::Expired => None,
        }
    }
}

/// Whole seconds left in the window, or `None` once it has closed.
fn remaining_from(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<u32> {
    let elapsed = now - created_at;
    let remaining_ms = (Duration::seconds(ORDER_WINDOW_SECS) - elapsed).num_milliseconds();
    let secs = remaining_ms.div_euclid(1000);
    u32::try_from(secs).ok().filter(|s| *s > 0)
}

/// Computes the phase without touching the flags. A stored snapshot reads as
/// `Paused`; otherwise the phase follows from the wall clock.
pub fn inspect(
    order_id: Uuid,
    created_at: DateTime<Utc>,
    flags: &SessionFlags,
    now: DateTime<Utc>,
) -> CountdownPhase {
    if let Some(snapshot) = flags.pause_snapshot(order_id) {
        return CountdownPhase::Paused {
            snapshot_secs: snapshot.paused_time,
        };
    }
    match remaining_from(created_at, now) {
        Some(remaining_secs) => CountdownPhase::Running { remaining_secs },
        None => CountdownPhase::Expired,
    }
}

/// One observed countdown for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCountdown {
    order_id: Uuid,
    phase: CountdownPhase,
}

impl OrderCountdown {
    /// First observation of an order's countdown. A paused countdown is
    /// resumed from its snapshot; otherwise the remaining time is computed
    /// from `created_at`.
    pub fn observe(
        order_id: Uuid,
        created_at: DateTime<Utc>,
        flags: &mut SessionFlags,
        now: DateTime<Utc>,
    ) -> Self {
        let mut countdown = Self {
            order_id,
            phase: inspect(order_id, created_at, flags, now),
        };
        countdown.resume(flags);
        debug!(%order_id, phase = ?countdown.phase, "countdown observed");
        countdown
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    /// Running → Paused. Snapshots the remaining seconds and makes this the
    /// active order. Returns the snapshot, or `None` if not running.
    pub fn pause(&mut self, flags: &mut SessionFlags) -> Option<u32> {
        let CountdownPhase::Running { remaining_secs } = self.phase else {
            return None;
        };
        flags.store_pause_snapshot(PauseSnapshot {
            paused_time: remaining_secs,
            order_id: self.order_id,
        });
        flags.set_active_order(self.order_id);
        self.phase = CountdownPhase::Paused {
            snapshot_secs: remaining_secs,
        };
        Some(remaining_secs)
    }

    /// Paused → Running from the snapshot. Returns the remaining seconds, or
    /// `None` if not paused.
    pub fn resume(&mut self, flags: &mut SessionFlags) -> Option<u32> {
        let CountdownPhase::Paused { snapshot_secs } = self.phase else {
            return None;
        };
        flags.clear_active_order_if(self.order_id);
        self.phase = CountdownPhase::Running {
            remaining_secs: snapshot_secs,
        };
        Some(snapshot_secs)
    }

    /// Advances a running countdown by one second. Reaching zero expires the
    /// order and clears its pause state.
    pub fn tick(&mut self, flags: &mut SessionFlags) -> CountdownPhase {
        if let CountdownPhase::Running { remaining_secs } = self.phase {
            if remaining_secs <= 1 {
                self.phase = CountdownPhase::Expired;
                flags.remove_pause_snapshot(self.order_id);
                flags.clear_active_order_if(self.order_id);
                debug!(order_id = %self.order_id, "countdown expired");
            } else {
                self.phase = CountdownPhase::Running {
                    remaining_secs: remaining_secs - 1,
                };
            }
        }
        self.phase
    }
}

/// `MM:SS` display text.
pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
