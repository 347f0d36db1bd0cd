use std::sync::{Mutex, PoisonError};

use medrec_types::temporal::wall_clock_ms;
use medrec_types::TemporalAnchor;

struct ClockState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid Logical Clock that stamps ledger entries.
///
/// Every value returned by [`now`](Self::now) is strictly greater than any
/// earlier value from the same clock, including values passed to
/// [`observe`](Self::observe) during journal recovery. Entry timestamps are
/// therefore monotonic per subject even if the wall clock steps backwards.
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<ClockState>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(ClockState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Generate the next timestamp for a local event.
    pub fn now(&self) -> TemporalAnchor {
        let wall = wall_clock_ms();
        // Two integers; a poisoned lock still holds a usable value.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if wall > state.physical_ms {
            state.physical_ms = wall;
            state.logical = 0;
        } else {
            state.logical = state.logical.saturating_add(1);
        }

        TemporalAnchor::new(state.physical_ms, state.logical, self.node_id)
    }

    /// Fold a previously issued timestamp into the clock so later calls to
    /// [`now`](Self::now) are strictly after it.
    pub fn observe(&self, seen: &TemporalAnchor) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.physical_ms > state.physical_ms
            || (seen.physical_ms == state.physical_ms && seen.logical > state.logical)
        {
            state.physical_ms = seen.physical_ms;
            state.logical = seen.logical;
        }
    }
}
