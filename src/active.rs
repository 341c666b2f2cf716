//! The active scalar type recorded by the graph recorder.
//!
//! [`Active<F>`] is a plain value plus the slot of the node that produced
//! it. Operations record to the thread-local active [`Graph`](crate::Graph)
//! when a recorder is active and an operand is tracked; otherwise they
//! behave as ordinary floating-point arithmetic and the result carries the
//! sentinel slot.

use std::fmt::{self, Display};

use crate::float::Float;
use crate::graph::{Slot, INVALID_SLOT};

/// Active scalar: a value and the graph slot that produced it.
///
/// 12 bytes for `f64`, `Copy`. The graph lives in the thread-local
/// recorder, not inside this struct.
#[derive(Clone, Copy, Debug)]
pub struct Active<F: Float> {
    pub(crate) value: F,
    pub(crate) slot: Slot,
}

impl<F: Float> Active<F> {
    /// Create an untracked constant (sentinel slot).
    #[inline]
    pub fn constant(value: F) -> Self {
        Active {
            value,
            slot: INVALID_SLOT,
        }
    }

    /// Create an active scalar from a known slot (internal use and tests).
    #[inline]
    pub fn from_slot(value: F, slot: Slot) -> Self {
        Active { value, slot }
    }

    /// The underlying scalar value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Overwrite the underlying value, keeping the slot.
    ///
    /// Used between recordings to re-evaluate the same graph at new
    /// inputs: the recorder reads registered input values lazily at
    /// `compute_adjoints` time.
    #[inline]
    pub fn set_value(&mut self, value: F) {
        self.value = value;
    }

    /// The graph slot, or [`INVALID_SLOT`] if untracked.
    #[inline]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Whether this scalar is recorded on a graph.
    #[inline]
    pub fn is_recorded(&self) -> bool {
        self.slot != INVALID_SLOT
    }
}

impl<F: Float> From<F> for Active<F> {
    #[inline]
    fn from(value: F) -> Self {
        Active::constant(value)
    }
}

impl<F: Float> Display for Active<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Active<F> {
    fn default() -> Self {
        Active::constant(F::zero())
    }
}
