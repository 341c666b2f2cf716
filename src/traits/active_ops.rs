//! `std::ops` implementations for [`Active<F>`].
//!
//! Each operator records a node on the thread-local active graph when a
//! recorder is active and at least one operand is tracked. Otherwise the
//! result is an untracked constant and the arithmetic is plain floating
//! point. Mixed active/primitive operations use the scalar-mixed opcodes,
//! which keep the scalar in the node immediate instead of spending a
//! constant-pool node on it.

use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::active::Active;
use crate::float::Float;
use crate::graph::{Graph, Slot};
use crate::opcode::OpCode;
use crate::recorder::{with_active_graph, GraphThreadLocal};

/// Slot of an operand, promoting untracked constants through the pool.
#[inline]
pub(crate) fn ensure_recorded<F: Float>(x: &Active<F>, graph: &mut Graph<F>) -> Slot {
    if x.is_recorded() {
        x.slot()
    } else {
        graph.add_constant(x.value())
    }
}

/// Record a unary op if `x` is tracked and a recorder is active.
#[inline]
pub(crate) fn unary_op<F: GraphThreadLocal>(x: Active<F>, op: OpCode, value: F) -> Active<F> {
    if !x.is_recorded() {
        return Active::constant(value);
    }
    match with_active_graph(|g: &mut Graph<F>| g.add_node(op, x.slot(), 0, 0, F::zero())) {
        Some(slot) => Active::from_slot(value, slot),
        None => Active::constant(value),
    }
}

/// Record a binary op, promoting an untracked operand through the pool.
#[inline]
pub(crate) fn binary_op<F: GraphThreadLocal>(
    lhs: Active<F>,
    rhs: Active<F>,
    op: OpCode,
    value: F,
) -> Active<F> {
    if !lhs.is_recorded() && !rhs.is_recorded() {
        return Active::constant(value);
    }
    match with_active_graph(|g: &mut Graph<F>| {
        let a = ensure_recorded(&lhs, g);
        let b = ensure_recorded(&rhs, g);
        g.add_node(op, a, b, 0, F::zero())
    }) {
        Some(slot) => Active::from_slot(value, slot),
        None => Active::constant(value),
    }
}

/// Record a scalar-mixed op with the scalar in the immediate.
#[inline]
pub(crate) fn scalar_op<F: GraphThreadLocal>(
    x: Active<F>,
    op: OpCode,
    scalar: F,
    value: F,
) -> Active<F> {
    if !x.is_recorded() {
        return Active::constant(value);
    }
    match with_active_graph(|g: &mut Graph<F>| g.add_node(op, x.slot(), 0, 0, scalar)) {
        Some(slot) => Active::from_slot(value, slot),
        None => Active::constant(value),
    }
}

// ──────────────────────────────────────────────
//  Active<F> ↔ Active<F> operators
// ──────────────────────────────────────────────

impl<F: GraphThreadLocal> Add for Active<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Add, self.value() + rhs.value())
    }
}

impl<F: GraphThreadLocal> Sub for Active<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Sub, self.value() - rhs.value())
    }
}

impl<F: GraphThreadLocal> Mul for Active<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Mul, self.value() * rhs.value())
    }
}

impl<F: GraphThreadLocal> Div for Active<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Div, self.value() / rhs.value())
    }
}

impl<F: GraphThreadLocal> Neg for Active<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        unary_op(self, OpCode::Neg, -self.value())
    }
}

impl<F: GraphThreadLocal> Rem for Active<F> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        // a % b = a − trunc(a/b)·b with the quotient frozen; this also
        // yields the correct −trunc(a/b) partial for the divisor.
        let q = Active::constant((self.value() / rhs.value()).trunc());
        self - q * rhs
    }
}

// Assign variants delegate to the binary ops.
impl<F: GraphThreadLocal> AddAssign for Active<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: GraphThreadLocal> SubAssign for Active<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: GraphThreadLocal> MulAssign for Active<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: GraphThreadLocal> DivAssign for Active<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<F: GraphThreadLocal> RemAssign for Active<F> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// ──────────────────────────────────────────────
//  Mixed ops: Active<F> with primitive floats
// ──────────────────────────────────────────────

macro_rules! impl_active_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Active<$f> {
                scalar_op(self, OpCode::ScalarAdd, rhs, self.value() + rhs)
            }
        }

        impl Add<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn add(self, rhs: Active<$f>) -> Active<$f> {
                scalar_op(rhs, OpCode::ScalarAdd, self, self + rhs.value())
            }
        }

        impl Sub<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Active<$f> {
                scalar_op(self, OpCode::ScalarSub2, rhs, self.value() - rhs)
            }
        }

        impl Sub<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn sub(self, rhs: Active<$f>) -> Active<$f> {
                scalar_op(rhs, OpCode::ScalarSub1, self, self - rhs.value())
            }
        }

        impl Mul<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Active<$f> {
                scalar_op(self, OpCode::ScalarMul, rhs, self.value() * rhs)
            }
        }

        impl Mul<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn mul(self, rhs: Active<$f>) -> Active<$f> {
                scalar_op(rhs, OpCode::ScalarMul, self, self * rhs.value())
            }
        }

        impl Div<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Active<$f> {
                scalar_op(self, OpCode::ScalarDiv2, rhs, self.value() / rhs)
            }
        }

        impl Div<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn div(self, rhs: Active<$f>) -> Active<$f> {
                scalar_op(rhs, OpCode::ScalarDiv1, self, self / rhs.value())
            }
        }

        impl Rem<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn rem(self, rhs: $f) -> Active<$f> {
                self % Active::constant(rhs)
            }
        }

        impl Rem<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn rem(self, rhs: Active<$f>) -> Active<$f> {
                Active::constant(self) % rhs
            }
        }

        impl AddAssign<$f> for Active<$f> {
            #[inline]
            fn add_assign(&mut self, rhs: $f) {
                *self = *self + rhs;
            }
        }

        impl SubAssign<$f> for Active<$f> {
            #[inline]
            fn sub_assign(&mut self, rhs: $f) {
                *self = *self - rhs;
            }
        }

        impl MulAssign<$f> for Active<$f> {
            #[inline]
            fn mul_assign(&mut self, rhs: $f) {
                *self = *self * rhs;
            }
        }

        impl DivAssign<$f> for Active<$f> {
            #[inline]
            fn div_assign(&mut self, rhs: $f) {
                *self = *self / rhs;
            }
        }
    };
}

impl_active_scalar_ops!(f32);
impl_active_scalar_ops!(f64);

// ── Comparison (on the primal value) ──

impl<F: Float> PartialEq for Active<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl<F: Float> PartialOrd for Active<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value().partial_cmp(&other.value())
    }
}
