//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work transparently
//! with plain `f64` and with [`Active<f64>`], so the same body serves
//! direct evaluation and recording.

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::active::Active;
use crate::float::Float;
use crate::recorder::GraphThreadLocal;

/// The central trait for AD-generic numeric code.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (constant — zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;
}

impl Scalar for f32 {
    type Float = f32;

    #[inline]
    fn from_f(val: f32) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f32 {
        *self
    }
}

impl Scalar for f64 {
    type Float = f64;

    #[inline]
    fn from_f(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }
}

impl<F: GraphThreadLocal> Scalar for Active<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Active::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        Active::value(self)
    }
}
