use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric and utility traits needed throughout tapir.
/// Only primitive float types implement this — AD wrapper types do not.
pub trait Float:
    NumFloat
    + FloatConst
    + FromPrimitive
    + Erf
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}

/// The error function, which `num_traits::Float` does not provide.
///
/// Backed by `libm` for the primitive floats.
pub trait Erf {
    fn erf(self) -> Self;
}

impl Erf for f32 {
    #[inline]
    fn erf(self) -> Self {
        libm::erff(self)
    }
}

impl Erf for f64 {
    #[inline]
    fn erf(self) -> Self {
        libm::erf(self)
    }
}
