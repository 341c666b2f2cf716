//! `num_traits` implementations for [`Active<F>`].
//!
//! Transcendentals with a dedicated opcode record that opcode; everything
//! else decomposes into opcodes the graph knows (`exp2` becomes a
//! scalar-base power, `hypot` a square-root chain, and so on), so any
//! backend can re-evaluate the recording. Zero-derivative rounding
//! functions return untracked constants.

use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::active::Active;
use crate::float::{Erf, Float};
use crate::opcode::OpCode;
use crate::recorder::GraphThreadLocal;
use crate::traits::active_ops::{binary_op, scalar_op, unary_op};

// ══════════════════════════════════════════════
//  Basic numeric traits
// ══════════════════════════════════════════════

impl<F: GraphThreadLocal> Zero for Active<F> {
    #[inline]
    fn zero() -> Self {
        Active::constant(F::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.value().is_zero()
    }
}

impl<F: GraphThreadLocal> One for Active<F> {
    #[inline]
    fn one() -> Self {
        Active::constant(F::one())
    }
}

impl<F: GraphThreadLocal> Num for Active<F> {
    type FromStrRadixErr = F::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        F::from_str_radix(str, radix).map(Active::constant)
    }
}

impl<F: Float> FromPrimitive for Active<F> {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        F::from_i64(n).map(Active::constant)
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        F::from_u64(n).map(Active::constant)
    }
    #[inline]
    fn from_f32(n: f32) -> Option<Self> {
        F::from_f32(n).map(Active::constant)
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        F::from_f64(n).map(Active::constant)
    }
}

impl<F: Float> ToPrimitive for Active<F> {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.value().to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.value().to_u64()
    }
    #[inline]
    fn to_f32(&self) -> Option<f32> {
        self.value().to_f32()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        self.value().to_f64()
    }
}

impl<F: GraphThreadLocal> NumCast for Active<F> {
    #[inline]
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        F::from(n).map(Active::constant)
    }
}

// ══════════════════════════════════════════════
//  Signed
// ══════════════════════════════════════════════

impl<F: GraphThreadLocal> Signed for Active<F> {
    #[inline]
    fn abs(&self) -> Self {
        unary_op(*self, OpCode::Abs, self.value().abs())
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.value() > other.value() {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        Active::constant(self.value().signum())
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.value().is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.value().is_sign_negative()
    }
}

// ══════════════════════════════════════════════
//  FloatConst
// ══════════════════════════════════════════════

impl<F: GraphThreadLocal> FloatConst for Active<F> {
    fn E() -> Self {
        Active::constant(F::E())
    }
    fn FRAC_1_PI() -> Self {
        Active::constant(F::FRAC_1_PI())
    }
    fn FRAC_1_SQRT_2() -> Self {
        Active::constant(F::FRAC_1_SQRT_2())
    }
    fn FRAC_2_PI() -> Self {
        Active::constant(F::FRAC_2_PI())
    }
    fn FRAC_2_SQRT_PI() -> Self {
        Active::constant(F::FRAC_2_SQRT_PI())
    }
    fn FRAC_PI_2() -> Self {
        Active::constant(F::FRAC_PI_2())
    }
    fn FRAC_PI_3() -> Self {
        Active::constant(F::FRAC_PI_3())
    }
    fn FRAC_PI_4() -> Self {
        Active::constant(F::FRAC_PI_4())
    }
    fn FRAC_PI_6() -> Self {
        Active::constant(F::FRAC_PI_6())
    }
    fn FRAC_PI_8() -> Self {
        Active::constant(F::FRAC_PI_8())
    }
    fn LN_10() -> Self {
        Active::constant(F::LN_10())
    }
    fn LN_2() -> Self {
        Active::constant(F::LN_2())
    }
    fn LOG10_E() -> Self {
        Active::constant(F::LOG10_E())
    }
    fn LOG2_E() -> Self {
        Active::constant(F::LOG2_E())
    }
    fn PI() -> Self {
        Active::constant(F::PI())
    }
    fn SQRT_2() -> Self {
        Active::constant(F::SQRT_2())
    }
    fn TAU() -> Self {
        Active::constant(F::TAU())
    }
    fn LOG10_2() -> Self {
        Active::constant(F::LOG10_2())
    }
    fn LOG2_10() -> Self {
        Active::constant(F::LOG2_10())
    }
}

// ══════════════════════════════════════════════
//  Float (num_traits::Float)
// ══════════════════════════════════════════════

impl<F: GraphThreadLocal> NumFloat for Active<F> {
    fn nan() -> Self {
        Active::constant(F::nan())
    }
    fn infinity() -> Self {
        Active::constant(F::infinity())
    }
    fn neg_infinity() -> Self {
        Active::constant(F::neg_infinity())
    }
    fn neg_zero() -> Self {
        Active::constant(F::neg_zero())
    }

    fn min_value() -> Self {
        Active::constant(F::min_value())
    }
    fn min_positive_value() -> Self {
        Active::constant(F::min_positive_value())
    }
    fn max_value() -> Self {
        Active::constant(F::max_value())
    }
    fn epsilon() -> Self {
        Active::constant(F::epsilon())
    }

    fn is_nan(self) -> bool {
        self.value().is_nan()
    }
    fn is_infinite(self) -> bool {
        self.value().is_infinite()
    }
    fn is_finite(self) -> bool {
        self.value().is_finite()
    }
    fn is_normal(self) -> bool {
        self.value().is_normal()
    }
    fn is_sign_positive(self) -> bool {
        self.value().is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.value().is_sign_negative()
    }
    fn classify(self) -> FpCategory {
        self.value().classify()
    }

    // ── Rounding: zero derivative almost everywhere, untracked ──

    fn floor(self) -> Self {
        Active::constant(self.value().floor())
    }
    fn ceil(self) -> Self {
        Active::constant(self.value().ceil())
    }
    fn round(self) -> Self {
        Active::constant(self.value().round())
    }
    fn trunc(self) -> Self {
        Active::constant(self.value().trunc())
    }
    fn signum(self) -> Self {
        Active::constant(self.value().signum())
    }
    fn fract(self) -> Self {
        // fract(a) = a − trunc(a), derivative 1 between the jumps.
        let t = self.value().trunc();
        scalar_op(self, OpCode::ScalarSub2, t, self.value() - t)
    }

    fn abs(self) -> Self {
        unary_op(self, OpCode::Abs, self.value().abs())
    }

    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }

    fn recip(self) -> Self {
        scalar_op(
            self,
            OpCode::ScalarDiv1,
            F::one(),
            F::one() / self.value(),
        )
    }

    fn powi(self, n: i32) -> Self {
        let exp = F::from_i32(n).unwrap();
        scalar_op(self, OpCode::ScalarPow2, exp, self.value().powf(exp))
    }

    fn powf(self, n: Self) -> Self {
        binary_op(self, n, OpCode::Pow, self.value().powf(n.value()))
    }

    fn sqrt(self) -> Self {
        unary_op(self, OpCode::Sqrt, self.value().sqrt())
    }
    fn cbrt(self) -> Self {
        unary_op(self, OpCode::Cbrt, self.value().cbrt())
    }

    fn exp(self) -> Self {
        unary_op(self, OpCode::Exp, self.value().exp())
    }
    fn exp2(self) -> Self {
        let two = F::one() + F::one();
        scalar_op(self, OpCode::ScalarPow1, two, self.value().exp2())
    }
    fn exp_m1(self) -> Self {
        let e = self.exp();
        scalar_op(e, OpCode::ScalarSub2, F::one(), e.value() - F::one())
    }
    fn ln(self) -> Self {
        unary_op(self, OpCode::Log, self.value().ln())
    }
    fn log2(self) -> Self {
        unary_op(self, OpCode::Log2, self.value().log2())
    }
    fn log10(self) -> Self {
        unary_op(self, OpCode::Log10, self.value().log10())
    }
    fn ln_1p(self) -> Self {
        let shifted = scalar_op(self, OpCode::ScalarAdd, F::one(), self.value() + F::one());
        shifted.ln()
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    fn sin(self) -> Self {
        unary_op(self, OpCode::Sin, self.value().sin())
    }
    fn cos(self) -> Self {
        unary_op(self, OpCode::Cos, self.value().cos())
    }
    fn tan(self) -> Self {
        unary_op(self, OpCode::Tan, self.value().tan())
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }
    fn asin(self) -> Self {
        unary_op(self, OpCode::Asin, self.value().asin())
    }
    fn acos(self) -> Self {
        unary_op(self, OpCode::Acos, self.value().acos())
    }
    fn atan(self) -> Self {
        unary_op(self, OpCode::Atan, self.value().atan())
    }
    fn atan2(self, other: Self) -> Self {
        binary_op(self, other, OpCode::Atan2, self.value().atan2(other.value()))
    }

    fn sinh(self) -> Self {
        unary_op(self, OpCode::Sinh, self.value().sinh())
    }
    fn cosh(self) -> Self {
        unary_op(self, OpCode::Cosh, self.value().cosh())
    }
    fn tanh(self) -> Self {
        unary_op(self, OpCode::Tanh, self.value().tanh())
    }
    fn asinh(self) -> Self {
        // ln(x + √(x² + 1))
        let sq = self * self;
        let shifted = scalar_op(sq, OpCode::ScalarAdd, F::one(), sq.value() + F::one());
        (self + shifted.sqrt()).ln()
    }
    fn acosh(self) -> Self {
        // ln(x + √(x² − 1))
        let sq = self * self;
        let shifted = scalar_op(sq, OpCode::ScalarSub2, F::one(), sq.value() - F::one());
        (self + shifted.sqrt()).ln()
    }
    fn atanh(self) -> Self {
        // ½·ln((1 + x)/(1 − x))
        let num = scalar_op(self, OpCode::ScalarAdd, F::one(), F::one() + self.value());
        let den = scalar_op(self, OpCode::ScalarSub1, F::one(), F::one() - self.value());
        let half = F::one() / (F::one() + F::one());
        let l = (num / den).ln();
        scalar_op(l, OpCode::ScalarMul, half, l.value() * half)
    }

    fn hypot(self, other: Self) -> Self {
        (self * self + other * other).sqrt()
    }

    fn max(self, other: Self) -> Self {
        let v = if self.value() >= other.value() {
            self.value()
        } else {
            other.value()
        };
        binary_op(self, other, OpCode::Max, v)
    }

    fn min(self, other: Self) -> Self {
        let v = if self.value() <= other.value() {
            self.value()
        } else {
            other.value()
        };
        binary_op(self, other, OpCode::Min, v)
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value() > other.value() {
            self - other
        } else {
            Self::zero()
        }
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.value().integer_decode()
    }

    fn to_degrees(self) -> Self {
        let factor = F::from_f64(180.0).unwrap() / F::PI();
        scalar_op(self, OpCode::ScalarMul, factor, self.value() * factor)
    }

    fn to_radians(self) -> Self {
        let factor = F::PI() / F::from_f64(180.0).unwrap();
        scalar_op(self, OpCode::ScalarMul, factor, self.value() * factor)
    }
}

// ══════════════════════════════════════════════
//  Erf
// ══════════════════════════════════════════════

impl<F: GraphThreadLocal> Erf for Active<F> {
    #[inline]
    fn erf(self) -> Self {
        unary_op(self, OpCode::Erf, Erf::erf(self.value()))
    }
}
