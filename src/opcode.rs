//! Opcodes for the computation graph.
//!
//! Each opcode represents an elementary operation. The [`eval_forward`] and
//! [`reverse_partials`] functions evaluate / differentiate a single node.

use crate::float::{Erf, Float};

/// Elementary operation codes for graph nodes.
///
/// Fits in a `u8`. Scalar-mixed opcodes carry their scalar operand in the
/// node's immediate; the `1`/`2` suffix distinguishes scalar-first from
/// active-first for the non-commutative operations.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    // ── Structural ──
    /// Registered input (leaf node).
    Input,
    /// Constant-pool entry. The immediate holds the pool index.
    Constant,

    // ── Unary ──
    Neg,
    Abs,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Erf,
    Asin,
    Acos,
    Atan,

    // ── Binary active-active ──
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Min,
    Max,

    // ── Scalar-mixed (scalar in the immediate) ──
    /// active + scalar
    ScalarAdd,
    /// scalar − active
    ScalarSub1,
    /// active − scalar
    ScalarSub2,
    /// active · scalar
    ScalarMul,
    /// scalar ÷ active
    ScalarDiv1,
    /// active ÷ scalar
    ScalarDiv2,
    /// scalar ^ active
    ScalarPow1,
    /// active ^ scalar
    ScalarPow2,
}

impl OpCode {
    /// Number of operand slots the opcode reads (0, 1, or 2).
    #[inline]
    pub fn arity(self) -> usize {
        use OpCode::*;
        match self {
            Input | Constant => 0,
            Neg | Abs | Sqrt | Cbrt | Exp | Log | Log10 | Log2 | Sin | Cos | Tan | Sinh
            | Cosh | Tanh | Erf | Asin | Acos | Atan | ScalarAdd | ScalarSub1 | ScalarSub2
            | ScalarMul | ScalarDiv1 | ScalarDiv2 | ScalarPow1 | ScalarPow2 => 1,
            Add | Sub | Mul | Div | Pow | Atan2 | Min | Max => 2,
        }
    }

    /// Whether the node's immediate carries meaning for this opcode.
    ///
    /// `Constant` stores its pool index there; the scalar-mixed opcodes
    /// store their scalar operand.
    #[inline]
    pub fn uses_immediate(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            Constant
                | ScalarAdd
                | ScalarSub1
                | ScalarSub2
                | ScalarMul
                | ScalarDiv1
                | ScalarDiv2
                | ScalarPow1
                | ScalarPow2
        )
    }
}

/// Evaluate a single opcode in the forward direction.
///
/// `a` and `b` are the operand values (for unary ops `b` is ignored);
/// `imm` is the node immediate, meaningful for scalar-mixed opcodes.
///
/// `Input`/`Constant` are leaf nodes resolved by the walker, not here.
#[inline]
pub fn eval_forward<F: Float>(op: OpCode, a: F, b: F, imm: F) -> F {
    match op {
        OpCode::Input | OpCode::Constant => {
            unreachable!("Input/Constant are resolved by the forward walker")
        }

        // Unary
        OpCode::Neg => -a,
        OpCode::Abs => a.abs(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Cbrt => a.cbrt(),
        OpCode::Exp => a.exp(),
        OpCode::Log => a.ln(),
        OpCode::Log10 => a.log10(),
        OpCode::Log2 => a.log2(),
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
        OpCode::Erf => Erf::erf(a),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),

        // Binary
        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Pow => a.powf(b),
        OpCode::Atan2 => a.atan2(b),
        // Ties resolve to the first operand.
        OpCode::Min => {
            if a <= b {
                a
            } else {
                b
            }
        }
        OpCode::Max => {
            if a >= b {
                a
            } else {
                b
            }
        }

        // Scalar-mixed
        OpCode::ScalarAdd => a + imm,
        OpCode::ScalarSub1 => imm - a,
        OpCode::ScalarSub2 => a - imm,
        OpCode::ScalarMul => a * imm,
        OpCode::ScalarDiv1 => imm / a,
        OpCode::ScalarDiv2 => a / imm,
        OpCode::ScalarPow1 => imm.powf(a),
        OpCode::ScalarPow2 => a.powf(imm),
    }
}

/// Compute reverse-mode partial derivatives for a single opcode.
///
/// Returns `(∂result/∂a, ∂result/∂b)`; for unary and scalar-mixed ops the
/// second partial is zero. `r` is the node's forward value, `imm` the
/// immediate.
#[inline]
pub fn reverse_partials<F: Float>(op: OpCode, a: F, b: F, imm: F, r: F) -> (F, F) {
    let zero = F::zero();
    let one = F::one();
    match op {
        OpCode::Input | OpCode::Constant => (zero, zero),

        // Unary
        OpCode::Neg => (-one, zero),
        // Sub-gradient 0 at the kink.
        OpCode::Abs => {
            let da = if a > zero {
                one
            } else if a < zero {
                -one
            } else {
                zero
            };
            (da, zero)
        }
        OpCode::Sqrt => {
            let two = one + one;
            (one / (two * r), zero)
        }
        OpCode::Cbrt => {
            let three = F::from_f64(3.0).unwrap();
            (one / (three * r * r), zero)
        }
        OpCode::Exp => (r, zero),
        OpCode::Log => (one / a, zero),
        OpCode::Log10 => (one / (a * F::LN_10()), zero),
        OpCode::Log2 => (one / (a * F::LN_2()), zero),
        OpCode::Sin => (a.cos(), zero),
        OpCode::Cos => (-a.sin(), zero),
        OpCode::Tan => {
            let c = a.cos();
            (one / (c * c), zero)
        }
        OpCode::Sinh => (a.cosh(), zero),
        OpCode::Cosh => (a.sinh(), zero),
        OpCode::Tanh => {
            let c = a.cosh();
            (one / (c * c), zero)
        }
        // d/da erf(a) = 2/√π · e^(−a²)
        OpCode::Erf => (F::FRAC_2_SQRT_PI() * (-a * a).exp(), zero),
        OpCode::Asin => (one / (one - a * a).sqrt(), zero),
        OpCode::Acos => (-one / (one - a * a).sqrt(), zero),
        OpCode::Atan => (one / (one + a * a), zero),

        // Binary
        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            let inv = one / b;
            (inv, -a * inv * inv)
        }
        OpCode::Pow => {
            // d/da a^b = b·a^(b−1),  d/db a^b = a^b·ln a
            let da = b * a.powf(b - one);
            let db = r * a.ln();
            (da, db)
        }
        OpCode::Atan2 => {
            let denom = a * a + b * b;
            (b / denom, -a / denom)
        }
        // Ties resolve to the first operand, matching the forward rule.
        OpCode::Min => {
            if a <= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        OpCode::Max => {
            if a >= b {
                (one, zero)
            } else {
                (zero, one)
            }
        }

        // Scalar-mixed
        OpCode::ScalarAdd => (one, zero),
        OpCode::ScalarSub1 => (-one, zero),
        OpCode::ScalarSub2 => (one, zero),
        OpCode::ScalarMul => (imm, zero),
        OpCode::ScalarDiv1 => {
            // d/da (s/a) = −s/a²
            (-imm / (a * a), zero)
        }
        OpCode::ScalarDiv2 => (one / imm, zero),
        OpCode::ScalarPow1 => (r * imm.ln(), zero),
        OpCode::ScalarPow2 => (imm * a.powf(imm - one), zero),
    }
}
