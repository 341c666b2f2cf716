//! Evaluation backends for recorded graphs.
//!
//! A backend turns a [`Graph`](crate::Graph) into forward values and input
//! adjoints. Two implementations ship with the crate:
//!
//! - [`Interpreter`]: walks the columns directly; the reference for every
//!   other backend.
//! - [`CcJit`] (`jit` feature): compiles the forward pass to native code
//!   through the system C compiler and delegates adjoints to an embedded
//!   interpreter.
//!
//! Backends are move-only (no `Clone`) and default-constructible. `compile`
//! may be called repeatedly; each call replaces the previous kernel.

use crate::error::Error;
use crate::float::Float;
use crate::graph::Graph;

mod interp;
pub use interp::Interpreter;

#[cfg(feature = "jit")]
mod cc;
#[cfg(feature = "jit")]
pub use cc::CcJit;

/// Contract between the recorder and an evaluation backend.
pub trait Backend<F: Float>: Default {
    /// Prepare the backend for `graph`: validate, size buffers, and (for
    /// native backends) build the kernel.
    ///
    /// Observable results must match the interpreter bit-for-bit for
    /// operations evaluated in recording order, and within 1 ulp where an
    /// optimizing backend reorders arithmetic.
    fn compile(&mut self, graph: &Graph<F>) -> Result<(), Error>;

    /// Evaluate forward values: load `inputs` at the graph's input slots in
    /// input-list order, evaluate every node, and write the values at the
    /// output-list slots into `outputs`.
    fn forward(&mut self, graph: &Graph<F>, inputs: &[F], outputs: &mut [F]) -> Result<(), Error>;

    /// Run the reverse sweep. `out_adj` holds one seed per output-list
    /// entry; `in_adj` receives one adjoint per input-list entry.
    fn compute_adjoints(
        &mut self,
        graph: &Graph<F>,
        inputs: &[F],
        out_adj: &[F],
        in_adj: &mut [F],
    ) -> Result<(), Error>;

    /// Discard any compiled kernel and internal buffers.
    fn reset(&mut self);
}
