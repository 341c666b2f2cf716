//! Reverse-mode automatic differentiation over a JIT-compilable
//! computation graph.
//!
//! A [`Recorder`] intercepts arithmetic on [`Active`] scalars through a
//! thread-local session and appends nodes to a columnar [`Graph`]. Forward
//! values and input adjoints are evaluated by a pluggable
//! [`backend::Backend`]: the reference [`backend::Interpreter`], or (with
//! the `jit` feature) [`backend::CcJit`], which compiles the forward pass
//! to native code through the system C compiler and delegates the reverse
//! sweep to the interpreter.
//!
//! ```
//! use tapir::{Active, Recorder};
//!
//! let mut rec: Recorder<f64> = Recorder::active().unwrap();
//! let mut x = Active::from(2.0);
//! rec.register_input(&mut x);
//!
//! let y = x * 3.0 + 2.0;
//! rec.register_output(&y);
//!
//! rec.set_derivative(y.slot(), 1.0);
//! rec.compute_adjoints().unwrap();
//! assert_eq!(y.value(), 8.0);
//! assert_eq!(rec.derivative(x.slot()), 3.0);
//! ```

pub mod active;
pub mod api;
pub mod backend;
pub mod error;
pub mod float;
pub mod graph;
pub mod opcode;
pub mod recorder;
pub mod scalar;
mod traits;

pub use active::Active;
pub use api::{gradient, record, Recording};
pub use error::Error;
pub use float::{Erf, Float};
pub use graph::{Graph, NodeFlags, Slot, INVALID_SLOT};
pub use opcode::OpCode;
pub use recorder::{is_recording, with_active_graph, GraphThreadLocal, Recorder};
pub use scalar::Scalar;

#[cfg(feature = "jit")]
pub use api::record_jit;

/// Type alias for active scalars over `f64`.
pub type Active64 = Active<f64>;
/// Type alias for active scalars over `f32`.
pub type Active32 = Active<f32>;
