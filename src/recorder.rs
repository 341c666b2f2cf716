//! The recording session: thread-local activation, input/output
//! registration, and adjoint evaluation through a backend.
//!
//! At most one recorder is active per thread. While active, arithmetic on
//! [`Active`] scalars appends nodes to the recorder's graph through a
//! thread-local pointer; two threads may each run their own recorder, but a
//! single recorder must stay on the thread that activated it.

use std::cell::Cell;
use std::thread::LocalKey;

use num_complex::Complex;

use crate::active::Active;
use crate::backend::{Backend, Interpreter};
use crate::error::Error;
use crate::float::Float;
use crate::graph::{Graph, Slot, INVALID_SLOT};

thread_local! {
    static GRAPH_F32: Cell<*mut Graph<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static GRAPH_F64: Cell<*mut Graph<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Trait to select the correct thread-local for a given float type.
pub trait GraphThreadLocal: Float {
    fn graph_cell() -> &'static LocalKey<Cell<*mut Graph<Self>>>;
}

impl GraphThreadLocal for f32 {
    fn graph_cell() -> &'static LocalKey<Cell<*mut Graph<Self>>> {
        &GRAPH_F32
    }
}

impl GraphThreadLocal for f64 {
    fn graph_cell() -> &'static LocalKey<Cell<*mut Graph<Self>>> {
        &GRAPH_F64
    }
}

/// Run `f` against the graph of the recorder active on this thread.
///
/// Returns `None` when no recorder is active, so arithmetic on [`Active`]
/// values outside a recording falls back to plain numerics.
#[inline]
pub fn with_active_graph<F: GraphThreadLocal, R>(
    f: impl FnOnce(&mut Graph<F>) -> R,
) -> Option<R> {
    F::graph_cell().with(|cell| {
        let ptr = cell.get();
        if ptr.is_null() {
            return None;
        }
        // SAFETY: the pointer is set by `Recorder::activate` to the
        // recorder's heap-allocated graph and cleared on deactivation or
        // drop. Access is confined to the owning thread by the
        // thread-local, and no other mutable borrow of the graph exists
        // while recording runs.
        let graph = unsafe { &mut *ptr };
        Some(f(graph))
    })
}

/// Whether a recorder is currently active on this thread.
#[inline]
pub fn is_recording<F: GraphThreadLocal>() -> bool {
    F::graph_cell().with(|cell| !cell.get().is_null())
}

/// A recording session: owns the graph, the evaluation backend, the live
/// input-value pointers, and the per-slot adjoint vector.
///
/// The graph is heap-allocated so the recorder can be moved (into a `Box`,
/// a struct, across function returns) while active: the thread-local keeps
/// pointing at the same graph. Dropping the recorder deactivates it.
pub struct Recorder<F: GraphThreadLocal, B: Backend<F> = Interpreter<F>> {
    graph: Box<Graph<F>>,
    backend: B,
    input_values: Vec<*const F>,
    derivatives: Vec<F>,
}

impl<F: GraphThreadLocal, B: Backend<F>> Recorder<F, B> {
    /// Create an inactive recorder with a default-constructed backend.
    pub fn new() -> Self {
        Recorder {
            graph: Box::new(Graph::new()),
            backend: B::default(),
            input_values: Vec::new(),
            derivatives: Vec::new(),
        }
    }

    /// Create a recorder and activate it on the current thread.
    pub fn active() -> Result<Self, Error> {
        let mut rec = Self::new();
        rec.activate()?;
        Ok(rec)
    }

    /// Activate this recorder on the current thread.
    ///
    /// Fails with [`Error::RecorderConflict`] if a different recorder is
    /// already active here; re-activating an already-active recorder is a
    /// no-op.
    pub fn activate(&mut self) -> Result<(), Error> {
        let own: *mut Graph<F> = &mut *self.graph;
        F::graph_cell().with(|cell| {
            let ptr = cell.get();
            if ptr.is_null() {
                cell.set(own);
                Ok(())
            } else if ptr == own {
                Ok(())
            } else {
                Err(Error::RecorderConflict)
            }
        })
    }

    /// Deactivate this recorder if it is the active one. Idempotent.
    pub fn deactivate(&mut self) {
        let own: *mut Graph<F> = &mut *self.graph;
        F::graph_cell().with(|cell| {
            if cell.get() == own {
                cell.set(std::ptr::null_mut());
            }
        });
    }

    /// Whether this recorder is the active one on the current thread.
    pub fn is_active(&self) -> bool {
        let own = &*self.graph as *const Graph<F>;
        F::graph_cell().with(|cell| cell.get() as *const Graph<F> == own)
    }

    /// Register an input variable.
    ///
    /// Allocates an `Input` node, stores the slot on the scalar, and keeps
    /// a read-only pointer to its live value; the pointer is dereferenced
    /// lazily by [`compute_adjoints`](Self::compute_adjoints), so the value
    /// may be changed (via [`Active::set_value`]) between recording and
    /// evaluation. Registering a scalar that already carries a slot is a
    /// no-op.
    ///
    /// Contract: `input` must stay alive and in place until the recorder's
    /// last `compute_adjoints` call, or until
    /// [`new_recording`](Self::new_recording) drops the pointer. Violating
    /// this is a use-after-free.
    pub fn register_input(&mut self, input: &mut Active<F>) {
        if input.is_recorded() {
            return;
        }
        input.slot = self.graph.add_input();
        self.input_values.push(&input.value as *const F);
    }

    /// Register a slice of inputs in order.
    pub fn register_inputs(&mut self, inputs: &mut [Active<F>]) {
        for input in inputs {
            self.register_input(input);
        }
    }

    /// Register a complex input as its real then imaginary component.
    pub fn register_input_complex(&mut self, input: &mut Complex<Active<F>>) {
        self.register_input(&mut input.re);
        self.register_input(&mut input.im);
    }

    /// Register an output variable.
    ///
    /// No-op for untracked scalars: a value that never touched a recorded
    /// input is a constant with no dependency to differentiate.
    pub fn register_output(&mut self, output: &Active<F>) {
        if output.is_recorded() {
            self.graph.mark_output(output.slot);
        }
    }

    /// Register a slice of outputs in order.
    pub fn register_outputs(&mut self, outputs: &[Active<F>]) {
        for output in outputs {
            self.register_output(output);
        }
    }

    /// Register a complex output as its real then imaginary component.
    pub fn register_output_complex(&mut self, output: &Complex<Active<F>>) {
        self.register_output(&output.re);
        self.register_output(&output.im);
    }

    /// Mutable adjoint cell for `slot`, growing the vector on demand.
    ///
    /// Used to seed output adjoints before
    /// [`compute_adjoints`](Self::compute_adjoints).
    ///
    /// # Panics
    /// Panics when handed the sentinel slot of an unrecorded value.
    pub fn derivative_mut(&mut self, slot: Slot) -> &mut F {
        assert!(
            slot != INVALID_SLOT,
            "cannot take the derivative of an unrecorded value"
        );
        let i = slot as usize;
        if i >= self.derivatives.len() {
            self.derivatives.resize(i + 1, F::zero());
        }
        &mut self.derivatives[i]
    }

    /// Adjoint of `slot`; reads past the stored length return zero.
    pub fn derivative(&self, slot: Slot) -> F {
        self.derivatives
            .get(slot as usize)
            .copied()
            .unwrap_or_else(F::zero)
    }

    /// Overwrite the adjoint of `slot`, growing the vector on demand.
    pub fn set_derivative(&mut self, slot: Slot, value: F) {
        *self.derivative_mut(slot) = value;
    }

    /// Zero all adjoints in place without shrinking the vector.
    pub fn clear_derivatives(&mut self) {
        for d in &mut self.derivatives {
            *d = F::zero();
        }
    }

    /// Evaluate input adjoints for the seeded outputs.
    ///
    /// Gathers the live input values and the seeded output adjoints, hands
    /// the graph to the backend (`compile` then `compute_adjoints`), and
    /// writes the returned input adjoints back into the per-slot adjoint
    /// vector. Only input-slot adjoints are meaningful afterwards; interior
    /// adjoints are backend-private and may not exist at all under an
    /// optimizing backend.
    ///
    /// Backend errors propagate unchanged; the graph is untouched by a
    /// failed call.
    pub fn compute_adjoints(&mut self) -> Result<(), Error> {
        let num_inputs = self.graph.num_inputs();

        // SAFETY: each pointer was captured by `register_input` from a
        // caller-owned `Active` which the caller contracts to keep alive
        // and in place until this call returns (or until `new_recording`).
        let inputs: Vec<F> = self
            .input_values
            .iter()
            .map(|&p| unsafe { *p })
            .collect();

        let out_adj: Vec<F> = self
            .graph
            .output_slots()
            .iter()
            .map(|&s| self.derivative(s))
            .collect();

        self.backend.compile(&self.graph)?;

        let mut in_adj = vec![F::zero(); num_inputs];
        self.backend
            .compute_adjoints(&self.graph, &inputs, &out_adj, &mut in_adj)?;

        self.derivatives.resize(self.graph.node_count(), F::zero());
        for (&slot, &adj) in self.graph.input_slots().iter().zip(&in_adj) {
            self.derivatives[slot as usize] = adj;
        }
        Ok(())
    }

    /// Start a fresh recording: clears the graph, constant pool, input
    /// pointers, and adjoints, and resets the backend. The recorder stays
    /// active.
    ///
    /// Slots held by actives from the previous recording become stale;
    /// re-register inputs on fresh actives before recording again.
    pub fn new_recording(&mut self) {
        self.graph.clear();
        self.input_values.clear();
        self.derivatives.clear();
        self.backend.reset();
    }

    /// The recorded graph.
    pub fn graph(&self) -> &Graph<F> {
        &self.graph
    }

    /// Number of recorded nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The evaluation backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<F: GraphThreadLocal, B: Backend<F>> Default for Recorder<F, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: GraphThreadLocal, B: Backend<F>> Drop for Recorder<F, B> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
