//! Closure-based convenience entry points over the recorder.

use crate::active::Active;
use crate::backend::{Backend, Interpreter};
use crate::error::Error;
use crate::recorder::{GraphThreadLocal, Recorder};

#[cfg(feature = "jit")]
use crate::backend::CcJit;

/// A finished recording that can be re-evaluated at new inputs without
/// re-running user code.
///
/// Holds the recorder together with its registered input scalars, so the
/// live input-value pointers stay valid for the lifetime of the recording.
/// The recorder is deactivated once recording finishes; evaluation does
/// not need an active session.
pub struct Recording<F: GraphThreadLocal, B: Backend<F> = Interpreter<F>> {
    recorder: Recorder<F, B>,
    inputs: Vec<Active<F>>,
    output: Active<F>,
}

impl<F: GraphThreadLocal, B: Backend<F>> Recording<F, B> {
    fn new(f: impl FnOnce(&[Active<F>]) -> Active<F>, x: &[F]) -> Result<Self, Error> {
        let mut recorder: Recorder<F, B> = Recorder::active()?;
        let mut inputs: Vec<Active<F>> = x.iter().map(|&v| Active::constant(v)).collect();
        recorder.register_inputs(&mut inputs);
        let output = f(&inputs);
        recorder.register_output(&output);
        recorder.deactivate();
        Ok(Recording {
            recorder,
            inputs,
            output,
        })
    }

    /// The output value observed while recording.
    pub fn value(&self) -> F {
        self.output.value()
    }

    /// Number of recorded nodes.
    pub fn node_count(&self) -> usize {
        self.recorder.node_count()
    }

    /// Gradient of the output with respect to every input, evaluated at
    /// `x`. The recorded graph is re-evaluated; user code does not run
    /// again.
    pub fn gradient_at(&mut self, x: &[F]) -> Result<Vec<F>, Error> {
        assert_eq!(x.len(), self.inputs.len(), "wrong number of inputs");
        for (input, &v) in self.inputs.iter_mut().zip(x) {
            input.set_value(v);
        }
        self.recorder.clear_derivatives();
        if self.output.is_recorded() {
            self.recorder.set_derivative(self.output.slot(), F::one());
        }
        self.recorder.compute_adjoints()?;
        Ok(self
            .inputs
            .iter()
            .map(|input| self.recorder.derivative(input.slot()))
            .collect())
    }
}

/// Record `f` once over the interpreter backend.
///
/// ```
/// let mut rec = tapir::record(|x| x[0] * x[0] + x[1] * x[1], &[3.0f64, 4.0]).unwrap();
/// assert!((rec.value() - 25.0).abs() < 1e-12);
/// let g = rec.gradient_at(&[3.0, 4.0]).unwrap();
/// assert!((g[0] - 6.0).abs() < 1e-12);
/// assert!((g[1] - 8.0).abs() < 1e-12);
/// ```
pub fn record<F: GraphThreadLocal>(
    f: impl FnOnce(&[Active<F>]) -> Active<F>,
    x: &[F],
) -> Result<Recording<F>, Error> {
    Recording::new(f, x)
}

/// Record `f` once over the native JIT backend.
#[cfg(feature = "jit")]
pub fn record_jit(
    f: impl FnOnce(&[Active<f64>]) -> Active<f64>,
    x: &[f64],
) -> Result<Recording<f64, CcJit>, Error> {
    Recording::new(f, x)
}

/// Value and gradient of `f` at `x` in one shot.
pub fn gradient<F: GraphThreadLocal>(
    f: impl FnOnce(&[Active<F>]) -> Active<F>,
    x: &[F],
) -> Result<(F, Vec<F>), Error> {
    let mut recording = record(f, x)?;
    let grad = recording.gradient_at(x)?;
    Ok((recording.value(), grad))
}
