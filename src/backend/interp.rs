//! Reference interpreter over the graph columns.
//!
//! Forward walks slots in increasing order; the reverse sweep walks in
//! decreasing order with zero-adjoint skipping and in-place accumulation,
//! so identical graphs produce identical floating-point traces.

use crate::backend::Backend;
use crate::error::Error;
use crate::float::Float;
use crate::graph::Graph;
use crate::opcode::{self, OpCode};

/// Interpreting backend; also embedded in the JIT backend for adjoints.
///
/// Holds reusable value/adjoint buffers sized at [`compile`](Backend::compile)
/// so repeated evaluations do not allocate.
pub struct Interpreter<F: Float> {
    values: Vec<F>,
    adjoints: Vec<F>,
}

impl<F: Float> Default for Interpreter<F> {
    fn default() -> Self {
        Interpreter {
            values: Vec::new(),
            adjoints: Vec::new(),
        }
    }
}

impl<F: Float> Interpreter<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward walk over `graph`, filling `self.values` (dense by slot).
    fn run_forward(&mut self, graph: &Graph<F>, inputs: &[F]) -> Result<(), Error> {
        if inputs.len() != graph.num_inputs() {
            return Err(Error::InputCountMismatch {
                expected: graph.num_inputs(),
                got: inputs.len(),
            });
        }

        let n = graph.node_count();
        let opcodes = graph.opcodes_slice();
        let op_a = graph.operand_a_slice();
        let op_b = graph.operand_b_slice();
        let imms = graph.immediates_slice();

        self.values.clear();
        self.values.resize(n, F::zero());

        let mut next_input = 0usize;
        for i in 0..n {
            self.values[i] = match opcodes[i] {
                OpCode::Input => {
                    let v = inputs[next_input];
                    next_input += 1;
                    v
                }
                OpCode::Constant => {
                    let pool_idx = imms[i].to_usize().unwrap_or(usize::MAX);
                    graph.pool_value(pool_idx)
                }
                op => {
                    let a = self.values[op_a[i] as usize];
                    let b = if op.arity() == 2 {
                        self.values[op_b[i] as usize]
                    } else {
                        F::zero()
                    };
                    opcode::eval_forward(op, a, b, imms[i])
                }
            };
        }
        Ok(())
    }
}

impl<F: Float> Backend<F> for Interpreter<F> {
    fn compile(&mut self, graph: &Graph<F>) -> Result<(), Error> {
        graph.validate()?;
        let n = graph.node_count();
        self.values.clear();
        self.adjoints.clear();
        self.values
            .try_reserve(n)
            .map_err(|_| Error::BufferAllocationFailed)?;
        self.adjoints
            .try_reserve(n)
            .map_err(|_| Error::BufferAllocationFailed)?;
        Ok(())
    }

    fn forward(&mut self, graph: &Graph<F>, inputs: &[F], outputs: &mut [F]) -> Result<(), Error> {
        if outputs.len() != graph.num_outputs() {
            return Err(Error::OutputCountMismatch {
                expected: graph.num_outputs(),
                got: outputs.len(),
            });
        }
        self.run_forward(graph, inputs)?;
        for (out, &s) in outputs.iter_mut().zip(graph.output_slots()) {
            *out = self.values[s as usize];
        }
        Ok(())
    }

    fn compute_adjoints(
        &mut self,
        graph: &Graph<F>,
        inputs: &[F],
        out_adj: &[F],
        in_adj: &mut [F],
    ) -> Result<(), Error> {
        if out_adj.len() != graph.num_outputs() {
            return Err(Error::OutputCountMismatch {
                expected: graph.num_outputs(),
                got: out_adj.len(),
            });
        }
        if in_adj.len() != graph.num_inputs() {
            return Err(Error::InputCountMismatch {
                expected: graph.num_inputs(),
                got: in_adj.len(),
            });
        }

        self.run_forward(graph, inputs)?;

        let n = graph.node_count();
        let opcodes = graph.opcodes_slice();
        let op_a = graph.operand_a_slice();
        let op_b = graph.operand_b_slice();
        let imms = graph.immediates_slice();

        self.adjoints.clear();
        self.adjoints.resize(n, F::zero());

        // Scatter output seeds, summing when a slot is listed twice.
        for (&s, &seed) in graph.output_slots().iter().zip(out_adj) {
            self.adjoints[s as usize] = self.adjoints[s as usize] + seed;
        }

        for i in (0..n).rev() {
            let adj = self.adjoints[i];
            if adj == F::zero() {
                continue;
            }
            let op = opcodes[i];
            match op {
                OpCode::Input | OpCode::Constant => continue,
                _ => {}
            }

            let a_idx = op_a[i] as usize;
            let a = self.values[a_idx];
            let (b_idx, b) = if op.arity() == 2 {
                let bi = op_b[i] as usize;
                (bi, self.values[bi])
            } else {
                (0, F::zero())
            };
            let r = self.values[i];
            let (da, db) = opcode::reverse_partials(op, a, b, imms[i], r);

            self.adjoints[a_idx] = self.adjoints[a_idx] + da * adj;
            if op.arity() == 2 {
                self.adjoints[b_idx] = self.adjoints[b_idx] + db * adj;
            }
        }

        for (out, &s) in in_adj.iter_mut().zip(graph.input_slots()) {
            *out = self.adjoints[s as usize];
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.values = Vec::new();
        self.adjoints = Vec::new();
    }
}
