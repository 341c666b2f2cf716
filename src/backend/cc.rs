//! Native backend: compiles the forward pass through the system C compiler.
//!
//! The graph is rendered as one C translation unit — a flat `double` slot
//! array with one statement per live node — compiled into a shared object
//! and loaded with `libloading`. Adjoints are delegated to an embedded
//! [`Interpreter`], per the backend contract.
//!
//! f64 only; the interpreter remains the generic reference backend.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::process::Command;

use libloading::Library;
use log::debug;

use crate::backend::{Backend, Interpreter};
use crate::error::Error;
use crate::graph::{Graph, Slot};
use crate::opcode::{self, OpCode};

type KernelFn = unsafe extern "C" fn(*const f64, *mut f64);

const KERNEL_SYMBOL: &[u8] = b"kernel_main\0";

struct CompiledKernel {
    library: Library,
    /// Scratch directory holding the source and shared object; kept alive
    /// for as long as the library is loaded.
    _dir: tempfile::TempDir,
}

/// JIT backend backed by the system C compiler.
///
/// `compile` renders, compiles, and loads the kernel; `forward` executes
/// it. Construction is cheap — nothing happens until `compile`.
pub struct CcJit {
    kernel: Option<CompiledKernel>,
    /// Fingerprint of the graph the current kernel was built from; a
    /// matching graph skips the compiler on repeated `compile` calls.
    fingerprint: u64,
    values: Vec<f64>,
    interp: Interpreter<f64>,
    node_count: usize,
}

impl Default for CcJit {
    fn default() -> Self {
        CcJit {
            kernel: None,
            fingerprint: 0,
            values: Vec::new(),
            interp: Interpreter::new(),
            node_count: 0,
        }
    }
}

impl CcJit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a usable C compiler is on the path (`$CC` or `cc`).
    pub fn is_available() -> bool {
        let compiler = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
        match Command::new(compiler).arg("--version").output() {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

impl Backend<f64> for CcJit {
    fn compile(&mut self, graph: &Graph<f64>) -> Result<(), Error> {
        graph.validate()?;
        self.interp.compile(graph)?;

        let fingerprint = graph_fingerprint(graph);
        if self.kernel.is_some() && fingerprint == self.fingerprint {
            // Same graph as the loaded kernel; nothing to rebuild.
            return Ok(());
        }

        self.node_count = graph.node_count();
        self.values.clear();
        self.values
            .try_reserve(self.node_count)
            .map_err(|_| Error::BufferAllocationFailed)?;
        self.values.resize(self.node_count, 0.0);

        let source = render_kernel(graph);
        debug!("rendered kernel:\n{source}");

        let dir = tempfile::tempdir()
            .map_err(|e| Error::KernelCompilationFailed(e.to_string()))?;
        let src_path = dir.path().join("kernel.c");
        std::fs::write(&src_path, &source)
            .map_err(|e| Error::KernelCompilationFailed(e.to_string()))?;

        let lib_name = if cfg!(target_os = "macos") {
            "kernel.dylib"
        } else {
            "kernel.so"
        };
        let lib_path = dir.path().join(lib_name);
        let compiler = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());

        debug!(
            "compile command: {} -shared -fPIC -O2 -o {} {} -lm",
            compiler,
            lib_path.display(),
            src_path.display()
        );

        let output = Command::new(&compiler)
            .args(["-shared", "-fPIC", "-O2"])
            .arg("-o")
            .arg(&lib_path)
            .arg(&src_path)
            .arg("-lm")
            .output()
            .map_err(|e| Error::KernelCompilationFailed(format!("failed to run {compiler}: {e}")))?;

        if !output.status.success() {
            return Err(Error::KernelCompilationFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        // SAFETY: the library was just produced by the compiler from our
        // rendered source; it exports exactly one symbol with the expected
        // signature and runs no constructors.
        let library = unsafe { Library::new(&lib_path) }
            .map_err(|e| Error::KernelCompilationFailed(e.to_string()))?;

        self.kernel = Some(CompiledKernel {
            library,
            _dir: dir,
        });
        self.fingerprint = fingerprint;
        Ok(())
    }

    fn forward(
        &mut self,
        graph: &Graph<f64>,
        inputs: &[f64],
        outputs: &mut [f64],
    ) -> Result<(), Error> {
        if inputs.len() != graph.num_inputs() {
            return Err(Error::InputCountMismatch {
                expected: graph.num_inputs(),
                got: inputs.len(),
            });
        }
        if outputs.len() != graph.num_outputs() {
            return Err(Error::OutputCountMismatch {
                expected: graph.num_outputs(),
                got: outputs.len(),
            });
        }
        let kernel = self.kernel.as_ref().ok_or_else(|| {
            Error::KernelCompilationFailed("backend not compiled".to_string())
        })?;

        // SAFETY: `kernel_main` only reads `inputs[0..num_inputs]` and
        // writes `values[0..node_count]`; both buffers are sized for the
        // graph this kernel was compiled from.
        unsafe {
            let func: libloading::Symbol<KernelFn> = kernel
                .library
                .get(KERNEL_SYMBOL)
                .map_err(|e| Error::KernelCompilationFailed(e.to_string()))?;
            func(inputs.as_ptr(), self.values.as_mut_ptr());
        }

        for (out, &s) in outputs.iter_mut().zip(graph.output_slots()) {
            *out = self.values[s as usize];
        }
        Ok(())
    }

    fn compute_adjoints(
        &mut self,
        graph: &Graph<f64>,
        inputs: &[f64],
        out_adj: &[f64],
        in_adj: &mut [f64],
    ) -> Result<(), Error> {
        self.interp.compute_adjoints(graph, inputs, out_adj, in_adj)
    }

    fn reset(&mut self) {
        self.kernel = None;
        self.fingerprint = 0;
        self.values = Vec::new();
        self.interp.reset();
        self.node_count = 0;
    }
}

/// Structural fingerprint of a graph, for kernel reuse across `compile`
/// calls. Covers every column the rendered kernel depends on.
fn graph_fingerprint(graph: &Graph<f64>) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    for &op in graph.opcodes_slice() {
        (op as u8).hash(&mut h);
    }
    graph.operand_a_slice().hash(&mut h);
    graph.operand_b_slice().hash(&mut h);
    for &v in graph.immediates_slice() {
        v.to_bits().hash(&mut h);
    }
    for &v in graph.const_pool_slice() {
        v.to_bits().hash(&mut h);
    }
    graph.input_slots().hash(&mut h);
    graph.output_slots().hash(&mut h);
    h.finish()
}

// ──────────────────────────────────────────────
//  Codegen
// ──────────────────────────────────────────────

/// Format an `f64` as a C double literal.
fn c_literal(v: f64) -> String {
    if v.is_nan() {
        "(0.0/0.0)".to_string()
    } else if v == f64::INFINITY {
        "(1.0/0.0)".to_string()
    } else if v == f64::NEG_INFINITY {
        "(-1.0/0.0)".to_string()
    } else {
        // `{:?}` prints the shortest round-tripping form ("5.0", "1e300"),
        // all of which are valid C double literals.
        format!("{v:?}")
    }
}

/// Nodes reachable from the output list (inputs are always kept).
fn live_set(graph: &Graph<f64>) -> Vec<bool> {
    let n = graph.node_count();
    let mut live = vec![false; n];
    for &s in graph.input_slots() {
        live[s as usize] = true;
    }
    let mut stack: Vec<Slot> = graph.output_slots().to_vec();
    while let Some(s) = stack.pop() {
        let i = s as usize;
        if live[i] {
            continue;
        }
        live[i] = true;
        let op = graph.opcode(s);
        let (a, b, _) = graph.operands(s);
        match op.arity() {
            0 => {}
            1 => stack.push(a),
            _ => {
                stack.push(a);
                stack.push(b);
            }
        }
    }
    live
}

/// Render the forward pass as a C translation unit exporting `kernel_main`.
///
/// Dead nodes emit nothing; duplicate subexpressions emit a copy of their
/// first occurrence; operations on constant operands fold to literals.
/// The slot array keeps the graph's indexing, so inputs and outputs are
/// read and written at their original positions.
fn render_kernel(graph: &Graph<f64>) -> String {
    let n = graph.node_count();
    let live = live_set(graph);

    // folded[i] = Some(v) when slot i is a compile-time constant.
    let mut folded: Vec<Option<f64>> = vec![None; n];
    // Value numbering for CSE: canonical slot per (op, a, b, imm) key.
    let mut seen: HashMap<(u8, Slot, Slot, u64), Slot> = HashMap::new();
    let mut canon: Vec<Slot> = (0..n as Slot).collect();

    let mut body = String::new();

    let mut next_input = 0usize;
    for i in 0..n {
        let s = i as Slot;
        let op = graph.opcode(s);

        if op == OpCode::Input {
            let _ = writeln!(body, "    values[{i}] = inputs[{next_input}];");
            next_input += 1;
            continue;
        }
        if !live[i] {
            continue;
        }

        if op == OpCode::Constant {
            let pool_idx = graph.immediate(s) as usize;
            let v = graph.pool_value(pool_idx);
            folded[i] = Some(v);
            let _ = writeln!(body, "    values[{i}] = {};", c_literal(v));
            continue;
        }

        let (a, b, _) = graph.operands(s);
        let imm = graph.immediate(s);
        let (ca, cb) = (canon[a as usize], canon[b as usize]);

        // Constant folding: every operand known at compile time.
        let fold = match op.arity() {
            1 => folded[a as usize].map(|va| opcode::eval_forward(op, va, 0.0, imm)),
            _ => match (folded[a as usize], folded[b as usize]) {
                (Some(va), Some(vb)) => Some(opcode::eval_forward(op, va, vb, imm)),
                _ => None,
            },
        };
        if let Some(v) = fold {
            folded[i] = Some(v);
            let _ = writeln!(body, "    values[{i}] = {};", c_literal(v));
            continue;
        }

        // CSE: reuse the first occurrence of an identical computation.
        // Operand order is normalised for Add/Mul only; Min/Max keep their
        // tie- and NaN-sensitive operand order.
        let (ka, kb) = match op {
            OpCode::Add | OpCode::Mul if cb < ca => (cb, ca),
            _ if op.arity() == 2 => (ca, cb),
            _ => (ca, 0),
        };
        let key = (op as u8, ka, kb, imm.to_bits());
        if let Some(&first) = seen.get(&key) {
            canon[i] = first;
            let _ = writeln!(body, "    values[{i}] = values[{first}];");
            continue;
        }
        seen.insert(key, s);

        let expr = render_expr(op, ca as usize, cb as usize, imm);
        let _ = writeln!(body, "    values[{i}] = {expr};");
    }

    format!(
        "#include <math.h>\n\nvoid kernel_main(const double* inputs, double* values)\n{{\n{body}}}\n"
    )
}

/// C expression for one non-leaf node.
fn render_expr(op: OpCode, a: usize, b: usize, imm: f64) -> String {
    let va = format!("values[{a}]");
    let vb = format!("values[{b}]");
    let s = c_literal(imm);
    match op {
        OpCode::Input | OpCode::Constant => unreachable!("leaves are rendered by the caller"),

        OpCode::Neg => format!("-{va}"),
        OpCode::Abs => format!("fabs({va})"),
        OpCode::Sqrt => format!("sqrt({va})"),
        OpCode::Cbrt => format!("cbrt({va})"),
        OpCode::Exp => format!("exp({va})"),
        OpCode::Log => format!("log({va})"),
        OpCode::Log10 => format!("log10({va})"),
        OpCode::Log2 => format!("log2({va})"),
        OpCode::Sin => format!("sin({va})"),
        OpCode::Cos => format!("cos({va})"),
        OpCode::Tan => format!("tan({va})"),
        OpCode::Sinh => format!("sinh({va})"),
        OpCode::Cosh => format!("cosh({va})"),
        OpCode::Tanh => format!("tanh({va})"),
        OpCode::Erf => format!("erf({va})"),
        OpCode::Asin => format!("asin({va})"),
        OpCode::Acos => format!("acos({va})"),
        OpCode::Atan => format!("atan({va})"),

        OpCode::Add => format!("{va} + {vb}"),
        OpCode::Sub => format!("{va} - {vb}"),
        OpCode::Mul => format!("{va} * {vb}"),
        OpCode::Div => format!("{va} / {vb}"),
        OpCode::Pow => format!("pow({va}, {vb})"),
        OpCode::Atan2 => format!("atan2({va}, {vb})"),
        // The interpreter's exact tie rule, not fmin/fmax.
        OpCode::Min => format!("({va} <= {vb}) ? {va} : {vb}"),
        OpCode::Max => format!("({va} >= {vb}) ? {va} : {vb}"),

        OpCode::ScalarAdd => format!("{va} + {s}"),
        OpCode::ScalarSub1 => format!("{s} - {va}"),
        OpCode::ScalarSub2 => format!("{va} - {s}"),
        OpCode::ScalarMul => format!("{va} * {s}"),
        OpCode::ScalarDiv1 => format!("{s} / {va}"),
        OpCode::ScalarDiv2 => format!("{va} / {s}"),
        OpCode::ScalarPow1 => format!("pow({s}, {va})"),
        OpCode::ScalarPow2 => format!("pow({va}, {s})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> Graph<f64> {
        let mut g: Graph<f64> = Graph::new();
        let x = g.add_input();
        let t = g.add_node(OpCode::ScalarMul, x, 0, 0, 3.0);
        let y = g.add_node(OpCode::ScalarAdd, t, 0, 0, 2.0);
        g.mark_output(y);
        g
    }

    #[test]
    fn renders_one_statement_per_live_node() {
        let src = render_kernel(&sample_graph());
        assert!(src.contains("values[0] = inputs[0];"));
        assert!(src.contains("values[1] = values[0] * 3.0;"));
        assert!(src.contains("values[2] = values[1] + 2.0;"));
    }

    #[test]
    fn dead_nodes_are_skipped() {
        let mut g = sample_graph();
        let orphan = g.add_node(OpCode::Exp, 0, 0, 0, 0.0);
        let src = render_kernel(&g);
        assert!(!src.contains(&format!("values[{orphan}]")));
    }

    #[test]
    fn duplicate_subexpressions_become_copies() {
        let mut g: Graph<f64> = Graph::new();
        let x = g.add_input();
        let s1 = g.add_node(OpCode::Sin, x, 0, 0, 0.0);
        let s2 = g.add_node(OpCode::Sin, x, 0, 0, 0.0);
        let y = g.add_node(OpCode::Add, s1, s2, 0, 0.0);
        g.mark_output(y);
        let src = render_kernel(&g);
        assert!(src.contains("values[2] = values[1];"));
        assert_eq!(src.matches("sin(").count(), 1);
    }

    #[test]
    fn constant_operations_fold_to_literals() {
        let mut g: Graph<f64> = Graph::new();
        let x = g.add_input();
        let c = g.add_constant(2.0);
        let e = g.add_node(OpCode::Exp, c, 0, 0, 0.0);
        let y = g.add_node(OpCode::Mul, x, e, 0, 0.0);
        g.mark_output(y);
        let src = render_kernel(&g);
        assert!(!src.contains("exp("));
        assert!(src.contains(&format!("values[2] = {};", c_literal(2.0f64.exp()))));
    }

    #[test]
    fn literals_round_trip() {
        assert_eq!(c_literal(5.0), "5.0");
        assert_eq!(c_literal(-0.5), "-0.5");
        assert_eq!(c_literal(f64::INFINITY), "(1.0/0.0)");
        assert_eq!(c_literal(f64::NAN), "(0.0/0.0)");
    }
}
