//! Columnar store for the recorded computation graph.
//!
//! Nodes are identified by [`Slot`] indices assigned in insertion order, so
//! the store is implicitly in topological order: every operand slot is
//! strictly smaller than the slot of the node that uses it. Backends consume
//! the columns directly via the `*_slice` accessors.

use crate::error::Error;
use crate::float::Float;
use crate::opcode::OpCode;

/// Index of a node within one recording.
pub type Slot = u32;

/// Sentinel slot for values not recorded on any graph.
pub const INVALID_SLOT: Slot = Slot::MAX;

/// Per-node flag bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const NONE: NodeFlags = NodeFlags(0);
    /// Node participates in differentiation (inputs and computed nodes).
    pub const ACTIVE: NodeFlags = NodeFlags(1);
    /// Node is unreachable from any output; set by backend liveness passes
    /// on their private copies, never on the recorder's graph.
    pub const DEAD: NodeFlags = NodeFlags(1 << 1);
    /// Node's adjoint is requested (inputs).
    pub const NEEDS_GRADIENT: NodeFlags = NodeFlags(1 << 2);

    #[inline]
    pub fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = NodeFlags;
    #[inline]
    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | rhs.0)
    }
}

/// Columnar DAG of recorded operations.
///
/// All columns are indexed by slot. Unused operand positions hold 0 and are
/// ignored by the opcode; the immediate is opcode-dependent (constant-pool
/// index for [`OpCode::Constant`], scalar operand for the scalar-mixed
/// opcodes, unused otherwise).
pub struct Graph<F: Float> {
    opcodes: Vec<OpCode>,
    operand_a: Vec<Slot>,
    operand_b: Vec<Slot>,
    operand_c: Vec<Slot>,
    immediates: Vec<F>,
    flags: Vec<NodeFlags>,
    const_pool: Vec<F>,
    input_slots: Vec<Slot>,
    output_slots: Vec<Slot>,
}

impl<F: Float> Graph<F> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph {
            opcodes: Vec::new(),
            operand_a: Vec::new(),
            operand_b: Vec::new(),
            operand_c: Vec::new(),
            immediates: Vec::new(),
            flags: Vec::new(),
            const_pool: Vec::new(),
            input_slots: Vec::new(),
            output_slots: Vec::new(),
        }
    }

    #[inline]
    fn push_row(&mut self, op: OpCode, a: Slot, b: Slot, c: Slot, imm: F, flags: NodeFlags) -> Slot {
        let slot = self.opcodes.len() as Slot;
        self.opcodes.push(op);
        self.operand_a.push(a);
        self.operand_b.push(b);
        self.operand_c.push(c);
        self.immediates.push(imm);
        self.flags.push(flags);
        slot
    }

    /// Append an `Input` node and register it on the input list.
    /// Returns the new slot.
    #[inline]
    pub fn add_input(&mut self) -> Slot {
        let slot = self.push_row(
            OpCode::Input,
            0,
            0,
            0,
            F::zero(),
            NodeFlags::ACTIVE | NodeFlags::NEEDS_GRADIENT,
        );
        self.input_slots.push(slot);
        slot
    }

    /// Append an operation node. Returns its slot.
    ///
    /// Callers must respect the opcode's operand arity: operand slots for
    /// used positions must refer to existing nodes. This is the recording
    /// hot path, so it does not validate; backends validate at `compile`.
    #[inline]
    pub fn add_node(&mut self, op: OpCode, a: Slot, b: Slot, c: Slot, imm: F) -> Slot {
        self.push_row(op, a, b, c, imm, NodeFlags::ACTIVE)
    }

    /// Append `value` to the constant pool and a `Constant` node referencing
    /// it. Returns the node's slot.
    ///
    /// Duplicate values are not deduplicated here; backends may fold them.
    #[inline]
    pub fn add_constant(&mut self, value: F) -> Slot {
        let pool_idx = self.const_pool.len();
        self.const_pool.push(value);
        let imm = F::from_usize(pool_idx).unwrap();
        self.push_row(OpCode::Constant, 0, 0, 0, imm, NodeFlags::NONE)
    }

    /// Append `slot` to the output list.
    #[inline]
    pub fn mark_output(&mut self, slot: Slot) {
        self.output_slots.push(slot);
    }

    /// Reset all columns, the constant pool, and the input/output lists.
    pub fn clear(&mut self) {
        self.opcodes.clear();
        self.operand_a.clear();
        self.operand_b.clear();
        self.operand_c.clear();
        self.immediates.clear();
        self.flags.clear();
        self.const_pool.clear();
        self.input_slots.clear();
        self.output_slots.clear();
    }

    // ── Accessors ──

    #[inline]
    pub fn node_count(&self) -> usize {
        self.opcodes.len()
    }

    #[inline]
    pub fn opcode(&self, s: Slot) -> OpCode {
        self.opcodes[s as usize]
    }

    /// The three operand slots of node `s`. Positions beyond the opcode's
    /// arity hold 0.
    #[inline]
    pub fn operands(&self, s: Slot) -> (Slot, Slot, Slot) {
        let i = s as usize;
        (self.operand_a[i], self.operand_b[i], self.operand_c[i])
    }

    #[inline]
    pub fn immediate(&self, s: Slot) -> F {
        self.immediates[s as usize]
    }

    #[inline]
    pub fn flags(&self, s: Slot) -> NodeFlags {
        self.flags[s as usize]
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.input_slots.len()
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.output_slots.len()
    }

    /// Constant-pool entry for a `Constant` node's immediate.
    #[inline]
    pub fn pool_value(&self, pool_idx: usize) -> F {
        self.const_pool[pool_idx]
    }

    // Contiguous column views for backends.

    #[inline]
    pub fn opcodes_slice(&self) -> &[OpCode] {
        &self.opcodes
    }

    #[inline]
    pub fn operand_a_slice(&self) -> &[Slot] {
        &self.operand_a
    }

    #[inline]
    pub fn operand_b_slice(&self) -> &[Slot] {
        &self.operand_b
    }

    #[inline]
    pub fn operand_c_slice(&self) -> &[Slot] {
        &self.operand_c
    }

    #[inline]
    pub fn immediates_slice(&self) -> &[F] {
        &self.immediates
    }

    #[inline]
    pub fn flags_slice(&self) -> &[NodeFlags] {
        &self.flags
    }

    #[inline]
    pub fn const_pool_slice(&self) -> &[F] {
        &self.const_pool
    }

    #[inline]
    pub fn input_slots(&self) -> &[Slot] {
        &self.input_slots
    }

    #[inline]
    pub fn output_slots(&self) -> &[Slot] {
        &self.output_slots
    }

    /// Check structural consistency: operand slots strictly precede their
    /// node, constant-pool references are in bounds, and the input/output
    /// lists only name existing nodes.
    ///
    /// Backends call this from `compile` before trusting the columns.
    pub fn validate(&self) -> Result<(), Error> {
        let n = self.node_count();
        for i in 0..n {
            let op = self.opcodes[i];
            let node = i as u32;
            match op.arity() {
                0 => {}
                1 => {
                    if self.operand_a[i] >= node {
                        return Err(Error::SlotOutOfRange {
                            node,
                            operand: self.operand_a[i],
                        });
                    }
                }
                _ => {
                    if self.operand_a[i] >= node {
                        return Err(Error::SlotOutOfRange {
                            node,
                            operand: self.operand_a[i],
                        });
                    }
                    if self.operand_b[i] >= node {
                        return Err(Error::SlotOutOfRange {
                            node,
                            operand: self.operand_b[i],
                        });
                    }
                }
            }
            if op == OpCode::Constant {
                let pool_idx = self.immediates[i].to_usize().unwrap_or(usize::MAX);
                if pool_idx >= self.const_pool.len() {
                    return Err(Error::SlotOutOfRange {
                        node,
                        operand: pool_idx as u32,
                    });
                }
            }
        }
        for &s in self.input_slots.iter().chain(self.output_slots.iter()) {
            if s as usize >= n {
                return Err(Error::SlotOutOfRange {
                    node: s,
                    operand: s,
                });
            }
        }
        Ok(())
    }
}

impl<F: Float> Default for Graph<F> {
    fn default() -> Self {
        Self::new()
    }
}
