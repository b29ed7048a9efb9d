// Copyright (c) 2017-2021 Fabian Schuiki

//! Dead Code Elimination

use crate::ir::{prelude::*, ValueData};
use crate::opt::prelude::*;
use crate::table::TableKey;
use hibitset::BitSet;
use std::collections::HashSet;

/// Dead Code Elimination
///
/// This pass implements mark-and-sweep dead code elimination on functions
/// that consist of a single block terminated by a return. The return is the
/// sole root of liveness. Starting from it, instructions are marked useful by
/// following operand and user edges until a fixpoint is reached. Everything
/// left unmarked is removed, and lingering references to the removed results
/// are replaced with the function's `undef` value.
///
/// Instructions with side effects, such as calls, are not kept alive on their
/// own account. A call whose result does not contribute to the return value is
/// removed like any other instruction.
#[derive(Debug, Clone, Default)]
pub struct DeadCodeElim {
    useful: UsefulSet,
    propagation: Propagation,
}

/// The edges followed when propagating liveness.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// Follow operand edges to the defining instructions, and user edges to
    /// every instruction consuming a useful result.
    Bidirectional,
    /// Follow operand edges only. Users of a useful result are not marked
    /// unless they are reachable from the return through operands.
    OperandsOnly,
}

impl Default for Propagation {
    fn default() -> Self {
        Propagation::Bidirectional
    }
}

impl DeadCodeElim {
    /// Create a new pass that propagates liveness in both directions.
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a new pass with a specific propagation mode.
    pub fn with_propagation(propagation: Propagation) -> Self {
        Self {
            useful: Default::default(),
            propagation,
        }
    }

    /// The propagation mode of this pass.
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// The instructions currently marked as useful.
    pub fn useful(&self) -> &UsefulSet {
        &self.useful
    }

    /// Check whether the pass can operate on a function.
    ///
    /// This is the case iff the function consists of exactly one block whose
    /// terminator is a return.
    pub fn is_applicable(&self, unit: &UnitData) -> bool {
        let layout = unit.func_layout();
        if layout.num_blocks() != 1 {
            return false;
        }
        layout
            .first_block()
            .and_then(|bb| layout.last_inst(bb))
            .map(|inst| unit.inst_data(inst).opcode().is_return())
            .unwrap_or(false)
    }

    /// Mark the terminator of the function's entry block as useful.
    pub fn mark_terminator(&mut self, unit: &UnitData) {
        let layout = unit.func_layout();
        if let Some(term) = layout.first_block().and_then(|bb| layout.last_inst(bb)) {
            trace!("Marking terminator {}", term);
            self.useful.insert(term);
        }
    }

    /// Grow the useful set until it is closed under the propagation edges.
    ///
    /// Returns the number of instructions that were added. Calling this again
    /// after a fixpoint has been reached adds nothing.
    pub fn propagate(&mut self, unit: &UnitData) -> usize {
        let dfg = unit.dfg();
        let before = self.useful.len();

        // The useful set doubles as the worklist: everything behind the
        // cursor has had its neighbours marked.
        let mut cursor = 0;
        while let Some(inst) = self.useful.get(cursor) {
            cursor += 1;
            for &arg in unit.inst_data(inst).args() {
                if let Some(def) = dfg.get_value_inst(arg) {
                    if self.useful.insert(def) {
                        trace!("Marking {} as operand of {}", def, inst);
                    }
                }
            }
            if self.propagation == Propagation::OperandsOnly {
                continue;
            }
            if let Some(result) = dfg.get_inst_result(inst) {
                for &Use { inst: user, .. } in dfg.uses(result) {
                    if self.useful.insert(user) {
                        trace!("Marking {} as user of {}", user, inst);
                    }
                }
            }
        }

        self.useful.len() - before
    }

    /// Remove every instruction of the entry block that is not useful.
    ///
    /// Remaining references to the results of removed instructions are
    /// replaced with `undef`. Returns the number of removed instructions.
    pub fn sweep(&mut self, unit: &mut UnitBuilder) -> usize {
        let bb = match unit.func_layout().first_block() {
            Some(bb) => bb,
            None => return 0,
        };
        let useful = &self.useful;
        for inst in unit.insts(bb).filter(|&inst| !useful.contains(inst)) {
            debug!("Removing {} ({})", inst, unit.inst_data(inst).opcode());
        }
        let removed = unit.remove_insts_where(bb, |inst| !useful.contains(inst));
        debug_assert!(
            is_sound(unit, useful),
            "useful instruction refers to a removed one"
        );
        removed.len()
    }

    /// Clear the useful set.
    pub fn reset(&mut self) {
        self.useful.clear();
    }

    /// Run the pass on a single function.
    ///
    /// Does nothing if the pass is disabled in `ctx` or the function does not
    /// have the required shape. Otherwise the function's instruction-level
    /// analyses are invalidated through `ctx`. Returns true if any
    /// instruction was removed.
    pub fn run(&mut self, ctx: &PassContext, unit: &mut UnitBuilder) -> bool {
        if !ctx.is_enabled(Self::NAME) {
            trace!("DCE disabled, skipping {}", unit.name());
            return false;
        }
        debug_assert!(self.useful.is_empty(), "useful set leaked from a previous run");
        if !self.is_applicable(unit) {
            debug!("DCE not applicable to {}", unit.name());
            self.reset();
            return false;
        }
        info!("DCE [{}]", unit.name());
        self.mark_terminator(unit);
        let marked = self.propagate(unit);
        trace!("Propagation marked {} more instructions", marked);
        let removed = self.sweep(unit);
        if removed > 0 {
            debug!("Removed {} instructions from {}", removed, unit.name());
        }
        ctx.invalidate(unit.name(), Invalidation::Instructions);
        self.reset();
        removed > 0
    }
}

impl Pass for DeadCodeElim {
    const NAME: &'static str = "dce";

    fn run_on_unit(&mut self, ctx: &PassContext, unit: &mut UnitBuilder) -> bool {
        self.run(ctx, unit)
    }
}

/// Check that every operand of a useful instruction refers to an argument,
/// `undef`, or the result of another useful instruction.
fn is_sound(unit: &UnitData, useful: &UsefulSet) -> bool {
    let dfg = unit.dfg();
    unit.all_insts().all(|inst| {
        unit.inst_data(inst).args().iter().all(|&arg| {
            if !dfg.contains_value(arg) {
                return false;
            }
            match dfg[arg] {
                ValueData::Inst { inst: def } => {
                    useful.contains(def) && unit.func_layout().is_inst_inserted(def)
                }
                ValueData::Arg { .. } | ValueData::Undef => true,
                ValueData::Placeholder => false,
            }
        })
    })
}

/// The number of indices a `hibitset::BitSet` can hold.
#[cfg(target_pointer_width = "64")]
const BITSET_CAPACITY: usize = 1 << 24;
#[cfg(not(target_pointer_width = "64"))]
const BITSET_CAPACITY: usize = 1 << 20;

/// A set of instructions that remembers insertion order.
///
/// Membership tests go through a bit set indexed by the instruction key, the
/// order is kept in a separate list. Keys beyond the bit set's capacity are
/// tracked in a hash set instead.
#[derive(Debug, Clone, Default)]
pub struct UsefulSet {
    bits: BitSet,
    overflow: HashSet<Inst>,
    order: Vec<Inst>,
}

impl UsefulSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Add an instruction to the set.
    ///
    /// Returns true if the instruction was not yet in the set.
    pub fn insert(&mut self, inst: Inst) -> bool {
        let present = match inst.index() {
            idx if idx < BITSET_CAPACITY => self.bits.add(idx as u32),
            _ => !self.overflow.insert(inst),
        };
        if present {
            return false;
        }
        self.order.push(inst);
        true
    }

    /// Check whether an instruction is in the set.
    pub fn contains(&self, inst: Inst) -> bool {
        match inst.index() {
            idx if idx < BITSET_CAPACITY => self.bits.contains(idx as u32),
            _ => self.overflow.contains(&inst),
        }
    }

    /// Return the instruction inserted at position `idx`.
    pub fn get(&self, idx: usize) -> Option<Inst> {
        self.order.get(idx).cloned()
    }

    /// The number of instructions in the set.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate over the instructions in insertion order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = Inst> + 'a {
        self.order.iter().cloned()
    }

    /// Remove all instructions from the set.
    pub fn clear(&mut self) {
        self.bits.clear();
        self.overflow.clear();
        self.order.clear();
    }
}
