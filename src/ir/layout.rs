// Copyright (c) 2017-2021 Fabian Schuiki

//! Instruction and BB ordering.

use crate::{
    ir::{Block, Inst},
    table::SecondaryTable,
};
use std::collections::HashMap;

/// Determines the order of instructions and BBs in a function.
///
/// Instructions are kept in dense per-block vectors. Bulk deletion goes
/// through `retain_insts`, which marks and compacts in one sweep rather than
/// unlinking instructions one by one.
#[derive(Debug, Default, Clone)]
pub struct FunctionLayout {
    /// The BBs in layout order.
    bbs: Vec<Block>,
    /// The instructions of each BB in layout order.
    insts: SecondaryTable<Block, Vec<Inst>>,
    /// Lookup table to find the BB that contains an instruction.
    inst_map: HashMap<Inst, Block>,
}

impl FunctionLayout {
    /// Create a new function layout.
    pub fn new() -> Self {
        Default::default()
    }

    /// Return an iterator over all BBs in layout order.
    pub fn blocks<'a>(&'a self) -> impl Iterator<Item = Block> + 'a {
        self.bbs.iter().cloned()
    }

    /// Return the number of BBs in the layout.
    pub fn num_blocks(&self) -> usize {
        self.bbs.len()
    }

    /// Check whether a BB is part of the layout.
    pub fn is_block_inserted(&self, bb: Block) -> bool {
        self.insts.contains(bb)
    }

    /// Get the first BB in the layout.
    pub fn first_block(&self) -> Option<Block> {
        self.bbs.first().cloned()
    }

    /// Get the entry block of the function.
    ///
    /// Panics if the function has no blocks.
    pub fn entry(&self) -> Block {
        self.first_block().expect("entry block is required")
    }

    /// Append a BB to the end of the function.
    pub fn append_block(&mut self, bb: Block) {
        self.insts.add(bb, vec![]);
        self.bbs.push(bb);
    }

    /// Remove a BB from the function.
    ///
    /// The instructions the BB contains are removed from the layout as well.
    pub fn remove_block(&mut self, bb: Block) {
        let insts = self.insts.remove(bb).expect("block not inserted");
        for inst in insts {
            self.inst_map.remove(&inst);
        }
        self.bbs.retain(|&b| b != bb);
    }

    /// Return an iterator over the instructions of a BB in layout order.
    pub fn insts<'a>(&'a self, bb: Block) -> impl Iterator<Item = Inst> + 'a {
        self.insts[bb].iter().cloned()
    }

    /// Return an iterator over all instructions of the function in layout
    /// order.
    pub fn all_insts<'a>(&'a self) -> impl Iterator<Item = Inst> + 'a {
        self.bbs.iter().flat_map(move |&bb| self.insts(bb))
    }

    /// Check whether an instruction is part of the layout.
    pub fn is_inst_inserted(&self, inst: Inst) -> bool {
        self.inst_map.contains_key(&inst)
    }

    /// Get the BB which contains `inst`.
    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.inst_map.get(&inst).cloned()
    }

    /// Get the first instruction in a BB.
    pub fn first_inst(&self, bb: Block) -> Option<Inst> {
        self.insts[bb].first().cloned()
    }

    /// Get the last instruction in a BB.
    pub fn last_inst(&self, bb: Block) -> Option<Inst> {
        self.insts[bb].last().cloned()
    }

    /// Get the terminator instruction of a BB.
    ///
    /// This is simply the last instruction in the BB; whether it actually is a
    /// terminator is up to the data flow graph to decide.
    pub fn terminator(&self, bb: Block) -> Inst {
        match self.last_inst(bb) {
            Some(inst) => inst,
            None => panic!("block {} has no terminator", bb),
        }
    }

    /// Append an instruction to the end of a BB.
    pub fn append_inst(&mut self, inst: Inst, bb: Block) {
        self.map_inst(inst, bb);
        self.insts[bb].push(inst);
    }

    /// Prepend an instruction to the beginning of a BB.
    pub fn prepend_inst(&mut self, inst: Inst, bb: Block) {
        self.map_inst(inst, bb);
        self.insts[bb].insert(0, inst);
    }

    /// Insert an instruction after another instruction.
    pub fn insert_inst_after(&mut self, inst: Inst, after: Inst) {
        let (bb, pos) = self.locate(after);
        self.map_inst(inst, bb);
        self.insts[bb].insert(pos + 1, inst);
    }

    /// Insert an instruction before another instruction.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        let (bb, pos) = self.locate(before);
        self.map_inst(inst, bb);
        self.insts[bb].insert(pos, inst);
    }

    /// Remove an instruction from the function.
    pub fn remove_inst(&mut self, inst: Inst) {
        let (bb, pos) = self.locate(inst);
        self.insts[bb].remove(pos);
        self.inst_map.remove(&inst);
    }

    /// Retain only the instructions of a BB for which `keep` returns true.
    ///
    /// The relative order of the retained instructions is preserved. Returns
    /// the removed instructions in their original order.
    pub fn retain_insts(&mut self, bb: Block, mut keep: impl FnMut(Inst) -> bool) -> Vec<Inst> {
        let mut removed = vec![];
        self.insts[bb].retain(|&inst| {
            let k = keep(inst);
            if !k {
                removed.push(inst);
            }
            k
        });
        for inst in &removed {
            self.inst_map.remove(inst);
        }
        removed
    }

    /// Find the BB and position of an instruction.
    fn locate(&self, inst: Inst) -> (Block, usize) {
        let bb = match self.inst_map.get(&inst) {
            Some(&bb) => bb,
            None => panic!("inst {} not inserted", inst),
        };
        let pos = self.insts[bb]
            .iter()
            .position(|&i| i == inst)
            .expect("inst map out of sync with layout");
        (bb, pos)
    }

    /// Add a mapping from an instruction to the block that contains it.
    fn map_inst(&mut self, inst: Inst, bb: Block) {
        if let Some(old_bb) = self.inst_map.insert(inst, bb) {
            panic!(
                "inst {} already inserted in {}, now being inserted into {}",
                inst, old_bb, bb
            );
        }
    }
}
