// Copyright (c) 2017-2021 Fabian Schuiki

//! Representation of functions.

use crate::ir::{
    Arg, Block, ControlFlowGraph, DataFlowGraph, ExtUnit, ExtUnitData, FunctionLayout, Inst,
    InstBuilder, InstData, Signature, Use, Value,
};
use std::{collections::HashSet, ops::Deref};

/// The global name of a function, like `@foo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitName(String);

impl UnitName {
    /// Create a new global unit name.
    pub fn global(name: impl Into<String>) -> Self {
        UnitName(name.into())
    }

    /// Get the underlying name of the unit, without the leading `@`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnitName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A function.
///
/// Owns all instructions, values, and blocks of the function body.
#[derive(Debug, Clone)]
pub struct UnitData {
    /// The name of the function.
    pub name: UnitName,
    /// The arguments of the function.
    pub sig: Signature,
    /// The instructions and values of the function.
    pub dfg: DataFlowGraph,
    /// The basic blocks of the function.
    pub cfg: ControlFlowGraph,
    /// The order of blocks and instructions.
    pub layout: FunctionLayout,
}

impl UnitData {
    /// Create a new function.
    pub fn new(name: UnitName, sig: Signature) -> Self {
        let mut data = Self {
            name,
            sig,
            dfg: DataFlowGraph::new(),
            cfg: ControlFlowGraph::new(),
            layout: FunctionLayout::new(),
        };
        data.dfg.make_args_for_signature(&data.sig);
        data
    }

    /// Get the function's name.
    pub fn name(&self) -> &UnitName {
        &self.name
    }

    /// Get the function's signature.
    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    /// Get the function's DFG.
    pub fn dfg(&self) -> &DataFlowGraph {
        &self.dfg
    }

    /// Get the function's CFG.
    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    /// Get the function's layout.
    pub fn func_layout(&self) -> &FunctionLayout {
        &self.layout
    }

    /// Return an iterator over the function's argument values.
    pub fn args<'a>(&'a self) -> impl Iterator<Item = Value> + 'a {
        self.sig.args().map(move |arg| self.dfg.arg_value(arg))
    }

    /// Return the value of the argument at position `pos`.
    pub fn input_arg(&self, pos: usize) -> Value {
        let arg = self
            .sig
            .args()
            .nth(pos)
            .unwrap_or_else(|| panic!("{} has no argument {}", self.name, pos));
        self.dfg.arg_value(arg)
    }

    /// Return the value of an argument.
    pub fn arg_value(&self, arg: Arg) -> Value {
        self.dfg.arg_value(arg)
    }

    /// Return an iterator over the blocks in layout order.
    pub fn blocks<'a>(&'a self) -> impl Iterator<Item = Block> + 'a {
        self.layout.blocks()
    }

    /// Return an iterator over the instructions of a block in layout order.
    pub fn insts<'a>(&'a self, bb: Block) -> impl Iterator<Item = Inst> + 'a {
        self.layout.insts(bb)
    }

    /// Return an iterator over all instructions in layout order.
    pub fn all_insts<'a>(&'a self) -> impl Iterator<Item = Inst> + 'a {
        self.layout.all_insts()
    }

    /// Get the name of a block.
    pub fn get_block_name(&self, bb: Block) -> Option<&str> {
        self.cfg.get_name(bb)
    }

    /// Get the instruction data.
    pub fn inst_data(&self, inst: Inst) -> &InstData {
        &self.dfg[inst]
    }

    /// Check whether an instruction produces a result.
    pub fn has_result(&self, inst: Inst) -> bool {
        self.dfg.has_result(inst)
    }

    /// Return the result of an instruction.
    pub fn inst_result(&self, inst: Inst) -> Value {
        self.dfg.inst_result(inst)
    }

    /// Return the result of an instruction, if it has one.
    pub fn get_inst_result(&self, inst: Inst) -> Option<Value> {
        self.dfg.get_inst_result(inst)
    }

    /// Return the instruction that produces a value, if any.
    pub fn get_value_inst(&self, value: Value) -> Option<Inst> {
        self.dfg.get_value_inst(value)
    }

    /// Get the name of a value.
    pub fn get_name(&self, value: Value) -> Option<&str> {
        self.dfg.get_name(value)
    }

    /// Return the uses of a value.
    pub fn uses(&self, value: Value) -> &[Use] {
        self.dfg.uses(value)
    }

    /// Check whether a value is being read.
    pub fn has_uses(&self, value: Value) -> bool {
        self.dfg.has_uses(value)
    }

    /// Get the name of an external function.
    pub fn extern_name(&self, ext: ExtUnit) -> &UnitName {
        &self.dfg[ext].name
    }

    /// Panic if the function is not well-formed.
    pub fn verify(&self) {
        let mut verifier = crate::verifier::Verifier::new();
        verifier.verify_unit(self);
        match verifier.finish() {
            Ok(()) => (),
            Err(errs) => {
                eprintln!("");
                eprintln!("Verified function:");
                eprintln!("{}", self);
                eprintln!("");
                eprintln!("Verification errors:");
                eprintln!("{}", errs);
                panic!("verification failed");
            }
        }
    }
}

impl std::fmt::Display for UnitData {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut buffer = Vec::new();
        crate::assembly::Writer::new(&mut buffer)
            .write_unit(self)
            .map_err(|_| std::fmt::Error)?;
        let text = String::from_utf8(buffer).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", text.trim_end())
    }
}

/// The position where new instructions will be inserted into a function.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum InsertPos {
    None,
    Append(Block),
    Prepend(Block),
    After(Inst),
    Before(Inst),
}

/// A mutable function.
///
/// Wraps the data of a function and keeps track of where new instructions are
/// inserted. Derefs to `UnitData` for read access.
pub struct UnitBuilder<'a> {
    /// The function being modified.
    data: &'a mut UnitData,
    /// The position where we are currently inserting instructions.
    pos: InsertPos,
}

impl<'a> Deref for UnitBuilder<'a> {
    type Target = UnitData;
    fn deref(&self) -> &UnitData {
        self.data
    }
}

impl<'a> UnitBuilder<'a> {
    /// Create a new builder for a function.
    pub fn new(data: &'a mut UnitData) -> Self {
        Self {
            data,
            pos: InsertPos::None,
        }
    }

    /// Get the function's mutable data.
    #[inline(always)]
    pub fn data(&mut self) -> &mut UnitData {
        self.data
    }

    /// Add a new instruction using an `InstBuilder`.
    pub fn ins<'b>(&'b mut self) -> InstBuilder<'a, 'b> {
        InstBuilder::new(self)
    }

    /// Add a new instruction at the current insertion position.
    pub fn build_inst(&mut self, data: InstData) -> Inst {
        let inst = self.data.dfg.add_inst(data);
        let layout = &mut self.data.layout;
        match self.pos {
            InsertPos::None => panic!("no insertion position set for {}", inst),
            InsertPos::Append(bb) => layout.append_inst(inst, bb),
            InsertPos::Prepend(bb) => {
                layout.prepend_inst(inst, bb);
                self.pos = InsertPos::After(inst);
            }
            InsertPos::After(other) => {
                layout.insert_inst_after(inst, other);
                self.pos = InsertPos::After(inst);
            }
            InsertPos::Before(other) => layout.insert_inst_before(inst, other),
        }
        inst
    }

    /// Remove an instruction.
    ///
    /// The instruction's result must no longer be in use.
    pub fn remove_inst(&mut self, inst: Inst) {
        self.fix_pos_for_removal(inst);
        self.data.layout.remove_inst(inst);
        self.data.dfg.remove_inst(inst);
    }

    /// Remove a set of instructions from a BB in one sweep.
    ///
    /// Every reference to the result of a removed instruction is replaced with
    /// the function's undefined value beforehand. Returns the removed
    /// instructions in their original order.
    pub fn remove_insts_where(
        &mut self,
        bb: Block,
        mut remove: impl FnMut(Inst) -> bool,
    ) -> Vec<Inst> {
        let doomed: HashSet<Inst> = self.data.layout.insts(bb).filter(|&i| remove(i)).collect();
        match self.pos {
            InsertPos::After(i) | InsertPos::Before(i) if doomed.contains(&i) => {
                self.pos = InsertPos::Append(bb);
            }
            _ => (),
        }
        for inst in self.data.layout.insts(bb).collect::<Vec<_>>() {
            if !doomed.contains(&inst) {
                continue;
            }
            if let Some(value) = self.data.dfg.get_inst_result(inst) {
                if self.data.dfg.has_uses(value) {
                    let undef = self.data.dfg.undef();
                    self.data.dfg.replace_use(value, undef);
                }
            }
        }
        let removed = {
            let doomed = &doomed;
            self.data
                .layout
                .retain_insts(bb, move |inst| !doomed.contains(&inst))
        };
        for &inst in &removed {
            self.data.dfg.remove_inst(inst);
        }
        removed
    }

    /// Create a new BB.
    pub fn block(&mut self) -> Block {
        let bb = self.data.cfg.add_block();
        self.data.layout.append_block(bb);
        bb
    }

    /// Create a new named BB.
    pub fn named_block(&mut self, name: impl Into<String>) -> Block {
        let bb = self.block();
        self.data.cfg.set_name(bb, name.into());
        bb
    }

    /// Remove a BB.
    ///
    /// All instructions in the BB are removed as well. Any remaining
    /// references to their results are replaced with the undefined value.
    pub fn remove_block(&mut self, bb: Block) {
        let insts: Vec<_> = self.data.layout.insts(bb).collect();
        for &inst in &insts {
            self.fix_pos_for_removal(inst);
            if let Some(value) = self.data.dfg.get_inst_result(inst) {
                let undef = self.data.dfg.undef();
                self.data.dfg.replace_use(value, undef);
            }
        }
        if self.pos == InsertPos::Append(bb) || self.pos == InsertPos::Prepend(bb) {
            self.pos = InsertPos::None;
        }
        self.data.layout.remove_block(bb);
        self.data.cfg.remove_block(bb);
        for inst in insts {
            self.data.dfg.remove_inst(inst);
        }
    }

    /// Append all following instructions to the end of `bb`.
    pub fn append_to(&mut self, bb: Block) {
        self.pos = InsertPos::Append(bb);
    }

    /// Prepend all following instructions to the beginning of `bb`.
    pub fn prepend_to(&mut self, bb: Block) {
        self.pos = InsertPos::Prepend(bb);
    }

    /// Insert all following instructions after `inst`.
    pub fn insert_after(&mut self, inst: Inst) {
        self.pos = InsertPos::After(inst);
    }

    /// Insert all following instructions before `inst`.
    pub fn insert_before(&mut self, inst: Inst) {
        self.pos = InsertPos::Before(inst);
    }

    /// Get the mutable DFG of the function being built.
    pub fn dfg_mut(&mut self) -> &mut DataFlowGraph {
        &mut self.data.dfg
    }

    /// Get the mutable layout of the function being built.
    pub fn func_layout_mut(&mut self) -> &mut FunctionLayout {
        &mut self.data.layout
    }

    /// Import an external function for use within this function.
    ///
    /// Importing the same name twice yields the same `ExtUnit`.
    pub fn add_extern(&mut self, name: UnitName) -> ExtUnit {
        self.data.dfg.intern_ext_unit(ExtUnitData { name })
    }

    /// Replace all uses of a value with another.
    pub fn replace_use(&mut self, from: Value, to: Value) -> usize {
        self.data.dfg.replace_use(from, to)
    }

    /// Return the undefined value of the function.
    pub fn undef(&mut self) -> Value {
        self.data.dfg.undef()
    }

    /// Set the name of a value.
    pub fn set_name(&mut self, value: Value, name: String) {
        self.data.dfg.set_name(value, name)
    }

    /// Clear the name of a value.
    pub fn clear_name(&mut self, value: Value) -> Option<String> {
        self.data.dfg.clear_name(value)
    }

    /// Move the insertion position off an instruction that is about to be
    /// removed.
    fn fix_pos_for_removal(&mut self, inst: Inst) {
        match self.pos {
            InsertPos::After(i) if i == inst => {
                self.pos = match self.data.layout.inst_block(inst) {
                    Some(bb) => {
                        let prev = self
                            .data
                            .layout
                            .insts(bb)
                            .take_while(|&i| i != inst)
                            .last();
                        match prev {
                            Some(prev) => InsertPos::After(prev),
                            None => InsertPos::Prepend(bb),
                        }
                    }
                    None => InsertPos::None,
                };
            }
            InsertPos::Before(i) if i == inst => {
                self.pos = match self.data.layout.inst_block(inst) {
                    Some(bb) => {
                        let next = self
                            .data
                            .layout
                            .insts(bb)
                            .skip_while(|&i| i != inst)
                            .nth(1);
                        match next {
                            Some(next) => InsertPos::Before(next),
                            None => InsertPos::Append(bb),
                        }
                    }
                    None => InsertPos::None,
                };
            }
            _ => (),
        }
    }
}
