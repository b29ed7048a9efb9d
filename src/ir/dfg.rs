// Copyright (c) 2017-2021 Fabian Schuiki

//! Representation of the data flow in a function.
//!
//! Each function has an associated `DataFlowGraph` which contains all the
//! values, instructions, arguments, and the links between them. The graph
//! keeps both directions of every data dependency: the arguments of an
//! instruction point at the values it reads, and the use list of a value
//! points back at every instruction operand reading it.

use crate::{
    impl_table_indexing,
    ir::{Arg, ExtUnit, ExtUnitData, Inst, InstData, Signature, Use, Value, ValueData},
    table::{PrimaryTable, SecondaryTable},
};
use itertools::Itertools;
use std::collections::HashMap;

/// A data flow graph.
///
/// This is the main container for instructions, values, and the relationship
/// between them.
#[derive(Debug, Default, Clone)]
pub struct DataFlowGraph {
    /// The instructions in the graph.
    pub(crate) insts: PrimaryTable<Inst, InstData>,
    /// The result values produced by instructions.
    pub(crate) results: SecondaryTable<Inst, Value>,
    /// The values in the graph.
    pub(crate) values: PrimaryTable<Value, ValueData>,
    /// The argument values.
    pub(crate) args: SecondaryTable<Arg, Value>,
    /// The external units in the graph.
    pub(crate) ext_units: PrimaryTable<ExtUnit, ExtUnitData>,
    /// The names assigned to values.
    pub(crate) names: HashMap<Value, String>,
    /// The instruction operands reading each value.
    pub(crate) uses: HashMap<Value, Vec<Use>>,
    /// The undefined value, if one has been created.
    pub(crate) undef: Option<Value>,
}

impl_table_indexing!(DataFlowGraph, insts, Inst, InstData);
impl_table_indexing!(DataFlowGraph, values, Value, ValueData);
impl_table_indexing!(DataFlowGraph, ext_units, ExtUnit, ExtUnitData);

impl DataFlowGraph {
    /// Create a new data flow graph.
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a placeholder value.
    ///
    /// This function is intended to be used when a value is referenced before
    /// its definition has been seen.
    pub fn add_placeholder(&mut self) -> Value {
        self.values.add(ValueData::Placeholder)
    }

    /// Remove a placeholder value.
    pub fn remove_placeholder(&mut self, value: Value) {
        assert!(!self.has_uses(value));
        assert!(self[value].is_placeholder());
        self.values.remove(value);
        self.names.remove(&value);
    }

    /// Return the undefined value of this graph, creating it if needed.
    pub fn undef(&mut self) -> Value {
        match self.undef {
            Some(value) => value,
            None => {
                let value = self.values.add(ValueData::Undef);
                self.undef = Some(value);
                value
            }
        }
    }

    /// Return the undefined value of this graph, if one has been created.
    pub fn get_undef(&self) -> Option<Value> {
        self.undef
    }

    /// Check if a value is the undefined value.
    pub fn is_undef(&self, value: Value) -> bool {
        self.undef == Some(value)
    }

    /// Add an instruction.
    ///
    /// Creates a result value if the opcode produces one, and records the
    /// instruction as a user of each of its arguments.
    pub fn add_inst(&mut self, data: InstData) -> Inst {
        let has_result = data.opcode().has_result();
        let args: Vec<Value> = data.args().to_vec();
        let inst = self.insts.add(data);
        if has_result {
            let result = self.values.add(ValueData::Inst { inst });
            self.results.add(inst, result);
        }
        for (operand, arg) in args.into_iter().enumerate() {
            self.add_use(arg, Use { inst, operand });
        }
        inst
    }

    /// Remove an instruction.
    ///
    /// Panics if the instruction's result is still being read.
    pub fn remove_inst(&mut self, inst: Inst) {
        if let Some(value) = self.get_inst_result(inst) {
            assert!(
                !self.has_uses(value),
                "{} removed while its result {} is still in use",
                inst,
                value
            );
            self.results.remove(inst);
            self.values.remove(value);
            self.names.remove(&value);
            self.uses.remove(&value);
        }
        let data = self.insts.remove(inst);
        for (operand, &arg) in data.args().iter().enumerate() {
            self.remove_use(arg, Use { inst, operand });
        }
    }

    /// Check whether an instruction exists in the graph.
    pub fn contains_inst(&self, inst: Inst) -> bool {
        self.insts.contains(inst)
    }

    /// Check whether a value exists in the graph.
    pub fn contains_value(&self, value: Value) -> bool {
        self.values.contains(value)
    }

    /// Returns whether an instruction produces a result.
    pub fn has_result(&self, inst: Inst) -> bool {
        self.results.contains(inst)
    }

    /// Returns the result of an instruction.
    pub fn inst_result(&self, inst: Inst) -> Value {
        self.results[inst]
    }

    /// Returns the result of an instruction, if it has one.
    pub fn get_inst_result(&self, inst: Inst) -> Option<Value> {
        self.results.get(inst).cloned()
    }

    /// Returns the value of an argument.
    pub fn arg_value(&self, arg: Arg) -> Value {
        self.args[arg]
    }

    /// Create values for the arguments in a signature.
    pub(crate) fn make_args_for_signature(&mut self, sig: &Signature) {
        for arg in sig.args() {
            let value = self.values.add(ValueData::Arg { arg });
            self.args.add(arg, value);
        }
    }

    /// Return the instruction that produces `value`.
    ///
    /// Returns `None` for arguments, placeholders, and the undefined value.
    pub fn get_value_inst(&self, value: Value) -> Option<Inst> {
        match self[value] {
            ValueData::Inst { inst, .. } => Some(inst),
            _ => None,
        }
    }

    /// Return the instruction that produces `value`, or panic.
    pub fn value_inst(&self, value: Value) -> Inst {
        match self.get_value_inst(value) {
            Some(inst) => inst,
            None => panic!("value {} not the result of an instruction", value),
        }
    }

    /// Return the name of a value.
    pub fn get_name(&self, value: Value) -> Option<&str> {
        self.names.get(&value).map(String::as_str)
    }

    /// Set the name of a value.
    pub fn set_name(&mut self, value: Value, name: String) {
        self.names.insert(value, name);
    }

    /// Clear the name of a value.
    pub fn clear_name(&mut self, value: Value) -> Option<String> {
        self.names.remove(&value)
    }

    /// Replace all uses of a value with another.
    ///
    /// Returns how many uses were replaced.
    pub fn replace_use(&mut self, from: Value, to: Value) -> usize {
        if from == to {
            return 0;
        }
        let uses = self.uses.remove(&from).unwrap_or_default();
        let mut insts: Vec<Inst> = uses.iter().map(|u| u.inst).collect();
        insts.sort();
        insts.dedup();
        let mut count = 0;
        for inst in insts {
            for operand in self.insts[inst].replace_value(from, to) {
                self.add_use(to, Use { inst, operand });
                count += 1;
            }
        }
        debug_assert_eq!(count, uses.len());
        count
    }

    /// Iterate over all uses of a value.
    pub fn uses(&self, value: Value) -> &[Use] {
        self.uses.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over the instructions reading a value.
    ///
    /// An instruction that reads the value through multiple operands is only
    /// reported once.
    pub fn users<'a>(&'a self, value: Value) -> impl Iterator<Item = Inst> + 'a {
        self.uses(value).iter().map(|u| u.inst).unique()
    }

    /// Check if a value is used.
    pub fn has_uses(&self, value: Value) -> bool {
        !self.uses(value).is_empty()
    }

    /// Return the external unit with the given name, importing it if needed.
    pub(crate) fn intern_ext_unit(&mut self, data: ExtUnitData) -> ExtUnit {
        if let Some((ext, _)) = self.ext_units.iter().find(|(_, d)| d.name == data.name) {
            return ext;
        }
        self.ext_units.add(data)
    }

    /// Return an iterator over the external units in the graph.
    pub fn ext_units<'a>(&'a self) -> impl Iterator<Item = (ExtUnit, &'a ExtUnitData)> + 'a {
        self.ext_units.iter()
    }

    fn add_use(&mut self, value: Value, u: Use) {
        self.uses.entry(value).or_default().push(u);
    }

    fn remove_use(&mut self, value: Value, u: Use) {
        if let Some(uses) = self.uses.get_mut(&value) {
            uses.retain(|&x| x != u);
            if uses.is_empty() {
                self.uses.remove(&value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    fn konst(dfg: &mut DataFlowGraph, imm: i64) -> (Inst, Value) {
        let inst = dfg.add_inst(InstData::ConstInt {
            opcode: Opcode::ConstInt,
            imm,
        });
        (inst, dfg.inst_result(inst))
    }

    #[test]
    fn uses_track_operands() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = konst(&mut dfg, 1);
        let add = dfg.add_inst(InstData::Binary {
            opcode: Opcode::Add,
            args: [a, a],
        });
        assert_eq!(
            dfg.uses(a),
            &[
                Use {
                    inst: add,
                    operand: 0
                },
                Use {
                    inst: add,
                    operand: 1
                }
            ]
        );
        assert_eq!(dfg.users(a).collect::<Vec<_>>(), vec![add]);
        dfg.remove_inst(add);
        assert!(!dfg.has_uses(a));
    }

    #[test]
    fn replace_use_moves_use_list() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = konst(&mut dfg, 1);
        let ret = dfg.add_inst(InstData::Unary {
            opcode: Opcode::RetValue,
            args: [a],
        });
        let undef = dfg.undef();
        assert_eq!(dfg.undef(), undef);
        assert_eq!(dfg.replace_use(a, undef), 1);
        assert!(!dfg.has_uses(a));
        assert_eq!(dfg[ret].args(), &[undef]);
        assert_eq!(dfg.users(undef).collect::<Vec<_>>(), vec![ret]);
        assert!(dfg[undef].is_undef());
    }

    #[test]
    fn users_keep_first_use_order() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = konst(&mut dfg, 1);
        let mut expected = vec![];
        for _ in 0..10_000 {
            expected.push(dfg.add_inst(InstData::Binary {
                opcode: Opcode::Mul,
                args: [a, a],
            }));
        }
        assert_eq!(dfg.uses(a).len(), 20_000);
        assert_eq!(dfg.users(a).collect::<Vec<_>>(), expected);
    }

    #[test]
    #[should_panic(expected = "still in use")]
    fn removing_used_inst_panics() {
        let mut dfg = DataFlowGraph::new();
        let (inst, a) = konst(&mut dfg, 1);
        dfg.add_inst(InstData::Unary {
            opcode: Opcode::Neg,
            args: [a],
        });
        dfg.remove_inst(inst);
    }
}
