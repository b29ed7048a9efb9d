// Copyright (c) 2017-2021 Fabian Schuiki

//! Representation of instructions.
//!
//! This module implements the various instructions of the intermediate
//! representation, together with the `InstBuilder` used to construct them.

use crate::ir::{Block, ExtUnit, Inst, UnitBuilder, Value};

/// A temporary object used to construct a single instruction.
pub struct InstBuilder<'a, 'b> {
    builder: &'b mut UnitBuilder<'a>,
    name: Option<String>,
}

impl<'a, 'b> InstBuilder<'a, 'b> {
    /// Create a new instruction builder that inserts into `builder`.
    pub fn new(builder: &'b mut UnitBuilder<'a>) -> Self {
        Self {
            builder,
            name: None,
        }
    }

    /// Assign a name to the instruction being built.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<'a, 'b> InstBuilder<'a, 'b> {
    /// `a = const imm`
    pub fn const_int(&mut self, imm: i64) -> Value {
        let inst = self.build(InstData::ConstInt {
            opcode: Opcode::ConstInt,
            imm,
        });
        self.inst_result(inst)
    }

    /// `a = alias x`
    pub fn alias(&mut self, x: Value) -> Value {
        let inst = self.build_unary(Opcode::Alias, x);
        self.inst_result(inst)
    }

    /// `a = not x`
    pub fn not(&mut self, x: Value) -> Value {
        let inst = self.build_unary(Opcode::Not, x);
        self.inst_result(inst)
    }

    /// `a = neg x`
    pub fn neg(&mut self, x: Value) -> Value {
        let inst = self.build_unary(Opcode::Neg, x);
        self.inst_result(inst)
    }

    /// `a = add x, y`
    pub fn add(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Add, x, y)
    }

    /// `a = sub x, y`
    pub fn sub(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Sub, x, y)
    }

    /// `a = mul x, y`
    pub fn mul(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Mul, x, y)
    }

    /// `a = div x, y`
    pub fn div(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Div, x, y)
    }

    /// `a = and x, y`
    pub fn and(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::And, x, y)
    }

    /// `a = or x, y`
    pub fn or(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Or, x, y)
    }

    /// `a = xor x, y`
    pub fn xor(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Xor, x, y)
    }

    /// `a = eq x, y`
    pub fn eq(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Eq, x, y)
    }

    /// `a = neq x, y`
    pub fn neq(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Neq, x, y)
    }

    /// `a = lt x, y`
    pub fn lt(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Lt, x, y)
    }

    /// `a = le x, y`
    pub fn le(&mut self, x: Value, y: Value) -> Value {
        self.binary(Opcode::Le, x, y)
    }

    /// Build a binary instruction of the given opcode.
    pub fn binary(&mut self, opcode: Opcode, x: Value, y: Value) -> Value {
        assert!(opcode.is_binary(), "{} is not a binary opcode", opcode);
        let inst = self.build(InstData::Binary {
            opcode,
            args: [x, y],
        });
        self.inst_result(inst)
    }

    /// `a = call ext (args...)`
    pub fn call(&mut self, ext: ExtUnit, args: Vec<Value>) -> Value {
        let inst = self.build(InstData::Call {
            opcode: Opcode::Call,
            ext,
            args,
        });
        self.inst_result(inst)
    }

    /// `ret`
    pub fn ret(&mut self) -> Inst {
        self.build(InstData::Nullary { opcode: Opcode::Ret })
    }

    /// `ret x`
    pub fn ret_value(&mut self, x: Value) -> Inst {
        self.build_unary(Opcode::RetValue, x)
    }

    /// `br bb`
    pub fn br(&mut self, bb: Block) -> Inst {
        self.build(InstData::Jump {
            opcode: Opcode::Br,
            bbs: [bb],
        })
    }

    /// `br x, bb0, bb1`
    ///
    /// Branches to `bb0` if `x` is non-zero, and to `bb1` otherwise.
    pub fn br_cond(&mut self, x: Value, bb0: Block, bb1: Block) -> Inst {
        self.build(InstData::Branch {
            opcode: Opcode::BrCond,
            args: [x],
            bbs: [bb0, bb1],
        })
    }

    /// `a = opcode x`
    fn build_unary(&mut self, opcode: Opcode, x: Value) -> Inst {
        self.build(InstData::Unary { opcode, args: [x] })
    }

    /// Convenience forward to `UnitBuilder`.
    fn build(&mut self, data: InstData) -> Inst {
        let inst = self.builder.build_inst(data);
        if let Some(name) = self.name.take() {
            if let Some(value) = self.builder.get_inst_result(inst) {
                self.builder.set_name(value, name);
            }
        }
        inst
    }

    /// Convenience forward to `UnitData`.
    fn inst_result(&self, inst: Inst) -> Value {
        self.builder.inst_result(inst)
    }
}

/// An instruction format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum InstData {
    /// `a = const imm`
    ConstInt { opcode: Opcode, imm: i64 },
    /// `opcode`
    Nullary { opcode: Opcode },
    /// `a = opcode args[0]`
    Unary { opcode: Opcode, args: [Value; 1] },
    /// `a = opcode args[0], args[1]`
    Binary { opcode: Opcode, args: [Value; 2] },
    /// `a = call ext (args...)`
    Call {
        opcode: Opcode,
        ext: ExtUnit,
        args: Vec<Value>,
    },
    /// `opcode bbs[0]`
    Jump { opcode: Opcode, bbs: [Block; 1] },
    /// `opcode args[0], bbs[0], bbs[1]`
    Branch {
        opcode: Opcode,
        args: [Value; 1],
        bbs: [Block; 2],
    },
}

impl InstData {
    /// Get the opcode of the instruction.
    pub fn opcode(&self) -> Opcode {
        match *self {
            InstData::ConstInt { opcode, .. } => opcode,
            InstData::Nullary { opcode, .. } => opcode,
            InstData::Unary { opcode, .. } => opcode,
            InstData::Binary { opcode, .. } => opcode,
            InstData::Call { opcode, .. } => opcode,
            InstData::Jump { opcode, .. } => opcode,
            InstData::Branch { opcode, .. } => opcode,
        }
    }

    /// Get the arguments of an instruction.
    pub fn args(&self) -> &[Value] {
        match self {
            InstData::ConstInt { .. } => &[],
            InstData::Nullary { .. } => &[],
            InstData::Unary { args, .. } => args,
            InstData::Binary { args, .. } => args,
            InstData::Call { args, .. } => args,
            InstData::Jump { .. } => &[],
            InstData::Branch { args, .. } => args,
        }
    }

    /// Mutable access to the arguments of an instruction.
    pub fn args_mut(&mut self) -> &mut [Value] {
        match self {
            InstData::ConstInt { .. } => &mut [],
            InstData::Nullary { .. } => &mut [],
            InstData::Unary { args, .. } => args,
            InstData::Binary { args, .. } => args,
            InstData::Call { args, .. } => args,
            InstData::Jump { .. } => &mut [],
            InstData::Branch { args, .. } => args,
        }
    }

    /// Get the BBs of an instruction.
    pub fn blocks(&self) -> &[Block] {
        match self {
            InstData::Jump { bbs, .. } => bbs,
            InstData::Branch { bbs, .. } => bbs,
            _ => &[],
        }
    }

    /// Return the external function called by the instruction, if any.
    pub fn get_ext_unit(&self) -> Option<ExtUnit> {
        match *self {
            InstData::Call { ext, .. } => Some(ext),
            _ => None,
        }
    }

    /// Return the constant value of a `const` instruction.
    pub fn get_const_int(&self) -> Option<i64> {
        match *self {
            InstData::ConstInt { imm, .. } => Some(imm),
            _ => None,
        }
    }

    /// Replace all uses of a value with another.
    ///
    /// Returns the operand positions that were replaced.
    pub(crate) fn replace_value(&mut self, from: Value, to: Value) -> Vec<usize> {
        let mut replaced = vec![];
        for (i, arg) in self.args_mut().iter_mut().enumerate() {
            if *arg == from {
                *arg = to;
                replaced.push(i);
            }
        }
        replaced
    }
}

/// An instruction opcode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    ConstInt,
    Alias,

    Not,
    Neg,

    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,

    Eq,
    Neq,
    Lt,
    Le,

    Call,

    Ret,
    RetValue,
    Br,
    BrCond,
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match *self {
                Opcode::ConstInt => "const",
                Opcode::Alias => "alias",
                Opcode::Not => "not",
                Opcode::Neg => "neg",
                Opcode::Add => "add",
                Opcode::Sub => "sub",
                Opcode::Mul => "mul",
                Opcode::Div => "div",
                Opcode::And => "and",
                Opcode::Or => "or",
                Opcode::Xor => "xor",
                Opcode::Eq => "eq",
                Opcode::Neq => "neq",
                Opcode::Lt => "lt",
                Opcode::Le => "le",
                Opcode::Call => "call",
                Opcode::Ret => "ret",
                Opcode::RetValue => "ret",
                Opcode::Br => "br",
                Opcode::BrCond => "br",
            }
        )
    }
}

impl Opcode {
    /// Check if this is a unary operator.
    pub fn is_unary(self) -> bool {
        match self {
            Opcode::Alias | Opcode::Not | Opcode::Neg => true,
            _ => false,
        }
    }

    /// Check if this is a binary operator.
    pub fn is_binary(self) -> bool {
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Eq
            | Opcode::Neq
            | Opcode::Lt
            | Opcode::Le => true,
            _ => false,
        }
    }

    /// Check if this instruction is a terminator.
    pub fn is_terminator(self) -> bool {
        match self {
            Opcode::Ret | Opcode::RetValue | Opcode::Br | Opcode::BrCond => true,
            _ => false,
        }
    }

    /// Check if this is a return instruction.
    pub fn is_return(self) -> bool {
        match self {
            Opcode::Ret | Opcode::RetValue => true,
            _ => false,
        }
    }

    /// Check if this is a branch instruction.
    pub fn is_branch(self) -> bool {
        match self {
            Opcode::Br | Opcode::BrCond => true,
            _ => false,
        }
    }

    /// Check if this instruction produces a value.
    pub fn has_result(self) -> bool {
        !self.is_terminator()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableKey;

    #[test]
    fn replace_value_reports_operands() {
        let a = Value::new(0);
        let b = Value::new(1);
        let c = Value::new(2);
        let mut data = InstData::Binary {
            opcode: Opcode::Add,
            args: [a, a],
        };
        assert_eq!(data.replace_value(b, c), Vec::<usize>::new());
        assert_eq!(data.replace_value(a, b), vec![0, 1]);
        assert_eq!(data.args(), &[b, b]);
    }

    #[test]
    fn terminators_have_no_result() {
        for &op in &[Opcode::Ret, Opcode::RetValue, Opcode::Br, Opcode::BrCond] {
            assert!(op.is_terminator());
            assert!(!op.has_result());
        }
        assert!(Opcode::Call.has_result());
        assert!(!Opcode::Call.is_terminator());
        assert!(Opcode::RetValue.is_return());
        assert!(!Opcode::Br.is_return());
    }

    #[test]
    fn operator_classes_are_disjoint() {
        for &op in &[Opcode::Alias, Opcode::Not, Opcode::Neg] {
            assert!(op.is_unary());
            assert!(!op.is_binary());
        }
        assert!(Opcode::Add.is_binary());
        assert!(!Opcode::Add.is_unary());
        assert!(Opcode::Br.is_branch());
        assert!(Opcode::BrCond.is_branch());
        assert!(!Opcode::RetValue.is_branch());
        assert!(!Opcode::Call.is_branch());
    }

    #[test]
    fn const_int_immediate() {
        let data = InstData::ConstInt {
            opcode: Opcode::ConstInt,
            imm: -42,
        };
        assert_eq!(data.get_const_int(), Some(-42));
        let data = InstData::Unary {
            opcode: Opcode::Neg,
            args: [Value::new(0)],
        };
        assert_eq!(data.get_const_int(), None);
    }
}
