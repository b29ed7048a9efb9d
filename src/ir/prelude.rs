// Copyright (c) 2017-2021 Fabian Schuiki

//! Re-exports of commonly used IR items.

pub use crate::ir::{
    Arg, Block, DataFlowGraph, ExtUnit, FunctionLayout, Inst, InstData, ModUnit, Module, Opcode,
    Signature, UnitBuilder, UnitData, UnitName, Use, Value, ValueData,
};
