// Copyright (c) 2017-2021 Fabian Schuiki

//! Representation of SSA functions.
//!
//! This module implements the intermediate representation the optimization
//! passes operate on. All instructions, values, and blocks of a function live
//! in dense tables and refer to each other through opaque keys.

use crate::impl_table_key;

mod cfg;
mod dfg;
mod inst;
mod layout;
mod module;
pub mod prelude;
mod sig;
mod unit;

pub use self::cfg::*;
pub use self::dfg::*;
pub use self::inst::*;
pub use self::layout::*;
pub use self::module::*;
pub use self::sig::*;
pub use self::unit::*;

impl_table_key! {
    /// An instruction.
    struct Inst(u32) as "i";

    /// A value.
    struct Value(u32) as "v";

    /// A basic block.
    struct Block(u32) as "bb";

    /// An argument of a function.
    struct Arg(u32) as "arg";

    /// An external function called from within a function.
    struct ExtUnit(u32) as "ext";
}

/// Internal table storage for values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    /// The value is the result of an instruction.
    Inst { inst: Inst },
    /// The value is an argument of the function.
    Arg { arg: Arg },
    /// The value is a placeholder for a definition that has not been seen yet.
    Placeholder,
    /// The value is undefined.
    ///
    /// Every function has at most one such value. It takes the place of the
    /// results of deleted instructions that are still referenced.
    Undef,
}

impl ValueData {
    /// Check if the value is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        match self {
            ValueData::Placeholder => true,
            _ => false,
        }
    }

    /// Check if the value is the undefined sentinel.
    pub fn is_undef(&self) -> bool {
        match self {
            ValueData::Undef => true,
            _ => false,
        }
    }
}

/// A single operand of an instruction that reads a value.
///
/// Uses are the inverse edges of instruction arguments: the value at
/// `args()[operand]` of `inst` is the value this use is recorded for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Use {
    /// The instruction reading the value.
    pub inst: Inst,
    /// The position of the value among the instruction's arguments.
    pub operand: usize,
}

/// Another function referenced within a function.
#[derive(Debug, Clone)]
pub struct ExtUnitData {
    /// The name of the referenced function.
    pub name: UnitName,
}
