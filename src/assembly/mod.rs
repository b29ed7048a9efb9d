// Copyright (c) 2017-2021 Fabian Schuiki

//! Facilities to emit a module as human-readable assembly, or to parse such
//! assembly back into a module.
//!
//! # Example
//!
//! ```
//! let module = ssadce::assembly::parse_module("
//!     func @answer () {
//!     %entry:
//!         %0 = const 42
//!         ret %0
//!     }
//! ").unwrap();
//! assert_eq!(module.num_units(), 1);
//! ```

use lalrpop_util::lalrpop_mod;

lalrpop_mod!(grammar, "/assembly/grammar.rs");
mod reader;
mod writer;

pub use self::reader::{parse_module, parse_unit, Location};
pub use self::writer::{UnitWriter, Writer};

/// Emit assembly for a module.
pub fn write_module(sink: impl std::io::Write, module: &crate::ir::Module) -> std::io::Result<()> {
    Writer::new(sink).write_module(module)
}

/// Emit assembly for a single function.
pub fn write_unit(sink: impl std::io::Write, unit: &crate::ir::UnitData) -> std::io::Result<()> {
    Writer::new(sink).write_unit(unit)
}
