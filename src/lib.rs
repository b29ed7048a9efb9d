// Copyright (c) 2017-2021 Fabian Schuiki

//! Dead code elimination on a single-block SSA intermediate representation.
//!
//! This library provides an arena-based SSA IR, a textual assembly format to
//! read and write it, a verifier, and a mark-and-sweep dead code elimination
//! pass together with the small pass framework it plugs into.

#[macro_use]
extern crate log;

pub mod assembly;
pub mod ir;
pub mod opt;
pub mod pass;
pub mod table;
pub mod verifier;
