// Copyright (c) 2017-2021 Fabian Schuiki

//! Optimization passes on the SSA IR.
//!
//! This module implements passes that analyze or mutate functions of the
//! intermediate representation.

pub mod dce;

pub use dce::{DeadCodeElim, Propagation};
