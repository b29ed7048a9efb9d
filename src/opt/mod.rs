// Copyright (c) 2017-2021 Fabian Schuiki

//! Optimization infrastructure.
//!
//! This module implements the plumbing shared by all optimization passes: the
//! `Pass` trait, and the `PassContext` through which passes are configured and
//! report which analyses they have invalidated.

mod pass;

pub use self::pass::*;

/// Re-exports of commonly used optimization items.
pub mod prelude {
    pub use super::{run_parallel, Invalidation, Pass, PassContext};
}
