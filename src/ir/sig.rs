// Copyright (c) 2017-2021 Fabian Schuiki

//! Representation of the arguments of a function.

use crate::{ir::Arg, table::PrimaryTable};

/// A description of the input arguments of a function.
///
/// Values in this IR are untyped machine integers, so a signature is merely
/// the ordered list of arguments a function accepts.
#[derive(Debug, Default, Clone)]
pub struct Signature {
    args: PrimaryTable<Arg, ()>,
    order: Vec<Arg>,
}

impl Signature {
    /// Create a new signature.
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a signature with `num` arguments.
    pub fn with_args(num: usize) -> Self {
        let mut sig = Self::new();
        for _ in 0..num {
            sig.add_input();
        }
        sig
    }

    /// Add an input argument.
    pub fn add_input(&mut self) -> Arg {
        let arg = self.args.add(());
        self.order.push(arg);
        arg
    }

    /// Return an iterator over the arguments of the signature.
    pub fn args<'a>(&'a self) -> impl Iterator<Item = Arg> + 'a {
        self.order.iter().cloned()
    }
}
