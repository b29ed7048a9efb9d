// Copyright (c) 2017-2021 Fabian Schuiki

//! Representation of a collection of functions.
//!
//! This module implements the `Module`, the root node of the intermediate
//! representation. A module is the unit of information ingested by the reader,
//! processed by the optimization passes, and emitted by the writer.

use crate::{
    impl_table_indexing, impl_table_key,
    ir::{UnitBuilder, UnitData, UnitName},
    table::PrimaryTable,
};
use rayon::prelude::*;

impl_table_key! {
    /// A function in a module.
    struct ModUnit(u32) as "u";
}

/// A module.
///
/// Contains the function definitions. Functions are kept in the order in which
/// they were added.
#[derive(Debug, Default, Clone)]
pub struct Module {
    /// The units in this module.
    units: PrimaryTable<ModUnit, UnitData>,
}

impl_table_indexing!(Module, units, ModUnit, UnitData);

impl Module {
    /// Create a new empty module.
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a function to the module.
    pub fn add_unit(&mut self, data: UnitData) -> ModUnit {
        self.units.add(data)
    }

    /// Remove a function from the module.
    pub fn remove_unit(&mut self, unit: ModUnit) -> UnitData {
        self.units.remove(unit)
    }

    /// Return the number of functions in the module.
    pub fn num_units(&self) -> usize {
        self.units.len()
    }

    /// Return an iterator over the functions in this module.
    pub fn units<'a>(&'a self) -> impl Iterator<Item = ModUnit> + 'a {
        self.units.keys()
    }

    /// Return an iterator over the function data in this module.
    pub fn unit_data<'a>(&'a self) -> impl Iterator<Item = &'a UnitData> + 'a {
        self.units.values()
    }

    /// Return an iterator over builders for all functions in this module.
    pub fn units_mut<'a>(&'a mut self) -> impl Iterator<Item = UnitBuilder<'a>> + 'a {
        self.units.values_mut().map(UnitBuilder::new)
    }

    /// Return a parallel iterator over builders for all functions in this
    /// module.
    pub fn par_units_mut<'a>(&'a mut self) -> impl ParallelIterator<Item = UnitBuilder<'a>> + 'a {
        self.units.par_values_mut().map(UnitBuilder::new)
    }

    /// Return a builder for a single function.
    pub fn unit_mut(&mut self, unit: ModUnit) -> UnitBuilder {
        UnitBuilder::new(&mut self.units[unit])
    }

    /// Find a function by name.
    pub fn unit_by_name(&self, name: &UnitName) -> Option<ModUnit> {
        self.units
            .iter()
            .find(|(_, data)| &data.name == name)
            .map(|(unit, _)| unit)
    }

    /// Panic if the module is not well-formed.
    pub fn verify(&self) {
        for data in self.unit_data() {
            data.verify();
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut buffer = Vec::new();
        crate::assembly::write_module(&mut buffer, self).map_err(|_| std::fmt::Error)?;
        let text = String::from_utf8(buffer).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", text)
    }
}
