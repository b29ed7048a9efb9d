// Copyright (c) 2017-2021 Fabian Schuiki

//! Emitting IR assembly.

use crate::ir::prelude::*;
use itertools::Itertools;
use std::{
    collections::{HashMap, HashSet},
    io::{Result, Write},
    rc::Rc,
};

/// Temporary object to emit IR assembly.
pub struct Writer<T> {
    sink: T,
}

impl<T: Write> Writer<T> {
    /// Create a new assembly writer.
    pub fn new(sink: T) -> Self {
        Self { sink }
    }

    /// Emit assembly for a module.
    pub fn write_module(&mut self, module: &Module) -> Result<()> {
        let mut separate = false;
        for data in module.unit_data() {
            if separate {
                write!(self.sink, "\n")?;
            }
            separate = true;
            self.write_unit(data)?;
        }
        Ok(())
    }

    /// Emit assembly for a function.
    pub fn write_unit(&mut self, data: &UnitData) -> Result<()> {
        let mut uw = UnitWriter::new(self, data);
        uw.reserve_names();
        let args: Vec<_> = data.args().map(|arg| uw.value_ref(arg)).collect();
        write!(
            uw.writer.sink,
            "func {} ({}) {{\n",
            data.name(),
            args.iter().format(", ")
        )?;
        for block in data.blocks() {
            let label = uw.block_name(block);
            write!(uw.writer.sink, "%{}:\n", label)?;
            for inst in data.insts(block) {
                write!(uw.writer.sink, "    ")?;
                uw.write_inst(inst)?;
                write!(uw.writer.sink, "\n")?;
            }
        }
        write!(uw.writer.sink, "}}\n")?;
        Ok(())
    }
}

/// Temporary object to emit the assembly of a single function.
///
/// Keeps track of the names assigned to values and blocks, such that every
/// name printed within the function is unique.
pub struct UnitWriter<'a, T> {
    writer: &'a mut Writer<T>,
    unit: &'a UnitData,
    value_names: HashMap<Value, Rc<String>>,
    block_names: HashMap<Block, Rc<String>>,
    name_indices: HashMap<Rc<String>, usize>,
    names: HashSet<Rc<String>>,
    tmp_index: usize,
}

impl<'a, T: Write> UnitWriter<'a, T> {
    /// Create a new writer for a function.
    pub fn new(writer: &'a mut Writer<T>, unit: &'a UnitData) -> Self {
        Self {
            writer,
            unit,
            value_names: Default::default(),
            block_names: Default::default(),
            name_indices: Default::default(),
            names: Default::default(),
            tmp_index: 0,
        }
    }

    /// Assign the explicitly requested names before any temporary names are
    /// generated, such that temporaries never steal a requested name.
    fn reserve_names(&mut self) {
        let unit = self.unit;
        for arg in unit.args() {
            if let Some(name) = unit.get_name(arg) {
                let name = self.uniquify_name(Some(name));
                self.value_names.insert(arg, name);
            }
        }
        for block in unit.blocks() {
            if let Some(name) = unit.get_block_name(block) {
                let name = self.uniquify_name(Some(name));
                self.block_names.insert(block, name);
            }
            for inst in unit.insts(block) {
                let value = match unit.get_inst_result(inst) {
                    Some(value) => value,
                    None => continue,
                };
                if let Some(name) = unit.get_name(value) {
                    let name = self.uniquify_name(Some(name));
                    self.value_names.insert(value, name);
                }
            }
        }
    }

    /// Return the text used to refer to a value.
    pub fn value_ref(&mut self, value: Value) -> Rc<String> {
        if self.unit.dfg().is_undef(value) {
            return Rc::new("undef".to_owned());
        }
        if let Some(name) = self.value_names.get(&value) {
            return Rc::new(format!("%{}", name));
        }
        let name = self.uniquify_name(self.unit.get_name(value));
        self.value_names.insert(value, name.clone());
        Rc::new(format!("%{}", name))
    }

    /// Return the name of a BB, without the leading `%`.
    pub fn block_name(&mut self, block: Block) -> Rc<String> {
        if let Some(name) = self.block_names.get(&block) {
            return name.clone();
        }
        let name = self.uniquify_name(self.unit.get_block_name(block));
        self.block_names.insert(block, name.clone());
        name
    }

    /// Uniquify a value or block name.
    fn uniquify_name(&mut self, name: Option<&str>) -> Rc<String> {
        if let Some(requested_name) = name {
            let requested_name = escape_name(requested_name);
            let idx = self.name_indices.entry(requested_name.clone()).or_insert(0);
            loop {
                let name = if *idx == 0 {
                    requested_name.clone()
                } else {
                    Rc::new(format!("{}.{}", requested_name, idx))
                };
                *idx += 1;
                if self.names.insert(name.clone()) {
                    break name;
                }
            }
        } else {
            loop {
                let name = Rc::new(format!("{}", self.tmp_index));
                self.tmp_index += 1;
                if self.names.insert(name.clone()) {
                    break name;
                }
            }
        }
    }

    /// Emit an instruction.
    pub fn write_inst(&mut self, inst: Inst) -> Result<()> {
        let unit = self.unit;
        if let Some(result) = unit.get_inst_result(inst) {
            let name = self.value_ref(result);
            write!(self.writer.sink, "{} = ", name)?;
        }
        let data = unit.inst_data(inst);
        let args: Vec<_> = data.args().iter().map(|&arg| self.value_ref(arg)).collect();
        let blocks: Vec<_> = data
            .blocks()
            .iter()
            .map(|&bb| format!("%{}", self.block_name(bb)))
            .collect();
        match data {
            InstData::ConstInt { imm, .. } => write!(self.writer.sink, "{} {}", data.opcode(), imm),
            InstData::Nullary { .. } => write!(self.writer.sink, "{}", data.opcode()),
            InstData::Unary { .. } | InstData::Binary { .. } => write!(
                self.writer.sink,
                "{} {}",
                data.opcode(),
                args.iter().format(", ")
            ),
            InstData::Call { ext, .. } => write!(
                self.writer.sink,
                "{} {} ({})",
                data.opcode(),
                unit.extern_name(*ext),
                args.iter().format(", ")
            ),
            InstData::Jump { .. } => write!(self.writer.sink, "{} {}", data.opcode(), blocks[0]),
            InstData::Branch { .. } => write!(
                self.writer.sink,
                "{} {}, {}",
                data.opcode(),
                args[0],
                blocks.iter().format(", ")
            ),
        }
    }
}

/// Replace characters the assembly reader would not accept in a name.
fn escape_name(name: &str) -> Rc<String> {
    Rc::new(
        name.chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' => c,
                _ => '_',
            })
            .collect(),
    )
}
