// Copyright (c) 2017-2021 Fabian Schuiki

//! Temporary representation of IR assembly after parsing.
//!
//! The grammar produces the structures in this module, which are then turned
//! into actual IR. Values may be referenced before they are defined; such
//! references go through placeholders which are resolved once the definition
//! is encountered.

use crate::ir::{self, InstData, Module, Opcode, Signature, UnitBuilder, UnitData, UnitName};
use std::collections::HashMap;

/// Parse a module from assembly text.
pub fn parse_module(input: &str) -> Result<Module, String> {
    let units = super::grammar::ModuleParser::new()
        .parse(input)
        .map_err(|e| format!("{}", e.map_location(|loc| Location::from_offset(input, loc))))?;
    let mut module = Module::new();
    for unit in units {
        let loc = Location::from_offset(input, unit.loc);
        let data = unit.build(input)?;
        if module.unit_by_name(data.name()).is_some() {
            return Err(format!("{}: {} defined multiple times", loc, data.name()));
        }
        module.add_unit(data);
    }
    Ok(module)
}

/// Parse a single function from assembly text.
pub fn parse_unit(input: &str) -> Result<UnitData, String> {
    let mut module = parse_module(input)?;
    let units: Vec<_> = module.units().collect();
    match units.as_slice() {
        &[unit] => Ok(module.remove_unit(unit)),
        _ => Err(format!("expected one function, found {}", units.len())),
    }
}

/// A line and column in the input text, both counted from 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Location {
    /// The line number.
    pub line: usize,
    /// The column number.
    pub column: usize,
}

impl Location {
    /// Compute the line and column of a byte offset into `input`.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let before = &input[..offset.min(input.len())];
        let line = before.matches('\n').count() + 1;
        let column = before.len() - before.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
        Location { line, column }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Name resolution state while building a single function.
#[derive(Default)]
struct Context<'a> {
    values: HashMap<&'a str, ir::Value>,
    placeholders: HashMap<&'a str, (ir::Value, usize)>,
    blocks: HashMap<&'a str, ir::Block>,
}

impl<'a> Context<'a> {
    /// Resolve a value reference, creating a placeholder if the value has not
    /// been defined yet.
    fn use_value(
        &mut self,
        value: ValueRef<'a>,
        loc: usize,
        builder: &mut UnitBuilder,
    ) -> ir::Value {
        let name = match value {
            ValueRef::Undef => return builder.undef(),
            ValueRef::Named(name) => name,
        };
        if let Some(&value) = self.values.get(name) {
            return value;
        }
        self.placeholders
            .entry(name)
            .or_insert_with(|| (builder.dfg_mut().add_placeholder(), loc))
            .0
    }

    /// Resolve a list of value references.
    fn use_values(
        &mut self,
        values: Vec<ValueRef<'a>>,
        loc: usize,
        builder: &mut UnitBuilder,
    ) -> Vec<ir::Value> {
        values
            .into_iter()
            .map(|value| self.use_value(value, loc, builder))
            .collect()
    }

    /// Define a named value, resolving any placeholder that stood in for it.
    fn define(
        &mut self,
        name: &'a str,
        value: ir::Value,
        builder: &mut UnitBuilder,
    ) -> Result<(), String> {
        if self.values.insert(name, value).is_some() {
            return Err(format!("value %{} defined multiple times", name));
        }
        builder.set_name(value, name.to_owned());
        if let Some((placeholder, _)) = self.placeholders.remove(name) {
            builder.replace_use(placeholder, value);
            builder.dfg_mut().remove_placeholder(placeholder);
        }
        Ok(())
    }

    /// Resolve a block reference.
    fn block(&self, name: &str) -> Result<ir::Block, String> {
        match self.blocks.get(name) {
            Some(&bb) => Ok(bb),
            None => Err(format!("unknown block %{}", name)),
        }
    }
}

/// A function as it appears in the assembly.
pub struct Unit<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
    pub blocks: Vec<Block<'a>>,
    pub loc: usize,
}

impl<'a> Unit<'a> {
    /// Build the IR for the function.
    fn build(self, input: &str) -> Result<UnitData, String> {
        let mut data = UnitData::new(
            UnitName::global(self.name),
            Signature::with_args(self.args.len()),
        );
        let mut builder = UnitBuilder::new(&mut data);
        let mut context = Context::default();
        for (i, &name) in self.args.iter().enumerate() {
            let value = builder.input_arg(i);
            context
                .define(name, value, &mut builder)
                .map_err(|e| format!("{}: {}", Location::from_offset(input, self.loc), e))?;
        }

        // Create all blocks upfront such that branches may refer to blocks
        // further down.
        let mut bbs = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let bb = builder.named_block(block.name);
            if context.blocks.insert(block.name, bb).is_some() {
                return Err(format!(
                    "{}: block %{} defined multiple times",
                    Location::from_offset(input, block.loc),
                    block.name
                ));
            }
            bbs.push(bb);
        }
        for (block, bb) in self.blocks.into_iter().zip(bbs) {
            builder.append_to(bb);
            for inst in block.insts {
                let loc = inst.loc;
                inst.build(&mut builder, &mut context)
                    .map_err(|e| format!("{}: {}", Location::from_offset(input, loc), e))?;
            }
        }

        let undefined = context
            .placeholders
            .iter()
            .min_by_key(|&(&name, &(_, loc))| (loc, name));
        if let Some((name, &(_, loc))) = undefined {
            return Err(format!(
                "{}: use of undefined value %{}",
                Location::from_offset(input, loc),
                name
            ));
        }
        Ok(data)
    }
}

/// A block as it appears in the assembly.
pub struct Block<'a> {
    pub name: &'a str,
    pub insts: Vec<Inst<'a>>,
    pub loc: usize,
}

/// An instruction as it appears in the assembly.
pub struct Inst<'a> {
    pub opcode: Opcode,
    pub name: Option<&'a str>,
    pub args: InstArgs<'a>,
    pub loc: usize,
}

/// The operands of an instruction as they appear in the assembly.
pub enum InstArgs<'a> {
    ConstInt(i64),
    Nullary,
    Values(Vec<ValueRef<'a>>),
    Call(&'a str, Vec<ValueRef<'a>>),
    Jump(&'a str),
    Branch(ValueRef<'a>, &'a str, &'a str),
}

/// A reference to a value as it appears in the assembly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueRef<'a> {
    Named(&'a str),
    Undef,
}

impl<'a> Inst<'a> {
    pub fn new(opcode: Opcode, args: InstArgs<'a>, loc: usize) -> Self {
        Inst {
            opcode,
            name: None,
            args,
            loc,
        }
    }

    pub fn name(self, name: &'a str) -> Self {
        Inst {
            name: Some(name),
            ..self
        }
    }

    fn build(self, builder: &mut UnitBuilder, context: &mut Context<'a>) -> Result<(), String> {
        let opcode = self.opcode;
        let loc = self.loc;
        let data = match self.args {
            InstArgs::ConstInt(imm) => InstData::ConstInt { opcode, imm },
            InstArgs::Nullary => InstData::Nullary { opcode },
            InstArgs::Values(refs) => {
                let args = context.use_values(refs, loc, builder);
                match args.as_slice() {
                    &[x] => InstData::Unary { opcode, args: [x] },
                    &[x, y] => InstData::Binary { opcode, args: [x, y] },
                    _ => unreachable!("grammar produced {} with {} operands", opcode, args.len()),
                }
            }
            InstArgs::Call(ext, refs) => {
                let args = context.use_values(refs, loc, builder);
                let ext = builder.add_extern(UnitName::global(ext));
                InstData::Call { opcode, ext, args }
            }
            InstArgs::Jump(bb) => InstData::Jump {
                opcode,
                bbs: [context.block(bb)?],
            },
            InstArgs::Branch(x, bb0, bb1) => {
                let x = context.use_value(x, loc, builder);
                InstData::Branch {
                    opcode,
                    args: [x],
                    bbs: [context.block(bb0)?, context.block(bb1)?],
                }
            }
        };
        let inst = builder.build_inst(data);
        if let Some(name) = self.name {
            let value = builder.inst_result(inst);
            context.define(name, value, builder)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_from_offset() {
        let input = "ab\ncd\n";
        assert_eq!(Location::from_offset(input, 0), Location { line: 1, column: 1 });
        assert_eq!(Location::from_offset(input, 4), Location { line: 2, column: 2 });
        assert_eq!(Location::from_offset(input, 6), Location { line: 3, column: 1 });
    }
}
