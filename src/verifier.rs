// Copyright (c) 2017-2021 Fabian Schuiki

//! Verification of IR integrity.
//!
//! This module implements verification of the intermediate representation. It
//! checks that functions are well-formed, basic blocks have terminators, and
//! the operands of every instruction refer to values that still exist.

use crate::ir::{prelude::*, ValueData};
use std::{
    collections::HashMap,
    fmt::Display,
    ops::{Deref, DerefMut},
};

/// An IR verifier.
///
/// The `Verifier` acts as a context to call the various IR checking functions
/// on. It keeps track of errors.
#[derive(Default)]
pub struct Verifier {
    errors: VerifierErrors,
    unit_name: Option<String>,
}

impl Verifier {
    /// Create a new verifier.
    pub fn new() -> Self {
        Default::default()
    }

    /// Verify the integrity of a `Module`.
    pub fn verify_module(&mut self, module: &Module) {
        for unit in module.unit_data() {
            self.verify_unit(unit);
        }
    }

    /// Verify the integrity of a function.
    pub fn verify_unit(&mut self, unit: &UnitData) {
        self.unit_name = Some(format!("func {}", unit.name()));
        let layout = unit.func_layout();

        if layout.first_block().is_none() {
            self.error(None, "layout has no entry block".to_string());
        }

        // Position of every instruction within its block, used to check that
        // definitions precede their uses in the same block.
        let mut position = HashMap::new();
        for bb in layout.blocks() {
            for (i, inst) in layout.insts(bb).enumerate() {
                position.insert(inst, (bb, i));
            }
        }

        for bb in layout.blocks() {
            // Check that the block has at least one instruction.
            if layout.first_inst(bb).is_none() {
                self.error(Some(bb.to_string()), "block is empty".to_string());
            }

            for inst in layout.insts(bb) {
                let opcode = unit.inst_data(inst).opcode();
                let last = Some(inst) == layout.last_inst(bb);

                // Check that there are no terminator instructions in the middle
                // of the block.
                if opcode.is_terminator() && !last {
                    self.error(
                        Some(describe(unit, inst)),
                        format!("terminator must be at the end of block {}", bb),
                    );
                }

                // Check that the last instruction in the block is a terminator.
                if last && !opcode.is_terminator() {
                    self.error(
                        Some(bb.to_string()),
                        format!("last instruction `{}` must be a terminator", opcode),
                    );
                }

                self.verify_inst(unit, inst, &position);
            }
        }

        self.unit_name = None;
    }

    /// Verify the integrity of a single instruction.
    fn verify_inst(
        &mut self,
        unit: &UnitData,
        inst: Inst,
        position: &HashMap<Inst, (Block, usize)>,
    ) {
        let dfg = unit.dfg();
        let data = unit.inst_data(inst);
        let opcode = data.opcode();

        if opcode.has_result() != dfg.has_result(inst) {
            self.error(
                Some(describe(unit, inst)),
                "result does not match opcode".to_string(),
            );
        }

        // Check that the instruction format fits the opcode.
        let (num_args, num_blocks) = match opcode {
            Opcode::ConstInt | Opcode::Ret => (0, 0),
            Opcode::RetValue => (1, 0),
            Opcode::Br => (0, 1),
            Opcode::BrCond => (1, 2),
            Opcode::Call => (data.args().len(), 0),
            op if op.is_unary() => (1, 0),
            _ => (2, 0),
        };
        if data.args().len() != num_args
            || data.blocks().len() != num_blocks
            || data.get_ext_unit().is_some() != (opcode == Opcode::Call)
            || data.get_const_int().is_some() != (opcode == Opcode::ConstInt)
        {
            self.error(
                Some(describe(unit, inst)),
                format!("operands do not fit opcode `{}`", opcode),
            );
        }

        for (operand, &arg) in data.args().iter().enumerate() {
            if !dfg.contains_value(arg) {
                self.error(
                    Some(describe(unit, inst)),
                    format!("operand {} refers to deleted value {}", operand, arg),
                );
                continue;
            }
            match dfg[arg] {
                ValueData::Inst { inst: def } => match (position.get(&def), position.get(&inst)) {
                    (None, _) => self.error(
                        Some(describe(unit, inst)),
                        format!(
                            "operand {} refers to {} which is not in the layout",
                            operand, def
                        ),
                    ),
                    (Some(&(def_bb, def_pos)), Some(&(use_bb, use_pos)))
                        if def_bb == use_bb && def_pos >= use_pos =>
                    {
                        self.error(
                            Some(describe(unit, inst)),
                            format!("operand {} is used before its definition {}", operand, def),
                        )
                    }
                    _ => (),
                },
                ValueData::Placeholder => self.error(
                    Some(describe(unit, inst)),
                    format!("operand {} refers to an unresolved placeholder", operand),
                ),
                ValueData::Arg { .. } | ValueData::Undef => (),
            }
            if !dfg.uses(arg).contains(&Use { inst, operand }) {
                self.error(
                    Some(describe(unit, inst)),
                    format!("operand {} missing from use list of {}", operand, arg),
                );
            }
        }

        if opcode.is_branch() {
            for &bb in data.blocks() {
                if !unit.func_layout().is_block_inserted(bb) {
                    self.error(
                        Some(describe(unit, inst)),
                        format!("branch target {} is not in the layout", bb),
                    );
                }
            }
        }

        if let Some(ext) = data.get_ext_unit() {
            if dfg.ext_units().all(|(e, _)| e != ext) {
                self.error(
                    Some(describe(unit, inst)),
                    format!("calls unknown external function {}", ext),
                );
            }
        }
    }

    /// Record an error.
    fn error(&mut self, object: Option<String>, message: String) {
        self.errors.push(VerifierError {
            unit: self.unit_name.clone(),
            object,
            message,
        });
    }

    /// Finish verification and return the errors discovered, if any.
    pub fn finish(self) -> Result<(), VerifierErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Render a short description of an instruction for error messages.
fn describe(unit: &UnitData, inst: Inst) -> String {
    match unit.get_inst_result(inst) {
        Some(value) => format!("{} = {} ({})", value, unit.inst_data(inst).opcode(), inst),
        None => format!("{} ({})", unit.inst_data(inst).opcode(), inst),
    }
}

/// A verification error.
#[derive(Debug)]
pub struct VerifierError {
    /// The unit within which caused the error.
    pub unit: Option<String>,
    /// The object which caused the error.
    pub object: Option<String>,
    /// The error message.
    pub message: String,
}

impl Display for VerifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(ref unit) = self.unit {
            write!(f, "{}: ", unit)?;
        }
        if let Some(ref object) = self.object {
            write!(f, "{}: ", object)?;
        }
        write!(f, "{}", self.message)?;
        Ok(())
    }
}

/// A list of verification errors.
#[derive(Debug, Default)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl Deref for VerifierErrors {
    type Target = Vec<VerifierError>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for VerifierErrors {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Display for VerifierErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for err in self.iter() {
            writeln!(f, "- {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for VerifierErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_terminator_is_reported() {
        let mut data = UnitData::new(UnitName::global("f"), Signature::new());
        let mut builder = UnitBuilder::new(&mut data);
        let bb = builder.named_block("entry");
        builder.append_to(bb);
        builder.ins().const_int(1);
        let mut verifier = Verifier::new();
        verifier.verify_unit(&data);
        let errs = verifier.finish().unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("must be a terminator"));
    }

    #[test]
    fn use_before_definition_is_reported() {
        let mut data = UnitData::new(UnitName::global("f"), Signature::new());
        let mut builder = UnitBuilder::new(&mut data);
        let bb = builder.named_block("entry");
        builder.append_to(bb);
        let a = builder.ins().const_int(1);
        let ret = builder.ins().ret_value(a);
        let def = builder.dfg().value_inst(a);
        builder.func_layout_mut().remove_inst(def);
        builder.func_layout_mut().insert_inst_after(def, ret);
        let mut verifier = Verifier::new();
        verifier.verify_unit(&data);
        let errs = verifier.finish().unwrap_err();
        assert!(errs
            .iter()
            .any(|e| e.message.contains("used before its definition")));
        assert!(errs
            .iter()
            .any(|e| e.message.contains("terminator must be at the end")));
    }

    #[test]
    fn mismatched_format_is_reported() {
        let mut data = UnitData::new(UnitName::global("f"), Signature::new());
        let mut builder = UnitBuilder::new(&mut data);
        let bb = builder.named_block("entry");
        builder.append_to(bb);
        let a = builder.ins().const_int(1);
        let bad = builder.build_inst(InstData::Unary {
            opcode: Opcode::Add,
            args: [a],
        });
        let b = builder.dfg().inst_result(bad);
        builder.ins().ret_value(b);
        let mut verifier = Verifier::new();
        verifier.verify_unit(&data);
        let errs = verifier.finish().unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("operands do not fit opcode `add`"));
    }

    #[test]
    fn conditional_branch_targets_are_checked() {
        let mut data = UnitData::new(UnitName::global("f"), Signature::new());
        let mut builder = UnitBuilder::new(&mut data);
        let entry = builder.named_block("entry");
        let next = builder.named_block("next");
        let detached = builder.block();
        builder.func_layout_mut().remove_block(detached);
        builder.append_to(entry);
        let c = builder.ins().const_int(1);
        builder.ins().br_cond(c, next, detached);
        builder.append_to(next);
        builder.ins().ret();
        let mut verifier = Verifier::new();
        verifier.verify_unit(&data);
        let errs = verifier.finish().unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("branch target"));
    }
}
