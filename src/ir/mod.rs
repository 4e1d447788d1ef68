//! fy Intermediate Representation
//!
//! A small SSA-form IR. The AST lowers into it through [`IrBuilder`];
//! an external backend realizes it as machine code. The instruction
//! set is the contract between the two: typed constants, stack slots,
//! loads and stores, pointer and aggregate GEPs, the arithmetic and
//! comparison families with explicit signedness, the cast set, calls,
//! branches and φ nodes.

mod builder;
mod instr;
mod types;

pub use builder::*;
pub use instr::*;
pub use types::*;

/// Print a module in a readable format
pub fn print_module(module: &Module) -> String {
    let mut output = String::new();
    output.push_str(&format!("module {}\n\n", module.name));

    for def in &module.structs {
        output.push_str(&format!("struct {} {{ ", def.name));
        for (i, (name, ty)) in def.fields.iter().enumerate() {
            if i > 0 {
                output.push_str(", ");
            }
            output.push_str(&format!("{}: {}", name, ty));
        }
        output.push_str(" }\n");
    }
    if !module.structs.is_empty() {
        output.push('\n');
    }

    for global in &module.globals {
        match &global.init {
            Some(init) => output.push_str(&format!(
                "global @{}: {} = {}\n",
                global.name, global.ty, init
            )),
            None => output.push_str(&format!("global @{}: {}\n", global.name, global.ty)),
        }
    }
    if !module.globals.is_empty() {
        output.push('\n');
    }

    for func in &module.functions {
        if func.is_external {
            output.push_str(&format!("declare {} ", func.name));
        } else {
            output.push_str(&format!("define {} ", func.name));
        }

        output.push('(');
        for (i, param) in func.params.iter().enumerate() {
            if i > 0 {
                output.push_str(", ");
            }
            if func.is_external {
                output.push_str(&format!("{}", param.ty));
            } else {
                output.push_str(&format!("{} {}", param.ty, param.reg));
            }
        }
        if func.is_vararg {
            if !func.params.is_empty() {
                output.push_str(", ");
            }
            output.push_str("...");
        }
        output.push_str(&format!(") -> {} ", func.ret_type));

        if func.is_external {
            output.push('\n');
            continue;
        }

        output.push_str("{\n");
        for block in &func.blocks {
            output.push_str(&format!("  {}:\n", block.id));
            for instr in &block.instructions {
                output.push_str(&format!("    {}\n", instr));
            }
            if let Some(ref term) = block.terminator {
                output.push_str(&format!("    {}\n", term));
            }
        }
        output.push_str("}\n\n");
    }

    output
}
