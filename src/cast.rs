//! The cast engine
//!
//! All implicit and explicit coercions live here, as pure dispatch
//! over `(source type, target type)` pairs that drives the builder.
//! Implicit casts arise at assignment, argument passing, return,
//! if/while arm equalization and binary-op widening; explicit casts
//! come from cast expressions. Impossible pairs are fatal.

use crate::error::{CompileError, CompileResult};
use crate::ir::{CmpOp, IrBuilder, IrType, VReg};
use crate::ty::Type;
use crate::value::Value;

/// Materialize `value` coerced to `to` at the current insertion point.
pub fn emit_cast(value: &Value, to: &Type, builder: &mut IrBuilder) -> CompileResult<VReg> {
    let from = value.ty().clone();
    if &from == to {
        return value.load(builder);
    }
    match &from {
        Type::Number { .. } => {
            let reg = value.load(builder)?;
            numeric_cast(reg, &from, to, builder)
        }
        Type::Pointer(_) => {
            let reg = value.load(builder)?;
            match to {
                Type::Pointer(_) => Ok(builder.bitcast(reg, to.ir_type())),
                Type::Number { .. } => Ok(builder.ptrtoint(reg, to.ir_type())),
                _ => Err(CompileError::InvalidCast(from, to.clone())),
            }
        }
        Type::Array { elem, .. } => array_decay(value, elem, to, builder),
        Type::Tuple(elems) => tuple_to_array(value, elems, to, builder),
        Type::Null => Ok(builder.const_null(to.ir_type())),
        _ => Err(CompileError::InvalidCast(from, to.clone())),
    }
}

/// Number-to-number (and number-to-pointer) coercion on a raw
/// register. Also used directly for the narrower→wider widening in
/// binary operators.
pub fn numeric_cast(
    reg: VReg,
    from: &Type,
    to: &Type,
    builder: &mut IrBuilder,
) -> CompileResult<VReg> {
    let (from_bits, from_float, from_signed) = from
        .as_number()
        .ok_or_else(|| CompileError::InvalidCast(from.clone(), to.clone()))?;

    match to {
        // Anything numeric collapses to a bool via != 0
        Type::Number { bits: 1, floating: false, .. } => {
            let zero = builder.const_zero(from.ir_type());
            if from_float {
                Ok(builder.fcmp(CmpOp::Ne, reg, zero))
            } else {
                Ok(builder.icmp(CmpOp::Ne, reg, zero))
            }
        }
        Type::Number {
            bits: to_bits,
            floating: to_float,
            ..
        } => {
            let to_ir = to.ir_type();
            match (from_float, *to_float) {
                (true, false) => Ok(if from_signed {
                    builder.fptosi(reg, to_ir)
                } else {
                    builder.fptoui(reg, to_ir)
                }),
                (false, true) => Ok(if from_signed {
                    builder.sitofp(reg, to_ir)
                } else {
                    builder.uitofp(reg, to_ir)
                }),
                (true, true) => Ok(builder.fpcast(reg, to_ir)),
                (false, false) => {
                    if *to_bits > from_bits {
                        // Extension kind follows the source signedness
                        Ok(if from_signed {
                            builder.sext(reg, to_ir)
                        } else {
                            builder.zext(reg, to_ir)
                        })
                    } else if *to_bits < from_bits {
                        Ok(builder.trunc(reg, to_ir))
                    } else {
                        Ok(builder.bitcast(reg, to_ir))
                    }
                }
            }
        }
        Type::Pointer(_) => {
            if from_float {
                Err(CompileError::InvalidCast(from.clone(), to.clone()))
            } else {
                Ok(builder.inttoptr(reg, to.ir_type()))
            }
        }
        _ => Err(CompileError::InvalidCast(from.clone(), to.clone())),
    }
}

/// `T[N] → *T` decay. Requires an addressed array; a constant array
/// with no backing memory has nothing to point into.
fn array_decay(
    value: &Value,
    elem: &Type,
    to: &Type,
    builder: &mut IrBuilder,
) -> CompileResult<VReg> {
    let Type::Pointer(pointee) = to else {
        return Err(CompileError::InvalidCast(value.ty().clone(), to.clone()));
    };
    if pointee.as_ref() != elem || !value.has_address() {
        return Err(CompileError::InvalidCast(value.ty().clone(), to.clone()));
    }
    let addr = value.address(builder)?;
    Ok(builder.get_field_ptr(addr, 0))
}

/// `(T × N) → T[N]`. Addressed tuples are reinterpreted in place;
/// addressless ones are rebuilt element-wise.
fn tuple_to_array(
    value: &Value,
    elems: &[Type],
    to: &Type,
    builder: &mut IrBuilder,
) -> CompileResult<VReg> {
    let Type::Array { elem, count } = to else {
        return Err(CompileError::InvalidCast(value.ty().clone(), to.clone()));
    };
    if *count as usize != elems.len() || elems.iter().any(|t| t != elem.as_ref()) {
        return Err(CompileError::InvalidCast(value.ty().clone(), to.clone()));
    }
    let array_ir = to.ir_type();
    if value.has_address() {
        let addr = value.address(builder)?;
        let cast = builder.bitcast(addr, IrType::ptr(array_ir));
        Ok(builder.load(cast))
    } else {
        let tuple = value.load(builder)?;
        let mut acc = builder.const_null(array_ir);
        for i in 0..elems.len() as u32 {
            let member = builder.extract_value(tuple, i);
            acc = builder.insert_value(acc, member, i);
        }
        Ok(acc)
    }
}
