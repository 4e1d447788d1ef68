//! The Value abstraction
//!
//! A [`Value`] is the unified handle over an IR value that emission
//! works with. It answers three questions: what SSA value am I, do I
//! have an address, and what is my fy type. The `Cast` variant is
//! lazy: wrapping never emits anything, the coercion is materialized
//! when the value is loaded. That keeps assignment targets and l-value
//! chains from paying for casts that are never used.

use crate::cast;
use crate::error::{CompileError, CompileResult};
use crate::ir::{IrBuilder, VReg};
use crate::ty::Type;

/// Where a loaded value's backing memory lives
#[derive(Debug, Clone)]
pub enum Place {
    /// A pointer register (stack slot, GEP result, …)
    Local(VReg),
    /// A module-level global, materialized through `globalref` at use
    Global(String),
}

impl Place {
    /// Materialize the pointer at the current insertion point
    pub fn reg(&self, builder: &mut IrBuilder) -> VReg {
        match self {
            Place::Local(reg) => *reg,
            Place::Global(name) => builder.global_ref(name),
        }
    }
}

/// A handle over an IR value, possibly backed by a memory slot
#[derive(Debug, Clone)]
pub enum Value {
    /// An SSA value with no backing memory; taking its address is an error
    Immediate { ty: Type, reg: VReg },
    /// A pointer into memory plus the element type
    Loaded { ty: Type, place: Place },
    /// A function symbol; both its value and its address are the symbol
    Func { ty: Type, name: String },
    /// A lazy coercion of `inner` to `to`, materialized on `load`
    Cast { to: Type, inner: Box<Value> },
}

impl Value {
    pub fn immediate(ty: Type, reg: VReg) -> Self {
        Value::Immediate { ty, reg }
    }

    pub fn loaded(ty: Type, ptr: VReg) -> Self {
        Value::Loaded {
            ty,
            place: Place::Local(ptr),
        }
    }

    pub fn global(ty: Type, name: impl Into<String>) -> Self {
        Value::Loaded {
            ty,
            place: Place::Global(name.into()),
        }
    }

    pub fn func(ty: Type, name: impl Into<String>) -> Self {
        Value::Func {
            ty,
            name: name.into(),
        }
    }

    /// The fy type of this value
    pub fn ty(&self) -> &Type {
        match self {
            Value::Immediate { ty, .. } => ty,
            Value::Loaded { ty, .. } => ty,
            Value::Func { ty, .. } => ty,
            Value::Cast { to, .. } => to,
        }
    }

    /// Whether `address` will succeed
    pub fn has_address(&self) -> bool {
        matches!(self, Value::Loaded { .. } | Value::Func { .. })
    }

    /// The loaded scalar at the current insertion point
    pub fn load(&self, builder: &mut IrBuilder) -> CompileResult<VReg> {
        match self {
            Value::Immediate { reg, .. } => Ok(*reg),
            Value::Loaded { place, .. } => {
                let ptr = place.reg(builder);
                Ok(builder.load(ptr))
            }
            Value::Func { name, .. } => Ok(builder.func_ref(name)),
            Value::Cast { to, inner } => cast::emit_cast(inner, to, builder),
        }
    }

    /// The pointer behind this value; immediates and pending casts
    /// have none
    pub fn address(&self, builder: &mut IrBuilder) -> CompileResult<VReg> {
        match self {
            Value::Loaded { place, .. } => Ok(place.reg(builder)),
            Value::Func { name, .. } => Ok(builder.func_ref(name)),
            other => Err(CompileError::NoAddress(other.ty().clone())),
        }
    }

    /// Defer a coercion to `to`. Never fails here; impossible casts
    /// surface when the value is materialized.
    pub fn cast_to(self, to: Type) -> Value {
        Value::Cast {
            to,
            inner: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InstrKind, IrType};

    fn builder() -> IrBuilder {
        let mut b = IrBuilder::new("test");
        b.start_function("f", vec![], IrType::I32);
        b
    }

    #[test]
    fn test_immediate_has_no_address() {
        let mut b = builder();
        let reg = b.const_int(IrType::I32, 7);
        let v = Value::immediate(Type::i32(), reg);
        assert!(!v.has_address());
        assert_eq!(v.load(&mut b).unwrap(), reg);
        assert!(matches!(
            v.address(&mut b),
            Err(CompileError::NoAddress(_))
        ));
    }

    #[test]
    fn test_loaded_value_loads_through_pointer() {
        let mut b = builder();
        let slot = b.alloca(IrType::I32);
        let v = Value::loaded(Type::i32(), slot);
        assert!(v.has_address());
        assert_eq!(v.address(&mut b).unwrap(), slot);
        let loaded = v.load(&mut b).unwrap();
        assert_ne!(loaded, slot);
    }

    #[test]
    fn test_cast_wrapping_emits_nothing() {
        let mut b = builder();
        let reg = b.const_int(IrType::I32, 7);
        let v = Value::immediate(Type::i32(), reg).cast_to(Type::i64());
        assert_eq!(v.ty(), &Type::i64());
        let module = b.finish();
        // Just the constant; the pending cast emitted nothing
        assert_eq!(module.functions[0].blocks[0].instructions.len(), 1);
    }

    #[test]
    fn test_cast_materializes_on_load() {
        let mut b = builder();
        let reg = b.const_int(IrType::I32, 7);
        let v = Value::immediate(Type::i32(), reg).cast_to(Type::i64());
        let widened = v.load(&mut b).unwrap();
        assert_ne!(widened, reg);
        let module = b.finish();
        let instrs = &module.functions[0].blocks[0].instructions;
        assert!(instrs
            .iter()
            .any(|i| matches!(i.kind, InstrKind::SExt(_, IrType::I64))));
    }

    #[test]
    fn test_global_place_materializes_ref() {
        let mut b = builder();
        let v = Value::global(Type::i32(), "counter");
        let ptr = v.address(&mut b).unwrap();
        let again = v.address(&mut b).unwrap();
        // Each use emits its own globalref
        assert_ne!(ptr, again);
    }
}
