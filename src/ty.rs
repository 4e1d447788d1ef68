//! The fy type system
//!
//! Types are plain values compared structurally; they are cheap to
//! clone and are never interned. The printable form produced by
//! `Display` is canonical: it is what diagnostics show and what the
//! method-name mangling of `(<type>)::<name>` embeds, so it must stay
//! stable.

use crate::ir::IrType;
use std::fmt;

/// A fy type
#[derive(Debug, Clone, Eq)]
pub enum Type {
    /// An integer, float or boolean. The boolean type is
    /// `Number { bits: 1, floating: false, signed: false }`.
    Number {
        bits: u32,
        floating: bool,
        signed: bool,
    },
    /// Pointer to a pointee type
    Pointer(Box<Type>),
    /// Fixed-size aggregate, homogeneous or heterogeneous
    Tuple(Vec<Type>),
    /// Fixed-size homogeneous aggregate
    Array { elem: Box<Type>, count: u32 },
    /// Named record. The name is nominal sugar only; equality ignores it.
    Struct {
        name: String,
        fields: Vec<(String, Type)>,
    },
    /// Function signature
    Function {
        ret: Box<Type>,
        params: Vec<Type>,
        vararg: bool,
    },
    /// The bottom type of the `null` literal, castable to any
    /// pointer or numeric type
    Null,
}

impl Type {
    // ============ Constructors ============

    pub fn bool() -> Self {
        Type::int(1, false)
    }

    pub fn u8() -> Self {
        Type::int(8, false)
    }

    pub fn i32() -> Self {
        Type::int(32, true)
    }

    pub fn u32() -> Self {
        Type::int(32, false)
    }

    pub fn i64() -> Self {
        Type::int(64, true)
    }

    pub fn f32() -> Self {
        Type::Number {
            bits: 32,
            floating: true,
            signed: true,
        }
    }

    pub fn f64() -> Self {
        Type::Number {
            bits: 64,
            floating: true,
            signed: true,
        }
    }

    pub fn int(bits: u32, signed: bool) -> Self {
        Type::Number {
            bits,
            floating: false,
            signed,
        }
    }

    pub fn pointer(pointee: Type) -> Self {
        Type::Pointer(Box::new(pointee))
    }

    pub fn array(elem: Type, count: u32) -> Self {
        Type::Array {
            elem: Box::new(elem),
            count,
        }
    }

    pub fn function(ret: Type, params: Vec<Type>, vararg: bool) -> Self {
        Type::Function {
            ret: Box::new(ret),
            params,
            vararg,
        }
    }

    // ============ Predicates ============

    pub fn is_number(&self) -> bool {
        matches!(self, Type::Number { .. })
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Number { floating: true, .. })
    }

    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            Type::Number {
                bits: 1,
                floating: false,
                ..
            }
        )
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Types a `null` literal may take
    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Pointer(_) | Type::Number { .. } | Type::Null)
    }

    // ============ Projections ============

    /// `(bits, floating, signed)` for numeric types
    pub fn as_number(&self) -> Option<(u32, bool, bool)> {
        match self {
            Type::Number {
                bits,
                floating,
                signed,
            } => Some((*bits, *floating, *signed)),
            _ => None,
        }
    }

    /// The pointee of a pointer type
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Index of a struct field, by linear search over declared order
    pub fn field_index(&self, key: &str) -> Option<u32> {
        match self {
            Type::Struct { fields, .. } => {
                fields.iter().position(|(name, _)| name == key).map(|i| i as u32)
            }
            _ => None,
        }
    }

    /// The type of the struct field at `index`
    pub fn field_type(&self, index: u32) -> Option<&Type> {
        match self {
            Type::Struct { fields, .. } => fields.get(index as usize).map(|(_, ty)| ty),
            _ => None,
        }
    }

    // ============ Backend mapping ============

    /// Deterministic mapping into the IR backend's type universe.
    ///
    /// Integers map to signless IR integers; signedness is chosen by
    /// the operations. A homogeneous tuple maps to the IR array type so
    /// that the tuple→array cast is layout-compatible.
    pub fn ir_type(&self) -> IrType {
        match self {
            Type::Number {
                floating: true,
                bits,
                ..
            } => {
                if *bits == 32 {
                    IrType::F32
                } else {
                    IrType::F64
                }
            }
            Type::Number { bits, .. } => match bits {
                1 => IrType::Bool,
                8 => IrType::I8,
                16 => IrType::I16,
                32 => IrType::I32,
                _ => IrType::I64,
            },
            Type::Pointer(inner) => IrType::ptr(inner.ir_type()),
            Type::Tuple(elems) => match elems.split_first() {
                Some((first, rest)) if rest.iter().all(|t| t == first) => {
                    IrType::array(first.ir_type(), elems.len())
                }
                _ => IrType::Struct(elems.iter().map(Type::ir_type).collect()),
            },
            Type::Array { elem, count } => IrType::array(elem.ir_type(), *count as usize),
            Type::Struct { fields, .. } => {
                IrType::Struct(fields.iter().map(|(_, ty)| ty.ir_type()).collect())
            }
            Type::Function { ret, params, .. } => IrType::Fn {
                params: params.iter().map(Type::ir_type).collect(),
                ret: Box::new(ret.ir_type()),
            },
            Type::Null => IrType::ptr(IrType::I8),
        }
    }
}

impl PartialEq for Type {
    /// Structural deep equality. A struct's own name is ignored; its
    /// field names and field types are part of its structure.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Type::Number {
                    bits: a,
                    floating: af,
                    signed: asn,
                },
                Type::Number {
                    bits: b,
                    floating: bf,
                    signed: bsn,
                },
            ) => a == b && af == bf && asn == bsn,
            (Type::Pointer(a), Type::Pointer(b)) => a == b,
            (Type::Tuple(a), Type::Tuple(b)) => a == b,
            (
                Type::Array { elem: a, count: an },
                Type::Array { elem: b, count: bn },
            ) => an == bn && a == b,
            (Type::Struct { fields: a, .. }, Type::Struct { fields: b, .. }) => a == b,
            (
                Type::Function {
                    ret: ar,
                    params: ap,
                    vararg: av,
                },
                Type::Function {
                    ret: br,
                    params: bp,
                    vararg: bv,
                },
            ) => ar == br && ap == bp && av == bv,
            (Type::Null, Type::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number {
                floating: true,
                bits,
                ..
            } => write!(f, "f{}", bits),
            Type::Number { bits: 1, .. } => write!(f, "bool"),
            Type::Number {
                bits, signed: true, ..
            } => write!(f, "i{}", bits),
            Type::Number { bits, .. } => write!(f, "u{}", bits),
            Type::Pointer(inner) => write!(f, "*{}", inner),
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Type::Array { elem, count } => write!(f, "{}[{}]", elem, count),
            Type::Struct { name, .. } => write!(f, "{}", name),
            Type::Function {
                ret,
                params,
                vararg,
            } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                if *vararg {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_struct(name: &str) -> Type {
        Type::Struct {
            name: name.to_owned(),
            fields: vec![("x".to_owned(), Type::i32()), ("y".to_owned(), Type::i32())],
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::bool().to_string(), "bool");
        assert_eq!(Type::i32().to_string(), "i32");
        assert_eq!(Type::u8().to_string(), "u8");
        assert_eq!(Type::f64().to_string(), "f64");
        assert_eq!(Type::pointer(Type::i32()).to_string(), "*i32");
        assert_eq!(Type::array(Type::u8(), 4).to_string(), "u8[4]");
        assert_eq!(
            Type::Tuple(vec![Type::i32(), Type::bool()]).to_string(),
            "(i32, bool)"
        );
        assert_eq!(point_struct("Point").to_string(), "Point");
        assert_eq!(
            Type::function(Type::i32(), vec![Type::pointer(Type::u8())], true).to_string(),
            "fn(*u8, ...) -> i32"
        );
    }

    #[test]
    fn test_struct_equality_ignores_name() {
        assert_eq!(point_struct("Point"), point_struct("Vec2"));
        let other = Type::Struct {
            name: "Point".to_owned(),
            fields: vec![("x".to_owned(), Type::i32())],
        };
        assert_ne!(point_struct("Point"), other);
    }

    #[test]
    fn test_number_equality_is_exact() {
        assert_ne!(Type::i32(), Type::u32());
        assert_ne!(Type::i32(), Type::i64());
        assert_ne!(Type::f32(), Type::i32());
        assert_eq!(Type::i32(), Type::int(32, true));
    }

    #[test]
    fn test_field_index() {
        let ty = point_struct("Point");
        assert_eq!(ty.field_index("x"), Some(0));
        assert_eq!(ty.field_index("y"), Some(1));
        assert_eq!(ty.field_index("z"), None);
        assert_eq!(ty.field_type(1), Some(&Type::i32()));
    }

    #[test]
    fn test_ir_mapping() {
        assert_eq!(Type::bool().ir_type(), IrType::Bool);
        assert_eq!(Type::u8().ir_type(), IrType::I8);
        assert_eq!(
            Type::pointer(Type::i32()).ir_type(),
            IrType::ptr(IrType::I32)
        );
        // Homogeneous tuples share layout with arrays
        assert_eq!(
            Type::Tuple(vec![Type::u8(), Type::u8()]).ir_type(),
            IrType::array(IrType::I8, 2)
        );
        assert_eq!(
            Type::Tuple(vec![Type::u8(), Type::i32()]).ir_type(),
            IrType::Struct(vec![IrType::I8, IrType::I32])
        );
    }
}
