//! Typed AST for fy
//!
//! Every expression node caches its result type, computed by its
//! constructor; the constructors are where the type checking happens,
//! eagerly, while the parser is still building the tree. `emit` then
//! lowers the node at the builder's current insertion point and
//! returns a [`Value`] whose type equals the cached result type.
//!
//! Top-level declarations (globals, functions, declares, structs,
//! type aliases) live in [`Item`] and lower through `emit_toplevel`.

use crate::cast;
use crate::compiler::Compiler;
use crate::error::{CompileError, CompileResult};
use crate::ir::{CmpOp, Constant, IrType, VReg};
use crate::token::{NumberLit, StrFlavor, StringLit};
use crate::ty::Type;
use crate::value::Value;

/// An expression node
#[derive(Debug)]
pub enum Expr {
    Number(NumberExpr),
    Bool(BoolExpr),
    Char(CharExpr),
    Str(StringExpr),
    Null(NullExpr),
    Variable(VariableExpr),
    Let(Box<LetExpr>),
    Cast(Box<CastExpr>),
    Binary(Box<BinaryExpr>),
    Unary(Box<UnaryExpr>),
    Call(Box<CallExpr>),
    Index(Box<IndexExpr>),
    Field(Box<FieldExpr>),
    New(Box<NewExpr>),
    Block(BlockExpr),
    If(Box<IfExpr>),
    While(Box<WhileExpr>),
}

impl Expr {
    /// The result type, cached at construction time
    pub fn ty(&self) -> &Type {
        match self {
            Expr::Number(e) => &e.ty,
            Expr::Bool(e) => &e.ty,
            Expr::Char(e) => &e.ty,
            Expr::Str(e) => &e.ty,
            Expr::Null(e) => &e.ty,
            Expr::Variable(e) => &e.ty,
            Expr::Let(e) => &e.ty,
            Expr::Cast(e) => &e.ty,
            Expr::Binary(e) => &e.ty,
            Expr::Unary(e) => &e.ty,
            Expr::Call(e) => &e.ty,
            Expr::Index(e) => &e.ty,
            Expr::Field(e) => &e.ty,
            Expr::New(e) => &e.ty,
            Expr::Block(e) => &e.ty,
            Expr::If(e) => &e.ty,
            Expr::While(e) => &e.ty,
        }
    }

    /// Lower this expression at the current insertion point
    pub fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        match self {
            Expr::Number(e) => e.emit(c),
            Expr::Bool(e) => e.emit(c),
            Expr::Char(e) => e.emit(c),
            Expr::Str(e) => e.emit(c),
            Expr::Null(e) => e.emit(c),
            Expr::Variable(e) => e.emit(c),
            Expr::Let(e) => e.emit(c),
            Expr::Cast(e) => e.emit(c),
            Expr::Binary(e) => e.emit(c),
            Expr::Unary(e) => e.emit(c),
            Expr::Call(e) => e.emit(c),
            Expr::Index(e) => e.emit(c),
            Expr::Field(e) => e.emit(c),
            Expr::New(e) => e.emit(c),
            Expr::Block(e) => e.emit(c),
            Expr::If(e) => e.emit(c),
            Expr::While(e) => e.emit(c),
        }
    }

    /// The compile-time constant this expression denotes, if any.
    /// Global initializers must produce one.
    pub fn as_constant(&self) -> CompileResult<Option<Constant>> {
        Ok(match self {
            Expr::Number(n) => Some(if n.ty.is_floating() {
                Constant::Float(n.float_value()?)
            } else {
                Constant::Int(n.int_value()?)
            }),
            Expr::Bool(b) => Some(Constant::Bool(b.value)),
            Expr::Char(c) => Some(Constant::Int(c.value as i64)),
            Expr::Null(_) => Some(Constant::Null),
            Expr::Str(s) if s.lit.flavor == StrFlavor::CharArray => {
                Some(Constant::Bytes(s.lit.bytes.clone()))
            }
            _ => None,
        })
    }

    /// The compile-time integer this expression denotes, if any.
    /// Tuple indices must produce one.
    fn const_index(&self) -> Option<u64> {
        match self {
            Expr::Number(n) if !n.lit.has_dot => u64::from_str_radix(&n.lit.text, n.lit.base).ok(),
            Expr::Char(c) => Some(c.value as u64),
            _ => None,
        }
    }
}

// ============ Literals ============

/// A numeric literal, kept as digit text until emission
#[derive(Debug)]
pub struct NumberExpr {
    lit: NumberLit,
    ty: Type,
}

impl NumberExpr {
    /// Map the literal's suffix to its type: `d`→f64, `f`→f32,
    /// `i`→i32, `u`→u32, `l`→i64, `b`→u8. The integer suffixes
    /// forbid a dot, and floats only exist in base 10.
    pub fn new(lit: NumberLit) -> CompileResult<Self> {
        let ty = match lit.suffix {
            'd' => Type::f64(),
            'f' => Type::f32(),
            'i' => Type::i32(),
            'u' => Type::u32(),
            'l' => Type::i64(),
            'b' => Type::u8(),
            other => return Err(CompileError::InvalidNumberSuffix(other)),
        };
        if lit.has_dot && !ty.is_floating() {
            return Err(CompileError::DottedIntLiteral(lit.suffix));
        }
        if ty.is_floating() && lit.base != 10 {
            return Err(CompileError::FloatWithBase);
        }
        Ok(Self { lit, ty })
    }

    fn int_value(&self) -> CompileResult<i64> {
        u64::from_str_radix(&self.lit.text, self.lit.base)
            .map(|v| v as i64)
            .map_err(|_| CompileError::NumberOutOfRange(self.lit.text.clone()))
    }

    fn float_value(&self) -> CompileResult<f64> {
        self.lit
            .text
            .parse()
            .map_err(|_| CompileError::NumberOutOfRange(self.lit.text.clone()))
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let reg = if self.ty.is_floating() {
            let value = self.float_value()?;
            c.builder.const_float(self.ty.ir_type(), value)
        } else {
            let value = self.int_value()?;
            c.builder.const_int(self.ty.ir_type(), value)
        };
        Ok(Value::immediate(self.ty.clone(), reg))
    }
}

/// `true` / `false`
#[derive(Debug)]
pub struct BoolExpr {
    value: bool,
    ty: Type,
}

impl BoolExpr {
    pub fn new(value: bool) -> Self {
        Self {
            value,
            ty: Type::bool(),
        }
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let reg = c.builder.const_bool(self.value);
        Ok(Value::immediate(self.ty.clone(), reg))
    }
}

/// A single byte, `'a'`
#[derive(Debug)]
pub struct CharExpr {
    value: u8,
    ty: Type,
}

impl CharExpr {
    pub fn new(value: u8) -> Self {
        Self {
            value,
            ty: Type::u8(),
        }
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let reg = c.builder.const_int(IrType::I8, self.value as i64);
        Ok(Value::immediate(self.ty.clone(), reg))
    }
}

/// A string literal. The flavor decides both the result type and the
/// emission strategy: a plain `"…"` is an inline byte aggregate,
/// while `"…"c` and `"…"p` become module-level constants accessed
/// through a pointer to their first byte.
#[derive(Debug)]
pub struct StringExpr {
    lit: StringLit,
    ty: Type,
}

impl StringExpr {
    pub fn new(lit: StringLit) -> CompileResult<Self> {
        let ty = match lit.flavor {
            StrFlavor::CharArray => Type::Tuple(vec![Type::u8(); lit.bytes.len()]),
            StrFlavor::CString | StrFlavor::PtrCharArray => {
                if lit.flavor == StrFlavor::CString && lit.bytes.last() != Some(&0) {
                    return Err(CompileError::MissingNul);
                }
                Type::pointer(Type::u8())
            }
        };
        Ok(Self { lit, ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        match self.lit.flavor {
            StrFlavor::CharArray => {
                let ir = IrType::array(IrType::I8, self.lit.bytes.len());
                let reg = c.builder.const_bytes(ir, self.lit.bytes.clone());
                Ok(Value::immediate(self.ty.clone(), reg))
            }
            StrFlavor::CString | StrFlavor::PtrCharArray => {
                let name = c.builder.add_string_constant(&self.lit.bytes);
                let global = c.builder.global_ref(&name);
                let first = c.builder.get_field_ptr(global, 0);
                Ok(Value::immediate(self.ty.clone(), first))
            }
        }
    }
}

/// A typed `null`. Only pointer and numeric types are nullable.
#[derive(Debug)]
pub struct NullExpr {
    ty: Type,
}

impl NullExpr {
    pub fn new(ty: Type) -> CompileResult<Self> {
        if !ty.is_nullable() {
            return Err(CompileError::NotNullable(ty));
        }
        Ok(Self { ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let reg = c.builder.const_null(self.ty.ir_type());
        Ok(Value::immediate(self.ty.clone(), reg))
    }
}

// ============ Names and bindings ============

/// A reference to a name in scope. Resolution happens at
/// construction, against the declared types.
#[derive(Debug)]
pub struct VariableExpr {
    name: String,
    ty: Type,
}

impl VariableExpr {
    pub fn new(c: &Compiler, name: impl Into<String>) -> CompileResult<Self> {
        let name = name.into();
        let ty = c
            .value_type(&name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownVariable(name.clone()))?;
        Ok(Self { name, ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        c.value(&self.name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownVariable(self.name.clone()))
    }
}

/// `let name: ty = init`, in its three modes: global slot, constant
/// binding (no memory), mutable stack slot.
#[derive(Debug)]
pub struct LetExpr {
    name: String,
    ty: Type,
    init: Option<Expr>,
    constant: bool,
    global: bool,
}

impl LetExpr {
    pub fn new(
        c: &mut Compiler,
        name: impl Into<String>,
        declared: Option<Type>,
        init: Option<Expr>,
        constant: bool,
        global: bool,
    ) -> CompileResult<Self> {
        let name = name.into();
        let ty = match declared {
            Some(ty) => ty,
            None => match &init {
                Some(expr) => expr.ty().clone(),
                None => return Err(CompileError::UntypedValuelessLet(name)),
            },
        };
        c.declare_value_type(name.clone(), ty.clone());
        Ok(Self {
            name,
            ty,
            init,
            constant,
            global,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Local emission: constants bind the value directly, mutables get
    /// a stack slot with the initializer cast to the declared type.
    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        if self.constant {
            let init = self
                .init
                .as_ref()
                .ok_or_else(|| CompileError::ConstantWithoutValue(self.name.clone()))?;
            let mut value = init.emit(c)?;
            if value.ty() != &self.ty {
                value = value.cast_to(self.ty.clone());
            }
            c.bind(self.name.clone(), value.clone());
            return Ok(value);
        }

        let slot = c.builder.alloca(self.ty.ir_type());
        let value = Value::loaded(self.ty.clone(), slot);
        c.bind(self.name.clone(), value.clone());
        if let Some(init) = &self.init {
            let reg = init.emit(c)?.cast_to(self.ty.clone()).load(&mut c.builder)?;
            c.builder.store(slot, reg);
        }
        Ok(value)
    }

    /// Top-level emission: a module slot whose initializer must be a
    /// compile-time constant.
    pub fn emit_global(&self, c: &mut Compiler) -> CompileResult<()> {
        let init = match &self.init {
            Some(expr) => Some(
                expr.as_constant()?
                    .ok_or_else(|| CompileError::NonConstantGlobalInit(self.name.clone()))?,
            ),
            None => None,
        };
        c.builder
            .add_global(self.name.clone(), self.ty.ir_type(), init, self.constant);
        c.bind(self.name.clone(), Value::global(self.ty.clone(), self.name.clone()));
        Ok(())
    }

    /// Forward declaration: the slot exists in the module, some other
    /// object file provides the initializer.
    pub fn emit_declare(&self, c: &mut Compiler) -> CompileResult<()> {
        c.builder
            .add_global(self.name.clone(), self.ty.ir_type(), None, false);
        c.bind(self.name.clone(), Value::global(self.ty.clone(), self.name.clone()));
        Ok(())
    }
}

// ============ Operators ============

/// An explicit cast, `(T) expr`. The coercion itself stays pending
/// until the resulting value is loaded.
#[derive(Debug)]
pub struct CastExpr {
    expr: Expr,
    ty: Type,
}

impl CastExpr {
    pub fn new(expr: Expr, to: Type) -> Self {
        Self { expr, ty: to }
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        Ok(self.expr.emit(c)?.cast_to(self.ty.clone()))
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    LogAnd,
    LogOr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }
}

/// `lhs ⊕ rhs`. Legal operand shapes are numeric⊕numeric (same
/// floatness, the narrower side widened to the wider), pointer ±
/// integer, and assignment.
#[derive(Debug)]
pub struct BinaryExpr {
    op: BinOp,
    lhs: Expr,
    rhs: Expr,
    ty: Type,
}

impl BinaryExpr {
    pub fn new(op: BinOp, lhs: Expr, rhs: Expr) -> CompileResult<Self> {
        let lt = lhs.ty();
        let rt = rhs.ty();
        let mismatch = || CompileError::BinaryOperandMismatch(lt.clone(), rt.clone());

        let ty = if op == BinOp::Assign {
            rt.clone()
        } else {
            match (lt.as_number(), rt.as_number()) {
                (Some((lb, lf, _)), Some((rb, rf, _))) => {
                    if lf != rf {
                        return Err(mismatch());
                    }
                    if op.is_comparison() {
                        Type::bool()
                    } else if rb > lb {
                        rt.clone()
                    } else {
                        lt.clone()
                    }
                }
                (None, Some((_, false, _)))
                    if lt.is_pointer() && matches!(op, BinOp::Add | BinOp::Sub) =>
                {
                    lt.clone()
                }
                (Some((_, false, _)), None) if rt.is_pointer() && op == BinOp::Add => rt.clone(),
                _ => return Err(mismatch()),
            }
        };
        Ok(Self { op, lhs, rhs, ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        if self.op == BinOp::Assign {
            return self.emit_assign(c);
        }
        match (self.lhs.ty().as_number(), self.rhs.ty().as_number()) {
            (Some(l), Some(r)) => self.emit_numeric(c, l, r),
            (None, _) => self.emit_pointer(c, &self.lhs, &self.rhs),
            _ => self.emit_pointer(c, &self.rhs, &self.lhs),
        }
    }

    /// Store into the left-hand side's address and hand the slot back
    /// as a loaded value.
    fn emit_assign(&self, c: &mut Compiler) -> CompileResult<Value> {
        let target = self.lhs.emit(c)?;
        let ptr = target.address(&mut c.builder)?;
        let value = self.rhs.emit(c)?.cast_to(self.lhs.ty().clone());
        let reg = value.load(&mut c.builder)?;
        c.builder.store(ptr, reg);
        Ok(Value::loaded(self.ty.clone(), ptr))
    }

    fn emit_numeric(
        &self,
        c: &mut Compiler,
        (lbits, lfloat, lsigned): (u32, bool, bool),
        (rbits, rfloat, rsigned): (u32, bool, bool),
    ) -> CompileResult<Value> {
        let mut lreg = self.lhs.emit(c)?.load(&mut c.builder)?;
        let mut rreg = self.rhs.emit(c)?.load(&mut c.builder)?;

        // Widen the narrower operand
        if lbits > rbits {
            rreg = cast::numeric_cast(rreg, self.rhs.ty(), self.lhs.ty(), &mut c.builder)?;
        } else if rbits > lbits {
            lreg = cast::numeric_cast(lreg, self.lhs.ty(), self.rhs.ty(), &mut c.builder)?;
        }

        let floating = lfloat && rfloat;
        let signed = lsigned && rsigned;
        let b = &mut c.builder;
        let reg = match (self.op, floating) {
            (BinOp::Add, true) => b.fadd(lreg, rreg),
            (BinOp::Add, false) => b.add(lreg, rreg),
            (BinOp::Sub, true) => b.fsub(lreg, rreg),
            (BinOp::Sub, false) => b.sub(lreg, rreg),
            (BinOp::Mul, true) => b.fmul(lreg, rreg),
            (BinOp::Mul, false) => b.mul(lreg, rreg),
            (BinOp::Div, true) => b.fdiv(lreg, rreg),
            (BinOp::Div, false) if signed => b.sdiv(lreg, rreg),
            (BinOp::Div, false) => b.udiv(lreg, rreg),
            (BinOp::Rem, true) => b.frem(lreg, rreg),
            (BinOp::Rem, false) if signed => b.srem(lreg, rreg),
            (BinOp::Rem, false) => b.urem(lreg, rreg),
            (BinOp::BitAnd | BinOp::LogAnd, _) => b.and(lreg, rreg),
            (BinOp::BitOr | BinOp::LogOr, _) => b.or(lreg, rreg),
            (BinOp::Lt, true) => b.fcmp(CmpOp::Ult, lreg, rreg),
            (BinOp::Lt, false) => b.icmp(if signed { CmpOp::Slt } else { CmpOp::Ult }, lreg, rreg),
            (BinOp::Gt, true) => b.fcmp(CmpOp::Ugt, lreg, rreg),
            (BinOp::Gt, false) => b.icmp(if signed { CmpOp::Sgt } else { CmpOp::Ugt }, lreg, rreg),
            (BinOp::Le, true) => b.fcmp(CmpOp::Ule, lreg, rreg),
            (BinOp::Le, false) => b.icmp(if signed { CmpOp::Sle } else { CmpOp::Ule }, lreg, rreg),
            (BinOp::Ge, true) => b.fcmp(CmpOp::Uge, lreg, rreg),
            (BinOp::Ge, false) => b.icmp(if signed { CmpOp::Sge } else { CmpOp::Uge }, lreg, rreg),
            (BinOp::Eq, true) => b.fcmp(CmpOp::Eq, lreg, rreg),
            (BinOp::Eq, false) => b.icmp(CmpOp::Eq, lreg, rreg),
            (BinOp::Ne, true) => b.fcmp(CmpOp::Ne, lreg, rreg),
            (BinOp::Ne, false) => b.icmp(CmpOp::Ne, lreg, rreg),
            (BinOp::Assign, _) => {
                return Err(CompileError::BinaryOperandMismatch(
                    self.lhs.ty().clone(),
                    self.rhs.ty().clone(),
                ))
            }
        };
        Ok(Value::immediate(self.ty.clone(), reg))
    }

    /// Pointer arithmetic lowers to a GEP over the pointee type;
    /// subtraction negates the index first.
    fn emit_pointer(&self, c: &mut Compiler, ptr: &Expr, num: &Expr) -> CompileResult<Value> {
        let ptr_reg = ptr.emit(c)?.load(&mut c.builder)?;
        let mut index = num.emit(c)?.load(&mut c.builder)?;
        if self.op == BinOp::Sub {
            let zero = c.builder.const_zero(num.ty().ir_type());
            index = c.builder.sub(zero, index);
        }
        let gep = c.builder.get_element_ptr(ptr_reg, index);
        Ok(Value::immediate(self.ty.clone(), gep))
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// `*p`
    Deref,
    /// `&e`
    AddrOf,
    /// `-n`
    Neg,
    /// `!n`
    Not,
}

impl UnOp {
    fn symbol(&self) -> char {
        match self {
            UnOp::Deref => '*',
            UnOp::AddrOf => '&',
            UnOp::Neg => '-',
            UnOp::Not => '!',
        }
    }
}

/// `*p`, `&e`, `-n`, `!n`
#[derive(Debug)]
pub struct UnaryExpr {
    op: UnOp,
    operand: Expr,
    ty: Type,
}

impl UnaryExpr {
    pub fn new(op: UnOp, operand: Expr) -> CompileResult<Self> {
        let ty = match op {
            UnOp::Deref => match operand.ty() {
                Type::Pointer(inner) => inner.as_ref().clone(),
                other => return Err(CompileError::DerefNonPointer(other.clone())),
            },
            UnOp::AddrOf => Type::pointer(operand.ty().clone()),
            UnOp::Neg | UnOp::Not => {
                if !operand.ty().is_number() {
                    return Err(CompileError::UnaryOperandMismatch {
                        op: op.symbol(),
                        ty: operand.ty().clone(),
                    });
                }
                if op == UnOp::Not {
                    Type::bool()
                } else {
                    operand.ty().clone()
                }
            }
        };
        Ok(Self { op, operand, ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let value = self.operand.emit(c)?;
        match self.op {
            UnOp::Deref => {
                let ptr = value.load(&mut c.builder)?;
                Ok(Value::loaded(self.ty.clone(), ptr))
            }
            UnOp::AddrOf => {
                let ptr = value.address(&mut c.builder)?;
                Ok(Value::immediate(self.ty.clone(), ptr))
            }
            UnOp::Neg => {
                // 0 - n, with the zero in the operand's own type
                let reg = value.load(&mut c.builder)?;
                let zero = c.builder.const_zero(self.operand.ty().ir_type());
                let neg = if self.operand.ty().is_floating() {
                    c.builder.fsub(zero, reg)
                } else {
                    c.builder.sub(zero, reg)
                };
                Ok(Value::immediate(self.ty.clone(), neg))
            }
            UnOp::Not => {
                // n == 0, with the zero in the operand's own type
                let reg = value.load(&mut c.builder)?;
                let zero = c.builder.const_zero(self.operand.ty().ir_type());
                let not = if self.operand.ty().is_floating() {
                    c.builder.fcmp(CmpOp::Eq, reg, zero)
                } else {
                    c.builder.icmp(CmpOp::Eq, reg, zero)
                };
                Ok(Value::immediate(self.ty.clone(), not))
            }
        }
    }
}

// ============ Calls ============

/// `callee(args)`. The callee may be a function or a pointer to one.
/// Fixed-arity arguments are cast to their parameter types; vararg
/// extras are passed through unchanged.
#[derive(Debug)]
pub struct CallExpr {
    callee: Expr,
    args: Vec<Expr>,
    params: Vec<Type>,
    ty: Type,
}

impl CallExpr {
    pub fn new(callee: Expr, args: Vec<Expr>) -> CompileResult<Self> {
        let (ret, params, vararg) = match callee.ty() {
            Type::Function {
                ret,
                params,
                vararg,
            } => (ret.as_ref().clone(), params.clone(), *vararg),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Function {
                    ret,
                    params,
                    vararg,
                } => (ret.as_ref().clone(), params.clone(), *vararg),
                _ => return Err(CompileError::NotCallable(callee.ty().clone())),
            },
            other => return Err(CompileError::NotCallable(other.clone())),
        };
        let arity_ok = if vararg {
            args.len() >= params.len()
        } else {
            args.len() == params.len()
        };
        if !arity_ok {
            return Err(CompileError::WrongArgCount {
                expected: params.len(),
                found: args.len(),
            });
        }
        Ok(Self {
            callee,
            args,
            params,
            ty: ret,
        })
    }

    /// `recv.name(args)` desugars into a call of the free identifier
    /// `"(<recv type>)::<name>"` with the receiver as the trailing
    /// argument. This is also how methods are registered, see
    /// [`Prototype::method`].
    pub fn method(
        c: &Compiler,
        recv: Expr,
        name: &str,
        mut args: Vec<Expr>,
    ) -> CompileResult<Self> {
        let mangled = format!("({})::{}", recv.ty(), name);
        let callee = Expr::Variable(VariableExpr::new(c, mangled)?);
        args.push(recv);
        Self::new(callee, args)
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let callee = self.callee.emit(c)?;
        let mut regs = Vec::with_capacity(self.args.len());
        for (i, arg) in self.args.iter().enumerate() {
            let value = arg.emit(c)?;
            let reg = match self.params.get(i) {
                Some(param_ty) => value.cast_to(param_ty.clone()).load(&mut c.builder)?,
                // Vararg extras receive no implicit cast
                None => value.load(&mut c.builder)?,
            };
            regs.push(reg);
        }
        let reg = match callee {
            Value::Func { name, .. } => c.builder.call(name, regs),
            other => {
                let ptr = other.load(&mut c.builder)?;
                c.builder.call_ptr(ptr, regs)
            }
        };
        Ok(Value::immediate(self.ty.clone(), reg))
    }
}

// ============ Aggregates ============

/// `base[index]`. Pointers index dynamically through a GEP; tuples
/// only accept compile-time constant indices.
#[derive(Debug)]
pub struct IndexExpr {
    base: Expr,
    index: Expr,
    tuple_index: Option<u32>,
    ty: Type,
}

impl IndexExpr {
    pub fn new(base: Expr, index: Expr) -> CompileResult<Self> {
        let (ty, tuple_index) = match base.ty() {
            Type::Pointer(inner) => (inner.as_ref().clone(), None),
            Type::Tuple(elems) => {
                let idx = index
                    .const_index()
                    .ok_or(CompileError::NonConstantTupleIndex)?;
                let elem = elems
                    .get(idx as usize)
                    .ok_or_else(|| CompileError::TupleIndexOutOfRange {
                        ty: base.ty().clone(),
                        index: idx,
                    })?;
                (elem.clone(), Some(idx as u32))
            }
            other => return Err(CompileError::NotIndexable(other.clone())),
        };
        Ok(Self {
            base,
            index,
            tuple_index,
            ty,
        })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        if let Some(idx) = self.tuple_index {
            let tuple = self.base.emit(c)?;
            if tuple.has_address() {
                let addr = tuple.address(&mut c.builder)?;
                let ptr = c.builder.get_field_ptr(addr, idx);
                return Ok(Value::loaded(self.ty.clone(), ptr));
            }
            let agg = tuple.load(&mut c.builder)?;
            let member = c.builder.extract_value(agg, idx);
            return Ok(Value::immediate(self.ty.clone(), member));
        }

        let index = self.index.emit(c)?.load(&mut c.builder)?;
        let base = self.base.emit(c)?.load(&mut c.builder)?;
        let ptr = c.builder.get_element_ptr(base, index);
        Ok(Value::loaded(self.ty.clone(), ptr))
    }
}

/// `s.field` on a pointer-to-struct; the field index is resolved at
/// construction.
#[derive(Debug)]
pub struct FieldExpr {
    obj: Expr,
    index: u32,
    ty: Type,
}

impl FieldExpr {
    pub fn new(obj: Expr, field: impl Into<String>) -> CompileResult<Self> {
        let field = field.into();
        let struct_ty = match obj.ty() {
            Type::Pointer(inner) => inner.as_ref().clone(),
            other => return Err(CompileError::PropAccessNonStruct(other.clone())),
        };
        let name = match &struct_ty {
            Type::Struct { name, .. } => name.clone(),
            other => return Err(CompileError::PropAccessNonStruct(other.clone())),
        };
        let index = struct_ty
            .field_index(&field)
            .ok_or_else(|| CompileError::UnknownField(name.clone(), field.clone()))?;
        let ty = struct_ty
            .field_type(index)
            .cloned()
            .ok_or_else(|| CompileError::UnknownField(name, field))?;
        Ok(Self { obj, index, ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let ptr = self.obj.emit(c)?.load(&mut c.builder)?;
        let field_ptr = c.builder.get_field_ptr(ptr, self.index);
        Ok(Value::loaded(self.ty.clone(), field_ptr))
    }
}

/// `new T { k = v, … }`: a stack instance of a struct, handed around
/// by pointer. Keys are resolved to field indices at construction;
/// unknown and duplicate keys are rejected.
#[derive(Debug)]
pub struct NewExpr {
    struct_ty: Type,
    inits: Vec<(u32, Expr)>,
    ty: Type,
}

impl NewExpr {
    pub fn new(struct_ty: Type, fields: Vec<(String, Expr)>) -> CompileResult<Self> {
        let name = match &struct_ty {
            Type::Struct { name, .. } => name.clone(),
            other => return Err(CompileError::NewNonStruct(other.clone())),
        };
        let mut inits = Vec::with_capacity(fields.len());
        let mut seen = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let index = struct_ty
                .field_index(&key)
                .ok_or_else(|| CompileError::UnknownField(name.clone(), key.clone()))?;
            if seen.contains(&index) {
                return Err(CompileError::DuplicateField(key));
            }
            seen.push(index);
            inits.push((index, value));
        }
        let ty = Type::pointer(struct_ty.clone());
        Ok(Self {
            struct_ty,
            inits,
            ty,
        })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let slot = c.builder.alloca(self.struct_ty.ir_type());
        for (index, value) in &self.inits {
            let field_ptr = c.builder.get_field_ptr(slot, *index);
            let reg = value.emit(c)?.load(&mut c.builder)?;
            c.builder.store(field_ptr, reg);
        }
        Ok(Value::immediate(self.ty.clone(), slot))
    }
}

// ============ Control flow ============

/// A non-empty expression sequence; the last expression's value is
/// the block's value.
#[derive(Debug)]
pub struct BlockExpr {
    exprs: Vec<Expr>,
    ty: Type,
}

impl BlockExpr {
    pub fn new(exprs: Vec<Expr>) -> CompileResult<Self> {
        let ty = match exprs.last() {
            Some(last) => last.ty().clone(),
            None => return Err(CompileError::EmptyBlock),
        };
        Ok(Self { exprs, ty })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let (last, init) = match self.exprs.split_last() {
            Some(pair) => pair,
            None => return Err(CompileError::EmptyBlock),
        };
        for expr in init {
            expr.emit(c)?;
        }
        last.emit(c)
    }
}

/// Normalize a numeric condition to a 1-bit value: booleans pass
/// through, everything else compares against its own type's zero.
fn emit_condition(cond: &Expr, c: &mut Compiler) -> CompileResult<VReg> {
    let reg = cond.emit(c)?.load(&mut c.builder)?;
    match cond.ty().as_number() {
        Some((1, false, _)) => Ok(reg),
        Some((_, true, _)) => {
            let zero = c.builder.const_zero(cond.ty().ir_type());
            Ok(c.builder.fcmp(CmpOp::Ne, reg, zero))
        }
        Some(_) => {
            let zero = c.builder.const_zero(cond.ty().ir_type());
            Ok(c.builder.icmp(CmpOp::Ne, reg, zero))
        }
        None => Err(CompileError::NonNumericCondition(cond.ty().clone())),
    }
}

/// A missing else arm defaults to a typed null of the then arm's
/// type, which requires that type to be nullable.
fn default_else(then_ty: &Type, els: Option<Expr>) -> CompileResult<Expr> {
    match els {
        Some(expr) => Ok(expr),
        None => Ok(Expr::Null(NullExpr::new(then_ty.clone())?)),
    }
}

/// `if (cond) then else els`, as an expression. Both arms must agree
/// structurally on their type; the merged value is a φ keyed by the
/// blocks each arm actually ended in.
#[derive(Debug)]
pub struct IfExpr {
    cond: Expr,
    then: Expr,
    els: Expr,
    ty: Type,
}

impl IfExpr {
    pub fn new(cond: Expr, then: Expr, els: Option<Expr>) -> CompileResult<Self> {
        if !cond.ty().is_number() {
            return Err(CompileError::NonNumericCondition(cond.ty().clone()));
        }
        let els = default_else(then.ty(), els)?;
        if then.ty() != els.ty() {
            return Err(CompileError::ArmTypeMismatch(
                then.ty().clone(),
                els.ty().clone(),
            ));
        }
        let ty = then.ty().clone();
        Ok(Self {
            cond,
            then,
            els,
            ty,
        })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let cond = emit_condition(&self.cond, c)?;
        let then_bb = c.builder.create_block();
        let else_bb = c.builder.create_block();
        let merge_bb = c.builder.create_block();
        c.builder.cond_br(cond, then_bb, else_bb);

        c.builder.start_block(then_bb);
        let then_reg = self.then.emit(c)?.load(&mut c.builder)?;
        // Emitting the arm may itself have moved the insertion point;
        // the φ must name the block the arm actually ended in.
        let then_end = c.builder.current_block_id().unwrap_or(then_bb);
        c.builder.br(merge_bb);

        c.builder.start_block(else_bb);
        let else_reg = self.els.emit(c)?.load(&mut c.builder)?;
        let else_end = c.builder.current_block_id().unwrap_or(else_bb);
        c.builder.br(merge_bb);

        c.builder.start_block(merge_bb);
        let phi = c.builder.phi(vec![(then_reg, then_end), (else_reg, else_end)]);
        Ok(Value::immediate(self.ty.clone(), phi))
    }
}

/// `while (cond) body else els`, as an expression. The else arm runs
/// when the condition is false on its first evaluation; otherwise the
/// loop's value is the body's value from the final iteration. The
/// back-edge branches on a freshly recomputed condition.
#[derive(Debug)]
pub struct WhileExpr {
    cond: Expr,
    body: Expr,
    els: Expr,
    ty: Type,
}

impl WhileExpr {
    pub fn new(cond: Expr, body: Expr, els: Option<Expr>) -> CompileResult<Self> {
        if !cond.ty().is_number() {
            return Err(CompileError::NonNumericCondition(cond.ty().clone()));
        }
        let els = default_else(body.ty(), els)?;
        if body.ty() != els.ty() {
            return Err(CompileError::ArmTypeMismatch(
                body.ty().clone(),
                els.ty().clone(),
            ));
        }
        let ty = body.ty().clone();
        Ok(Self {
            cond,
            body,
            els,
            ty,
        })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<Value> {
        let cond = emit_condition(&self.cond, c)?;
        let body_bb = c.builder.create_block();
        let else_bb = c.builder.create_block();
        let merge_bb = c.builder.create_block();
        c.builder.cond_br(cond, body_bb, else_bb);

        c.builder.start_block(body_bb);
        let body_reg = self.body.emit(c)?.load(&mut c.builder)?;
        let again = emit_condition(&self.cond, c)?;
        let body_end = c.builder.current_block_id().unwrap_or(body_bb);
        c.builder.cond_br(again, body_bb, merge_bb);

        c.builder.start_block(else_bb);
        let else_reg = self.els.emit(c)?.load(&mut c.builder)?;
        let else_end = c.builder.current_block_id().unwrap_or(else_bb);
        c.builder.br(merge_bb);

        c.builder.start_block(merge_bb);
        let phi = c.builder.phi(vec![(body_reg, body_end), (else_reg, else_end)]);
        Ok(Value::immediate(self.ty.clone(), phi))
    }
}

// ============ Top-level declarations ============

/// A function prototype: its name (possibly method-mangled), its
/// named parameters and its signature. Construction installs the
/// parameter types and, once the return type is known, the function's
/// own type into the context.
#[derive(Debug)]
pub struct Prototype {
    name: String,
    params: Vec<(String, Type)>,
    ret: Option<Type>,
    vararg: bool,
}

impl Prototype {
    pub fn new(
        c: &mut Compiler,
        name: impl Into<String>,
        params: Vec<(String, Type)>,
        ret: Option<Type>,
        vararg: bool,
    ) -> Self {
        let name = name.into();
        for (param, ty) in &params {
            c.declare_value_type(param.clone(), ty.clone());
        }
        let proto = Self {
            name,
            params,
            ret,
            vararg,
        };
        if proto.ret.is_some() {
            proto.register(c);
        }
        proto
    }

    /// A method prototype: renames itself to `"(<this type>)::<name>"`
    /// and appends a `this` parameter of the receiver type.
    pub fn method(
        c: &mut Compiler,
        this_ty: Type,
        name: &str,
        mut params: Vec<(String, Type)>,
        ret: Option<Type>,
        vararg: bool,
    ) -> Self {
        let mangled = format!("({})::{}", this_ty, name);
        params.push(("this".to_owned(), this_ty));
        Self::new(c, mangled, params, ret, vararg)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function's type, once the return type is resolved
    pub fn fn_type(&self) -> Option<Type> {
        self.ret.as_ref().map(|ret| {
            Type::function(
                ret.clone(),
                self.params.iter().map(|(_, ty)| ty.clone()).collect(),
                self.vararg,
            )
        })
    }

    fn register(&self, c: &mut Compiler) {
        if let Some(ty) = self.fn_type() {
            c.declare_value_type(self.name.clone(), ty);
        }
    }

    fn set_ret(&mut self, c: &mut Compiler, ret: Type) {
        self.ret = Some(ret);
        self.register(c);
    }

    fn ir_params(&self) -> Vec<(String, IrType)> {
        self.params
            .iter()
            .map(|(name, ty)| (name.clone(), ty.ir_type()))
            .collect()
    }

    /// Forward-declare the function in the module, without a body
    pub fn declare(&self, c: &mut Compiler) -> CompileResult<()> {
        let fn_ty = self
            .fn_type()
            .ok_or_else(|| CompileError::DeclareWithoutReturnType(self.name.clone()))?;
        let ret = match &fn_ty {
            Type::Function { ret, .. } => ret.ir_type(),
            _ => return Err(CompileError::DeclareWithoutReturnType(self.name.clone())),
        };
        let params = self.params.iter().map(|(_, ty)| ty.ir_type()).collect();
        c.builder
            .declare_external(self.name.clone(), params, ret, self.vararg);
        c.bind(self.name.clone(), Value::func(fn_ty, self.name.clone()));
        Ok(())
    }
}

/// A function definition. An unresolved return type is filled in from
/// the body's type at construction.
#[derive(Debug)]
pub struct FunctionDef {
    proto: Prototype,
    body: Expr,
}

impl FunctionDef {
    pub fn new(c: &mut Compiler, mut proto: Prototype, body: Expr) -> Self {
        if proto.ret.is_none() {
            proto.set_ret(c, body.ty().clone());
        }
        Self { proto, body }
    }

    pub fn emit(&self, c: &mut Compiler) -> CompileResult<()> {
        let name = self.proto.name.clone();
        if c.builder.function_defined(&name) {
            return Err(CompileError::FunctionRedefined(name));
        }
        let fn_ty = self
            .proto
            .fn_type()
            .ok_or_else(|| CompileError::DeclareWithoutReturnType(name.clone()))?;
        let ret = match &fn_ty {
            Type::Function { ret, .. } => ret.as_ref().clone(),
            _ => return Err(CompileError::DeclareWithoutReturnType(name)),
        };

        let regs = c
            .builder
            .start_function(name.clone(), self.proto.ir_params(), ret.ir_type());
        c.bind(name.clone(), Value::func(fn_ty, name.clone()));
        for ((param, ty), reg) in self.proto.params.iter().zip(regs) {
            c.bind(param.clone(), Value::immediate(ty.clone(), reg));
        }

        let mut result = self.body.emit(c)?;
        if result.ty() != &ret {
            result = result.cast_to(ret);
        }
        let reg = result.load(&mut c.builder)?;
        c.builder.ret(Some(reg));
        c.builder.finish_function();
        Ok(())
    }
}

/// A forward declaration of either kind of symbol
#[derive(Debug)]
pub enum DeclareItem {
    Global(LetExpr),
    Function(Prototype),
}

/// A struct declaration. Field names must be unique; the type is
/// registered under the struct's name.
#[derive(Debug)]
pub struct StructItem {
    name: String,
    fields: Vec<(String, Type)>,
}

impl StructItem {
    pub fn new(name: impl Into<String>, fields: Vec<(String, Type)>) -> CompileResult<Self> {
        for (i, (field, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(other, _)| other == field) {
                return Err(CompileError::DuplicateField(field.clone()));
            }
        }
        Ok(Self {
            name: name.into(),
            fields,
        })
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<()> {
        let ty = Type::Struct {
            name: self.name.clone(),
            fields: self.fields.clone(),
        };
        c.define_type(self.name.clone(), ty);
        let ir_fields = self
            .fields
            .iter()
            .map(|(name, ty)| (name.clone(), ty.ir_type()))
            .collect();
        c.builder.add_struct(self.name.clone(), ir_fields);
        Ok(())
    }
}

/// `type name = ty`
#[derive(Debug)]
pub struct TypeDefItem {
    name: String,
    ty: Type,
}

impl TypeDefItem {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    fn emit(&self, c: &mut Compiler) -> CompileResult<()> {
        c.define_type(self.name.clone(), self.ty.clone());
        Ok(())
    }
}

/// A top-level declaration
#[derive(Debug)]
pub enum Item {
    Global(LetExpr),
    Function(FunctionDef),
    Declare(DeclareItem),
    Struct(StructItem),
    TypeDef(TypeDefItem),
}

impl Item {
    pub fn emit_toplevel(&self, c: &mut Compiler) -> CompileResult<()> {
        match self {
            Item::Global(let_expr) => let_expr.emit_global(c),
            Item::Function(def) => def.emit(c),
            Item::Declare(DeclareItem::Global(let_expr)) => let_expr.emit_declare(c),
            Item::Declare(DeclareItem::Function(proto)) => proto.declare(c),
            Item::Struct(def) => def.emit(c),
            Item::TypeDef(def) => def.emit(c),
        }
    }
}
