//! IR Instructions
//!
//! Instruction definitions for the fy IR.

use super::types::{BlockId, Constant, IrType, VReg};
use std::fmt;

/// An instruction in the IR
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Result register (None for void instructions)
    pub result: Option<VReg>,
    /// The instruction kind
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: Option<VReg>, kind: InstrKind) -> Self {
        Self { result, kind }
    }
}

/// Kinds of instructions
#[derive(Debug, Clone)]
pub enum InstrKind {
    // ============ Constants ============
    /// Load a typed constant value
    Const(IrType, Constant),

    // ============ Integer Arithmetic ============
    /// Integer addition
    Add(VReg, VReg),
    /// Integer subtraction
    Sub(VReg, VReg),
    /// Integer multiplication
    Mul(VReg, VReg),
    /// Signed integer division
    SDiv(VReg, VReg),
    /// Unsigned integer division
    UDiv(VReg, VReg),
    /// Signed integer remainder
    SRem(VReg, VReg),
    /// Unsigned integer remainder
    URem(VReg, VReg),

    // ============ Floating Point ============
    /// Float addition
    FAdd(VReg, VReg),
    /// Float subtraction
    FSub(VReg, VReg),
    /// Float multiplication
    FMul(VReg, VReg),
    /// Float division
    FDiv(VReg, VReg),
    /// Float remainder
    FRem(VReg, VReg),

    // ============ Bitwise ============
    /// Bitwise AND
    And(VReg, VReg),
    /// Bitwise OR
    Or(VReg, VReg),

    // ============ Comparison ============
    /// Integer comparison
    ICmp(CmpOp, VReg, VReg),
    /// Float comparison
    FCmp(CmpOp, VReg, VReg),

    // ============ Conversions ============
    /// Sign extend
    SExt(VReg, IrType),
    /// Zero extend
    ZExt(VReg, IrType),
    /// Truncate
    Trunc(VReg, IrType),
    /// Float to signed int
    FPToSI(VReg, IrType),
    /// Float to unsigned int
    FPToUI(VReg, IrType),
    /// Signed int to float
    SIToFP(VReg, IrType),
    /// Unsigned int to float
    UIToFP(VReg, IrType),
    /// Float extend/truncate
    FPCast(VReg, IrType),
    /// Pointer to int
    PtrToInt(VReg, IrType),
    /// Int to pointer
    IntToPtr(VReg, IrType),
    /// Bitcast (reinterpret bits)
    Bitcast(VReg, IrType),

    // ============ Memory ============
    /// Allocate stack space
    Alloca(IrType),
    /// Load from memory
    Load(VReg),
    /// Store to memory (ptr, value)
    Store(VReg, VReg),
    /// Get pointer to an aggregate member (ptr, constant index)
    GetFieldPtr(VReg, u32),
    /// Get pointer offset from a base pointer (ptr, index)
    GetElementPtr(VReg, VReg),
    /// Extract a member from an aggregate value
    ExtractValue(VReg, u32),
    /// Insert a member into an aggregate value (agg, value, index)
    InsertValue(VReg, VReg, u32),

    // ============ Function Calls ============
    /// Call a function by name
    Call { func: String, args: Vec<VReg> },
    /// Call a function pointer
    CallPtr { ptr: VReg, args: Vec<VReg> },

    // ============ References ============
    /// Reference to a global (returns pointer to global)
    GlobalRef(String),
    /// Reference to a function (returns function pointer)
    FuncRef(String),

    // ============ Misc ============
    /// Phi node for SSA form: incoming (value, predecessor) edges
    Phi(Vec<(VReg, BlockId)>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Signed less than
    Slt,
    /// Signed less than or equal
    Sle,
    /// Signed greater than
    Sgt,
    /// Signed greater than or equal
    Sge,
    /// Unsigned less than
    Ult,
    /// Unsigned less than or equal
    Ule,
    /// Unsigned greater than
    Ugt,
    /// Unsigned greater than or equal
    Uge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "eq"),
            CmpOp::Ne => write!(f, "ne"),
            CmpOp::Slt => write!(f, "slt"),
            CmpOp::Sle => write!(f, "sle"),
            CmpOp::Sgt => write!(f, "sgt"),
            CmpOp::Sge => write!(f, "sge"),
            CmpOp::Ult => write!(f, "ult"),
            CmpOp::Ule => write!(f, "ule"),
            CmpOp::Ugt => write!(f, "ugt"),
            CmpOp::Uge => write!(f, "uge"),
        }
    }
}

/// Block terminators
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Return from function
    Ret(Option<VReg>),
    /// Unconditional branch
    Br(BlockId),
    /// Conditional branch
    CondBr {
        cond: VReg,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{} = ", result)?;
        }
        match &self.kind {
            InstrKind::Const(ty, c) => write!(f, "const {} {}", ty, c),
            InstrKind::Add(a, b) => write!(f, "add {}, {}", a, b),
            InstrKind::Sub(a, b) => write!(f, "sub {}, {}", a, b),
            InstrKind::Mul(a, b) => write!(f, "mul {}, {}", a, b),
            InstrKind::SDiv(a, b) => write!(f, "sdiv {}, {}", a, b),
            InstrKind::UDiv(a, b) => write!(f, "udiv {}, {}", a, b),
            InstrKind::SRem(a, b) => write!(f, "srem {}, {}", a, b),
            InstrKind::URem(a, b) => write!(f, "urem {}, {}", a, b),
            InstrKind::FAdd(a, b) => write!(f, "fadd {}, {}", a, b),
            InstrKind::FSub(a, b) => write!(f, "fsub {}, {}", a, b),
            InstrKind::FMul(a, b) => write!(f, "fmul {}, {}", a, b),
            InstrKind::FDiv(a, b) => write!(f, "fdiv {}, {}", a, b),
            InstrKind::FRem(a, b) => write!(f, "frem {}, {}", a, b),
            InstrKind::And(a, b) => write!(f, "and {}, {}", a, b),
            InstrKind::Or(a, b) => write!(f, "or {}, {}", a, b),
            InstrKind::ICmp(op, a, b) => write!(f, "icmp {} {}, {}", op, a, b),
            InstrKind::FCmp(op, a, b) => write!(f, "fcmp {} {}, {}", op, a, b),
            InstrKind::SExt(v, ty) => write!(f, "sext {} to {}", v, ty),
            InstrKind::ZExt(v, ty) => write!(f, "zext {} to {}", v, ty),
            InstrKind::Trunc(v, ty) => write!(f, "trunc {} to {}", v, ty),
            InstrKind::FPToSI(v, ty) => write!(f, "fptosi {} to {}", v, ty),
            InstrKind::FPToUI(v, ty) => write!(f, "fptoui {} to {}", v, ty),
            InstrKind::SIToFP(v, ty) => write!(f, "sitofp {} to {}", v, ty),
            InstrKind::UIToFP(v, ty) => write!(f, "uitofp {} to {}", v, ty),
            InstrKind::FPCast(v, ty) => write!(f, "fpcast {} to {}", v, ty),
            InstrKind::PtrToInt(v, ty) => write!(f, "ptrtoint {} to {}", v, ty),
            InstrKind::IntToPtr(v, ty) => write!(f, "inttoptr {} to {}", v, ty),
            InstrKind::Bitcast(v, ty) => write!(f, "bitcast {} to {}", v, ty),
            InstrKind::Alloca(ty) => write!(f, "alloca {}", ty),
            InstrKind::Load(ptr) => write!(f, "load {}", ptr),
            InstrKind::Store(ptr, val) => write!(f, "store {}, {}", ptr, val),
            InstrKind::GetFieldPtr(ptr, idx) => write!(f, "getfieldptr {}, {}", ptr, idx),
            InstrKind::GetElementPtr(ptr, idx) => write!(f, "getelementptr {}, {}", ptr, idx),
            InstrKind::ExtractValue(agg, idx) => write!(f, "extractvalue {}, {}", agg, idx),
            InstrKind::InsertValue(agg, val, idx) => {
                write!(f, "insertvalue {}, {}, {}", agg, val, idx)
            }
            InstrKind::Call { func, args } => {
                write!(f, "call {}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::CallPtr { ptr, args } => {
                write!(f, "callptr {}(", ptr)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::GlobalRef(name) => write!(f, "globalref @{}", name),
            InstrKind::FuncRef(name) => write!(f, "funcref @{}", name),
            InstrKind::Phi(preds) => {
                write!(f, "phi ")?;
                for (i, (val, block)) in preds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}, {}]", val, block)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(v)) => write!(f, "ret {}", v),
            Terminator::Br(block) => write!(f, "br {}", block),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "br {}, {}, {}", cond, then_block, else_block)
            }
        }
    }
}
