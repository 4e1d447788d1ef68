//! Compile error definitions
//!
//! Every error in the core is fatal: there is no recovery pass. The
//! enum below is the full taxonomy; `fyc` prints the diagnostic and
//! exits non-zero.

use crate::lexer::LexError;
use crate::ty::Type;
use thiserror::Error;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// A fatal compilation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    // ============ Lex errors ============
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("floating-point literals with a non-decimal base are not supported")]
    FloatWithBase,

    #[error("'{0}' literals can't have a '.'")]
    DottedIntLiteral(char),

    #[error("number literal '{0}' does not fit its type")]
    NumberOutOfRange(String),

    #[error("invalid number type suffix '{0}'")]
    InvalidNumberSuffix(char),

    // ============ Name errors ============
    #[error("variable '{0}' doesn't exist")]
    UnknownVariable(String),

    #[error("type '{0}' doesn't exist")]
    UnknownType(String),

    #[error("struct '{0}' has no field '{1}'")]
    UnknownField(String, String),

    // ============ Type errors ============
    #[error("invalid operands to binary operator: {0} and {1}")]
    BinaryOperandMismatch(Type, Type),

    #[error("unary operator '{op}' can't be applied to {ty}")]
    UnaryOperandMismatch { op: char, ty: Type },

    #[error("{0} can't be casted to {1}")]
    InvalidCast(Type, Type),

    #[error("conditional arms must have the same type, got {0} and {1}")]
    ArmTypeMismatch(Type, Type),

    #[error("incorrect number of arguments passed (expected {expected}, got {found})")]
    WrongArgCount { expected: usize, found: usize },

    #[error("'*' can't be used on a non-pointer type {0}")]
    DerefNonPointer(Type),

    #[error("type {0} can't be indexed (expected pointer or tuple)")]
    NotIndexable(Type),

    #[error("tuple indices must be compile-time constants")]
    NonConstantTupleIndex,

    #[error("tuple index {index} is out of range for {ty}")]
    TupleIndexOutOfRange { ty: Type, index: u64 },

    #[error("property access on non-struct type {0}")]
    PropAccessNonStruct(Type),

    #[error("{0} is not a function and can't be called")]
    NotCallable(Type),

    #[error("value of type {0} has no address")]
    NoAddress(Type),

    #[error("only pointer and numeric types are nullable, got {0}")]
    NotNullable(Type),

    #[error("'new' requires a struct type, got {0}")]
    NewNonStruct(Type),

    #[error("condition must be numeric, got {0}")]
    NonNumericCondition(Type),

    // ============ Semantic errors ============
    #[error("untyped valueless variable '{0}'")]
    UntypedValuelessLet(String),

    #[error("constant variable '{0}' needs an initialization value")]
    ConstantWithoutValue(String),

    #[error("global variable '{0}' needs a constant initializer")]
    NonConstantGlobalInit(String),

    #[error("function '{0}' cannot be redefined")]
    FunctionRedefined(String),

    #[error("declared function '{0}' needs an explicit return type")]
    DeclareWithoutReturnType(String),

    #[error("a block can't be empty")]
    EmptyBlock,

    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    #[error("C-style string is missing its trailing NUL byte")]
    MissingNul,
}
