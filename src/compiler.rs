//! Lowering glue
//!
//! The [`Compiler`] context owns everything that used to be global in
//! classic one-pass compilers: the three symbol tables and the IR
//! builder with its insertion point. AST constructors read and write
//! the type tables; emission reads and writes the value table and
//! repositions the builder. Compilation is strictly single-threaded,
//! so the context is threaded as `&mut` everywhere.
//!
//! Scoping is flat: the parser is expected to snapshot the tables at a
//! block boundary and restore them afterwards.

use crate::ir::{IrBuilder, Module};
use crate::ty::Type;
use crate::value::Value;
use std::collections::HashMap;

/// A saved copy of the symbol tables, for block-scope restore
#[derive(Clone)]
pub struct Snapshot {
    values: HashMap<String, Value>,
    value_types: HashMap<String, Type>,
    types: HashMap<String, Type>,
}

/// The compilation context
pub struct Compiler {
    /// The IR builder and its insertion point
    pub builder: IrBuilder,
    /// Bindings in scope: identifier → value
    values: HashMap<String, Value>,
    /// Identifier → type, for type checking during AST construction
    value_types: HashMap<String, Type>,
    /// Type aliases and struct names
    types: HashMap<String, Type>,
}

impl Compiler {
    /// Create a context for one compilation
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            builder: IrBuilder::new(module_name),
            values: HashMap::new(),
            value_types: HashMap::new(),
            types: HashMap::new(),
        }
    }

    /// Finish the compilation and hand over the module
    pub fn finish(self) -> Module {
        self.builder.finish()
    }

    // ============ Value types (construction-time) ============

    /// Record the type an identifier will have once emitted
    pub fn declare_value_type(&mut self, name: impl Into<String>, ty: Type) {
        self.value_types.insert(name.into(), ty);
    }

    /// Look up the declared type of an identifier
    pub fn value_type(&self, name: &str) -> Option<&Type> {
        self.value_types.get(name)
    }

    // ============ Values (emission-time) ============

    /// Bind an identifier to an emitted value
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Look up the value bound to an identifier
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    // ============ Named types ============

    /// Register a struct name or type alias
    pub fn define_type(&mut self, name: impl Into<String>, ty: Type) {
        self.types.insert(name.into(), ty);
    }

    /// Resolve a struct name or type alias
    pub fn named_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    // ============ Scopes ============

    /// Snapshot the symbol tables at a block boundary
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            values: self.values.clone(),
            value_types: self.value_types.clone(),
            types: self.types.clone(),
        }
    }

    /// Restore the tables saved by [`Compiler::snapshot`], dropping
    /// any bindings made since
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.values = snapshot.values;
        self.value_types = snapshot.value_types;
        self.types = snapshot.types;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_independent() {
        let mut c = Compiler::new("test");
        c.declare_value_type("x", Type::i32());
        assert_eq!(c.value_type("x"), Some(&Type::i32()));
        assert!(c.value("x").is_none());
        assert!(c.named_type("x").is_none());
    }

    #[test]
    fn test_snapshot_restore_drops_inner_bindings() {
        let mut c = Compiler::new("test");
        c.declare_value_type("outer", Type::i32());

        let saved = c.snapshot();
        c.declare_value_type("inner", Type::f64());
        assert!(c.value_type("inner").is_some());

        c.restore(saved);
        assert!(c.value_type("inner").is_none());
        assert!(c.value_type("outer").is_some());
    }
}
