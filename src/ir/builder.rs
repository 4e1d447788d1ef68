//! IR Builder
//!
//! Helper for constructing IR instructions and basic blocks. The
//! builder owns the module being built and a single insertion point
//! (the current basic block); emission helpers append to it and
//! control-flow lowering repositions it with `start_block`.

use super::instr::{CmpOp, InstrKind, Instruction, Terminator};
use super::types::{BasicBlock, BlockId, Constant, Function, Global, IrType, Module, Param, StructDef, VReg};

/// Builder for constructing IR
pub struct IrBuilder {
    /// Next virtual register ID
    next_vreg: u32,
    /// Next block ID
    next_block: u32,
    /// Next string constant ID
    next_string: u32,
    /// Current module being built
    module: Module,
    /// Current function being built
    current_fn: Option<Function>,
    /// Current block being built
    current_block: Option<BasicBlock>,
}

impl IrBuilder {
    /// Create a new IR builder
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            next_vreg: 0,
            next_block: 0,
            next_string: 0,
            module: Module::new(module_name),
            current_fn: None,
            current_block: None,
        }
    }

    /// Finish building and return the module
    pub fn finish(mut self) -> Module {
        self.finish_function();
        self.module
    }

    /// Peek at the module built so far
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Create a fresh virtual register
    pub fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    /// Create a fresh block ID
    pub fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    // ============ Function Building ============

    /// Start building a new function and position the builder in its
    /// entry block. Returns the parameter registers.
    pub fn start_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<(String, IrType)>,
        ret_type: IrType,
    ) -> Vec<VReg> {
        self.finish_function();

        let name = name.into();
        // A definition supersedes an earlier forward declaration
        self.module
            .functions
            .retain(|f| !(f.is_external && f.name == name));

        let params: Vec<Param> = params
            .into_iter()
            .map(|(name, ty)| Param {
                name,
                reg: self.fresh_vreg(),
                ty,
            })
            .collect();
        let regs: Vec<VReg> = params.iter().map(|p| p.reg).collect();

        self.current_fn = Some(Function::new(name, params, ret_type));

        let entry = self.fresh_block();
        self.current_block = Some(BasicBlock::new(entry));

        regs
    }

    /// Finish the current function
    pub fn finish_function(&mut self) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        if let Some(func) = self.current_fn.take() {
            self.module.functions.push(func);
        }
    }

    /// Whether a function with a body already exists under this name
    pub fn function_defined(&self, name: &str) -> bool {
        if let Some(ref func) = self.current_fn {
            if func.name == name {
                return true;
            }
        }
        self.module
            .functions
            .iter()
            .any(|f| f.name == name && !f.blocks.is_empty())
    }

    /// Declare an external function
    pub fn declare_external(
        &mut self,
        name: impl Into<String>,
        params: Vec<IrType>,
        ret_type: IrType,
        vararg: bool,
    ) {
        let params = params
            .into_iter()
            .map(|ty| Param {
                name: String::new(),
                reg: VReg(0),
                ty,
            })
            .collect();
        let mut func = Function::new(name, params, ret_type);
        func.is_external = true;
        func.is_vararg = vararg;
        self.module.functions.push(func);
    }

    // ============ Globals ============

    /// Add a global variable to the module
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        ty: IrType,
        init: Option<Constant>,
        is_const: bool,
    ) {
        self.module.globals.push(Global {
            name: name.into(),
            ty,
            init,
            is_const,
        });
    }

    /// Add a byte-string constant global and return its name
    pub fn add_string_constant(&mut self, bytes: &[u8]) -> String {
        let name = format!(".str.{}", self.next_string);
        self.next_string += 1;

        self.module.globals.push(Global {
            name: name.clone(),
            ty: IrType::array(IrType::I8, bytes.len()),
            init: Some(Constant::Bytes(bytes.to_vec())),
            is_const: true,
        });

        name
    }

    /// Register a struct type definition
    pub fn add_struct(&mut self, name: impl Into<String>, fields: Vec<(String, IrType)>) {
        self.module.structs.push(StructDef {
            name: name.into(),
            fields,
        });
    }

    /// Get a pointer to a global variable
    pub fn global_ref(&mut self, name: &str) -> VReg {
        self.emit_with_result(InstrKind::GlobalRef(name.to_string()))
    }

    /// Get a function pointer
    pub fn func_ref(&mut self, name: &str) -> VReg {
        self.emit_with_result(InstrKind::FuncRef(name.to_string()))
    }

    // ============ Block Building ============

    /// Create a new block and return its ID
    pub fn create_block(&mut self) -> BlockId {
        self.fresh_block()
    }

    /// Start building a block (finishes the current block first)
    pub fn start_block(&mut self, id: BlockId) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        self.current_block = Some(BasicBlock::new(id));
    }

    /// Get the current block ID
    pub fn current_block_id(&self) -> Option<BlockId> {
        self.current_block.as_ref().map(|b| b.id)
    }

    // ============ Instruction Emission ============

    fn emit(&mut self, result: Option<VReg>, kind: InstrKind) -> Option<VReg> {
        if let Some(ref mut block) = self.current_block {
            block.instructions.push(Instruction::new(result, kind));
        }
        result
    }

    fn emit_with_result(&mut self, kind: InstrKind) -> VReg {
        let result = self.fresh_vreg();
        self.emit(Some(result), kind);
        result
    }

    // ============ Constants ============

    /// Emit a typed integer constant
    pub fn const_int(&mut self, ty: IrType, value: i64) -> VReg {
        self.emit_with_result(InstrKind::Const(ty, Constant::Int(value)))
    }

    /// Emit a typed float constant
    pub fn const_float(&mut self, ty: IrType, value: f64) -> VReg {
        self.emit_with_result(InstrKind::Const(ty, Constant::Float(value)))
    }

    /// Emit a boolean constant
    pub fn const_bool(&mut self, value: bool) -> VReg {
        self.emit_with_result(InstrKind::Const(IrType::Bool, Constant::Bool(value)))
    }

    /// Emit a typed null constant
    pub fn const_null(&mut self, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Const(ty, Constant::Null))
    }

    /// Emit an inline byte-aggregate constant
    pub fn const_bytes(&mut self, ty: IrType, bytes: Vec<u8>) -> VReg {
        self.emit_with_result(InstrKind::Const(ty, Constant::Bytes(bytes)))
    }

    /// Emit a zero constant of the given numeric type
    pub fn const_zero(&mut self, ty: IrType) -> VReg {
        if ty.is_float() {
            self.const_float(ty, 0.0)
        } else {
            self.const_int(ty, 0)
        }
    }

    // ============ Arithmetic ============

    pub fn add(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Add(a, b))
    }

    pub fn sub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Sub(a, b))
    }

    pub fn mul(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Mul(a, b))
    }

    pub fn sdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::SDiv(a, b))
    }

    pub fn udiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::UDiv(a, b))
    }

    pub fn srem(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::SRem(a, b))
    }

    pub fn urem(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::URem(a, b))
    }

    pub fn fadd(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FAdd(a, b))
    }

    pub fn fsub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FSub(a, b))
    }

    pub fn fmul(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FMul(a, b))
    }

    pub fn fdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FDiv(a, b))
    }

    pub fn frem(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FRem(a, b))
    }

    // ============ Bitwise ============

    pub fn and(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::And(a, b))
    }

    pub fn or(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Or(a, b))
    }

    // ============ Comparison ============

    pub fn icmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::ICmp(op, a, b))
    }

    pub fn fcmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FCmp(op, a, b))
    }

    // ============ Conversions ============

    pub fn sext(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::SExt(v, ty))
    }

    pub fn zext(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::ZExt(v, ty))
    }

    pub fn trunc(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Trunc(v, ty))
    }

    pub fn bitcast(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Bitcast(v, ty))
    }

    pub fn inttoptr(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::IntToPtr(v, ty))
    }

    pub fn ptrtoint(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::PtrToInt(v, ty))
    }

    pub fn sitofp(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::SIToFP(v, ty))
    }

    pub fn uitofp(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::UIToFP(v, ty))
    }

    pub fn fptosi(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::FPToSI(v, ty))
    }

    pub fn fptoui(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::FPToUI(v, ty))
    }

    pub fn fpcast(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::FPCast(v, ty))
    }

    // ============ Memory ============

    pub fn alloca(&mut self, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::Alloca(ty))
    }

    pub fn load(&mut self, ptr: VReg) -> VReg {
        self.emit_with_result(InstrKind::Load(ptr))
    }

    pub fn store(&mut self, ptr: VReg, value: VReg) {
        self.emit(None, InstrKind::Store(ptr, value));
    }

    pub fn get_field_ptr(&mut self, ptr: VReg, field_idx: u32) -> VReg {
        self.emit_with_result(InstrKind::GetFieldPtr(ptr, field_idx))
    }

    pub fn get_element_ptr(&mut self, ptr: VReg, index: VReg) -> VReg {
        self.emit_with_result(InstrKind::GetElementPtr(ptr, index))
    }

    pub fn extract_value(&mut self, agg: VReg, idx: u32) -> VReg {
        self.emit_with_result(InstrKind::ExtractValue(agg, idx))
    }

    pub fn insert_value(&mut self, agg: VReg, value: VReg, idx: u32) -> VReg {
        self.emit_with_result(InstrKind::InsertValue(agg, value, idx))
    }

    // ============ Calls ============

    pub fn call(&mut self, func: impl Into<String>, args: Vec<VReg>) -> VReg {
        self.emit_with_result(InstrKind::Call {
            func: func.into(),
            args,
        })
    }

    pub fn call_ptr(&mut self, ptr: VReg, args: Vec<VReg>) -> VReg {
        self.emit_with_result(InstrKind::CallPtr { ptr, args })
    }

    // ============ Control Flow ============

    pub fn phi(&mut self, preds: Vec<(VReg, BlockId)>) -> VReg {
        self.emit_with_result(InstrKind::Phi(preds))
    }

    // ============ Terminators ============

    pub fn ret(&mut self, value: Option<VReg>) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::Ret(value));
        }
    }

    pub fn br(&mut self, target: BlockId) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::Br(target));
        }
    }

    pub fn cond_br(&mut self, cond: VReg, then_block: BlockId, else_block: BlockId) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_shape() {
        let mut b = IrBuilder::new("test");
        let regs = b.start_function(
            "add",
            vec![("a".to_owned(), IrType::I32), ("b".to_owned(), IrType::I32)],
            IrType::I32,
        );
        let sum = b.add(regs[0], regs[1]);
        b.ret(Some(sum));

        let module = b.finish();
        let func = module.function("add").expect("missing function");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].name, "a");
        assert_eq!(func.blocks.len(), 1);
        assert!(matches!(
            func.blocks[0].terminator,
            Some(Terminator::Ret(Some(_)))
        ));
    }

    #[test]
    fn test_function_defined() {
        let mut b = IrBuilder::new("test");
        b.declare_external("puts", vec![IrType::ptr(IrType::I8)], IrType::I32, false);
        assert!(!b.function_defined("puts"));

        b.start_function("main", vec![], IrType::I32);
        assert!(b.function_defined("main"));
        let zero = b.const_int(IrType::I32, 0);
        b.ret(Some(zero));
        b.finish_function();
        assert!(b.function_defined("main"));
    }

    #[test]
    fn test_string_constants_get_unique_names() {
        let mut b = IrBuilder::new("test");
        let a = b.add_string_constant(b"hi\0");
        let c = b.add_string_constant(b"there\0");
        assert_ne!(a, c);
        assert_eq!(b.module().globals.len(), 2);
        assert_eq!(b.module().globals[0].ty, IrType::array(IrType::I8, 3));
    }
}
