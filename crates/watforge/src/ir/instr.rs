//! Instruction nodes.
//!
//! An [`Instr`] is a tree: operands are nested instructions rather than
//! implicit stack slots. Rendering walks the tree in post-order, which yields
//! the stack-machine order the text format expects.
//!
//! Result types are never stored; they are computed from the operands, which
//! the constructors have already checked against the catalog.

use super::control::{Block, Branch, IfElse, Loop};
use super::ops::{BinaryOp, Conversion, UnaryOp};
use super::pointer::{I32Cell, Ptr};
use super::seq::InstrSeq;
use super::types::*;
use crate::error::{CompileError, CompileResult};
use std::fmt;

/// Whether a variable lives in the function frame or in the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Global,
}

/// A named, typed reference to a local or a global.
///
/// This is a value, not storage: reads and writes are instructions that carry
/// the name and are resolved against the function's locals or the module's
/// globals when the module is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    name: String,
    ty: WasmType,
    scope: Scope,
}

impl VarRef {
    pub fn local(name: impl Into<String>, ty: WasmType) -> Self {
        Self {
            name: name.into(),
            ty,
            scope: Scope::Local,
        }
    }

    pub fn global(name: impl Into<String>, ty: WasmType) -> Self {
        Self {
            name: name.into(),
            ty,
            scope: Scope::Global,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> WasmType {
        self.ty
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Read the variable.
    pub fn get(&self) -> Instr {
        Instr::Get(self.clone())
    }

    /// Write `value` into the variable.
    pub fn set(&self, value: Instr) -> CompileResult<Instr> {
        let found = value.value_type("set")?;
        check_assignable(&format!("write to `{}`", self.name), self.ty, found)?;
        Ok(Instr::Set {
            var: self.clone(),
            value: Box::new(value),
        })
    }

    /// Write `value` and keep it on the stack. Locals only.
    pub fn tee(&self, value: Instr) -> CompileResult<Instr> {
        if self.scope == Scope::Global {
            return Err(CompileError::UnsupportedOperation {
                op: "global.tee",
                ty: self.ty,
            });
        }
        let found = value.value_type("tee")?;
        check_assignable(&format!("tee of `{}`", self.name), self.ty, found)?;
        Ok(Instr::Tee {
            var: self.clone(),
            value: Box::new(value),
        })
    }

    /// Load the i32 element at `index`, treating this variable as a pointer.
    ///
    /// The address is `base + index * 4`. Use [`VarRef::as_ptr`] for other
    /// element types.
    pub fn at(&self, index: impl Into<Instr>) -> CompileResult<Instr> {
        self.as_ptr::<I32Cell>()?.at(index)
    }

    /// View this variable as a pointer to elements of type `E`.
    pub fn as_ptr<E: super::pointer::Element>(&self) -> CompileResult<Ptr<E>> {
        Ptr::new(self.clone())
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name)
    }
}

/// Width of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryAccessWidth {
    /// Full type width (i32=4 bytes, i64=8 bytes, f32=4, f64=8)
    Full,
    I8,
    I16,
    /// Only valid for i64
    I32,
}

impl MemoryAccessWidth {
    pub fn bits(&self) -> Option<u32> {
        match self {
            MemoryAccessWidth::Full => None,
            MemoryAccessWidth::I8 => Some(8),
            MemoryAccessWidth::I16 => Some(16),
            MemoryAccessWidth::I32 => Some(32),
        }
    }
}

/// Sign extension for sub-width loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignExtension {
    Signed,
    Unsigned,
}

/// Static part of a load or store: value type, access width, constant offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemArg {
    pub ty: WasmType,
    pub width: MemoryAccessWidth,
    pub sign: Option<SignExtension>,
    pub offset: u32,
}

impl MemArg {
    pub fn full(ty: WasmType) -> Self {
        Self {
            ty,
            width: MemoryAccessWidth::Full,
            sign: None,
            offset: 0,
        }
    }

    pub fn narrow(ty: WasmType, width: MemoryAccessWidth, sign: SignExtension) -> Self {
        Self {
            ty,
            width,
            sign: Some(sign),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    fn validate(&self) -> CompileResult<()> {
        let ok = match self.width {
            MemoryAccessWidth::Full => true,
            MemoryAccessWidth::I8 | MemoryAccessWidth::I16 => self.ty.is_integer(),
            MemoryAccessWidth::I32 => self.ty == WasmType::I64,
        };
        if ok {
            Ok(())
        } else {
            Err(CompileError::UnsupportedOperation {
                op: "sub-width memory access",
                ty: self.ty,
            })
        }
    }
}

/// A single IR node.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Typed or generic literal.
    Const(Literal),

    /// `lhs op rhs`; the operand type is the unification of both sides.
    Binary {
        op: BinaryOp,
        lhs: Box<Instr>,
        rhs: Box<Instr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Instr>,
    },

    Convert {
        op: Conversion,
        operand: Box<Instr>,
    },

    /// `memory[address + arg.offset]`
    Load { arg: MemArg, address: Box<Instr> },

    /// `memory[address + arg.offset] = value`
    Store {
        arg: MemArg,
        address: Box<Instr>,
        value: Box<Instr>,
    },

    Get(VarRef),

    Set { var: VarRef, value: Box<Instr> },

    Tee { var: VarRef, value: Box<Instr> },

    /// Call by name with positional arguments.
    Call {
        name: String,
        args: Vec<Instr>,
        result: Option<WasmType>,
    },

    /// Verbatim text pushed into the output, with a declared stack effect.
    Raw { text: String, result: ResultType },

    /// Byte-string literal; becomes a [`Instr::ConstRef`] during expansion.
    Str(Vec<u8>),

    /// Address of an interned constant.
    ConstRef { offset: u32, len: u32 },

    Block(Block),
    Loop(Loop),
    If(IfElse),
    Branch(Branch),

    Return(Option<Box<Instr>>),
    Drop(Box<Instr>),
    Nop,
    Unreachable,

    /// Nested group of instructions.
    Seq(InstrSeq),
}

impl From<Literal> for Instr {
    fn from(lit: Literal) -> Self {
        Instr::Const(lit)
    }
}

impl From<IrValue> for Instr {
    fn from(value: IrValue) -> Self {
        Instr::Const(Literal::Typed(value))
    }
}

/// Bare integers become generic literals.
impl From<i32> for Instr {
    fn from(value: i32) -> Self {
        Instr::int(i64::from(value))
    }
}

impl From<i64> for Instr {
    fn from(value: i64) -> Self {
        Instr::int(value)
    }
}

impl From<&VarRef> for Instr {
    fn from(var: &VarRef) -> Self {
        var.get()
    }
}

impl From<InstrSeq> for Instr {
    fn from(seq: InstrSeq) -> Self {
        Instr::Seq(seq)
    }
}

impl Instr {
    // ─── Literals ──────────────────────────────────────────────────────────

    /// Generic integer literal.
    pub fn int(value: i64) -> Self {
        Instr::Const(Literal::Int(value))
    }

    pub fn i32(value: i32) -> Self {
        IrValue::I32(value).into()
    }

    pub fn i64(value: i64) -> Self {
        IrValue::I64(value).into()
    }

    pub fn f32(value: f32) -> Self {
        IrValue::F32(value).into()
    }

    pub fn f64(value: f64) -> Self {
        IrValue::F64(value).into()
    }

    pub fn str(bytes: impl Into<Vec<u8>>) -> Self {
        Instr::Str(bytes.into())
    }

    pub fn raw(text: impl Into<String>, result: ResultType) -> Self {
        Instr::Raw {
            text: text.into(),
            result,
        }
    }

    // ─── Operations ────────────────────────────────────────────────────────

    /// Build `lhs op rhs`, inferring the operand type through the catalog.
    pub fn binary(op: BinaryOp, lhs: Instr, rhs: Instr) -> CompileResult<Instr> {
        let context = op.mnemonic();
        let ty = unify(
            context,
            lhs.value_type(context)?,
            rhs.value_type(context)?,
        )?;
        if let OperandType::Typed(t) = ty {
            if !op.is_defined_for(t) {
                return Err(CompileError::UnsupportedOperation { op: context, ty: t });
            }
        }
        Ok(Instr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn add(lhs: impl Into<Instr>, rhs: impl Into<Instr>) -> CompileResult<Instr> {
        Instr::binary(BinaryOp::Add, lhs.into(), rhs.into())
    }

    pub fn sub(lhs: impl Into<Instr>, rhs: impl Into<Instr>) -> CompileResult<Instr> {
        Instr::binary(BinaryOp::Sub, lhs.into(), rhs.into())
    }

    pub fn mul(lhs: impl Into<Instr>, rhs: impl Into<Instr>) -> CompileResult<Instr> {
        Instr::binary(BinaryOp::Mul, lhs.into(), rhs.into())
    }

    pub fn unary(op: UnaryOp, operand: Instr) -> CompileResult<Instr> {
        let context = op.mnemonic();
        if let OperandType::Typed(t) = operand.value_type(context)? {
            if !op.is_defined_for(t) {
                return Err(CompileError::UnsupportedOperation { op: context, ty: t });
            }
        }
        Ok(Instr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn convert(op: Conversion, operand: Instr) -> CompileResult<Instr> {
        let found = operand.value_type(op.name())?;
        check_assignable(op.name(), op.source(), found)?;
        Ok(Instr::Convert {
            op,
            operand: Box::new(operand),
        })
    }

    // ─── Memory ────────────────────────────────────────────────────────────

    /// Full-width load of `ty` from `address`.
    pub fn load(ty: WasmType, address: impl Into<Instr>) -> CompileResult<Instr> {
        Instr::load_with(MemArg::full(ty), address.into())
    }

    pub fn load_with(arg: MemArg, address: Instr) -> CompileResult<Instr> {
        arg.validate()?;
        let found = address.value_type("load address")?;
        check_assignable("load address", WasmType::I32, found)?;
        Ok(Instr::Load {
            arg,
            address: Box::new(address),
        })
    }

    /// Full-width store of `ty` at `address`.
    pub fn store(
        ty: WasmType,
        address: impl Into<Instr>,
        value: impl Into<Instr>,
    ) -> CompileResult<Instr> {
        Instr::store_with(MemArg::full(ty), address.into(), value.into())
    }

    pub fn store_with(arg: MemArg, address: Instr, value: Instr) -> CompileResult<Instr> {
        arg.validate()?;
        let found = address.value_type("store address")?;
        check_assignable("store address", WasmType::I32, found)?;
        let found = value.value_type("store value")?;
        check_assignable("store value", arg.ty, found)?;
        Ok(Instr::Store {
            arg,
            address: Box::new(address),
            value: Box::new(value),
        })
    }

    // ─── Calls and statements ──────────────────────────────────────────────

    pub fn call(
        name: impl Into<String>,
        args: Vec<Instr>,
        result: Option<WasmType>,
    ) -> CompileResult<Instr> {
        let name = name.into();
        for arg in &args {
            arg.value_type(&format!("argument to `{name}`"))?;
        }
        Ok(Instr::Call { name, args, result })
    }

    pub fn drop(value: Instr) -> CompileResult<Instr> {
        value.value_type("drop")?;
        Ok(Instr::Drop(Box::new(value)))
    }

    pub fn ret(value: Option<Instr>) -> CompileResult<Instr> {
        if let Some(v) = &value {
            v.value_type("return")?;
        }
        Ok(Instr::Return(value.map(Box::new)))
    }

    // ─── Types ─────────────────────────────────────────────────────────────

    /// What this instruction leaves on the stack.
    pub fn result_type(&self) -> ResultType {
        match self {
            Instr::Const(lit) => ResultType::Value(lit.operand_type()),
            Instr::Binary { op, lhs, rhs } => {
                ResultType::Value(op.result_type(merge_operands(lhs, rhs)))
            }
            Instr::Unary { op, operand } => {
                ResultType::Value(op.result_type(operand_of(operand)))
            }
            Instr::Convert { op, .. } => ResultType::typed(op.target()),
            Instr::Load { arg, .. } => ResultType::typed(arg.ty),
            Instr::Get(var) | Instr::Tee { var, .. } => ResultType::typed(var.ty),
            Instr::Call { result, .. } => ResultType::from_option(*result),
            Instr::Raw { result, .. } => *result,
            Instr::Str(_) | Instr::ConstRef { .. } => ResultType::typed(WasmType::I32),
            Instr::Block(b) => ResultType::from_option(b.result()),
            Instr::Loop(l) => ResultType::from_option(l.result()),
            Instr::If(i) => ResultType::from_option(i.result()),
            Instr::Seq(seq) => seq.result_type(),
            Instr::Store { .. }
            | Instr::Set { .. }
            | Instr::Branch(_)
            | Instr::Return(_)
            | Instr::Drop(_)
            | Instr::Nop
            | Instr::Unreachable => ResultType::Empty,
        }
    }

    /// The single value this instruction produces, or `NotAValue`.
    pub fn value_type(&self, context: &str) -> CompileResult<OperandType> {
        match self.result_type() {
            ResultType::Value(ty) => Ok(ty),
            found => Err(CompileError::NotAValue {
                context: context.to_string(),
                found,
            }),
        }
    }

    /// Operand type a binary or unary node operates on.
    pub fn operand_type(&self) -> Option<OperandType> {
        match self {
            Instr::Binary { lhs, rhs, .. } => Some(merge_operands(lhs, rhs)),
            Instr::Unary { operand, .. } => Some(operand_of(operand)),
            _ => None,
        }
    }

    // ─── Traversal ─────────────────────────────────────────────────────────

    /// Visit direct children, including instructions of nested bodies.
    pub fn for_each_child(&self, f: &mut dyn FnMut(&Instr)) {
        match self {
            Instr::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Instr::Unary { operand, .. }
            | Instr::Convert { operand, .. }
            | Instr::Drop(operand) => f(operand),
            Instr::Load { address, .. } => f(address),
            Instr::Store { address, value, .. } => {
                f(address);
                f(value);
            }
            Instr::Set { value, .. } | Instr::Tee { value, .. } => f(value),
            Instr::Call { args, .. } => args.iter().for_each(|a| f(a)),
            Instr::Block(b) => b.body().iter().for_each(|i| f(i)),
            Instr::Loop(l) => l.body().iter().for_each(|i| f(i)),
            Instr::If(i) => {
                f(i.condition());
                i.then_body().iter().for_each(|x| f(x));
                if let Some(e) = i.else_body() {
                    e.iter().for_each(|x| f(x));
                }
            }
            Instr::Branch(br) => {
                if let Some(c) = br.condition() {
                    f(c);
                }
            }
            Instr::Return(Some(v)) => f(v),
            Instr::Seq(seq) => seq.iter().for_each(|i| f(i)),
            Instr::Const(_)
            | Instr::Get(_)
            | Instr::Raw { .. }
            | Instr::Str(_)
            | Instr::ConstRef { .. }
            | Instr::Return(None)
            | Instr::Nop
            | Instr::Unreachable => {}
        }
    }

    /// Visit this node and every descendant, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&Instr)) {
        f(self);
        self.for_each_child(&mut |child| child.walk(&mut *f));
    }

    /// Rebuild this node with every direct child passed through `f`.
    ///
    /// The node shape is kept as is; callers that change operand types must
    /// go back through the checked constructors.
    pub fn map_children(self, f: &mut dyn FnMut(Instr) -> Instr) -> Instr {
        match self {
            Instr::Binary { op, lhs, rhs } => Instr::Binary {
                op,
                lhs: map_box(lhs, f),
                rhs: map_box(rhs, f),
            },
            Instr::Unary { op, operand } => Instr::Unary {
                op,
                operand: map_box(operand, f),
            },
            Instr::Convert { op, operand } => Instr::Convert {
                op,
                operand: map_box(operand, f),
            },
            Instr::Load { arg, address } => Instr::Load {
                arg,
                address: map_box(address, f),
            },
            Instr::Store {
                arg,
                address,
                value,
            } => Instr::Store {
                arg,
                address: map_box(address, f),
                value: map_box(value, f),
            },
            Instr::Set { var, value } => Instr::Set {
                var,
                value: map_box(value, f),
            },
            Instr::Tee { var, value } => Instr::Tee {
                var,
                value: map_box(value, f),
            },
            Instr::Drop(v) => Instr::Drop(map_box(v, f)),
            Instr::Return(v) => Instr::Return(v.map(|v| map_box(v, f))),
            Instr::Call { name, args, result } => Instr::Call {
                name,
                args: args.into_iter().map(|a| f(a)).collect(),
                result,
            },
            Instr::Block(b) => Instr::Block(b.map_body(|body| body.map(f))),
            Instr::Loop(l) => Instr::Loop(l.map_body(|body| body.map(f))),
            Instr::If(i) => Instr::If(i.map_parts(f)),
            Instr::Branch(br) => Instr::Branch(br.map_condition(f)),
            Instr::Seq(seq) => Instr::Seq(seq.map(f)),
            leaf @ (Instr::Const(_)
            | Instr::Get(_)
            | Instr::Raw { .. }
            | Instr::Str(_)
            | Instr::ConstRef { .. }
            | Instr::Nop
            | Instr::Unreachable) => leaf,
        }
    }
}

fn map_box(instr: Box<Instr>, f: &mut dyn FnMut(Instr) -> Instr) -> Box<Instr> {
    Box::new(f(*instr))
}

fn operand_of(instr: &Instr) -> OperandType {
    instr.result_type().operand().unwrap_or(OperandType::IntLiteral)
}

/// Operand type of an already-checked binary node.
fn merge_operands(lhs: &Instr, rhs: &Instr) -> OperandType {
    match operand_of(lhs) {
        OperandType::IntLiteral => operand_of(rhs),
        typed => typed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WasmType; 4] = [WasmType::I32, WasmType::I64, WasmType::F32, WasmType::F64];

    fn typed_value(ty: WasmType) -> Instr {
        Instr::Const(Literal::Typed(ty.zero()))
    }

    #[test]
    fn test_binary_same_type_succeeds() {
        for ty in ALL {
            let instr = Instr::binary(BinaryOp::Add, typed_value(ty), typed_value(ty)).unwrap();
            assert_eq!(instr.result_type(), ResultType::typed(ty));
        }
    }

    #[test]
    fn test_binary_mismatch_fails_for_every_pair() {
        for a in ALL {
            for b in ALL {
                if a == b {
                    continue;
                }
                let err = Instr::binary(BinaryOp::Add, typed_value(a), typed_value(b)).unwrap_err();
                assert!(
                    matches!(err, CompileError::TypeMismatch { .. }),
                    "{a} + {b} gave {err:?}"
                );
            }
        }
    }

    #[test]
    fn test_binary_generic_takes_concrete_type() {
        let x = VarRef::local("x", WasmType::F64);
        let instr = Instr::add(&x, 1).unwrap();
        assert_eq!(instr.result_type(), ResultType::typed(WasmType::F64));

        let instr = Instr::add(1, &x).unwrap();
        assert_eq!(instr.result_type(), ResultType::typed(WasmType::F64));

        let instr = Instr::add(1, 2).unwrap();
        assert_eq!(instr.result_type(), ResultType::Value(OperandType::IntLiteral));
    }

    #[test]
    fn test_binary_rejects_op_missing_from_catalog() {
        let err = Instr::binary(BinaryOp::DivS, Instr::f32(1.0), Instr::f32(2.0)).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedOperation {
                op: "div_s",
                ty: WasmType::F32
            }
        );
    }

    #[test]
    fn test_comparison_yields_i32() {
        let instr = Instr::binary(BinaryOp::Lt, Instr::f64(1.0), Instr::f64(2.0)).unwrap();
        assert_eq!(instr.result_type(), ResultType::typed(WasmType::I32));
        assert_eq!(instr.operand_type(), Some(OperandType::Typed(WasmType::F64)));
    }

    #[test]
    fn test_statement_is_not_an_operand() {
        let g = VarRef::global("counter", WasmType::I32);
        let store = g.set(Instr::i32(1)).unwrap();
        let err = Instr::add(store, 1).unwrap_err();
        assert!(matches!(err, CompileError::NotAValue { .. }));
    }

    #[test]
    fn test_set_checks_type() {
        let g = VarRef::global("total", WasmType::I64);
        assert!(g.set(Instr::int(3)).is_ok());
        assert!(g.set(Instr::i64(3)).is_ok());
        assert!(matches!(
            g.set(Instr::i32(3)),
            Err(CompileError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_load_requires_i32_address() {
        assert!(Instr::load(WasmType::I64, Instr::int(16)).is_ok());
        assert!(matches!(
            Instr::load(WasmType::I32, Instr::i64(16)),
            Err(CompileError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_sub_width_access_validation() {
        let ok = MemArg::narrow(WasmType::I64, MemoryAccessWidth::I32, SignExtension::Unsigned);
        assert!(Instr::load_with(ok, Instr::int(0)).is_ok());

        let bad = MemArg::narrow(WasmType::F32, MemoryAccessWidth::I8, SignExtension::Unsigned);
        assert!(matches!(
            Instr::load_with(bad, Instr::int(0)),
            Err(CompileError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_convert_checks_source() {
        let instr = Instr::convert(Conversion::I64ExtendI32U, Instr::i32(7)).unwrap();
        assert_eq!(instr.result_type(), ResultType::typed(WasmType::I64));
        assert!(Instr::convert(Conversion::I64ExtendI32U, Instr::i64(7)).is_err());
    }

    #[test]
    fn test_str_is_an_i32_address() {
        assert_eq!(Instr::str("hi").result_type(), ResultType::typed(WasmType::I32));
    }

    #[test]
    fn test_walk_visits_all_nodes() {
        let x = VarRef::local("x", WasmType::I32);
        let instr = x.set(Instr::add(&x, Instr::mul(2, 3).unwrap()).unwrap()).unwrap();
        let mut count = 0;
        instr.walk(&mut |_| count += 1);
        // set, add, get, mul, 2, 3
        assert_eq!(count, 6);
    }

    #[test]
    fn test_map_children_rewrites_leaves() {
        let instr = Instr::add(1, 2).unwrap();
        let mapped = instr.map_children(&mut |child| match child {
            Instr::Const(Literal::Int(v)) => Instr::int(v * 10),
            other => other,
        });
        assert_eq!(mapped, Instr::add(10, 20).unwrap());
    }
}
