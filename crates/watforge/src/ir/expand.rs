//! Expansion: the rewrite pass that runs inside a session before emission.
//!
//! A pure bottom-up transform. It interns every byte string into the
//! session's constant pool, narrows generic literals wherever the context
//! names a concrete type, and checks variable and label references against
//! their declarations. A generic literal with no context left after the pass
//! is an error.

use super::control::{Block, Branch, IfElse, Loop};
use super::instr::{Instr, Scope, VarRef};
use super::module::{FuncDef, GlobalDef, Signature};
use super::ops::UnaryOp;
use super::seq::InstrSeq;
use super::types::*;
use crate::compiler::session;
use crate::error::{CompileError, CompileResult};
use log::trace;
use std::collections::HashMap;

/// What expansion needs to know about the code being expanded.
pub struct ExpandContext<'a> {
    /// Function or global being expanded, for error messages
    owner: String,

    /// Parameters and locals by name
    locals: HashMap<String, WasmType>,

    /// Known callees: module functions and import ids
    signatures: &'a HashMap<String, Signature>,

    /// What `return` must produce
    result: Option<WasmType>,

    /// Labels of the enclosing blocks and loops, innermost last
    labels: Vec<String>,
}

impl<'a> ExpandContext<'a> {
    pub fn for_function(func: &FuncDef, signatures: &'a HashMap<String, Signature>) -> Self {
        Self {
            owner: func.name().to_string(),
            locals: func
                .params()
                .iter()
                .chain(func.locals())
                .map(|v| (v.name().to_string(), v.ty()))
                .collect(),
            signatures,
            result: func.result_type(),
            labels: Vec::new(),
        }
    }

    pub fn for_global(global: &GlobalDef, signatures: &'a HashMap<String, Signature>) -> Self {
        Self {
            owner: format!("global `{}`", global.name),
            locals: HashMap::new(),
            signatures,
            result: Some(global.ty),
            labels: Vec::new(),
        }
    }

    fn check_var(&self, var: &VarRef) -> CompileResult<()> {
        let declared = match var.scope() {
            Scope::Local => {
                self.locals
                    .get(var.name())
                    .copied()
                    .ok_or_else(|| CompileError::UndeclaredLocal {
                        name: var.name().to_string(),
                        func: self.owner.clone(),
                    })?
            }
            Scope::Global => session::global_type(var.name())?,
        };
        if declared != var.ty() {
            return Err(CompileError::TypeMismatch {
                context: format!("reference to `{}`", var.name()),
                lhs: OperandType::Typed(declared),
                rhs: OperandType::Typed(var.ty()),
            });
        }
        Ok(())
    }

    fn in_label<T>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        self.labels.push(label.to_string());
        let out = f(self);
        self.labels.pop();
        out
    }
}

/// Expand a function body and check that no generic literal survives.
pub fn expand_function(
    func: FuncDef,
    signatures: &HashMap<String, Signature>,
) -> CompileResult<FuncDef> {
    trace!("expand: function {}", func.name());
    let mut cx = ExpandContext::for_function(&func, signatures);
    let body = func.body().clone().expand(func.result_type(), &mut cx)?;
    check_resolved(&body, func.name())?;
    Ok(func.with_expanded_body(body))
}

/// Expand a global initializer against the global's declared type.
pub fn expand_global(
    global: GlobalDef,
    signatures: &HashMap<String, Signature>,
) -> CompileResult<GlobalDef> {
    trace!("expand: global {}", global.name);
    let mut cx = ExpandContext::for_global(&global, signatures);
    let init = global.init.clone().expand(Some(global.ty), &mut cx)?;
    let found = init.result_type();
    if found.concrete() != Some(global.ty) {
        return Err(CompileError::ResultMismatch {
            context: format!("initializer of `{}`", global.name),
            expected: ResultType::typed(global.ty),
            found,
        });
    }
    check_resolved(&init, &global.name)?;
    Ok(GlobalDef { init, ..global })
}

/// Fail on the first generic literal left in `seq`.
pub fn check_resolved(seq: &InstrSeq, owner: &str) -> CompileResult<()> {
    let mut unresolved = None;
    for instr in seq {
        instr.walk(&mut |node| {
            if let (None, Instr::Const(Literal::Int(value))) = (&unresolved, node) {
                unresolved = Some(*value);
            }
        });
    }
    match unresolved {
        Some(value) => Err(CompileError::UnresolvedLiteral {
            value,
            context: owner.to_string(),
        }),
        None => Ok(()),
    }
}

impl InstrSeq {
    /// Expand every instruction. Only the last one sees `expected` (or the
    /// declared type, when there is one).
    pub fn expand(
        self,
        expected: Option<WasmType>,
        cx: &mut ExpandContext<'_>,
    ) -> CompileResult<InstrSeq> {
        let (body, declared) = self.into_parts();
        let target = match declared {
            Some(declared) => declared.concrete(),
            None => expected,
        };
        let last = body.len().saturating_sub(1);
        let body = body
            .into_iter()
            .enumerate()
            .map(|(i, instr)| instr.expand(if i == last { target } else { None }, cx))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(match declared {
            Some(declared) => InstrSeq::with_type(body, declared),
            None => InstrSeq::new(body),
        })
    }
}

impl Instr {
    /// Expand this node. `expected` is the concrete type the surrounding
    /// code wants, if any.
    pub fn expand(
        self,
        expected: Option<WasmType>,
        cx: &mut ExpandContext<'_>,
    ) -> CompileResult<Instr> {
        match self {
            Instr::Const(Literal::Int(value)) => match expected {
                Some(ty) => Ok(Instr::Const(Literal::Int(value).narrow(ty)?)),
                None => Ok(Instr::int(value)),
            },
            c @ Instr::Const(_) => Ok(c),

            Instr::Binary { op, lhs, rhs } => {
                let context = op.mnemonic();
                let merged = unify(context, lhs.value_type(context)?, rhs.value_type(context)?)?;
                let operand = merged
                    .concrete()
                    .or(if op.is_comparison() { None } else { expected });
                let lhs = (*lhs).expand(operand, cx)?;
                let rhs = (*rhs).expand(operand, cx)?;
                Instr::binary(op, lhs, rhs)
            }

            Instr::Unary { op, operand } => {
                let found = operand.value_type(op.mnemonic())?;
                let target = found
                    .concrete()
                    .or(if op == UnaryOp::Eqz { None } else { expected });
                Instr::unary(op, (*operand).expand(target, cx)?)
            }

            Instr::Convert { op, operand } => {
                let operand = expand_value(*operand, op.source(), op.name(), cx)?;
                Instr::convert(op, operand)
            }

            Instr::Load { arg, address } => {
                let address = expand_value(*address, WasmType::I32, "load address", cx)?;
                Instr::load_with(arg, address)
            }

            Instr::Store {
                arg,
                address,
                value,
            } => {
                let address = expand_value(*address, WasmType::I32, "store address", cx)?;
                let value = expand_value(*value, arg.ty, "store value", cx)?;
                Instr::store_with(arg, address, value)
            }

            Instr::Get(var) => {
                cx.check_var(&var)?;
                Ok(Instr::Get(var))
            }

            Instr::Set { var, value } => {
                cx.check_var(&var)?;
                let value = expand_value(*value, var.ty(), "set", cx)?;
                var.set(value)
            }

            Instr::Tee { var, value } => {
                cx.check_var(&var)?;
                let value = expand_value(*value, var.ty(), "tee", cx)?;
                var.tee(value)
            }

            Instr::Call { name, args, result } => {
                let signature = cx.signatures.get(&name).cloned();
                let args = match signature {
                    Some(sig) => {
                        if sig.params.len() != args.len() {
                            return Err(CompileError::ArityMismatch {
                                callee: name,
                                expected: sig.params.len(),
                                found: args.len(),
                            });
                        }
                        if sig.result != result {
                            return Err(CompileError::ResultMismatch {
                                context: format!("call to `{name}`"),
                                expected: ResultType::from_option(sig.result),
                                found: ResultType::from_option(result),
                            });
                        }
                        let context = format!("argument to `{name}`");
                        args.into_iter()
                            .zip(sig.params)
                            .map(|(arg, ty)| expand_value(arg, ty, &context, cx))
                            .collect::<CompileResult<Vec<_>>>()?
                    }
                    None => args
                        .into_iter()
                        .map(|arg| arg.expand(None, cx))
                        .collect::<CompileResult<Vec<_>>>()?,
                };
                Instr::call(name, args, result)
            }

            Instr::Str(bytes) => {
                let offset = session::intern(&bytes)?;
                let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
                Ok(Instr::ConstRef { offset, len })
            }

            Instr::Block(block) => {
                let (label, result, body) = block.into_parts();
                let body = cx.in_label(&label, |cx| body.expand(result, cx))?;
                Ok(Instr::Block(Block::new(label, result, body)))
            }

            Instr::Loop(lp) => {
                let (label, result, body) = lp.into_parts();
                let body = cx.in_label(&label, |cx| body.expand(result, cx))?;
                Ok(Instr::Loop(Loop::new(label, result, body)))
            }

            Instr::If(node) => {
                let (result, condition, then_body, else_body) = node.into_parts();
                let condition = expand_value(condition, WasmType::I32, "if condition", cx)?;
                let then_body = then_body.expand(result, cx)?;
                let else_body = else_body.map(|e| e.expand(result, cx)).transpose()?;
                Ok(Instr::If(IfElse::new(condition, result, then_body, else_body)?))
            }

            Instr::Branch(br) => {
                let (label, target, condition) = br.into_parts();
                if !cx.labels.contains(&label) {
                    return Err(CompileError::UnknownLabel { label });
                }
                let condition = condition
                    .map(|c| expand_value(c, WasmType::I32, "br_if condition", cx))
                    .transpose()?;
                Ok(Instr::Branch(Branch::new(label, target, condition)))
            }

            Instr::Return(value) => match (value, cx.result) {
                (Some(value), Some(ty)) => {
                    let value = expand_value(*value, ty, "return", cx)?;
                    Instr::ret(Some(value))
                }
                (None, None) => Ok(Instr::Return(None)),
                (value, declared) => Err(CompileError::ResultMismatch {
                    context: format!("return from `{}`", cx.owner),
                    expected: ResultType::from_option(declared),
                    found: value.map_or(ResultType::Empty, |v| v.result_type()),
                }),
            },

            Instr::Drop(value) => Instr::drop((*value).expand(None, cx)?),

            Instr::Seq(seq) => Ok(Instr::Seq(seq.expand(expected, cx)?)),

            leaf @ (Instr::Raw { .. }
            | Instr::ConstRef { .. }
            | Instr::Nop
            | Instr::Unreachable) => Ok(leaf),
        }
    }
}

/// Expand `instr` where a value of type `ty` is required.
fn expand_value(
    instr: Instr,
    ty: WasmType,
    context: &str,
    cx: &mut ExpandContext<'_>,
) -> CompileResult<Instr> {
    let instr = instr.expand(Some(ty), cx)?;
    let found = instr.value_type(context)?;
    check_assignable(context, ty, found)?;
    Ok(instr)
}
