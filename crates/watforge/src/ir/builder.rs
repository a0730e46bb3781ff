//! Function body builder.
//!
//! `BodyBuilder` is the only way to create control-flow nodes. It keeps a
//! stack of open constructs, so a branch can be checked against its enclosing
//! labels the moment it is written rather than when the module is rendered.

use super::control::{check_body_result, Block, Branch, IfElse, LabelKind, Loop};
use super::instr::{Instr, VarRef};
use super::seq::InstrSeq;
use super::types::{check_assignable, ResultType, WasmType};
use crate::error::{CompileError, CompileResult};
use log::trace;
use std::collections::HashMap;

/// Open construct on the builder's control stack.
#[derive(Debug)]
struct ControlFrame {
    kind: ControlKind,

    /// Branch target name (None for if/else arms)
    label: Option<String>,

    /// Instructions of the enclosing body, restored when this frame closes
    saved: Vec<Instr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlKind {
    Block, // branches exit
    Loop,  // branches re-enter
    If,
    Else,
}

/// Builds one function body.
pub struct BodyBuilder {
    /// Owning function, for error messages
    func: String,

    /// Parameters and locals by name
    vars: HashMap<String, VarRef>,

    /// Instructions of the innermost open body
    current: Vec<Instr>,

    /// Open blocks, loops, and if arms, innermost last
    control_stack: Vec<ControlFrame>,
}

impl BodyBuilder {
    pub fn new(func: impl Into<String>, vars: impl IntoIterator<Item = VarRef>) -> Self {
        Self {
            func: func.into(),
            vars: vars
                .into_iter()
                .map(|v| (v.name().to_string(), v))
                .collect(),
            current: Vec::new(),
            control_stack: Vec::new(),
        }
    }

    /// A parameter or local of this function.
    pub fn local(&self, name: &str) -> CompileResult<VarRef> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UndeclaredLocal {
                name: name.to_string(),
                func: self.func.clone(),
            })
    }

    /// Append an instruction to the innermost open body.
    pub fn push(&mut self, instr: impl Into<Instr>) -> &mut Self {
        self.current.push(instr.into());
        self
    }

    /// Labels currently in scope, innermost last.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.control_stack.iter().filter_map(|f| f.label.as_deref())
    }

    // ─── Control flow ──────────────────────────────────────────────────────

    /// `(block $label ...)`. `body` fills the block.
    pub fn block<F>(&mut self, label: &str, result: Option<WasmType>, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let body = self.nested(ControlKind::Block, Some(label), body)?;
        let body = typed_body(&format!("block ${label}"), result, body)?;
        self.current
            .push(Instr::Block(Block::new(label.to_string(), result, body)));
        Ok(())
    }

    /// `(loop $label ...)`. Branching to `label` inside `body` repeats it.
    pub fn loop_<F>(&mut self, label: &str, result: Option<WasmType>, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let body = self.nested(ControlKind::Loop, Some(label), body)?;
        let body = typed_body(&format!("loop ${label}"), result, body)?;
        self.current
            .push(Instr::Loop(Loop::new(label.to_string(), result, body)));
        Ok(())
    }

    /// `if` without an else arm or a result.
    pub fn if_then<F>(&mut self, condition: Instr, then: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let then_body = self.nested(ControlKind::If, None, then)?;
        let then_body = typed_body("if", None, then_body)?;
        let node = IfElse::new(condition, None, then_body, None)?;
        self.current.push(Instr::If(node));
        Ok(())
    }

    /// `if` with both arms.
    pub fn if_else<T, E>(
        &mut self,
        condition: Instr,
        result: Option<WasmType>,
        then: T,
        otherwise: E,
    ) -> CompileResult<()>
    where
        T: FnOnce(&mut Self) -> CompileResult<()>,
        E: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let then_body = self.nested(ControlKind::If, None, then)?;
        let then_body = typed_body("then arm", result, then_body)?;
        let else_body = self.nested(ControlKind::Else, None, otherwise)?;
        let else_body = typed_body("else arm", result, else_body)?;
        let node = IfElse::new(condition, result, then_body, Some(else_body))?;
        self.current.push(Instr::If(node));
        Ok(())
    }

    /// Unconditional branch to an enclosing block or loop.
    pub fn br(&mut self, label: &str) -> CompileResult<()> {
        let target = self.resolve(label)?;
        self.current
            .push(Instr::Branch(Branch::new(label.to_string(), target, None)));
        Ok(())
    }

    /// Branch taken when `condition` is non-zero.
    pub fn br_if(&mut self, label: &str, condition: Instr) -> CompileResult<()> {
        let target = self.resolve(label)?;
        let found = condition.value_type("br_if condition")?;
        check_assignable("br_if condition", WasmType::I32, found)?;
        self.current.push(Instr::Branch(Branch::new(
            label.to_string(),
            target,
            Some(condition),
        )));
        Ok(())
    }

    pub fn ret(&mut self, value: Option<Instr>) -> CompileResult<()> {
        let instr = Instr::ret(value)?;
        self.current.push(instr);
        Ok(())
    }

    /// Close the body. Fails if a construct is still open.
    pub fn finish(self) -> CompileResult<Vec<Instr>> {
        match self.control_stack.last() {
            None => Ok(self.current),
            Some(frame) => Err(CompileError::UnknownLabel {
                label: frame.label.clone().unwrap_or_else(|| "if".to_string()),
            }),
        }
    }

    // ─── Internals ─────────────────────────────────────────────────────────

    fn resolve(&self, label: &str) -> CompileResult<LabelKind> {
        self.control_stack
            .iter()
            .rev()
            .find(|f| f.label.as_deref() == Some(label))
            .map(|f| match f.kind {
                ControlKind::Loop => LabelKind::Loop,
                _ => LabelKind::Block,
            })
            .ok_or_else(|| CompileError::UnknownLabel {
                label: label.to_string(),
            })
    }

    /// Run `fill` with a fresh body on top of the control stack and return
    /// what it produced.
    fn nested<F>(
        &mut self,
        kind: ControlKind,
        label: Option<&str>,
        fill: F,
    ) -> CompileResult<Vec<Instr>>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        if let Some(label) = label {
            if self.labels().any(|open| open == label) {
                return Err(CompileError::DuplicateLabel {
                    label: label.to_string(),
                });
            }
        }
        trace!("{}: open {:?} {:?}", self.func, kind, label);
        let saved = std::mem::take(&mut self.current);
        self.control_stack.push(ControlFrame {
            kind,
            label: label.map(str::to_string),
            saved,
        });

        let filled = fill(self);

        // Restore the enclosing body even when `fill` failed.
        let frame = self
            .control_stack
            .pop()
            .ok_or(CompileError::UnknownLabel {
                label: label.unwrap_or("if").to_string(),
            })?;
        let body = std::mem::replace(&mut self.current, frame.saved);
        filled.map(|()| body)
    }
}

/// Check a finished body against its declared result and attach the
/// declaration.
pub(crate) fn typed_body(
    context: &str,
    result: Option<WasmType>,
    body: Vec<Instr>,
) -> CompileResult<InstrSeq> {
    let body = InstrSeq::new(body);
    check_body_result(context, result, &body)?;
    match result {
        Some(ty) => {
            let (instrs, _) = body.into_parts();
            Ok(InstrSeq::with_type(instrs, ResultType::typed(ty)))
        }
        None => Ok(body),
    }
}
