//! Structured control flow: labeled blocks, loops, conditionals, and branches.
//!
//! Nodes are only created by [`BodyBuilder`](super::builder::BodyBuilder),
//! which checks label scoping at the point of construction. Nothing here
//! re-validates a finished node.

use super::instr::Instr;
use super::seq::InstrSeq;
use super::types::{check_assignable, ResultType, WasmType};
use crate::error::{CompileError, CompileResult};

/// Which construct a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Branching exits the block.
    Block,
    /// Branching re-enters the loop head.
    Loop,
}

/// `(block $label (result t)? body)`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    label: String,
    result: Option<WasmType>,
    body: InstrSeq,
}

impl Block {
    pub(crate) fn new(label: String, result: Option<WasmType>, body: InstrSeq) -> Self {
        Self {
            label,
            result,
            body,
        }
    }

    pub(crate) fn into_parts(self) -> (String, Option<WasmType>, InstrSeq) {
        (self.label, self.result, self.body)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn result(&self) -> Option<WasmType> {
        self.result
    }

    pub fn body(&self) -> &InstrSeq {
        &self.body
    }

    pub(crate) fn map_body(self, f: impl FnOnce(InstrSeq) -> InstrSeq) -> Self {
        Self {
            body: f(self.body),
            ..self
        }
    }
}

/// `(loop $label (result t)? body)`
///
/// The body runs once per entry; repetition needs an explicit branch back
/// to the label.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    label: String,
    result: Option<WasmType>,
    body: InstrSeq,
}

impl Loop {
    pub(crate) fn new(label: String, result: Option<WasmType>, body: InstrSeq) -> Self {
        Self {
            label,
            result,
            body,
        }
    }

    pub(crate) fn into_parts(self) -> (String, Option<WasmType>, InstrSeq) {
        (self.label, self.result, self.body)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn result(&self) -> Option<WasmType> {
        self.result
    }

    pub fn body(&self) -> &InstrSeq {
        &self.body
    }

    pub(crate) fn map_body(self, f: impl FnOnce(InstrSeq) -> InstrSeq) -> Self {
        Self {
            body: f(self.body),
            ..self
        }
    }
}

/// `condition (if (result t)? (then ...) (else ...)?)`
#[derive(Debug, Clone, PartialEq)]
pub struct IfElse {
    result: Option<WasmType>,
    condition: Box<Instr>,
    then_body: InstrSeq,
    else_body: Option<InstrSeq>,
}

impl IfElse {
    /// An `if` that declares a result must have an else body.
    pub(crate) fn new(
        condition: Instr,
        result: Option<WasmType>,
        then_body: InstrSeq,
        else_body: Option<InstrSeq>,
    ) -> CompileResult<Self> {
        let found = condition.value_type("if condition")?;
        check_assignable("if condition", WasmType::I32, found)?;
        if let (Some(ty), None) = (result, &else_body) {
            return Err(CompileError::MissingElse { ty });
        }
        Ok(Self {
            result,
            condition: Box::new(condition),
            then_body,
            else_body,
        })
    }

    pub fn result(&self) -> Option<WasmType> {
        self.result
    }

    pub fn condition(&self) -> &Instr {
        &self.condition
    }

    pub fn then_body(&self) -> &InstrSeq {
        &self.then_body
    }

    pub fn else_body(&self) -> Option<&InstrSeq> {
        self.else_body.as_ref()
    }

    pub(crate) fn map_parts(self, f: &mut dyn FnMut(Instr) -> Instr) -> Self {
        Self {
            result: self.result,
            condition: Box::new(f(*self.condition)),
            then_body: self.then_body.map(f),
            else_body: self.else_body.map(|body| body.map(f)),
        }
    }

    pub(crate) fn into_parts(self) -> (Option<WasmType>, Instr, InstrSeq, Option<InstrSeq>) {
        (self.result, *self.condition, self.then_body, self.else_body)
    }
}

/// `br $label` or `condition br_if $label`
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    label: String,
    target: LabelKind,
    condition: Option<Box<Instr>>,
}

impl Branch {
    pub(crate) fn new(label: String, target: LabelKind, condition: Option<Instr>) -> Self {
        Self {
            label,
            target,
            condition: condition.map(Box::new),
        }
    }

    pub(crate) fn into_parts(self) -> (String, LabelKind, Option<Instr>) {
        (self.label, self.target, self.condition.map(|c| *c))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether this edge exits a block or continues a loop.
    pub fn target(&self) -> LabelKind {
        self.target
    }

    pub fn condition(&self) -> Option<&Instr> {
        self.condition.as_deref()
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    pub(crate) fn map_condition(self, f: &mut dyn FnMut(Instr) -> Instr) -> Self {
        Self {
            condition: self.condition.map(|c| Box::new(f(*c))),
            ..self
        }
    }
}

/// Check what a body leaves on the stack against a declared result.
///
/// A body with several instructions and no declaration is `Unknown` and is
/// accepted as is.
pub(crate) fn check_body_result(
    context: &str,
    declared: Option<WasmType>,
    body: &InstrSeq,
) -> CompileResult<()> {
    let expected = ResultType::from_option(declared);
    let found = body.result_type();
    let ok = match (declared, found) {
        (_, ResultType::Unknown) => true,
        (None, ResultType::Empty) => true,
        (Some(ty), ResultType::Value(op)) => check_assignable(context, ty, op).is_ok(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(CompileError::ResultMismatch {
            context: context.to_string(),
            expected,
            found,
        })
    }
}
