//! Instruction sequences.
//!
//! A sequence is a function body, a block body, or any nested group. Its
//! result type is either declared by the caller or inferred from a single
//! instruction; several instructions without a declaration report
//! [`ResultType::Unknown`] rather than guessing which values remain.

use super::instr::{Instr, Scope};
use super::types::{ResultType, WasmType};
use std::cell::OnceCell;
use std::collections::BTreeSet;

/// What a sequence may change and which number types it touches.
///
/// Not needed for emission; front ends use it to decide whether a group can
/// be reordered or hoisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    pub local_writes: BTreeSet<String>,
    pub global_writes: BTreeSet<String>,
    pub types: BTreeSet<WasmType>,
}

impl Effects {
    pub fn is_pure(&self) -> bool {
        self.local_writes.is_empty() && self.global_writes.is_empty()
    }

    fn record(&mut self, instr: &Instr) {
        match instr {
            Instr::Set { var, .. } | Instr::Tee { var, .. } => {
                match var.scope() {
                    Scope::Local => self.local_writes.insert(var.name().to_string()),
                    Scope::Global => self.global_writes.insert(var.name().to_string()),
                };
                self.types.insert(var.ty());
            }
            Instr::Get(var) => {
                self.types.insert(var.ty());
            }
            Instr::Load { arg, .. } | Instr::Store { arg, .. } => {
                self.types.insert(arg.ty);
            }
            Instr::Convert { op, .. } => {
                self.types.insert(op.source());
                self.types.insert(op.target());
            }
            _ => {}
        }
        if let Some(ty) = instr.result_type().concrete() {
            self.types.insert(ty);
        }
        if let Some(ty) = instr.operand_type().and_then(|op| op.concrete()) {
            self.types.insert(ty);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstrSeq {
    body: Vec<Instr>,
    declared: Option<ResultType>,
    effects: OnceCell<Effects>,
}

impl PartialEq for InstrSeq {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body && self.declared == other.declared
    }
}

impl From<Vec<Instr>> for InstrSeq {
    fn from(body: Vec<Instr>) -> Self {
        InstrSeq::new(body)
    }
}

impl From<Instr> for InstrSeq {
    fn from(instr: Instr) -> Self {
        InstrSeq::new(vec![instr])
    }
}

impl InstrSeq {
    pub fn new(body: Vec<Instr>) -> Self {
        Self {
            body,
            declared: None,
            effects: OnceCell::new(),
        }
    }

    /// A sequence whose stack result is stated by the caller.
    pub fn with_type(body: Vec<Instr>, declared: ResultType) -> Self {
        Self {
            body,
            declared: Some(declared),
            effects: OnceCell::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn declared(&self) -> Option<ResultType> {
        self.declared
    }

    /// Declared type, else the single instruction's type, else `Unknown`.
    pub fn result_type(&self) -> ResultType {
        if let Some(declared) = self.declared {
            return declared;
        }
        match self.body.as_slice() {
            [] => ResultType::Empty,
            [only] => only.result_type(),
            _ => ResultType::Unknown,
        }
    }

    /// Effect summary, computed on first use.
    pub fn effects(&self) -> &Effects {
        self.effects.get_or_init(|| {
            let mut effects = Effects::default();
            for instr in &self.body {
                instr.walk(&mut |node| effects.record(node));
            }
            effects
        })
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instr> {
        self.body.iter()
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.body
    }

    pub fn last(&self) -> Option<&Instr> {
        self.body.last()
    }

    pub fn into_parts(self) -> (Vec<Instr>, Option<ResultType>) {
        (self.body, self.declared)
    }

    /// Rebuild with every instruction passed through `f`. Drops the cached
    /// effect summary.
    pub fn map(self, f: &mut dyn FnMut(Instr) -> Instr) -> InstrSeq {
        let body = self.body.into_iter().map(|i| f(i)).collect();
        InstrSeq {
            body,
            declared: self.declared,
            effects: OnceCell::new(),
        }
    }
}

impl<'a> IntoIterator for &'a InstrSeq {
    type Item = &'a Instr;
    type IntoIter = std::slice::Iter<'a, Instr>;

    fn into_iter(self) -> Self::IntoIter {
        self.body.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{OperandType, VarRef};

    #[test]
    fn test_single_instruction_infers_type() {
        let seq = InstrSeq::new(vec![Instr::f32(1.5)]);
        assert_eq!(seq.result_type(), ResultType::typed(WasmType::F32));

        let seq = InstrSeq::new(vec![Instr::int(1)]);
        assert_eq!(seq.result_type(), ResultType::Value(OperandType::IntLiteral));
    }

    #[test]
    fn test_multiple_instructions_are_unknown() {
        let x = VarRef::local("x", WasmType::I32);
        let seq = InstrSeq::new(vec![x.set(Instr::i32(1)).unwrap(), x.get()]);
        assert_eq!(seq.result_type(), ResultType::Unknown);
    }

    #[test]
    fn test_declared_type_wins() {
        let x = VarRef::local("x", WasmType::I32);
        let seq = InstrSeq::with_type(
            vec![x.set(Instr::i32(1)).unwrap(), x.get()],
            ResultType::typed(WasmType::I32),
        );
        assert_eq!(seq.result_type(), ResultType::typed(WasmType::I32));
    }

    #[test]
    fn test_empty_sequence_has_no_result() {
        assert_eq!(InstrSeq::empty().result_type(), ResultType::Empty);
    }

    #[test]
    fn test_effects_collect_writes_and_types() {
        let i = VarRef::local("i", WasmType::I32);
        let total = VarRef::global("total", WasmType::I64);
        let seq = InstrSeq::new(vec![
            i.set(Instr::add(&i, 1).unwrap()).unwrap(),
            total.set(Instr::add(&total, 1).unwrap()).unwrap(),
        ]);
        let effects = seq.effects();
        assert!(effects.local_writes.contains("i"));
        assert!(effects.global_writes.contains("total"));
        assert!(effects.types.contains(&WasmType::I32));
        assert!(effects.types.contains(&WasmType::I64));
        assert!(!effects.types.contains(&WasmType::F64));
        assert!(!effects.is_pure());
    }

    #[test]
    fn test_pure_sequence() {
        let x = VarRef::local("x", WasmType::F64);
        let seq = InstrSeq::from(Instr::add(&x, Instr::f64(2.0)).unwrap());
        assert!(seq.effects().is_pure());
        assert_eq!(
            seq.effects().types.iter().copied().collect::<Vec<_>>(),
            vec![WasmType::F64]
        );
    }
}
