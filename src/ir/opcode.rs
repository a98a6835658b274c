// This module defines the intermediate code: a flat sequence of opcodes for an abstract
// two-register machine with three runtime stacks. Opcodes are a closed enum; each carries
// its source line and, when it was produced by an optimizer rewrite, a back-link to the
// opcode it replaced (only used to annotate the listing). The table keeps an arena of
// every opcode ever allocated and a separate ordered sequence of handles that the
// optimizer restructures freely; a handle may appear at several positions after inlining.
// The table also implements the two whole-program steps that run right after parsing:
// moving top-level code into a synthesized `main` definition, and finding code that
// follows an unconditional jump without an intervening label.

//! Opcode IR and the opcode table.

use std::fmt;

use crate::ir::data::DataId;
use crate::ir::operand::{Label, Register, Stack, Value};
use crate::ir::symbol::SymbolId;

/// Handle of an opcode in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind<'arena> {
    Call(SymbolId),
    Define(SymbolId),
    EndDefine(SymbolId),
    Label(Label),
    Assembly(&'arena str),
    LoadValue(Register, Value),
    LoadRegister { reg: Register, with: Register },
    LoadSymbol(Register, SymbolId),
    LoadSymbolIndirect(Register, SymbolId),
    LoadData(Register, DataId),
    StoreSymbolIndirect(Register, SymbolId),
    Push(Register, Stack),
    Pop(Register, Stack),
    AddValue(Register, Value),
    AddRegister { reg: Register, increment: Register },
    SubtractValue(Register, Value),
    SubtractRegister { reg: Register, decrement: Register },
    Jump(Label),
    JumpZero(Register, Label),
    JumpNonZero(Register, Label),
    JumpGreaterZero(Register, Label),
    JumpLessZero(Register, Label),
    JumpGreaterEqualZero(Register, Label),
    JumpLessEqualZero(Register, Label),
    JumpEqual(Register, Register, Label),
    JumpNotEqual(Register, Register, Label),
    NoOp,
}

impl OpKind<'_> {
    /// Target of any jump, conditional or not.
    pub fn branch_target(&self) -> Option<Label> {
        match *self {
            OpKind::Jump(label)
            | OpKind::JumpZero(_, label)
            | OpKind::JumpNonZero(_, label)
            | OpKind::JumpGreaterZero(_, label)
            | OpKind::JumpLessZero(_, label)
            | OpKind::JumpGreaterEqualZero(_, label)
            | OpKind::JumpLessEqualZero(_, label)
            | OpKind::JumpEqual(_, _, label)
            | OpKind::JumpNotEqual(_, _, label) => Some(label),
            _ => None,
        }
    }

    pub fn is_branching(&self) -> bool {
        self.branch_target().is_some()
    }

    /// Only the unconditional jump.
    pub fn is_jump(&self) -> bool {
        matches!(self, OpKind::Jump(_))
    }

    pub fn label(&self) -> Option<Label> {
        match *self {
            OpKind::Label(label) => Some(label),
            _ => None,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, OpKind::Label(_))
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, OpKind::NoOp)
    }

    /// Anything that survives into the instruction stream.
    pub fn is_executable(&self) -> bool {
        !self.is_label() && !self.is_noop()
    }

    /// Opcodes that never carry a line-number stab.
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self,
            OpKind::Label(_)
                | OpKind::NoOp
                | OpKind::Define(_)
                | OpKind::EndDefine(_)
                | OpKind::Assembly(_)
        )
    }
}

impl fmt::Display for OpKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Call(sym) => write!(f, "  call {sym}"),
            OpKind::Define(sym) => write!(f, "function {sym} {{"),
            OpKind::EndDefine(_) => write!(f, "}}"),
            OpKind::Label(label) => write!(f, "label {label}"),
            OpKind::Assembly(text) => write!(f, "  asm ({text})"),
            OpKind::LoadValue(reg, value) => write!(f, "  {reg} = {value}"),
            OpKind::LoadRegister { reg, with } => write!(f, "  {reg} = {with}"),
            OpKind::LoadSymbol(reg, sym) => write!(f, "  {reg} = {sym}"),
            OpKind::LoadSymbolIndirect(reg, sym) => write!(f, "  {reg} = *({sym})"),
            OpKind::LoadData(reg, data) => write!(f, "  {reg} = {data}"),
            OpKind::StoreSymbolIndirect(reg, sym) => write!(f, "  *({sym}) = {reg}"),
            OpKind::Push(reg, stack) => write!(f, "  {stack} = {reg}"),
            OpKind::Pop(reg, stack) => write!(f, "  {reg} = {stack}"),
            OpKind::AddValue(reg, value) => write!(f, "  {reg} += {value}"),
            OpKind::AddRegister { reg, increment } => write!(f, "  {reg} += {increment}"),
            OpKind::SubtractValue(reg, value) => write!(f, "  {reg} -= {value}"),
            OpKind::SubtractRegister { reg, decrement } => write!(f, "  {reg} -= {decrement}"),
            OpKind::Jump(label) => write!(f, "  goto {label}"),
            OpKind::JumpZero(reg, label) => write!(f, "  if {reg} == 0 goto {label}"),
            OpKind::JumpNonZero(reg, label) => write!(f, "  if {reg} != 0 goto {label}"),
            OpKind::JumpGreaterZero(reg, label) => write!(f, "  if {reg} > 0 goto {label}"),
            OpKind::JumpLessZero(reg, label) => write!(f, "  if {reg} < 0 goto {label}"),
            OpKind::JumpGreaterEqualZero(reg, label) => write!(f, "  if {reg} >= 0 goto {label}"),
            OpKind::JumpLessEqualZero(reg, label) => write!(f, "  if {reg} <= 0 goto {label}"),
            OpKind::JumpEqual(r1, r2, label) => write!(f, "  if {r1} == {r2} goto {label}"),
            OpKind::JumpNotEqual(r1, r2, label) => write!(f, "  if {r1} != {r2} goto {label}"),
            OpKind::NoOp => write!(f, "  no-op"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode<'arena> {
    pub kind: OpKind<'arena>,
    pub line: u32,
    /// The opcode this one replaced, for the listing only.
    pub optimizes: Option<OpId>,
}

/// Code that follows an unconditional jump with no label in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreachableCode {
    pub line: u32,
    pub jump_line: u32,
}

#[derive(Debug, Default)]
pub struct OpcodeTable<'arena> {
    /// Every opcode ever allocated.
    arena: Vec<Opcode<'arena>>,
    /// Program order.
    sequence: Vec<OpId>,
}

impl<'arena> OpcodeTable<'arena> {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            sequence: Vec::new(),
        }
    }

    /// Allocate an opcode without placing it in the sequence.
    pub fn alloc(&mut self, kind: OpKind<'arena>, line: u32, optimizes: Option<OpId>) -> OpId {
        let id = OpId(self.arena.len() as u32);
        self.arena.push(Opcode {
            kind,
            line,
            optimizes,
        });
        id
    }

    /// Allocate an opcode and append it to the sequence.
    pub fn push(&mut self, kind: OpKind<'arena>, line: u32) -> OpId {
        let id = self.alloc(kind, line, None);
        log::trace!("{:>6} {}", line, kind);
        self.sequence.push(id);
        id
    }

    pub fn opcode(&self, id: OpId) -> &Opcode<'arena> {
        &self.arena[id.0 as usize]
    }

    pub fn id_at(&self, position: usize) -> OpId {
        self.sequence[position]
    }

    pub fn at(&self, position: usize) -> &Opcode<'arena> {
        self.opcode(self.sequence[position])
    }

    pub fn kind_at(&self, position: usize) -> OpKind<'arena> {
        self.at(position).kind
    }

    /// Allocate a replacement for the opcode at `position`, linked back to it.
    pub fn replacement_for(&mut self, position: usize, kind: OpKind<'arena>) -> OpId {
        let original = self.sequence[position];
        let line = self.opcode(original).line;
        self.alloc(kind, line, Some(original))
    }

    /// Replace the opcode at `position` in place.
    pub fn replace_at(&mut self, position: usize, kind: OpKind<'arena>) {
        let id = self.replacement_for(position, kind);
        self.sequence[position] = id;
    }

    pub fn replace_with_noop(&mut self, position: usize) {
        self.replace_at(position, OpKind::NoOp);
    }

    /// Position of the first opcode at or after `from` that is not a no-op.
    pub fn next_non_noop(&self, from: usize) -> Option<usize> {
        (from..self.sequence.len()).find(|&p| !self.kind_at(p).is_noop())
    }

    pub fn sequence(&self) -> &[OpId] {
        &self.sequence
    }

    pub fn set_sequence(&mut self, sequence: Vec<OpId>) {
        self.sequence = sequence;
    }

    /// Opcodes in program order.
    pub fn iter(&self) -> impl Iterator<Item = &Opcode<'arena>> {
        self.sequence.iter().map(move |&id| self.opcode(id))
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Total opcodes allocated, live or replaced.
    pub fn allocated(&self) -> usize {
        self.arena.len()
    }

    pub fn clear(&mut self) {
        self.sequence.clear();
        self.arena.clear();
    }

    /// True when some opcode lies outside every definition.
    pub fn has_top_level_code(&self) -> bool {
        let mut depth = 0usize;
        for opcode in self.iter() {
            match opcode.kind {
                OpKind::Define(_) => depth += 1,
                OpKind::EndDefine(_) => depth = depth.saturating_sub(1),
                _ if depth == 0 => return true,
                _ => {}
            }
        }
        false
    }

    /// Move every opcode outside a definition into a definition of `main`.
    ///
    /// Returns false when there was no top-level code.
    pub fn synthesize_main(&mut self, main: SymbolId) -> bool {
        let mut main_opcodes = Vec::new();
        let mut function_opcodes = Vec::new();
        let mut in_main = true;

        for &id in &self.sequence {
            let kind = self.opcode(id).kind;
            if matches!(kind, OpKind::Define(_)) {
                in_main = false;
            }
            if in_main {
                main_opcodes.push(id);
            } else {
                function_opcodes.push(id);
            }
            if matches!(kind, OpKind::EndDefine(_)) {
                in_main = true;
            }
        }

        let (Some(&first), Some(&last)) = (main_opcodes.first(), main_opcodes.last()) else {
            return false;
        };
        let first_line = self.opcode(first).line;
        let last_line = self.opcode(last).line;

        self.sequence = function_opcodes;
        self.push(OpKind::Define(main), first_line);
        self.sequence.extend(main_opcodes);
        self.push(OpKind::Label(Label::MAIN_EXIT), last_line);
        self.push(OpKind::EndDefine(main), last_line);
        true
    }

    /// Find non-label code directly after each unconditional jump.
    pub fn unreachable_check(&self) -> Vec<UnreachableCode> {
        let mut findings = Vec::new();
        for (position, opcode) in self.iter().enumerate() {
            if !opcode.kind.is_jump() {
                continue;
            }
            let Some(next) = self.next_non_noop(position + 1) else {
                break;
            };
            let next = self.at(next);
            if !next.kind.is_label() {
                findings.push(UnreachableCode {
                    line: next.line,
                    jump_line: opcode.line,
                });
            }
        }
        findings
    }

    pub fn create_listing(&self, out: &mut String) {
        if self.is_empty() {
            return;
        }
        out.push_str("Intermediate code:\n");
        for opcode in self.iter() {
            out.push_str(&format!("{:>6} {}\n", opcode.line, opcode.kind));
            if let Some(replaced) = opcode.optimizes {
                out.push_str(&format!(
                    "{:11}optimizes {}\n",
                    "",
                    self.opcode(replaced).kind
                ));
            }
            if matches!(opcode.kind, OpKind::EndDefine(_)) {
                out.push('\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_texts() {
        let cases: Vec<(OpKind, &str)> = vec![
            (OpKind::Call(SymbolId(3)), "  call Sym_3"),
            (OpKind::Define(SymbolId(1)), "function Sym_1 {"),
            (OpKind::EndDefine(SymbolId(1)), "}"),
            (OpKind::Label(Label(4)), "label Label_4"),
            (OpKind::Assembly("nop"), "  asm (nop)"),
            (OpKind::LoadValue(Register::R0, -1), "  Reg_0 = -1"),
            (
                OpKind::LoadRegister { reg: Register::R1, with: Register::R0 },
                "  Reg_1 = Reg_0",
            ),
            (OpKind::LoadSymbolIndirect(Register::R0, SymbolId(2)), "  Reg_0 = *(Sym_2)"),
            (OpKind::LoadData(Register::R0, DataId(0)), "  Reg_0 = Data_0"),
            (OpKind::StoreSymbolIndirect(Register::R0, SymbolId(2)), "  *(Sym_2) = Reg_0"),
            (OpKind::Push(Register::R0, Stack::Data), "  Stack_D = Reg_0"),
            (OpKind::Pop(Register::R1, Stack::Return), "  Reg_1 = Stack_R"),
            (
                OpKind::SubtractRegister { reg: Register::R1, decrement: Register::R0 },
                "  Reg_1 -= Reg_0",
            ),
            (OpKind::JumpLessEqualZero(Register::R0, Label(2)), "  if Reg_0 <= 0 goto Label_2"),
            (
                OpKind::JumpNotEqual(Register::R0, Register::R1, Label(9)),
                "  if Reg_0 != Reg_1 goto Label_9",
            ),
            (OpKind::NoOp, "  no-op"),
        ];
        for (kind, text) in cases {
            assert_eq!(kind.to_string(), text);
        }
    }

    #[test]
    fn test_classification() {
        assert!(OpKind::Jump(Label(1)).is_jump());
        assert!(OpKind::Jump(Label(1)).is_branching());
        assert!(!OpKind::JumpZero(Register::R0, Label(1)).is_jump());
        assert!(OpKind::JumpEqual(Register::R0, Register::R1, Label(1)).is_branching());
        assert!(!OpKind::Label(Label(1)).is_executable());
        assert!(OpKind::Assembly("ret").is_pseudo());
        assert!(!OpKind::Call(SymbolId(0)).is_pseudo());
    }

    #[test]
    fn test_replacement_keeps_history() {
        let mut table = OpcodeTable::new();
        table.push(OpKind::Call(SymbolId(0)), 7);
        table.replace_with_noop(0);

        assert_eq!(table.len(), 1);
        assert_eq!(table.allocated(), 2);
        let opcode = table.at(0);
        assert_eq!(opcode.kind, OpKind::NoOp);
        assert_eq!(opcode.line, 7);

        let mut out = String::new();
        table.create_listing(&mut out);
        assert_eq!(
            out,
            "Intermediate code:\n     7   no-op\n           optimizes   call Sym_0\n"
        );
    }

    #[test]
    fn test_synthesize_main_wraps_top_level_code() {
        let mut table = OpcodeTable::new();
        table.push(OpKind::LoadValue(Register::R0, 1), 1);
        table.push(OpKind::Define(SymbolId(0)), 2);
        table.push(OpKind::Label(Label(1)), 2);
        table.push(OpKind::EndDefine(SymbolId(0)), 2);
        table.push(OpKind::Push(Register::R0, Stack::Data), 3);

        assert!(table.synthesize_main(SymbolId(5)));
        let kinds: Vec<OpKind> = table.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OpKind::Define(SymbolId(0)),
                OpKind::Label(Label(1)),
                OpKind::EndDefine(SymbolId(0)),
                OpKind::Define(SymbolId(5)),
                OpKind::LoadValue(Register::R0, 1),
                OpKind::Push(Register::R0, Stack::Data),
                OpKind::Label(Label::MAIN_EXIT),
                OpKind::EndDefine(SymbolId(5)),
            ]
        );
        assert_eq!(table.at(3).line, 1);
        assert_eq!(table.at(7).line, 3);
    }

    #[test]
    fn test_synthesize_main_without_top_level_code() {
        let mut table = OpcodeTable::new();
        table.push(OpKind::Define(SymbolId(0)), 1);
        table.push(OpKind::EndDefine(SymbolId(0)), 1);
        assert!(!table.synthesize_main(SymbolId(1)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unreachable_check() {
        let mut table = OpcodeTable::new();
        table.push(OpKind::Jump(Label(1)), 4);
        table.push(OpKind::NoOp, 4);
        table.push(OpKind::Call(SymbolId(0)), 5);
        table.push(OpKind::Jump(Label(1)), 6);
        table.push(OpKind::Label(Label(1)), 7);

        assert_eq!(
            table.unreachable_check(),
            vec![UnreachableCode { line: 5, jump_line: 4 }]
        );
    }
}
