// This module implements the peephole optimizer over the opcode sequence. Eight passes run
// in a fixed order and each reports how many rewrites it made: unreachable code after an
// unconditional jump is blanked out, jumps to the immediately following label are dropped,
// calls to definitions without executable code are dropped, calls to TRUE and FALSE become
// a literal push, small straight-line definitions are inlined at their call sites, adjacent
// push/pop pairs on one stack collapse into a register move (or nothing), labels that only
// lead to a forward jump are moved to that jump's target, and labels no branch refers to
// are removed. Every rewrite goes through the table's replacement helpers so that the new
// opcode keeps the source line and a back-link to what it replaced. The passes repeat until
// a whole round makes no rewrite, bounded by an iteration cap.

//! Fixed-point peephole optimizer.

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::{HashMap, HashSet};

use crate::core::mangler::mangle;
use crate::ir::opcode::{OpId, OpKind, OpcodeTable};
use crate::ir::operand::{Label, Register, Stack};
use crate::ir::symbol::{SymbolId, SymbolTable};

/// Largest number of executable opcodes an inlining candidate may have.
pub const SMALL_FUNCTION_OPCODE_LIMIT: usize = 10;

/// Rounds of all passes before giving up on reaching a fixed point.
pub const ITERATIONS_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    RemoveUnreachableCode,
    RemoveUnnecessaryJumps,
    RemoveUselessCalls,
    InlineBooleans,
    InlineSmallFunctions,
    ReplaceAdjacentPushPopPairs,
    RelocateSuboptimalLabels,
    RemoveUnnecessaryLabels,
}

impl Pass {
    /// Passes in the order one round runs them.
    pub const ALL: [Pass; 8] = [
        Pass::RemoveUnreachableCode,
        Pass::RemoveUnnecessaryJumps,
        Pass::RemoveUselessCalls,
        Pass::InlineBooleans,
        Pass::InlineSmallFunctions,
        Pass::ReplaceAdjacentPushPopPairs,
        Pass::RelocateSuboptimalLabels,
        Pass::RemoveUnnecessaryLabels,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::RemoveUnreachableCode => "remove unreachable code",
            Pass::RemoveUnnecessaryJumps => "remove unnecessary jumps",
            Pass::RemoveUselessCalls => "remove useless calls",
            Pass::InlineBooleans => "inline booleans",
            Pass::InlineSmallFunctions => "inline small functions",
            Pass::ReplaceAdjacentPushPopPairs => "replace adjacent push/pop pairs",
            Pass::RelocateSuboptimalLabels => "relocate suboptimal labels",
            Pass::RemoveUnnecessaryLabels => "remove unnecessary labels",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one optimizer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    pub iterations: usize,
    pub rewrites_by_pass: [usize; 8],
    /// The last round still rewrote something when the cap was hit.
    pub limit_reached: bool,
}

impl OptimizeReport {
    pub fn total_rewrites(&self) -> usize {
        self.rewrites_by_pass.iter().sum()
    }

    pub fn rewrites(&self, pass: Pass) -> usize {
        self.rewrites_by_pass[pass.index()]
    }
}

pub struct Optimizer<'t, 'arena> {
    opcodes: &'t mut OpcodeTable<'arena>,
    symbols: &'t SymbolTable<'arena>,
}

impl<'t, 'arena> Optimizer<'t, 'arena> {
    pub fn new(opcodes: &'t mut OpcodeTable<'arena>, symbols: &'t SymbolTable<'arena>) -> Self {
        Self { opcodes, symbols }
    }

    /// Run rounds of every pass until nothing changes or the cap is reached.
    pub fn run(&mut self) -> OptimizeReport {
        let mut report = OptimizeReport::default();
        loop {
            let mut round = 0;
            for pass in Pass::ALL {
                let rewrites = self.run_pass(pass);
                if rewrites > 0 {
                    log::trace!("round {}: {} made {} rewrites", report.iterations + 1, pass, rewrites);
                }
                report.rewrites_by_pass[pass.index()] += rewrites;
                round += rewrites;
            }
            report.iterations += 1;
            log::debug!("optimizer round {} made {} rewrites", report.iterations, round);

            if round == 0 {
                break;
            }
            if report.iterations >= ITERATIONS_LIMIT {
                report.limit_reached = true;
                break;
            }
        }
        report
    }

    pub fn run_pass(&mut self, pass: Pass) -> usize {
        match pass {
            Pass::RemoveUnreachableCode => self.remove_unreachable_code(),
            Pass::RemoveUnnecessaryJumps => self.remove_unnecessary_jumps(),
            Pass::RemoveUselessCalls => self.remove_useless_calls(),
            Pass::InlineBooleans => self.inline_booleans(),
            Pass::InlineSmallFunctions => self.inline_small_functions(),
            Pass::ReplaceAdjacentPushPopPairs => self.replace_adjacent_push_pop_pairs(),
            Pass::RelocateSuboptimalLabels => self.relocate_suboptimal_labels(),
            Pass::RemoveUnnecessaryLabels => self.remove_unnecessary_labels(),
        }
    }

    fn find_from(&self, from: usize, predicate: impl Fn(&OpKind<'arena>) -> bool) -> Option<usize> {
        (from..self.opcodes.len()).find(|&p| predicate(&self.opcodes.kind_at(p)))
    }

    /// Blank out everything between an unconditional jump and the next label
    /// or definition end.
    pub fn remove_unreachable_code(&mut self) -> usize {
        let len = self.opcodes.len();
        let mut rewrites = 0;
        let mut position = 0;

        while let Some(jump) = self.find_from(position, OpKind::is_jump) {
            position = jump + 1;
            while position < len {
                match self.opcodes.kind_at(position) {
                    OpKind::Label(_) | OpKind::EndDefine(_) => break,
                    OpKind::NoOp => {}
                    _ => {
                        self.opcodes.replace_with_noop(position);
                        rewrites += 1;
                    }
                }
                position += 1;
            }
        }
        rewrites
    }

    /// Drop branches whose target is the next label in the stream.
    pub fn remove_unnecessary_jumps(&mut self) -> usize {
        let mut rewrites = 0;
        let mut position = 0;

        while let Some(branch) = self.find_from(position, OpKind::is_branching) {
            let Some(next) = self.opcodes.next_non_noop(branch + 1) else {
                break;
            };
            let target = self.opcodes.kind_at(branch).branch_target();
            if self.opcodes.kind_at(next).label().is_some() && self.opcodes.kind_at(next).label() == target {
                self.opcodes.replace_with_noop(branch);
                rewrites += 1;
            }
            position = next;
        }
        rewrites
    }

    /// Drop calls to definitions that contain nothing executable.
    pub fn remove_useless_calls(&mut self) -> usize {
        let mut empty_functions: HashSet<SymbolId> = HashSet::new();
        let mut current: Option<SymbolId> = None;
        let mut has_executable = false;

        for opcode in self.opcodes.iter() {
            match opcode.kind {
                OpKind::Define(symbol) => {
                    current = Some(symbol);
                    has_executable = false;
                }
                OpKind::EndDefine(_) => {
                    if let (Some(symbol), false) = (current, has_executable) {
                        empty_functions.insert(symbol);
                    }
                    current = None;
                }
                kind if current.is_some() => has_executable |= kind.is_executable(),
                _ => {}
            }
        }

        let mut rewrites = 0;
        for position in 0..self.opcodes.len() {
            if let OpKind::Call(symbol) = self.opcodes.kind_at(position) {
                if empty_functions.contains(&symbol) {
                    self.opcodes.replace_with_noop(position);
                    rewrites += 1;
                }
            }
        }
        rewrites
    }

    /// Replace calls to TRUE and FALSE with a literal push.
    pub fn inline_booleans(&mut self) -> usize {
        let truth = self.symbols.lookup_mangled(&mangle("TRUE")).map(|s| s.id);
        let falsity = self.symbols.lookup_mangled(&mangle("FALSE")).map(|s| s.id);
        if truth.is_none() && falsity.is_none() {
            return 0;
        }

        let mut rewrites = 0;
        let mut inlined: Vec<OpId> = Vec::with_capacity(self.opcodes.len());

        for position in 0..self.opcodes.len() {
            let value = match self.opcodes.kind_at(position) {
                OpKind::Call(symbol) if Some(symbol) == truth => -1,
                OpKind::Call(symbol) if Some(symbol) == falsity => 0,
                _ => {
                    inlined.push(self.opcodes.id_at(position));
                    continue;
                }
            };

            let line = self.opcodes.at(position).line;
            inlined.push(self.opcodes.replacement_for(position, OpKind::NoOp));
            inlined.push(self.opcodes.alloc(OpKind::LoadValue(Register::R0, value), line, None));
            inlined.push(self.opcodes.alloc(OpKind::Push(Register::R0, Stack::Data), line, None));
            rewrites += 1;
        }

        if rewrites > 0 {
            self.opcodes.set_sequence(inlined);
        }
        rewrites
    }

    /// Executable bodies of definitions small enough to inline.
    ///
    /// A candidate has no branches, no raw assembly, no call to itself and at
    /// most [`SMALL_FUNCTION_OPCODE_LIMIT`] executable opcodes.
    fn inline_splices(&self) -> HashMap<SymbolId, Vec<OpId>> {
        let mut splices = HashMap::new();
        let mut current: Option<SymbolId> = None;
        let mut body: Vec<OpId> = Vec::new();
        let mut rejected = false;

        for &id in self.opcodes.sequence() {
            let kind = self.opcodes.opcode(id).kind;
            match kind {
                OpKind::Define(symbol) => {
                    current = Some(symbol);
                    body.clear();
                    rejected = false;
                }
                OpKind::EndDefine(_) => {
                    if let (Some(symbol), false) = (current, rejected) {
                        splices.insert(symbol, std::mem::take(&mut body));
                    }
                    current = None;
                }
                _ => {
                    let Some(symbol) = current else {
                        continue;
                    };
                    rejected |= kind.is_branching();
                    rejected |= matches!(kind, OpKind::Assembly(_));
                    rejected |= kind == OpKind::Call(symbol);
                    if kind.is_executable() {
                        body.push(id);
                    }
                    rejected |= body.len() > SMALL_FUNCTION_OPCODE_LIMIT;
                }
            }
        }
        splices
    }

    /// Replace calls to small straight-line definitions with their bodies.
    pub fn inline_small_functions(&mut self) -> usize {
        let splices = self.inline_splices();
        if splices.is_empty() {
            return 0;
        }

        let mut rewrites = 0;
        let mut inlined: Vec<OpId> = Vec::with_capacity(self.opcodes.len());

        for position in 0..self.opcodes.len() {
            let splice = match self.opcodes.kind_at(position) {
                OpKind::Call(symbol) => splices.get(&symbol),
                _ => None,
            };
            match splice {
                Some(splice) => {
                    inlined.push(self.opcodes.replacement_for(position, OpKind::NoOp));
                    inlined.extend_from_slice(splice);
                    rewrites += 1;
                }
                None => inlined.push(self.opcodes.id_at(position)),
            }
        }

        if rewrites > 0 {
            self.opcodes.set_sequence(inlined);
        }
        rewrites
    }

    /// Collapse a push directly followed by a pop of the same stack.
    pub fn replace_adjacent_push_pop_pairs(&mut self) -> usize {
        let mut rewrites = 0;
        let mut position = 0;

        while let Some(first) = self.find_from(position, |k| matches!(k, OpKind::Push(..))) {
            let Some(second) = self.opcodes.next_non_noop(first + 1) else {
                break;
            };
            if let (OpKind::Push(pushed, push_stack), OpKind::Pop(popped, pop_stack)) =
                (self.opcodes.kind_at(first), self.opcodes.kind_at(second))
            {
                if push_stack == pop_stack {
                    let replacement = if pushed == popped {
                        OpKind::NoOp
                    } else {
                        OpKind::LoadRegister {
                            reg: popped,
                            with: pushed,
                        }
                    };
                    self.opcodes.replace_at(first, replacement);
                    self.opcodes.replace_with_noop(second);
                    rewrites += 1;
                }
            }
            position = second;
        }
        rewrites
    }

    /// Move labels that only lead to a forward jump onto that jump's target.
    pub fn relocate_suboptimal_labels(&mut self) -> usize {
        let mut relocations: BTreeMap<u32, u32> = BTreeMap::new();
        let mut label_lines: HashMap<u32, u32> = HashMap::new();
        let mut current: Option<Label> = None;

        for opcode in self.opcodes.iter() {
            match opcode.kind {
                OpKind::Label(label) => {
                    current = Some(label);
                    label_lines.insert(label.value(), opcode.line);
                }
                OpKind::Jump(target) => {
                    if let Some(label) = current {
                        if target.value() > label.value() {
                            relocations.insert(label.value(), target.value());
                        }
                    }
                    current = None;
                }
                OpKind::NoOp => {}
                _ => current = None,
            }
        }
        if relocations.is_empty() {
            return 0;
        }

        // Follow chains so every label lands on its final destination.
        let values: Vec<u32> = relocations.keys().copied().collect();
        for value in values {
            let mut forwards = relocations[&value];
            while let Some(&next) = relocations.get(&forwards) {
                forwards = next;
            }
            relocations.insert(value, forwards);
        }

        let mut splices: HashMap<u32, Vec<OpId>> = HashMap::new();
        for (&value, &target) in &relocations {
            let line = label_lines.get(&value).copied().unwrap_or_default();
            let moved = self.opcodes.alloc(OpKind::Label(Label(value)), line, None);
            splices.entry(target).or_default().push(moved);
        }

        let mut rewrites = 0;
        let mut relocated: Vec<OpId> = Vec::with_capacity(self.opcodes.len() + splices.len());

        for position in 0..self.opcodes.len() {
            let id = self.opcodes.id_at(position);
            let Some(label) = self.opcodes.kind_at(position).label() else {
                relocated.push(id);
                continue;
            };

            let mut affected = false;
            if relocations.contains_key(&label.value()) {
                relocated.push(self.opcodes.replacement_for(position, OpKind::NoOp));
                affected = true;
            }
            if let Some(splice) = splices.get(&label.value()) {
                relocated.extend_from_slice(splice);
                relocated.push(id);
                affected = true;
            }
            if affected {
                rewrites += 1;
            } else {
                relocated.push(id);
            }
        }

        if rewrites > 0 {
            self.opcodes.set_sequence(relocated);
        }
        rewrites
    }

    /// Drop labels no branch refers to.
    pub fn remove_unnecessary_labels(&mut self) -> usize {
        let used: HashSet<Label> = self
            .opcodes
            .iter()
            .filter_map(|opcode| opcode.kind.branch_target())
            .collect();

        let mut rewrites = 0;
        for position in 0..self.opcodes.len() {
            if let OpKind::Label(label) = self.opcodes.kind_at(position) {
                if !used.contains(&label) {
                    self.opcodes.replace_with_noop(position);
                    rewrites += 1;
                }
            }
        }
        rewrites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::symbol::SymbolKind;
    use bumpalo::Bump;

    fn live_kinds<'a>(table: &OpcodeTable<'a>) -> Vec<OpKind<'a>> {
        table
            .iter()
            .map(|op| op.kind)
            .filter(|kind| !kind.is_noop())
            .collect()
    }

    fn table_of<'a>(kinds: &[OpKind<'a>]) -> OpcodeTable<'a> {
        let mut table = OpcodeTable::new();
        for (line, kind) in kinds.iter().enumerate() {
            table.push(*kind, line as u32 + 1);
        }
        table
    }

    #[test]
    fn test_remove_unreachable_code_stops_at_label() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::Jump(Label(2)),
            OpKind::LoadValue(Register::R0, 1),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Label(Label(2)),
            OpKind::LoadValue(Register::R0, 2),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).remove_unreachable_code();
        assert_eq!(rewrites, 2);
        assert_eq!(
            live_kinds(&table),
            vec![
                OpKind::Jump(Label(2)),
                OpKind::Label(Label(2)),
                OpKind::LoadValue(Register::R0, 2),
            ]
        );
    }

    #[test]
    fn test_remove_unnecessary_jumps() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::JumpZero(Register::R0, Label(1)),
            OpKind::NoOp,
            OpKind::Label(Label(1)),
            OpKind::Jump(Label(3)),
            OpKind::Label(Label(2)),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).remove_unnecessary_jumps();
        assert_eq!(rewrites, 1);
        assert_eq!(table.kind_at(0), OpKind::NoOp);
        assert_eq!(table.kind_at(3), OpKind::Jump(Label(3)));
    }

    #[test]
    fn test_remove_useless_calls() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::Define(SymbolId(0)),
            OpKind::Label(Label(1)),
            OpKind::EndDefine(SymbolId(0)),
            OpKind::Call(SymbolId(0)),
            OpKind::Call(SymbolId(1)),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).remove_useless_calls();
        assert_eq!(rewrites, 1);
        assert_eq!(table.kind_at(3), OpKind::NoOp);
        assert_eq!(table.kind_at(4), OpKind::Call(SymbolId(1)));
    }

    #[test]
    fn test_inline_booleans() {
        let arena = Bump::new();
        let mut symbols = SymbolTable::new(&arena);
        let truth = symbols.add("true", 1, SymbolKind::External).unwrap();
        let falsity = symbols.add("FALSE", 1, SymbolKind::External).unwrap();
        let mut table = table_of(&[OpKind::Call(truth), OpKind::Call(falsity)]);

        let rewrites = Optimizer::new(&mut table, &symbols).inline_booleans();
        assert_eq!(rewrites, 2);
        assert_eq!(table.len(), 6);
        assert_eq!(table.at(0).optimizes, Some(OpId(0)));
        assert_eq!(
            live_kinds(&table),
            vec![
                OpKind::LoadValue(Register::R0, -1),
                OpKind::Push(Register::R0, Stack::Data),
                OpKind::LoadValue(Register::R0, 0),
                OpKind::Push(Register::R0, Stack::Data),
            ]
        );
    }

    #[test]
    fn test_inline_small_functions() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let dup = SymbolId(1);
        let mut table = table_of(&[
            OpKind::Define(SymbolId(0)),
            OpKind::Pop(Register::R0, Stack::Data),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Label(Label(1)),
            OpKind::EndDefine(SymbolId(0)),
            OpKind::Define(dup),
            OpKind::Call(SymbolId(0)),
            OpKind::EndDefine(dup),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).inline_small_functions();
        // the call inside `dup` is inlined; `dup` itself is never called
        assert_eq!(rewrites, 1);
        assert_eq!(
            live_kinds(&table)[6..],
            [
                OpKind::Define(dup),
                OpKind::Pop(Register::R0, Stack::Data),
                OpKind::Push(Register::R0, Stack::Data),
                OpKind::Push(Register::R0, Stack::Data),
                OpKind::EndDefine(dup),
            ]
        );
    }

    #[test]
    fn test_branching_and_recursive_definitions_are_not_inlined() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::Define(SymbolId(0)),
            OpKind::JumpZero(Register::R0, Label(1)),
            OpKind::Label(Label(1)),
            OpKind::EndDefine(SymbolId(0)),
            OpKind::Define(SymbolId(1)),
            OpKind::Call(SymbolId(1)),
            OpKind::EndDefine(SymbolId(1)),
            OpKind::Call(SymbolId(0)),
            OpKind::Call(SymbolId(1)),
        ]);
        assert_eq!(Optimizer::new(&mut table, &symbols).inline_small_functions(), 0);
    }

    #[test]
    fn test_push_pop_pairs() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::NoOp,
            OpKind::Pop(Register::R0, Stack::Data),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Pop(Register::R1, Stack::Data),
            OpKind::Push(Register::R0, Stack::Return),
            OpKind::Pop(Register::R0, Stack::Data),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).replace_adjacent_push_pop_pairs();
        assert_eq!(rewrites, 2);
        assert_eq!(
            live_kinds(&table),
            vec![
                OpKind::LoadRegister {
                    reg: Register::R1,
                    with: Register::R0
                },
                OpKind::Push(Register::R0, Stack::Return),
                OpKind::Pop(Register::R0, Stack::Data),
            ]
        );
    }

    #[test]
    fn test_relocate_suboptimal_labels_follows_chains() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::JumpZero(Register::R0, Label(1)),
            OpKind::Call(SymbolId(0)),
            OpKind::Label(Label(1)),
            OpKind::Jump(Label(2)),
            OpKind::Call(SymbolId(1)),
            OpKind::Label(Label(2)),
            OpKind::Jump(Label(3)),
            OpKind::Call(SymbolId(2)),
            OpKind::Label(Label(3)),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).relocate_suboptimal_labels();
        // labels 1 and 2 are moved, label 3 receives them
        assert_eq!(rewrites, 3);
        assert_eq!(
            live_kinds(&table),
            vec![
                OpKind::JumpZero(Register::R0, Label(1)),
                OpKind::Call(SymbolId(0)),
                OpKind::Jump(Label(2)),
                OpKind::Call(SymbolId(1)),
                OpKind::Jump(Label(3)),
                OpKind::Call(SymbolId(2)),
                OpKind::Label(Label(1)),
                OpKind::Label(Label(2)),
                OpKind::Label(Label(3)),
            ]
        );
        let moved = table
            .iter()
            .find(|op| op.kind == OpKind::Label(Label(1)))
            .unwrap();
        assert_eq!(moved.line, 3);
    }

    #[test]
    fn test_remove_unnecessary_labels() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::Label(Label(1)),
            OpKind::JumpNonZero(Register::R0, Label(2)),
            OpKind::Label(Label(2)),
        ]);
        let rewrites = Optimizer::new(&mut table, &symbols).remove_unnecessary_labels();
        assert_eq!(rewrites, 1);
        assert_eq!(table.kind_at(0), OpKind::NoOp);
    }

    #[test]
    fn test_run_reaches_fixed_point_and_is_idempotent() {
        let arena = Bump::new();
        let symbols = SymbolTable::new(&arena);
        let mut table = table_of(&[
            OpKind::Define(SymbolId(0)),
            OpKind::Pop(Register::R0, Stack::Data),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Label(Label(1)),
            OpKind::EndDefine(SymbolId(0)),
            OpKind::Define(SymbolId(1)),
            OpKind::LoadValue(Register::R0, 5),
            OpKind::Push(Register::R0, Stack::Data),
            OpKind::Call(SymbolId(0)),
            OpKind::Label(Label(0)),
            OpKind::EndDefine(SymbolId(1)),
        ]);

        let report = Optimizer::new(&mut table, &symbols).run();
        assert!(!report.limit_reached);
        assert!(report.total_rewrites() > 0);
        assert!(report.rewrites(Pass::InlineSmallFunctions) >= 1);

        let again = Optimizer::new(&mut table, &symbols).run();
        assert_eq!(again.total_rewrites(), 0);
        assert_eq!(again.iterations, 1);
    }
}
