// This module holds the named entities of a compilation unit. A symbol is created once,
// receives the next sequential id of its table, and is stored under its mangled name so
// that lookups by Forth spelling (any case, any punctuation) land on the same entry. The
// kind is a closed enum: storage kinds (variables and arrays of cells or characters),
// constants (integer and float, each backed by one storage cell), and callable kinds
// (external references plus the three definable kinds: named words, anonymous words and
// code words). Ids start at zero for every fresh table, so the numbering seen in listings
// is stable per unit. Symbol names are interned in the unit's arena.

//! Symbols and the symbol table.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use bumpalo::Bump;

use crate::core::error::{CompileError, CompileResult};
use crate::core::mangler::mangle;

/// Handle of a symbol; its value is the symbol's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sym_{}", self.0)
    }
}

/// Element width of a storage symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Character,
    Cell,
}

impl Units {
    /// Bytes per element on the target.
    pub fn width(self) -> usize {
        match self {
            Units::Character => 1,
            Units::Cell => 4,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Units::Character => "Char",
            Units::Cell => "Cell",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Single cell variable.
    Variable,
    CellArray { size: usize },
    CharacterArray { size: usize },
    IntConstant,
    FloatConstant,
    /// Referenced but not defined in this unit.
    External,
    Word,
    Anonword,
    Codeword,
}

impl SymbolKind {
    /// Type string shown in listings.
    pub fn type_name(self) -> &'static str {
        match self {
            SymbolKind::Variable | SymbolKind::CellArray { .. } | SymbolKind::CharacterArray { .. } => {
                "variable"
            }
            SymbolKind::IntConstant => "constant",
            SymbolKind::FloatConstant => "fconstant",
            SymbolKind::External => "external",
            SymbolKind::Word => "word",
            SymbolKind::Anonword => "anonword",
            SymbolKind::Codeword => "codeword",
        }
    }

    /// Element units and count for storage kinds.
    pub fn storage(self) -> Option<(Units, usize)> {
        match self {
            SymbolKind::Variable => Some((Units::Cell, 1)),
            SymbolKind::CellArray { size } => Some((Units::Cell, size)),
            SymbolKind::CharacterArray { size } => Some((Units::Character, size)),
            _ => None,
        }
    }

    pub fn is_variable(self) -> bool {
        self.storage().is_some()
    }

    pub fn is_constant(self) -> bool {
        matches!(self, SymbolKind::IntConstant | SymbolKind::FloatConstant)
    }

    pub fn is_callable(self) -> bool {
        matches!(
            self,
            SymbolKind::External | SymbolKind::Word | SymbolKind::Anonword | SymbolKind::Codeword
        )
    }

    pub fn is_definable(self) -> bool {
        matches!(
            self,
            SymbolKind::Word | SymbolKind::Anonword | SymbolKind::Codeword
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol<'arena> {
    pub id: SymbolId,
    /// Mangled name.
    pub name: &'arena str,
    pub line: u32,
    pub kind: SymbolKind,
}

impl Symbol<'_> {
    /// One line of the symbol listing.
    pub fn list_entry(&self) -> String {
        let mut entry = format!("{:>6} {} {}", self.line, self.id, self.kind.type_name());
        if let Some((units, size)) = self.kind.storage() {
            let _ = write!(entry, " {units}");
            if size > 1 {
                let _ = write!(entry, "[{size}]");
            }
        }
        let _ = write!(entry, " \"{}\"", self.name);
        entry
    }
}

/// All symbols of one unit, ordered by mangled name.
pub struct SymbolTable<'arena> {
    arena: &'arena Bump,
    symbols: Vec<Symbol<'arena>>,
    by_name: BTreeMap<&'arena str, SymbolId>,
}

impl<'arena> SymbolTable<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            symbols: Vec::new(),
            by_name: BTreeMap::new(),
        }
    }

    fn next_id(&self) -> SymbolId {
        SymbolId(self.symbols.len() as u32)
    }

    /// Create a symbol from its Forth spelling.
    ///
    /// Adding a name that mangles onto an existing entry is a caller bug; the
    /// driver checks with [`SymbolTable::lookup`] first.
    pub fn add(&mut self, raw_name: &str, line: u32, kind: SymbolKind) -> CompileResult<SymbolId> {
        let mangled = mangle(raw_name);
        if self.by_name.contains_key(mangled.as_str()) {
            return Err(CompileError::SymbolCollision { name: mangled });
        }

        let id = self.next_id();
        let name = self.arena.alloc_str(&mangled);
        self.symbols.push(Symbol { id, name, line, kind });
        self.by_name.insert(name, id);
        log::trace!("symbol {} {} \"{}\"", id, kind.type_name(), name);
        Ok(id)
    }

    /// Create an anonymous word, named after its own id.
    pub fn add_anonymous(&mut self, line: u32) -> CompileResult<SymbolId> {
        let raw_name = format!("__{}{}", mangle(""), self.next_id().0);
        self.add(&raw_name, line, SymbolKind::Anonword)
    }

    /// Find a symbol by its Forth spelling.
    pub fn lookup(&self, raw_name: &str) -> Option<&Symbol<'arena>> {
        self.lookup_mangled(&mangle(raw_name))
    }

    pub fn lookup_mangled(&self, mangled: &str) -> Option<&Symbol<'arena>> {
        self.by_name
            .get(mangled)
            .map(|id| &self.symbols[id.0 as usize])
    }

    pub fn get(&self, id: SymbolId) -> CompileResult<&Symbol<'arena>> {
        self.symbols
            .get(id.0 as usize)
            .ok_or(CompileError::UnknownSymbol { id: id.0 })
    }

    /// Symbols in mangled-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol<'arena>> {
        self.by_name
            .values()
            .map(move |id| &self.symbols[id.0 as usize])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Drop every symbol; ids restart at zero.
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.by_name.clear();
    }

    pub fn create_listing(&self, out: &mut String) {
        if self.is_empty() {
            return;
        }
        out.push_str("Symbols:\n");
        for symbol in self.iter() {
            out.push_str(&symbol.list_entry());
            out.push('\n');
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup_by_forth_spelling() {
        let arena = Bump::new();
        let mut table = SymbolTable::new(&arena);
        let id = table.add("Counter", 3, SymbolKind::Variable).unwrap();
        assert_eq!(id, SymbolId(0));

        let found = table.lookup("COUNTER").unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "v4_counter");
        assert!(table.lookup("other").is_none());
    }

    #[test]
    fn test_collision_is_rejected() {
        let arena = Bump::new();
        let mut table = SymbolTable::new(&arena);
        table.add("dup", 1, SymbolKind::External).unwrap();
        let err = table.add("DUP", 2, SymbolKind::Word).unwrap_err();
        assert!(matches!(err, CompileError::SymbolCollision { ref name } if name == "v4_dup"));
    }

    #[test]
    fn test_anonymous_words_named_by_id() {
        let arena = Bump::new();
        let mut table = SymbolTable::new(&arena);
        table.add("x", 1, SymbolKind::Variable).unwrap();
        let id = table.add_anonymous(2).unwrap();
        let symbol = table.get(id).unwrap();
        assert_eq!(symbol.name, "v4_1");
        assert_eq!(symbol.kind, SymbolKind::Anonword);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(SymbolKind::External.is_callable());
        assert!(!SymbolKind::External.is_definable());
        assert!(SymbolKind::Codeword.is_definable());
        assert!(SymbolKind::CharacterArray { size: 8 }.is_variable());
        assert!(!SymbolKind::IntConstant.is_variable());
        assert_eq!(SymbolKind::CellArray { size: 2 }.type_name(), "variable");
    }

    #[test]
    fn test_listing_sorted_by_name() {
        let arena = Bump::new();
        let mut table = SymbolTable::new(&arena);
        table.add("zeta", 1, SymbolKind::Word).unwrap();
        table.add("buf", 2, SymbolKind::CharacterArray { size: 80 }).unwrap();
        table.add("v", 3, SymbolKind::Variable).unwrap();

        let mut out = String::new();
        table.create_listing(&mut out);
        assert_eq!(
            out,
            "Symbols:\n\
             \x20    2 Sym_1 variable Char[80] \"v4_buf\"\n\
             \x20    3 Sym_2 variable Cell \"v4_v\"\n\
             \x20    1 Sym_0 word \"v4_zeta\"\n\n"
        );
    }

    #[test]
    fn test_clear_restarts_ids() {
        let arena = Bump::new();
        let mut table = SymbolTable::new(&arena);
        table.add("a", 1, SymbolKind::Word).unwrap();
        table.add("b", 1, SymbolKind::Word).unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.add("c", 1, SymbolKind::Word).unwrap(), SymbolId(0));
    }
}
