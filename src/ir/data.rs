// This module stores the literal byte blobs a unit references: plain strings (for `S"`,
// `."` and `ABORT"`) and counted strings (for `C"`, emitted with a leading length byte).
// Each item gets the next sequential id and keeps its bytes in the unit's arena. Items
// with identical kind and bytes share storage: the first one of a signature group is the
// owner and every later one records it as `synonym_of`, so the code generator writes one
// label per item but the bytes only once per group.

//! Read-only data items and the data table.

use std::fmt;

use bumpalo::Bump;
use hashbrown::HashMap;

use crate::core::error::{CompileError, CompileResult};

/// Handle of a data item; its value is the item's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataId(pub u32);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    String,
    CountedString,
}

impl DataKind {
    pub fn type_name(self) -> &'static str {
        match self {
            DataKind::String => "string",
            DataKind::CountedString => "cstring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Data<'arena> {
    pub id: DataId,
    pub kind: DataKind,
    pub bytes: &'arena [u8],
    pub line: u32,
    /// First item with the same kind and bytes, if this one is a duplicate.
    pub synonym_of: Option<DataId>,
}

impl Data<'_> {
    /// Bytes as shown in the listing: printable as is, others as `\0<octal>`.
    fn list_bytes(&self) -> String {
        let mut text = String::new();
        for &byte in self.bytes {
            if byte.is_ascii_graphic() || byte == b' ' {
                text.push(byte as char);
            } else {
                text.push_str(&format!("\\0{byte:o}"));
            }
        }
        text
    }

    pub fn list_entry(&self) -> String {
        match self.synonym_of {
            Some(first) => format!("{:>6} {} synonym {}", self.line, self.id, first),
            None => format!(
                "{:>6} {} {}[{}] \"{}\"",
                self.line,
                self.id,
                self.kind.type_name(),
                self.bytes.len(),
                self.list_bytes()
            ),
        }
    }
}

pub struct DataTable<'arena> {
    arena: &'arena Bump,
    items: Vec<Data<'arena>>,
    /// Signature groups in first-seen order; the head of each owns the bytes.
    groups: Vec<Vec<DataId>>,
    signatures: HashMap<(DataKind, &'arena [u8]), usize>,
}

impl<'arena> DataTable<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            items: Vec::new(),
            groups: Vec::new(),
            signatures: HashMap::new(),
        }
    }

    pub fn add(&mut self, kind: DataKind, bytes: &[u8], line: u32) -> DataId {
        let id = DataId(self.items.len() as u32);
        let bytes: &'arena [u8] = self.arena.alloc_slice_copy(bytes);

        let existing = self.signatures.get(&(kind, bytes)).copied();
        let synonym_of = match existing {
            Some(group) => {
                let first = self.groups[group][0];
                self.groups[group].push(id);
                Some(first)
            }
            None => {
                self.signatures.insert((kind, bytes), self.groups.len());
                self.groups.push(vec![id]);
                None
            }
        };

        self.items.push(Data {
            id,
            kind,
            bytes,
            line,
            synonym_of,
        });
        id
    }

    pub fn get(&self, id: DataId) -> CompileResult<&Data<'arena>> {
        self.items
            .get(id.0 as usize)
            .ok_or(CompileError::UnknownData { id: id.0 })
    }

    /// Groups of items sharing one copy of their bytes.
    pub fn groups(&self) -> impl Iterator<Item = Vec<&Data<'arena>>> + '_ {
        self.groups.iter().map(move |group| {
            group
                .iter()
                .map(|id| &self.items[id.0 as usize])
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.groups.clear();
        self.signatures.clear();
    }

    pub fn create_listing(&self, out: &mut String) {
        if self.is_empty() {
            return;
        }
        out.push_str("Data:\n");
        for data in &self.items {
            out.push_str(&data.list_entry());
            out.push('\n');
        }
        out.push('\n');
    }
}
