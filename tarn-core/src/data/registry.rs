//! Interns symbol strings into dense ids.

use std::collections::HashMap;

use crate::core::{CapacityError, SymbolId, MAX_SYMBOLS};

/// String-to-dense-id symbol table.
///
/// Registration happens single-threaded during initialization; afterwards
/// the registry is shared read-only (typically behind an `Arc`), so lookups
/// need no synchronization. Ids are never reused or removed.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    by_name: HashMap<String, SymbolId>,
    names: Vec<String>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::with_capacity(MAX_SYMBOLS),
            names: Vec::with_capacity(MAX_SYMBOLS),
        }
    }

    /// Return the existing id for `name`, or assign the next one.
    pub fn register(&mut self, name: &str) -> Result<SymbolId, CapacityError> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        if self.names.len() >= MAX_SYMBOLS {
            return Err(CapacityError { limit: MAX_SYMBOLS });
        }
        let id = self.names.len() as SymbolId;
        self.by_name.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        Ok(id)
    }

    pub fn id_of(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    /// Display string for a registered id. Panics on an id that was never
    /// handed out, which indicates a wiring bug rather than runtime input.
    pub fn name_of(&self, id: SymbolId) -> &str {
        &self.names[id as usize]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
