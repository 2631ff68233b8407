//! Symbol definitions and reel strips

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of reels (columns) on the machine
pub const REELS: usize = 5;

/// Number of visible rows per reel
pub const ROWS: usize = 3;

/// Compact symbol handle, an index into a [`SymbolSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u16);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Symbol type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SymbolType {
    /// Regular paying symbol
    Regular = 0,
    /// Wild - substitutes for others on a payline
    Wild = 1,
    /// Scatter - counted anywhere on the grid
    Scatter = 2,
}

/// A symbol definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Interned handle
    pub id: SymbolId,
    /// Configured identifier (e.g., "H1", "WILD", "SCATTER")
    pub code: String,
    /// Display name (e.g., "Seven")
    pub name: String,
    /// Symbol type
    pub symbol_type: SymbolType,
}

/// Interned symbol table with the designated wild, scatter and filler symbols
#[derive(Debug, Clone)]
pub struct SymbolSet {
    symbols: Vec<Symbol>,
    by_code: HashMap<String, SymbolId>,
    wild: Option<SymbolId>,
    scatter: Option<SymbolId>,
    filler: SymbolId,
}

impl SymbolSet {
    /// Build a table from `(code, display name)` pairs in document order.
    ///
    /// `filler_code` is registered as an extra regular symbol when the
    /// document does not define it, so the filler always resolves.
    pub fn new<'a, I>(entries: I, wild_code: &str, scatter_code: &str, filler_code: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self {
            symbols: Vec::new(),
            by_code: HashMap::new(),
            wild: None,
            scatter: None,
            filler: SymbolId(0),
        };

        for (code, name) in entries {
            let symbol_type = if code == wild_code {
                SymbolType::Wild
            } else if code == scatter_code {
                SymbolType::Scatter
            } else {
                SymbolType::Regular
            };
            set.push(code, name, symbol_type);
        }

        set.filler = match set.by_code.get(filler_code) {
            Some(&id) => id,
            None => set.push(filler_code, filler_code, SymbolType::Regular),
        };
        set
    }

    fn push(&mut self, code: &str, name: &str, symbol_type: SymbolType) -> SymbolId {
        if let Some(&id) = self.by_code.get(code) {
            return id;
        }
        let id = SymbolId(self.symbols.len() as u16);
        match symbol_type {
            SymbolType::Wild => self.wild = Some(id),
            SymbolType::Scatter => self.scatter = Some(id),
            SymbolType::Regular => {}
        }
        self.symbols.push(Symbol {
            id,
            code: code.to_string(),
            name: name.to_string(),
            symbol_type,
        });
        self.by_code.insert(code.to_string(), id);
        id
    }

    /// Resolve a configured identifier
    pub fn lookup(&self, code: &str) -> Option<SymbolId> {
        self.by_code.get(code).copied()
    }

    /// Get symbol by handle
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Configured identifier for a handle, `"?"` when unknown
    pub fn code(&self, id: SymbolId) -> &str {
        self.get(id).map(|s| s.code.as_str()).unwrap_or("?")
    }

    /// Display name for a handle, `"Unknown"` when unknown
    pub fn name(&self, id: SymbolId) -> &str {
        self.get(id).map(|s| s.name.as_str()).unwrap_or("Unknown")
    }

    pub fn wild_id(&self) -> Option<SymbolId> {
        self.wild
    }

    pub fn scatter_id(&self) -> Option<SymbolId> {
        self.scatter
    }

    /// Symbol shown for out-of-range reel positions
    pub fn filler_id(&self) -> SymbolId {
        self.filler
    }

    pub fn is_wild(&self, id: SymbolId) -> bool {
        self.wild == Some(id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

/// A physical reel strip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelStrip {
    /// Symbol handles in strip order
    pub symbols: Vec<SymbolId>,
    /// Reel index
    pub reel_index: u8,
}

impl ReelStrip {
    /// Create a new reel strip
    pub fn new(reel_index: u8, symbols: Vec<SymbolId>) -> Self {
        Self { symbols, reel_index }
    }

    /// Symbol at an already-wrapped strip index
    pub fn get(&self, index: usize) -> Option<SymbolId> {
        self.symbols.get(index).copied()
    }

    /// Get total strip length
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
