//! Stop combinations and the visible result grid

use serde::{Deserialize, Serialize};

use crate::symbols::{REELS, ROWS, SymbolId, SymbolSet};

/// Top-visible strip offset for each reel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopCombination(pub [u32; REELS]);

impl StopCombination {
    pub fn new(stops: [u32; REELS]) -> Self {
        Self(stops)
    }

    pub fn stops(&self) -> &[u32; REELS] {
        &self.0
    }

    /// Offset for one reel
    pub fn stop(&self, reel: usize) -> u32 {
        self.0[reel]
    }
}

impl From<[u32; REELS]> for StopCombination {
    fn from(stops: [u32; REELS]) -> Self {
        Self(stops)
    }
}

/// 3×5 grid of symbols, row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultMatrix {
    pub cells: [[SymbolId; REELS]; ROWS],
}

impl ResultMatrix {
    /// Grid filled with one symbol
    pub fn filled(symbol: SymbolId) -> Self {
        Self {
            cells: [[symbol; REELS]; ROWS],
        }
    }

    pub fn from_rows(cells: [[SymbolId; REELS]; ROWS]) -> Self {
        Self { cells }
    }

    /// Symbol at `(row, col)`, `None` outside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<SymbolId> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, symbol: SymbolId) {
        self.cells[row][col] = symbol;
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.cells.iter().flat_map(|row| row.iter().copied())
    }

    /// Occurrences of `symbol` anywhere on the grid
    pub fn count(&self, symbol: SymbolId) -> usize {
        self.iter().filter(|&s| s == symbol).count()
    }

    /// Row-major symbol identifiers as configured
    pub fn codes(&self, symbols: &SymbolSet) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|&s| symbols.code(s).to_string()).collect())
            .collect()
    }
}
