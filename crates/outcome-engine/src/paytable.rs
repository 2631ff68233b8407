//! Paylines, pay table and win evaluation

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::grid::{ResultMatrix, StopCombination};
use crate::symbols::{REELS, ROWS, ReelStrip, SymbolId, SymbolSet};

/// Minimum run length that can pay
pub const MIN_MATCH: u8 = 3;

/// A payline: one `(row, col)` cell per reel, read left to right
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payline {
    pub id: u32,
    pub cells: [(u8, u8); REELS],
}

impl Payline {
    /// Straight line across one row
    pub fn straight(id: u32, row: u8) -> Self {
        let mut cells = [(row, 0); REELS];
        for (col, cell) in cells.iter_mut().enumerate() {
            cell.1 = col as u8;
        }
        Self { id, cells }
    }

    /// Line from per-reel row positions (e.g., `[0, 1, 2, 1, 0]` for a "V")
    pub fn from_rows(id: u32, rows: [u8; REELS]) -> Self {
        let mut cells = [(0, 0); REELS];
        for (col, (cell, row)) in cells.iter_mut().zip(rows).enumerate() {
            *cell = (row, col as u8);
        }
        Self { id, cells }
    }

    /// Every cell inside the 3×5 grid
    pub fn is_valid(&self) -> bool {
        self.cells
            .iter()
            .all(|&(row, col)| (row as usize) < ROWS && (col as usize) < REELS)
    }
}

/// Line pays per symbol and match count
#[derive(Debug, Clone)]
pub struct PayTable {
    paylines: Vec<Payline>,
    /// Indexed by symbol handle, then by match count (0..=5)
    pays: Vec<[f64; REELS + 1]>,
}

impl PayTable {
    pub fn new(paylines: Vec<Payline>, symbol_count: usize) -> Self {
        Self {
            paylines,
            pays: vec![[0.0; REELS + 1]; symbol_count],
        }
    }

    /// Set the multiplier for `count` of `symbol` on a line
    pub fn set_pay(&mut self, symbol: SymbolId, count: u8, multiplier: f64) {
        let idx = symbol.index();
        if idx >= self.pays.len() {
            self.pays.resize(idx + 1, [0.0; REELS + 1]);
        }
        if let Some(slot) = self.pays[idx].get_mut(count as usize) {
            *slot = multiplier;
        }
    }

    /// Multiplier for a run, 0 when unpaid
    pub fn pay(&self, symbol: SymbolId, count: u8) -> f64 {
        self.pays
            .get(symbol.index())
            .and_then(|p| p.get(count as usize))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn paylines(&self) -> &[Payline] {
        &self.paylines
    }
}

/// A paying line. `amount` is a multiplier until scaled by the bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinningLine {
    pub line_id: u32,
    /// Matched symbol
    pub symbol_id: SymbolId,
    /// Display name of the matched symbol
    pub symbol: String,
    pub match_count: u8,
    pub amount: f64,
}

/// Result of evaluating a grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub total_multiplier: f64,
    pub winning_lines: Vec<WinningLine>,
    pub is_near_miss: bool,
}

impl Evaluation {
    pub fn is_win(&self) -> bool {
        self.total_multiplier > 0.0
    }
}

/// Stateless view that turns stops into grids and grids into pays
#[derive(Debug, Clone, Copy)]
pub struct PaylineEvaluator<'a> {
    symbols: &'a SymbolSet,
    reels: &'a [ReelStrip],
    reel_length: usize,
    paytable: &'a PayTable,
}

impl<'a> PaylineEvaluator<'a> {
    pub fn new(config: &'a GameConfig) -> Self {
        Self {
            symbols: &config.symbols,
            reels: &config.reels,
            reel_length: config.reel_length,
            paytable: &config.paytable,
        }
    }

    /// Visible grid for a stop combination.
    ///
    /// Cell `(r, c)` is `reels[c][(stops[c] + r) mod reel_length]`; missing
    /// reels and short strips show the filler symbol.
    pub fn matrix_of(&self, stops: &StopCombination) -> ResultMatrix {
        let filler = self.symbols.filler_id();
        let mut matrix = ResultMatrix::filled(filler);
        if self.reel_length == 0 {
            return matrix;
        }
        for col in 0..REELS {
            let Some(strip) = self.reels.get(col) else {
                continue;
            };
            let stop = stops.stop(col) as usize;
            for row in 0..ROWS {
                let idx = (stop + row) % self.reel_length;
                matrix.set(row, col, strip.get(idx).unwrap_or(filler));
            }
        }
        matrix
    }

    /// Line pays and the near-miss flag for a grid
    pub fn evaluate(&self, matrix: &ResultMatrix) -> Evaluation {
        let mut total_multiplier = 0.0;
        let mut winning_lines = Vec::new();

        for payline in self.paytable.paylines() {
            let Some((target, count)) = self.match_line(matrix, payline) else {
                continue;
            };
            if count < MIN_MATCH {
                continue;
            }
            let multiplier = self.paytable.pay(target, count);
            if multiplier <= 0.0 {
                continue;
            }
            total_multiplier += multiplier;
            winning_lines.push(WinningLine {
                line_id: payline.id,
                symbol_id: target,
                symbol: self.symbols.name(target).to_string(),
                match_count: count,
                amount: multiplier,
            });
        }

        let is_near_miss = self
            .symbols
            .scatter_id()
            .is_some_and(|scatter| matrix.count(scatter) == 2);

        Evaluation {
            total_multiplier,
            winning_lines,
            is_near_miss,
        }
    }

    /// Evaluate the grid a stop combination shows
    pub fn evaluate_stops(&self, stops: &StopCombination) -> Evaluation {
        self.evaluate(&self.matrix_of(stops))
    }

    /// Match target and contiguous run length from the leftmost reel
    fn match_line(&self, matrix: &ResultMatrix, payline: &Payline) -> Option<(SymbolId, u8)> {
        let mut line = [SymbolId(0); REELS];
        for (slot, &(row, col)) in line.iter_mut().zip(payline.cells.iter()) {
            *slot = matrix.get(row as usize, col as usize)?;
        }
        Some(match_run(&line, self.symbols.wild_id()))
    }
}

/// Target symbol and run length of a line.
///
/// A leading wild takes the first following non-wild symbol as its target;
/// an all-wild line matches the wild itself.
pub fn match_run(line: &[SymbolId], wild: Option<SymbolId>) -> (SymbolId, u8) {
    let Some(&first) = line.first() else {
        return (SymbolId(0), 0);
    };
    let is_wild = |s: SymbolId| wild == Some(s);

    let target = if is_wild(first) {
        line.iter().copied().find(|&s| !is_wild(s)).unwrap_or(first)
    } else {
        first
    };

    let count = line
        .iter()
        .take_while(|&&s| s == target || is_wild(s))
        .count();
    (target, count as u8)
}

impl GameConfig {
    pub fn evaluator(&self) -> PaylineEvaluator<'_> {
        PaylineEvaluator::new(self)
    }
}
