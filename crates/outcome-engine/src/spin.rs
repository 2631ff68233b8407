//! Player state and spin results

use serde::{Deserialize, Serialize};

use crate::grid::{ResultMatrix, StopCombination};
use crate::paytable::{Evaluation, WinningLine};

/// Caller-supplied session state for one spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub bet: f64,
    pub wallet_balance: f64,
    pub initial_balance: f64,
    pub max_historical_balance: f64,
    /// Session payout / wagered so far
    pub historical_rtp: f64,
    pub total_spins: u64,
    /// Consecutive non-winning spins
    pub fail_streak: u32,
    /// Batch simulation; silences per-spin logging
    pub simulation_mode: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            bet: 10.0,
            wallet_balance: 1000.0,
            initial_balance: 1000.0,
            max_historical_balance: 1000.0,
            historical_rtp: 0.0,
            total_spins: 0,
            fail_streak: 0,
            simulation_mode: false,
        }
    }
}

impl PlayerState {
    /// Fresh session with `balance` as both wallet and starting balance
    pub fn new(bet: f64, balance: f64) -> Self {
        Self {
            bet,
            wallet_balance: balance,
            initial_balance: balance,
            max_historical_balance: balance,
            ..Self::default()
        }
    }
}

/// Complete spin result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinResult {
    pub stops: StopCombination,
    pub matrix: ResultMatrix,
    /// Line wins scaled by the bet
    pub winning_lines: Vec<WinningLine>,
    pub total_payout_amount: f64,
    pub is_win: bool,
    /// Bucket the outcome was drawn from
    pub bucket_name: String,
    /// `total_payout_amount - bet`
    pub balance_delta: f64,
    pub new_fail_streak: u32,
    pub is_near_miss: bool,
}

impl SpinResult {
    /// Scale an evaluation by `bet` and settle the fail streak
    pub fn settle(
        stops: StopCombination,
        matrix: ResultMatrix,
        evaluation: Evaluation,
        bucket_name: String,
        bet: f64,
        fail_streak: u32,
    ) -> Self {
        let total_payout_amount = evaluation.total_multiplier * bet;
        let winning_lines = evaluation
            .winning_lines
            .into_iter()
            .map(|line| WinningLine {
                amount: line.amount * bet,
                ..line
            })
            .collect();
        let is_win = total_payout_amount > 0.0;

        Self {
            stops,
            matrix,
            winning_lines,
            total_payout_amount,
            is_win,
            bucket_name,
            balance_delta: total_payout_amount - bet,
            new_fail_streak: if is_win { 0 } else { fail_streak.saturating_add(1) },
            is_near_miss: evaluation.is_near_miss,
        }
    }

    /// Payout as a multiple of the bet
    pub fn win_ratio(&self, bet: f64) -> f64 {
        if bet > 0.0 {
            self.total_payout_amount / bet
        } else {
            0.0
        }
    }
}
