//! Batch spin simulation
//!
//! Plays a long session against one [`OutcomeEngine`], threading balance,
//! session RTP and fail streak from spin to spin exactly as a client would,
//! and reduces the run to a [`SimulationReport`].

use std::collections::BTreeMap;

use outcome_engine::{OutcomeEngine, PlayerState, SelectionConfig, SpinResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on spins per run
pub const MAX_SPINS: u64 = 1_000_000;

/// Win ratio counted as a big win
pub const BIG_WIN_RATIO: f64 = 50.0;

/// Win ratio counted as a mega win
pub const MEGA_WIN_RATIO: f64 = 100.0;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Bet must be a positive number, got {0}")]
    InvalidBet(f64),

    #[error("Initial balance must be a non-negative number, got {0}")]
    InvalidBalance(f64),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Clamped to `1..=MAX_SPINS`
    pub spins: u64,
    pub bet: f64,
    /// Defaults to `spins × bet`
    pub initial_balance: Option<f64>,
    /// Record a history point every n spins; 0 disables history
    pub history_every: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            spins: 1000,
            bet: 10.0,
            initial_balance: None,
            history_every: 1,
        }
    }
}

impl SimulationParams {
    pub fn new(spins: u64, bet: f64) -> Self {
        Self {
            spins,
            bet,
            ..Self::default()
        }
    }

    /// Spin count after clamping
    pub fn effective_spins(&self) -> u64 {
        self.spins.clamp(1, MAX_SPINS)
    }

    fn validate(&self) -> Result<(), SimulationError> {
        if !self.bet.is_finite() || self.bet <= 0.0 {
            return Err(SimulationError::InvalidBet(self.bet));
        }
        if let Some(balance) = self.initial_balance {
            if !balance.is_finite() || balance < 0.0 {
                return Err(SimulationError::InvalidBalance(balance));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// One sampled point of the balance trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub spin: u64,
    pub balance: f64,
    pub rtp: f64,
}

/// Aggregate statistics over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Winning spins / spins
    pub hit_rate: f64,
    /// Population standard deviation of payout / bet
    pub volatility: f64,
    /// Largest drop from a running balance peak
    pub max_drawdown: f64,
    /// Mean payout over winning spins
    pub average_win: f64,
    /// Mean payout / bet over winning spins
    pub average_multiplier: f64,
    pub big_wins: u64,
    pub mega_wins: u64,
    pub max_win: f64,
    pub max_multiplier: f64,
    /// Spins drawn from each bucket
    pub bucket_hits: BTreeMap<String, u64>,
}

/// Result of a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub spins: u64,
    pub bet: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub net_profit: f64,
    pub total_wagered: f64,
    pub total_won: f64,
    /// Total won / total wagered
    pub total_rtp: f64,
    pub history: Vec<HistoryPoint>,
    pub stats: SimulationStats,
}

/// Running accumulator for [`SimulationStats`]
#[derive(Debug, Default)]
struct StatsAccumulator {
    spins: u64,
    wins: u64,
    won_on_wins: f64,
    multiplier_on_wins: f64,
    // Welford over payout / bet, losses included
    mean: f64,
    m2: f64,
    peak: f64,
    max_drawdown: f64,
    big_wins: u64,
    mega_wins: u64,
    max_win: f64,
    max_multiplier: f64,
    bucket_hits: BTreeMap<String, u64>,
}

impl StatsAccumulator {
    fn new(initial_balance: f64) -> Self {
        Self {
            peak: initial_balance,
            ..Self::default()
        }
    }

    fn record(&mut self, result: &SpinResult, bet: f64, balance: f64) {
        self.spins += 1;
        let ratio = result.win_ratio(bet);

        let delta = ratio - self.mean;
        self.mean += delta / self.spins as f64;
        self.m2 += delta * (ratio - self.mean);

        if result.is_win {
            self.wins += 1;
            self.won_on_wins += result.total_payout_amount;
            self.multiplier_on_wins += ratio;
        }
        if ratio >= BIG_WIN_RATIO {
            self.big_wins += 1;
        }
        if ratio >= MEGA_WIN_RATIO {
            self.mega_wins += 1;
        }
        self.max_win = self.max_win.max(result.total_payout_amount);
        self.max_multiplier = self.max_multiplier.max(ratio);

        self.peak = self.peak.max(balance);
        self.max_drawdown = self.max_drawdown.max(self.peak - balance);

        *self.bucket_hits.entry(result.bucket_name.clone()).or_default() += 1;
    }

    fn finish(self) -> SimulationStats {
        let per_win = |total: f64| if self.wins > 0 { total / self.wins as f64 } else { 0.0 };
        SimulationStats {
            hit_rate: if self.spins > 0 {
                self.wins as f64 / self.spins as f64
            } else {
                0.0
            },
            volatility: if self.spins > 0 {
                (self.m2 / self.spins as f64).sqrt()
            } else {
                0.0
            },
            max_drawdown: self.max_drawdown,
            average_win: per_win(self.won_on_wins),
            average_multiplier: per_win(self.multiplier_on_wins),
            big_wins: self.big_wins,
            mega_wins: self.mega_wins,
            max_win: self.max_win,
            max_multiplier: self.max_multiplier,
            bucket_hits: self.bucket_hits,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Batch runner over a built engine
pub struct Simulation<'e> {
    engine: &'e OutcomeEngine,
    selection: Option<&'e SelectionConfig>,
}

impl<'e> Simulation<'e> {
    pub fn new(engine: &'e OutcomeEngine) -> Self {
        Self {
            engine,
            selection: None,
        }
    }

    /// Run with caller-supplied selection settings instead of the engine's
    pub fn with_selection(mut self, selection: &'e SelectionConfig) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Play `params.spins` spins and report
    pub fn run<R: Rng + ?Sized>(
        &self,
        params: &SimulationParams,
        rng: &mut R,
    ) -> Result<SimulationReport, SimulationError> {
        params.validate()?;

        let spins = params.effective_spins();
        let bet = params.bet;
        let initial_balance = params.initial_balance.unwrap_or(spins as f64 * bet);
        let selection = self.selection.unwrap_or(&self.engine.config().selection);

        log::info!("Simulating {spins} spins at bet {bet}, initial balance {initial_balance}");

        let mut state = PlayerState::new(bet, initial_balance);
        state.simulation_mode = true;

        let mut total_wagered = 0.0;
        let mut total_won = 0.0;
        let mut history = Vec::new();
        let mut stats = StatsAccumulator::new(initial_balance);

        for i in 0..spins {
            state.total_spins = i;
            state.historical_rtp = if total_wagered > 0.0 {
                total_won / total_wagered
            } else {
                0.0
            };

            let result = self.engine.spin_with(&state, selection, rng);

            state.wallet_balance += result.balance_delta;
            state.max_historical_balance = state.max_historical_balance.max(state.wallet_balance);
            state.fail_streak = result.new_fail_streak;
            total_wagered += bet;
            total_won += result.total_payout_amount;

            stats.record(&result, bet, state.wallet_balance);

            let spin = i + 1;
            if params.history_every > 0 && (spin % params.history_every == 0 || spin == spins) {
                history.push(HistoryPoint {
                    spin,
                    balance: state.wallet_balance,
                    rtp: total_won / total_wagered,
                });
            }
        }

        let total_rtp = if total_wagered > 0.0 {
            total_won / total_wagered
        } else {
            0.0
        };
        log::info!(
            "Simulation finished: RTP {:.4}, final balance {:.2}",
            total_rtp,
            state.wallet_balance
        );

        Ok(SimulationReport {
            spins,
            bet,
            initial_balance,
            final_balance: state.wallet_balance,
            net_profit: state.wallet_balance - initial_balance,
            total_wagered,
            total_won,
            total_rtp,
            history,
            stats: stats.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use outcome_engine::GameConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn engine() -> OutcomeEngine {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        OutcomeEngine::with_builder(
            GameConfig::classic().unwrap(),
            |b| b.with_exhaustive_limit(0).with_sample_count(30_000),
            &mut rng,
        )
    }

    #[test]
    fn test_totals_are_consistent() {
        let engine = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let params = SimulationParams::new(2_000, 10.0);
        let report = Simulation::new(&engine).run(&params, &mut rng).unwrap();

        assert_eq!(report.spins, 2_000);
        assert_relative_eq!(report.initial_balance, 20_000.0);
        assert_relative_eq!(report.total_wagered, 20_000.0);
        assert_relative_eq!(
            report.final_balance,
            report.initial_balance - report.total_wagered + report.total_won,
            epsilon = 1e-6
        );
        assert_relative_eq!(report.net_profit, report.final_balance - report.initial_balance);
        assert_relative_eq!(report.total_rtp, report.total_won / report.total_wagered);
        assert_eq!(report.stats.bucket_hits.values().sum::<u64>(), 2_000);
        assert!(report.stats.hit_rate > 0.0 && report.stats.hit_rate < 1.0);
        assert!(report.stats.max_drawdown >= 0.0);
        assert!(report.stats.mega_wins <= report.stats.big_wins);
    }

    #[test]
    fn test_history_sampling_keeps_last_spin() {
        let engine = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let params = SimulationParams {
            spins: 250,
            history_every: 100,
            ..SimulationParams::default()
        };
        let report = Simulation::new(&engine).run(&params, &mut rng).unwrap();

        let spins: Vec<u64> = report.history.iter().map(|p| p.spin).collect();
        assert_eq!(spins, vec![100, 200, 250]);
        let last = report.history.last().unwrap();
        assert_relative_eq!(last.balance, report.final_balance);
        assert_relative_eq!(last.rtp, report.total_rtp);
    }

    #[test]
    fn test_spin_count_is_clamped() {
        assert_eq!(SimulationParams::new(0, 1.0).effective_spins(), 1);
        assert_eq!(SimulationParams::new(5_000_000, 1.0).effective_spins(), MAX_SPINS);
    }

    #[test]
    fn test_invalid_bet_rejected() {
        let engine = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = Simulation::new(&engine)
            .run(&SimulationParams::new(10, 0.0), &mut rng)
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidBet(_)));
    }

    #[test]
    fn test_same_seed_same_report() {
        let engine = engine();
        let params = SimulationParams::new(500, 5.0);
        let a = Simulation::new(&engine)
            .run(&params, &mut ChaCha8Rng::seed_from_u64(77))
            .unwrap();
        let b = Simulation::new(&engine)
            .run(&params, &mut ChaCha8Rng::seed_from_u64(77))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_volatility_of_constant_payout_is_zero() {
        let mut acc = StatsAccumulator::new(100.0);
        let result = |payout: f64| SpinResult {
            stops: outcome_engine::StopCombination([0; 5]),
            matrix: outcome_engine::ResultMatrix::filled(outcome_engine::SymbolId(0)),
            winning_lines: Vec::new(),
            total_payout_amount: payout,
            is_win: payout > 0.0,
            bucket_name: "Win_Tier_1".into(),
            balance_delta: payout - 10.0,
            new_fail_streak: 0,
            is_near_miss: false,
        };
        acc.record(&result(20.0), 10.0, 110.0);
        acc.record(&result(20.0), 10.0, 120.0);
        let stats = acc.finish();
        assert_relative_eq!(stats.volatility, 0.0);
        assert_relative_eq!(stats.hit_rate, 1.0);
        assert_relative_eq!(stats.average_multiplier, 2.0);
        assert_eq!(stats.bucket_hits["Win_Tier_1"], 2);
    }
}
