//! Outcome selection
//!
//! Picks a bucket name for one spin:
//!
//! 1. Feedback-controlled win draw (RTP governor and fail-streak pity)
//! 2. Weight filtering by win/loss draw, progress tier and bet size
//! 3. Weighted pick with up to three ceiling-aware retries
//!
//! The weight vector is rebuilt on every call and never shared.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{BucketKind, DEFAULT_LOSS_BUCKET, SelectionConfig, Settings};
use crate::spin::PlayerState;

/// Weighted draws before falling back to the default loss bucket
pub const MAX_SELECTION_ATTEMPTS: usize = 3;

/// Spins played before the RTP governor engages
pub const RTP_WARMUP_SPINS: u64 = 50;

/// Top win tiers reserved for high rollers
pub const HIGH_ROLLER_TIERS: usize = 2;

/// Base-C multiplier for a session's `historical / target` RTP ratio
pub fn rtp_adjustment(rtp_ratio: f64) -> f64 {
    if rtp_ratio < 0.5 {
        2.5
    } else if rtp_ratio < 0.7 {
        1.8
    } else if rtp_ratio < 0.8 {
        1.2
    } else if rtp_ratio < 0.95 {
        1.1
    } else if rtp_ratio > 2.0 {
        0.3
    } else if rtp_ratio > 1.5 {
        0.5
    } else if rtp_ratio > 1.05 {
        0.6
    } else {
        1.0
    }
}

/// Base C after RTP feedback
pub fn effective_base_c(state: &PlayerState, settings: &Settings) -> f64 {
    let base_c = settings.base_c_value;
    if state.total_spins <= RTP_WARMUP_SPINS {
        return base_c;
    }
    let ratio = if settings.target_rtp > 0.0 {
        state.historical_rtp / settings.target_rtp
    } else {
        1.0
    };
    base_c * rtp_adjustment(ratio)
}

/// Probability that this spin is drawn as a win, in `[0, 1]`
pub fn win_probability(state: &PlayerState, settings: &Settings) -> f64 {
    let p = effective_base_c(state, settings) * (state.fail_streak as f64 + 1.0);
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Outcome of one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Chosen bucket
    pub bucket: String,
    /// Result of the win/loss draw
    pub win_draw: bool,
    pub win_probability: f64,
    /// Buckets rejected by the balance ceiling, in order
    pub rejected: Vec<String>,
}

impl Selection {
    fn fallback(win_draw: bool, win_probability: f64, rejected: Vec<String>) -> Self {
        Self {
            bucket: DEFAULT_LOSS_BUCKET.to_string(),
            win_draw,
            win_probability,
            rejected,
        }
    }
}

/// Bucket selector over one effective configuration
#[derive(Debug, Clone, Copy)]
pub struct OutcomeSelector<'a> {
    config: &'a SelectionConfig,
}

impl<'a> OutcomeSelector<'a> {
    pub fn new(config: &'a SelectionConfig) -> Self {
        Self { config }
    }

    /// Pick a bucket for `state`
    pub fn select<R: Rng + ?Sized>(&self, state: &PlayerState, rng: &mut R) -> Selection {
        let settings = self.config.settings();
        let buckets = self.config.buckets();

        let p = win_probability(state, settings);
        let win_draw = rng.random::<f64>() < p;

        let mut weights = self.eligible_weights(state, win_draw);
        let mut total: f64 = weights.iter().sum();

        if total <= 0.0 {
            if !win_draw {
                return Selection::fallback(win_draw, p, Vec::new());
            }
            // forced win with nothing eligible degrades to a loss
            weights = buckets
                .iter()
                .map(|b| if b.kind == BucketKind::Loss { b.weight } else { 0.0 })
                .collect();
            total = weights.iter().sum();
            if total <= 0.0 {
                return Selection::fallback(win_draw, p, Vec::new());
            }
        }

        let max_allowed_balance = state.initial_balance * settings.max_win_ratio;
        let mut rejected = Vec::new();

        for _ in 0..MAX_SELECTION_ATTEMPTS {
            let r = rng.random::<f64>() * total;
            let Some(idx) = weighted_pick(&weights, r) else {
                break;
            };

            let bucket = &buckets[idx];
            let max_potential_win = bucket.max_win * state.bet;
            if state.wallet_balance + max_potential_win > max_allowed_balance {
                log::trace!(
                    "Bucket {} rejected: balance {} + {} exceeds ceiling {}",
                    bucket.name,
                    state.wallet_balance,
                    max_potential_win,
                    max_allowed_balance
                );
                total -= weights[idx];
                weights[idx] = 0.0;
                rejected.push(bucket.name.clone());
                if total <= 0.0 {
                    break;
                }
                continue;
            }

            return Selection {
                bucket: bucket.name.clone(),
                win_draw,
                win_probability: p,
                rejected,
            };
        }

        Selection::fallback(win_draw, p, rejected)
    }

    /// Configured weights after win/loss, progress and high-roller filtering
    pub fn eligible_weights(&self, state: &PlayerState, win_draw: bool) -> Vec<f64> {
        let settings = self.config.settings();
        let buckets = self.config.buckets();

        let mut weights: Vec<f64> = buckets
            .iter()
            .map(|b| {
                let wanted = if win_draw { BucketKind::Win } else { BucketKind::Loss };
                if b.kind == wanted { b.weight } else { 0.0 }
            })
            .collect();

        if let Some(tier) = settings.progress_tier(state.total_spins) {
            if !tier.allows_all() {
                for (w, b) in weights.iter_mut().zip(buckets) {
                    if !tier.allows(&b.name) {
                        *w = 0.0;
                    }
                }
            }
        }

        if state.bet < settings.high_roller_threshold {
            for &idx in self.config.tiers().top(HIGH_ROLLER_TIERS) {
                weights[idx] = 0.0;
            }
        }

        weights
    }
}

/// First positive-weight index whose cumulative weight exceeds `r`
fn weighted_pick(weights: &[f64], r: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    let mut last = None;
    for (idx, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last = Some(idx);
        if r < cumulative {
            return Some(idx);
        }
    }
    // r landed on the float edge of the total
    last
}
