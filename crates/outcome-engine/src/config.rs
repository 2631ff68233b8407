//! Engine configuration
//!
//! [`GameConfig`] is the validated, immutable form of a configuration
//! document. Only its [`SelectionConfig`] part (settings, bucket weights and
//! ranges) may be swapped at spin time; the reel strips, paylines and pay
//! table are fixed when the bucket store is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parser::ConfigParser;
use crate::paytable::PayTable;
use crate::symbols::{REELS, ReelStrip, SymbolSet};

/// Default loss bucket, also the fallback for every degenerate selection
pub const DEFAULT_LOSS_BUCKET: &str = "Loss_Random";

/// Loss bucket for zero-pay grids with exactly two scatters
pub const NEAR_MISS_BUCKET: &str = "Loss_NearMiss";

/// Progress tier wildcard allowing every bucket
pub const ALL_BUCKETS: &str = "ALL";

/// Tiers whose `max_win` reaches this value have no upper bound
pub const OPEN_ENDED_MAX_WIN: f64 = 1000.0;

const BUNDLED_CLASSIC: &str = include_str!("../data/classic_5x3.json");

// ═══════════════════════════════════════════════════════════════════════════════
// BUCKETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a bucket holds winning or losing outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Win,
    Loss,
}

impl BucketKind {
    /// Infer the kind from a bucket name (`Loss_*` buckets lose)
    pub fn infer(name: &str) -> Self {
        if name.starts_with("Loss_") {
            BucketKind::Loss
        } else {
            BucketKind::Win
        }
    }
}

/// A named bucket with its payout range and selection weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDef {
    pub name: String,
    pub kind: BucketKind,
    /// Inclusive lower bound on the total multiplier
    pub min_win: f64,
    /// Exclusive upper bound on the total multiplier
    pub max_win: f64,
    pub weight: f64,
}

impl BucketDef {
    pub fn new(name: impl Into<String>, kind: BucketKind, min_win: f64, max_win: f64, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            min_win,
            max_win,
            weight,
        }
    }

    /// Win tier shorthand
    pub fn win(name: impl Into<String>, min_win: f64, max_win: f64, weight: f64) -> Self {
        Self::new(name, BucketKind::Win, min_win, max_win, weight)
    }

    /// Loss bucket shorthand
    pub fn loss(name: impl Into<String>, weight: f64) -> Self {
        Self::new(name, BucketKind::Loss, 0.0, 0.0, weight)
    }

    pub fn is_win(&self) -> bool {
        self.kind == BucketKind::Win
    }

    pub fn is_open_ended(&self) -> bool {
        self.max_win >= OPEN_ENDED_MAX_WIN
    }

    /// Half-open range test `[min_win, max_win)`
    pub fn contains(&self, multiplier: f64) -> bool {
        self.min_win <= multiplier && multiplier < self.max_win
    }

    /// `min_win == max_win`: no multiplier falls inside
    pub fn is_empty_range(&self) -> bool {
        self.min_win >= self.max_win
    }

    /// Range test including the open upper bound of large tiers
    pub fn admits(&self, multiplier: f64) -> bool {
        self.contains(multiplier) || (self.is_open_ended() && multiplier >= self.min_win)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBucket {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !self.min_win.is_finite() || !self.max_win.is_finite() {
            return Err(invalid("win range must be finite"));
        }
        if self.min_win > self.max_win {
            return Err(invalid("min_win exceeds max_win"));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(invalid("weight must be a non-negative number"));
        }
        Ok(())
    }
}

/// Win tiers in classification priority order (ascending `min_win`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierRules {
    order: Vec<usize>,
}

impl TierRules {
    /// Sort the win tiers of `buckets` and reject overlapping ranges
    pub fn normalize(buckets: &[BucketDef]) -> Result<Self, ConfigError> {
        let mut order: Vec<usize> = buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_win())
            .map(|(i, _)| i)
            .collect();

        let declared = order.clone();
        order.sort_by(|&a, &b| {
            let (a, b) = (&buckets[a], &buckets[b]);
            a.min_win.total_cmp(&b.min_win).then(a.max_win.total_cmp(&b.max_win))
        });
        if order != declared {
            log::warn!("Win tiers declared out of range order; classifying by ascending min_win");
        }

        // empty ranges hold nothing and cannot overlap
        let mut reach: Option<&BucketDef> = None;
        for &idx in &order {
            let tier = &buckets[idx];
            if tier.is_empty_range() {
                continue;
            }
            if let Some(lower) = reach {
                if tier.min_win < lower.max_win {
                    return Err(ConfigError::OverlappingTiers {
                        lower: lower.name.clone(),
                        upper: tier.name.clone(),
                    });
                }
            }
            if reach.is_none_or(|lower| tier.max_win > lower.max_win) {
                reach = Some(tier);
            }
        }

        Ok(Self { order })
    }

    /// Index of the tier owning `multiplier`.
    ///
    /// An exact `[min_win, max_win)` hit wins first, then the open-ended tier
    /// with the greatest `min_win` at or below the multiplier, then the
    /// lowest non-empty tier.
    pub fn classify(&self, buckets: &[BucketDef], multiplier: f64) -> Option<usize> {
        if let Some(&idx) = self.order.iter().find(|&&i| buckets[i].contains(multiplier)) {
            return Some(idx);
        }
        if let Some(&idx) = self
            .order
            .iter()
            .rev()
            .find(|&&i| buckets[i].is_open_ended() && multiplier >= buckets[i].min_win)
        {
            return Some(idx);
        }
        self.order
            .iter()
            .find(|&&i| !buckets[i].is_empty_range())
            .or(self.order.first())
            .copied()
    }

    /// Tier indices from lowest to highest
    pub fn ascending(&self) -> &[usize] {
        &self.order
    }

    /// The `n` highest tiers
    pub fn top(&self, n: usize) -> &[usize] {
        &self.order[self.order.len().saturating_sub(n)..]
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Spin-count gate restricting eligible buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressTier {
    pub min_spins: u64,
    #[serde(default = "default_allowed_buckets")]
    pub allowed_buckets: Vec<String>,
}

fn default_allowed_buckets() -> Vec<String> {
    vec![ALL_BUCKETS.to_string()]
}

impl ProgressTier {
    pub fn allows_all(&self) -> bool {
        self.allowed_buckets.iter().any(|b| b == ALL_BUCKETS)
    }

    pub fn allows(&self, bucket: &str) -> bool {
        self.allows_all() || self.allowed_buckets.iter().any(|b| b == bucket)
    }
}

/// Tunable selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base win probability before feedback scaling
    #[serde(default = "default_base_c")]
    pub base_c_value: f64,
    /// Long-run payback the governor steers toward
    #[serde(default = "default_target_rtp")]
    pub target_rtp: f64,
    /// Bets below this never reach the two top tiers
    #[serde(default = "default_high_roller_threshold")]
    pub high_roller_threshold: f64,
    /// Balance ceiling as a multiple of the initial balance
    #[serde(default = "default_max_win_ratio")]
    pub max_win_ratio: f64,
    #[serde(default)]
    pub progress_tiers: Vec<ProgressTier>,
}

fn default_base_c() -> f64 {
    0.05
}

fn default_target_rtp() -> f64 {
    0.97
}

fn default_high_roller_threshold() -> f64 {
    50.0
}

fn default_max_win_ratio() -> f64 {
    1.2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_c_value: default_base_c(),
            target_rtp: default_target_rtp(),
            high_roller_threshold: default_high_roller_threshold(),
            max_win_ratio: default_max_win_ratio(),
            progress_tiers: Vec::new(),
        }
    }
}

impl Settings {
    /// Progress tier in force after `total_spins`
    pub fn progress_tier(&self, total_spins: u64) -> Option<&ProgressTier> {
        let mut tiers: Vec<&ProgressTier> = self.progress_tiers.iter().collect();
        tiers.sort_by_key(|t| t.min_spins);
        tiers.into_iter().take_while(|t| total_spins >= t.min_spins).last()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("base_c_value", self.base_c_value),
            ("target_rtp", self.target_rtp),
            ("high_roller_threshold", self.high_roller_threshold),
            ("max_win_ratio", self.max_win_ratio),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "settings.{field} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTION CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// The selector-facing part of a configuration (the "effective" config)
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    buckets: Vec<BucketDef>,
    tiers: TierRules,
    settings: Settings,
}

impl SelectionConfig {
    pub fn new(buckets: Vec<BucketDef>, settings: Settings) -> Result<Self, ConfigError> {
        for (i, bucket) in buckets.iter().enumerate() {
            bucket.validate()?;
            if buckets[..i].iter().any(|b| b.name == bucket.name) {
                return Err(ConfigError::InvalidBucket {
                    name: bucket.name.clone(),
                    reason: "duplicate bucket name".to_string(),
                });
            }
        }
        settings.validate()?;
        let tiers = TierRules::normalize(&buckets)?;
        if tiers.is_empty() {
            return Err(ConfigError::Validation("at least one win tier bucket is required".into()));
        }
        Ok(Self {
            buckets,
            tiers,
            settings,
        })
    }

    /// Same buckets, different settings
    pub fn with_settings(&self, settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            ..self.clone()
        })
    }

    /// Bucket definitions in configured order
    pub fn buckets(&self) -> &[BucketDef] {
        &self.buckets
    }

    pub fn bucket(&self, name: &str) -> Option<&BucketDef> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn tiers(&self) -> &TierRules {
        &self.tiers
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bucket name for a non-zero total multiplier
    pub fn classify_win(&self, multiplier: f64) -> Option<&str> {
        self.tiers
            .classify(&self.buckets, multiplier)
            .map(|i| self.buckets[i].name.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete validated configuration
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub symbols: SymbolSet,
    /// One strip per reel
    pub reels: Vec<ReelStrip>,
    /// Stop positions per reel; drives wraparound and the stop space size
    pub reel_length: usize,
    pub paytable: PayTable,
    pub selection: SelectionConfig,
}

impl GameConfig {
    /// Bundled 5×3, 20-line reference game
    pub fn classic() -> Result<Self, ConfigError> {
        ConfigParser::new().parse_json(BUNDLED_CLASSIC)
    }

    /// Load a JSON or YAML document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigParser::new().parse_path(path)
    }

    /// Number of distinct stop combinations (`reel_length ^ 5`)
    pub fn stop_space(&self) -> u128 {
        (self.reel_length as u128).pow(REELS as u32)
    }
}
