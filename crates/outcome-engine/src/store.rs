//! Bucket store construction
//!
//! The store is built once per engine: every stop combination (or a uniform
//! sample of them when the space is large) is evaluated, classified into a
//! bucket and appended to that bucket's capped pool.
//!
//! ```text
//! StopCounter ──> PaylineEvaluator ──> Classifier ──> BucketFill (capped)
//!   (rayon, one chunk per first-reel stop)      merged in counter order
//! ```

use std::time::Instant;

use indexmap::IndexMap;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_LOSS_BUCKET, GameConfig, NEAR_MISS_BUCKET, SelectionConfig};
use crate::grid::StopCombination;
use crate::paytable::{Evaluation, PaylineEvaluator};
use crate::symbols::REELS;

/// Maximum stored combinations per bucket
pub const BUCKET_CAPACITY: usize = 50_000;

/// Largest stop space that is enumerated exhaustively
pub const EXHAUSTIVE_LIMIT: u128 = 2_000_000;

/// Uniform draws taken when the stop space exceeds [`EXHAUSTIVE_LIMIT`]
pub const SAMPLE_COUNT: usize = 100_000;

// ═══════════════════════════════════════════════════════════════════════════════
// STOP SPACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mixed-radix counter over stop combinations.
///
/// The last reel increments fastest and carries leftward, so combinations
/// come out in lexicographic order.
#[derive(Debug, Clone)]
pub struct StopCounter {
    reel_length: u32,
    /// Leading reels held fixed
    fixed: usize,
    current: Option<[u32; REELS]>,
}

impl StopCounter {
    /// Every combination for strips of `reel_length` stops
    pub fn new(reel_length: u32) -> Self {
        Self {
            reel_length,
            fixed: 0,
            current: (reel_length > 0).then_some([0; REELS]),
        }
    }

    /// Combinations whose first reel stops at `first`
    pub fn with_leading(reel_length: u32, first: u32) -> Self {
        let mut start = [0; REELS];
        start[0] = first;
        Self {
            reel_length,
            fixed: 1,
            current: (first < reel_length).then_some(start),
        }
    }
}

impl Iterator for StopCounter {
    type Item = StopCombination;

    fn next(&mut self) -> Option<Self::Item> {
        let stops = self.current?;

        let mut reel = REELS;
        let mut next = stops;
        self.current = loop {
            if reel == self.fixed {
                break None;
            }
            reel -= 1;
            next[reel] += 1;
            if next[reel] < self.reel_length {
                break Some(next);
            }
            next[reel] = 0;
        };

        Some(StopCombination(stops))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Bucket name for an evaluated grid.
///
/// Zero-pay grids are near misses with exactly two scatters and random
/// losses otherwise; paying grids go to their win tier.
pub fn bucket_for<'s>(evaluation: &Evaluation, selection: &'s SelectionConfig) -> &'s str {
    if !evaluation.is_win() {
        return if evaluation.is_near_miss {
            NEAR_MISS_BUCKET
        } else {
            DEFAULT_LOSS_BUCKET
        };
    }
    selection
        .classify_win(evaluation.total_multiplier)
        .unwrap_or(DEFAULT_LOSS_BUCKET)
}

/// Maps stop combinations to store slots
#[derive(Debug, Clone)]
pub struct Classifier<'a> {
    evaluator: PaylineEvaluator<'a>,
    selection: &'a SelectionConfig,
    /// Selection bucket index → store slot
    slots: Vec<usize>,
    loss_slot: usize,
    near_miss_slot: usize,
}

impl<'a> Classifier<'a> {
    fn new(config: &'a GameConfig, names: &IndexMap<String, Vec<StopCombination>>) -> Self {
        let selection = &config.selection;
        let slot = |name: &str| names.get_index_of(name).unwrap_or(0);
        Self {
            evaluator: config.evaluator(),
            selection,
            slots: selection.buckets().iter().map(|b| slot(&b.name)).collect(),
            loss_slot: slot(DEFAULT_LOSS_BUCKET),
            near_miss_slot: slot(NEAR_MISS_BUCKET),
        }
    }

    /// Store slot for one combination
    pub fn classify(&self, stops: &StopCombination) -> Option<usize> {
        let eval = self.evaluator.evaluate_stops(stops);
        if eval.total_multiplier <= 0.0 {
            return Some(if eval.is_near_miss {
                self.near_miss_slot
            } else {
                self.loss_slot
            });
        }
        self.selection
            .tiers()
            .classify(self.selection.buckets(), eval.total_multiplier)
            .map(|idx| self.slots[idx])
    }
}

/// Per-slot pools with a shared cap; later entries are dropped once full
#[derive(Debug, Clone)]
struct BucketFill {
    pools: Vec<Vec<StopCombination>>,
    capacity: usize,
}

impl BucketFill {
    fn new(slots: usize, capacity: usize) -> Self {
        Self {
            pools: vec![Vec::new(); slots],
            capacity,
        }
    }

    fn push(&mut self, slot: usize, stops: StopCombination) {
        let pool = &mut self.pools[slot];
        if pool.len() < self.capacity {
            pool.push(stops);
        }
    }

    /// Append a later chunk, keeping counter order
    fn extend(&mut self, later: BucketFill) {
        for (pool, more) in self.pools.iter_mut().zip(later.pools) {
            let room = self.capacity.saturating_sub(pool.len());
            pool.extend(more.into_iter().take(room));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// How the stop space was covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildPolicy {
    /// Every combination visited once
    Exhaustive { space: u64 },
    /// Independent uniform draws
    Sampled { space: u128, samples: usize },
}

/// Immutable bucket name → stop combination pools
#[derive(Debug, Clone)]
pub struct BucketStore {
    buckets: IndexMap<String, Vec<StopCombination>>,
    policy: BuildPolicy,
    visited: u64,
}

impl BucketStore {
    /// Pool for a bucket, `None` when the bucket was never configured
    pub fn get(&self, name: &str) -> Option<&[StopCombination]> {
        self.buckets.get(name).map(Vec::as_slice)
    }

    /// Uniform pick from a bucket, `None` when absent or empty
    pub fn sample<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Option<StopCombination> {
        let pool = self.get(name)?;
        if pool.is_empty() {
            return None;
        }
        Some(pool[rng.random_range(0..pool.len())])
    }

    /// `(bucket, population)` in store order
    pub fn summary(&self) -> Vec<(&str, usize)> {
        self.buckets
            .iter()
            .map(|(name, pool)| (name.as_str(), pool.len()))
            .collect()
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn policy(&self) -> BuildPolicy {
        self.policy
    }

    /// Combinations evaluated during construction
    pub fn combinations_visited(&self) -> u64 {
        self.visited
    }

    /// Stored combinations across all buckets
    pub fn total_entries(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// One-shot, CPU-bound store construction
#[derive(Debug, Clone)]
pub struct BucketStoreBuilder<'a> {
    config: &'a GameConfig,
    capacity: usize,
    exhaustive_limit: u128,
    sample_count: usize,
}

impl<'a> BucketStoreBuilder<'a> {
    pub fn new(config: &'a GameConfig) -> Self {
        Self {
            config,
            capacity: BUCKET_CAPACITY,
            exhaustive_limit: EXHAUSTIVE_LIMIT,
            sample_count: SAMPLE_COUNT,
        }
    }

    /// Override the per-bucket cap
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Override the exhaustive/sampled switch point
    pub fn with_exhaustive_limit(mut self, limit: u128) -> Self {
        self.exhaustive_limit = limit;
        self
    }

    /// Override the number of draws in sampled mode
    pub fn with_sample_count(mut self, samples: usize) -> Self {
        self.sample_count = samples;
        self
    }

    /// Policy this builder will use for its configuration
    pub fn policy(&self) -> BuildPolicy {
        let space = self.config.stop_space();
        if space <= self.exhaustive_limit {
            BuildPolicy::Exhaustive { space: space as u64 }
        } else {
            BuildPolicy::Sampled {
                space,
                samples: self.sample_count,
            }
        }
    }

    /// Build the store. `rng` is only drawn from in sampled mode.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> BucketStore {
        let start = Instant::now();
        let mut buckets = self.empty_buckets();
        let classifier = Classifier::new(self.config, &buckets);
        let reel_length = self.config.reel_length as u32;
        let policy = self.policy();

        let (fill, visited) = match policy {
            BuildPolicy::Exhaustive { space } => {
                log::info!("Traversing all {space} stop combinations...");
                let chunks: Vec<BucketFill> = (0..reel_length)
                    .into_par_iter()
                    .map(|first| {
                        let mut fill = BucketFill::new(buckets.len(), self.capacity);
                        for stops in StopCounter::with_leading(reel_length, first) {
                            if let Some(slot) = classifier.classify(&stops) {
                                fill.push(slot, stops);
                            }
                        }
                        fill
                    })
                    .collect();

                let mut merged = BucketFill::new(buckets.len(), self.capacity);
                for chunk in chunks {
                    merged.extend(chunk);
                }
                (merged, space)
            }
            BuildPolicy::Sampled { space, samples } => {
                log::info!("Stop space {space} too large, sampling {samples} combinations");
                let mut fill = BucketFill::new(buckets.len(), self.capacity);
                for _ in 0..samples {
                    let mut stops = [0u32; REELS];
                    for stop in stops.iter_mut() {
                        *stop = rng.random_range(0..reel_length.max(1));
                    }
                    let stops = StopCombination(stops);
                    if let Some(slot) = classifier.classify(&stops) {
                        fill.push(slot, stops);
                    }
                }
                (fill, samples as u64)
            }
        };

        for (pool, filled) in buckets.values_mut().zip(fill.pools) {
            *pool = filled;
        }

        log::info!("Buckets initialized in {:.2?}", start.elapsed());
        for (name, pool) in &buckets {
            log::info!("Bucket {name}: {} outcomes", pool.len());
        }

        BucketStore {
            buckets,
            policy,
            visited,
        }
    }

    /// Configured buckets in order, plus the two loss buckets if missing
    fn empty_buckets(&self) -> IndexMap<String, Vec<StopCombination>> {
        let mut buckets: IndexMap<String, Vec<StopCombination>> = self
            .config
            .selection
            .buckets()
            .iter()
            .map(|b| (b.name.clone(), Vec::new()))
            .collect();
        for name in [DEFAULT_LOSS_BUCKET, NEAR_MISS_BUCKET] {
            buckets.entry(name.to_string()).or_default();
        }
        buckets
    }
}
