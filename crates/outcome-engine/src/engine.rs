//! Outcome engine: store construction and spin orchestration

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{DEFAULT_LOSS_BUCKET, GameConfig, NEAR_MISS_BUCKET, SelectionConfig};
use crate::error::EngineError;
use crate::grid::StopCombination;
use crate::paytable::PaylineEvaluator;
use crate::selector::OutcomeSelector;
use crate::spin::{PlayerState, SpinResult};
use crate::store::{BucketStore, BucketStoreBuilder, bucket_for};
use crate::symbols::REELS;

/// Outcome engine holding its immutable bucket store
///
/// Built once from a configuration; afterwards it is read-only and may be
/// shared across threads, each spin supplying its own random source.
#[derive(Debug)]
pub struct OutcomeEngine {
    config: GameConfig,
    store: BucketStore,
    /// Lowest-paying stored combination, kept only when no loss was stored
    floor: Option<StopCombination>,
}

impl OutcomeEngine {
    /// Build with an OS-seeded generator for sampled construction
    pub fn new(config: GameConfig) -> Self {
        let mut rng = StdRng::from_os_rng();
        Self::with_rng(config, &mut rng)
    }

    /// Build with an explicit random source
    pub fn with_rng<R: Rng + ?Sized>(config: GameConfig, rng: &mut R) -> Self {
        Self::with_builder(config, |builder| builder, rng)
    }

    /// Build with a customised store builder (capacity, limits)
    pub fn with_builder<R, F>(config: GameConfig, customize: F, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
        F: for<'c> FnOnce(BucketStoreBuilder<'c>) -> BucketStoreBuilder<'c>,
    {
        let store = customize(BucketStoreBuilder::new(&config)).build(rng);
        let floor = if loss_names(&config.selection).any(|name| has_entries(&store, name)) {
            None
        } else {
            log::warn!("No losing outcome stored; spins that need a loss will pay the lowest stored amount");
            lowest_paying(&config, &store)
        };
        Self { config, store, floor }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &BucketStore {
        &self.store
    }

    pub fn evaluator(&self) -> PaylineEvaluator<'_> {
        self.config.evaluator()
    }

    /// Spin with the construction-time selection settings
    pub fn spin<R: Rng + ?Sized>(&self, state: &PlayerState, rng: &mut R) -> SpinResult {
        self.spin_with(state, &self.config.selection, rng)
    }

    /// Spin with caller-supplied selection settings.
    ///
    /// Only weights, ranges and settings come from `effective`; outcomes are
    /// always drawn from the store built at construction.
    pub fn spin_with<R: Rng + ?Sized>(
        &self,
        state: &PlayerState,
        effective: &SelectionConfig,
        rng: &mut R,
    ) -> SpinResult {
        let selection = OutcomeSelector::new(effective).select(state, rng);
        let mut bucket_name = selection.bucket;

        if !state.simulation_mode {
            log::debug!(
                "Bet: {}, Balance: {}, Spins: {}, FailStreak: {}. Selected Bucket: {}",
                state.bet,
                state.wallet_balance,
                state.total_spins,
                state.fail_streak,
                bucket_name
            );
        }

        let stops = match self.store.sample(&bucket_name, rng) {
            Some(stops) => stops,
            None => {
                log::warn!("Bucket {bucket_name} empty! Fallback to {DEFAULT_LOSS_BUCKET}");
                match self.sample_loss(effective, rng) {
                    Some((name, stops)) => {
                        bucket_name = name.to_string();
                        stops
                    }
                    None => {
                        let stops = match self.floor {
                            Some(stops) => stops,
                            None => self.random_stops(rng),
                        };
                        let evaluation = self.evaluator().evaluate_stops(&stops);
                        bucket_name = bucket_for(&evaluation, effective).to_string();
                        stops
                    }
                }
            }
        };

        let evaluator = self.evaluator();
        let matrix = evaluator.matrix_of(&stops);
        let evaluation = evaluator.evaluate(&matrix);

        SpinResult::settle(stops, matrix, evaluation, bucket_name, state.bet, state.fail_streak)
    }

    /// First non-empty loss pool, `Loss_Random` first
    fn sample_loss<'s, R: Rng + ?Sized>(
        &self,
        effective: &'s SelectionConfig,
        rng: &mut R,
    ) -> Option<(&'s str, StopCombination)> {
        loss_names(effective).find_map(|name| self.store.sample(name, rng).map(|stops| (name, stops)))
    }

    /// Uniform draw; only reached when the store holds nothing at all
    fn random_stops<R: Rng + ?Sized>(&self, rng: &mut R) -> StopCombination {
        let reel_length = (self.config.reel_length as u32).max(1);
        let mut stops = [0u32; REELS];
        for stop in stops.iter_mut() {
            *stop = rng.random_range(0..reel_length);
        }
        StopCombination(stops)
    }
}

/// Loss bucket names in fallback order
fn loss_names(selection: &SelectionConfig) -> impl Iterator<Item = &str> {
    let configured = selection
        .buckets()
        .iter()
        .filter(|b| !b.is_win())
        .map(|b| b.name.as_str())
        .filter(|&name| name != DEFAULT_LOSS_BUCKET && name != NEAR_MISS_BUCKET);
    std::iter::once(DEFAULT_LOSS_BUCKET)
        .chain(std::iter::once(NEAR_MISS_BUCKET))
        .chain(configured)
}

fn has_entries(store: &BucketStore, name: &str) -> bool {
    store.get(name).is_some_and(|pool| !pool.is_empty())
}

fn lowest_paying(config: &GameConfig, store: &BucketStore) -> Option<StopCombination> {
    let evaluator = config.evaluator();
    store
        .bucket_names()
        .filter_map(|name| store.get(name))
        .flatten()
        .map(|stops| (evaluator.evaluate_stops(stops).total_multiplier, *stops))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, stops)| stops)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKGROUND CONSTRUCTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum LoaderState {
    Building,
    Ready(Arc<OutcomeEngine>),
    Failed(String),
}

/// Builds an engine on a dedicated worker and refuses spins until done.
///
/// A panicking build is reported as `BuildFailed` only where panics unwind.
/// The workspace release profile sets `panic = "abort"`, so there a failed
/// build terminates the process instead.
pub struct EngineLoader {
    state: Arc<RwLock<LoaderState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EngineLoader {
    /// Start construction on a background thread
    pub fn spawn(config: GameConfig) -> Self {
        let state = Arc::new(RwLock::new(LoaderState::Building));
        let shared = Arc::clone(&state);

        let spawned = thread::Builder::new()
            .name("bucket-store".into())
            .spawn(move || {
                let built = panic::catch_unwind(AssertUnwindSafe(|| OutcomeEngine::new(config)));
                *shared.write() = match built {
                    Ok(engine) => {
                        log::info!("Outcome engine ready");
                        LoaderState::Ready(Arc::new(engine))
                    }
                    Err(_) => {
                        log::error!("Bucket store construction panicked");
                        LoaderState::Failed("construction worker panicked".into())
                    }
                };
            });

        let worker = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                *state.write() = LoaderState::Failed(format!("failed to spawn worker: {e}"));
                None
            }
        };

        Self {
            state,
            worker: Mutex::new(worker),
        }
    }

    /// Wrap an engine that is already built
    pub fn ready(engine: OutcomeEngine) -> Self {
        Self {
            state: Arc::new(RwLock::new(LoaderState::Ready(Arc::new(engine)))),
            worker: Mutex::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), LoaderState::Ready(_))
    }

    /// The engine, or `NotReady` while construction runs
    pub fn engine(&self) -> Result<Arc<OutcomeEngine>, EngineError> {
        match &*self.state.read() {
            LoaderState::Ready(engine) => Ok(Arc::clone(engine)),
            LoaderState::Building => Err(EngineError::NotReady),
            LoaderState::Failed(reason) => Err(EngineError::BuildFailed(reason.clone())),
        }
    }

    /// Block until construction finishes
    pub fn wait(&self) -> Result<Arc<OutcomeEngine>, EngineError> {
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                let mut state = self.state.write();
                if matches!(*state, LoaderState::Building) {
                    *state = LoaderState::Failed("construction worker panicked".into());
                }
            }
        }
        self.engine()
    }

    /// Spin once construction has completed
    pub fn spin<R: Rng + ?Sized>(
        &self,
        state: &PlayerState,
        effective: Option<&SelectionConfig>,
        rng: &mut R,
    ) -> Result<SpinResult, EngineError> {
        let engine = self.engine()?;
        Ok(match effective {
            Some(effective) => engine.spin_with(state, effective, rng),
            None => engine.spin(state, rng),
        })
    }
}
