//! End-to-end tests for store construction, selection and spins

use std::collections::HashSet;

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use outcome_engine::{
    BucketStoreBuilder, BuildPolicy, ConfigError, ConfigParser, DEFAULT_LOSS_BUCKET, EngineLoader,
    GameConfig, NEAR_MISS_BUCKET, OutcomeEngine, OutcomeSelector, PlayerState, ResultMatrix,
    StopCombination, StopCounter, bucket_for, effective_base_c,
};

// ═══════════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Five symbols, five lines, strips of five: 3125 combinations, every bucket populated
const MINI: &str = r#"{
  "symbols": { "H1": "Seven", "L1": "Cherry", "L2": "Lemon", "WILD": "Wild", "SCATTER": "Star" },
  "reel_sets": [
    ["H1", "SCATTER", "L1", "L2", "WILD"],
    ["L2", "L1", "H1", "WILD", "L1"],
    ["H1", "L2", "SCATTER", "L1", "L2"],
    ["L1", "H1", "L2", "H1", "L1"],
    ["L2", "H1", "L1", "SCATTER", "H1"]
  ],
  "pay_table": {
    "H1":   { "3": 5,  "4": 20, "5": 100 },
    "L1":   { "3": 2,  "4": 4,  "5": 10 },
    "L2":   { "3": 1,  "4": 3,  "5": 8 },
    "WILD": { "3": 10, "4": 30, "5": 150 }
  },
  "lines": {
    "1": [[1,0],[1,1],[1,2],[1,3],[1,4]],
    "2": [[0,0],[0,1],[0,2],[0,3],[0,4]],
    "3": [[2,0],[2,1],[2,2],[2,3],[2,4]],
    "4": [[0,0],[1,1],[2,2],[1,3],[0,4]],
    "5": [[2,0],[1,1],[0,2],[1,3],[2,4]]
  },
  "buckets": {
    "Loss_Random":   { "min": 0, "max": 0,    "weight": 600 },
    "Loss_NearMiss": { "min": 0, "max": 0,    "weight": 100 },
    "Win_Tier_1":    { "min": 0, "max": 5,    "weight": 300 },
    "Win_Tier_2":    { "min": 5, "max": 50,   "weight": 100 },
    "Win_Tier_3":    { "min": 50, "max": 1000, "weight": 10 }
  },
  "settings": {
    "base_c_value": 0.05,
    "target_rtp": 0.97,
    "high_roller_threshold": 50,
    "max_win_ratio": 1.2
  }
}"#;

fn mini() -> GameConfig {
    ConfigParser::new().parse_json(MINI).unwrap()
}

/// Same game read with a three-stop window on every strip
fn mini_short() -> GameConfig {
    let mut doc: serde_json::Value = serde_json::from_str(MINI).unwrap();
    doc["reels_length"] = serde_json::json!(3);
    ConfigParser::new().parse_json(&doc.to_string()).unwrap()
}

fn build(config: GameConfig) -> OutcomeEngine {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    OutcomeEngine::with_rng(config, &mut rng)
}

fn sym(config: &GameConfig, code: &str) -> outcome_engine::SymbolId {
    config.symbols.lookup(code).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUCKET STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_short_reels_enumerate_243_combinations() {
    let config = mini_short();
    assert_eq!(config.stop_space(), 243);

    let engine = build(config);
    let store = engine.store();
    assert_eq!(store.policy(), BuildPolicy::Exhaustive { space: 243 });
    assert_eq!(store.combinations_visited(), 243);
    assert_eq!(store.total_entries(), 243);

    let distinct: HashSet<StopCombination> = store
        .bucket_names()
        .flat_map(|name| store.get(name).unwrap().iter().copied())
        .collect();
    assert_eq!(distinct.len(), 243);
}

#[test]
fn test_every_bucket_populated() {
    let engine = build(mini());
    let store = engine.store();
    assert_eq!(store.combinations_visited(), 3125);
    assert_eq!(store.total_entries(), 3125);
    for (name, count) in store.summary() {
        assert!(count > 0, "bucket {name} is empty");
    }
}

#[test]
fn test_stored_wins_fall_in_their_tier() {
    let engine = build(mini());
    let evaluator = engine.evaluator();
    let selection = &engine.config().selection;

    for bucket in selection.buckets().iter().filter(|b| b.is_win()) {
        for stops in engine.store().get(&bucket.name).unwrap() {
            let eval = evaluator.evaluate_stops(stops);
            assert!(eval.is_win());
            assert!(
                bucket.admits(eval.total_multiplier),
                "{} holds multiplier {}",
                bucket.name,
                eval.total_multiplier
            );
        }
    }
}

#[test]
fn test_stored_losses_split_by_scatter_count() {
    let engine = build(mini());
    let config = engine.config();
    let evaluator = engine.evaluator();
    let scatter = sym(config, "SCATTER");

    for stops in engine.store().get(NEAR_MISS_BUCKET).unwrap() {
        let matrix = evaluator.matrix_of(stops);
        assert_eq!(evaluator.evaluate(&matrix).total_multiplier, 0.0);
        assert_eq!(matrix.count(scatter), 2);
    }
    for stops in engine.store().get(DEFAULT_LOSS_BUCKET).unwrap() {
        let matrix = evaluator.matrix_of(stops);
        assert_eq!(evaluator.evaluate(&matrix).total_multiplier, 0.0);
        assert_ne!(matrix.count(scatter), 2);
    }
}

#[test]
fn test_exhaustive_build_is_deterministic() {
    let config = mini();
    let first = BucketStoreBuilder::new(&config).build(&mut ChaCha8Rng::seed_from_u64(1));
    let second = BucketStoreBuilder::new(&config).build(&mut ChaCha8Rng::seed_from_u64(99));
    for name in first.bucket_names() {
        assert_eq!(first.get(name), second.get(name), "bucket {name} differs");
    }
}

#[test]
fn test_capacity_keeps_earliest_in_counter_order() {
    let config = mini();
    let store = BucketStoreBuilder::new(&config)
        .with_capacity(10)
        .build(&mut ChaCha8Rng::seed_from_u64(3));

    let evaluator = config.evaluator();
    let selection = &config.selection;
    let mut expected: Vec<(String, Vec<StopCombination>)> = store
        .bucket_names()
        .map(|name| (name.to_string(), Vec::new()))
        .collect();
    for stops in StopCounter::new(config.reel_length as u32) {
        let name = bucket_for(&evaluator.evaluate_stops(&stops), selection);
        if let Some((_, pool)) = expected.iter_mut().find(|(n, _)| n == name) {
            if pool.len() < 10 {
                pool.push(stops);
            }
        }
    }

    for (name, pool) in expected {
        assert_eq!(store.get(&name).unwrap(), pool.as_slice(), "bucket {name}");
    }
}

#[test]
fn test_sampled_policy_when_space_exceeds_limit() {
    let config = mini();
    let builder = BucketStoreBuilder::new(&config)
        .with_exhaustive_limit(1_000)
        .with_sample_count(500);
    assert_eq!(
        builder.policy(),
        BuildPolicy::Sampled {
            space: 3125,
            samples: 500
        }
    );

    let store = builder.build(&mut ChaCha8Rng::seed_from_u64(11));
    assert_eq!(store.combinations_visited(), 500);
    assert_eq!(store.total_entries(), 500);
}

#[test]
fn test_classic_config_sampled_build() {
    let config = GameConfig::classic().unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let engine = OutcomeEngine::with_builder(
        config,
        |b| b.with_exhaustive_limit(0).with_sample_count(20_000),
        &mut rng,
    );
    let store = engine.store();
    assert!(matches!(store.policy(), BuildPolicy::Sampled { .. }));
    assert_eq!(store.total_entries(), 20_000);
    assert!(!store.get(DEFAULT_LOSS_BUCKET).unwrap().is_empty());
    assert!(!store.get("Win_Tier_1").unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_matrix_of_wraps_and_tolerates_long_stops() {
    let config = mini();
    let evaluator = config.evaluator();

    let matrix = evaluator.matrix_of(&StopCombination([4, 4, 4, 4, 4]));
    assert_eq!(matrix.get(0, 0), Some(sym(&config, "WILD")));
    assert_eq!(matrix.get(1, 0), Some(sym(&config, "H1")));
    assert_eq!(matrix.get(2, 0), Some(sym(&config, "SCATTER")));

    // stops past the strip never panic
    let far = evaluator.matrix_of(&StopCombination([u32::MAX; 5]));
    assert_eq!(far.iter().count(), 15);
}

#[test]
fn test_wild_prefix_matches_following_symbol() {
    let config = mini();
    let (w, h1, l1, l2) = (
        sym(&config, "WILD"),
        sym(&config, "H1"),
        sym(&config, "L1"),
        sym(&config, "L2"),
    );
    let matrix = ResultMatrix::from_rows([
        [l1, l2, l1, l2, l1],
        [w, w, h1, h1, l1],
        [l2, l1, l2, l1, l2],
    ]);

    let eval = config.evaluator().evaluate(&matrix);
    let line = eval.winning_lines.iter().find(|l| l.line_id == 1).unwrap();
    assert_eq!(line.symbol_id, h1);
    assert_eq!(line.symbol, "Seven");
    assert_eq!(line.match_count, 4);
    assert_relative_eq!(line.amount, 20.0);
}

#[test]
fn test_two_scatters_without_wins_is_near_miss() {
    let config = mini();
    let (s, h1, l1, l2) = (
        sym(&config, "SCATTER"),
        sym(&config, "H1"),
        sym(&config, "L1"),
        sym(&config, "L2"),
    );
    let matrix = ResultMatrix::from_rows([
        [l1, l2, s, h1, l2],
        [l2, h1, l1, l2, s],
        [h1, l1, l2, l1, h1],
    ]);

    let eval = config.evaluator().evaluate(&matrix);
    assert_eq!(eval.total_multiplier, 0.0);
    assert!(eval.is_near_miss);
    assert_eq!(bucket_for(&eval, &config.selection), NEAR_MISS_BUCKET);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_small_bet_zeroes_top_two_tiers() {
    let config = mini();
    let selector = OutcomeSelector::new(&config.selection);
    let state = PlayerState::new(5.0, 1000.0);

    let weights = selector.eligible_weights(&state, true);
    let names: Vec<&str> = config.selection.buckets().iter().map(|b| b.name.as_str()).collect();
    let weight_of = |name: &str| weights[names.iter().position(|n| *n == name).unwrap()];
    assert_eq!(weight_of("Win_Tier_1"), 300.0);
    assert_eq!(weight_of("Win_Tier_2"), 0.0);
    assert_eq!(weight_of("Win_Tier_3"), 0.0);
}

#[test]
fn test_low_session_rtp_boosts_base_c() {
    let config = mini();
    let state = PlayerState {
        total_spins: 100,
        historical_rtp: 0.3,
        ..PlayerState::default()
    };
    assert_relative_eq!(
        effective_base_c(&state, config.selection.settings()),
        0.05 * 2.5
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPINS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_spins_respect_balance_ceiling() {
    let engine = build(mini());
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut state = PlayerState::new(10.0, 1000.0);
    state.wallet_balance = 1150.0;
    state.simulation_mode = true;

    for _ in 0..500 {
        state.fail_streak = 20;
        let result = engine.spin(&state, &mut rng);
        assert!(
            ["Loss_Random", "Loss_NearMiss", "Win_Tier_1"].contains(&result.bucket_name.as_str()),
            "unexpected bucket {}",
            result.bucket_name
        );
        assert!(state.wallet_balance + result.total_payout_amount <= 1200.0);
    }
}

#[test]
fn test_spin_outcome_matches_its_bucket() {
    let engine = build(mini());
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut state = PlayerState::new(50.0, 10_000.0);
    state.simulation_mode = true;

    for _ in 0..300 {
        let result = engine.spin(&state, &mut rng);
        let eval = engine.evaluator().evaluate_stops(&result.stops);
        assert_eq!(bucket_for(&eval, &engine.config().selection), result.bucket_name);
        assert_relative_eq!(result.total_payout_amount, eval.total_multiplier * 50.0);
        assert_relative_eq!(result.balance_delta, result.total_payout_amount - 50.0);
        assert_eq!(result.is_win, result.total_payout_amount > 0.0);
        state.fail_streak = result.new_fail_streak;
        state.total_spins += 1;
    }
}

#[test]
fn test_effective_config_reweights_without_rebuild() {
    let engine = build(mini());
    let parser = ConfigParser::new();
    let effective = parser
        .parse_selection_json(
            r#"{
                "buckets": {
                    "Loss_Random":   { "min": 0, "max": 0, "weight": 0 },
                    "Loss_NearMiss": { "min": 0, "max": 0, "weight": 0 },
                    "Win_Tier_1":    { "min": 0, "max": 5, "weight": 1 },
                    "Win_Tier_2":    { "min": 5, "max": 50, "weight": 0 },
                    "Win_Tier_3":    { "min": 50, "max": 1000, "weight": 0 }
                },
                "settings": { "base_c_value": 1.0 }
            }"#,
            &engine.config().selection,
        )
        .unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(8);
    for _ in 0..50 {
        let result = engine.spin_with(&PlayerState::default(), &effective, &mut rng);
        assert_eq!(result.bucket_name, "Win_Tier_1");
        assert!(result.is_win);
        assert_eq!(result.new_fail_streak, 0);
    }
}

#[test]
fn test_unknown_bucket_falls_back_to_random_loss() {
    let engine = build(mini());
    let mut buckets = engine.config().selection.buckets().to_vec();
    buckets.retain(|b| !b.is_win());
    buckets.push(outcome_engine::BucketDef::win("Win_Jackpot", 0.0, 100.0, 1.0));
    let mut settings = engine.config().selection.settings().clone();
    settings.base_c_value = 1.0;
    settings.high_roller_threshold = 0.0;
    let effective = outcome_engine::SelectionConfig::new(buckets, settings).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let state = PlayerState::new(1.0, 1000.0);
    let result = engine.spin_with(&state, &effective, &mut rng);
    assert_eq!(result.bucket_name, DEFAULT_LOSS_BUCKET);
    assert!(!result.is_win);
    assert_eq!(result.new_fail_streak, 1);
}

/// Every stop combination pays: wild/H1 strips on a single middle line
const ALL_WIN: &str = r#"{
  "symbols": { "H1": "Seven", "WILD": "Wild", "SCATTER": "Star" },
  "filler_symbol": "H1",
  "reel_sets": [["H1", "WILD"], ["H1", "WILD"], ["H1", "WILD"], ["H1", "WILD"], ["H1", "WILD"]],
  "pay_table": { "H1": { "5": 100 }, "WILD": { "5": 150 } },
  "lines": { "1": [[1,0],[1,1],[1,2],[1,3],[1,4]] },
  "buckets": {
    "Loss_Random":   { "weight": 600 },
    "Loss_NearMiss": { "weight": 100 },
    "Win_Tier_1":    { "min": 0, "max": 120, "weight": 300 },
    "Win_Tier_2":    { "min": 120, "max": 1000, "weight": 10 }
  },
  "settings": { "base_c_value": 0 }
}"#;

#[test]
fn test_loss_draw_without_stored_losses_pays_the_minimum() {
    let engine = build(ConfigParser::new().parse_json(ALL_WIN).unwrap());
    let store = engine.store();
    assert!(store.get(DEFAULT_LOSS_BUCKET).unwrap().is_empty());
    assert!(store.get(NEAR_MISS_BUCKET).unwrap().is_empty());
    assert_eq!(store.get("Win_Tier_2").unwrap().len(), 1);

    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let state = PlayerState::new(10.0, 1000.0);
    for _ in 0..100 {
        let result = engine.spin(&state, &mut rng);
        assert_eq!(result.bucket_name, "Win_Tier_1");
        assert_relative_eq!(result.total_payout_amount, 1000.0);
    }
}

#[test]
fn test_evaluation_is_idempotent() {
    let config = mini();
    let evaluator = config.evaluator();
    for stops in StopCounter::new(config.reel_length as u32).step_by(37) {
        let first = evaluator.evaluate_stops(&stops);
        let second = evaluator.evaluate_stops(&stops);
        assert_eq!(first, second, "stops {stops:?}");
        assert_eq!(evaluator.matrix_of(&stops), evaluator.matrix_of(&stops));
    }
}

#[test]
fn test_background_loader_becomes_ready() {
    let loader = EngineLoader::spawn(mini());
    let engine = loader.wait().unwrap();
    assert!(loader.is_ready());
    assert_eq!(engine.store().total_entries(), 3125);

    let mut rng = ChaCha8Rng::seed_from_u64(4);
    assert!(loader.spin(&PlayerState::default(), None, &mut rng).is_ok());
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_unknown_reel_symbol_rejected() {
    let broken = MINI.replacen(r#"["H1", "SCATTER""#, r#"["H9", "SCATTER""#, 1);
    let err = ConfigParser::new().parse_json(&broken).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownSymbol { .. }));
}

#[test]
fn test_overlapping_override_rejected() {
    let engine = build(mini_short());
    let err = ConfigParser::new()
        .parse_selection_json(
            r#"{ "buckets": {
                "Loss_Random": { "weight": 1 },
                "Win_Tier_1":  { "min": 0, "max": 10, "weight": 1 },
                "Win_Tier_2":  { "min": 5, "max": 50, "weight": 1 }
            } }"#,
            &engine.config().selection,
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::OverlappingTiers { .. }));
}
