//! # outcome-engine: bucketed slot outcome engine
//!
//! Computes outcomes for a 5-reel, 3-row slot machine steered toward a
//! long-run payback target. The reel-stop space is classified once into
//! payout buckets; each spin picks a bucket with a feedback-controlled
//! probability model and draws a concrete stop combination from it.
//!
//! ## Architecture
//!
//! ```text
//! GameConfig ──> BucketStoreBuilder ──> BucketStore   (one-time, rayon)
//!                                           │
//! PlayerState ──> OutcomeSelector ──> bucket name
//!                                           │
//!                                   StopCombination
//!                                           │
//!                 PaylineEvaluator ──> ResultMatrix + pays
//!                                           │
//!                                      SpinResult
//! ```
//!
//! Randomness is always injected (`&mut impl rand::Rng`); the engine holds
//! no process-wide state.

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod parser;
pub mod paytable;
pub mod selector;
pub mod spin;
pub mod store;
pub mod symbols;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use grid::*;
pub use parser::*;
pub use paytable::*;
pub use selector::*;
pub use spin::*;
pub use store::*;
pub use symbols::*;
