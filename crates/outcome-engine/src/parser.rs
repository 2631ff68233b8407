//! Configuration document parser
//!
//! Parses JSON or YAML configuration documents into a validated
//! [`GameConfig`]. Document key order is preserved, so bucket declaration
//! order (which drives the weighted walk) survives parsing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let parser = ConfigParser::new();
//! let config = parser.parse_path("game_config.json")?;
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{BucketDef, BucketKind, GameConfig, SelectionConfig, Settings};
use crate::error::ConfigError;
use crate::paytable::{PayTable, Payline};
use crate::symbols::{REELS, ReelStrip, SymbolSet};

/// Configuration parser
pub struct ConfigParser {
    /// Validation limits
    pub limits: ConfigLimits,
}

/// Parsing limits
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    pub max_symbols: usize,
    pub max_paylines: usize,
    pub max_buckets: usize,
    pub max_reel_length: usize,
    pub max_pay_value: f64,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_symbols: 256,
            max_paylines: 100,
            max_buckets: 64,
            max_reel_length: 4096,
            max_pay_value: 1_000_000.0,
        }
    }
}

impl ConfigParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self {
            limits: ConfigLimits::default(),
        }
    }

    /// Create parser with custom limits
    pub fn with_limits(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Parse a file, picking the format from its extension
    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<GameConfig, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => self.parse_yaml(&text),
            _ => self.parse_json(&text),
        }
    }

    /// Parse a JSON document
    pub fn parse_json(&self, json: &str) -> Result<GameConfig, ConfigError> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        self.to_game_config(doc)
    }

    /// Parse a YAML document
    pub fn parse_yaml(&self, yaml: &str) -> Result<GameConfig, ConfigError> {
        let doc: ConfigDocument = serde_yml::from_str(yaml)?;
        self.to_game_config(doc)
    }

    /// Parse a runtime override carrying `buckets` and/or `settings`.
    ///
    /// Absent sections are inherited from `base`.
    pub fn parse_selection_json(
        &self,
        json: &str,
        base: &SelectionConfig,
    ) -> Result<SelectionConfig, ConfigError> {
        let doc: SelectionDocument = serde_json::from_str(json)?;
        let buckets = match doc.buckets {
            Some(raw) => self.to_buckets(raw)?,
            None => base.buckets().to_vec(),
        };
        let settings = doc.settings.unwrap_or_else(|| base.settings().clone());
        SelectionConfig::new(buckets, settings)
    }

    /// Validate document against limits
    pub fn validate(&self, doc: &ConfigDocument) -> Result<(), ConfigError> {
        let symbols = doc.symbols.as_ref().ok_or(ConfigError::MissingSection("symbols"))?;
        let reels = doc.reel_sets.as_ref().ok_or(ConfigError::MissingSection("reel_sets"))?;
        let lines = doc.lines.as_ref().ok_or(ConfigError::MissingSection("lines"))?;
        let buckets = doc.buckets.as_ref().ok_or(ConfigError::MissingSection("buckets"))?;
        if doc.pay_table.is_none() {
            return Err(ConfigError::MissingSection("pay_table"));
        }

        if symbols.len() > self.limits.max_symbols {
            return Err(ConfigError::Validation(format!(
                "Too many symbols: {} > {}",
                symbols.len(),
                self.limits.max_symbols
            )));
        }
        if lines.len() > self.limits.max_paylines {
            return Err(ConfigError::Validation(format!(
                "Too many paylines: {} > {}",
                lines.len(),
                self.limits.max_paylines
            )));
        }
        if buckets.len() > self.limits.max_buckets {
            return Err(ConfigError::Validation(format!(
                "Too many buckets: {} > {}",
                buckets.len(),
                self.limits.max_buckets
            )));
        }
        if reels.len() != REELS {
            return Err(ConfigError::Validation(format!(
                "Expected {REELS} reel strips, got {}",
                reels.len()
            )));
        }
        if let Some((idx, _)) = reels.iter().enumerate().find(|(_, r)| r.is_empty()) {
            return Err(ConfigError::Validation(format!("Reel {idx} strip is empty")));
        }

        let reel_length = doc.reel_length().unwrap_or(0);
        if reel_length == 0 || reel_length > self.limits.max_reel_length {
            return Err(ConfigError::Validation(format!(
                "reels_length must be in 1..={}, got {reel_length}",
                self.limits.max_reel_length
            )));
        }

        Ok(())
    }

    /// Convert a document to a validated config
    fn to_game_config(&self, doc: ConfigDocument) -> Result<GameConfig, ConfigError> {
        self.validate(&doc)?;
        let reel_length = doc.reel_length().unwrap_or(0);

        let ConfigDocument {
            symbols: Some(raw_symbols),
            reel_sets: Some(reel_sets),
            pay_table: Some(pay_table),
            lines: Some(lines),
            buckets: Some(raw_buckets),
            settings,
            wild_symbol,
            scatter_symbol,
            filler_symbol,
            ..
        } = doc
        else {
            return Err(ConfigError::Validation("incomplete configuration document".into()));
        };

        let symbols = SymbolSet::new(
            raw_symbols.iter().map(|(code, s)| (code.as_str(), s.name())),
            &wild_symbol,
            &scatter_symbol,
            &filler_symbol,
        );

        let mut reels = Vec::with_capacity(REELS);
        for (reel_idx, strip) in reel_sets.iter().enumerate() {
            let mut ids = Vec::with_capacity(strip.len());
            for code in strip {
                let id = symbols.lookup(code).ok_or_else(|| ConfigError::UnknownSymbol {
                    symbol: code.clone(),
                    context: format!("reel {reel_idx}"),
                })?;
                ids.push(id);
            }
            reels.push(ReelStrip::new(reel_idx as u8, ids));
        }

        let mut paylines = Vec::with_capacity(lines.len());
        for (line_id, coords) in &lines {
            paylines.push(parse_payline(line_id, coords)?);
        }

        let mut paytable = PayTable::new(paylines, symbols.len());
        for (code, counts) in &pay_table {
            let id = symbols.lookup(code).ok_or_else(|| ConfigError::UnknownSymbol {
                symbol: code.clone(),
                context: "pay_table".to_string(),
            })?;
            for (count, &multiplier) in counts {
                let parsed = count
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .filter(|&n| (1..=REELS as u8).contains(&n))
                    .ok_or_else(|| ConfigError::InvalidMatchCount {
                        symbol: code.clone(),
                        count: count.clone(),
                    })?;
                if !multiplier.is_finite() || multiplier < 0.0 || multiplier > self.limits.max_pay_value {
                    return Err(ConfigError::Validation(format!(
                        "Pay value {multiplier} for {code} x{parsed} out of range"
                    )));
                }
                paytable.set_pay(id, parsed, multiplier);
            }
        }

        let buckets = self.to_buckets(raw_buckets)?;
        let selection = SelectionConfig::new(buckets, settings)?;

        Ok(GameConfig {
            symbols,
            reels,
            reel_length,
            paytable,
            selection,
        })
    }

    fn to_buckets(&self, raw: IndexMap<String, RawBucket>) -> Result<Vec<BucketDef>, ConfigError> {
        if raw.len() > self.limits.max_buckets {
            return Err(ConfigError::Validation(format!(
                "Too many buckets: {} > {}",
                raw.len(),
                self.limits.max_buckets
            )));
        }
        Ok(raw
            .into_iter()
            .map(|(name, b)| {
                let kind = b.kind.unwrap_or_else(|| BucketKind::infer(&name));
                BucketDef::new(name, kind, b.resolved_min(), b.resolved_max(), b.weight)
            })
            .collect())
    }
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_payline(line_id: &str, coords: &[[i64; 2]]) -> Result<Payline, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidPayline {
        line: line_id.to_string(),
        reason,
    };
    let id = line_id
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid("line id must be a non-negative integer".into()))?;
    if coords.len() != REELS {
        return Err(invalid(format!("expected {REELS} cells, got {}", coords.len())));
    }

    let mut cells = [(0u8, 0u8); REELS];
    for (cell, &[row, col]) in cells.iter_mut().zip(coords) {
        let row = u8::try_from(row).map_err(|_| invalid(format!("row {row} out of range")))?;
        let col = u8::try_from(col).map_err(|_| invalid(format!("col {col} out of range")))?;
        *cell = (row, col);
    }

    let payline = Payline { id, cells };
    if !payline.is_valid() {
        return Err(invalid("cell outside the 3x5 grid".into()));
    }
    Ok(payline)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration document structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Symbol id → display name
    #[serde(default)]
    pub symbols: Option<IndexMap<String, RawSymbol>>,
    /// Stop positions per reel, defaults to the longest strip
    #[serde(default)]
    pub reels_length: Option<usize>,
    /// One strip of symbol ids per reel
    #[serde(default)]
    pub reel_sets: Option<Vec<Vec<String>>>,
    /// Symbol id → match count → multiplier
    #[serde(default)]
    pub pay_table: Option<IndexMap<String, IndexMap<String, f64>>>,
    /// Line id → five `[row, col]` cells
    #[serde(default)]
    pub lines: Option<IndexMap<String, Vec<[i64; 2]>>>,
    #[serde(default)]
    pub buckets: Option<IndexMap<String, RawBucket>>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default = "default_wild")]
    pub wild_symbol: String,
    #[serde(default = "default_scatter")]
    pub scatter_symbol: String,
    #[serde(default = "default_filler")]
    pub filler_symbol: String,
}

impl ConfigDocument {
    fn reel_length(&self) -> Option<usize> {
        self.reels_length.or_else(|| {
            self.reel_sets
                .as_ref()
                .and_then(|reels| reels.iter().map(Vec::len).max())
        })
    }
}

fn default_wild() -> String {
    "WILD".to_string()
}

fn default_scatter() -> String {
    "SCATTER".to_string()
}

fn default_filler() -> String {
    "L1".to_string()
}

/// Symbol entry: either a bare display name or `{ "name": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSymbol {
    Name(String),
    Detailed { name: String },
}

impl RawSymbol {
    pub fn name(&self) -> &str {
        match self {
            RawSymbol::Name(name) | RawSymbol::Detailed { name } => name,
        }
    }
}

/// Bucket entry accepting `min`/`max` as synonyms of `min_win`/`max_win`.
///
/// When both spellings are present the `_win` key takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBucket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_win: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_win: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub kind: Option<BucketKind>,
}

impl RawBucket {
    /// Lower bound, 0 when absent
    pub fn resolved_min(&self) -> f64 {
        self.min_win.or(self.min).unwrap_or(0.0)
    }

    /// Upper bound, 0 when absent
    pub fn resolved_max(&self) -> f64 {
        self.max_win.or(self.max).unwrap_or(0.0)
    }
}

/// Runtime override document
#[derive(Debug, Clone, Deserialize)]
struct SelectionDocument {
    #[serde(default)]
    buckets: Option<IndexMap<String, RawBucket>>,
    #[serde(default)]
    settings: Option<Settings>,
}
