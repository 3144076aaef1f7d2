//! Strategy DNA
//!
//! Typed parameter vector controlling an agent's decision logic. The known
//! numeric genes live in named fields so crossover and mutation can iterate
//! them without inspecting types at runtime; anything else goes in the
//! `extra` map and is treated as an unbounded gene.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    MeanReversion,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Momentum, StrategyKind::MeanReversion];
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "momentum" => Ok(StrategyKind::Momentum),
            "mean_reversion" | "meanreversion" => Ok(StrategyKind::MeanReversion),
            _ => anyhow::bail!(
                "Invalid strategy kind: {}. Valid: momentum, mean_reversion",
                s
            ),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Momentum => write!(f, "momentum"),
            StrategyKind::MeanReversion => write!(f, "mean_reversion"),
        }
    }
}

/// Named numeric genes with a fixed bound table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnaField {
    RiskTolerance,
    PositionSizePercent,
    MomentumWindow,
    MeanReversionThreshold,
}

impl DnaField {
    pub const ALL: [DnaField; 4] = [
        DnaField::RiskTolerance,
        DnaField::PositionSizePercent,
        DnaField::MomentumWindow,
        DnaField::MeanReversionThreshold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DnaField::RiskTolerance => "risk_tolerance",
            DnaField::PositionSizePercent => "position_size_percent",
            DnaField::MomentumWindow => "momentum_window",
            DnaField::MeanReversionThreshold => "mean_reversion_threshold",
        }
    }

    /// Inclusive (min, max) range a gene must stay within.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            DnaField::RiskTolerance => (0.05, 0.95),
            DnaField::PositionSizePercent => (1.0, 50.0),
            DnaField::MomentumWindow => (3.0, 50.0),
            DnaField::MeanReversionThreshold => (0.5, 3.0),
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let (min, max) = self.bounds();
        if value.is_nan() {
            return min;
        }
        value.clamp(min, max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dna {
    pub strategy_kind: StrategyKind,
    pub risk_tolerance: f64,
    pub position_size_percent: f64,
    pub momentum_window: f64,
    pub mean_reversion_threshold: f64,
    /// Open extension genes. No bound table entry.
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl Dna {
    pub fn get(&self, field: DnaField) -> f64 {
        match field {
            DnaField::RiskTolerance => self.risk_tolerance,
            DnaField::PositionSizePercent => self.position_size_percent,
            DnaField::MomentumWindow => self.momentum_window,
            DnaField::MeanReversionThreshold => self.mean_reversion_threshold,
        }
    }

    pub fn set(&mut self, field: DnaField, value: f64) {
        match field {
            DnaField::RiskTolerance => self.risk_tolerance = value,
            DnaField::PositionSizePercent => self.position_size_percent = value,
            DnaField::MomentumWindow => self.momentum_window = value,
            DnaField::MeanReversionThreshold => self.mean_reversion_threshold = value,
        }
    }

    /// Pull every known gene back inside its bound table entry.
    pub fn clamp_to_bounds(&mut self) {
        for field in DnaField::ALL {
            let clamped = field.clamp(self.get(field));
            self.set(field, clamped);
        }
    }

    /// Uniformly random genes within the bound table.
    pub fn random<R: Rng + ?Sized>(strategy_kind: StrategyKind, rng: &mut R) -> Self {
        let mut dna = Self {
            strategy_kind,
            ..Self::default()
        };
        for field in DnaField::ALL {
            let (min, max) = field.bounds();
            dna.set(field, rng.random_range(min..=max));
        }
        dna
    }

    /// Lookback length in ticks, rounded from the continuous gene.
    pub fn momentum_window_len(&self) -> usize {
        self.momentum_window.round().max(1.0) as usize
    }
}

impl Default for Dna {
    fn default() -> Self {
        Self {
            strategy_kind: StrategyKind::Momentum,
            risk_tolerance: 0.5,
            position_size_percent: 10.0,
            momentum_window: 14.0,
            mean_reversion_threshold: 1.5,
            extra: BTreeMap::new(),
        }
    }
}
