//! Engine configuration.
//!
//! Every optional path through the pipeline (threshold overrides, rounding,
//! tie rules, budget scaling) is a field here with a documented default.

use label_core::{LabelError, LabelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slack used when rounding calibrated counts, so that a value such as
/// `0.9999999999` produced by floating point rescaling still floors to 1.
pub const ROUNDING_EPSILON: f64 = 1e-9;

/// Which examples are flagged as label issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Per noisy class, flag as many examples as the off-diagonal mass of its
    /// calibrated row.
    PruneByClass,
    /// Per (noisy, true) pair, flag as many examples as the calibrated cell.
    PruneByNoiseRate,
    /// Examples flagged by both of the above.
    #[default]
    Both,
    /// Like `PruneByNoiseRate` but budgets come from the raw confident joint.
    ConfidentLearning,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::PruneByClass => "prune_by_class",
            SelectionPolicy::PruneByNoiseRate => "prune_by_noise_rate",
            SelectionPolicy::Both => "both",
            SelectionPolicy::ConfidentLearning => "confident_learning",
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prune_by_class" => Ok(SelectionPolicy::PruneByClass),
            "prune_by_noise_rate" => Ok(SelectionPolicy::PruneByNoiseRate),
            "both" => Ok(SelectionPolicy::Both),
            "confident_learning" => Ok(SelectionPolicy::ConfidentLearning),
            other => Err(LabelError::InvalidConfig(format!(
                "unknown selection policy '{}' (expected prune_by_class, prune_by_noise_rate, both or confident_learning)",
                other
            ))),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a per-example label quality score is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMethod {
    /// Probability of the example's own noisy label.
    #[default]
    SelfConfidence,
    /// Own-label probability minus the best other class, mapped into [0, 1].
    NormalizedMargin,
}

impl ScoreMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMethod::SelfConfidence => "self_confidence",
            ScoreMethod::NormalizedMargin => "normalized_margin",
        }
    }
}

impl FromStr for ScoreMethod {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "self_confidence" => Ok(ScoreMethod::SelfConfidence),
            "normalized_margin" => Ok(ScoreMethod::NormalizedMargin),
            other => Err(LabelError::InvalidConfig(format!(
                "unknown score method '{}' (expected self_confidence or normalized_margin)",
                other
            ))),
        }
    }
}

impl fmt::Display for ScoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounding applied to fractional flag budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Round down; fractional residue is discarded.
    #[default]
    Floor,
    /// Round half away from zero.
    Nearest,
    /// Round up.
    Ceil,
}

impl Rounding {
    pub fn apply(&self, value: f64) -> f64 {
        let rounded = match self {
            Rounding::Floor => (value + ROUNDING_EPSILON).floor(),
            Rounding::Nearest => value.round(),
            Rounding::Ceil => (value - ROUNDING_EPSILON).ceil(),
        };
        rounded.max(0.0)
    }
}

impl FromStr for Rounding {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "floor" => Ok(Rounding::Floor),
            "nearest" | "round" => Ok(Rounding::Nearest),
            "ceil" => Ok(Rounding::Ceil),
            other => Err(LabelError::InvalidConfig(format!(
                "unknown rounding rule '{}' (expected floor, nearest or ceil)",
                other
            ))),
        }
    }
}

/// Winner among confidently predicted classes with equal probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassTieBreak {
    #[default]
    LowestClass,
    HighestClass,
}

/// Order among examples with equal quality scores when filling a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTieBreak {
    #[default]
    IndexAscending,
    IndexDescending,
}

/// Configuration for [`LabelIssueEngine`](crate::LabelIssueEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selection policy used to flag label issues.
    pub filter_by: SelectionPolicy,
    /// Label quality score used to rank candidates.
    pub score_method: ScoreMethod,
    /// Per-class thresholds replacing the estimated ones (length K, in [0, 1]).
    pub thresholds: Option<Vec<f64>>,
    /// Rounding of fractional flag budgets.
    pub rounding: Rounding,
    pub class_tie_break: ClassTieBreak,
    pub score_tie_break: ScoreTieBreak,
    /// Fraction of every estimated budget to actually flag, in (0, 1].
    pub frac_noise: f64,
    /// Never flag so many examples of a class that fewer than this remain.
    pub min_examples_per_class: usize,
    /// Explicit per-class budgets for `PruneByClass` (length K).
    pub num_to_remove_per_class: Option<Vec<usize>>,
    /// Allowed deviation of a probability row sum from 1.
    pub row_sum_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filter_by: SelectionPolicy::Both,
            score_method: ScoreMethod::SelfConfidence,
            thresholds: None,
            rounding: Rounding::Floor,
            class_tie_break: ClassTieBreak::LowestClass,
            score_tie_break: ScoreTieBreak::IndexAscending,
            frac_noise: 1.0,
            min_examples_per_class: 1,
            num_to_remove_per_class: None,
            row_sum_tolerance: 1e-4,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables.
    ///
    /// Env vars:
    /// - `LABEL_FILTER_BY` (default: `both`)
    /// - `LABEL_SCORE_METHOD` (default: `self_confidence`)
    /// - `LABEL_ROUNDING` (default: `floor`)
    /// - `LABEL_FRAC_NOISE` (default: `1.0`)
    /// - `LABEL_MIN_EXAMPLES_PER_CLASS` (default: `1`)
    pub fn from_env() -> LabelResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LABEL_FILTER_BY") {
            config.filter_by = v.parse()?;
        }
        if let Ok(v) = std::env::var("LABEL_SCORE_METHOD") {
            config.score_method = v.parse()?;
        }
        if let Ok(v) = std::env::var("LABEL_ROUNDING") {
            config.rounding = v.parse()?;
        }
        if let Ok(v) = std::env::var("LABEL_FRAC_NOISE") {
            config.frac_noise = v.trim().parse().map_err(|_| {
                LabelError::InvalidConfig(format!("LABEL_FRAC_NOISE is not a number: '{}'", v))
            })?;
        }
        if let Ok(v) = std::env::var("LABEL_MIN_EXAMPLES_PER_CLASS") {
            config.min_examples_per_class = v.trim().parse().map_err(|_| {
                LabelError::InvalidConfig(format!(
                    "LABEL_MIN_EXAMPLES_PER_CLASS is not an integer: '{}'",
                    v
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.filter_by = policy;
        self
    }

    pub fn with_score_method(mut self, method: ScoreMethod) -> Self {
        self.score_method = method;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Checks that do not depend on the dataset.
    pub fn validate(&self) -> LabelResult<()> {
        if !(self.frac_noise > 0.0 && self.frac_noise <= 1.0) {
            return Err(LabelError::InvalidConfig(format!(
                "frac_noise must be in (0, 1], got {}",
                self.frac_noise
            )));
        }
        if !self.row_sum_tolerance.is_finite() || self.row_sum_tolerance < 0.0 {
            return Err(LabelError::InvalidConfig(format!(
                "row_sum_tolerance must be a non-negative number, got {}",
                self.row_sum_tolerance
            )));
        }
        if let Some(thresholds) = &self.thresholds {
            if let Some(bad) = thresholds.iter().find(|t| !(0.0..=1.0).contains(*t)) {
                return Err(LabelError::InvalidConfig(format!(
                    "threshold overrides must lie in [0, 1], got {}",
                    bad
                )));
            }
        }
        Ok(())
    }

    /// Checks that depend on the number of classes.
    pub fn validate_for(&self, num_classes: usize) -> LabelResult<()> {
        self.validate()?;
        if let Some(thresholds) = &self.thresholds {
            if thresholds.len() != num_classes {
                return Err(LabelError::InvalidConfig(format!(
                    "{} threshold overrides given for {} classes",
                    thresholds.len(),
                    num_classes
                )));
            }
        }
        if let Some(budgets) = &self.num_to_remove_per_class {
            if budgets.len() != num_classes {
                return Err(LabelError::InvalidConfig(format!(
                    "num_to_remove_per_class has {} entries for {} classes",
                    budgets.len(),
                    num_classes
                )));
            }
        }
        Ok(())
    }
}
