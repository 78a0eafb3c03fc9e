//! Token and sentence label quality scores.

use std::fmt;
use std::str::FromStr;

use confident_learning::{quality, LabelIssueEngine};
use label_core::{stats, LabelError, LabelResult, ProbabilityMatrix};
use serde::{Deserialize, Serialize};

use crate::filter::{FlatTokens, TokenIssue};

/// Default softmin temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.05;

/// Default cutoff below which a score counts as an issue.
pub const DEFAULT_ISSUE_THRESHOLD: f64 = 0.1;

/// How token scores combine into a sentence score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceScoreMethod {
    /// Worst token in the sentence.
    #[default]
    Min,
    /// Softmin-weighted average with the given temperature.
    Softmin { temperature: f64 },
}

impl SentenceScoreMethod {
    pub fn score(&self, token_scores: &[f64]) -> f64 {
        match self {
            SentenceScoreMethod::Min => softmin(token_scores, 0.0),
            SentenceScoreMethod::Softmin { temperature } => softmin(token_scores, *temperature),
        }
    }
}

impl fmt::Display for SentenceScoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentenceScoreMethod::Min => write!(f, "min"),
            SentenceScoreMethod::Softmin { .. } => write!(f, "softmin"),
        }
    }
}

impl FromStr for SentenceScoreMethod {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" => Ok(SentenceScoreMethod::Min),
            "softmin" => Ok(SentenceScoreMethod::Softmin {
                temperature: DEFAULT_TEMPERATURE,
            }),
            other => Err(LabelError::InvalidConfig(format!(
                "unknown sentence score method '{}'. Select from the following methods: min, softmin",
                other
            ))),
        }
    }
}

/// Sentence scores plus the per-token scores they were built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenQualityScores {
    pub sentence_scores: Vec<f64>,
    /// `token_scores[i][j]` scores token `j` of sentence `i`.
    pub token_scores: Vec<Vec<f64>>,
}

impl TokenQualityScores {
    /// Sentences scoring below `threshold`, worst first.
    pub fn sentence_issues(&self, threshold: f64) -> Vec<usize> {
        issues_from_scores(&self.sentence_scores, threshold)
    }

    /// Tokens scoring below `threshold`, worst first.
    pub fn token_issues(&self, threshold: f64) -> Vec<TokenIssue> {
        token_issues_from_scores(&self.token_scores, threshold)
    }
}

/// Score every token with the engine's score method and every sentence with
/// `sentence_method`.
pub fn label_quality_scores(
    engine: &LabelIssueEngine,
    labels: &[Vec<usize>],
    pred_probs: &[ProbabilityMatrix],
    sentence_method: SentenceScoreMethod,
) -> LabelResult<TokenQualityScores> {
    let flat = FlatTokens::new(labels, pred_probs)?;
    let scores = engine.quality_scores(&flat.labels, &flat.pred_probs)?;
    let token_scores = flat.unflatten(&scores);
    let sentence_scores = token_scores.iter().map(|s| sentence_method.score(s)).collect();

    Ok(TokenQualityScores {
        sentence_scores,
        token_scores,
    })
}

/// Softmin sentence score for each sentence.
///
/// Each sentence score is `Σ s_j · softmax((1 - s)/T)_j`, so the lowest token
/// score dominates as the temperature drops. `T = 0` gives the minimum and
/// `T = ∞` the plain mean.
pub fn softmin_sentence_score(token_scores: &[Vec<f64>], temperature: f64) -> Vec<f64> {
    token_scores.iter().map(|s| softmin(s, temperature)).collect()
}

/// Empty sentences score 1.0.
fn softmin(scores: &[f64], temperature: f64) -> f64 {
    if scores.is_empty() {
        return 1.0;
    }
    if temperature <= 0.0 {
        return scores.iter().copied().fold(f64::INFINITY, f64::min);
    }
    if temperature.is_infinite() {
        return stats::mean(scores);
    }

    let logits: Vec<f64> = scores.iter().map(|s| (1.0 - s) / temperature).collect();
    let max_logit = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    let total: f64 = weights.iter().sum();

    scores
        .iter()
        .zip(&weights)
        .map(|(s, w)| s * w / total)
        .sum()
}

/// Sentence indices scoring strictly below `threshold`, worst first.
pub fn issues_from_scores(sentence_scores: &[f64], threshold: f64) -> Vec<usize> {
    quality::issues_below(sentence_scores, threshold)
}

/// Token positions scoring strictly below `threshold`, worst first; equal
/// scores keep sentence then token order.
pub fn token_issues_from_scores(token_scores: &[Vec<f64>], threshold: f64) -> Vec<TokenIssue> {
    let mut issues: Vec<(TokenIssue, f64)> = token_scores
        .iter()
        .enumerate()
        .flat_map(|(i, scores)| {
            scores
                .iter()
                .enumerate()
                .filter(move |(_, s)| **s < threshold)
                .map(move |(j, s)| ((i, j), *s))
        })
        .collect();
    issues.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    issues.into_iter().map(|(issue, _)| issue).collect()
}
