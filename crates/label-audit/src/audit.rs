//! Dataset files and the audits run on them.

use anyhow::{bail, Context, Result};
use confident_learning::{noise, LabelIssueEngine, LabelIssueReport};
use label_core::ProbabilityMatrix;
use serde::{Deserialize, Serialize};
use token_classification::{filter, summary, LabelSwapCount, TokenIssue};

/// One label per example plus its out-of-sample probability row.
#[derive(Debug, Deserialize)]
pub struct ClassificationDataset {
    pub labels: Vec<usize>,
    pub pred_probs: ProbabilityMatrix,
    #[serde(default)]
    pub sample_weights: Option<Vec<f64>>,
}

/// One label sequence per sentence, with optional words for summaries.
#[derive(Debug, Deserialize)]
pub struct TokenDataset {
    pub labels: Vec<Vec<usize>>,
    pub pred_probs: Vec<ProbabilityMatrix>,
    #[serde(default)]
    pub words: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Serialize)]
pub struct ClassificationAudit {
    pub num_issues: usize,
    pub estimated_num_issues: usize,
    pub health_score: f64,
    /// Flagged examples, most suspicious first.
    pub ranked_issues: Vec<usize>,
    pub report: LabelIssueReport,
}

#[derive(Debug, Serialize)]
pub struct TokenAudit {
    pub num_tokens: usize,
    pub issues: Vec<TokenIssue>,
    /// Present when the dataset carried words.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_issues: Option<Vec<LabelSwapCount>>,
}

pub fn audit_classification(
    engine: &LabelIssueEngine,
    dataset: &ClassificationDataset,
) -> Result<ClassificationAudit> {
    let report = engine
        .find_label_issues(
            &dataset.labels,
            &dataset.pred_probs,
            dataset.sample_weights.as_deref(),
        )
        .context("label issue search failed")?;

    Ok(ClassificationAudit {
        num_issues: report.num_issues(),
        estimated_num_issues: noise::estimate_num_issues(&report.calibrated_joint),
        health_score: report.health_score(),
        ranked_issues: report.ranked_issues(),
        report,
    })
}

pub fn audit_tokens(
    engine: &LabelIssueEngine,
    dataset: &TokenDataset,
    top: Option<usize>,
) -> Result<TokenAudit> {
    let (flat, report) = filter::find_token_report(engine, &dataset.labels, &dataset.pred_probs)
        .context("token label issue search failed")?;
    let issues: Vec<TokenIssue> = report
        .ranked_issues()
        .into_iter()
        .map(|idx| flat.locate(idx))
        .collect();

    let common_issues = match &dataset.words {
        Some(words) => {
            if words.len() != dataset.labels.len() {
                bail!(
                    "{} sentences of words but {} labelled sentences",
                    words.len(),
                    dataset.labels.len()
                );
            }
            Some(summary::common_label_issues(
                &issues,
                words,
                &dataset.labels,
                &dataset.pred_probs,
                &[],
                top,
            )?)
        }
        None => None,
    };

    Ok(TokenAudit {
        num_tokens: flat.num_tokens(),
        issues,
        common_issues,
    })
}
