//! Summaries of token label issues: which tokens are mislabeled most often,
//! and as which label swaps.

use std::collections::HashMap;

use label_core::{LabelError, LabelResult, ProbabilityMatrix};
use serde::{Deserialize, Serialize};

use crate::filter::TokenIssue;

/// How often one token appears among the issues with one given/predicted swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSwapCount {
    pub token: String,
    pub given_label: usize,
    pub predicted_label: usize,
    pub num_label_issues: usize,
}

fn word_at<'a, S: AsRef<str>>(words: &'a [Vec<S>], issue: TokenIssue) -> LabelResult<&'a str> {
    let (i, j) = issue;
    words
        .get(i)
        .and_then(|sentence| sentence.get(j))
        .map(|w| w.as_ref())
        .ok_or_else(|| {
            LabelError::ShapeMismatch(format!("no token at sentence {}, position {}", i, j))
        })
}

/// Number of issues per distinct token, most frequent first. Ties keep the
/// order in which tokens first appear among the issues.
pub fn token_issue_counts<S: AsRef<str>>(
    issues: &[TokenIssue],
    words: &[Vec<S>],
) -> LabelResult<Vec<(String, usize)>> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for &issue in issues {
        let word = word_at(words, issue)?;
        let slot = *position.entry(word).or_insert_with(|| {
            counts.push((word.to_string(), 0));
            counts.len() - 1
        });
        counts[slot].1 += 1;
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

/// Tokens most often flagged, broken down by (given, predicted) label swap.
///
/// The predicted label is the argmax of the token's probability row. Swaps
/// listed in `exclude` are not counted. Rows are ordered by count, largest
/// first; ties keep first-appearance order of the token and then
/// (given, predicted) order. `top` limits the number of rows returned.
pub fn common_label_issues<S: AsRef<str>>(
    issues: &[TokenIssue],
    words: &[Vec<S>],
    labels: &[Vec<usize>],
    pred_probs: &[ProbabilityMatrix],
    exclude: &[(usize, usize)],
    top: Option<usize>,
) -> LabelResult<Vec<LabelSwapCount>> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut swaps: Vec<(String, HashMap<(usize, usize), usize>)> = Vec::new();

    for &issue in issues {
        let (i, j) = issue;
        let word = word_at(words, issue)?;
        let given = labels
            .get(i)
            .and_then(|l| l.get(j))
            .copied()
            .ok_or_else(|| {
                LabelError::ShapeMismatch(format!("no label at sentence {}, position {}", i, j))
            })?;
        let probs = pred_probs
            .get(i)
            .filter(|p| j < p.num_rows())
            .ok_or_else(|| {
                LabelError::ShapeMismatch(format!(
                    "no probabilities at sentence {}, position {}",
                    i, j
                ))
            })?;
        let predicted = probs.argmax(j);

        let slot = *position.entry(word).or_insert_with(|| {
            swaps.push((word.to_string(), HashMap::new()));
            swaps.len() - 1
        });
        if !exclude.contains(&(given, predicted)) {
            *swaps[slot].1.entry((given, predicted)).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<LabelSwapCount> = Vec::new();
    for (token, counts) in swaps {
        let mut cells: Vec<((usize, usize), usize)> = counts.into_iter().collect();
        cells.sort_by_key(|(cell, _)| *cell);
        rows.extend(cells.into_iter().map(|((given, predicted), n)| LabelSwapCount {
            token: token.clone(),
            given_label: given,
            predicted_label: predicted,
            num_label_issues: n,
        }));
    }
    rows.sort_by(|a, b| b.num_label_issues.cmp(&a.num_label_issues));
    if let Some(top) = top {
        rows.truncate(top);
    }
    Ok(rows)
}

/// Issues whose token equals `token`, ignoring case.
pub fn filter_by_token<S: AsRef<str>>(
    token: &str,
    issues: &[TokenIssue],
    words: &[Vec<S>],
) -> Vec<TokenIssue> {
    let wanted = token.to_lowercase();
    issues
        .iter()
        .copied()
        .filter(|&issue| {
            word_at(words, issue)
                .map(|w| w.to_lowercase() == wanted)
                .unwrap_or(false)
        })
        .collect()
}
