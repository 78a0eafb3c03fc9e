//! Token Classification
//!
//! Label issue detection for token-level datasets (named entity recognition
//! and similar), where every sentence carries one label per token. Sentences
//! are flattened into a single example list for the engine and issues are
//! reported back as `(sentence, token)` pairs.

pub mod filter;
pub mod mapping;
pub mod rank;
pub mod summary;
pub mod text;

pub use filter::{find_label_issues, FlatTokens, TokenIssue};
pub use mapping::{map_labels, merge_probs};
pub use rank::{
    issues_from_scores, label_quality_scores, softmin_sentence_score, token_issues_from_scores,
    SentenceScoreMethod, TokenQualityScores,
};
pub use summary::{common_label_issues, filter_by_token, token_issue_counts, LabelSwapCount};
pub use text::{filter_sentence, get_sentence, process_token};
