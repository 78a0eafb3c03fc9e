//! label-audit: find likely label errors in a dataset of labels and
//! out-of-sample predicted probabilities, and print a JSON report.
//!
//! Usage:
//!   label-audit --input dataset.json
//!   label-audit --input dataset.json --filter-by prune_by_noise_rate --score-method normalized_margin
//!   label-audit --tokens --input sentences.json --top 10
//!
//! Engine defaults come from `LABEL_*` environment variables (a `.env` file is
//! loaded first); command-line flags override them.

mod audit;

use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use confident_learning::{EngineConfig, LabelIssueEngine};

use crate::audit::{audit_classification, audit_tokens, ClassificationDataset, TokenDataset};

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  label-audit --input PATH           Audit a classification dataset (JSON)");
    eprintln!("  label-audit --tokens --input PATH  Audit a token classification dataset (JSON)");
    eprintln!("  label-audit --input -              Read the dataset from stdin");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --filter-by POLICY       prune_by_class | prune_by_noise_rate | both | confident_learning");
    eprintln!("  --score-method METHOD    self_confidence | normalized_margin");
    eprintln!("  --frac-noise F           Fraction of the estimated issues to flag (0, 1]");
    eprintln!("  --top N                  Rows of the token summary to keep");
    eprintln!("  --output PATH            Write the report to PATH instead of stdout");
    eprintln!("  --compact                Single-line JSON");
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read dataset from stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read dataset {}", path))
    }
}

fn engine_config(args: &[String]) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env().context("invalid LABEL_* environment")?;
    if let Some(v) = flag_value(args, "--filter-by") {
        config.filter_by = v.parse()?;
    }
    if let Some(v) = flag_value(args, "--score-method") {
        config.score_method = v.parse()?;
    }
    if let Some(v) = flag_value(args, "--frac-noise") {
        config.frac_noise = v
            .parse()
            .with_context(|| format!("--frac-noise is not a number: '{}'", v))?;
    }
    Ok(config)
}

fn parse_top(args: &[String]) -> Result<Option<usize>> {
    flag_value(args, "--top")
        .map(|v| {
            v.parse()
                .with_context(|| format!("--top is not a row count: '{}'", v))
        })
        .transpose()
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "label_audit=info,confident_learning=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(input) = flag_value(&args, "--input") else {
        print_usage();
        std::process::exit(1);
    };
    let tokens = args.iter().any(|a| a == "--tokens");
    let compact = args.iter().any(|a| a == "--compact");
    let top = parse_top(&args)?;

    let config = engine_config(&args)?;
    tracing::info!(
        input,
        tokens,
        policy = %config.filter_by,
        score_method = %config.score_method,
        "starting label audit"
    );
    let engine = LabelIssueEngine::new(config)?;
    let raw = read_input(input)?;

    let report = if tokens {
        let dataset: TokenDataset =
            serde_json::from_str(&raw).context("dataset is not a valid token dataset")?;
        let audit = audit_tokens(&engine, &dataset, top)?;
        tracing::info!(
            tokens = audit.num_tokens,
            issues = audit.issues.len(),
            "token audit complete"
        );
        serde_json::to_value(&audit)?
    } else {
        let dataset: ClassificationDataset =
            serde_json::from_str(&raw).context("dataset is not a valid classification dataset")?;
        let audit = audit_classification(&engine, &dataset)?;
        tracing::info!(
            examples = dataset.labels.len(),
            issues = audit.num_issues,
            health = audit.health_score,
            "audit complete"
        );
        serde_json::to_value(&audit)?
    };

    let rendered = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    match flag_value(&args, "--output") {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("failed to write report {}", path))?;
            tracing::info!(path, "report written");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_top() {
        assert_eq!(parse_top(&args(&["label-audit", "--top", "3"])).unwrap(), Some(3));
        assert_eq!(parse_top(&args(&["label-audit"])).unwrap(), None);

        let err = parse_top(&args(&["label-audit", "--top", "ten"])).unwrap_err();
        assert!(err.to_string().contains("--top"));
    }

    #[test]
    fn test_engine_flags_override_defaults() {
        let config = engine_config(&args(&[
            "label-audit",
            "--filter-by",
            "prune_by_class",
            "--frac-noise",
            "0.5",
        ]))
        .unwrap();
        assert_eq!(config.filter_by, confident_learning::SelectionPolicy::PruneByClass);
        assert_eq!(config.frac_noise, 0.5);
        assert!(engine_config(&args(&["label-audit", "--frac-noise", "lots"])).is_err());
    }
}
