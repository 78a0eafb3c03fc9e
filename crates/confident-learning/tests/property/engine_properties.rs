use confident_learning::{EngineConfig, LabelIssueEngine, SelectionPolicy};
use label_core::ProbabilityMatrix;
use proptest::prelude::*;

/// Random labelled datasets: 2 to 4 classes, 4 to 40 examples, strictly
/// positive probability rows.
fn dataset() -> impl Strategy<Value = (Vec<usize>, ProbabilityMatrix)> {
    (2usize..=4, 4usize..=40).prop_flat_map(|(k, n)| {
        (
            prop::collection::vec(0..k, n),
            prop::collection::vec(prop::collection::vec(0.01f64..1.0, k), n),
        )
            .prop_map(|(labels, raw)| {
                let rows: Vec<Vec<f64>> = raw
                    .into_iter()
                    .map(|row| {
                        let sum: f64 = row.iter().sum();
                        row.into_iter().map(|v| v / sum).collect()
                    })
                    .collect();
                (labels, ProbabilityMatrix::from_rows(rows).unwrap())
            })
    })
}

fn run(policy: SelectionPolicy, labels: &[usize], probs: &ProbabilityMatrix) -> Vec<usize> {
    LabelIssueEngine::new(EngineConfig::default().with_policy(policy))
        .unwrap()
        .find_label_issues(labels, probs, None)
        .unwrap()
        .label_issues
        .into_iter()
        .collect()
}

proptest! {
    #[test]
    fn repeated_runs_are_identical((labels, probs) in dataset()) {
        let engine = LabelIssueEngine::default();
        let first = engine.find_label_issues(&labels, &probs, None).unwrap();
        let second = engine.find_label_issues(&labels, &probs, None).unwrap();
        prop_assert_eq!(&first.label_issues, &second.label_issues);
        prop_assert_eq!(&first.quality_scores, &second.quality_scores);
        prop_assert_eq!(&first.calibrated_joint, &second.calibrated_joint);
    }

    #[test]
    fn calibrated_rows_match_observed_counts((labels, probs) in dataset()) {
        let report = LabelIssueEngine::default().find_label_issues(&labels, &probs, None).unwrap();
        let calibrated = &report.calibrated_joint;
        for i in 0..report.num_classes {
            let observed = labels.iter().filter(|&&l| l == i).count() as f64;
            if calibrated.zero_rows.contains(&i) {
                prop_assert_eq!(calibrated.matrix.row_sum(i), 0.0);
            } else {
                prop_assert!((calibrated.matrix.row_sum(i) - observed).abs() < 1e-9);
            }
        }
        let n = labels.len() as f64;
        prop_assert!(calibrated.matrix.total() <= n + 1e-9);
        if calibrated.zero_rows.is_empty() {
            prop_assert!((calibrated.matrix.total() - n).abs() < 1e-6 * n);
        }
    }

    #[test]
    fn thresholds_are_probabilities((labels, probs) in dataset()) {
        let report = LabelIssueEngine::default().find_label_issues(&labels, &probs, None).unwrap();
        for j in 0..report.num_classes {
            let t = report.thresholds.get(j);
            prop_assert!((0.0..=1.0 + 1e-12).contains(&t));
            if !labels.contains(&j) {
                prop_assert_eq!(t, 0.0);
                prop_assert!(!report.thresholds.is_active(j));
            }
        }
    }

    #[test]
    fn raising_thresholds_never_grows_the_joint(
        (labels, probs) in dataset(),
        base in 0.0f64..0.9,
        bump in 0.0f64..0.1,
    ) {
        let k = probs.num_classes();
        let joint_total = |t: f64| {
            LabelIssueEngine::new(EngineConfig::default().with_thresholds(vec![t; k]))
                .unwrap()
                .compute_confident_joint(&labels, &probs, None)
                .unwrap()
                .total()
        };
        prop_assert!(joint_total(base + bump) <= joint_total(base));
    }

    #[test]
    fn raising_one_threshold_never_grows_its_column(
        (labels, probs) in dataset(),
        base in 0.0f64..0.9,
        bump in 0.0f64..0.1,
        pick in 0usize..4,
    ) {
        let k = probs.num_classes();
        let class = pick % k;
        let joint = |thresholds: Vec<f64>| {
            LabelIssueEngine::new(EngineConfig::default().with_thresholds(thresholds))
                .unwrap()
                .compute_confident_joint(&labels, &probs, None)
                .unwrap()
        };
        let before = joint(vec![base; k]);
        let mut raised = vec![base; k];
        raised[class] = base + bump;
        let after = joint(raised);
        for i in 0..k {
            prop_assert!(
                after.counts.get(i, class) <= before.counts.get(i, class),
                "cell ({}, {}) grew after raising threshold {}",
                i,
                class,
                class
            );
        }
    }

    #[test]
    fn both_is_subset_of_each_policy((labels, probs) in dataset()) {
        let both = run(SelectionPolicy::Both, &labels, &probs);
        let by_class = run(SelectionPolicy::PruneByClass, &labels, &probs);
        let by_rate = run(SelectionPolicy::PruneByNoiseRate, &labels, &probs);
        for idx in &both {
            prop_assert!(by_class.contains(idx));
            prop_assert!(by_rate.contains(idx));
        }
    }

    #[test]
    fn every_observed_class_keeps_an_example((labels, probs) in dataset()) {
        for policy in [
            SelectionPolicy::PruneByClass,
            SelectionPolicy::PruneByNoiseRate,
            SelectionPolicy::Both,
        ] {
            let flagged = run(policy, &labels, &probs);
            for class in 0..probs.num_classes() {
                let total = labels.iter().filter(|&&l| l == class).count();
                let removed = flagged.iter().filter(|&&i| labels[i] == class).count();
                if total > 0 {
                    prop_assert!(removed < total, "policy {} emptied class {}", policy, class);
                }
            }
        }
    }

    #[test]
    fn scores_do_not_depend_on_policy((labels, probs) in dataset()) {
        let report = |policy| {
            LabelIssueEngine::new(EngineConfig::default().with_policy(policy))
                .unwrap()
                .find_label_issues(&labels, &probs, None)
                .unwrap()
        };
        let a = report(SelectionPolicy::PruneByClass);
        let b = report(SelectionPolicy::ConfidentLearning);
        prop_assert_eq!(&a.quality_scores, &b.quality_scores);
        for s in &a.quality_scores {
            prop_assert!((0.0..=1.0).contains(s));
        }
    }
}
